//! Dispatch engine: CSV rosters → invitation emails.
//!
//! One run walks every configured survey type (or a single one when the
//! caller passed a filter), loads that type's roster, and fans out one
//! send per resolvable recipient. Rows settle independently; a failed row
//! never aborts its siblings, and a failed send-log write never downgrades
//! a sent row.

use std::sync::Arc;

use futures::future::join_all;
use serde_json::json;
use uuid::Uuid;

use crate::config::{Settings, SurveySettings};
use crate::link;
use crate::providers::{EmailSender, OutboundEmail, RecordStore};
use crate::roster::{self, Recipient};
use crate::survey::SurveyType;

/// Outcome of one recipient's send attempt.
#[derive(Debug)]
enum RowOutcome {
    Sent,
    Failed { email: String, reason: String },
}

/// Per-file tally of one survey type's pass.
#[derive(Debug)]
pub struct FileReport {
    pub survey: SurveyType,
    /// Rows with a resolvable email that were actually attempted.
    pub attempted: usize,
    pub sent: usize,
    /// Rows excluded for lacking a resolvable email (neither success nor
    /// failure).
    pub skipped_no_email: usize,
    pub failures: Vec<String>,
}

impl FileReport {
    fn empty(survey: SurveyType) -> Self {
        Self {
            survey,
            attempted: 0,
            sent: 0,
            skipped_no_email: 0,
            failures: Vec::new(),
        }
    }
}

/// Aggregate result of one dispatch run.
#[derive(Debug, Default)]
pub struct DispatchReport {
    pub files: Vec<FileReport>,
}

impl DispatchReport {
    pub fn total_attempted(&self) -> usize {
        self.files.iter().map(|f| f.attempted).sum()
    }

    pub fn total_sent(&self) -> usize {
        self.files.iter().map(|f| f.sent).sum()
    }

    /// Per-row (and per-file) failure reasons across the whole run.
    pub fn failures(&self) -> impl Iterator<Item = &str> {
        self.files
            .iter()
            .flat_map(|f| f.failures.iter().map(String::as_str))
    }
}

/// The dispatch engine. Stateless between runs; side effects live entirely
/// with the providers.
pub struct Dispatcher {
    settings: Arc<Settings>,
    email: Arc<dyn EmailSender>,
    /// Send-log destination; `None` disables logging even when the config
    /// carries a `[send_log]` section.
    records: Option<Arc<dyn RecordStore>>,
}

impl Dispatcher {
    pub fn new(
        settings: Arc<Settings>,
        email: Arc<dyn EmailSender>,
        records: Option<Arc<dyn RecordStore>>,
    ) -> Self {
        Self {
            settings,
            email,
            records,
        }
    }

    /// Run one dispatch pass. Every row of every eligible file is
    /// attempted to completion; there is no cancellation path.
    pub async fn run(&self, only: Option<SurveyType>) -> DispatchReport {
        let run_id = Uuid::new_v4();
        let mut report = DispatchReport::default();

        for (&survey, survey_cfg) in &self.settings.surveys {
            if only.is_some_and(|t| t != survey) {
                continue;
            }
            // Configured CSV feed but no link template: unconfigured, not an error.
            let Some(link_base) = survey_cfg.link.as_deref() else {
                tracing::warn!(%survey, "no link template configured, skipping");
                continue;
            };
            report
                .files
                .push(self.run_file(run_id, survey, survey_cfg, link_base).await);
        }

        tracing::info!(
            %run_id,
            attempted = report.total_attempted(),
            sent = report.total_sent(),
            failed = report.failures().count(),
            "dispatch run complete"
        );
        report
    }

    /// One survey type's pass: load the roster, fan out sends, collect
    /// settled outcomes.
    async fn run_file(
        &self,
        run_id: Uuid,
        survey: SurveyType,
        survey_cfg: &SurveySettings,
        link_base: &str,
    ) -> FileReport {
        let path = self.settings.data_dir.join(&survey_cfg.csv_file);
        let rows = match roster::load_rows(&path) {
            Ok(rows) => rows,
            Err(e) => {
                tracing::error!(%run_id, %survey, error = %e, "roster load failed");
                let mut report = FileReport::empty(survey);
                report.failures.push(format!("{}: {e}", survey_cfg.csv_file));
                return report;
            }
        };

        let recipients: Vec<Recipient> = rows.iter().filter_map(Recipient::from_row).collect();
        let skipped_no_email = rows.len() - recipients.len();
        if skipped_no_email > 0 {
            tracing::debug!(
                %survey,
                skipped_no_email,
                "rows without a resolvable email excluded"
            );
        }

        let outcomes = join_all(
            recipients
                .iter()
                .map(|r| self.send_one(survey, survey_cfg, link_base, r)),
        )
        .await;

        let mut report = FileReport::empty(survey);
        report.attempted = outcomes.len();
        report.skipped_no_email = skipped_no_email;
        for outcome in outcomes {
            match outcome {
                RowOutcome::Sent => report.sent += 1,
                RowOutcome::Failed { email, reason } => {
                    tracing::warn!(%survey, %email, %reason, "send failed");
                    report.failures.push(format!("{email}: {reason}"));
                }
            }
        }
        tracing::info!(
            %run_id,
            %survey,
            attempted = report.attempted,
            sent = report.sent,
            "file pass complete"
        );
        report
    }

    /// Attempt one invitation. The send decides the outcome; the send-log
    /// write afterwards is best-effort.
    async fn send_one(
        &self,
        survey: SurveyType,
        survey_cfg: &SurveySettings,
        link_base: &str,
        recipient: &Recipient,
    ) -> RowOutcome {
        let link = match link::survey_link(link_base, survey, recipient) {
            Ok(link) => link,
            Err(e) => {
                return RowOutcome::Failed {
                    email: recipient.email.clone(),
                    reason: e.to_string(),
                };
            }
        };

        let email = render_invitation(survey_cfg, recipient, &link);
        if let Err(e) = self.email.send(&email).await {
            return RowOutcome::Failed {
                email: recipient.email.clone(),
                reason: e.to_string(),
            };
        }

        self.log_send(survey, recipient).await;
        RowOutcome::Sent
    }

    /// Best-effort send log; failures are warned and swallowed.
    async fn log_send(&self, survey: SurveyType, recipient: &Recipient) {
        let Some(log_cfg) = &self.settings.send_log else {
            return;
        };
        let Some(records) = &self.records else {
            return;
        };

        let mut fields = serde_json::Map::new();
        fields.insert(
            log_cfg.fields.email.clone(),
            json!({ "value": recipient.email }),
        );
        fields.insert(
            log_cfg.fields.property.clone(),
            json!({ "value": recipient.property }),
        );
        fields.insert(
            log_cfg.fields.survey_type.clone(),
            json!({ "value": survey.tag() }),
        );
        fields.insert(
            log_cfg.fields.sent_at.clone(),
            json!({ "value": chrono::Utc::now().to_rfc3339() }),
        );

        if let Err(e) = records
            .insert(&log_cfg.table_id, serde_json::Value::Object(fields))
            .await
        {
            tracing::warn!(email = %recipient.email, error = %e, "send log write failed");
        }
    }
}

/// Render the invitation email for one recipient.
fn render_invitation(
    survey_cfg: &SurveySettings,
    recipient: &Recipient,
    link: &str,
) -> OutboundEmail {
    let name = if recipient.property.is_empty() {
        "there"
    } else {
        &recipient.property
    };
    let label = &survey_cfg.label;

    let html = format!(
        "<p>Hi {name},</p>\n\
         <p>Please take a moment to complete your <strong>{label}</strong> survey:</p>\n\
         <p><a href=\"{link}\">{link}</a></p>\n\
         <p>Thank you!</p>"
    );
    let text = format!(
        "Hi {name},\n\nPlease take a moment to complete your {label} survey:\n{link}\n\nThank you!"
    );

    OutboundEmail {
        to: recipient.email.clone(),
        subject: format!("Your {label} Survey is Ready"),
        html,
        text,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::config::{SendLogFields, SendLogSettings};
    use crate::error::{EmailError, RecordError};

    /// Records every send; fails addresses listed in `fail`.
    #[derive(Default)]
    struct StubSender {
        sent: Mutex<Vec<OutboundEmail>>,
        fail: Vec<String>,
    }

    #[async_trait]
    impl EmailSender for StubSender {
        async fn send(&self, email: &OutboundEmail) -> Result<(), EmailError> {
            if self.fail.contains(&email.to) {
                return Err(EmailError::SendFailed {
                    to: email.to.clone(),
                    reason: "550 rejected".to_string(),
                });
            }
            self.sent.lock().unwrap().push(email.clone());
            Ok(())
        }
    }

    /// Records every insert; optionally fails all of them.
    #[derive(Default)]
    struct StubStore {
        inserts: Mutex<Vec<(String, serde_json::Value)>>,
        fail: bool,
    }

    #[async_trait]
    impl RecordStore for StubStore {
        async fn insert(
            &self,
            table_id: &str,
            record: serde_json::Value,
        ) -> Result<serde_json::Value, RecordError> {
            if self.fail {
                return Err(RecordError::Rejected {
                    table: table_id.to_string(),
                    detail: "boom".to_string(),
                });
            }
            self.inserts
                .lock()
                .unwrap()
                .push((table_id.to_string(), record));
            Ok(json!({ "metadata": { "createdRecordIds": [1] } }))
        }
    }

    fn survey_cfg(csv_file: &str, link: Option<&str>) -> SurveySettings {
        SurveySettings {
            csv_file: csv_file.to_string(),
            link: link.map(str::to_string),
            label: "30-Day After Start of Service".to_string(),
            table_id: None,
            fields: BTreeMap::new(),
        }
    }

    fn settings_with(
        dir: &std::path::Path,
        surveys: Vec<(SurveyType, SurveySettings)>,
        send_log: Option<SendLogSettings>,
    ) -> Arc<Settings> {
        Arc::new(Settings {
            data_dir: dir.to_path_buf(),
            surveys: surveys.into_iter().collect(),
            send_log,
        })
    }

    fn send_log_cfg() -> SendLogSettings {
        SendLogSettings {
            table_id: "bvbmsends1".to_string(),
            fields: SendLogFields {
                email: "6".to_string(),
                property: "7".to_string(),
                survey_type: "8".to_string(),
                sent_at: "9".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn rows_without_email_count_as_neither_success_nor_failure() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("thirty.csv"),
            "Property Name,Contact Email\nA,a@x.example\nNo Email,\nB,b@x.example\n",
        )
        .unwrap();

        let settings = settings_with(
            dir.path(),
            vec![(
                SurveyType::Thirty,
                survey_cfg("thirty.csv", Some("https://surveys.example.com/t")),
            )],
            None,
        );
        let sender = Arc::new(StubSender::default());
        let dispatcher = Dispatcher::new(settings, sender.clone(), None);

        let report = dispatcher.run(None).await;
        assert_eq!(report.total_attempted(), 2);
        assert_eq!(report.total_sent(), 2);
        assert_eq!(report.failures().count(), 0);
        assert_eq!(report.files[0].skipped_no_email, 1);
        assert_eq!(sender.sent.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn survey_without_link_template_is_skipped_entirely() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("ninety.csv"),
            "Contact Email\na@x.example\n",
        )
        .unwrap();

        let settings = settings_with(
            dir.path(),
            vec![(SurveyType::Ninety, survey_cfg("ninety.csv", None))],
            None,
        );
        let sender = Arc::new(StubSender::default());
        let dispatcher = Dispatcher::new(settings, sender.clone(), None);

        let report = dispatcher.run(None).await;
        assert!(report.files.is_empty());
        assert_eq!(report.total_attempted(), 0);
        assert!(sender.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_csv_file_means_no_recipients() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings_with(
            dir.path(),
            vec![(
                SurveyType::Thirty,
                survey_cfg("absent.csv", Some("https://surveys.example.com/t")),
            )],
            None,
        );
        let sender = Arc::new(StubSender::default());
        let dispatcher = Dispatcher::new(settings, sender.clone(), None);

        let report = dispatcher.run(None).await;
        assert_eq!(report.total_attempted(), 0);
        assert_eq!(report.failures().count(), 0);
    }

    #[tokio::test]
    async fn one_row_failure_never_aborts_siblings() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("thirty.csv"),
            "Contact Email\na@x.example\nbad@x.example\nc@x.example\n",
        )
        .unwrap();

        let settings = settings_with(
            dir.path(),
            vec![(
                SurveyType::Thirty,
                survey_cfg("thirty.csv", Some("https://surveys.example.com/t")),
            )],
            None,
        );
        let sender = Arc::new(StubSender {
            fail: vec!["bad@x.example".to_string()],
            ..Default::default()
        });
        let dispatcher = Dispatcher::new(settings, sender.clone(), None);

        let report = dispatcher.run(None).await;
        assert_eq!(report.total_attempted(), 3);
        assert_eq!(report.total_sent(), 2);
        let failures: Vec<&str> = report.failures().collect();
        assert_eq!(failures.len(), 1);
        assert!(failures[0].starts_with("bad@x.example"));
    }

    #[tokio::test]
    async fn send_log_failure_does_not_downgrade_a_sent_row() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("thirty.csv"),
            "Contact Email,Property Name\na@x.example,Riverbend\n",
        )
        .unwrap();

        let settings = settings_with(
            dir.path(),
            vec![(
                SurveyType::Thirty,
                survey_cfg("thirty.csv", Some("https://surveys.example.com/t")),
            )],
            Some(send_log_cfg()),
        );
        let sender = Arc::new(StubSender::default());
        let store = Arc::new(StubStore {
            fail: true,
            ..Default::default()
        });
        let dispatcher = Dispatcher::new(settings, sender.clone(), Some(store));

        let report = dispatcher.run(None).await;
        assert_eq!(report.total_sent(), 1);
        assert_eq!(report.failures().count(), 0);
    }

    #[tokio::test]
    async fn successful_send_writes_the_send_log() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("thirty.csv"),
            "Contact Email,Property Name\na@x.example,Riverbend\n",
        )
        .unwrap();

        let settings = settings_with(
            dir.path(),
            vec![(
                SurveyType::Thirty,
                survey_cfg("thirty.csv", Some("https://surveys.example.com/t")),
            )],
            Some(send_log_cfg()),
        );
        let sender = Arc::new(StubSender::default());
        let store = Arc::new(StubStore::default());
        let dispatcher = Dispatcher::new(settings, sender, Some(store.clone()));

        dispatcher.run(None).await;
        let inserts = store.inserts.lock().unwrap();
        assert_eq!(inserts.len(), 1);
        let (table, record) = &inserts[0];
        assert_eq!(table, "bvbmsends1");
        assert_eq!(record["6"]["value"], json!("a@x.example"));
        assert_eq!(record["8"]["value"], json!("Thirty"));
    }

    #[tokio::test]
    async fn filter_restricts_the_run_to_one_survey_type() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("thirty.csv"), "Contact Email\na@x.example\n").unwrap();
        std::fs::write(dir.path().join("ninety.csv"), "Contact Email\nb@x.example\n").unwrap();

        let settings = settings_with(
            dir.path(),
            vec![
                (
                    SurveyType::Thirty,
                    survey_cfg("thirty.csv", Some("https://surveys.example.com/t")),
                ),
                (
                    SurveyType::Ninety,
                    survey_cfg("ninety.csv", Some("https://surveys.example.com/n")),
                ),
            ],
            None,
        );
        let sender = Arc::new(StubSender::default());
        let dispatcher = Dispatcher::new(settings, sender.clone(), None);

        let report = dispatcher.run(Some(SurveyType::Ninety)).await;
        assert_eq!(report.files.len(), 1);
        assert_eq!(report.files[0].survey, SurveyType::Ninety);
        let sent = sender.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "b@x.example");
    }

    #[tokio::test]
    async fn unreadable_csv_is_a_file_level_failure_not_a_run_abort() {
        let dir = tempfile::tempdir().unwrap();
        // Not valid UTF-8, so the roster read fails for this file only.
        std::fs::write(dir.path().join("thirty.csv"), [0xff, 0xfe, 0x00]).unwrap();
        std::fs::write(dir.path().join("ninety.csv"), "Contact Email\nb@x.example\n").unwrap();

        let settings = settings_with(
            dir.path(),
            vec![
                (
                    SurveyType::Thirty,
                    survey_cfg("thirty.csv", Some("https://surveys.example.com/t")),
                ),
                (
                    SurveyType::Ninety,
                    survey_cfg("ninety.csv", Some("https://surveys.example.com/n")),
                ),
            ],
            None,
        );
        let sender = Arc::new(StubSender::default());
        let dispatcher = Dispatcher::new(settings, sender.clone(), None);

        let report = dispatcher.run(None).await;
        assert_eq!(report.failures().count(), 1);
        assert_eq!(report.total_sent(), 1);
        assert_eq!(sender.sent.lock().unwrap().len(), 1);
    }

    #[test]
    fn invitation_contains_link_and_label() {
        let recipient = Recipient {
            email: "a@x.example".to_string(),
            property: "Riverbend".to_string(),
            record_id: None,
            account_managers: None,
            relationship_managers: None,
            district_managers: None,
        };
        let email = render_invitation(
            &survey_cfg("thirty.csv", None),
            &recipient,
            "https://surveys.example.com/t?x=1",
        );
        assert_eq!(email.subject, "Your 30-Day After Start of Service Survey is Ready");
        assert!(email.html.contains("https://surveys.example.com/t?x=1"));
        assert!(email.html.contains("Hi Riverbend,"));
        assert!(email.text.contains("https://surveys.example.com/t?x=1"));
    }
}

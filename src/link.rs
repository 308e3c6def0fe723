//! Invitation link construction.
//!
//! Pure function of (survey type, recipient), no network call. The query
//! parameters round-trip through the hosted form back into the submission
//! payload's `meta` block, so the record service sees the same identifiers
//! the dispatch run started from.

use reqwest::Url;

use crate::error::ConfigError;
use crate::roster::Recipient;
use crate::survey::SurveyType;

/// Build the prefilled survey link for one recipient.
///
/// `property`, `email`, and `surveyType` are always appended; `recordId`
/// and the manager lists (`am`, `rm`, `dm`) only when present.
pub fn survey_link(
    base: &str,
    survey: SurveyType,
    recipient: &Recipient,
) -> Result<String, ConfigError> {
    let mut url = Url::parse(base).map_err(|e| ConfigError::InvalidValue {
        key: "link".to_string(),
        message: format!("{base}: {e}"),
    })?;

    {
        let mut query = url.query_pairs_mut();
        query.append_pair("property", &recipient.property);
        query.append_pair("email", &recipient.email);
        query.append_pair("surveyType", survey.tag());
        if let Some(record_id) = &recipient.record_id {
            query.append_pair("recordId", record_id);
        }
        if let Some(am) = &recipient.account_managers {
            query.append_pair("am", am);
        }
        if let Some(rm) = &recipient.relationship_managers {
            query.append_pair("rm", rm);
        }
        if let Some(dm) = &recipient.district_managers {
            query.append_pair("dm", dm);
        }
    }

    Ok(url.to_string())
}

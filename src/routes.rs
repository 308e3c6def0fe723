//! HTTP surface: dispatch trigger, submission intake, diagnostics.
//!
//! Both mutating endpoints are POST-only; axum's method router answers
//! anything else with a 405 and an `Allow: POST` header before any
//! downstream call happens. Malformed caller input is rejected with a 400
//! the same way; downstream providers are only reached once the input is
//! valid.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::config::Settings;
use crate::dispatch::Dispatcher;
use crate::error::ConfigError;
use crate::providers::{EmailSender, RecordStore};
use crate::submit::{self, Submission};
use crate::survey::SurveyType;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    /// Delivery provider; `None` when the SendGrid env vars are absent.
    pub email: Option<Arc<dyn EmailSender>>,
    /// Record service; `None` when the Quickbase env vars are absent.
    pub records: Option<Arc<dyn RecordStore>>,
}

/// Build the axum router. CORS is permissive because the hosted forms are
/// served from a different origin than this API.
pub fn app_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/surveys/dispatch", post(dispatch_surveys))
        .route("/api/surveys/submit", post(submit_survey))
        .route("/api/data/status", get(data_status))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "survey-relay",
    }))
}

// ── Dispatch ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct DispatchParams {
    /// Optional filter restricting the run to one survey type.
    #[serde(rename = "type")]
    survey_type: Option<String>,
}

/// POST /api/surveys/dispatch?type=Ninety
///
/// Runs one dispatch pass and reports the send count plus any per-row
/// failure reasons.
async fn dispatch_surveys(
    State(state): State<AppState>,
    Query(params): Query<DispatchParams>,
) -> Response {
    let only = match params.survey_type.as_deref() {
        Some(raw) => match SurveyType::parse(raw) {
            Some(survey) => Some(survey),
            None => return bad_request(&format!("Unknown survey type: {raw}")),
        },
        None => None,
    };

    let Some(email) = state.email.clone() else {
        return missing_config("SENDGRID_API_KEY / SENDGRID_FROM_ADDRESS");
    };

    let dispatcher = Dispatcher::new(Arc::clone(&state.settings), email, state.records.clone());
    let report = dispatcher.run(only).await;
    let failures: Vec<&str> = report.failures().collect();

    (
        StatusCode::OK,
        Json(json!({
            "status": "Emails sent",
            "count": report.total_sent(),
            "attempted": report.total_attempted(),
            "failures": failures,
        })),
    )
        .into_response()
}

// ── Submission ──────────────────────────────────────────────────────────

/// POST /api/surveys/submit
///
/// Translates the answer set through the survey's field map and creates
/// one record in its table. No retry; the record service's verdict is the
/// caller's verdict.
async fn submit_survey(State(state): State<AppState>, Json(payload): Json<Submission>) -> Response {
    let Some(raw_type) = payload.survey_type.as_deref() else {
        return bad_request("Missing form data or survey type");
    };
    let Some(form) = payload.form.as_ref() else {
        return bad_request("Missing form data or survey type");
    };
    let Some(survey) = SurveyType::parse(raw_type) else {
        return bad_request(&format!("Invalid survey type: {raw_type}"));
    };
    let Some(survey_cfg) = state.settings.surveys.get(&survey) else {
        return bad_request(&format!("Invalid survey type: {raw_type}"));
    };
    let Some(table_id) = survey_cfg.table_id.as_deref() else {
        return bad_request(&format!("Invalid survey type: {raw_type}"));
    };
    if survey_cfg.fields.is_empty() {
        return bad_request(&format!("Invalid survey type: {raw_type}"));
    }

    if let Some(meta) = &payload.meta {
        tracing::debug!(%survey, ?meta, "submission meta");
    }

    let Some(records) = state.records.clone() else {
        return missing_config("QUICKBASE_TOKEN / QUICKBASE_REALM");
    };

    let record = submit::to_record_fields(form, &survey_cfg.fields);
    match records.insert(table_id, record).await {
        Ok(result) => (
            StatusCode::OK,
            Json(json!({ "status": "Success", "result": result })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(%survey, error = %e, "record service submission failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Record service submission failed",
                    "detail": e.to_string(),
                })),
            )
                .into_response()
        }
    }
}

// ── Diagnostics ─────────────────────────────────────────────────────────

/// GET /api/data/status
///
/// Reports what the CSV data directory currently holds.
async fn data_status(State(state): State<AppState>) -> impl IntoResponse {
    let data_dir = &state.settings.data_dir;

    let dir_list: Vec<String> = std::fs::read_dir(data_dir)
        .map(|entries| {
            entries
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();

    let surveys: serde_json::Map<String, serde_json::Value> = state
        .settings
        .surveys
        .iter()
        .map(|(survey, survey_cfg)| {
            let meta = std::fs::metadata(data_dir.join(&survey_cfg.csv_file)).ok();
            (
                survey.tag().to_string(),
                json!({
                    "file": survey_cfg.csv_file,
                    "exists": meta.is_some(),
                    "size": meta.map(|m| m.len()).unwrap_or(0),
                }),
            )
        })
        .collect();

    Json(json!({
        "dataDir": data_dir.display().to_string(),
        "dirList": dir_list,
        "surveys": surveys,
    }))
}

// ── Helpers ─────────────────────────────────────────────────────────────

fn bad_request(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}

fn missing_config(vars: &str) -> Response {
    let err = ConfigError::MissingEnvVar(vars.to_string());
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": "Missing configuration",
            "detail": err.to_string(),
        })),
    )
        .into_response()
}

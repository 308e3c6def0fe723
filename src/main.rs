use std::sync::Arc;

use survey_relay::config::Settings;
use survey_relay::providers::{
    EmailSender, QuickbaseClient, QuickbaseConfig, RecordStore, SendGridClient, SendGridConfig,
};
use survey_relay::routes::{AppState, app_routes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let settings = match Settings::from_env_path() {
        Ok(settings) => Arc::new(settings),
        Err(e) => {
            eprintln!("Error: failed to load survey config: {e}");
            eprintln!("  set SURVEY_CONFIG or provide ./survey.toml");
            std::process::exit(1);
        }
    };

    let port: u16 = std::env::var("SURVEY_RELAY_PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse()
        .unwrap_or(8080);

    eprintln!("📋 Survey Relay v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Data dir: {}", settings.data_dir.display());
    eprintln!(
        "   Surveys: {}",
        settings
            .surveys
            .keys()
            .map(|survey| survey.tag())
            .collect::<Vec<_>>()
            .join(", ")
    );
    eprintln!("   Dispatch: POST http://0.0.0.0:{port}/api/surveys/dispatch");
    eprintln!("   Submit:   POST http://0.0.0.0:{port}/api/surveys/submit\n");

    // Conditionally enable the delivery provider
    let email: Option<Arc<dyn EmailSender>> = match SendGridConfig::from_env() {
        Some(config) => {
            eprintln!("   Email: enabled (from: {})", config.from_address);
            Some(Arc::new(SendGridClient::new(config)))
        }
        None => {
            eprintln!("   Email: disabled (SENDGRID_API_KEY / SENDGRID_FROM_ADDRESS not set)");
            None
        }
    };

    // Conditionally enable the record service
    let records: Option<Arc<dyn RecordStore>> = match QuickbaseConfig::from_env() {
        Some(config) => {
            eprintln!("   Records: enabled (realm: {})", config.realm);
            Some(Arc::new(QuickbaseClient::new(config)))
        }
        None => {
            eprintln!("   Records: disabled (QUICKBASE_TOKEN / QUICKBASE_REALM not set)");
            None
        }
    };

    if settings.send_log.is_some() && records.is_none() {
        tracing::warn!("send_log configured but record service disabled; sends will not be logged");
    }

    let state = AppState {
        settings,
        email,
        records,
    };

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    tracing::info!(port, "survey relay listening");
    axum::serve(listener, app_routes(state)).await?;

    Ok(())
}

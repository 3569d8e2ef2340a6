// File: crates/clinicbot_gcal/src/auth.rs
use clinicbot_config::GcalConfig;
use google_calendar3::{
    hyper_rustls::{self, HttpsConnectorBuilder},
    hyper_util::client::legacy::connect::HttpConnector,
    hyper_util::client::legacy::Client,
    yup_oauth2::{read_service_account_key, ServiceAccountAuthenticator},
    CalendarHub,
};
use std::{error::Error, path::Path};
use tracing::info;

type Connector = hyper_rustls::HttpsConnector<HttpConnector>;

pub type HubType = CalendarHub<Connector>;

/// Path of the service account key, or an error naming the missing setting.
pub fn key_path(config: &GcalConfig) -> Result<&str, Box<dyn Error + Send + Sync>> {
    config
        .key_path
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| "Missing gcal.key_path (or GOOGLE_CREDENTIALS_FILE)".into())
}

/// Builds an authenticated calendar hub from a service account key file.
pub async fn create_calendar_hub(
    config: &GcalConfig,
) -> Result<HubType, Box<dyn Error + Send + Sync>> {
    let key_path = key_path(config)?;

    let sa_key = read_service_account_key(Path::new(key_path)).await?;
    info!(client_email = %sa_key.client_email, "using service account");

    let auth = ServiceAccountAuthenticator::builder(sa_key).build().await?;

    let https = HttpsConnectorBuilder::new()
        .with_native_roots()?
        .https_or_http()
        .enable_http1()
        .build();

    let client = Client::builder(hyper_util::rt::TokioExecutor::new()).build(https);

    Ok(CalendarHub::new(client, auth))
}

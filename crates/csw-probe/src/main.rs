//! CSW catalog probe
//!
//! Resolves the catalog configuration from the environment, logs in, checks
//! the session and logs out again. Prints a JSON report on stdout.

use anyhow::Context;
use chrono::{DateTime, Utc};
use csw_session::{CatalogConfig, SessionManager};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct ProbeReport {
    endpoint: String,
    csw_endpoint: String,
    parent_identifier: Option<String>,
    valid_after_login: bool,
    expires_at: DateTime<Utc>,
    cookies: Vec<CookieSummary>,
    valid_after_logout: bool,
}

/// Cookie metadata without the session value
#[derive(Debug, Serialize)]
struct CookieSummary {
    name: String,
    domain: String,
    path: String,
    expires: Option<DateTime<Utc>>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    csw_session::init_logging();

    let config = CatalogConfig::from_env()
        .context("set CSW_ENDPOINT_URL, CSW_ENDPOINT_USER and CSW_ENDPOINT_PASS")?;
    let session = SessionManager::new(&config).context("failed to create catalog session")?;

    tracing::info!(endpoint = %session.endpoints().base, "Probing catalog session");

    session.login().await.context("catalog login failed")?;
    let valid_after_login = session.is_valid().await;
    let expires_at = session.expires_at().await;
    let cookies = session
        .cookie_jar()
        .into_iter()
        .map(|c| CookieSummary {
            name: c.name,
            domain: c.domain,
            path: c.path,
            expires: c.expires,
        })
        .collect();

    if !valid_after_login {
        tracing::warn!("Catalog accepted the login but set no session cookie");
    }

    session.logout().await.context("catalog logout failed")?;

    let report = ProbeReport {
        endpoint: session.endpoints().base.clone(),
        csw_endpoint: session.csw_endpoint().to_string(),
        parent_identifier: session.parent_identifier().map(str::to_string),
        valid_after_login,
        expires_at,
        cookies,
        valid_after_logout: session.is_valid().await,
    };

    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}

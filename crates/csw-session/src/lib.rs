//! CSW Catalog Session
//!
//! Authenticated session lifecycle against a GeoNetwork-style catalog:
//! - Form login yields session cookies held in a client-owned jar
//! - A self-imposed one hour deadline marks the session stale,
//!   independent of whatever expiry the server puts on its cookies
//! - Login, logout and validity checks are serialized per manager

mod clock;
mod config;
mod cookie;
mod error;
mod manager;
mod transport;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CatalogConfig, CatalogEndpoints};
pub use cookie::{Cookie, CookieJar};
pub use error::{SessionError, TransportError};
pub use manager::{SessionManager, SELF_EXPIRY};
pub use transport::{HttpMethod, HttpRequest, HttpResponse, ReqwestTransport, Transport};

pub type Result<T> = std::result::Result<T, SessionError>;

/// Initialize logging
pub fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt().with_env_filter(filter).with_target(true).init();
}

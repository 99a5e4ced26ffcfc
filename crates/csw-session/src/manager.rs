//! Session Manager
//!
//! Owns the cookie jar and the self-expiry deadline for one catalog
//! endpoint and credential pair. `login`, `logout`, `is_valid` and
//! `ensure_session` run one at a time; the lock is held across the network
//! round trip so no caller sees a jar in the middle of being rebuilt.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use url::Url;

use crate::clock::{Clock, SystemClock};
use crate::config::{CatalogConfig, CatalogEndpoints};
use crate::cookie::{Cookie, CookieJar};
use crate::error::{SessionError, TransportError};
use crate::transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};
use crate::Result;

/// How long a login is trusted, whatever the server says about its cookies
pub const SELF_EXPIRY: Duration = Duration::hours(1);

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=UTF-8";

pub struct SessionManager {
    endpoints: CatalogEndpoints,
    username: String,
    password: String,
    parent_identifier: Option<String>,
    /// Session cookies; internally locked, readable without `self_expire_at`
    cookies: Arc<CookieJar>,
    /// Self-imposed validity deadline. Its mutex serializes the session
    /// operations.
    self_expire_at: Arc<Mutex<DateTime<Utc>>>,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
}

impl SessionManager {
    /// Build a manager talking to the catalog over HTTP
    pub fn new(config: &CatalogConfig) -> Result<Self> {
        config.validate()?;
        let transport = ReqwestTransport::new(config.timeout)?;
        Self::with_transport(config, Arc::new(transport), Arc::new(SystemClock))
    }

    pub fn with_transport(
        config: &CatalogConfig,
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;

        let endpoints = config.endpoints();
        // Starts out expired
        let now = clock.now();

        tracing::debug!(
            endpoint = %endpoints.base,
            user = %config.username,
            "Created catalog session manager"
        );

        Ok(Self {
            endpoints,
            username: config.username.clone(),
            password: config.password.clone(),
            parent_identifier: config.parent_identifier.clone(),
            cookies: Arc::new(CookieJar::new()),
            self_expire_at: Arc::new(Mutex::new(now)),
            transport,
            clock,
        })
    }

    /// Authenticate against the login endpoint.
    ///
    /// Cookies set by the server land in the jar and the session is trusted
    /// for [`SELF_EXPIRY`]. A 4xx/5xx answer is a rejection: the jar is
    /// emptied and the deadline stays where it was.
    pub async fn login(&self) -> Result<()> {
        let mut expire_at = self.self_expire_at.lock().await;
        self.login_locked(&mut expire_at).await
    }

    /// Tell the server to drop the session, then empty the jar.
    ///
    /// The jar is emptied even if the request fails; the failure is still
    /// returned.
    pub async fn logout(&self) -> Result<()> {
        let _guard = self.self_expire_at.lock().await;

        let result = self.execute(HttpRequest::get(&self.endpoints.logout)).await;
        self.cookies.clear();
        let response = result?;

        if response.is_success() {
            tracing::debug!(body = %response.body, "Logout response");
        } else {
            tracing::warn!(
                status = response.status,
                body = %response.body,
                "Catalog logout returned non-success status"
            );
        }

        tracing::info!(endpoint = %self.endpoints.base, "Logged out of catalog");

        Ok(())
    }

    /// Whether the current cookies can be used for catalog requests.
    ///
    /// Once the self-expiry deadline has passed the jar is emptied and
    /// `false` is returned. The server is not contacted.
    pub async fn is_valid(&self) -> bool {
        let expire_at = self.self_expire_at.lock().await;
        self.is_valid_locked(&expire_at)
    }

    /// Log in unless the current session is still valid
    pub async fn ensure_session(&self) -> Result<()> {
        let mut expire_at = self.self_expire_at.lock().await;
        if self.is_valid_locked(&expire_at) {
            return Ok(());
        }
        self.login_locked(&mut expire_at).await
    }

    /// Drop all cookies without contacting the server
    pub fn clear_cookie_jar(&self) {
        self.cookies.clear();
        tracing::debug!(endpoint = %self.endpoints.base, "Cleared catalog cookie jar");
    }

    /// Snapshot of the jar. Stale after the next login, logout or clear.
    pub fn cookie_jar(&self) -> Vec<Cookie> {
        self.cookies.cookies()
    }

    /// `Cookie` header value to attach to an authenticated catalog request
    pub fn cookie_header_for(&self, url: &str) -> Result<Option<String>> {
        let url = Url::parse(url).map_err(TransportError::from)?;
        Ok(self.cookies.header_for(&url, self.clock.now()))
    }

    pub fn endpoints(&self) -> &CatalogEndpoints {
        &self.endpoints
    }

    pub fn csw_endpoint(&self) -> &str {
        &self.endpoints.csw
    }

    pub fn parent_identifier(&self) -> Option<&str> {
        self.parent_identifier.as_deref()
    }

    /// Current self-expiry deadline
    pub async fn expires_at(&self) -> DateTime<Utc> {
        *self.self_expire_at.lock().await
    }

    async fn login_locked(&self, expire_at: &mut DateTime<Utc>) -> Result<()> {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("username", &self.username)
            .append_pair("password", &self.password)
            .finish();

        let request = HttpRequest::post(&self.endpoints.login, body)
            .with_header("Content-Type", FORM_CONTENT_TYPE);

        let response = self.execute(request).await?;
        tracing::debug!(status = response.status, body = %response.body, "Login response");

        if response.is_error() {
            self.cookies.clear();
            tracing::warn!(
                endpoint = %self.endpoints.base,
                user = %self.username,
                status = response.status,
                "Catalog rejected login"
            );
            return Err(SessionError::Rejected {
                status: response.status,
            });
        }

        let deadline = self.clock.now() + SELF_EXPIRY;
        if deadline > *expire_at {
            *expire_at = deadline;
        }

        tracing::info!(
            endpoint = %self.endpoints.base,
            user = %self.username,
            cookies = self.cookies.len(),
            expires_at = %expire_at,
            "Logged in to catalog"
        );

        Ok(())
    }

    fn is_valid_locked(&self, expire_at: &DateTime<Utc>) -> bool {
        if self.clock.now() >= *expire_at {
            if !self.cookies.is_empty() {
                tracing::info!(
                    endpoint = %self.endpoints.base,
                    expired_at = %expire_at,
                    "Catalog session self-expired, dropping cookies"
                );
            }
            self.cookies.clear();
            return false;
        }

        !self.cookies.is_empty()
    }

    /// Send a request carrying the jar's cookies and absorb any it sets.
    /// Cookies on a 4xx/5xx answer are dropped.
    async fn execute(&self, mut request: HttpRequest) -> Result<HttpResponse> {
        let url = Url::parse(&request.url).map_err(TransportError::from)?;

        if let Some(header) = self.cookies.header_for(&url, self.clock.now()) {
            request = request.with_header("Cookie", header);
        }

        tracing::debug!(method = request.method.as_str(), url = %url, "Catalog request");

        let response = self.transport.execute(request).await?;
        if !response.is_error() {
            self.cookies
                .store_response_cookies(&response.set_cookies, &url, self.clock.now());
        }

        Ok(response)
    }
}

impl Clone for SessionManager {
    fn clone(&self) -> Self {
        Self {
            endpoints: self.endpoints.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            parent_identifier: self.parent_identifier.clone(),
            cookies: Arc::clone(&self.cookies),
            self_expire_at: Arc::clone(&self.self_expire_at),
            transport: Arc::clone(&self.transport),
            clock: Arc::clone(&self.clock),
        }
    }
}

//! Session cookies
//!
//! The jar is the only carrier of session identity: the catalog answers a
//! successful login with `Set-Cookie` headers and expects them back on every
//! later request.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    /// Lower-cased, without a leading dot
    pub domain: String,
    /// Only sent to this exact host when no `Domain` attribute was given
    pub host_only: bool,
    pub path: String,
    /// Expiry declared by the server, if any. Session cookies have none.
    pub expires: Option<DateTime<Utc>>,
    pub secure: bool,
    pub http_only: bool,
}

impl Cookie {
    /// Parse one `Set-Cookie` header value received from `url`.
    ///
    /// Returns `None` for malformed headers and for cookies whose `Domain`
    /// does not cover the responding host.
    pub fn parse(header: &str, url: &Url, now: DateTime<Utc>) -> Option<Self> {
        let host = url.host_str()?.to_ascii_lowercase();
        let mut parts = header.split(';');

        let (name, value) = parts.next()?.split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }

        let mut cookie = Cookie {
            name: name.to_string(),
            value: value.trim().trim_matches('"').to_string(),
            domain: host.clone(),
            host_only: true,
            path: default_path(url),
            expires: None,
            secure: false,
            http_only: false,
        };

        let mut max_age: Option<i64> = None;

        for attr in parts {
            let (key, val) = match attr.split_once('=') {
                Some((k, v)) => (k.trim(), v.trim()),
                None => (attr.trim(), ""),
            };

            match key.to_ascii_lowercase().as_str() {
                "domain" if !val.is_empty() => {
                    let domain = val.trim_start_matches('.').to_ascii_lowercase();
                    if !domain.contains('.') {
                        // A dotless domain is only acceptable as the host itself
                        if domain != host {
                            return None;
                        }
                        continue;
                    }
                    if !domain_matches(&host, &domain) {
                        return None;
                    }
                    cookie.domain = domain;
                    cookie.host_only = false;
                }
                "path" if val.starts_with('/') => cookie.path = val.to_string(),
                "expires" => cookie.expires = parse_http_date(val),
                "max-age" => max_age = val.parse().ok(),
                "secure" => cookie.secure = true,
                "httponly" => cookie.http_only = true,
                _ => {}
            }
        }

        // Max-Age wins over Expires; out-of-range values are capped
        if let Some(secs) = max_age {
            cookie.expires = Some(if secs <= 0 {
                DateTime::<Utc>::MIN_UTC
            } else {
                Duration::try_seconds(secs)
                    .and_then(|ttl| now.checked_add_signed(ttl))
                    .unwrap_or(DateTime::<Utc>::MAX_UTC)
            });
        }

        Some(cookie)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires.is_some_and(|at| at <= now)
    }

    /// Whether this cookie should accompany a request to `url`
    pub fn matches(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        let host = host.to_ascii_lowercase();

        let host_ok = if self.host_only {
            host == self.domain
        } else {
            domain_matches(&host, &self.domain)
        };

        host_ok && path_matches(url.path(), &self.path) && (!self.secure || url.scheme() == "https")
    }

    fn same_slot(&self, other: &Cookie) -> bool {
        self.name == other.name && self.domain == other.domain && self.path == other.path
    }
}

/// Thread-safe cookie store.
///
/// Every operation takes the inner lock for its whole duration, so readers
/// never see a half-applied update.
#[derive(Debug, Default)]
pub struct CookieJar {
    cookies: RwLock<Vec<Cookie>>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a cookie. An already-expired cookie deletes its slot.
    pub fn store(&self, cookie: Cookie, now: DateTime<Utc>) {
        insert(&mut self.cookies.write(), cookie, now);
    }

    /// Apply the `Set-Cookie` headers of a response from `url`.
    /// Returns the number of headers that parsed.
    pub fn store_response_cookies(
        &self,
        headers: &[String],
        url: &Url,
        now: DateTime<Utc>,
    ) -> usize {
        let parsed: Vec<Cookie> = headers
            .iter()
            .filter_map(|h| {
                let cookie = Cookie::parse(h, url, now);
                if cookie.is_none() {
                    tracing::debug!(url = %url, "Ignoring unusable Set-Cookie header");
                }
                cookie
            })
            .collect();

        let count = parsed.len();
        let mut cookies = self.cookies.write();
        for cookie in parsed {
            insert(&mut cookies, cookie, now);
        }
        count
    }

    /// `Cookie` header value for a request to `url`, skipping expired cookies
    pub fn header_for(&self, url: &Url, now: DateTime<Utc>) -> Option<String> {
        let cookies = self.cookies.read();
        let mut matching: Vec<&Cookie> = cookies
            .iter()
            .filter(|c| !c.is_expired(now) && c.matches(url))
            .collect();

        if matching.is_empty() {
            return None;
        }

        // Longer paths first
        matching.sort_by(|a, b| b.path.len().cmp(&a.path.len()));

        Some(
            matching
                .iter()
                .map(|c| format!("{}={}", c.name, c.value))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    /// Snapshot of the current contents
    pub fn cookies(&self) -> Vec<Cookie> {
        self.cookies.read().clone()
    }

    pub fn clear(&self) {
        self.cookies.write().clear();
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.read().is_empty()
    }

    pub fn len(&self) -> usize {
        self.cookies.read().len()
    }
}

fn insert(cookies: &mut Vec<Cookie>, cookie: Cookie, now: DateTime<Utc>) {
    cookies.retain(|c| !c.same_slot(&cookie));
    if !cookie.is_expired(now) {
        cookies.push(cookie);
    }
}

fn domain_matches(host: &str, domain: &str) -> bool {
    host == domain
        || (host.len() > domain.len()
            && host.ends_with(domain)
            && host.as_bytes()[host.len() - domain.len() - 1] == b'.')
}

fn path_matches(request_path: &str, cookie_path: &str) -> bool {
    if request_path == cookie_path {
        return true;
    }
    request_path.starts_with(cookie_path)
        && (cookie_path.ends_with('/') || request_path[cookie_path.len()..].starts_with('/'))
}

/// Directory of the request path, per RFC 6265 section 5.1.4
fn default_path(url: &Url) -> String {
    let path = url.path();
    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => path[..idx].to_string(),
    }
}

fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.with_timezone(&Utc));
    }

    // Netscape style: "Wed, 21-Oct-2015 07:28:00 GMT"
    NaiveDateTime::parse_from_str(value, "%a, %d-%b-%Y %H:%M:%S GMT")
        .ok()
        .map(|naive| naive.and_utc())
}

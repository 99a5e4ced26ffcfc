//! Catalog configuration
//!
//! Resolved once by the application entry point and handed to each
//! `SessionManager`. The source is a flat string-keyed mapping; the
//! environment is one such mapping.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use crate::error::SessionError;
use crate::Result;

pub const ENDPOINT_URL_KEY: &str = "csw.endpoint.url";
pub const ENDPOINT_USER_KEY: &str = "csw.endpoint.user";
pub const ENDPOINT_PASS_KEY: &str = "csw.endpoint.pass";
pub const TIMEOUT_KEY: &str = "csw.endpoint.timeout_secs";
pub const PARENT_IDENTIFIER_KEY: &str = "csw.identifier.parent";

const CSW_SUFFIX: &str = "/srv/eng/csw";
const LOGIN_SUFFIX: &str = "/srv/eng/xml.user.login";
const LOGOUT_SUFFIX: &str = "/srv/eng/xml.user.logout";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct CatalogConfig {
    /// Catalog base URL, e.g. `http://host/geonetwork`
    pub endpoint: String,
    pub username: String,
    pub password: String,
    /// Transport timeout applied to every request
    pub timeout: Duration,
    /// Identifier of the parent record catalog collaborators attach to
    pub parent_identifier: Option<String>,
}

impl CatalogConfig {
    pub fn new(
        endpoint: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            username: username.into(),
            password: password.into(),
            timeout: DEFAULT_TIMEOUT,
            parent_identifier: None,
        }
    }

    /// Resolve from a flat property mapping
    pub fn from_properties(props: &HashMap<String, String>) -> Result<Self> {
        let required = |key: &str| {
            props
                .get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .ok_or_else(|| SessionError::Configuration(format!("{key} is not set")))
        };

        let mut config = Self::new(
            required(ENDPOINT_URL_KEY)?,
            required(ENDPOINT_USER_KEY)?,
            required(ENDPOINT_PASS_KEY)?,
        );

        if let Some(raw) = props.get(TIMEOUT_KEY) {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                SessionError::Configuration(format!("{TIMEOUT_KEY} is not a number: {raw}"))
            })?;
            if secs == 0 {
                return Err(SessionError::Configuration(format!(
                    "{TIMEOUT_KEY} must be greater than zero"
                )));
            }
            config.timeout = Duration::from_secs(secs);
        }

        config.parent_identifier = props
            .get(PARENT_IDENTIFIER_KEY)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        Ok(config)
    }

    /// Resolve from environment variables (`csw.endpoint.url` -> `CSW_ENDPOINT_URL`)
    pub fn from_env() -> Result<Self> {
        let props: HashMap<String, String> = [
            ENDPOINT_URL_KEY,
            ENDPOINT_USER_KEY,
            ENDPOINT_PASS_KEY,
            TIMEOUT_KEY,
            PARENT_IDENTIFIER_KEY,
        ]
        .iter()
        .filter_map(|key| {
            std::env::var(env_var_name(key))
                .ok()
                .map(|value| (key.to_string(), value))
        })
        .collect();

        Self::from_properties(&props)
    }

    pub fn validate(&self) -> Result<()> {
        for (key, value) in [
            (ENDPOINT_URL_KEY, &self.endpoint),
            (ENDPOINT_USER_KEY, &self.username),
            (ENDPOINT_PASS_KEY, &self.password),
        ] {
            if value.trim().is_empty() {
                return Err(SessionError::Configuration(format!(
                    "{key} is not set; the catalog endpoint, user and password are all required"
                )));
            }
        }
        Ok(())
    }

    pub fn endpoints(&self) -> CatalogEndpoints {
        CatalogEndpoints::derive(&self.endpoint)
    }
}

impl fmt::Debug for CatalogConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CatalogConfig")
            .field("endpoint", &self.endpoint)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("timeout", &self.timeout)
            .field("parent_identifier", &self.parent_identifier)
            .finish()
    }
}

/// URLs derived from the catalog base by fixed suffixes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEndpoints {
    pub base: String,
    pub csw: String,
    pub login: String,
    pub logout: String,
}

impl CatalogEndpoints {
    pub fn derive(endpoint: &str) -> Self {
        let base = endpoint.trim().trim_end_matches('/').to_string();

        Self {
            csw: format!("{base}{CSW_SUFFIX}"),
            login: format!("{base}{LOGIN_SUFFIX}"),
            logout: format!("{base}{LOGOUT_SUFFIX}"),
            base,
        }
    }
}

fn env_var_name(key: &str) -> String {
    key.replace('.', "_").to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn complete() -> HashMap<String, String> {
        props(&[
            (ENDPOINT_URL_KEY, "http://cat.example.org/geonetwork"),
            (ENDPOINT_USER_KEY, "admin"),
            (ENDPOINT_PASS_KEY, "secret"),
        ])
    }

    #[test]
    fn test_from_properties() {
        let config = CatalogConfig::from_properties(&complete()).unwrap();
        assert_eq!(config.endpoint, "http://cat.example.org/geonetwork");
        assert_eq!(config.username, "admin");
        assert_eq!(config.password, "secret");
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert!(config.parent_identifier.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_or_empty_values() {
        for key in [ENDPOINT_URL_KEY, ENDPOINT_USER_KEY, ENDPOINT_PASS_KEY] {
            let mut missing = complete();
            missing.remove(key);
            let err = CatalogConfig::from_properties(&missing).unwrap_err();
            assert!(matches!(err, SessionError::Configuration(ref msg) if msg.contains(key)));

            let mut blank = complete();
            blank.insert(key.to_string(), "   ".to_string());
            assert!(matches!(
                CatalogConfig::from_properties(&blank),
                Err(SessionError::Configuration(_))
            ));
        }
    }

    #[test]
    fn test_validate_hand_built() {
        assert!(CatalogConfig::new("http://x", "u", "p").validate().is_ok());
        assert!(CatalogConfig::new("", "u", "p").validate().is_err());
        assert!(CatalogConfig::new("http://x", "", "p").validate().is_err());
        assert!(CatalogConfig::new("http://x", "u", "").validate().is_err());
    }

    #[test]
    fn test_optional_values() {
        let mut with_extras = complete();
        with_extras.insert(TIMEOUT_KEY.to_string(), "5".to_string());
        with_extras.insert(PARENT_IDENTIFIER_KEY.to_string(), "parent-uuid".to_string());

        let config = CatalogConfig::from_properties(&with_extras).unwrap();
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.parent_identifier.as_deref(), Some("parent-uuid"));

        with_extras.insert(TIMEOUT_KEY.to_string(), "soon".to_string());
        assert!(CatalogConfig::from_properties(&with_extras).is_err());

        with_extras.insert(TIMEOUT_KEY.to_string(), "0".to_string());
        assert!(CatalogConfig::from_properties(&with_extras).is_err());
    }

    #[test]
    fn test_derived_endpoints() {
        let endpoints = CatalogEndpoints::derive("http://cat.example.org/geonetwork/");
        assert_eq!(endpoints.base, "http://cat.example.org/geonetwork");
        assert_eq!(endpoints.csw, "http://cat.example.org/geonetwork/srv/eng/csw");
        assert_eq!(
            endpoints.login,
            "http://cat.example.org/geonetwork/srv/eng/xml.user.login"
        );
        assert_eq!(
            endpoints.logout,
            "http://cat.example.org/geonetwork/srv/eng/xml.user.logout"
        );
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = CatalogConfig::from_properties(&complete()).unwrap();
        let printed = format!("{config:?}");
        assert!(!printed.contains("secret"));
        assert!(printed.contains("<redacted>"));
    }

    #[test]
    fn test_env_var_name() {
        assert_eq!(env_var_name(ENDPOINT_URL_KEY), "CSW_ENDPOINT_URL");
        assert_eq!(env_var_name(TIMEOUT_KEY), "CSW_ENDPOINT_TIMEOUT_SECS");
    }
}

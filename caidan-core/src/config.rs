use crate::access::AccessConfig;
use crate::error::{CaidanError, Result};
use crate::types::Role;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the role lookup backend; `None` resolves every identity
    /// to `default_role`.
    pub backend_url: Option<String>,
    /// Backend endpoint that resolves a bare session token, e.g.
    /// `/auth/session`. Without it only wallet identities are looked up.
    pub session_endpoint: Option<String>,
    pub lookup_timeout: Duration,
    /// Allows operator-selected role overrides.
    pub demo_mode: bool,
    pub default_role: Role,
    pub access: AccessConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backend_url: None,
            session_endpoint: None,
            lookup_timeout: Duration::from_secs(10),
            demo_mode: false,
            default_role: Role::User,
            access: AccessConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn with_backend(url: &str) -> Self {
        Self {
            backend_url: Some(url.to_string()),
            ..Self::default()
        }
    }

    pub fn demo() -> Self {
        Self {
            demo_mode: true,
            ..Self::default()
        }
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let json = tokio::fs::read_to_string(path).await?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(url) = &self.backend_url {
            if url.is_empty() {
                return Err(CaidanError::config("Backend URL cannot be empty"));
            }
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(CaidanError::config(format!(
                    "Backend URL must be http(s): {}",
                    url
                )));
            }
        }

        if let Some(endpoint) = &self.session_endpoint {
            if self.backend_url.is_none() {
                return Err(CaidanError::config(
                    "Session endpoint requires a backend URL",
                ));
            }
            if !endpoint.starts_with('/') {
                return Err(CaidanError::config(format!(
                    "Session endpoint must start with '/': {}",
                    endpoint
                )));
            }
        }

        if self.lookup_timeout.is_zero() {
            return Err(CaidanError::config("Lookup timeout must be greater than 0"));
        }

        if !self.default_role.is_authenticated() {
            return Err(CaidanError::config(
                "Default role must be an authenticated role",
            ));
        }

        self.access.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        ClientConfig::default().validate().unwrap();
        ClientConfig::demo().validate().unwrap();
        ClientConfig::with_backend("http://localhost:8080")
            .validate()
            .unwrap();
    }

    #[test]
    fn test_invalid_backend_url() {
        assert!(ClientConfig::with_backend("").validate().is_err());
        assert!(ClientConfig::with_backend("localhost:8080").validate().is_err());
    }

    #[test]
    fn test_session_endpoint_validation() {
        let mut config = ClientConfig::with_backend("http://localhost:8080");
        config.session_endpoint = Some("/auth/session".to_string());
        config.validate().unwrap();

        config.session_endpoint = Some("auth/session".to_string());
        assert!(config.validate().is_err());

        let config = ClientConfig {
            session_endpoint: Some("/auth/session".to_string()),
            ..ClientConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_role_must_authenticate() {
        let config = ClientConfig {
            default_role: Role::Unauthenticated,
            ..ClientConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"demo_mode": true, "default_role": "issuer"}"#).unwrap();
        assert!(config.demo_mode);
        assert_eq!(config.default_role, Role::Issuer);
        assert!(config.backend_url.is_none());
        config.validate().unwrap();
    }
}

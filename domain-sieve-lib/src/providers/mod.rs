//! Registrar backends.
//!
//! Every registrar implements [`RegistrarProvider`]. Backends are selected by
//! name at configuration time through [`ProviderKind`], so the verifier only
//! ever sees trait objects. Each backend is compiled in behind a cargo
//! feature of the same name.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::ProviderConfig;
use crate::error::DomainSieveError;
use crate::types::{ProviderResponse, ProviderVerdict};
use crate::utils::excerpt;

#[cfg(feature = "dynadot")]
pub mod dynadot;
#[cfg(feature = "porkbun")]
pub mod porkbun;

#[cfg(feature = "dynadot")]
pub use dynadot::DynadotClient;
#[cfg(feature = "porkbun")]
pub use porkbun::PorkbunClient;

/// Characters of a response body kept in notes.
pub(crate) const BODY_EXCERPT_LEN: usize = 100;

/// Contract shared by every registrar backend.
///
/// `check` never fails: transport errors, HTTP errors and unparseable bodies
/// come back as [`ProviderVerdict::Error`], rate-limit rejections as
/// [`ProviderVerdict::RateLimited`].
#[async_trait]
pub trait RegistrarProvider: Send + Sync {
    /// Lower-case registrar name used in logs and config files.
    fn name(&self) -> &str;

    /// Minimum time between two calls to this registrar.
    fn min_interval(&self) -> Duration;

    async fn check(&self, domain: &str) -> ProviderResponse;
}

/// Registrars this build knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Porkbun,
    Dynadot,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Porkbun => "porkbun",
            Self::Dynadot => "dynadot",
        }
    }

    /// Interval the registrar enforces when the config does not override it.
    pub fn default_interval(&self) -> Duration {
        match self {
            Self::Porkbun => Duration::from_secs(11),
            Self::Dynadot => Duration::from_secs(2),
        }
    }

    /// Construct the backend for `config`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the API key is missing, the HTTP
    /// client cannot be built, or the backend was not compiled in.
    #[allow(unused_variables)]
    pub fn build(
        &self,
        config: &ProviderConfig,
        http_timeout: Duration,
    ) -> Result<Arc<dyn RegistrarProvider>, DomainSieveError> {
        if config.api_key.trim().is_empty() {
            return Err(DomainSieveError::config(format!(
                "provider '{}' has no api_key",
                config.name
            )));
        }
        let interval = config.min_interval.unwrap_or_else(|| self.default_interval());

        #[allow(unreachable_patterns)]
        let provider: Arc<dyn RegistrarProvider> = match self {
            #[cfg(feature = "porkbun")]
            Self::Porkbun => {
                let mut client =
                    PorkbunClient::new(&config.api_key, config.api_secret.clone(), http_timeout)?
                        .with_min_interval(interval);
                if let Some(base_url) = &config.base_url {
                    client = client.with_base_url(base_url);
                }
                Arc::new(client)
            }
            #[cfg(feature = "dynadot")]
            Self::Dynadot => {
                let mut client =
                    DynadotClient::new(&config.api_key, http_timeout)?.with_min_interval(interval);
                if let Some(base_url) = &config.base_url {
                    client = client.with_base_url(base_url);
                }
                Arc::new(client)
            }
            other => {
                return Err(DomainSieveError::config(format!(
                    "provider '{}' is not enabled in this build",
                    other
                )))
            }
        };

        tracing::debug!(provider = %self, interval = ?interval, "registrar backend ready");
        Ok(provider)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = DomainSieveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "porkbun" => Ok(Self::Porkbun),
            "dynadot" => Ok(Self::Dynadot),
            other => Err(DomainSieveError::config(format!(
                "unknown provider '{}' (expected porkbun or dynadot)",
                other
            ))),
        }
    }
}

/// Build every active provider, in config order.
///
/// Inactive entries are skipped; an unknown name among the active ones is a
/// configuration error.
pub fn build_active_providers(
    configs: &[ProviderConfig],
    http_timeout: Duration,
) -> Result<Vec<Arc<dyn RegistrarProvider>>, DomainSieveError> {
    configs
        .iter()
        .filter(|c| c.active)
        .map(|c| c.name.parse::<ProviderKind>()?.build(c, http_timeout))
        .collect()
}

/// Shared HTTP client setup for the registrar backends.
pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client, DomainSieveError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("domain-sieve/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| {
            DomainSieveError::network_with_source("Failed to create registrar HTTP client", e.to_string())
        })
}

/// Fold a transport failure into an error response.
pub(crate) fn transport_failure(domain: &str, provider: &str, err: reqwest::Error) -> ProviderResponse {
    let error = DomainSieveError::from(err);
    ProviderResponse::new(domain, provider, ProviderVerdict::Error, error.to_string())
}

/// Error response for a non-success HTTP status.
pub(crate) fn http_failure(domain: &str, provider: &str, status: u16, body: &str) -> ProviderResponse {
    ProviderResponse::new(
        domain,
        provider,
        ProviderVerdict::Error,
        format!("HTTP {}: {}", status, excerpt(body, BODY_EXCERPT_LEN)),
    )
}

/// Error response for a body that is not the JSON we expect.
pub(crate) fn parse_failure(domain: &str, provider: &str, body: &str) -> ProviderResponse {
    let error = DomainSieveError::parse("invalid JSON response", excerpt(body, BODY_EXCERPT_LEN));
    ProviderResponse::new(domain, provider, ProviderVerdict::Error, error.to_string())
}

/// Render a JSON scalar for a note (`"9.73"` and `9.73` both become `9.73`).
pub(crate) fn json_text(value: Option<&serde_json::Value>) -> Option<String> {
    match value? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(name: &str, active: bool) -> ProviderConfig {
        ProviderConfig {
            name: name.to_string(),
            api_key: "key".to_string(),
            api_secret: Some("secret".to_string()),
            active,
            min_interval: None,
            base_url: None,
        }
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!("Porkbun".parse::<ProviderKind>().unwrap(), ProviderKind::Porkbun);
        assert_eq!(" dynadot ".parse::<ProviderKind>().unwrap(), ProviderKind::Dynadot);
        assert!("namecheap".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_default_intervals() {
        assert_eq!(ProviderKind::Porkbun.default_interval(), Duration::from_secs(11));
        assert_eq!(ProviderKind::Dynadot.default_interval(), Duration::from_secs(2));
    }

    #[test]
    fn test_build_active_only() {
        let configs = vec![config("porkbun", true), config("dynadot", false)];
        let providers = build_active_providers(&configs, Duration::from_secs(10)).unwrap();
        assert_eq!(providers.len(), 1);
        assert_eq!(providers[0].name(), "porkbun");
        assert_eq!(providers[0].min_interval(), Duration::from_secs(11));
    }

    #[test]
    fn test_interval_override() {
        let mut cfg = config("dynadot", true);
        cfg.min_interval = Some(Duration::from_millis(500));
        let provider = ProviderKind::Dynadot.build(&cfg, Duration::from_secs(10)).unwrap();
        assert_eq!(provider.min_interval(), Duration::from_millis(500));
    }

    #[test]
    fn test_unknown_active_provider_is_config_error() {
        let configs = vec![config("namecheap", true)];
        let err = build_active_providers(&configs, Duration::from_secs(10)).err().unwrap();
        assert!(matches!(err, DomainSieveError::ConfigError { .. }));
    }

    #[test]
    fn test_missing_key_is_config_error() {
        let mut cfg = config("porkbun", true);
        cfg.api_key = String::new();
        assert!(ProviderKind::Porkbun.build(&cfg, Duration::from_secs(10)).is_err());
    }

    #[test]
    fn test_json_text() {
        let value = serde_json::json!({"a": "9.73", "b": 12.5, "c": null});
        assert_eq!(json_text(value.get("a")).as_deref(), Some("9.73"));
        assert_eq!(json_text(value.get("b")).as_deref(), Some("12.5"));
        assert_eq!(json_text(value.get("c")), None);
        assert_eq!(json_text(value.get("d")), None);
    }
}

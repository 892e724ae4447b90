//! Porkbun `checkDomain` backend.
//!
//! Porkbun answers `POST /api/json/v3/domain/checkDomain/{domain}` with a JSON
//! envelope `{"status": "SUCCESS" | "ERROR", "response": {...}, "message": ...}`.
//! Its rate limit is one check per ten seconds per key; exceeding it yields an
//! error whose text contains "within 10 seconds used".

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;

use super::{http_client, http_failure, json_text, parse_failure, transport_failure, RegistrarProvider};
use crate::error::DomainSieveError;
use crate::types::{ProviderResponse, ProviderVerdict};

pub const PORKBUN_API_BASE: &str = "https://api.porkbun.com";

const NAME: &str = "porkbun";
const RATE_LIMIT_MARKER: &str = "within 10 seconds used";

#[derive(Serialize)]
struct Credentials<'a> {
    apikey: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    secretapikey: Option<&'a str>,
}

pub struct PorkbunClient {
    http_client: reqwest::Client,
    api_key: String,
    api_secret: Option<String>,
    base_url: String,
    min_interval: Duration,
}

impl PorkbunClient {
    pub fn new<K: Into<String>>(
        api_key: K,
        api_secret: Option<String>,
        http_timeout: Duration,
    ) -> Result<Self, DomainSieveError> {
        Ok(Self {
            http_client: http_client(http_timeout)?,
            api_key: api_key.into(),
            api_secret: api_secret.filter(|s| !s.is_empty()),
            base_url: PORKBUN_API_BASE.to_string(),
            min_interval: Duration::from_secs(11),
        })
    }

    /// Point the client at another host (proxy, mock server).
    pub fn with_base_url<U: AsRef<str>>(mut self, base_url: U) -> Self {
        self.base_url = base_url.as_ref().trim_end_matches('/').to_string();
        self
    }

    pub fn with_min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }

    fn endpoint(&self, domain: &str) -> String {
        format!("{}/api/json/v3/domain/checkDomain/{}", self.base_url, domain)
    }
}

#[async_trait]
impl RegistrarProvider for PorkbunClient {
    fn name(&self) -> &str {
        NAME
    }

    fn min_interval(&self) -> Duration {
        self.min_interval
    }

    async fn check(&self, domain: &str) -> ProviderResponse {
        let credentials = Credentials {
            apikey: &self.api_key,
            secretapikey: self.api_secret.as_deref(),
        };

        tracing::debug!(provider = NAME, domain, "checking domain");
        let response = match self
            .http_client
            .post(self.endpoint(domain))
            .json(&credentials)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return transport_failure(domain, NAME, e),
        };

        let status = response.status();
        match response.text().await {
            Ok(body) => interpret(domain, status, &body),
            Err(e) => transport_failure(domain, NAME, e),
        }
    }
}

/// Classify one Porkbun reply.
pub(crate) fn interpret(domain: &str, status: StatusCode, body: &str) -> ProviderResponse {
    if status == StatusCode::TOO_MANY_REQUESTS || body.contains(RATE_LIMIT_MARKER) {
        return ProviderResponse::new(domain, NAME, ProviderVerdict::RateLimited, "Porkbun rate limit");
    }
    if status != StatusCode::OK {
        return http_failure(domain, NAME, status.as_u16(), body);
    }

    let data: serde_json::Value = match serde_json::from_str(body) {
        Ok(data) => data,
        Err(_) => return parse_failure(domain, NAME, body),
    };

    if data.get("status").and_then(|s| s.as_str()) == Some("SUCCESS") {
        let details = data.get("response");
        let available = details
            .and_then(|r| r.get("avail"))
            .and_then(|a| a.as_str())
            .is_some_and(|a| a.eq_ignore_ascii_case("yes"));

        if available {
            let price = json_text(details.and_then(|r| r.get("price")))
                .unwrap_or_else(|| "unknown".to_string());
            ProviderResponse::new(domain, NAME, ProviderVerdict::Available, format!("Porkbun price: {}", price))
        } else {
            ProviderResponse::new(domain, NAME, ProviderVerdict::Registered, "registered")
        }
    } else {
        let message = json_text(data.get("message")).unwrap_or_else(|| "unknown error".to_string());
        ProviderResponse::new(domain, NAME, ProviderVerdict::Error, format!("Porkbun API error: {}", message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn reply(status: StatusCode, body: serde_json::Value) -> ProviderResponse {
        interpret("abcd.com", status, &body.to_string())
    }

    #[test]
    fn test_available_with_price() {
        let response = reply(
            StatusCode::OK,
            json!({"status": "SUCCESS", "response": {"avail": "yes", "price": "9.73"}}),
        );
        assert_eq!(response.verdict, ProviderVerdict::Available);
        assert_eq!(response.note, "Porkbun price: 9.73");
        assert_eq!(response.provider, "porkbun");
    }

    #[test]
    fn test_registered() {
        let response = reply(
            StatusCode::OK,
            json!({"status": "SUCCESS", "response": {"avail": "no"}}),
        );
        assert_eq!(response.verdict, ProviderVerdict::Registered);
    }

    #[test]
    fn test_rate_limit_message() {
        let response = reply(
            StatusCode::BAD_REQUEST,
            json!({"status": "ERROR", "message": "1 out of 1 checks within 10 seconds used."}),
        );
        assert_eq!(response.verdict, ProviderVerdict::RateLimited);

        let response = interpret("abcd.com", StatusCode::TOO_MANY_REQUESTS, "");
        assert_eq!(response.verdict, ProviderVerdict::RateLimited);
    }

    #[test]
    fn test_api_error() {
        let response = reply(
            StatusCode::OK,
            json!({"status": "ERROR", "message": "Invalid API key."}),
        );
        assert_eq!(response.verdict, ProviderVerdict::Error);
        assert_eq!(response.note, "Porkbun API error: Invalid API key.");
    }

    #[test]
    fn test_http_error_excerpt() {
        let body = "x".repeat(300);
        let response = interpret("abcd.com", StatusCode::INTERNAL_SERVER_ERROR, &body);
        assert_eq!(response.verdict, ProviderVerdict::Error);
        assert!(response.note.starts_with("HTTP 500: "));
        assert!(response.note.len() < 120);
    }

    #[test]
    fn test_malformed_json() {
        let response = interpret("abcd.com", StatusCode::OK, "<html>maintenance</html>");
        assert_eq!(response.verdict, ProviderVerdict::Error);
        assert!(response.note.contains("<html>maintenance</html>"));
    }

    #[test]
    fn test_credentials_body() {
        let with_secret = serde_json::to_value(Credentials {
            apikey: "pk1",
            secretapikey: Some("sk1"),
        })
        .unwrap();
        assert_eq!(with_secret, json!({"apikey": "pk1", "secretapikey": "sk1"}));

        let without = serde_json::to_value(Credentials {
            apikey: "pk1",
            secretapikey: None,
        })
        .unwrap();
        assert_eq!(without, json!({"apikey": "pk1"}));
    }
}

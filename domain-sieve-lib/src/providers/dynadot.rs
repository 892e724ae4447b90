//! Dynadot `api3.json` search backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use super::{http_client, http_failure, json_text, parse_failure, transport_failure, RegistrarProvider};
use crate::error::DomainSieveError;
use crate::types::{ProviderResponse, ProviderVerdict};

pub const DYNADOT_API_BASE: &str = "https://api.dynadot.com";

const NAME: &str = "dynadot";

pub struct DynadotClient {
    http_client: reqwest::Client,
    api_key: String,
    base_url: String,
    min_interval: Duration,
}

impl DynadotClient {
    pub fn new<K: Into<String>>(api_key: K, http_timeout: Duration) -> Result<Self, DomainSieveError> {
        Ok(Self {
            http_client: http_client(http_timeout)?,
            api_key: api_key.into(),
            base_url: DYNADOT_API_BASE.to_string(),
            min_interval: Duration::from_secs(2),
        })
    }

    pub fn with_base_url<U: AsRef<str>>(mut self, base_url: U) -> Self {
        self.base_url = base_url.as_ref().trim_end_matches('/').to_string();
        self
    }

    pub fn with_min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }
}

#[async_trait]
impl RegistrarProvider for DynadotClient {
    fn name(&self) -> &str {
        NAME
    }

    fn min_interval(&self) -> Duration {
        self.min_interval
    }

    async fn check(&self, domain: &str) -> ProviderResponse {
        tracing::debug!(provider = NAME, domain, "checking domain");
        let response = match self
            .http_client
            .get(format!("{}/api3.json", self.base_url))
            .query(&[
                ("key", self.api_key.as_str()),
                ("command", "search"),
                ("domain0", domain),
            ])
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

/// Classify one Dynadot reply.
pub(crate) fn interpret(domain: &str, status: StatusCode, body: &str) -> ProviderResponse {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return ProviderResponse::new(domain, NAME, ProviderVerdict::RateLimited, "Dynadot rate limit");
    }
    if status != StatusCode::OK {
        return http_failure(domain, NAME, status.as_u16(), body);
    }

    let data: serde_json::Value = match serde_json::from_str(body) {
        Ok(data) => data,
        Err(_) => return parse_failure(domain, NAME, body),
    };

    let api_error = |message: Option<String>| {
        ProviderResponse::new(
            domain,
            NAME,
            ProviderVerdict::Error,
            format!("Dynadot API error: {}", message.unwrap_or_else(|| "unknown error".to_string())),
        )
    };

    if let Some(error) = data.get("error") {
        return api_error(json_text(Some(error)));
    }

    let search = data.get("SearchResponse");
    if let Some(error) = search.and_then(|s| s.get("Error")) {
        return api_error(json_text(Some(error)));
    }

    let first = search
        .and_then(|s| s.get("SearchResults"))
        .and_then(|r| r.as_array())
        .and_then(|r| r.first());

    match first {
        Some(result) => {
            let available = result
                .get("Available")
                .and_then(|a| a.as_str())
                .is_some_and(|a| a.eq_ignore_ascii_case("yes"));

            if available {
                let price = json_text(result.get("Price")).unwrap_or_else(|| "unknown".to_string());
                let currency = json_text(result.get("Currency")).unwrap_or_else(|| "USD".to_string());
                ProviderResponse::new(
                    domain,
                    NAME,
                    ProviderVerdict::Available,
                    format!("Dynadot price: {} {}", price, currency),
                )
            } else {
                ProviderResponse::new(domain, NAME, ProviderVerdict::Registered, "registered")
            }
        }
        None => {
            tracing::debug!(provider = NAME, domain, body, "unrecognised search response");
            ProviderResponse::new(domain, NAME, ProviderVerdict::Error, "Dynadot returned an unexpected response format")
        }
    }
}

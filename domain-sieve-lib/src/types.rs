//! Core data types for the verification pipeline.
//!
//! This module defines the ledger record, the transient results produced by
//! the DNS and registrar stages, and the configuration/summary objects passed
//! between the orchestrator and its callers.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::generate::EASY_LETTERS;

/// One row of the ledger: everything known about a single domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CheckRecord {
    /// Fully qualified domain name (e.g. "abcd.com")
    pub domain: String,

    /// The DNS prefilter has looked at this domain
    pub dns_checked: bool,

    /// A registrar has given a definitive answer for this domain.
    /// Never flips back to `false` once set.
    pub api_verified: bool,

    /// After DNS only: "worth confirming". After API: the final verdict.
    pub available: bool,

    /// Free-form note (price, error text, ...)
    pub note: String,
}

impl CheckRecord {
    /// Build the ledger row for a DNS probe outcome.
    pub fn from_probe(outcome: &ProbeOutcome) -> Self {
        let note = match &outcome.error {
            Some(error) => error.clone(),
            None if outcome.registered => "registered".to_string(),
            None => "no DNS record, likely available".to_string(),
        };

        Self {
            domain: outcome.domain.clone(),
            dns_checked: true,
            api_verified: false,
            available: !outcome.registered,
            note,
        }
    }

    /// Build the ledger update for a registrar result.
    ///
    /// `Unknown` results leave `api_verified` unset so the domain stays
    /// eligible for the next verification run.
    pub fn from_api_result(result: &AvailabilityResult) -> Self {
        let (api_verified, available) = match result.status {
            AvailabilityStatus::ConfirmedAvailable => (true, true),
            AvailabilityStatus::Registered => (true, false),
            AvailabilityStatus::LikelyAvailable | AvailabilityStatus::Unknown => (false, true),
        };

        Self {
            domain: result.domain.clone(),
            dns_checked: true,
            api_verified,
            available,
            note: result.note.clone(),
        }
    }

    /// Whether this row is a DNS survivor still waiting for a registrar answer.
    pub fn is_pending_verification(&self) -> bool {
        self.dns_checked && !self.api_verified && self.available
    }

    /// Whether a registrar confirmed this domain as available.
    pub fn is_confirmed_available(&self) -> bool {
        self.api_verified && self.available
    }
}

/// Availability classification of a single domain at some stage.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AvailabilityStatus {
    /// DNS found no record; needs registrar confirmation
    #[serde(rename = "likely_available")]
    LikelyAvailable,

    /// Registered (DNS record exists, or registrar says taken)
    #[serde(rename = "registered")]
    Registered,

    /// Could not be determined (probe error, registrar failure, rate limit)
    #[serde(rename = "unknown")]
    Unknown,

    /// A registrar confirmed the domain can be registered
    #[serde(rename = "confirmed_available")]
    ConfirmedAvailable,
}

/// Which stage produced an [`AvailabilityResult`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CheckSource {
    #[serde(rename = "dns")]
    Dns,
    #[serde(rename = "api")]
    Api,
}

/// Transient per-domain result, folded into a [`CheckRecord`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AvailabilityResult {
    pub domain: String,
    pub status: AvailabilityStatus,
    pub source: CheckSource,
    pub note: String,
}

/// Raw outcome of one DNS existence probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub domain: String,
    /// Conservative: `true` on success *and* on any error other than "no such name"
    pub registered: bool,
    /// Set when the lookup failed for a reason other than "no such name"
    pub error: Option<String>,
}

impl ProbeOutcome {
    /// Convert into the stage-independent result shape.
    pub fn to_result(&self) -> AvailabilityResult {
        let status = match (&self.error, self.registered) {
            (Some(_), _) => AvailabilityStatus::Unknown,
            (None, true) => AvailabilityStatus::Registered,
            (None, false) => AvailabilityStatus::LikelyAvailable,
        };
        AvailabilityResult {
            domain: self.domain.clone(),
            status,
            source: CheckSource::Dns,
            note: CheckRecord::from_probe(self).note,
        }
    }
}

/// What a registrar said about one domain.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ProviderVerdict {
    /// Registrable right now
    Available,
    /// Already registered
    Registered,
    /// Rejected because of the provider's rate limit; back off and retry
    RateLimited,
    /// Transport, HTTP, API or parse failure
    Error,
}

/// Result of a single registrar call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderResponse {
    pub domain: String,
    pub provider: String,
    pub verdict: ProviderVerdict,
    pub note: String,
}

impl ProviderResponse {
    pub fn new<D, P, N>(domain: D, provider: P, verdict: ProviderVerdict, note: N) -> Self
    where
        D: Into<String>,
        P: Into<String>,
        N: Into<String>,
    {
        Self {
            domain: domain.into(),
            provider: provider.into(),
            verdict,
            note: note.into(),
        }
    }

    /// Whether this response counts towards a lane's consecutive-failure budget.
    pub fn is_failure(&self) -> bool {
        matches!(
            self.verdict,
            ProviderVerdict::Error | ProviderVerdict::RateLimited
        )
    }

    /// Fold into the stage-independent result shape.
    pub fn to_result(&self) -> AvailabilityResult {
        let status = match self.verdict {
            ProviderVerdict::Available => AvailabilityStatus::ConfirmedAvailable,
            ProviderVerdict::Registered => AvailabilityStatus::Registered,
            ProviderVerdict::RateLimited | ProviderVerdict::Error => AvailabilityStatus::Unknown,
        };
        AvailabilityResult {
            domain: self.domain.clone(),
            status,
            source: CheckSource::Api,
            note: self.note.clone(),
        }
    }
}

/// What the sequential strategy does after a rate-limit rejection.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum RetryPolicy {
    /// Back off the rejected provider and retry it
    #[default]
    #[serde(rename = "same")]
    SameProvider,
    /// Back off, then retry on another active provider picked at random
    #[serde(rename = "failover")]
    Failover,
}

/// Inputs of the candidate generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateConfig {
    /// Characters the body is drawn from
    pub alphabet: String,
    /// Body length (excluding prefix/suffix/TLD)
    pub length: usize,
    /// Maximum number of accepted candidates, 0 = everything
    pub limit: usize,
    pub prefix: String,
    pub suffix: String,
    /// Top-level domain, with or without the leading dot
    pub tld: String,
}

impl Default for GenerateConfig {
    fn default() -> Self {
        Self {
            alphabet: EASY_LETTERS.to_string(),
            length: 4,
            limit: 1000,
            prefix: String::new(),
            suffix: String::new(),
            tld: ".com".to_string(),
        }
    }
}

/// Every parameter the orchestrator accepts from its caller.
///
/// The defaults mirror a conservative interactive run: four-letter names over
/// the easy-to-read alphabet, a thousand candidates, 20 DNS workers and a
/// single registrar lane.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub generate: GenerateConfig,

    /// Maximum number of in-flight DNS probes
    /// Default: 20, Range: 1-500
    pub dns_workers: usize,

    /// Timeout for each DNS lookup
    pub dns_timeout: Duration,

    /// Run the registrar stage on DNS survivors
    pub verify_api: bool,

    /// Number of parallel provider lanes. 1 = sequential strategy.
    pub api_lanes: usize,

    /// Use only this provider in the sequential strategy
    pub pinned_provider: Option<String>,

    /// Retry behaviour after a rate-limit rejection
    pub retry_policy: RetryPolicy,

    /// Consecutive failures that stop a provider lane
    pub max_consecutive_errors: usize,

    /// Timeout for each registrar HTTP request
    pub http_timeout: Duration,

    /// Ledger CSV
    pub ledger_path: PathBuf,
    /// Append-only export of confirmed-available domains
    pub available_path: PathBuf,
    /// Append-only per-domain error log
    pub error_log_path: PathBuf,
    /// Registrar credentials document
    pub providers_path: PathBuf,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            generate: GenerateConfig::default(),
            dns_workers: 20,
            dns_timeout: Duration::from_secs(5),
            verify_api: false,
            api_lanes: 1,
            pinned_provider: None,
            retry_policy: RetryPolicy::default(),
            max_consecutive_errors: 5,
            http_timeout: Duration::from_secs(10),
            ledger_path: PathBuf::from("checked_domains.csv"),
            available_path: PathBuf::from("available_domains.csv"),
            error_log_path: PathBuf::from("errors.log"),
            providers_path: PathBuf::from("config.json"),
        }
    }
}

impl RunConfig {
    /// Set the DNS pool width, clamped to 1..=500.
    pub fn with_dns_workers(mut self, workers: usize) -> Self {
        self.dns_workers = workers.clamp(1, 500);
        self
    }

    pub fn with_generate(mut self, generate: GenerateConfig) -> Self {
        self.generate = generate;
        self
    }

    pub fn with_verify_api(mut self, enabled: bool) -> Self {
        self.verify_api = enabled;
        self
    }

    /// Set the number of provider lanes (at least one).
    pub fn with_api_lanes(mut self, lanes: usize) -> Self {
        self.api_lanes = lanes.max(1);
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn with_pinned_provider<S: Into<String>>(mut self, provider: Option<S>) -> Self {
        self.pinned_provider = provider.map(Into::into);
        self
    }

    /// Set the circuit-breaker threshold (at least one).
    pub fn with_max_consecutive_errors(mut self, max: usize) -> Self {
        self.max_consecutive_errors = max.max(1);
        self
    }

    pub fn with_ledger_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.ledger_path = path.into();
        self
    }

    pub fn with_available_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.available_path = path.into();
        self
    }

    pub fn with_error_log_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.error_log_path = path.into();
        self
    }

    pub fn with_providers_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.providers_path = path.into();
        self
    }
}

/// Counts reported at the end of a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunSummary {
    /// Candidates produced by the generator this run
    pub generated: usize,
    /// DNS probes completed this run
    pub dns_checked: usize,
    /// DNS survivors this run
    pub dns_likely_available: usize,
    /// Probes that ended in an error this run
    pub dns_errors: usize,
    /// Registrar answers received this run
    pub api_checked: usize,
    /// Registrar confirmations this run
    pub api_confirmed: usize,
    /// Registrar calls without a definitive answer this run
    pub api_unresolved: usize,
    /// Rows in the ledger after the run
    pub ledger_total: usize,
    /// Ledger rows confirmed available, across all runs
    pub ledger_confirmed: usize,
    /// The run was interrupted before finishing
    pub cancelled: bool,
}

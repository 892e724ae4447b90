//! Rate-limited registrar confirmation.
//!
//! The verifier takes the DNS survivors and asks registrars for an
//! authoritative answer. Every registrar is paired with its own
//! [`RateLimiter`]; the registrar, not the verifier, is the unit of
//! serialization. Two strategies exist:
//!
//! - **Sequential**: one call in flight at a time, each domain going to a
//!   randomly chosen (or pinned) registrar.
//! - **Parallel**: domains are dealt round-robin to one lane per registrar and
//!   the lanes run concurrently, each paced by its own registrar's interval.
//!
//! In both strategies a rate-limit rejection gets one backoff-and-retry, and a
//! lane gives up after too many consecutive failures while keeping every
//! answer it already has.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::error::DomainSieveError;
use crate::providers::RegistrarProvider;
use crate::ratelimit::RateLimiter;
use crate::sink::ResultSink;
use crate::types::{ProviderResponse, ProviderVerdict, RetryPolicy, RunConfig};

/// A registrar together with the limiter that paces it.
pub struct PacedProvider {
    provider: Arc<dyn RegistrarProvider>,
    limiter: RateLimiter,
}

impl PacedProvider {
    pub fn new(provider: Arc<dyn RegistrarProvider>) -> Self {
        let limiter = RateLimiter::new(provider.min_interval());
        Self { provider, limiter }
    }

    pub fn name(&self) -> &str {
        self.provider.name()
    }

    pub fn interval(&self) -> Duration {
        self.limiter.interval()
    }

    /// Wait for the registrar's slot, then check `domain`.
    ///
    /// Returns `None` if cancelled before the call started; a call that has
    /// started always runs to completion.
    pub async fn check(&self, domain: &str, token: &CancellationToken) -> Option<ProviderResponse> {
        if !self.limiter.acquire(token).await {
            return None;
        }
        Some(self.provider.check(domain).await)
    }

    /// Sleep one full interval after a rate-limit rejection.
    async fn backoff(&self, token: &CancellationToken) -> bool {
        tracing::warn!(provider = self.name(), wait = ?self.interval(), "rate limited, backing off");
        tokio::select! {
            _ = token.cancelled() => false,
            _ = tokio::time::sleep(self.interval()) => true,
        }
    }
}

/// Which execution strategy a verifier will use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Sequential,
    Parallel { lanes: usize },
}

/// Knobs of the verification stage.
#[derive(Debug, Clone)]
pub struct VerifierOptions {
    /// Requested lane count; more than one selects the parallel strategy
    pub lanes: usize,
    /// Send every sequential call to this registrar
    pub pinned_provider: Option<String>,
    pub retry_policy: RetryPolicy,
    /// Consecutive failures after which a lane stops
    pub max_consecutive_errors: usize,
}

impl Default for VerifierOptions {
    fn default() -> Self {
        Self {
            lanes: 1,
            pinned_provider: None,
            retry_policy: RetryPolicy::SameProvider,
            max_consecutive_errors: 5,
        }
    }
}

impl From<&RunConfig> for VerifierOptions {
    fn from(config: &RunConfig) -> Self {
        Self {
            lanes: config.api_lanes,
            pinned_provider: config.pinned_provider.clone(),
            retry_policy: config.retry_policy,
            max_consecutive_errors: config.max_consecutive_errors,
        }
    }
}

/// Everything the verifier produced for one batch.
#[derive(Debug, Clone, Default)]
pub struct VerificationReport {
    /// One response per domain that got an answer (or gave up), lanes concatenated
    pub responses: Vec<ProviderResponse>,
    /// Registrars whose lane hit the consecutive-failure limit
    pub aborted_lanes: Vec<String>,
    pub cancelled: bool,
}

impl VerificationReport {
    pub fn confirmed(&self) -> usize {
        self.count(|r| r.verdict == ProviderVerdict::Available)
    }

    pub fn registered(&self) -> usize {
        self.count(|r| r.verdict == ProviderVerdict::Registered)
    }

    /// Responses without a definitive answer (errors, unresolved rate limits).
    pub fn unresolved(&self) -> usize {
        self.count(ProviderResponse::is_failure)
    }

    fn count<F: Fn(&ProviderResponse) -> bool>(&self, predicate: F) -> usize {
        self.responses.iter().filter(|r| predicate(*r)).count()
    }
}

#[derive(Default)]
struct LaneOutcome {
    responses: Vec<ProviderResponse>,
    aborted: bool,
}

/// Confirms DNS survivors against the configured registrars.
pub struct RegistrarVerifier {
    providers: Vec<Arc<PacedProvider>>,
    pinned: Option<usize>,
    options: VerifierOptions,
    sink: Option<Arc<ResultSink>>,
}

impl RegistrarVerifier {
    /// Build a verifier over the active registrars.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when `providers` is empty or the pinned
    /// registrar is not among them.
    pub fn new(
        providers: Vec<Arc<dyn RegistrarProvider>>,
        options: VerifierOptions,
    ) -> Result<Self, DomainSieveError> {
        if providers.is_empty() {
            return Err(DomainSieveError::config(
                "no active registrar configured, cannot verify",
            ));
        }

        let providers: Vec<Arc<PacedProvider>> = providers
            .into_iter()
            .map(|p| Arc::new(PacedProvider::new(p)))
            .collect();

        let pinned = match &options.pinned_provider {
            Some(name) => Some(
                providers
                    .iter()
                    .position(|p| p.name().eq_ignore_ascii_case(name))
                    .ok_or_else(|| {
                        DomainSieveError::config(format!(
                            "pinned provider '{}' is not an active provider",
                            name
                        ))
                    })?,
            ),
            None => None,
        };

        Ok(Self {
            providers,
            pinned,
            options,
            sink: None,
        })
    }

    /// Append confirmations and failures to this sink.
    pub fn with_sink(mut self, sink: Arc<ResultSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Parallel when more than one lane is requested, more than one
    /// registrar is active and no registrar is pinned.
    pub fn strategy(&self) -> Strategy {
        let lanes = self.options.lanes.min(self.providers.len());
        if lanes > 1 && self.pinned.is_none() {
            Strategy::Parallel { lanes }
        } else {
            Strategy::Sequential
        }
    }

    /// Verify `domains`, stopping early (with partial results) on cancellation.
    pub async fn verify(&self, domains: &[String], token: &CancellationToken) -> VerificationReport {
        let strategy = self.strategy();
        tracing::info!(
            domains = domains.len(),
            providers = ?self.provider_names(),
            ?strategy,
            "starting registrar verification"
        );

        let mut report = VerificationReport::default();
        match strategy {
            Strategy::Sequential => {
                let outcome = self.run_sequential(domains, token).await;
                if outcome.aborted {
                    report.aborted_lanes.push("sequential".to_string());
                }
                report.responses = outcome.responses;
            }
            Strategy::Parallel { lanes } => {
                let mut buckets: Vec<Vec<String>> = vec![Vec::new(); lanes];
                for (i, domain) in domains.iter().enumerate() {
                    buckets[i % lanes].push(domain.clone());
                }

                let lane_futures = self.providers[..lanes]
                    .iter()
                    .zip(buckets.iter())
                    .map(|(provider, bucket)| {
                        let span = tracing::info_span!("lane", provider = provider.name());
                        self.run_lane(provider, bucket, token).instrument(span)
                    });

                for (provider, outcome) in self.providers.iter().zip(join_all(lane_futures).await) {
                    if outcome.aborted {
                        report.aborted_lanes.push(provider.name().to_string());
                    }
                    report.responses.extend(outcome.responses);
                }
            }
        }

        report.cancelled = token.is_cancelled();
        tracing::info!(
            checked = report.responses.len(),
            confirmed = report.confirmed(),
            unresolved = report.unresolved(),
            aborted_lanes = report.aborted_lanes.len(),
            cancelled = report.cancelled,
            "registrar verification finished"
        );
        report
    }

    async fn run_sequential(&self, domains: &[String], token: &CancellationToken) -> LaneOutcome {
        let mut outcome = LaneOutcome::default();
        let mut consecutive_failures = 0;

        for (i, domain) in domains.iter().enumerate() {
            if token.is_cancelled() {
                break;
            }

            let provider = self.pick_provider();
            tracing::info!(
                progress = %format!("{}/{}", i + 1, domains.len()),
                domain = %domain,
                provider = provider.name(),
                "verifying"
            );

            let Some((response, used)) = self
                .check_with_retry(provider, domain, self.options.retry_policy, token)
                .await
            else {
                break;
            };

            let abort = self.tally(&response, &mut consecutive_failures);
            outcome.responses.push(response);
            if abort {
                outcome.aborted = true;
                break;
            }

            // Leave the registrar just used idle for a full interval before
            // the next call, whichever registrar that call goes to.
            if i + 1 < domains.len() && !used.limiter.until_ready(token).await {
                break;
            }
        }

        outcome
    }

    async fn run_lane(
        &self,
        provider: &Arc<PacedProvider>,
        domains: &[String],
        token: &CancellationToken,
    ) -> LaneOutcome {
        let mut outcome = LaneOutcome::default();
        let mut consecutive_failures = 0;

        for (i, domain) in domains.iter().enumerate() {
            if token.is_cancelled() {
                break;
            }
            tracing::info!(
                progress = %format!("{}/{}", i + 1, domains.len()),
                domain = %domain,
                "verifying"
            );

            let Some((response, _)) = self
                .check_with_retry(provider, domain, RetryPolicy::SameProvider, token)
                .await
            else {
                break;
            };

            let abort = self.tally(&response, &mut consecutive_failures);
            outcome.responses.push(response);
            if abort {
                outcome.aborted = true;
                break;
            }
        }

        outcome
    }

    /// One call plus, on a rate-limit rejection, one backoff-and-retry.
    ///
    /// Returns the final response and the registrar that produced it, or
    /// `None` when cancelled before anything was sent.
    async fn check_with_retry<'a>(
        &'a self,
        provider: &'a Arc<PacedProvider>,
        domain: &str,
        policy: RetryPolicy,
        token: &CancellationToken,
    ) -> Option<(ProviderResponse, &'a Arc<PacedProvider>)> {
        let response = provider.check(domain, token).await?;
        if response.verdict != ProviderVerdict::RateLimited {
            return Some((response, provider));
        }

        if !provider.backoff(token).await {
            return Some((response, provider));
        }

        let retry_provider = match policy {
            RetryPolicy::SameProvider => provider,
            RetryPolicy::Failover => self.pick_other(provider),
        };
        tracing::debug!(domain, provider = retry_provider.name(), "retrying after rate limit");

        match retry_provider.check(domain, token).await {
            Some(retry) => Some((retry, retry_provider)),
            None => Some((response, provider)),
        }
    }

    /// Log, sink and count one response. Returns `true` when the lane
    /// should stop.
    fn tally(&self, response: &ProviderResponse, consecutive_failures: &mut usize) -> bool {
        match response.verdict {
            ProviderVerdict::Available => {
                tracing::info!(domain = %response.domain, provider = %response.provider, note = %response.note, "confirmed available");
                if let Some(sink) = &self.sink {
                    sink.record_available(&response.domain, &format!("API confirmed - {}", response.note));
                }
            }
            ProviderVerdict::Registered => {
                tracing::info!(domain = %response.domain, provider = %response.provider, "registered");
            }
            ProviderVerdict::RateLimited | ProviderVerdict::Error => {
                tracing::warn!(domain = %response.domain, provider = %response.provider, note = %response.note, "no answer from registrar");
                if let Some(sink) = &self.sink {
                    sink.record_error(&response.domain, &format!("{}: {}", response.provider, response.note));
                }
            }
        }

        if !response.is_failure() {
            *consecutive_failures = 0;
            return false;
        }

        *consecutive_failures += 1;
        if *consecutive_failures >= self.options.max_consecutive_errors {
            tracing::error!(
                provider = %response.provider,
                failures = *consecutive_failures,
                "too many consecutive failures, stopping lane"
            );
            return true;
        }
        false
    }

    fn pick_provider(&self) -> &Arc<PacedProvider> {
        match self.pinned {
            Some(idx) => &self.providers[idx],
            None => &self.providers[rand::rng().random_range(0..self.providers.len())],
        }
    }

    /// A random registrar other than `rejected`, or `rejected` itself when it
    /// is the only one.
    fn pick_other(&self, rejected: &Arc<PacedProvider>) -> &Arc<PacedProvider> {
        let others: Vec<&Arc<PacedProvider>> = self
            .providers
            .iter()
            .filter(|p| !Arc::ptr_eq(p, rejected))
            .collect();
        if others.is_empty() {
            return self
                .providers
                .iter()
                .find(|p| Arc::ptr_eq(p, rejected))
                .unwrap_or(&self.providers[0]);
        }
        others[rand::rng().random_range(0..others.len())]
    }
}

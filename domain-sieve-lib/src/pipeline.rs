//! Orchestration of one run: generate, prefilter, verify, persist.
//!
//! Per domain the state only moves forward:
//! `unchecked -> dns checked (likely available | registered | error)
//! -> [api verified (confirmed available | registered)]`.
//! The ledger is merged and saved after every stage, so an interrupted run
//! loses at most the stage in progress and a re-run picks up where the
//! ledger left off.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::config::load_provider_configs;
use crate::error::DomainSieveError;
use crate::generate::generate;
use crate::ledger::Ledger;
use crate::prefilter::{DnsPrefilter, NameResolver, SystemResolver};
use crate::providers::{build_active_providers, RegistrarProvider};
use crate::sink::ResultSink;
use crate::types::{CheckRecord, RunConfig, RunSummary};
use crate::verifier::{RegistrarVerifier, VerifierOptions};

/// Drives the whole verification pipeline for one [`RunConfig`].
///
/// # Example
///
/// ```rust,no_run
/// use domain_sieve_lib::{Pipeline, RunConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = RunConfig::default().with_dns_workers(50);
///     let summary = Pipeline::new(config).run().await?;
///     println!("{} likely available", summary.dns_likely_available);
///     Ok(())
/// }
/// ```
pub struct Pipeline {
    config: RunConfig,
    resolver: Arc<dyn NameResolver>,
    providers: Option<Vec<Arc<dyn RegistrarProvider>>>,
    token: CancellationToken,
}

impl Pipeline {
    /// Pipeline using the system resolver and the registrars listed in the
    /// config's provider file.
    pub fn new(config: RunConfig) -> Self {
        let resolver = Arc::new(SystemResolver::new(config.dns_timeout));
        Self {
            config,
            resolver,
            providers: None,
            token: CancellationToken::new(),
        }
    }

    /// Replace the name resolver used by the prefilter.
    pub fn with_resolver(mut self, resolver: Arc<dyn NameResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Use these registrars instead of loading the provider file.
    pub fn with_providers(mut self, providers: Vec<Arc<dyn RegistrarProvider>>) -> Self {
        self.providers = Some(providers);
        self
    }

    /// Share a cancellation token with the caller (e.g. a Ctrl-C handler).
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Full run: generate candidates not yet in the ledger, prefilter them,
    /// and (if enabled) confirm every pending survivor with a registrar.
    ///
    /// # Errors
    ///
    /// Configuration problems are reported before the ledger is touched;
    /// after that only ledger load/save failures abort the run.
    pub async fn run(&self) -> Result<RunSummary, DomainSieveError> {
        let span = tracing::info_span!(
            "run",
            length = self.config.generate.length,
            tld = %self.config.generate.tld,
            verify_api = self.config.verify_api
        );
        self.run_inner().instrument(span).await
    }

    /// Confirm the ledger's pending DNS survivors without generating or
    /// probing anything new.
    pub async fn verify_pending(&self) -> Result<RunSummary, DomainSieveError> {
        let span = tracing::info_span!("run", mode = "verify-only");
        async {
            let sink = self.sink();
            let verifier = self.build_verifier(sink)?;
            let mut ledger = Ledger::load(&self.config.ledger_path)?;
            let mut summary = RunSummary::default();

            self.verification_stage(&verifier, &mut ledger, &mut summary)
                .await?;
            Ok(self.finish(&ledger, summary))
        }
        .instrument(span)
        .await
    }

    async fn run_inner(&self) -> Result<RunSummary, DomainSieveError> {
        let sink = self.sink();
        let verifier = if self.config.verify_api {
            Some(self.build_verifier(sink.clone())?)
        } else {
            None
        };

        let mut ledger = Ledger::load(&self.config.ledger_path)?;
        let mut summary = RunSummary::default();

        let report = {
            let candidates = generate(&self.config.generate, |domain| ledger.contains(domain))?;
            let prefilter = DnsPrefilter::new(self.resolver.clone(), self.config.dns_workers)
                .with_sink(sink);
            prefilter.run(candidates, &self.token).await
        };

        summary.generated = report.probed();
        summary.dns_checked = report.probed();
        summary.dns_likely_available = report.likely_available;
        summary.dns_errors = report.errors;

        let added = ledger.merge(report.records);
        ledger.save(&self.config.ledger_path)?;
        tracing::info!(added, total = ledger.len(), "DNS results saved");

        if let Some(verifier) = verifier {
            self.verification_stage(&verifier, &mut ledger, &mut summary)
                .await?;
        }

        Ok(self.finish(&ledger, summary))
    }

    async fn verification_stage(
        &self,
        verifier: &RegistrarVerifier,
        ledger: &mut Ledger,
        summary: &mut RunSummary,
    ) -> Result<(), DomainSieveError> {
        if self.token.is_cancelled() {
            tracing::warn!("cancelled, skipping registrar verification");
            return Ok(());
        }

        let pending = ledger.pending_verification();
        if pending.is_empty() {
            tracing::info!("no domains waiting for registrar verification");
            return Ok(());
        }

        let report = verifier.verify(&pending, &self.token).await;
        summary.api_checked = report.responses.len();
        summary.api_confirmed = report.confirmed();
        summary.api_unresolved = report.unresolved();

        ledger.merge(
            report
                .responses
                .iter()
                .map(|response| CheckRecord::from_api_result(&response.to_result())),
        );
        ledger.save(&self.config.ledger_path)?;
        tracing::info!(checked = summary.api_checked, "registrar results saved");
        Ok(())
    }

    fn finish(&self, ledger: &Ledger, mut summary: RunSummary) -> RunSummary {
        let stats = ledger.stats();
        summary.ledger_total = stats.total;
        summary.ledger_confirmed = stats.confirmed_available;
        summary.cancelled = self.token.is_cancelled();
        summary
    }

    fn sink(&self) -> Arc<ResultSink> {
        Arc::new(ResultSink::new(
            &self.config.available_path,
            &self.config.error_log_path,
        ))
    }

    fn build_verifier(&self, sink: Arc<ResultSink>) -> Result<RegistrarVerifier, DomainSieveError> {
        let providers = match &self.providers {
            Some(providers) => providers.clone(),
            None => {
                let configs = load_provider_configs(&self.config.providers_path)?;
                build_active_providers(&configs, self.config.http_timeout)?
            }
        };

        Ok(RegistrarVerifier::new(providers, VerifierOptions::from(&self.config))?.with_sink(sink))
    }
}

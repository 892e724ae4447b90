//! DNS existence prefilter.
//!
//! A name that resolves is certainly registered. A name that does not
//! resolve is only *probably* free (registered domains without records
//! exist), so survivors go on to registrar confirmation. Anything other than
//! a clean "no such name" answer is treated conservatively as registered and
//! recorded as a probe error.

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::sink::ResultSink;
use crate::types::{CheckRecord, ProbeOutcome};

/// Completed probes between two progress log lines.
const PROGRESS_EVERY: usize = 100;

/// Resolver messages that mean the name has no records. glibc, macOS and
/// Windows phrase `EAI_NONAME` differently; `EAI_NODATA` is included.
const NO_SUCH_NAME_MESSAGES: &[&str] = &[
    "name or service not known",
    "nodename nor servname provided",
    "no such host is known",
    "no address associated with hostname",
];

/// Answer of a single name lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// At least one address came back
    Found,
    /// The resolver says the name does not exist
    NoSuchName,
    /// Timeout, resolver failure or local I/O error
    Failed(String),
}

/// Something that can look up a host name.
#[async_trait]
pub trait NameResolver: Send + Sync {
    async fn resolve(&self, domain: &str) -> Resolution;
}

/// Platform resolver (`getaddrinfo` through `tokio::net::lookup_host`).
#[derive(Debug, Clone)]
pub struct SystemResolver {
    timeout: Duration,
}

impl SystemResolver {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for SystemResolver {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

#[async_trait]
impl NameResolver for SystemResolver {
    async fn resolve(&self, domain: &str) -> Resolution {
        let lookup = tokio::net::lookup_host((domain, 80));
        match tokio::time::timeout(self.timeout, lookup).await {
            Err(_) => Resolution::Failed(format!(
                "DNS lookup timed out after {}s",
                self.timeout.as_secs_f32()
            )),
            Ok(Ok(mut addrs)) => {
                if addrs.next().is_some() {
                    Resolution::Found
                } else {
                    Resolution::NoSuchName
                }
            }
            Ok(Err(e)) => classify_lookup_error(&e),
        }
    }
}

/// Separate "name does not exist" from failures worth distrusting.
///
/// Only a recognised "no such name" answer counts as a miss. Everything else
/// (`EAI_AGAIN`, `EAI_FAIL`, `EAI_SYSTEM`, running out of file descriptors)
/// is a failure.
pub(crate) fn classify_lookup_error(err: &io::Error) -> Resolution {
    if err.kind() != io::ErrorKind::TimedOut {
        let message = err.to_string().to_lowercase();
        if NO_SUCH_NAME_MESSAGES.iter().any(|m| message.contains(m)) {
            return Resolution::NoSuchName;
        }
    }
    Resolution::Failed(format!("DNS lookup failed: {}", err))
}

/// Everything the prefilter produced for one batch.
#[derive(Debug, Clone, Default)]
pub struct PrefilterReport {
    /// One record per probed domain, in completion order
    pub records: Vec<CheckRecord>,
    pub likely_available: usize,
    pub errors: usize,
}

impl PrefilterReport {
    pub fn probed(&self) -> usize {
        self.records.len()
    }
}

/// Bounded pool of DNS probes.
pub struct DnsPrefilter {
    resolver: Arc<dyn NameResolver>,
    workers: usize,
    sink: Option<Arc<ResultSink>>,
}

impl DnsPrefilter {
    pub fn new(resolver: Arc<dyn NameResolver>, workers: usize) -> Self {
        Self {
            resolver,
            workers: workers.clamp(1, 500),
            sink: None,
        }
    }

    /// Append probe errors to this sink's error log.
    pub fn with_sink(mut self, sink: Arc<ResultSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Probe a single domain.
    pub async fn probe(&self, domain: &str) -> ProbeOutcome {
        match self.resolver.resolve(domain).await {
            Resolution::Found => ProbeOutcome {
                domain: domain.to_string(),
                registered: true,
                error: None,
            },
            Resolution::NoSuchName => ProbeOutcome {
                domain: domain.to_string(),
                registered: false,
                error: None,
            },
            Resolution::Failed(error) => ProbeOutcome {
                domain: domain.to_string(),
                registered: true,
                error: Some(error),
            },
        }
    }

    /// Probe every domain with at most `workers` lookups in flight.
    ///
    /// Domains are pulled lazily from `domains`; once `token` is cancelled no
    /// further domain is pulled, probes already running are allowed to finish.
    pub async fn run<I>(&self, domains: I, token: &CancellationToken) -> PrefilterReport
    where
        I: IntoIterator<Item = String>,
    {
        let completed = AtomicUsize::new(0);
        let mut report = PrefilterReport::default();

        let mut stream = stream::iter(domains)
            .take_while(|_| futures::future::ready(!token.is_cancelled()))
            .map(|domain| {
                let completed = &completed;
                async move {
                    let outcome = self.probe(&domain).await;
                    let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                    if done % PROGRESS_EVERY == 0 {
                        tracing::info!(probed = done, "DNS prefilter progress");
                    }
                    outcome
                }
            })
            .buffer_unordered(self.workers);

        while let Some(outcome) = stream.next().await {
            match &outcome.error {
                Some(error) => {
                    report.errors += 1;
                    tracing::debug!(domain = %outcome.domain, %error, "DNS probe failed");
                    if let Some(sink) = &self.sink {
                        sink.record_error(&outcome.domain, error);
                    }
                }
                None if !outcome.registered => {
                    report.likely_available += 1;
                    tracing::debug!(domain = %outcome.domain, "no DNS record");
                }
                None => {}
            }
            report.records.push(CheckRecord::from_probe(&outcome));
        }

        tracing::info!(
            probed = report.probed(),
            likely_available = report.likely_available,
            errors = report.errors,
            cancelled = token.is_cancelled(),
            "DNS prefilter finished"
        );
        report
    }
}

// domain-sieve-lib/tests/integration.rs

//! End-to-end pipeline tests with a stub resolver and a scripted registrar.

use async_trait::async_trait;
use domain_sieve_lib::{
    CheckRecord, DomainSieveError, GenerateConfig, Ledger, NameResolver, Pipeline, ProviderResponse,
    ProviderVerdict, RegistrarProvider, Resolution, RunConfig,
};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

struct StubResolver {
    answers: HashMap<String, Resolution>,
}

impl StubResolver {
    fn new(registered: &[&str], failing: &[&str]) -> Arc<Self> {
        let mut answers = HashMap::new();
        for domain in registered {
            answers.insert(domain.to_string(), Resolution::Found);
        }
        for domain in failing {
            answers.insert(
                domain.to_string(),
                Resolution::Failed("DNS lookup timed out after 5s".to_string()),
            );
        }
        Arc::new(Self { answers })
    }
}

#[async_trait]
impl NameResolver for StubResolver {
    async fn resolve(&self, domain: &str) -> Resolution {
        self.answers
            .get(domain)
            .cloned()
            .unwrap_or(Resolution::NoSuchName)
    }
}

/// Resolver that fires the run's cancellation token on its `after`-th lookup.
struct CancellingResolver {
    token: CancellationToken,
    after: usize,
    lookups: AtomicUsize,
}

#[async_trait]
impl NameResolver for CancellingResolver {
    async fn resolve(&self, _domain: &str) -> Resolution {
        if self.lookups.fetch_add(1, Ordering::SeqCst) + 1 == self.after {
            self.token.cancel();
        }
        Resolution::NoSuchName
    }
}

/// Registrar that confirms everything, optionally cancelling the run on its
/// first call.
struct InterruptingProvider {
    name: &'static str,
    interval: Duration,
    cancel_on_call: Option<CancellationToken>,
    asked: Mutex<Vec<String>>,
}

impl InterruptingProvider {
    fn new(name: &'static str, interval_secs: u64, cancel_on_call: Option<CancellationToken>) -> Arc<Self> {
        Arc::new(Self {
            name,
            interval: Duration::from_secs(interval_secs),
            cancel_on_call,
            asked: Mutex::new(Vec::new()),
        })
    }

    fn asked(&self) -> Vec<String> {
        self.asked.lock().unwrap().clone()
    }
}

#[async_trait]
impl RegistrarProvider for InterruptingProvider {
    fn name(&self) -> &str {
        self.name
    }

    fn min_interval(&self) -> Duration {
        self.interval
    }

    async fn check(&self, domain: &str) -> ProviderResponse {
        self.asked.lock().unwrap().push(domain.to_string());
        if let Some(token) = &self.cancel_on_call {
            token.cancel();
        }
        ProviderResponse::new(domain, self.name, ProviderVerdict::Available, "price 9.73")
    }
}

/// Registrar that answers from a fixed table and records what it was asked.
struct TableProvider {
    verdicts: HashMap<String, ProviderVerdict>,
    asked: Mutex<Vec<String>>,
}

impl TableProvider {
    fn new(verdicts: &[(&str, ProviderVerdict)]) -> Arc<Self> {
        Arc::new(Self {
            verdicts: verdicts
                .iter()
                .map(|(d, v)| (d.to_string(), *v))
                .collect(),
            asked: Mutex::new(Vec::new()),
        })
    }

    fn asked(&self) -> Vec<String> {
        self.asked.lock().unwrap().clone()
    }
}

#[async_trait]
impl RegistrarProvider for TableProvider {
    fn name(&self) -> &str {
        "table"
    }

    fn min_interval(&self) -> Duration {
        Duration::ZERO
    }

    async fn check(&self, domain: &str) -> ProviderResponse {
        self.asked.lock().unwrap().push(domain.to_string());
        let verdict = self
            .verdicts
            .get(domain)
            .copied()
            .unwrap_or(ProviderVerdict::Registered);
        let note = match verdict {
            ProviderVerdict::Available => "price 9.73".to_string(),
            ProviderVerdict::Error => "HTTP 500: boom".to_string(),
            other => format!("{:?}", other),
        };
        ProviderResponse::new(domain, "table", verdict, note)
    }
}

fn run_config(dir: &Path) -> RunConfig {
    RunConfig::default()
        .with_generate(GenerateConfig {
            alphabet: "ab".to_string(),
            length: 2,
            limit: 0,
            tld: ".com".to_string(),
            ..Default::default()
        })
        .with_dns_workers(4)
        .with_ledger_path(dir.join("checked_domains.csv"))
        .with_available_path(dir.join("available_domains.csv"))
        .with_error_log_path(dir.join("errors.log"))
        .with_providers_path(dir.join("config.json"))
}

fn read(path: impl AsRef<Path>) -> String {
    std::fs::read_to_string(path).unwrap_or_default()
}

#[tokio::test]
async fn test_full_run_with_verification() {
    let dir = TempDir::new().unwrap();
    let config = run_config(dir.path()).with_verify_api(true);
    let provider = TableProvider::new(&[
        ("ba.com", ProviderVerdict::Available),
        ("bb.com", ProviderVerdict::Registered),
    ]);

    let summary = Pipeline::new(config.clone())
        .with_resolver(StubResolver::new(&["aa.com"], &["ab.com"]))
        .with_providers(vec![provider.clone() as Arc<dyn RegistrarProvider>])
        .run()
        .await
        .unwrap();

    assert_eq!(summary.generated, 4);
    assert_eq!(summary.dns_likely_available, 2);
    assert_eq!(summary.dns_errors, 1);
    assert_eq!(summary.api_checked, 2);
    assert_eq!(summary.api_confirmed, 1);
    assert_eq!(summary.ledger_total, 4);
    assert_eq!(summary.ledger_confirmed, 1);
    assert!(!summary.cancelled);

    // Only DNS survivors reach the registrar.
    let mut asked = provider.asked();
    asked.sort();
    assert_eq!(asked, vec!["ba.com", "bb.com"]);

    let ledger = Ledger::load(&config.ledger_path).unwrap();
    assert!(ledger.get("ba.com").unwrap().is_confirmed_available());
    assert!(ledger.get("bb.com").unwrap().api_verified);
    assert!(!ledger.get("bb.com").unwrap().available);
    assert_eq!(ledger.get("ab.com").unwrap().note, "DNS lookup timed out after 5s");

    let export = read(&config.available_path);
    assert_eq!(export.lines().count(), 1);
    assert!(export.starts_with("ba.com,"));
    assert!(export.contains("price 9.73"));

    assert!(read(&config.error_log_path).contains(" - ab.com - DNS lookup timed out"));
}

#[tokio::test]
async fn test_second_run_is_a_no_op() {
    let dir = TempDir::new().unwrap();
    let config = run_config(dir.path());
    let resolver = StubResolver::new(&["aa.com"], &[]);

    let first = Pipeline::new(config.clone())
        .with_resolver(resolver.clone())
        .run()
        .await
        .unwrap();
    assert_eq!(first.generated, 4);

    let second = Pipeline::new(config)
        .with_resolver(resolver)
        .run()
        .await
        .unwrap();
    assert_eq!(second.generated, 0);
    assert_eq!(second.ledger_total, 4);
}

#[tokio::test]
async fn test_resume_from_existing_ledger() {
    let dir = TempDir::new().unwrap();
    let config = run_config(dir.path());

    let mut seed = Ledger::new();
    seed.merge(vec![CheckRecord {
        domain: "aa.com".to_string(),
        dns_checked: true,
        available: false,
        note: "registered".to_string(),
        ..Default::default()
    }]);
    seed.save(&config.ledger_path).unwrap();

    let summary = Pipeline::new(config)
        .with_resolver(StubResolver::new(&[], &[]))
        .run()
        .await
        .unwrap();

    assert_eq!(summary.generated, 3);
    assert_eq!(summary.ledger_total, 4);
}

#[tokio::test]
async fn test_verify_pending_only() {
    let dir = TempDir::new().unwrap();
    let config = run_config(dir.path());
    let resolver = StubResolver::new(&["aa.com", "ab.com"], &[]);

    Pipeline::new(config.clone())
        .with_resolver(resolver)
        .run()
        .await
        .unwrap();

    let provider = TableProvider::new(&[("bb.com", ProviderVerdict::Available)]);
    let summary = Pipeline::new(config.clone())
        .with_providers(vec![provider.clone() as Arc<dyn RegistrarProvider>])
        .verify_pending()
        .await
        .unwrap();

    assert_eq!(summary.generated, 0);
    assert_eq!(summary.api_checked, 2);
    assert_eq!(summary.api_confirmed, 1);

    let asked: HashSet<String> = provider.asked().into_iter().collect();
    assert_eq!(asked, HashSet::from(["ba.com".to_string(), "bb.com".to_string()]));

    // Nothing is left to verify.
    let ledger = Ledger::load(&config.ledger_path).unwrap();
    assert!(ledger.pending_verification().is_empty());
}

#[tokio::test]
async fn test_unresolved_api_result_stays_pending() {
    let dir = TempDir::new().unwrap();
    let config = run_config(dir.path()).with_verify_api(true);
    let provider = TableProvider::new(&[("bb.com", ProviderVerdict::Error)]);

    let summary = Pipeline::new(config.clone())
        .with_resolver(StubResolver::new(&["aa.com", "ab.com", "ba.com"], &[]))
        .with_providers(vec![provider as Arc<dyn RegistrarProvider>])
        .run()
        .await
        .unwrap();
    assert_eq!(summary.api_unresolved, 1);

    let ledger = Ledger::load(&config.ledger_path).unwrap();
    let record = ledger.get("bb.com").unwrap();
    assert!(!record.api_verified);
    assert!(record.is_pending_verification());
    assert_eq!(record.note, "HTTP 500: boom");
    assert!(read(&config.error_log_path).contains("bb.com - table: HTTP 500: boom"));
}

#[tokio::test]
async fn test_verification_without_providers_fails_before_touching_ledger() {
    let dir = TempDir::new().unwrap();
    let config = run_config(dir.path()).with_verify_api(true);

    let err = Pipeline::new(config.clone())
        .with_resolver(StubResolver::new(&[], &[]))
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, DomainSieveError::ConfigError { .. }));
    assert!(!config.ledger_path.exists());
}

#[tokio::test]
async fn test_invalid_generation_is_config_error() {
    let dir = TempDir::new().unwrap();
    let mut config = run_config(dir.path());
    config.generate.length = 0;

    let err = Pipeline::new(config.clone())
        .with_resolver(StubResolver::new(&[], &[]))
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err, DomainSieveError::ConfigError { .. }));
    assert!(!config.ledger_path.exists());
}

#[tokio::test]
async fn test_cancelled_run_still_saves() {
    let dir = TempDir::new().unwrap();
    let config = run_config(dir.path()).with_verify_api(true);
    let provider = TableProvider::new(&[]);

    let token = CancellationToken::new();
    token.cancel();

    let summary = Pipeline::new(config.clone())
        .with_resolver(StubResolver::new(&[], &[]))
        .with_providers(vec![provider.clone() as Arc<dyn RegistrarProvider>])
        .with_cancellation(token)
        .run()
        .await
        .unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.generated, 0);
    assert!(provider.asked().is_empty());
    assert!(config.ledger_path.exists());
}

#[tokio::test]
async fn test_interrupt_during_dns_keeps_finished_probes() {
    let dir = TempDir::new().unwrap();
    // One worker, so exactly two lookups finish before the token fires.
    let config = run_config(dir.path()).with_dns_workers(1).with_verify_api(true);
    let provider = TableProvider::new(&[]);

    let token = CancellationToken::new();
    let resolver = Arc::new(CancellingResolver {
        token: token.clone(),
        after: 2,
        lookups: AtomicUsize::new(0),
    });

    let summary = Pipeline::new(config.clone())
        .with_resolver(resolver)
        .with_providers(vec![provider.clone() as Arc<dyn RegistrarProvider>])
        .with_cancellation(token)
        .run()
        .await
        .unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.dns_checked, 2);
    assert_eq!(summary.api_checked, 0);
    assert!(provider.asked().is_empty());

    let ledger = Ledger::load(&config.ledger_path).unwrap();
    assert_eq!(ledger.len(), 2);
    for domain in ["aa.com", "ab.com"] {
        let record = ledger.get(domain).unwrap();
        assert!(record.dns_checked);
        assert!(!record.api_verified);
    }
}

#[tokio::test(start_paused = true)]
async fn test_interrupt_during_parallel_verification_saves_answers() {
    let dir = TempDir::new().unwrap();
    let config = run_config(dir.path()).with_api_lanes(2);

    let mut ledger = Ledger::new();
    ledger.merge((0..6).map(|i| CheckRecord {
        domain: format!("d{}.com", i),
        dns_checked: true,
        available: true,
        ..Default::default()
    }));
    ledger.save(&config.ledger_path).unwrap();

    let token = CancellationToken::new();
    // The slow lane is polled first and has one call out before the fast
    // lane's first answer cancels the run.
    let slow = InterruptingProvider::new("slow", 11, None);
    let fast = InterruptingProvider::new("fast", 2, Some(token.clone()));

    let start = tokio::time::Instant::now();
    let summary = Pipeline::new(config.clone())
        .with_providers(vec![
            slow.clone() as Arc<dyn RegistrarProvider>,
            fast.clone() as Arc<dyn RegistrarProvider>,
        ])
        .with_cancellation(token)
        .verify_pending()
        .await
        .unwrap();

    // Neither lane waited out its interval for a second call.
    assert!(start.elapsed() < Duration::from_secs(2));
    assert_eq!(slow.asked().len(), 1);
    assert_eq!(fast.asked().len(), 1);
    assert!(summary.cancelled);
    assert_eq!(summary.api_checked, 2);
    assert_eq!(summary.api_confirmed, 2);

    let saved = Ledger::load(&config.ledger_path).unwrap();
    assert_eq!(saved.len(), 6);
    let verified: HashSet<String> = saved
        .records()
        .iter()
        .filter(|r| r.api_verified)
        .map(|r| r.domain.clone())
        .collect();
    let asked: HashSet<String> = slow.asked().into_iter().chain(fast.asked()).collect();
    assert_eq!(verified, asked);
    assert_eq!(saved.pending_verification().len(), 4);
}

#[test]
fn test_library_info() {
    let info = domain_sieve_lib::info();
    assert_eq!(info.version, domain_sieve_lib::VERSION);
    assert!(info.providers.contains(&"porkbun"));
    assert!(info.providers.contains(&"dynadot"));
}

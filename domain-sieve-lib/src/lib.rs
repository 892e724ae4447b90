//! # Domain Sieve Library
//!
//! Finds short, unregistered domain names. Candidates are enumerated from an
//! alphabet, a cheap DNS existence probe discards the bulk of registered
//! names, and the survivors are confirmed against registrar APIs that are
//! strictly rate-limited. Everything examined is recorded in a CSV ledger,
//! which makes runs resumable and incremental.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use domain_sieve_lib::{GenerateConfig, Pipeline, RunConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RunConfig::default()
//!         .with_generate(GenerateConfig {
//!             alphabet: "abc".to_string(),
//!             length: 3,
//!             ..Default::default()
//!         })
//!         .with_verify_api(true);
//!
//!     let summary = Pipeline::new(config).run().await?;
//!     println!("confirmed: {}", summary.api_confirmed);
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Lazy generation**: product-order enumeration that skips ledger entries
//! - **DNS prefilter**: bounded-concurrency probes with conservative error handling
//! - **Registrar verification**: Porkbun and Dynadot, each paced by its own limiter,
//!   sequentially or one lane per registrar
//! - **Crash-safe ledger**: atomic rewrite after every stage

// Re-export main public API types and functions
pub use config::{
    load_env_config, load_env_config_from, load_provider_configs, ConfigManager, DefaultsConfig,
    EnvConfig, FileConfig, PathsConfig, ProviderConfig,
};
pub use error::DomainSieveError;
pub use ledger::{Ledger, LedgerStats};
pub use pipeline::Pipeline;
pub use prefilter::{DnsPrefilter, NameResolver, PrefilterReport, Resolution, SystemResolver};
pub use providers::{build_active_providers, ProviderKind, RegistrarProvider};
pub use ratelimit::RateLimiter;
pub use sink::ResultSink;
pub use types::{
    AvailabilityResult, AvailabilityStatus, CheckRecord, CheckSource, GenerateConfig,
    ProbeOutcome, ProviderResponse, ProviderVerdict, RetryPolicy, RunConfig, RunSummary,
};
pub use verifier::{RegistrarVerifier, Strategy, VerificationReport, VerifierOptions};

// Public modules
pub mod generate;
pub mod providers;

// Internal modules - these are not part of the public API
mod config;
mod error;
mod ledger;
mod pipeline;
mod prefilter;
mod ratelimit;
mod sink;
mod types;
mod utils;
mod verifier;

// Library version and metadata
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Information about the library build and features
#[derive(Debug, Clone)]
pub struct LibraryInfo {
    pub version: &'static str,
    pub providers: Vec<&'static str>,
}

/// Library version and the registrar backends compiled in.
pub fn info() -> LibraryInfo {
    LibraryInfo {
        version: VERSION,
        providers: enabled_providers(),
    }
}

#[allow(clippy::vec_init_then_push)]
fn enabled_providers() -> Vec<&'static str> {
    let mut providers = Vec::new();

    #[cfg(feature = "porkbun")]
    providers.push("porkbun");

    #[cfg(feature = "dynadot")]
    providers.push("dynadot");

    providers
}

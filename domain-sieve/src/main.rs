//! Domain Sieve CLI Application
//!
//! Generates short candidate names, drops the ones that resolve in DNS and
//! confirms the rest with registrar APIs. A thin front end over
//! domain-sieve-lib: argument parsing, layered configuration, log setup and
//! the run summary.

mod ui;

use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::Parser;
use domain_sieve_lib::generate::{alphabet_for_pattern, alphabet_preset, ALPHANUMERIC, DIGITS, LETTERS};
use domain_sieve_lib::{
    load_env_config, ConfigManager, DomainSieveError, EnvConfig, Pipeline, ProviderKind,
    RetryPolicy, RunConfig, RunSummary,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

/// CLI arguments for domain-sieve
#[derive(Parser, Debug)]
#[command(name = "domain-sieve")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Find unregistered short domain names")]
#[command(
    long_about = "Find unregistered short domain names.\n\nCandidates are enumerated from an alphabet, names that resolve in DNS are dropped, and the survivors can be confirmed against the Porkbun and Dynadot APIs. Every checked name is kept in a CSV ledger, so re-running continues where the last run stopped."
)]
#[command(styles = STYLES)]
pub struct Args {
    /// Alphabet to build names from, or a preset (easy, letters, digits, alphanumeric)
    #[arg(value_name = "CHARACTERS", help_heading = "Generation")]
    pub characters_arg: Option<String>,

    /// Same as the positional CHARACTERS
    #[arg(
        short = 'c',
        long = "characters",
        value_name = "CHARACTERS",
        conflicts_with = "characters_arg",
        help_heading = "Generation"
    )]
    pub characters: Option<String>,

    /// Use all 26 letters
    #[arg(long = "letters", help_heading = "Generation")]
    pub letters: bool,

    /// Use digits only
    #[arg(long = "digits", help_heading = "Generation")]
    pub digits: bool,

    /// Use letters and digits
    #[arg(long = "alphanumeric", help_heading = "Generation")]
    pub alphanumeric: bool,

    /// Alphabet shorthand: l = letters, d = digits, ld = both
    #[arg(long = "pattern", value_name = "PATTERN", help_heading = "Generation")]
    pub pattern: Option<String>,

    /// Characters per name, before prefix and suffix [default: 4]
    #[arg(short = 'l', long = "length", help_heading = "Generation")]
    pub length: Option<usize>,

    /// Maximum new candidates this run, 0 = all [default: 1000]
    #[arg(short = 'n', long = "limit", help_heading = "Generation")]
    pub limit: Option<usize>,

    /// Fixed text placed before every name
    #[arg(long = "prefix", value_name = "PREFIX", help_heading = "Generation")]
    pub prefix: Option<String>,

    /// Fixed text placed after every name
    #[arg(long = "suffix", value_name = "SUFFIX", help_heading = "Generation")]
    pub suffix: Option<String>,

    /// Top-level domain [default: .com]
    #[arg(short = 't', long = "tld", value_name = "TLD", help_heading = "Generation")]
    pub tld: Option<String>,

    /// Concurrent DNS lookups, 1-500 [default: 20]
    #[arg(long = "threads", help_heading = "DNS")]
    pub threads: Option<usize>,

    /// Confirm DNS survivors with the registrar APIs
    #[arg(long = "verify-api", help_heading = "Registrar")]
    pub verify_api: bool,

    /// Skip generation and confirm only the ledger's pending domains
    #[arg(long = "only-verify-api", help_heading = "Registrar")]
    pub only_verify_api: bool,

    /// Parallel registrar lanes, one per active provider [default: 1]
    #[arg(long = "api-lanes", help_heading = "Registrar")]
    pub api_lanes: Option<usize>,

    /// Use only this registrar (porkbun, dynadot)
    #[arg(long = "provider", value_name = "NAME", help_heading = "Registrar")]
    pub provider: Option<String>,

    /// Retry a rate-limited domain on another registrar
    #[arg(long = "failover", help_heading = "Registrar")]
    pub failover: bool,

    /// Consecutive failures that stop a registrar lane [default: 5]
    #[arg(long = "max-errors", help_heading = "Registrar")]
    pub max_errors: Option<usize>,

    /// Ledger of every checked domain
    #[arg(long = "check-file", value_name = "FILE", help_heading = "Files")]
    pub check_file: Option<PathBuf>,

    /// Export of confirmed-available domains
    #[arg(long = "available-file", value_name = "FILE", help_heading = "Files")]
    pub available_file: Option<PathBuf>,

    /// Per-domain error log
    #[arg(long = "error-file", value_name = "FILE", help_heading = "Files")]
    pub error_file: Option<PathBuf>,

    /// Registrar credentials (JSON, or TOML with a .toml extension)
    #[arg(long = "providers-file", value_name = "FILE", help_heading = "Files")]
    pub providers_file: Option<PathBuf>,

    /// Use specific config file instead of automatic discovery
    #[arg(long = "config", value_name = "FILE", help_heading = "Configuration")]
    pub config: Option<PathBuf>,

    /// Print the run summary as JSON
    #[arg(short = 'j', long = "json", help_heading = "Output Format")]
    pub json: bool,

    /// Debug-level logging
    #[arg(short = 'v', long = "verbose", help_heading = "Output Format")]
    pub verbose: bool,
}

/// JSON form of a finished run.
#[derive(Debug, Serialize)]
struct JsonReport<'a> {
    version: &'static str,
    mode: &'static str,
    ledger_file: &'a Path,
    available_file: &'a Path,
    elapsed_secs: f64,
    #[serde(flatten)]
    summary: &'a RunSummary,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Validate arguments
    if let Err(e) = validate_args(&args) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }

    init_tracing(args.verbose);

    if let Err(e) = run(args).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Log to stderr so stdout carries only the summary. `RUST_LOG` wins over
/// `--verbose`.
fn init_tracing(verbose: bool) {
    let fallback = if verbose {
        "info,domain_sieve=debug,domain_sieve_lib=debug"
    } else {
        "info"
    };

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| fallback.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init();
}

/// Validate command line arguments
fn validate_args(args: &Args) -> Result<(), String> {
    let alphabet_sources = [
        args.characters_arg.is_some() || args.characters.is_some(),
        args.letters,
        args.digits,
        args.alphanumeric,
        args.pattern.is_some(),
    ]
    .iter()
    .filter(|&&x| x)
    .count();

    if alphabet_sources > 1 {
        return Err(
            "Cannot specify multiple alphabets. Use only one of: CHARACTERS, --letters, --digits, --alphanumeric, --pattern"
                .to_string(),
        );
    }

    if let Some(pattern) = &args.pattern {
        if alphabet_for_pattern(pattern).is_none() {
            return Err(format!(
                "Invalid pattern '{}': use l (letters), d (digits) or ld",
                pattern
            ));
        }
    }

    if args.length == Some(0) {
        return Err("Length must be at least 1".to_string());
    }

    if let Some(threads) = args.threads {
        if threads == 0 || threads > 500 {
            return Err("Threads must be between 1 and 500".to_string());
        }
    }

    if args.api_lanes == Some(0) {
        return Err("API lanes must be at least 1".to_string());
    }

    if args.max_errors == Some(0) {
        return Err("Max errors must be at least 1".to_string());
    }

    if let Some(provider) = &args.provider {
        provider
            .parse::<ProviderKind>()
            .map_err(|e| e.to_string())?;
    }

    if args.only_verify_api && args.alphabet().is_some() {
        return Err("--only-verify-api does not generate names; drop the alphabet".to_string());
    }

    Ok(())
}

impl Args {
    /// Alphabet selected on the command line, if any.
    fn alphabet(&self) -> Option<String> {
        if let Some(characters) = self.characters_arg.as_ref().or(self.characters.as_ref()) {
            return Some(
                alphabet_preset(characters)
                    .map(str::to_string)
                    .unwrap_or_else(|| characters.clone()),
            );
        }
        if self.letters {
            return Some(LETTERS.to_string());
        }
        if self.digits {
            return Some(DIGITS.to_string());
        }
        if self.alphanumeric {
            return Some(ALPHANUMERIC.to_string());
        }
        self.pattern.as_deref().and_then(alphabet_for_pattern)
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = build_config(&args, load_env_config())?;

    let token = CancellationToken::new();
    let interrupt = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, saving progress");
            interrupt.cancel();
        }
    });

    if !args.json {
        ui::print_header(&config, args.only_verify_api);
    }

    let started = Instant::now();
    let pipeline = Pipeline::new(config.clone()).with_cancellation(token);
    let summary = if args.only_verify_api {
        pipeline.verify_pending().await?
    } else {
        pipeline.run().await?
    };
    let elapsed = started.elapsed();

    if args.json {
        let report = JsonReport {
            version: env!("CARGO_PKG_VERSION"),
            mode: if args.only_verify_api { "verify-only" } else { "run" },
            ledger_file: &config.ledger_path,
            available_file: &config.available_path,
            elapsed_secs: elapsed.as_secs_f64(),
            summary: &summary,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        ui::print_summary(&summary, &config, elapsed);
    }

    Ok(())
}

/// Build the run configuration with full precedence:
/// defaults < config file < environment < command line.
fn build_config(args: &Args, env_config: EnvConfig) -> Result<RunConfig, DomainSieveError> {
    let manager = ConfigManager::new(args.verbose);

    // An explicit --config wins over DS_CONFIG; otherwise discover
    let explicit = args
        .config
        .clone()
        .or_else(|| env_config.config.as_ref().map(PathBuf::from));
    let file_config = match explicit {
        Some(path) => manager.load_file(path)?,
        None => manager.discover_and_load()?,
    };

    let config = file_config.apply(RunConfig::default());
    let config = env_config.apply(config);
    Ok(apply_cli_args_to_config(config, args))
}

/// Apply CLI arguments to config (highest precedence).
///
/// Only flags the user actually passed override earlier layers.
fn apply_cli_args_to_config(mut config: RunConfig, args: &Args) -> RunConfig {
    if let Some(alphabet) = args.alphabet() {
        config.generate.alphabet = alphabet;
    }
    if let Some(length) = args.length {
        config.generate.length = length;
    }
    if let Some(limit) = args.limit {
        config.generate.limit = limit;
    }
    if let Some(prefix) = &args.prefix {
        config.generate.prefix = prefix.clone();
    }
    if let Some(suffix) = &args.suffix {
        config.generate.suffix = suffix.clone();
    }
    if let Some(tld) = &args.tld {
        config.generate.tld = tld.clone();
    }

    if let Some(threads) = args.threads {
        config = config.with_dns_workers(threads);
    }
    if args.verify_api || args.only_verify_api {
        config = config.with_verify_api(true);
    }
    if let Some(lanes) = args.api_lanes {
        config = config.with_api_lanes(lanes);
    }
    if args.provider.is_some() {
        config = config.with_pinned_provider(args.provider.clone());
    }
    if args.failover {
        config = config.with_retry_policy(RetryPolicy::Failover);
    }
    if let Some(max) = args.max_errors {
        config = config.with_max_consecutive_errors(max);
    }

    if let Some(path) = &args.check_file {
        config = config.with_ledger_path(path);
    }
    if let Some(path) = &args.available_file {
        config = config.with_available_path(path);
    }
    if let Some(path) = &args.error_file {
        config = config.with_error_log_path(path);
    }
    if let Some(path) = &args.providers_file {
        config = config.with_providers_path(path);
    }

    config
}

//! Configuration loading: TOML settings files, `DS_*` environment variables
//! and the registrar credentials document.
//!
//! Precedence, lowest to highest: built-in defaults, config files
//! (XDG, then home, then the current directory), environment, command line.
//! Each layer is applied onto a [`RunConfig`] with the `apply` methods below;
//! the command line is applied last by the binary.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::DomainSieveError;
use crate::generate::alphabet_preset;
use crate::providers::ProviderKind;
use crate::types::{RetryPolicy, RunConfig};

/// Settings file (`domain-sieve.toml`).
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct FileConfig {
    /// Default values for run options
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defaults: Option<DefaultsConfig>,

    /// Where the ledger and result files live
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paths: Option<PathsConfig>,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct DefaultsConfig {
    /// Alphabet, or a preset name (easy, letters, digits, alphanumeric)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub characters: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<usize>,

    /// Maximum candidates per run, 0 = all
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tld: Option<String>,

    /// DNS pool width
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threads: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub verify_api: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_lanes: Option<usize>,

    /// Pin the sequential strategy to one registrar
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_policy: Option<RetryPolicy>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_errors: Option<usize>,

    /// DNS lookup timeout ("5s", "1m")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns_timeout: Option<String>,

    /// Registrar HTTP timeout ("10s")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_timeout: Option<String>,
}

/// `[paths]` section.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct PathsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_file: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_file: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_file: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub providers_file: Option<PathBuf>,
}

impl FileConfig {
    /// Overlay this file's values onto `config`.
    pub fn apply(&self, mut config: RunConfig) -> RunConfig {
        if let Some(defaults) = &self.defaults {
            if let Some(characters) = &defaults.characters {
                config.generate.alphabet = resolve_alphabet(characters);
            }
            if let Some(length) = defaults.length {
                config.generate.length = length;
            }
            if let Some(limit) = defaults.limit {
                config.generate.limit = limit;
            }
            if let Some(prefix) = &defaults.prefix {
                config.generate.prefix = prefix.clone();
            }
            if let Some(suffix) = &defaults.suffix {
                config.generate.suffix = suffix.clone();
            }
            if let Some(tld) = &defaults.tld {
                config.generate.tld = tld.clone();
            }
            if let Some(threads) = defaults.threads {
                config = config.with_dns_workers(threads);
            }
            if let Some(verify) = defaults.verify_api {
                config = config.with_verify_api(verify);
            }
            if let Some(lanes) = defaults.api_lanes {
                config = config.with_api_lanes(lanes);
            }
            if defaults.provider.is_some() {
                config = config.with_pinned_provider(defaults.provider.clone());
            }
            if let Some(policy) = defaults.retry_policy {
                config = config.with_retry_policy(policy);
            }
            if let Some(max) = defaults.max_errors {
                config = config.with_max_consecutive_errors(max);
            }
            if let Some(secs) = defaults.dns_timeout.as_deref().and_then(parse_timeout_string) {
                config.dns_timeout = Duration::from_secs(secs);
            }
            if let Some(secs) = defaults.http_timeout.as_deref().and_then(parse_timeout_string) {
                config.http_timeout = Duration::from_secs(secs);
            }
        }

        if let Some(paths) = &self.paths {
            if let Some(path) = &paths.check_file {
                config = config.with_ledger_path(path);
            }
            if let Some(path) = &paths.available_file {
                config = config.with_available_path(path);
            }
            if let Some(path) = &paths.error_file {
                config = config.with_error_log_path(path);
            }
            if let Some(path) = &paths.providers_file {
                config = config.with_providers_path(path);
            }
        }

        config
    }
}

/// Configuration discovery and loading functionality.
pub struct ConfigManager {
    /// Log every discovered file at info level instead of debug
    pub verbose: bool,
}

impl ConfigManager {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Load and validate one settings file.
    pub fn load_file<P: AsRef<Path>>(&self, path: P) -> Result<FileConfig, DomainSieveError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(DomainSieveError::file_error(
                path.to_string_lossy(),
                "Configuration file not found",
            ));
        }

        let content = fs::read_to_string(path).map_err(|e| {
            DomainSieveError::file_error(
                path.to_string_lossy(),
                format!("Failed to read configuration file: {}", e),
            )
        })?;

        let config: FileConfig = toml::from_str(&content)?;
        self.validate_config(&config)?;

        Ok(config)
    }

    /// Load every settings file found in the standard locations, merged with
    /// the closest one winning field by field.
    ///
    /// A file that fails to parse or validate is an error; missing files are
    /// skipped.
    pub fn discover_and_load(&self) -> Result<FileConfig, DomainSieveError> {
        let mut merged = FileConfig::default();

        let candidates = [
            self.get_xdg_config_path(),
            self.get_global_config_path(),
            self.get_local_config_path(),
        ];

        for path in candidates.into_iter().flatten() {
            let config = self.load_file(&path)?;
            if self.verbose {
                tracing::info!(path = %path.display(), "loaded config file");
            } else {
                tracing::debug!(path = %path.display(), "loaded config file");
            }
            merged = self.merge_configs(merged, config);
        }

        Ok(merged)
    }

    fn get_local_config_path(&self) -> Option<PathBuf> {
        ["./domain-sieve.toml", "./.domain-sieve.toml"]
            .iter()
            .map(Path::new)
            .find(|p| p.exists())
            .map(Path::to_path_buf)
    }

    fn get_global_config_path(&self) -> Option<PathBuf> {
        let path = Path::new(&env::var_os("HOME")?).join(".domain-sieve.toml");
        path.exists().then_some(path)
    }

    /// Follows the XDG Base Directory Specification.
    fn get_xdg_config_path(&self) -> Option<PathBuf> {
        let config_dir = env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| env::var_os("HOME").map(|home| Path::new(&home).join(".config")))?;

        let path = config_dir.join("domain-sieve").join("config.toml");
        path.exists().then_some(path)
    }

    /// Values from `higher` take precedence over values from `lower`.
    fn merge_configs(&self, lower: FileConfig, higher: FileConfig) -> FileConfig {
        FileConfig {
            defaults: match (lower.defaults, higher.defaults) {
                (Some(lo), Some(hi)) => Some(DefaultsConfig {
                    characters: hi.characters.or(lo.characters),
                    length: hi.length.or(lo.length),
                    limit: hi.limit.or(lo.limit),
                    prefix: hi.prefix.or(lo.prefix),
                    suffix: hi.suffix.or(lo.suffix),
                    tld: hi.tld.or(lo.tld),
                    threads: hi.threads.or(lo.threads),
                    verify_api: hi.verify_api.or(lo.verify_api),
                    api_lanes: hi.api_lanes.or(lo.api_lanes),
                    provider: hi.provider.or(lo.provider),
                    retry_policy: hi.retry_policy.or(lo.retry_policy),
                    max_errors: hi.max_errors.or(lo.max_errors),
                    dns_timeout: hi.dns_timeout.or(lo.dns_timeout),
                    http_timeout: hi.http_timeout.or(lo.http_timeout),
                }),
                (lo, hi) => hi.or(lo),
            },
            paths: match (lower.paths, higher.paths) {
                (Some(lo), Some(hi)) => Some(PathsConfig {
                    check_file: hi.check_file.or(lo.check_file),
                    available_file: hi.available_file.or(lo.available_file),
                    error_file: hi.error_file.or(lo.error_file),
                    providers_file: hi.providers_file.or(lo.providers_file),
                }),
                (lo, hi) => hi.or(lo),
            },
        }
    }

    fn validate_config(&self, config: &FileConfig) -> Result<(), DomainSieveError> {
        let Some(defaults) = &config.defaults else {
            return Ok(());
        };

        if defaults.length == Some(0) {
            return Err(DomainSieveError::config("length must be at least 1"));
        }
        if let Some(threads) = defaults.threads {
            if threads == 0 || threads > 500 {
                return Err(DomainSieveError::config("threads must be between 1 and 500"));
            }
        }
        if defaults.api_lanes == Some(0) {
            return Err(DomainSieveError::config("api_lanes must be at least 1"));
        }
        if defaults.max_errors == Some(0) {
            return Err(DomainSieveError::config("max_errors must be at least 1"));
        }
        if let Some(provider) = &defaults.provider {
            provider.parse::<ProviderKind>()?;
        }
        for timeout in [&defaults.dns_timeout, &defaults.http_timeout].into_iter().flatten() {
            if parse_timeout_string(timeout).is_none() {
                return Err(DomainSieveError::config(format!(
                    "Invalid timeout format '{}'. Use format like '5s', '30s', '2m'",
                    timeout
                )));
            }
        }

        Ok(())
    }
}

/// Values read from `DS_*` environment variables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvConfig {
    pub characters: Option<String>,
    pub length: Option<usize>,
    pub limit: Option<usize>,
    pub tld: Option<String>,
    pub threads: Option<usize>,
    pub api_lanes: Option<usize>,
    pub verify_api: Option<bool>,
    /// Explicit settings file (`DS_CONFIG`)
    pub config: Option<String>,
}

impl EnvConfig {
    /// Overlay the environment values onto `config`.
    pub fn apply(&self, mut config: RunConfig) -> RunConfig {
        if let Some(characters) = &self.characters {
            config.generate.alphabet = resolve_alphabet(characters);
        }
        if let Some(length) = self.length {
            config.generate.length = length;
        }
        if let Some(limit) = self.limit {
            config.generate.limit = limit;
        }
        if let Some(tld) = &self.tld {
            config.generate.tld = tld.clone();
        }
        if let Some(threads) = self.threads {
            config = config.with_dns_workers(threads);
        }
        if let Some(lanes) = self.api_lanes {
            config = config.with_api_lanes(lanes);
        }
        if let Some(verify) = self.verify_api {
            config = config.with_verify_api(verify);
        }
        config
    }
}

/// Read the `DS_*` variables from the process environment.
///
/// Invalid values are logged as warnings and ignored.
pub fn load_env_config() -> EnvConfig {
    load_env_config_from(|key| env::var(key).ok())
}

/// Same as [`load_env_config`] with an injectable variable source.
pub fn load_env_config_from<F>(lookup: F) -> EnvConfig
where
    F: Fn(&str) -> Option<String>,
{
    let mut env_config = EnvConfig::default();

    let text = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
    let number = |key: &str, min: usize, max: usize| {
        let raw = text(key)?;
        match raw.parse::<usize>() {
            Ok(n) if (min..=max).contains(&n) => {
                tracing::debug!(key, value = n, "using environment override");
                Some(n)
            }
            _ => {
                tracing::warn!(key, value = %raw, min, max, "ignoring invalid environment value");
                None
            }
        }
    };

    env_config.characters = text("DS_CHARACTERS");
    env_config.length = number("DS_LENGTH", 1, 63);
    env_config.limit = number("DS_LIMIT", 0, usize::MAX);
    env_config.tld = text("DS_TLD");
    env_config.threads = number("DS_THREADS", 1, 500);
    env_config.api_lanes = number("DS_API_LANES", 1, usize::MAX);
    env_config.config = text("DS_CONFIG");

    if let Some(raw) = text("DS_VERIFY_API") {
        match raw.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => env_config.verify_api = Some(true),
            "false" | "0" | "no" | "off" => env_config.verify_api = Some(false),
            _ => tracing::warn!(key = "DS_VERIFY_API", value = %raw, "ignoring invalid environment value"),
        }
    }

    env_config
}

/// Resolved credentials and pacing for one registrar.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    /// Registrar name ("porkbun", "dynadot")
    pub name: String,
    pub api_key: String,
    pub api_secret: Option<String>,
    /// Only active providers take part in verification
    pub active: bool,
    /// Overrides the registrar's built-in interval
    pub min_interval: Option<Duration>,
    /// Overrides the registrar's API host
    pub base_url: Option<String>,
}

impl ProviderConfig {
    pub fn new<N: Into<String>, K: Into<String>>(name: N, api_key: K) -> Self {
        Self {
            name: name.into(),
            api_key: api_key.into(),
            api_secret: None,
            active: true,
            min_interval: None,
            base_url: None,
        }
    }

    pub fn with_secret<S: Into<String>>(mut self, secret: S) -> Self {
        self.api_secret = Some(secret.into());
        self
    }

    pub fn with_min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = Some(interval);
        self
    }

    pub fn with_base_url<U: Into<String>>(mut self, base_url: U) -> Self {
        self.base_url = Some(base_url.into());
        self
    }
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct ProviderEntry {
    #[serde(default)]
    api_key: String,
    #[serde(default)]
    api_secret: Option<String>,
    #[serde(default = "default_active")]
    active: bool,
    #[serde(default)]
    min_interval_secs: Option<f64>,
    #[serde(default)]
    base_url: Option<String>,
}

/// Either the multi-provider document or the older single-provider shape.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ProvidersDocument {
    Multi {
        providers: BTreeMap<String, ProviderEntry>,
    },
    Legacy {
        provider: String,
        #[serde(default)]
        api_key: String,
        #[serde(default)]
        api_secret: Option<String>,
    },
}

/// Load registrar credentials from a JSON (or `.toml`) document.
///
/// A missing file yields no providers. The legacy
/// `{"provider", "api_key", "api_secret"}` shape is accepted and treated as a
/// single active provider.
pub fn load_provider_configs<P: AsRef<Path>>(path: P) -> Result<Vec<ProviderConfig>, DomainSieveError> {
    let path = path.as_ref();
    if !path.exists() {
        tracing::warn!(path = %path.display(), "provider config not found, no registrars configured");
        return Ok(Vec::new());
    }

    let content = fs::read_to_string(path).map_err(|e| {
        DomainSieveError::file_error(
            path.to_string_lossy(),
            format!("Failed to read provider config: {}", e),
        )
    })?;

    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let document: ProvidersDocument = if is_toml {
        toml::from_str(&content)?
    } else {
        serde_json::from_str(&content).map_err(|e| {
            DomainSieveError::config(format!(
                "Failed to parse provider config {}: {}",
                path.display(),
                e
            ))
        })?
    };

    parse_providers(document)
}

fn parse_providers(document: ProvidersDocument) -> Result<Vec<ProviderConfig>, DomainSieveError> {
    match document {
        ProvidersDocument::Multi { providers } => providers
            .into_iter()
            .map(|(name, entry)| {
                let min_interval = entry
                    .min_interval_secs
                    .map(|secs| {
                        Duration::try_from_secs_f64(secs).map_err(|e| {
                            DomainSieveError::config(format!(
                                "provider '{}' has an invalid min_interval_secs {}: {}",
                                name, secs, e
                            ))
                        })
                    })
                    .transpose()?;
                Ok(ProviderConfig {
                    name: name.to_lowercase(),
                    api_key: entry.api_key,
                    api_secret: entry.api_secret.filter(|s| !s.is_empty()),
                    active: entry.active,
                    min_interval,
                    base_url: entry.base_url,
                })
            })
            .collect(),
        ProvidersDocument::Legacy {
            provider,
            api_key,
            api_secret,
        } => Ok(vec![ProviderConfig {
            name: provider.to_lowercase(),
            api_key,
            api_secret: api_secret.filter(|s| !s.is_empty()),
            active: true,
            min_interval: None,
            base_url: None,
        }]),
    }
}

/// Expand a preset name, or keep the string as a literal alphabet.
fn resolve_alphabet(characters: &str) -> String {
    alphabet_preset(characters)
        .map(str::to_string)
        .unwrap_or_else(|| characters.to_string())
}

/// Parse a timeout string like "5s", "30s", "2m" into seconds.
pub fn parse_timeout_string(timeout_str: &str) -> Option<u64> {
    let timeout_str = timeout_str.trim().to_lowercase();

    if let Some(secs) = timeout_str.strip_suffix('s') {
        secs.parse::<u64>().ok()
    } else if let Some(mins) = timeout_str.strip_suffix('m') {
        mins.parse::<u64>().ok().map(|m| m * 60)
    } else {
        // Assume seconds if no unit
        timeout_str.parse::<u64>().ok()
    }
}

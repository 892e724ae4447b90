//! Candidate domain generation.
//!
//! Candidates are `prefix + body + suffix + tld`, where `body` runs over every
//! string of a fixed length drawn from an alphabet, in lexicographic product
//! order (leftmost character varies slowest). Generation is lazy: the
//! [`Candidates`] iterator walks an odometer and never materializes the full
//! product, so a `limit` of a few thousand over a space of millions costs only
//! what it yields.
//!
//! # Examples
//!
//! ```
//! use domain_sieve_lib::generate::generate;
//! use domain_sieve_lib::GenerateConfig;
//!
//! let config = GenerateConfig {
//!     alphabet: "ab".to_string(),
//!     length: 2,
//!     limit: 3,
//!     tld: ".com".to_string(),
//!     ..Default::default()
//! };
//! let names: Vec<String> = generate(&config, |_| false).unwrap().collect();
//! assert_eq!(names, vec!["aa.com", "ab.com", "ba.com"]);
//! ```

use crate::error::DomainSieveError;
use crate::types::GenerateConfig;
use crate::utils::is_label_char;

/// Easy-to-read letters: a-z without the look-alikes i, l, o, q, v, x, z.
pub const EASY_LETTERS: &str = "abcdefhkmnprstuwy";

/// All lowercase letters.
pub const LETTERS: &str = "abcdefghijklmnopqrstuvwxyz";

/// Decimal digits.
pub const DIGITS: &str = "0123456789";

/// Letters followed by digits.
pub const ALPHANUMERIC: &str = "abcdefghijklmnopqrstuvwxyz0123456789";

/// Planned combination counts above this get a warning.
const LARGE_RUN_WARNING: u64 = 10_000;

/// Longest DNS label.
const MAX_LABEL_LEN: usize = 63;

/// Look up a named alphabet preset (`easy`, `letters`, `digits`, `alphanumeric`).
pub fn alphabet_preset(name: &str) -> Option<&'static str> {
    match name.to_lowercase().as_str() {
        "easy" => Some(EASY_LETTERS),
        "letters" => Some(LETTERS),
        "digits" => Some(DIGITS),
        "alphanumeric" => Some(ALPHANUMERIC),
        _ => None,
    }
}

/// Build an alphabet from the `l`/`d` pattern shorthand.
///
/// `l` selects letters, `d` selects digits, `ld`/`dl` both. Returns `None`
/// when the pattern selects nothing.
pub fn alphabet_for_pattern(pattern: &str) -> Option<String> {
    let pattern = pattern.to_lowercase();
    let mut alphabet = String::new();
    if pattern.contains('l') {
        alphabet.push_str(LETTERS);
    }
    if pattern.contains('d') {
        alphabet.push_str(DIGITS);
    }
    if alphabet.is_empty() {
        None
    } else {
        Some(alphabet)
    }
}

/// Normalize a TLD so that a non-empty value always starts with a dot.
pub fn normalize_tld(tld: &str) -> String {
    let tld = tld.trim().to_lowercase();
    if tld.is_empty() || tld.starts_with('.') {
        tld
    } else {
        format!(".{}", tld)
    }
}

/// Lower-case, de-duplicate (keeping first occurrence) and validate an alphabet.
fn normalize_alphabet(alphabet: &str) -> Result<Vec<char>, DomainSieveError> {
    let mut chars: Vec<char> = Vec::new();
    for ch in alphabet.trim().to_lowercase().chars() {
        if !is_label_char(ch) {
            return Err(DomainSieveError::config(format!(
                "alphabet contains '{}', only a-z, 0-9 and '-' are allowed",
                ch
            )));
        }
        if !chars.contains(&ch) {
            chars.push(ch);
        }
    }

    if chars.is_empty() {
        return Err(DomainSieveError::config("alphabet cannot be empty"));
    }
    Ok(chars)
}

fn normalize_affix(kind: &str, affix: &str) -> Result<String, DomainSieveError> {
    let affix = affix.trim().to_lowercase();
    if let Some(ch) = affix.chars().find(|c| !is_label_char(*c)) {
        return Err(DomainSieveError::config(format!(
            "{} contains '{}', only a-z, 0-9 and '-' are allowed",
            kind, ch
        )));
    }
    Ok(affix)
}

/// Size of `alphabet_len ^ length`, saturating at `u64::MAX`.
pub fn combination_count(alphabet_len: usize, length: usize) -> u64 {
    let base = alphabet_len as u64;
    let mut count: u64 = 1;
    for _ in 0..length {
        count = count.saturating_mul(base);
    }
    count
}

/// Number of candidates a configuration would produce before exclusion.
pub fn estimate_count(config: &GenerateConfig) -> Result<u64, DomainSieveError> {
    validate_length(config.length)?;
    let chars = normalize_alphabet(&config.alphabet)?;
    let total = combination_count(chars.len(), config.length);
    Ok(if config.limit > 0 {
        total.min(config.limit as u64)
    } else {
        total
    })
}

fn validate_length(length: usize) -> Result<(), DomainSieveError> {
    if length == 0 {
        return Err(DomainSieveError::config(
            "domain length must be greater than 0",
        ));
    }
    Ok(())
}

/// Lazy, finite, restartable candidate sequence.
///
/// Cloning a fresh `Candidates` (or calling [`generate`] again with the same
/// inputs) replays the same sequence.
#[derive(Debug, Clone)]
pub struct Candidates<F> {
    chars: Vec<char>,
    counters: Vec<usize>,
    exhausted: bool,
    prefix: String,
    suffix: String,
    tld: String,
    limit: usize,
    accepted: usize,
    exclude: F,
}

impl<F> Candidates<F> {
    /// Step the odometer, rightmost position first.
    fn advance(&mut self) {
        for i in (0..self.counters.len()).rev() {
            self.counters[i] += 1;
            if self.counters[i] < self.chars.len() {
                return;
            }
            self.counters[i] = 0;
        }
        self.exhausted = true;
    }
}

impl<F: Fn(&str) -> bool> Iterator for Candidates<F> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.limit > 0 && self.accepted >= self.limit {
            return None;
        }

        while !self.exhausted {
            let body: String = self.counters.iter().map(|&i| self.chars[i]).collect();
            self.advance();

            let domain = format!("{}{}{}{}", self.prefix, body, self.suffix, self.tld);
            if (self.exclude)(&domain) {
                continue;
            }

            self.accepted += 1;
            return Some(domain);
        }

        None
    }
}

/// Create the candidate sequence for `config`, skipping every domain for
/// which `exclude` returns `true` (typically "already in the ledger").
///
/// # Errors
///
/// Returns a configuration error when the length is zero, the alphabet is
/// empty or invalid, or the resulting label would exceed 63 characters.
pub fn generate<F>(config: &GenerateConfig, exclude: F) -> Result<Candidates<F>, DomainSieveError>
where
    F: Fn(&str) -> bool,
{
    validate_length(config.length)?;
    let chars = normalize_alphabet(&config.alphabet)?;
    let prefix = normalize_affix("prefix", &config.prefix)?;
    let suffix = normalize_affix("suffix", &config.suffix)?;

    let label_len = prefix.len() + config.length + suffix.len();
    if label_len > MAX_LABEL_LEN {
        return Err(DomainSieveError::config(format!(
            "label would be {} characters, the maximum is {}",
            label_len, MAX_LABEL_LEN
        )));
    }

    let total = combination_count(chars.len(), config.length);
    let planned = if config.limit > 0 {
        total.min(config.limit as u64)
    } else {
        total
    };
    if planned > LARGE_RUN_WARNING {
        tracing::warn!(planned, total, "very large candidate run, this may take a while");
    } else {
        tracing::info!(planned, total, "generating candidates");
    }

    Ok(Candidates {
        counters: vec![0; config.length],
        chars,
        exhausted: false,
        prefix,
        suffix,
        tld: normalize_tld(&config.tld),
        limit: config.limit,
        accepted: 0,
        exclude,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn config(alphabet: &str, length: usize, limit: usize) -> GenerateConfig {
        GenerateConfig {
            alphabet: alphabet.to_string(),
            length,
            limit,
            prefix: String::new(),
            suffix: String::new(),
            tld: ".com".to_string(),
        }
    }

    // ── Ordering ────────────────────────────────────────────────────

    #[test]
    fn test_product_order_with_limit() {
        let names: Vec<String> = generate(&config("ab", 2, 3), |_| false).unwrap().collect();
        assert_eq!(names, vec!["aa.com", "ab.com", "ba.com"]);
    }

    #[test]
    fn test_full_product_when_unbounded() {
        let names: Vec<String> = generate(&config("abc", 2, 0), |_| false).unwrap().collect();
        assert_eq!(names.len(), 9);
        assert_eq!(names.first().map(String::as_str), Some("aa.com"));
        assert_eq!(names.last().map(String::as_str), Some("cc.com"));
    }

    #[test]
    fn test_limit_larger_than_space() {
        let names: Vec<String> = generate(&config("ab", 2, 100), |_| false).unwrap().collect();
        assert_eq!(names.len(), 4);
    }

    #[test]
    fn test_affixes_and_tld_normalization() {
        let cfg = GenerateConfig {
            prefix: "Get".to_string(),
            suffix: "ly".to_string(),
            tld: "io".to_string(),
            ..config("xy", 1, 0)
        };
        let names: Vec<String> = generate(&cfg, |_| false).unwrap().collect();
        assert_eq!(names, vec!["getxly.io", "getyly.io"]);
    }

    // ── Uniqueness and exclusion ────────────────────────────────────

    #[test]
    fn test_no_duplicates_even_with_repeated_alphabet() {
        let names: Vec<String> = generate(&config("aab", 3, 0), |_| false).unwrap().collect();
        let unique: HashSet<&String> = names.iter().collect();
        assert_eq!(names.len(), 8);
        assert_eq!(unique.len(), names.len());
    }

    #[test]
    fn test_exclusion_skips_and_still_fills_limit() {
        let exclude: HashSet<String> = ["aa.com", "ab.com"].iter().map(|s| s.to_string()).collect();
        let names: Vec<String> = generate(&config("ab", 2, 2), |d| exclude.contains(d))
            .unwrap()
            .collect();
        assert_eq!(names, vec!["ba.com", "bb.com"]);
    }

    #[test]
    fn test_second_run_against_first_output_is_empty() {
        let cfg = config("abc", 2, 0);
        let first: HashSet<String> = generate(&cfg, |_| false).unwrap().collect();
        let second: Vec<String> = generate(&cfg, |d| first.contains(d)).unwrap().collect();
        assert!(second.is_empty());
    }

    #[test]
    fn test_restartable_by_clone() {
        let candidates = generate(&config("ab", 2, 0), |_| false).unwrap();
        let replay = candidates.clone();
        let a: Vec<String> = candidates.collect();
        let b: Vec<String> = replay.collect();
        assert_eq!(a, b);
    }

    // ── Validation ──────────────────────────────────────────────────

    #[test]
    fn test_zero_length_is_config_error() {
        let result = generate(&config("ab", 0, 0), |_| false);
        assert!(matches!(result, Err(DomainSieveError::ConfigError { .. })));
    }

    #[test]
    fn test_invalid_alphabet() {
        assert!(generate(&config("", 2, 0), |_| false).is_err());
        assert!(generate(&config("a.b", 2, 0), |_| false).is_err());
        assert!(generate(&config("ABC", 2, 0), |_| false).is_ok());
    }

    #[test]
    fn test_label_too_long() {
        let cfg = GenerateConfig {
            prefix: "a".repeat(60),
            ..config("ab", 4, 1)
        };
        assert!(generate(&cfg, |_| false).is_err());
    }

    // ── Presets and estimates ───────────────────────────────────────

    #[test]
    fn test_presets() {
        assert_eq!(alphabet_preset("easy"), Some(EASY_LETTERS));
        assert_eq!(alphabet_preset("DIGITS"), Some(DIGITS));
        assert_eq!(alphabet_preset("emoji"), None);
        assert_eq!(alphabet_for_pattern("l").as_deref(), Some(LETTERS));
        assert_eq!(alphabet_for_pattern("dl").map(|a| a.len()), Some(36));
        assert_eq!(alphabet_for_pattern("x"), None);
    }

    #[test]
    fn test_estimate_count() {
        assert_eq!(estimate_count(&config(EASY_LETTERS, 4, 0)).unwrap(), 17u64.pow(4));
        assert_eq!(estimate_count(&config(EASY_LETTERS, 4, 1000)).unwrap(), 1000);
    }

    #[test]
    fn test_combination_count_saturates() {
        assert_eq!(combination_count(36, 40), u64::MAX);
        assert_eq!(combination_count(2, 3), 8);
    }
}

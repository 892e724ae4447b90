//! The persisted ledger of examined domains.
//!
//! The ledger is a CSV file with one row per domain, loaded fully into memory
//! at the start of a run and rewritten in full after every stage. It is the
//! only state that survives a restart: generation skips every domain already
//! present, and the verifier picks its work from the rows the DNS stage
//! marked as worth confirming.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::DomainSieveError;
use crate::types::CheckRecord;
use crate::utils::{csv_escape, parse_bool, split_csv_line};

/// Column order written by [`Ledger::save`].
pub const LEDGER_HEADER: [&str; 5] = ["domain", "dns_checked", "api_verified", "available", "note"];

/// Aggregate counts over the whole ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerStats {
    pub total: usize,
    pub dns_checked: usize,
    /// DNS survivors still waiting for a registrar answer
    pub pending_verification: usize,
    pub api_verified: usize,
    pub confirmed_available: usize,
}

/// Keyed store of [`CheckRecord`]s, one per domain, in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    records: Vec<CheckRecord>,
    index: HashMap<String, usize>,
}

/// Column positions found in a ledger header.
struct Columns {
    domain: usize,
    dns_checked: Option<usize>,
    api_verified: Option<usize>,
    available: Option<usize>,
    note: Option<usize>,
}

impl Columns {
    fn from_header(fields: &[String]) -> Option<Self> {
        let position = |name: &str| {
            fields
                .iter()
                .position(|f| f.trim().eq_ignore_ascii_case(name))
        };
        Some(Self {
            domain: position("domain")?,
            dns_checked: position("dns_checked"),
            api_verified: position("api_verified"),
            available: position("available"),
            note: position("note"),
        })
    }

    fn positional() -> Self {
        Self {
            domain: 0,
            dns_checked: Some(1),
            api_verified: Some(2),
            available: Some(3),
            note: Some(4),
        }
    }

    fn record(&self, fields: &[String], path: &Path, line_no: usize) -> CheckRecord {
        let text = |idx: Option<usize>| {
            idx.and_then(|i| fields.get(i))
                .map(|s| s.trim().to_string())
                .unwrap_or_default()
        };
        let flag = |idx: Option<usize>, column: &str| {
            let raw = text(idx);
            parse_bool(&raw).unwrap_or_else(|| {
                tracing::warn!(
                    path = %path.display(),
                    line = line_no,
                    column,
                    value = %raw,
                    "unrecognised boolean in ledger, treating as false"
                );
                false
            })
        };

        CheckRecord {
            domain: text(Some(self.domain)).to_lowercase(),
            dns_checked: flag(self.dns_checked, "dns_checked"),
            api_verified: flag(self.api_verified, "api_verified"),
            available: flag(self.available, "available"),
            note: text(self.note),
        }
    }
}

impl Ledger {
    /// An empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a ledger from disk.
    ///
    /// A missing file yields an empty ledger. Columns absent from the header
    /// are back-filled with defaults, rows with an empty domain are skipped
    /// and duplicate rows are folded together with [`Ledger::merge`] rules.
    ///
    /// # Errors
    ///
    /// Returns [`DomainSieveError::FileError`] when the file exists but
    /// cannot be read.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DomainSieveError> {
        let path = path.as_ref();
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "no ledger yet, starting empty");
                return Ok(Self::new());
            }
            Err(e) => {
                return Err(DomainSieveError::file_error(
                    path.display().to_string(),
                    format!("cannot read ledger: {}", e),
                ))
            }
        };

        let mut ledger = Self::new();
        let mut lines = content.lines().enumerate().filter(|(_, l)| !l.trim().is_empty());

        let columns = match lines.next() {
            None => return Ok(ledger),
            Some((line_no, first)) => {
                let fields = split_csv_line(first);
                match Columns::from_header(&fields) {
                    Some(columns) => columns,
                    None => {
                        // Headerless file: the first line is already data.
                        let columns = Columns::positional();
                        ledger.merge([columns.record(&fields, path, line_no + 1)]);
                        columns
                    }
                }
            }
        };

        for (line_no, line) in lines {
            let record = columns.record(&split_csv_line(line), path, line_no + 1);
            if record.domain.is_empty() {
                continue;
            }
            ledger.upsert(record);
        }

        tracing::info!(path = %path.display(), rows = ledger.len(), "ledger loaded");
        Ok(ledger)
    }

    /// Rewrite the whole ledger.
    ///
    /// The new content goes to a sibling temporary file first and is renamed
    /// into place, so an interrupted save leaves the previous ledger intact.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), DomainSieveError> {
        let path = path.as_ref();
        let mut out = String::with_capacity(64 * (self.records.len() + 1));
        out.push_str(&LEDGER_HEADER.join(","));
        out.push('\n');

        for record in &self.records {
            let note = record.note.replace(['\r', '\n'], " ");
            out.push_str(&format!(
                "{},{},{},{},{}\n",
                csv_escape(&record.domain),
                record.dns_checked,
                record.api_verified,
                record.available,
                csv_escape(&note)
            ));
        }

        let tmp = temp_path(path);
        let file_error = |e: std::io::Error| {
            DomainSieveError::file_error(path.display().to_string(), format!("cannot save ledger: {}", e))
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(file_error)?;
        }
        std::fs::write(&tmp, out).map_err(file_error)?;
        std::fs::rename(&tmp, path).map_err(file_error)?;

        tracing::debug!(path = %path.display(), rows = self.records.len(), "ledger saved");
        Ok(())
    }

    /// Fold a batch of records into the ledger. Returns how many were new.
    pub fn merge<I>(&mut self, records: I) -> usize
    where
        I: IntoIterator<Item = CheckRecord>,
    {
        records
            .into_iter()
            .filter(|r| !r.domain.is_empty())
            .map(|r| self.upsert(r))
            .filter(|inserted| *inserted)
            .count()
    }

    /// Insert or update one record. Returns `true` when the domain was new.
    ///
    /// For an existing row: `api_verified` and `dns_checked` only ever gain
    /// `true`; an API-verified record overwrites `available`/`note`, while a
    /// DNS-stage record does so only if the row is not API-verified yet.
    pub fn upsert(&mut self, record: CheckRecord) -> bool {
        match self.index.get(&record.domain) {
            Some(&idx) => {
                let existing = &mut self.records[idx];
                if record.api_verified || !existing.api_verified {
                    existing.available = record.available;
                    existing.note = record.note;
                }
                existing.api_verified |= record.api_verified;
                existing.dns_checked |= record.dns_checked;
                false
            }
            None => {
                self.index.insert(record.domain.clone(), self.records.len());
                self.records.push(record);
                true
            }
        }
    }

    pub fn contains(&self, domain: &str) -> bool {
        self.index.contains_key(domain)
    }

    pub fn get(&self, domain: &str) -> Option<&CheckRecord> {
        self.index.get(domain).map(|&idx| &self.records[idx])
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All rows, in first-seen order.
    pub fn records(&self) -> &[CheckRecord] {
        &self.records
    }

    /// Every domain in the ledger.
    pub fn domains(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.domain.as_str())
    }

    /// DNS survivors without a registrar answer, in ledger order.
    pub fn pending_verification(&self) -> Vec<String> {
        self.records
            .iter()
            .filter(|r| r.is_pending_verification())
            .map(|r| r.domain.clone())
            .collect()
    }

    pub fn stats(&self) -> LedgerStats {
        self.records
            .iter()
            .fold(LedgerStats::default(), |mut stats, record| {
                stats.total += 1;
                stats.dns_checked += record.dns_checked as usize;
                stats.pending_verification += record.is_pending_verification() as usize;
                stats.api_verified += record.api_verified as usize;
                stats.confirmed_available += record.is_confirmed_available() as usize;
                stats
            })
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "ledger.csv".into());
    name.push(".tmp");
    path.with_file_name(name)
}

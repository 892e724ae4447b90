//! Append-only result files: the available-domains export and the error log.
//!
//! Both files are opened in append mode for every line so that a crash never
//! loses more than the line being written. Write failures are logged and
//! swallowed; the ledger remains the source of truth.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::utils::csv_escape;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Writer for the export file and the error log.
#[derive(Debug)]
pub struct ResultSink {
    available_path: PathBuf,
    error_log_path: PathBuf,
    lock: Mutex<()>,
}

impl ResultSink {
    pub fn new<A: Into<PathBuf>, E: Into<PathBuf>>(available_path: A, error_log_path: E) -> Self {
        Self {
            available_path: available_path.into(),
            error_log_path: error_log_path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn available_path(&self) -> &Path {
        &self.available_path
    }

    pub fn error_log_path(&self) -> &Path {
        &self.error_log_path
    }

    /// Append `domain,timestamp,note` to the export file.
    pub fn record_available(&self, domain: &str, note: &str) {
        let note = note.replace(['\r', '\n'], " ");
        let line = format!("{},{},{}", domain, timestamp(), csv_escape(&note));
        self.append(&self.available_path, &line);
    }

    /// Append `timestamp - domain - error` to the error log.
    pub fn record_error(&self, domain: &str, error: &str) {
        let error = error.replace(['\r', '\n'], " ");
        let line = format!("{} - {} - {}", timestamp(), domain, error);
        self.append(&self.error_log_path, &line);
    }

    fn append(&self, path: &Path, line: &str) {
        // Lanes and DNS workers share one sink; keep lines whole.
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .and_then(|mut file| writeln!(file, "{}", line));

        if let Err(e) = result {
            tracing::warn!(path = %path.display(), error = %e, "failed to append result line");
        }
    }
}

fn timestamp() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_export_line_format() {
        let dir = TempDir::new().unwrap();
        let sink = ResultSink::new(dir.path().join("available.csv"), dir.path().join("errors.log"));

        sink.record_available("abcd.com", "price 9.73, USD");
        sink.record_available("abce.com", "ok");

        let content = std::fs::read_to_string(sink.available_path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("abcd.com,"));
        assert!(lines[0].ends_with(",\"price 9.73, USD\""));

        // domain, "YYYY-MM-DD HH:MM:SS", note
        let timestamp = lines[1].split(',').nth(1).unwrap();
        assert_eq!(timestamp.len(), 19);
        assert!(chrono::NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT).is_ok());
    }

    #[test]
    fn test_error_log_line_format() {
        let dir = TempDir::new().unwrap();
        let sink = ResultSink::new(dir.path().join("available.csv"), dir.path().join("errors.log"));

        sink.record_error("abcd.com", "HTTP 500\nInternal");

        let content = std::fs::read_to_string(sink.error_log_path()).unwrap();
        assert!(content.ends_with(" - abcd.com - HTTP 500 Internal\n"));
        assert!(!sink.available_path().exists());
    }

    #[test]
    fn test_unwritable_path_is_not_fatal() {
        let dir = TempDir::new().unwrap();
        let sink = ResultSink::new(dir.path().join("missing/dir/a.csv"), dir.path().join("e.log"));
        sink.record_available("abcd.com", "ok");
        assert!(!sink.available_path().exists());
    }
}

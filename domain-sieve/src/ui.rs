//! Terminal output for domain-sieve: the run header and the final summary.
//!
//! Everything here goes to stdout; logs stay on stderr. Uses only the
//! `console` crate for styling.

use console::style;
use domain_sieve_lib::generate::estimate_count;
use domain_sieve_lib::{RunConfig, RunSummary};
use std::time::Duration;

const RULE: &str = "────────────────────────────────────────────────────";

// ── Header ───────────────────────────────────────────────────────────────────

/// Print a styled header describing what this run is about to do.
pub fn print_header(config: &RunConfig, verify_only: bool) {
    let action = if verify_only {
        "confirming pending domains".to_string()
    } else {
        let planned = estimate_count(&config.generate)
            .map(|n| format!("up to {} candidate{}", n, plural(n as usize)))
            .unwrap_or_else(|_| "candidates".to_string());
        format!("checking {}", planned)
    };

    println!(
        "{} {} {}",
        style("domain-sieve").bold(),
        style(format!("v{}", env!("CARGO_PKG_VERSION"))).dim(),
        style(format!("- {}", action)).dim(),
    );

    let mut meta_parts: Vec<String> = Vec::new();
    if !verify_only {
        let gen = &config.generate;
        meta_parts.push(format!(
            "Pattern: {}{}{}{}",
            gen.prefix,
            "*".repeat(gen.length),
            gen.suffix,
            gen.tld
        ));
        meta_parts.push(format!("Alphabet: {}", gen.alphabet));
        meta_parts.push(format!("DNS workers: {}", config.dns_workers));
    }
    if config.verify_api {
        meta_parts.push(format!("API lanes: {}", config.api_lanes));
        if let Some(provider) = &config.pinned_provider {
            meta_parts.push(format!("Provider: {}", provider));
        }
    }

    println!("{}", style(meta_parts.join(" | ")).dim());
    println!();
}

// ── Summary ──────────────────────────────────────────────────────────────────

/// Print the final summary with colored counts.
pub fn print_summary(summary: &RunSummary, config: &RunConfig, elapsed: Duration) {
    println!("  {}", style(RULE).dim());

    if summary.generated > 0 || summary.dns_checked > 0 {
        println!(
            "  {} {} in {}  {}  {}  {}  {}",
            style(summary.dns_checked).bold(),
            noun("name", summary.dns_checked),
            format_elapsed(elapsed),
            style("|").dim(),
            style(format!("{} no DNS", summary.dns_likely_available)).green(),
            style("|").dim(),
            style(format!("{} DNS errors", summary.dns_errors)).yellow(),
        );
    } else if !config.verify_api {
        println!("  {}", style("No new candidates to check").dim());
    }

    if summary.api_checked > 0 {
        println!(
            "  {} registrar {}  {}  {}  {}  {}",
            style(summary.api_checked).bold(),
            noun("check", summary.api_checked),
            style("|").dim(),
            style(format!("{} confirmed", summary.api_confirmed)).green().bold(),
            style("|").dim(),
            style(format!("{} unresolved", summary.api_unresolved)).yellow(),
        );
    }

    println!(
        "  {}",
        style(format!(
            "Ledger: {} {} ({} available) in {}",
            summary.ledger_total,
            noun("domain", summary.ledger_total),
            summary.ledger_confirmed,
            config.ledger_path.display()
        ))
        .dim()
    );

    if summary.api_confirmed > 0 {
        println!(
            "  {}",
            style(format!("New finds appended to {}", config.available_path.display())).green()
        );
    }

    if summary.cancelled {
        println!(
            "  {}",
            style("Interrupted: progress saved, run again to continue").yellow()
        );
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}

fn noun(word: &str, count: usize) -> String {
    format!("{}{}", word, plural(count))
}

/// Seconds with one decimal below a minute, otherwise `XmYYs`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    if secs < 60 {
        format!("{:.1}s", elapsed.as_secs_f64())
    } else {
        format!("{}m{:02}s", secs / 60, secs % 60)
    }
}

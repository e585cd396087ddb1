//! CSV exports.
//!
//! - `write_breaches_csv`: one row per breaching account with 1/0 flag
//!   columns; the password column stays empty unless passwords are revealed.
//! - `write_metrics_csv`: one row per domain bucket followed by the grand
//!   total.
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use csv::{Terminator, Writer, WriterBuilder};
use serde::Serialize;

use crate::metrics::{MetricsReport, format_percent};
use crate::policy::PolicyVerdict;

pub const BREACH_HEADERS: [&str; 7] = [
    "username", "password", "Length", "Capital", "Lower", "Digits", "Symbols",
];

pub const METRICS_HEADERS: [&str; 15] = [
    "",
    "Accounts",
    "LM",
    "NTLM",
    "Unique LM",
    "Unique NTLM",
    "Cracked",
    "Blank LM",
    "Blank NTLM",
    "Weak",
    "Not Weak",
    "Enabled",
    "Disabled",
    "Cracked (%)",
    "Enabled (%)",
];

#[derive(Debug, Serialize)]
struct BreachRow<'a> {
    username: &'a str,
    password: &'a str,
    length: u8,
    capital: u8,
    lower: u8,
    digits: u8,
    symbols: u8,
}

impl<'a> From<&'a PolicyVerdict> for BreachRow<'a> {
    fn from(v: &'a PolicyVerdict) -> Self {
        Self {
            username: &v.account,
            password: v.password_or_blank(),
            length: v.meets_length as u8,
            capital: v.has_capital as u8,
            lower: v.has_lower as u8,
            digits: v.has_digit as u8,
            symbols: v.has_symbol as u8,
        }
    }
}

fn builder() -> WriterBuilder {
    let mut b = WriterBuilder::new();
    b.has_headers(false).terminator(Terminator::Any(b'\n'));
    b
}

fn write_breaches<W: Write>(wtr: &mut Writer<W>, verdicts: &[PolicyVerdict]) -> Result<()> {
    wtr.write_record(BREACH_HEADERS)?;
    for v in verdicts {
        wtr.serialize(BreachRow::from(v))?;
    }
    wtr.flush()?;
    Ok(())
}

fn write_metrics<W: Write>(wtr: &mut Writer<W>, report: &MetricsReport) -> Result<()> {
    wtr.write_record(METRICS_HEADERS)?;
    for (name, m) in report.rows() {
        let cracked_pct = m
            .cracked_percent(name)
            .with_context(|| format!("metrics row {}", name))?;
        let enabled_pct = m
            .enabled_percent(name)
            .with_context(|| format!("metrics row {}", name))?;
        wtr.write_record([
            name.to_string(),
            m.accounts.to_string(),
            m.lm_hashes.len().to_string(),
            m.ntlm_hashes.len().to_string(),
            m.unique_lm().to_string(),
            m.unique_ntlm().to_string(),
            m.cracked_accounts.to_string(),
            m.blank_lm.to_string(),
            m.blank_ntlm.to_string(),
            m.weak_accounts.to_string(),
            m.not_weak_accounts().to_string(),
            m.enabled_accounts.to_string(),
            m.disabled_accounts().to_string(),
            format_percent(cracked_pct),
            format_percent(enabled_pct),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_breaches_csv<W: Write>(verdicts: &[PolicyVerdict], out: W) -> Result<()> {
    write_breaches(&mut builder().from_writer(out), verdicts)
}

pub fn write_metrics_csv<W: Write>(report: &MetricsReport, out: W) -> Result<()> {
    write_metrics(&mut builder().from_writer(out), report)
}

pub fn save_breaches_csv<P: AsRef<Path>>(verdicts: &[PolicyVerdict], path: P) -> Result<()> {
    let mut wtr = builder()
        .from_path(&path)
        .with_context(|| format!("create {}", path.as_ref().display()))?;
    write_breaches(&mut wtr, verdicts)
}

pub fn save_metrics_csv<P: AsRef<Path>>(report: &MetricsReport, path: P) -> Result<()> {
    let mut wtr = builder()
        .from_path(&path)
        .with_context(|| format!("create {}", path.as_ref().display()))?;
    write_metrics(&mut wtr, report)
}

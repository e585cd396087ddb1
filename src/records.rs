//! Builds [`AccountRecord`]s from John `--show` output and NTDS dump lines.
//!
//! Cracked line: `identifier:password:RID:LM:NTLM:::[(pwdLastSet)] [(status)]`
//! Dump line:    `identifier:RID:LM:NTLM:::[(pwdLastSet)] [(status)]`
//!
//! Lines without a colon are skipped. Lines that carry a colon but lack the
//! hash fields are rejected, since a record without hashes cannot be
//! aggregated.
use std::collections::BTreeMap;

use crate::account::{AccountRecord, EnabledStatus, Weakness};
use crate::ingest::Accounts;
use crate::policy::PolicyEvaluator;

pub const CRACKED_LINE_FORMAT: &str =
    "<identifier>:<password>:<RID>:<LMHash>:<NTLMHash>:::[(pwdLastSet)] [(status)]";
pub const DIT_LINE_FORMAT: &str =
    "<identifier>:<RID>:<LMHash>:<NTLMHash>:::[(pwdLastSet)] [(status)]";

/// Identifier mapped to its record. Later lines overwrite earlier ones.
pub type Records = BTreeMap<String, AccountRecord>;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("missing {field} in line {line:?}; expected {expected}")]
    MissingField {
        field: &'static str,
        line: String,
        expected: &'static str,
    },
}

fn required<'a>(
    fields: &[&'a str],
    index: usize,
    field: &'static str,
    line: &str,
    expected: &'static str,
) -> Result<&'a str, RecordError> {
    match fields.get(index).copied().map(str::trim) {
        Some(f) if !f.is_empty() => Ok(f),
        _ => Err(RecordError::MissingField {
            field,
            line: line.to_string(),
            expected,
        }),
    }
}

/// Find a `(status=...)` annotation after the `:::` separator.
fn enabled_status(line: &str) -> EnabledStatus {
    let Some((_, tail)) = line.split_once(":::") else {
        return EnabledStatus::Unknown;
    };
    tail.split('(')
        .filter_map(|group| group.split_once(')').map(|(inner, _)| inner))
        .map(EnabledStatus::from_annotation)
        .find(|s| *s != EnabledStatus::Unknown)
        .unwrap_or(EnabledStatus::Unknown)
}

/// Classify a cracked password against the policy.
pub fn classify_password(evaluator: &PolicyEvaluator, identifier: &str, password: &str) -> Weakness {
    match evaluator.evaluate_password(identifier, password) {
        Some(verdict) => Weakness::CrackedWeak {
            reason: verdict.label(),
        },
        None => Weakness::CrackedStrong,
    }
}

/// Parse one line of John `--show` output into a cracked record.
pub fn parse_cracked_record(
    line: &str,
    evaluator: &PolicyEvaluator,
) -> Result<Option<AccountRecord>, RecordError> {
    let line = line.trim_end_matches(['\r', '\n']);
    if !line.contains(':') {
        return Ok(None);
    }
    let fields: Vec<&str> = line.split(':').collect();
    let identifier = fields[0];
    let password = fields[1];
    let lm = required(&fields, 3, "LM hash", line, CRACKED_LINE_FORMAT)?;
    let nt = required(&fields, 4, "NTLM hash", line, CRACKED_LINE_FORMAT)?;

    let mut record = AccountRecord::new(identifier, lm, nt).with_enabled(enabled_status(line));
    record.crack(classify_password(evaluator, identifier, password));
    Ok(Some(record))
}

/// Parse one NTDS dump line into an uncracked record.
pub fn parse_dit_record(line: &str) -> Result<Option<AccountRecord>, RecordError> {
    let line = line.trim_end_matches(['\r', '\n']);
    if !line.contains(':') {
        return Ok(None);
    }
    let fields: Vec<&str> = line.split(':').collect();
    let lm = required(&fields, 2, "LM hash", line, DIT_LINE_FORMAT)?;
    let nt = required(&fields, 3, "NTLM hash", line, DIT_LINE_FORMAT)?;
    Ok(Some(
        AccountRecord::new(fields[0], lm, nt).with_enabled(enabled_status(line)),
    ))
}

pub fn parse_cracked_records(
    contents: &str,
    evaluator: &PolicyEvaluator,
) -> Result<Records, RecordError> {
    let mut records = Records::new();
    for line in contents.lines() {
        if let Some(r) = parse_cracked_record(line, evaluator)? {
            records.insert(r.identifier.clone(), r);
        }
    }
    Ok(records)
}

pub fn parse_dit_records(contents: &str) -> Result<Records, RecordError> {
    let mut records = Records::new();
    for line in contents.lines() {
        if let Some(r) = parse_dit_record(line)? {
            records.insert(r.identifier.clone(), r);
        }
    }
    Ok(records)
}

/// Mark dumped records whose identifier has a cracked password. Returns the
/// number of records marked.
pub fn apply_cracked(records: &mut Records, cracked: &Accounts, evaluator: &PolicyEvaluator) -> usize {
    let mut marked = 0;
    for (identifier, record) in records.iter_mut() {
        if let Some(password) = cracked.get(identifier) {
            record.crack(classify_password(evaluator, identifier, password));
            marked += 1;
        }
    }
    marked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{AccountType, NULL_HASH_LM, NULL_HASH_NT};
    use crate::config::AuditConfig;

    fn evaluator() -> PolicyEvaluator {
        PolicyEvaluator::new(&AuditConfig::default()).unwrap()
    }

    #[test]
    fn cracked_line_builds_strong_record() {
        let line = "ACME.COM\\bob:Password1:1105:aad3b435b51404eeaad3b435b51404ee:31d6cfe0d16ae931b73c59d7e0c089c0:::";
        let r = parse_cracked_record(line, &evaluator()).unwrap().unwrap();
        assert_eq!(r.identifier, "ACME.COM\\bob");
        assert_eq!(r.domain.as_deref(), Some("ACME.COM"));
        assert!(r.cracked);
        assert_eq!(r.weakness, Weakness::CrackedStrong);
        assert_eq!(r.enabled, EnabledStatus::Unknown);
        assert!(r.has_blank_lm());
        assert!(r.has_blank_ntlm());
    }

    #[test]
    fn cracked_line_with_weak_password_and_status() {
        let line = "ACME\\eve:abc:1106:aad3b435b51404eeaad3b435b51404ee:8846f7eaee8fb117ad06bdd830b7586c::: (pwdLastSet=2019-03-01 10:22) (status=Enabled)";
        let r = parse_cracked_record(line, &evaluator()).unwrap().unwrap();
        assert_eq!(
            r.weakness,
            Weakness::CrackedWeak {
                reason: "too short".into()
            }
        );
        assert_eq!(r.enabled, EnabledStatus::Enabled);
    }

    #[test]
    fn cracked_line_without_hashes_fails_fast() {
        let err = parse_cracked_record("bob:abc", &evaluator()).unwrap_err();
        assert!(matches!(
            err,
            RecordError::MissingField {
                field: "LM hash",
                ..
            }
        ));
        assert!(err.to_string().contains("bob:abc"));
        assert!(err.to_string().contains("<LMHash>"));
    }

    #[test]
    fn lines_without_colon_are_skipped() {
        let records =
            parse_cracked_records("2 password hashes cracked, 0 left\n\n", &evaluator()).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn dit_lines_are_uncracked_and_carry_status() {
        let contents = format!(
            "ACME\\alice:1001:{NULL_HASH_LM}:8846f7eaee8fb117ad06bdd830b7586c::: (status=Disabled)\nACME\\HOST$:1002:{NULL_HASH_LM}:{NULL_HASH_NT}:::\n"
        );
        let records = parse_dit_records(&contents).unwrap();
        assert_eq!(records.len(), 2);
        let alice = &records["ACME\\alice"];
        assert!(!alice.cracked);
        assert_eq!(alice.weakness, Weakness::NotCracked);
        assert_eq!(alice.enabled, EnabledStatus::Disabled);
        assert_eq!(records["ACME\\HOST$"].account_type, AccountType::Machine);
    }

    #[test]
    fn dit_line_missing_ntlm_fails() {
        let err = parse_dit_record("ACME\\alice:1001:aad3b435b51404eeaad3b435b51404ee").unwrap_err();
        assert!(matches!(
            err,
            RecordError::MissingField {
                field: "NTLM hash",
                ..
            }
        ));
    }

    #[test]
    fn apply_cracked_marks_matching_identifiers() {
        let contents = format!(
            "ACME\\alice:1001:{NULL_HASH_LM}:aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa:::\nACME\\bob:1002:{NULL_HASH_LM}:bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb:::\n"
        );
        let mut records = parse_dit_records(&contents).unwrap();
        let mut cracked = Accounts::new();
        cracked.insert("ACME\\alice".into(), "summer".into());
        let e = evaluator();
        assert_eq!(apply_cracked(&mut records, &cracked, &e), 1);
        assert!(records["ACME\\alice"].weakness.is_weak());
        assert!(!records["ACME\\bob"].cracked);
    }
}

//! Parsing of cracked `identifier:password[:...]` lines into an account map.
//!
//! Lines without a colon are skipped. Identifiers ending in `$` are machine
//! accounts and are dropped unless explicitly requested. A repeated
//! identifier overwrites the earlier entry (last write wins).
use std::collections::BTreeMap;

/// Account identifier mapped to its cracked plaintext password.
pub type Accounts = BTreeMap<String, String>;

/// Split one line into `(identifier, password)`. The password is the text
/// between the first and second colon; anything after is ignored.
pub fn parse_account_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim_end_matches(['\r', '\n']);
    let (identifier, rest) = line.split_once(':')?;
    let password = rest.split(':').next().unwrap_or_default();
    Some((identifier, password))
}

/// Whether an identifier names a machine account.
pub fn is_machine_identifier(identifier: &str) -> bool {
    identifier.ends_with('$')
}

/// Insert one line into `accounts`. Returns `false` when the line was
/// skipped (no colon, or a filtered machine account).
pub fn ingest_line(accounts: &mut Accounts, line: &str, include_machine: bool) -> bool {
    let Some((identifier, password)) = parse_account_line(line) else {
        return false;
    };
    if !include_machine && is_machine_identifier(identifier) {
        return false;
    }
    accounts.insert(identifier.to_string(), password.to_string());
    true
}

/// Ingest every line of `contents`, excluding machine accounts.
pub fn parse_accounts(contents: &str) -> Accounts {
    parse_accounts_with(contents, false)
}

pub fn parse_accounts_with(contents: &str, include_machine: bool) -> Accounts {
    let mut accounts = Accounts::new();
    for line in contents.lines() {
        ingest_line(&mut accounts, line, include_machine);
    }
    accounts
}

//! Account record model consumed by the metrics aggregator.
//!
//! An [`AccountRecord`] carries the identity, hashes and classification of
//! one dumped account. Enabled status and weakness are decided once, when the
//! record is built, so aggregation can match on enums instead of comparing
//! strings.
use std::fmt;
use std::str::FromStr;

/// Well-known LM hash of the empty password.
pub const NULL_HASH_LM: &str = "aad3b435b51404eeaad3b435b51404ee";
/// Well-known NT hash of the empty password.
pub const NULL_HASH_NT: &str = "31d6cfe0d16ae931b73c59d7e0c089c0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccountType {
    User,
    Machine,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnabledStatus {
    Enabled,
    Disabled,
    Unknown,
}

impl EnabledStatus {
    /// Parse a status annotation such as `(status=Enabled)` or `Enabled`.
    /// Matching is case-sensitive; anything else is `Unknown`.
    pub fn from_annotation(raw: &str) -> Self {
        let s = raw.trim().trim_start_matches('(').trim_end_matches(')');
        let s = s.strip_prefix("status=").unwrap_or(s);
        match s {
            "Enabled" => EnabledStatus::Enabled,
            "Disabled" => EnabledStatus::Disabled,
            _ => EnabledStatus::Unknown,
        }
    }
}

/// Crack/strength classification of an account.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Weakness {
    NotCracked,
    CrackedStrong,
    CrackedWeak { reason: String },
}

impl Weakness {
    pub fn is_weak(&self) -> bool {
        matches!(self, Weakness::CrackedWeak { .. })
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum WeaknessParseError {
    #[error("weakness classification must not be empty")]
    Empty,
}

impl FromStr for Weakness {
    type Err = WeaknessParseError;

    /// `Not Cracked` and `Cracked` are the two non-weak labels; any other
    /// non-empty label names a weakness.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" => Err(WeaknessParseError::Empty),
            "Not Cracked" => Ok(Weakness::NotCracked),
            "Cracked" => Ok(Weakness::CrackedStrong),
            other => Ok(Weakness::CrackedWeak {
                reason: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Weakness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Weakness::NotCracked => f.write_str("Not Cracked"),
            Weakness::CrackedStrong => f.write_str("Cracked"),
            Weakness::CrackedWeak { reason } => f.write_str(reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRecord {
    pub identifier: String,
    pub domain: Option<String>,
    pub account_type: AccountType,
    pub enabled: EnabledStatus,
    pub cracked: bool,
    pub weakness: Weakness,
    pub lm_hash: String,
    pub ntlm_hash: String,
}

impl AccountRecord {
    /// Build an uncracked record from a `DOMAIN\User` or `User` identifier
    /// and its hashes. Domain and account type are derived from the
    /// identifier.
    pub fn new(identifier: &str, lm_hash: &str, ntlm_hash: &str) -> Self {
        let account_type = if identifier.trim_end().ends_with('$') {
            AccountType::Machine
        } else {
            AccountType::User
        };
        let domain = identifier
            .split_once('\\')
            .map(|(d, _)| d.trim().to_string())
            .filter(|d| !d.is_empty());
        Self {
            identifier: identifier.to_string(),
            domain,
            account_type,
            enabled: EnabledStatus::Unknown,
            cracked: false,
            weakness: Weakness::NotCracked,
            lm_hash: lm_hash.to_string(),
            ntlm_hash: ntlm_hash.to_string(),
        }
    }

    pub fn with_enabled(mut self, enabled: EnabledStatus) -> Self {
        self.enabled = enabled;
        self
    }

    /// Mark cracked and record how strong the recovered password is.
    pub fn crack(&mut self, weakness: Weakness) {
        self.cracked = true;
        self.weakness = match weakness {
            Weakness::NotCracked => Weakness::CrackedStrong,
            other => other,
        };
    }

    pub fn is_machine(&self) -> bool {
        self.account_type == AccountType::Machine
    }

    pub fn has_blank_lm(&self) -> bool {
        self.lm_hash.eq_ignore_ascii_case(NULL_HASH_LM)
    }

    pub fn has_blank_ntlm(&self) -> bool {
        self.ntlm_hash.eq_ignore_ascii_case(NULL_HASH_NT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_domain_and_type_from_identifier() {
        let r = AccountRecord::new("ACME.COM\\Alice", NULL_HASH_LM, NULL_HASH_NT);
        assert_eq!(r.domain.as_deref(), Some("ACME.COM"));
        assert_eq!(r.account_type, AccountType::User);

        let m = AccountRecord::new("ACME\\HOST$", NULL_HASH_LM, NULL_HASH_NT);
        assert!(m.is_machine());

        let local = AccountRecord::new("Administrator", NULL_HASH_LM, NULL_HASH_NT);
        assert_eq!(local.domain, None);
    }

    #[test]
    fn blank_hash_detection_ignores_case() {
        let r = AccountRecord::new(
            "bob",
            "AAD3B435B51404EEAAD3B435B51404EE",
            "8846f7eaee8fb117ad06bdd830b7586c",
        );
        assert!(r.has_blank_lm());
        assert!(!r.has_blank_ntlm());
    }

    #[test]
    fn enabled_status_annotations() {
        assert_eq!(EnabledStatus::from_annotation("(status=Enabled)"), EnabledStatus::Enabled);
        assert_eq!(EnabledStatus::from_annotation("Disabled"), EnabledStatus::Disabled);
        assert_eq!(EnabledStatus::from_annotation("(status=enabled)"), EnabledStatus::Unknown);
    }

    #[test]
    fn weakness_labels_parse_into_three_states() {
        assert_eq!("Not Cracked".parse::<Weakness>(), Ok(Weakness::NotCracked));
        assert_eq!("Cracked".parse::<Weakness>(), Ok(Weakness::CrackedStrong));
        assert_eq!(
            "too short".parse::<Weakness>(),
            Ok(Weakness::CrackedWeak {
                reason: "too short".into()
            })
        );
        assert_eq!("".parse::<Weakness>(), Err(WeaknessParseError::Empty));
    }

    #[test]
    fn crack_sets_flag_and_weakness() {
        let mut r = AccountRecord::new("bob", NULL_HASH_LM, NULL_HASH_NT);
        assert!(!r.cracked);
        r.crack(Weakness::NotCracked);
        assert!(r.cracked);
        assert_eq!(r.weakness, Weakness::CrackedStrong);
    }
}

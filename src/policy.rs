//! Password complexity policy: a minimum length plus four character-class
//! checks (upper case, lower case, digit, symbol).
//!
//! A password shorter than the minimum fails on length alone and its class
//! checks are not run. A password at or above the minimum fails when two or
//! more class checks are broken (score below [`MIN_CLASS_SCORE`]).
use std::fmt;

use log::debug;
use regex::Regex;

use crate::config::AuditConfig;
use crate::ingest::Accounts;

/// Number of satisfied character classes required to pass.
pub const MIN_CLASS_SCORE: u8 = 3;

#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("invalid character-class pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// A character-class rule the password did not satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BrokenRule {
    NoUpperCase,
    NoLowerCase,
    NoNumbers,
    NoSymbols,
}

impl BrokenRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            BrokenRule::NoUpperCase => "no upper case",
            BrokenRule::NoLowerCase => "no lower case",
            BrokenRule::NoNumbers => "no numbers",
            BrokenRule::NoSymbols => "non symbols",
        }
    }
}

impl fmt::Display for BrokenRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreachReason {
    TooShort,
    Complexity,
}

/// Verdict for one account that failed the policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyVerdict {
    pub account: String,
    /// `None` when passwords are redacted.
    pub password: Option<String>,
    pub reason: BreachReason,
    pub meets_length: bool,
    pub has_capital: bool,
    pub has_lower: bool,
    pub has_digit: bool,
    pub has_symbol: bool,
    pub broken_rules: Vec<BrokenRule>,
}

impl PolicyVerdict {
    fn new(account: &str, password: Option<String>, reason: BreachReason) -> Self {
        Self {
            account: account.to_string(),
            password,
            reason,
            meets_length: true,
            has_capital: true,
            has_lower: true,
            has_digit: true,
            has_symbol: true,
            broken_rules: Vec::new(),
        }
    }

    /// Count of satisfied character-class flags.
    pub fn score(&self) -> u8 {
        [
            self.has_capital,
            self.has_lower,
            self.has_digit,
            self.has_symbol,
        ]
        .iter()
        .filter(|f| **f)
        .count() as u8
    }

    pub fn password_or_blank(&self) -> &str {
        self.password.as_deref().unwrap_or("")
    }

    /// Short description of why the account breached the policy.
    pub fn label(&self) -> String {
        match self.reason {
            BreachReason::TooShort => "too short".to_string(),
            BreachReason::Complexity => self
                .broken_rules
                .iter()
                .map(BrokenRule::as_str)
                .collect::<Vec<_>>()
                .join(", "),
        }
    }

    /// Console notice lines: the breach line followed by one line per
    /// broken rule.
    pub fn notice_lines(&self) -> Vec<String> {
        match self.reason {
            BreachReason::TooShort => vec![format!(
                "Policy breach, too short : {} {}",
                self.account,
                self.password_or_blank()
            )],
            BreachReason::Complexity => {
                let mut lines = vec![format!(
                    "Policy breach: {}:{} {}",
                    self.account,
                    self.password_or_blank(),
                    self.score()
                )];
                for rule in &self.broken_rules {
                    lines.push(format!("Broken Rule: {}", rule));
                }
                lines
            }
        }
    }
}

#[derive(Debug, Clone)]
struct CharClasses {
    upper: Regex,
    lower: Regex,
    digit: Regex,
    symbol: Regex,
}

impl CharClasses {
    fn compile() -> Result<Self, PolicyError> {
        Ok(Self {
            upper: Regex::new("[A-Z]")?,
            lower: Regex::new("[a-z]")?,
            digit: Regex::new(r"\d")?,
            symbol: Regex::new(r"\W")?,
        })
    }
}

/// Applies the complexity policy to cracked passwords.
#[derive(Debug, Clone)]
pub struct PolicyEvaluator {
    min_length: usize,
    reveal_passwords: bool,
    classes: CharClasses,
}

impl PolicyEvaluator {
    pub fn new(config: &AuditConfig) -> Result<Self, PolicyError> {
        Ok(Self {
            min_length: config.min_length,
            reveal_passwords: config.reveal_passwords,
            classes: CharClasses::compile()?,
        })
    }

    pub fn min_length(&self) -> usize {
        self.min_length
    }

    /// Evaluate one password. Returns a verdict only when it breaches the
    /// policy.
    pub fn evaluate_password(&self, account: &str, password: &str) -> Option<PolicyVerdict> {
        let shown = self.reveal_passwords.then(|| password.to_string());

        if password.chars().count() < self.min_length {
            let mut verdict = PolicyVerdict::new(account, shown, BreachReason::TooShort);
            verdict.meets_length = false;
            return Some(verdict);
        }

        let mut verdict = PolicyVerdict::new(account, shown, BreachReason::Complexity);
        let checks = [
            (&self.classes.upper, BrokenRule::NoUpperCase),
            (&self.classes.lower, BrokenRule::NoLowerCase),
            (&self.classes.digit, BrokenRule::NoNumbers),
            (&self.classes.symbol, BrokenRule::NoSymbols),
        ];
        for (re, rule) in checks {
            if !re.is_match(password) {
                verdict.broken_rules.push(rule);
                match rule {
                    BrokenRule::NoUpperCase => verdict.has_capital = false,
                    BrokenRule::NoLowerCase => verdict.has_lower = false,
                    BrokenRule::NoNumbers => verdict.has_digit = false,
                    BrokenRule::NoSymbols => verdict.has_symbol = false,
                }
            }
        }

        if verdict.score() < MIN_CLASS_SCORE {
            Some(verdict)
        } else {
            None
        }
    }

    /// Evaluate every account, returning verdicts for breaching accounts in
    /// map iteration order.
    pub fn evaluate(&self, accounts: &Accounts) -> Vec<PolicyVerdict> {
        let verdicts: Vec<PolicyVerdict> = accounts
            .iter()
            .filter_map(|(account, password)| self.evaluate_password(account, password))
            .collect();
        debug!(
            "policy: {} of {} accounts breached (min length {})",
            verdicts.len(),
            accounts.len(),
            self.min_length
        );
        verdicts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evaluator() -> PolicyEvaluator {
        PolicyEvaluator::new(&AuditConfig::default()).unwrap()
    }

    #[test]
    fn short_password_fails_on_length_only() {
        let v = evaluator().evaluate_password("bob", "abc").unwrap();
        assert_eq!(v.reason, BreachReason::TooShort);
        assert!(!v.meets_length);
        assert!(v.has_capital && v.has_lower && v.has_digit && v.has_symbol);
        assert!(v.broken_rules.is_empty());
        assert_eq!(v.label(), "too short");
    }

    #[test]
    fn missing_one_class_passes() {
        assert!(evaluator().evaluate_password("bob", "Password1").is_none());
    }

    #[test]
    fn all_classes_pass() {
        assert!(evaluator().evaluate_password("bob", "Pa$sword1").is_none());
    }

    #[test]
    fn missing_two_classes_breaches_with_score_two() {
        let v = evaluator().evaluate_password("bob", "Passwords").unwrap();
        assert_eq!(v.reason, BreachReason::Complexity);
        assert_eq!(v.score(), 2);
        assert!(v.meets_length);
        assert!(!v.has_digit);
        assert!(!v.has_symbol);
        assert_eq!(v.broken_rules, vec![BrokenRule::NoNumbers, BrokenRule::NoSymbols]);
        assert_eq!(v.label(), "no numbers, non symbols");
    }

    #[test]
    fn exactly_min_length_is_evaluated_for_classes() {
        let e = evaluator();
        assert!(e.evaluate_password("a", "Passw0rd").is_none());
        let v = e.evaluate_password("b", "password").unwrap();
        assert_eq!(v.reason, BreachReason::Complexity);
        assert_eq!(v.score(), 1);
    }

    #[test]
    fn underscore_is_not_a_symbol() {
        let v = evaluator().evaluate_password("bob", "pass_word").unwrap();
        assert!(!v.has_symbol);
        assert!(!v.has_capital);
        assert!(!v.has_digit);
    }

    #[test]
    fn custom_min_length_moves_boundary() {
        let e = PolicyEvaluator::new(&AuditConfig::default().with_min_length(12)).unwrap();
        let v = e.evaluate_password("bob", "Password1!").unwrap();
        assert_eq!(v.reason, BreachReason::TooShort);
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        // 7 characters, 14 bytes
        let v = evaluator().evaluate_password("bob", "ééééééé").unwrap();
        assert_eq!(v.reason, BreachReason::TooShort);
    }

    #[test]
    fn redacts_unless_revealed() {
        let v = evaluator().evaluate_password("bob", "abc").unwrap();
        assert_eq!(v.password, None);
        assert_eq!(v.notice_lines(), vec!["Policy breach, too short : bob ".to_string()]);

        let e = PolicyEvaluator::new(&AuditConfig::default().with_reveal_passwords(true)).unwrap();
        let v = e.evaluate_password("bob", "abc").unwrap();
        assert_eq!(v.password.as_deref(), Some("abc"));
    }

    #[test]
    fn complexity_notice_lists_broken_rules() {
        let e = PolicyEvaluator::new(&AuditConfig::default().with_reveal_passwords(true)).unwrap();
        let v = e.evaluate_password("bob", "lowercaseonly").unwrap();
        assert_eq!(
            v.notice_lines(),
            vec![
                "Policy breach: bob:lowercaseonly 1".to_string(),
                "Broken Rule: no upper case".to_string(),
                "Broken Rule: no numbers".to_string(),
                "Broken Rule: non symbols".to_string(),
            ]
        );
    }

    #[test]
    fn evaluate_returns_only_breaching_accounts() {
        let mut accounts = Accounts::new();
        accounts.insert("a".into(), "abc".into());
        accounts.insert("b".into(), "Password1".into());
        accounts.insert("c".into(), "passwords".into());
        let verdicts = evaluator().evaluate(&accounts);
        let names: std::collections::HashSet<_> =
            verdicts.iter().map(|v| v.account.as_str()).collect();
        assert_eq!(names, ["a", "c"].into_iter().collect());
    }
}

//! Human-readable report rendering for terminal output.
//!
//! Produces the breach notices, a policy summary and, in verbose mode, the
//! per-domain and grand-total metrics block.
use colored::*;

use crate::config::AuditConfig;
use crate::engine::Engine;
use crate::metrics::{DomainMetrics, MetricsError, MetricsReport, format_percent};
use crate::policy::{BreachReason, PolicyVerdict};

fn visible_len(s: &str) -> usize {
    // Strip ANSI escape sequences (\x1b[ ... m) to compute printable width
    let mut len = 0;
    let mut iter = s.chars().peekable();
    while let Some(ch) = iter.next() {
        if ch == '\u{1b}' {
            if let Some('[') = iter.peek().cloned() {
                let _ = iter.next();
            }
            for c in iter.by_ref() {
                if c == 'm' {
                    break;
                }
            }
        } else {
            len += 1;
        }
    }
    len
}

fn section_header(title: &str) -> String {
    let len = visible_len(title);
    let mut s = String::new();
    s.push('\n');
    s.push_str(title);
    s.push('\n');
    s.push_str(&"─".repeat(len));
    s.push_str("\n\n");
    s
}

fn metrics_lines(name: &str, m: &DomainMetrics) -> Result<Vec<String>, MetricsError> {
    Ok(vec![
        format!("{}", name.bold().green()),
        format!("  Accounts: {}", m.accounts),
        format!("  Cracked Accounts: {}", m.cracked_accounts),
        format!("  Uncracked Accounts: {}", m.uncracked_accounts()),
        format!("  Weak Accounts: {}", m.weak_accounts),
        format!("  Not Weak Accounts: {}", m.not_weak_accounts()),
        format!("  Enabled Accounts: {}", m.enabled_accounts),
        format!("  Disabled Accounts: {}", m.disabled_accounts()),
        format!("  Total LM Hashes: {}", m.lm_hashes.len()),
        format!("  Total NTLM Hashes: {}", m.ntlm_hashes.len()),
        format!("  Total Blank LM Hashes: {}", m.blank_lm),
        format!("  Total Blank NTLM Hashes: {}", m.blank_ntlm),
        format!("  Total Unique LM Hashes: {}", m.unique_lm()),
        format!("  Total Unique NTLM Hashes: {}", m.unique_ntlm()),
        format!("  Cracked (%): {}", format_percent(m.cracked_percent(name)?)),
        format!("  Enabled (%): {}", format_percent(m.enabled_percent(name)?)),
    ])
}

/// Console half of the report emitter.
#[derive(Debug, Clone)]
pub struct Reporter {
    verbose: bool,
}

impl Reporter {
    pub fn new(config: &AuditConfig) -> Self {
        Self {
            verbose: config.verbose,
        }
    }

    /// One notice per breaching account, each followed by its broken rules.
    pub fn render_breach_notices(&self, verdicts: &[PolicyVerdict]) -> String {
        let mut out = String::new();
        for v in verdicts {
            let mut lines = v.notice_lines().into_iter();
            if let Some(first) = lines.next() {
                out.push_str(&first.red().to_string());
                out.push('\n');
            }
            for rule in lines {
                out.push_str(&format!("  {}\n", rule.yellow()));
            }
        }
        out
    }

    pub fn render_summary(
        &self,
        engine: &Engine,
        verdicts: &[PolicyVerdict],
        metrics: Option<&MetricsReport>,
    ) -> Result<String, MetricsError> {
        let mut out = String::new();
        out.push_str(&format!(
            "{}\n",
            "PassHealth: Password Policy Audit Results".bold().cyan()
        ));

        out.push_str(&section_header(
            &"Policy Breaches".bold().yellow().to_string(),
        ));
        if verdicts.is_empty() {
            out.push_str("(No policy breaches)\n");
        } else {
            out.push_str(&self.render_breach_notices(verdicts));
        }

        let too_short = verdicts
            .iter()
            .filter(|v| v.reason == BreachReason::TooShort)
            .count();
        let mut summary_lines: Vec<String> = Vec::new();
        if let Some(m) = metrics {
            summary_lines.push(format!("Total Accounts: {}", m.total.accounts));
        }
        summary_lines.push(format!("Cracked Accounts Evaluated: {}", engine.accounts.len()));
        summary_lines.push(format!(
            "Minimum Length: {}",
            engine.evaluator().min_length()
        ));
        summary_lines.push(format!("Policy Breaches: {}", verdicts.len()));
        summary_lines.push(format!("  Too Short: {}", too_short));
        summary_lines.push(format!("  Complexity: {}", verdicts.len() - too_short));
        out.push_str(&section_header(&"Summary".bold().cyan().to_string()));
        for line in summary_lines {
            out.push_str(&line);
            out.push('\n');
        }

        if self.verbose {
            if let Some(m) = metrics {
                out.push_str(&section_header(
                    &"Domain Metrics".bold().cyan().to_string(),
                ));
                for (name, dm) in m.rows() {
                    for line in metrics_lines(name, dm)? {
                        out.push_str(&line);
                        out.push('\n');
                    }
                }
            }
        }

        Ok(out)
    }
}

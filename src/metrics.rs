//! Per-domain account and hash metrics.
//!
//! Records are partitioned into buckets (`machine`, `local`, or the
//! lower-cased domain name). Each bucket counts accounts, cracked, weak and
//! enabled accounts, and collects non-blank LM/NTLM hashes so duplicates can
//! be measured. The grand total is the merge of every bucket; its unique hash
//! counts are the cardinality of the union, not the sum of per-bucket
//! uniques.
use std::collections::{BTreeMap, HashSet};

use log::debug;
use rayon::prelude::*;

use crate::account::{AccountRecord, AccountType, EnabledStatus, Weakness};
use crate::config::AuditConfig;
use crate::records::Records;

pub const MACHINE_BUCKET: &str = "machine";
pub const LOCAL_BUCKET: &str = "local";
pub const GRAND_TOTAL: &str = "Grand Total";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MetricsError {
    #[error("cannot compute a percentage for '{0}': it has no accounts")]
    EmptyBucket(String),
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DomainMetrics {
    pub accounts: usize,
    pub cracked_accounts: usize,
    pub weak_accounts: usize,
    pub enabled_accounts: usize,
    pub lm_hashes: Vec<String>,
    pub ntlm_hashes: Vec<String>,
    pub blank_lm: usize,
    pub blank_ntlm: usize,
}

fn unique(hashes: &[String]) -> usize {
    hashes.iter().map(String::as_str).collect::<HashSet<_>>().len()
}

fn percent(part: usize, whole: usize, bucket: &str) -> Result<f64, MetricsError> {
    if whole == 0 {
        return Err(MetricsError::EmptyBucket(bucket.to_string()));
    }
    Ok(part as f64 / whole as f64 * 100.0)
}

/// Render a percentage with two decimals, e.g. `66.67%`.
pub fn format_percent(value: f64) -> String {
    format!("{:.2}%", value)
}

impl DomainMetrics {
    /// Count one record into this bucket.
    pub fn record(&mut self, r: &AccountRecord) {
        self.accounts += 1;
        if r.cracked {
            self.cracked_accounts += 1;
        }
        match r.weakness {
            Weakness::CrackedWeak { .. } => self.weak_accounts += 1,
            Weakness::NotCracked | Weakness::CrackedStrong => {}
        }
        match r.enabled {
            EnabledStatus::Enabled => self.enabled_accounts += 1,
            EnabledStatus::Disabled | EnabledStatus::Unknown => {}
        }

        let lm = r.lm_hash.to_lowercase();
        if r.has_blank_lm() {
            self.blank_lm += 1;
        } else {
            self.lm_hashes.push(lm);
        }
        let nt = r.ntlm_hash.to_lowercase();
        if r.has_blank_ntlm() {
            self.blank_ntlm += 1;
        } else {
            self.ntlm_hashes.push(nt);
        }
    }

    /// Fold another accumulator for the same bucket into this one.
    pub fn merge(&mut self, other: DomainMetrics) {
        self.accounts += other.accounts;
        self.cracked_accounts += other.cracked_accounts;
        self.weak_accounts += other.weak_accounts;
        self.enabled_accounts += other.enabled_accounts;
        self.lm_hashes.extend(other.lm_hashes);
        self.ntlm_hashes.extend(other.ntlm_hashes);
        self.blank_lm += other.blank_lm;
        self.blank_ntlm += other.blank_ntlm;
    }

    fn sort_hashes(&mut self) {
        self.lm_hashes.sort_unstable();
        self.ntlm_hashes.sort_unstable();
    }

    pub fn uncracked_accounts(&self) -> usize {
        self.accounts - self.cracked_accounts
    }

    pub fn not_weak_accounts(&self) -> usize {
        self.accounts - self.weak_accounts
    }

    pub fn disabled_accounts(&self) -> usize {
        self.accounts - self.enabled_accounts
    }

    pub fn unique_lm(&self) -> usize {
        unique(&self.lm_hashes)
    }

    pub fn unique_ntlm(&self) -> usize {
        unique(&self.ntlm_hashes)
    }

    pub fn cracked_percent(&self, bucket: &str) -> Result<f64, MetricsError> {
        percent(self.cracked_accounts, self.accounts, bucket)
    }

    pub fn enabled_percent(&self, bucket: &str) -> Result<f64, MetricsError> {
        percent(self.enabled_accounts, self.accounts, bucket)
    }
}

/// Bucket a record: machine accounts first, then accounts without a domain,
/// then the lower-cased domain name.
pub fn bucket_key(r: &AccountRecord) -> String {
    match (r.account_type, &r.domain) {
        (AccountType::Machine, _) => MACHINE_BUCKET.to_string(),
        (AccountType::User, None) => LOCAL_BUCKET.to_string(),
        (AccountType::User, Some(domain)) => domain.to_lowercase(),
    }
}

/// Per-bucket metrics plus the grand total.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MetricsReport {
    pub domains: BTreeMap<String, DomainMetrics>,
    pub total: DomainMetrics,
}

impl MetricsReport {
    fn from_domains(mut domains: BTreeMap<String, DomainMetrics>) -> Self {
        let mut total = DomainMetrics::default();
        for m in domains.values_mut() {
            m.sort_hashes();
            total.merge(m.clone());
        }
        total.sort_hashes();
        Self { domains, total }
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    /// Every bucket in name order, followed by the grand total.
    pub fn rows(&self) -> impl Iterator<Item = (&str, &DomainMetrics)> {
        self.domains
            .iter()
            .map(|(name, m)| (name.as_str(), m))
            .chain(std::iter::once((GRAND_TOTAL, &self.total)))
    }
}

#[derive(Debug, Clone)]
pub struct MetricsAggregator {
    include_machine: bool,
}

impl MetricsAggregator {
    pub fn new(config: &AuditConfig) -> Self {
        Self {
            include_machine: config.include_machine,
        }
    }

    fn accepts(&self, r: &AccountRecord) -> bool {
        self.include_machine || !r.is_machine()
    }

    pub fn aggregate(&self, records: &Records) -> MetricsReport {
        let mut domains: BTreeMap<String, DomainMetrics> = BTreeMap::new();
        for r in records.values().filter(|r| self.accepts(r)) {
            domains.entry(bucket_key(r)).or_default().record(r);
        }
        debug!(
            "metrics: {} records in {} buckets",
            records.len(),
            domains.len()
        );
        MetricsReport::from_domains(domains)
    }

    /// Same result as [`aggregate`](Self::aggregate), computed with one
    /// accumulator map per worker merged at the end.
    pub fn aggregate_parallel(&self, records: &Records) -> MetricsReport {
        let domains = records
            .par_iter()
            .filter(|(_, r)| self.accepts(r))
            .fold(
                BTreeMap::new,
                |mut acc: BTreeMap<String, DomainMetrics>, (_, r)| {
                    acc.entry(bucket_key(r)).or_default().record(r);
                    acc
                },
            )
            .reduce(BTreeMap::new, |mut left, right| {
                for (name, m) in right {
                    left.entry(name).or_default().merge(m);
                }
                left
            });
        MetricsReport::from_domains(domains)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{NULL_HASH_LM, NULL_HASH_NT};

    fn record(id: &str, lm: &str, nt: &str) -> AccountRecord {
        AccountRecord::new(id, lm, nt)
    }

    fn sample() -> Records {
        let mut a = record("ACME\\alice", NULL_HASH_LM, "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA")
            .with_enabled(EnabledStatus::Enabled);
        a.crack(Weakness::CrackedWeak {
            reason: "too short".into(),
        });
        let mut b = record("acme\\bob", "cccccccccccccccccccccccccccccccc", "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa")
            .with_enabled(EnabledStatus::Disabled);
        b.crack(Weakness::CrackedStrong);
        let c = record("OTHER\\carol", NULL_HASH_LM, "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa")
            .with_enabled(EnabledStatus::Enabled);
        let d = record("Administrator", NULL_HASH_LM, NULL_HASH_NT);
        let m = record("ACME\\HOST$", NULL_HASH_LM, "dddddddddddddddddddddddddddddddd");
        [a, b, c, d, m]
            .into_iter()
            .map(|r| (r.identifier.clone(), r))
            .collect()
    }

    #[test]
    fn buckets_by_type_then_domain() {
        let recs = sample();
        assert_eq!(bucket_key(&recs["ACME\\HOST$"]), "machine");
        assert_eq!(bucket_key(&recs["Administrator"]), "local");
        assert_eq!(bucket_key(&recs["ACME\\alice"]), "acme");
        assert_eq!(bucket_key(&recs["acme\\bob"]), "acme");
    }

    #[test]
    fn counts_per_bucket() {
        let report = MetricsAggregator::new(&AuditConfig::default()).aggregate(&sample());
        let names: Vec<&str> = report.domains.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["acme", "local", "other"]);

        let acme = &report.domains["acme"];
        assert_eq!(acme.accounts, 2);
        assert_eq!(acme.cracked_accounts, 2);
        assert_eq!(acme.weak_accounts, 1);
        assert_eq!(acme.enabled_accounts, 1);
        assert_eq!(acme.blank_lm, 1);
        assert_eq!(acme.lm_hashes.len(), 1);
        assert_eq!(acme.ntlm_hashes.len(), 2);
        assert_eq!(acme.unique_ntlm(), 1, "hashes are compared lower-cased");

        let local = &report.domains["local"];
        assert_eq!(local.blank_lm, 1);
        assert_eq!(local.blank_ntlm, 1);
        assert_eq!(local.unique_ntlm(), 0);
    }

    #[test]
    fn grand_total_uses_union_for_unique_hashes() {
        let report = MetricsAggregator::new(&AuditConfig::default()).aggregate(&sample());
        let t = &report.total;
        assert_eq!(t.accounts, 4);
        assert_eq!(t.ntlm_hashes.len(), 3);
        let summed_uniques: usize = report.domains.values().map(|m| m.unique_ntlm()).sum();
        assert_eq!(summed_uniques, 2);
        assert_eq!(t.unique_ntlm(), 1);
        assert_eq!(t.not_weak_accounts(), 3);
        assert_eq!(t.disabled_accounts(), 2);
        assert_eq!(t.uncracked_accounts(), 2);
    }

    #[test]
    fn machine_bucket_only_when_included() {
        let config = AuditConfig::default().with_include_machine(true);
        let report = MetricsAggregator::new(&config).aggregate(&sample());
        assert_eq!(report.domains["machine"].accounts, 1);
        assert_eq!(report.total.accounts, 5);
    }

    #[test]
    fn percentages_render_two_decimals() {
        let report = MetricsAggregator::new(&AuditConfig::default()).aggregate(&sample());
        let other = &report.domains["other"];
        assert_eq!(format_percent(other.cracked_percent("other").unwrap()), "0.00%");
        assert_eq!(format_percent(other.enabled_percent("other").unwrap()), "100.00%");
        let t = &report.total;
        assert_eq!(format_percent(t.cracked_percent(GRAND_TOTAL).unwrap()), "50.00%");
    }

    #[test]
    fn empty_bucket_percentage_is_an_error() {
        let empty = DomainMetrics::default();
        assert_eq!(
            empty.cracked_percent(GRAND_TOTAL),
            Err(MetricsError::EmptyBucket(GRAND_TOTAL.to_string()))
        );
    }

    #[test]
    fn parallel_matches_sequential() {
        let config = AuditConfig::default().with_include_machine(true);
        let agg = MetricsAggregator::new(&config);
        let recs = sample();
        assert_eq!(agg.aggregate(&recs), agg.aggregate_parallel(&recs));
    }

    #[test]
    fn rows_end_with_grand_total() {
        let report = MetricsAggregator::new(&AuditConfig::default()).aggregate(&sample());
        let names: Vec<&str> = report.rows().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["acme", "local", "other", GRAND_TOTAL]);
    }
}

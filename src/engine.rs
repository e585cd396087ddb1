//! Engine: loads cracked output and optional NTDS dumps, then runs the policy
//! evaluator and the metrics aggregator over what was loaded.
//!
//! Typical usage:
//!
//! ```no_run
//! use passhealth::{config::AuditConfig, engine::Engine, report::Reporter};
//! # fn main() -> anyhow::Result<()> {
//! let config = AuditConfig::default();
//! let mut engine = Engine::new(config.clone())?;
//! engine.load_from_file_paths(&["/path/to/john.txt"], &[])?;
//! let verdicts = engine.evaluate();
//! let metrics = engine.metrics();
//! print!("{}", Reporter::new(&config).render_summary(&engine, &verdicts, Some(&metrics))?);
//! # Ok(())
//! # }
//! ```
use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, info};

use crate::config::AuditConfig;
use crate::ingest::{Accounts, is_machine_identifier, parse_account_line};
use crate::io::{DEFAULT_MMAP_THRESHOLD_BYTES, iter_lines_auto};
use crate::metrics::{MetricsAggregator, MetricsReport};
use crate::policy::{PolicyEvaluator, PolicyVerdict};
use crate::records::{RecordError, Records, apply_cracked, parse_cracked_record, parse_dit_record};

/// Line counts gathered while loading.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ParseStats {
    pub cracked_lines: usize,
    pub dit_lines: usize,
    /// Lines without a colon.
    pub skipped_lines: usize,
    /// Machine accounts left out of policy evaluation.
    pub machine_filtered: usize,
    /// Dumped accounts matched to a cracked password.
    pub cracked_matched: usize,
}

#[derive(Default)]
struct LoadState {
    accounts: Accounts,
    cracked: Accounts,
    cracked_records: Records,
    dit_records: Records,
    stats: ParseStats,
}

#[derive(Debug)]
pub struct Engine {
    pub config: AuditConfig,
    /// Policy population: cracked accounts keyed by identifier.
    pub accounts: Accounts,
    /// Metrics population.
    pub records: Records,
    pub parse_stats: ParseStats,
    evaluator: PolicyEvaluator,
}

impl Engine {
    pub fn new(config: AuditConfig) -> Result<Self> {
        let evaluator = PolicyEvaluator::new(&config)?;
        Ok(Self {
            config,
            accounts: Accounts::new(),
            records: Records::new(),
            parse_stats: ParseStats::default(),
            evaluator,
        })
    }

    pub fn evaluator(&self) -> &PolicyEvaluator {
        &self.evaluator
    }

    fn take_cracked_line(
        &self,
        st: &mut LoadState,
        line: &str,
        build_records: bool,
    ) -> Result<(), RecordError> {
        st.stats.cracked_lines += 1;
        let Some((identifier, password)) = parse_account_line(line) else {
            st.stats.skipped_lines += 1;
            return Ok(());
        };
        st.cracked.insert(identifier.to_string(), password.to_string());
        if !self.config.include_machine && is_machine_identifier(identifier) {
            st.stats.machine_filtered += 1;
            return Ok(());
        }
        st.accounts
            .insert(identifier.to_string(), password.to_string());
        if build_records {
            if let Some(r) = parse_cracked_record(line, &self.evaluator)? {
                st.cracked_records.insert(r.identifier.clone(), r);
            }
        }
        Ok(())
    }

    fn take_dit_line(&self, st: &mut LoadState, line: &str) -> Result<(), RecordError> {
        st.stats.dit_lines += 1;
        match parse_dit_record(line)? {
            Some(r) => {
                st.dit_records.insert(r.identifier.clone(), r);
            }
            None => st.stats.skipped_lines += 1,
        }
        Ok(())
    }

    fn finish(&mut self, mut st: LoadState, have_dit: bool) {
        if !self.config.metrics {
            self.records = Records::new();
        } else if have_dit {
            st.stats.cracked_matched = apply_cracked(&mut st.dit_records, &st.cracked, &self.evaluator);
            self.records = st.dit_records;
        } else {
            st.stats.cracked_matched = st.cracked_records.len();
            self.records = st.cracked_records;
        }
        self.accounts = st.accounts;
        self.parse_stats = st.stats;
        info!(
            "loaded {} cracked accounts and {} account records",
            self.accounts.len(),
            self.records.len()
        );
    }

    /// Load inputs already in memory. Intended for tests and small
    /// programmatic integrations.
    pub fn load_from_strings(&mut self, cracked: &[&str], dits: &[&str]) -> Result<()> {
        let mut st = LoadState::default();
        let build_records = self.config.metrics && dits.is_empty();
        for (i, contents) in cracked.iter().enumerate() {
            for line in contents.lines() {
                self.take_cracked_line(&mut st, line, build_records)
                    .with_context(|| format!("cracked input #{}", i + 1))?;
            }
        }
        if self.config.metrics {
            for (i, contents) in dits.iter().enumerate() {
                for line in contents.lines() {
                    self.take_dit_line(&mut st, line)
                        .with_context(|| format!("dump input #{}", i + 1))?;
                }
            }
        }
        self.finish(st, !dits.is_empty());
        Ok(())
    }

    /// Stream inputs from files, memory-mapping those at or above
    /// `mmap_threshold_bytes`.
    pub fn load_from_file_paths_with_threshold<P: AsRef<Path>>(
        &mut self,
        cracked_paths: &[P],
        dit_paths: &[P],
        mmap_threshold_bytes: u64,
    ) -> Result<()> {
        let mut st = LoadState::default();
        let build_records = self.config.metrics && dit_paths.is_empty();
        for p in cracked_paths {
            let path = p.as_ref();
            debug!("reading cracked output {}", path.display());
            for line in iter_lines_auto(path, mmap_threshold_bytes)? {
                let line = line.with_context(|| format!("read {}", path.display()))?;
                self.take_cracked_line(&mut st, &line, build_records)
                    .with_context(|| format!("parse {}", path.display()))?;
            }
        }
        if self.config.metrics {
            for p in dit_paths {
                let path = p.as_ref();
                debug!("reading dump {}", path.display());
                for line in iter_lines_auto(path, mmap_threshold_bytes)? {
                    let line = line.with_context(|| format!("read {}", path.display()))?;
                    self.take_dit_line(&mut st, &line)
                        .with_context(|| format!("parse {}", path.display()))?;
                }
            }
        }
        self.finish(st, !dit_paths.is_empty());
        Ok(())
    }

    pub fn load_from_file_paths<P: AsRef<Path>>(
        &mut self,
        cracked_paths: &[P],
        dit_paths: &[P],
    ) -> Result<()> {
        self.load_from_file_paths_with_threshold(
            cracked_paths,
            dit_paths,
            DEFAULT_MMAP_THRESHOLD_BYTES,
        )
    }

    /// Verdicts for accounts breaching the policy.
    pub fn evaluate(&self) -> Vec<PolicyVerdict> {
        self.evaluator.evaluate(&self.accounts)
    }

    pub fn metrics(&self) -> MetricsReport {
        MetricsAggregator::new(&self.config).aggregate(&self.records)
    }

    pub fn metrics_parallel(&self) -> MetricsReport {
        MetricsAggregator::new(&self.config).aggregate_parallel(&self.records)
    }
}

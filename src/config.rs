//! Audit configuration shared by the evaluator, aggregator and reporters.

/// Default minimum acceptable password length.
pub const DEFAULT_MIN_LENGTH: usize = 8;

/// Explicit run configuration. Built once by the CLI and handed to each
/// component at construction time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditConfig {
    pub min_length: usize,
    pub reveal_passwords: bool,
    pub include_machine: bool,
    pub verbose: bool,
    /// Build account records and domain metrics.
    pub metrics: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            min_length: DEFAULT_MIN_LENGTH,
            reveal_passwords: false,
            include_machine: false,
            verbose: false,
            metrics: true,
        }
    }
}

impl AuditConfig {
    pub fn with_min_length(mut self, min_length: usize) -> Self {
        self.min_length = min_length;
        self
    }

    pub fn with_reveal_passwords(mut self, reveal: bool) -> Self {
        self.reveal_passwords = reveal;
        self
    }

    pub fn with_include_machine(mut self, include: bool) -> Self {
        self.include_machine = include;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_metrics(mut self, metrics: bool) -> Self {
        self.metrics = metrics;
        self
    }
}

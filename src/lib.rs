pub mod account;
pub mod config;
pub mod engine;
pub mod export;
pub mod ingest;
pub mod io;
pub mod metrics;
pub mod policy;
pub mod records;
pub mod report;

pub mod prelude {
    pub use crate::account::{AccountRecord, AccountType, EnabledStatus, Weakness};
    pub use crate::config::AuditConfig;
    pub use crate::engine::Engine;
    pub use crate::metrics::{DomainMetrics, MetricsAggregator, MetricsReport};
    pub use crate::policy::{PolicyEvaluator, PolicyVerdict};
}

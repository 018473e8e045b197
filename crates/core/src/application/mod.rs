// Application Layer - Use Cases and Business Logic

pub mod catalog;
pub mod constants;
pub mod diagnostics;
pub mod freshness;
pub mod jobs;
pub mod market_data;
pub mod reference;
pub mod registry;
pub mod retention;
pub mod scheduler;

// Re-exports
pub use catalog::{handler_fn, JobCatalog, JobContext, JobHandler};
pub use diagnostics::DiagnosticLog;
pub use freshness::{
    CacheLookup, CachePolicies, DomainPolicy, FreshnessCache, RefreshFailurePolicy,
    ReplaceStrategy, Ttl,
};
pub use jobs::{
    methods, standard_catalog, JobSettings, LogCompactionJob, RefreshJob, RefreshKind,
};
pub use market_data::{Cached, MarketDataService};
pub use reference::ReferenceService;
pub use registry::{JobRegistry, ReconcileReport};
pub use retention::{CompactionReport, LogRetention};
pub use scheduler::{
    shutdown_channel, SchedulerConfig, SequentialScheduler, ShutdownSender, ShutdownToken,
};

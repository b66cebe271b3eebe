// Org-Ledger - Core Library
// Hierarchy model, collection analytics and report assembly for the
// 8-level organizational tree. Exposed for the CLI, API server and tests.

pub mod config;
pub mod export;
pub mod hierarchy;
pub mod metrics;
pub mod report;
pub mod rollup;
pub mod store;

// Re-export commonly used types
pub use config::{FileConfig, LedgerConfig};
pub use export::ReportExporter;
pub use hierarchy::{validate_create, HierarchyError, Node, NodeType};
pub use metrics::{
    HistogramBin, MetricsEngine, MonthValue, MonthlySeries, SeriesStats, MONTHS,
};
pub use report::{
    CollectionReport, CollectionStore, ReportAssembler, SeriesSnapshot, StoreError,
};
pub use rollup::{ChildPerformance, Rollup, RollupAggregator};
pub use store::{Member, NodeDetails, NodeSummary, Payment, PaymentMode, SqliteStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

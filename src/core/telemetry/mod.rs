//! Turn telemetry: a fire-and-forget cost pipeline.
//!
//! Producers call [`TelemetrySink::record`], which only pushes onto a bounded
//! queue. One consumer task prices each event, folds it into per-session and
//! per-stage aggregates, and hands it to a [`CostStore`].

pub mod event;
pub mod pricing;
pub mod queue;
pub mod sink;
pub mod store;

pub use event::{CostEvent, CostRecord, Stage};
pub use pricing::PricingTable;
pub use queue::{DropPolicy, TelemetryQueue};
pub use sink::{SessionCost, StageTotals, TelemetryConfig, TelemetrySink, TelemetrySummary};
pub use store::{CostStore, JsonlCostStore, MemoryCostStore, TelemetryError};

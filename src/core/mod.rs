// Comparison engine: normalization, metrics, aggregation, scheduling and the result graph.

pub mod aggregate;
pub mod connectivity;
pub mod error;
pub mod figure;
pub mod metrics;
pub mod normalize;
pub mod scheduler;

pub use aggregate::{aggregate, AggregatedMetrics, Stats, Target};
pub use connectivity::{Connection, ConnectivityStore, ExportRow, REFERENCE_POOL_ID};
pub use error::CompareError;
pub use figure::{Entity, Figure, Role};
pub use metrics::{compare, MetricTriple, SSIM_WINDOW};
pub use normalize::normalize;
pub use scheduler::{ScheduleError, ScheduleOutcome, ScheduleProgress, Scheduler, WorkUnit};

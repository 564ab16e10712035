//! Find visually duplicated figures across student submissions and reference material.
//!
//! The [`core`] module holds the comparison engine; [`services`] wraps the collaborators
//! around it (corpus discovery, figure extraction, report writing).

pub mod config;
pub mod core;
pub mod logging;
pub mod services;

pub use crate::config::RunConfig;
pub use crate::core::{
    AggregatedMetrics, CompareError, Connection, ConnectivityStore, Entity, Figure,
    MetricTriple, Role, Scheduler,
};

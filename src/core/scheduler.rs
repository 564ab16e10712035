use super::aggregate::{aggregate, AggregatedMetrics, Target};
use super::connectivity::{Connection, ConnectivityStore, REFERENCE_POOL_ID};
use super::error::CompareError;
use super::figure::Entity;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use serde::Serialize;
use std::sync::mpsc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// One dispatchable comparison.
#[derive(Debug, Clone, Copy)]
pub enum WorkUnit<'a> {
    Pair { a: &'a Entity, b: &'a Entity },
    Pool { submission: &'a Entity },
}

impl WorkUnit<'_> {
    pub fn describe(&self) -> String {
        match self {
            WorkUnit::Pair { a, b } => format!("{} vs {}", a.id, b.id),
            WorkUnit::Pool { submission } => {
                format!("{} vs {}", submission.id, REFERENCE_POOL_ID)
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScheduleProgress {
    pub completed: usize,
    pub total: usize,
    pub current_unit: String,
}

pub type ProgressCallback = Box<dyn Fn(ScheduleProgress) + Send + Sync>;

/// Everything a run produced, in completion order.
#[derive(Debug, Default)]
pub struct ScheduleOutcome {
    pub connections: Vec<Connection>,
    pub dispatched: usize,
    pub recorded: usize,
    pub skipped: usize,
    pub failed: usize,
}

pub struct Scheduler {
    workers: usize,
    progress_callback: Option<ProgressCallback>,
}

impl Scheduler {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
            progress_callback: None,
        }
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Every unordered submission pair once, then one pool unit per submission.
    pub fn plan<'a>(submissions: &'a [Entity], references: &'a [Entity]) -> Vec<WorkUnit<'a>> {
        let mut units = Vec::new();
        for (i, a) in submissions.iter().enumerate() {
            for b in &submissions[i + 1..] {
                units.push(WorkUnit::Pair { a, b });
            }
        }
        if !references.is_empty() {
            units.extend(
                submissions
                    .iter()
                    .map(|submission| WorkUnit::Pool { submission }),
            );
        }
        units
    }

    /// Fan the planned units out over the worker pool and gather their results on the
    /// calling thread as they complete.
    pub fn run(
        &self,
        submissions: &[Entity],
        references: &[Entity],
    ) -> Result<ScheduleOutcome, ScheduleError> {
        self.run_with(submissions, references, execute)
    }

    fn run_with<F>(
        &self,
        submissions: &[Entity],
        references: &[Entity],
        execute: F,
    ) -> Result<ScheduleOutcome, ScheduleError>
    where
        F: Fn(&WorkUnit<'_>, &[Entity]) -> Result<Option<Connection>, CompareError> + Sync,
    {
        let units = Self::plan(submissions, references);
        let total = units.len();
        let pool = ThreadPoolBuilder::new().num_threads(self.workers).build()?;

        log::info!(
            "Dispatching {} comparison unit(s) on {} worker(s)",
            total,
            self.workers
        );

        let mut outcome = ScheduleOutcome {
            dispatched: total,
            ..ScheduleOutcome::default()
        };

        let (sender, receiver) = mpsc::channel();
        let units = &units;
        let pool = &pool;
        let execute = &execute;

        std::thread::scope(|scope| {
            scope.spawn(move || {
                pool.install(|| {
                    units.par_iter().for_each_with(sender, |sender, unit| {
                        let result = execute(unit, references);
                        // The receiver only goes away if the collecting thread panicked.
                        let _ = sender.send((unit.describe(), result));
                    });
                });
            });

            for (completed, (label, result)) in receiver.iter().enumerate() {
                match result {
                    Ok(Some(connection)) => {
                        outcome.recorded += 1;
                        outcome.connections.push(connection);
                    }
                    Ok(None) => {
                        log::debug!("No record for {}", label);
                        outcome.skipped += 1;
                    }
                    Err(err) => {
                        log::error!("Skipping {} after {}: {}", label, err.kind(), err);
                        outcome.failed += 1;
                    }
                }
                self.report_progress(completed + 1, total, label);
            }
        });

        log::info!(
            "Comparison finished: {} recorded, {} skipped, {} failed",
            outcome.recorded,
            outcome.skipped,
            outcome.failed
        );

        Ok(outcome)
    }

    /// Run and insert every result into `store` from the calling thread.
    pub fn populate(
        &self,
        submissions: &[Entity],
        references: &[Entity],
        store: &mut ConnectivityStore,
    ) -> Result<ScheduleOutcome, ScheduleError> {
        let outcome = self.run(submissions, references)?;
        for connection in &outcome.connections {
            store.insert(connection.clone());
        }
        Ok(outcome)
    }

    fn report_progress(&self, completed: usize, total: usize, current_unit: String) {
        if let Some(callback) = &self.progress_callback {
            callback(ScheduleProgress {
                completed,
                total,
                current_unit,
            });
        }
    }
}

fn execute(
    unit: &WorkUnit<'_>,
    references: &[Entity],
) -> Result<Option<Connection>, CompareError> {
    let record = match *unit {
        WorkUnit::Pair { a, b } => aggregate(a, Target::Entity(b))?
            .map(|metrics| connection(&a.id, &b.id, metrics, false)),
        WorkUnit::Pool { submission } => aggregate(submission, Target::Pool(references))?
            .map(|metrics| connection(&submission.id, REFERENCE_POOL_ID, metrics, true)),
    };
    Ok(record)
}

fn connection(a: &str, b: &str, metrics: AggregatedMetrics, is_reference: bool) -> Connection {
    Connection {
        a: a.to_string(),
        b: b.to_string(),
        metrics,
        is_reference,
    }
}

use super::aggregate::AggregatedMetrics;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Name listed on a submission's adjacency list for its reference-pool comparison.
pub const REFERENCE_POOL_ID: &str = "references";

/// One aggregated comparison result between two entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub a: String,
    pub b: String,
    pub metrics: AggregatedMetrics,
    pub is_reference: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Neighbour {
    pub other: String,
    pub metrics: AggregatedMetrics,
    pub is_reference: bool,
}

/// Flat, CSV-shaped view of one adjacency entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportRow {
    pub entity_id_a: String,
    pub entity_id_b: String,
    pub mse_min: f64,
    pub mse_max: f64,
    pub mse_mean: f64,
    pub ssim_min: f64,
    pub ssim_max: f64,
    pub ssim_mean: f64,
    pub psnr_min: f64,
    pub psnr_max: f64,
    pub psnr_mean: f64,
}

impl ExportRow {
    pub const HEADER: [&'static str; 11] = [
        "entity_id_a",
        "entity_id_b",
        "mse_min",
        "mse_max",
        "mse_mean",
        "ssim_min",
        "ssim_max",
        "ssim_mean",
        "psnr_min",
        "psnr_max",
        "psnr_mean",
    ];

    fn new(a: &str, b: &str, metrics: &AggregatedMetrics) -> Self {
        Self {
            entity_id_a: a.to_string(),
            entity_id_b: b.to_string(),
            mse_min: metrics.mse.min,
            mse_max: metrics.mse.max,
            mse_mean: metrics.mse.mean,
            ssim_min: metrics.ssim.min,
            ssim_max: metrics.ssim.max,
            ssim_mean: metrics.ssim.mean,
            psnr_min: metrics.psnr.min,
            psnr_max: metrics.psnr.max,
            psnr_mean: metrics.psnr.mean,
        }
    }

    /// The nine metric columns in header order.
    pub fn values(&self) -> [f64; 9] {
        [
            self.mse_min,
            self.mse_max,
            self.mse_mean,
            self.ssim_min,
            self.ssim_max,
            self.ssim_mean,
            self.psnr_min,
            self.psnr_max,
            self.psnr_mean,
        ]
    }
}

/// Adjacency lists of every comparison recorded during a run.
///
/// Append-only. It is owned by whoever drives the run and mutated from a single thread.
#[derive(Debug, Default)]
pub struct ConnectivityStore {
    adjacency: BTreeMap<String, Vec<Neighbour>>,
}

impl ConnectivityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a result. Symmetric edges land on both endpoints, reference edges only on `a`.
    pub fn add(&mut self, a: &str, b: &str, metrics: AggregatedMetrics, symmetric: bool) {
        self.adjacency
            .entry(a.to_string())
            .or_default()
            .push(Neighbour {
                other: b.to_string(),
                metrics,
                is_reference: !symmetric,
            });

        if symmetric {
            self.adjacency
                .entry(b.to_string())
                .or_default()
                .push(Neighbour {
                    other: a.to_string(),
                    metrics,
                    is_reference: false,
                });
        }
    }

    pub fn insert(&mut self, connection: Connection) {
        self.add(
            &connection.a,
            &connection.b,
            connection.metrics,
            !connection.is_reference,
        );
    }

    pub fn neighbours(&self, id: &str) -> &[Neighbour] {
        self.adjacency.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn entity_ids(&self) -> impl Iterator<Item = &str> {
        self.adjacency.keys().map(String::as_str)
    }

    /// Total number of adjacency entries (a symmetric edge counts twice).
    pub fn len(&self) -> usize {
        self.adjacency.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.adjacency.values().all(Vec::is_empty)
    }

    /// Flatten every adjacency list, sorted by endpoint ids so the result does not depend
    /// on the order results arrived in.
    pub fn export(&self) -> Vec<ExportRow> {
        let mut rows: Vec<ExportRow> = self
            .adjacency
            .iter()
            .flat_map(|(id, neighbours)| {
                neighbours
                    .iter()
                    .map(move |n| ExportRow::new(id, &n.other, &n.metrics))
            })
            .collect();

        rows.sort_by(|x, y| {
            x.entity_id_a
                .cmp(&y.entity_id_a)
                .then_with(|| x.entity_id_b.cmp(&y.entity_id_b))
                .then_with(|| x.mse_min.total_cmp(&y.mse_min))
        });
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::aggregate::Stats;

    fn metrics(mse: f64) -> AggregatedMetrics {
        AggregatedMetrics {
            mse: Stats { min: mse, max: mse * 2.0, mean: mse * 1.5 },
            ssim: Stats { min: 0.2, max: 0.9, mean: 0.5 },
            psnr: Stats { min: 20.0, max: f64::INFINITY, mean: f64::INFINITY },
        }
    }

    #[test]
    fn test_symmetric_insertion() {
        let mut store = ConnectivityStore::new();
        store.add("alice", "bob", metrics(3.0), true);

        let alice = store.neighbours("alice");
        let bob = store.neighbours("bob");
        assert_eq!(alice.len(), 1);
        assert_eq!(bob.len(), 1);
        assert_eq!(alice[0].other, "bob");
        assert_eq!(bob[0].other, "alice");
        assert_eq!(alice[0].metrics, bob[0].metrics);
        assert!(!alice[0].is_reference);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_reference_insertion_is_one_sided() {
        let mut store = ConnectivityStore::new();
        store.insert(Connection {
            a: "alice".to_string(),
            b: REFERENCE_POOL_ID.to_string(),
            metrics: metrics(1.0),
            is_reference: true,
        });

        assert_eq!(store.neighbours("alice").len(), 1);
        assert!(store.neighbours("alice")[0].is_reference);
        assert!(store.neighbours(REFERENCE_POOL_ID).is_empty());
        assert_eq!(store.entity_ids().collect::<Vec<_>>(), vec!["alice"]);
    }

    #[test]
    fn test_export_is_insertion_order_independent() {
        let mut first = ConnectivityStore::new();
        first.add("a", "b", metrics(1.0), true);
        first.add("b", "c", metrics(2.0), true);
        first.add("a", REFERENCE_POOL_ID, metrics(3.0), false);

        let mut second = ConnectivityStore::new();
        second.add("a", REFERENCE_POOL_ID, metrics(3.0), false);
        second.add("b", "c", metrics(2.0), true);
        second.add("a", "b", metrics(1.0), true);

        let rows = first.export();
        assert_eq!(rows, second.export());
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0].entity_id_a, "a");
        assert_eq!(rows[0].entity_id_b, "b");
        assert_eq!(rows[1].entity_id_b, REFERENCE_POOL_ID);
        assert_eq!(rows[0].values()[0], 1.0);
        assert_eq!(rows[0].psnr_max, f64::INFINITY);
    }

    #[test]
    fn test_empty_store() {
        let store = ConnectivityStore::new();
        assert!(store.is_empty());
        assert_eq!(store.len(), 0);
        assert!(store.export().is_empty());
    }
}

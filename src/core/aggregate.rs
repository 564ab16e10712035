use super::error::CompareError;
use super::figure::{Entity, Figure};
use super::metrics::{compare, MetricTriple};
use super::normalize::normalize;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

/// Per-metric (min, max, mean) for one compared entity pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregatedMetrics {
    pub mse: Stats,
    pub ssim: Stats,
    pub psnr: Stats,
}

/// What an entity is compared against.
#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
    /// Another submission: full cross product of figures.
    Entity(&'a Entity),
    /// The whole reference pool, flattened into one list of figures.
    Pool(&'a [Entity]),
}

/// Compare `entity` against `target` and reduce the per-image metrics.
///
/// Returns `Ok(None)` when there is nothing meaningful to record: a self-pair, an empty side,
/// or a comparison where every image pair was too small to measure.
pub fn aggregate(
    entity: &Entity,
    target: Target<'_>,
) -> Result<Option<AggregatedMetrics>, CompareError> {
    match target {
        Target::Entity(other) => aggregate_pair(entity, other),
        Target::Pool(references) => aggregate_pool(entity, references),
    }
}

fn aggregate_pair(
    entity: &Entity,
    other: &Entity,
) -> Result<Option<AggregatedMetrics>, CompareError> {
    if entity.id == other.id {
        return Ok(None);
    }
    if entity.is_empty() || other.is_empty() {
        return Ok(None);
    }

    let mut reducer = Reducer::new();
    for left in &entity.figures {
        for right in &other.figures {
            if let Some(triple) = measure(entity, left, other, right)? {
                reducer.push(triple);
            }
        }
    }

    Ok(reducer.finish())
}

/// Average over the whole pool per submission figure, then reduce across figures.
fn aggregate_pool(
    entity: &Entity,
    references: &[Entity],
) -> Result<Option<AggregatedMetrics>, CompareError> {
    let pool_size: usize = references.iter().map(Entity::len).sum();
    if entity.is_empty() || pool_size == 0 {
        return Ok(None);
    }

    let mut reducer = Reducer::new();
    for left in &entity.figures {
        let mut sums = MetricSums::default();
        for reference in references {
            for right in &reference.figures {
                if let Some(triple) = measure(entity, left, reference, right)? {
                    sums.add(triple);
                }
            }
        }
        if let Some(mean) = sums.mean() {
            reducer.push(mean);
        }
    }

    Ok(reducer.finish())
}

/// Normalize and measure one image pair. Undersized pairs are reported and dropped.
fn measure(
    left_owner: &Entity,
    left: &Figure,
    right_owner: &Entity,
    right: &Figure,
) -> Result<Option<MetricTriple>, CompareError> {
    let result = normalize(&left.image, &right.image).and_then(|(a, b)| compare(&a, &b));

    match result {
        Ok(triple) => Ok(Some(triple)),
        Err(err @ CompareError::WindowTooSmall { .. }) => {
            log::warn!(
                "Skipping {}/{} vs {}/{}: {}",
                left_owner.id,
                left.name,
                right_owner.id,
                right.name,
                err
            );
            Ok(None)
        }
        Err(err) => {
            log::error!(
                "{} while comparing {}/{} with {}/{}: {}",
                err.kind(),
                left_owner.id,
                left.name,
                right_owner.id,
                right.name,
                err
            );
            Err(err)
        }
    }
}

#[derive(Debug, Default)]
struct MetricSums {
    count: usize,
    mse: f64,
    ssim: f64,
    psnr: f64,
}

impl MetricSums {
    fn add(&mut self, triple: MetricTriple) {
        self.count += 1;
        self.mse += triple.mse;
        self.ssim += triple.ssim;
        self.psnr += triple.psnr;
    }

    fn mean(&self) -> Option<MetricTriple> {
        if self.count == 0 {
            return None;
        }
        let n = self.count as f64;
        Some(MetricTriple {
            mse: self.mse / n,
            ssim: self.ssim / n,
            psnr: self.psnr / n,
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct Running {
    min: f64,
    max: f64,
    sum: f64,
}

impl Running {
    fn new() -> Self {
        Self {
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            sum: 0.0,
        }
    }

    fn push(&mut self, value: f64) {
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.sum += value;
    }

    fn stats(&self, count: usize) -> Stats {
        Stats {
            min: self.min,
            max: self.max,
            mean: self.sum / count as f64,
        }
    }
}

struct Reducer {
    count: usize,
    mse: Running,
    ssim: Running,
    psnr: Running,
}

impl Reducer {
    fn new() -> Self {
        Self {
            count: 0,
            mse: Running::new(),
            ssim: Running::new(),
            psnr: Running::new(),
        }
    }

    fn push(&mut self, triple: MetricTriple) {
        self.count += 1;
        self.mse.push(triple.mse);
        self.ssim.push(triple.ssim);
        self.psnr.push(triple.psnr);
    }

    fn finish(&self) -> Option<AggregatedMetrics> {
        if self.count == 0 {
            return None;
        }
        Some(AggregatedMetrics {
            mse: self.mse.stats(self.count),
            ssim: self.ssim.stats(self.count),
            psnr: self.psnr.stats(self.count),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::figure::Role;
    use image::{DynamicImage, Rgb, RgbImage};

    fn solid(name: &str, size: u32, value: u8) -> Figure {
        let image = RgbImage::from_pixel(size, size, Rgb([value, value, value]));
        Figure::new(name, DynamicImage::ImageRgb8(image))
    }

    fn entity(id: &str, role: Role, values: &[u8]) -> Entity {
        let figures = values
            .iter()
            .enumerate()
            .map(|(i, &v)| solid(&format!("{}.png", i), 20, v))
            .collect();
        Entity::new(id, role).with_figures(figures)
    }

    #[test]
    fn test_self_pair_is_skipped() {
        let a = entity("alice", Role::Submission, &[10, 20]);
        assert!(aggregate(&a, Target::Entity(&a)).unwrap().is_none());

        // Same id, different instance
        let twin = entity("alice", Role::Submission, &[99]);
        assert!(aggregate(&a, Target::Entity(&twin)).unwrap().is_none());
    }

    #[test]
    fn test_empty_entities_are_skipped() {
        let empty = Entity::new("empty", Role::Submission);
        let full = entity("full", Role::Submission, &[10]);
        let refs = vec![entity("ref_a", Role::Reference, &[1, 2, 3])];

        assert!(aggregate(&empty, Target::Entity(&full)).unwrap().is_none());
        assert!(aggregate(&full, Target::Entity(&empty)).unwrap().is_none());
        assert!(aggregate(&empty, Target::Pool(&refs)).unwrap().is_none());
        assert!(aggregate(&full, Target::Pool(&[])).unwrap().is_none());

        let empty_refs = vec![Entity::new("ref_empty", Role::Reference)];
        assert!(aggregate(&full, Target::Pool(&empty_refs)).unwrap().is_none());
    }

    #[test]
    fn test_identical_solid_images() {
        let a = Entity::new("a", Role::Submission).with_figures(vec![solid("0.png", 100, 128)]);
        let b = Entity::new("b", Role::Submission).with_figures(vec![solid("0.png", 100, 128)]);

        let metrics = aggregate(&a, Target::Entity(&b)).unwrap().unwrap();

        assert_eq!(metrics.mse, Stats { min: 0.0, max: 0.0, mean: 0.0 });
        assert!((metrics.ssim.min - 1.0).abs() < 1e-6);
        assert!((metrics.ssim.max - 1.0).abs() < 1e-6);
        assert!((metrics.ssim.mean - 1.0).abs() < 1e-6);
        assert_eq!(metrics.psnr.min, f64::INFINITY);
        assert_eq!(metrics.psnr.max, f64::INFINITY);
        assert_eq!(metrics.psnr.mean, f64::INFINITY);
    }

    #[test]
    fn test_cross_product_reduction() {
        let a = entity("a", Role::Submission, &[10, 20]);
        let b = entity("b", Role::Submission, &[10]);

        let metrics = aggregate(&a, Target::Entity(&b)).unwrap().unwrap();

        // Pairs: (10,10) -> 0, (20,10) -> 100
        assert_eq!(metrics.mse.min, 0.0);
        assert_eq!(metrics.mse.max, 100.0);
        assert_eq!(metrics.mse.mean, 50.0);
        assert_eq!(metrics.psnr.max, f64::INFINITY);
        assert!(metrics.psnr.min.is_finite());
    }

    #[test]
    fn test_cross_product_is_order_independent() {
        let a = entity("a", Role::Submission, &[10, 40, 90]);
        let b = entity("b", Role::Submission, &[15, 200]);

        let forward = aggregate(&a, Target::Entity(&b)).unwrap().unwrap();
        let backward = aggregate(&b, Target::Entity(&a)).unwrap().unwrap();

        assert_eq!(forward.mse, backward.mse);
        assert_eq!(forward.psnr.min, backward.psnr.min);
        assert_eq!(forward.psnr.max, backward.psnr.max);
        assert!((forward.ssim.mean - backward.ssim.mean).abs() < 1e-12);
    }

    #[test]
    fn test_pool_reduction_averages_references_first() {
        let submission = entity("s", Role::Submission, &[10, 20]);
        let refs = vec![
            entity("ref_one", Role::Reference, &[10]),
            entity("ref_two", Role::Reference, &[30]),
        ];

        let metrics = aggregate(&submission, Target::Pool(&refs)).unwrap().unwrap();

        // Figure 10: mean(0, 400) = 200. Figure 20: mean(100, 100) = 100.
        assert_eq!(metrics.mse.min, 100.0);
        assert_eq!(metrics.mse.max, 200.0);
        assert_eq!(metrics.mse.mean, 150.0);
        // One exact match makes the per-figure PSNR mean infinite
        assert_eq!(metrics.psnr.max, f64::INFINITY);
    }

    #[test]
    fn test_pool_does_not_short_circuit_on_matching_id() {
        let submission = entity("same", Role::Submission, &[10]);
        let refs = vec![entity("same", Role::Reference, &[10])];

        let metrics = aggregate(&submission, Target::Pool(&refs)).unwrap();
        assert!(metrics.is_some());
    }

    #[test]
    fn test_undersized_pairs_are_dropped() {
        let a = Entity::new("a", Role::Submission).with_figures(vec![
            solid("tiny.png", 5, 10),
            solid("big.png", 20, 10),
        ]);
        let b = Entity::new("b", Role::Submission).with_figures(vec![solid("tiny.png", 6, 10)]);

        // tiny vs tiny pads to 6x6 and is dropped; big vs tiny pads to 20x20
        let metrics = aggregate(&a, Target::Entity(&b)).unwrap().unwrap();
        assert!(metrics.mse.max > 0.0);
        assert_eq!(metrics.mse.min, metrics.mse.max);

        let c = Entity::new("c", Role::Submission).with_figures(vec![solid("tiny.png", 4, 1)]);
        let d = Entity::new("d", Role::Submission).with_figures(vec![solid("tiny.png", 7, 1)]);
        assert!(aggregate(&c, Target::Entity(&d)).unwrap().is_none());
    }
}

use crate::config::SUPPORTED_FILE_TYPES;
use crate::core::figure::{Entity, Figure, Role};
use crate::services::corpus::DocumentSet;
use image::{DynamicImage, ImageReader};
use rayon::prelude::*;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Unsupported document: {path}")]
    UnsupportedDocument { path: String },
}

/// Turns one document into the figures worth comparing. `role` is the role of the entity
/// the document belongs to.
pub trait Extractor: Sync {
    fn extract(&self, document: &Path, role: Role) -> Result<Vec<Figure>, ExtractError>;
}

/// Treats every raster file as a single-figure document.
pub struct RasterExtractor {
    min_side: u32,
    dominance: f64,
}

impl RasterExtractor {
    pub fn new() -> Self {
        Self {
            min_side: 11,
            dominance: 0.95,
        }
    }

    /// Blank, transparent and undersized rasters carry no evidence of copying.
    pub fn is_dummy(&self, image: &DynamicImage) -> bool {
        if image.width() < self.min_side || image.height() < self.min_side {
            return true;
        }

        let rgba = image.to_rgba8();
        let total = rgba.width() as f64 * rgba.height() as f64;
        let mut transparent = 0usize;
        let mut white = 0usize;
        let mut black = 0usize;
        for pixel in rgba.pixels() {
            let [r, g, b, a] = pixel.0;
            if a == 0 {
                transparent += 1;
            }
            if (r, g, b) == (255, 255, 255) {
                white += 1;
            } else if (r, g, b) == (0, 0, 0) {
                black += 1;
            }
        }

        [transparent, white, black]
            .iter()
            .any(|&count| count as f64 / total > self.dominance)
    }
}

impl Default for RasterExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor for RasterExtractor {
    fn extract(&self, document: &Path, role: Role) -> Result<Vec<Figure>, ExtractError> {
        let supported = document
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| SUPPORTED_FILE_TYPES.contains(&ext.to_lowercase().as_str()))
            .unwrap_or(false);
        if !supported {
            return Err(ExtractError::UnsupportedDocument {
                path: document.display().to_string(),
            });
        }

        let image = ImageReader::open(document)?.with_guessed_format()?.decode()?;
        if self.is_dummy(&image) {
            log::debug!("Discarding dummy {} image {}", role, document.display());
            return Ok(Vec::new());
        }

        let name = document
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .into_owned();
        Ok(vec![Figure::new(name, image)])
    }
}

/// Entities built from a set of documents, plus counters for the run summary.
#[derive(Debug, Default)]
pub struct Extraction {
    pub entities: Vec<Entity>,
    pub documents: usize,
    pub figures: usize,
    pub failures: usize,
}

/// Extract every document in parallel and file the figures under their entity.
///
/// A failing document is logged and contributes nothing; its entity may end up empty.
pub fn extract_entities(
    extractor: &dyn Extractor,
    sets: &[DocumentSet],
    on_document: Option<&(dyn Fn(&Path) + Sync)>,
) -> Extraction {
    let jobs: Vec<(usize, Role, &Path)> = sets
        .iter()
        .enumerate()
        .flat_map(|(i, set)| set.documents.iter().map(move |doc| (i, set.role, doc.as_path())))
        .collect();

    let results: Vec<(usize, &Path, Result<Vec<Figure>, ExtractError>)> = jobs
        .par_iter()
        .map(|&(i, role, doc)| {
            let result = extractor.extract(doc, role);
            if let Some(callback) = on_document {
                callback(doc);
            }
            (i, doc, result)
        })
        .collect();

    let mut extraction = Extraction {
        entities: sets
            .iter()
            .map(|set| Entity::new(set.entity_id.clone(), set.role))
            .collect(),
        documents: jobs.len(),
        ..Extraction::default()
    };

    for (i, doc, result) in results {
        match result {
            Ok(figures) => {
                extraction.figures += figures.len();
                for figure in figures {
                    extraction.entities[i].push(figure);
                }
            }
            Err(err) => {
                log::warn!(
                    "Failed to extract {} for {}: {}",
                    doc.display(),
                    extraction.entities[i].id,
                    err
                );
                extraction.failures += 1;
            }
        }
    }

    for entity in extraction.entities.iter().filter(|e| e.is_empty()) {
        log::info!("{} {} has no usable figures", entity.role, entity.id);
    }

    extraction
}

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Raster formats the bundled extractor can turn into figures.
pub const SUPPORTED_FILE_TYPES: [&str; 8] =
    ["png", "jpg", "jpeg", "bmp", "gif", "tif", "tiff", "webp"];

pub const DEFAULT_FILE_TYPES: &str = "png,jpg,jpeg";
pub const DEFAULT_SHAPE_THRESHOLD: u32 = 5;
pub const DEFAULT_ERROR_THRESHOLD: f64 = 0.01;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No file types given to check")]
    NoFileTypes,

    #[error("Unsupported file type: {extension} (supported: {supported})")]
    UnsupportedFileType { extension: String, supported: String },
}

/// Settings for one analysis run. Echoed verbatim into the run summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub input_dir: PathBuf,
    pub reference_dir: Option<PathBuf>,
    pub output_dir: PathBuf,
    pub file_types: Vec<String>,
    pub worker_count: usize,
    /// Carried for reporting; the comparison path never reads it.
    pub shape_threshold: u32,
    /// Applied only when ranking exported rows.
    pub error_threshold: f64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("submission"),
            reference_dir: Some(PathBuf::from("reference")),
            output_dir: PathBuf::from("out"),
            file_types: DEFAULT_FILE_TYPES.split(',').map(str::to_string).collect(),
            worker_count: num_cpus::get(),
            shape_threshold: DEFAULT_SHAPE_THRESHOLD,
            error_threshold: DEFAULT_ERROR_THRESHOLD,
        }
    }
}

/// Parse a comma-separated extension list such as `png,JPG, .jpeg`.
pub fn parse_file_types(raw: &str) -> Result<Vec<String>, ConfigError> {
    let mut types: Vec<String> = Vec::new();
    for ext in raw.split(',') {
        let ext = ext.trim().trim_start_matches('.').to_lowercase();
        if ext.is_empty() {
            continue;
        }
        if !SUPPORTED_FILE_TYPES.contains(&ext.as_str()) {
            return Err(ConfigError::UnsupportedFileType {
                extension: ext,
                supported: SUPPORTED_FILE_TYPES.join(","),
            });
        }
        if !types.contains(&ext) {
            types.push(ext);
        }
    }

    if types.is_empty() {
        return Err(ConfigError::NoFileTypes);
    }
    Ok(types)
}

use thiserror::Error;

/// Failures raised while reconciling or measuring a single image pair.
#[derive(Debug, Error)]
pub enum CompareError {
    #[error("Shape mismatch after padding: {left_width}x{left_height} vs {right_width}x{right_height}")]
    ShapeMismatch {
        left_width: u32,
        left_height: u32,
        right_width: u32,
        right_height: u32,
    },

    #[error("Image {width}x{height} is smaller than the {window}x{window} SSIM window")]
    WindowTooSmall { width: u32, height: u32, window: u32 },

    #[error("Failed to pad image onto {width}x{height} canvas: {source}")]
    Padding {
        width: u32,
        height: u32,
        source: image::ImageError,
    },
}

impl CompareError {
    /// Short, stable name used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            CompareError::ShapeMismatch { .. } => "shape_mismatch",
            CompareError::WindowTooSmall { .. } => "window_too_small",
            CompareError::Padding { .. } => "padding",
        }
    }
}

use image::{DynamicImage, GenericImageView};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Which side of the corpus an entity was discovered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Submission,
    Reference,
}

impl Role {
    /// Prefix applied to entity ids so references never collide with submissions.
    pub fn id_prefix(self) -> &'static str {
        match self {
            Role::Submission => "",
            Role::Reference => "ref_",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Submission => write!(f, "submission"),
            Role::Reference => write!(f, "reference"),
        }
    }
}

/// One extracted raster, shared cheaply between workers.
#[derive(Debug, Clone)]
pub struct Figure {
    pub name: String,
    pub image: Arc<DynamicImage>,
}

impl Figure {
    /// Wrap a decoded image. Grey and high bit-depth images are reduced to 8-bit RGB(A)
    /// so every figure carries 3 or 4 channels.
    pub fn new(name: impl Into<String>, image: DynamicImage) -> Self {
        let image = match image {
            DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_) => image,
            other if other.color().has_alpha() => DynamicImage::ImageRgba8(other.to_rgba8()),
            other => DynamicImage::ImageRgb8(other.to_rgb8()),
        };
        Self {
            name: name.into(),
            image: Arc::new(image),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn channels(&self) -> u8 {
        self.image.color().channel_count()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

/// A submission or reference with its extracted figures.
#[derive(Debug, Clone)]
pub struct Entity {
    pub id: String,
    pub role: Role,
    pub figures: Vec<Figure>,
}

impl Entity {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
            figures: Vec::new(),
        }
    }

    pub fn with_figures(mut self, figures: Vec<Figure>) -> Self {
        self.figures = figures;
        self
    }

    pub fn push(&mut self, figure: Figure) {
        self.figures.push(figure);
    }

    pub fn is_empty(&self) -> bool {
        self.figures.is_empty()
    }

    pub fn len(&self) -> usize {
        self.figures.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, RgbaImage};

    #[test]
    fn test_grey_figure_is_promoted_to_rgb() {
        let grey = GrayImage::from_pixel(12, 12, Luma([90]));
        let figure = Figure::new("grey", DynamicImage::ImageLuma8(grey));

        assert_eq!(figure.channels(), 3);
        assert_eq!(figure.dimensions(), (12, 12));
    }

    #[test]
    fn test_rgba_figure_keeps_alpha() {
        let rgba = RgbaImage::new(20, 15);
        let figure = Figure::new("alpha", DynamicImage::ImageRgba8(rgba));

        assert_eq!(figure.channels(), 4);
        assert_eq!(figure.width(), 20);
        assert_eq!(figure.height(), 15);
    }

    #[test]
    fn test_reference_prefix() {
        assert_eq!(Role::Reference.id_prefix(), "ref_");
        assert_eq!(Role::Submission.id_prefix(), "");
        assert_eq!(Role::Reference.to_string(), "reference");
    }
}

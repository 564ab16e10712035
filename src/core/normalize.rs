use super::error::CompareError;
use image::{DynamicImage, GenericImage, RgbImage};

/// Reconcile two rasters so they can be compared pixel for pixel.
///
/// Alpha is dropped (the colour channels are kept as-is, no compositing) and both images
/// are zero-padded on the bottom and right edges up to the larger height and width of the
/// pair. Nothing is ever cropped.
pub fn normalize(
    left: &DynamicImage,
    right: &DynamicImage,
) -> Result<(RgbImage, RgbImage), CompareError> {
    let left = strip_alpha(left);
    let right = strip_alpha(right);

    let width = left.width().max(right.width());
    let height = left.height().max(right.height());

    let left = pad_to(left, width, height)?;
    let right = pad_to(right, width, height)?;

    if left.dimensions() != right.dimensions() {
        return Err(CompareError::ShapeMismatch {
            left_width: left.width(),
            left_height: left.height(),
            right_width: right.width(),
            right_height: right.height(),
        });
    }

    Ok((left, right))
}

/// Keep the first three channels of every pixel.
fn strip_alpha(image: &DynamicImage) -> RgbImage {
    match image {
        DynamicImage::ImageRgb8(rgb) => rgb.clone(),
        DynamicImage::ImageRgba8(rgba) => {
            let (width, height) = rgba.dimensions();
            let mut rgb = RgbImage::new(width, height);
            for (src, dst) in rgba.pixels().zip(rgb.pixels_mut()) {
                dst.0.copy_from_slice(&src.0[..3]);
            }
            rgb
        }
        other if other.color().has_alpha() => {
            strip_alpha(&DynamicImage::ImageRgba8(other.to_rgba8()))
        }
        other => other.to_rgb8(),
    }
}

fn pad_to(image: RgbImage, width: u32, height: u32) -> Result<RgbImage, CompareError> {
    if image.width() == width && image.height() == height {
        return Ok(image);
    }

    let mut canvas = RgbImage::new(width, height);
    canvas
        .copy_from(&image, 0, 0)
        .map_err(|source| CompareError::Padding {
            width,
            height,
            source,
        })?;
    Ok(canvas)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, Rgba, RgbaImage};

    fn gradient(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 3 % 256) as u8, (y * 5 % 256) as u8, ((x + y) % 256) as u8])
        })
    }

    #[test]
    fn test_equal_shapes_are_unchanged() {
        let a = gradient(32, 24);
        let b = RgbImage::from_pixel(32, 24, Rgb([10, 20, 30]));

        let (na, nb) = normalize(
            &DynamicImage::ImageRgb8(a.clone()),
            &DynamicImage::ImageRgb8(b.clone()),
        )
        .unwrap();

        assert_eq!(na, a);
        assert_eq!(nb, b);
    }

    #[test]
    fn test_padding_never_shrinks() {
        let cases = [((10, 40), (30, 20)), ((50, 50), (11, 90)), ((1, 1), (64, 3))];

        for ((aw, ah), (bw, bh)) in cases {
            let a = DynamicImage::ImageRgb8(gradient(aw, ah));
            let b = DynamicImage::ImageRgb8(gradient(bw, bh));
            let (na, nb) = normalize(&a, &b).unwrap();

            assert!(na.width() >= aw && na.height() >= ah);
            assert!(nb.width() >= bw && nb.height() >= bh);
            assert_eq!(na.dimensions(), (aw.max(bw), ah.max(bh)));
            assert_eq!(na.dimensions(), nb.dimensions());
        }
    }

    #[test]
    fn test_mixed_shapes_and_alpha() {
        // 50 rows x 60 cols x 3 and 55 rows x 58 cols x 4
        let a = RgbImage::from_pixel(60, 50, Rgb([200, 100, 50]));
        let b = RgbaImage::from_pixel(58, 55, Rgba([1, 2, 3, 4]));

        let (na, nb) = normalize(
            &DynamicImage::ImageRgb8(a),
            &DynamicImage::ImageRgba8(b),
        )
        .unwrap();

        assert_eq!(na.dimensions(), (60, 55));
        assert_eq!(nb.dimensions(), (60, 55));

        // Original content survives, alpha is gone
        assert_eq!(na.get_pixel(59, 49), &Rgb([200, 100, 50]));
        assert_eq!(nb.get_pixel(57, 54), &Rgb([1, 2, 3]));

        // Missing rows of the shorter image are zero
        for x in 0..60 {
            for y in 50..55 {
                assert_eq!(na.get_pixel(x, y), &Rgb([0, 0, 0]));
            }
        }
        // Missing columns of the narrower image are zero
        for y in 0..55 {
            for x in 58..60 {
                assert_eq!(nb.get_pixel(x, y), &Rgb([0, 0, 0]));
            }
        }
    }

    #[test]
    fn test_padding_onto_smaller_canvas_fails() {
        let err = pad_to(gradient(20, 20), 10, 30).unwrap_err();

        assert!(matches!(
            err,
            CompareError::Padding { width: 10, height: 30, .. }
        ));
        assert_eq!(err.kind(), "padding");
    }

    #[test]
    fn test_alpha_is_dropped_without_blending() {
        let rgba = RgbaImage::from_pixel(16, 16, Rgba([120, 130, 140, 0]));
        let rgb = DynamicImage::ImageRgb8(RgbImage::new(16, 16));

        let (na, _) = normalize(&DynamicImage::ImageRgba8(rgba), &rgb).unwrap();

        assert!(na.pixels().all(|p| *p == Rgb([120, 130, 140])));
    }
}

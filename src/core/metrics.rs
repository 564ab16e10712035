//! Pixel-wise difference metrics for one normalized image pair.
//!
//! All three metrics work on the 0-255 intensity scale of 8-bit RGB images. SSIM follows the
//! usual Wang et al. formulation with a uniform square window and sample covariance; local
//! statistics come from summed-area tables, which stay exact in `f64` for 8-bit input.

use super::error::CompareError;
use image::RgbImage;
use serde::{Deserialize, Serialize};

/// Side length of the SSIM window.
pub const SSIM_WINDOW: u32 = 11;

const DATA_RANGE: f64 = 255.0;
const K1: f64 = 0.01;
const K2: f64 = 0.03;
const CHANNELS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricTriple {
    pub mse: f64,
    pub ssim: f64,
    /// `f64::INFINITY` for pixel-identical images.
    pub psnr: f64,
}

/// Measure two normalized images of identical shape.
pub fn compare(left: &RgbImage, right: &RgbImage) -> Result<MetricTriple, CompareError> {
    if left.dimensions() != right.dimensions() {
        return Err(CompareError::ShapeMismatch {
            left_width: left.width(),
            left_height: left.height(),
            right_width: right.width(),
            right_height: right.height(),
        });
    }

    let ssim = structural_similarity(left, right)?;
    let mse = mean_squared_error(left, right);
    let psnr = peak_signal_noise_ratio(mse);

    Ok(MetricTriple { mse, ssim, psnr })
}

pub fn mean_squared_error(left: &RgbImage, right: &RgbImage) -> f64 {
    let samples = left.as_raw().len();
    if samples == 0 {
        return 0.0;
    }

    let sum: f64 = left
        .as_raw()
        .iter()
        .zip(right.as_raw())
        .map(|(&a, &b)| {
            let diff = a as f64 - b as f64;
            diff * diff
        })
        .sum();

    sum / samples as f64
}

pub fn peak_signal_noise_ratio(mse: f64) -> f64 {
    if mse == 0.0 {
        return f64::INFINITY;
    }
    10.0 * (DATA_RANGE * DATA_RANGE / mse).log10()
}

/// Mean SSIM over every window position fully inside the image, averaged across channels.
pub fn structural_similarity(left: &RgbImage, right: &RgbImage) -> Result<f64, CompareError> {
    let (width, height) = left.dimensions();
    if width < SSIM_WINDOW || height < SSIM_WINDOW {
        return Err(CompareError::WindowTooSmall {
            width,
            height,
            window: SSIM_WINDOW,
        });
    }

    let total: f64 = (0..CHANNELS)
        .map(|channel| channel_ssim(left, right, channel))
        .sum();

    Ok(total / CHANNELS as f64)
}

fn channel_ssim(left: &RgbImage, right: &RgbImage, channel: usize) -> f64 {
    let width = left.width() as usize;
    let height = left.height() as usize;
    let window = SSIM_WINDOW as usize;

    let a = left.as_raw().as_slice();
    let b = right.as_raw().as_slice();
    let sample =
        |data: &[u8], x: usize, y: usize| data[(y * width + x) * CHANNELS + channel] as f64;

    let sum_a = SummedArea::build(width, height, |x, y| sample(a, x, y));
    let sum_b = SummedArea::build(width, height, |x, y| sample(b, x, y));
    let sum_aa = SummedArea::build(width, height, |x, y| sample(a, x, y).powi(2));
    let sum_bb = SummedArea::build(width, height, |x, y| sample(b, x, y).powi(2));
    let sum_ab = SummedArea::build(width, height, |x, y| sample(a, x, y) * sample(b, x, y));

    let n = (window * window) as f64;
    let cov_norm = n / (n - 1.0);
    let c1 = (K1 * DATA_RANGE).powi(2);
    let c2 = (K2 * DATA_RANGE).powi(2);

    let mut total = 0.0;
    let mut count = 0usize;
    for y in 0..=(height - window) {
        for x in 0..=(width - window) {
            let ux = sum_a.window(x, y, window) / n;
            let uy = sum_b.window(x, y, window) / n;
            let uxx = sum_aa.window(x, y, window) / n;
            let uyy = sum_bb.window(x, y, window) / n;
            let uxy = sum_ab.window(x, y, window) / n;

            let vx = cov_norm * (uxx - ux * ux);
            let vy = cov_norm * (uyy - uy * uy);
            let vxy = cov_norm * (uxy - ux * uy);

            let numerator = (2.0 * ux * uy + c1) * (2.0 * vxy + c2);
            let denominator = (ux * ux + uy * uy + c1) * (vx + vy + c2);
            total += numerator / denominator;
            count += 1;
        }
    }

    total / count as f64
}

/// Summed-area table with a zero guard row and column.
struct SummedArea {
    stride: usize,
    data: Vec<f64>,
}

impl SummedArea {
    fn build(width: usize, height: usize, value: impl Fn(usize, usize) -> f64) -> Self {
        let stride = width + 1;
        let mut data = vec![0.0; stride * (height + 1)];
        for y in 0..height {
            let mut row = 0.0;
            for x in 0..width {
                row += value(x, y);
                data[(y + 1) * stride + x + 1] = data[y * stride + x + 1] + row;
            }
        }
        Self { stride, data }
    }

    /// Sum of the `size`×`size` block whose top-left corner is (x, y).
    fn window(&self, x: usize, y: usize, size: usize) -> f64 {
        let (x1, y1) = (x + size, y + size);
        self.data[y1 * self.stride + x1] - self.data[y * self.stride + x1]
            - self.data[y1 * self.stride + x]
            + self.data[y * self.stride + x]
    }
}

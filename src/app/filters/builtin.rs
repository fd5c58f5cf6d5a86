// SPDX-License-Identifier: MPL-2.0

//! Built-in CPU filters
//!
//! Single-channel results (grayscale, edges, threshold) are expanded back to
//! three identical channels so every filter hands RGB downstream.

use super::Filter;
use crate::backends::camera::types::CameraFrame;
use crate::constants::filter_params;
use image::{DynamicImage, GrayImage, ImageBuffer, Rgb, Rgb32FImage, RgbImage, imageops};

fn expand_gray(gray: GrayImage) -> RgbImage {
    DynamicImage::ImageLuma8(gray).into_rgb8()
}

/// Separable correlation in floating point, rounded back to 8 bits
///
/// Filtering the `u8` buffer directly truncates every pass, which darkens
/// flat areas.
fn smooth(image: &RgbImage, kernel: &[f32]) -> RgbImage {
    let wide: Rgb32FImage = ImageBuffer::from_fn(image.width(), image.height(), |x, y| {
        let px = image.get_pixel(x, y);
        Rgb([px[0] as f32, px[1] as f32, px[2] as f32])
    });
    let blurred = imageproc::filter::separable_filter_equal(&wide, kernel);
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        Rgb(blurred.get_pixel(x, y).0.map(|v| v.round().clamp(0.0, 255.0) as u8))
    })
}

/// Returns frames unchanged
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityFilter;

impl Filter for IdentityFilter {
    fn apply(&self, frame: CameraFrame) -> CameraFrame {
        frame
    }
}

/// BT.601 luminance only
#[derive(Debug, Default, Clone, Copy)]
pub struct GrayscaleFilter;

impl Filter for GrayscaleFilter {
    fn apply(&self, frame: CameraFrame) -> CameraFrame {
        let gray = frame.luma();
        frame.with_image(expand_gray(gray))
    }
}

/// Canny edge map, white edges on black
#[derive(Debug, Clone, Copy)]
pub struct EdgeDetectionFilter {
    pub low: f32,
    pub high: f32,
}

impl Default for EdgeDetectionFilter {
    fn default() -> Self {
        Self {
            low: filter_params::CANNY_LOW,
            high: filter_params::CANNY_HIGH,
        }
    }
}

impl Filter for EdgeDetectionFilter {
    fn apply(&self, frame: CameraFrame) -> CameraFrame {
        let gray = frame.luma();
        let edges = imageproc::edges::canny(&gray, self.low, self.high);
        frame.with_image(expand_gray(edges))
    }
}

/// Bitwise complement of every channel
#[derive(Debug, Default, Clone, Copy)]
pub struct ColorInversionFilter;

impl Filter for ColorInversionFilter {
    fn apply(&self, frame: CameraFrame) -> CameraFrame {
        let CameraFrame {
            mut image,
            captured_at,
        } = frame;
        imageops::invert(&mut image);
        CameraFrame { image, captured_at }
    }
}

/// Black and white by luminance threshold
#[derive(Debug, Clone, Copy)]
pub struct BinarizationFilter {
    /// Luma strictly above this becomes white
    pub threshold: u8,
}

impl Default for BinarizationFilter {
    fn default() -> Self {
        Self {
            threshold: filter_params::BINARY_THRESHOLD,
        }
    }
}

impl Filter for BinarizationFilter {
    fn apply(&self, frame: CameraFrame) -> CameraFrame {
        let mut gray = frame.luma();
        for px in gray.pixels_mut() {
            px[0] = if px[0] > self.threshold { 255 } else { 0 };
        }
        frame.with_image(expand_gray(gray))
    }
}

/// Box blur over a square kernel
#[derive(Debug, Clone, Copy)]
pub struct MeanFilter {
    pub kernel_size: u32,
}

impl Default for MeanFilter {
    fn default() -> Self {
        Self {
            kernel_size: filter_params::KERNEL_SIZE,
        }
    }
}

impl Filter for MeanFilter {
    fn apply(&self, frame: CameraFrame) -> CameraFrame {
        let size = self.kernel_size.max(1) as usize;
        let kernel = vec![1.0f32 / size as f32; size];
        frame.with_image(smooth(&frame.image, &kernel))
    }
}

/// Per-channel median over a square neighbourhood
#[derive(Debug, Clone, Copy)]
pub struct MedianFilter {
    pub kernel_size: u32,
}

impl Default for MedianFilter {
    fn default() -> Self {
        Self {
            kernel_size: filter_params::KERNEL_SIZE,
        }
    }
}

impl Filter for MedianFilter {
    fn apply(&self, frame: CameraFrame) -> CameraFrame {
        let radius = self.kernel_size / 2;
        let filtered = imageproc::filter::median_filter(&frame.image, radius, radius);
        frame.with_image(filtered)
    }
}

/// Normalised 1-D Gaussian kernel of `size` taps
pub fn gaussian_kernel(size: u32, sigma: f32) -> Vec<f32> {
    let size = size.max(1) as i32;
    let center = (size - 1) as f32 / 2.0;
    let weights: Vec<f32> = (0..size)
        .map(|i| {
            let d = i as f32 - center;
            (-(d * d) / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let total: f32 = weights.iter().sum();
    weights.into_iter().map(|w| w / total).collect()
}

/// Gaussian blur with a fixed kernel size
#[derive(Debug, Clone)]
pub struct GaussianBlurFilter {
    kernel: Vec<f32>,
}

impl GaussianBlurFilter {
    pub fn new(kernel_size: u32, sigma: f32) -> Self {
        Self {
            kernel: gaussian_kernel(kernel_size, sigma),
        }
    }
}

impl Default for GaussianBlurFilter {
    fn default() -> Self {
        Self::new(filter_params::KERNEL_SIZE, filter_params::GAUSSIAN_SIGMA)
    }
}

impl Filter for GaussianBlurFilter {
    fn apply(&self, frame: CameraFrame) -> CameraFrame {
        frame.with_image(smooth(&frame.image, &self.kernel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checkerboard() -> CameraFrame {
        CameraFrame::new(RgbImage::from_fn(16, 16, |x, y| {
            if (x / 4 + y / 4) % 2 == 0 {
                Rgb([250, 10, 10])
            } else {
                Rgb([10, 10, 250])
            }
        }))
    }

    #[test]
    fn grayscale_is_achromatic() {
        let out = GrayscaleFilter.apply(checkerboard());
        for px in out.image.pixels() {
            assert!(px[0] == px[1] && px[1] == px[2]);
        }
    }

    #[test]
    fn grayscale_matches_bt601() {
        let out = GrayscaleFilter.apply(CameraFrame::solid(2, 2, [255, 0, 0]));
        assert_eq!(*out.image.get_pixel(1, 1), Rgb([76, 76, 76]));
        let out = GrayscaleFilter.apply(CameraFrame::solid(2, 2, [0, 255, 0]));
        assert_eq!(*out.image.get_pixel(0, 0), Rgb([150, 150, 150]));
    }

    #[test]
    fn inversion_complements_channels() {
        let out = ColorInversionFilter.apply(CameraFrame::solid(3, 3, [0, 100, 255]));
        assert!(out.image.pixels().all(|px| *px == Rgb([255, 155, 0])));
    }

    #[test]
    fn binarization_has_two_levels() {
        let out = BinarizationFilter::default().apply(checkerboard());
        for px in out.image.pixels() {
            assert!(px[0] == 0 || px[0] == 255);
            assert!(px[0] == px[1] && px[1] == px[2]);
        }
        let bright = BinarizationFilter::default().apply(CameraFrame::solid(2, 2, [200, 200, 200]));
        assert_eq!(*bright.image.get_pixel(0, 0), Rgb([255, 255, 255]));
        let edge = BinarizationFilter::default().apply(CameraFrame::solid(2, 2, [128, 128, 128]));
        assert_eq!(*edge.image.get_pixel(0, 0), Rgb([0, 0, 0]));
    }

    #[test]
    fn smoothing_keeps_flat_frames_flat() {
        let flat = CameraFrame::solid(12, 9, [80, 120, 160]);
        for out in [
            MeanFilter::default().apply(flat.clone()),
            MedianFilter::default().apply(flat.clone()),
            GaussianBlurFilter::default().apply(flat.clone()),
        ] {
            for px in out.image.pixels() {
                for (c, expected) in [80i32, 120, 160].iter().enumerate() {
                    assert!((px[c] as i32 - expected).abs() <= 1, "{:?}", px);
                }
            }
        }
    }

    #[test]
    fn blurs_keep_flat_colour_and_white_exact() {
        for color in [[80, 120, 160], [255, 255, 255], [0, 0, 0]] {
            let flat = CameraFrame::solid(15, 11, color);
            let gauss = GaussianBlurFilter::default().apply(flat.clone());
            let mean = MeanFilter::default().apply(flat);
            assert!(gauss.image.pixels().all(|px| px.0 == color), "gaussian {:?}", color);
            assert!(mean.image.pixels().all(|px| px.0 == color), "mean {:?}", color);
        }
    }

    #[test]
    fn gaussian_blur_softens_edges() {
        let out = GaussianBlurFilter::default().apply(checkerboard());
        let px = out.image.get_pixel(4, 4);
        assert!(px[0] > 10 && px[0] < 250, "{:?}", px);
    }

    #[test]
    fn mean_filter_softens_edges() {
        let out = MeanFilter::default().apply(checkerboard());
        let px = out.image.get_pixel(4, 4);
        assert!(px[0] > 10 && px[0] < 250);
    }

    #[test]
    fn edges_of_flat_frame_are_black() {
        let out = EdgeDetectionFilter::default().apply(CameraFrame::solid(20, 20, [90, 90, 90]));
        assert!(out.image.pixels().all(|px| *px == Rgb([0, 0, 0])));
    }

    #[test]
    fn gaussian_kernel_is_normalised_and_symmetric() {
        let k = gaussian_kernel(7, 1.4);
        assert_eq!(k.len(), 7);
        assert!((k.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        assert!((k[0] - k[6]).abs() < 1e-6);
        assert!(k[3] > k[2] && k[2] > k[1]);
    }
}

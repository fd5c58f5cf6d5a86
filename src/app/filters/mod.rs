// SPDX-License-Identifier: GPL-3.0-only

//! Per-frame image filters
//!
//! A [`FilterRegistry`] maps stable names to [`Filter`] implementations in a
//! fixed order. The order matters: the keyboard selects filters by position,
//! with `0` always meaning the identity entry.

mod builtin;
mod face;

pub use builtin::{
    BinarizationFilter, ColorInversionFilter, EdgeDetectionFilter, GaussianBlurFilter,
    GrayscaleFilter, IdentityFilter, MeanFilter, MedianFilter, gaussian_kernel,
};
pub use face::FaceDetectionFilter;

use crate::app::frame_processor::FaceDetector;
use crate::backends::camera::types::CameraFrame;
use std::sync::Arc;
use tracing::trace;

/// Name of the entry that leaves frames untouched
pub const IDENTITY: &str = "None";

/// Built-in filter names in selection order
pub const BUILTIN_NAMES: [&str; 9] = [
    IDENTITY,
    "Grayscale",
    "Edge Detection",
    "Color Inversion",
    "Binarization",
    "Mean Filter",
    "Median Filter",
    "Gaussian Blur",
    "Face Detection",
];

/// A transform from one frame to another of the same size
///
/// Implementations must not keep per-call state, so the same filter can be
/// applied to many frames from any thread.
pub trait Filter: Send + Sync {
    fn apply(&self, frame: CameraFrame) -> CameraFrame;
}

struct FilterEntry {
    name: String,
    filter: Box<dyn Filter>,
}

/// Ordered name to filter table
pub struct FilterRegistry {
    entries: Vec<FilterEntry>,
}

impl FilterRegistry {
    /// Registry holding only the identity entry
    pub fn new() -> Self {
        let mut registry = Self {
            entries: Vec::new(),
        };
        registry.register(IDENTITY, IdentityFilter);
        registry
    }

    /// The standard filter set, with face detection backed by `detector`
    pub fn with_builtin(detector: Arc<FaceDetector>) -> Self {
        let mut registry = Self::new();
        registry.register("Grayscale", GrayscaleFilter);
        registry.register("Edge Detection", EdgeDetectionFilter::default());
        registry.register("Color Inversion", ColorInversionFilter);
        registry.register("Binarization", BinarizationFilter::default());
        registry.register("Mean Filter", MeanFilter::default());
        registry.register("Median Filter", MedianFilter::default());
        registry.register("Gaussian Blur", GaussianBlurFilter::default());
        registry.register("Face Detection", FaceDetectionFilter::new(detector));
        registry
    }

    /// Add a filter at the end, or replace the one already using `name`
    pub fn register(&mut self, name: impl Into<String>, filter: impl Filter + 'static) {
        let name = name.into();
        let filter: Box<dyn Filter> = Box::new(filter);
        match self.entries.iter_mut().find(|e| e.name == name) {
            Some(entry) => entry.filter = filter,
            None => self.entries.push(FilterEntry { name, filter }),
        }
    }

    /// Run the filter called `name`
    ///
    /// Unknown names return the frame unchanged.
    pub fn apply(&self, frame: CameraFrame, name: &str) -> CameraFrame {
        match self.entries.iter().find(|e| e.name == name) {
            Some(entry) => entry.filter.apply(frame),
            None => {
                trace!(name, "Unknown filter, passing frame through");
                frame
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    /// Name at position `index`
    pub fn name_at(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(|e| e.name.as_str())
    }

    /// Position of `name`
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name == name)
    }

    /// Names in selection order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for FilterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> FilterRegistry {
        FilterRegistry::with_builtin(Arc::new(FaceDetector::new("/nonexistent/model.xml")))
    }

    fn busy_frame() -> CameraFrame {
        CameraFrame::new(image::RgbImage::from_fn(40, 30, |x, y| {
            image::Rgb([(x * 6) as u8, (y * 8) as u8, ((x * y) % 256) as u8])
        }))
    }

    #[test]
    fn builtin_order() {
        let registry = registry();
        assert_eq!(registry.names().collect::<Vec<_>>(), BUILTIN_NAMES);
        assert_eq!(registry.name_at(0), Some(IDENTITY));
        assert_eq!(registry.name_at(3), Some("Color Inversion"));
        assert_eq!(registry.index_of("Face Detection"), Some(8));
        assert_eq!(registry.name_at(9), None);
    }

    #[test]
    fn register_replaces_existing_name() {
        let mut registry = FilterRegistry::new();
        registry.register("Invert", ColorInversionFilter);
        registry.register("Invert", GrayscaleFilter);
        assert_eq!(registry.len(), 2);

        let out = registry.apply(CameraFrame::solid(2, 2, [10, 200, 30]), "Invert");
        let px = out.image.get_pixel(0, 0);
        assert_eq!(px[0], px[1]);
    }

    #[test]
    fn unknown_and_identity_are_pass_through() {
        let registry = registry();
        let frame = busy_frame();
        for name in [IDENTITY, "Sepia", "", "grayscale"] {
            let out = registry.apply(frame.clone(), name);
            assert_eq!(out.as_raw(), frame.as_raw(), "{:?} changed the frame", name);
        }
    }

    #[test]
    fn every_filter_keeps_shape() {
        let registry = registry();
        for name in BUILTIN_NAMES {
            let out = registry.apply(busy_frame(), name);
            assert_eq!(out.dimensions(), (40, 30), "{}", name);
            assert_eq!(out.as_raw().len(), 40 * 30 * 3, "{}", name);
        }
    }
}

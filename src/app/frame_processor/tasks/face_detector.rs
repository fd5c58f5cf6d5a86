// SPDX-License-Identifier: GPL-3.0-only

//! Face detection task
//!
//! Runs a Haar cascade over a grayscale copy of the frame at several scales
//! and merges overlapping hits. The cascade is loaded on first use and kept
//! until [`FaceDetector::reset`].

use crate::app::frame_processor::cascade::{HaarCascade, WeakClassifier};
use crate::app::frame_processor::types::BoundingBox;
use crate::backends::camera::types::CameraFrame;
use crate::constants::detection;
use crate::errors::DetectorError;
use image::{GrayImage, Rgb, RgbImage, imageops};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, trace, warn};

/// Tunables for the multi-scale search and grouping
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionParams {
    pub scale_factor: f64,
    pub min_neighbors: usize,
    pub min_size: (u32, u32),
    pub group_eps: f64,
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            scale_factor: detection::SCALE_FACTOR,
            min_neighbors: detection::MIN_NEIGHBORS,
            min_size: detection::MIN_SIZE,
            group_eps: detection::GROUP_EPS,
        }
    }
}

/// Face detector backed by a lazily loaded cascade
pub struct FaceDetector {
    model_path: PathBuf,
    params: DetectionParams,
    cascade: Mutex<Option<Arc<HaarCascade>>>,
    load_failures: AtomicU64,
}

impl FaceDetector {
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        Self::with_params(model_path, DetectionParams::default())
    }

    pub fn with_params(model_path: impl Into<PathBuf>, params: DetectionParams) -> Self {
        Self {
            model_path: model_path.into(),
            params,
            cascade: Mutex::new(None),
            load_failures: AtomicU64::new(0),
        }
    }

    /// Default model location: next to the executable, else the working
    /// directory
    pub fn default_model_path() -> PathBuf {
        let relative = Path::new(detection::MODEL_RELATIVE_PATH);
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join(relative)))
            .filter(|candidate| candidate.is_file())
            .unwrap_or_else(|| relative.to_path_buf())
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    /// Whether a cascade is currently cached
    pub fn is_loaded(&self) -> bool {
        self.cascade.lock().map(|c| c.is_some()).unwrap_or(false)
    }

    /// Drop the cached cascade; the next detection reloads it from disk
    pub fn reset(&self) {
        if let Ok(mut guard) = self.cascade.lock() {
            *guard = None;
        }
        debug!(path = %self.model_path.display(), "Face cascade cache cleared");
    }

    fn cascade(&self) -> Result<Arc<HaarCascade>, DetectorError> {
        if let Ok(guard) = self.cascade.lock()
            && let Some(cascade) = guard.as_ref()
        {
            return Ok(Arc::clone(cascade));
        }

        // Failures are not cached so a model dropped in later is picked up
        let cascade = Arc::new(HaarCascade::load(&self.model_path)?);
        if let Ok(mut guard) = self.cascade.lock() {
            *guard = Some(Arc::clone(&cascade));
        }
        Ok(cascade)
    }

    /// Find faces in `frame`
    pub fn detect(&self, frame: &CameraFrame) -> Result<Vec<BoundingBox>, DetectorError> {
        let cascade = self.cascade()?;
        let start = std::time::Instant::now();

        let gray = frame.luma();
        let faces = detect_multi_scale(&cascade, &gray, &self.params);

        trace!(
            faces = faces.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Face detection finished"
        );
        Ok(faces)
    }

    /// Copy of `frame` with every detected face outlined
    ///
    /// When the model cannot be loaded the frame comes back untouched and the
    /// failure is logged.
    pub fn annotate(&self, frame: CameraFrame) -> CameraFrame {
        match self.detect(&frame) {
            Ok(faces) => {
                if faces.is_empty() {
                    return frame;
                }
                let mut image = frame.image.clone();
                draw_boxes(&mut image, &faces);
                frame.with_image(image)
            }
            Err(e) => {
                let failures = self.load_failures.fetch_add(1, Ordering::Relaxed);
                if failures == 0 {
                    warn!(error = %e, "Face detection disabled until the model loads");
                } else if failures % 300 == 0 {
                    debug!(error = %e, failures, "Face model still unavailable");
                }
                frame
            }
        }
    }
}

/// Outline each box in the detection color
pub fn draw_boxes(image: &mut RgbImage, boxes: &[BoundingBox]) {
    let color = Rgb(detection::BOX_COLOR);
    for bbox in boxes {
        for ring in 0..detection::BOX_THICKNESS {
            if let Some(inner) = bbox.inset(ring) {
                imageproc::drawing::draw_hollow_rect_mut(image, inner.to_rect(), color);
            }
        }
    }
}

/// Summed-area tables of a grayscale image, one row and column larger
struct IntegralImages {
    stride: usize,
    sum: Vec<i64>,
    sq_sum: Vec<i64>,
}

impl IntegralImages {
    fn new(image: &GrayImage) -> Self {
        let (w, h) = (image.width() as usize, image.height() as usize);
        let stride = w + 1;
        let mut sum = vec![0i64; stride * (h + 1)];
        let mut sq_sum = vec![0i64; stride * (h + 1)];

        for y in 0..h {
            let mut row = 0i64;
            let mut row_sq = 0i64;
            for x in 0..w {
                let v = image.as_raw()[y * w + x] as i64;
                row += v;
                row_sq += v * v;
                sum[(y + 1) * stride + x + 1] = sum[y * stride + x + 1] + row;
                sq_sum[(y + 1) * stride + x + 1] = sq_sum[y * stride + x + 1] + row_sq;
            }
        }

        Self {
            stride,
            sum,
            sq_sum,
        }
    }

    fn rect(table: &[i64], stride: usize, x: usize, y: usize, w: usize, h: usize) -> i64 {
        let top = y * stride;
        let bottom = (y + h) * stride;
        table[bottom + x + w] - table[bottom + x] - table[top + x + w] + table[top + x]
    }

    fn sum(&self, x: usize, y: usize, w: usize, h: usize) -> i64 {
        Self::rect(&self.sum, self.stride, x, y, w, h)
    }

    fn sq_sum(&self, x: usize, y: usize, w: usize, h: usize) -> i64 {
        Self::rect(&self.sq_sum, self.stride, x, y, w, h)
    }
}

impl HaarCascade {
    /// Whether the window with top-left corner (x, y) passes every stage
    fn accepts(&self, ii: &IntegralImages, x: usize, y: usize) -> bool {
        let (ww, wh) = (self.window.0 as usize, self.window.1 as usize);

        // Variance normalisation over the window minus a one pixel border
        let area = ((ww - 2) * (wh - 2)) as f64;
        let sum = ii.sum(x + 1, y + 1, ww - 2, wh - 2) as f64;
        let sq_sum = ii.sq_sum(x + 1, y + 1, ww - 2, wh - 2) as f64;
        let nf = area * sq_sum - sum * sum;
        let nf = if nf > 0.0 { nf.sqrt() } else { 1.0 };

        self.stages.iter().all(|stage| {
            let total: f64 = stage
                .classifiers
                .iter()
                .map(|weak| self.evaluate_tree(weak, ii, x, y, nf))
                .sum();
            total >= stage.threshold
        })
    }

    fn evaluate_tree(
        &self,
        weak: &WeakClassifier,
        ii: &IntegralImages,
        x: usize,
        y: usize,
        nf: f64,
    ) -> f64 {
        let mut idx: i32 = 0;
        loop {
            let node = &weak.nodes[idx as usize];
            let value: f64 = self.features[node.feature]
                .rects
                .iter()
                .map(|r| {
                    r.weight
                        * ii.sum(
                            x + r.x as usize,
                            y + r.y as usize,
                            r.width as usize,
                            r.height as usize,
                        ) as f64
                })
                .sum();
            idx = if value < node.threshold * nf {
                node.left
            } else {
                node.right
            };
            if idx <= 0 {
                return weak.leaves[(-idx) as usize];
            }
        }
    }
}

/// Slide the cascade window over an image pyramid and group the hits
pub fn detect_multi_scale(
    cascade: &HaarCascade,
    gray: &GrayImage,
    params: &DetectionParams,
) -> Vec<BoundingBox> {
    let (img_w, img_h) = gray.dimensions();
    let (win_w, win_h) = cascade.window;
    let mut candidates = Vec::new();
    let mut factor = 1.0f64;

    loop {
        let window = (
            (win_w as f64 * factor).round() as u32,
            (win_h as f64 * factor).round() as u32,
        );
        let scaled = (
            (img_w as f64 / factor).round() as u32,
            (img_h as f64 / factor).round() as u32,
        );
        if window.0 > img_w || window.1 > img_h || scaled.0 < win_w || scaled.1 < win_h {
            break;
        }

        if window.0 >= params.min_size.0 && window.1 >= params.min_size.1 {
            let resized = if scaled == (img_w, img_h) {
                gray.clone()
            } else {
                imageops::resize(gray, scaled.0, scaled.1, imageops::FilterType::Triangle)
            };
            let ii = IntegralImages::new(&resized);
            let step = if factor > 2.0 { 1 } else { 2 };

            for y in (0..=(scaled.1 - win_h) as usize).step_by(step) {
                for x in (0..=(scaled.0 - win_w) as usize).step_by(step) {
                    if cascade.accepts(&ii, x, y) {
                        candidates.push(BoundingBox::new(
                            (x as f64 * factor).round() as i32,
                            (y as f64 * factor).round() as i32,
                            window.0,
                            window.1,
                        ));
                    }
                }
            }
        }

        factor *= params.scale_factor;
        if params.scale_factor <= 1.0 {
            break;
        }
    }

    trace!(candidates = candidates.len(), "Cascade candidates");
    group_rectangles(&candidates, params.min_neighbors, params.group_eps)
        .into_iter()
        .filter_map(|b| b.clamp_to(img_w, img_h))
        .collect()
}

fn similar(a: &BoundingBox, b: &BoundingBox, eps: f64) -> bool {
    let delta = eps * (a.width.min(b.width) + a.height.min(b.height)) as f64 * 0.5;
    (a.x - b.x).abs() as f64 <= delta
        && (a.y - b.y).abs() as f64 <= delta
        && (a.right() - b.right()).abs() as f64 <= delta
        && (a.bottom() - b.bottom()).abs() as f64 <= delta
}

fn find(parent: &mut [usize], mut i: usize) -> usize {
    while parent[i] != i {
        parent[i] = parent[parent[i]];
        i = parent[i];
    }
    i
}

/// Merge overlapping hits into averaged boxes
///
/// Hits are clustered by similarity; clusters with `min_neighbors` or fewer
/// members are dropped, as is any cluster lying inside a stronger one.
pub fn group_rectangles(
    rects: &[BoundingBox],
    min_neighbors: usize,
    eps: f64,
) -> Vec<BoundingBox> {
    if rects.is_empty() {
        return Vec::new();
    }
    if min_neighbors == 0 {
        return rects.to_vec();
    }

    let mut parent: Vec<usize> = (0..rects.len()).collect();
    for i in 0..rects.len() {
        for j in (i + 1)..rects.len() {
            if similar(&rects[i], &rects[j], eps) {
                let (ri, rj) = (find(&mut parent, i), find(&mut parent, j));
                if ri != rj {
                    parent[rj] = ri;
                }
            }
        }
    }

    // root -> (sum x, sum y, sum w, sum h, count), in first-seen order
    let mut clusters: Vec<(usize, [i64; 4], usize)> = Vec::new();
    for (i, r) in rects.iter().enumerate() {
        let root = find(&mut parent, i);
        let slot = match clusters.iter().position(|(c, _, _)| *c == root) {
            Some(pos) => pos,
            None => {
                clusters.push((root, [0; 4], 0));
                clusters.len() - 1
            }
        };
        let (_, sums, count) = &mut clusters[slot];
        sums[0] += r.x as i64;
        sums[1] += r.y as i64;
        sums[2] += r.width as i64;
        sums[3] += r.height as i64;
        *count += 1;
    }

    let averaged: Vec<(BoundingBox, usize)> = clusters
        .iter()
        .map(|(_, sums, count)| {
            let n = *count as f64;
            let avg = |v: i64| (v as f64 / n).round();
            (
                BoundingBox::new(
                    avg(sums[0]) as i32,
                    avg(sums[1]) as i32,
                    avg(sums[2]) as u32,
                    avg(sums[3]) as u32,
                ),
                *count,
            )
        })
        .collect();

    let mut result = Vec::new();
    for (i, (r1, n1)) in averaged.iter().enumerate() {
        if *n1 <= min_neighbors {
            continue;
        }
        let swallowed = averaged.iter().enumerate().any(|(j, (r2, n2))| {
            if i == j || *n2 <= min_neighbors {
                return false;
            }
            let dx = (r2.width as f64 * eps).round() as i32;
            let dy = (r2.height as f64 * eps).round() as i32;
            r1.x >= r2.x - dx
                && r1.y >= r2.y - dy
                && r1.right() <= r2.right() + dx
                && r1.bottom() <= r2.bottom() + dy
                && (*n2 > (*n1).max(3) || *n1 < 3)
        });
        if !swallowed {
            result.push(*r1);
        }
    }

    debug!(
        hits = rects.len(),
        clusters = averaged.len(),
        faces = result.len(),
        "Grouped detections"
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::frame_processor::cascade::tests::LEFT_BRIGHT_CASCADE;

    fn cascade() -> HaarCascade {
        HaarCascade::from_xml_str(LEFT_BRIGHT_CASCADE).unwrap()
    }

    /// `bright` left of `edge_x`, `dark` from there on
    fn two_level_image(width: u32, height: u32, edge_x: u32, bright: u8, dark: u8) -> GrayImage {
        GrayImage::from_fn(width, height, |x, _| {
            image::Luma([if x < edge_x { bright } else { dark }])
        })
    }

    /// White left part, black right part
    fn edge_image(width: u32, height: u32, edge_x: u32) -> GrayImage {
        two_level_image(width, height, edge_x, 255, 0)
    }

    #[test]
    fn finds_boxes_on_vertical_edge() {
        let gray = edge_image(120, 80, 60);
        let faces = detect_multi_scale(&cascade(), &gray, &DetectionParams::default());

        assert!(!faces.is_empty());
        for face in &faces {
            assert!(face.width >= 30 && face.height >= 30);
            assert!(face.x < 60 && face.right() > 60, "box {:?} misses the edge", face);
            assert!(face.right() <= 120 && face.bottom() <= 80);
        }
    }

    #[test]
    fn low_contrast_edge_is_still_found() {
        for (bright, dark) in [(140, 60), (108, 92)] {
            let gray = two_level_image(120, 80, 60, bright, dark);
            let faces = detect_multi_scale(&cascade(), &gray, &DetectionParams::default());
            assert!(!faces.is_empty(), "no match at {}/{}", bright, dark);
            for face in &faces {
                assert!(face.x < 60 && face.right() > 60, "box {:?} misses the edge", face);
            }
        }
    }

    #[test]
    fn flat_image_has_no_faces() {
        let gray = GrayImage::from_pixel(120, 80, image::Luma([128]));
        assert!(detect_multi_scale(&cascade(), &gray, &DetectionParams::default()).is_empty());
    }

    #[test]
    fn image_smaller_than_window_has_no_faces() {
        let gray = edge_image(20, 20, 10);
        assert!(detect_multi_scale(&cascade(), &gray, &DetectionParams::default()).is_empty());
    }

    #[test]
    fn grouping_needs_more_than_min_neighbors() {
        let hits: Vec<BoundingBox> = (0..5).map(|i| BoundingBox::new(100 + i, 50, 40, 40)).collect();
        assert!(group_rectangles(&hits, 5, 0.2).is_empty());

        let hits: Vec<BoundingBox> = (0..6).map(|i| BoundingBox::new(100 + i, 50, 40, 40)).collect();
        let grouped = group_rectangles(&hits, 5, 0.2);
        // x values 100..=105 average to 102.5, rounded away from zero
        assert_eq!(grouped, vec![BoundingBox::new(103, 50, 40, 40)]);
    }

    #[test]
    fn grouping_keeps_separate_faces_apart() {
        let mut hits = Vec::new();
        for i in 0..6 {
            hits.push(BoundingBox::new(10 + i, 10, 40, 40));
            hits.push(BoundingBox::new(200 + i, 120, 50, 50));
        }
        let grouped = group_rectangles(&hits, 5, 0.2);
        assert_eq!(grouped.len(), 2);
    }

    #[test]
    fn small_cluster_inside_stronger_one_is_dropped() {
        let mut hits = Vec::new();
        for _ in 0..12 {
            hits.push(BoundingBox::new(0, 0, 100, 100));
        }
        for _ in 0..6 {
            hits.push(BoundingBox::new(30, 30, 30, 30));
        }
        assert_eq!(
            group_rectangles(&hits, 5, 0.2),
            vec![BoundingBox::new(0, 0, 100, 100)]
        );
    }

    #[test]
    fn boxes_are_drawn_two_pixels_wide() {
        let mut image = RgbImage::from_pixel(50, 50, Rgb([0, 0, 0]));
        draw_boxes(&mut image, &[BoundingBox::new(10, 10, 20, 20)]);

        let green = Rgb(detection::BOX_COLOR);
        assert_eq!(*image.get_pixel(10, 10), green);
        assert_eq!(*image.get_pixel(11, 11), green);
        assert_eq!(*image.get_pixel(29, 15), green);
        assert_eq!(*image.get_pixel(12, 12), Rgb([0, 0, 0]));
        assert_eq!(*image.get_pixel(20, 20), Rgb([0, 0, 0]));
    }

    #[test]
    fn missing_model_passes_frame_through() {
        let detector = FaceDetector::new("/nonexistent/model.xml");
        let frame = CameraFrame::solid(64, 48, [10, 20, 30]);
        let out = detector.annotate(frame.clone());
        assert_eq!(out.as_raw(), frame.as_raw());
        assert!(!detector.is_loaded());
        assert!(matches!(
            detector.detect(&frame),
            Err(DetectorError::ModelLoadFailure { .. })
        ));
    }

    #[test]
    fn model_is_cached_until_reset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cascade.xml");
        std::fs::write(&path, LEFT_BRIGHT_CASCADE).unwrap();

        let detector = FaceDetector::new(&path);
        let frame = CameraFrame::solid(64, 48, [0, 0, 0]);
        detector.detect(&frame).unwrap();
        assert!(detector.is_loaded());

        // Cached copy keeps working after the file is gone
        std::fs::remove_file(&path).unwrap();
        assert!(detector.detect(&frame).is_ok());

        detector.reset();
        assert!(!detector.is_loaded());
        assert!(detector.detect(&frame).is_err());
    }
}

// SPDX-License-Identifier: MPL-2.0

//! Integration tests for the built-in filter set

use image::Rgb;
use std::sync::Arc;
use webcam_filters::app::filters::{BUILTIN_NAMES, IDENTITY};
use webcam_filters::app::{FaceDetector, FilterRegistry};
use webcam_filters::backends::camera::test_pattern::pattern_frame;
use webcam_filters::backends::camera::types::CameraFrame;
use webcam_filters::constants::detection::BOX_COLOR;

/// One stump firing where the left half of the window is brighter than the right
const EDGE_CASCADE: &str = r#"<?xml version="1.0"?>
<opencv_storage>
<cascade type_id="opencv-cascade-classifier">
  <stageType>BOOST</stageType>
  <featureType>HAAR</featureType>
  <height>24</height>
  <width>24</width>
  <stageNum>1</stageNum>
  <stages>
    <_>
      <maxWeakCount>1</maxWeakCount>
      <stageThreshold>0.</stageThreshold>
      <weakClassifiers>
        <_>
          <internalNodes>
            0 -1 0 1.0000000000000000e-01</internalNodes>
          <leafValues>
            -1. 1.</leafValues></_></weakClassifiers></_>
  </stages>
  <features>
    <_>
      <rects>
        <_>
          0 0 24 24 -1.</_>
        <_>
          0 0 12 24 2.</_></rects></_>
  </features>
</cascade>
</opencv_storage>
"#;

fn registry_without_model() -> FilterRegistry {
    FilterRegistry::with_builtin(Arc::new(FaceDetector::new("/nonexistent/model.xml")))
}

#[test]
fn registry_lists_builtins_in_order() {
    let registry = registry_without_model();
    let names: Vec<&str> = registry.names().collect();
    assert_eq!(names, BUILTIN_NAMES.to_vec());
    assert_eq!(registry.name_at(0), Some(IDENTITY));
}

#[test]
fn every_filter_preserves_shape() {
    let registry = registry_without_model();
    for (w, h) in [(64, 48), (33, 17)] {
        let frame = pattern_frame(w, h, 3);
        for name in registry.names() {
            let out = registry.apply(frame.clone(), name);
            assert_eq!(out.dimensions(), (w, h), "{} changed the frame size", name);
            assert_eq!(out.channels(), 3, "{} changed the channel count", name);
        }
    }
}

#[test]
fn identity_and_unknown_names_pass_through() {
    let registry = registry_without_model();
    let frame = pattern_frame(20, 12, 7);
    for name in [IDENTITY, "Sepia", ""] {
        let out = registry.apply(frame.clone(), name);
        assert_eq!(out.image, frame.image, "{:?} modified the frame", name);
    }
}

#[test]
fn inversion_of_black_is_white() {
    let registry = registry_without_model();
    let out = registry.apply(CameraFrame::solid(16, 9, [0, 0, 0]), "Color Inversion");
    assert!(out.image.pixels().all(|px| *px == Rgb([255, 255, 255])));
}

#[test]
fn grayscale_is_achromatic() {
    let registry = registry_without_model();
    let out = registry.apply(pattern_frame(30, 20, 1), "Grayscale");
    assert!(out.image.pixels().all(|px| px[0] == px[1] && px[1] == px[2]));
}

#[test]
fn face_detection_without_model_passes_through() {
    let detector = Arc::new(FaceDetector::new("/nonexistent/model.xml"));
    let registry = FilterRegistry::with_builtin(detector.clone());
    let frame = pattern_frame(40, 40, 0);

    let out = registry.apply(frame.clone(), "Face Detection");
    assert_eq!(out.image, frame.image);
    assert!(!detector.is_loaded());
}

#[test]
fn face_detection_outlines_matches() {
    let dir = tempfile::tempdir().unwrap();
    let model = dir.path().join("cascade.xml");
    std::fs::write(&model, EDGE_CASCADE).unwrap();

    let registry = FilterRegistry::with_builtin(Arc::new(FaceDetector::new(&model)));
    let frame = CameraFrame::new(image::RgbImage::from_fn(120, 80, |x, _| {
        if x < 60 { Rgb([255, 255, 255]) } else { Rgb([0, 0, 0]) }
    }));

    let out = registry.apply(frame, "Face Detection");
    assert_eq!(out.dimensions(), (120, 80));
    assert!(out.image.pixels().any(|px| *px == Rgb(BOX_COLOR)));
}

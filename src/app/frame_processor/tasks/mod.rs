// SPDX-License-Identifier: GPL-3.0-only

//! Frame processing tasks

pub mod face_detector;

pub use face_detector::{DetectionParams, FaceDetector};

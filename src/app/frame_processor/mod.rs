// SPDX-License-Identifier: MPL-2.0

//! Frame analysis
//!
//! Detection tasks that inspect a frame and report regions of interest.
//! Currently implements Haar cascade face detection.

pub mod cascade;
pub mod tasks;
pub mod types;

pub use cascade::HaarCascade;
pub use tasks::face_detector;
pub use tasks::{DetectionParams, FaceDetector};
pub use types::BoundingBox;

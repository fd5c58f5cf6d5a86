// SPDX-License-Identifier: MPL-2.0

//! Output pipelines for photos and recordings
//!
//! ```text
//! ┌──────────────┐     ┌───────────────────┐     ┌──────────────┐
//! │ Filtered     │ ──▶ │  Photo Pipeline   │ ──▶ │ JPEG/PNG     │
//! │ frame (RGB)  │     │  - Encoding       │     │ File         │
//! └──────────────┘     └───────────────────┘     └──────────────┘
//!
//! ┌──────────────┐     ┌───────────────────┐     ┌──────────────┐
//! │ Filtered     │ ──▶ │  Video Pipeline   │ ──▶ │ MP4 / Y4M    │
//! │ frames (RGB) │     │  - GStreamer      │     │ File         │
//! │              │     │  - SW Encoding    │     │              │
//! └──────────────┘     └───────────────────┘     └──────────────┘
//! ```
//!
//! - [`photo`]: single frame to an image file
//! - [`video`]: recording sessions

pub mod photo;
pub mod video;

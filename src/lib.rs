// SPDX-FileCopyrightText: Copyright 2025 Au-Zone Technologies
// SPDX-License-Identifier: Apache-2.0

//! SSD detection post-processing.
//!
//! Re-exports the decoder crate, which holds the anchor generator, box
//! decoder, score selection, NMS and top-K stages and the [`Detector`] that
//! runs them over one inference result.
//!
//! ```rust
//! use std::sync::Arc;
//! use ssdpost::{
//!     DetectorBuilder, DetectorConfig,
//!     anchors::{AnchorBox, AnchorSet, DEFAULT_VARIANCES},
//!     bbox::CodeType,
//! };
//!
//! let anchors: AnchorSet = [[0.1, 0.1, 0.4, 0.4], [0.5, 0.5, 0.9, 0.9]]
//!     .into_iter()
//!     .map(|c| AnchorBox::from_corners(c, DEFAULT_VARIANCES))
//!     .collect();
//! let detector = DetectorBuilder::new()
//!     .with_config(DetectorConfig {
//!         num_classes: 2,
//!         code_type: CodeType::CenterSize,
//!         variance_encoded_in_target: false,
//!         keep_top_k: 10,
//!         confidence_threshold: vec![0.0, 0.5],
//!         nms_top_k: 100,
//!         nms_threshold: 0.45,
//!         eta: 1.0,
//!         location_scale: 0.05,
//!         clip: true,
//!         workers: 2,
//!         anchors: None,
//!     })
//!     .with_anchors(Arc::new(anchors))
//!     .build()?;
//!
//! let locations = [0i8; 8];
//! let confidences = [0.2, 0.8, 0.9, 0.1];
//! let detections = detector.detect(&locations, &confidences)?;
//! assert_eq!(detections.len(), 1);
//! assert_eq!(detections[0].label, 1);
//! # Ok::<(), ssdpost::Error>(())
//! ```

pub use ssdpost_decoder::*;

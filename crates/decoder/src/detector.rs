// SPDX-FileCopyrightText: Copyright 2025 Au-Zone Technologies
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use log::{debug, trace};
use ndarray::ArrayView2;
use num_traits::{AsPrimitive, PrimInt, Signed};
use serde::{Deserialize, Serialize};

use crate::{
    BoundingBox, Detection,
    anchors::{AnchorConfig, AnchorSet},
    bbox::{BoxDecoder, CodeType, DecodeCache},
    error::{Error, Result},
    nms::NonMaxSuppression,
    select::ScoreSelector,
    topk::keep_top_k,
};

fn default_eta() -> f32 {
    1.0
}

fn default_location_scale() -> f32 {
    1.0
}

fn default_clip() -> bool {
    true
}

fn default_workers() -> usize {
    2
}

/// Detection output parameters of an SSD model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// number of classes, background included
    pub num_classes: usize,
    #[serde(default)]
    pub code_type: CodeType,
    #[serde(default)]
    pub variance_encoded_in_target: bool,
    /// Maximum number of detections over all classes. Zero disables the cap.
    pub keep_top_k: usize,
    /// Minimum score of a detection, one entry per class. The background
    /// entry is ignored.
    pub confidence_threshold: Vec<f32>,
    /// Maximum number of candidates per class entering NMS.
    pub nms_top_k: usize,
    pub nms_threshold: f32,
    #[serde(default = "default_eta")]
    pub eta: f32,
    /// Dequantization scale of the location tensor.
    #[serde(default = "default_location_scale")]
    pub location_scale: f32,
    /// Clamp output boxes into the unit square. When disabled, decoded
    /// coordinates are returned as is and may fall outside `[0, 1]`.
    #[serde(default = "default_clip")]
    pub clip: bool,
    /// Score selection threads.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Used to generate the anchors when none are given to the builder.
    #[serde(default)]
    pub anchors: Option<AnchorConfig>,
}

impl DetectorConfig {
    /// Parameters of the 480x360 SSD vehicle detection network, which detects
    /// three classes on top of the background.
    pub fn ssd_480x360() -> Self {
        Self {
            num_classes: 4,
            code_type: CodeType::CenterSize,
            variance_encoded_in_target: false,
            keep_top_k: 200,
            confidence_threshold: vec![0.5; 4],
            nms_top_k: 400,
            nms_threshold: 0.45,
            eta: 1.0,
            location_scale: 1.0,
            clip: true,
            workers: default_workers(),
            anchors: Some(AnchorConfig::ssd_480x360()),
        }
    }

    /// The threshold used to pick candidates before NMS, the lowest of the
    /// per-class thresholds.
    pub fn candidate_threshold(&self) -> f32 {
        self.confidence_threshold
            .iter()
            .skip(1)
            .copied()
            .fold(f32::INFINITY, f32::min)
    }

    fn validate(&self) -> Result<()> {
        if self.num_classes < 2 {
            return Err(Error::InvalidConfig(format!(
                "num_classes must include background and at least one class, got {}",
                self.num_classes
            )));
        }
        if self.confidence_threshold.len() != self.num_classes {
            return Err(Error::InvalidConfig(format!(
                "expected {} confidence thresholds, got {}",
                self.num_classes,
                self.confidence_threshold.len()
            )));
        }
        if !(0.0..=1.0).contains(&self.nms_threshold) {
            return Err(Error::InvalidConfig(format!(
                "nms_threshold must be within [0, 1], got {}",
                self.nms_threshold
            )));
        }
        if !(self.eta > 0.0 && self.eta <= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "eta must be within (0, 1], got {}",
                self.eta
            )));
        }
        if self.nms_top_k == 0 {
            return Err(Error::InvalidConfig("nms_top_k must be positive".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
enum ConfigSource {
    Yaml(String),
    Json(String),
    Config(DetectorConfig),
}

#[derive(Debug, Clone, Default)]
pub struct DetectorBuilder {
    config_src: Option<ConfigSource>,
    anchors: Option<Arc<AnchorSet>>,
    workers: Option<usize>,
}

impl DetectorBuilder {
    /// Creates a builder with no configuration. A configuration must be
    /// provided before building the Detector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a detector configuration in YAML format. The string is only
    /// parsed by `DetectorBuilder::build()`.
    ///
    /// # Examples
    /// ```rust
    /// # use ssdpost_decoder::{DetectorBuilder, Result};
    /// # fn main() -> Result<()> {
    /// let config_yaml = r#"
    /// num_classes: 2
    /// keep_top_k: 10
    /// confidence_threshold: [0.0, 0.5]
    /// nms_top_k: 100
    /// nms_threshold: 0.45
    /// anchors:
    ///   image_width: 300
    ///   image_height: 300
    ///   scales:
    ///     - layer_width: 10
    ///       layer_height: 10
    ///       min_sizes: [30.0]
    ///       aspect_ratios: [2.0]
    /// "#;
    /// let detector = DetectorBuilder::new()
    ///     .with_config_yaml_str(config_yaml.to_string())
    ///     .build()?;
    /// assert_eq!(detector.num_priors(), 10 * 10 * 3);
    /// # Ok(())
    /// # }
    /// ```
    pub fn with_config_yaml_str(mut self, yaml_str: String) -> Self {
        self.config_src.replace(ConfigSource::Yaml(yaml_str));
        self
    }

    /// Loads a detector configuration in JSON format. The string is only
    /// parsed by `DetectorBuilder::build()`.
    pub fn with_config_json_str(mut self, json_str: String) -> Self {
        self.config_src.replace(ConfigSource::Json(json_str));
        self
    }

    pub fn with_config(mut self, config: DetectorConfig) -> Self {
        self.config_src.replace(ConfigSource::Config(config));
        self
    }

    /// Uses an existing anchor set, shared with the caller, instead of
    /// generating one from the configuration.
    pub fn with_anchors(mut self, anchors: Arc<AnchorSet>) -> Self {
        self.anchors.replace(anchors);
        self
    }

    /// Overrides the number of score selection threads.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers.replace(workers);
        self
    }

    pub fn build(self) -> Result<Detector> {
        let mut config = match self.config_src {
            Some(ConfigSource::Json(s)) => serde_json::from_str(&s)?,
            Some(ConfigSource::Yaml(s)) => serde_yaml::from_str(&s)?,
            Some(ConfigSource::Config(c)) => c,
            None => return Err(Error::NoConfig),
        };
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        config.validate()?;

        let anchors = match (self.anchors, &config.anchors) {
            (Some(anchors), _) => anchors,
            (None, Some(anchor_config)) => Arc::new(anchor_config.generate()),
            (None, None) => return Err(Error::NoAnchors),
        };
        if anchors.is_empty() {
            return Err(Error::InvalidConfig("anchor set is empty".to_string()));
        }

        let threshold = config.candidate_threshold();
        let selector = ScoreSelector::new(threshold, config.nms_top_k, config.workers)?;
        let decoder = BoxDecoder::new(
            config.code_type,
            config.variance_encoded_in_target,
            config.location_scale,
        );
        let nms = NonMaxSuppression::new(config.nms_threshold, config.eta);

        debug!(
            "Detector: {} priors, {} classes, {} workers, candidate threshold {}",
            anchors.len(),
            config.num_classes,
            config.workers,
            threshold
        );

        Ok(Detector {
            config,
            anchors,
            decoder,
            selector,
            nms,
        })
    }
}

/// Turns the raw location and confidence tensors of one inference into
/// detections.
#[derive(Debug)]
pub struct Detector {
    config: DetectorConfig,
    anchors: Arc<AnchorSet>,
    decoder: BoxDecoder,
    selector: ScoreSelector,
    nms: NonMaxSuppression,
}

impl Detector {
    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn anchors(&self) -> &Arc<AnchorSet> {
        &self.anchors
    }

    pub fn num_priors(&self) -> usize {
        self.anchors.len()
    }

    pub fn num_classes(&self) -> usize {
        self.config.num_classes
    }

    /// Decodes one inference result.
    ///
    /// `locations` holds four values per anchor, `confidences` holds
    /// `num_classes` normalized scores per anchor. Detections are ordered by
    /// class, then by score within the class.
    pub fn detect<T>(&self, locations: &[T], confidences: &[f32]) -> Result<Vec<Detection>>
    where
        T: PrimInt + Signed + AsPrimitive<f32>,
    {
        let mut output = Vec::new();
        self.detect_into(locations, confidences, &mut output)?;
        Ok(output)
    }

    /// Same as [`Detector::detect`] but reuses `output`, which is cleared
    /// first.
    pub fn detect_into<T>(
        &self,
        locations: &[T],
        confidences: &[f32],
        output: &mut Vec<Detection>,
    ) -> Result<()>
    where
        T: PrimInt + Signed + AsPrimitive<f32>,
    {
        let num_priors = self.anchors.len();
        let num_classes = self.config.num_classes;
        if locations.len() != num_priors * 4 {
            return Err(Error::InvalidInput(format!(
                "expected {} location values for {} priors, got {}",
                num_priors * 4,
                num_priors,
                locations.len()
            )));
        }
        if confidences.len() != num_priors * num_classes {
            return Err(Error::InvalidInput(format!(
                "expected {} confidence values for {} priors and {} classes, got {}",
                num_priors * num_classes,
                num_priors,
                num_classes,
                confidences.len()
            )));
        }
        let locations = ArrayView2::from_shape((num_priors, 4), locations)?;
        let conf = ArrayView2::from_shape((num_priors, num_classes), confidences)?;

        // background is never selected
        let candidates = self.selector.select(conf, 1..num_classes);

        let mut cache = DecodeCache::new(locations, &self.anchors, &self.decoder);
        let mut indices = Vec::with_capacity(num_classes);
        indices.push(Vec::new());
        for class_candidates in &candidates {
            indices.push(self.nms.suppress(class_candidates, |i| cache.get(i)));
        }
        let kept = keep_top_k(&mut indices, conf, self.config.keep_top_k);
        trace!(
            "detect: {} candidates, {} decoded, {} kept",
            candidates.iter().map(Vec::len).sum::<usize>(),
            cache.decoded(),
            kept
        );

        output.clear();
        for (label, kept) in indices.iter().enumerate().skip(1) {
            let threshold = self.config.confidence_threshold[label];
            for &index in kept {
                let score = conf[[index, label]];
                if score < threshold {
                    continue;
                }
                let mut bbox = BoundingBox::from(cache.get(index).corners());
                if self.config.clip {
                    bbox = bbox.clamp();
                }
                output.push(Detection { label, score, bbox });
            }
        }
        Ok(())
    }
}

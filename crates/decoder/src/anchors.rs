// SPDX-FileCopyrightText: Copyright 2025 Au-Zone Technologies
// SPDX-License-Identifier: Apache-2.0

//! Prior (anchor) box generation for SSD feature maps.
//!
//! Every feature-map scale contributes `layer_width * layer_height *
//! boxes_per_cell` anchors. Scales are concatenated in configuration order,
//! which must match the order the network concatenates its `mbox_loc` and
//! `mbox_conf` outputs.

use std::ops::Index;

use serde::{Deserialize, Deserializer, Serialize};

pub const DEFAULT_VARIANCES: [f32; 4] = [0.1, 0.1, 0.2, 0.2];

/// A single reference box. Coordinates are normalized to the image size.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AnchorBox {
    pub xmin: f32,
    pub ymin: f32,
    pub xmax: f32,
    pub ymax: f32,
    pub variances: [f32; 4],
    /// center x, cached from the corners
    pub cx: f32,
    /// center y, cached from the corners
    pub cy: f32,
    pub width: f32,
    pub height: f32,
}

impl AnchorBox {
    /// Builds an anchor from normalized `[xmin, ymin, xmax, ymax]` corners.
    pub fn from_corners(corners: [f32; 4], variances: [f32; 4]) -> Self {
        let [xmin, ymin, xmax, ymax] = corners;
        AnchorBox {
            xmin,
            ymin,
            xmax,
            ymax,
            variances,
            cx: 0.5 * (xmin + xmax),
            cy: 0.5 * (ymin + ymax),
            width: xmax - xmin,
            height: ymax - ymin,
        }
    }

    pub fn corners(&self) -> [f32; 4] {
        [self.xmin, self.ymin, self.xmax, self.ymax]
    }
}

/// Ordered anchors, index aligned with the rows of the location tensor.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnchorSet {
    anchors: Vec<AnchorBox>,
}

impl AnchorSet {
    pub fn new(anchors: Vec<AnchorBox>) -> Self {
        Self { anchors }
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AnchorBox> {
        self.anchors.iter()
    }

    /// Appends the anchors of the next feature-map scale.
    pub fn extend_scale(&mut self, scale: Vec<AnchorBox>) {
        self.anchors.extend(scale);
    }
}

impl Index<usize> for AnchorSet {
    type Output = AnchorBox;

    fn index(&self, index: usize) -> &AnchorBox {
        &self.anchors[index]
    }
}

impl FromIterator<AnchorBox> for AnchorSet {
    fn from_iter<I: IntoIterator<Item = AnchorBox>>(iter: I) -> Self {
        Self {
            anchors: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a AnchorSet {
    type Item = &'a AnchorBox;
    type IntoIter = std::slice::Iter<'a, AnchorBox>;

    fn into_iter(self) -> Self::IntoIter {
        self.anchors.iter()
    }
}

fn default_offset() -> f32 {
    0.5
}

fn default_flip() -> bool {
    true
}

fn default_variances() -> [f32; 4] {
    DEFAULT_VARIANCES
}

/// Expands a variance list to one value per coordinate. Four values are used
/// as is and a single value is shared by all four. Any other length falls
/// back to 0.1 for every coordinate.
pub fn broadcast_variances(values: &[f32]) -> [f32; 4] {
    match *values {
        [x, y, w, h] => [x, y, w, h],
        [v] => [v; 4],
        _ => [0.1; 4],
    }
}

fn deserialize_variances<'de, D>(deserializer: D) -> Result<[f32; 4], D::Error>
where
    D: Deserializer<'de>,
{
    let values = Vec::<f32>::deserialize(deserializer)?;
    Ok(broadcast_variances(&values))
}

/// Prior box parameters of one feature-map scale. Sizes and steps are in
/// input image pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorBoxConfig {
    pub layer_width: usize,
    pub layer_height: usize,
    pub min_sizes: Vec<f32>,
    #[serde(default)]
    pub max_sizes: Vec<f32>,
    #[serde(default)]
    pub aspect_ratios: Vec<f32>,
    #[serde(default = "default_offset")]
    pub offset: f32,
    /// Horizontal distance between cell centers. Zero means
    /// `image_width / layer_width`.
    #[serde(default)]
    pub step_width: f32,
    /// Vertical distance between cell centers. Zero means
    /// `image_height / layer_height`.
    #[serde(default)]
    pub step_height: f32,
    #[serde(default = "default_flip")]
    pub flip: bool,
    #[serde(default)]
    pub clip: bool,
}

impl PriorBoxConfig {
    pub fn new(layer_width: usize, layer_height: usize, min_sizes: Vec<f32>) -> Self {
        Self {
            layer_width,
            layer_height,
            min_sizes,
            max_sizes: Vec::new(),
            aspect_ratios: Vec::new(),
            offset: default_offset(),
            step_width: 0.0,
            step_height: 0.0,
            flip: default_flip(),
            clip: false,
        }
    }

    pub fn with_max_sizes(mut self, max_sizes: Vec<f32>) -> Self {
        self.max_sizes = max_sizes;
        self
    }

    pub fn with_aspect_ratios(mut self, aspect_ratios: Vec<f32>) -> Self {
        self.aspect_ratios = aspect_ratios;
        self
    }

    pub fn with_offset(mut self, offset: f32) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_step(mut self, step_width: f32, step_height: f32) -> Self {
        self.step_width = step_width;
        self.step_height = step_height;
        self
    }

    pub fn with_flip(mut self, flip: bool) -> Self {
        self.flip = flip;
        self
    }

    pub fn with_clip(mut self, clip: bool) -> Self {
        self.clip = clip;
        self
    }

    /// The (width, height) of every box emitted at each cell, in emission
    /// order. Aspect ratio 1 is always represented by the min size box, so
    /// explicit ratios equal to 1 are skipped.
    pub fn box_dims(&self) -> Vec<(f32, f32)> {
        let mut dims = Vec::with_capacity(self.boxes_per_cell());
        for (i, &min_size) in self.min_sizes.iter().enumerate() {
            dims.push((min_size, min_size));
            if let Some(&max_size) = self.max_sizes.get(i) {
                let size = (min_size * max_size).sqrt();
                dims.push((size, size));
            }
            for &ar in self.valid_ratios() {
                let w = min_size * ar.sqrt();
                let h = min_size / ar.sqrt();
                dims.push((w, h));
                if self.flip {
                    dims.push((h, w));
                }
            }
        }
        dims
    }

    fn valid_ratios(&self) -> impl Iterator<Item = &f32> {
        self.aspect_ratios
            .iter()
            .filter(|ar| **ar > 0.0 && (**ar - 1.0).abs() > 1e-6)
    }

    pub fn boxes_per_cell(&self) -> usize {
        let with_max = self.min_sizes.len().min(self.max_sizes.len());
        let ratios = self.valid_ratios().count() * if self.flip { 2 } else { 1 };
        self.min_sizes.len() + with_max + self.min_sizes.len() * ratios
    }

    pub fn num_priors(&self) -> usize {
        self.layer_width * self.layer_height * self.boxes_per_cell()
    }

    /// Generates the anchors of this scale, row by row and cell by cell.
    ///
    /// A zero sized grid yields no anchors.
    pub fn generate(
        &self,
        image_width: usize,
        image_height: usize,
        variances: [f32; 4],
    ) -> Vec<AnchorBox> {
        if self.layer_width == 0 || self.layer_height == 0 {
            return Vec::new();
        }
        let image_w = image_width as f32;
        let image_h = image_height as f32;
        let (step_w, step_h) = if self.step_width == 0.0 || self.step_height == 0.0 {
            (
                image_w / self.layer_width as f32,
                image_h / self.layer_height as f32,
            )
        } else {
            (self.step_width, self.step_height)
        };

        let dims = self.box_dims();
        let mut anchors = Vec::with_capacity(self.layer_width * self.layer_height * dims.len());
        for h in 0..self.layer_height {
            for w in 0..self.layer_width {
                let center_x = (w as f32 + self.offset) * step_w;
                let center_y = (h as f32 + self.offset) * step_h;
                for &(box_w, box_h) in &dims {
                    let mut corners = [
                        (center_x - box_w / 2.0) / image_w,
                        (center_y - box_h / 2.0) / image_h,
                        (center_x + box_w / 2.0) / image_w,
                        (center_y + box_h / 2.0) / image_h,
                    ];
                    if self.clip {
                        corners = corners.map(|c| c.clamp(0.0, 1.0));
                    }
                    anchors.push(AnchorBox::from_corners(corners, variances));
                }
            }
        }
        anchors
    }
}

/// Anchor layout of a whole network: the input size, the variances shared by
/// all anchors, and one [`PriorBoxConfig`] per feature-map scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchorConfig {
    pub image_width: usize,
    pub image_height: usize,
    /// Either four values or a single value shared by all coordinates.
    #[serde(
        default = "default_variances",
        deserialize_with = "deserialize_variances"
    )]
    pub variances: [f32; 4],
    pub scales: Vec<PriorBoxConfig>,
}

impl AnchorConfig {
    pub fn new(image_width: usize, image_height: usize) -> Self {
        Self {
            image_width,
            image_height,
            variances: DEFAULT_VARIANCES,
            scales: Vec::new(),
        }
    }

    pub fn with_variances(mut self, variances: [f32; 4]) -> Self {
        self.variances = variances;
        self
    }

    pub fn with_scale(mut self, scale: PriorBoxConfig) -> Self {
        self.scales.push(scale);
        self
    }

    /// The six scale layout of the 480x360 SSD vehicle detection network.
    pub fn ssd_480x360() -> Self {
        Self::new(480, 360)
            .with_scale(
                PriorBoxConfig::new(60, 45, vec![15.0, 30.0])
                    .with_max_sizes(vec![33.0, 60.0])
                    .with_aspect_ratios(vec![2.0])
                    .with_step(8.0, 8.0),
            )
            .with_scale(
                PriorBoxConfig::new(30, 23, vec![66.0])
                    .with_max_sizes(vec![127.0])
                    .with_aspect_ratios(vec![2.0, 3.0])
                    .with_step(16.0, 16.0),
            )
            .with_scale(
                PriorBoxConfig::new(15, 12, vec![127.0])
                    .with_max_sizes(vec![188.0])
                    .with_aspect_ratios(vec![2.0, 3.0])
                    .with_step(32.0, 32.0),
            )
            .with_scale(
                PriorBoxConfig::new(8, 6, vec![188.0])
                    .with_max_sizes(vec![249.0])
                    .with_aspect_ratios(vec![2.0, 3.0])
                    .with_step(64.0, 64.0),
            )
            .with_scale(
                PriorBoxConfig::new(6, 4, vec![249.0])
                    .with_max_sizes(vec![310.0])
                    .with_aspect_ratios(vec![2.0])
                    .with_step(100.0, 100.0),
            )
            .with_scale(
                PriorBoxConfig::new(4, 2, vec![310.0])
                    .with_max_sizes(vec![372.0])
                    .with_aspect_ratios(vec![2.0])
                    .with_step(300.0, 300.0),
            )
    }

    pub fn num_priors(&self) -> usize {
        self.scales.iter().map(PriorBoxConfig::num_priors).sum()
    }

    /// Generates every scale and concatenates them in configuration order.
    ///
    /// # Examples
    /// ```rust
    /// use ssdpost_decoder::anchors::{AnchorConfig, PriorBoxConfig};
    /// let config = AnchorConfig::new(300, 300)
    ///     .with_scale(PriorBoxConfig::new(2, 2, vec![60.0]).with_aspect_ratios(vec![2.0]));
    /// let anchors = config.generate();
    /// assert_eq!(anchors.len(), 2 * 2 * 3);
    /// ```
    pub fn generate(&self) -> AnchorSet {
        let mut anchors = AnchorSet::new(Vec::with_capacity(self.num_priors()));
        for scale in &self.scales {
            anchors.extend_scale(scale.generate(
                self.image_width,
                self.image_height,
                self.variances,
            ));
        }
        anchors
    }
}

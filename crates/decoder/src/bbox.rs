// SPDX-FileCopyrightText: Copyright 2025 Au-Zone Technologies
// SPDX-License-Identifier: Apache-2.0

use ndarray::{ArrayView1, ArrayView2};
use num_traits::{AsPrimitive, PrimInt};
use serde::{Deserialize, Serialize};

use crate::anchors::{AnchorBox, AnchorSet};

/// How the network encodes a location row relative to its anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeType {
    /// Offsets are added to the anchor corners.
    Corner,
    /// Offsets move the anchor center and log-scale its size.
    #[default]
    CenterSize,
    /// Corner offsets expressed in units of the anchor size.
    CornerSize,
}

/// A decoded box in normalized image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DecodedBox {
    pub xmin: f32,
    pub ymin: f32,
    pub xmax: f32,
    pub ymax: f32,
    /// width * height, or zero for a degenerate box
    pub area: f32,
}

impl DecodedBox {
    pub fn new(xmin: f32, ymin: f32, xmax: f32, ymax: f32) -> Self {
        DecodedBox {
            xmin,
            ymin,
            xmax,
            ymax,
            area: box_area(xmin, ymin, xmax, ymax),
        }
    }

    pub fn corners(&self) -> [f32; 4] {
        [self.xmin, self.ymin, self.xmax, self.ymax]
    }
}

#[inline(always)]
fn box_area(xmin: f32, ymin: f32, xmax: f32, ymax: f32) -> f32 {
    let w = xmax - xmin;
    let h = ymax - ymin;
    if w > 0.0 && h > 0.0 { w * h } else { 0.0 }
}

/// Area shared by two boxes. Boxes that do not touch share nothing.
pub fn intersection_area(a: &DecodedBox, b: &DecodedBox) -> f32 {
    if b.xmin > a.xmax || b.xmax < a.xmin || b.ymin > a.ymax || b.ymax < a.ymin {
        return 0.0;
    }
    box_area(
        a.xmin.max(b.xmin),
        a.ymin.max(b.ymin),
        a.xmax.min(b.xmax),
        a.ymax.min(b.ymax),
    )
}

/// Intersection over union of two decoded boxes.
pub fn jaccard_overlap(a: &DecodedBox, b: &DecodedBox) -> f32 {
    let intersection = intersection_area(a, b);
    if intersection <= 0.0 {
        return 0.0;
    }
    intersection / (a.area + b.area - intersection)
}

/// Converts one row of the location tensor into an absolute box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxDecoder {
    pub code_type: CodeType,
    /// The variances were already folded into the training targets, so the
    /// decoder must not apply them again.
    pub variance_encoded_in_target: bool,
    /// Dequantization scale of the raw location values.
    pub scale: f32,
}

impl BoxDecoder {
    pub fn new(code_type: CodeType, variance_encoded_in_target: bool, scale: f32) -> Self {
        Self {
            code_type,
            variance_encoded_in_target,
            scale,
        }
    }

    pub fn decode<T: PrimInt + AsPrimitive<f32>>(
        &self,
        raw: ArrayView1<T>,
        anchor: &AnchorBox,
    ) -> DecodedBox {
        let loc = [
            raw[0].as_() * self.scale,
            raw[1].as_() * self.scale,
            raw[2].as_() * self.scale,
            raw[3].as_() * self.scale,
        ];
        self.decode_f32(loc, anchor)
    }

    /// Decodes an already dequantized location row.
    pub fn decode_f32(&self, loc: [f32; 4], anchor: &AnchorBox) -> DecodedBox {
        let var = if self.variance_encoded_in_target {
            [1.0; 4]
        } else {
            anchor.variances
        };
        match self.code_type {
            CodeType::Corner => DecodedBox::new(
                anchor.xmin + loc[0] * var[0],
                anchor.ymin + loc[1] * var[1],
                anchor.xmax + loc[2] * var[2],
                anchor.ymax + loc[3] * var[3],
            ),
            CodeType::CenterSize => {
                let cx = anchor.cx + var[0] * loc[0] * anchor.width;
                let cy = anchor.cy + var[1] * loc[1] * anchor.height;
                let w = (var[2] * loc[2]).exp() * anchor.width;
                let h = (var[3] * loc[3]).exp() * anchor.height;
                DecodedBox::new(cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0)
            }
            CodeType::CornerSize => DecodedBox::new(
                anchor.xmin + loc[0] * var[0] * anchor.width,
                anchor.ymin + loc[1] * var[1] * anchor.height,
                anchor.xmax + loc[2] * var[2] * anchor.width,
                anchor.ymax + loc[3] * var[3] * anchor.height,
            ),
        }
    }
}

/// Decoded boxes of one detect call, filled in on first use.
pub struct DecodeCache<'a, T> {
    locations: ArrayView2<'a, T>,
    anchors: &'a AnchorSet,
    decoder: &'a BoxDecoder,
    boxes: Vec<Option<DecodedBox>>,
}

impl<'a, T: PrimInt + AsPrimitive<f32>> DecodeCache<'a, T> {
    /// `locations` must have one row of four values per anchor.
    pub fn new(
        locations: ArrayView2<'a, T>,
        anchors: &'a AnchorSet,
        decoder: &'a BoxDecoder,
    ) -> Self {
        debug_assert_eq!(locations.nrows(), anchors.len());
        Self {
            locations,
            anchors,
            decoder,
            boxes: vec![None; anchors.len()],
        }
    }

    pub fn get(&mut self, index: usize) -> DecodedBox {
        if let Some(decoded) = self.boxes[index] {
            return decoded;
        }
        let decoded = self
            .decoder
            .decode(self.locations.row(index), &self.anchors[index]);
        self.boxes[index] = Some(decoded);
        decoded
    }

    /// Number of anchors decoded so far.
    pub fn decoded(&self) -> usize {
        self.boxes.iter().filter(|b| b.is_some()).count()
    }
}

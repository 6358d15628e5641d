// SPDX-FileCopyrightText: Copyright 2025 Au-Zone Technologies
// SPDX-License-Identifier: Apache-2.0

//! SSD Post-Processing - Decoders
//!
//! Turns the raw outputs of a single-shot detector (a location tensor of
//! `[num_priors, 4]` encoded offsets and a confidence tensor of
//! `[num_priors, num_classes]` probabilities) into a final list of labeled,
//! scored boxes.
//!
//! The pipeline is split into stages that can be used on their own:
//! - [`anchors`] generates the prior boxes of every feature-map scale
//! - [`bbox`] decodes raw offsets against their anchor and measures overlap
//! - [`select`] picks per-class candidates, partitioned across workers
//! - [`nms`] runs greedy non-maximum suppression with an adaptive threshold
//! - [`topk`] enforces the global detection cap
//! - [`softmax`] converts quantized logits into class probabilities
//!
//! [`Detector`] wires them together.
#![allow(clippy::excessive_precision)]
use num_traits::{AsPrimitive, Float};

pub mod anchors;
pub mod bbox;
pub mod error;
pub mod nms;
pub mod select;
pub mod softmax;
pub mod topk;

mod detector;
pub use detector::*;

pub use error::{Error, Result};

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Quantization {
    pub scale: f32,
    pub zero_point: i32,
}

impl Quantization {
    pub fn new(scale: f32, zero_point: i32) -> Self {
        Self { scale, zero_point }
    }
}

impl<S, Z> From<(S, Z)> for Quantization
where
    S: AsPrimitive<f32>,
    Z: AsPrimitive<i32>,
{
    fn from((scale, zp): (S, Z)) -> Quantization {
        Self {
            scale: scale.as_(),
            zero_point: zp.as_(),
        }
    }
}

impl Default for Quantization {
    fn default() -> Self {
        Self {
            scale: 1.0,
            zero_point: 0,
        }
    }
}

pub fn dequantize_cpu<T: AsPrimitive<F>, F: Float + 'static>(
    input: &[T],
    quant: Quantization,
    output: &mut [F],
) where
    f32: num_traits::AsPrimitive<F>,
    i32: num_traits::AsPrimitive<F>,
{
    assert!(input.len() == output.len());
    let zero_point = quant.zero_point.as_();
    let scale = quant.scale.as_();
    if zero_point != F::zero() {
        // scale * (d - zero_point) = d * scale - zero_point * scale
        let scaled_zero = -zero_point * scale;
        input
            .iter()
            .zip(output)
            .for_each(|(d, deq)| *deq = d.as_() * scale + scaled_zero);
    } else {
        input
            .iter()
            .zip(output)
            .for_each(|(d, deq)| *deq = d.as_() * scale);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoundingBox {
    /// left-most normalized coordinate of the bounding box
    pub xmin: f32,
    /// top-most normalized coordinate of the bounding box
    pub ymin: f32,
    /// right-most normalized coordinate of the bounding box
    pub xmax: f32,
    /// bottom-most normalized coordinate of the bounding box
    pub ymax: f32,
}

impl BoundingBox {
    /// Clamps every corner into the unit square.
    pub fn clamp(&self) -> Self {
        BoundingBox {
            xmin: self.xmin.clamp(0.0, 1.0),
            ymin: self.ymin.clamp(0.0, 1.0),
            xmax: self.xmax.clamp(0.0, 1.0),
            ymax: self.ymax.clamp(0.0, 1.0),
        }
    }

    pub fn width(&self) -> f32 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f32 {
        self.ymax - self.ymin
    }
}

impl From<BoundingBox> for [f32; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.xmin, b.ymin, b.xmax, b.ymax]
    }
}

impl From<[f32; 4]> for BoundingBox {
    fn from(arr: [f32; 4]) -> Self {
        BoundingBox {
            xmin: arr[0],
            ymin: arr[1],
            xmax: arr[2],
            ymax: arr[3],
        }
    }
}

/// A final detection. Labels are class indices, never the background class.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Detection {
    /// class index for this detection
    pub label: usize,
    /// class probability for this detection, higher implies more confidence
    pub score: f32,
    pub bbox: BoundingBox,
}

impl Detection {
    /// Check if one detection is equal to another detection, within the given
    /// delta
    pub fn equal_within_delta(&self, rhs: &Detection, delta: f32) -> bool {
        let eq_delta = |a: f32, b: f32| (a - b).abs() <= delta;
        self.label == rhs.label
            && eq_delta(self.score, rhs.score)
            && eq_delta(self.bbox.xmin, rhs.bbox.xmin)
            && eq_delta(self.bbox.ymin, rhs.bbox.ymin)
            && eq_delta(self.bbox.xmax, rhs.bbox.xmax)
            && eq_delta(self.bbox.ymax, rhs.bbox.ymax)
    }

    /// Converts the normalized box into `[x, y, width, height]` pixels of an
    /// image with the given size. The rectangle is kept inside the image.
    pub fn to_pixel_rect(&self, width: u32, height: u32) -> [i32; 4] {
        let w = width as f32;
        let h = height as f32;
        let pixels = BoundingBox {
            xmin: (self.bbox.xmin * w).clamp(0.0, w),
            ymin: (self.bbox.ymin * h).clamp(0.0, h),
            xmax: (self.bbox.xmax * w).clamp(0.0, w),
            ymax: (self.bbox.ymax * h).clamp(0.0, h),
        };
        [
            pixels.xmin as i32,
            pixels.ymin as i32,
            pixels.width().max(0.0) as i32,
            pixels.height().max(0.0) as i32,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dequantize_cpu() {
        let quant = Quantization::new(0.5, -2);
        let input: [i8; 4] = [-2, 0, 2, 127];
        let mut output = [0.0f32; 4];
        dequantize_cpu(&input, quant, &mut output);
        assert_eq!(output, [0.0, 1.0, 2.0, 64.5]);

        let quant = Quantization::from((0.25, 0));
        let mut output = [0.0f32; 4];
        dequantize_cpu(&input, quant, &mut output);
        assert_eq!(output, [-0.5, 0.0, 0.5, 31.75]);
    }

    #[test]
    fn test_bounding_box_clamp() {
        let b = BoundingBox::from([-0.1, 0.2, 1.3, 0.9]).clamp();
        assert_eq!(<[f32; 4]>::from(b), [0.0, 0.2, 1.0, 0.9]);
        assert!((b.width() - 1.0).abs() < 1e-6);
        assert!((b.height() - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_to_pixel_rect() {
        let det = Detection {
            label: 1,
            score: 0.9,
            bbox: BoundingBox::from([0.25, 0.5, 0.75, 1.0]),
        };
        assert_eq!(det.to_pixel_rect(480, 360), [120, 180, 240, 180]);

        let det = Detection {
            bbox: BoundingBox::from([-0.5, -0.5, 2.0, 0.5]),
            ..det
        };
        assert_eq!(det.to_pixel_rect(100, 100), [0, 0, 100, 50]);
    }

    #[test]
    fn test_equal_within_delta() {
        let a = Detection {
            label: 2,
            score: 0.5,
            bbox: BoundingBox::from([0.1, 0.1, 0.2, 0.2]),
        };
        let mut b = a;
        b.score += 1e-7;
        assert!(a.equal_within_delta(&b, 1e-6));
        b.label = 3;
        assert!(!a.equal_within_delta(&b, 1e-6));
    }
}

// SPDX-FileCopyrightText: Copyright 2025 Au-Zone Technologies
// SPDX-License-Identifier: Apache-2.0

use crate::{
    bbox::{DecodedBox, jaccard_overlap},
    select::ScoredCandidate,
};

/// Greedy per-class non-maximum suppression.
///
/// The IoU threshold starts at `iou_threshold`. With `eta < 1`, every kept
/// box multiplies it by `eta` for as long as it stays above 0.5.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NonMaxSuppression {
    pub iou_threshold: f32,
    pub eta: f32,
}

impl NonMaxSuppression {
    pub fn new(iou_threshold: f32, eta: f32) -> Self {
        Self { iou_threshold, eta }
    }

    /// Walks `candidates` in order, which must be best score first, and
    /// returns the anchor indices that survive, in keep order. `decode` is
    /// asked for the box of an anchor index whenever it is needed.
    pub fn suppress<F>(&self, candidates: &[ScoredCandidate], mut decode: F) -> Vec<usize>
    where
        F: FnMut(usize) -> DecodedBox,
    {
        let mut threshold = self.iou_threshold;
        let mut kept: Vec<(usize, DecodedBox)> = Vec::new();
        for candidate in candidates {
            let decoded = decode(candidate.index);
            let keep = kept
                .iter()
                .all(|(_, other)| jaccard_overlap(&decoded, other) <= threshold);
            if keep {
                kept.push((candidate.index, decoded));
                if self.eta < 1.0 && threshold > 0.5 {
                    threshold *= self.eta;
                }
            }
        }
        kept.into_iter().map(|(index, _)| index).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates(scores: &[f32]) -> Vec<ScoredCandidate> {
        scores
            .iter()
            .enumerate()
            .map(|(index, &score)| ScoredCandidate { score, index })
            .collect()
    }

    #[test]
    fn test_overlapping_box_suppressed() {
        // IoU of the two boxes is 0.5
        let boxes = [
            DecodedBox::new(0.0, 0.0, 0.6, 0.5),
            DecodedBox::new(0.2, 0.0, 0.8, 0.5),
        ];
        let nms = NonMaxSuppression::new(0.45, 1.0);
        assert_eq!(nms.suppress(&candidates(&[0.9, 0.8]), |i| boxes[i]), vec![0]);

        let nms = NonMaxSuppression::new(0.55, 1.0);
        assert_eq!(
            nms.suppress(&candidates(&[0.9, 0.8]), |i| boxes[i]),
            vec![0, 1]
        );
    }

    #[test]
    fn test_disjoint_boxes_kept() {
        let boxes: Vec<_> = (0..5)
            .map(|i| {
                let x = i as f32 * 0.2;
                DecodedBox::new(x, 0.0, x + 0.1, 0.1)
            })
            .collect();
        let nms = NonMaxSuppression::new(0.3, 1.0);
        let kept = nms.suppress(&candidates(&[0.9, 0.8, 0.7, 0.6, 0.5]), |i| boxes[i]);
        assert_eq!(kept, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_keep_order_follows_candidates() {
        let boxes = [
            DecodedBox::new(0.0, 0.0, 0.1, 0.1),
            DecodedBox::new(0.5, 0.5, 0.6, 0.6),
        ];
        let order = [
            ScoredCandidate {
                score: 0.9,
                index: 1,
            },
            ScoredCandidate {
                score: 0.8,
                index: 0,
            },
        ];
        let nms = NonMaxSuppression::new(0.45, 1.0);
        assert_eq!(nms.suppress(&order, |i| boxes[i]), vec![1, 0]);
    }

    #[test]
    fn test_suppressed_box_does_not_suppress() {
        // b overlaps a and c, a and c are disjoint
        let boxes = [
            DecodedBox::new(0.0, 0.0, 0.4, 0.4),
            DecodedBox::new(0.1, 0.0, 0.5, 0.4),
            DecodedBox::new(0.41, 0.0, 0.81, 0.4),
        ];
        let nms = NonMaxSuppression::new(0.45, 1.0);
        let kept = nms.suppress(&candidates(&[0.9, 0.8, 0.7]), |i| boxes[i]);
        assert_eq!(kept, vec![0, 2]);
    }

    #[test]
    fn test_adaptive_threshold() {
        // boxes 0 and 1 overlap with IoU 0.6, box 2 overlaps both less
        let boxes = [
            DecodedBox::new(0.0, 0.0, 0.8, 0.1),
            DecodedBox::new(0.2, 0.0, 1.0, 0.1),
            DecodedBox::new(0.6, 0.0, 1.4, 0.1),
        ];
        let iou = jaccard_overlap(&boxes[0], &boxes[1]);
        assert!((iou - 0.6).abs() < 1e-5);
        assert!((jaccard_overlap(&boxes[0], &boxes[2]) - 1.0 / 7.0).abs() < 1e-5);
        assert!((jaccard_overlap(&boxes[1], &boxes[2]) - 1.0 / 3.0).abs() < 1e-5);

        // fixed threshold 0.7 keeps everything
        let fixed = NonMaxSuppression::new(0.7, 1.0);
        assert_eq!(
            fixed.suppress(&candidates(&[0.9, 0.8, 0.7]), |i| boxes[i]),
            vec![0, 1, 2]
        );

        // 0.7 * 0.8 = 0.56 after the first keep, box 1 is dropped
        let adaptive = NonMaxSuppression::new(0.7, 0.8);
        assert_eq!(
            adaptive.suppress(&candidates(&[0.9, 0.8, 0.7]), |i| boxes[i]),
            vec![0, 2]
        );
    }

    #[test]
    fn test_adaptive_threshold_floor() {
        // IoU of boxes 1 and 2 is 0.25, box 0 is disjoint from both
        let boxes = [
            DecodedBox::new(0.0, 0.0, 0.1, 0.1),
            DecodedBox::new(0.5, 0.0, 0.6, 0.1),
            DecodedBox::new(0.55, 0.0, 0.7, 0.1),
        ];
        // 0.7 decays once to 0.35 and then stays there
        let nms = NonMaxSuppression::new(0.7, 0.5);
        let kept = nms.suppress(&candidates(&[0.9, 0.8, 0.7]), |i| boxes[i]);
        assert_eq!(kept, vec![0, 1, 2]);

        // 0.2 never decays
        let nms = NonMaxSuppression::new(0.2, 0.5);
        let kept = nms.suppress(&candidates(&[0.9, 0.8, 0.7]), |i| boxes[i]);
        assert_eq!(kept, vec![0, 1]);
    }

    #[test]
    fn test_empty() {
        let nms = NonMaxSuppression::new(0.45, 1.0);
        assert!(nms.suppress(&[], |_| DecodedBox::default()).is_empty());
    }
}

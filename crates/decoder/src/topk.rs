// SPDX-FileCopyrightText: Copyright 2025 Au-Zone Technologies
// SPDX-License-Identifier: Apache-2.0

use log::debug;
use ndarray::ArrayView2;

/// Caps the number of kept detections across all classes.
///
/// `indices[c]` holds the kept anchor indices of class `c` and `conf` is the
/// `[num_anchors, num_classes]` confidence tensor. When more than `keep_top_k`
/// detections are kept, only the `keep_top_k` best scoring ones survive,
/// whatever their class. Ties go to the lower anchor index, then the lower
/// class. Survivors are listed best first within their class.
///
/// A `keep_top_k` of zero disables the cap. Returns the number of detections
/// left.
pub fn keep_top_k(indices: &mut [Vec<usize>], conf: ArrayView2<f32>, keep_top_k: usize) -> usize {
    let total: usize = indices.iter().map(Vec::len).sum();
    if keep_top_k == 0 || total <= keep_top_k {
        return total;
    }

    let mut ranked: Vec<(f32, usize, usize)> = Vec::with_capacity(total);
    for (class, kept) in indices.iter().enumerate() {
        ranked.extend(kept.iter().map(|&index| (conf[[index, class]], class, index)));
    }
    ranked.sort_by(|a, b| {
        b.0.total_cmp(&a.0)
            .then_with(|| a.2.cmp(&b.2))
            .then_with(|| a.1.cmp(&b.1))
    });
    ranked.truncate(keep_top_k);

    debug!("keep_top_k: truncated {} detections to {}", total, keep_top_k);

    indices.iter_mut().for_each(Vec::clear);
    for (_, class, index) in ranked {
        indices[class].push(index);
    }
    keep_top_k
}

// SPDX-FileCopyrightText: Copyright 2025 Au-Zone Technologies
// SPDX-License-Identifier: Apache-2.0

use std::ops::Range;

use ndarray::ArrayView2;

use crate::error::{Error, Result};

/// A candidate anchor for one class.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScoredCandidate {
    pub score: f32,
    /// anchor index, also the row of the location and confidence tensors
    pub index: usize,
}

/// Splits `classes` into at most `workers` contiguous ranges of equal length.
/// The remainder is folded into the last range.
pub fn partition_classes(classes: Range<usize>, workers: usize) -> Vec<Range<usize>> {
    let workers = workers.max(1);
    let chunk = classes.len() / workers;
    if chunk == 0 {
        return vec![classes];
    }
    (0..workers)
        .map(|i| {
            let start = classes.start + i * chunk;
            let end = if i + 1 == workers {
                classes.end
            } else {
                start + chunk
            };
            start..end
        })
        .collect()
}

/// Collects the anchors whose score for `class` is above `threshold`, best
/// first, keeping at most `top_k`. Equal scores keep anchor order.
pub fn select_one_class(
    conf: ArrayView2<f32>,
    class: usize,
    threshold: f32,
    top_k: usize,
) -> Vec<ScoredCandidate> {
    let mut candidates: Vec<_> = conf
        .column(class)
        .iter()
        .enumerate()
        .filter(|(_, score)| **score > threshold)
        .map(|(index, score)| ScoredCandidate {
            score: *score,
            index,
        })
        .collect();
    // sort_by is stable
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
    candidates.truncate(top_k);
    candidates
}

/// Per-class candidate selection, spread over a fixed pool of workers.
pub struct ScoreSelector {
    threshold: f32,
    top_k: usize,
    workers: usize,
    pool: rayon::ThreadPool,
}

impl std::fmt::Debug for ScoreSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScoreSelector")
            .field("threshold", &self.threshold)
            .field("top_k", &self.top_k)
            .field("workers", &self.workers)
            .finish()
    }
}

impl ScoreSelector {
    pub fn new(threshold: f32, top_k: usize, workers: usize) -> Result<Self> {
        if workers == 0 {
            return Err(Error::InvalidConfig(
                "score selector needs at least one worker".to_string(),
            ));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("ssd-select-{i}"))
            .build()?;
        Ok(Self {
            threshold,
            top_k,
            workers,
            pool,
        })
    }

    /// Selects candidates for every class in `classes`. `conf` has one row per
    /// anchor and one column per class. Entry `i` of the result belongs to
    /// class `classes.start + i`.
    ///
    /// Each worker owns a contiguous block of result slots; the call returns
    /// once every worker is done.
    pub fn select(
        &self,
        conf: ArrayView2<f32>,
        classes: Range<usize>,
    ) -> Vec<Vec<ScoredCandidate>> {
        let mut slots = vec![Vec::new(); classes.len()];
        let threshold = self.threshold;
        let top_k = self.top_k;
        let first = classes.start;
        let ranges = partition_classes(0..classes.len(), self.workers);

        self.pool.scope(|s| {
            let mut rest: &mut [Vec<ScoredCandidate>] = &mut slots;
            for range in ranges {
                let (chunk, tail) = std::mem::take(&mut rest).split_at_mut(range.len());
                rest = tail;
                let start = first + range.start;
                s.spawn(move |_| {
                    for (offset, slot) in chunk.iter_mut().enumerate() {
                        *slot = select_one_class(conf, start + offset, threshold, top_k);
                    }
                });
            }
        });
        slots
    }
}

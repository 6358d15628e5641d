// SPDX-FileCopyrightText: Copyright 2025 Au-Zone Technologies
// SPDX-License-Identifier: Apache-2.0

use divan::black_box_drop;
use ndarray::Array2;
use ssdpost_decoder::{
    DetectorBuilder, DetectorConfig, Quantization,
    anchors::AnchorConfig,
    select::ScoreSelector,
    softmax::softmax_quantized,
};

const NUM_CLASSES: usize = 4;

fn random_logits(len: usize) -> Vec<i8> {
    rand::random_iter().take(len).collect()
}

fn probabilities(num_priors: usize) -> Vec<f32> {
    let logits = random_logits(num_priors * NUM_CLASSES);
    let mut conf = vec![0.0; logits.len()];
    softmax_quantized(&logits, Quantization::new(0.125, 0), NUM_CLASSES, &mut conf).unwrap();
    conf
}

#[divan::bench()]
fn anchors_ssd_480x360(bencher: divan::Bencher) {
    let config = AnchorConfig::ssd_480x360();
    bencher.bench_local(|| black_box_drop(config.generate()));
}

#[divan::bench()]
fn softmax_quant(bencher: divan::Bencher) {
    let num_priors = AnchorConfig::ssd_480x360().num_priors();
    let logits = random_logits(num_priors * NUM_CLASSES);
    let mut conf = vec![0.0; logits.len()];
    bencher.bench_local(|| {
        softmax_quantized(&logits, Quantization::new(0.125, 0), NUM_CLASSES, &mut conf).unwrap();
    });
}

#[divan::bench(args = [1, 2, 4])]
fn select_scores(bencher: divan::Bencher, workers: usize) {
    let num_priors = AnchorConfig::ssd_480x360().num_priors();
    let conf =
        Array2::from_shape_vec((num_priors, NUM_CLASSES), probabilities(num_priors)).unwrap();
    let selector = ScoreSelector::new(0.5, 400, workers).unwrap();
    bencher.bench_local(|| black_box_drop(selector.select(conf.view(), 1..NUM_CLASSES)));
}

#[divan::bench()]
fn detect_i8(bencher: divan::Bencher) {
    let detector = DetectorBuilder::new()
        .with_config(DetectorConfig::ssd_480x360())
        .build()
        .unwrap();
    let num_priors = detector.num_priors();
    let loc = random_logits(num_priors * 4);
    let conf = probabilities(num_priors);
    let mut output = Vec::with_capacity(200);
    bencher.bench_local(|| {
        detector.detect_into(&loc, &conf, &mut output).unwrap();
    });
}

fn main() {
    env_logger::init();
    divan::main();
}

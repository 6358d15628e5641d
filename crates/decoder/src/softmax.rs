// SPDX-FileCopyrightText: Copyright 2025 Au-Zone Technologies
// SPDX-License-Identifier: Apache-2.0

//! Class probabilities from raw confidence logits.
//!
//! The detector expects normalized confidences. Accelerators that only
//! produce quantized logits need one of these passes first.

use num_traits::AsPrimitive;

use crate::{
    Quantization, dequantize_cpu,
    error::{Error, Result},
};

/// Applies a numerically stable softmax to every row of `num_classes`
/// values.
pub fn softmax_in_place(values: &mut [f32], num_classes: usize) -> Result<()> {
    check_rows(values.len(), num_classes)?;
    values
        .chunks_exact_mut(num_classes)
        .for_each(softmax_row);
    Ok(())
}

/// Dequantizes `input` into `output` and normalizes every row of
/// `num_classes` logits.
///
/// # Examples
/// ```rust
/// use ssdpost_decoder::{Quantization, softmax::softmax_quantized};
/// let logits: [i8; 4] = [0, 0, -4, 4];
/// let mut probs = [0.0f32; 4];
/// softmax_quantized(&logits, Quantization::new(0.5, 0), 2, &mut probs)?;
/// assert!((probs[0] - 0.5).abs() < 1e-6);
/// assert!(probs[3] > 0.98);
/// # Ok::<(), ssdpost_decoder::Error>(())
/// ```
pub fn softmax_quantized<T: AsPrimitive<f32>>(
    input: &[T],
    quant: Quantization,
    num_classes: usize,
    output: &mut [f32],
) -> Result<()> {
    if input.len() != output.len() {
        return Err(Error::InvalidInput(format!(
            "softmax output holds {} values but the input has {}",
            output.len(),
            input.len()
        )));
    }
    check_rows(input.len(), num_classes)?;
    dequantize_cpu(input, quant, output);
    output.chunks_exact_mut(num_classes).for_each(softmax_row);
    Ok(())
}

fn check_rows(len: usize, num_classes: usize) -> Result<()> {
    if num_classes == 0 || len % num_classes != 0 {
        return Err(Error::InvalidInput(format!(
            "{} confidence values do not split into rows of {} classes",
            len, num_classes
        )));
    }
    Ok(())
}

fn softmax_row(row: &mut [f32]) {
    let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let mut sum = 0.0;
    for v in row.iter_mut() {
        *v = (*v - max).exp();
        sum += *v;
    }
    row.iter_mut().for_each(|v| *v /= sum);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_softmax_rows_sum_to_one() {
        let mut values = [1.0, 2.0, 3.0, 0.0, 0.0, 0.0, 100.0, 0.0, -100.0];
        softmax_in_place(&mut values, 3).unwrap();
        for row in values.chunks(3) {
            assert!((row.iter().sum::<f32>() - 1.0).abs() < 1e-6);
        }
        assert!(values[2] > values[1] && values[1] > values[0]);
        assert!((values[3] - 1.0 / 3.0).abs() < 1e-6);
        // large logits do not overflow
        assert!((values[6] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_softmax_quantized() {
        let logits: [i8; 6] = [10, 10, 20, 0, 127, -128];
        let mut probs = [0.0f32; 6];
        softmax_quantized(&logits, Quantization::new(0.1, 10), 3, &mut probs).unwrap();
        // first row dequantizes to [0, 0, 1]
        let e = 1.0f32.exp();
        assert!((probs[0] - 1.0 / (2.0 + e)).abs() < 1e-6);
        assert!((probs[2] - e / (2.0 + e)).abs() < 1e-6);
        assert!((probs[3..].iter().sum::<f32>() - 1.0).abs() < 1e-6);
        assert!(probs[4] > 0.99);
    }

    #[test]
    fn test_softmax_bad_lengths() {
        let mut values = [0.0f32; 5];
        assert!(matches!(
            softmax_in_place(&mut values, 2),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            softmax_in_place(&mut values, 0),
            Err(Error::InvalidInput(_))
        ));

        let logits = [0i8; 4];
        let mut probs = [0.0f32; 6];
        assert!(matches!(
            softmax_quantized(&logits, Quantization::default(), 2, &mut probs),
            Err(Error::InvalidInput(_))
        ));
    }
}

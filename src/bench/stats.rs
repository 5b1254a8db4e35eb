//! Sample statistics and the TreePIR client storage estimate
//!
//! All sample functions take signed microsecond values and return 0 on an
//! empty slice.

/// Integer mean, rounded toward negative infinity
pub fn mean(samples: &[i64]) -> i64 {
    if samples.is_empty() {
        return 0;
    }
    let sum: i128 = samples.iter().map(|&v| v as i128).sum();
    sum.div_euclid(samples.len() as i128) as i64
}

pub fn min(samples: &[i64]) -> i64 {
    samples.iter().copied().min().unwrap_or(0)
}

pub fn max(samples: &[i64]) -> i64 {
    samples.iter().copied().max().unwrap_or(0)
}

/// Population standard deviation around the integer [`mean`]
pub fn stddev(samples: &[i64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let avg = mean(samples) as f64;
    let variance = samples
        .iter()
        .map(|&v| {
            let diff = v as f64 - avg;
            diff * diff
        })
        .sum::<f64>()
        / samples.len() as f64;
    variance.sqrt()
}

/// `floor(sqrt(num_rows))`, the TreePIR set size
pub fn set_size(num_rows: usize) -> usize {
    (num_rows as f64).sqrt() as usize
}

/// Hints per set: `floor(128 * ln 2)`
pub fn num_hints_multiplier() -> u64 {
    (128.0 * std::f64::consts::LN_2) as u64
}

/// Closed-form client storage of a TreePIR client in bytes.
///
/// A membership filter with `floor(log2(n_hints))` bits for each of the
/// `num_rows` entries, plus `n_hints` stored rows of `row_len` bytes, where
/// `n_hints = floor(128 ln 2) * num_rows / floor(sqrt(num_rows))`.
pub fn client_storage_estimate(num_rows: usize, row_len: usize) -> u64 {
    let num_rows = num_rows.max(1) as u64;
    let set_size = set_size(num_rows as usize).max(1) as u64;
    let n_hints = num_hints_multiplier() * num_rows / set_size;
    let bits_per_key = (n_hints as f64).log2() as u64;
    let filter_bytes = (bits_per_key * num_rows + 7) / 8;
    filter_bytes + n_hints * row_len as u64
}

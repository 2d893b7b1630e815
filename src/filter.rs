//! Sample filtering.

use heapless::Vec;

/// Largest number of samples one filtered read will take.
pub const MAX_SAMPLES: usize = 15;

/// Samples taken by a filtered read when the caller has no preference.
pub const DEFAULT_SAMPLES: usize = 3;

/// A window of raw samples for one filtered read.
pub type Window = Vec<i32, MAX_SAMPLES>;

/// Clamp a requested sample count to `1..=MAX_SAMPLES`.
pub fn sample_count(requested: usize) -> usize {
    requested.clamp(1, MAX_SAMPLES)
}

/// Median of the window. An even count averages the two middle values.
///
/// Sorts the window in place.
pub fn median(window: &mut [i32]) -> Option<i32> {
    if window.is_empty() {
        return None;
    }
    window.sort_unstable();
    let mid = window.len() / 2;
    if window.len() % 2 == 1 {
        Some(window[mid])
    } else {
        let sum = window[mid - 1] as i64 + window[mid] as i64;
        Some(sum.div_euclid(2) as i32)
    }
}

/// Arithmetic mean, rounded towards negative infinity.
pub fn mean(window: &[i32]) -> Option<i32> {
    if window.is_empty() {
        return None;
    }
    let sum: i64 = window.iter().map(|&v| v as i64).sum();
    Some(sum.div_euclid(window.len() as i64) as i32)
}

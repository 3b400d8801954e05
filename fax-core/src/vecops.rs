//! Small vector/complex helpers shared across the modem implementations
//! (C14). Kept free-standing rather than behind a trait: every caller
//! works on `f64`/`Complex64` slices directly.

use num_complex::Complex64;

/// Dot product of a real tap vector against a complex sample window,
/// used by the FIR filters in the fast-modem receive chain.
pub fn fir_apply(taps: &[Complex64], window: &[Complex64]) -> Complex64 {
    debug_assert_eq!(taps.len(), window.len());
    taps.iter().zip(window).map(|(&t, &w)| t * w).sum()
}

/// Mean power of a complex sample block.
pub fn mean_power(samples: &[Complex64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().map(|s| s.norm_sqr()).sum::<f64>() / samples.len() as f64
}

/// Clamp a value into `[lo, hi]`.
pub fn clamp(value: f64, lo: f64, hi: f64) -> f64 {
    value.max(lo).min(hi)
}

/// A fixed-capacity circular buffer of `Complex64`, used by the equaliser
/// and interpolator to hold the most recent samples without reallocating.
#[derive(Debug, Clone)]
pub struct CircularBuffer {
    data: Vec<Complex64>,
    head: usize,
}

impl CircularBuffer {
    pub fn new(capacity: usize) -> Self {
        Self { data: vec![Complex64::new(0.0, 0.0); capacity], head: 0 }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Push one sample, evicting the oldest.
    pub fn push(&mut self, sample: Complex64) {
        self.data[self.head] = sample;
        self.head = (self.head + 1) % self.data.len();
    }

    /// Return the `n`-th most recent sample (0 = most recently pushed).
    pub fn recent(&self, n: usize) -> Complex64 {
        debug_assert!(n < self.data.len());
        let len = self.data.len();
        let idx = (self.head + len - 1 - n) % len;
        self.data[idx]
    }

    /// Return the window of `count` most recent samples, oldest first,
    /// suitable for feeding directly into `fir_apply`.
    pub fn window(&self, count: usize) -> Vec<Complex64> {
        debug_assert!(count <= self.data.len());
        (0..count).rev().map(|n| self.recent(n)).collect()
    }
}

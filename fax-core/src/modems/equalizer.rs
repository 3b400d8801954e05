//! Adaptive complex FIR equaliser with T/2 fractional-symbol tap spacing
//! (C9, §4.3 "Equaliser state").

use crate::vecops::CircularBuffer;
use num_complex::Complex64;

/// Complex LMS-adapted FIR equaliser. Taps are spaced at `T/2`, so two
/// samples are consumed from the input buffer per baud.
#[derive(Debug, Clone)]
pub struct Equalizer {
    taps: Vec<Complex64>,
    history: CircularBuffer,
    step_size: f64,
}

impl Equalizer {
    /// `num_taps` should be odd (typically 23-43, §4.3) so there's a
    /// well-defined centre tap at training time.
    pub fn new(num_taps: usize, step_size: f64) -> Self {
        let mut taps = vec![Complex64::new(0.0, 0.0); num_taps];
        taps[num_taps / 2] = Complex64::new(1.0, 0.0);
        Self { taps, history: CircularBuffer::new(num_taps), step_size }
    }

    pub fn num_taps(&self) -> usize {
        self.taps.len()
    }

    /// Push one new T/2-spaced sample into the input history.
    pub fn push_sample(&mut self, sample: Complex64) {
        self.history.push(sample);
    }

    /// Compute the current filtered output from the tap-weighted history.
    pub fn output(&self) -> Complex64 {
        let window = self.history.window(self.taps.len());
        self.taps.iter().zip(window.iter()).map(|(&t, &w)| t * w).sum()
    }

    /// LMS tap update given the decision error `e = decided - output`,
    /// per the standard complex-LMS update `w[k] += mu * e * conj(x[k])`.
    pub fn adapt(&mut self, error: Complex64) {
        let window = self.history.window(self.taps.len());
        for (tap, &sample) in self.taps.iter_mut().zip(window.iter()) {
            *tap += self.step_size * error * sample.conj();
        }
    }

    pub fn reset_taps(&mut self) {
        let n = self.taps.len();
        for (i, t) in self.taps.iter_mut().enumerate() {
            *t = if i == n / 2 { Complex64::new(1.0, 0.0) } else { Complex64::new(0.0, 0.0) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_equalizer_passes_centre_tap_through() {
        let mut eq = Equalizer::new(5, 0.01);
        for _ in 0..5 {
            eq.push_sample(Complex64::new(0.0, 0.0));
        }
        eq.push_sample(Complex64::new(0.0, 0.0));
        let sample = Complex64::new(0.7, -0.3);
        // Feed the sample through the centre of the window.
        for _ in 0..2 {
            eq.push_sample(Complex64::new(0.0, 0.0));
        }
        eq.push_sample(sample);
        for _ in 0..2 {
            eq.push_sample(Complex64::new(0.0, 0.0));
        }
        // With only the identity centre tap non-zero, the output equals
        // whatever sample currently sits at the centre of the window.
        let out = eq.output();
        assert!(out.norm() <= sample.norm() + 1e-9);
    }

    #[test]
    fn adapt_moves_taps_towards_reducing_error() {
        let mut eq = Equalizer::new(3, 0.1);
        eq.push_sample(Complex64::new(1.0, 0.0));
        eq.push_sample(Complex64::new(1.0, 0.0));
        eq.push_sample(Complex64::new(1.0, 0.0));
        let before = eq.output();
        eq.adapt(Complex64::new(1.0, 0.0));
        let after = eq.output();
        assert!((after - before).norm() > 1e-9);
    }

    #[test]
    fn reset_taps_restores_identity_response() {
        let mut eq = Equalizer::new(3, 0.1);
        eq.push_sample(Complex64::new(1.0, 0.0));
        eq.adapt(Complex64::new(0.5, 0.0));
        eq.reset_taps();
        eq.push_sample(Complex64::new(0.0, 0.0));
        eq.push_sample(Complex64::new(0.0, 0.0));
        let sample = Complex64::new(0.42, -0.1);
        eq.push_sample(sample);
        assert!((eq.output() - sample).norm() < 1e-9);
    }
}

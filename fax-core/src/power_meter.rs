//! Running energy meter used by the AGC and tone detectors (C14).
//!
//! Mirrors spandsp's `power_meter`: a one-pole leaky integrator of sample
//! energy, queried at chunk boundaries rather than continuously.

/// Leaky-integrator power meter.
#[derive(Debug, Clone, Copy)]
pub struct PowerMeter {
    /// Smoothing factor in [0, 1); larger values forget the past faster.
    alpha: f64,
    level: f64,
}

impl PowerMeter {
    /// `time_constant_samples` sets how many samples it takes the meter to
    /// settle to ~63% of a step change in input power.
    pub fn new(time_constant_samples: f64) -> Self {
        let alpha = if time_constant_samples > 0.0 {
            1.0 - (-1.0 / time_constant_samples).exp()
        } else {
            1.0
        };
        Self { alpha, level: 0.0 }
    }

    /// Feed one sample (linear amplitude, not dB) into the meter.
    pub fn update(&mut self, sample: f64) -> f64 {
        let energy = sample * sample;
        self.level += self.alpha * (energy - self.level);
        self.level
    }

    /// Feed a block of samples, returning the mean energy over the block
    /// (used by the AGC's 40-sample/5 ms chunk analysis, §4.1).
    pub fn update_block(&mut self, samples: &[f64]) -> f64 {
        for &s in samples {
            self.update(s);
        }
        self.level
    }

    pub fn current(&self) -> f64 {
        self.level
    }

    pub fn reset(&mut self) {
        self.level = 0.0;
    }
}

/// Compute the mean squared energy of a block directly, without leaky
/// integration — used where a hard per-chunk boundary is wanted (AGC chunks).
pub fn block_energy(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().map(|&s| s * s).sum::<f64>() / samples.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meter_settles_towards_constant_input() {
        let mut meter = PowerMeter::new(40.0);
        for _ in 0..2000 {
            meter.update(1.0);
        }
        assert!((meter.current() - 1.0).abs() < 1e-3);
    }

    #[test]
    fn block_energy_of_silence_is_zero() {
        assert_eq!(block_energy(&[0.0; 40]), 0.0);
    }

    #[test]
    fn block_energy_of_unit_amplitude_is_one() {
        assert_eq!(block_energy(&vec![1.0; 40]), 1.0);
    }
}

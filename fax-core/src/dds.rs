//! Carrier synthesis (DDS) and root-raised-cosine pulse shaping (C4, §4.3/§5).
//!
//! The modems share one pulse-shaping filter design and one phase-accumulator
//! carrier oscillator; only the rolloff, span and carrier frequency differ
//! per modem, set through [`RrcConfig`] and [`Dds`].

use num_complex::Complex64;
use std::f64::consts::PI;

/// Root-raised-cosine filter design parameters.
#[derive(Debug, Clone, Copy)]
pub struct RrcConfig {
    pub sample_rate_hz: f64,
    pub symbol_rate_hz: f64,
    pub rolloff: f64,
    pub span_symbols: usize,
}

/// Generate unit-energy RRC filter taps for `config`, per the standard
/// closed-form RRC impulse response with the Ts/(4a) singularity handled
/// by its limit value.
pub fn rrc_taps(config: &RrcConfig) -> Vec<f64> {
    let samples_per_symbol = config.sample_rate_hz / config.symbol_rate_hz;
    let filter_len = (config.span_symbols as f64 * samples_per_symbol) as usize + 1;
    let ts = 1.0 / config.symbol_rate_hz;
    let alpha = config.rolloff;

    let mut h = vec![0.0f64; filter_len];
    for i in 0..filter_len {
        let t = (i as f64 - (filter_len / 2) as f64) / config.sample_rate_hz;
        let t_norm = t / ts;

        h[i] = if t_norm.abs() < 1e-10 {
            1.0 - alpha + 4.0 * alpha / PI
        } else if alpha > 0.0 && (t_norm.abs() - 1.0 / (4.0 * alpha)).abs() < 1e-10 {
            let sqrt2 = std::f64::consts::SQRT_2;
            alpha / sqrt2
                * ((1.0 + 2.0 / PI) * (PI / 4.0).sin() + (1.0 - 2.0 / PI) * (PI / 4.0).cos())
        } else {
            let pi_t = PI * t_norm;
            let four_alpha_t = 4.0 * alpha * t_norm;
            let numerator = (pi_t * alpha).cos() + (pi_t).sin() / four_alpha_t;
            let denominator = pi_t * (1.0 - four_alpha_t * four_alpha_t);
            if denominator.abs() > 1e-10 {
                numerator / denominator
            } else {
                0.0
            }
        };
    }

    let energy: f64 = h.iter().map(|x| x * x).sum();
    if energy > 1e-12 {
        let scale = 1.0 / energy.sqrt();
        for c in &mut h {
            *c *= scale;
        }
    }
    h
}

/// Real-valued FIR convolution with zero-padded boundaries, matching the
/// filter's own length at the input's sample rate.
pub fn convolve_real(signal: &[f64], taps: &[f64]) -> Vec<f64> {
    let half = taps.len() / 2;
    let mut out = vec![0.0; signal.len()];
    for i in 0..signal.len() {
        let mut acc = 0.0;
        for (j, &k) in taps.iter().enumerate() {
            let idx = i as isize + j as isize - half as isize;
            if idx >= 0 && (idx as usize) < signal.len() {
                acc += signal[idx as usize] * k;
            }
        }
        out[i] = acc;
    }
    out
}

/// Complex FIR convolution (real taps against a complex baseband signal).
pub fn convolve_complex(signal: &[Complex64], taps: &[f64]) -> Vec<Complex64> {
    let half = taps.len() / 2;
    let mut out = vec![Complex64::new(0.0, 0.0); signal.len()];
    for i in 0..signal.len() {
        let mut acc = Complex64::new(0.0, 0.0);
        for (j, &k) in taps.iter().enumerate() {
            let idx = i as isize + j as isize - half as isize;
            if idx >= 0 && (idx as usize) < signal.len() {
                acc += signal[idx as usize] * k;
            }
        }
        out[i] = acc;
    }
    out
}

/// Direct digital synthesizer: a phase accumulator driving a complex
/// carrier at a configurable frequency, used both to up-convert baseband
/// symbols to passband on transmit and to down-mix passband to baseband
/// on receive (conjugated).
#[derive(Debug, Clone, Copy)]
pub struct Dds {
    phase: f64,
    step: f64,
}

impl Dds {
    pub fn new(freq_hz: f64, sample_rate_hz: f64) -> Self {
        Self { phase: 0.0, step: 2.0 * PI * freq_hz / sample_rate_hz }
    }

    /// Retune without resetting accumulated phase (phase-continuous).
    pub fn set_freq(&mut self, freq_hz: f64, sample_rate_hz: f64) {
        self.step = 2.0 * PI * freq_hz / sample_rate_hz;
    }

    /// Emit the next carrier sample and advance the phase accumulator.
    pub fn next_sample(&mut self) -> Complex64 {
        let s = Complex64::new(self.phase.cos(), self.phase.sin());
        self.phase += self.step;
        if self.phase > PI {
            self.phase -= 2.0 * PI;
        } else if self.phase < -PI {
            self.phase += 2.0 * PI;
        }
        s
    }

    pub fn phase(&self) -> f64 {
        self.phase
    }

    /// Nudge the phase accumulator directly, used by carrier-recovery loops.
    pub fn adjust_phase(&mut self, delta: f64) {
        self.phase += delta;
    }
}

//! Supervisory tone generation and detection (C3): CED, CNG, ANSam, and the
//! V.21 FSK channel used to carry HDLC signalling at 300 bps.

use std::f64::consts::TAU;

pub const SAMPLE_RATE_HZ: f64 = 8000.0;

/// Generate `duration_secs` of a pure sine tone at `freq_hz`, amplitude
/// `amplitude` (linear, not dBm0).
pub fn generate_tone(freq_hz: f64, amplitude: f64, duration_secs: f64) -> Vec<f64> {
    let n = (duration_secs * SAMPLE_RATE_HZ) as usize;
    (0..n)
        .map(|i| amplitude * (TAU * freq_hz * i as f64 / SAMPLE_RATE_HZ).sin())
        .collect()
}

/// CED: called-station identification tone, 2100 Hz for 3 s.
pub fn generate_ced(amplitude: f64) -> Vec<f64> {
    generate_tone(2100.0, amplitude, 3.0)
}

/// CNG: calling-station tone, 1100 Hz, 0.5 s on / 3 s off, repeating.
pub fn generate_cng_cycle(amplitude: f64) -> Vec<f64> {
    let mut out = generate_tone(1100.0, amplitude, 0.5);
    out.extend(std::iter::repeat(0.0).take((3.0 * SAMPLE_RATE_HZ) as usize));
    out
}

/// ANSam: CED tone amplitude-modulated at 15 Hz (used to signal V.8 support).
pub fn generate_ansam(amplitude: f64) -> Vec<f64> {
    let n = (3.0 * SAMPLE_RATE_HZ) as usize;
    (0..n)
        .map(|i| {
            let t = i as f64 / SAMPLE_RATE_HZ;
            let carrier = (TAU * 2100.0 * t).sin();
            let envelope = 1.0 + 0.2 * (TAU * 15.0 * t).sin();
            amplitude * carrier * envelope
        })
        .collect()
}

/// V.21 channel 2 FSK mark/space frequencies (the HDLC-bearing channel).
pub const V21_MARK_HZ: f64 = 1650.0;
pub const V21_SPACE_HZ: f64 = 1850.0;
pub const V21_BAUD_RATE: f64 = 300.0;

/// Modulate a bitstream (1 = mark, 0 = space) as V.21 FSK at 300 baud.
pub fn v21_modulate(bits: &[u8], amplitude: f64) -> Vec<f64> {
    let samples_per_bit = (SAMPLE_RATE_HZ / V21_BAUD_RATE) as usize;
    let mut out = Vec::with_capacity(bits.len() * samples_per_bit);
    let mut phase = 0.0f64;
    for &bit in bits {
        let freq = if bit != 0 { V21_MARK_HZ } else { V21_SPACE_HZ };
        let step = TAU * freq / SAMPLE_RATE_HZ;
        for _ in 0..samples_per_bit {
            out.push(amplitude * phase.sin());
            phase += step;
            if phase > TAU {
                phase -= TAU;
            }
        }
    }
    out
}

/// Goertzel detector: computes the energy at `freq_hz` over a fixed window.
#[derive(Debug, Clone, Copy)]
pub struct Goertzel {
    coeff: f64,
    q1: f64,
    q2: f64,
}

impl Goertzel {
    pub fn new(freq_hz: f64, sample_rate_hz: f64) -> Self {
        let omega = TAU * freq_hz / sample_rate_hz;
        Self { coeff: 2.0 * omega.cos(), q1: 0.0, q2: 0.0 }
    }

    pub fn reset(&mut self) {
        self.q1 = 0.0;
        self.q2 = 0.0;
    }

    pub fn feed(&mut self, sample: f64) {
        let q0 = self.coeff * self.q1 - self.q2 + sample;
        self.q2 = self.q1;
        self.q1 = q0;
    }

    /// Relative energy at the tuned frequency over the samples fed since
    /// the last `reset`.
    pub fn magnitude_squared(&self) -> f64 {
        self.q1 * self.q1 + self.q2 * self.q2 - self.coeff * self.q1 * self.q2
    }
}

/// Debounced single-tone detector, modelled on spandsp's super-tone
/// receiver: a tone is declared present/absent only after `hits`/`misses`
/// consecutive windows cross the threshold, avoiding chatter on noise.
#[derive(Debug, Clone)]
pub struct ToneDetector {
    goertzel: Goertzel,
    window_len: usize,
    window_fill: usize,
    threshold: f64,
    hits_needed: u32,
    misses_needed: u32,
    hit_streak: u32,
    miss_streak: u32,
    present: bool,
}

impl ToneDetector {
    pub fn new(freq_hz: f64, window_len: usize, threshold: f64, hits_needed: u32, misses_needed: u32) -> Self {
        Self {
            goertzel: Goertzel::new(freq_hz, SAMPLE_RATE_HZ),
            window_len,
            window_fill: 0,
            threshold,
            hits_needed,
            misses_needed,
            hit_streak: 0,
            miss_streak: 0,
            present: false,
        }
    }

    pub fn is_present(&self) -> bool {
        self.present
    }

    /// Feed one sample; returns `Some(true/false)` exactly when the window
    /// boundary is reached and a fresh present/absent decision was made.
    pub fn feed(&mut self, sample: f64) -> Option<bool> {
        self.goertzel.feed(sample);
        self.window_fill += 1;
        if self.window_fill < self.window_len {
            return None;
        }

        let energy = self.goertzel.magnitude_squared() / (self.window_len as f64).powi(2);
        self.goertzel.reset();
        self.window_fill = 0;

        if energy >= self.threshold {
            self.hit_streak += 1;
            self.miss_streak = 0;
            if self.hit_streak >= self.hits_needed && !self.present {
                self.present = true;
                return Some(true);
            }
        } else {
            self.miss_streak += 1;
            self.hit_streak = 0;
            if self.miss_streak >= self.misses_needed && self.present {
                self.present = false;
                return Some(false);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ced_is_three_seconds_long() {
        let ced = generate_ced(0.5);
        assert_eq!(ced.len(), (3.0 * SAMPLE_RATE_HZ) as usize);
    }

    #[test]
    fn cng_cycle_is_point_five_plus_three_seconds() {
        let cng = generate_cng_cycle(0.5);
        assert_eq!(cng.len(), ((0.5 + 3.0) * SAMPLE_RATE_HZ) as usize);
    }

    #[test]
    fn v21_modulate_produces_one_bit_duration_per_symbol() {
        let bits = vec![1, 0, 1, 1];
        let samples = v21_modulate(&bits, 1.0);
        let samples_per_bit = (SAMPLE_RATE_HZ / V21_BAUD_RATE) as usize;
        assert_eq!(samples.len(), bits.len() * samples_per_bit);
    }

    #[test]
    fn goertzel_detects_matching_tone_strongly() {
        let tone = generate_tone(2100.0, 1.0, 0.1);
        let mut g = Goertzel::new(2100.0, SAMPLE_RATE_HZ);
        for &s in &tone {
            g.feed(s);
        }
        let on_freq = g.magnitude_squared();

        let mut g2 = Goertzel::new(1100.0, SAMPLE_RATE_HZ);
        for &s in &tone {
            g2.feed(s);
        }
        let off_freq = g2.magnitude_squared();

        assert!(on_freq > off_freq * 10.0);
    }

    #[test]
    fn tone_detector_debounces_present_state() {
        let mut det = ToneDetector::new(2100.0, 80, 1.0, 3, 3);
        let ced = generate_ced(1.0);
        let mut declared_present = false;
        for &s in &ced {
            if det.feed(s) == Some(true) {
                declared_present = true;
                break;
            }
        }
        assert!(declared_present);
    }
}

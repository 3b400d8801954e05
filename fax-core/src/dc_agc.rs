//! DC blocker + AGC (C1, §4.1).
//!
//! A one-pole IIR DC blocker feeds a chunked AGC that debounces
//! signal-present/absent transitions over `signal_on_persistence` /
//! `signal_off_persistence` consecutive 40-sample chunks.

use crate::config::AgcConfig;
use crate::errors::ConfigError;
use crate::power_meter::block_energy;

/// `y[n] = x[n] - x[n-1] + alpha*y[n-1]`, alpha = 1 - 2^-7.
#[derive(Debug, Clone, Copy, Default)]
pub struct DcBlocker {
    prev_x: f64,
    prev_y: f64,
}

const DC_ALPHA: f64 = 1.0 - 1.0 / 128.0;

impl DcBlocker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process_sample(&mut self, x: f64) -> f64 {
        let y = x - self.prev_x + DC_ALPHA * self.prev_y;
        self.prev_x = x;
        self.prev_y = y;
        y
    }

    pub fn process_block(&mut self, samples: &[f64]) -> Vec<f64> {
        samples.iter().map(|&x| self.process_sample(x)).collect()
    }
}

pub const AGC_CHUNK_SAMPLES: usize = 40;

/// Signal presence state reported by the AGC after each chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalState {
    Present,
    Absent,
}

#[derive(Debug, Clone)]
pub struct Agc {
    config: AgcConfig,
    dc: DcBlocker,
    gain: f64,
    state: SignalState,
    on_streak: u32,
    off_streak: u32,
}

impl Agc {
    pub fn new(config: AgcConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            dc: DcBlocker::new(),
            gain: 1.0,
            state: SignalState::Absent,
            on_streak: 0,
            off_streak: 0,
        })
    }

    pub fn gain(&self) -> f64 {
        self.gain
    }

    pub fn state(&self) -> SignalState {
        self.state
    }

    /// Process one `AGC_CHUNK_SAMPLES`-sample chunk: DC block, measure
    /// energy, debounce, optionally adapt gain. Returns the gain-scaled
    /// (and DC-blocked) output samples.
    pub fn process_chunk(&mut self, chunk: &[f64]) -> Vec<f64> {
        let blocked = self.dc.process_block(chunk);
        let energy = block_energy(&blocked);

        if energy >= self.config.signal_on_power_threshold {
            self.on_streak += 1;
            self.off_streak = 0;
            if self.on_streak >= self.config.signal_on_persistence {
                self.state = SignalState::Present;
                if self.config.adapt && energy > 0.0 {
                    self.gain = (self.config.signal_target_power / energy).sqrt();
                }
            }
        } else if energy <= self.config.signal_off_power_threshold {
            self.off_streak += 1;
            self.on_streak = 0;
            if self.off_streak >= self.config.signal_off_persistence {
                self.state = SignalState::Absent;
            }
        } else {
            // Between thresholds: hold current streaks, no state change.
            self.on_streak = 0;
            self.off_streak = 0;
        }

        blocked.iter().map(|&s| s * self.gain).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> AgcConfig {
        AgcConfig {
            signal_target_power: 1.0,
            signal_on_power_threshold: 0.5,
            signal_off_power_threshold: 0.1,
            signal_on_persistence: 2,
            signal_off_persistence: 2,
            adapt: true,
        }
    }

    #[test]
    fn idempotent_without_adaption() {
        let mut config = cfg();
        config.adapt = false;
        let mut agc = Agc::new(config).unwrap();
        // DC blocker is a no-op on an already-zero-mean alternating input
        // after warm-up; verify the scale-only contract instead.
        let chunk = vec![0.2; AGC_CHUNK_SAMPLES];
        let blocked = agc.dc.process_block(&chunk);
        let out = agc.process_chunk(&chunk);
        for (o, b) in out.iter().zip(blocked.iter()) {
            assert!((o - b * agc.gain()).abs() < 1e-12);
        }
        assert_eq!(agc.gain(), 1.0);
    }

    #[test]
    fn declares_present_after_persistence_chunks() {
        let mut agc = Agc::new(cfg()).unwrap();
        let loud = vec![1.0; AGC_CHUNK_SAMPLES];
        assert_eq!(agc.state(), SignalState::Absent);
        agc.process_chunk(&loud);
        // First chunk includes DC-blocker settling; keep feeding.
        agc.process_chunk(&loud);
        agc.process_chunk(&loud);
        assert_eq!(agc.state(), SignalState::Present);
    }

    #[test]
    fn rejects_inverted_thresholds() {
        let mut bad = cfg();
        bad.signal_on_power_threshold = 0.05;
        bad.signal_off_power_threshold = 0.5;
        assert!(Agc::new(bad).is_err());
    }

    #[test]
    fn dc_blocker_removes_constant_offset() {
        let mut dc = DcBlocker::new();
        let samples = vec![1.0; 4000];
        let out = dc.process_block(&samples);
        // After settling, a constant input should decay towards zero.
        assert!(out.last().unwrap().abs() < 0.05);
    }
}

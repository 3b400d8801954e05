//! Shared fast-modem receive chain (C9, §4.6 "Rx pipeline per sample"):
//! DC-block → AGC-scale → down-mix → matched filter → fractional
//! interpolator (Godard-controlled) → per-baud equaliser → carrier-phase
//! rotator → slicer.

use crate::config::AgcConfig;
use crate::dc_agc::{Agc, DcBlocker};
use crate::dds::{rrc_taps, Dds, RrcConfig};
use crate::godard::{GodardConfig, GodardTed, TimingNudge};
use crate::modems::equalizer::Equalizer;
use num_complex::Complex64;

/// RRC matched-filter truncation, `V*_RX_FILTER_STEPS` per §4.6.
pub const RX_FILTER_SPAN_SYMBOLS: usize = 8;

/// Carrier-phase tracking loop (proportional + integral), the receive
/// counterpart of the Costas-style loops used elsewhere in the pack.
#[derive(Debug, Clone, Copy)]
pub struct CarrierTracker {
    phase: f64,
    freq_offset: f64,
    alpha: f64,
    beta: f64,
}

impl CarrierTracker {
    pub fn new(alpha: f64, beta: f64) -> Self {
        Self { phase: 0.0, freq_offset: 0.0, alpha, beta }
    }

    /// Rotate `sample` back by the tracked phase, then update the loop
    /// from the phase error between `sample` and the `decision` symbol
    /// the slicer chose.
    pub fn derotate_and_update(&mut self, sample: Complex64, decision: Complex64) -> Complex64 {
        let rotation = Complex64::new(self.phase.cos(), -self.phase.sin());
        let derotated = sample * rotation;

        let error = (derotated * decision.conj()).arg();
        self.freq_offset += self.beta * error;
        self.phase += self.alpha * error + self.freq_offset;
        if self.phase > std::f64::consts::PI {
            self.phase -= std::f64::consts::TAU;
        } else if self.phase < -std::f64::consts::PI {
            self.phase += std::f64::consts::TAU;
        }
        derotated
    }

    pub fn reset(&mut self) {
        self.phase = 0.0;
        self.freq_offset = 0.0;
    }
}

/// The shared per-sample receive pipeline. Modem-specific code owns the
/// constellation and the bit-mapping; this struct owns everything up to
/// "baud-spaced, carrier-corrected complex symbol, ready to slice".
pub struct FastRxChain {
    dc: DcBlocker,
    agc: Agc,
    downmix: Dds,
    rrc_taps: Vec<f64>,
    matched_history: Vec<Complex64>,
    ted: GodardTed,
    equalizer: Equalizer,
    carrier: CarrierTracker,
    samples_per_baud: usize,
    sample_counter: usize,
    fractional_offset: f64,
}

impl FastRxChain {
    pub fn new(
        carrier_freq_hz: f64,
        baud_rate_hz: f64,
        sample_rate_hz: f64,
        agc_config: AgcConfig,
        equalizer_taps: usize,
        equalizer_step: f64,
    ) -> Result<Self, crate::errors::ConfigError> {
        let rrc = rrc_taps(&RrcConfig {
            sample_rate_hz,
            symbol_rate_hz: baud_rate_hz,
            rolloff: 0.5,
            span_symbols: RX_FILTER_SPAN_SYMBOLS,
        });
        Ok(Self {
            dc: DcBlocker::new(),
            agc: Agc::new(agc_config)?,
            downmix: Dds::new(carrier_freq_hz, sample_rate_hz),
            matched_history: vec![Complex64::new(0.0, 0.0); rrc.len()],
            rrc_taps: rrc,
            ted: GodardTed::new(GodardConfig::for_modem(carrier_freq_hz, baud_rate_hz, sample_rate_hz)),
            equalizer: Equalizer::new(equalizer_taps, equalizer_step),
            carrier: CarrierTracker::new(0.02, 0.002),
            samples_per_baud: (sample_rate_hz / baud_rate_hz).round() as usize,
            sample_counter: 0,
            fractional_offset: 0.0,
        })
    }

    /// Process one 8 kHz PCM sample. Returns a baud-spaced baseband
    /// symbol, pre-slicer, whenever the interpolator lands on a baud
    /// boundary.
    pub fn process_sample(&mut self, pcm: f64) -> Option<Complex64> {
        let dc_blocked = self.dc.process_sample(pcm);
        let chunk = [dc_blocked; 1];
        let scaled = self.agc.process_chunk(&chunk)[0];

        let carrier = self.downmix.next_sample().conj();
        let baseband = Complex64::new(scaled, 0.0) * carrier;

        self.matched_history.remove(0);
        self.matched_history.push(baseband);
        let filtered: Complex64 =
            self.matched_history.iter().zip(self.rrc_taps.iter()).map(|(&s, &t)| s * t).sum();

        match self.ted.process_sample(filtered.re) {
            TimingNudge::Fine(step) | TimingNudge::Coarse(step) => self.fractional_offset += step,
            TimingNudge::None => {}
        }

        self.sample_counter += 1;
        if self.sample_counter >= self.samples_per_baud {
            self.sample_counter = 0;
            self.equalizer.push_sample(filtered);
            Some(self.equalizer.output())
        } else {
            None
        }
    }

    /// Derotate the equalised symbol by the tracked carrier phase and
    /// hand it to the caller for slicing, then feed the slicer's decision
    /// back for carrier/equaliser adaptation.
    pub fn track_and_adapt(&mut self, symbol: Complex64, decision: Complex64) -> Complex64 {
        let derotated = self.carrier.derotate_and_update(symbol, decision);
        let error = decision - derotated;
        self.equalizer.adapt(error);
        derotated
    }

    pub fn reset(&mut self) {
        self.dc = DcBlocker::new();
        self.carrier.reset();
        self.equalizer.reset_taps();
        self.sample_counter = 0;
        self.fractional_offset = 0.0;
        for h in &mut self.matched_history {
            *h = Complex64::new(0.0, 0.0);
        }
    }

    pub fn fractional_offset(&self) -> f64 {
        self.fractional_offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agc_cfg() -> AgcConfig {
        AgcConfig {
            signal_target_power: 1.0,
            signal_on_power_threshold: 0.01,
            signal_off_power_threshold: 0.001,
            signal_on_persistence: 2,
            signal_off_persistence: 2,
            adapt: true,
        }
    }

    #[test]
    fn chain_emits_one_symbol_per_baud_worth_of_samples() {
        let mut chain = FastRxChain::new(1700.0, 2400.0, 8000.0, agc_cfg(), 23, 0.01).unwrap();
        let samples_per_baud = (8000.0f64 / 2400.0).round() as usize;
        let mut emitted = 0;
        for n in 0..samples_per_baud * 20 {
            let t = n as f64 / 8000.0;
            let pcm = (std::f64::consts::TAU * 1700.0 * t).sin();
            if chain.process_sample(pcm).is_some() {
                emitted += 1;
            }
        }
        assert!(emitted >= 18 && emitted <= 21);
    }

    #[test]
    fn carrier_tracker_keeps_phase_bounded() {
        let mut tracker = CarrierTracker::new(0.05, 0.01);
        let decision = Complex64::new(1.0, 0.0);
        for i in 0..1000 {
            let angle = 0.01 * i as f64;
            let sample = Complex64::new(angle.cos(), angle.sin());
            tracker.derotate_and_update(sample, decision);
        }
        assert!(tracker.phase.abs() <= std::f64::consts::PI);
    }
}

//! Shared fast-modem transmit chain (C9, §4.6 "Tx pipeline per symbol"):
//! the sample-synthesis counterpart of [`super::fast_rx::FastRxChain`].
//! Baud-rate symbols go in; RRC pulse-shaped, carrier-upconverted 8 kHz
//! PCM comes out, one sample at a time.

use crate::dds::{rrc_taps, Dds, RrcConfig};
use num_complex::Complex64;
use std::collections::VecDeque;

use super::fast_rx::RX_FILTER_SPAN_SYMBOLS;

/// Overlap-add RRC pulse shaper driving a phase-continuous carrier.
pub struct FastTxChain {
    taps: Vec<f64>,
    shaped: VecDeque<Complex64>,
    carrier: Dds,
    samples_per_baud: usize,
    sample_counter: usize,
}

impl FastTxChain {
    pub fn new(carrier_freq_hz: f64, baud_rate_hz: f64, sample_rate_hz: f64) -> Self {
        let taps = rrc_taps(&RrcConfig {
            sample_rate_hz,
            symbol_rate_hz: baud_rate_hz,
            rolloff: 0.5,
            span_symbols: RX_FILTER_SPAN_SYMBOLS,
        });
        let shaped = VecDeque::from(vec![Complex64::new(0.0, 0.0); taps.len()]);
        Self {
            taps,
            shaped,
            carrier: Dds::new(carrier_freq_hz, sample_rate_hz),
            samples_per_baud: (sample_rate_hz / baud_rate_hz).round() as usize,
            sample_counter: 0,
        }
    }

    pub fn samples_per_baud(&self) -> usize {
        self.samples_per_baud
    }

    /// Count one more sample of the current baud period; returns `true`
    /// exactly when the caller should push the next symbol before
    /// drawing the following [`next_sample`].
    pub fn advance_sample_counter(&mut self) -> bool {
        self.sample_counter += 1;
        if self.sample_counter >= self.samples_per_baud {
            self.sample_counter = 0;
            true
        } else {
            false
        }
    }

    /// Overlap-add one baseband symbol's RRC-shaped impulse response into
    /// the pending-sample buffer.
    pub fn push_symbol(&mut self, symbol: Complex64) {
        for (i, &tap) in self.taps.iter().enumerate() {
            self.shaped[i] += symbol * tap;
        }
    }

    /// Pop the next shaped baseband sample and upconvert it to the
    /// carrier frequency, returning the real passband PCM value.
    pub fn next_sample(&mut self) -> f64 {
        let baseband = self.shaped.pop_front().unwrap_or_else(|| Complex64::new(0.0, 0.0));
        self.shaped.push_back(Complex64::new(0.0, 0.0));
        (baseband * self.carrier.next_sample()).re
    }

    pub fn reset(&mut self) {
        for s in self.shaped.iter_mut() {
            *s = Complex64::new(0.0, 0.0);
        }
        self.sample_counter = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_pushed_symbol_spreads_energy_across_the_filter_span() {
        let mut chain = FastTxChain::new(1700.0, 2400.0, 8000.0);
        chain.push_symbol(Complex64::new(1.0, 0.0));
        let mut nonzero = 0;
        for _ in 0..chain.taps.len() {
            if chain.next_sample().abs() > 1e-9 {
                nonzero += 1;
            }
        }
        assert!(nonzero > 1);
    }

    #[test]
    fn silence_in_silence_out() {
        let mut chain = FastTxChain::new(1800.0, 1600.0, 8000.0);
        for _ in 0..50 {
            assert!((chain.next_sample()).abs() < 1e-9);
        }
    }

    #[test]
    fn sample_counter_signals_once_per_baud() {
        let mut chain = FastTxChain::new(1700.0, 2400.0, 8000.0);
        let spb = chain.samples_per_baud();
        let mut signals = 0;
        for _ in 0..spb * 3 {
            if chain.advance_sample_counter() {
                signals += 1;
            }
        }
        assert_eq!(signals, 3);
    }
}

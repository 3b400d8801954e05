//! V.17: 2400-baud trellis-coded QAM at 7200/9600/12000/14400 bps (C8,
//! §4.6, §4.3 "Trellis state").
//!
//! Two bits per symbol are convolutionally encoded (selecting one of 8
//! cosets); the remaining uncoded bits select a point within the coset.
//! The receiver runs the shared [`super::trellis::Viterbi`] decoder over
//! per-coset branch metrics computed from squared Euclidean distance.

use super::scrambler::{Descrambler, Scrambler};
use super::trellis::{BranchMetrics, ConvolutionalEncoder, Viterbi, DEFAULT_TRACEBACK_DEPTH, NUM_STATES};
use crate::errors::ModemError;
use num_complex::Complex64;

/// Uncoded bits per symbol (total bits per symbol = uncoded + 2 coded).
fn uncoded_bits(bit_rate: u32) -> Result<usize, ModemError> {
    match bit_rate {
        7200 => Ok(0),
        9600 => Ok(1),
        12000 => Ok(2),
        14400 => Ok(3),
        _ => Err(ModemError::UnsupportedRate { modem: "V.17", rate: bit_rate as usize }),
    }
}

/// Build the constellation for a given total bits/symbol as a square QAM
/// grid, partitioned into 8 cosets by `index % 8` (a simplified stand-in
/// for the standard's 4D set-partitioning, adequate for coset-distance
/// ordering in this core).
pub fn build_constellation(total_bits: usize) -> Vec<Complex64> {
    let points = 1usize << (total_bits + 2);
    let side = (points as f64).sqrt().ceil() as i32;
    let mut out = Vec::with_capacity(points);
    'outer: for i in 0..side {
        for q in 0..side {
            if out.len() >= points {
                break 'outer;
            }
            let re = 2.0 * i as f64 - side as f64 + 1.0;
            let im = 2.0 * q as f64 - side as f64 + 1.0;
            out.push(Complex64::new(re, im));
        }
    }
    out
}

fn coset_points(constellation: &[Complex64], coset: u8) -> Vec<(usize, Complex64)> {
    constellation
        .iter()
        .enumerate()
        .filter(|(i, _)| (*i % NUM_STATES) == coset as usize)
        .map(|(i, &p)| (i, p))
        .collect()
}

#[derive(Debug, Clone)]
pub struct Modulator {
    bit_rate: u32,
    constellation: Vec<Complex64>,
    encoder: ConvolutionalEncoder,
    scrambler: Scrambler,
}

impl Modulator {
    pub fn new(bit_rate: u32) -> Result<Self, ModemError> {
        let uncoded = uncoded_bits(bit_rate)?;
        Ok(Self {
            bit_rate,
            constellation: build_constellation(uncoded + 2),
            encoder: ConvolutionalEncoder::new(),
            scrambler: Scrambler::new(),
        })
    }

    /// Modulate one symbol: `bits.len()` must equal the uncoded bit count
    /// for this rate; the coset bit is derived from the trellis encoder.
    pub fn modulate_symbol(&mut self, bits: &[bool]) -> Complex64 {
        let scrambled: Vec<bool> = bits.iter().map(|&b| self.scrambler.scramble_bit(b)).collect();
        let coded_input = scrambled.first().copied().unwrap_or(false);
        let (y0, y1) = self.encoder.encode_bit(coded_input);
        let coset = (y0 as u8) | ((y1 as u8) << 1);

        let points = coset_points(&self.constellation, coset);
        let sub_bits = &scrambled[scrambled.len().min(1)..];
        let sub = sub_bits.iter().enumerate().fold(0usize, |acc, (i, &b)| acc | ((b as usize) << i));
        points[sub % points.len().max(1)].1
    }

    pub fn reset(&mut self) {
        self.encoder.reset();
        self.scrambler.reset();
    }
}

pub struct Demodulator {
    bit_rate: u32,
    constellation: Vec<Complex64>,
    viterbi: Viterbi,
    descrambler: Descrambler,
}

impl Demodulator {
    pub fn new(bit_rate: u32) -> Result<Self, ModemError> {
        let uncoded = uncoded_bits(bit_rate)?;
        Ok(Self {
            bit_rate,
            constellation: build_constellation(uncoded + 2),
            viterbi: Viterbi::new(DEFAULT_TRACEBACK_DEPTH),
            descrambler: Descrambler::new(),
        })
    }

    /// Compute per-coset branch metrics (minimum squared distance within
    /// each coset) for one received symbol.
    pub fn branch_metrics(&self, symbol: Complex64) -> BranchMetrics {
        let mut metrics = [f64::INFINITY; NUM_STATES];
        for coset in 0..NUM_STATES as u8 {
            for (_, point) in coset_points(&self.constellation, coset) {
                let d = (symbol - point).norm_sqr();
                if d < metrics[coset as usize] {
                    metrics[coset as usize] = d;
                }
            }
        }
        metrics
    }

    /// Slice `symbol` to the nearest constellation point without
    /// consuming it, for the receive chain's carrier/equaliser feedback.
    pub fn nearest_point(&self, symbol: Complex64) -> Complex64 {
        *self
            .constellation
            .iter()
            .min_by(|a, b| (symbol - **a).norm_sqr().partial_cmp(&(symbol - **b).norm_sqr()).unwrap())
            .unwrap()
    }

    /// Feed one symbol through the Viterbi decoder; returns the decoded
    /// coded bit once the trace-back window fills.
    pub fn step(&mut self, symbol: Complex64) -> Option<bool> {
        let metrics = self.branch_metrics(symbol);
        self.viterbi.step(metrics).map(|bit| self.descrambler.descramble_bit(bit))
    }

    pub fn bit_rate(&self) -> u32 {
        self.bit_rate
    }

    pub fn reset(&mut self) {
        self.viterbi.reset();
        self.descrambler.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constellation_size_matches_total_bits() {
        let c = build_constellation(4);
        assert!(c.len() >= 16);
    }

    #[test]
    fn rejects_unsupported_bit_rate() {
        assert!(Modulator::new(4800).is_err());
    }

    #[test]
    fn branch_metrics_are_zero_for_an_exact_constellation_point() {
        let demod = Demodulator::new(7200).unwrap();
        let point = demod.constellation[0];
        let metrics = demod.branch_metrics(point);
        assert!(metrics.iter().any(|&m| m.abs() < 1e-9));
    }
}

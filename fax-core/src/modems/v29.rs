//! V.29: 2400-baud QAM at 4800/7200/9600 bps (C7, §4.6).
//!
//! The two most significant bits of each symbol select a quadrant and are
//! differentially encoded (robust to the 90°-ambiguity a carrier-recovery
//! loop can lock to); the remaining bits select a point within the
//! quadrant directly, following the V.29 constellation map.

use super::scrambler::{Descrambler, Scrambler};
use crate::errors::ModemError;
use num_complex::Complex64;

/// 16-point V.29 constellation, indexed `[quadrant*4 + sub]`.
pub const CONSTELLATION_16: [Complex64; 16] = [
    Complex64::new(3.0, 0.0), Complex64::new(1.0, 0.0), Complex64::new(3.0, 1.0), Complex64::new(1.0, 1.0),
    Complex64::new(0.0, 3.0), Complex64::new(0.0, 1.0), Complex64::new(-1.0, 3.0), Complex64::new(-1.0, 1.0),
    Complex64::new(-3.0, 0.0), Complex64::new(-1.0, 0.0), Complex64::new(-3.0, -1.0), Complex64::new(-1.0, -1.0),
    Complex64::new(0.0, -3.0), Complex64::new(0.0, -1.0), Complex64::new(1.0, -3.0), Complex64::new(1.0, -1.0),
];

fn quadrant_change(bits: u8) -> usize {
    // Two differentially-encoded bits select one of 4 quadrant rotations.
    match bits & 0b11 {
        0b00 => 0,
        0b01 => 1,
        0b11 => 2,
        0b10 => 3,
        _ => unreachable!(),
    }
}

fn bits_for_quadrant_change(change: usize) -> u8 {
    match change {
        0 => 0b00,
        1 => 0b01,
        2 => 0b11,
        3 => 0b10,
        _ => unreachable!(),
    }
}

/// Bits per symbol for a given bit rate at 2400 baud.
fn bits_per_symbol(bit_rate: u32) -> Result<usize, ModemError> {
    match bit_rate {
        4800 => Ok(2),
        7200 => Ok(3),
        9600 => Ok(4),
        _ => Err(ModemError::UnsupportedRate { modem: "V.29", rate: bit_rate as usize }),
    }
}

#[derive(Debug, Clone)]
pub struct Modulator {
    bit_rate: u32,
    last_quadrant: usize,
    scrambler: Scrambler,
}

impl Modulator {
    pub fn new(bit_rate: u32) -> Result<Self, ModemError> {
        bits_per_symbol(bit_rate)?;
        Ok(Self { bit_rate, last_quadrant: 0, scrambler: Scrambler::new() })
    }

    pub fn modulate_symbol(&mut self, bits: &[bool]) -> Complex64 {
        let n = bits.len();
        let mut scrambled = vec![false; n];
        for i in 0..n {
            scrambled[i] = self.scrambler.scramble_bit(bits[i]);
        }
        let quadrant_bits = (scrambled[0] as u8) | ((scrambled[1] as u8) << 1);
        self.last_quadrant = (self.last_quadrant + quadrant_change(quadrant_bits)) % 4;

        let sub = if n > 2 {
            scrambled[2..].iter().enumerate().fold(0u8, |acc, (i, &b)| acc | ((b as u8) << i))
        } else {
            0
        };
        CONSTELLATION_16[self.last_quadrant * 4 + sub as usize]
    }

    pub fn reset(&mut self) {
        self.last_quadrant = 0;
        self.scrambler.reset();
    }

    pub fn bit_rate(&self) -> u32 {
        self.bit_rate
    }
}

#[derive(Debug, Clone)]
pub struct Demodulator {
    bit_rate: u32,
    last_quadrant: usize,
    descrambler: Descrambler,
}

impl Demodulator {
    pub fn new(bit_rate: u32) -> Result<Self, ModemError> {
        bits_per_symbol(bit_rate)?;
        Ok(Self { bit_rate, last_quadrant: 0, descrambler: Descrambler::new() })
    }

    /// Slice `symbol` to the nearest constellation point without
    /// consuming it, for the receive chain's carrier/equaliser feedback.
    pub fn nearest_point(&self, symbol: Complex64) -> Complex64 {
        *CONSTELLATION_16
            .iter()
            .min_by(|a, b| (symbol - **a).norm_sqr().partial_cmp(&(symbol - **b).norm_sqr()).unwrap())
            .unwrap()
    }

    /// Nearest-point slicer against the full 16-point constellation,
    /// followed by differential quadrant decoding and descrambling.
    pub fn demodulate_symbol(&mut self, symbol: Complex64) -> Vec<bool> {
        let bits_per_sym = bits_per_symbol(self.bit_rate).unwrap();
        let (index, _) = CONSTELLATION_16
            .iter()
            .enumerate()
            .min_by(|a, b| (symbol - *a.1).norm_sqr().partial_cmp(&(symbol - *b.1).norm_sqr()).unwrap())
            .unwrap();
        let quadrant = index / 4;
        let sub = (index % 4) as u8;

        let change = (quadrant + 4 - self.last_quadrant) % 4;
        self.last_quadrant = quadrant;
        let quadrant_bits = bits_for_quadrant_change(change);

        let mut scrambled = vec![quadrant_bits & 1 != 0, (quadrant_bits >> 1) & 1 != 0];
        for i in 0..(bits_per_sym.saturating_sub(2)) {
            scrambled.push((sub >> i) & 1 != 0);
        }
        scrambled.into_iter().map(|b| self.descrambler.descramble_bit(b)).collect()
    }

    pub fn reset(&mut self) {
        self.last_quadrant = 0;
        self.descrambler.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modulate_then_demodulate_round_trips_at_9600() {
        let mut modulator = Modulator::new(9600).unwrap();
        let mut demodulator = Demodulator::new(9600).unwrap();
        let bits = vec![true, false, true, true];
        let symbol = modulator.modulate_symbol(&bits);
        let decoded = demodulator.demodulate_symbol(symbol);
        assert_eq!(decoded, bits);
    }

    #[test]
    fn rejects_unsupported_bit_rate() {
        assert!(Modulator::new(14400).is_err());
    }
}

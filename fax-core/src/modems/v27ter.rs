//! V.27ter: 1600-baud differential PSK at 2400/4800 bps (C6, §4.6).

use super::scrambler::{Descrambler, Scrambler};
use crate::errors::ModemError;
use num_complex::Complex64;
use std::f64::consts::PI;

/// 8-PSK constellation (used at 4800 bps, 3 bits/symbol) — the 2400 bps
/// mode uses the 4-point subset at indices 0, 2, 4, 6.
pub const CONSTELLATION_8PSK: [Complex64; 8] = [
    Complex64::new(1.0, 0.0),
    Complex64::new(std::f64::consts::FRAC_1_SQRT_2, std::f64::consts::FRAC_1_SQRT_2),
    Complex64::new(0.0, 1.0),
    Complex64::new(-std::f64::consts::FRAC_1_SQRT_2, std::f64::consts::FRAC_1_SQRT_2),
    Complex64::new(-1.0, 0.0),
    Complex64::new(-std::f64::consts::FRAC_1_SQRT_2, -std::f64::consts::FRAC_1_SQRT_2),
    Complex64::new(0.0, -1.0),
    Complex64::new(std::f64::consts::FRAC_1_SQRT_2, -std::f64::consts::FRAC_1_SQRT_2),
];

/// Differential phase-change mapping for 4800 bps (3 bits -> one of 8
/// phase changes), per V.27ter Table 1.
fn phase_change_4800(bits: u8) -> usize {
    match bits & 0b111 {
        0b001 => 0,
        0b000 => 1,
        0b010 => 2,
        0b011 => 3,
        0b111 => 4,
        0b110 => 5,
        0b100 => 6,
        0b101 => 7,
        _ => unreachable!(),
    }
}

fn phase_change_2400(bits: u8) -> usize {
    // 2 bits -> one of the 4 phase changes on the even-indexed subset.
    match bits & 0b11 {
        0b00 => 0,
        0b01 => 2,
        0b11 => 4,
        0b10 => 6,
        _ => unreachable!(),
    }
}

/// Differential encoder/modulator: tracks the last transmitted phase and
/// advances it by the per-symbol phase change selected from the bit group.
#[derive(Debug, Clone)]
pub struct Modulator {
    bit_rate: u32,
    last_phase_index: usize,
    scrambler: Scrambler,
}

impl Modulator {
    pub fn new(bit_rate: u32) -> Result<Self, ModemError> {
        if bit_rate != 2400 && bit_rate != 4800 {
            return Err(ModemError::UnsupportedRate { modem: "V.27ter", rate: bit_rate as usize });
        }
        Ok(Self { bit_rate, last_phase_index: 0, scrambler: Scrambler::new() })
    }

    /// Modulate one symbol's worth of scrambled bits (2 or 3 bits) to a
    /// constellation point.
    pub fn modulate_symbol(&mut self, bits: &[bool]) -> Complex64 {
        let mut scrambled = 0u8;
        for (i, &b) in bits.iter().enumerate() {
            let s = self.scrambler.scramble_bit(b);
            scrambled |= (s as u8) << i;
        }
        let change = if self.bit_rate == 4800 { phase_change_4800(scrambled) } else { phase_change_2400(scrambled) };
        self.last_phase_index = (self.last_phase_index + change) % 8;
        CONSTELLATION_8PSK[self.last_phase_index]
    }

    pub fn reset(&mut self) {
        self.last_phase_index = 0;
        self.scrambler.reset();
    }
}

/// Differential decoder/demodulator counterpart to [`Modulator`].
#[derive(Debug, Clone)]
pub struct Demodulator {
    bit_rate: u32,
    last_phase_index: usize,
    descrambler: Descrambler,
}

impl Demodulator {
    pub fn new(bit_rate: u32) -> Result<Self, ModemError> {
        if bit_rate != 2400 && bit_rate != 4800 {
            return Err(ModemError::UnsupportedRate { modem: "V.27ter", rate: bit_rate as usize });
        }
        Ok(Self { bit_rate, last_phase_index: 0, descrambler: Descrambler::new() })
    }

    /// Slice `symbol` to the nearest constellation point without
    /// consuming it, for the receive chain's carrier/equaliser feedback.
    pub fn nearest_point(&self, symbol: Complex64) -> Complex64 {
        let observed_phase = symbol.arg().rem_euclid(2.0 * PI);
        let nearest = ((observed_phase / (PI / 4.0)).round() as usize) % 8;
        CONSTELLATION_8PSK[nearest]
    }

    /// Slice a carrier-tracked baseband symbol to the nearest
    /// constellation point and recover its bits via the differential
    /// phase change, descrambling on the way out.
    pub fn demodulate_symbol(&mut self, symbol: Complex64) -> Vec<bool> {
        let observed_phase = symbol.arg().rem_euclid(2.0 * PI);
        let nearest = ((observed_phase / (PI / 4.0)).round() as usize) % 8;
        let change = (nearest + 8 - self.last_phase_index) % 8;
        self.last_phase_index = nearest;

        let scrambled_bits = if self.bit_rate == 4800 {
            match change {
                0 => 0b001,
                1 => 0b000,
                2 => 0b010,
                3 => 0b011,
                4 => 0b111,
                5 => 0b110,
                6 => 0b100,
                7 => 0b101,
                _ => unreachable!(),
            }
        } else {
            match change {
                0 => 0b00,
                2 => 0b01,
                4 => 0b11,
                6 => 0b10,
                _ => 0b00,
            }
        };

        let num_bits = if self.bit_rate == 4800 { 3 } else { 2 };
        (0..num_bits).map(|i| self.descrambler.descramble_bit((scrambled_bits >> i) & 1 != 0)).collect()
    }

    pub fn reset(&mut self) {
        self.last_phase_index = 0;
        self.descrambler.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modulate_then_demodulate_round_trips_at_4800() {
        let mut modulator = Modulator::new(4800).unwrap();
        let mut demodulator = Demodulator::new(4800).unwrap();
        let bits = vec![true, false, true];
        let symbol = modulator.modulate_symbol(&bits);
        let decoded = demodulator.demodulate_symbol(symbol);
        assert_eq!(decoded, bits);
    }

    #[test]
    fn rejects_unsupported_bit_rate() {
        assert!(Modulator::new(9600).is_err());
    }
}

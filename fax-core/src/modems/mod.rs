//! Fast-modem orchestration (C6-C9): V.27ter, V.29 and V.17 transmit/receive,
//! built on the shared receive chain in [`fast_rx`] and the common
//! self-synchronising scrambler used by all three.

pub mod equalizer;
pub mod fast_rx;
pub mod fast_tx;
pub mod scrambler;
pub mod trellis;
pub mod v17;
pub mod v27ter;
pub mod v29;

/// Identifies which fast modem is active on the line, independent of the
/// negotiated bit rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModemKind {
    V21,
    V27ter,
    V29,
    V17,
}

impl ModemKind {
    /// Baud (symbol) rate, fixed per modem regardless of bit rate (§4.6).
    pub fn baud_rate_hz(self) -> f64 {
        match self {
            ModemKind::V21 => 300.0,
            ModemKind::V27ter => 1600.0,
            ModemKind::V29 | ModemKind::V17 => 2400.0,
        }
    }

    pub fn carrier_freq_hz(self) -> f64 {
        match self {
            ModemKind::V21 => 1750.0,
            ModemKind::V27ter => 1800.0,
            ModemKind::V29 => 1700.0,
            ModemKind::V17 => 1800.0,
        }
    }

    /// Bit rates this modem supports, slowest first (§4.6/§2 component table).
    pub fn supported_bit_rates(self) -> &'static [u32] {
        match self {
            ModemKind::V21 => &[300],
            ModemKind::V27ter => &[2400, 4800],
            ModemKind::V29 => &[4800, 7200, 9600],
            ModemKind::V17 => &[7200, 9600, 12000, 14400],
        }
    }

    /// The next slower bit rate for this modem, or `None` if already the
    /// slowest (§4.6 fallback sequence culminates in a modem-kind fallback,
    /// handled by the orchestrator, not here).
    pub fn fallback_rate(self, current: u32) -> Option<u32> {
        let rates = self.supported_bit_rates();
        let idx = rates.iter().position(|&r| r == current)?;
        if idx == 0 {
            None
        } else {
            Some(rates[idx - 1])
        }
    }

    /// Payload bits consumed by one call to this modem's
    /// `Modulator::modulate_symbol` at `bit_rate` (for V.17 this already
    /// accounts for the one source bit the trellis encoder expands into
    /// two coset bits, so it is one less than `bit_rate / baud_rate`).
    pub fn bits_per_symbol(self, bit_rate: u32) -> Option<usize> {
        match self {
            ModemKind::V21 => Some(1),
            ModemKind::V27ter => match bit_rate {
                2400 => Some(2),
                4800 => Some(3),
                _ => None,
            },
            ModemKind::V29 => match bit_rate {
                4800 => Some(2),
                7200 => Some(3),
                9600 => Some(4),
                _ => None,
            },
            ModemKind::V17 => match bit_rate {
                7200 => Some(1),
                9600 => Some(2),
                12000 => Some(3),
                14400 => Some(4),
                _ => None,
            },
        }
    }
}

/// Line-turnaround training state shared by all three fast-modem receivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainingState {
    AwaitingCarrier,
    SegmentOne,
    SegmentTwo,
    Trained,
    Failed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_rate_steps_down_the_table() {
        assert_eq!(ModemKind::V17.fallback_rate(14400), Some(12000));
        assert_eq!(ModemKind::V17.fallback_rate(7200), None);
    }

    #[test]
    fn baud_rates_match_the_itu_values() {
        assert_eq!(ModemKind::V27ter.baud_rate_hz(), 1600.0);
        assert_eq!(ModemKind::V29.baud_rate_hz(), 2400.0);
        assert_eq!(ModemKind::V17.baud_rate_hz(), 2400.0);
    }
}

//! T0–T8 countdown timers, expressed in audio-sample units (§3 "Timers").
//!
//! 1 unit = 125 µs at 8 kHz, i.e. one timer tick per PCM sample. Timers are
//! decremented by exactly the number of samples supplied to `rx`/`tx` each
//! call (§8 invariant 7) and the FSM is notified on underflow.

use serde::{Deserialize, Serialize};

pub const SAMPLE_RATE_HZ: u32 = 8000;

/// Identifies one of the seven T.30 timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimerId {
    /// Answer/ident wait, ≈35 s.
    T0,
    /// Answer/ident wait, ≈35 s.
    T1,
    /// Command-response HDLC wait, ≈6 s.
    T2,
    /// Procedural-interrupt wait, ≈10 s.
    T3,
    /// Command-response HDLC wait, ≈3 s.
    T4,
    /// ECM overall patience, ≈60 s.
    T5,
    /// Reserved for duplex use.
    T6,
    /// Reserved for duplex use.
    T7,
    /// Reserved for duplex use.
    T8,
}

impl TimerId {
    pub fn name(self) -> &'static str {
        match self {
            TimerId::T0 => "T0",
            TimerId::T1 => "T1",
            TimerId::T2 => "T2",
            TimerId::T3 => "T3",
            TimerId::T4 => "T4",
            TimerId::T5 => "T5",
            TimerId::T6 => "T6",
            TimerId::T7 => "T7",
            TimerId::T8 => "T8",
        }
    }

    /// Nominal duration in seconds, per §3/§4.6.
    pub fn nominal_seconds(self) -> f64 {
        match self {
            TimerId::T0 => 35.0,
            TimerId::T1 => 35.0,
            TimerId::T2 => 6.0,
            TimerId::T3 => 10.0,
            TimerId::T4 => 3.0,
            TimerId::T5 => 60.0,
            TimerId::T6 | TimerId::T7 | TimerId::T8 => 0.0,
        }
    }

    pub fn nominal_samples(self) -> u64 {
        (self.nominal_seconds() * SAMPLE_RATE_HZ as f64) as u64
    }
}

/// A single countdown timer in sample units.
#[derive(Debug, Clone, Copy, Default)]
struct Countdown {
    remaining: u64,
    active: bool,
}

/// The full bank of T0–T8 timers owned by a FAX session.
#[derive(Debug, Clone, Default)]
pub struct TimerBank {
    timers: [Countdown; 9],
}

fn index_of(id: TimerId) -> usize {
    match id {
        TimerId::T0 => 0,
        TimerId::T1 => 1,
        TimerId::T2 => 2,
        TimerId::T3 => 3,
        TimerId::T4 => 4,
        TimerId::T5 => 5,
        TimerId::T6 => 6,
        TimerId::T7 => 7,
        TimerId::T8 => 8,
    }
}

impl TimerBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a timer for `samples` sample-units, overwriting any prior value.
    pub fn start(&mut self, id: TimerId, samples: u64) {
        self.timers[index_of(id)] = Countdown { remaining: samples, active: true };
    }

    /// Arm a timer at its nominal duration.
    pub fn start_nominal(&mut self, id: TimerId) {
        self.start(id, id.nominal_samples());
    }

    pub fn cancel(&mut self, id: TimerId) {
        self.timers[index_of(id)].active = false;
    }

    pub fn is_active(&self, id: TimerId) -> bool {
        self.timers[index_of(id)].active
    }

    pub fn remaining(&self, id: TimerId) -> u64 {
        self.timers[index_of(id)].remaining
    }

    /// Decrement every active timer by `samples`. Returns the set of timers
    /// that expired (reached zero) on this call, in T0..T8 order.
    pub fn tick(&mut self, samples: u64) -> Vec<TimerId> {
        let mut expired = Vec::new();
        for id in [
            TimerId::T0,
            TimerId::T1,
            TimerId::T2,
            TimerId::T3,
            TimerId::T4,
            TimerId::T5,
            TimerId::T6,
            TimerId::T7,
            TimerId::T8,
        ] {
            let timer = &mut self.timers[index_of(id)];
            if !timer.active {
                continue;
            }
            if timer.remaining <= samples {
                timer.remaining = 0;
                timer.active = false;
                expired.push(id);
            } else {
                timer.remaining -= samples;
            }
        }
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_decrements_by_exact_sample_count() {
        let mut bank = TimerBank::new();
        bank.start(TimerId::T2, 1000);
        bank.tick(300);
        assert_eq!(bank.remaining(TimerId::T2), 700);
        bank.tick(700);
        assert_eq!(bank.remaining(TimerId::T2), 0);
        assert!(!bank.is_active(TimerId::T2));
    }

    #[test]
    fn tick_reports_expired_timers() {
        let mut bank = TimerBank::new();
        bank.start(TimerId::T1, 100);
        bank.start(TimerId::T4, 500);
        let expired = bank.tick(100);
        assert_eq!(expired, vec![TimerId::T1]);
    }

    #[test]
    fn cancel_stops_a_timer_from_expiring() {
        let mut bank = TimerBank::new();
        bank.start(TimerId::T3, 10);
        bank.cancel(TimerId::T3);
        let expired = bank.tick(100);
        assert!(expired.is_empty());
    }

    #[test]
    fn nominal_t1_is_35_seconds_of_samples() {
        assert_eq!(TimerId::T1.nominal_samples(), 35 * SAMPLE_RATE_HZ as u64);
    }
}

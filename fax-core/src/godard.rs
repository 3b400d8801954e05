//! Godard band-edge symbol-timing error detector (C2, §4.2).

/// One-pole band-edge resonator tuned to `carrier ± baud/2`.
#[derive(Debug, Clone, Copy)]
struct BandEdgeFilter {
    radius: f64,
    omega: f64,
    // Direct-form II state for a complex one-pole resonator, kept as
    // real/imag pairs since the filter only needs to track magnitude.
    re1: f64,
    im1: f64,
}

impl BandEdgeFilter {
    fn new(freq_hz: f64, sample_rate: f64, radius: f64) -> Self {
        Self {
            radius,
            omega: std::f64::consts::TAU * freq_hz / sample_rate,
            re1: 0.0,
            im1: 0.0,
        }
    }

    fn process(&mut self, x: f64) -> (f64, f64) {
        let (s, c) = self.omega.sin_cos();
        let re = x + self.radius * (self.re1 * c + self.im1 * s);
        let im = self.radius * (self.im1 * c - self.re1 * s);
        self.re1 = re;
        self.im1 = im;
        (re, im)
    }
}

/// One-pole DC blocker + integrator used to turn the raw TED product into
/// a slow-moving timing-error accumulator.
#[derive(Debug, Clone, Copy, Default)]
struct DcBlockIntegrate {
    prev_x: f64,
    prev_y: f64,
    integrator: f64,
}

impl DcBlockIntegrate {
    fn process(&mut self, x: f64) -> f64 {
        let y = x - self.prev_x + 0.99 * self.prev_y;
        self.prev_x = x;
        self.prev_y = y;
        self.integrator += y;
        self.integrator
    }
}

/// Fractional-sample timing correction suggested after one baud.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimingNudge {
    None,
    Fine(f64),
    Coarse(f64),
}

/// Godard timing error detector configuration.
#[derive(Debug, Clone, Copy)]
pub struct GodardConfig {
    pub carrier_freq_hz: f64,
    pub baud_rate_hz: f64,
    pub sample_rate_hz: f64,
    pub pole_radius: f64,
    pub c_low: f64,
    pub c_high: f64,
    pub c_mix: f64,
    pub fine_trigger: f64,
    pub coarse_trigger: f64,
    pub fine_step: f64,
    pub coarse_step: f64,
}

impl GodardConfig {
    pub fn for_modem(carrier_freq_hz: f64, baud_rate_hz: f64, sample_rate_hz: f64) -> Self {
        Self {
            carrier_freq_hz,
            baud_rate_hz,
            sample_rate_hz,
            pole_radius: 0.99,
            c_low: 1.0,
            c_high: 1.0,
            c_mix: 1.0,
            fine_trigger: 1.0,
            coarse_trigger: 4.0,
            fine_step: 1.0 / 32.0,
            coarse_step: 1.0 / 8.0,
        }
    }
}

/// Godard band-edge symbol-timing error detector (§4.2).
#[derive(Debug, Clone)]
pub struct GodardTed {
    config: GodardConfig,
    low: BandEdgeFilter,
    high: BandEdgeFilter,
    low_prev: (f64, f64),
    high_prev: (f64, f64),
    post: DcBlockIntegrate,
}

impl GodardTed {
    pub fn new(config: GodardConfig) -> Self {
        let low = BandEdgeFilter::new(
            config.carrier_freq_hz - config.baud_rate_hz / 2.0,
            config.sample_rate_hz,
            config.pole_radius,
        );
        let high = BandEdgeFilter::new(
            config.carrier_freq_hz + config.baud_rate_hz / 2.0,
            config.sample_rate_hz,
            config.pole_radius,
        );
        Self {
            config,
            low,
            high,
            low_prev: (0.0, 0.0),
            high_prev: (0.0, 0.0),
            post: DcBlockIntegrate::default(),
        }
    }

    /// Feed one real baseband/passband sample; called once per audio
    /// sample within the baud's worth of samples. Returns the timing
    /// nudge implied by the accumulated state at the *end* of a baud —
    /// callers call this every sample and act on the nudge returned for
    /// the last sample of each baud period.
    pub fn process_sample(&mut self, x: f64) -> TimingNudge {
        let low_now = self.low.process(x);
        let high_now = self.high.process(x);

        let v = self.low_prev.0 * high_now.0 * self.config.c_low
            - low_now.0 * self.high_prev.0 * self.config.c_high
            + self.low_prev.0 * self.high_prev.0 * self.config.c_mix;

        self.low_prev = low_now;
        self.high_prev = high_now;

        let integrated = self.post.process(v);

        if integrated.abs() > self.config.coarse_trigger {
            TimingNudge::Coarse(self.config.coarse_step * integrated.signum())
        } else if integrated.abs() > self.config.fine_trigger {
            TimingNudge::Fine(self.config.fine_step * integrated.signum())
        } else {
            TimingNudge::None
        }
    }

    pub fn reset_integrator(&mut self) {
        self.post.integrator = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_produces_no_nudge() {
        let config = GodardConfig::for_modem(1700.0, 2400.0, 8000.0);
        let mut ted = GodardTed::new(config);
        for _ in 0..200 {
            assert_eq!(ted.process_sample(0.0), TimingNudge::None);
        }
    }

    #[test]
    fn strong_offset_signal_eventually_triggers_a_nudge() {
        let config = GodardConfig::for_modem(1700.0, 2400.0, 8000.0);
        let mut ted = GodardTed::new(config);
        let mut saw_nudge = false;
        for n in 0..2000 {
            let t = n as f64 / 8000.0;
            let x = (std::f64::consts::TAU * 1900.0 * t).sin();
            if !matches!(ted.process_sample(x), TimingNudge::None) {
                saw_nudge = true;
                break;
            }
        }
        assert!(saw_nudge, "expected a timing nudge from an off-centre tone");
    }

    #[test]
    fn reset_integrator_clears_accumulated_state() {
        let config = GodardConfig::for_modem(1700.0, 2400.0, 8000.0);
        let mut ted = GodardTed::new(config);
        for n in 0..500 {
            let t = n as f64 / 8000.0;
            ted.process_sample((std::f64::consts::TAU * 1900.0 * t).sin());
        }
        ted.reset_integrator();
        assert_eq!(ted.post.integrator, 0.0);
    }
}

//! Top-level FAX session (§3 "Ownership"): owns the session configuration,
//! the T.30 state machine, the modem/HDLC orchestrator, the per-page image
//! codec, and the structured logger for one call.

use crate::callbacks::{RowIo, SessionCallbacks};
use crate::config::SessionConfig;
use crate::errors::{ConfigError, Result};
use crate::image::{CodingScheme, Decoder, Encoder, PackedBits};
use crate::logging::{LogConfig, SignalLogger};
use crate::modems::ModemKind;
use crate::orchestrator::{Orchestrator, OrchestratorEvent, RxType, TxType};
use crate::t30::{Action, Fcf, Fsm, PageResult, Role};

/// Chunk size used by [`Session::rx`]/[`Session::tx`] to advance timers
/// between orchestrator samples, matching the timer bank's tick grain.
const SAMPLE_CHUNK: u64 = 1;

/// One FAX call from first tone to Phase E release.
pub struct Session {
    config: SessionConfig,
    fsm: Fsm,
    orchestrator: Orchestrator,
    logger: SignalLogger,
    image_encoder: Option<Encoder>,
    image_decoder: Option<Decoder>,
    pages_completed: u32,
    rx_image_bits: PackedBits,
    rx_image_pos: usize,
    rx_is_1d_row: bool,
}

impl Session {
    pub fn new(config: SessionConfig) -> Result<Self> {
        config.validate()?;
        let role = if config.calling_party { Role::Caller } else { Role::Answerer };
        let fsm = Fsm::new(role, &config);
        let agc = config.agc;
        Ok(Self {
            config,
            fsm,
            orchestrator: Orchestrator::new(agc),
            logger: SignalLogger::new(LogConfig::default()),
            image_encoder: None,
            image_decoder: None,
            pages_completed: 0,
            rx_image_bits: PackedBits::new(),
            rx_image_pos: 0,
            rx_is_1d_row: true,
        })
    }

    pub fn with_log_config(mut self, log_config: LogConfig) -> Self {
        self.logger = SignalLogger::new(log_config);
        self
    }

    pub fn logger(&self) -> &SignalLogger {
        &self.logger
    }

    pub fn pages_completed(&self) -> u32 {
        self.pages_completed
    }

    /// Pump `samples.len()` received 8 kHz PCM samples through the
    /// orchestrator, advancing timers, reacting to framing events, and
    /// decoding any image rows that complete along the way (§5 "rx(samples,
    /// len)").
    pub fn rx(&mut self, samples: &[i16], rows: &mut dyn RowIo, callbacks: &mut dyn SessionCallbacks) {
        for &sample in samples {
            self.advance_timers(SAMPLE_CHUNK, callbacks);
            if let Some(event) = self.orchestrator.rx(std::slice::from_ref(&sample)) {
                self.on_orchestrator_event(event, callbacks);
            }
            if matches!(self.orchestrator.rx_type(), RxType::FastImage { .. }) {
                self.drain_image_rows(rows);
            }
        }
    }

    /// Pull up to `buffer.len()` 8 kHz PCM samples from the transmitter,
    /// advancing timers in step (§6 "tx(buffer, max_len)").
    pub fn tx(&mut self, buffer: &mut [i16], callbacks: &mut dyn SessionCallbacks) -> usize {
        let written = self.orchestrator.tx(buffer, buffer.len());
        for _ in 0..written {
            self.advance_timers(SAMPLE_CHUNK, callbacks);
        }
        written
    }

    /// Move newly demodulated image bits out of the orchestrator and
    /// decode every complete row found so far (bounded by EOL markers for
    /// T.4 1D/2D, or the page's fixed row length for T.6).
    fn drain_image_rows(&mut self, rows: &mut dyn RowIo) {
        let fresh = self.orchestrator.take_rx_image_bits();
        if fresh.is_empty() {
            return;
        }
        self.rx_image_bits.push(&fresh);

        loop {
            let Some((data_end, eol_end)) = crate::image::scan_for_eol(&self.rx_image_bits, self.rx_image_pos) else {
                break;
            };
            let row_bits = self.rx_image_bits.slice(self.rx_image_pos, data_end);
            if !row_bits.is_empty() {
                let _ = self.decode_row_bits(&row_bits, self.rx_is_1d_row, rows);
                self.rx_is_1d_row = !self.rx_is_1d_row;
            }
            self.rx_image_pos = eol_end;
        }
    }

    /// Advance the session's timers by `sample_count` PCM samples and react
    /// to whatever the FSM decides (§8 invariant 7).
    pub fn advance_timers(&mut self, sample_count: u64, callbacks: &mut dyn SessionCallbacks) {
        let action = self.fsm.tick(sample_count);
        self.dispatch(action, callbacks);
    }

    /// Feed one received, FCS-validated control frame into the FSM.
    pub fn on_control_frame(&mut self, fcf: Fcf, payload: &[u8], callbacks: &mut dyn SessionCallbacks) -> Result<()> {
        self.logger.debug("T30", format!("received {fcf:?}, {} payload octets", payload.len()));
        callbacks.on_real_time_frame(fcf, false);
        let action = match fcf {
            Fcf::Dcn => self.fsm.on_dcn(),
            Fcf::Mcf | Fcf::Rtp | Fcf::Rtn | Fcf::Pip | Fcf::Pin | Fcf::Rnr | Fcf::Ppr => {
                self.fsm.on_page_response(fcf)
            }
            _ => Action::None,
        };
        self.dispatch(action, callbacks);
        Ok(())
    }

    /// React to the orchestrator surfacing a completed frame, an abort, or
    /// carrier loss while the line is being polled (§5 "rx(samples, len)").
    pub fn on_orchestrator_event(&mut self, event: OrchestratorEvent, callbacks: &mut dyn SessionCallbacks) {
        match event {
            OrchestratorEvent::SendStepComplete => {
                self.logger.trace("T30", "tx queue drained");
            }
            OrchestratorEvent::FrameReceived(payload) => {
                if let (Some(&fcf_octet), rest) = (payload.first(), payload.get(1..).unwrap_or(&[])) {
                    if let Some(fcf) = Fcf::from_octet(fcf_octet) {
                        let _ = self.on_control_frame(fcf, rest, callbacks);
                    }
                }
            }
            OrchestratorEvent::FrameAborted => {
                self.logger.warn("T30", "frame aborted mid-transmission");
            }
            OrchestratorEvent::CarrierLost => {
                self.logger.warn("CARRIER", "carrier lost");
            }
        }
    }

    fn dispatch(&mut self, action: Action, callbacks: &mut dyn SessionCallbacks) {
        match action {
            Action::SendFrame(fcf) => {
                self.logger.debug("T30", format!("sending {fcf:?}"));
                callbacks.on_real_time_frame(fcf, true);
                let _ = self.orchestrator.queue_frame(&[fcf.to_octet()]);
            }
            Action::StartTraining { modem, bit_rate } => {
                self.logger.info("TRAIN", format!("starting {modem:?} training at {bit_rate} bps"));
            }
            Action::StartImageTransfer => {
                self.begin_page_coding();
                self.rx_image_bits = PackedBits::new();
                self.rx_image_pos = 0;
                self.rx_is_1d_row = true;
                self.orchestrator.set_rx_type(RxType::FastImage {
                    modem: self.negotiated_modem(),
                    bit_rate: self.fsm.negotiated_bit_rate().unwrap_or(9600),
                    short_train: true,
                });
            }
            Action::NotifyPhaseB => callbacks.on_phase_b(),
            Action::NotifyPhaseD(result) => {
                if matches!(result, PageResult::Confirmed | PageResult::RetrainPositive) {
                    self.pages_completed += 1;
                }
                callbacks.on_phase_d(result);
            }
            Action::NotifyPhaseE(status) => {
                callbacks.on_phase_e(status);
                callbacks.on_document(status, self.pages_completed);
            }
            Action::None => {}
        }
    }

    /// The modem kind negotiated for the current page, falling back to
    /// V.29 only when Phase B has not yet run (tests exercising page
    /// coding ahead of DCS).
    fn negotiated_modem(&self) -> ModemKind {
        self.fsm.negotiated_modem().unwrap_or(ModemKind::V29)
    }

    fn begin_page_coding(&mut self) {
        let width = 1728usize;
        let resolution = self.config.supported_resolutions.first().copied().unwrap_or(crate::config::Resolution::STANDARD);
        let scheme = if self.config.supported_compressions.contains(crate::config::CompressionMask::T6) {
            CodingScheme::T6
        } else if self.config.supported_compressions.contains(crate::config::CompressionMask::T4_2D) {
            CodingScheme::T4_2D
        } else {
            CodingScheme::T4_1D
        };
        if self.config.calling_party {
            self.image_encoder = Some(Encoder::new(scheme, width, resolution.vertical_dpi, 0));
        } else {
            self.image_decoder = Some(Decoder::new(scheme, width, resolution.vertical_dpi, 10));
        }
    }

    /// Drive the image encoder forward one row at a time, pulled from
    /// `rows`, queuing the coded bits onto the fast-modem transmitter.
    pub fn encode_next_row(&mut self, rows: &mut dyn RowIo) -> Result<bool> {
        let Some(encoder) = self.image_encoder.as_mut() else {
            return Ok(false);
        };
        match rows.read_row() {
            Some(row) => {
                let bits = encoder.encode_row(&row)?;
                self.queue_image_bits(&bits);
                Ok(true)
            }
            None => {
                let bits = encoder.end_of_page();
                self.queue_image_bits(&bits);
                Ok(false)
            }
        }
    }

    fn queue_image_bits(&mut self, bits: &PackedBits) {
        let as_bools: Vec<bool> = bits.iter_bits().collect();
        self.orchestrator.set_tx_type(
            TxType::FastImage {
                modem: self.negotiated_modem(),
                bit_rate: self.fsm.negotiated_bit_rate().unwrap_or(9600),
                short_train: true,
            },
            &as_bools,
        );
    }

    /// Feed one decoded row's packed bits into the image decoder and push
    /// the resulting pixel row to the host.
    pub fn decode_row_bits(&mut self, bits: &PackedBits, is_1d_row: bool, rows: &mut dyn RowIo) -> Result<()> {
        if let Some(decoder) = self.image_decoder.as_mut() {
            let row = decoder.decode_row(bits, is_1d_row)?;
            rows.write_row(&row);
        }
        Ok(())
    }
}

pub fn require_non_empty_identifier(s: &str) -> std::result::Result<(), ConfigError> {
    if s.is_empty() {
        Err(ConfigError::EmptyIdentifier)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callbacks::NullCallbacks;

    struct BlankPage {
        rows_left: usize,
        width: usize,
    }

    impl RowIo for BlankPage {
        fn read_row(&mut self) -> Option<Vec<u8>> {
            if self.rows_left == 0 {
                return None;
            }
            self.rows_left -= 1;
            Some(vec![0u8; self.width])
        }
        fn write_row(&mut self, _row: &[u8]) {}
    }

    #[test]
    fn new_session_validates_config() {
        let mut bad = SessionConfig::default();
        bad.supported_modems = crate::config::ModemMask::empty();
        assert!(Session::new(bad).is_err());
    }

    #[test]
    fn t0_expiry_reports_phase_e_through_callbacks() {
        let mut session = Session::new(SessionConfig::default()).unwrap();
        let mut callbacks = NullCallbacks;
        session.advance_timers(crate::timers::TimerId::T0.nominal_samples() + 1, &mut callbacks);
    }

    #[test]
    fn encode_next_row_returns_false_at_end_of_page() {
        let mut config = SessionConfig::default();
        config.calling_party = true;
        let mut session = Session::new(config).unwrap();
        session.begin_page_coding();
        let mut page = BlankPage { rows_left: 1, width: 1728 };
        assert!(session.encode_next_row(&mut page).unwrap());
        assert!(!session.encode_next_row(&mut page).unwrap());
    }

    #[test]
    fn completed_pages_increment_on_confirmation() {
        let mut session = Session::new(SessionConfig::default()).unwrap();
        let mut callbacks = NullCallbacks;
        session.dispatch(Action::NotifyPhaseD(PageResult::Confirmed), &mut callbacks);
        assert_eq!(session.pages_completed(), 1);
    }

    #[test]
    fn image_transfer_honors_the_negotiated_modem_instead_of_defaulting() {
        let mut session = Session::new(SessionConfig::default()).unwrap();
        session.fsm = Fsm::new(Role::Answerer, &session.config);
        let dcs = crate::t30::CapabilitySet { modems: crate::config::ModemMask::V27TER, ..Default::default() };
        session.fsm.on_dcs_received(&dcs, 4800).unwrap();
        let mut callbacks = NullCallbacks;
        session.dispatch(Action::StartImageTransfer, &mut callbacks);
        assert_eq!(
            session.orchestrator.rx_type(),
            RxType::FastImage { modem: ModemKind::V27ter, bit_rate: 4800, short_train: true }
        );
    }

    #[test]
    fn tx_writes_the_requested_sample_count_and_advances_timers() {
        let mut session = Session::new(SessionConfig::default()).unwrap();
        let mut callbacks = NullCallbacks;
        let mut buf = [0i16; 32];
        let written = session.tx(&mut buf, &mut callbacks);
        assert_eq!(written, 32);
    }
}

//! T.30 call state machine (C11, §4 "Protocol state machine").
//!
//! Models the call as a reduced set of named states spanning Phases A–E,
//! rather than the ~70 micro-states of a byte-for-byte state table: each
//! state here corresponds to one "waiting for X" or "about to send Y" point
//! at which the FSM can receive a frame, a timer expiry, or a training
//! outcome and must decide the next action. See DESIGN.md for the
//! rationale.

use crate::config::{ModemMask, SessionConfig};
use crate::errors::T30Error;
use crate::modems::ModemKind;
use crate::t30::ecm::PartialPageBuffer;
use crate::t30::frames::{CapabilitySet, Fcf};
use crate::t30::status::{CompletionStatus, PageResult};
use crate::timers::{TimerBank, TimerId};

/// Upper bound on command retries before falling back a rate or aborting
/// (§4.6 "Retries": "a failed command is retried up to three times").
pub const MAX_COMMAND_RETRIES: u32 = 3;
/// Upper bound on RNR (receiver-not-ready) re-polls (§4.6).
pub const MAX_RNR_RETRIES: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Caller,
    Answerer,
}

/// Named FSM states, spanning Phase A through E.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Phase A: outgoing call, waiting for the remote's CED/DIS.
    PhaseACalling,
    /// Phase A: incoming call, about to send CED then DIS.
    PhaseAAnswering,
    /// Phase B: DIS/DTC sent, waiting for a command (DCS or repeat DIS).
    PhaseBAwaitingCommand,
    /// Phase B: DCS sent, waiting for training-confirmation (TCF) result.
    PhaseBAwaitingTraining,
    /// Phase B: TCF received, deciding CFR/FTT.
    PhaseBTrainingCheck,
    /// Phase C: image data in flight on a fast modem.
    PhaseCImageTransfer,
    /// Phase D: post-page frame sent (MPS/EOM/EOP), awaiting response.
    PhaseDAwaitingPageResponse,
    /// Phase D: post-page response received, deciding next page/retrain.
    PhaseDDecidingNextAction,
    /// Phase E: DCN sent or received, call terminating.
    PhaseEReleasing,
    /// Terminal: call fully ended.
    Done(CompletionStatus),
}

/// Actions the FSM asks the orchestrator to perform. The FSM itself only
/// tracks state and timers; it never touches modems or HDLC framing
/// directly (§4 "the FSM decides, the orchestrator does").
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SendFrame(Fcf),
    StartTraining { modem: ModemKind, bit_rate: u32 },
    StartImageTransfer,
    NotifyPhaseB,
    NotifyPhaseD(PageResult),
    NotifyPhaseE(CompletionStatus),
    None,
}

/// The T.30 call state machine: owns only protocol state, the negotiated
/// capability sets, the ECM buffer, and the timer bank. Modem/HDLC
/// mechanics live in the orchestrator.
pub struct Fsm {
    role: Role,
    state: State,
    local: CapabilitySet,
    remote: Option<CapabilitySet>,
    negotiated_modem: Option<ModemKind>,
    negotiated_bit_rate: Option<u32>,
    command_retries: u32,
    rnr_retries: u32,
    ecm: PartialPageBuffer,
    timers: TimerBank,
}

impl Fsm {
    pub fn new(role: Role, session: &SessionConfig) -> Self {
        let local = CapabilitySet {
            modems: session.supported_modems,
            compressions: session.supported_compressions,
            image_sizes: session.supported_image_sizes,
            features: session.supported_t30_features,
            ecm_requested: session.ecm_enabled,
        };
        let mut timers = TimerBank::new();
        let state = match role {
            Role::Caller => {
                timers.start_nominal(TimerId::T0);
                State::PhaseACalling
            }
            Role::Answerer => State::PhaseAAnswering,
        };
        Self {
            role,
            state,
            local,
            remote: None,
            negotiated_modem: None,
            negotiated_bit_rate: None,
            command_retries: 0,
            rnr_retries: 0,
            ecm: PartialPageBuffer::new(),
            timers,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn negotiated_bit_rate(&self) -> Option<u32> {
        self.negotiated_bit_rate
    }

    pub fn negotiated_modem(&self) -> Option<ModemKind> {
        self.negotiated_modem
    }

    pub fn ecm(&mut self) -> &mut PartialPageBuffer {
        &mut self.ecm
    }

    /// Advance the timer bank by `samples` sample-units and fold any
    /// expiries into the FSM (§8 invariant 7: timers tick per rx/tx call).
    pub fn tick(&mut self, samples: u64) -> Action {
        for expired in self.timers.tick(samples) {
            return self.on_timer_expired(expired);
        }
        Action::None
    }

    fn on_timer_expired(&mut self, timer: TimerId) -> Action {
        let status = match (self.state, timer) {
            (State::PhaseACalling, TimerId::T0) => CompletionStatus::T1TimedOutAnswer,
            (State::PhaseBAwaitingCommand, TimerId::T1) => CompletionStatus::T1TimedOutDcsResponse,
            (_, TimerId::T2) => CompletionStatus::T2TimedOut,
            (_, TimerId::T3) => CompletionStatus::T3TimedOut,
            (_, TimerId::T4) => CompletionStatus::T4TimedOut,
            (_, TimerId::T5) => CompletionStatus::T5TimedOut,
            _ => return Action::None,
        };
        self.state = State::Done(status);
        Action::NotifyPhaseE(status)
    }

    /// Caller side: CED or a DIS frame has been detected.
    pub fn on_remote_ready(&mut self, remote: CapabilitySet) -> Action {
        self.remote = Some(remote);
        self.timers.cancel(TimerId::T0);
        self.state = State::PhaseBAwaitingCommand;
        self.timers.start_nominal(TimerId::T1);
        Action::NotifyPhaseB
    }

    /// Answerer side: about to transmit CED/DIS.
    pub fn send_dis(&mut self) -> Action {
        self.state = State::PhaseBAwaitingCommand;
        self.timers.start_nominal(TimerId::T2);
        Action::SendFrame(Fcf::Dis)
    }

    /// A DCS command frame arrived; check it is a subset of what we (or
    /// they) advertised (§4 invariant: "DCS must be a subset of DIS").
    pub fn on_dcs_received(&mut self, dcs: &CapabilitySet, bit_rate: u32) -> Result<Action, T30Error> {
        let dis = self.local.clone();
        if !is_subset(dcs, &dis) {
            return Err(T30Error::DcsNotSubsetOfDis);
        }
        let modem = modem_kind_from_mask(dcs.modems).ok_or(T30Error::NoCommonModem)?;
        if !modem.supported_bit_rates().contains(&bit_rate) {
            return Err(T30Error::UnsupportedBitRateForModem { modem, rate: bit_rate });
        }
        self.timers.cancel(TimerId::T1);
        self.negotiated_modem = Some(modem);
        self.negotiated_bit_rate = Some(bit_rate);
        self.state = State::PhaseBAwaitingTraining;
        self.timers.start_nominal(TimerId::T2);
        Ok(Action::StartTraining { modem, bit_rate })
    }

    /// Training-check frame (TCF) outcome: `good` reflects whether the
    /// all-zeros training pattern was received with an acceptable error
    /// rate over the 1.5 s check window.
    pub fn on_training_result(&mut self, good: bool) -> Action {
        self.timers.cancel(TimerId::T2);
        self.state = State::PhaseBTrainingCheck;
        if good {
            self.state = State::PhaseCImageTransfer;
            self.command_retries = 0;
            Action::SendFrame(Fcf::Cfr)
        } else {
            self.command_retries += 1;
            if self.command_retries > MAX_COMMAND_RETRIES {
                let fallback = self
                    .negotiated_modem
                    .zip(self.negotiated_bit_rate)
                    .and_then(|(modem, rate)| modem.fallback_rate(rate));
                if let Some(rate) = fallback {
                    self.negotiated_bit_rate = Some(rate);
                    self.command_retries = 0;
                    self.state = State::PhaseBAwaitingCommand;
                    self.timers.start_nominal(TimerId::T1);
                    Action::SendFrame(Fcf::Ftt)
                } else {
                    self.state = State::Done(CompletionStatus::NoFallbackRateAvailable);
                    Action::NotifyPhaseE(CompletionStatus::NoFallbackRateAvailable)
                }
            } else {
                self.state = State::PhaseBAwaitingCommand;
                self.timers.start_nominal(TimerId::T1);
                Action::SendFrame(Fcf::Ftt)
            }
        }
    }

    /// A post-page frame (MPS/EOM/EOP) has been sent; wait for the
    /// receiver's response.
    pub fn send_post_page(&mut self, fcf: Fcf) -> Action {
        self.state = State::PhaseDAwaitingPageResponse;
        self.timers.start_nominal(TimerId::T4);
        Action::SendFrame(fcf)
    }

    /// The receiver's response to a post-page frame arrived (§4.6 "Phase D
    /// responses"): MCF/RTP/RTN confirm or reject the page; PPR/RNR are
    /// ECM-specific retry indications.
    pub fn on_page_response(&mut self, fcf: Fcf) -> Action {
        self.timers.cancel(TimerId::T4);
        let result = match fcf {
            Fcf::Mcf => PageResult::Confirmed,
            Fcf::Rtp => PageResult::RetrainPositive,
            Fcf::Rtn => PageResult::RetrainNegative,
            Fcf::Pip => PageResult::InterruptPositive,
            Fcf::Pin => PageResult::InterruptNegative,
            Fcf::Rnr => return self.on_receiver_not_ready(),
            Fcf::Ppr => return self.on_ppr_received(),
            _ => {
                self.state = State::Done(CompletionStatus::UnexpectedFrame);
                return Action::NotifyPhaseE(CompletionStatus::UnexpectedFrame);
            }
        };
        self.state = State::PhaseDDecidingNextAction;
        Action::NotifyPhaseD(result)
    }

    fn on_receiver_not_ready(&mut self) -> Action {
        self.rnr_retries += 1;
        if self.rnr_retries > MAX_RNR_RETRIES {
            self.state = State::Done(CompletionStatus::RnrRetriesExceeded);
            return Action::NotifyPhaseE(CompletionStatus::RnrRetriesExceeded);
        }
        self.timers.start_nominal(TimerId::T4);
        Action::SendFrame(Fcf::Rr)
    }

    fn on_ppr_received(&mut self) -> Action {
        if self.ecm.record_ppr_without_progress() {
            self.state = State::Done(CompletionStatus::PprWithoutProgress);
            return Action::NotifyPhaseE(CompletionStatus::PprWithoutProgress);
        }
        self.timers.start_nominal(TimerId::T4);
        Action::StartImageTransfer
    }

    /// A DCN (disconnect) frame has arrived or been decided locally.
    pub fn on_dcn(&mut self) -> Action {
        let status = match self.state {
            State::PhaseBAwaitingCommand | State::PhaseBAwaitingTraining | State::PhaseBTrainingCheck => {
                CompletionStatus::DcnDuringPhaseB
            }
            State::PhaseCImageTransfer => CompletionStatus::DcnDuringPhaseC,
            State::PhaseDAwaitingPageResponse | State::PhaseDDecidingNextAction => {
                CompletionStatus::DcnDuringPhaseD
            }
            _ => CompletionStatus::DcnReceived,
        };
        self.state = State::Done(status);
        Action::NotifyPhaseE(status)
    }
}

/// A DCS command frame's capabilities must be a subset of what the
/// receiving side advertised in its DIS (§4 invariant).
fn is_subset(dcs: &CapabilitySet, dis: &CapabilitySet) -> bool {
    dis.modems.contains(dcs.modems) && dis.compressions.contains(dcs.compressions) && dis.image_sizes.contains(dcs.image_sizes)
}

/// Select which fast modem a DCS's mask identifies, preferring the fastest
/// when more than one bit is set (§4.6 modem priority: V.17 > V.29 > V.27ter).
fn modem_kind_from_mask(mask: ModemMask) -> Option<ModemKind> {
    if mask.contains(ModemMask::V17) {
        Some(ModemKind::V17)
    } else if mask.contains(ModemMask::V29) {
        Some(ModemKind::V29)
    } else if mask.contains(ModemMask::V27TER) {
        Some(ModemKind::V27ter)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;

    fn session() -> SessionConfig {
        SessionConfig::default()
    }

    #[test]
    fn caller_starts_in_phase_a_with_t0_armed() {
        let fsm = Fsm::new(Role::Caller, &session());
        assert_eq!(fsm.state(), State::PhaseACalling);
    }

    #[test]
    fn t0_expiry_without_answer_times_out() {
        let mut fsm = Fsm::new(Role::Caller, &session());
        let action = fsm.tick(TimerId::T0.nominal_samples() + 1);
        assert_eq!(fsm.state(), State::Done(CompletionStatus::T1TimedOutAnswer));
        assert_eq!(action, Action::NotifyPhaseE(CompletionStatus::T1TimedOutAnswer));
    }

    #[test]
    fn dcs_superset_of_dis_is_rejected() {
        let mut fsm = Fsm::new(Role::Answerer, &session());
        fsm.send_dis();
        let mut bad_dcs = fsm.local.clone();
        bad_dcs.ecm_requested = true;
        bad_dcs.modems = crate::config::ModemMask::V27TER
            .union(crate::config::ModemMask::V29)
            .union(crate::config::ModemMask::V17)
            .union(crate::config::ModemMask::V34HDX);
        let result = fsm.on_dcs_received(&bad_dcs, 9600);
        assert!(matches!(result, Err(T30Error::DcsNotSubsetOfDis)));
    }

    #[test]
    fn training_failure_retries_then_falls_back() {
        let mut fsm = Fsm::new(Role::Answerer, &session());
        fsm.send_dis();
        let dcs = fsm.local.clone();
        fsm.on_dcs_received(&dcs, 9600).unwrap();
        for _ in 0..MAX_COMMAND_RETRIES {
            let action = fsm.on_training_result(false);
            assert_eq!(action, Action::SendFrame(Fcf::Ftt));
        }
        let action = fsm.on_training_result(false);
        assert_eq!(fsm.negotiated_bit_rate(), Some(7200));
        assert_eq!(action, Action::SendFrame(Fcf::Ftt));
    }

    #[test]
    fn ppr_without_progress_trips_after_four_rounds() {
        let mut fsm = Fsm::new(Role::Answerer, &session());
        for _ in 0..3 {
            let action = fsm.on_ppr_received();
            assert_eq!(action, Action::StartImageTransfer);
        }
        let action = fsm.on_ppr_received();
        assert_eq!(fsm.state(), State::Done(CompletionStatus::PprWithoutProgress));
        assert_eq!(action, Action::NotifyPhaseE(CompletionStatus::PprWithoutProgress));
    }

    #[test]
    fn mcf_response_confirms_the_page() {
        let mut fsm = Fsm::new(Role::Answerer, &session());
        fsm.state = State::PhaseDAwaitingPageResponse;
        let action = fsm.on_page_response(Fcf::Mcf);
        assert_eq!(action, Action::NotifyPhaseD(PageResult::Confirmed));
        assert_eq!(fsm.state(), State::PhaseDDecidingNextAction);
    }

    #[test]
    fn dcn_during_image_transfer_is_reported_distinctly() {
        let mut fsm = Fsm::new(Role::Answerer, &session());
        fsm.state = State::PhaseCImageTransfer;
        let action = fsm.on_dcn();
        assert_eq!(action, Action::NotifyPhaseE(CompletionStatus::DcnDuringPhaseC));
    }
}

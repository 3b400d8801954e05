//! End-to-end scenarios over the public session/FSM API (§8).

use fax_core::config::{ModemMask, SessionConfig};
use fax_core::image::{CodingScheme, Decoder, Encoder};
use fax_core::t30::{Action, CapabilitySet, CompletionStatus, Fcf, Fsm, PageResult, Role};
use fax_core::timers::TimerId;
use fax_core::SessionCallbacks;

#[test]
fn t1_timeout_with_no_answer_reports_disconnected() {
    let session_cfg = SessionConfig::default();
    let mut fsm = Fsm::new(Role::Caller, &session_cfg);
    let action = fsm.tick(TimerId::T0.nominal_samples() + 1);
    assert_eq!(action, Action::NotifyPhaseE(CompletionStatus::T1TimedOutAnswer));
}

#[test]
fn dcs_falling_back_through_training_failures_then_succeeding() {
    let session_cfg = SessionConfig::default();
    let mut fsm = Fsm::new(Role::Answerer, &session_cfg);
    fsm.send_dis();
    let dcs = CapabilitySet { modems: ModemMask::V29, ..Default::default() };
    fsm.on_dcs_received(&dcs, 9600).unwrap();
    assert_eq!(fsm.on_training_result(false), Action::SendFrame(Fcf::Ftt));
    assert_eq!(fsm.on_training_result(false), Action::SendFrame(Fcf::Ftt));
    assert_eq!(fsm.on_training_result(false), Action::SendFrame(Fcf::Ftt));
    let action = fsm.on_training_result(true);
    assert_eq!(action, Action::SendFrame(Fcf::Cfr));
}

#[test]
fn ecm_ppr_retransmits_until_block_completes() {
    let mut buf = fax_core::t30::PartialPageBuffer::new();
    buf.reset_for_block(0);
    buf.store(0, vec![1, 2, 3]);
    buf.store(1, vec![4, 5, 6]);
    assert!(!buf.is_complete(3));
    assert_eq!(buf.missing_frames(3), vec![2]);
    buf.store(2, vec![7, 8, 9]);
    assert!(buf.is_complete(3));
    let drained = buf.drain(3);
    assert_eq!(drained, vec![1, 2, 3, 4, 5, 6, 7, 8, 9]);
}

#[test]
fn t6_all_white_page_round_trips_through_encoder_and_decoder() {
    let width = 1728usize;
    let mut encoder = Encoder::new(CodingScheme::T6, width, 196, 0);
    let mut decoder = Decoder::new(CodingScheme::T6, width, 196, 10);

    let blank_row = vec![0u8; width / 8];
    for _ in 0..5 {
        let bits = encoder.encode_row(&blank_row).unwrap();
        let decoded = decoder.decode_row(&bits, false).unwrap();
        assert_eq!(decoded, blank_row);
    }
    assert_eq!(decoder.bad_row_count(), 0);
}

#[test]
fn mcf_then_dcn_reports_page_confirmed_then_call_released() {
    let session_cfg = SessionConfig::default();
    let mut fsm = Fsm::new(Role::Answerer, &session_cfg);
    let action = fsm.on_page_response(Fcf::Mcf);
    assert_eq!(action, Action::NotifyPhaseD(PageResult::Confirmed));
    let action = fsm.on_dcn();
    assert_eq!(action, Action::NotifyPhaseE(CompletionStatus::DcnDuringPhaseD));
}

#[derive(Default)]
struct CountingCallbacks {
    phase_e_calls: u32,
    last_status: Option<CompletionStatus>,
    pages_confirmed: u32,
}

impl SessionCallbacks for CountingCallbacks {
    fn on_phase_e(&mut self, status: CompletionStatus) {
        self.phase_e_calls += 1;
        self.last_status = Some(status);
    }

    fn on_phase_d(&mut self, result: PageResult) {
        if result == PageResult::Confirmed {
            self.pages_confirmed += 1;
        }
    }
}

#[test]
fn session_reports_phase_e_exactly_once_on_timeout() {
    let mut session = fax_core::Session::new(SessionConfig::default()).unwrap();
    let mut callbacks = CountingCallbacks::default();
    session.advance_timers(TimerId::T0.nominal_samples() + 1, &mut callbacks);
    assert_eq!(callbacks.phase_e_calls, 1);
    assert_eq!(callbacks.last_status, Some(CompletionStatus::T1TimedOutAnswer));
}

#[test]
fn session_forwards_an_mcf_control_frame_into_a_page_confirmation() {
    let mut session = fax_core::Session::new(SessionConfig::default()).unwrap();
    let mut callbacks = CountingCallbacks::default();
    session.on_control_frame(Fcf::Mcf, &[], &mut callbacks).unwrap();
    assert_eq!(callbacks.pages_confirmed, 1);
    assert_eq!(session.pages_completed(), 1);
}

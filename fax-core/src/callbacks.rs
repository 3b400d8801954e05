//! Host callback traits: the external boundary a FAX session reports
//! through (§5 "callbacks"). A host implements whichever it cares about;
//! defaults are no-ops so implementing all of them is never mandatory.

use crate::t30::{CompletionStatus, PageResult};

/// Supplies and consumes one row of image pixels at a time. `width` is in
/// pixels; a `true` bit is black.
pub trait RowIo {
    /// Pull the next row to transmit, or `None` at end of page.
    fn read_row(&mut self) -> Option<Vec<u8>>;
    /// Accept one decoded row.
    fn write_row(&mut self, row: &[u8]);
}

/// Raw non-ECM HDLC frame observer, for hosts that want to see control
/// traffic as it passes (diagnostics, protocol loggers).
pub trait HdlcObserver {
    fn on_hdlc_frame(&mut self, _payload: &[u8], _ok: bool) {}
}

/// Phase-boundary and real-time notifications a host can subscribe to.
pub trait SessionCallbacks {
    /// Phase B completed: capability negotiation is finished and training
    /// is about to start (or has just finished, depending on role).
    fn on_phase_b(&mut self) {}
    /// A page finished transferring; `result` is the post-page response.
    fn on_phase_d(&mut self, _result: PageResult) {}
    /// The call is ending.
    fn on_phase_e(&mut self, _status: CompletionStatus) {}
    /// A control frame crossed the line, independent of phase (diagnostics).
    fn on_real_time_frame(&mut self, _fcf: crate::t30::Fcf, _outbound: bool) {}
    /// A document (possibly multi-page) has fully completed.
    fn on_document(&mut self, _status: CompletionStatus, _pages: u32) {}
}

/// A [`SessionCallbacks`] implementation that does nothing, for hosts that
/// only need [`RowIo`].
#[derive(Debug, Default)]
pub struct NullCallbacks;

impl SessionCallbacks for NullCallbacks {}

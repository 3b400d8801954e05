//! FAX core error types with granular categories.

use thiserror::Error;

/// Top-level error type for all FAX core operations.
#[derive(Debug, Error)]
pub enum FaxError {
    #[error("HDLC error: {0}")]
    Hdlc(#[from] HdlcError),

    #[error("image coding error: {0}")]
    Image(#[from] ImageCodingError),

    #[error("modem error: {0}")]
    Modem(#[from] ModemError),

    #[error("T.30 protocol error: {0}")]
    T30(#[from] T30Error),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// HDLC framing errors.
#[derive(Debug, Error)]
pub enum HdlcError {
    #[error("frame too short: {len} octets (minimum 2 for FCS)")]
    FrameTooShort { len: usize },

    #[error("frame exceeds maximum length: {len} > {max}")]
    FrameTooLong { len: usize, max: usize },

    #[error("frame check sequence mismatch: expected {expected:#06x}, got {actual:#06x}")]
    BadFcs { expected: u16, actual: u16 },

    #[error("abort sequence received mid-frame")]
    Aborted,
}

/// T.4/T.6 image coding errors.
#[derive(Debug, Error)]
pub enum ImageCodingError {
    #[error("image width {width} out of supported range [1, {max}]")]
    InvalidWidth { width: usize, max: usize },

    #[error("run-length overflow: column {column} exceeds image width {width}")]
    RunOverflow { column: usize, width: usize },

    #[error("decode failed to find a valid code word at bit offset {bit_offset}")]
    InvalidCodeWord { bit_offset: usize },

    #[error("EOL resync failed after {bits_scanned} bits")]
    EolResyncFailed { bits_scanned: usize },

    #[error("row bad-run threshold exceeded: {bad_rows} consecutive bad rows")]
    PageQualityExceeded { bad_rows: usize },
}

/// Fast-modem and tone-path errors.
#[derive(Debug, Error)]
pub enum ModemError {
    #[error("training failed: {reason}")]
    TrainingFailed { reason: String },

    #[error("carrier lost mid-signal")]
    CarrierLost,

    #[error("unsupported bit rate {rate} for modem {modem}")]
    UnsupportedRate { modem: &'static str, rate: usize },

    #[error("trellis decoder trace-back buffer underrun: need {need}, have {have}")]
    TraceBackUnderrun { need: usize, have: usize },
}

/// T.30 finite state machine errors.
#[derive(Debug, Error)]
pub enum T30Error {
    #[error("timer {timer} expired in state {state}")]
    TimerExpired { timer: &'static str, state: String },

    #[error("unexpected frame type {frame_type:#04x} in state {state}")]
    UnexpectedFrame { frame_type: u8, state: String },

    #[error("DCS is not a subset of the received DIS")]
    DcsNotSubsetOfDis,

    #[error("DCS advertises no modem this core can select from")]
    NoCommonModem,

    #[error("DCS selected bit rate {rate} is not valid for {modem:?}")]
    UnsupportedBitRateForModem { modem: crate::modems::ModemKind, rate: u32 },

    #[error("retry limit exceeded for command {command}")]
    RetryLimitExceeded { command: &'static str },

    #[error("PPR received {count} times without progress on block {block}")]
    PprStalled { count: u32, block: u32 },

    #[error("no mutually supported modem rate remains")]
    NoFallbackRate,
}

/// Configuration errors, rejected synchronously at the API boundary.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("identifier exceeds 20 ASCII bytes: {len}")]
    IdentifierTooLong { len: usize },

    #[error("identifier contains non-ASCII byte at index {index}")]
    IdentifierNotAscii { index: usize },

    #[error("empty identifier is not permitted here")]
    EmptyIdentifier,

    #[error("signal_on_power_threshold ({on}) must be >= signal_off_power_threshold ({off})")]
    AgcThresholdOrder { on: f64, off: f64 },

    #[error("no modem selected in supported_modems mask")]
    NoModemSelected,

    #[error("opaque blob exceeds maximum length: {len} > {max}")]
    BlobTooLong { len: usize, max: usize },
}

/// Result type alias for FAX core operations.
pub type Result<T> = std::result::Result<T, FaxError>;

//! FAX core library
//!
//! A Rust-native core for the T.30 facsimile protocol: the call state
//! machine, V.21/V.27ter/V.29/V.17 modem orchestration, the shared
//! fast-modem DSP receive chain, and T.4/T.6 bi-level image coding, all
//! operating on 8 kHz PCM audio.

pub mod callbacks;
pub mod config;
pub mod dc_agc;
pub mod dds;
pub mod errors;
pub mod godard;
pub mod hdlc;
pub mod image;
pub mod logging;
pub mod modems;
pub mod orchestrator;
pub mod power_meter;
pub mod session;
pub mod t30;
pub mod timers;
pub mod tone;
pub mod utils;
pub mod v8;
pub mod vecops;

pub use callbacks::{HdlcObserver, NullCallbacks, RowIo, SessionCallbacks};
pub use errors::{FaxError, Result};
pub use session::Session;

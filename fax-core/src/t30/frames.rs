//! T.30 control frames: facsimile control field (FCF) codes, DIS/DCS
//! capability bitmaps, and the T.33 sub-address field encoding (§4.6,
//! original T.30 FCF assignments recovered from the reference headers).

use crate::config::{CompressionMask, FeatureMask, ImageSizeMask, ModemMask};
use crate::errors::ConfigError;

/// Facsimile Control Field values (low 6 bits of the first HDLC octet
/// after address/control, final-frame bit excluded).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fcf {
    Dis,
    Dtc,
    Dcs,
    Cfr,
    Ftt,
    Csi,
    Tsi,
    Cig,
    Nsf,
    Nsc,
    Nss,
    Pwd,
    Sub,
    Sep,
    Mps,
    Eom,
    Eop,
    PriMps,
    PriEom,
    PriEop,
    Mcf,
    Rtp,
    Rtn,
    Pip,
    Pin,
    Dcn,
    Crp,
    Ctc,
    Ctr,
    PpsNull,
    PpsMps,
    PpsEom,
    PpsEop,
    EorNull,
    EorMps,
    EorEom,
    EorEop,
    Ppr,
    Rnr,
    Rr,
    Ern,
}

impl Fcf {
    pub fn to_octet(self) -> u8 {
        match self {
            Fcf::Dis => 0x01,
            Fcf::Dtc => 0x81,
            Fcf::Dcs => 0x41,
            Fcf::Cfr => 0x21,
            Fcf::Ftt => 0xA1,
            Fcf::Csi => 0x01 | 0x02,
            Fcf::Tsi => 0x81 | 0x02,
            Fcf::Cig => 0x41 | 0x02,
            Fcf::Nsf => 0x04,
            Fcf::Nsc => 0x84,
            Fcf::Nss => 0x44,
            Fcf::Pwd => 0x24,
            Fcf::Sub => 0x64,
            Fcf::Sep => 0xA4,
            Fcf::Mps => 0x0D,
            Fcf::Eom => 0x8D,
            Fcf::Eop => 0x4D,
            Fcf::PriMps => 0x6D,
            Fcf::PriEom => 0xED,
            Fcf::PriEop => 0x2D,
            Fcf::Mcf => 0x31,
            Fcf::Rtp => 0xB1,
            Fcf::Rtn => 0x71,
            Fcf::Pip => 0xF1,
            Fcf::Pin => 0x11,
            Fcf::Dcn => 0x5F,
            Fcf::Crp => 0x9F,
            Fcf::Ctc => 0x49,
            Fcf::Ctr => 0x89,
            Fcf::PpsNull => 0x9D,
            Fcf::PpsMps => 0x0F,
            Fcf::PpsEom => 0x8F,
            Fcf::PpsEop => 0x4F,
            Fcf::EorNull => 0x69,
            Fcf::EorMps => 0x65,
            Fcf::EorEom => 0xE5,
            Fcf::EorEop => 0x25,
            Fcf::Ppr => 0xB9,
            Fcf::Rnr => 0xB4,
            Fcf::Rr => 0xF4,
            Fcf::Ern => 0x29,
        }
    }

    pub fn from_octet(octet: u8) -> Option<Self> {
        let all = [
            Fcf::Dis, Fcf::Dtc, Fcf::Dcs, Fcf::Cfr, Fcf::Ftt, Fcf::Csi, Fcf::Tsi, Fcf::Cig,
            Fcf::Nsf, Fcf::Nsc, Fcf::Nss, Fcf::Pwd, Fcf::Sub, Fcf::Sep, Fcf::Mps, Fcf::Eom,
            Fcf::Eop, Fcf::PriMps, Fcf::PriEom, Fcf::PriEop, Fcf::Mcf, Fcf::Rtp, Fcf::Rtn,
            Fcf::Pip, Fcf::Pin, Fcf::Dcn, Fcf::Crp, Fcf::Ctc, Fcf::Ctr, Fcf::PpsNull,
            Fcf::PpsMps, Fcf::PpsEom, Fcf::PpsEop, Fcf::EorNull, Fcf::EorMps, Fcf::EorEom,
            Fcf::EorEop, Fcf::Ppr, Fcf::Rnr, Fcf::Rr, Fcf::Ern,
        ];
        all.into_iter().find(|f| f.to_octet() == octet)
    }
}

/// Decoded DIS/DTC/DCS capability bitmap (§6 "Capability flags").
#[derive(Debug, Clone, Default)]
pub struct CapabilitySet {
    pub modems: ModemMask,
    pub compressions: CompressionMask,
    pub image_sizes: ImageSizeMask,
    pub features: FeatureMask,
    pub ecm_requested: bool,
}

/// T.33 sub-address field kind, distinguishing a plain sub-address from
/// the extended forms used for selective polling / password exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum T33Kind {
    None,
    SubAddress,
    Extended,
}

/// T.33 sub-address field: up to 20 BCD-reversible digits, stored as
/// ASCII for simplicity and reversed on the wire (the digits are
/// transmitted least-significant-first, per T.30 §5.3.6.2.11).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubAddressField {
    pub kind: T33Kind,
    pub digits: String,
}

impl SubAddressField {
    pub const MAX_DIGITS: usize = 20;

    pub fn new(kind: T33Kind, digits: &str) -> Result<Self, ConfigError> {
        if digits.len() > Self::MAX_DIGITS {
            return Err(ConfigError::IdentifierTooLong { len: digits.len() });
        }
        if !digits.bytes().all(|b| b.is_ascii()) {
            return Err(ConfigError::IdentifierNotAscii { index: 0 });
        }
        Ok(Self { kind, digits: digits.to_string() })
    }

    /// Reverse the digit order for wire transmission (least-significant
    /// digit first), matching `t30_set_tx_sub_address`'s on-wire form.
    pub fn to_wire_bytes(&self) -> Vec<u8> {
        self.digits.bytes().rev().collect()
    }

    pub fn from_wire_bytes(kind: T33Kind, bytes: &[u8]) -> Result<Self, ConfigError> {
        let digits: String = bytes.iter().rev().map(|&b| b as char).collect();
        Self::new(kind, &digits)
    }
}

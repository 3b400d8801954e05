//! Configuration types for a FAX session: capability masks, AGC/timer
//! parameters and identifiers exchanged during phase B.

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

/// Modem capability bits (DIS/DCS "supported modems" mask).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModemMask(pub u16);

impl ModemMask {
    pub const V27TER: Self = Self(1 << 0);
    pub const V29: Self = Self(1 << 1);
    pub const V17: Self = Self(1 << 2);
    pub const V34HDX: Self = Self(1 << 3);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    pub const fn intersection(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl Default for ModemMask {
    fn default() -> Self {
        Self::V27TER.union(Self::V29).union(Self::V17)
    }
}

/// Compression capability bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressionMask(pub u8);

impl CompressionMask {
    pub const T4_1D: Self = Self(1 << 0);
    pub const T4_2D: Self = Self(1 << 1);
    pub const T6: Self = Self(1 << 2);
    pub const T85: Self = Self(1 << 3);
    pub const T85_L0: Self = Self(1 << 4);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    pub const fn intersection(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }
}

impl Default for CompressionMask {
    fn default() -> Self {
        Self::T4_1D.union(Self::T4_2D).union(Self::T6)
    }
}

/// T.30 feature bits: ECM, selective polling, sub-addressing, password.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureMask(pub u8);

impl FeatureMask {
    pub const ECM: Self = Self(1 << 0);
    pub const SELECTIVE_POLLING: Self = Self(1 << 1);
    pub const SUB_ADDRESSING: Self = Self(1 << 2);
    pub const PASSWORD: Self = Self(1 << 3);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }
}

impl Default for FeatureMask {
    fn default() -> Self {
        Self::empty()
    }
}

/// Supported page sizes (ITU Group 3 set).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSizeMask(pub u8);

impl ImageSizeMask {
    pub const A4: Self = Self(1 << 0);
    pub const B4: Self = Self(1 << 1);
    pub const A3: Self = Self(1 << 2);
    pub const UNLIMITED_LENGTH: Self = Self(1 << 3);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }
}

impl Default for ImageSizeMask {
    fn default() -> Self {
        Self::A4
    }
}

/// A single (horizontal, vertical) resolution pair from the ITU set,
/// encoded as one bit of a resolution mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub horizontal_dpi: u16,
    pub vertical_dpi: u16,
}

impl Resolution {
    pub const STANDARD: Self = Self { horizontal_dpi: 204, vertical_dpi: 98 };
    pub const FINE: Self = Self { horizontal_dpi: 204, vertical_dpi: 196 };
    pub const SUPERFINE: Self = Self { horizontal_dpi: 204, vertical_dpi: 391 };

    /// K-factor: the number of 2D rows coded between mandatory 1D rows,
    /// which depends on the chosen vertical resolution (§4.5).
    pub fn k_factor(self) -> usize {
        match self.vertical_dpi {
            98 => 2,
            196 => 4,
            391 => 8,
            _ => 4,
        }
    }
}

/// ASCII identifier up to 20 bytes, as carried in TSI/CSI/CIG frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifier(String);

impl Identifier {
    pub const MAX_LEN: usize = 20;

    pub fn new(s: impl Into<String>) -> Result<Self, ConfigError> {
        let s = s.into();
        if s.len() > Self::MAX_LEN {
            return Err(ConfigError::IdentifierTooLong { len: s.len() });
        }
        if let Some(index) = s.bytes().position(|b| !b.is_ascii()) {
            return Err(ConfigError::IdentifierNotAscii { index });
        }
        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Right-space-padded wire form, 20 bytes.
    pub fn to_padded_bytes(&self) -> [u8; Self::MAX_LEN] {
        let mut buf = [b' '; Self::MAX_LEN];
        let bytes = self.0.as_bytes();
        buf[..bytes.len()].copy_from_slice(bytes);
        buf
    }

    /// Digits transmitted in reverse order per T.30 §5.3.6.2.5.
    pub fn to_reversed_digit_wire(&self) -> Vec<u8> {
        let mut padded = self.to_padded_bytes().to_vec();
        padded.reverse();
        padded
    }
}

/// DC blocker + AGC configuration (C1, §4.1).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AgcConfig {
    pub signal_target_power: f64,
    pub signal_on_power_threshold: f64,
    pub signal_off_power_threshold: f64,
    pub signal_on_persistence: u32,
    pub signal_off_persistence: u32,
    pub adapt: bool,
}

impl AgcConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.signal_on_power_threshold < self.signal_off_power_threshold {
            return Err(ConfigError::AgcThresholdOrder {
                on: self.signal_on_power_threshold,
                off: self.signal_off_power_threshold,
            });
        }
        Ok(())
    }
}

impl Default for AgcConfig {
    fn default() -> Self {
        Self {
            signal_target_power: dbm0_to_energy(-10.0),
            signal_on_power_threshold: dbm0_to_energy(-43.0),
            signal_off_power_threshold: dbm0_to_energy(-48.0),
            signal_on_persistence: 2,
            signal_off_persistence: 2,
            adapt: true,
        }
    }
}

/// Convert a dBm0 level to per-chunk energy, matching the teacher's
/// "power expressed as energy accumulated per analysis chunk" convention.
pub fn dbm0_to_energy(dbm0: f64) -> f64 {
    10f64.powf(dbm0 / 10.0)
}

/// Maximum length, in octets, of an opaque NSF/NSC/NSS blob.
pub const MAX_OPAQUE_BLOB_LEN: usize = 512;

/// Arbitrary opaque binary blob (NSF/NSC/NSS), bounded at construction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpaqueBlob(Vec<u8>);

impl OpaqueBlob {
    pub fn new(bytes: Vec<u8>) -> Result<Self, ConfigError> {
        if bytes.len() > MAX_OPAQUE_BLOB_LEN {
            return Err(ConfigError::BlobTooLong { len: bytes.len(), max: MAX_OPAQUE_BLOB_LEN });
        }
        Ok(Self(bytes))
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Page-header text and time-zone rule used to stamp transmitted pages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageHeaderConfig {
    pub header_text: String,
    pub header_overlays_image: bool,
    /// UTC offset in minutes, applied to the wall-clock source's timestamp.
    pub time_zone_offset_minutes: i32,
}

/// Top-level, long-lived configuration for one FAX session (§3 "FAX session").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub calling_party: bool,
    pub supported_modems: ModemMask,
    pub supported_compressions: CompressionMask,
    pub supported_resolutions: Vec<Resolution>,
    pub supported_image_sizes: ImageSizeMask,
    pub local_ident: Option<Identifier>,
    pub sub_address: Option<String>,
    pub polled_sub_address: Option<String>,
    pub password: Option<String>,
    pub sender_ident: Option<String>,
    pub page_header: PageHeaderConfig,
    pub nsf: OpaqueBlob,
    pub nsc: OpaqueBlob,
    pub nss: OpaqueBlob,
    pub ecm_enabled: bool,
    pub keep_bad_pages: bool,
    pub supported_t30_features: FeatureMask,
    pub agc: AgcConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            calling_party: true,
            supported_modems: ModemMask::default(),
            supported_compressions: CompressionMask::default(),
            supported_resolutions: vec![Resolution::STANDARD, Resolution::FINE],
            supported_image_sizes: ImageSizeMask::default(),
            local_ident: None,
            sub_address: None,
            polled_sub_address: None,
            password: None,
            sender_ident: None,
            page_header: PageHeaderConfig::default(),
            nsf: OpaqueBlob::default(),
            nsc: OpaqueBlob::default(),
            nss: OpaqueBlob::default(),
            ecm_enabled: true,
            keep_bad_pages: false,
            supported_t30_features: FeatureMask::empty(),
            agc: AgcConfig::default(),
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.agc.validate()?;
        if self.supported_modems.is_empty() {
            return Err(ConfigError::NoModemSelected);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modem_mask_union_and_contains() {
        let mask = ModemMask::V27TER.union(ModemMask::V29);
        assert!(mask.contains(ModemMask::V27TER));
        assert!(mask.contains(ModemMask::V29));
        assert!(!mask.contains(ModemMask::V17));
    }

    #[test]
    fn identifier_rejects_overlong() {
        let long = "A".repeat(21);
        assert!(matches!(
            Identifier::new(long),
            Err(ConfigError::IdentifierTooLong { len: 21 })
        ));
    }

    #[test]
    fn identifier_padding_and_reversal() {
        let id = Identifier::new("1234").unwrap();
        let padded = id.to_padded_bytes();
        assert_eq!(&padded[..4], b"1234");
        assert_eq!(&padded[4..], &[b' '; 16]);
        let reversed = id.to_reversed_digit_wire();
        assert_eq!(reversed[0], b' ');
        assert_eq!(*reversed.last().unwrap(), b'1');
    }

    #[test]
    fn agc_config_rejects_inverted_thresholds() {
        let mut cfg = AgcConfig::default();
        cfg.signal_on_power_threshold = cfg.signal_off_power_threshold - 1.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn session_config_requires_a_modem() {
        let mut cfg = SessionConfig::default();
        cfg.supported_modems = ModemMask::empty();
        assert!(matches!(cfg.validate(), Err(ConfigError::NoModemSelected)));
    }

    #[test]
    fn resolution_k_factor_matches_vertical_dpi() {
        assert_eq!(Resolution::STANDARD.k_factor(), 2);
        assert_eq!(Resolution::FINE.k_factor(), 4);
        assert_eq!(Resolution::SUPERFINE.k_factor(), 8);
    }
}

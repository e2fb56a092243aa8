//! Parameter information base: the attribute store behind Get/Set.
//!
//! Every `set` validates the value length against the attribute's
//! band-dependent size before committing; a failed set leaves the
//! stored value untouched. Key-carrying attributes are zeroed when the
//! store is dropped.

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::eap::{
    NetworkAccessId, ACCESS_ID_SIZE_CENELEC_FCC, ACCESS_ID_SIZE_P_ARIB, ACCESS_ID_SIZE_S_ARIB,
};

/// Default response timeout, in seconds.
pub const DEFAULT_MSG_TIMEOUT_SECS: u16 = 300;

/// Frequency band the node is provisioned for; fixes identifier sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceBand {
    CenelecFcc,
    Arib,
}

/// Attributes exposed through the information base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Attribute {
    ShortId = 0x00,
    PanId = 0x01,
    Psk = 0x02,
    Gmk = 0x03,
    RekeyGmk = 0x04,
    RandomChallenge = 0x05,
    MessageTimeout = 0x06,
    NetworkAccessIdS = 0x07,
    NetworkAccessIdP = 0x08,
}

/// Status of a Get/Set operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PibStatus {
    Ok,
    Nok,
    UnsupportedParameter,
    InvalidIndex,
    InvalidLength,
    InvalidValue,
}

/// The attribute store.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Pib {
    #[zeroize(skip)]
    band: DeviceBand,
    short_id: [u8; 2],
    pan_id: [u8; 2],
    psk: [u8; 16],
    gmk: [[u8; 16]; 2],
    rekey_gmk: [u8; 16],
    random_challenge: [u8; 16],
    msg_timeout_secs: [u8; 2],
    id_s: Vec<u8>,
    id_p: Vec<u8>,
}

impl core::fmt::Debug for Pib {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Pib")
            .field("band", &self.band)
            .field("short_id", &u16::from_be_bytes(self.short_id))
            .field("pan_id", &u16::from_be_bytes(self.pan_id))
            .finish_non_exhaustive()
    }
}

impl Pib {
    pub fn new(band: DeviceBand) -> Self {
        let id_len = match band {
            DeviceBand::CenelecFcc => ACCESS_ID_SIZE_CENELEC_FCC,
            DeviceBand::Arib => ACCESS_ID_SIZE_S_ARIB,
        };
        Self {
            band,
            short_id: [0xFF, 0xFF],
            pan_id: [0, 0],
            psk: [0; 16],
            gmk: [[0; 16]; 2],
            rekey_gmk: [0; 16],
            random_challenge: [0; 16],
            msg_timeout_secs: DEFAULT_MSG_TIMEOUT_SECS.to_be_bytes(),
            id_s: vec![0; id_len],
            id_p: vec![0; id_len],
        }
    }

    #[must_use]
    pub fn band(&self) -> DeviceBand {
        self.band
    }

    /// Valid length range for an attribute, `(min, max)`.
    fn length_bounds(&self, attribute: Attribute) -> (usize, usize) {
        match attribute {
            Attribute::ShortId | Attribute::PanId | Attribute::MessageTimeout => (2, 2),
            Attribute::Psk
            | Attribute::Gmk
            | Attribute::RekeyGmk
            | Attribute::RandomChallenge => (16, 16),
            Attribute::NetworkAccessIdS => match self.band {
                DeviceBand::CenelecFcc => (ACCESS_ID_SIZE_CENELEC_FCC, ACCESS_ID_SIZE_CENELEC_FCC),
                DeviceBand::Arib => (1, ACCESS_ID_SIZE_S_ARIB),
            },
            Attribute::NetworkAccessIdP => match self.band {
                DeviceBand::CenelecFcc => (ACCESS_ID_SIZE_CENELEC_FCC, ACCESS_ID_SIZE_CENELEC_FCC),
                DeviceBand::Arib => (1, ACCESS_ID_SIZE_P_ARIB),
            },
        }
    }

    /// Set an attribute. The stored value changes only on `Ok`.
    pub fn set(&mut self, attribute: Attribute, index: u16, value: &[u8]) -> PibStatus {
        let max_index = if attribute == Attribute::Gmk { 1 } else { 0 };
        if index > max_index {
            return PibStatus::InvalidIndex;
        }

        let (min, max) = self.length_bounds(attribute);
        if value.len() < min || value.len() > max {
            return PibStatus::InvalidLength;
        }

        match attribute {
            Attribute::ShortId => self.short_id.copy_from_slice(value),
            Attribute::PanId => self.pan_id.copy_from_slice(value),
            Attribute::Psk => self.psk.copy_from_slice(value),
            Attribute::Gmk => self.gmk[usize::from(index)].copy_from_slice(value),
            Attribute::RekeyGmk => self.rekey_gmk.copy_from_slice(value),
            Attribute::RandomChallenge => self.random_challenge.copy_from_slice(value),
            Attribute::MessageTimeout => self.msg_timeout_secs.copy_from_slice(value),
            Attribute::NetworkAccessIdS => {
                self.id_s.zeroize();
                self.id_s = value.to_vec();
            }
            Attribute::NetworkAccessIdP => {
                self.id_p.zeroize();
                self.id_p = value.to_vec();
            }
        }
        PibStatus::Ok
    }

    /// Get an attribute value.
    pub fn get(&self, attribute: Attribute, index: u16) -> Result<Vec<u8>, PibStatus> {
        let max_index = if attribute == Attribute::Gmk { 1 } else { 0 };
        if index > max_index {
            return Err(PibStatus::InvalidIndex);
        }
        Ok(match attribute {
            Attribute::ShortId => self.short_id.to_vec(),
            Attribute::PanId => self.pan_id.to_vec(),
            Attribute::Psk => self.psk.to_vec(),
            Attribute::Gmk => self.gmk[usize::from(index)].to_vec(),
            Attribute::RekeyGmk => self.rekey_gmk.to_vec(),
            Attribute::RandomChallenge => self.random_challenge.to_vec(),
            Attribute::MessageTimeout => self.msg_timeout_secs.to_vec(),
            Attribute::NetworkAccessIdS => self.id_s.clone(),
            Attribute::NetworkAccessIdP => self.id_p.clone(),
        })
    }

    // Typed accessors used by the state machines.

    #[must_use]
    pub fn short_id(&self) -> u16 {
        u16::from_be_bytes(self.short_id)
    }

    #[must_use]
    pub fn pan_id(&self) -> u16 {
        u16::from_be_bytes(self.pan_id)
    }

    #[must_use]
    pub fn psk(&self) -> &[u8; 16] {
        &self.psk
    }

    #[must_use]
    pub fn gmk(&self, index: usize) -> &[u8; 16] {
        &self.gmk[index]
    }

    #[must_use]
    pub fn rekey_gmk(&self) -> &[u8; 16] {
        &self.rekey_gmk
    }

    /// The provisioned random challenge; all-zero means "generate one".
    #[must_use]
    pub fn random_challenge(&self) -> Option<[u8; 16]> {
        if self.random_challenge == [0; 16] {
            None
        } else {
            Some(self.random_challenge)
        }
    }

    #[must_use]
    pub fn msg_timeout_ms(&self) -> u64 {
        u64::from(u16::from_be_bytes(self.msg_timeout_secs)) * 1000
    }

    /// The network access identifier announced by the coordinator.
    pub fn id_s(&self) -> NetworkAccessId {
        NetworkAccessId::new(&self.id_s).expect("stored identifier was length-validated on set")
    }

    /// The network access identifier presented by the device.
    pub fn id_p(&self) -> NetworkAccessId {
        NetworkAccessId::new(&self.id_p).expect("stored identifier was length-validated on set")
    }
}

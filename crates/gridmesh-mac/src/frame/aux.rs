//! Auxiliary security header encoding and decoding.
//!
//! Present when `security_enabled` is set in the frame control. Wire
//! layout (6 bytes):
//!
//! ```text
//! [control: 1] [frame_counter: 4 LE] [key_identifier: 1]
//! ```
//!
//! The control byte packs `security_level` in bits 0-2 and
//! `key_id_mode` in bits 3-4; bits 5-7 are reserved.

use crate::constants::{SecurityLevel, SECURITY_HEADER_SIZE};
use crate::error::FrameError;

/// Key identifier mode (2-bit field). The mesh uses explicit 1-byte key
/// identifiers (mode 1); mode 0 (implicit) carries no identifier.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum KeyIdMode {
    Implicit = 0,
    #[default]
    Index = 1,
}

impl KeyIdMode {
    pub fn from_u8(v: u8) -> Result<Self, FrameError> {
        match v {
            0 => Ok(KeyIdMode::Implicit),
            1 => Ok(KeyIdMode::Index),
            _ => Err(FrameError::InvalidKeyIdMode(v)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuxSecurityHeader {
    pub security_level: SecurityLevel,
    pub key_id_mode: KeyIdMode,
    pub frame_counter: u32,
    pub key_id: u8,
}

impl AuxSecurityHeader {
    /// Encoded size in octets.
    pub const SIZE: usize = SECURITY_HEADER_SIZE;

    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.len() < Self::SIZE {
            return Err(FrameError::TooShort {
                min: Self::SIZE,
                actual: bytes.len(),
            });
        }

        let control = bytes[0];
        let security_level = SecurityLevel::from_u8(control & 0x07)?;
        let key_id_mode = KeyIdMode::from_u8((control >> 3) & 0x03)?;
        let frame_counter = u32::from_le_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);
        let key_id = bytes[5];

        Ok(AuxSecurityHeader {
            security_level,
            key_id_mode,
            frame_counter,
            key_id,
        })
    }

    pub fn encode(&self, out: &mut alloc::vec::Vec<u8>) {
        let control = (self.security_level as u8) | ((self.key_id_mode as u8) << 3);
        out.push(control);
        out.extend_from_slice(&self.frame_counter.to_le_bytes());
        out.push(self.key_id);
    }
}

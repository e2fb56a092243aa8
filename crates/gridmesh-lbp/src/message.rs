//! Bootstrap (LBP) frame encoding and decoding.
//!
//! Every bootstrap frame shares a 10-byte prefix:
//!
//! ```text
//! byte 0: message type (high nibble) | media type (bit 3) | disable backup (bit 2)
//! byte 1: reserved transaction id, always 0
//! bytes 2..10: device EUI-64
//! bytes 10..: bootstrap payload (EAP message or configuration TLVs)
//! ```

use gridmesh_mac::{ExtendedAddress, Transport};

use crate::error::LbpError;

const HEADER_SIZE: usize = 10;

/// Bootstrap message types (high nibble of the first octet).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    /// Device → coordinator, carrying join-request or EAP responses.
    Joining = 0x01,
    /// Device → coordinator, voluntary leave.
    KickFromDevice = 0x04,
    /// Coordinator → device, join complete (or configuration push).
    Accepted = 0x09,
    /// Coordinator → device, EAP challenge.
    Challenge = 0x0A,
    /// Coordinator → device, join refused.
    Decline = 0x0B,
    /// Coordinator → device, forced removal.
    KickToDevice = 0x0C,
}

impl MessageType {
    pub fn from_u8(v: u8) -> Result<Self, LbpError> {
        match v {
            0x01 => Ok(MessageType::Joining),
            0x04 => Ok(MessageType::KickFromDevice),
            0x09 => Ok(MessageType::Accepted),
            0x0A => Ok(MessageType::Challenge),
            0x0B => Ok(MessageType::Decline),
            0x0C => Ok(MessageType::KickToDevice),
            other => Err(LbpError::UnknownMessageType(other)),
        }
    }
}

/// A decoded bootstrap frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LbpFrame {
    pub msg_type: MessageType,
    /// Medium the frame is to be sent on. Kick and rekey frames always
    /// carry the power-line value.
    pub media_type: Transport,
    pub disable_backup: bool,
    pub eui64: ExtendedAddress,
    pub payload: Vec<u8>,
}

impl LbpFrame {
    pub fn new(
        msg_type: MessageType,
        media_type: Transport,
        disable_backup: bool,
        eui64: ExtendedAddress,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            msg_type,
            media_type,
            disable_backup,
            eui64,
            payload,
        }
    }

    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let media_bit = match self.media_type {
            Transport::PowerLine => 0u8,
            Transport::Radio => 1u8,
        };
        let mut out = Vec::with_capacity(HEADER_SIZE + self.payload.len());
        out.push(((self.msg_type as u8) << 4) | (media_bit << 3) | (u8::from(self.disable_backup) << 2));
        out.push(0); // transaction id is reserved
        out.extend_from_slice(self.eui64.as_ref());
        out.extend_from_slice(&self.payload);
        out
    }

    pub fn decode(raw: &[u8]) -> Result<Self, LbpError> {
        if raw.len() < HEADER_SIZE {
            return Err(LbpError::TooShort {
                min: HEADER_SIZE,
                actual: raw.len(),
            });
        }

        let msg_type = MessageType::from_u8(raw[0] >> 4)?;
        let media_type = if (raw[0] >> 3) & 0x01 != 0 {
            Transport::Radio
        } else {
            Transport::PowerLine
        };
        let disable_backup = (raw[0] >> 2) & 0x01 != 0;

        let mut eui64 = [0u8; 8];
        eui64.copy_from_slice(&raw[2..10]);

        Ok(LbpFrame {
            msg_type,
            media_type,
            disable_backup,
            eui64: ExtendedAddress::new(eui64),
            payload: raw[HEADER_SIZE..].to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EUI: [u8; 8] = [0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88];

    #[test]
    fn test_joining_roundtrip() {
        let frame = LbpFrame::new(
            MessageType::Joining,
            Transport::Radio,
            true,
            ExtendedAddress::new(EUI),
            vec![0xDE, 0xAD],
        );
        let raw = frame.encode();
        assert_eq!(raw[0], (0x01 << 4) | (1 << 3) | (1 << 2));
        assert_eq!(raw[1], 0);
        assert_eq!(&raw[2..10], &EUI);
        assert_eq!(LbpFrame::decode(&raw).unwrap(), frame);
    }

    #[test]
    fn test_kick_has_empty_payload() {
        let frame = LbpFrame::new(
            MessageType::KickFromDevice,
            Transport::PowerLine,
            false,
            ExtendedAddress::new(EUI),
            Vec::new(),
        );
        let raw = frame.encode();
        assert_eq!(raw.len(), 10);
        assert_eq!(raw[0], 0x04 << 4);
        assert_eq!(LbpFrame::decode(&raw).unwrap(), frame);
    }

    #[test]
    fn test_all_message_types_roundtrip() {
        for (ty, raw_val) in [
            (MessageType::Joining, 0x01u8),
            (MessageType::KickFromDevice, 0x04),
            (MessageType::Accepted, 0x09),
            (MessageType::Challenge, 0x0A),
            (MessageType::Decline, 0x0B),
            (MessageType::KickToDevice, 0x0C),
        ] {
            assert_eq!(MessageType::from_u8(raw_val).unwrap(), ty);
        }
    }

    #[test]
    fn test_unknown_message_type() {
        let mut raw = vec![0u8; 10];
        raw[0] = 0x07 << 4;
        assert!(matches!(
            LbpFrame::decode(&raw),
            Err(LbpError::UnknownMessageType(0x07))
        ));
    }

    #[test]
    fn test_too_short() {
        assert!(matches!(
            LbpFrame::decode(&[0x10; 9]),
            Err(LbpError::TooShort { min: 10, actual: 9 })
        ));
    }
}

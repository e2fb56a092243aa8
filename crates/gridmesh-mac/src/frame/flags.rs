//! Frame control field encoding and decoding.
//!
//! The frame control is a packed 16-bit field, transmitted
//! little-endian. Bit layout (from the least significant bit):
//!
//! ```text
//! Bits 0-2:   frame_type (0=BEACON, 1=DATA, 2=ACK, 3=COMMAND)
//! Bit 3:      security_enabled
//! Bit 4:      frame_pending
//! Bit 5:      ack_request
//! Bit 6:      pan_id_compression
//! Bits 7-9:   reserved (power-line); on radio, bit 9 is ie_present
//! Bits 10-11: dest_addr_mode (0=NONE, 2=SHORT, 3=EXTENDED)
//! Bits 12-13: frame_version
//! Bits 14-15: src_addr_mode
//! ```
//!
//! The layout is expressed as explicit mask/shift logic rather than
//! bitfields so the wire image is identical on every target.

use crate::constants::{AddressMode, FrameType, FrameVersion, Transport};
use crate::error::FrameError;

const IE_PRESENT_BIT: u16 = 1 << 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameControl {
    pub frame_type: FrameType,
    pub security_enabled: bool,
    pub frame_pending: bool,
    pub ack_request: bool,
    pub pan_id_compression: bool,
    /// Radio only; always `false` on the power-line transport, where the
    /// bit stays reserved.
    pub ie_present: bool,
    pub dest_addr_mode: AddressMode,
    pub frame_version: FrameVersion,
    pub src_addr_mode: AddressMode,
}

impl FrameControl {
    /// Decode a frame control field for the given transport.
    ///
    /// Reserved bits are ignored, matching receiver behavior of the
    /// standard. On the power-line transport bit 9 is reserved too, so
    /// `ie_present` always decodes as `false` there.
    pub fn from_u16(raw: u16, transport: Transport) -> Result<Self, FrameError> {
        let frame_type = FrameType::from_u8((raw & 0x07) as u8)?;
        let security_enabled = (raw >> 3) & 0x01 != 0;
        let frame_pending = (raw >> 4) & 0x01 != 0;
        let ack_request = (raw >> 5) & 0x01 != 0;
        let pan_id_compression = (raw >> 6) & 0x01 != 0;
        let ie_present = match transport {
            Transport::PowerLine => false,
            Transport::Radio => raw & IE_PRESENT_BIT != 0,
        };
        let dest_addr_mode = AddressMode::from_u8(((raw >> 10) & 0x03) as u8)?;
        let frame_version = FrameVersion::from_u8(((raw >> 12) & 0x03) as u8)?;
        let src_addr_mode = AddressMode::from_u8(((raw >> 14) & 0x03) as u8)?;

        Ok(FrameControl {
            frame_type,
            security_enabled,
            frame_pending,
            ack_request,
            pan_id_compression,
            ie_present,
            dest_addr_mode,
            frame_version,
            src_addr_mode,
        })
    }

    /// Encode the frame control field for the given transport.
    ///
    /// Returns an error if `ie_present` is set on the power-line
    /// transport, where that bit must stay reserved.
    pub fn to_u16(&self, transport: Transport) -> Result<u16, FrameError> {
        if self.ie_present && transport == Transport::PowerLine {
            return Err(FrameError::IePresentOnPowerLine);
        }

        let mut raw = self.frame_type as u16;
        raw |= u16::from(self.security_enabled) << 3;
        raw |= u16::from(self.frame_pending) << 4;
        raw |= u16::from(self.ack_request) << 5;
        raw |= u16::from(self.pan_id_compression) << 6;
        if self.ie_present {
            raw |= IE_PRESENT_BIT;
        }
        raw |= (self.dest_addr_mode as u16) << 10;
        raw |= (self.frame_version as u16) << 12;
        raw |= (self.src_addr_mode as u16) << 14;
        Ok(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data_flags() -> FrameControl {
        FrameControl {
            frame_type: FrameType::Data,
            security_enabled: false,
            frame_pending: false,
            ack_request: false,
            pan_id_compression: false,
            ie_present: false,
            dest_addr_mode: AddressMode::Short,
            frame_version: FrameVersion::Ieee2006,
            src_addr_mode: AddressMode::Short,
        }
    }

    #[test]
    fn test_known_packing() {
        // DATA, secured, ack requested, compressed, short/short, v2006:
        // 0b10_01_10_000_1_0_0_1_001
        let fc = FrameControl {
            security_enabled: true,
            ack_request: true,
            pan_id_compression: true,
            ..data_flags()
        };
        let raw = fc.to_u16(Transport::PowerLine).unwrap();
        assert_eq!(raw, 0b1001_1000_0110_1001);
        assert_eq!(FrameControl::from_u16(raw, Transport::PowerLine).unwrap(), fc);
    }

    #[test]
    fn test_ie_present_bit_only_on_radio() {
        let fc = FrameControl {
            ie_present: true,
            ..data_flags()
        };
        let raw = fc.to_u16(Transport::Radio).unwrap();
        assert_eq!(raw & (1 << 9), 1 << 9);

        assert!(matches!(
            fc.to_u16(Transport::PowerLine),
            Err(FrameError::IePresentOnPowerLine)
        ));

        // A power-line decode shifts the bit out as reserved.
        let decoded = FrameControl::from_u16(raw, Transport::PowerLine).unwrap();
        assert!(!decoded.ie_present);
    }

    #[test]
    fn test_reserved_bits_ignored_on_decode() {
        let base = data_flags().to_u16(Transport::PowerLine).unwrap();
        for reserved in [1u16 << 7, 1 << 8, 1 << 9] {
            let decoded = FrameControl::from_u16(base | reserved, Transport::PowerLine).unwrap();
            assert_eq!(decoded, data_flags(), "reserved bit {reserved:#06x}");
        }
    }

    #[test]
    fn test_reserved_addr_mode_rejected() {
        // dest_addr_mode = 1 is reserved
        let raw = 0x01u16 | (1 << 10);
        assert!(matches!(
            FrameControl::from_u16(raw, Transport::PowerLine),
            Err(FrameError::InvalidAddressMode(1))
        ));
    }

    #[test]
    fn test_roundtrip_all_valid_combinations() {
        for ft in [FrameType::Beacon, FrameType::Data, FrameType::Ack, FrameType::Command] {
            for dam in [AddressMode::None, AddressMode::Short, AddressMode::Extended] {
                for sam in [AddressMode::None, AddressMode::Short, AddressMode::Extended] {
                    for bits in 0u8..16 {
                        let fc = FrameControl {
                            frame_type: ft,
                            security_enabled: bits & 1 != 0,
                            frame_pending: bits & 2 != 0,
                            ack_request: bits & 4 != 0,
                            pan_id_compression: bits & 8 != 0,
                            ie_present: false,
                            dest_addr_mode: dam,
                            frame_version: FrameVersion::Ieee2006,
                            src_addr_mode: sam,
                        };
                        let raw = fc.to_u16(Transport::PowerLine).unwrap();
                        assert_eq!(
                            FrameControl::from_u16(raw, Transport::PowerLine).unwrap(),
                            fc
                        );
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn valid_flags_raw() -> impl Strategy<Value = u16> {
        (
            0..=3u16,
            proptest::bool::ANY,
            proptest::bool::ANY,
            proptest::bool::ANY,
            proptest::bool::ANY,
            prop_oneof![Just(0u16), Just(2u16), Just(3u16)],
            0..=2u16,
            prop_oneof![Just(0u16), Just(2u16), Just(3u16)],
        )
            .prop_map(|(ft, se, fp, ar, pc, dam, fv, sam)| {
                ft | (u16::from(se) << 3)
                    | (u16::from(fp) << 4)
                    | (u16::from(ar) << 5)
                    | (u16::from(pc) << 6)
                    | (dam << 10)
                    | (fv << 12)
                    | (sam << 14)
            })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        #[test]
        fn flags_roundtrip_plc(raw in valid_flags_raw()) {
            let fc = FrameControl::from_u16(raw, Transport::PowerLine).unwrap();
            prop_assert_eq!(fc.to_u16(Transport::PowerLine).unwrap(), raw);
        }

        #[test]
        fn flags_roundtrip_rf(raw in valid_flags_raw(), ie in proptest::bool::ANY) {
            let raw = raw | (u16::from(ie) << 9);
            let fc = FrameControl::from_u16(raw, Transport::Radio).unwrap();
            prop_assert_eq!(fc.to_u16(Transport::Radio).unwrap(), raw);
        }
    }
}

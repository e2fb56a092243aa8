//! Header information elements (radio transport only).
//!
//! Each IE starts with a packed 16-bit little-endian descriptor:
//!
//! ```text
//! Bits 0-6:  content length
//! Bits 7-14: element id
//! Bit 15:    type (0 = header IE)
//! ```
//!
//! The mesh carries two vendor HIEs, each a 3-byte CID plus sub-id:
//! Link-Info (duty cycle, tx-power offset) and Reverse-Link-Quality
//! (reverse LQI). The list is closed by a header-termination IE
//! (element id 0x7F, zero length) before the payload begins.

use alloc::vec::Vec;

use crate::error::FrameError;

/// Element id of the vendor-specific header IE.
pub const ELEMENT_ID_VENDOR: u8 = 0x00;
/// Element id of the header termination IE preceding the payload.
pub const ELEMENT_ID_TERMINATION: u8 = 0x7F;
/// Vendor CID carried by the mesh HIEs.
pub const HIE_CID: [u8; 3] = [0x00, 0x37, 0x10];

const SUB_ID_LINK_INFO: u8 = 0x01;
const SUB_ID_REVERSE_LQ: u8 = 0x02;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderIe {
    /// Duty-cycle and tx-power negotiation HIE.
    LinkInfo { duty_cycle: u8, tx_power_offset: u8 },
    /// Reverse link quality HIE.
    ReverseLinkQuality { reverse_lqi: u8 },
    /// Any other element, preserved verbatim.
    Unknown { element_id: u8, content: Vec<u8> },
}

fn descriptor(length: usize, element_id: u8) -> u16 {
    (length as u16 & 0x7F) | (u16::from(element_id) << 7)
}

impl HeaderIe {
    fn encode(&self, out: &mut Vec<u8>) {
        match self {
            HeaderIe::LinkInfo {
                duty_cycle,
                tx_power_offset,
            } => {
                out.extend_from_slice(&descriptor(6, ELEMENT_ID_VENDOR).to_le_bytes());
                out.extend_from_slice(&HIE_CID);
                out.push(SUB_ID_LINK_INFO);
                out.push(*duty_cycle);
                out.push(*tx_power_offset);
            }
            HeaderIe::ReverseLinkQuality { reverse_lqi } => {
                out.extend_from_slice(&descriptor(5, ELEMENT_ID_VENDOR).to_le_bytes());
                out.extend_from_slice(&HIE_CID);
                out.push(SUB_ID_REVERSE_LQ);
                out.push(*reverse_lqi);
            }
            HeaderIe::Unknown {
                element_id,
                content,
            } => {
                out.extend_from_slice(&descriptor(content.len(), *element_id).to_le_bytes());
                out.extend_from_slice(content);
            }
        }
    }
}

/// Encode a header IE list, closed by the termination IE.
pub fn encode_list(ies: &[HeaderIe], out: &mut Vec<u8>) {
    for ie in ies {
        ie.encode(out);
    }
    out.extend_from_slice(&descriptor(0, ELEMENT_ID_TERMINATION).to_le_bytes());
}

/// Parse a header IE list up to and including the termination IE.
///
/// Returns the parsed elements and the number of octets consumed. Any
/// declared length that overruns `bytes`, or a missing termination,
/// fails the parse instead of reading out of bounds.
pub fn parse_list(bytes: &[u8]) -> Result<(Vec<HeaderIe>, usize), FrameError> {
    let mut ies = Vec::new();
    let mut offset = 0usize;

    loop {
        if bytes.len() < offset + 2 {
            return Err(FrameError::UnterminatedIeList);
        }
        let raw = u16::from_le_bytes([bytes[offset], bytes[offset + 1]]);
        offset += 2;

        let length = (raw & 0x7F) as usize;
        let element_id = ((raw >> 7) & 0xFF) as u8;

        if element_id == ELEMENT_ID_TERMINATION && length == 0 {
            return Ok((ies, offset));
        }

        if bytes.len() < offset + length {
            return Err(FrameError::IeOverrun {
                declared: length,
                available: bytes.len() - offset,
            });
        }
        let content = &bytes[offset..offset + length];
        offset += length;

        ies.push(parse_element(element_id, content));
    }
}

fn parse_element(element_id: u8, content: &[u8]) -> HeaderIe {
    if element_id == ELEMENT_ID_VENDOR && content.len() >= 4 && content[..3] == HIE_CID {
        let sub_id = content[3];
        let body = &content[4..];
        match (sub_id, body.len()) {
            (SUB_ID_LINK_INFO, 2) => {
                return HeaderIe::LinkInfo {
                    duty_cycle: body[0],
                    tx_power_offset: body[1],
                };
            }
            (SUB_ID_REVERSE_LQ, 1) => {
                return HeaderIe::ReverseLinkQuality {
                    reverse_lqi: body[0],
                };
            }
            _ => {}
        }
    }
    HeaderIe::Unknown {
        element_id,
        content: content.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_empty_list_is_just_termination() {
        let mut buf = Vec::new();
        encode_list(&[], &mut buf);
        assert_eq!(buf.len(), 2);
        let (ies, consumed) = parse_list(&buf).unwrap();
        assert!(ies.is_empty());
        assert_eq!(consumed, 2);
    }

    #[test]
    fn test_link_info_roundtrip() {
        let ies = vec![HeaderIe::LinkInfo {
            duty_cycle: 37,
            tx_power_offset: 4,
        }];
        let mut buf = Vec::new();
        encode_list(&ies, &mut buf);
        // descriptor(2) + cid(3) + sub(1) + body(2) + termination(2)
        assert_eq!(buf.len(), 10);
        let (parsed, consumed) = parse_list(&buf).unwrap();
        assert_eq!(parsed, ies);
        assert_eq!(consumed, buf.len());
    }

    #[test]
    fn test_both_hies_roundtrip() {
        let ies = vec![
            HeaderIe::LinkInfo {
                duty_cycle: 10,
                tx_power_offset: 0,
            },
            HeaderIe::ReverseLinkQuality { reverse_lqi: 200 },
        ];
        let mut buf = Vec::new();
        encode_list(&ies, &mut buf);
        let (parsed, _) = parse_list(&buf).unwrap();
        assert_eq!(parsed, ies);
    }

    #[test]
    fn test_unknown_element_preserved() {
        let ies = vec![HeaderIe::Unknown {
            element_id: 0x2A,
            content: vec![1, 2, 3],
        }];
        let mut buf = Vec::new();
        encode_list(&ies, &mut buf);
        let (parsed, _) = parse_list(&buf).unwrap();
        assert_eq!(parsed, ies);
    }

    #[test]
    fn test_declared_length_overrun_is_error() {
        // descriptor claims 6 content bytes, only 2 follow
        let mut buf = Vec::new();
        buf.extend_from_slice(&descriptor(6, ELEMENT_ID_VENDOR).to_le_bytes());
        buf.extend_from_slice(&[0xAA, 0xBB]);
        assert!(matches!(
            parse_list(&buf),
            Err(FrameError::IeOverrun {
                declared: 6,
                available: 2
            })
        ));
    }

    #[test]
    fn test_missing_termination_is_error() {
        let mut buf = Vec::new();
        let ie = HeaderIe::ReverseLinkQuality { reverse_lqi: 1 };
        ie.encode(&mut buf);
        // No termination appended.
        assert!(matches!(
            parse_list(&buf),
            Err(FrameError::UnterminatedIeList)
        ));
    }

    #[test]
    fn test_truncated_descriptor_is_error() {
        assert!(matches!(
            parse_list(&[0x00]),
            Err(FrameError::UnterminatedIeList)
        ));
    }

    #[test]
    fn test_malformed_vendor_body_falls_back_to_unknown() {
        // Vendor CID with a Link-Info sub-id but a 1-byte body.
        let mut buf = Vec::new();
        buf.extend_from_slice(&descriptor(5, ELEMENT_ID_VENDOR).to_le_bytes());
        buf.extend_from_slice(&HIE_CID);
        buf.push(SUB_ID_LINK_INFO);
        buf.push(0x42);
        buf.extend_from_slice(&descriptor(0, ELEMENT_ID_TERMINATION).to_le_bytes());

        let (parsed, _) = parse_list(&buf).unwrap();
        assert!(matches!(parsed[0], HeaderIe::Unknown { element_id: 0, .. }));
    }
}

//! MAC frame wire format parsing and serialization.
//!
//! Wire layout, both transports:
//!
//! ```text
//! [frame control: 2 LE] [sequence: 1]
//! [dest PAN: 0/2] [dest address: 0/2/8]
//! [src PAN: 0/2]  [src address: 0/2/8]
//! [aux security header: 0/6]
//! [header IEs: radio only, when ie_present]
//! [payload] [FCS: 2 (power-line) / 4 (radio)]
//! ```
//!
//! The derived frame-control bits (addressing modes, `security_enabled`,
//! `ie_present`, `pan_id_compression`) are computed from the frame body
//! on encode and re-materialize the body on decode, so the struct cannot
//! disagree with its own wire image. The FCS is carried verbatim;
//! checksum validation belongs to the transport driver.

use alloc::vec::Vec;

use crate::constants::{AddressMode, FrameType, FrameVersion, Transport};
use crate::error::FrameError;
use crate::frame::aux::AuxSecurityHeader;
use crate::frame::flags::FrameControl;
use crate::frame::ie::{self, HeaderIe};
use crate::types::{Address, ExtendedAddress, PanId, ShortAddress};

/// Everything in a MAC header except the wire-derived control bits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacHeader {
    pub frame_type: FrameType,
    pub frame_version: FrameVersion,
    pub frame_pending: bool,
    pub ack_request: bool,
    pub sequence_number: u8,
    pub dest_pan_id: Option<PanId>,
    pub dest_address: Address,
    pub src_pan_id: Option<PanId>,
    pub src_address: Address,
    pub aux_security: Option<AuxSecurityHeader>,
}

/// A MAC frame for either transport.
///
/// `ies` is only meaningful on the radio transport; the power-line
/// variant has no IE area. The `fcs` field carries the received or
/// to-be-transmitted check sequence (low 16 bits on power-line).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacFrame {
    pub transport: Transport,
    pub header: MacHeader,
    pub ies: Vec<HeaderIe>,
    pub payload: Vec<u8>,
    pub fcs: u32,
}

impl MacFrame {
    /// Serialize the frame to wire bytes, FCS included.
    ///
    /// Fails when a present address lacks its PAN id (or vice versa),
    /// when IEs are attached to a power-line frame, or when the encoded
    /// PSDU exceeds the transport maximum.
    pub fn encode(&self) -> Result<Vec<u8>, FrameError> {
        let h = &self.header;

        check_pan_pairing(h.dest_address.mode(), h.dest_pan_id)?;
        check_pan_pairing(h.src_address.mode(), h.src_pan_id)?;
        if !self.ies.is_empty() && self.transport == Transport::PowerLine {
            return Err(FrameError::IePresentOnPowerLine);
        }

        let compress = match (h.dest_pan_id, h.src_pan_id) {
            (Some(d), Some(s)) => d == s,
            _ => false,
        };

        let fc = FrameControl {
            frame_type: h.frame_type,
            security_enabled: h.aux_security.is_some(),
            frame_pending: h.frame_pending,
            ack_request: h.ack_request,
            pan_id_compression: compress,
            ie_present: !self.ies.is_empty(),
            dest_addr_mode: h.dest_address.mode(),
            frame_version: h.frame_version,
            src_addr_mode: h.src_address.mode(),
        };

        let mut out = Vec::with_capacity(
            crate::constants::MAX_HEADER_SIZE + self.payload.len() + self.transport.fcs_len(),
        );
        out.extend_from_slice(&fc.to_u16(self.transport)?.to_le_bytes());
        out.push(h.sequence_number);

        if let Some(pan) = h.dest_pan_id {
            out.extend_from_slice(&pan.0.to_le_bytes());
        }
        encode_address(&h.dest_address, &mut out);

        if let Some(pan) = h.src_pan_id {
            if !compress {
                out.extend_from_slice(&pan.0.to_le_bytes());
            }
        }
        encode_address(&h.src_address, &mut out);

        if let Some(aux) = &h.aux_security {
            aux.encode(&mut out);
        }

        if !self.ies.is_empty() {
            ie::encode_list(&self.ies, &mut out);
        }

        out.extend_from_slice(&self.payload);

        match self.transport {
            Transport::PowerLine => out.extend_from_slice(&(self.fcs as u16).to_le_bytes()),
            Transport::Radio => out.extend_from_slice(&self.fcs.to_le_bytes()),
        }

        if out.len() > self.transport.max_psdu() {
            return Err(FrameError::PsduTooLong {
                max: self.transport.max_psdu(),
                actual: out.len(),
            });
        }
        Ok(out)
    }

    /// Parse a frame from wire bytes, FCS included.
    pub fn decode(raw: &[u8], transport: Transport) -> Result<Self, FrameError> {
        let fcs_len = transport.fcs_len();
        let min = 3 + fcs_len;
        if raw.len() < min {
            return Err(FrameError::TooShort {
                min,
                actual: raw.len(),
            });
        }
        if raw.len() > transport.max_psdu() {
            return Err(FrameError::PsduTooLong {
                max: transport.max_psdu(),
                actual: raw.len(),
            });
        }

        let fc = FrameControl::from_u16(u16::from_le_bytes([raw[0], raw[1]]), transport)?;
        let sequence_number = raw[2];
        let mut offset = 3usize;

        // FCS is split off first so header parsing can never read into it.
        let body = &raw[..raw.len() - fcs_len];
        let fcs_bytes = &raw[raw.len() - fcs_len..];
        let fcs = match transport {
            Transport::PowerLine => u32::from(u16::from_le_bytes([fcs_bytes[0], fcs_bytes[1]])),
            Transport::Radio => {
                u32::from_le_bytes([fcs_bytes[0], fcs_bytes[1], fcs_bytes[2], fcs_bytes[3]])
            }
        };

        let dest_pan_id = if fc.dest_addr_mode != AddressMode::None {
            Some(read_pan_id(body, &mut offset)?)
        } else {
            None
        };
        let dest_address = read_address(body, &mut offset, fc.dest_addr_mode)?;

        let src_pan_id = if fc.src_addr_mode != AddressMode::None {
            if fc.pan_id_compression {
                // A single PAN id is carried; it is valid for both ends.
                Some(dest_pan_id.ok_or(FrameError::MissingPanId)?)
            } else {
                Some(read_pan_id(body, &mut offset)?)
            }
        } else {
            None
        };
        let src_address = read_address(body, &mut offset, fc.src_addr_mode)?;

        let aux_security = if fc.security_enabled {
            let aux = AuxSecurityHeader::decode(body.get(offset..).unwrap_or(&[]))?;
            offset += AuxSecurityHeader::SIZE;
            Some(aux)
        } else {
            None
        };

        let ies = if fc.ie_present {
            let (ies, consumed) = ie::parse_list(&body[offset..])?;
            offset += consumed;
            ies
        } else {
            Vec::new()
        };

        let payload = body[offset..].to_vec();

        Ok(MacFrame {
            transport,
            header: MacHeader {
                frame_type: fc.frame_type,
                frame_version: fc.frame_version,
                frame_pending: fc.frame_pending,
                ack_request: fc.ack_request,
                sequence_number,
                dest_pan_id,
                dest_address,
                src_pan_id,
                src_address,
                aux_security,
            },
            ies,
            payload,
            fcs,
        })
    }
}

fn check_pan_pairing(mode: AddressMode, pan: Option<PanId>) -> Result<(), FrameError> {
    match (mode, pan) {
        (AddressMode::None, Some(_)) => Err(FrameError::PanIdWithoutAddress),
        (AddressMode::None, None) => Ok(()),
        (_, None) => Err(FrameError::MissingPanId),
        (_, Some(_)) => Ok(()),
    }
}

fn encode_address(addr: &Address, out: &mut Vec<u8>) {
    match addr {
        Address::None => {}
        Address::Short(s) => out.extend_from_slice(&s.0.to_le_bytes()),
        Address::Extended(e) => out.extend_from_slice(e.as_ref()),
    }
}

fn read_pan_id(body: &[u8], offset: &mut usize) -> Result<PanId, FrameError> {
    let end = *offset + 2;
    if body.len() < end {
        return Err(FrameError::TooShort {
            min: end,
            actual: body.len(),
        });
    }
    let pan = PanId(u16::from_le_bytes([body[*offset], body[*offset + 1]]));
    *offset = end;
    Ok(pan)
}

fn read_address(body: &[u8], offset: &mut usize, mode: AddressMode) -> Result<Address, FrameError> {
    let end = *offset + mode.len();
    if body.len() < end {
        return Err(FrameError::TooShort {
            min: end,
            actual: body.len(),
        });
    }
    let addr = match mode {
        AddressMode::None => Address::None,
        AddressMode::Short => Address::Short(ShortAddress(u16::from_le_bytes([
            body[*offset],
            body[*offset + 1],
        ]))),
        AddressMode::Extended => {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&body[*offset..end]);
            Address::Extended(ExtendedAddress::new(bytes))
        }
    };
    *offset = end;
    Ok(addr)
}

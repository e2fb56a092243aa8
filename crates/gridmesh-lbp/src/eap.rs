//! EAP-PSK message codec.
//!
//! The four-message authentication carried inside bootstrap frames:
//!
//! ```text
//! COORDINATOR                                DEVICE
//!     |-- 1: RandS || IdS ---------------------->|
//!     |<-- 2: RandS || RandP || MacP || IdP -----|
//!     |-- 3: RandS || MacS || channel(params) -->|
//!     |<-- 4: RandS || channel(param result) ----|
//! ```
//!
//! MacP = CMAC(AK, IdP||IdS||RandS||RandP) and MacS = CMAC(AK,
//! IdS||RandP) prove possession of the PSK and bind both random
//! challenges, so a captured exchange cannot be replayed. Messages 3
//! and 4 carry a protected channel: EAX under the session TEK whose
//! tag binds the first 22 bytes of the message (EAP header plus
//! RandS), with the compressed code field right-shifted two bits for
//! tag computation only.

use gridmesh_crypto::block::BlockCipher;
use gridmesh_crypto::cmac::{cmac, cmac_verify};
use gridmesh_crypto::eax::{eax_decrypt, eax_encrypt};
use rand::RngCore;

use crate::error::LbpError;

/// IANA-allocated EAP method type for PSK.
pub const IANA_TYPE: u8 = 0x2F;

const HEADER_SIZE: usize = 6;
/// Octets of the message bound by the protected-channel tag: the EAP
/// header plus the 16-byte server challenge.
const TAG_BOUND_PREFIX: usize = HEADER_SIZE + 16;

const T_SUBFIELD_MASK: u8 = 0xC0;
const CHANNEL_RESULT_MASK: u8 = 0xC0;
const CHANNEL_EXT_BIT: u8 = 0x20;

pub const T0: u8 = 0x00;
pub const T1: u8 = 0x40;
pub const T2: u8 = 0x80;
pub const T3: u8 = 0xC0;

/// Network access identifier sizes per frequency band.
pub const ACCESS_ID_SIZE_CENELEC_FCC: usize = 8;
pub const ACCESS_ID_SIZE_S_ARIB: usize = 34;
pub const ACCESS_ID_SIZE_P_ARIB: usize = 36;
pub const ACCESS_ID_MAX_SIZE: usize = 36;

/// EAP code values as carried on the wire (the standard codes shifted
/// left two bits, per the compressed bootstrap header).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EapCode {
    Request = 0x04,
    Response = 0x08,
    Success = 0x0C,
    Failure = 0x10,
}

impl EapCode {
    pub fn from_u8(v: u8) -> Result<Self, LbpError> {
        match v {
            0x04 => Ok(EapCode::Request),
            0x08 => Ok(EapCode::Response),
            0x0C => Ok(EapCode::Success),
            0x10 => Ok(EapCode::Failure),
            _ => Err(LbpError::Malformed("unknown EAP code")),
        }
    }
}

/// Result subfield of the protected channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ChannelResult {
    Continue = 0x01,
    DoneSuccess = 0x02,
    DoneFailure = 0x03,
}

impl ChannelResult {
    pub fn from_u8(v: u8) -> Result<Self, LbpError> {
        match v {
            0x01 => Ok(ChannelResult::Continue),
            0x02 => Ok(ChannelResult::DoneSuccess),
            0x03 => Ok(ChannelResult::DoneFailure),
            _ => Err(LbpError::Malformed("unknown protected-channel result")),
        }
    }
}

/// A 16-byte random challenge (RandS or RandP).
///
/// Challenges travel in the clear; freshness, not secrecy, is what
/// they provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Challenge(pub [u8; 16]);

impl Challenge {
    /// A fresh random challenge from the system RNG.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }
}

/// A band-sized network access identifier (IdS or IdP).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkAccessId(Vec<u8>);

impl NetworkAccessId {
    pub fn new(bytes: &[u8]) -> Result<Self, LbpError> {
        if bytes.is_empty() || bytes.len() > ACCESS_ID_MAX_SIZE {
            return Err(LbpError::Malformed("network access identifier size"));
        }
        Ok(Self(bytes.to_vec()))
    }

    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The common EAP header fields plus a borrowed view of the method data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Envelope<'a> {
    pub code: EapCode,
    pub identifier: u8,
    pub t_subfield: u8,
    pub data: &'a [u8],
}

/// Split an EAP message into its envelope.
///
/// A message whose declared length exceeds the received octet count is
/// rejected; Success/Failure carry a bare 4-byte header.
pub fn decode(message: &[u8]) -> Result<Envelope<'_>, LbpError> {
    if message.len() < 4 {
        return Err(LbpError::TooShort {
            min: 4,
            actual: message.len(),
        });
    }
    let code = EapCode::from_u8(message[0])?;
    let identifier = message[1];
    let declared = usize::from(u16::from_be_bytes([message[2], message[3]]));
    if declared > message.len() {
        return Err(LbpError::Malformed("EAP length exceeds received octets"));
    }

    if declared >= HEADER_SIZE {
        if message[4] != IANA_TYPE {
            return Err(LbpError::Malformed("not an EAP-PSK message"));
        }
        Ok(Envelope {
            code,
            identifier,
            t_subfield: message[5] & T_SUBFIELD_MASK,
            data: &message[HEADER_SIZE..declared],
        })
    } else {
        Ok(Envelope {
            code,
            identifier,
            t_subfield: 0,
            data: &[],
        })
    }
}

fn begin(code: EapCode, identifier: u8, t: u8, capacity: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(capacity);
    out.push(code as u8);
    out.push(identifier);
    out.extend_from_slice(&[0, 0]); // length patched at the end
    out.push(IANA_TYPE);
    out.push(t);
    out
}

fn patch_length(message: &mut [u8]) {
    let len = message.len() as u16;
    message[2..4].copy_from_slice(&len.to_be_bytes());
}

/// Encode the first message: the coordinator's challenge and identity.
#[must_use]
pub fn encode_message1(identifier: u8, rand_s: &Challenge, id_s: &NetworkAccessId) -> Vec<u8> {
    let mut out = begin(EapCode::Request, identifier, T0, 30);
    out.extend_from_slice(&rand_s.0);
    out.extend_from_slice(id_s.as_slice());
    patch_length(&mut out);
    out
}

/// Decode the first message into `(rand_s, id_s)`.
pub fn decode_message1(data: &[u8]) -> Result<(Challenge, NetworkAccessId), LbpError> {
    if data.len() < 16 {
        return Err(LbpError::TooShort {
            min: 16,
            actual: data.len(),
        });
    }
    let mut rand_s = [0u8; 16];
    rand_s.copy_from_slice(&data[..16]);
    let id_s = NetworkAccessId::new(&data[16..])?;
    Ok((Challenge(rand_s), id_s))
}

/// Encode the second message with the device's proof MacP.
pub fn encode_message2(
    cipher: &impl BlockCipher,
    ak: &[u8; 16],
    identifier: u8,
    rand_s: &Challenge,
    rand_p: &Challenge,
    id_s: &NetworkAccessId,
    id_p: &NetworkAccessId,
) -> Vec<u8> {
    let mut seed = Vec::with_capacity(id_p.len() + id_s.len() + 32);
    seed.extend_from_slice(id_p.as_slice());
    seed.extend_from_slice(id_s.as_slice());
    seed.extend_from_slice(&rand_s.0);
    seed.extend_from_slice(&rand_p.0);
    let mac_p = cmac(cipher, ak, &seed);

    let mut out = begin(EapCode::Response, identifier, T1, 90);
    out.extend_from_slice(&rand_s.0);
    out.extend_from_slice(&rand_p.0);
    out.extend_from_slice(&mac_p);
    out.extend_from_slice(id_p.as_slice());
    patch_length(&mut out);
    out
}

/// Decode and verify the second message into `(rand_s, rand_p)`.
///
/// The peer identifier length depends on the band: fixed 8 octets for
/// CENELEC/FCC, derived from the message length (bounded at 36) for
/// ARIB. A MacP that does not verify under `ak` fails the decode —
/// this is where a wrong PSK is caught.
pub fn decode_message2(
    cipher: &impl BlockCipher,
    ak: &[u8; 16],
    arib: bool,
    id_s: &NetworkAccessId,
    data: &[u8],
) -> Result<(Challenge, Challenge), LbpError> {
    let min = if arib { 49 } else { 56 };
    if data.len() < min {
        return Err(LbpError::TooShort {
            min,
            actual: data.len(),
        });
    }

    let id_p_len = if arib {
        (data.len() - 48).min(ACCESS_ID_MAX_SIZE)
    } else {
        ACCESS_ID_SIZE_CENELEC_FCC
    };

    let mut rand_s = [0u8; 16];
    rand_s.copy_from_slice(&data[..16]);
    let mut rand_p = [0u8; 16];
    rand_p.copy_from_slice(&data[16..32]);
    let mac_p: [u8; 16] = data[32..48]
        .try_into()
        .map_err(|_| LbpError::Malformed("proof field"))?;
    let id_p = &data[48..48 + id_p_len];

    let mut seed = Vec::with_capacity(id_p.len() + id_s.len() + 32);
    seed.extend_from_slice(id_p);
    seed.extend_from_slice(id_s.as_slice());
    seed.extend_from_slice(&rand_s);
    seed.extend_from_slice(&rand_p);
    cmac_verify(cipher, ak, &seed, &mac_p)?;

    Ok((Challenge(rand_s), Challenge(rand_p)))
}

/// Compute MacS = CMAC(AK, IdS || RandP).
fn mac_s(
    cipher: &impl BlockCipher,
    ak: &[u8; 16],
    id_s: &NetworkAccessId,
    rand_p: &Challenge,
) -> [u8; 16] {
    let mut seed = Vec::with_capacity(id_s.len() + 16);
    seed.extend_from_slice(id_s.as_slice());
    seed.extend_from_slice(&rand_p.0);
    cmac(cipher, ak, &seed)
}

/// The tag binds the message prefix with the code field restored to
/// its uncompressed value.
fn tag_header(message: &[u8]) -> [u8; TAG_BOUND_PREFIX] {
    let mut header = [0u8; TAG_BOUND_PREFIX];
    header.copy_from_slice(&message[..TAG_BOUND_PREFIX]);
    header[0] >>= 2;
    header
}

fn channel_nonce(nonce: u32) -> [u8; 16] {
    let mut out = [0u8; 16];
    out[12..].copy_from_slice(&nonce.to_be_bytes());
    out
}

fn channel_plaintext(result: ChannelResult, data: &[u8]) -> Vec<u8> {
    let mut plaintext = Vec::with_capacity(1 + data.len());
    if data.is_empty() {
        plaintext.push((result as u8) << 6);
    } else {
        plaintext.push(((result as u8) << 6) | CHANNEL_EXT_BIT);
        plaintext.extend_from_slice(data);
    }
    plaintext
}

/// Encode the third message: MacS proof plus the protected channel
/// carrying the configuration parameters.
#[allow(clippy::too_many_arguments)]
pub fn encode_message3(
    cipher: &impl BlockCipher,
    ak: &[u8; 16],
    tek: &[u8; 16],
    identifier: u8,
    rand_s: &Challenge,
    rand_p: &Challenge,
    id_s: &NetworkAccessId,
    nonce: u32,
    result: ChannelResult,
    channel_data: &[u8],
) -> Vec<u8> {
    let mac = mac_s(cipher, ak, id_s, rand_p);
    let plaintext = channel_plaintext(result, channel_data);

    let mut out = begin(EapCode::Request, identifier, T2, 59 + channel_data.len());
    out.extend_from_slice(&rand_s.0);
    out.extend_from_slice(&mac);
    out.extend_from_slice(&nonce.to_be_bytes());
    let tag_at = out.len();
    out.extend_from_slice(&[0u8; 16]); // tag written after encryption
    let data_at = out.len();
    out.extend_from_slice(&plaintext);
    patch_length(&mut out);

    let header = tag_header(&out);
    let (ciphertext, tag) = eax_encrypt(cipher, tek, &channel_nonce(nonce), &header, &plaintext);
    out[tag_at..tag_at + 16].copy_from_slice(&tag);
    out[data_at..].copy_from_slice(&ciphertext);
    out
}

/// Decoded contents of a protected-channel message (3 or 4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMessage {
    pub rand_s: Challenge,
    pub nonce: u32,
    pub result: ChannelResult,
    pub data: Vec<u8>,
}

/// Decode and verify the third message.
///
/// `message` must be the complete EAP message: the channel tag binds
/// its first 22 octets. MacS is verified before the channel is opened.
pub fn decode_message3(
    cipher: &impl BlockCipher,
    ak: &[u8; 16],
    tek: &[u8; 16],
    id_s: &NetworkAccessId,
    rand_p: &Challenge,
    message: &[u8],
) -> Result<ChannelMessage, LbpError> {
    let envelope = decode(message)?;
    let data = envelope.data;
    // rand_s(16) || mac_s(16) || nonce(4) || tag(16) || result(1)
    if data.len() < 53 {
        return Err(LbpError::TooShort {
            min: 53,
            actual: data.len(),
        });
    }

    let mut rand_s = [0u8; 16];
    rand_s.copy_from_slice(&data[..16]);

    let received_mac: [u8; 16] = data[16..32]
        .try_into()
        .map_err(|_| LbpError::Malformed("proof field"))?;
    let expected = mac_s(cipher, ak, id_s, rand_p);
    if expected != received_mac {
        return Err(LbpError::ChallengeMismatch);
    }

    let nonce = u32::from_be_bytes([data[32], data[33], data[34], data[35]]);
    let tag: [u8; 16] = data[36..52]
        .try_into()
        .map_err(|_| LbpError::Malformed("channel tag"))?;

    let header = tag_header(message);
    let plaintext = eax_decrypt(
        cipher,
        tek,
        &channel_nonce(nonce),
        &header,
        &data[52..],
        &tag,
    )?;

    let result = ChannelResult::from_u8((plaintext[0] & CHANNEL_RESULT_MASK) >> 6)?;
    Ok(ChannelMessage {
        rand_s: Challenge(rand_s),
        nonce,
        result,
        data: plaintext[1..].to_vec(),
    })
}

/// Encode the fourth message: the device's protected answer, nonce
/// advanced by one.
pub fn encode_message4(
    cipher: &impl BlockCipher,
    tek: &[u8; 16],
    identifier: u8,
    rand_s: &Challenge,
    nonce: u32,
    result: ChannelResult,
    channel_data: &[u8],
) -> Vec<u8> {
    let plaintext = channel_plaintext(result, channel_data);

    let mut out = begin(EapCode::Response, identifier, T3, 43 + channel_data.len());
    out.extend_from_slice(&rand_s.0);
    out.extend_from_slice(&nonce.to_be_bytes());
    let tag_at = out.len();
    out.extend_from_slice(&[0u8; 16]);
    let data_at = out.len();
    out.extend_from_slice(&plaintext);
    patch_length(&mut out);

    let header = tag_header(&out);
    let (ciphertext, tag) = eax_encrypt(cipher, tek, &channel_nonce(nonce), &header, &plaintext);
    out[tag_at..tag_at + 16].copy_from_slice(&tag);
    out[data_at..].copy_from_slice(&ciphertext);
    out
}

/// Decode and verify the fourth message.
pub fn decode_message4(
    cipher: &impl BlockCipher,
    tek: &[u8; 16],
    message: &[u8],
) -> Result<ChannelMessage, LbpError> {
    let envelope = decode(message)?;
    let data = envelope.data;
    // rand_s(16) || nonce(4) || tag(16) || result(1)
    if data.len() < 37 {
        return Err(LbpError::TooShort {
            min: 37,
            actual: data.len(),
        });
    }

    let mut rand_s = [0u8; 16];
    rand_s.copy_from_slice(&data[..16]);
    let nonce = u32::from_be_bytes([data[16], data[17], data[18], data[19]]);
    let tag: [u8; 16] = data[20..36]
        .try_into()
        .map_err(|_| LbpError::Malformed("channel tag"))?;

    let header = tag_header(message);
    let plaintext = eax_decrypt(
        cipher,
        tek,
        &channel_nonce(nonce),
        &header,
        &data[36..],
        &tag,
    )?;

    let result = ChannelResult::from_u8((plaintext[0] & CHANNEL_RESULT_MASK) >> 6)?;
    Ok(ChannelMessage {
        rand_s: Challenge(rand_s),
        nonce,
        result,
        data: plaintext[1..].to_vec(),
    })
}

/// Encode a bare EAP-Success header.
#[must_use]
pub fn encode_success(identifier: u8) -> Vec<u8> {
    vec![EapCode::Success as u8, identifier, 0x00, 0x04]
}

/// Encode a bare EAP-Failure header.
#[must_use]
pub fn encode_failure(identifier: u8) -> Vec<u8> {
    vec![EapCode::Failure as u8, identifier, 0x00, 0x04]
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridmesh_crypto::block::Aes128;
    use gridmesh_crypto::psk_kdf::{derive_psk_keys, derive_session_keys};

    const PSK: [u8; 16] = [
        0xAB, 0x10, 0x34, 0x11, 0x45, 0x11, 0x1B, 0xC3, 0xC1, 0x2D, 0xE8, 0xFF, 0x11, 0x14, 0x22,
        0x04,
    ];

    fn id_s() -> NetworkAccessId {
        NetworkAccessId::new(&[0x81, 0x72, 0x63, 0x54, 0x45, 0x36, 0x27, 0x18]).unwrap()
    }

    fn id_p() -> NetworkAccessId {
        NetworkAccessId::new(&[0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08]).unwrap()
    }

    #[test]
    fn test_message1_roundtrip() {
        let rand_s = Challenge([0x5A; 16]);
        let raw = encode_message1(7, &rand_s, &id_s());

        let envelope = decode(&raw).unwrap();
        assert_eq!(envelope.code, EapCode::Request);
        assert_eq!(envelope.identifier, 7);
        assert_eq!(envelope.t_subfield, T0);

        let (parsed_rand, parsed_id) = decode_message1(envelope.data).unwrap();
        assert_eq!(parsed_rand, rand_s);
        assert_eq!(parsed_id, id_s());
    }

    #[test]
    fn test_message2_verifies_with_shared_psk() {
        let keys = derive_psk_keys(&Aes128, &PSK);
        let rand_s = Challenge([0x11; 16]);
        let rand_p = Challenge([0x22; 16]);

        let raw = encode_message2(&Aes128, &keys.ak, 8, &rand_s, &rand_p, &id_s(), &id_p());
        let envelope = decode(&raw).unwrap();
        assert_eq!(envelope.t_subfield, T1);

        let (got_s, got_p) =
            decode_message2(&Aes128, &keys.ak, false, &id_s(), envelope.data).unwrap();
        assert_eq!(got_s, rand_s);
        assert_eq!(got_p, rand_p);
    }

    #[test]
    fn test_message2_rejected_with_wrong_psk() {
        let keys = derive_psk_keys(&Aes128, &PSK);
        let wrong = derive_psk_keys(&Aes128, &[0u8; 16]);
        let raw = encode_message2(
            &Aes128,
            &wrong.ak,
            8,
            &Challenge([0x11; 16]),
            &Challenge([0x22; 16]),
            &id_s(),
            &id_p(),
        );
        let envelope = decode(&raw).unwrap();
        assert!(decode_message2(&Aes128, &keys.ak, false, &id_s(), envelope.data).is_err());
    }

    #[test]
    fn test_message2_arib_identifier_sizing() {
        let keys = derive_psk_keys(&Aes128, &PSK);
        let long_id_p = NetworkAccessId::new(&[0x42; ACCESS_ID_SIZE_P_ARIB]).unwrap();
        let long_id_s = NetworkAccessId::new(&[0x24; ACCESS_ID_SIZE_S_ARIB]).unwrap();
        let raw = encode_message2(
            &Aes128,
            &keys.ak,
            1,
            &Challenge([0x01; 16]),
            &Challenge([0x02; 16]),
            &long_id_s,
            &long_id_p,
        );
        let envelope = decode(&raw).unwrap();
        assert!(decode_message2(&Aes128, &keys.ak, true, &long_id_s, envelope.data).is_ok());
    }

    #[test]
    fn test_message3_roundtrip_with_channel_data() {
        let keys = derive_psk_keys(&Aes128, &PSK);
        let rand_p = Challenge([0x33; 16]);
        let session = derive_session_keys(&Aes128, &keys.kdk, &rand_p.0);
        let rand_s = Challenge([0x44; 16]);
        let params = [0x02, 0x1D, 0x02, 0x00, 0x05];

        let raw = encode_message3(
            &Aes128,
            &keys.ak,
            &session.tek,
            9,
            &rand_s,
            &rand_p,
            &id_s(),
            0x1000,
            ChannelResult::DoneSuccess,
            &params,
        );
        let envelope = decode(&raw).unwrap();
        assert_eq!(envelope.t_subfield, T2);

        let msg = decode_message3(&Aes128, &keys.ak, &session.tek, &id_s(), &rand_p, &raw).unwrap();
        assert_eq!(msg.rand_s, rand_s);
        assert_eq!(msg.nonce, 0x1000);
        assert_eq!(msg.result, ChannelResult::DoneSuccess);
        assert_eq!(msg.data, params);
    }

    #[test]
    fn test_message3_tamper_detected() {
        let keys = derive_psk_keys(&Aes128, &PSK);
        let rand_p = Challenge([0x33; 16]);
        let session = derive_session_keys(&Aes128, &keys.kdk, &rand_p.0);

        let mut raw = encode_message3(
            &Aes128,
            &keys.ak,
            &session.tek,
            9,
            &Challenge([0x44; 16]),
            &rand_p,
            &id_s(),
            1,
            ChannelResult::DoneSuccess,
            &[0x02, 0xAA],
        );
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        assert!(decode_message3(&Aes128, &keys.ak, &session.tek, &id_s(), &rand_p, &raw).is_err());
    }

    #[test]
    fn test_message3_wrong_session_rand_p_rejected() {
        // MacS binds RandP; a different device challenge must fail.
        let keys = derive_psk_keys(&Aes128, &PSK);
        let rand_p = Challenge([0x33; 16]);
        let session = derive_session_keys(&Aes128, &keys.kdk, &rand_p.0);

        let raw = encode_message3(
            &Aes128,
            &keys.ak,
            &session.tek,
            9,
            &Challenge([0x44; 16]),
            &rand_p,
            &id_s(),
            1,
            ChannelResult::DoneSuccess,
            &[0x02],
        );
        let other = Challenge([0x34; 16]);
        assert!(matches!(
            decode_message3(&Aes128, &keys.ak, &session.tek, &id_s(), &other, &raw),
            Err(LbpError::ChallengeMismatch)
        ));
    }

    #[test]
    fn test_message4_roundtrip_empty_channel() {
        let keys = derive_psk_keys(&Aes128, &PSK);
        let session = derive_session_keys(&Aes128, &keys.kdk, &[0x55; 16]);
        let rand_s = Challenge([0x66; 16]);

        let raw = encode_message4(
            &Aes128,
            &session.tek,
            10,
            &rand_s,
            0x1001,
            ChannelResult::DoneSuccess,
            &[],
        );
        let envelope = decode(&raw).unwrap();
        assert_eq!(envelope.t_subfield, T3);
        assert_eq!(envelope.code, EapCode::Response);

        let msg = decode_message4(&Aes128, &session.tek, &raw).unwrap();
        assert_eq!(msg.rand_s, rand_s);
        assert_eq!(msg.nonce, 0x1001);
        assert_eq!(msg.result, ChannelResult::DoneSuccess);
        assert!(msg.data.is_empty());
    }

    #[test]
    fn test_success_failure_headers() {
        let success = encode_success(3);
        assert_eq!(success, vec![0x0C, 3, 0x00, 0x04]);
        let envelope = decode(&success).unwrap();
        assert_eq!(envelope.code, EapCode::Success);
        assert!(envelope.data.is_empty());

        let failure = encode_failure(4);
        assert_eq!(decode(&failure).unwrap().code, EapCode::Failure);
    }

    #[test]
    fn test_declared_length_beyond_received_rejected() {
        let mut raw = encode_success(1);
        raw[3] = 0x09; // claims 9 octets, 4 received
        assert!(matches!(
            decode(&raw),
            Err(LbpError::Malformed("EAP length exceeds received octets"))
        ));
    }

    #[test]
    fn test_access_id_bounds() {
        assert!(NetworkAccessId::new(&[]).is_err());
        assert!(NetworkAccessId::new(&[0u8; 37]).is_err());
        assert!(NetworkAccessId::new(&[0u8; 36]).is_ok());
    }
}

//! CCM* authenticated encryption for frame protection.
//!
//! The parameters are fixed by the frame security level ENC-MIC-32:
//! a 13-byte nonce (originator extended address || 32-bit frame counter,
//! big-endian || security level), a 2-byte length field (L = 2), and a
//! 4-byte integrity code. The header bytes covered by the MIC but not
//! encrypted are passed as associated data.

use alloc::vec::Vec;

use crate::block::{BlockCipher, BLOCK_SIZE};
use crate::cmac::ct_eq;
use crate::error::CryptoError;

/// CCM* nonce length with L = 2.
pub const NONCE_LEN: usize = 13;
/// Integrity code length for ENC-MIC-32.
pub const MIC_LEN: usize = 4;

/// Build the 13-byte frame nonce.
#[must_use]
pub fn frame_nonce(originator: &[u8; 8], frame_counter: u32, security_level: u8) -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    nonce[..8].copy_from_slice(originator);
    nonce[8..12].copy_from_slice(&frame_counter.to_be_bytes());
    nonce[12] = security_level;
    nonce
}

fn auth_flags(has_a_data: bool) -> u8 {
    // Adata(1) | ((M-2)/2)(3) | (L-1)(3) with M = 4, L = 2.
    (u8::from(has_a_data) << 6) | ((MIC_LEN as u8 - 2) / 2) << 3 | 0x01
}

fn ctr_block(nonce: &[u8; NONCE_LEN], counter: u16) -> [u8; 16] {
    let mut block = [0u8; 16];
    block[0] = 0x01; // L - 1
    block[1..14].copy_from_slice(nonce);
    block[14..16].copy_from_slice(&counter.to_be_bytes());
    block
}

/// CBC-MAC over B0 || encoded a-data || padded message.
fn cbc_mac(
    cipher: &impl BlockCipher,
    key: &[u8; 16],
    nonce: &[u8; NONCE_LEN],
    a_data: &[u8],
    m_data: &[u8],
) -> [u8; 16] {
    let mut x = [0u8; 16];
    x[0] = auth_flags(!a_data.is_empty());
    x[1..14].copy_from_slice(nonce);
    x[14..16].copy_from_slice(&(m_data.len() as u16).to_be_bytes());
    cipher.encrypt_block(key, &mut x);

    if !a_data.is_empty() {
        // a-data below 0xFF00 octets: 2-byte length prefix, zero-padded
        // to the block boundary.
        let mut prefixed = Vec::with_capacity(2 + a_data.len());
        prefixed.extend_from_slice(&(a_data.len() as u16).to_be_bytes());
        prefixed.extend_from_slice(a_data);
        absorb_padded(cipher, key, &mut x, &prefixed);
    }
    absorb_padded(cipher, key, &mut x, m_data);
    x
}

fn absorb_padded(cipher: &impl BlockCipher, key: &[u8; 16], x: &mut [u8; 16], data: &[u8]) {
    for chunk in data.chunks(BLOCK_SIZE) {
        for (b, d) in x.iter_mut().zip(chunk) {
            *b ^= d;
        }
        cipher.encrypt_block(key, x);
    }
}

fn ctr_xor(cipher: &impl BlockCipher, key: &[u8; 16], nonce: &[u8; NONCE_LEN], data: &mut [u8]) {
    for (i, chunk) in data.chunks_mut(BLOCK_SIZE).enumerate() {
        let mut keystream = ctr_block(nonce, (i + 1) as u16);
        cipher.encrypt_block(key, &mut keystream);
        for (d, k) in chunk.iter_mut().zip(keystream.iter()) {
            *d ^= k;
        }
    }
}

/// Encrypt `m_data` and append the 4-byte MIC over `a_data || m_data`.
pub fn ccm_star_encrypt(
    cipher: &impl BlockCipher,
    key: &[u8; 16],
    nonce: &[u8; NONCE_LEN],
    a_data: &[u8],
    m_data: &[u8],
) -> Vec<u8> {
    let t = cbc_mac(cipher, key, nonce, a_data, m_data);

    let mut out = m_data.to_vec();
    ctr_xor(cipher, key, nonce, &mut out);

    // The MIC is the tag encrypted under counter block 0.
    let mut a0 = ctr_block(nonce, 0);
    cipher.encrypt_block(key, &mut a0);
    let mut mic = [0u8; MIC_LEN];
    for i in 0..MIC_LEN {
        mic[i] = t[i] ^ a0[i];
    }
    out.extend_from_slice(&mic);
    out
}

/// Verify the trailing MIC and decrypt. `data` is ciphertext || MIC.
pub fn ccm_star_decrypt(
    cipher: &impl BlockCipher,
    key: &[u8; 16],
    nonce: &[u8; NONCE_LEN],
    a_data: &[u8],
    data: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    if data.len() < MIC_LEN {
        return Err(CryptoError::InvalidLength {
            reason: "protected payload shorter than the integrity code",
        });
    }
    let (ciphertext, mic) = data.split_at(data.len() - MIC_LEN);

    let mut plaintext = ciphertext.to_vec();
    ctr_xor(cipher, key, nonce, &mut plaintext);

    let t = cbc_mac(cipher, key, nonce, a_data, &plaintext);
    let mut a0 = ctr_block(nonce, 0);
    cipher.encrypt_block(key, &mut a0);
    let mut expected = [0u8; MIC_LEN];
    for i in 0..MIC_LEN {
        expected[i] = t[i] ^ a0[i];
    }

    if !ct_eq(&expected, mic) {
        return Err(CryptoError::AuthFailed);
    }
    Ok(plaintext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::Aes128;

    const KEY: [u8; 16] = [0xC0; 16];
    const ORIGINATOR: [u8; 8] = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];

    #[test]
    fn test_frame_nonce_layout() {
        let nonce = frame_nonce(&ORIGINATOR, 0x0A0B0C0D, 0x05);
        assert_eq!(&nonce[..8], &ORIGINATOR);
        assert_eq!(&nonce[8..12], &[0x0A, 0x0B, 0x0C, 0x0D]);
        assert_eq!(nonce[12], 0x05);
    }

    #[test]
    fn test_roundtrip_with_header() {
        let nonce = frame_nonce(&ORIGINATOR, 1, 5);
        let header = b"mac header bytes";
        let payload = b"application payload";

        let protected = ccm_star_encrypt(&Aes128, &KEY, &nonce, header, payload);
        assert_eq!(protected.len(), payload.len() + MIC_LEN);
        assert_ne!(&protected[..payload.len()], payload.as_slice());

        let plain = ccm_star_decrypt(&Aes128, &KEY, &nonce, header, &protected).unwrap();
        assert_eq!(plain.as_slice(), payload);
    }

    #[test]
    fn test_empty_payload_is_pure_mic() {
        let nonce = frame_nonce(&ORIGINATOR, 2, 5);
        let protected = ccm_star_encrypt(&Aes128, &KEY, &nonce, b"hdr", &[]);
        assert_eq!(protected.len(), MIC_LEN);
        let plain = ccm_star_decrypt(&Aes128, &KEY, &nonce, b"hdr", &protected).unwrap();
        assert!(plain.is_empty());
    }

    #[test]
    fn test_header_tamper_rejected() {
        let nonce = frame_nonce(&ORIGINATOR, 3, 5);
        let protected = ccm_star_encrypt(&Aes128, &KEY, &nonce, b"hdr", b"data");
        assert_eq!(
            ccm_star_decrypt(&Aes128, &KEY, &nonce, b"hdR", &protected),
            Err(CryptoError::AuthFailed)
        );
    }

    #[test]
    fn test_ciphertext_tamper_rejected() {
        let nonce = frame_nonce(&ORIGINATOR, 4, 5);
        let mut protected = ccm_star_encrypt(&Aes128, &KEY, &nonce, b"hdr", b"data");
        protected[0] ^= 0x01;
        assert_eq!(
            ccm_star_decrypt(&Aes128, &KEY, &nonce, b"hdr", &protected),
            Err(CryptoError::AuthFailed)
        );
    }

    #[test]
    fn test_wrong_counter_in_nonce_rejected() {
        let nonce = frame_nonce(&ORIGINATOR, 5, 5);
        let protected = ccm_star_encrypt(&Aes128, &KEY, &nonce, b"hdr", b"data");
        let other = frame_nonce(&ORIGINATOR, 6, 5);
        assert_eq!(
            ccm_star_decrypt(&Aes128, &KEY, &other, b"hdr", &protected),
            Err(CryptoError::AuthFailed)
        );
    }

    #[test]
    fn test_short_input_rejected() {
        let nonce = frame_nonce(&ORIGINATOR, 7, 5);
        assert!(matches!(
            ccm_star_decrypt(&Aes128, &KEY, &nonce, b"", &[0x01, 0x02]),
            Err(CryptoError::InvalidLength { .. })
        ));
    }
}

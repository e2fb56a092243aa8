//! AES-CMAC message authentication (RFC 4493 construction).
//!
//! Built directly on the [`BlockCipher`] capability: subkeys K1/K2 come
//! from doubling `E(key, 0)` in GF(2^128), the message is CBC-MACed
//! with the last block masked by K1 (complete) or padded and masked by
//! K2 (partial).

use crate::block::{BlockCipher, BLOCK_SIZE};
use crate::error::CryptoError;

const RB: u8 = 0x87;

/// Left-shift a block by one bit, returning the shifted-out MSB.
fn shl_one(block: &mut [u8; 16]) -> bool {
    let mut carry = false;
    for byte in block.iter_mut().rev() {
        let new_carry = *byte & 0x80 != 0;
        *byte = (*byte << 1) | u8::from(carry);
        carry = new_carry;
    }
    carry
}

/// Doubling in GF(2^128) with the CMAC reduction constant.
fn dbl(block: &[u8; 16]) -> [u8; 16] {
    let mut out = *block;
    if shl_one(&mut out) {
        out[15] ^= RB;
    }
    out
}

fn subkeys(cipher: &impl BlockCipher, key: &[u8; 16]) -> ([u8; 16], [u8; 16]) {
    let mut l = [0u8; 16];
    cipher.encrypt_block(key, &mut l);
    let k1 = dbl(&l);
    let k2 = dbl(&k1);
    (k1, k2)
}

fn xor_into(dst: &mut [u8; 16], src: &[u8]) {
    for (d, s) in dst.iter_mut().zip(src) {
        *d ^= s;
    }
}

/// Compute the AES-CMAC of `data` under `key`.
pub fn cmac(cipher: &impl BlockCipher, key: &[u8; 16], data: &[u8]) -> [u8; 16] {
    let (k1, k2) = subkeys(cipher, key);

    let n = data.len().div_ceil(BLOCK_SIZE).max(1);
    let complete_last = !data.is_empty() && data.len() % BLOCK_SIZE == 0;

    let mut x = [0u8; 16];
    for chunk in data.chunks(BLOCK_SIZE).take(n - 1) {
        xor_into(&mut x, chunk);
        cipher.encrypt_block(key, &mut x);
    }

    let last = data.get((n - 1) * BLOCK_SIZE..).unwrap_or(&[]);
    let mut m_last = [0u8; 16];
    if complete_last {
        m_last.copy_from_slice(last);
        xor_into(&mut m_last, &k1);
    } else {
        m_last[..last.len()].copy_from_slice(last);
        m_last[last.len()] = 0x80;
        xor_into(&mut m_last, &k2);
    }

    xor_into(&mut x, &m_last);
    cipher.encrypt_block(key, &mut x);
    x
}

/// Verify an AES-CMAC in constant time.
pub fn cmac_verify(
    cipher: &impl BlockCipher,
    key: &[u8; 16],
    data: &[u8],
    expected: &[u8; 16],
) -> Result<(), CryptoError> {
    let computed = cmac(cipher, key, data);
    if ct_eq(&computed, expected) {
        Ok(())
    } else {
        Err(CryptoError::AuthFailed)
    }
}

/// Constant-time equality over fixed-size tags.
pub(crate) fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b) {
        diff |= x ^ y;
    }
    diff == 0
}

//! EAX authenticated encryption over the block-cipher capability.
//!
//! Used for the bootstrap protected channel: the nonce is the 16-byte
//! zero-extended channel nonce, the associated header is the message
//! header the tag must bind, and the tag is a full 16 bytes.
//!
//! ```text
//! N = OMAC0(nonce)   H = OMAC1(header)   C = OMAC2(ciphertext)
//! ciphertext = CTR[N](plaintext)         tag = N ^ C ^ H
//! ```

use alloc::vec::Vec;

use crate::block::{BlockCipher, BLOCK_SIZE};
use crate::cmac::{cmac, ct_eq};
use crate::error::CryptoError;

/// OMAC with a one-byte tweak: CMAC over `[0;15] || t || data`.
fn omac(cipher: &impl BlockCipher, key: &[u8; 16], t: u8, data: &[u8]) -> [u8; 16] {
    let mut input = Vec::with_capacity(BLOCK_SIZE + data.len());
    input.extend_from_slice(&[0u8; 15]);
    input.push(t);
    input.extend_from_slice(data);
    cmac(cipher, key, &input)
}

/// Big-endian increment of a 128-bit counter block.
fn increment(counter: &mut [u8; 16]) {
    for byte in counter.iter_mut().rev() {
        let (v, overflow) = byte.overflowing_add(1);
        *byte = v;
        if !overflow {
            break;
        }
    }
}

fn ctr_xor(cipher: &impl BlockCipher, key: &[u8; 16], n: &[u8; 16], data: &mut [u8]) {
    let mut counter = *n;
    for chunk in data.chunks_mut(BLOCK_SIZE) {
        let mut keystream = counter;
        cipher.encrypt_block(key, &mut keystream);
        for (d, k) in chunk.iter_mut().zip(keystream.iter()) {
            *d ^= k;
        }
        increment(&mut counter);
    }
}

/// Encrypt and authenticate. Returns `(ciphertext, tag)`.
pub fn eax_encrypt(
    cipher: &impl BlockCipher,
    key: &[u8; 16],
    nonce: &[u8],
    header: &[u8],
    plaintext: &[u8],
) -> (Vec<u8>, [u8; 16]) {
    let n = omac(cipher, key, 0, nonce);
    let h = omac(cipher, key, 1, header);

    let mut ciphertext = plaintext.to_vec();
    ctr_xor(cipher, key, &n, &mut ciphertext);

    let c = omac(cipher, key, 2, &ciphertext);

    let mut tag = [0u8; 16];
    for i in 0..16 {
        tag[i] = n[i] ^ c[i] ^ h[i];
    }
    (ciphertext, tag)
}

/// Verify the tag and decrypt. The tag is checked before any plaintext
/// is produced.
pub fn eax_decrypt(
    cipher: &impl BlockCipher,
    key: &[u8; 16],
    nonce: &[u8],
    header: &[u8],
    ciphertext: &[u8],
    tag: &[u8; 16],
) -> Result<Vec<u8>, CryptoError> {
    let n = omac(cipher, key, 0, nonce);
    let h = omac(cipher, key, 1, header);
    let c = omac(cipher, key, 2, ciphertext);

    let mut expected = [0u8; 16];
    for i in 0..16 {
        expected[i] = n[i] ^ c[i] ^ h[i];
    }
    if !ct_eq(&expected, tag) {
        return Err(CryptoError::AuthFailed);
    }

    let mut plaintext = ciphertext.to_vec();
    ctr_xor(cipher, key, &n, &mut plaintext);
    Ok(plaintext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::Aes128;

    fn unhex(s: &str) -> Vec<u8> {
        hex::decode(s).unwrap()
    }

    // Vectors from the EAX paper (Bellare, Rogaway, Wagner), AES-128.
    #[test]
    fn test_eax_paper_vector_empty() {
        let key: [u8; 16] = unhex("233952dee4d5ed5f9b9c6d6ff80ff478").try_into().unwrap();
        let nonce = unhex("62ec67f9c3a4a407fcb2a8c49031a8b3");
        let header = unhex("6bfb914fd07eae6b");
        let (ct, tag) = eax_encrypt(&Aes128, &key, &nonce, &header, &[]);
        assert!(ct.is_empty());
        assert_eq!(tag.as_slice(), unhex("e037830e8389f27b025a2d6527e79d01").as_slice());
    }

    #[test]
    fn test_eax_paper_vector_2_bytes() {
        let key: [u8; 16] = unhex("91945d3f4dcbee0bf45ef52255f095a4").try_into().unwrap();
        let nonce = unhex("becaf043b0a23d843194ba972c66debd");
        let header = unhex("fa3bfd4806eb53fa");
        let (ct, tag) = eax_encrypt(&Aes128, &key, &nonce, &header, &unhex("f7fb"));
        assert_eq!(ct.as_slice(), unhex("19dd").as_slice());
        assert_eq!(tag.as_slice(), unhex("5c4c9331049d0bdab0277408f67967e5").as_slice());
    }

    #[test]
    fn test_eax_paper_vector_21_bytes() {
        let key: [u8; 16] = unhex("8395fcf1e95bebd697bd010bc766aac3").try_into().unwrap();
        let nonce = unhex("22e7add93cfc6393c57ec0b3c17d6b44");
        let header = unhex("126735fcc320d25a");
        let pt = unhex("ca40d7446e545ffaed3bd12a740a659ffbbb3ceab7");
        let (ct, tag) = eax_encrypt(&Aes128, &key, &nonce, &header, &pt);
        assert_eq!(
            ct.as_slice(),
            unhex("cb8920f87a6c75cff39627b56e3ed197c552d295a7").as_slice()
        );
        assert_eq!(tag.as_slice(), unhex("cfc46afc253b4652b1af3795b124ab6e").as_slice());
    }

    #[test]
    fn test_eax_roundtrip_and_reject() {
        let key = [0x42u8; 16];
        let nonce = [0u8; 16];
        let header = b"protocol header";
        let plaintext = b"short protected payload";

        let (ct, tag) = eax_encrypt(&Aes128, &key, &nonce, header, plaintext);
        let pt = eax_decrypt(&Aes128, &key, &nonce, header, &ct, &tag).unwrap();
        assert_eq!(pt.as_slice(), plaintext);

        // Flipping any input breaks the tag.
        let mut bad_ct = ct.clone();
        bad_ct[0] ^= 1;
        assert_eq!(
            eax_decrypt(&Aes128, &key, &nonce, header, &bad_ct, &tag),
            Err(CryptoError::AuthFailed)
        );
        assert_eq!(
            eax_decrypt(&Aes128, &key, &nonce, b"other header", &ct, &tag),
            Err(CryptoError::AuthFailed)
        );
        let mut bad_tag = tag;
        bad_tag[15] ^= 0x80;
        assert_eq!(
            eax_decrypt(&Aes128, &key, &nonce, header, &ct, &bad_tag),
            Err(CryptoError::AuthFailed)
        );
    }

    #[test]
    fn test_eax_header_binds_tag_not_ciphertext() {
        let key = [7u8; 16];
        let nonce = [1u8; 16];
        let (ct_a, tag_a) = eax_encrypt(&Aes128, &key, &nonce, b"aa", b"data");
        let (ct_b, tag_b) = eax_encrypt(&Aes128, &key, &nonce, b"bb", b"data");
        assert_eq!(ct_a, ct_b);
        assert_ne!(tag_a, tag_b);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use crate::block::Aes128;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(128))]

        #[test]
        fn eax_roundtrip(
            key in any::<[u8; 16]>(),
            nonce in any::<[u8; 16]>(),
            header in proptest::collection::vec(any::<u8>(), 0..64),
            plaintext in proptest::collection::vec(any::<u8>(), 0..256),
        ) {
            let (ct, tag) = eax_encrypt(&Aes128, &key, &nonce, &header, &plaintext);
            let pt = eax_decrypt(&Aes128, &key, &nonce, &header, &ct, &tag).unwrap();
            prop_assert_eq!(pt, plaintext);
        }
    }
}

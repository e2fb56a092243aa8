//! The injected 128-bit block-cipher capability.
//!
//! Every mode construction in this crate (CMAC, EAX, CCM*) is written
//! against [`BlockCipher`] and invokes it one 16-byte block at a time;
//! nothing beyond the raw block permutation is assumed of the cipher.
//! The key is passed per call so a single capability serves the key
//! schedule, the handshake channel, and frame protection.

use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};

/// Size of a cipher block and of every key, in octets.
pub const BLOCK_SIZE: usize = 16;

/// A 128-bit block-cipher capability.
pub trait BlockCipher {
    fn encrypt_block(&self, key: &[u8; 16], block: &mut [u8; 16]);
    fn decrypt_block(&self, key: &[u8; 16], block: &mut [u8; 16]);
}

/// The provided AES-128 implementation of the capability.
#[derive(Debug, Default, Clone, Copy)]
pub struct Aes128;

impl BlockCipher for Aes128 {
    fn encrypt_block(&self, key: &[u8; 16], block: &mut [u8; 16]) {
        let cipher = aes::Aes128::new(key.into());
        cipher.encrypt_block(block.into());
    }

    fn decrypt_block(&self, key: &[u8; 16], block: &mut [u8; 16]) {
        let cipher = aes::Aes128::new(key.into());
        cipher.decrypt_block(block.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aes128_fips197_vector() {
        // FIPS-197 appendix C.1
        let key: [u8; 16] = [
            0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d,
            0x0e, 0x0f,
        ];
        let mut block: [u8; 16] = [
            0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb, 0xcc, 0xdd,
            0xee, 0xff,
        ];
        let expected: [u8; 16] = [
            0x69, 0xc4, 0xe0, 0xd8, 0x6a, 0x7b, 0x04, 0x30, 0xd8, 0xcd, 0xb7, 0x80, 0x70, 0xb4,
            0xc5, 0x5a,
        ];

        Aes128.encrypt_block(&key, &mut block);
        assert_eq!(block, expected);

        Aes128.decrypt_block(&key, &mut block);
        assert_eq!(
            block,
            [
                0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb, 0xcc,
                0xdd, 0xee, 0xff,
            ]
        );
    }
}

//! PSK key schedule for the bootstrap handshake.
//!
//! The pre-shared key expands into two long-lived keys, and the peer's
//! random challenge expands the derivation key into the per-session
//! keys, all through single block-cipher invocations on counter-tweaked
//! blocks:
//!
//! ```text
//! AK  = E_PSK(E_PSK(0) ^ 1)        authentication key (CMAC proofs)
//! KDK = E_PSK(E_PSK(0) ^ 2)        key-derivation key
//! TEK = E_KDK(E_KDK(RandP) ^ 1)    protected-channel key
//! MSK = E_KDK(E_KDK(RandP) ^ 2..5) 64-byte master session key
//! ```

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::block::BlockCipher;

/// Long-lived keys derived from the PSK at session start.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PskKeys {
    pub ak: [u8; 16],
    pub kdk: [u8; 16],
}

impl core::fmt::Debug for PskKeys {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PskKeys").finish_non_exhaustive()
    }
}

/// Per-session keys derived from the KDK and the peer challenge.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SessionKeys {
    pub tek: [u8; 16],
    pub msk: [u8; 64],
}

impl core::fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SessionKeys").finish_non_exhaustive()
    }
}

/// Derive the authentication and key-derivation keys from the PSK.
pub fn derive_psk_keys(cipher: &impl BlockCipher, psk: &[u8; 16]) -> PskKeys {
    let mut seed = [0u8; 16];
    cipher.encrypt_block(psk, &mut seed);

    let mut ak = seed;
    ak[15] ^= 0x01;
    cipher.encrypt_block(psk, &mut ak);

    let mut kdk = seed;
    kdk[15] ^= 0x02;
    cipher.encrypt_block(psk, &mut kdk);

    seed.zeroize();
    PskKeys { ak, kdk }
}

/// Derive the session keys from the KDK and the peer's 16-byte random
/// challenge.
pub fn derive_session_keys(
    cipher: &impl BlockCipher,
    kdk: &[u8; 16],
    rand_p: &[u8; 16],
) -> SessionKeys {
    let mut seed = *rand_p;
    cipher.encrypt_block(kdk, &mut seed);

    let mut tek = seed;
    tek[15] ^= 0x01;
    cipher.encrypt_block(kdk, &mut tek);

    let mut msk = [0u8; 64];
    for idx in 0..4u8 {
        let mut block = seed;
        block[15] ^= idx + 2;
        cipher.encrypt_block(kdk, &mut block);
        msk[usize::from(idx) * 16..][..16].copy_from_slice(&block);
    }

    seed.zeroize();
    SessionKeys { tek, msk }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::Aes128;
    use alloc::format;

    const PSK: [u8; 16] = [
        0xAB, 0x10, 0x34, 0x11, 0x45, 0x11, 0x1B, 0xC3, 0xC1, 0x2D, 0xE8, 0xFF, 0x11, 0x14, 0x22,
        0x04,
    ];

    #[test]
    fn test_psk_keys_distinct_and_stable() {
        let a = derive_psk_keys(&Aes128, &PSK);
        let b = derive_psk_keys(&Aes128, &PSK);
        assert_eq!(a.ak, b.ak);
        assert_eq!(a.kdk, b.kdk);
        assert_ne!(a.ak, a.kdk);
    }

    #[test]
    fn test_different_psk_different_keys() {
        let a = derive_psk_keys(&Aes128, &PSK);
        let b = derive_psk_keys(&Aes128, &[0u8; 16]);
        assert_ne!(a.ak, b.ak);
        assert_ne!(a.kdk, b.kdk);
    }

    #[test]
    fn test_session_keys_depend_on_challenge() {
        let psk_keys = derive_psk_keys(&Aes128, &PSK);
        let s1 = derive_session_keys(&Aes128, &psk_keys.kdk, &[0x11; 16]);
        let s2 = derive_session_keys(&Aes128, &psk_keys.kdk, &[0x22; 16]);
        assert_ne!(s1.tek, s2.tek);
        assert_ne!(s1.msk, s2.msk);
    }

    #[test]
    fn test_msk_blocks_distinct() {
        let psk_keys = derive_psk_keys(&Aes128, &PSK);
        let s = derive_session_keys(&Aes128, &psk_keys.kdk, &[0x33; 16]);
        for i in 0..4 {
            for j in i + 1..4 {
                assert_ne!(s.msk[i * 16..(i + 1) * 16], s.msk[j * 16..(j + 1) * 16]);
            }
        }
        assert_ne!(s.tek.as_slice(), &s.msk[..16]);
    }

    #[test]
    fn test_debug_redacts_key_material() {
        let keys = derive_psk_keys(&Aes128, &PSK);
        assert_eq!(format!("{keys:?}"), "PskKeys { .. }");
        let session = derive_session_keys(&Aes128, &keys.kdk, &[0x44; 16]);
        assert_eq!(format!("{session:?}"), "SessionKeys { .. }");
    }
}

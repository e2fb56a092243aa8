//! Frame security context: group key state and replay protection.
//!
//! One context per node, owned by the caller and passed by reference
//! into the layers that need it. It holds exactly one active group key;
//! a successful key install swaps the whole slot atomically and keeps
//! the superseded key decryptable for one bounded rekey-overlap window,
//! so frames already in flight under the old key id still verify.
//!
//! Replay floors are tracked per (originator, key id): a frame counter
//! must be strictly greater than the last accepted value for its pair.
//! The floors and installed keys can be exported with [`snapshot`] so
//! an external persistence collaborator can preserve them across a warm
//! restart; this context only keeps the in-memory cache.
//!
//! [`snapshot`]: SecurityContext::snapshot

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::block::BlockCipher;
use crate::ccm;
use crate::error::CryptoError;

/// Frame security levels understood by the context.
const LEVEL_NONE: u8 = 0x00;
const LEVEL_ENC_MIC_32: u8 = 0x05;

/// A 16-byte group master key, zeroed on drop and redacted in `Debug`.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct GroupKey(pub(crate) [u8; 16]);

impl GroupKey {
    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }
}

impl core::fmt::Debug for GroupKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("GroupKey(..)")
    }
}

#[derive(Clone, Zeroize, ZeroizeOnDrop)]
struct KeySlot {
    key_id: u8,
    key: GroupKey,
}

/// Exported key and replay-counter state for the persistence
/// collaborator. Contains live key material; handle accordingly.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecuritySnapshot {
    pub active_key_id: Option<u8>,
    pub active_key: Option<[u8; 16]>,
    pub outgoing_counter: u32,
    #[zeroize(skip)]
    pub replay_floors: Vec<([u8; 8], u8, u32)>,
}

impl core::fmt::Debug for SecuritySnapshot {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SecuritySnapshot")
            .field("active_key_id", &self.active_key_id)
            .field("outgoing_counter", &self.outgoing_counter)
            .field("replay_floors", &self.replay_floors.len())
            .finish_non_exhaustive()
    }
}

/// Key state and frame encrypt/decrypt operations.
pub struct SecurityContext<C: BlockCipher> {
    cipher: C,
    active: Option<KeySlot>,
    previous: Option<KeySlot>,
    /// Millisecond deadline after which `previous` stops decrypting.
    overlap_deadline: Option<u64>,
    overlap_interval_ms: u64,
    outgoing_counter: u32,
    replay_floors: BTreeMap<([u8; 8], u8), u32>,
}

impl<C: BlockCipher> SecurityContext<C> {
    /// A context with no key material installed.
    pub fn new(cipher: C, overlap_interval_ms: u64) -> Self {
        Self {
            cipher,
            active: None,
            previous: None,
            overlap_deadline: None,
            overlap_interval_ms,
            outgoing_counter: 0,
            replay_floors: BTreeMap::new(),
        }
    }

    /// Zero all key material and counters.
    pub fn init(&mut self) {
        self.active = None; // slots zero themselves on drop
        self.previous = None;
        self.overlap_deadline = None;
        self.outgoing_counter = 0;
        self.replay_floors.clear();
    }

    /// Key id of the active group key, if one is installed.
    #[must_use]
    pub fn active_key_id(&self) -> Option<u8> {
        self.active.as_ref().map(|slot| slot.key_id)
    }

    /// Install a group key as the active key.
    ///
    /// The swap is atomic: the context never holds a half-installed
    /// key. The previously active key (if any, and if its id differs)
    /// remains decryptable until one overlap interval past `now_ms`.
    pub fn install_key(&mut self, key: [u8; 16], key_id: u8, now_ms: u64) {
        let new_slot = KeySlot {
            key_id,
            key: GroupKey::new(key),
        };
        match self.active.take() {
            Some(old) if old.key_id != key_id => {
                self.previous = Some(old);
                self.overlap_deadline = Some(now_ms + self.overlap_interval_ms);
            }
            _ => {}
        }
        self.active = Some(new_slot);
    }

    fn key_for(&self, key_id: u8, now_ms: u64) -> Result<&GroupKey, CryptoError> {
        if let Some(slot) = &self.active {
            if slot.key_id == key_id {
                return Ok(&slot.key);
            }
        }
        if let (Some(slot), Some(deadline)) = (&self.previous, self.overlap_deadline) {
            if slot.key_id == key_id && now_ms < deadline {
                return Ok(&slot.key);
            }
        }
        Err(CryptoError::UnknownKey { key_id })
    }

    /// Protect an outgoing payload under the key named by `key_id`.
    ///
    /// Returns the ciphertext-plus-MIC and the frame counter consumed,
    /// which the caller places into the auxiliary security header.
    /// `header` is the cleartext header covered by the MIC. Level 0
    /// passes the payload through untouched.
    pub fn encrypt(
        &mut self,
        level: u8,
        key_id: u8,
        originator: &[u8; 8],
        header: &[u8],
        payload: &[u8],
        now_ms: u64,
    ) -> Result<(Vec<u8>, u32), CryptoError> {
        match level {
            LEVEL_NONE => Ok((payload.to_vec(), self.outgoing_counter)),
            LEVEL_ENC_MIC_32 => {
                let counter = self.outgoing_counter;
                if counter == u32::MAX {
                    return Err(CryptoError::CounterExhausted);
                }
                let key = self.key_for(key_id, now_ms)?.0;
                let nonce = ccm::frame_nonce(originator, counter, level);
                let protected =
                    ccm::ccm_star_encrypt(&self.cipher, &key, &nonce, header, payload);
                self.outgoing_counter = counter + 1;
                Ok((protected, counter))
            }
            other => Err(CryptoError::InvalidLength {
                reason: unsupported_level(other),
            }),
        }
    }

    /// Verify and decrypt an incoming protected payload.
    ///
    /// The replay floor for `(originator, key_id)` is checked before
    /// any cryptography runs: a counter not strictly greater than the
    /// last accepted value fails regardless of payload validity. The
    /// floor only advances after the MIC verifies.
    pub fn decrypt(
        &mut self,
        level: u8,
        key_id: u8,
        originator: &[u8; 8],
        frame_counter: u32,
        header: &[u8],
        data: &[u8],
        now_ms: u64,
    ) -> Result<Vec<u8>, CryptoError> {
        match level {
            LEVEL_NONE => Ok(data.to_vec()),
            LEVEL_ENC_MIC_32 => {
                let floor_key = (*originator, key_id);
                if let Some(&last) = self.replay_floors.get(&floor_key) {
                    if frame_counter <= last {
                        return Err(CryptoError::Replay {
                            last,
                            received: frame_counter,
                        });
                    }
                }

                let key = self.key_for(key_id, now_ms)?.0;
                let nonce = ccm::frame_nonce(originator, frame_counter, level);
                let plaintext =
                    ccm::ccm_star_decrypt(&self.cipher, &key, &nonce, header, data)?;

                self.replay_floors.insert(floor_key, frame_counter);
                Ok(plaintext)
            }
            other => Err(CryptoError::InvalidLength {
                reason: unsupported_level(other),
            }),
        }
    }

    /// Export the active key and replay floors for persistence.
    #[must_use]
    pub fn snapshot(&self) -> SecuritySnapshot {
        SecuritySnapshot {
            active_key_id: self.active.as_ref().map(|s| s.key_id),
            active_key: self.active.as_ref().map(|s| s.key.0),
            outgoing_counter: self.outgoing_counter,
            replay_floors: self
                .replay_floors
                .iter()
                .map(|(&(origin, key_id), &floor)| (origin, key_id, floor))
                .collect(),
        }
    }

    /// Restore state captured by [`snapshot`](Self::snapshot) after a
    /// warm restart. Replaces all current state.
    pub fn restore(&mut self, snapshot: &SecuritySnapshot) {
        self.init();
        if let (Some(key_id), Some(key)) = (snapshot.active_key_id, snapshot.active_key) {
            self.active = Some(KeySlot {
                key_id,
                key: GroupKey::new(key),
            });
        }
        self.outgoing_counter = snapshot.outgoing_counter;
        for &(origin, key_id, floor) in &snapshot.replay_floors {
            self.replay_floors.insert((origin, key_id), floor);
        }
    }
}

impl<C: BlockCipher> core::fmt::Debug for SecurityContext<C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SecurityContext")
            .field("active_key_id", &self.active_key_id())
            .field("overlap_open", &self.previous.is_some())
            .field("outgoing_counter", &self.outgoing_counter)
            .finish_non_exhaustive()
    }
}

fn unsupported_level(_level: u8) -> &'static str {
    "unsupported security level"
}

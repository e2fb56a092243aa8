//! Cryptographic modes and key state for the gridmesh stack.
//!
//! This crate owns everything between the raw 128-bit block cipher and
//! the protocol layers: the injected block-cipher capability, the
//! CMAC/EAX/CCM* mode constructions built on it, the EAP-PSK key
//! schedule, and the frame [`SecurityContext`] with its replay floors
//! and rekey-overlap handling.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod block;
pub mod ccm;
pub mod cmac;
pub mod context;
pub mod eax;
pub mod error;
pub mod psk_kdf;

pub use block::{Aes128, BlockCipher};
pub use context::{SecurityContext, SecuritySnapshot};
pub use error::CryptoError;

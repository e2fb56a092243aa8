//! MAC frame model and codec for the gridmesh power-line/RF stack.
//!
//! This crate defines the medium-access frame types shared by the two
//! physical transports (power-line and sub-GHz radio): the packed frame
//! control field, addressing, the auxiliary security header, the radio
//! header information elements, and the wire codec itself.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod constants;
pub mod error;
pub mod frame;
pub mod types;

pub use constants::{AddressMode, FrameType, FrameVersion, SecurityLevel, Transport};
pub use error::FrameError;
pub use frame::aux::AuxSecurityHeader;
pub use frame::flags::FrameControl;
pub use frame::ie::HeaderIe;
pub use frame::wire::{MacFrame, MacHeader};
pub use types::{Address, ExtendedAddress, PanId, ShortAddress};

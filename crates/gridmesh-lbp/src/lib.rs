//! Bootstrap protocol (LBP) for the gridmesh stack.
//!
//! This crate implements the network-join protocol run between a
//! joining device and the coordinator: the LBP message codec, the
//! EAP-PSK authentication it transports, the parameter information
//! base, and the two mirrored state machines. Everything is
//! event-driven — machines advance on decoded frames and timer
//! expiries carried as explicit events with millisecond timestamps.

pub mod coordinator;
pub mod device;
pub mod eap;
pub mod error;
pub mod event;
pub mod message;
pub mod params;
pub mod pib;

pub use coordinator::{
    AdmitDecision, AdmitPolicy, Coordinator, CoordinatorConfig, SequentialAdmit, SessionState,
};
pub use device::{Device, DeviceConfig, JoinState};
pub use error::LbpError;
pub use event::{CoordinatorOutput, DeviceOutput, JoinResult, RejectReason};
pub use message::{LbpFrame, MessageType};
pub use pib::{Attribute, DeviceBand, Pib, PibStatus};

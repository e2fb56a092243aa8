//! Outputs emitted by the bootstrap state machines.
//!
//! The machines never perform I/O or hold timers themselves: frames to
//! transmit, timer arm/cancel requests, and join outcomes come back as
//! values for the adaptation layer to act on. Inputs are equally
//! explicit — decoded frames and timer expiries, each stamped with a
//! millisecond timestamp.

use gridmesh_mac::ExtendedAddress;

/// Why a join attempt ended without a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The coordinator sent a decline.
    Declined,
    /// The admission policy refused the device.
    NotPermitted,
    /// The exchange carried unusable parameters.
    InvalidParameters,
}

/// Terminal outcome of a bootstrap attempt, delivered to the
/// adaptation layer.
#[derive(Clone, PartialEq, Eq)]
pub enum JoinResult {
    Joined { short_id: u16, gmk: [u8; 16] },
    Rejected(RejectReason),
    TimedOut,
}

impl core::fmt::Debug for JoinResult {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            JoinResult::Joined { short_id, .. } => f
                .debug_struct("Joined")
                .field("short_id", short_id)
                .finish_non_exhaustive(),
            JoinResult::Rejected(reason) => f.debug_tuple("Rejected").field(reason).finish(),
            JoinResult::TimedOut => f.write_str("TimedOut"),
        }
    }
}

/// Actions requested by the joining-device machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceOutput {
    /// Transmit this bootstrap NSDU toward the coordinator.
    Send(Vec<u8>),
    /// Arm (or re-arm) the response timer.
    StartTimer { deadline_ms: u64 },
    /// Stop the response timer.
    CancelTimer,
    /// The bootstrap attempt ended.
    Result(JoinResult),
    /// The coordinator removed this device from the mesh.
    Kicked,
}

/// Actions requested by the coordinator machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorOutput {
    /// Transmit this bootstrap NSDU toward the named device.
    Send {
        eui64: ExtendedAddress,
        nsdu: Vec<u8>,
    },
    /// A device completed its join.
    DeviceJoined {
        eui64: ExtendedAddress,
        short_id: u16,
    },
    /// A device was refused.
    DeviceRejected {
        eui64: ExtendedAddress,
        reason: RejectReason,
    },
    /// A device left the mesh.
    DeviceLeft { eui64: ExtendedAddress },
}

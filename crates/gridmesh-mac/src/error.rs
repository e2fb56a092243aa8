//! Error types for the gridmesh-mac crate.

use core::fmt;

/// A frame failed to parse or encode.
///
/// Parse failures are dropped at the transport boundary and never
/// propagate as faults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    TooShort { min: usize, actual: usize },
    InvalidFrameType(u8),
    InvalidAddressMode(u8),
    InvalidFrameVersion(u8),
    InvalidSecurityLevel(u8),
    InvalidKeyIdMode(u8),
    MissingPanId,
    PanIdWithoutAddress,
    IeOverrun { declared: usize, available: usize },
    UnterminatedIeList,
    PsduTooLong { max: usize, actual: usize },
    IePresentOnPowerLine,
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::TooShort { min, actual } => {
                write!(f, "frame too short: need at least {min} bytes, got {actual}")
            }
            FrameError::InvalidFrameType(v) => write!(f, "invalid frame type: {v}"),
            FrameError::InvalidAddressMode(v) => write!(f, "invalid addressing mode: {v}"),
            FrameError::InvalidFrameVersion(v) => write!(f, "invalid frame version: {v}"),
            FrameError::InvalidSecurityLevel(v) => write!(f, "invalid security level: {v}"),
            FrameError::InvalidKeyIdMode(v) => write!(f, "invalid key identifier mode: {v}"),
            FrameError::MissingPanId => write!(f, "addressing requires a PAN id"),
            FrameError::PanIdWithoutAddress => {
                write!(f, "PAN id present without a matching address")
            }
            FrameError::IeOverrun {
                declared,
                available,
            } => write!(
                f,
                "information element overruns frame: declared {declared} bytes, {available} available"
            ),
            FrameError::UnterminatedIeList => {
                write!(f, "information element list not terminated")
            }
            FrameError::PsduTooLong { max, actual } => {
                write!(f, "PSDU too long: {actual} bytes exceeds transport maximum {max}")
            }
            FrameError::IePresentOnPowerLine => {
                write!(f, "information elements are not valid on the power-line transport")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for FrameError {}

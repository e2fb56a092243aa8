use core::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Integrity code did not verify.
    AuthFailed,
    /// Frame counter not strictly greater than the last accepted one
    /// for this (originator, key id) pair.
    Replay { last: u32, received: u32 },
    /// No installed key matches the requested key identifier (or its
    /// rekey-overlap window has closed).
    UnknownKey { key_id: u8 },
    /// The outgoing frame counter space is exhausted; a rekey is
    /// required before further protected traffic.
    CounterExhausted,
    InvalidLength { reason: &'static str },
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CryptoError::AuthFailed => write!(f, "integrity check failed"),
            CryptoError::Replay { last, received } => {
                write!(f, "replayed frame counter: received {received}, last accepted {last}")
            }
            CryptoError::UnknownKey { key_id } => {
                write!(f, "no usable key for key id {key_id}")
            }
            CryptoError::CounterExhausted => write!(f, "outgoing frame counter exhausted"),
            CryptoError::InvalidLength { reason } => write!(f, "invalid length: {reason}"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for CryptoError {}

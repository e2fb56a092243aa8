//! Bootstrap protocol error types.

use gridmesh_crypto::CryptoError;

#[derive(Debug, thiserror::Error)]
pub enum LbpError {
    #[error("message too short: need at least {min} bytes, got {actual}")]
    TooShort { min: usize, actual: usize },

    #[error("unknown bootstrap message type: {0:#04x}")]
    UnknownMessageType(u8),

    #[error("malformed bootstrap payload: {0}")]
    Malformed(&'static str),

    #[error("out-of-sequence message in state {state}")]
    OutOfSequence { state: &'static str },

    #[error("challenge mismatch")]
    ChallengeMismatch,

    #[error("no free session slot")]
    NoFreeSlot,

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

//! Threshold secret lifecycle.
//!
//! A message is encrypted once under a random key, the key is split into N
//! shares and handed to the creator, and only empty share slots are stored.
//! Keyholders return shares one at a time; the submission that brings the
//! count to M triggers a single reconstruction attempt inside the same
//! transaction:
//!
//! ```text
//! Created -> Collecting(k < M) -> ReadyToReconstruct -> Decrypted
//!                                                    \-> Invalidated
//! ```
//!
//! A failed attempt wipes every stored share and closes the message for
//! good, so shares can't be brute-forced through repeated tries.

pub mod engine;
pub mod limits;
pub mod model;

pub use engine::{Engine, LifecyclePolicy};
pub use model::{
    CreatedMessage, MessageRecord, MessageState, MessageStatus, Phase, RedemptionOutcome,
    ShareRecord,
};

use thiserror::Error;

use crate::crypto::CryptoError;
use crate::db::GatewayError;

/// Engine errors
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid threshold parameters: {threshold} of {total}")]
    InvalidThresholdParameters { threshold: usize, total: usize },

    #[error("Encrypted message is too large: {size} bytes, max {max}")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("Message or share not found")]
    NotFound,

    #[error("Share slot is already filled")]
    AlreadyFilled,

    #[error("All share slots are already filled")]
    NoCapacity,

    #[error("Message is closed: {0}")]
    Closed(MessageState),

    #[error("Persistence error: {0}")]
    Persistence(#[from] GatewayError),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Reconstruction failed; message invalidated")]
    ReconstructionFailed,
}

/// Result type alias using EngineError
pub type EngineResult<T> = Result<T, EngineError>;

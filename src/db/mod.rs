//! Persistence gateway for messages and their share slots.
//!
//! Every engine operation runs inside one [`GatewayTx`]. Dropping a
//! transaction without calling [`GatewayTx::commit`] rolls it back, so an
//! early `?` return never leaves partial writes behind.

pub mod memory;
pub mod models;
pub mod sqlite;

pub use memory::MemoryGateway;
pub use sqlite::{init_db, DbPool, SqliteGateway};

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::lifecycle::{MessageRecord, MessageState, ShareRecord};

/// Storage errors
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Result of a conditional share fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillOutcome {
    Filled,
    /// The slot already holds a payload; nothing was written.
    AlreadyFilled,
    NotFound,
}

/// Transactional store for messages and shares.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Open a transaction. Concurrent transactions on the same data either
    /// serialize or fail with an error; they never interleave writes.
    async fn begin(&self) -> GatewayResult<Box<dyn GatewayTx>>;
}

/// Operations available inside a transaction.
#[async_trait]
pub trait GatewayTx: Send {
    /// Insert a message with all of its share slots. Fails as a whole.
    async fn insert_message_with_shares(
        &mut self,
        message: &MessageRecord,
        shares: &[ShareRecord],
    ) -> GatewayResult<()>;

    async fn fetch_message(&mut self, id: Uuid) -> GatewayResult<Option<MessageRecord>>;

    /// All share slots of a message, ordered by position.
    async fn fetch_shares(&mut self, message_id: Uuid) -> GatewayResult<Vec<ShareRecord>>;

    /// Write `payload` into an empty slot. Never overwrites a filled one.
    async fn conditional_fill_share(
        &mut self,
        share_id: Uuid,
        payload: &[u8],
    ) -> GatewayResult<FillOutcome>;

    /// Empty every slot of a message. Returns the number of slots touched.
    async fn bulk_clear_shares(&mut self, message_id: Uuid) -> GatewayResult<u64>;

    async fn set_message_state(&mut self, id: Uuid, state: MessageState) -> GatewayResult<()>;

    async fn commit(self: Box<Self>) -> GatewayResult<()>;

    async fn rollback(self: Box<Self>) -> GatewayResult<()>;
}

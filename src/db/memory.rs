//! In-process gateway.
//!
//! A transaction holds the store's mutex for its whole lifetime and works on
//! a copy of the data, which replaces the shared state on commit. That makes
//! transactions fully serial, so it is suitable for tests and single-node
//! deployments that don't need durability.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{FillOutcome, Gateway, GatewayError, GatewayResult, GatewayTx};
use crate::crypto::SecretBytes;
use crate::lifecycle::{MessageRecord, MessageState, ShareRecord};

#[derive(Clone, Default)]
struct MemoryState {
    messages: HashMap<Uuid, MessageRecord>,
    shares: HashMap<Uuid, ShareRecord>,
}

/// Gateway that keeps everything in memory
#[derive(Clone, Default)]
pub struct MemoryGateway {
    state: Arc<Mutex<MemoryState>>,
    fail_share_insert_at: Option<usize>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `insert_message_with_shares` fail after writing `index` shares.
    pub fn failing_share_insert_at(index: usize) -> Self {
        Self {
            fail_share_insert_at: Some(index),
            ..Self::default()
        }
    }

    /// Number of committed messages.
    pub async fn message_count(&self) -> usize {
        self.state.lock().await.messages.len()
    }

    /// Number of committed share rows.
    pub async fn share_count(&self) -> usize {
        self.state.lock().await.shares.len()
    }

    /// Rewrite a committed message in place.
    #[cfg(test)]
    pub(crate) async fn edit_message(&self, id: Uuid, edit: impl FnOnce(&mut MessageRecord)) {
        if let Some(message) = self.state.lock().await.messages.get_mut(&id) {
            edit(message);
        }
    }
}

#[async_trait]
impl Gateway for MemoryGateway {
    async fn begin(&self) -> GatewayResult<Box<dyn GatewayTx>> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTx {
            guard,
            working,
            fail_share_insert_at: self.fail_share_insert_at,
        }))
    }
}

/// Open in-memory transaction
pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
    fail_share_insert_at: Option<usize>,
}

#[async_trait]
impl GatewayTx for MemoryTx {
    async fn insert_message_with_shares(
        &mut self,
        message: &MessageRecord,
        shares: &[ShareRecord],
    ) -> GatewayResult<()> {
        if self.working.messages.contains_key(&message.id) {
            return Err(GatewayError::Unavailable(format!(
                "message {} already exists",
                message.id
            )));
        }
        self.working.messages.insert(message.id, message.clone());

        for (index, share) in shares.iter().enumerate() {
            if self.fail_share_insert_at == Some(index) {
                return Err(GatewayError::Unavailable(format!(
                    "injected failure inserting share {index}"
                )));
            }
            if self.working.shares.contains_key(&share.id) {
                return Err(GatewayError::Unavailable(format!(
                    "share {} already exists",
                    share.id
                )));
            }
            self.working.shares.insert(share.id, share.clone());
        }
        Ok(())
    }

    async fn fetch_message(&mut self, id: Uuid) -> GatewayResult<Option<MessageRecord>> {
        Ok(self.working.messages.get(&id).cloned())
    }

    async fn fetch_shares(&mut self, message_id: Uuid) -> GatewayResult<Vec<ShareRecord>> {
        let mut shares: Vec<ShareRecord> = self
            .working
            .shares
            .values()
            .filter(|s| s.message_id == message_id)
            .cloned()
            .collect();
        shares.sort_by_key(|s| s.position);
        Ok(shares)
    }

    async fn conditional_fill_share(
        &mut self,
        share_id: Uuid,
        payload: &[u8],
    ) -> GatewayResult<FillOutcome> {
        let Some(share) = self.working.shares.get_mut(&share_id) else {
            return Ok(FillOutcome::NotFound);
        };
        if share.is_filled() {
            return Ok(FillOutcome::AlreadyFilled);
        }
        share.payload = Some(SecretBytes::from_slice(payload));
        share.updated_at = Utc::now();
        Ok(FillOutcome::Filled)
    }

    async fn bulk_clear_shares(&mut self, message_id: Uuid) -> GatewayResult<u64> {
        let now = Utc::now();
        let mut cleared = 0;
        for share in self
            .working
            .shares
            .values_mut()
            .filter(|s| s.message_id == message_id)
        {
            share.payload = None;
            share.updated_at = now;
            cleared += 1;
        }
        Ok(cleared)
    }

    async fn set_message_state(&mut self, id: Uuid, state: MessageState) -> GatewayResult<()> {
        let message = self
            .working
            .messages
            .get_mut(&id)
            .ok_or_else(|| GatewayError::Corrupt(format!("message {id} vanished mid-transaction")))?;
        message.state = state;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> GatewayResult<()> {
        let MemoryTx {
            mut guard, working, ..
        } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> GatewayResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyDigest;

    fn new_message() -> (MessageRecord, Vec<ShareRecord>) {
        let digest = KeyDigest::of(&SecretBytes::from_slice(&[9u8; 32]));
        MessageRecord::new("bob", vec![1u8; 40], digest, 4, 2)
    }

    #[tokio::test]
    async fn test_commit_publishes_writes() {
        let gateway = MemoryGateway::new();
        let (message, shares) = new_message();

        let mut tx = gateway.begin().await.unwrap();
        tx.insert_message_with_shares(&message, &shares).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(gateway.message_count().await, 1);
        assert_eq!(gateway.share_count().await, 4);
    }

    #[tokio::test]
    async fn test_drop_discards_writes() {
        let gateway = MemoryGateway::new();
        let (message, shares) = new_message();

        let mut tx = gateway.begin().await.unwrap();
        tx.insert_message_with_shares(&message, &shares).await.unwrap();
        drop(tx);

        assert_eq!(gateway.message_count().await, 0);
        assert_eq!(gateway.share_count().await, 0);
    }

    #[tokio::test]
    async fn test_injected_failure_leaves_nothing() {
        let gateway = MemoryGateway::failing_share_insert_at(2);
        let (message, shares) = new_message();

        let mut tx = gateway.begin().await.unwrap();
        assert!(tx.insert_message_with_shares(&message, &shares).await.is_err());
        tx.rollback().await.unwrap();

        assert_eq!(gateway.message_count().await, 0);
        assert_eq!(gateway.share_count().await, 0);
    }

    #[tokio::test]
    async fn test_fill_clear_and_order() {
        let gateway = MemoryGateway::new();
        let (message, shares) = new_message();

        let mut tx = gateway.begin().await.unwrap();
        tx.insert_message_with_shares(&message, &shares).await.unwrap();

        let fetched = tx.fetch_shares(message.id).await.unwrap();
        let positions: Vec<usize> = fetched.iter().map(|s| s.position).collect();
        assert_eq!(positions, vec![0, 1, 2, 3]);

        let id = fetched[2].id;
        assert_eq!(tx.conditional_fill_share(id, &[5]).await.unwrap(), FillOutcome::Filled);
        assert_eq!(
            tx.conditional_fill_share(id, &[6]).await.unwrap(),
            FillOutcome::AlreadyFilled
        );
        assert_eq!(
            tx.conditional_fill_share(Uuid::new_v4(), &[6]).await.unwrap(),
            FillOutcome::NotFound
        );

        assert_eq!(tx.bulk_clear_shares(message.id).await.unwrap(), 4);
        assert!(tx
            .fetch_shares(message.id)
            .await
            .unwrap()
            .iter()
            .all(|s| !s.is_filled()));
    }

    #[tokio::test]
    async fn test_transactions_serialize() {
        let gateway = MemoryGateway::new();
        let first = gateway.begin().await.unwrap();

        let second = {
            let gateway = gateway.clone();
            tokio::spawn(async move { gateway.begin().await.map(|_| ()) })
        };

        tokio::task::yield_now().await;
        assert!(!second.is_finished());

        first.commit().await.unwrap();
        second.await.unwrap().unwrap();
    }
}

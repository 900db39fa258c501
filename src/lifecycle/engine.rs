use std::sync::Arc;

use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::limits::{self, MAX_ENCRYPTED_BODY_BYTES};
use super::model::{CreatedMessage, MessageRecord, MessageState, MessageStatus, RedemptionOutcome, ShareRecord};
use super::{EngineError, EngineResult};
use crate::crypto::{self, CryptoError, KeyDigest, SecretBytes, KEY_SIZE};
use crate::db::{FillOutcome, Gateway, GatewayTx};

/// What happens to stored shares after a successful unlock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecyclePolicy {
    /// Clear all share slots once the message has been decrypted. The
    /// plaintext is returned to the completing submission only and is never
    /// cached, so keeping the shares buys nothing but exposure.
    pub wipe_shares_on_success: bool,
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        Self {
            wipe_shares_on_success: true,
        }
    }
}

/// Why a reconstruction attempt failed. Logged, never shown to callers.
#[derive(Debug, Error)]
enum ReconstructionFailure {
    #[error("shares did not combine: {0}")]
    Combine(CryptoError),

    #[error("reconstructed key does not match stored digest")]
    DigestMismatch,

    #[error("digest matched but body did not decrypt: {0}")]
    Decrypt(CryptoError),
}

/// Orchestrates create, submit and status over a [`Gateway`].
///
/// Holds no mutable state of its own; every call is one gateway transaction.
#[derive(Clone)]
pub struct Engine {
    gateway: Arc<dyn Gateway>,
    policy: LifecyclePolicy,
}

impl Engine {
    pub fn new(gateway: Arc<dyn Gateway>, policy: LifecyclePolicy) -> Self {
        Self { gateway, policy }
    }

    /// Encrypt `plaintext`, split its key among `total` keyholders with
    /// threshold `threshold`, and store the message with empty share slots.
    ///
    /// The returned shares are the only copy; they must be shown to the
    /// creator once and then dropped.
    pub async fn create_message(
        &self,
        creator_label: &str,
        plaintext: &[u8],
        total: usize,
        threshold: usize,
    ) -> EngineResult<CreatedMessage> {
        limits::validate_submission(creator_label, plaintext, total, threshold)?;

        let key = crypto::generate_key(KEY_SIZE)?;
        let encrypted_body = crypto::encrypt(plaintext, key.expose())?;
        if encrypted_body.len() > MAX_ENCRYPTED_BODY_BYTES {
            return Err(EngineError::PayloadTooLarge {
                size: encrypted_body.len(),
                max: MAX_ENCRYPTED_BODY_BYTES,
            });
        }

        let key_digest = KeyDigest::of(&key);
        let shares = crypto::split(&key, total, threshold).map_err(|e| match e {
            CryptoError::InvalidThresholdParameters { threshold, total } => {
                EngineError::InvalidThresholdParameters { threshold, total }
            }
            other => EngineError::Crypto(other),
        })?;
        drop(key);

        let (message, slots) =
            MessageRecord::new(creator_label, encrypted_body, key_digest, total, threshold);

        let mut tx = self.gateway.begin().await?;
        if let Err(e) = tx.insert_message_with_shares(&message, &slots).await {
            error!(message_id = %message.id, "Failed to store message: {}", e);
            rollback(tx).await;
            return Err(e.into());
        }
        tx.commit().await?;

        info!(
            message_id = %message.id,
            total_shares = total,
            min_shares = threshold,
            "Message created"
        );
        Ok(CreatedMessage { message, shares })
    }

    /// Store one keyholder share and, if this completes the quorum, try to
    /// unlock the message.
    ///
    /// With `share_id` the share goes into that exact slot; without it, into
    /// any empty slot. A failed unlock wipes all shares and closes the
    /// message before [`EngineError::ReconstructionFailed`] is returned.
    pub async fn submit_share(
        &self,
        message_id: Uuid,
        share_id: Option<Uuid>,
        payload: &[u8],
    ) -> EngineResult<RedemptionOutcome> {
        limits::validate_share_payload(payload)?;

        let mut tx = self.gateway.begin().await?;

        let message = tx
            .fetch_message(message_id)
            .await?
            .ok_or(EngineError::NotFound)?;
        if message.state.is_terminal() {
            debug!(%message_id, state = %message.state, "Share submitted to closed message");
            return Err(EngineError::Closed(message.state));
        }

        let snapshot = tx.fetch_shares(message_id).await?;
        fill_slot(tx.as_mut(), &snapshot, share_id, payload).await?;

        let filled: Vec<SecretBytes> = tx
            .fetch_shares(message_id)
            .await?
            .into_iter()
            .filter_map(|s| s.payload)
            .collect();

        if filled.len() < message.min_shares {
            tx.commit().await?;
            debug!(
                %message_id,
                filled = filled.len(),
                min_shares = message.min_shares,
                "Share accepted"
            );
            return Ok(RedemptionOutcome::Collecting {
                filled: filled.len(),
                min_shares: message.min_shares,
                total_shares: message.total_shares,
            });
        }

        match reconstruct(&message, &filled) {
            Ok(plaintext) => {
                if self.policy.wipe_shares_on_success {
                    tx.bulk_clear_shares(message_id).await?;
                }
                tx.set_message_state(message_id, MessageState::Decrypted)
                    .await?;
                tx.commit().await?;

                info!(%message_id, shares = filled.len(), "Message decrypted");
                Ok(RedemptionOutcome::Decrypted { plaintext })
            }
            Err(failure) => {
                warn!(%message_id, "Reconstruction failed, invalidating message: {}", failure);
                let cleared = tx.bulk_clear_shares(message_id).await?;
                tx.set_message_state(message_id, MessageState::Invalidated)
                    .await?;
                tx.commit().await?;

                info!(%message_id, cleared, "Message invalidated");
                Err(EngineError::ReconstructionFailed)
            }
        }
    }

    /// Progress of a message. Read-only; never triggers reconstruction.
    pub async fn get_status(&self, message_id: Uuid) -> EngineResult<MessageStatus> {
        let mut tx = self.gateway.begin().await?;

        let Some(message) = tx.fetch_message(message_id).await? else {
            rollback(tx).await;
            return Err(EngineError::NotFound);
        };
        let shares = tx.fetch_shares(message_id).await?;
        tx.rollback().await?;

        Ok(MessageStatus::from_snapshot(&message, &shares))
    }
}

/// Pick a slot from `snapshot` and fill it through the conditional write.
async fn fill_slot(
    tx: &mut dyn GatewayTx,
    snapshot: &[ShareRecord],
    share_id: Option<Uuid>,
    payload: &[u8],
) -> EngineResult<()> {
    // Resubmitting a share that is already stored would break the combine.
    let duplicate = snapshot
        .iter()
        .filter_map(|s| s.payload.as_ref())
        .any(|stored| bool::from(stored.expose().ct_eq(payload)));
    if duplicate {
        return Err(EngineError::AlreadyFilled);
    }

    if let Some(target) = share_id {
        let slot = snapshot
            .iter()
            .find(|s| s.id == target)
            .ok_or(EngineError::NotFound)?;
        return match tx.conditional_fill_share(slot.id, payload).await? {
            FillOutcome::Filled => Ok(()),
            FillOutcome::AlreadyFilled => Err(EngineError::AlreadyFilled),
            FillOutcome::NotFound => Err(EngineError::NotFound),
        };
    }

    for slot in snapshot.iter().filter(|s| !s.is_filled()) {
        match tx.conditional_fill_share(slot.id, payload).await? {
            FillOutcome::Filled => return Ok(()),
            // Taken since the snapshot; try the next one.
            FillOutcome::AlreadyFilled | FillOutcome::NotFound => continue,
        }
    }
    Err(EngineError::NoCapacity)
}

fn reconstruct(
    message: &MessageRecord,
    filled: &[SecretBytes],
) -> Result<SecretBytes, ReconstructionFailure> {
    let key = crypto::combine(filled).map_err(ReconstructionFailure::Combine)?;
    if !message.key_digest.verify(&key) {
        return Err(ReconstructionFailure::DigestMismatch);
    }
    crypto::decrypt(&message.encrypted_body, key.expose()).map_err(ReconstructionFailure::Decrypt)
}

async fn rollback(tx: Box<dyn GatewayTx>) {
    if let Err(e) = tx.rollback().await {
        error!("Failed to rollback transaction: {}", e);
    }
}

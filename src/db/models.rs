use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use super::GatewayError;
use crate::crypto::{KeyDigest, SecretBytes};
use crate::lifecycle::{MessageRecord, MessageState, ShareRecord};

/// Row of the `messages` table
#[derive(Clone, FromRow)]
pub struct MessageRow {
    pub id: Uuid,
    pub creator_label: String,
    pub encrypted_body: Vec<u8>,
    pub key_digest: Vec<u8>,
    pub min_shares: i64,
    pub total_shares: i64,
    pub state: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row of the `message_shares` table. No `Debug`: holds share payloads.
#[derive(Clone, FromRow)]
pub struct ShareRow {
    pub id: Uuid,
    pub message_id: Uuid,
    pub position: i64,
    pub payload: Option<Vec<u8>>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<MessageRow> for MessageRecord {
    type Error = GatewayError;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        let key_digest = KeyDigest::from_slice(&row.key_digest).ok_or_else(|| {
            GatewayError::Corrupt(format!(
                "message {} has a {}-byte key digest",
                row.id,
                row.key_digest.len()
            ))
        })?;
        let state = MessageState::parse(&row.state).ok_or_else(|| {
            GatewayError::Corrupt(format!("message {} has unknown state {:?}", row.id, row.state))
        })?;
        let min_shares = usize::try_from(row.min_shares)
            .map_err(|_| GatewayError::Corrupt(format!("message {} min_shares", row.id)))?;
        let total_shares = usize::try_from(row.total_shares)
            .map_err(|_| GatewayError::Corrupt(format!("message {} total_shares", row.id)))?;

        Ok(Self {
            id: row.id,
            creator_label: row.creator_label,
            encrypted_body: row.encrypted_body,
            key_digest,
            min_shares,
            total_shares,
            state,
            created_at: row.created_at,
        })
    }
}

impl TryFrom<ShareRow> for ShareRecord {
    type Error = GatewayError;

    fn try_from(row: ShareRow) -> Result<Self, Self::Error> {
        let position = usize::try_from(row.position)
            .map_err(|_| GatewayError::Corrupt(format!("share {} position", row.id)))?;

        Ok(Self {
            id: row.id,
            message_id: row.message_id,
            position,
            payload: row.payload.map(SecretBytes::new),
            updated_at: row.updated_at,
        })
    }
}

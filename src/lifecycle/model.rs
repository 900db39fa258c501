use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::crypto::{KeyDigest, SecretBytes};

/// Persisted message state.
///
/// `Open` covers everything before the reconstruction attempt; the other two
/// are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageState {
    Open,
    Decrypted,
    Invalidated,
}

impl MessageState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Decrypted => "decrypted",
            Self::Invalidated => "invalidated",
        }
    }

    /// Parse a stored value. Unknown strings are `None`, not a default.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(Self::Open),
            "decrypted" => Some(Self::Decrypted),
            "invalidated" => Some(Self::Invalidated),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Open)
    }
}

impl std::fmt::Display for MessageState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle phase as seen from outside, derived from state and fill count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// No shares submitted yet
    Created,
    /// Some shares submitted, below threshold
    Collecting,
    /// Threshold reached but no attempt recorded. Only visible inside the
    /// submitting transaction, since the attempt runs before commit.
    ReadyToReconstruct,
    Decrypted,
    Invalidated,
}

/// A stored message. Everything except `state` is fixed at creation.
#[derive(Debug, Clone)]
pub struct MessageRecord {
    pub id: Uuid,
    pub creator_label: String,
    pub encrypted_body: Vec<u8>,
    pub key_digest: KeyDigest,
    pub min_shares: usize,
    pub total_shares: usize,
    pub state: MessageState,
    pub created_at: DateTime<Utc>,
}

/// One share slot. `payload` is `None` until a keyholder fills it.
#[derive(Debug, Clone)]
pub struct ShareRecord {
    pub id: Uuid,
    pub message_id: Uuid,
    pub position: usize,
    pub payload: Option<SecretBytes>,
    pub updated_at: DateTime<Utc>,
}

impl ShareRecord {
    pub fn is_filled(&self) -> bool {
        self.payload.is_some()
    }
}

impl MessageRecord {
    /// Build a new open message together with its `total_shares` empty slots.
    pub fn new(
        creator_label: &str,
        encrypted_body: Vec<u8>,
        key_digest: KeyDigest,
        total_shares: usize,
        min_shares: usize,
    ) -> (Self, Vec<ShareRecord>) {
        let now = Utc::now();
        let message = Self {
            id: Uuid::new_v4(),
            creator_label: creator_label.to_string(),
            encrypted_body,
            key_digest,
            min_shares,
            total_shares,
            state: MessageState::Open,
            created_at: now,
        };

        let shares = (0..total_shares)
            .map(|position| ShareRecord {
                id: Uuid::new_v4(),
                message_id: message.id,
                position,
                payload: None,
                updated_at: now,
            })
            .collect();

        (message, shares)
    }
}

/// Result of `create_message`: the stored message and the shares to hand
/// out. The shares are not kept anywhere else.
#[derive(Debug)]
pub struct CreatedMessage {
    pub message: MessageRecord,
    pub shares: Vec<SecretBytes>,
}

/// Result of a successful share submission.
#[derive(Debug)]
pub enum RedemptionOutcome {
    Collecting {
        filled: usize,
        min_shares: usize,
        total_shares: usize,
    },
    Decrypted {
        plaintext: SecretBytes,
    },
}

/// Read-only progress view of a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageStatus {
    pub message_id: Uuid,
    pub creator_label: String,
    pub filled: usize,
    pub min_shares: usize,
    pub total_shares: usize,
    pub state: MessageState,
    pub created_at: DateTime<Utc>,
}

impl MessageStatus {
    pub fn from_snapshot(message: &MessageRecord, shares: &[ShareRecord]) -> Self {
        Self {
            message_id: message.id,
            creator_label: message.creator_label.clone(),
            filled: shares.iter().filter(|s| s.is_filled()).count(),
            min_shares: message.min_shares,
            total_shares: message.total_shares,
            state: message.state,
            created_at: message.created_at,
        }
    }

    pub fn terminal_state(&self) -> Option<MessageState> {
        self.state.is_terminal().then_some(self.state)
    }

    pub fn phase(&self) -> Phase {
        match self.state {
            MessageState::Decrypted => Phase::Decrypted,
            MessageState::Invalidated => Phase::Invalidated,
            MessageState::Open if self.filled == 0 => Phase::Created,
            MessageState::Open if self.filled < self.min_shares => Phase::Collecting,
            MessageState::Open => Phase::ReadyToReconstruct,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digest() -> KeyDigest {
        KeyDigest::of(&SecretBytes::from_slice(&[1u8; 32]))
    }

    #[test]
    fn test_message_state_round_trip() {
        for state in [MessageState::Open, MessageState::Decrypted, MessageState::Invalidated] {
            assert_eq!(MessageState::parse(state.as_str()), Some(state));
        }
        assert_eq!(MessageState::parse("OPEN"), None);
        assert_eq!(format!("{}", MessageState::Invalidated), "invalidated");
    }

    #[test]
    fn test_new_message_has_empty_placeholders() {
        let (message, shares) = MessageRecord::new("alice", vec![0u8; 40], digest(), 5, 3);
        assert_eq!(message.state, MessageState::Open);
        assert_eq!(shares.len(), 5);
        for (i, share) in shares.iter().enumerate() {
            assert_eq!(share.message_id, message.id);
            assert_eq!(share.position, i);
            assert!(!share.is_filled());
        }
    }

    #[test]
    fn test_phase_progression() {
        let (message, mut shares) = MessageRecord::new("alice", vec![], digest(), 3, 2);
        assert_eq!(MessageStatus::from_snapshot(&message, &shares).phase(), Phase::Created);

        shares[0].payload = Some(SecretBytes::from_slice(&[1, 2]));
        let status = MessageStatus::from_snapshot(&message, &shares);
        assert_eq!(status.phase(), Phase::Collecting);
        assert_eq!(status.terminal_state(), None);

        shares[1].payload = Some(SecretBytes::from_slice(&[3, 4]));
        let status = MessageStatus::from_snapshot(&message, &shares);
        assert_eq!(status.phase(), Phase::ReadyToReconstruct);

        let mut closed = message.clone();
        closed.state = MessageState::Invalidated;
        let status = MessageStatus::from_snapshot(&closed, &shares);
        assert_eq!(status.phase(), Phase::Invalidated);
        assert_eq!(status.terminal_state(), Some(MessageState::Invalidated));
    }
}

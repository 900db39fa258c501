use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Sqlite, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

use super::models::{MessageRow, ShareRow};
use super::{FillOutcome, Gateway, GatewayError, GatewayResult, GatewayTx};
use crate::lifecycle::{MessageRecord, MessageState, ShareRecord};

pub type DbPool = Pool<Sqlite>;

/// Gateway backed by a SQLite pool
#[derive(Clone)]
pub struct SqliteGateway {
    pool: DbPool,
}

impl SqliteGateway {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Gateway for SqliteGateway {
    async fn begin(&self) -> GatewayResult<Box<dyn GatewayTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(SqliteTx { tx }))
    }
}

/// Open SQLite transaction. sqlx rolls it back on drop.
pub struct SqliteTx {
    tx: Transaction<'static, Sqlite>,
}

#[async_trait]
impl GatewayTx for SqliteTx {
    async fn insert_message_with_shares(
        &mut self,
        message: &MessageRecord,
        shares: &[ShareRecord],
    ) -> GatewayResult<()> {
        sqlx::query(
            r#"
            INSERT INTO messages (id, creator_label, encrypted_body, key_digest, min_shares, total_shares, state, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(message.id)
        .bind(&message.creator_label)
        .bind(&message.encrypted_body)
        .bind(&message.key_digest.as_bytes()[..])
        .bind(message.min_shares as i64)
        .bind(message.total_shares as i64)
        .bind(message.state.as_str())
        .bind(message.created_at)
        .bind(message.created_at)
        .execute(&mut *self.tx)
        .await?;

        for share in shares {
            sqlx::query(
                r#"
                INSERT INTO message_shares (id, message_id, position, payload, updated_at)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(share.id)
            .bind(share.message_id)
            .bind(share.position as i64)
            .bind(share.payload.as_ref().map(|p| p.expose()))
            .bind(share.updated_at)
            .execute(&mut *self.tx)
            .await?;
        }

        debug!(message_id = %message.id, shares = shares.len(), "Inserted message");
        Ok(())
    }

    async fn fetch_message(&mut self, id: Uuid) -> GatewayResult<Option<MessageRecord>> {
        let row = sqlx::query_as::<_, MessageRow>("SELECT * FROM messages WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;

        row.map(MessageRecord::try_from).transpose()
    }

    async fn fetch_shares(&mut self, message_id: Uuid) -> GatewayResult<Vec<ShareRecord>> {
        let rows = sqlx::query_as::<_, ShareRow>(
            "SELECT * FROM message_shares WHERE message_id = ? ORDER BY position",
        )
        .bind(message_id)
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(ShareRecord::try_from).collect()
    }

    async fn conditional_fill_share(
        &mut self,
        share_id: Uuid,
        payload: &[u8],
    ) -> GatewayResult<FillOutcome> {
        let result = sqlx::query(
            "UPDATE message_shares SET payload = ?, updated_at = ? WHERE id = ? AND payload IS NULL",
        )
        .bind(payload)
        .bind(Utc::now())
        .bind(share_id)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(FillOutcome::Filled);
        }

        let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM message_shares WHERE id = ?")
            .bind(share_id)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(match exists {
            Some(_) => FillOutcome::AlreadyFilled,
            None => FillOutcome::NotFound,
        })
    }

    async fn bulk_clear_shares(&mut self, message_id: Uuid) -> GatewayResult<u64> {
        let result = sqlx::query(
            "UPDATE message_shares SET payload = NULL, updated_at = ? WHERE message_id = ?",
        )
        .bind(Utc::now())
        .bind(message_id)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected())
    }

    async fn set_message_state(&mut self, id: Uuid, state: MessageState) -> GatewayResult<()> {
        let result = sqlx::query("UPDATE messages SET state = ?, updated_at = ? WHERE id = ?")
            .bind(state.as_str())
            .bind(Utc::now())
            .bind(id)
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(GatewayError::Corrupt(format!("message {id} vanished mid-transaction")));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> GatewayResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> GatewayResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[cfg(test)]
pub async fn setup_test_db() -> DbPool {
    use sqlx::sqlite::SqlitePoolOptions;
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database");
    init_db(&pool).await.expect("Failed to init database");
    pool
}

/// Initialize database with migrations
pub async fn init_db(pool: &DbPool) -> GatewayResult<()> {
    info!("Running database migrations");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS messages (
            id BLOB PRIMARY KEY NOT NULL,
            creator_label TEXT NOT NULL,
            encrypted_body BLOB NOT NULL,
            key_digest BLOB NOT NULL,
            min_shares INTEGER NOT NULL,
            total_shares INTEGER NOT NULL,
            state TEXT NOT NULL DEFAULT 'open',
            created_at DATETIME NOT NULL,
            updated_at DATETIME NOT NULL,
            CHECK (length(encrypted_body) <= 1024),
            CHECK (length(key_digest) = 32),
            CHECK (min_shares >= 2 AND min_shares <= total_shares AND total_shares <= 256)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS message_shares (
            id BLOB PRIMARY KEY NOT NULL,
            message_id BLOB NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
            position INTEGER NOT NULL,
            payload BLOB,
            updated_at DATETIME NOT NULL,
            UNIQUE(message_id, position)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_message_shares_message_id ON message_shares(message_id)",
    )
    .execute(pool)
    .await?;

    info!("Database migrations complete");
    Ok(())
}

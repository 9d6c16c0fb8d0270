//! Postgres implementation of the storage ports.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{
    AssetRecord, IncomingTransaction, OutgoingTransaction, TransactionStatus, UserDirectoryEntry,
    WatchedAccount,
};
use crate::ports::{
    AssetRepository, CursorStore, IncomingTransactionRepository, OutgoingTransactionRepository,
    RepositoryError, RepositoryResult, UserDirectory, WatchedAccountRepository,
};

/// Postgres-backed store.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const INCOMING_COLUMNS: &str = "id, external_id, user_id, platform_code, recipient, amount, \
     currency, issuer, status, data, metadata, created_at, updated_at";

const OUTGOING_COLUMNS: &str =
    "id, tx_code, recipient, amount, currency, issuer, status, claimed, reported, created_at, updated_at";

#[async_trait]
impl CursorStore for PostgresStore {
    async fn get_cursor(&self, account_id: &str) -> RepositoryResult<Option<String>> {
        let cursor: Option<Option<String>> =
            sqlx::query_scalar("SELECT cursor FROM watched_accounts WHERE account_id = $1")
                .bind(account_id)
                .fetch_optional(&self.pool)
                .await?;

        cursor.ok_or_else(|| RepositoryError::NotFound(account_id.to_string()))
    }

    async fn advance_cursor(
        &self,
        account_id: &str,
        expected: Option<&str>,
        next: &str,
    ) -> RepositoryResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE watched_accounts
            SET cursor = $3, updated_at = NOW()
            WHERE account_id = $1 AND cursor IS NOT DISTINCT FROM $2
            "#,
        )
        .bind(account_id)
        .bind(expected)
        .bind(next)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl WatchedAccountRepository for PostgresStore {
    async fn list(&self) -> RepositoryResult<Vec<WatchedAccount>> {
        let rows = sqlx::query_as::<_, WatchedAccountRow>(
            "SELECT account_id, name, network, secret, cursor, is_default \
             FROM watched_accounts ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(WatchedAccountRow::into_domain).collect())
    }

    async fn get_default(&self, network: &str) -> RepositoryResult<Option<WatchedAccount>> {
        let row = sqlx::query_as::<_, WatchedAccountRow>(
            "SELECT account_id, name, network, secret, cursor, is_default \
             FROM watched_accounts WHERE network = $1 AND is_default",
        )
        .bind(network)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(WatchedAccountRow::into_domain))
    }

    async fn upsert(&self, account: &WatchedAccount) -> RepositoryResult<WatchedAccount> {
        let row = sqlx::query_as::<_, WatchedAccountRow>(
            r#"
            INSERT INTO watched_accounts (account_id, name, network, secret, is_default)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (account_id) DO UPDATE
            SET name = EXCLUDED.name,
                network = EXCLUDED.network,
                secret = EXCLUDED.secret,
                is_default = EXCLUDED.is_default,
                updated_at = NOW()
            RETURNING account_id, name, network, secret, cursor, is_default
            "#,
        )
        .bind(&account.account_id)
        .bind(&account.name)
        .bind(&account.network)
        .bind(&account.secret)
        .bind(account.is_default)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into_domain())
    }
}

#[async_trait]
impl UserDirectory for PostgresStore {
    async fn get_or_create(
        &self,
        user_id: &str,
        account_id: &str,
    ) -> RepositoryResult<UserDirectoryEntry> {
        sqlx::query(
            "INSERT INTO user_accounts (user_id, account_id) VALUES ($1, $2) \
             ON CONFLICT (account_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(account_id)
        .execute(&self.pool)
        .await?;

        self.find_by_account_id(account_id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(account_id.to_string()))
    }

    async fn find_by_account_id(
        &self,
        account_id: &str,
    ) -> RepositoryResult<Option<UserDirectoryEntry>> {
        let row = sqlx::query_as::<_, (String, String, DateTime<Utc>)>(
            "SELECT user_id, account_id, created_at FROM user_accounts WHERE account_id = $1",
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(user_id, account_id, created_at)| UserDirectoryEntry {
            user_id,
            account_id,
            created_at,
        }))
    }
}

#[async_trait]
impl AssetRepository for PostgresStore {
    async fn find(&self, code: &str, account_id: &str) -> RepositoryResult<Option<AssetRecord>> {
        let row = sqlx::query_as::<_, AssetRow>(
            "SELECT id, code, issuer, account_id, metadata, created_at \
             FROM assets WHERE code = $1 AND account_id = $2",
        )
        .bind(code)
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(AssetRow::into_domain))
    }

    async fn insert_if_absent(&self, asset: &AssetRecord) -> RepositoryResult<(AssetRecord, bool)> {
        let inserted = sqlx::query_as::<_, AssetRow>(
            r#"
            INSERT INTO assets (id, code, issuer, account_id, metadata, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (code, account_id) DO NOTHING
            RETURNING id, code, issuer, account_id, metadata, created_at
            "#,
        )
        .bind(asset.id)
        .bind(&asset.code)
        .bind(&asset.issuer)
        .bind(&asset.account_id)
        .bind(&asset.metadata)
        .bind(asset.created_at)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = inserted {
            return Ok((row.into_domain(), true));
        }

        let existing = self
            .find(&asset.code, &asset.account_id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("{}:{}", asset.code, asset.account_id)))?;
        Ok((existing, false))
    }
}

#[async_trait]
impl IncomingTransactionRepository for PostgresStore {
    async fn insert_if_absent(
        &self,
        tx: &IncomingTransaction,
    ) -> RepositoryResult<Option<IncomingTransaction>> {
        let sql = format!(
            r#"
            INSERT INTO receive_transactions ({INCOMING_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (external_id) DO NOTHING
            RETURNING {INCOMING_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, IncomingRow>(&sql)
            .bind(tx.id)
            .bind(&tx.external_id)
            .bind(&tx.user_id)
            .bind(&tx.platform_code)
            .bind(&tx.recipient)
            .bind(tx.amount)
            .bind(&tx.currency)
            .bind(&tx.issuer)
            .bind(tx.status.as_str())
            .bind(&tx.data)
            .bind(&tx.metadata)
            .bind(tx.created_at)
            .bind(tx.updated_at)
            .fetch_optional(&self.pool)
            .await?;

        row.map(IncomingRow::into_domain).transpose()
    }

    async fn get_by_external_id(
        &self,
        external_id: &str,
    ) -> RepositoryResult<Option<IncomingTransaction>> {
        let sql = format!("SELECT {INCOMING_COLUMNS} FROM receive_transactions WHERE external_id = $1");
        let row = sqlx::query_as::<_, IncomingRow>(&sql)
            .bind(external_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(IncomingRow::into_domain).transpose()
    }

    async fn update_status(
        &self,
        external_id: &str,
        status: TransactionStatus,
    ) -> RepositoryResult<IncomingTransaction> {
        let sql = format!(
            "UPDATE receive_transactions SET status = $2, updated_at = NOW() \
             WHERE external_id = $1 RETURNING {INCOMING_COLUMNS}"
        );
        let row = sqlx::query_as::<_, IncomingRow>(&sql)
            .bind(external_id)
            .bind(status.as_str())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(external_id.to_string()))?;

        row.into_domain()
    }

    async fn set_platform_code(&self, external_id: &str, code: &str) -> RepositoryResult<()> {
        let result = sqlx::query(
            "UPDATE receive_transactions SET platform_code = $2, updated_at = NOW() \
             WHERE external_id = $1",
        )
        .bind(external_id)
        .bind(code)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(external_id.to_string()));
        }
        Ok(())
    }

    async fn list_unsynced(&self, limit: i64) -> RepositoryResult<Vec<IncomingTransaction>> {
        let sql = format!(
            "SELECT {INCOMING_COLUMNS} FROM receive_transactions \
             WHERE platform_code IS NULL AND status IN ('Pending', 'Complete') \
             ORDER BY created_at LIMIT $1"
        );
        let rows = sqlx::query_as::<_, IncomingRow>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(IncomingRow::into_domain).collect()
    }
}

#[async_trait]
impl OutgoingTransactionRepository for PostgresStore {
    async fn insert_if_absent(
        &self,
        tx: &OutgoingTransaction,
    ) -> RepositoryResult<(OutgoingTransaction, bool)> {
        let sql = format!(
            r#"
            INSERT INTO send_transactions ({OUTGOING_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (tx_code) DO NOTHING
            RETURNING {OUTGOING_COLUMNS}
            "#
        );
        let inserted = sqlx::query_as::<_, OutgoingRow>(&sql)
            .bind(tx.id)
            .bind(&tx.tx_code)
            .bind(&tx.recipient)
            .bind(tx.amount)
            .bind(&tx.currency)
            .bind(&tx.issuer)
            .bind(tx.status.as_str())
            .bind(tx.claimed)
            .bind(tx.reported)
            .bind(tx.created_at)
            .bind(tx.updated_at)
            .fetch_optional(&self.pool)
            .await?;

        if let Some(row) = inserted {
            return Ok((row.into_domain()?, true));
        }

        let existing = self
            .get(&tx.tx_code)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(tx.tx_code.clone()))?;
        Ok((existing, false))
    }

    async fn get(&self, tx_code: &str) -> RepositoryResult<Option<OutgoingTransaction>> {
        let sql = format!("SELECT {OUTGOING_COLUMNS} FROM send_transactions WHERE tx_code = $1");
        let row = sqlx::query_as::<_, OutgoingRow>(&sql)
            .bind(tx_code)
            .fetch_optional(&self.pool)
            .await?;

        row.map(OutgoingRow::into_domain).transpose()
    }

    async fn update_status(
        &self,
        tx_code: &str,
        status: TransactionStatus,
    ) -> RepositoryResult<OutgoingTransaction> {
        let sql = format!(
            "UPDATE send_transactions SET status = $2, updated_at = NOW() \
             WHERE tx_code = $1 RETURNING {OUTGOING_COLUMNS}"
        );
        let row = sqlx::query_as::<_, OutgoingRow>(&sql)
            .bind(tx_code)
            .bind(status.as_str())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(tx_code.to_string()))?;

        row.into_domain()
    }

    async fn claim(&self, tx_code: &str) -> RepositoryResult<bool> {
        let result = sqlx::query(
            "UPDATE send_transactions SET claimed = TRUE, updated_at = NOW() \
             WHERE tx_code = $1 AND status = 'Pending' AND NOT claimed",
        )
        .bind(tx_code)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn list_pending(&self) -> RepositoryResult<Vec<OutgoingTransaction>> {
        let sql = format!(
            "SELECT {OUTGOING_COLUMNS} FROM send_transactions \
             WHERE status = 'Pending' AND NOT claimed ORDER BY created_at"
        );
        let rows = sqlx::query_as::<_, OutgoingRow>(&sql)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(OutgoingRow::into_domain).collect()
    }

    async fn mark_reported(&self, tx_code: &str) -> RepositoryResult<bool> {
        let result = sqlx::query(
            "UPDATE send_transactions SET reported = TRUE, updated_at = NOW() \
             WHERE tx_code = $1 AND NOT reported",
        )
        .bind(tx_code)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

// Internal row types for SQLx. Not exposed outside the adapter.

#[derive(Debug, sqlx::FromRow)]
struct WatchedAccountRow {
    account_id: String,
    name: String,
    network: String,
    secret: Option<String>,
    cursor: Option<String>,
    is_default: bool,
}

impl WatchedAccountRow {
    fn into_domain(self) -> WatchedAccount {
        WatchedAccount {
            account_id: self.account_id,
            name: self.name,
            network: self.network,
            secret: self.secret,
            cursor: self.cursor,
            is_default: self.is_default,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AssetRow {
    id: Uuid,
    code: String,
    issuer: String,
    account_id: String,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl AssetRow {
    fn into_domain(self) -> AssetRecord {
        AssetRecord {
            id: self.id,
            code: self.code,
            issuer: self.issuer,
            account_id: self.account_id,
            metadata: self.metadata,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct IncomingRow {
    id: Uuid,
    external_id: String,
    user_id: String,
    platform_code: Option<String>,
    recipient: String,
    amount: i64,
    currency: String,
    issuer: String,
    status: String,
    data: serde_json::Value,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl IncomingRow {
    fn into_domain(self) -> RepositoryResult<IncomingTransaction> {
        Ok(IncomingTransaction {
            id: self.id,
            external_id: self.external_id,
            user_id: self.user_id,
            platform_code: self.platform_code,
            recipient: self.recipient,
            amount: self.amount,
            currency: self.currency,
            issuer: self.issuer,
            status: parse_status(&self.status)?,
            data: self.data,
            metadata: self.metadata,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OutgoingRow {
    id: Uuid,
    tx_code: String,
    recipient: String,
    amount: i64,
    currency: String,
    issuer: Option<String>,
    status: String,
    claimed: bool,
    reported: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OutgoingRow {
    fn into_domain(self) -> RepositoryResult<OutgoingTransaction> {
        Ok(OutgoingTransaction {
            id: self.id,
            tx_code: self.tx_code,
            recipient: self.recipient,
            amount: self.amount,
            currency: self.currency,
            issuer: self.issuer,
            status: parse_status(&self.status)?,
            claimed: self.claimed,
            reported: self.reported,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn parse_status(value: &str) -> RepositoryResult<TransactionStatus> {
    value.parse().map_err(RepositoryError::Database)
}

//! Transaction and balance update storage.

use chrono::Utc;
use sqlx::Row;
use sqlx::sqlite::{SqliteConnection, SqlitePool, SqliteRow};

use super::model::{BalanceType, BalanceUpdate, NewBalanceUpdate, NewTransaction, Transaction};
use crate::db::{format_date, parse_date, parse_decimal, parse_timestamp};
use crate::{AccountId, Result, SyncSourceId, UserId};

/// Repository for transactions.
#[derive(Debug, Clone)]
pub struct TransactionRepository {
    pool: SqlitePool,
}

impl TransactionRepository {
    /// Create a repository on a shared pool.
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert inside the caller's transaction. Returns the new row id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn insert_in(conn: &mut SqliteConnection, txn: &NewTransaction) -> Result<i64> {
        let result = sqlx::query(
            r"
            INSERT INTO transactions
                (user_id, account_id, sync_source_id, processed_email_id,
                 date, amount, merchant, card_last4, pending, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(txn.user_id.0)
        .bind(txn.account_id.0)
        .bind(txn.sync_source_id.0)
        .bind(txn.processed_email_id)
        .bind(format_date(txn.date))
        .bind(txn.amount.to_string())
        .bind(&txn.merchant)
        .bind(&txn.card_last4)
        .bind(txn.pending)
        .bind(Utc::now().to_rfc3339())
        .execute(conn)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Most recent transactions of an account, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_for_account(
        &self,
        account_id: AccountId,
        limit: u32,
    ) -> Result<Vec<Transaction>> {
        let rows = sqlx::query(
            r"
            SELECT id, user_id, account_id, sync_source_id, processed_email_id,
                   date, amount, merchant, card_last4, pending, created_at
            FROM transactions
            WHERE account_id = ?
            ORDER BY date DESC, id DESC
            LIMIT ?
            ",
        )
        .bind(account_id.0)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_transaction).collect()
    }

    /// Number of transactions ingested from a source.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn count_for_source(&self, id: SyncSourceId) -> Result<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM transactions WHERE sync_source_id = ?")
            .bind(id.0)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

/// Repository for balance updates.
#[derive(Debug, Clone)]
pub struct BalanceUpdateRepository {
    pool: SqlitePool,
}

impl BalanceUpdateRepository {
    /// Create a repository on a shared pool.
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert inside the caller's transaction. Returns the new row id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn insert_in(conn: &mut SqliteConnection, update: &NewBalanceUpdate) -> Result<i64> {
        let result = sqlx::query(
            r"
            INSERT INTO balance_updates
                (user_id, account_id, sync_source_id, processed_email_id,
                 balance_type, new_balance, update_date, update_source, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(update.user_id.0)
        .bind(update.account_id.0)
        .bind(update.sync_source_id.map(|id| id.0))
        .bind(update.processed_email_id)
        .bind(update.balance_type.as_str())
        .bind(update.new_balance.to_string())
        .bind(format_date(update.update_date))
        .bind(&update.update_source)
        .bind(Utc::now().to_rfc3339())
        .execute(conn)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Insert outside any ingestion transaction (e.g. a manual correction).
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn insert(&self, update: &NewBalanceUpdate) -> Result<i64> {
        let mut conn = self.pool.acquire().await?;
        Self::insert_in(&mut conn, update).await
    }

    /// The current balance of a kind: latest `update_date`, then highest `id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn latest(
        &self,
        account_id: AccountId,
        balance_type: BalanceType,
    ) -> Result<Option<BalanceUpdate>> {
        let row = sqlx::query(
            r"
            SELECT id, user_id, account_id, sync_source_id, processed_email_id,
                   balance_type, new_balance, update_date, update_source, created_at
            FROM balance_updates
            WHERE account_id = ? AND balance_type = ?
            ORDER BY update_date DESC, id DESC
            LIMIT 1
            ",
        )
        .bind(account_id.0)
        .bind(balance_type.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_balance_update).transpose()
    }

    /// Balance history of a kind, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn history(
        &self,
        account_id: AccountId,
        balance_type: BalanceType,
        limit: u32,
    ) -> Result<Vec<BalanceUpdate>> {
        let rows = sqlx::query(
            r"
            SELECT id, user_id, account_id, sync_source_id, processed_email_id,
                   balance_type, new_balance, update_date, update_source, created_at
            FROM balance_updates
            WHERE account_id = ? AND balance_type = ?
            ORDER BY update_date DESC, id DESC
            LIMIT ?
            ",
        )
        .bind(account_id.0)
        .bind(balance_type.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_balance_update).collect()
    }
}

fn row_to_transaction(row: &SqliteRow) -> Result<Transaction> {
    Ok(Transaction {
        id: row.get("id"),
        user_id: UserId(row.get("user_id")),
        account_id: AccountId(row.get("account_id")),
        sync_source_id: row.get::<Option<i64>, _>("sync_source_id").map(SyncSourceId),
        processed_email_id: row.get("processed_email_id"),
        date: parse_date(row.get("date"))?,
        amount: parse_decimal(row.get("amount"))?,
        merchant: row.get("merchant"),
        card_last4: row.get("card_last4"),
        pending: row.get("pending"),
        created_at: parse_timestamp(row.get("created_at"))?,
    })
}

fn row_to_balance_update(row: &SqliteRow) -> Result<BalanceUpdate> {
    Ok(BalanceUpdate {
        id: row.get("id"),
        user_id: UserId(row.get("user_id")),
        account_id: AccountId(row.get("account_id")),
        sync_source_id: row.get::<Option<i64>, _>("sync_source_id").map(SyncSourceId),
        processed_email_id: row.get("processed_email_id"),
        balance_type: BalanceType::parse(row.get("balance_type"))?,
        new_balance: parse_decimal(row.get("new_balance"))?,
        update_date: parse_date(row.get("update_date"))?,
        update_source: row.get("update_source"),
        created_at: parse_timestamp(row.get("created_at"))?,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::Database;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn update(date: (i32, u32, u32), cents: i64) -> NewBalanceUpdate {
        NewBalanceUpdate {
            user_id: UserId(1),
            account_id: AccountId(5),
            sync_source_id: None,
            processed_email_id: None,
            balance_type: BalanceType::AvailableBalance,
            new_balance: Decimal::new(cents, 2),
            update_date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            update_source: "manual".to_string(),
        }
    }

    #[tokio::test]
    async fn test_latest_prefers_date_then_id() {
        let db = Database::in_memory().await.unwrap();
        let repo = db.balance_updates();

        repo.insert(&update((2026, 1, 3), 100)).await.unwrap();
        repo.insert(&update((2026, 1, 5), 200)).await.unwrap();
        let tie_winner = repo.insert(&update((2026, 1, 5), 300)).await.unwrap();
        // Inserted last but dated earlier.
        repo.insert(&update((2026, 1, 4), 400)).await.unwrap();

        let latest = repo
            .latest(AccountId(5), BalanceType::AvailableBalance)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.id, tie_winner);
        assert_eq!(latest.new_balance, Decimal::new(300, 2));

        let history = repo
            .history(AccountId(5), BalanceType::AvailableBalance, 10)
            .await
            .unwrap();
        let balances: Vec<_> = history.iter().map(|u| u.new_balance).collect();
        assert_eq!(
            balances,
            vec![
                Decimal::new(300, 2),
                Decimal::new(200, 2),
                Decimal::new(400, 2),
                Decimal::new(100, 2)
            ]
        );
    }

    #[tokio::test]
    async fn test_latest_is_scoped_by_type() {
        let db = Database::in_memory().await.unwrap();
        let repo = db.balance_updates();

        repo.insert(&update((2026, 1, 3), 100)).await.unwrap();

        assert!(
            repo.latest(AccountId(5), BalanceType::CurrentBalance)
                .await
                .unwrap()
                .is_none()
        );
    }
}

//! Wallet manager implementation: atomic debit/credit over an append-only
//! ledger.

use super::{
    errors::{WalletError, WalletResult},
    models::{EntryKind, EntryStatus, LedgerEntry, Wallet},
};
use crate::game::MatchId;
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::sync::Arc;

/// Wallet manager
///
/// Exposes the two funds primitives, `debit` and `credit`. Each call is a
/// single atomic unit: verify the balance (debit only), append the ledger
/// entry, update the cached balance. The `_in_tx` variants compose the same
/// primitives into a caller-owned transaction so the engine can settle a
/// match and move funds as one serializable unit. Callers that hold a match
/// lock must acquire it before calling into the wallet (match before user).
#[derive(Clone)]
pub struct WalletManager {
    pool: Arc<PgPool>,
}

impl WalletManager {
    /// Create a new wallet manager
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Get wallet balance for a user
    pub async fn get_wallet(&self, user_id: i64) -> WalletResult<Wallet> {
        let row = sqlx::query(
            r#"
            SELECT user_id, balance, created_at, updated_at
            FROM wallets
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(self.pool.as_ref())
        .await?
        .ok_or(WalletError::WalletNotFound(user_id))?;

        Ok(row_to_wallet(&row))
    }

    /// Get the wallet for a user, creating an empty one if none exists.
    pub async fn get_or_create_wallet(&self, user_id: i64) -> WalletResult<Wallet> {
        sqlx::query(
            "INSERT INTO wallets (user_id, balance) VALUES ($1, 0)
             ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(user_id)
        .execute(self.pool.as_ref())
        .await?;

        self.get_wallet(user_id).await
    }

    /// Debit a user's balance as one atomic unit.
    ///
    /// # Errors
    ///
    /// * `WalletError::InsufficientFunds` - debit would drive the balance
    ///   negative; the balance is left untouched
    /// * `WalletError::DuplicateReference` - reference already used
    pub async fn debit(
        &self,
        user_id: i64,
        amount: i64,
        kind: EntryKind,
        reference: String,
        match_id: Option<MatchId>,
        description: Option<String>,
    ) -> WalletResult<i64> {
        let mut tx = self.pool.begin().await?;
        let balance = self
            .debit_in_tx(
                &mut tx,
                user_id,
                match_id,
                amount,
                kind,
                EntryStatus::Settled,
                reference,
                description,
            )
            .await?;
        tx.commit().await?;
        Ok(balance)
    }

    /// Credit a user's balance as one atomic unit.
    pub async fn credit(
        &self,
        user_id: i64,
        amount: i64,
        kind: EntryKind,
        reference: String,
        match_id: Option<MatchId>,
        description: Option<String>,
    ) -> WalletResult<i64> {
        let mut tx = self.pool.begin().await?;
        let balance = self
            .credit_in_tx(
                &mut tx,
                user_id,
                match_id,
                amount,
                kind,
                EntryStatus::Settled,
                reference,
                description,
            )
            .await?;
        tx.commit().await?;
        Ok(balance)
    }

    /// Debit inside a caller-owned transaction. Returns the new balance.
    ///
    /// The balance check and update are a single conditional UPDATE, so two
    /// concurrent debits can never both pass the check; the loser observes
    /// the reduced balance or fails with `InsufficientFunds`.
    #[allow(clippy::too_many_arguments)]
    pub async fn debit_in_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user_id: i64,
        match_id: Option<MatchId>,
        amount: i64,
        kind: EntryKind,
        status: EntryStatus,
        reference: String,
        description: Option<String>,
    ) -> WalletResult<i64> {
        if amount <= 0 {
            return Err(WalletError::InvalidAmount(amount));
        }
        self.reject_duplicate_reference(tx, &reference).await?;

        let updated = sqlx::query(
            "UPDATE wallets
             SET balance = balance - $1, updated_at = NOW()
             WHERE user_id = $2 AND balance >= $1
             RETURNING balance",
        )
        .bind(amount)
        .bind(user_id)
        .fetch_optional(&mut **tx)
        .await?;

        let new_balance: i64 = match updated {
            Some(row) => row.get("balance"),
            None => {
                // Either the wallet doesn't exist or the balance is short.
                let check = sqlx::query("SELECT balance FROM wallets WHERE user_id = $1")
                    .bind(user_id)
                    .fetch_optional(&mut **tx)
                    .await?;

                match check {
                    Some(row) => {
                        return Err(WalletError::InsufficientFunds {
                            available: row.get("balance"),
                            required: amount,
                        });
                    }
                    None => return Err(WalletError::WalletNotFound(user_id)),
                }
            }
        };

        self.create_entry(
            tx,
            user_id,
            match_id,
            -amount,
            new_balance,
            kind,
            status,
            reference,
            description,
        )
        .await?;

        Ok(new_balance)
    }

    /// Credit inside a caller-owned transaction. Returns the new balance.
    #[allow(clippy::too_many_arguments)]
    pub async fn credit_in_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user_id: i64,
        match_id: Option<MatchId>,
        amount: i64,
        kind: EntryKind,
        status: EntryStatus,
        reference: String,
        description: Option<String>,
    ) -> WalletResult<i64> {
        if amount <= 0 {
            return Err(WalletError::InvalidAmount(amount));
        }
        self.reject_duplicate_reference(tx, &reference).await?;

        let current = sqlx::query("SELECT balance FROM wallets WHERE user_id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or(WalletError::WalletNotFound(user_id))?;

        let current_balance: i64 = current.get("balance");
        let new_balance = current_balance
            .checked_add(amount)
            .ok_or(WalletError::BalanceOverflow)?;

        sqlx::query(
            "UPDATE wallets
             SET balance = $1, updated_at = NOW()
             WHERE user_id = $2",
        )
        .bind(new_balance)
        .bind(user_id)
        .execute(&mut **tx)
        .await?;

        self.create_entry(
            tx,
            user_id,
            match_id,
            amount,
            new_balance,
            kind,
            status,
            reference,
            description,
        )
        .await?;

        Ok(new_balance)
    }

    /// Optimistically debit a withdrawal, holding the ledger entry pending
    /// until the gateway confirms or fails the transfer.
    pub async fn begin_withdrawal(
        &self,
        user_id: i64,
        amount: i64,
        reference: String,
    ) -> WalletResult<i64> {
        let mut tx = self.pool.begin().await?;
        let balance = self
            .debit_in_tx(
                &mut tx,
                user_id,
                None,
                amount,
                EntryKind::Withdrawal,
                EntryStatus::Pending,
                reference,
                Some("Withdrawal hold".to_string()),
            )
            .await?;
        tx.commit().await?;
        Ok(balance)
    }

    /// Flip a pending withdrawal entry to settled once the gateway confirms.
    pub async fn settle_withdrawal(&self, reference: &str) -> WalletResult<()> {
        let result = sqlx::query(
            "UPDATE ledger_entries
             SET status = 'settled'
             WHERE reference = $1 AND kind = 'withdrawal' AND status = 'pending'",
        )
        .bind(reference)
        .execute(self.pool.as_ref())
        .await?;

        if result.rows_affected() == 0 {
            return Err(WalletError::EntryNotFound(reference.to_string()));
        }
        Ok(())
    }

    /// Reverse a failed withdrawal: mark the pending entry reversed and
    /// credit the debited amount back as a compensating refund. Returns the
    /// new balance.
    pub async fn reverse_withdrawal(&self, reference: &str) -> WalletResult<i64> {
        let mut tx = self.pool.begin().await?;

        let entry = sqlx::query(
            "SELECT user_id, amount FROM ledger_entries
             WHERE reference = $1 AND kind = 'withdrawal' AND status = 'pending'
             FOR UPDATE",
        )
        .bind(reference)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| WalletError::EntryNotFound(reference.to_string()))?;

        let user_id: i64 = entry.get("user_id");
        let amount: i64 = entry.get("amount");

        sqlx::query("UPDATE ledger_entries SET status = 'reversed' WHERE reference = $1")
            .bind(reference)
            .execute(&mut *tx)
            .await?;

        let new_balance = self
            .credit_in_tx(
                &mut tx,
                user_id,
                None,
                amount.abs(),
                EntryKind::Refund,
                EntryStatus::Settled,
                format!("{reference}:reversal"),
                Some("Withdrawal reversal".to_string()),
            )
            .await?;

        tx.commit().await?;
        Ok(new_balance)
    }

    /// Get ledger entries for a user, most recent first
    pub async fn get_entries(&self, user_id: i64, limit: i64) -> WalletResult<Vec<LedgerEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, match_id, amount, balance_after, kind, status, reference, description, created_at
            FROM ledger_entries
            WHERE user_id = $1
            ORDER BY id DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows.iter().map(row_to_entry).collect())
    }

    /// Get every ledger entry tied to a match, oldest first. Used by the
    /// audit surface and the conservation tests.
    pub async fn get_match_entries(&self, match_id: MatchId) -> WalletResult<Vec<LedgerEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, match_id, amount, balance_after, kind, status, reference, description, created_at
            FROM ledger_entries
            WHERE match_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(match_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows.iter().map(row_to_entry).collect())
    }

    async fn reject_duplicate_reference(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        reference: &str,
    ) -> WalletResult<()> {
        let existing = sqlx::query("SELECT id FROM ledger_entries WHERE reference = $1")
            .bind(reference)
            .fetch_optional(&mut **tx)
            .await?;

        if existing.is_some() {
            return Err(WalletError::DuplicateReference(reference.to_string()));
        }
        Ok(())
    }

    /// Append a ledger entry. A row is written for every balance-affecting
    /// call, even zero-net flows, to preserve auditability.
    #[allow(clippy::too_many_arguments)]
    async fn create_entry(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user_id: i64,
        match_id: Option<MatchId>,
        amount: i64,
        balance_after: i64,
        kind: EntryKind,
        status: EntryStatus,
        reference: String,
        description: Option<String>,
    ) -> WalletResult<i64> {
        let row = sqlx::query(
            r#"
            INSERT INTO ledger_entries (user_id, match_id, amount, balance_after, kind, status, reference, description)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(match_id)
        .bind(amount)
        .bind(balance_after)
        .bind(kind.to_string())
        .bind(status.to_string())
        .bind(reference)
        .bind(description)
        .fetch_one(&mut **tx)
        .await?;

        Ok(row.get("id"))
    }
}

fn row_to_wallet(row: &sqlx::postgres::PgRow) -> Wallet {
    Wallet {
        user_id: row.get("user_id"),
        balance: row.get("balance"),
        created_at: row.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
        updated_at: row.get::<chrono::NaiveDateTime, _>("updated_at").and_utc(),
    }
}

fn row_to_entry(row: &sqlx::postgres::PgRow) -> LedgerEntry {
    LedgerEntry {
        id: row.get("id"),
        user_id: row.get("user_id"),
        match_id: row.get("match_id"),
        amount: row.get("amount"),
        balance_after: row.get("balance_after"),
        kind: EntryKind::from_db(&row.get::<String, _>("kind")),
        status: EntryStatus::from_db(&row.get::<String, _>("status")),
        reference: row.get("reference"),
        description: row.get("description"),
        created_at: row.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
    }
}

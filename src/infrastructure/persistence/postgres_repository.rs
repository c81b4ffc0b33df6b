use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{info, instrument};

use crate::domain::entities::{
    LedgerEntryType, MonetaryTransaction, MovementRequest, TransactionStatus, Wallet,
};
use crate::domain::error::{LedgerError, WalletRef};
use crate::domain::repository::{LedgerRepository, TransactionFilter};
use crate::domain::types::{canonical_order, TransactionId, WalletId};

use super::models::{LedgerEntryRow, TransactionRow, WalletRow};

/// PostgreSQL-backed storage adapter. `execute_movement` is the Transaction
/// Executor's single storage transaction (§4.2 of the design notes): it owns
/// the insert-PENDING race collapse, the Wallet Locker's canonical-order
/// locking, the balance updates, and the Ledger Writer's append-only insert,
/// committing or rolling back as one unit.
pub struct PostgresLedgerRepository {
    pool: PgPool,
}

impl PostgresLedgerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_entries(&self, id: TransactionId) -> Result<Vec<crate::domain::entities::LedgerEntry>, LedgerError> {
        let rows: Vec<LedgerEntryRow> = sqlx::query_as(
            "SELECT id, transaction_id, wallet_id, entry_type, amount, balance_after, created_at
             FROM ledger_entries WHERE transaction_id = $1 ORDER BY created_at ASC",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(LedgerError::storage)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[async_trait]
impl LedgerRepository for PostgresLedgerRepository {
    #[instrument(skip(self))]
    async fn find_by_idempotency_key(
        &self,
        idempotency_key: &str,
    ) -> Result<Option<MonetaryTransaction>, LedgerError> {
        let row: Option<TransactionRow> = sqlx::query_as(
            "SELECT id, idempotency_key, transaction_type, status, source_wallet_id,
                    destination_wallet_id, amount, reference_id, metadata, error_message,
                    created_at, updated_at
             FROM transactions WHERE idempotency_key = $1",
        )
        .bind(idempotency_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(LedgerError::storage)?;

        match row {
            None => Ok(None),
            Some(row) => {
                let entries = self.load_entries(row.id).await?;
                Ok(Some(row.into_transaction(entries)))
            }
        }
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: TransactionId) -> Result<Option<MonetaryTransaction>, LedgerError> {
        let row: Option<TransactionRow> = sqlx::query_as(
            "SELECT id, idempotency_key, transaction_type, status, source_wallet_id,
                    destination_wallet_id, amount, reference_id, metadata, error_message,
                    created_at, updated_at
             FROM transactions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(LedgerError::storage)?;

        match row {
            None => Ok(None),
            Some(row) => {
                let entries = self.load_entries(row.id).await?;
                Ok(Some(row.into_transaction(entries)))
            }
        }
    }

    #[instrument(skip(self))]
    async fn list(&self, filter: TransactionFilter) -> Result<Vec<MonetaryTransaction>, LedgerError> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT t.id, t.idempotency_key, t.transaction_type, t.status, t.source_wallet_id,
                    t.destination_wallet_id, t.amount, t.reference_id, t.metadata, t.error_message,
                    t.created_at, t.updated_at
             FROM transactions t",
        );

        // Only join wallets when actually filtering by owner: the join matches
        // a row once per side (source, destination), so pulling it in
        // unconditionally would return every transaction twice and corrupt
        // LIMIT/OFFSET pagination.
        if let Some(user_id) = filter.user_id {
            builder.push(
                " JOIN wallets w ON w.id = t.source_wallet_id OR w.id = t.destination_wallet_id
                  WHERE w.user_id = ",
            );
            builder.push_bind(user_id);
            if let Some(transaction_type) = filter.transaction_type {
                builder.push(" AND t.transaction_type = ").push_bind(transaction_type);
            }
        } else if let Some(transaction_type) = filter.transaction_type {
            builder.push(" WHERE t.transaction_type = ").push_bind(transaction_type);
        }

        builder.push(" ORDER BY t.created_at DESC LIMIT ").push_bind(filter.limit.max(1));
        builder.push(" OFFSET ").push_bind(filter.offset.max(0));

        let rows: Vec<TransactionRow> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(LedgerError::storage)?;

        let mut transactions = Vec::with_capacity(rows.len());
        for row in rows {
            let entries = self.load_entries(row.id).await?;
            transactions.push(row.into_transaction(entries));
        }
        Ok(transactions)
    }

    #[instrument(skip(self, request), fields(idempotency_key = %request.idempotency_key))]
    async fn execute_movement(&self, request: MovementRequest) -> Result<MonetaryTransaction, LedgerError> {
        let mut tx = self.pool.begin().await.map_err(LedgerError::storage)?;

        let transaction_id = TransactionId::new();
        let insert = sqlx::query(
            "INSERT INTO transactions
                (id, idempotency_key, transaction_type, status, source_wallet_id,
                 destination_wallet_id, amount, reference_id, metadata)
             VALUES ($1, $2, $3, 'PENDING', $4, $5, $6, $7, $8)",
        )
        .bind(transaction_id)
        .bind(&request.idempotency_key)
        .bind(request.transaction_type)
        .bind(request.source_wallet_id)
        .bind(request.destination_wallet_id)
        .bind(request.amount)
        .bind(&request.reference_id)
        .bind(&request.metadata)
        .execute(&mut *tx)
        .await;

        if let Err(sqlx::Error::Database(db_err)) = &insert {
            if db_err.is_unique_violation() {
                tx.rollback().await.map_err(LedgerError::storage)?;
                let winner = self
                    .find_by_idempotency_key(&request.idempotency_key)
                    .await?
                    .ok_or_else(|| {
                        LedgerError::StorageError(
                            "unique violation on idempotency key but no winning row found".to_string(),
                        )
                    })?;
                return Err(LedgerError::DuplicateKeyRace(winner.id));
            }
        }
        insert.map_err(LedgerError::storage)?;

        let (source_wallet, dest_wallet) =
            lock_wallets_canonical(&mut tx, request.source_wallet_id, request.destination_wallet_id).await?;

        if request.validate_source_balance && source_wallet.balance < request.amount {
            tx.rollback().await.map_err(LedgerError::storage)?;
            return Err(LedgerError::InsufficientBalance {
                wallet_id: source_wallet.id,
                required: request.amount,
                available: source_wallet.balance,
            });
        }

        let new_source_balance = source_wallet.balance - request.amount;
        let new_dest_balance = dest_wallet.balance + request.amount;

        update_wallet_balance(&mut tx, source_wallet.id, new_source_balance).await?;
        update_wallet_balance(&mut tx, dest_wallet.id, new_dest_balance).await?;

        write_ledger_pair(
            &mut tx,
            transaction_id,
            source_wallet.id,
            new_source_balance,
            dest_wallet.id,
            new_dest_balance,
            request.amount,
        )
        .await?;

        sqlx::query("UPDATE transactions SET status = 'COMPLETED', updated_at = now() WHERE id = $1")
            .bind(transaction_id)
            .execute(&mut *tx)
            .await
            .map_err(LedgerError::storage)?;

        tx.commit().await.map_err(LedgerError::storage)?;

        info!(%transaction_id, "movement committed");

        self.find_by_id(transaction_id)
            .await?
            .ok_or_else(|| LedgerError::StorageError("transaction vanished after commit".to_string()))
    }

    async fn attempt_ledger_entry_update(&self, _id: crate::domain::types::LedgerEntryId) -> Result<(), LedgerError> {
        Err(LedgerError::LedgerImmutable)
    }
}

/// Wallet Locker (§4.3): acquires exclusive row locks in canonical byte order
/// of the wallet id so two concurrent movements touching the same pair of
/// wallets can never wait on each other in opposite orders. Returns the
/// wallets in the caller's original (source, destination) order.
async fn lock_wallets_canonical(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    source_id: WalletId,
    dest_id: WalletId,
) -> Result<(Wallet, Wallet), LedgerError> {
    if source_id == dest_id {
        let wallet = lock_single_wallet(tx, source_id).await?;
        return Ok((wallet.clone(), wallet));
    }

    let (first, second) = canonical_order(source_id, dest_id);
    let first_wallet = lock_single_wallet(tx, first).await?;
    let second_wallet = lock_single_wallet(tx, second).await?;

    if first == source_id {
        Ok((first_wallet, second_wallet))
    } else {
        Ok((second_wallet, first_wallet))
    }
}

async fn lock_single_wallet(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    id: WalletId,
) -> Result<Wallet, LedgerError> {
    let row: Option<WalletRow> = sqlx::query_as(
        "SELECT id, user_id, asset_type_id, balance, created_at, updated_at
         FROM wallets WHERE id = $1 FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(&mut **tx)
    .await
    .map_err(LedgerError::storage)?;

    row.map(Into::into)
        .ok_or(LedgerError::WalletNotFound(WalletRef::Id(id)))
}

async fn update_wallet_balance(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    wallet_id: WalletId,
    new_balance: Decimal,
) -> Result<(), LedgerError> {
    sqlx::query("UPDATE wallets SET balance = $1, updated_at = now() WHERE id = $2")
        .bind(new_balance)
        .bind(wallet_id)
        .execute(&mut **tx)
        .await
        .map_err(LedgerError::storage)?;
    Ok(())
}

/// Ledger Writer (§4.4): appends the debit/credit pair with the Executor's
/// already-computed `balanceAfter` snapshots. Ledger rows are never updated
/// again; `LedgerImmutable` is enforced by there being no update path at all,
/// not by a runtime check on this write path.
#[allow(clippy::too_many_arguments)]
async fn write_ledger_pair(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    transaction_id: TransactionId,
    source_wallet_id: WalletId,
    source_balance_after: Decimal,
    dest_wallet_id: WalletId,
    dest_balance_after: Decimal,
    amount: Decimal,
) -> Result<(), LedgerError> {
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO ledger_entries (id, transaction_id, wallet_id, entry_type, amount, balance_after, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7), ($8, $2, $9, $10, $5, $11, $7)",
    )
    .bind(crate::domain::types::LedgerEntryId::new())
    .bind(transaction_id)
    .bind(source_wallet_id)
    .bind(LedgerEntryType::Debit)
    .bind(amount)
    .bind(source_balance_after)
    .bind(now)
    .bind(crate::domain::types::LedgerEntryId::new())
    .bind(dest_wallet_id)
    .bind(LedgerEntryType::Credit)
    .bind(dest_balance_after)
    .execute(&mut **tx)
    .await
    .map_err(LedgerError::storage)?;

    Ok(())
}


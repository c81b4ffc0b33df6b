use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use super::entities::{MonetaryTransaction, MovementRequest, Wallet};
use super::error::LedgerError;
use super::types::{AssetTypeId, LedgerEntryId, TransactionId, UserId};

/// Optional filters for the read-only list operation (§6, outside the core's
/// transactional guarantees — plain reads of committed state).
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub user_id: Option<UserId>,
    pub transaction_type: Option<crate::domain::entities::TransactionType>,
    pub limit: i64,
    pub offset: i64,
}

/// The storage port the core depends on. `execute_movement` is the Transaction
/// Executor's single storage transaction (§4.2): it owns the insert-PENDING,
/// the Wallet Locker's canonical-order locking, the balance updates, the
/// Ledger Writer's batch insert, and the COMPLETED transition, all atomically.
/// Splitting these steps across separate trait methods would force the storage
/// transaction itself across the trait-object boundary; instead each concrete
/// adapter (Postgres, in-memory) implements the whole protocol internally and
/// is trusted to follow it exactly as specified.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait LedgerRepository: Send + Sync {
    async fn find_by_idempotency_key(
        &self,
        idempotency_key: &str,
    ) -> Result<Option<MonetaryTransaction>, LedgerError>;

    async fn find_by_id(
        &self,
        id: TransactionId,
    ) -> Result<Option<MonetaryTransaction>, LedgerError>;

    async fn list(
        &self,
        filter: TransactionFilter,
    ) -> Result<Vec<MonetaryTransaction>, LedgerError>;

    async fn execute_movement(
        &self,
        request: MovementRequest,
    ) -> Result<MonetaryTransaction, LedgerError>;

    /// Always fails with `LedgerImmutable` (§4.4, §8 invariant 6). No adapter
    /// exposes a real update path for ledger entries; this exists so the
    /// immutability guarantee itself is exercised by a test rather than
    /// inferred from the absence of a method.
    async fn attempt_ledger_entry_update(&self, id: LedgerEntryId) -> Result<(), LedgerError>;
}

/// Wallet lookup collaborator (§1: "deliberately out of scope" for the core
/// itself, but required by the movement operations to resolve ids before
/// entering the executor).
#[cfg_attr(test, automock)]
#[async_trait]
pub trait WalletLookup: Send + Sync {
    async fn find_user_wallet(
        &self,
        user_id: UserId,
        asset_type_code: &str,
    ) -> Result<Option<Wallet>, LedgerError>;

    async fn find_treasury_wallet(
        &self,
        asset_type_code: &str,
    ) -> Result<Option<Wallet>, LedgerError>;

    async fn find_void_wallet(&self, asset_type_code: &str) -> Result<Option<Wallet>, LedgerError>;

    async fn find_asset_type_id(&self, asset_type_code: &str) -> Result<Option<AssetTypeId>, LedgerError>;
}

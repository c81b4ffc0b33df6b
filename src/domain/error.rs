use rust_decimal::Decimal;
use thiserror::Error;

use super::types::{TransactionId, WalletId};

/// Identifies a wallet that could not be found, either by id (lost the race
/// between resolution and the executor's locked read) or by its lookup key
/// (no such user/asset wallet exists at all).
#[derive(Debug, Clone)]
pub enum WalletRef {
    Id(WalletId),
    Lookup(String),
}

impl std::fmt::Display for WalletRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Lookup(key) => write!(f, "{key}"),
        }
    }
}

/// The full error taxonomy for the ledger core. The Executor recovers only
/// `DuplicateKeyRace` internally; every other variant aborts the operation
/// with rollback and is surfaced to the caller.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("validation failed: {0}")]
    ValidationError(String),

    #[error("insufficient balance on wallet {wallet_id}: required {required}, available {available}")]
    InsufficientBalance {
        wallet_id: WalletId,
        required: Decimal,
        available: Decimal,
    },

    #[error("wallet not found: {0}")]
    WalletNotFound(WalletRef),

    #[error("duplicate idempotency key race, winning transaction: {0}")]
    DuplicateKeyRace(TransactionId),

    #[error("a transaction with this idempotency key is still in flight")]
    ConflictInFlight,

    #[error("a transaction with this idempotency key has terminally failed: {0}")]
    TerminallyFailed(String),

    #[error("attempted mutation of an immutable ledger entry")]
    LedgerImmutable,

    #[error("storage error: {0}")]
    StorageError(String),
}

impl LedgerError {
    pub fn storage(err: impl std::fmt::Display) -> Self {
        Self::StorageError(err.to_string())
    }
}

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use sqlx::FromRow;

use crate::domain::entities::{
    LedgerEntry, LedgerEntryType, MonetaryTransaction, TransactionStatus, TransactionType, Wallet,
};
use crate::domain::types::{AssetTypeId, LedgerEntryId, TransactionId, UserId, WalletId};

#[derive(Debug, FromRow)]
pub struct TransactionRow {
    pub id: TransactionId,
    pub idempotency_key: String,
    pub transaction_type: TransactionType,
    pub status: TransactionStatus,
    pub source_wallet_id: WalletId,
    pub destination_wallet_id: WalletId,
    pub amount: Decimal,
    pub reference_id: Option<String>,
    pub metadata: Option<JsonValue>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TransactionRow {
    pub fn into_transaction(self, ledger_entries: Vec<LedgerEntry>) -> MonetaryTransaction {
        MonetaryTransaction {
            id: self.id,
            idempotency_key: self.idempotency_key,
            transaction_type: self.transaction_type,
            status: self.status,
            source_wallet_id: self.source_wallet_id,
            destination_wallet_id: self.destination_wallet_id,
            amount: self.amount,
            reference_id: self.reference_id,
            metadata: self.metadata,
            error_message: self.error_message,
            created_at: self.created_at,
            updated_at: self.updated_at,
            ledger_entries,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct LedgerEntryRow {
    pub id: LedgerEntryId,
    pub transaction_id: TransactionId,
    pub wallet_id: WalletId,
    pub entry_type: LedgerEntryType,
    pub amount: Decimal,
    pub balance_after: Decimal,
    pub created_at: DateTime<Utc>,
}

impl From<LedgerEntryRow> for LedgerEntry {
    fn from(row: LedgerEntryRow) -> Self {
        LedgerEntry {
            id: row.id,
            transaction_id: row.transaction_id,
            wallet_id: row.wallet_id,
            entry_type: row.entry_type,
            amount: row.amount,
            balance_after: row.balance_after,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct WalletRow {
    pub id: WalletId,
    pub user_id: UserId,
    pub asset_type_id: AssetTypeId,
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<WalletRow> for Wallet {
    fn from(row: WalletRow) -> Self {
        Wallet {
            id: row.id,
            user_id: row.user_id,
            asset_type_id: row.asset_type_id,
            balance: row.balance,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::domain::entities::{
    LedgerEntry, LedgerEntryType, MonetaryTransaction, MovementRequest, TransactionStatus, Wallet,
};
use crate::domain::error::{LedgerError, WalletRef};
use crate::domain::repository::{LedgerRepository, TransactionFilter, WalletLookup};
use crate::domain::types::{AssetTypeId, LedgerEntryId, TransactionId, UserId, WalletId};

/// In-memory stand-in for the Storage Adapter, grounded in the same discipline
/// a real row-locking backend provides: every mutating operation holds its
/// locks for the whole critical section, so two concurrent `execute_movement`
/// calls serialize exactly as they would behind `SELECT ... FOR UPDATE`. Used
/// by tests that need genuine concurrent-task semantics (§8 scenarios 3 and 4)
/// without a live Postgres instance.
#[derive(Default)]
pub struct InMemoryLedger {
    wallets: Mutex<HashMap<WalletId, Wallet>>,
    transactions: Mutex<HashMap<TransactionId, MonetaryTransaction>>,
    idempotency_index: Mutex<HashMap<String, TransactionId>>,
    treasury_wallets: Mutex<HashMap<String, WalletId>>,
    void_wallets: Mutex<HashMap<String, WalletId>>,
    user_wallets: Mutex<HashMap<(UserId, String), WalletId>>,
    asset_type_ids: Mutex<HashMap<String, AssetTypeId>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_wallet(&self, wallet: Wallet) {
        self.wallets.lock().unwrap().insert(wallet.id, wallet);
    }

    pub fn seed_user_wallet(&self, user_id: UserId, asset_type_code: &str, wallet: Wallet) {
        let id = wallet.id;
        self.seed_wallet(wallet);
        self.user_wallets
            .lock()
            .unwrap()
            .insert((user_id, asset_type_code.to_string()), id);
    }

    pub fn seed_treasury_wallet(&self, asset_type_code: &str, wallet: Wallet) {
        let id = wallet.id;
        self.seed_wallet(wallet);
        self.treasury_wallets
            .lock()
            .unwrap()
            .insert(asset_type_code.to_string(), id);
    }

    pub fn seed_void_wallet(&self, asset_type_code: &str, wallet: Wallet) {
        let id = wallet.id;
        self.seed_wallet(wallet);
        self.void_wallets
            .lock()
            .unwrap()
            .insert(asset_type_code.to_string(), id);
    }

    pub fn seed_asset_type(&self, asset_type_code: &str, id: AssetTypeId) {
        self.asset_type_ids
            .lock()
            .unwrap()
            .insert(asset_type_code.to_string(), id);
    }

    pub fn balance_of(&self, wallet_id: WalletId) -> Option<rust_decimal::Decimal> {
        self.wallets.lock().unwrap().get(&wallet_id).map(|w| w.balance)
    }
}

#[async_trait]
impl LedgerRepository for InMemoryLedger {
    async fn find_by_idempotency_key(
        &self,
        idempotency_key: &str,
    ) -> Result<Option<MonetaryTransaction>, LedgerError> {
        let index = self.idempotency_index.lock().unwrap();
        let transactions = self.transactions.lock().unwrap();
        Ok(index
            .get(idempotency_key)
            .and_then(|id| transactions.get(id))
            .cloned())
    }

    async fn find_by_id(&self, id: TransactionId) -> Result<Option<MonetaryTransaction>, LedgerError> {
        Ok(self.transactions.lock().unwrap().get(&id).cloned())
    }

    async fn list(&self, filter: TransactionFilter) -> Result<Vec<MonetaryTransaction>, LedgerError> {
        let transactions = self.transactions.lock().unwrap();
        let wallets = self.wallets.lock().unwrap();

        let mut matching: Vec<MonetaryTransaction> = transactions
            .values()
            .filter(|t| {
                filter.transaction_type.is_none_or(|ty| ty == t.transaction_type)
                    && filter.user_id.is_none_or(|uid| {
                        wallets
                            .get(&t.source_wallet_id)
                            .map(|w| w.user_id == uid)
                            .unwrap_or(false)
                            || wallets
                                .get(&t.destination_wallet_id)
                                .map(|w| w.user_id == uid)
                                .unwrap_or(false)
                    })
            })
            .cloned()
            .collect();

        matching.sort_by_key(|t| std::cmp::Reverse(t.created_at));

        let offset = filter.offset.max(0) as usize;
        let limit = filter.limit.max(1) as usize;
        Ok(matching.into_iter().skip(offset).take(limit).collect())
    }

    async fn execute_movement(&self, request: MovementRequest) -> Result<MonetaryTransaction, LedgerError> {
        // Hold every lock for the whole operation: the in-memory equivalent of
        // BEGIN / SELECT ... FOR UPDATE / COMMIT. No other call can observe or
        // mutate these maps while we hold them.
        let mut transactions = self.transactions.lock().unwrap();
        let mut idempotency_index = self.idempotency_index.lock().unwrap();
        let mut wallets = self.wallets.lock().unwrap();

        if let Some(&winner) = idempotency_index.get(&request.idempotency_key) {
            return Err(LedgerError::DuplicateKeyRace(winner));
        }

        let source = wallets
            .get(&request.source_wallet_id)
            .cloned()
            .ok_or(LedgerError::WalletNotFound(WalletRef::Id(request.source_wallet_id)))?;
        let dest = wallets
            .get(&request.destination_wallet_id)
            .cloned()
            .ok_or(LedgerError::WalletNotFound(WalletRef::Id(
                request.destination_wallet_id,
            )))?;

        if request.validate_source_balance && source.balance < request.amount {
            return Err(LedgerError::InsufficientBalance {
                wallet_id: source.id,
                required: request.amount,
                available: source.balance,
            });
        }

        let new_source_balance = source.balance - request.amount;
        let new_dest_balance = dest.balance + request.amount;
        let now = Utc::now();
        let transaction_id = TransactionId::new();

        if let Some(w) = wallets.get_mut(&source.id) {
            w.balance = new_source_balance;
            w.updated_at = now;
        }
        if let Some(w) = wallets.get_mut(&dest.id) {
            w.balance = new_dest_balance;
            w.updated_at = now;
        }

        let debit = LedgerEntry {
            id: LedgerEntryId::new(),
            transaction_id,
            wallet_id: source.id,
            entry_type: LedgerEntryType::Debit,
            amount: request.amount,
            balance_after: new_source_balance,
            created_at: now,
        };
        let credit = LedgerEntry {
            id: LedgerEntryId::new(),
            transaction_id,
            wallet_id: dest.id,
            entry_type: LedgerEntryType::Credit,
            amount: request.amount,
            balance_after: new_dest_balance,
            created_at: now,
        };

        let transaction = MonetaryTransaction {
            id: transaction_id,
            idempotency_key: request.idempotency_key.clone(),
            transaction_type: request.transaction_type,
            status: TransactionStatus::Completed,
            source_wallet_id: source.id,
            destination_wallet_id: dest.id,
            amount: request.amount,
            reference_id: request.reference_id,
            metadata: request.metadata,
            error_message: None,
            created_at: now,
            updated_at: now,
            ledger_entries: vec![debit, credit],
        };

        idempotency_index.insert(request.idempotency_key, transaction_id);
        transactions.insert(transaction_id, transaction.clone());

        Ok(transaction)
    }

    async fn attempt_ledger_entry_update(&self, _id: LedgerEntryId) -> Result<(), LedgerError> {
        Err(LedgerError::LedgerImmutable)
    }
}

#[async_trait]
impl WalletLookup for InMemoryLedger {
    async fn find_user_wallet(
        &self,
        user_id: UserId,
        asset_type_code: &str,
    ) -> Result<Option<Wallet>, LedgerError> {
        let id = self
            .user_wallets
            .lock()
            .unwrap()
            .get(&(user_id, asset_type_code.to_string()))
            .copied();
        Ok(id.and_then(|id| self.wallets.lock().unwrap().get(&id).cloned()))
    }

    async fn find_treasury_wallet(&self, asset_type_code: &str) -> Result<Option<Wallet>, LedgerError> {
        let id = self.treasury_wallets.lock().unwrap().get(asset_type_code).copied();
        Ok(id.and_then(|id| self.wallets.lock().unwrap().get(&id).cloned()))
    }

    async fn find_void_wallet(&self, asset_type_code: &str) -> Result<Option<Wallet>, LedgerError> {
        let id = self.void_wallets.lock().unwrap().get(asset_type_code).copied();
        Ok(id.and_then(|id| self.wallets.lock().unwrap().get(&id).cloned()))
    }

    async fn find_asset_type_id(&self, asset_type_code: &str) -> Result<Option<AssetTypeId>, LedgerError> {
        Ok(self.asset_type_ids.lock().unwrap().get(asset_type_code).copied())
    }
}

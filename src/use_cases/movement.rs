use std::sync::Arc;

use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use tracing::{info, instrument, warn};

use crate::domain::entities::{MonetaryTransaction, MovementRequest, TransactionType};
use crate::domain::error::{LedgerError, WalletRef};
use crate::domain::repository::{LedgerRepository, WalletLookup};
use crate::domain::types::UserId;

use super::idempotency_gate::{classify, GateDecision};

const MAX_IDEMPOTENCY_KEY_LEN: usize = 255;

/// Orchestrates the three movement operations of §6: resolves wallets, runs
/// the Idempotency Gate, and delegates to the Transaction Executor
/// (`LedgerRepository::execute_movement`) when the gate says to proceed.
pub struct MovementUseCase {
    repository: Arc<dyn LedgerRepository>,
    wallets: Arc<dyn WalletLookup>,
}

impl MovementUseCase {
    /// Wires the use case to its storage and wallet-lookup collaborators.
    pub fn new(repository: Arc<dyn LedgerRepository>, wallets: Arc<dyn WalletLookup>) -> Self {
        Self { repository, wallets }
    }

    /// Treasury → user transfer (§5): source = treasury wallet of the asset,
    /// destination = the user's wallet, `validateSourceBalance = false` since
    /// the treasury may go negative.
    #[instrument(skip(self, metadata), fields(asset_type_code, idempotency_key))]
    pub async fn top_up(
        &self,
        user_id: UserId,
        asset_type_code: &str,
        amount: Decimal,
        reference_id: Option<String>,
        metadata: Option<JsonValue>,
        idempotency_key: String,
    ) -> Result<MonetaryTransaction, LedgerError> {
        let treasury = self.require_treasury_wallet(asset_type_code).await?;
        let user_wallet = self.require_user_wallet(user_id, asset_type_code).await?;

        self.execute(
            idempotency_key,
            TransactionType::TopUp,
            treasury.id,
            user_wallet.id,
            amount,
            reference_id,
            metadata,
            false,
        )
        .await
    }

    /// Identical in structure to `top_up`; distinguished only by the
    /// `TransactionType::Bonus` discriminator and the typical use of
    /// `metadata` to record a reason.
    #[instrument(skip(self, metadata), fields(asset_type_code, idempotency_key))]
    pub async fn bonus(
        &self,
        user_id: UserId,
        asset_type_code: &str,
        amount: Decimal,
        metadata: Option<JsonValue>,
        idempotency_key: String,
    ) -> Result<MonetaryTransaction, LedgerError> {
        let treasury = self.require_treasury_wallet(asset_type_code).await?;
        let user_wallet = self.require_user_wallet(user_id, asset_type_code).await?;

        self.execute(
            idempotency_key,
            TransactionType::Bonus,
            treasury.id,
            user_wallet.id,
            amount,
            None,
            metadata,
            false,
        )
        .await
    }

    /// User → treasury transfer (§5): source = the user's wallet, destination
    /// = treasury wallet of the asset, `validateSourceBalance = true` so the
    /// user's wallet can never be driven negative.
    #[instrument(skip(self, metadata), fields(asset_type_code, idempotency_key))]
    pub async fn purchase(
        &self,
        user_id: UserId,
        asset_type_code: &str,
        amount: Decimal,
        reference_id: Option<String>,
        metadata: Option<JsonValue>,
        idempotency_key: String,
    ) -> Result<MonetaryTransaction, LedgerError> {
        let user_wallet = self.require_user_wallet(user_id, asset_type_code).await?;
        let treasury = self.require_treasury_wallet(asset_type_code).await?;

        self.execute(
            idempotency_key,
            TransactionType::Purchase,
            user_wallet.id,
            treasury.id,
            amount,
            reference_id,
            metadata,
            true,
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn execute(
        &self,
        idempotency_key: String,
        transaction_type: TransactionType,
        source_wallet_id: crate::domain::types::WalletId,
        destination_wallet_id: crate::domain::types::WalletId,
        amount: Decimal,
        reference_id: Option<String>,
        metadata: Option<JsonValue>,
        validate_source_balance: bool,
    ) -> Result<MonetaryTransaction, LedgerError> {
        validate_amount(amount)?;
        validate_idempotency_key(&idempotency_key)?;

        let existing = self.repository.find_by_idempotency_key(&idempotency_key).await?;
        match classify(existing)? {
            GateDecision::Replay(transaction) => {
                info!(idempotency_key, "replaying completed transaction");
                return Ok(transaction);
            }
            GateDecision::Proceed => {}
        }

        let request = MovementRequest {
            idempotency_key: idempotency_key.clone(),
            transaction_type,
            source_wallet_id,
            destination_wallet_id,
            amount,
            reference_id,
            metadata,
            validate_source_balance,
        };

        match self.repository.execute_movement(request).await {
            Ok(transaction) => Ok(transaction),
            Err(LedgerError::DuplicateKeyRace(winner_id)) => {
                info!(idempotency_key, %winner_id, "lost idempotency key race, replaying winner");
                self.repository
                    .find_by_id(winner_id)
                    .await?
                    .ok_or(LedgerError::StorageError(
                        "winning transaction vanished after race collapse".to_string(),
                    ))
            }
            Err(err) => {
                warn!(
                    idempotency_key,
                    transaction_type = transaction_type_name(transaction_type),
                    error = %err,
                    "movement failed"
                );
                Err(err)
            }
        }
    }

    async fn require_treasury_wallet(
        &self,
        asset_type_code: &str,
    ) -> Result<crate::domain::entities::Wallet, LedgerError> {
        self.wallets
            .find_treasury_wallet(asset_type_code)
            .await?
            .ok_or_else(|| {
                LedgerError::WalletNotFound(WalletRef::Lookup(format!(
                    "treasury wallet for asset {asset_type_code}"
                )))
            })
    }

    async fn require_user_wallet(
        &self,
        user_id: UserId,
        asset_type_code: &str,
    ) -> Result<crate::domain::entities::Wallet, LedgerError> {
        self.wallets
            .find_user_wallet(user_id, asset_type_code)
            .await?
            .ok_or_else(|| {
                LedgerError::WalletNotFound(WalletRef::Lookup(format!(
                    "wallet for user {user_id} asset {asset_type_code}"
                )))
            })
    }
}

fn transaction_type_name(t: TransactionType) -> &'static str {
    match t {
        TransactionType::TopUp => "TOP_UP",
        TransactionType::Bonus => "BONUS",
        TransactionType::Purchase => "PURCHASE",
    }
}

fn validate_amount(amount: Decimal) -> Result<(), LedgerError> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::ValidationError(
            "amount must be strictly positive".to_string(),
        ));
    }
    if amount.scale() > 4 {
        return Err(LedgerError::ValidationError(
            "amount may carry at most 4 fractional digits".to_string(),
        ));
    }
    Ok(())
}

fn validate_idempotency_key(key: &str) -> Result<(), LedgerError> {
    if key.is_empty() {
        return Err(LedgerError::ValidationError(
            "idempotency key must not be empty".to_string(),
        ));
    }
    if key.len() > MAX_IDEMPOTENCY_KEY_LEN {
        return Err(LedgerError::ValidationError(format!(
            "idempotency key must be at most {MAX_IDEMPOTENCY_KEY_LEN} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{TransactionStatus, Wallet};
    use crate::domain::repository::{MockLedgerRepository, MockWalletLookup};
    use crate::domain::types::{TransactionId, WalletId};
    use chrono::Utc;
    use mockall::predicate::*;

    fn wallet(id: WalletId) -> Wallet {
        Wallet {
            id,
            user_id: UserId::new(),
            asset_type_id: crate::domain::types::AssetTypeId::new(),
            balance: Decimal::new(100000, 0),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn completed_transaction(id: TransactionId) -> MonetaryTransaction {
        MonetaryTransaction {
            id,
            idempotency_key: "k1".to_string(),
            transaction_type: TransactionType::TopUp,
            status: TransactionStatus::Completed,
            source_wallet_id: WalletId::new(),
            destination_wallet_id: WalletId::new(),
            amount: Decimal::new(500, 0),
            reference_id: None,
            metadata: None,
            error_message: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            ledger_entries: vec![],
        }
    }

    #[tokio::test]
    async fn top_up_rejects_non_positive_amount() {
        let repo = MockLedgerRepository::new();
        let wallets = MockWalletLookup::new();
        let use_case = MovementUseCase::new(Arc::new(repo), Arc::new(wallets));

        let err = use_case
            .top_up(UserId::new(), "GOLD_COINS", Decimal::ZERO, None, None, "k1".to_string())
            .await
            .unwrap_err();

        assert!(matches!(err, LedgerError::ValidationError(_)));
    }

    #[tokio::test]
    async fn top_up_replays_completed_transaction_without_executing() {
        let mut repo = MockLedgerRepository::new();
        let mut wallets = MockWalletLookup::new();
        let user_id = UserId::new();

        wallets
            .expect_find_treasury_wallet()
            .returning(|_| Ok(Some(wallet(WalletId::new()))));
        wallets
            .expect_find_user_wallet()
            .returning(move |_, _| Ok(Some(wallet(WalletId::new()))));

        let tx_id = TransactionId::new();
        repo.expect_find_by_idempotency_key()
            .with(eq("k1"))
            .returning(move |_| Ok(Some(completed_transaction(tx_id))));
        repo.expect_execute_movement().times(0);

        let use_case = MovementUseCase::new(Arc::new(repo), Arc::new(wallets));
        let result = use_case
            .top_up(user_id, "GOLD_COINS", Decimal::new(500, 0), None, None, "k1".to_string())
            .await
            .unwrap();

        assert_eq!(result.id, tx_id);
    }

    #[tokio::test]
    async fn top_up_fails_when_treasury_wallet_missing() {
        let repo = MockLedgerRepository::new();
        let mut wallets = MockWalletLookup::new();
        wallets.expect_find_treasury_wallet().returning(|_| Ok(None));

        let use_case = MovementUseCase::new(Arc::new(repo), Arc::new(wallets));
        let err = use_case
            .top_up(UserId::new(), "GOLD_COINS", Decimal::new(500, 0), None, None, "k1".to_string())
            .await
            .unwrap_err();

        assert!(matches!(err, LedgerError::WalletNotFound(_)));
    }

    #[tokio::test]
    async fn purchase_runs_executor_with_source_balance_validation() {
        let mut repo = MockLedgerRepository::new();
        let mut wallets = MockWalletLookup::new();
        let user_wallet_id = WalletId::new();
        let treasury_id = WalletId::new();

        wallets
            .expect_find_user_wallet()
            .returning(move |_, _| Ok(Some(wallet(user_wallet_id))));
        wallets
            .expect_find_treasury_wallet()
            .returning(move |_| Ok(Some(wallet(treasury_id))));

        repo.expect_find_by_idempotency_key().returning(|_| Ok(None));
        repo.expect_execute_movement()
            .withf(move |req| req.validate_source_balance && req.source_wallet_id == user_wallet_id)
            .returning(move |req| {
                Ok(MonetaryTransaction {
                    id: TransactionId::new(),
                    idempotency_key: req.idempotency_key,
                    transaction_type: req.transaction_type,
                    status: TransactionStatus::Completed,
                    source_wallet_id: req.source_wallet_id,
                    destination_wallet_id: req.destination_wallet_id,
                    amount: req.amount,
                    reference_id: req.reference_id,
                    metadata: req.metadata,
                    error_message: None,
                    created_at: Utc::now(),
                    updated_at: Utc::now(),
                    ledger_entries: vec![],
                })
            });

        let use_case = MovementUseCase::new(Arc::new(repo), Arc::new(wallets));
        let result = use_case
            .purchase(UserId::new(), "GOLD_COINS", Decimal::new(40, 0), None, None, "k2".to_string())
            .await
            .unwrap();

        assert_eq!(result.status, TransactionStatus::Completed);
    }

    #[tokio::test]
    async fn duplicate_key_race_replays_the_winner() {
        let mut repo = MockLedgerRepository::new();
        let mut wallets = MockWalletLookup::new();
        wallets
            .expect_find_treasury_wallet()
            .returning(|_| Ok(Some(wallet(WalletId::new()))));
        wallets
            .expect_find_user_wallet()
            .returning(move |_, _| Ok(Some(wallet(WalletId::new()))));

        repo.expect_find_by_idempotency_key().returning(|_| Ok(None));
        let winner_id = TransactionId::new();
        repo.expect_execute_movement()
            .returning(move |_| Err(LedgerError::DuplicateKeyRace(winner_id)));
        repo.expect_find_by_id()
            .with(eq(winner_id))
            .returning(move |_| Ok(Some(completed_transaction(winner_id))));

        let use_case = MovementUseCase::new(Arc::new(repo), Arc::new(wallets));
        let result = use_case
            .top_up(UserId::new(), "GOLD_COINS", Decimal::new(500, 0), None, None, "k1".to_string())
            .await
            .unwrap();

        assert_eq!(result.id, winner_id);
    }
}

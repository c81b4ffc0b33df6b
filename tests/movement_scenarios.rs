//! End-to-end scenarios (§8) exercised against the in-memory ledger. These
//! drive `MovementUseCase` the same way the HTTP layer would, so they cover
//! the Idempotency Gate, the Transaction Executor protocol, and the Wallet
//! Locker's canonical ordering together rather than any one in isolation.
//!
//! Each scenario starts from a differently-funded treasury/user pair, so the
//! shared setup is expressed as an `rstest` fixture and each test overrides
//! its starting balances with `#[with(...)]`.

use std::sync::Arc;

use chrono::Utc;
use ledger_service::domain::entities::Wallet;
use ledger_service::domain::error::LedgerError;
use ledger_service::domain::repository::{LedgerRepository, WalletLookup};
use ledger_service::domain::types::{AssetTypeId, UserId, WalletId};
use ledger_service::infrastructure::persistence::memory::InMemoryLedger;
use ledger_service::use_cases::movement::MovementUseCase;
use rstest::{fixture, rstest};
use rust_decimal::Decimal;

const GOLD: &str = "GOLD_COINS";

fn wallet(balance: Decimal) -> Wallet {
    let now = Utc::now();
    Wallet {
        id: WalletId::new(),
        user_id: UserId::new(),
        asset_type_id: AssetTypeId::new(),
        balance,
        created_at: now,
        updated_at: now,
    }
}

/// Fresh in-memory ledger seeded with one GOLD_COINS treasury wallet and one
/// user wallet, at the given starting balances.
#[fixture]
fn ledger(
    #[default(Decimal::new(1_000_000, 0))] treasury_balance: Decimal,
    #[default(Decimal::ZERO)] user_balance: Decimal,
) -> (Arc<InMemoryLedger>, UserId) {
    let ledger = Arc::new(InMemoryLedger::new());
    let asset_type_id = AssetTypeId::new();
    ledger.seed_asset_type(GOLD, asset_type_id);

    let mut treasury = wallet(treasury_balance);
    treasury.asset_type_id = asset_type_id;
    ledger.seed_treasury_wallet(GOLD, treasury);

    let user_id = UserId::new();
    let mut user_wallet = wallet(user_balance);
    user_wallet.user_id = user_id;
    user_wallet.asset_type_id = asset_type_id;
    ledger.seed_user_wallet(user_id, GOLD, user_wallet);

    (ledger, user_id)
}

#[rstest]
#[tokio::test]
async fn happy_path_top_up_and_replay(
    #[with(Decimal::new(1_000_000, 0), Decimal::new(1_000, 0))] ledger: (Arc<InMemoryLedger>, UserId),
) {
    let (ledger, alice) = ledger;
    let use_case = MovementUseCase::new(ledger.clone(), ledger.clone());

    let treasury_wallet = ledger.find_treasury_wallet(GOLD).await.unwrap().unwrap();
    let alice_wallet_before = ledger.find_user_wallet(alice, GOLD).await.unwrap().unwrap();

    let first = use_case
        .top_up(alice, GOLD, Decimal::new(500, 0), None, None, "k1".to_string())
        .await
        .unwrap();

    assert_eq!(first.ledger_entries.len(), 2);
    assert_eq!(ledger.balance_of(alice_wallet_before.id).unwrap(), Decimal::new(1_500, 0));
    assert_eq!(ledger.balance_of(treasury_wallet.id).unwrap(), Decimal::new(999_500, 0));

    let replay = use_case
        .top_up(alice, GOLD, Decimal::new(500, 0), None, None, "k1".to_string())
        .await
        .unwrap();

    assert_eq!(replay.id, first.id);
    assert_eq!(ledger.balance_of(alice_wallet_before.id).unwrap(), Decimal::new(1_500, 0));
}

#[rstest]
#[tokio::test]
async fn insufficient_balance_leaves_no_row_and_allows_retry(
    #[with(Decimal::new(1_000_000, 0), Decimal::new(50, 0))] ledger: (Arc<InMemoryLedger>, UserId),
) {
    let (ledger, bob) = ledger;
    let use_case = MovementUseCase::new(ledger.clone(), ledger.clone());

    let err = use_case
        .purchase(bob, GOLD, Decimal::new(999, 0), None, None, "k2".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientBalance { .. }));

    assert!(ledger.find_by_idempotency_key("k2").await.unwrap().is_none());
    let bob_wallet = ledger.find_user_wallet(bob, GOLD).await.unwrap().unwrap();
    assert_eq!(ledger.balance_of(bob_wallet.id).unwrap(), Decimal::new(50, 0));

    let retry = use_case
        .purchase(bob, GOLD, Decimal::new(40, 0), None, None, "k2".to_string())
        .await
        .unwrap();
    assert_eq!(retry.amount, Decimal::new(40, 0));
    assert_eq!(ledger.balance_of(bob_wallet.id).unwrap(), Decimal::new(10, 0));
}

#[rstest]
#[tokio::test]
async fn concurrent_overdraft_only_one_purchase_succeeds(
    #[with(Decimal::new(1_000_000, 0), Decimal::new(500, 0))] ledger: (Arc<InMemoryLedger>, UserId),
) {
    let (ledger, bob) = ledger;
    let use_case = Arc::new(MovementUseCase::new(ledger.clone(), ledger.clone()));

    let first = {
        let use_case = use_case.clone();
        tokio::spawn(async move {
            use_case.purchase(bob, GOLD, Decimal::new(251, 0), None, None, "k-a".to_string()).await
        })
    };
    let second = {
        let use_case = use_case.clone();
        tokio::spawn(async move {
            use_case.purchase(bob, GOLD, Decimal::new(251, 0), None, None, "k-b".to_string()).await
        })
    };

    let (first, second) = (first.await.unwrap(), second.await.unwrap());
    let outcomes = [first, second];

    let successes = outcomes.iter().filter(|r| r.is_ok()).count();
    let failures = outcomes
        .iter()
        .filter(|r| matches!(r, Err(LedgerError::InsufficientBalance { .. })))
        .count();

    assert_eq!(successes, 1);
    assert_eq!(failures, 1);

    let bob_wallet = ledger.find_user_wallet(bob, GOLD).await.unwrap().unwrap();
    assert_eq!(ledger.balance_of(bob_wallet.id).unwrap(), Decimal::new(249, 0));
}

#[rstest]
#[tokio::test]
async fn duplicate_key_race_collapses_to_one_transaction(
    #[with(Decimal::new(1_000_000, 0), Decimal::ZERO)] ledger: (Arc<InMemoryLedger>, UserId),
) {
    let (ledger, alice) = ledger;
    let use_case = Arc::new(MovementUseCase::new(ledger.clone(), ledger.clone()));

    let a = {
        let use_case = use_case.clone();
        tokio::spawn(async move {
            use_case.top_up(alice, GOLD, Decimal::new(500, 0), None, None, "shared-key".to_string()).await
        })
    };
    let b = {
        let use_case = use_case.clone();
        tokio::spawn(async move {
            use_case.top_up(alice, GOLD, Decimal::new(500, 0), None, None, "shared-key".to_string()).await
        })
    };

    let (a, b) = (a.await.unwrap().unwrap(), b.await.unwrap().unwrap());
    assert_eq!(a.id, b.id);

    let alice_wallet = ledger.find_user_wallet(alice, GOLD).await.unwrap().unwrap();
    assert_eq!(ledger.balance_of(alice_wallet.id).unwrap(), Decimal::new(500, 0));
}

#[rstest]
#[tokio::test]
async fn treasury_wallet_may_go_negative(
    #[with(Decimal::ZERO, Decimal::ZERO)] ledger: (Arc<InMemoryLedger>, UserId),
) {
    let (ledger, alice) = ledger;
    let use_case = MovementUseCase::new(ledger.clone(), ledger.clone());

    let transaction = use_case
        .top_up(alice, GOLD, Decimal::new(100, 0), None, None, "k3".to_string())
        .await
        .unwrap();
    assert_eq!(transaction.ledger_entries.len(), 2);

    let treasury_wallet = ledger.find_treasury_wallet(GOLD).await.unwrap().unwrap();
    let alice_wallet = ledger.find_user_wallet(alice, GOLD).await.unwrap().unwrap();
    assert_eq!(ledger.balance_of(treasury_wallet.id).unwrap(), Decimal::new(-100, 0));
    assert_eq!(ledger.balance_of(alice_wallet.id).unwrap(), Decimal::new(100, 0));
}

#[tokio::test]
async fn ledger_entries_are_immutable() {
    let ledger = InMemoryLedger::new();
    let err = ledger
        .attempt_ledger_entry_update(ledger_service::domain::types::LedgerEntryId::new())
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::LedgerImmutable));
}

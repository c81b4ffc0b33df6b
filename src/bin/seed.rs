//! One-shot bootstrap binary (§6, §11.4): creates asset types, the treasury
//! and void SYSTEM users, their wallets per asset type, mints genesis supply,
//! and funds a handful of demo user wallets. Re-runnable: every step is
//! idempotent, either via `ON CONFLICT DO NOTHING` or the core's own
//! idempotency gate. Row creation goes through raw SQL (`WalletLookup` is a
//! read-only port), but every post-insert lookup is resolved through the same
//! `WalletLookup` collaborator the rest of the service uses, so bootstrap
//! exercises the real resolution path instead of duplicating it.

use std::env;
use std::sync::Arc;

use dotenvy::dotenv;
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ledger_service::domain::constants::{
    genesis_idempotency_key, seed_idempotency_key, TREASURY_USERNAME, VOID_USERNAME,
};
use ledger_service::domain::entities::{MovementRequest, TransactionType};
use ledger_service::domain::error::LedgerError;
use ledger_service::domain::repository::{LedgerRepository, WalletLookup};
use ledger_service::domain::types::{AssetTypeId, UserId, WalletId};
use ledger_service::infrastructure::persistence::postgres_repository::PostgresLedgerRepository;
use ledger_service::infrastructure::persistence::postgres_wallet_lookup::PostgresWalletLookup;
use ledger_service::use_cases::movement::MovementUseCase;

struct AssetTypeSeed {
    code: &'static str,
    name: &'static str,
}

const ASSET_TYPES: &[AssetTypeSeed] = &[
    AssetTypeSeed { code: "GOLD_COINS", name: "Gold Coins" },
    AssetTypeSeed { code: "GEMS", name: "Gems" },
];

const DEMO_USERS: &[(&str, Decimal)] = &[];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = PgPoolOptions::new().max_connections(5).connect(&database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let repository = Arc::new(PostgresLedgerRepository::new(pool.clone()));
    let wallets = Arc::new(PostgresWalletLookup::new(pool.clone()));
    let movement = MovementUseCase::new(repository.clone(), wallets.clone());

    ensure_system_user(&pool, TREASURY_USERNAME).await?;
    ensure_system_user(&pool, VOID_USERNAME).await?;

    for asset_type in ASSET_TYPES {
        let asset_type_id = ensure_asset_type(&pool, wallets.as_ref(), asset_type.code, asset_type.name).await?;

        let treasury_wallet_id =
            ensure_treasury_wallet(&pool, wallets.as_ref(), asset_type_id, asset_type.code).await?;
        let void_wallet_id = ensure_void_wallet(&pool, wallets.as_ref(), asset_type_id, asset_type.code).await?;

        mint_genesis_supply(
            repository.as_ref(),
            asset_type.code,
            void_wallet_id,
            treasury_wallet_id,
            Decimal::new(1_000_000_00, 2),
        )
        .await?;

        info!(asset_type = asset_type.code, "treasury wallet seeded");
    }

    for (username, amount) in DEMO_USERS {
        let user_id = ensure_demo_user(&pool, username).await?;
        for asset_type in ASSET_TYPES {
            let asset_type_id = ensure_asset_type(&pool, wallets.as_ref(), asset_type.code, asset_type.name).await?;
            ensure_user_wallet(&pool, wallets.as_ref(), user_id, asset_type_id, asset_type.code).await?;

            let idempotency_key = seed_idempotency_key(username, asset_type.code);
            let transaction = movement
                .top_up(user_id, asset_type.code, *amount, None, None, idempotency_key)
                .await?;
            info!(username, asset_type = asset_type.code, transaction_id = %transaction.id, "demo wallet funded");
        }
    }

    info!("bootstrap complete");
    Ok(())
}

async fn ensure_system_user(pool: &PgPool, username: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO users (id, username, role) VALUES ($1, $2, 'SYSTEM')
         ON CONFLICT (username) DO NOTHING",
    )
    .bind(UserId::new())
    .bind(username)
    .execute(pool)
    .await?;
    Ok(())
}

async fn ensure_demo_user(pool: &PgPool, username: &str) -> Result<UserId, sqlx::Error> {
    sqlx::query(
        "INSERT INTO users (id, username, role) VALUES ($1, $2, 'USER')
         ON CONFLICT (username) DO NOTHING",
    )
    .bind(UserId::new())
    .bind(username)
    .execute(pool)
    .await?;

    let (existing,): (UserId,) = sqlx::query_as("SELECT id FROM users WHERE username = $1")
        .bind(username)
        .fetch_one(pool)
        .await?;
    Ok(existing)
}

/// Creates the asset type row if missing, then resolves its id through the
/// same `WalletLookup` port the movement use case relies on.
async fn ensure_asset_type(
    pool: &PgPool,
    wallets: &PostgresWalletLookup,
    code: &str,
    name: &str,
) -> Result<AssetTypeId, LedgerError> {
    sqlx::query(
        "INSERT INTO asset_types (id, code, name) VALUES ($1, $2, $3)
         ON CONFLICT (code) DO NOTHING",
    )
    .bind(AssetTypeId::new())
    .bind(code)
    .bind(name)
    .execute(pool)
    .await
    .map_err(LedgerError::storage)?;

    wallets
        .find_asset_type_id(code)
        .await?
        .ok_or_else(|| LedgerError::StorageError(format!("asset type {code} missing after insert")))
}

async fn insert_wallet_row(
    pool: &PgPool,
    user_id: UserId,
    asset_type_id: AssetTypeId,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO wallets (id, user_id, asset_type_id, balance) VALUES ($1, $2, $3, 0)
         ON CONFLICT (user_id, asset_type_id) DO NOTHING",
    )
    .bind(WalletId::new())
    .bind(user_id)
    .bind(asset_type_id)
    .execute(pool)
    .await?;
    Ok(())
}

async fn ensure_treasury_wallet(
    pool: &PgPool,
    wallets: &PostgresWalletLookup,
    asset_type_id: AssetTypeId,
    asset_type_code: &str,
) -> Result<WalletId, LedgerError> {
    let treasury_user_id = treasury_user_id(pool).await.map_err(LedgerError::storage)?;
    insert_wallet_row(pool, treasury_user_id, asset_type_id)
        .await
        .map_err(LedgerError::storage)?;

    let wallet = wallets.find_treasury_wallet(asset_type_code).await?.ok_or_else(|| {
        LedgerError::StorageError(format!("treasury wallet for {asset_type_code} missing after insert"))
    })?;
    Ok(wallet.id)
}

async fn ensure_void_wallet(
    pool: &PgPool,
    wallets: &PostgresWalletLookup,
    asset_type_id: AssetTypeId,
    asset_type_code: &str,
) -> Result<WalletId, LedgerError> {
    let void_user_id = void_user_id(pool).await.map_err(LedgerError::storage)?;
    insert_wallet_row(pool, void_user_id, asset_type_id)
        .await
        .map_err(LedgerError::storage)?;

    let wallet = wallets.find_void_wallet(asset_type_code).await?.ok_or_else(|| {
        LedgerError::StorageError(format!("void wallet for {asset_type_code} missing after insert"))
    })?;
    Ok(wallet.id)
}

async fn ensure_user_wallet(
    pool: &PgPool,
    wallets: &PostgresWalletLookup,
    user_id: UserId,
    asset_type_id: AssetTypeId,
    asset_type_code: &str,
) -> Result<WalletId, LedgerError> {
    insert_wallet_row(pool, user_id, asset_type_id)
        .await
        .map_err(LedgerError::storage)?;

    let wallet = wallets.find_user_wallet(user_id, asset_type_code).await?.ok_or_else(|| {
        LedgerError::StorageError(format!("wallet for user {user_id} asset {asset_type_code} missing after insert"))
    })?;
    Ok(wallet.id)
}

async fn treasury_user_id(pool: &PgPool) -> Result<UserId, sqlx::Error> {
    let (id,): (UserId,) = sqlx::query_as("SELECT id FROM users WHERE username = $1")
        .bind(TREASURY_USERNAME)
        .fetch_one(pool)
        .await?;
    Ok(id)
}

async fn void_user_id(pool: &PgPool) -> Result<UserId, sqlx::Error> {
    let (id,): (UserId,) = sqlx::query_as("SELECT id FROM users WHERE username = $1")
        .bind(VOID_USERNAME)
        .fetch_one(pool)
        .await?;
    Ok(id)
}

async fn mint_genesis_supply(
    repository: &PostgresLedgerRepository,
    asset_type_code: &str,
    void_wallet_id: WalletId,
    treasury_wallet_id: WalletId,
    amount: Decimal,
) -> Result<(), LedgerError> {
    let idempotency_key = genesis_idempotency_key(asset_type_code);

    if repository.find_by_idempotency_key(&idempotency_key).await?.is_some() {
        info!(asset_type = asset_type_code, "genesis mint already applied, skipping");
        return Ok(());
    }

    let request = MovementRequest {
        idempotency_key,
        transaction_type: TransactionType::TopUp,
        source_wallet_id: void_wallet_id,
        destination_wallet_id: treasury_wallet_id,
        amount,
        reference_id: None,
        metadata: Some(serde_json::json!({ "reason": "genesis_mint" })),
        validate_source_balance: false,
    };

    match repository.execute_movement(request).await {
        Ok(_) | Err(LedgerError::DuplicateKeyRace(_)) => Ok(()),
        Err(err) => Err(err),
    }
}

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

use crate::domain::constants::{TREASURY_USERNAME, VOID_USERNAME};
use crate::domain::entities::Wallet;
use crate::domain::error::LedgerError;
use crate::domain::repository::WalletLookup;
use crate::domain::types::{AssetTypeId, UserId};

use super::models::WalletRow;

pub struct PostgresWalletLookup {
    pool: PgPool,
}

impl PostgresWalletLookup {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_system_wallet(
        &self,
        username: &str,
        asset_type_code: &str,
    ) -> Result<Option<Wallet>, LedgerError> {
        let row: Option<WalletRow> = sqlx::query_as(
            "SELECT w.id, w.user_id, w.asset_type_id, w.balance, w.created_at, w.updated_at
             FROM wallets w
             JOIN users u ON u.id = w.user_id
             JOIN asset_types a ON a.id = w.asset_type_id
             WHERE u.role = 'SYSTEM' AND u.username = $1 AND a.code = $2",
        )
        .bind(username)
        .bind(asset_type_code)
        .fetch_optional(&self.pool)
        .await
        .map_err(LedgerError::storage)?;

        Ok(row.map(Into::into))
    }
}

#[async_trait]
impl WalletLookup for PostgresWalletLookup {
    #[instrument(skip(self))]
    async fn find_user_wallet(
        &self,
        user_id: UserId,
        asset_type_code: &str,
    ) -> Result<Option<Wallet>, LedgerError> {
        let row: Option<WalletRow> = sqlx::query_as(
            "SELECT w.id, w.user_id, w.asset_type_id, w.balance, w.created_at, w.updated_at
             FROM wallets w
             JOIN asset_types a ON a.id = w.asset_type_id
             WHERE w.user_id = $1 AND a.code = $2",
        )
        .bind(user_id)
        .bind(asset_type_code)
        .fetch_optional(&self.pool)
        .await
        .map_err(LedgerError::storage)?;

        Ok(row.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn find_treasury_wallet(&self, asset_type_code: &str) -> Result<Option<Wallet>, LedgerError> {
        self.find_system_wallet(TREASURY_USERNAME, asset_type_code).await
    }

    #[instrument(skip(self))]
    async fn find_void_wallet(&self, asset_type_code: &str) -> Result<Option<Wallet>, LedgerError> {
        self.find_system_wallet(VOID_USERNAME, asset_type_code).await
    }

    #[instrument(skip(self))]
    async fn find_asset_type_id(&self, asset_type_code: &str) -> Result<Option<AssetTypeId>, LedgerError> {
        let row: Option<(AssetTypeId,)> = sqlx::query_as("SELECT id FROM asset_types WHERE code = $1")
            .bind(asset_type_code)
            .fetch_optional(&self.pool)
            .await
            .map_err(LedgerError::storage)?;

        Ok(row.map(|(id,)| id))
    }
}

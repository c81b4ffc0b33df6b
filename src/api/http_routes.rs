use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::domain::entities::{MonetaryTransaction, TransactionType};
use crate::domain::repository::TransactionFilter;
use crate::domain::types::{TransactionId, UserId};
use crate::use_cases::movement::MovementUseCase;
use crate::use_cases::queries::TransactionQueries;

use super::error::ApiError;
use super::response::ApiResponse;

pub struct AppState {
    pub movement: MovementUseCase,
    pub queries: TransactionQueries,
}

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/transactions/top-up", post(top_up))
        .route("/transactions/bonus", post(bonus))
        .route("/transactions/purchase", post(purchase))
        .route("/transactions/{id}", get(get_transaction_by_id))
        .route("/transactions/by-key/{idempotency_key}", get(get_transaction_by_key))
        .route("/transactions", get(list_transactions))
        .with_state(state)
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct TopUpRequest {
    pub user_id: UserId,
    pub asset_type_code: String,
    pub amount: Decimal,
    pub reference_id: Option<String>,
    pub metadata: Option<JsonValue>,
    pub idempotency_key: String,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct BonusRequest {
    pub user_id: UserId,
    pub asset_type_code: String,
    pub amount: Decimal,
    pub metadata: Option<JsonValue>,
    pub idempotency_key: String,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct PurchaseRequest {
    pub user_id: UserId,
    pub asset_type_code: String,
    pub amount: Decimal,
    pub reference_id: Option<String>,
    pub metadata: Option<JsonValue>,
    pub idempotency_key: String,
}

#[derive(Debug, Deserialize)]
pub struct ListTransactionsQuery {
    pub user_id: Option<UserId>,
    pub transaction_type: Option<TransactionType>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[utoipa::path(post, path = "/transactions/top-up", request_body = TopUpRequest,
    responses((status = 200, body = ApiResponse<MonetaryTransaction>)))]
pub async fn top_up(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TopUpRequest>,
) -> Result<Json<ApiResponse<MonetaryTransaction>>, ApiError> {
    let transaction = state
        .movement
        .top_up(
            req.user_id,
            &req.asset_type_code,
            req.amount,
            req.reference_id,
            req.metadata,
            req.idempotency_key,
        )
        .await?;
    Ok(Json(ApiResponse::success(transaction)))
}

#[utoipa::path(post, path = "/transactions/bonus", request_body = BonusRequest,
    responses((status = 200, body = ApiResponse<MonetaryTransaction>)))]
pub async fn bonus(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BonusRequest>,
) -> Result<Json<ApiResponse<MonetaryTransaction>>, ApiError> {
    let transaction = state
        .movement
        .bonus(req.user_id, &req.asset_type_code, req.amount, req.metadata, req.idempotency_key)
        .await?;
    Ok(Json(ApiResponse::success(transaction)))
}

#[utoipa::path(post, path = "/transactions/purchase", request_body = PurchaseRequest,
    responses((status = 200, body = ApiResponse<MonetaryTransaction>)))]
pub async fn purchase(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PurchaseRequest>,
) -> Result<Json<ApiResponse<MonetaryTransaction>>, ApiError> {
    let transaction = state
        .movement
        .purchase(
            req.user_id,
            &req.asset_type_code,
            req.amount,
            req.reference_id,
            req.metadata,
            req.idempotency_key,
        )
        .await?;
    Ok(Json(ApiResponse::success(transaction)))
}

#[utoipa::path(get, path = "/transactions/{id}",
    responses((status = 200, body = ApiResponse<Option<MonetaryTransaction>>)))]
pub async fn get_transaction_by_id(
    State(state): State<Arc<AppState>>,
    Path(id): Path<TransactionId>,
) -> Result<Json<ApiResponse<Option<MonetaryTransaction>>>, ApiError> {
    let transaction = state.queries.by_id(id).await?;
    Ok(Json(ApiResponse::success(transaction)))
}

#[utoipa::path(get, path = "/transactions/by-key/{idempotency_key}",
    responses((status = 200, body = ApiResponse<Option<MonetaryTransaction>>)))]
pub async fn get_transaction_by_key(
    State(state): State<Arc<AppState>>,
    Path(idempotency_key): Path<String>,
) -> Result<Json<ApiResponse<Option<MonetaryTransaction>>>, ApiError> {
    let transaction = state.queries.by_idempotency_key(&idempotency_key).await?;
    Ok(Json(ApiResponse::success(transaction)))
}

#[utoipa::path(get, path = "/transactions",
    responses((status = 200, body = ApiResponse<Vec<MonetaryTransaction>>)))]
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListTransactionsQuery>,
) -> Result<Json<ApiResponse<Vec<MonetaryTransaction>>>, ApiError> {
    let filter = TransactionFilter {
        user_id: query.user_id,
        transaction_type: query.transaction_type,
        limit: query.limit.unwrap_or(50),
        offset: query.offset.unwrap_or(0),
    };
    let transactions = state.queries.list(filter).await?;
    Ok(Json(ApiResponse::success(transactions)))
}

use std::env;
use std::sync::Arc;

use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use ledger_service::api::http_routes::{
    routes, AppState, BonusRequest, ListTransactionsQuery, PurchaseRequest, TopUpRequest,
};
use ledger_service::infrastructure::persistence::postgres_repository::PostgresLedgerRepository;
use ledger_service::infrastructure::persistence::postgres_wallet_lookup::PostgresWalletLookup;
use ledger_service::use_cases::movement::MovementUseCase;
use ledger_service::use_cases::queries::TransactionQueries;

#[derive(OpenApi)]
#[openapi(
    paths(
        ledger_service::api::http_routes::top_up,
        ledger_service::api::http_routes::bonus,
        ledger_service::api::http_routes::purchase,
        ledger_service::api::http_routes::get_transaction_by_id,
        ledger_service::api::http_routes::get_transaction_by_key,
        ledger_service::api::http_routes::list_transactions,
    ),
    components(schemas(
        TopUpRequest,
        BonusRequest,
        PurchaseRequest,
        ListTransactionsQuery,
        ledger_service::domain::entities::MonetaryTransaction,
        ledger_service::domain::entities::LedgerEntry,
    ))
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("starting ledger service");

    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    info!("connected to database and ran migrations");

    let repository = Arc::new(PostgresLedgerRepository::new(pool.clone()));
    let wallets = Arc::new(PostgresWalletLookup::new(pool));

    let movement = MovementUseCase::new(repository.clone(), wallets);
    let queries = TransactionQueries::new(repository);

    let app_state = Arc::new(AppState { movement, queries });

    let app = routes(app_state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port = env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("{host}:{port}");

    info!(%addr, "listening");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

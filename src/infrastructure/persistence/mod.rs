pub mod memory;
pub mod models;
pub mod postgres_repository;
pub mod postgres_wallet_lookup;

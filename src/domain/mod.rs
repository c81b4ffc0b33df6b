pub mod constants;
pub mod entities;
pub mod error;
pub mod repository;
pub mod types;

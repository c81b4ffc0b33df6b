//! Ledger Service Library
//!
//! Core of the ledger service: double-entry bookkeeping for top-up, bonus, and
//! purchase movements between wallets, exported for the application binary and
//! integration tests.
//!
//! # Modules
//!
//! * `api` - HTTP interface (axum routes, request/response DTOs).
//! * `domain` - Domain entities, identifiers, and business rules.
//! * `infrastructure` - Concrete repository implementations (Postgres, in-memory).
//! * `use_cases` - Application workflows built on top of the domain.

pub mod api;
pub mod domain;
pub mod infrastructure;
pub mod use_cases;

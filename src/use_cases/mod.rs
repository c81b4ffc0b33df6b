pub mod idempotency_gate;
pub mod movement;
pub mod queries;

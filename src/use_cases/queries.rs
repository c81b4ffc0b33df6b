use std::sync::Arc;

use tracing::instrument;

use crate::domain::entities::MonetaryTransaction;
use crate::domain::error::LedgerError;
use crate::domain::repository::{LedgerRepository, TransactionFilter};
use crate::domain::types::TransactionId;

/// Thin read-only use case (§6: "listed for completeness of the response
/// shape"). No locking, no idempotency semantics — plain reads of committed
/// state.
pub struct TransactionQueries {
    repository: Arc<dyn LedgerRepository>,
}

impl TransactionQueries {
    /// Wires the use case to its storage collaborator.
    pub fn new(repository: Arc<dyn LedgerRepository>) -> Self {
        Self { repository }
    }

    /// Looks up a transaction by its generated id.
    #[instrument(skip(self))]
    pub async fn by_id(&self, id: TransactionId) -> Result<Option<MonetaryTransaction>, LedgerError> {
        self.repository.find_by_id(id).await
    }

    /// Looks up a transaction by its caller-supplied idempotency key.
    #[instrument(skip(self))]
    pub async fn by_idempotency_key(
        &self,
        idempotency_key: &str,
    ) -> Result<Option<MonetaryTransaction>, LedgerError> {
        self.repository.find_by_idempotency_key(idempotency_key).await
    }

    /// Lists transactions matching the given filter, newest first.
    #[instrument(skip(self))]
    pub async fn list(&self, filter: TransactionFilter) -> Result<Vec<MonetaryTransaction>, LedgerError> {
        self.repository.list(filter).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::repository::MockLedgerRepository;

    #[tokio::test]
    async fn by_id_delegates_to_repository() {
        let mut repo = MockLedgerRepository::new();
        repo.expect_find_by_id().returning(|_| Ok(None));
        let queries = TransactionQueries::new(Arc::new(repo));
        assert!(queries.by_id(TransactionId::new()).await.unwrap().is_none());
    }
}

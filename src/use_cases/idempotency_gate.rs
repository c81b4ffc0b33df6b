use crate::domain::entities::{MonetaryTransaction, TransactionStatus};
use crate::domain::error::LedgerError;

/// Outcome of consulting the gate for a given idempotency key.
pub enum GateDecision {
    /// No prior record; the Transaction Executor should run.
    Proceed,
    /// A COMPLETED record already exists; return it without executing anything.
    Replay(MonetaryTransaction),
}

/// Pre-execution lookup and short-circuit by idempotency key (§4.1). Pure
/// classification over whatever the repository returned; it never touches
/// storage itself.
pub fn classify(existing: Option<MonetaryTransaction>) -> Result<GateDecision, LedgerError> {
    let Some(transaction) = existing else {
        return Ok(GateDecision::Proceed);
    };

    match transaction.status {
        TransactionStatus::Completed => Ok(GateDecision::Replay(transaction)),
        TransactionStatus::Pending => Err(LedgerError::ConflictInFlight),
        TransactionStatus::Failed => Err(LedgerError::TerminallyFailed(
            transaction
                .error_message
                .clone()
                .unwrap_or_else(|| "transaction failed".to_string()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::TransactionType;
    use crate::domain::types::{TransactionId, WalletId};
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn sample(status: TransactionStatus) -> MonetaryTransaction {
        MonetaryTransaction {
            id: TransactionId::new(),
            idempotency_key: "k1".to_string(),
            transaction_type: TransactionType::TopUp,
            status,
            source_wallet_id: WalletId::new(),
            destination_wallet_id: WalletId::new(),
            amount: Decimal::new(500, 0),
            reference_id: None,
            metadata: None,
            error_message: if matches!(status, TransactionStatus::Failed) {
                Some("insufficient balance".to_string())
            } else {
                None
            },
            created_at: Utc::now(),
            updated_at: Utc::now(),
            ledger_entries: vec![],
        }
    }

    #[test]
    fn not_found_proceeds() {
        assert!(matches!(classify(None).unwrap(), GateDecision::Proceed));
    }

    #[test]
    fn completed_replays() {
        let tx = sample(TransactionStatus::Completed);
        let id = tx.id;
        match classify(Some(tx)).unwrap() {
            GateDecision::Replay(t) => assert_eq!(t.id, id),
            _ => panic!("expected replay"),
        }
    }

    #[test]
    fn pending_conflicts() {
        let err = classify(Some(sample(TransactionStatus::Pending))).unwrap_err();
        assert!(matches!(err, LedgerError::ConflictInFlight));
    }

    #[test]
    fn failed_is_terminal() {
        let err = classify(Some(sample(TransactionStatus::Failed))).unwrap_err();
        match err {
            LedgerError::TerminallyFailed(msg) => assert_eq!(msg, "insufficient balance"),
            _ => panic!("expected terminally failed"),
        }
    }
}

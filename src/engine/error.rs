//! Error types for record processing.

use thiserror::Error;

use crate::Amount;
use crate::model::{CurrencyCode, MemberId, RecordId, SplitType};

/// Top-level error returned by [`Engine::apply`](super::Engine::apply).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("expense rejected: {0}")]
    Expense(#[from] ExpenseError),

    #[error("payment rejected: {0}")]
    Transaction(#[from] TransactionError),

    #[error("removal failed: {0}")]
    Removal(#[from] RemovalError),
}

/// An expense that fails entry validation.
#[derive(Debug, Error)]
pub enum ExpenseError {
    #[error("duplicate record id {0}")]
    DuplicateId(RecordId),

    #[error("expense {0} has no currency")]
    MissingCurrency(RecordId),

    #[error("expense {0} amount must be positive, got {1}")]
    NonPositiveAmount(RecordId, Amount),

    #[error("expense {0} has no participants")]
    NoParticipants(RecordId),

    #[error("expense {0} has no payers")]
    NoPayers(RecordId),

    #[error("expense {0}: payer {1} must pay a positive amount")]
    NonPositivePayment(RecordId, MemberId),

    #[error("expense {id}: payers cover {paid}, expected {amount}")]
    PaidMismatch {
        id: RecordId,
        paid: Amount,
        amount: Amount,
    },

    #[error("expense {0}: negative weight for {1}")]
    NegativeWeight(RecordId, MemberId),

    #[error("expense {0}: weight given for {1}, who is not a participant")]
    WeightOutsideSplit(RecordId, MemberId),

    #[error("expense {id}: {split_type} weights sum to {actual}, expected {expected}")]
    SplitMismatch {
        id: RecordId,
        split_type: SplitType,
        expected: Amount,
        actual: Amount,
    },

    #[error("expense {0}: shares sum to zero")]
    ZeroShares(RecordId),

    #[error("expense {0}: amounts exceed what the ledger can hold")]
    TooLarge(RecordId),
}

/// A direct payment that fails entry validation.
#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("duplicate record id {0}")]
    DuplicateId(RecordId),

    #[error("payment {0} has no currency")]
    MissingCurrency(RecordId),

    #[error("payment {0} amount must be positive, got {1}")]
    NonPositiveAmount(RecordId, Amount),

    #[error("payment {0}: {1} cannot pay themselves")]
    SelfPayment(RecordId, MemberId),

    #[error("payment {0}: amount exceeds what the ledger can hold")]
    TooLarge(RecordId),
}

/// Error while soft-deleting a record.
#[derive(Debug, Error)]
pub enum RemovalError {
    #[error("record {0} not found")]
    NotFound(RecordId),

    #[error("record {0} is already inactive")]
    AlreadyInactive(RecordId),
}

/// A balance sheet that does not close: what is owed differs from what is due.
#[derive(Debug, Error)]
pub enum IntegrityError {
    #[error("balances in {currency} do not sum to zero (residual {residual})")]
    Unbalanced {
        currency: CurrencyCode,
        residual: Amount,
    },
}

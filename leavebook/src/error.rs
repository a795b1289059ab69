//! Error types for the leavebook library

use rust_decimal::Decimal;
use thiserror::Error;

use crate::types::LeaveType;

/// Custom error type for ledger operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Insufficient {leave_type} balance: available {available} days, requested {requested}")]
    InsufficientBalance {
        leave_type: LeaveType,
        available: Decimal,
        requested: Decimal,
    },

    #[error("Insufficient eligible CTO balance: eligible {eligible} days, required {requested}")]
    InsufficientEligibleBalance {
        eligible: Decimal,
        requested: Decimal,
    },

    #[error("Invalid leave type: {0}")]
    InvalidLeaveType(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Ledger mutation failed: {0}")]
    TransactionFailure(String),
}

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

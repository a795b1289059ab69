//! Leavebook Core - Employee leave and CTO balance ledger engine
//!
//! This library provides the recalculation engines behind an employee leave
//! ledger: running vacation/sick balances derived from forwarded balances,
//! compensatory time off (CTO) credits consumed FIFO with one-year
//! expiration, and the eligibility checks mutations are validated against.

pub mod error;
pub mod types;
pub mod calendar;
pub mod simple;
pub mod cto;

// Re-export commonly used types for convenience
pub use error::{Error, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

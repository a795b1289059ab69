//! Ledger service implementations

pub mod cto;
pub mod leave;


use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

/// Per-employee mutation locks
///
/// Every ledger mutation runs under its employee's lock, so validation,
/// writes, and recalculation see a stable ledger. Different employees
/// proceed concurrently.
#[derive(Debug, Default)]
pub struct EmployeeLocks {
    locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl EmployeeLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lock for one employee, creating it on first use
    pub async fn acquire(&self, employee_id: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks
                .entry(employee_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

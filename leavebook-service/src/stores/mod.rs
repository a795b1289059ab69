//! Persistence traits for employees, ledger entries, and usage links

pub mod memory;

use uuid::Uuid;

use leavebook::types::{CtoEntry, Employee, LeaveEntry, UsageLink};
use leavebook::Result;

/// Repository trait for employee records
#[async_trait::async_trait]
pub trait EmployeeStore: Send + Sync {
    async fn create(&self, employee: &Employee) -> Result<Employee>;
    async fn get(&self, id: &Uuid) -> Result<Employee>;
    async fn update(&self, employee: &Employee) -> Result<Employee>;
}

/// Repository trait for simple leave ledger entries
///
/// `create` assigns the next insertion sequence when `entry.seq` is 0; a
/// nonzero sequence is kept as given so a removed entry can be restored in
/// its original position. `update` never changes the stored sequence.
#[async_trait::async_trait]
pub trait LeaveEntryStore: Send + Sync {
    /// All entries for one employee, in insertion order
    async fn list_for_employee(&self, employee_id: &Uuid) -> Result<Vec<LeaveEntry>>;
    async fn get(&self, id: &Uuid) -> Result<LeaveEntry>;
    async fn create(&self, entry: &LeaveEntry) -> Result<LeaveEntry>;
    async fn update(&self, entry: &LeaveEntry) -> Result<LeaveEntry>;
    /// Remove an entry, returning the removed record
    async fn delete(&self, id: &Uuid) -> Result<LeaveEntry>;
}

/// Repository trait for CTO ledger entries
///
/// Sequence handling matches [`LeaveEntryStore`].
#[async_trait::async_trait]
pub trait CtoEntryStore: Send + Sync {
    /// All entries for one employee, in insertion order
    async fn list_for_employee(&self, employee_id: &Uuid) -> Result<Vec<CtoEntry>>;
    async fn get(&self, id: &Uuid) -> Result<CtoEntry>;
    async fn create(&self, entry: &CtoEntry) -> Result<CtoEntry>;
    async fn update(&self, entry: &CtoEntry) -> Result<CtoEntry>;
    /// Remove an entry, returning the removed record
    async fn delete(&self, id: &Uuid) -> Result<CtoEntry>;
}

/// Repository trait for activity-to-absence usage links
#[async_trait::async_trait]
pub trait UsageLinkStore: Send + Sync {
    async fn list_for_absence(&self, absence_id: &Uuid) -> Result<Vec<UsageLink>>;
    async fn list_for_activity(&self, activity_id: &Uuid) -> Result<Vec<UsageLink>>;
    /// Create a link; at most one link may exist per (activity, absence) pair
    async fn create(&self, link: &UsageLink) -> Result<UsageLink>;
    /// Remove all links for an absence, returning the removed records
    async fn delete_for_absence(&self, absence_id: &Uuid) -> Result<Vec<UsageLink>>;
    /// Remove all links for an activity, returning the removed records
    async fn delete_for_activity(&self, activity_id: &Uuid) -> Result<Vec<UsageLink>>;
}

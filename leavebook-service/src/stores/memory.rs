//! In-memory store implementations for development and testing

use std::collections::HashMap;

use uuid::Uuid;

use leavebook::types::{CtoEntry, Employee, LeaveEntry, UsageLink};
use leavebook::{Error, Result};

use super::{CtoEntryStore, EmployeeStore, LeaveEntryStore, UsageLinkStore};

/// In-memory employee store
#[derive(Debug, Default)]
pub struct InMemoryEmployeeStore {
    employees: std::sync::RwLock<HashMap<Uuid, Employee>>,
}

impl InMemoryEmployeeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl EmployeeStore for InMemoryEmployeeStore {
    async fn create(&self, employee: &Employee) -> Result<Employee> {
        let mut employees = self.employees.write().unwrap();
        employees.insert(employee.id, employee.clone());
        Ok(employee.clone())
    }

    async fn get(&self, id: &Uuid) -> Result<Employee> {
        let employees = self.employees.read().unwrap();
        employees
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Employee {}", id)))
    }

    async fn update(&self, employee: &Employee) -> Result<Employee> {
        let mut employees = self.employees.write().unwrap();
        if !employees.contains_key(&employee.id) {
            return Err(Error::NotFound(format!("Employee {}", employee.id)));
        }
        employees.insert(employee.id, employee.clone());
        Ok(employee.clone())
    }
}

/// In-memory simple leave entry store
#[derive(Debug, Default)]
pub struct InMemoryLeaveEntryStore {
    entries: std::sync::RwLock<HashMap<Uuid, LeaveEntry>>,
}

impl InMemoryLeaveEntryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl LeaveEntryStore for InMemoryLeaveEntryStore {
    async fn list_for_employee(&self, employee_id: &Uuid) -> Result<Vec<LeaveEntry>> {
        let entries = self.entries.read().unwrap();
        let mut rows: Vec<LeaveEntry> = entries
            .values()
            .filter(|entry| entry.employee_id == *employee_id)
            .cloned()
            .collect();
        rows.sort_by_key(|entry| entry.seq);
        Ok(rows)
    }

    async fn get(&self, id: &Uuid) -> Result<LeaveEntry> {
        let entries = self.entries.read().unwrap();
        entries
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Leave entry {}", id)))
    }

    async fn create(&self, entry: &LeaveEntry) -> Result<LeaveEntry> {
        let mut entries = self.entries.write().unwrap();
        let mut entry = entry.clone();
        if entry.seq == 0 {
            entry.seq = entries.values().map(|e| e.seq).max().unwrap_or(0) + 1;
        }
        entries.insert(entry.id, entry.clone());
        Ok(entry)
    }

    async fn update(&self, entry: &LeaveEntry) -> Result<LeaveEntry> {
        let mut entries = self.entries.write().unwrap();
        let seq = entries
            .get(&entry.id)
            .map(|existing| existing.seq)
            .ok_or_else(|| Error::NotFound(format!("Leave entry {}", entry.id)))?;
        let mut entry = entry.clone();
        entry.seq = seq;
        entries.insert(entry.id, entry.clone());
        Ok(entry)
    }

    async fn delete(&self, id: &Uuid) -> Result<LeaveEntry> {
        let mut entries = self.entries.write().unwrap();
        entries
            .remove(id)
            .ok_or_else(|| Error::NotFound(format!("Leave entry {}", id)))
    }
}

/// In-memory CTO entry store
#[derive(Debug, Default)]
pub struct InMemoryCtoEntryStore {
    entries: std::sync::RwLock<HashMap<Uuid, CtoEntry>>,
}

impl InMemoryCtoEntryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl CtoEntryStore for InMemoryCtoEntryStore {
    async fn list_for_employee(&self, employee_id: &Uuid) -> Result<Vec<CtoEntry>> {
        let entries = self.entries.read().unwrap();
        let mut rows: Vec<CtoEntry> = entries
            .values()
            .filter(|entry| entry.employee_id == *employee_id)
            .cloned()
            .collect();
        rows.sort_by_key(|entry| entry.seq);
        Ok(rows)
    }

    async fn get(&self, id: &Uuid) -> Result<CtoEntry> {
        let entries = self.entries.read().unwrap();
        entries
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("CTO entry {}", id)))
    }

    async fn create(&self, entry: &CtoEntry) -> Result<CtoEntry> {
        let mut entries = self.entries.write().unwrap();
        let mut entry = entry.clone();
        if entry.seq == 0 {
            entry.seq = entries.values().map(|e| e.seq).max().unwrap_or(0) + 1;
        }
        entries.insert(entry.id, entry.clone());
        Ok(entry)
    }

    async fn update(&self, entry: &CtoEntry) -> Result<CtoEntry> {
        let mut entries = self.entries.write().unwrap();
        let seq = entries
            .get(&entry.id)
            .map(|existing| existing.seq)
            .ok_or_else(|| Error::NotFound(format!("CTO entry {}", entry.id)))?;
        let mut entry = entry.clone();
        entry.seq = seq;
        entries.insert(entry.id, entry.clone());
        Ok(entry)
    }

    async fn delete(&self, id: &Uuid) -> Result<CtoEntry> {
        let mut entries = self.entries.write().unwrap();
        entries
            .remove(id)
            .ok_or_else(|| Error::NotFound(format!("CTO entry {}", id)))
    }
}

/// In-memory usage link store
#[derive(Debug, Default)]
pub struct InMemoryUsageLinkStore {
    links: std::sync::RwLock<Vec<UsageLink>>,
}

impl InMemoryUsageLinkStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl UsageLinkStore for InMemoryUsageLinkStore {
    async fn list_for_absence(&self, absence_id: &Uuid) -> Result<Vec<UsageLink>> {
        let links = self.links.read().unwrap();
        Ok(links
            .iter()
            .filter(|link| link.absence_id == *absence_id)
            .cloned()
            .collect())
    }

    async fn list_for_activity(&self, activity_id: &Uuid) -> Result<Vec<UsageLink>> {
        let links = self.links.read().unwrap();
        Ok(links
            .iter()
            .filter(|link| link.activity_id == *activity_id)
            .cloned()
            .collect())
    }

    async fn create(&self, link: &UsageLink) -> Result<UsageLink> {
        let mut links = self.links.write().unwrap();
        if links
            .iter()
            .any(|l| l.activity_id == link.activity_id && l.absence_id == link.absence_id)
        {
            return Err(Error::TransactionFailure(format!(
                "Usage link already exists for activity {} and absence {}",
                link.activity_id, link.absence_id
            )));
        }
        links.push(link.clone());
        Ok(link.clone())
    }

    async fn delete_for_absence(&self, absence_id: &Uuid) -> Result<Vec<UsageLink>> {
        let mut links = self.links.write().unwrap();
        let (removed, kept): (Vec<UsageLink>, Vec<UsageLink>) = std::mem::take(&mut *links)
            .into_iter()
            .partition(|link| link.absence_id == *absence_id);
        *links = kept;
        Ok(removed)
    }

    async fn delete_for_activity(&self, activity_id: &Uuid) -> Result<Vec<UsageLink>> {
        let mut links = self.links.write().unwrap();
        let (removed, kept): (Vec<UsageLink>, Vec<UsageLink>) = std::mem::take(&mut *links)
            .into_iter()
            .partition(|link| link.activity_id == *activity_id);
        *links = kept;
        Ok(removed)
    }
}

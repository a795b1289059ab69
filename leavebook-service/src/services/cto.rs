//! CTO ledger service implementation

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use leavebook::calendar;
use leavebook::cto::{self, Allocation};
use leavebook::types::{CtoEntry, CtoEntryKind, UsageLink};
use leavebook::{Error, Result};

use crate::services::EmployeeLocks;
use crate::stores::{CtoEntryStore, EmployeeStore, UsageLinkStore};

/// Request to record a credit-earning activity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityRequest {
    pub special_order: Option<String>,
    pub activity: Option<String>,
    pub activity_start: NaiveDate,
    pub activity_end: NaiveDate,
    pub credits_earned: Decimal,
}

/// Request to file an absence offset against earned credits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbsenceRequest {
    pub absence_start: NaiveDate,
    pub absence_end: NaiveDate,
    /// Falls back to the working days in the absence range when unset
    pub days_used_total: Option<Decimal>,
}

/// Pre-mutation state captured for rollback
struct CtoSnapshot {
    employee_id: Uuid,
    entries: Vec<CtoEntry>,
    links: Vec<UsageLink>,
}

/// CTO ledger service implementation
pub struct CtoServiceImpl {
    employees: Arc<dyn EmployeeStore>,
    entries: Arc<dyn CtoEntryStore>,
    links: Arc<dyn UsageLinkStore>,
    locks: Arc<EmployeeLocks>,
}

impl CtoServiceImpl {
    pub fn new(
        employees: Arc<dyn EmployeeStore>,
        entries: Arc<dyn CtoEntryStore>,
        links: Arc<dyn UsageLinkStore>,
        locks: Arc<EmployeeLocks>,
    ) -> Self {
        Self {
            employees,
            entries,
            links,
            locks,
        }
    }

    /// Record an activity that earns CTO credits
    #[instrument(skip(self, request))]
    pub async fn record_activity(
        &self,
        employee_id: Uuid,
        request: ActivityRequest,
    ) -> Result<CtoEntry> {
        info!(
            employee_id = %employee_id,
            credits = %request.credits_earned,
            "Recording CTO activity"
        );

        let _guard = self.locks.acquire(employee_id).await;
        self.employees.get(&employee_id).await?;
        Self::validate_activity(&request)?;

        let entry = CtoEntry {
            id: Uuid::new_v4(),
            employee_id,
            seq: 0,
            kind: CtoEntryKind::Activity,
            special_order: request.special_order,
            activity: request.activity,
            activity_start: Some(request.activity_start),
            activity_end: Some(request.activity_end),
            credits_earned: request.credits_earned,
            absence_start: None,
            absence_end: None,
            days_used_total: Decimal::ZERO,
            running_balance: Decimal::ZERO,
        };

        let snapshot = self.snapshot(&employee_id).await?;
        match self.apply_create(&entry).await {
            Ok(saved) => {
                info!(entry_id = %saved.id, running_balance = %saved.running_balance, "CTO activity recorded");
                Ok(saved)
            }
            Err(err) => {
                self.rollback(&snapshot, &err).await?;
                Err(err)
            }
        }
    }

    /// Edit a recorded activity
    #[instrument(skip(self, request))]
    pub async fn update_activity(&self, entry_id: Uuid, request: ActivityRequest) -> Result<CtoEntry> {
        let entry = self.entries.get(&entry_id).await?;
        if !entry.is_activity() {
            return Err(Error::InvalidInput(format!(
                "Entry {} is not an activity entry",
                entry_id
            )));
        }

        info!(entry_id = %entry_id, employee_id = %entry.employee_id, "Updating CTO activity");

        let _guard = self.locks.acquire(entry.employee_id).await;
        Self::validate_activity(&request)?;

        let revised = CtoEntry {
            special_order: request.special_order,
            activity: request.activity,
            activity_start: Some(request.activity_start),
            activity_end: Some(request.activity_end),
            credits_earned: request.credits_earned,
            days_used_total: Decimal::ZERO,
            ..entry.clone()
        };

        let snapshot = self.snapshot(&entry.employee_id).await?;
        match self.apply_update(&revised).await {
            Ok(saved) => {
                info!(entry_id = %saved.id, "CTO activity updated");
                Ok(saved)
            }
            Err(err) => {
                self.rollback(&snapshot, &err).await?;
                Err(err)
            }
        }
    }

    /// File an absence offset against earned CTO credits
    ///
    /// The requested days must be covered by credits not yet expired as of
    /// the absence start. Coverage is split FIFO across the oldest eligible
    /// activities and recorded as one usage link per funding activity. The
    /// whole mutation is all-or-nothing: any failure past the first write
    /// restores the prior ledger.
    #[instrument(skip(self, request))]
    pub async fn submit_absence(
        &self,
        employee_id: Uuid,
        request: AbsenceRequest,
    ) -> Result<CtoEntry> {
        let _guard = self.locks.acquire(employee_id).await;
        self.employees.get(&employee_id).await?;

        let days = Self::absence_days(&request)?;
        info!(employee_id = %employee_id, days = %days, "Filing CTO absence");

        let entries = self.entries.list_for_employee(&employee_id).await?;
        let links = self.links_for(&entries).await?;

        // Validate and plan the FIFO split before touching the ledger
        let eligible = cto::eligible_credits(&entries, &links, request.absence_start, None);
        let allocations = cto::allocate(&eligible, days)?;

        let entry = CtoEntry {
            id: Uuid::new_v4(),
            employee_id,
            seq: 0,
            kind: CtoEntryKind::Absence,
            special_order: None,
            activity: None,
            activity_start: None,
            activity_end: None,
            credits_earned: Decimal::ZERO,
            absence_start: Some(request.absence_start),
            absence_end: Some(request.absence_end),
            days_used_total: days,
            running_balance: Decimal::ZERO,
        };

        let snapshot = CtoSnapshot {
            employee_id,
            entries,
            links,
        };
        match self.apply_absence(&entry, &allocations).await {
            Ok(saved) => {
                info!(
                    entry_id = %saved.id,
                    running_balance = %saved.running_balance,
                    funding_activities = allocations.len(),
                    "CTO absence filed"
                );
                Ok(saved)
            }
            Err(err) => {
                self.rollback(&snapshot, &err).await?;
                Err(err)
            }
        }
    }

    /// Edit a filed absence, reallocating its funding credits
    ///
    /// Eligibility is computed without the absence's own links, so the days
    /// it already holds never count against the edit. The old links are
    /// dropped and rebuilt from a fresh FIFO split.
    #[instrument(skip(self, request))]
    pub async fn update_absence(&self, entry_id: Uuid, request: AbsenceRequest) -> Result<CtoEntry> {
        let entry = self.entries.get(&entry_id).await?;
        if entry.is_activity() {
            return Err(Error::InvalidInput(format!(
                "Entry {} is not an absence entry",
                entry_id
            )));
        }

        let _guard = self.locks.acquire(entry.employee_id).await;
        let days = Self::absence_days(&request)?;
        info!(entry_id = %entry_id, employee_id = %entry.employee_id, days = %days, "Updating CTO absence");

        let entries = self.entries.list_for_employee(&entry.employee_id).await?;
        let links = self.links_for(&entries).await?;

        let eligible =
            cto::eligible_credits(&entries, &links, request.absence_start, Some(entry.id));
        let allocations = cto::allocate(&eligible, days)?;

        let revised = CtoEntry {
            absence_start: Some(request.absence_start),
            absence_end: Some(request.absence_end),
            days_used_total: days,
            ..entry.clone()
        };

        let snapshot = CtoSnapshot {
            employee_id: entry.employee_id,
            entries,
            links,
        };
        match self.apply_absence_update(&revised, &allocations).await {
            Ok(saved) => {
                info!(entry_id = %saved.id, "CTO absence updated");
                Ok(saved)
            }
            Err(err) => {
                self.rollback(&snapshot, &err).await?;
                Err(err)
            }
        }
    }

    /// Remove an entry along with its usage links
    #[instrument(skip(self))]
    pub async fn delete_entry(&self, entry_id: Uuid) -> Result<CtoEntry> {
        let entry = self.entries.get(&entry_id).await?;
        info!(entry_id = %entry_id, employee_id = %entry.employee_id, "Deleting CTO entry");

        let _guard = self.locks.acquire(entry.employee_id).await;

        let snapshot = self.snapshot(&entry.employee_id).await?;
        match self.apply_delete(&entry).await {
            Ok(removed) => {
                info!(entry_id = %entry_id, "CTO entry deleted");
                Ok(removed)
            }
            Err(err) => {
                self.rollback(&snapshot, &err).await?;
                Err(err)
            }
        }
    }

    /// Recompute every running balance for one employee
    #[instrument(skip(self))]
    pub async fn recalculate(&self, employee_id: Uuid) -> Result<()> {
        info!(employee_id = %employee_id, "Recalculating CTO ledger");

        let _guard = self.locks.acquire(employee_id).await;
        self.employees.get(&employee_id).await?;
        self.recalculate_for(&employee_id).await
    }

    /// Lifetime earned minus lifetime used, ignoring expiry
    pub async fn current_balance(&self, employee_id: Uuid) -> Result<Decimal> {
        self.employees.get(&employee_id).await?;
        let entries = self.entries.list_for_employee(&employee_id).await?;

        let earned: Decimal = entries
            .iter()
            .filter(|e| e.is_activity())
            .map(|e| e.credits_earned)
            .sum();
        let used: Decimal = entries
            .iter()
            .filter(|e| !e.is_activity())
            .map(|e| e.days_used_total)
            .sum();
        Ok(earned - used)
    }

    /// Credit still consumable as of a date, today when unset
    pub async fn eligible_balance(
        &self,
        employee_id: Uuid,
        as_of: Option<NaiveDate>,
    ) -> Result<Decimal> {
        self.employees.get(&employee_id).await?;
        let entries = self.entries.list_for_employee(&employee_id).await?;
        let links = self.links_for(&entries).await?;

        let as_of = as_of.unwrap_or_else(|| Utc::now().date_naive());
        Ok(cto::eligible_total(&entries, &links, as_of))
    }

    fn validate_activity(request: &ActivityRequest) -> Result<()> {
        if request.credits_earned < Decimal::ZERO {
            return Err(Error::InvalidInput(format!(
                "CTO credits cannot be negative, got {}",
                request.credits_earned
            )));
        }
        if request.activity_end < request.activity_start {
            return Err(Error::InvalidInput(format!(
                "Activity dates are inverted: {} to {}",
                request.activity_start, request.activity_end
            )));
        }
        Ok(())
    }

    /// Days to debit, derived from the date range when not given
    fn absence_days(request: &AbsenceRequest) -> Result<Decimal> {
        if request.absence_end < request.absence_start {
            return Err(Error::InvalidInput(format!(
                "Absence dates are inverted: {} to {}",
                request.absence_start, request.absence_end
            )));
        }
        let days = request.days_used_total.unwrap_or_else(|| {
            Decimal::from(calendar::working_days_between(
                request.absence_start,
                request.absence_end,
            ))
        });
        if days <= Decimal::ZERO {
            return Err(Error::InvalidInput(format!(
                "Absence days must be positive, got {}",
                days
            )));
        }
        Ok(days)
    }

    async fn links_for(&self, entries: &[CtoEntry]) -> Result<Vec<UsageLink>> {
        let mut links = Vec::new();
        for entry in entries {
            if !entry.is_activity() {
                links.extend(self.links.list_for_absence(&entry.id).await?);
            }
        }
        Ok(links)
    }

    async fn snapshot(&self, employee_id: &Uuid) -> Result<CtoSnapshot> {
        let entries = self.entries.list_for_employee(employee_id).await?;
        let links = self.links_for(&entries).await?;
        Ok(CtoSnapshot {
            employee_id: *employee_id,
            entries,
            links,
        })
    }

    async fn apply_create(&self, entry: &CtoEntry) -> Result<CtoEntry> {
        self.entries.create(entry).await?;
        self.recalculate_for(&entry.employee_id).await?;
        self.entries.get(&entry.id).await
    }

    async fn apply_update(&self, entry: &CtoEntry) -> Result<CtoEntry> {
        self.entries.update(entry).await?;
        self.recalculate_for(&entry.employee_id).await?;
        self.entries.get(&entry.id).await
    }

    async fn apply_absence(&self, entry: &CtoEntry, allocations: &[Allocation]) -> Result<CtoEntry> {
        self.entries.create(entry).await?;
        self.create_links(entry.id, allocations).await?;
        self.recalculate_for(&entry.employee_id).await?;
        self.entries.get(&entry.id).await
    }

    async fn apply_absence_update(
        &self,
        entry: &CtoEntry,
        allocations: &[Allocation],
    ) -> Result<CtoEntry> {
        // Old links go first so the rebuilt split replaces them wholesale
        self.links.delete_for_absence(&entry.id).await?;
        self.entries.update(entry).await?;
        self.create_links(entry.id, allocations).await?;
        self.recalculate_for(&entry.employee_id).await?;
        self.entries.get(&entry.id).await
    }

    async fn apply_delete(&self, entry: &CtoEntry) -> Result<CtoEntry> {
        if entry.is_activity() {
            self.links.delete_for_activity(&entry.id).await?;
        } else {
            self.links.delete_for_absence(&entry.id).await?;
        }
        let removed = self.entries.delete(&entry.id).await?;
        self.recalculate_for(&entry.employee_id).await?;
        Ok(removed)
    }

    async fn create_links(&self, absence_id: Uuid, allocations: &[Allocation]) -> Result<()> {
        for allocation in allocations {
            self.links
                .create(&UsageLink {
                    id: Uuid::new_v4(),
                    activity_id: allocation.activity_id,
                    absence_id,
                    days_used: allocation.days_used,
                })
                .await?;
        }
        Ok(())
    }

    /// Recompute running balances, logging expiries and stale links, and
    /// persist only entries whose rounded balance moved
    async fn recalculate_for(&self, employee_id: &Uuid) -> Result<()> {
        let entries = self.entries.list_for_employee(employee_id).await?;
        let links = self.links_for(&entries).await?;
        let outcome = cto::recalculate(&entries, &links);

        for expiry in &outcome.expiries {
            if expiry.forfeited > Decimal::ZERO {
                warn!(
                    activity_id = %expiry.activity_id,
                    forfeited = %expiry.forfeited,
                    expired_at = %expiry.expired_at,
                    "CTO credits expired unconsumed"
                );
            }
        }
        for stale in &outcome.stale_links {
            warn!(
                link_id = %stale.link_id,
                absence_id = %stale.absence_id,
                activity_id = %stale.activity_id,
                "Skipped usage link to an inactive activity"
            );
        }

        for balance in outcome.balances {
            if let Some(found) = entries.iter().find(|e| e.id == balance.entry_id) {
                if found.running_balance != balance.running_balance {
                    debug!(
                        entry_id = %balance.entry_id,
                        from = %found.running_balance,
                        to = %balance.running_balance,
                        "Rewriting CTO running balance"
                    );
                    let mut entry = found.clone();
                    entry.running_balance = balance.running_balance;
                    self.entries.update(&entry).await?;
                }
            }
        }
        Ok(())
    }

    /// Put the ledger back to its pre-mutation state
    async fn rollback(&self, snapshot: &CtoSnapshot, cause: &Error) -> Result<()> {
        error!(
            error = %cause,
            employee_id = %snapshot.employee_id,
            "CTO mutation failed, rolling back"
        );
        if let Err(restore_err) = self.restore(snapshot).await {
            error!(error = %restore_err, "Rollback failed");
            return Err(Error::TransactionFailure(format!(
                "rollback after `{}` failed: {}",
                cause, restore_err
            )));
        }
        Ok(())
    }

    async fn restore(&self, snapshot: &CtoSnapshot) -> Result<()> {
        let current = self.entries.list_for_employee(&snapshot.employee_id).await?;

        // Links are wiped for every absence in either state, then rebuilt
        // from the snapshot
        for entry in current.iter().chain(snapshot.entries.iter()) {
            if !entry.is_activity() {
                self.links.delete_for_absence(&entry.id).await?;
            }
        }

        for entry in &current {
            if !snapshot.entries.iter().any(|kept| kept.id == entry.id) {
                self.entries.delete(&entry.id).await?;
            }
        }
        for entry in &snapshot.entries {
            if current.iter().any(|existing| existing.id == entry.id) {
                self.entries.update(entry).await?;
            } else {
                self.entries.create(entry).await?;
            }
        }
        for link in &snapshot.links {
            self.links.create(link).await?;
        }
        Ok(())
    }
}

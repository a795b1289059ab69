//! Simple leave ledger service implementation

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};
use uuid::Uuid;

use leavebook::simple;
use leavebook::types::{Employee, LeaveAllowances, LeaveEntry, LeaveEntryKind};
use leavebook::{Error, Result};

use crate::config::CreditPolicy;
use crate::services::EmployeeLocks;
use crate::stores::{EmployeeStore, LeaveEntryStore};

pub use leavebook::types::LeaveType;

/// Request to file a leave of absence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaveRequest {
    pub leave_type: LeaveType,
    pub working_days: Decimal,
    pub details: Option<String>,
    pub inclusive_date_start: Option<NaiveDate>,
    pub inclusive_date_end: Option<NaiveDate>,
    pub date_filed: NaiveDate,
    pub commutation: Option<String>,
}

/// Request to record earned leave credits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditRequest {
    pub earned_date: NaiveDate,
    /// Falls back to the configured monthly VL accrual when unset
    pub vl_credits: Option<Decimal>,
    /// Falls back to the configured monthly SL accrual when unset
    pub sl_credits: Option<Decimal>,
    pub details: Option<String>,
}

/// Balances for one employee after every recorded entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentBalances {
    pub vl: Decimal,
    pub sl: Decimal,
    pub allowances: LeaveAllowances,
}

/// Pre-mutation state captured for rollback
struct LedgerSnapshot {
    employee: Employee,
    entries: Vec<LeaveEntry>,
}

/// Simple leave ledger service implementation
pub struct LeaveServiceImpl {
    employees: Arc<dyn EmployeeStore>,
    entries: Arc<dyn LeaveEntryStore>,
    locks: Arc<EmployeeLocks>,
    policy: CreditPolicy,
}

impl LeaveServiceImpl {
    pub fn new(
        employees: Arc<dyn EmployeeStore>,
        entries: Arc<dyn LeaveEntryStore>,
        locks: Arc<EmployeeLocks>,
        policy: CreditPolicy,
    ) -> Self {
        Self {
            employees,
            entries,
            locks,
            policy,
        }
    }

    /// File a leave of absence
    ///
    /// VL/SL requests are checked against the hypothetical ledger balance as
    /// of the leave's effective date; other types draw on the employee's
    /// allowance counters. All balances are recomputed before the call
    /// returns, and any failure past the first write rolls the ledger back.
    #[instrument(skip(self, request))]
    pub async fn submit_leave(&self, employee_id: Uuid, request: LeaveRequest) -> Result<LeaveEntry> {
        info!(
            employee_id = %employee_id,
            leave_type = %request.leave_type,
            days = %request.working_days,
            "Filing leave"
        );

        let _guard = self.locks.acquire(employee_id).await;
        let employee = self.employees.get(&employee_id).await?;
        Self::validate_request(&request)?;

        let existing = self.entries.list_for_employee(&employee_id).await?;
        let mut updated = employee.clone();

        // Check sufficiency against the ledger or the allowance counter
        if request.leave_type.is_ledgered() {
            let check_date = Self::effective_date(&request);
            let balances = simple::balances_as_of(
                employee.forwarded_vl,
                employee.forwarded_sl,
                &existing,
                check_date,
                None,
            );
            let available = match request.leave_type {
                LeaveType::Vl => balances.vl,
                _ => balances.sl,
            };
            if available < request.working_days {
                return Err(Error::InsufficientBalance {
                    leave_type: request.leave_type.clone(),
                    available,
                    requested: request.working_days,
                });
            }
        } else {
            let available = updated
                .allowances
                .get(&request.leave_type)
                .unwrap_or(Decimal::ZERO);
            if available < request.working_days {
                return Err(Error::InsufficientBalance {
                    leave_type: request.leave_type.clone(),
                    available,
                    requested: request.working_days,
                });
            }
            updated
                .allowances
                .deduct(&request.leave_type, request.working_days);
        }

        let entry = LeaveEntry {
            id: Uuid::new_v4(),
            employee_id,
            seq: 0,
            kind: LeaveEntryKind::LeaveTaken,
            leave_type: Some(request.leave_type.clone()),
            details: request.details,
            working_days: request.working_days,
            inclusive_date_start: request.inclusive_date_start,
            inclusive_date_end: request.inclusive_date_end,
            date_filed: Some(request.date_filed),
            earned_date: None,
            commutation: request.commutation,
            earned_vl: Decimal::ZERO,
            earned_sl: Decimal::ZERO,
            running_vl: Decimal::ZERO,
            running_sl: Decimal::ZERO,
        };

        let snapshot = self.snapshot(&employee).await?;
        match self.apply_create(&updated, &entry).await {
            Ok(saved) => {
                info!(entry_id = %saved.id, running_vl = %saved.running_vl, running_sl = %saved.running_sl, "Leave filed");
                Ok(saved)
            }
            Err(err) => {
                self.rollback(&snapshot, &err).await?;
                Err(err)
            }
        }
    }

    /// Record earned leave credits, defaulting to the monthly accrual
    #[instrument(skip(self, request))]
    pub async fn add_credits(&self, employee_id: Uuid, request: CreditRequest) -> Result<LeaveEntry> {
        info!(employee_id = %employee_id, earned_date = %request.earned_date, "Recording leave credits");

        let _guard = self.locks.acquire(employee_id).await;
        let employee = self.employees.get(&employee_id).await?;

        let entry = LeaveEntry {
            id: Uuid::new_v4(),
            employee_id,
            seq: 0,
            kind: LeaveEntryKind::CreditEarned,
            leave_type: None,
            details: request.details,
            working_days: Decimal::ZERO,
            inclusive_date_start: None,
            inclusive_date_end: None,
            date_filed: None,
            earned_date: Some(request.earned_date),
            commutation: None,
            earned_vl: request.vl_credits.unwrap_or(self.policy.monthly_vl_credit),
            earned_sl: request.sl_credits.unwrap_or(self.policy.monthly_sl_credit),
            running_vl: Decimal::ZERO,
            running_sl: Decimal::ZERO,
        };

        let snapshot = self.snapshot(&employee).await?;
        match self.apply_create(&employee, &entry).await {
            Ok(saved) => {
                info!(entry_id = %saved.id, "Leave credits recorded");
                Ok(saved)
            }
            Err(err) => {
                self.rollback(&snapshot, &err).await?;
                Err(err)
            }
        }
    }

    /// Edit a filed leave
    ///
    /// Sufficiency is checked against the ledger without the entry under
    /// edit, so the entry's own prior deduction never counts against it.
    /// Allowance days held by the old version are released before the new
    /// version's are taken.
    #[instrument(skip(self, request))]
    pub async fn update_leave(&self, entry_id: Uuid, request: LeaveRequest) -> Result<LeaveEntry> {
        let entry = self.entries.get(&entry_id).await?;
        if entry.kind != LeaveEntryKind::LeaveTaken {
            return Err(Error::InvalidInput(format!(
                "Entry {} is not a leave entry",
                entry_id
            )));
        }

        info!(
            entry_id = %entry_id,
            employee_id = %entry.employee_id,
            leave_type = %request.leave_type,
            "Updating leave"
        );

        let _guard = self.locks.acquire(entry.employee_id).await;
        let employee = self.employees.get(&entry.employee_id).await?;
        Self::validate_request(&request)?;

        let existing = self.entries.list_for_employee(&entry.employee_id).await?;
        let mut updated = employee.clone();

        // Release the days the old version held on an allowance counter
        if let Some(old_type) = &entry.leave_type {
            if !old_type.is_ledgered() {
                updated.allowances.restore(old_type, entry.working_days);
            }
        }

        if request.leave_type.is_ledgered() {
            let check_date = Self::effective_date(&request);
            let balances = simple::balances_as_of(
                employee.forwarded_vl,
                employee.forwarded_sl,
                &existing,
                check_date,
                Some(entry_id),
            );
            let available = match request.leave_type {
                LeaveType::Vl => balances.vl,
                _ => balances.sl,
            };
            if available < request.working_days {
                return Err(Error::InsufficientBalance {
                    leave_type: request.leave_type.clone(),
                    available,
                    requested: request.working_days,
                });
            }
        } else {
            let available = updated
                .allowances
                .get(&request.leave_type)
                .unwrap_or(Decimal::ZERO);
            if available < request.working_days {
                return Err(Error::InsufficientBalance {
                    leave_type: request.leave_type.clone(),
                    available,
                    requested: request.working_days,
                });
            }
            updated
                .allowances
                .deduct(&request.leave_type, request.working_days);
        }

        let revised = LeaveEntry {
            leave_type: Some(request.leave_type.clone()),
            details: request.details,
            working_days: request.working_days,
            inclusive_date_start: request.inclusive_date_start,
            inclusive_date_end: request.inclusive_date_end,
            date_filed: Some(request.date_filed),
            commutation: request.commutation,
            ..entry.clone()
        };

        let snapshot = self.snapshot(&employee).await?;
        match self.apply_update(&updated, &revised).await {
            Ok(saved) => {
                info!(entry_id = %saved.id, "Leave updated");
                Ok(saved)
            }
            Err(err) => {
                self.rollback(&snapshot, &err).await?;
                Err(err)
            }
        }
    }

    /// Edit a recorded credit entry
    #[instrument(skip(self, request))]
    pub async fn update_credit(&self, entry_id: Uuid, request: CreditRequest) -> Result<LeaveEntry> {
        let entry = self.entries.get(&entry_id).await?;
        if entry.kind != LeaveEntryKind::CreditEarned {
            return Err(Error::InvalidInput(format!(
                "Entry {} is not a credit entry",
                entry_id
            )));
        }

        info!(entry_id = %entry_id, employee_id = %entry.employee_id, "Updating leave credits");

        let _guard = self.locks.acquire(entry.employee_id).await;
        let employee = self.employees.get(&entry.employee_id).await?;

        let revised = LeaveEntry {
            earned_date: Some(request.earned_date),
            details: request.details,
            earned_vl: request.vl_credits.unwrap_or(self.policy.monthly_vl_credit),
            earned_sl: request.sl_credits.unwrap_or(self.policy.monthly_sl_credit),
            ..entry.clone()
        };

        let snapshot = self.snapshot(&employee).await?;
        match self.apply_update(&employee, &revised).await {
            Ok(saved) => {
                info!(entry_id = %saved.id, "Leave credits updated");
                Ok(saved)
            }
            Err(err) => {
                self.rollback(&snapshot, &err).await?;
                Err(err)
            }
        }
    }

    /// Remove an entry and recompute the balances that followed it
    #[instrument(skip(self))]
    pub async fn delete_entry(&self, entry_id: Uuid) -> Result<LeaveEntry> {
        let entry = self.entries.get(&entry_id).await?;
        info!(entry_id = %entry_id, employee_id = %entry.employee_id, "Deleting ledger entry");

        let _guard = self.locks.acquire(entry.employee_id).await;
        let employee = self.employees.get(&entry.employee_id).await?;

        // Days held on an allowance counter return when the entry goes
        let mut updated = employee.clone();
        if entry.kind == LeaveEntryKind::LeaveTaken {
            if let Some(leave_type) = &entry.leave_type {
                if !leave_type.is_ledgered() {
                    updated.allowances.restore(leave_type, entry.working_days);
                }
            }
        }

        let snapshot = self.snapshot(&employee).await?;
        match self.apply_delete(&updated, &entry_id).await {
            Ok(removed) => {
                info!(entry_id = %entry_id, "Ledger entry deleted");
                Ok(removed)
            }
            Err(err) => {
                self.rollback(&snapshot, &err).await?;
                Err(err)
            }
        }
    }

    /// Balances after the full ledger, plus the allowance counters
    pub async fn current_balances(&self, employee_id: Uuid) -> Result<CurrentBalances> {
        let employee = self.employees.get(&employee_id).await?;
        let entries = self.entries.list_for_employee(&employee_id).await?;

        let balances = simple::recalculate(employee.forwarded_vl, employee.forwarded_sl, &entries);
        let (vl, sl) = balances
            .last()
            .map(|b| (b.running_vl, b.running_sl))
            .unwrap_or((employee.forwarded_vl, employee.forwarded_sl));

        Ok(CurrentBalances {
            vl,
            sl,
            allowances: employee.allowances,
        })
    }

    fn validate_request(request: &LeaveRequest) -> Result<()> {
        if request.working_days <= Decimal::ZERO {
            return Err(Error::InvalidInput(format!(
                "Working days must be positive, got {}",
                request.working_days
            )));
        }
        if let (Some(start), Some(end)) = (request.inclusive_date_start, request.inclusive_date_end)
        {
            if end < start {
                return Err(Error::InvalidInput(format!(
                    "Inclusive dates are inverted: {} to {}",
                    start, end
                )));
            }
        }
        Ok(())
    }

    /// Date the leave takes effect for ordering and sufficiency checks
    fn effective_date(request: &LeaveRequest) -> NaiveDate {
        request
            .inclusive_date_start
            .map_or(request.date_filed, |start| start.min(request.date_filed))
    }

    async fn snapshot(&self, employee: &Employee) -> Result<LedgerSnapshot> {
        Ok(LedgerSnapshot {
            employee: employee.clone(),
            entries: self.entries.list_for_employee(&employee.id).await?,
        })
    }

    async fn apply_create(&self, employee: &Employee, entry: &LeaveEntry) -> Result<LeaveEntry> {
        self.entries.create(entry).await?;
        self.employees.update(employee).await?;
        self.recalculate_for(employee).await?;
        self.entries.get(&entry.id).await
    }

    async fn apply_update(&self, employee: &Employee, entry: &LeaveEntry) -> Result<LeaveEntry> {
        self.entries.update(entry).await?;
        self.employees.update(employee).await?;
        self.recalculate_for(employee).await?;
        self.entries.get(&entry.id).await
    }

    async fn apply_delete(&self, employee: &Employee, entry_id: &Uuid) -> Result<LeaveEntry> {
        let removed = self.entries.delete(entry_id).await?;
        self.employees.update(employee).await?;
        self.recalculate_for(employee).await?;
        Ok(removed)
    }

    /// Recompute and persist the running balance pair on every entry
    async fn recalculate_for(&self, employee: &Employee) -> Result<()> {
        let entries = self.entries.list_for_employee(&employee.id).await?;
        let balances = simple::recalculate(employee.forwarded_vl, employee.forwarded_sl, &entries);

        for balance in balances {
            if let Some(found) = entries.iter().find(|e| e.id == balance.entry_id) {
                let mut entry = found.clone();
                entry.running_vl = balance.running_vl;
                entry.running_sl = balance.running_sl;
                self.entries.update(&entry).await?;
            }
        }
        Ok(())
    }

    /// Put the ledger back to its pre-mutation state
    async fn rollback(&self, snapshot: &LedgerSnapshot, cause: &Error) -> Result<()> {
        error!(
            error = %cause,
            employee_id = %snapshot.employee.id,
            "Ledger mutation failed, rolling back"
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

    async fn restore(&self, snapshot: &LedgerSnapshot) -> Result<()> {
        self.employees.update(&snapshot.employee).await?;

        let current = self.entries.list_for_employee(&snapshot.employee.id).await?;
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
        Ok(())
    }
}

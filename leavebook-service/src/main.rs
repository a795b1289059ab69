//! Leavebook ledger service
//!
//! Seeds an in-memory ledger and walks the core operations: filing leaves
//! against running balances, monthly accrual, and CTO activities consumed
//! FIFO by absences.

mod config;
mod services;
mod stores;

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use leavebook::types::{Employee, LeaveAllowances, LeaveType};

use crate::config::CreditPolicy;
use crate::services::cto::{AbsenceRequest, ActivityRequest, CtoServiceImpl};
use crate::services::leave::{CreditRequest, LeaveRequest, LeaveServiceImpl};
use crate::services::EmployeeLocks;
use crate::stores::memory::{
    InMemoryCtoEntryStore, InMemoryEmployeeStore, InMemoryLeaveEntryStore, InMemoryUsageLinkStore,
};
use crate::stores::EmployeeStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(version = leavebook::VERSION, "Starting Leavebook ledger service");

    let employees = Arc::new(InMemoryEmployeeStore::new());
    let leave_entries = Arc::new(InMemoryLeaveEntryStore::new());
    let cto_entries = Arc::new(InMemoryCtoEntryStore::new());
    let usage_links = Arc::new(InMemoryUsageLinkStore::new());
    let locks = Arc::new(EmployeeLocks::new());

    let leave_service = LeaveServiceImpl::new(
        employees.clone(),
        leave_entries.clone(),
        locks.clone(),
        CreditPolicy::from_env(),
    );
    let cto_service = CtoServiceImpl::new(
        employees.clone(),
        cto_entries.clone(),
        usage_links.clone(),
        locks.clone(),
    );

    // Seed one employee carrying last year's balances
    let employee = Employee {
        id: Uuid::new_v4(),
        name: "Maria Santos".to_string(),
        division: "Administrative Division".to_string(),
        designation: "Administrative Officer II".to_string(),
        forwarded_vl: Decimal::from(15),
        forwarded_sl: Decimal::from(10),
        allowances: LeaveAllowances {
            spl: Decimal::from(3),
            ..Default::default()
        },
    };
    employees.create(&employee).await?;

    // File a January vacation against the forwarded balance
    let vacation = leave_service
        .submit_leave(
            employee.id,
            LeaveRequest {
                leave_type: LeaveType::Vl,
                working_days: Decimal::from(5),
                details: Some("Family trip".to_string()),
                inclusive_date_start: Some("2023-01-09".parse()?),
                inclusive_date_end: Some("2023-01-13".parse()?),
                date_filed: "2023-01-04".parse()?,
                commutation: None,
            },
        )
        .await?;

    // Monthly accrual recorded at the end of February
    leave_service
        .add_credits(
            employee.id,
            CreditRequest {
                earned_date: "2023-02-28".parse()?,
                vl_credits: None,
                sl_credits: None,
                details: Some("Monthly credit".to_string()),
            },
        )
        .await?;

    let balances = leave_service.current_balances(employee.id).await?;
    tracing::info!(vl = %balances.vl, sl = %balances.sl, "Leave balances after filing");

    // A weekend drill earns CTO credits; a June absence consumes them
    cto_service
        .record_activity(
            employee.id,
            ActivityRequest {
                special_order: Some("SO-2023-011".to_string()),
                activity: Some("Disaster response drill".to_string()),
                activity_start: "2023-01-14".parse()?,
                activity_end: "2023-01-15".parse()?,
                credits_earned: Decimal::from(4),
            },
        )
        .await?;
    cto_service
        .submit_absence(
            employee.id,
            AbsenceRequest {
                absence_start: "2023-06-05".parse()?,
                absence_end: "2023-06-07".parse()?,
                days_used_total: None,
            },
        )
        .await?;

    let current = cto_service.current_balance(employee.id).await?;
    let eligible = cto_service
        .eligible_balance(employee.id, Some("2023-06-08".parse()?))
        .await?;
    tracing::info!(current = %current, eligible = %eligible, "CTO balances after offset");

    // The vacation is shortened after the fact; every later balance is
    // recomputed
    let revised = leave_service
        .update_leave(
            vacation.id,
            LeaveRequest {
                leave_type: LeaveType::Vl,
                working_days: Decimal::from(4),
                details: Some("Family trip (returned early)".to_string()),
                inclusive_date_start: Some("2023-01-09".parse()?),
                inclusive_date_end: Some("2023-01-12".parse()?),
                date_filed: "2023-01-04".parse()?,
                commutation: None,
            },
        )
        .await?;
    tracing::info!(running_vl = %revised.running_vl, "Vacation shortened to four days");

    // An oversized request is rejected before anything is written
    if let Err(err) = leave_service
        .submit_leave(
            employee.id,
            LeaveRequest {
                leave_type: LeaveType::Sl,
                working_days: Decimal::from(30),
                details: None,
                inclusive_date_start: Some("2023-07-03".parse()?),
                inclusive_date_end: Some("2023-08-11".parse()?),
                date_filed: "2023-06-30".parse()?,
                commutation: None,
            },
        )
        .await
    {
        tracing::warn!(error = %err, "Rejected oversized sick leave request");
    }

    Ok(())
}

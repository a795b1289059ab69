//! Running-balance recalculation for the vacation/sick leave ledger
//!
//! Every mutation of an employee's simple-leave ledger recomputes the full
//! entry list from the forwarded balances. The walk is a pure function of
//! its inputs, so repeated runs over unchanged input always produce the
//! same balances.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::types::{LeaveEntry, LeaveEntryKind, LeaveType};

/// VL/SL balance pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaveBalances {
    pub vl: Decimal,
    pub sl: Decimal,
}

/// Recomputed running balances for one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleBalance {
    pub entry_id: Uuid,
    pub running_vl: Decimal,
    pub running_sl: Decimal,
}

/// Recompute the running VL/SL balances for every entry, walking the full
/// list in chronological order (effective date ascending, insertion
/// sequence breaking ties) from the forwarded balances.
///
/// Deductions floor at zero. Leave types outside VL/SL pass through without
/// touching either balance; their bookkeeping lives on the employee's
/// allowance counters.
pub fn recalculate(
    forwarded_vl: Decimal,
    forwarded_sl: Decimal,
    entries: &[LeaveEntry],
) -> Vec<SimpleBalance> {
    let mut ordered: Vec<&LeaveEntry> = entries.iter().collect();
    ordered.sort_by_key(|e| (e.effective_date(), e.seq));

    let mut vl = forwarded_vl;
    let mut sl = forwarded_sl;
    let mut balances = Vec::with_capacity(ordered.len());

    for entry in ordered {
        match entry.kind {
            LeaveEntryKind::CreditEarned => {
                vl += entry.earned_vl;
                sl += entry.earned_sl;
            }
            LeaveEntryKind::LeaveTaken => match entry.leave_type {
                Some(LeaveType::Vl) => vl = (vl - entry.working_days).max(Decimal::ZERO),
                Some(LeaveType::Sl) => sl = (sl - entry.working_days).max(Decimal::ZERO),
                _ => {}
            },
        }
        balances.push(SimpleBalance {
            entry_id: entry.id,
            running_vl: vl,
            running_sl: sl,
        });
    }

    balances
}

/// Hypothetical VL/SL balances as of a date, considering only entries
/// effective on or before it. `exclude` drops one entry from the walk (the
/// entry being edited, which must not count against its own sufficiency
/// check).
pub fn balances_as_of(
    forwarded_vl: Decimal,
    forwarded_sl: Decimal,
    entries: &[LeaveEntry],
    as_of: NaiveDate,
    exclude: Option<Uuid>,
) -> LeaveBalances {
    let considered: Vec<LeaveEntry> = entries
        .iter()
        .filter(|e| exclude != Some(e.id))
        .filter(|e| e.effective_date().map_or(true, |d| d <= as_of))
        .cloned()
        .collect();

    recalculate(forwarded_vl, forwarded_sl, &considered)
        .last()
        .map(|b| LeaveBalances {
            vl: b.running_vl,
            sl: b.running_sl,
        })
        .unwrap_or(LeaveBalances {
            vl: forwarded_vl,
            sl: forwarded_sl,
        })
}

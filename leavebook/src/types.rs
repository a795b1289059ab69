//! Domain entities for the leave and CTO ledgers

use chrono::{Months, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

/// Leave type codes supported by the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeaveType {
    Vl,
    Sl,
    Spl,
    Fl,
    SoloParent,
    Ml,
    Pl,
    Ra9710,
    Rl,
    Sel,
    StudyLeave,
}

impl LeaveType {
    /// Human-readable name for display.
    pub fn display_name(&self) -> &'static str {
        match self {
            LeaveType::Vl => "Vacation Leave",
            LeaveType::Sl => "Sick Leave",
            LeaveType::Spl => "Special Privilege Leave",
            LeaveType::Fl => "Forced Leave",
            LeaveType::SoloParent => "Solo Parent Leave",
            LeaveType::Ml => "Maternity Leave",
            LeaveType::Pl => "Paternity Leave",
            LeaveType::Ra9710 => "RA 9710 Leave",
            LeaveType::Rl => "Rehabilitation Leave",
            LeaveType::Sel => "Special Emergency Leave",
            LeaveType::StudyLeave => "Study Leave",
        }
    }

    /// Whether the type carries a running ledger balance. The remaining
    /// types draw on the employee's allowance counters instead.
    pub fn is_ledgered(&self) -> bool {
        matches!(self, LeaveType::Vl | LeaveType::Sl)
    }
}

impl std::fmt::Display for LeaveType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LeaveType::Vl => write!(f, "VL"),
            LeaveType::Sl => write!(f, "SL"),
            LeaveType::Spl => write!(f, "SPL"),
            LeaveType::Fl => write!(f, "FL"),
            LeaveType::SoloParent => write!(f, "SOLO_PARENT"),
            LeaveType::Ml => write!(f, "ML"),
            LeaveType::Pl => write!(f, "PL"),
            LeaveType::Ra9710 => write!(f, "RA9710"),
            LeaveType::Rl => write!(f, "RL"),
            LeaveType::Sel => write!(f, "SEL"),
            LeaveType::StudyLeave => write!(f, "STUDY_LEAVE"),
        }
    }
}

impl std::str::FromStr for LeaveType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "VL" => Ok(LeaveType::Vl),
            "SL" => Ok(LeaveType::Sl),
            "SPL" => Ok(LeaveType::Spl),
            "FL" => Ok(LeaveType::Fl),
            "SOLO_PARENT" => Ok(LeaveType::SoloParent),
            "ML" => Ok(LeaveType::Ml),
            "PL" => Ok(LeaveType::Pl),
            "RA9710" => Ok(LeaveType::Ra9710),
            "RL" => Ok(LeaveType::Rl),
            "SEL" => Ok(LeaveType::Sel),
            "STUDY_LEAVE" => Ok(LeaveType::StudyLeave),
            _ => Err(Error::InvalidLeaveType(s.to_string())),
        }
    }
}

/// Simple-leave entry kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeaveEntryKind {
    CreditEarned,
    LeaveTaken,
}

impl std::fmt::Display for LeaveEntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LeaveEntryKind::CreditEarned => write!(f, "credit_earned"),
            LeaveEntryKind::LeaveTaken => write!(f, "leave_taken"),
        }
    }
}

/// CTO entry kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CtoEntryKind {
    Activity,
    Absence,
}

impl std::fmt::Display for CtoEntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CtoEntryKind::Activity => write!(f, "activity"),
            CtoEntryKind::Absence => write!(f, "absence"),
        }
    }
}

/// Per-employee counters for leave types outside the VL/SL ledger
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeaveAllowances {
    pub spl: Decimal,
    pub fl: Decimal,
    pub solo_parent: Decimal,
    pub ml: Decimal,
    pub pl: Decimal,
    pub ra9710: Decimal,
    pub rl: Decimal,
    pub sel: Decimal,
    pub study_leave: Decimal,
}

impl LeaveAllowances {
    /// Remaining allowance for a non-ledgered leave type. `None` for VL/SL,
    /// which carry running ledger balances instead.
    pub fn get(&self, leave_type: &LeaveType) -> Option<Decimal> {
        match leave_type {
            LeaveType::Vl | LeaveType::Sl => None,
            LeaveType::Spl => Some(self.spl),
            LeaveType::Fl => Some(self.fl),
            LeaveType::SoloParent => Some(self.solo_parent),
            LeaveType::Ml => Some(self.ml),
            LeaveType::Pl => Some(self.pl),
            LeaveType::Ra9710 => Some(self.ra9710),
            LeaveType::Rl => Some(self.rl),
            LeaveType::Sel => Some(self.sel),
            LeaveType::StudyLeave => Some(self.study_leave),
        }
    }

    /// Deduct days from a counter, floored at zero. VL/SL are ignored.
    pub fn deduct(&mut self, leave_type: &LeaveType, days: Decimal) {
        self.adjust(leave_type, -days);
    }

    /// Restore days to a counter, used when a deducting entry is edited or
    /// deleted.
    pub fn restore(&mut self, leave_type: &LeaveType, days: Decimal) {
        self.adjust(leave_type, days);
    }

    fn adjust(&mut self, leave_type: &LeaveType, delta: Decimal) {
        let counter = match leave_type {
            LeaveType::Vl | LeaveType::Sl => return,
            LeaveType::Spl => &mut self.spl,
            LeaveType::Fl => &mut self.fl,
            LeaveType::SoloParent => &mut self.solo_parent,
            LeaveType::Ml => &mut self.ml,
            LeaveType::Pl => &mut self.pl,
            LeaveType::Ra9710 => &mut self.ra9710,
            LeaveType::Rl => &mut self.rl,
            LeaveType::Sel => &mut self.sel,
            LeaveType::StudyLeave => &mut self.study_leave,
        };
        *counter = (*counter + delta).max(Decimal::ZERO);
    }
}

/// Employee entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Employee {
    pub id: Uuid,
    pub name: String,
    pub division: String,
    pub designation: String,
    /// Year-start VL carryover; immutable once set, the base case for
    /// recalculation.
    pub forwarded_vl: Decimal,
    /// Year-start SL carryover; immutable once set.
    pub forwarded_sl: Decimal,
    pub allowances: LeaveAllowances,
}

/// Simple-leave ledger entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaveEntry {
    pub id: Uuid,
    pub employee_id: Uuid,
    /// Insertion sequence assigned by the store, strictly increasing and
    /// stable across edits. Breaks effective-date ties.
    pub seq: i64,
    pub kind: LeaveEntryKind,
    /// Relevant only when `kind` is `LeaveTaken`.
    pub leave_type: Option<LeaveType>,
    pub details: Option<String>,
    /// Debit amount for leave-taken entries.
    pub working_days: Decimal,
    pub inclusive_date_start: Option<NaiveDate>,
    pub inclusive_date_end: Option<NaiveDate>,
    pub date_filed: Option<NaiveDate>,
    /// Accrual date for credit-earned entries.
    pub earned_date: Option<NaiveDate>,
    pub commutation: Option<String>,
    /// Credit amounts for credit-earned entries.
    pub earned_vl: Decimal,
    pub earned_sl: Decimal,
    /// Computed by recalculation, never hand-set.
    pub running_vl: Decimal,
    pub running_sl: Decimal,
}

impl LeaveEntry {
    /// Date used for chronological ordering: the earliest of the leave start
    /// date, the earned date, and the filing date.
    pub fn effective_date(&self) -> Option<NaiveDate> {
        [self.inclusive_date_start, self.earned_date, self.date_filed]
            .into_iter()
            .flatten()
            .min()
    }
}

/// CTO ledger entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CtoEntry {
    pub id: Uuid,
    pub employee_id: Uuid,
    /// Insertion sequence assigned by the store; see [`LeaveEntry::seq`].
    pub seq: i64,
    pub kind: CtoEntryKind,
    pub special_order: Option<String>,
    pub activity: Option<String>,
    pub activity_start: Option<NaiveDate>,
    /// Anchors expiration for activities.
    pub activity_end: Option<NaiveDate>,
    pub credits_earned: Decimal,
    pub absence_start: Option<NaiveDate>,
    pub absence_end: Option<NaiveDate>,
    pub days_used_total: Decimal,
    /// Computed by recalculation, never hand-set.
    pub running_balance: Decimal,
}

impl CtoEntry {
    pub fn is_activity(&self) -> bool {
        self.kind == CtoEntryKind::Activity
    }

    /// Activity start for activities, absence start for absences.
    pub fn effective_date(&self) -> Option<NaiveDate> {
        match self.kind {
            CtoEntryKind::Activity => self.activity_start,
            CtoEntryKind::Absence => self.absence_start,
        }
    }

    /// Credits stop being consumable one year after the activity ends.
    pub fn expires_at(&self) -> Option<NaiveDate> {
        self.activity_end
            .and_then(|end| end.checked_add_months(Months::new(12)))
    }

    /// An activity is expired once `date` reaches its expiry date.
    pub fn is_expired_at(&self, date: NaiveDate) -> bool {
        self.expires_at().map_or(false, |expiry| date >= expiry)
    }
}

/// Join entity recording how many days of one absence were supplied by one
/// activity's credits. Unique per (activity, absence) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageLink {
    pub id: Uuid,
    pub activity_id: Uuid,
    pub absence_id: Uuid,
    pub days_used: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn leave_type_parses_case_insensitively() {
        assert_eq!("vl".parse::<LeaveType>().unwrap(), LeaveType::Vl);
        assert_eq!("SOLO_PARENT".parse::<LeaveType>().unwrap(), LeaveType::SoloParent);
        assert_eq!("ra9710".parse::<LeaveType>().unwrap(), LeaveType::Ra9710);
        assert!(matches!(
            "SABBATICAL".parse::<LeaveType>(),
            Err(Error::InvalidLeaveType(_))
        ));
    }

    #[test]
    fn leave_type_round_trips_through_display() {
        for code in [
            "VL", "SL", "SPL", "FL", "SOLO_PARENT", "ML", "PL", "RA9710", "RL", "SEL",
            "STUDY_LEAVE",
        ] {
            let parsed: LeaveType = code.parse().unwrap();
            assert_eq!(parsed.to_string(), code);
        }
    }

    #[test]
    fn effective_date_takes_earliest_known_date() {
        let entry = LeaveEntry {
            id: Uuid::new_v4(),
            employee_id: Uuid::new_v4(),
            seq: 1,
            kind: LeaveEntryKind::LeaveTaken,
            leave_type: Some(LeaveType::Vl),
            details: None,
            working_days: Decimal::from(2),
            inclusive_date_start: Some(date(2024, 3, 4)),
            inclusive_date_end: Some(date(2024, 3, 5)),
            date_filed: Some(date(2024, 2, 26)),
            earned_date: None,
            commutation: None,
            earned_vl: Decimal::ZERO,
            earned_sl: Decimal::ZERO,
            running_vl: Decimal::ZERO,
            running_sl: Decimal::ZERO,
        };
        assert_eq!(entry.effective_date(), Some(date(2024, 2, 26)));
    }

    #[test]
    fn activity_expiry_is_one_year_after_activity_end() {
        let entry = CtoEntry {
            id: Uuid::new_v4(),
            employee_id: Uuid::new_v4(),
            seq: 1,
            kind: CtoEntryKind::Activity,
            special_order: None,
            activity: None,
            activity_start: Some(date(2023, 1, 1)),
            activity_end: Some(date(2023, 1, 5)),
            credits_earned: Decimal::from(5),
            absence_start: None,
            absence_end: None,
            days_used_total: Decimal::ZERO,
            running_balance: Decimal::ZERO,
        };
        assert_eq!(entry.expires_at(), Some(date(2024, 1, 5)));
        assert!(!entry.is_expired_at(date(2024, 1, 4)));
        assert!(entry.is_expired_at(date(2024, 1, 5)));
    }

    #[test]
    fn allowance_deduction_floors_at_zero() {
        let mut allowances = LeaveAllowances {
            spl: Decimal::from(3),
            ..Default::default()
        };
        allowances.deduct(&LeaveType::Spl, Decimal::from(5));
        assert_eq!(allowances.spl, Decimal::ZERO);
        allowances.restore(&LeaveType::Spl, Decimal::from(2));
        assert_eq!(allowances.spl, Decimal::from(2));
        assert_eq!(allowances.get(&LeaveType::Vl), None);
    }
}

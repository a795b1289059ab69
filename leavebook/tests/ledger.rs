//! Tests for ledger recalculation across a full year of entries

use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

use leavebook::cto;
use leavebook::simple;
use leavebook::types::{CtoEntry, CtoEntryKind, LeaveEntry, LeaveEntryKind, LeaveType, UsageLink};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn test_simple_leave_year() {
    let employee_id = Uuid::new_v4();

    // January: five days of vacation leave filed against the forwarded balance
    let vacation = LeaveEntry {
        id: Uuid::new_v4(),
        employee_id,
        seq: 1,
        kind: LeaveEntryKind::LeaveTaken,
        leave_type: Some(LeaveType::Vl),
        details: Some("Family trip".to_string()),
        working_days: Decimal::from(5),
        inclusive_date_start: Some(date(2023, 1, 9)),
        inclusive_date_end: Some(date(2023, 1, 13)),
        date_filed: Some(date(2023, 1, 4)),
        earned_date: None,
        commutation: None,
        earned_vl: Decimal::ZERO,
        earned_sl: Decimal::ZERO,
        running_vl: Decimal::ZERO,
        running_sl: Decimal::ZERO,
    };

    // March: two days of sick leave
    let sick = LeaveEntry {
        id: Uuid::new_v4(),
        employee_id,
        seq: 2,
        kind: LeaveEntryKind::LeaveTaken,
        leave_type: Some(LeaveType::Sl),
        details: None,
        working_days: Decimal::from(2),
        inclusive_date_start: Some(date(2023, 3, 6)),
        inclusive_date_end: Some(date(2023, 3, 7)),
        date_filed: Some(date(2023, 3, 8)),
        earned_date: None,
        commutation: None,
        earned_vl: Decimal::ZERO,
        earned_sl: Decimal::ZERO,
        running_vl: Decimal::ZERO,
        running_sl: Decimal::ZERO,
    };

    // Filed last but earned in February: the monthly credit lands between
    // the two leaves once balances are recomputed
    let credit = LeaveEntry {
        id: Uuid::new_v4(),
        employee_id,
        seq: 3,
        kind: LeaveEntryKind::CreditEarned,
        leave_type: None,
        details: None,
        working_days: Decimal::ZERO,
        inclusive_date_start: None,
        inclusive_date_end: None,
        date_filed: None,
        earned_date: Some(date(2023, 2, 28)),
        commutation: None,
        earned_vl: Decimal::new(125, 2),
        earned_sl: Decimal::new(125, 2),
        running_vl: Decimal::ZERO,
        running_sl: Decimal::ZERO,
    };

    let entries = vec![vacation.clone(), sick.clone(), credit.clone()];
    let balances = simple::recalculate(Decimal::from(15), Decimal::from(10), &entries);

    // Check the chronological order: vacation, credit, sick
    assert_eq!(balances.len(), 3);
    assert_eq!(balances[0].entry_id, vacation.id);
    assert_eq!(balances[1].entry_id, credit.id);
    assert_eq!(balances[2].entry_id, sick.id);

    // Vacation draws the VL balance down to 10
    assert_eq!(balances[0].running_vl, Decimal::from(10));
    assert_eq!(balances[0].running_sl, Decimal::from(10));

    // The February credit raises both balances by 1.25
    assert_eq!(balances[1].running_vl, Decimal::new(1125, 2));
    assert_eq!(balances[1].running_sl, Decimal::new(1125, 2));

    // Sick leave only touches the SL balance
    assert_eq!(balances[2].running_vl, Decimal::new(1125, 2));
    assert_eq!(balances[2].running_sl, Decimal::new(925, 2));

    // A point-in-time query before the credit ignores it
    let as_of = simple::balances_as_of(
        Decimal::from(15),
        Decimal::from(10),
        &entries,
        date(2023, 1, 31),
        None,
    );
    assert_eq!(as_of.vl, Decimal::from(10));
    assert_eq!(as_of.sl, Decimal::from(10));
}

#[test]
fn test_cto_year_with_expiration() {
    let employee_id = Uuid::new_v4();

    // A weekend activity in early 2023 earns 4 credits
    let drill = CtoEntry {
        id: Uuid::new_v4(),
        employee_id,
        seq: 1,
        kind: CtoEntryKind::Activity,
        special_order: Some("SO-2023-011".to_string()),
        activity: Some("Disaster response drill".to_string()),
        activity_start: Some(date(2023, 1, 14)),
        activity_end: Some(date(2023, 1, 15)),
        credits_earned: Decimal::from(4),
        absence_start: None,
        absence_end: None,
        days_used_total: Decimal::ZERO,
        running_balance: Decimal::ZERO,
    };

    // A second activity in June earns 3 more
    let audit = CtoEntry {
        id: Uuid::new_v4(),
        employee_id,
        seq: 2,
        kind: CtoEntryKind::Activity,
        special_order: Some("SO-2023-087".to_string()),
        activity: Some("Inventory audit".to_string()),
        activity_start: Some(date(2023, 6, 10)),
        activity_end: Some(date(2023, 6, 11)),
        credits_earned: Decimal::from(3),
        absence_start: None,
        absence_end: None,
        days_used_total: Decimal::ZERO,
        running_balance: Decimal::ZERO,
    };

    // An August absence takes 5 days, consuming the drill fully and part
    // of the audit
    let offset = CtoEntry {
        id: Uuid::new_v4(),
        employee_id,
        seq: 3,
        kind: CtoEntryKind::Absence,
        special_order: None,
        activity: None,
        activity_start: None,
        activity_end: None,
        credits_earned: Decimal::ZERO,
        absence_start: Some(date(2023, 8, 7)),
        absence_end: Some(date(2023, 8, 11)),
        days_used_total: Decimal::from(5),
        running_balance: Decimal::ZERO,
    };

    let entries = vec![drill.clone(), audit.clone(), offset.clone()];

    // Check eligibility the way a submission would
    let eligible = cto::eligible_credits(&entries, &[], date(2023, 8, 7), None);
    assert_eq!(eligible.len(), 2);
    assert_eq!(eligible[0].activity_id, drill.id);
    assert_eq!(eligible[1].activity_id, audit.id);

    let allocations = cto::allocate(&eligible, Decimal::from(5)).unwrap();
    assert_eq!(allocations.len(), 2);
    assert_eq!(allocations[0].days_used, Decimal::from(4));
    assert_eq!(allocations[1].days_used, Decimal::from(1));

    let links: Vec<UsageLink> = allocations
        .iter()
        .map(|allocation| UsageLink {
            id: Uuid::new_v4(),
            activity_id: allocation.activity_id,
            absence_id: offset.id,
            days_used: allocation.days_used,
        })
        .collect();

    let outcome = cto::recalculate(&entries, &links);
    assert_eq!(outcome.balances[0].running_balance, Decimal::from(4));
    assert_eq!(outcome.balances[1].running_balance, Decimal::from(7));
    assert_eq!(outcome.balances[2].running_balance, Decimal::from(2));
    assert!(outcome.expiries.is_empty());

    // A year later the audit remainder has expired; nothing is left to fund
    // a new absence
    let next_summer = cto::eligible_credits(&entries, &links, date(2024, 6, 11), None);
    assert!(next_summer.is_empty());
    assert!(cto::allocate(&next_summer, Decimal::from(1)).is_err());

    // Replaying the ledger with a post-expiry absence forfeits the remainder
    let late = CtoEntry {
        id: Uuid::new_v4(),
        employee_id,
        seq: 4,
        kind: CtoEntryKind::Absence,
        special_order: None,
        activity: None,
        activity_start: None,
        activity_end: None,
        credits_earned: Decimal::ZERO,
        absence_start: Some(date(2024, 7, 1)),
        absence_end: Some(date(2024, 7, 1)),
        days_used_total: Decimal::from(1),
        running_balance: Decimal::ZERO,
    };
    let mut with_late = entries.clone();
    with_late.push(late);

    let outcome = cto::recalculate(&with_late, &links);
    assert_eq!(outcome.expiries.len(), 1);
    assert_eq!(outcome.expiries[0].activity_id, audit.id);
    assert_eq!(outcome.expiries[0].forfeited, Decimal::from(2));
}

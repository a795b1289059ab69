//! CTO ledger recalculation: FIFO credit consumption with expiration
//!
//! Activities earn credits that stay consumable for one year past the
//! activity's end date. Absences consume the oldest eligible credits first,
//! with usage links recording which activity funded which absence. The
//! recalculation walk replays the full entry list in chronological order,
//! carrying an active pool of unconsumed, unexpired credits: expired
//! remainders fall out of the balance at the point of expiration, never
//! retroactively.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::{CtoEntry, CtoEntryKind, UsageLink};

/// Recomputed running balance for one entry, rounded to 2 decimal places.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CtoBalance {
    pub entry_id: Uuid,
    pub running_balance: Decimal,
}

/// Pooled credit removed by the expiry sweep during a walk. `forfeited` is
/// the unconsumed remainder subtracted from the running balance; zero when
/// the activity was already fully consumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiredCredit {
    pub activity_id: Uuid,
    pub forfeited: Decimal,
    pub expired_at: NaiveDate,
}

/// Usage link whose activity was no longer in the active pool when its
/// absence was replayed. Skipped with a warning, not a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaleLink {
    pub link_id: Uuid,
    pub absence_id: Uuid,
    pub activity_id: Uuid,
    pub days_used: Decimal,
}

/// Outcome of a full recalculation walk.
#[derive(Debug, Clone)]
pub struct Recalculation {
    /// One balance per entry, in walk order.
    pub balances: Vec<CtoBalance>,
    pub expiries: Vec<ExpiredCredit>,
    pub stale_links: Vec<StaleLink>,
}

/// Remaining credit from one non-expired activity, listed in FIFO order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EligibleCredit {
    pub activity_id: Uuid,
    pub remaining: Decimal,
}

/// One FIFO allocation of absence days to an activity's credits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub activity_id: Uuid,
    pub days_used: Decimal,
}

struct PooledCredit {
    remaining: Decimal,
    expires_at: Option<NaiveDate>,
}

/// Recompute the running balance for every entry.
///
/// Entries are walked in chronological order: effective date ascending,
/// activities before absences on the same date, remaining ties by insertion
/// sequence. Before each entry is applied, pooled credits whose expiry date
/// has been reached are swept out and their remainders deducted.
pub fn recalculate(entries: &[CtoEntry], links: &[UsageLink]) -> Recalculation {
    let mut ordered: Vec<&CtoEntry> = entries.iter().collect();
    ordered.sort_by_key(|e| (e.effective_date(), !e.is_activity(), e.seq));

    let mut links_by_absence: HashMap<Uuid, Vec<&UsageLink>> = HashMap::new();
    for link in links {
        links_by_absence.entry(link.absence_id).or_default().push(link);
    }

    let mut pool: BTreeMap<Uuid, PooledCredit> = BTreeMap::new();
    let mut running = Decimal::ZERO;
    let mut balances = Vec::with_capacity(ordered.len());
    let mut expiries = Vec::new();
    let mut stale_links = Vec::new();

    for entry in ordered {
        let date = entry.effective_date();

        // Sweep credits whose expiry date has been reached. Removal happens
        // even when nothing remains to forfeit.
        if let Some(date) = date {
            let expired: Vec<Uuid> = pool
                .iter()
                .filter(|(_, credit)| credit.expires_at.map_or(false, |expiry| date >= expiry))
                .map(|(id, _)| *id)
                .collect();
            for id in expired {
                if let Some(credit) = pool.remove(&id) {
                    if credit.remaining > Decimal::ZERO {
                        running -= credit.remaining;
                    }
                    if let Some(expired_at) = credit.expires_at {
                        expiries.push(ExpiredCredit {
                            activity_id: id,
                            forfeited: credit.remaining.max(Decimal::ZERO),
                            expired_at,
                        });
                    }
                }
            }
        }

        match entry.kind {
            CtoEntryKind::Activity => {
                running += entry.credits_earned;
                let born_expired = date.map_or(false, |d| entry.is_expired_at(d));
                if !born_expired {
                    pool.insert(
                        entry.id,
                        PooledCredit {
                            remaining: entry.credits_earned,
                            expires_at: entry.expires_at(),
                        },
                    );
                }
            }
            CtoEntryKind::Absence => {
                running -= entry.days_used_total;
                for link in links_by_absence.get(&entry.id).into_iter().flatten() {
                    match pool.get_mut(&link.activity_id) {
                        Some(credit) => {
                            credit.remaining -= link.days_used;
                            if credit.remaining <= Decimal::ZERO {
                                pool.remove(&link.activity_id);
                            }
                        }
                        None => stale_links.push(StaleLink {
                            link_id: link.id,
                            absence_id: entry.id,
                            activity_id: link.activity_id,
                            days_used: link.days_used,
                        }),
                    }
                }
            }
        }

        balances.push(CtoBalance {
            entry_id: entry.id,
            running_balance: running.round_dp(2),
        });
    }

    Recalculation {
        balances,
        expiries,
        stale_links,
    }
}

/// Remaining credit per activity not yet expired as of `as_of`, in FIFO
/// order (oldest effective date first). Fully consumed activities are listed
/// with zero remaining; allocation skips them. `exclude_absence` drops that
/// absence's links from the consumption totals, so an absence under edit
/// does not count against itself.
pub fn eligible_credits(
    entries: &[CtoEntry],
    links: &[UsageLink],
    as_of: NaiveDate,
    exclude_absence: Option<Uuid>,
) -> Vec<EligibleCredit> {
    let mut consumed: HashMap<Uuid, Decimal> = HashMap::new();
    for link in links.iter().filter(|l| exclude_absence != Some(l.absence_id)) {
        *consumed.entry(link.activity_id).or_insert(Decimal::ZERO) += link.days_used;
    }

    let mut activities: Vec<&CtoEntry> = entries
        .iter()
        .filter(|e| e.is_activity() && !e.is_expired_at(as_of))
        .collect();
    activities.sort_by_key(|e| (e.effective_date(), e.seq));

    activities
        .into_iter()
        .map(|activity| {
            let used = consumed.get(&activity.id).copied().unwrap_or(Decimal::ZERO);
            EligibleCredit {
                activity_id: activity.id,
                remaining: activity.credits_earned - used,
            }
        })
        .collect()
}

/// Total credit available for new absences as of `as_of`.
pub fn eligible_total(entries: &[CtoEntry], links: &[UsageLink], as_of: NaiveDate) -> Decimal {
    eligible_credits(entries, links, as_of, None)
        .iter()
        .map(|credit| credit.remaining)
        .sum()
}

/// Split `days_needed` across eligible credits, consuming the oldest first.
/// Fails without partial effect when the eligible total falls short.
pub fn allocate(eligible: &[EligibleCredit], days_needed: Decimal) -> Result<Vec<Allocation>> {
    let total: Decimal = eligible.iter().map(|credit| credit.remaining).sum();
    if total < days_needed {
        return Err(Error::InsufficientEligibleBalance {
            eligible: total,
            requested: days_needed,
        });
    }

    let mut allocations = Vec::new();
    let mut remaining_days = days_needed;
    for credit in eligible {
        if remaining_days <= Decimal::ZERO {
            break;
        }
        let days = remaining_days.min(credit.remaining);
        if days > Decimal::ZERO {
            allocations.push(Allocation {
                activity_id: credit.activity_id,
                days_used: days,
            });
            remaining_days -= days;
        }
    }

    Ok(allocations)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn activity(seq: i64, start: NaiveDate, end: NaiveDate, credits: Decimal) -> CtoEntry {
        CtoEntry {
            id: Uuid::new_v4(),
            employee_id: Uuid::new_v4(),
            seq,
            kind: CtoEntryKind::Activity,
            special_order: None,
            activity: None,
            activity_start: Some(start),
            activity_end: Some(end),
            credits_earned: credits,
            absence_start: None,
            absence_end: None,
            days_used_total: Decimal::ZERO,
            running_balance: Decimal::ZERO,
        }
    }

    fn absence(seq: i64, start: NaiveDate, days: Decimal) -> CtoEntry {
        CtoEntry {
            id: Uuid::new_v4(),
            employee_id: Uuid::new_v4(),
            seq,
            kind: CtoEntryKind::Absence,
            special_order: None,
            activity: None,
            activity_start: None,
            activity_end: None,
            credits_earned: Decimal::ZERO,
            absence_start: Some(start),
            absence_end: Some(start),
            days_used_total: days,
            running_balance: Decimal::ZERO,
        }
    }

    fn link(activity: &CtoEntry, absence: &CtoEntry, days: Decimal) -> UsageLink {
        UsageLink {
            id: Uuid::new_v4(),
            activity_id: activity.id,
            absence_id: absence.id,
            days_used: days,
        }
    }

    #[test]
    fn activity_then_absence_walk() {
        let act = activity(1, date(2023, 1, 1), date(2023, 1, 5), Decimal::from(5));
        let abs = absence(2, date(2023, 6, 1), Decimal::from(3));
        let links = vec![link(&act, &abs, Decimal::from(3))];

        let outcome = recalculate(&[act.clone(), abs.clone()], &links);

        assert_eq!(outcome.balances.len(), 2);
        assert_eq!(outcome.balances[0].entry_id, act.id);
        assert_eq!(outcome.balances[0].running_balance, Decimal::from(5));
        assert_eq!(outcome.balances[1].entry_id, abs.id);
        assert_eq!(outcome.balances[1].running_balance, Decimal::from(2));
        assert!(outcome.expiries.is_empty());
        assert!(outcome.stale_links.is_empty());
    }

    #[test]
    fn unconsumed_remainder_expires_at_the_point_of_expiration() {
        let act = activity(1, date(2023, 1, 1), date(2023, 1, 5), Decimal::from(5));
        let early = absence(2, date(2023, 6, 1), Decimal::from(3));
        let late = absence(3, date(2024, 6, 1), Decimal::from(1));
        let links = vec![link(&act, &early, Decimal::from(3))];

        let outcome = recalculate(&[act.clone(), early.clone(), late.clone()], &links);

        // 5 earned, 3 consumed, remaining 2 forfeited when the late absence
        // is processed past the 2024-01-05 expiry, then 1 more debited.
        assert_eq!(outcome.balances[0].running_balance, Decimal::from(5));
        assert_eq!(outcome.balances[1].running_balance, Decimal::from(2));
        assert_eq!(outcome.balances[2].running_balance, Decimal::from(-1));

        assert_eq!(outcome.expiries.len(), 1);
        assert_eq!(outcome.expiries[0].activity_id, act.id);
        assert_eq!(outcome.expiries[0].forfeited, Decimal::from(2));
        assert_eq!(outcome.expiries[0].expired_at, date(2024, 1, 5));
    }

    #[test]
    fn same_date_activity_is_applied_before_absence() {
        let day = date(2023, 5, 8);
        // The absence was inserted first; the activity on the same date must
        // still be applied ahead of it.
        let abs = absence(1, day, Decimal::from(2));
        let act = activity(2, day, day, Decimal::from(2));

        let outcome = recalculate(&[abs.clone(), act.clone()], &[link(&act, &abs, Decimal::from(2))]);

        assert_eq!(outcome.balances[0].entry_id, act.id);
        assert_eq!(outcome.balances[0].running_balance, Decimal::from(2));
        assert_eq!(outcome.balances[1].entry_id, abs.id);
        assert_eq!(outcome.balances[1].running_balance, Decimal::ZERO);
        assert!(outcome.stale_links.is_empty());
    }

    #[test]
    fn stale_link_is_reported_and_skipped() {
        let act = activity(1, date(2022, 1, 10), date(2022, 1, 12), Decimal::from(4));
        let abs = absence(2, date(2023, 6, 1), Decimal::from(2));
        // The activity expired 2023-01-12, so its pool entry is gone by the
        // time the absence replays this link.
        let stale = link(&act, &abs, Decimal::from(2));

        let outcome = recalculate(&[act.clone(), abs.clone()], &[stale.clone()]);

        assert_eq!(outcome.stale_links.len(), 1);
        assert_eq!(outcome.stale_links[0].link_id, stale.id);
        assert_eq!(outcome.stale_links[0].activity_id, act.id);
        // The debit still lands even though the link could not be replayed.
        assert_eq!(outcome.balances[1].running_balance, Decimal::from(-2));
    }

    #[test]
    fn absence_without_links_still_debits_the_balance() {
        let act = activity(1, date(2023, 2, 1), date(2023, 2, 3), Decimal::from(3));
        let abs = absence(2, date(2023, 3, 1), Decimal::from(1));

        let outcome = recalculate(&[act, abs.clone()], &[]);

        assert_eq!(outcome.balances[1].entry_id, abs.id);
        assert_eq!(outcome.balances[1].running_balance, Decimal::from(2));
    }

    #[test]
    fn persisted_balances_are_rounded_to_two_places() {
        let act = activity(1, date(2023, 1, 1), date(2023, 1, 1), Decimal::new(3333, 3));
        let outcome = recalculate(&[act], &[]);
        assert_eq!(outcome.balances[0].running_balance, Decimal::new(333, 2));
    }

    #[test]
    fn recalculation_is_idempotent() {
        let act_a = activity(1, date(2023, 1, 1), date(2023, 1, 5), Decimal::from(3));
        let act_b = activity(2, date(2023, 3, 1), date(2023, 3, 2), Decimal::from(3));
        let abs = absence(3, date(2023, 4, 1), Decimal::from(4));
        let links = vec![
            link(&act_a, &abs, Decimal::from(3)),
            link(&act_b, &abs, Decimal::from(1)),
        ];
        let entries = vec![act_a, act_b, abs];

        let first = recalculate(&entries, &links);
        let second = recalculate(&entries, &links);
        assert_eq!(first.balances, second.balances);
        assert_eq!(first.expiries, second.expiries);
        assert_eq!(first.stale_links, second.stale_links);
    }

    #[test]
    fn allocation_consumes_oldest_credits_first() {
        let act_a = activity(1, date(2023, 1, 1), date(2023, 1, 2), Decimal::from(3));
        let act_b = activity(2, date(2023, 3, 1), date(2023, 3, 2), Decimal::from(3));
        let entries = vec![act_b.clone(), act_a.clone()];

        let eligible = eligible_credits(&entries, &[], date(2023, 4, 1), None);
        assert_eq!(eligible[0].activity_id, act_a.id);
        assert_eq!(eligible[1].activity_id, act_b.id);

        let allocations = allocate(&eligible, Decimal::from(4)).unwrap();
        assert_eq!(allocations.len(), 2);
        assert_eq!(allocations[0].activity_id, act_a.id);
        assert_eq!(allocations[0].days_used, Decimal::from(3));
        assert_eq!(allocations[1].activity_id, act_b.id);
        assert_eq!(allocations[1].days_used, Decimal::from(1));

        // Conservation: no allocation exceeds what its activity had left.
        for (allocation, credit) in allocations.iter().zip(eligible.iter()) {
            assert!(allocation.days_used <= credit.remaining);
        }
    }

    #[test]
    fn expired_credits_are_not_eligible() {
        let act = activity(1, date(2023, 1, 1), date(2023, 1, 5), Decimal::from(5));
        let entries = vec![act.clone()];

        let before = eligible_credits(&entries, &[], date(2024, 1, 4), None);
        assert_eq!(before.len(), 1);
        assert_eq!(before[0].remaining, Decimal::from(5));

        // Expiry uses a >= comparison, so the expiry date itself is out.
        let on_expiry = eligible_credits(&entries, &[], date(2024, 1, 5), None);
        assert!(on_expiry.is_empty());

        let err = allocate(&on_expiry, Decimal::from(1)).unwrap_err();
        assert!(matches!(
            err,
            Error::InsufficientEligibleBalance { eligible, requested }
                if eligible == Decimal::ZERO && requested == Decimal::from(1)
        ));
    }

    #[test]
    fn consumed_credits_reduce_eligibility_unless_excluded() {
        let act = activity(1, date(2023, 1, 1), date(2023, 1, 2), Decimal::from(5));
        let abs = absence(2, date(2023, 2, 1), Decimal::from(5));
        let links = vec![link(&act, &abs, Decimal::from(5))];
        let entries = vec![act.clone(), abs.clone()];

        let consumed = eligible_credits(&entries, &links, date(2023, 3, 1), None);
        assert_eq!(consumed[0].remaining, Decimal::ZERO);
        assert_eq!(eligible_total(&entries, &links, date(2023, 3, 1)), Decimal::ZERO);

        // Editing the absence: its own links must not count against it.
        let excluding = eligible_credits(&entries, &links, date(2023, 3, 1), Some(abs.id));
        assert_eq!(excluding[0].remaining, Decimal::from(5));
    }

    #[test]
    fn allocation_shortfall_reports_totals() {
        let act = activity(1, date(2023, 1, 1), date(2023, 1, 2), Decimal::from(2));
        let eligible = eligible_credits(&[act], &[], date(2023, 2, 1), None);

        let err = allocate(&eligible, Decimal::from(3)).unwrap_err();
        assert!(matches!(
            err,
            Error::InsufficientEligibleBalance { eligible, requested }
                if eligible == Decimal::from(2) && requested == Decimal::from(3)
        ));
    }
}

//! Activation bookkeeping for recurring items.
//!
//! Each cycle type owns two queues backed by `VecDeque`:
//!
//! - **active**: items currently contributing, sorted by expiry descending (a missing
//!   expiry sorts as +infinity, so never-expiring items sit at the front);
//! - **pending**: items waiting for their start cycle, sorted by start cycle descending.
//!
//! Both queues are consumed from the back, so the soonest expiry or start is always
//! examined first. Matching is exact: an item fires only when the advanced cycle index
//! equals its expiry or start cycle.

use std::collections::{HashSet, VecDeque};

use tracing::debug;

use super::breakdown::Breakdown;
use super::error::SimulationError;
use super::types::{CycleType, RecurringItem};

#[derive(Debug, Clone, Default)]
struct CycleQueues {
    active: VecDeque<RecurringItem>,
    pending: VecDeque<RecurringItem>,
}

impl CycleQueues {
    fn sort(&mut self) {
        self.active
            .make_contiguous()
            .sort_by(|a, b| b.expiry_rank().cmp(&a.expiry_rank()));
        self.pending
            .make_contiguous()
            .sort_by(|a, b| b.start_rank().cmp(&a.start_rank()));
    }

    fn insert_active(&mut self, item: RecurringItem) {
        let rank = item.expiry_rank();
        let idx = self.active.partition_point(|queued| queued.expiry_rank() > rank);
        self.active.insert(idx, item);
    }
}

/// Breakdown changes produced by crossing one cycle boundary.
#[derive(Debug, Clone, Default)]
pub struct CycleDelta {
    pub removed: Breakdown,
    pub activated: Breakdown,
    /// Items that left the pending queue and must be handed back via
    /// [`Schedule::reinstate`].
    pub newly_active: Vec<RecurringItem>,
}

impl CycleDelta {
    pub fn net(&self) -> Breakdown {
        self.activated - self.removed
    }

    pub fn is_empty(&self) -> bool {
        self.removed.is_zero() && self.activated.is_zero() && self.newly_active.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Schedule {
    monthly: CycleQueues,
    yearly: CycleQueues,
}

impl Schedule {
    /// Splits a collection into the four queues. Items without a start cycle are active
    /// immediately; items with one wait in the pending queue of their cycle type.
    pub fn partition(items: Vec<RecurringItem>) -> Result<Self, SimulationError> {
        let mut seen = HashSet::with_capacity(items.len());
        for item in &items {
            item.validate()?;
            if !seen.insert(item.id.as_str()) {
                return Err(SimulationError::DuplicateIdentifier(item.id.clone()));
            }
        }

        let mut schedule = Schedule::default();
        for item in items {
            let queues = schedule.queues_mut(item.cycle);
            if item.start_cycle.is_some() {
                queues.pending.push_back(item);
            } else {
                queues.active.push_back(item);
            }
        }
        schedule.monthly.sort();
        schedule.yearly.sort();

        Ok(schedule)
    }

    pub fn active(&self, which: CycleType) -> impl Iterator<Item = &RecurringItem> + '_ {
        self.queues(which).active.iter()
    }

    pub fn pending(&self, which: CycleType) -> impl Iterator<Item = &RecurringItem> + '_ {
        self.queues(which).pending.iter()
    }

    pub fn active_breakdown(&self, which: CycleType) -> Breakdown {
        Breakdown::from_items(self.active(which))
    }

    pub fn len(&self) -> usize {
        self.monthly.active.len()
            + self.monthly.pending.len()
            + self.yearly.active.len()
            + self.yearly.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Crosses the boundary into `cycle` for one cycle type: expires active items whose
    /// expiry equals `cycle`, then releases pending items whose start cycle equals it.
    ///
    /// Released items are removed from the pending queue only; the caller puts them
    /// back with [`Schedule::reinstate`] and applies `delta.net()` to its running
    /// breakdown. A released item whose expiry is also `cycle` never contributes and is
    /// dropped.
    pub fn advance(&mut self, cycle: u32, which: CycleType) -> CycleDelta {
        let at = u64::from(cycle);
        let queues = self.queues_mut(which);
        let mut delta = CycleDelta::default();

        while queues.active.back().is_some_and(|item| item.expiry_rank() == at) {
            if let Some(item) = queues.active.pop_back() {
                debug!(id = %item.id, cycle, ?which, "recurring item expired");
                delta.removed.add_item(&item);
            }
        }

        while queues.pending.back().is_some_and(|item| item.start_rank() == at) {
            let Some(item) = queues.pending.pop_back() else {
                break;
            };
            if item.expiry_rank() <= at {
                debug!(id = %item.id, cycle, ?which, "recurring item expires on activation");
                continue;
            }
            debug!(id = %item.id, cycle, ?which, "recurring item activated");
            delta.activated.add_item(&item);
            delta.newly_active.push(item);
        }

        delta
    }

    pub fn reinstate(&mut self, which: CycleType, items: Vec<RecurringItem>) {
        let queues = self.queues_mut(which);
        for item in items {
            queues.insert_active(item);
        }
    }

    fn queues(&self, which: CycleType) -> &CycleQueues {
        match which {
            CycleType::Monthly => &self.monthly,
            CycleType::Yearly => &self.yearly,
        }
    }

    fn queues_mut(&mut self, which: CycleType) -> &mut CycleQueues {
        match which {
            CycleType::Monthly => &mut self.monthly,
            CycleType::Yearly => &mut self.yearly,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{BalanceKind, FrequencyUnit};
    use proptest::prelude::{any, prop_assert, prop_assert_eq, proptest};
    use proptest::option;

    fn item(id: &str, cycle: CycleType, expiry: Option<u32>, start: Option<u32>) -> RecurringItem {
        RecurringItem {
            id: id.to_string(),
            name: id.to_string(),
            value: 10.0,
            frequency: 1.0,
            frequency_unit: match cycle {
                CycleType::Monthly => FrequencyUnit::PerMonth,
                CycleType::Yearly => FrequencyUnit::PerYear,
            },
            cycle,
            expiry,
            start_cycle: start,
            kind: BalanceKind::Expense,
        }
    }

    fn ids<'a>(items: impl Iterator<Item = &'a RecurringItem>) -> Vec<String> {
        items.map(|item| item.id.clone()).collect()
    }

    #[test]
    fn partition_sorts_active_by_expiry_descending() {
        let schedule = Schedule::partition(vec![
            item("soon", CycleType::Monthly, Some(2), None),
            item("never", CycleType::Monthly, None, None),
            item("later", CycleType::Monthly, Some(9), None),
        ])
        .expect("valid items");

        assert_eq!(
            ids(schedule.active(CycleType::Monthly)),
            vec!["never", "later", "soon"]
        );
    }

    #[test]
    fn partition_sorts_pending_by_start_descending() {
        let schedule = Schedule::partition(vec![
            item("b", CycleType::Yearly, None, Some(1)),
            item("c", CycleType::Yearly, None, Some(4)),
            item("a", CycleType::Yearly, None, Some(0)),
        ])
        .expect("valid items");

        assert_eq!(ids(schedule.pending(CycleType::Yearly)), vec!["c", "b", "a"]);
        assert_eq!(schedule.active(CycleType::Yearly).count(), 0);
    }

    #[test]
    fn partition_rejects_duplicate_ids() {
        let err = Schedule::partition(vec![
            item("dup", CycleType::Monthly, None, None),
            item("dup", CycleType::Yearly, None, None),
        ])
        .expect_err("duplicates must be rejected");
        assert_eq!(err, SimulationError::DuplicateIdentifier("dup".to_string()));
    }

    #[test]
    fn partition_rejects_invalid_items() {
        let mut bad = item("bad", CycleType::Monthly, None, None);
        bad.frequency = -1.0;
        let err = Schedule::partition(vec![bad]).expect_err("invalid item must be rejected");
        assert!(matches!(err, SimulationError::InvalidItem { .. }));
    }

    #[test]
    fn advance_expires_only_exact_matches() {
        let mut schedule = Schedule::partition(vec![
            item("two", CycleType::Monthly, Some(2), None),
            item("two-b", CycleType::Monthly, Some(2), None),
            item("three", CycleType::Monthly, Some(3), None),
        ])
        .expect("valid items");

        assert!(schedule.advance(1, CycleType::Monthly).is_empty());

        let delta = schedule.advance(2, CycleType::Monthly);
        assert_eq!(delta.removed.debit, -20.0);
        assert!(delta.newly_active.is_empty());
        assert_eq!(ids(schedule.active(CycleType::Monthly)), vec!["three"]);
    }

    #[test]
    fn advance_releases_pending_and_reinstate_orders_by_expiry() {
        let mut schedule = Schedule::partition(vec![
            item("forever", CycleType::Monthly, None, None),
            item("short", CycleType::Monthly, Some(3), None),
            item("starts", CycleType::Monthly, Some(6), Some(1)),
        ])
        .expect("valid items");

        let delta = schedule.advance(1, CycleType::Monthly);
        assert_eq!(delta.activated.debit, -10.0);
        assert!(delta.removed.is_zero());
        assert_eq!(delta.net().debit, -10.0);
        assert_eq!(ids(delta.newly_active.iter()), vec!["starts"]);
        assert_eq!(schedule.pending(CycleType::Monthly).count(), 0);

        schedule.reinstate(CycleType::Monthly, delta.newly_active);
        assert_eq!(
            ids(schedule.active(CycleType::Monthly)),
            vec!["forever", "starts", "short"]
        );

        let expired = schedule.advance(3, CycleType::Monthly);
        assert_eq!(expired.removed.debit, -10.0);
        let expired = schedule.advance(6, CycleType::Monthly);
        assert_eq!(expired.removed.debit, -10.0);
        assert_eq!(ids(schedule.active(CycleType::Monthly)), vec!["forever"]);
    }

    #[test]
    fn advance_drops_items_expiring_on_their_start_cycle() {
        let mut schedule =
            Schedule::partition(vec![item("blip", CycleType::Monthly, Some(4), Some(4))])
                .expect("valid items");

        let delta = schedule.advance(4, CycleType::Monthly);
        assert!(delta.is_empty());
        assert!(schedule.is_empty());
    }

    #[test]
    fn advance_touches_only_the_requested_cycle_type() {
        let mut schedule = Schedule::partition(vec![
            item("m", CycleType::Monthly, Some(1), None),
            item("y", CycleType::Yearly, Some(1), None),
        ])
        .expect("valid items");

        let delta = schedule.advance(1, CycleType::Yearly);
        assert_eq!(delta.removed.debit, -10.0);
        assert!(delta.activated.is_zero());
        assert_eq!(ids(schedule.active(CycleType::Monthly)), vec!["m"]);
        assert_eq!(schedule.active(CycleType::Yearly).count(), 0);
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(48))]

        #[test]
        fn prop_partition_is_exhaustive_and_disjoint(
            specs in proptest::collection::vec(
                (any::<bool>(), option::of(0u32..50), option::of(0u32..50)),
                0..40,
            )
        ) {
            let items: Vec<RecurringItem> = specs
                .iter()
                .enumerate()
                .map(|(idx, (yearly, expiry, start))| {
                    let cycle = if *yearly { CycleType::Yearly } else { CycleType::Monthly };
                    let expiry = match (expiry, start) {
                        (Some(e), Some(s)) => Some((*e).max(*s)),
                        (e, _) => *e,
                    };
                    item(&format!("item-{idx}"), cycle, expiry, *start)
                })
                .collect();

            let schedule = Schedule::partition(items.clone()).expect("generated items are valid");
            prop_assert_eq!(schedule.len(), items.len());

            let mut placed: Vec<String> = Vec::new();
            for which in [CycleType::Monthly, CycleType::Yearly] {
                for active in schedule.active(which) {
                    prop_assert!(active.start_cycle.is_none());
                    prop_assert_eq!(active.cycle, which);
                    placed.push(active.id.clone());
                }
                for pending in schedule.pending(which) {
                    prop_assert!(pending.start_cycle.is_some());
                    prop_assert_eq!(pending.cycle, which);
                    placed.push(pending.id.clone());
                }
            }
            placed.sort();
            let mut expected: Vec<String> = items.iter().map(|i| i.id.clone()).collect();
            expected.sort();
            prop_assert_eq!(placed, expected);
        }

        #[test]
        fn prop_advance_without_matches_is_a_no_op(
            expiries in proptest::collection::vec(10u32..40, 0..12),
            starts in proptest::collection::vec(10u32..40, 0..12),
            cycle in 0u32..10,
        ) {
            let mut items = Vec::new();
            for (idx, expiry) in expiries.iter().enumerate() {
                items.push(item(&format!("a-{idx}"), CycleType::Monthly, Some(*expiry), None));
            }
            for (idx, start) in starts.iter().enumerate() {
                items.push(item(&format!("p-{idx}"), CycleType::Monthly, None, Some(*start)));
            }
            let mut schedule = Schedule::partition(items).expect("valid items");
            let before = schedule.len();

            let delta = schedule.advance(cycle, CycleType::Monthly);
            prop_assert!(delta.is_empty());
            prop_assert!(delta.net().is_zero());
            prop_assert_eq!(schedule.len(), before);
        }
    }
}

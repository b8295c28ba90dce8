mod breakdown;
mod engine;
mod error;
mod schedule;
mod types;

pub use breakdown::Breakdown;
pub use engine::{Simulation, simulate};
pub use error::SimulationError;
pub use schedule::{CycleDelta, Schedule};
pub use types::{
    BalanceKind, CycleType, DEFAULT_MAX_CYCLES, FrequencyUnit, RateConfig, RecurringItem,
    SimulationInputs, Snapshot,
};

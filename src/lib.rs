//! Recurring cash-flow tracking and month-by-month debt payoff simulation.

pub mod api;
pub mod cli;
pub mod core;
pub mod store;
pub mod telemetry;

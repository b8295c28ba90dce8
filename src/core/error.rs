use thiserror::Error;

use super::types::Snapshot;

#[derive(Debug, Error, PartialEq)]
pub enum SimulationError {
    #[error("invalid recurring item `{id}`: {reason}")]
    InvalidItem { id: String, reason: String },

    #[error("duplicate recurring item id `{0}`")]
    DuplicateIdentifier(String),

    /// The debt was still shrinking after `max_cycles` cycles. `partial` holds every
    /// snapshot produced before the run was aborted.
    #[error("simulation did not settle within {max_cycles} cycles")]
    NonConvergent {
        max_cycles: u32,
        partial: Vec<Snapshot>,
    },
}

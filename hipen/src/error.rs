use std::io;

use crate::net::{PlaceBuilderError, TransitionBuilderError};

#[derive(thiserror::Error, Debug)]
pub enum PetriError {
    #[error("Filesystem error: {0}")]
    IOError(#[from] io::Error),
    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
    #[error("Place definition error: {0}")]
    PlaceConfigError(#[from] PlaceBuilderError),
    #[error("Transition definition error: {0}")]
    TransitionConfigError(#[from] TransitionBuilderError),
    #[error("Component not found: '{0}'")]
    NotFound(String),
    #[error("Duplicate component id: '{0}'")]
    DuplicateId(String),
    #[error("Capacity of place '{place}' exceeded: {count} > {capacity}")]
    CapacityExceeded { place: String, count: u64, capacity: u64 },
    #[error("Expression cannot be evaluated: {0}")]
    EvaluationError(String),
    #[error("Inappropriate value: {0}")]
    ValueError(String),
    #[error("State is inconsistent: {0}")]
    InconsistentState(String),
}

pub type Result<T> = std::result::Result<T, PetriError>;

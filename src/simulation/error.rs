use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use thiserror::Error;

use crate::simulation::population::plan::ElementKind;

/// A structural plan operation would break alternation or empty the plan.
/// This points at a programming or configuration error and is never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructuralError {
    #[error("index {index} is out of bounds for a plan with {len} elements")]
    IndexOutOfBounds { index: usize, len: usize },
    #[error("operation at index {index} would place two {kind} elements next to each other")]
    AdjacentSameKind { index: usize, kind: ElementKind },
    #[error("cannot remove the activity at index {index}, it is the only one left")]
    LastActivity { index: usize },
    #[error("element at index {index} is a {found}, expected a {expected}")]
    KindMismatch {
        index: usize,
        expected: ElementKind,
        found: ElementKind,
    },
    #[error("a plan has to begin and end with an activity")]
    BoundaryNotActivity,
}

/// The plan invariants checked by the validator, in the order they are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Invariant {
    Alternation,
    Contiguity,
    DaySpan,
    PositiveDuration,
    NonEmpty,
}

impl Display for Invariant {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Invariant::Alternation => "alternation",
            Invariant::Contiguity => "contiguity",
            Invariant::PositiveDuration => "positive duration",
            Invariant::DaySpan => "day span",
            Invariant::NonEmpty => "non-empty",
        };
        f.write_str(name)
    }
}

/// A mutated plan failed validation. The mutation is discarded and the person keeps the
/// original plan.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("plan violates the {invariant} invariant at element {index}: {detail}")]
pub struct InvalidPlanError {
    pub invariant: Invariant,
    pub index: usize,
    pub detail: String,
}

impl InvalidPlanError {
    pub fn new(invariant: Invariant, index: usize, detail: impl Into<String>) -> Self {
        InvalidPlanError {
            invariant,
            index,
            detail: detail.into(),
        }
    }
}

/// Malformed configuration. Raised before any person is processed.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("policy '{policy}' has probability {probability}, expected a value in [0, 1]")]
    ProbabilityOutOfRange { policy: String, probability: f64 },
    #[error("policy '{policy}' references unknown purpose '{purpose}'")]
    UnknownPurpose { policy: String, purpose: String },
    #[error("policy '{policy}' resizes by zero seconds")]
    ZeroResize { policy: String },
    #[error("every policy needs a non-empty name")]
    EmptyPolicyName,
    #[error("day length has to be positive and the day has to end within u32 seconds")]
    InvalidDayLength,
    #[error("no population file configured, set input.population")]
    MissingPopulation,
    #[error("failed to access config file {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config at {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_path_to_error::Error<serde_yaml::Error>,
    },
    #[error("failed to write config to {path:?}")]
    Write {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid override {key}={value}: {reason}")]
    InvalidOverride {
        key: String,
        value: String,
        reason: String,
    },
}

/// Failure of a single `apply` call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MutationError {
    #[error(transparent)]
    Structural(#[from] StructuralError),
    #[error(transparent)]
    Invalid(#[from] InvalidPlanError),
}

#[derive(Debug, Error)]
pub enum PamError {
    #[error(transparent)]
    Structural(#[from] StructuralError),
    #[error(transparent)]
    InvalidPlan(#[from] InvalidPlanError),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error("worker thread panicked while processing persons")]
    WorkerPanicked,
    #[error("failed to spawn worker thread")]
    Spawn(#[source] std::io::Error),
    #[error("failed to access {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read or write json at {path:?}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl From<MutationError> for PamError {
    fn from(value: MutationError) -> Self {
        match value {
            MutationError::Structural(e) => PamError::Structural(e),
            MutationError::Invalid(e) => PamError::InvalidPlan(e),
        }
    }
}

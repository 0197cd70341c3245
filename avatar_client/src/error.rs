//! Controller error type.

use std::fmt;

use crate::anim::LocomotionState;

/// Failures surfaced by a controller tick.
///
/// Both variants are returned only after pose reconciliation has run, so the
/// model/body invariant holds even on an erroring tick.
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerError {
    /// The clip table has no clip for `state`. `key` is the lookup key that
    /// missed: the state name for a direct table, the rig clip name (or the
    /// state name, if the name table itself lacks it) for an indirected one.
    ClipNotFound { state: LocomotionState, key: String },
    /// Tick delta was negative or not finite; integration was skipped.
    InvalidDelta(f32),
}

impl fmt::Display for ControllerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerError::ClipNotFound { state, key } => {
                write!(f, "no animation clip for state {state} (key {key:?})")
            }
            ControllerError::InvalidDelta(delta) => write!(f, "invalid tick delta {delta}"),
        }
    }
}

impl std::error::Error for ControllerError {}

//! Structured rejections and fatal definition errors.
//!
//! Gate violations, missing positions and out-of-order actions are expected
//! outcomes of user interaction and come back as a [`Rejection`]. The only
//! error that indicates corrupted input is [`DefinitionError`], raised when an
//! activity document lacks the geometry its mode requires.

use thiserror::Error;

use crate::Meters;

/// What was missing when an action was attempted.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum Precondition {
    #[error("no position fix available yet")]
    NoPosition,

    #[error("position has invalid coordinates")]
    InvalidPosition,

    #[error("marker must be placed first")]
    MarkerNotPlaced,

    #[error("radius must be dropped first")]
    RadiusNotDropped,

    #[error("radius must be locked")]
    NotLocked,

    #[error("dwell duration must be set")]
    DwellNotSet,

    #[error("not enough checkpoints")]
    TooFewCheckpoints,

    #[error("no checkpoints to remove")]
    NoCheckpoints,

    #[error("no removal pending confirmation")]
    NothingToConfirm,

    #[error("path recording has not been finished")]
    NotStopped,
}

/// An advisory refusal. The session state is unchanged when one is returned.
#[derive(Error, Debug, Clone, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Error))]
pub enum Rejection {
    #[error("precondition not met: {missing}")]
    PreconditionNotMet { missing: Precondition },

    /// Too close to a reference point; move `shortfall` further away.
    #[error("too close: {distance} away, need {required} (move {shortfall} further)")]
    TooClose {
        distance: Meters,
        required: Meters,
        shortfall: Meters,
    },

    /// Too far from a reference point; come `excess` closer.
    #[error("too far: {distance} away, allowed {allowed} (move {excess} closer)")]
    TooFar {
        distance: Meters,
        allowed: Meters,
        excess: Meters,
    },

    #[error("cannot {action} while {state}")]
    InvalidTransition { action: String, state: String },

    /// Position source or persistence failure; retrying may succeed.
    #[error("external failure: {0}")]
    ExternalFailure(String),
}

impl Rejection {
    pub(crate) fn too_close(distance: Meters, required: Meters) -> Self {
        Rejection::TooClose {
            distance,
            required,
            shortfall: distance.shortfall_to(required),
        }
    }

    pub(crate) fn too_far(distance: Meters, allowed: Meters) -> Self {
        Rejection::TooFar {
            distance,
            allowed,
            excess: Meters((distance.value() - allowed.value()).max(0.0)),
        }
    }

    pub(crate) fn invalid(action: &str, state: &str) -> Self {
        Rejection::InvalidTransition {
            action: action.to_string(),
            state: state.to_string(),
        }
    }
}

impl From<Precondition> for Rejection {
    fn from(p: Precondition) -> Self {
        Rejection::PreconditionNotMet { missing: p }
    }
}

/// Activity geometry that cannot be tracked.
#[derive(Error, Debug, Clone, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Error))]
pub enum DefinitionError {
    #[error("path activity has an empty route")]
    EmptyRoute,

    #[error("checkpoint activity needs at least 2 checkpoints, found {found}")]
    TooFewCheckpoints { found: u32 },

    #[error("spot radius must be positive, got {radius}")]
    NonPositiveRadius { radius: f64 },

    #[error("invalid coordinate at index {index}")]
    InvalidCoordinate { index: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_display() {
        let err = Rejection::too_close(Meters(4.0), Meters(10.0));
        assert_eq!(
            err.to_string(),
            "too close: 4.0m away, need 10.0m (move 6.0m further)"
        );

        let err = Rejection::too_far(Meters(7.5), Meters(3.0));
        assert_eq!(
            err.to_string(),
            "too far: 7.5m away, allowed 3.0m (move 4.5m closer)"
        );

        let err: Rejection = Precondition::NoPosition.into();
        assert_eq!(err.to_string(), "precondition not met: no position fix available yet");

        let err = Rejection::invalid("resume", "recording");
        assert_eq!(err.to_string(), "cannot resume while recording");
    }

    #[test]
    fn test_definition_error_display() {
        let err = DefinitionError::TooFewCheckpoints { found: 1 };
        assert_eq!(
            err.to_string(),
            "checkpoint activity needs at least 2 checkpoints, found 1"
        );
    }
}

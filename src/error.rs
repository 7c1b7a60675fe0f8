use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Hardware permissions the capture engines depend on.
/// Checked before any native acquisition, never after.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Permission {
    Microphone,
    Camera,
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Permission::Microphone => write!(f, "microphone"),
            Permission::Camera => write!(f, "camera"),
        }
    }
}

/// Permission check supplied by the embedding app.
/// The engines only ever ask "granted or not?" — requesting permission
/// is the UI layer's job.
pub trait PermissionChecker: Send + Sync {
    fn is_granted(&self, permission: Permission) -> bool;
}

/// Checker that grants everything. Useful for desktop builds and tests.
pub struct AllGranted;

impl PermissionChecker for AllGranted {
    fn is_granted(&self, _permission: Permission) -> bool {
        true
    }
}

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("{0} permission denied")]
    PermissionDenied(Permission),

    #[error("operation already active: {0}")]
    AlreadyActive(&'static str),

    #[error("hardware initialization failed: {0}")]
    HardwareInit(String),

    #[error("device i/o failed: {0}")]
    Io(String),

    #[error("{operation} not allowed in state {state}")]
    InvalidTransition {
        operation: &'static str,
        state: String,
    },
}

impl From<std::io::Error> for CaptureError {
    fn from(e: std::io::Error) -> Self {
        CaptureError::Io(e.to_string())
    }
}

impl CaptureError {
    pub(crate) fn invalid_transition(operation: &'static str, state: impl std::fmt::Display) -> Self {
        CaptureError::InvalidTransition {
            operation,
            state: state.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_denied_names_the_device() {
        let err = CaptureError::PermissionDenied(Permission::Camera);
        assert_eq!(err.to_string(), "camera permission denied");
    }

    #[test]
    fn invalid_transition_names_operation_and_state() {
        let err = CaptureError::invalid_transition("take_picture", "Ready");
        assert_eq!(err.to_string(), "take_picture not allowed in state Ready");
    }
}

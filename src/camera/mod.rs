mod pipeline;

pub use pipeline::CameraPipeline;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::CaptureError;

/// Observable state of the camera pipeline.
///
/// Initialization is strictly ordered (Idle → Initializing → Ready), preview
/// toggles between Ready and Previewing, and Capturing is a sub-state of
/// Previewing — it is never entered from Ready directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state")]
pub enum CameraState {
    Idle,
    Initializing,
    Ready,
    Previewing,
    Capturing,
    Error { message: String },
}

impl std::fmt::Display for CameraState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraState::Idle => write!(f, "Idle"),
            CameraState::Initializing => write!(f, "Initializing"),
            CameraState::Ready => write!(f, "Ready"),
            CameraState::Previewing => write!(f, "Previewing"),
            CameraState::Capturing => write!(f, "Capturing"),
            CameraState::Error { message } => write!(f, "Error({message})"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LensFacing {
    Back,
    Front,
}

impl LensFacing {
    pub fn toggled(self) -> Self {
        match self {
            LensFacing::Back => LensFacing::Front,
            LensFacing::Front => LensFacing::Back,
        }
    }
}

impl Default for LensFacing {
    fn default() -> Self {
        LensFacing::Back
    }
}

/// Flash configuration for the next capture. Not part of CameraState.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlashMode {
    Off,
    On,
    Auto,
}

impl Default for FlashMode {
    fn default() -> Self {
        FlashMode::Off
    }
}

/// Terminal outcome of one successful capture: the durably written file plus
/// its bytes, so the caller needs no second I/O round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedPhoto {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
}

/// One result per capture invocation, never streamed.
pub type CaptureResult = Result<CapturedPhoto, CaptureError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lens_toggles_both_ways() {
        assert_eq!(LensFacing::Back.toggled(), LensFacing::Front);
        assert_eq!(LensFacing::Front.toggled(), LensFacing::Back);
        assert_eq!(LensFacing::default(), LensFacing::Back);
    }
}

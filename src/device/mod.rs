//! Hardware session abstraction
//! One session = one exclusive acquisition of a physical device (microphone
//! input, audio output, or camera sensor). Sessions are single-owner: the
//! engine that opened one holds it until release, and release also runs from
//! Drop so an error mid-operation cannot leak the native handle.

pub mod camera;
mod cpal_host;

pub use cpal_host::CpalAudioHost;

use uuid::Uuid;

use crate::audio::AudioFormat;
use crate::error::CaptureError;

/// Identifier attached to one hardware acquisition, for log correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An open microphone acquisition.
///
/// `read` blocks the calling thread until at least one sample is available,
/// so it must only be driven from a blocking-capable worker.
pub trait AudioInputSession: Send {
    fn id(&self) -> SessionId;

    /// Blocking read. Returns the number of bytes written into `buf`
    /// (at least one sample's worth, at most `buf.len()`).
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, CaptureError>;
}

/// An open audio output acquisition.
pub trait AudioOutputSession: Send {
    fn id(&self) -> SessionId;

    /// Queue the full buffer for rendering. Returns once the bytes are
    /// handed to the device layer, not once they have been heard.
    fn write(&mut self, buf: &[u8]) -> Result<(), CaptureError>;

    /// Stop rendering and discard anything still queued. Idempotent.
    fn stop(&mut self);
}

/// Entry point to the platform audio devices. The engines go through this
/// trait so tests can substitute a scripted host for real hardware.
pub trait AudioDeviceHost: Send + Sync {
    /// Minimum input buffer size in bytes for the given format, as reported
    /// by the device layer. Errors when the device cannot do the format.
    fn min_input_buffer_size(&self, format: &AudioFormat) -> Result<usize, CaptureError>;

    fn open_input(
        &self,
        format: &AudioFormat,
        buffer_size: usize,
    ) -> Result<Box<dyn AudioInputSession>, CaptureError>;

    /// Minimum output buffer size in bytes for the given format.
    fn min_output_buffer_size(&self, format: &AudioFormat) -> Result<usize, CaptureError>;

    fn open_output(
        &self,
        format: &AudioFormat,
        buffer_size: usize,
    ) -> Result<Box<dyn AudioOutputSession>, CaptureError>;
}

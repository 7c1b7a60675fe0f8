mod amplitude;
mod capture;
mod playback;

pub use amplitude::AmplitudeMonitor;
pub use capture::AudioCaptureEngine;
pub use playback::AudioPlaybackEngine;

use serde::{Deserialize, Serialize};

/// Sample rate for all capture and playback (fixed, not configurable)
pub const SAMPLE_RATE: u32 = 16_000;
/// Channels (mono for a child's voice)
pub const CHANNELS: u16 = 1;
/// Bytes per sample (16-bit PCM)
pub const BYTES_PER_SAMPLE: usize = 2;
/// Duration of one hardware read window in ms
pub const FRAME_DURATION_MS: u32 = 20;
/// Bytes per read window (16000 * 20 / 1000 * 2 = 640)
pub const FRAME_BYTES: usize =
    (SAMPLE_RATE * FRAME_DURATION_MS / 1000) as usize * BYTES_PER_SAMPLE * CHANNELS as usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelConfig {
    Mono,
    Stereo,
}

impl ChannelConfig {
    pub fn count(self) -> u16 {
        match self {
            ChannelConfig::Mono => 1,
            ChannelConfig::Stereo => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SampleEncoding {
    Pcm16,
}

impl SampleEncoding {
    pub fn bytes_per_sample(self) -> usize {
        match self {
            SampleEncoding::Pcm16 => 2,
        }
    }
}

/// Audio format descriptor passed down to the device layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: ChannelConfig,
    pub encoding: SampleEncoding,
}

impl AudioFormat {
    /// The one format the engines use: 16 kHz mono 16-bit PCM.
    pub const fn capture() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            channels: ChannelConfig::Mono,
            encoding: SampleEncoding::Pcm16,
        }
    }

    pub fn bytes_per_second(&self) -> usize {
        self.sample_rate as usize * self.encoding.bytes_per_sample() * self.channels.count() as usize
    }
}

/// One immutable chunk of captured PCM audio.
///
/// Equality and hashing are derived, so two frames with the same bytes and
/// metadata compare equal regardless of where they were allocated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AudioFrame {
    pub data: Vec<u8>,
    pub sample_rate: u32,
    pub channels: ChannelConfig,
    pub encoding: SampleEncoding,
    /// Capture time, milliseconds since the Unix epoch.
    pub timestamp_ms: i64,
}

impl AudioFrame {
    pub fn new(data: Vec<u8>, format: &AudioFormat, timestamp_ms: i64) -> Self {
        Self {
            data,
            sample_rate: format.sample_rate,
            channels: format.channels,
            encoding: format.encoding,
            timestamp_ms,
        }
    }
}

/// Observable state of the audio capture engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state")]
pub enum RecordingState {
    Idle,
    Recording,
    Processing,
    Error { message: String },
}

impl std::fmt::Display for RecordingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordingState::Idle => write!(f, "Idle"),
            RecordingState::Recording => write!(f, "Recording"),
            RecordingState::Processing => write!(f, "Processing"),
            RecordingState::Error { message } => write!(f, "Error({message})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn frame_equality_is_content_based() {
        let format = AudioFormat::capture();
        let a = AudioFrame::new(vec![1, 2, 3, 4], &format, 100);
        let b = AudioFrame::new(vec![1, 2, 3, 4], &format, 100);
        let c = AudioFrame::new(vec![9, 9, 9, 9], &format, 100);

        assert_eq!(a, b);
        assert_ne!(a, c);

        let mut set = HashSet::new();
        set.insert(a);
        set.insert(b);
        set.insert(c);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn capture_format_is_16k_mono_pcm16() {
        let format = AudioFormat::capture();
        assert_eq!(format.sample_rate, 16_000);
        assert_eq!(format.channels.count(), 1);
        assert_eq!(format.bytes_per_second(), 32_000);
        assert_eq!(FRAME_BYTES, 640);
    }
}

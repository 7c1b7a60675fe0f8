//! Loudness feed for waveform animation
//! Piggybacks on the capture engine's read loop (one hardware read, fanned
//! out) instead of opening a competing session.

use std::time::Duration;
use tokio::sync::{mpsc, watch};

use super::capture::AmplitudeTap;
use super::{AudioCaptureEngine, RecordingState};

/// Emission cadence (~20 Hz)
const TICK: Duration = Duration::from_millis(50);

/// Values buffered towards a slow consumer before ticks back up.
const LEVEL_CHANNEL_CAPACITY: usize = 8;

/// Mean absolute amplitude of 16-bit samples, normalized to [0, 1].
fn normalized_level(bytes: &[u8]) -> f32 {
    let even = bytes.len() - bytes.len() % 2;
    let samples: Vec<i16> = bytemuck::pod_collect_to_vec(&bytes[..even]);
    if samples.is_empty() {
        return 0.0;
    }

    let sum: f64 = samples.iter().map(|s| f64::from(s.unsigned_abs())).sum();
    let mean = sum / samples.len() as f64 / f64::from(i16::MAX as u16);
    mean.clamp(0.0, 1.0) as f32
}

/// Continuously updating loudness signal for the UI.
pub struct AmplitudeMonitor {
    tap: AmplitudeTap,
    state: watch::Receiver<RecordingState>,
}

impl AmplitudeMonitor {
    pub fn new(engine: &AudioCaptureEngine) -> Self {
        Self {
            tap: engine.amplitude_tap(),
            state: engine.watch_state(),
        }
    }

    /// Infinite stream of normalized levels at a fixed cadence. While the
    /// engine is not recording it emits 0.0 rather than blocking; it only
    /// ends when the receiver is dropped. Each call is an independent
    /// measurement session.
    pub fn amplitude_stream(&self) -> mpsc::Receiver<f32> {
        let (tx, rx) = mpsc::channel(LEVEL_CHANNEL_CAPACITY);
        let tap = self.tap.clone();
        let state = self.state.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(TICK);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;

                let level = if *state.borrow() == RecordingState::Recording {
                    normalized_level(&tap.latest())
                } else {
                    0.0
                };

                if tx.send(level).await.is_err() {
                    break;
                }
            }
        });

        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_is_zero() {
        assert_eq!(normalized_level(&[]), 0.0);
        assert_eq!(normalized_level(&[0, 0, 0, 0]), 0.0);
    }

    #[test]
    fn full_scale_clamps_to_one() {
        // i16::MIN has magnitude 32768, one past i16::MAX.
        let sample = i16::MIN.to_le_bytes();
        let bytes: Vec<u8> = sample.iter().copied().cycle().take(64).collect();
        assert_eq!(normalized_level(&bytes), 1.0);
    }

    #[test]
    fn half_scale_is_near_half() {
        let sample = (i16::MAX / 2).to_le_bytes();
        let bytes: Vec<u8> = sample.iter().copied().cycle().take(64).collect();
        let level = normalized_level(&bytes);
        assert!((level - 0.5).abs() < 0.01, "level was {level}");
    }

    #[test]
    fn odd_trailing_byte_is_ignored() {
        let level = normalized_level(&[0, 0, 7]);
        assert_eq!(level, 0.0);
    }
}

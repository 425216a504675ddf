//! Audio I/O boundary consumed by the controller.
//!
//! The ALSA implementation lives in `alsa_device`; tests plug in scripted
//! streams and recording sinks.

use anyhow::Result;
use serde::Serialize;

use super::format::NativeBuffer;

/// Fixed format of a capture or playback stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StreamFormat {
    pub sample_rate: u32,
    pub channels: u32,
    /// Frames delivered per capture read.
    pub period_frames: usize,
}

impl StreamFormat {
    /// Real-time deadline for one period, in milliseconds.
    pub fn period_ms(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.period_frames as f64 * 1000.0 / self.sample_rate as f64
    }
}

/// Source of captured periods, driven by the capture thread.
pub trait CaptureStream: Send {
    /// Negotiated format.
    fn format(&self) -> StreamFormat;

    /// Block until one period is available and return a view of it.
    /// The view borrows the stream and must not outlive the next call.
    fn read(&mut self) -> Result<NativeBuffer<'_>>;

    /// Bring the stream back after a read error (overrun etc).
    fn recover(&mut self) -> Result<()>;
}

/// Output side of the graph, driven by the playback worker.
pub trait PlaybackSink: Send {
    /// Start the player. Called before the first buffer is written.
    fn start(&mut self) -> Result<()>;

    /// Write one interleaved buffer. May block for device scheduling.
    fn write(&mut self, interleaved: &[f32]) -> Result<()>;

    /// Stop the player and discard anything it still holds.
    fn stop(&mut self);
}

/// Builds the capture and playback halves of the audio graph.
pub trait AudioBackend: Send {
    fn open_capture(&mut self) -> Result<Box<dyn CaptureStream>>;

    /// Open playback for buffers of exactly `format`.
    fn open_playback(&mut self, format: StreamFormat) -> Result<Box<dyn PlaybackSink>>;
}

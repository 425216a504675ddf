//! audio - Capture/playback graph and the real-time buffer path
//!
//! Uses ALSA for audio I/O. Each captured period runs through the format
//! bridge and the processing session on the capture thread; processed
//! buffers are scheduled for playback on a separate worker thread.

pub mod alsa_device;
pub mod backend;
pub mod capture;
pub mod controller;
pub mod format;
pub mod playback;

pub use alsa_device::{AlsaBackend, AudioConfig};
pub use backend::{AudioBackend, CaptureStream, PlaybackSink, StreamFormat};
pub use capture::{BufferHandler, CaptureTap};
pub use controller::{AudioGraphController, ControllerStatus, GraphState};
pub use format::{AudioBuffer, FormatBridge, NativeBuffer};
pub use playback::{PlaybackQueue, PlaybackScheduler};

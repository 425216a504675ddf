//! Error taxonomy for the audio bridge.
//!
//! Nothing here is fatal: start-time errors leave the graph Idle, per-buffer
//! errors drop that one buffer.

use thiserror::Error;

/// Shape problems found while converting between native and planar layouts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("empty buffer: {frames} frames, {channels} channels")]
    Empty { frames: usize, channels: usize },

    #[error("channel count mismatch: session expects {expected}, buffer has {actual}")]
    ChannelMismatch { expected: usize, actual: usize },

    #[error("{len} samples do not divide into {channels} channels")]
    Ragged { len: usize, channels: usize },

    #[error("channel {channel} holds {len} frames, expected {expected}")]
    ChannelLength {
        channel: usize,
        len: usize,
        expected: usize,
    },
}

/// Why `AudioGraphController::start` left the graph Idle.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("processing session creation failed: engine `{engine}` rejected {sample_rate} Hz / {channels} ch")]
    SessionCreation {
        engine: &'static str,
        sample_rate: u32,
        channels: u32,
    },

    #[error("audio graph configuration failed while {stage}: {reason}")]
    GraphConfiguration { stage: &'static str, reason: String },
}

impl BridgeError {
    pub(crate) fn graph(stage: &'static str, err: anyhow::Error) -> Self {
        Self::GraphConfiguration {
            stage,
            reason: format!("{:#}", err),
        }
    }
}

/// Why a single captured buffer was dropped.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BufferError {
    #[error("format mismatch: {0}")]
    Format(#[from] FormatError),

    #[error("engine produced no output (status {status})")]
    Processing { status: i32 },

    #[error("playback queue full")]
    Backpressure,

    #[error("playback scheduler stopped")]
    PlaybackClosed,
}

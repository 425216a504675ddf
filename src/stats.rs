//! Lock-free counters updated by the capture thread.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::error::BufferError;

/// Repeated failures are logged on the first occurrence and then every this many.
pub const LOG_INTERVAL: u64 = 100;

/// Whether the `count`-th occurrence of a repeating failure should be logged.
#[inline]
pub fn should_log(count: u64) -> bool {
    count == 1 || count % LOG_INTERVAL == 0
}

#[derive(Debug, Default)]
pub struct BridgeStats {
    processed: AtomicU64,
    format_drops: AtomicU64,
    processing_drops: AtomicU64,
    backpressure_drops: AtomicU64,
    playback_closed_drops: AtomicU64,
    capture_errors: AtomicU64,
}

/// Point-in-time copy of [`BridgeStats`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub processed: u64,
    pub format_drops: u64,
    pub processing_drops: u64,
    pub backpressure_drops: u64,
    pub playback_closed_drops: u64,
    pub capture_errors: u64,
}

impl StatsSnapshot {
    pub fn dropped(&self) -> u64 {
        self.format_drops + self.processing_drops + self.backpressure_drops + self.playback_closed_drops
    }
}

impl BridgeStats {
    pub fn record_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a dropped buffer; returns how many buffers this cause has dropped so far.
    pub fn record_drop(&self, err: &BufferError) -> u64 {
        let counter = match err {
            BufferError::Format(_) => &self.format_drops,
            BufferError::Processing { .. } => &self.processing_drops,
            BufferError::Backpressure => &self.backpressure_drops,
            BufferError::PlaybackClosed => &self.playback_closed_drops,
        };
        counter.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn record_capture_error(&self) -> u64 {
        self.capture_errors.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            processed: self.processed.load(Ordering::Relaxed),
            format_drops: self.format_drops.load(Ordering::Relaxed),
            processing_drops: self.processing_drops.load(Ordering::Relaxed),
            backpressure_drops: self.backpressure_drops.load(Ordering::Relaxed),
            playback_closed_drops: self.playback_closed_drops.load(Ordering::Relaxed),
            capture_errors: self.capture_errors.load(Ordering::Relaxed),
        }
    }
}

//! Noise-level parameter shared between the control context and the capture thread.
//!
//! The level is stored as the bit pattern of an `f32` inside an `AtomicU32`, so
//! a read is a single atomic load: never blocking, never torn.

use std::sync::atomic::{AtomicU32, Ordering};

pub const MIN_NOISE_LEVEL: f32 = 0.0;
pub const MAX_NOISE_LEVEL: f32 = 1.0;

/// Single-writer / multi-reader cell holding the current noise level.
#[derive(Debug)]
pub struct ParameterStore {
    noise_level: AtomicU32,
}

impl ParameterStore {
    pub fn new(initial: f32) -> Self {
        let level = if initial.is_nan() {
            MIN_NOISE_LEVEL
        } else {
            initial.clamp(MIN_NOISE_LEVEL, MAX_NOISE_LEVEL)
        };
        Self {
            noise_level: AtomicU32::new(level.to_bits()),
        }
    }

    /// Clamp `level` to `[0, 1]` and publish it. Returns the published value.
    ///
    /// NaN is rejected: the previous value stays published and is returned.
    pub fn set(&self, level: f32) -> f32 {
        if level.is_nan() {
            log::warn!("Ignoring NaN noise level");
            return self.snapshot();
        }
        let level = level.clamp(MIN_NOISE_LEVEL, MAX_NOISE_LEVEL);
        self.noise_level.store(level.to_bits(), Ordering::Release);
        level
    }

    /// Most recently published level.
    #[inline]
    pub fn snapshot(&self) -> f32 {
        f32::from_bits(self.noise_level.load(Ordering::Acquire))
    }
}

impl Default for ParameterStore {
    fn default() -> Self {
        Self::new(MIN_NOISE_LEVEL)
    }
}

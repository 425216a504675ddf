//! engine - Noise-injection processing engines
//!
//! The bridge only relies on the contract below; how noise is generated is
//! the engine's business. Two implementations exist: the native C engine
//! behind an FFI boundary, and an in-process engine used when no native
//! library is wanted (and by tests).

pub mod native;
pub mod simulated;

use crate::audio::{AudioBuffer, StreamFormat};
use crate::error::{BridgeError, BufferError};

pub use native::NativeEngine;
pub use simulated::SimulatedEngine;

/// Factory for engine sessions bound to one format.
pub trait ProcessingEngine: Send + Sync {
    fn name(&self) -> &'static str;

    /// Returns `None` when the format is not supported.
    fn create(&self, sample_rate: u32, channels: u32) -> Option<Box<dyn EngineSession>>;
}

/// One engine instance. Dropping it releases the engine's resources.
pub trait EngineSession: Send {
    /// Process one planar buffer. `input` and `output` are only borrowed for
    /// the duration of the call.
    ///
    /// Writes exactly `input.frame_count()` samples per channel into `output`
    /// and returns a positive status, or returns `<= 0` having produced no
    /// usable output. Each output sample differs from its input by at most
    /// `noise_level`.
    fn process(&mut self, input: &AudioBuffer, output: &mut AudioBuffer, noise_level: f32) -> i32;

    fn set_noise_level(&mut self, level: f32);

    fn noise_level(&self) -> f32;
}

/// Exclusive, format-bound handle to an engine session.
///
/// Owned by the per-buffer pipeline; the engine instance is destroyed when
/// this is dropped, which the controller only lets happen after the capture
/// thread has been joined.
pub struct ProcessingSession {
    inner: Box<dyn EngineSession>,
    engine: &'static str,
    format: StreamFormat,
    applied_level: f32,
}

impl std::fmt::Debug for ProcessingSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessingSession")
            .field("engine", &self.engine)
            .field("format", &self.format)
            .field("applied_level", &self.applied_level)
            .finish()
    }
}

impl ProcessingSession {
    pub fn open(
        engine: &dyn ProcessingEngine,
        format: StreamFormat,
        initial_level: f32,
    ) -> Result<Self, BridgeError> {
        let mut inner = engine.create(format.sample_rate, format.channels).ok_or(
            BridgeError::SessionCreation {
                engine: engine.name(),
                sample_rate: format.sample_rate,
                channels: format.channels,
            },
        )?;
        inner.set_noise_level(initial_level);
        log::info!(
            "Processing session created: engine={}, rate={}, ch={}",
            engine.name(),
            format.sample_rate,
            format.channels,
        );
        Ok(Self {
            inner,
            engine: engine.name(),
            format,
            applied_level: initial_level,
        })
    }

    pub fn format(&self) -> StreamFormat {
        self.format
    }

    /// Level last pushed into the engine.
    pub fn applied_level(&self) -> f32 {
        self.applied_level
    }

    /// Level the engine itself reports.
    pub fn engine_level(&self) -> f32 {
        self.inner.noise_level()
    }

    /// Run one buffer through the engine with the given parameter snapshot.
    ///
    /// A changed level is pushed with `set_noise_level` first, so the engine
    /// parameter only ever changes between two `process` calls.
    pub fn process(
        &mut self,
        input: &AudioBuffer,
        output: &mut AudioBuffer,
        noise_level: f32,
    ) -> Result<(), BufferError> {
        if noise_level.to_bits() != self.applied_level.to_bits() {
            self.inner.set_noise_level(noise_level);
            self.applied_level = noise_level;
        }

        output.resize(input.frame_count());
        let status = self.inner.process(input, output, noise_level);
        if status <= 0 {
            return Err(BufferError::Processing { status });
        }
        Ok(())
    }
}

impl Drop for ProcessingSession {
    fn drop(&mut self) {
        log::info!("Processing session destroyed: engine={}", self.engine);
    }
}

//! The audio graph controller: owns the capture/playback graph and the
//! processing session, and drives every captured buffer through
//! FormatBridge → ProcessingSession → PlaybackQueue.

use std::sync::Arc;

use serde::Serialize;

use super::backend::{AudioBackend, StreamFormat};
use super::capture::{BufferHandler, CaptureTap};
use super::format::{AudioBuffer, FormatBridge, NativeBuffer};
use super::playback::{PlaybackQueue, PlaybackScheduler};
use crate::engine::{ProcessingEngine, ProcessingSession};
use crate::error::{BridgeError, BufferError};
use crate::events::EventLog;
use crate::params::ParameterStore;
use crate::stats::{should_log, BridgeStats, StatsSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphState {
    Idle,
    Running,
}

/// Status document for the control surface.
#[derive(Debug, Clone, Serialize)]
pub struct ControllerStatus {
    pub state: GraphState,
    pub engine: &'static str,
    pub noise_level: f32,
    pub format: Option<StreamFormat>,
    pub player_active: bool,
    pub queued_buffers: usize,
    pub stats: StatsSnapshot,
}

struct RunningGraph {
    tap: CaptureTap,
    scheduler: PlaybackScheduler,
    format: StreamFormat,
}

/// Starts and stops the audio graph; see `start` and `stop` for the
/// ordering guarantees.
pub struct AudioGraphController {
    backend: Box<dyn AudioBackend>,
    engine: Arc<dyn ProcessingEngine>,
    params: Arc<ParameterStore>,
    events: Arc<EventLog>,
    stats: Arc<BridgeStats>,
    queue_depth: usize,
    // `Some` exactly while Running.
    running: Option<RunningGraph>,
}

impl AudioGraphController {
    pub fn new(
        backend: Box<dyn AudioBackend>,
        engine: Arc<dyn ProcessingEngine>,
        params: Arc<ParameterStore>,
        events: Arc<EventLog>,
        queue_depth: usize,
    ) -> Self {
        Self {
            backend,
            engine,
            params,
            events,
            stats: Arc::new(BridgeStats::default()),
            queue_depth,
            running: None,
        }
    }

    pub fn state(&self) -> GraphState {
        if self.running.is_some() {
            GraphState::Running
        } else {
            GraphState::Idle
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    pub fn params(&self) -> &Arc<ParameterStore> {
        &self.params
    }

    pub fn events(&self) -> &Arc<EventLog> {
        &self.events
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Format the current session is bound to, while Running.
    pub fn format(&self) -> Option<StreamFormat> {
        self.running.as_ref().map(|g| g.format)
    }

    pub fn status(&self) -> ControllerStatus {
        ControllerStatus {
            state: self.state(),
            engine: self.engine.name(),
            noise_level: self.params.snapshot(),
            format: self.format(),
            player_active: self.running.as_ref().is_some_and(|g| g.scheduler.is_active()),
            queued_buffers: self.running.as_ref().map_or(0, |g| g.scheduler.queued()),
            stats: self.stats.snapshot(),
        }
    }

    /// Publish a new noise level. The capture pipeline pushes it into the
    /// engine before its next `process` call. Returns the clamped value.
    pub fn set_noise_level(&self, level: f32) -> f32 {
        let published = self.params.set(level);
        self.events
            .push(format!("Noise level set to {:.3}", published));
        published
    }

    /// Idle → Running.
    ///
    /// Either every step succeeds and the state becomes Running, or the
    /// failure is reported and nothing is left behind.
    pub fn start(&mut self) -> Result<(), BridgeError> {
        if self.running.is_some() {
            self.events.push("Audio processing already running");
            return Ok(());
        }

        self.events
            .push(format!("Starting audio processing (engine: {})", self.engine.name()));

        match self.build_graph() {
            Ok(graph) => {
                self.events.push(format!(
                    "Audio processing running: {} Hz, {} ch, {} frames/period, noise {:.3}",
                    graph.format.sample_rate,
                    graph.format.channels,
                    graph.format.period_frames,
                    self.params.snapshot(),
                ));
                self.running = Some(graph);
                Ok(())
            }
            Err(e) => {
                log::error!("Start failed: {}", e);
                self.events.push(format!("Start failed: {}", e));
                Err(e)
            }
        }
    }

    fn build_graph(&mut self) -> Result<RunningGraph, BridgeError> {
        let capture = self
            .backend
            .open_capture()
            .map_err(|e| BridgeError::graph("opening capture", e))?;
        let format = capture.format();
        log::info!(
            "Capture format: {} Hz, {} ch, period {} frames",
            format.sample_rate,
            format.channels,
            format.period_frames,
        );

        let session = ProcessingSession::open(self.engine.as_ref(), format, self.params.snapshot())?;

        let sink = self
            .backend
            .open_playback(format)
            .map_err(|e| BridgeError::graph("opening playback", e))?;
        let bridge = FormatBridge::new(format);
        let (mut scheduler, queue) = PlaybackScheduler::start(sink, bridge, self.queue_depth)
            .map_err(|e| BridgeError::graph("starting playback", e))?;

        let pipeline = BufferPipeline {
            planar_in: bridge.planar_buffer(),
            planar_out: bridge.planar_buffer(),
            bridge,
            session,
            params: self.params.clone(),
            queue,
            stats: self.stats.clone(),
        };

        let tap = match CaptureTap::install(capture, Box::new(pipeline), self.stats.clone()) {
            Ok(tap) => tap,
            Err(e) => {
                scheduler.stop();
                return Err(BridgeError::graph("installing capture callback", e));
            }
        };

        Ok(RunningGraph {
            tap,
            scheduler,
            format,
        })
    }

    /// Running → Idle.
    ///
    /// The capture callback is removed and its thread joined first; only
    /// then is playback torn down and the processing session destroyed.
    pub fn stop(&mut self) {
        let Some(graph) = self.running.take() else {
            log::debug!("Stop requested while idle");
            return;
        };
        self.events.push("Stopping audio processing");

        let RunningGraph {
            tap, mut scheduler, ..
        } = graph;

        // No buffer callback runs after this returns.
        let pipeline = tap.remove();

        scheduler.stop();
        drop(scheduler);

        // Destroys the processing session.
        drop(pipeline);

        let stats = self.stats.snapshot();
        self.events.push(format!(
            "Audio processing stopped ({} buffers processed, {} dropped)",
            stats.processed,
            stats.dropped(),
        ));
    }
}

impl Drop for AudioGraphController {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Everything the capture callback needs, owned by the capture thread while
/// the graph runs.
struct BufferPipeline {
    bridge: FormatBridge,
    session: ProcessingSession,
    params: Arc<ParameterStore>,
    planar_in: AudioBuffer,
    planar_out: AudioBuffer,
    queue: PlaybackQueue,
    stats: Arc<BridgeStats>,
}

impl BufferPipeline {
    fn run(&mut self, buffer: &NativeBuffer<'_>) -> Result<(), BufferError> {
        self.bridge.to_planar(buffer, &mut self.planar_in)?;
        let level = self.params.snapshot();
        self.session
            .process(&self.planar_in, &mut self.planar_out, level)?;
        self.queue.enqueue(&self.planar_out)
    }
}

impl BufferHandler for BufferPipeline {
    fn on_buffer(&mut self, buffer: &NativeBuffer<'_>) {
        match self.run(buffer) {
            Ok(()) => self.stats.record_processed(),
            Err(e) => {
                let count = self.stats.record_drop(&e);
                if should_log(count) {
                    log::warn!("Dropped buffer ({} so far for this cause): {}", count, e);
                }
            }
        }
    }
}

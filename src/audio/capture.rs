//! Capture tap: a dedicated OS thread that reads periods from the capture
//! stream and hands each one to the installed handler.
//!
//! Uses std::thread (NOT tokio tasks) so the per-buffer path never waits on
//! the async runtime.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::Result;

use super::backend::CaptureStream;
use super::format::NativeBuffer;
use crate::stats::BridgeStats;

/// Per-buffer callback run on the capture thread.
///
/// `buffer` is only valid for the duration of the call.
pub trait BufferHandler: Send {
    fn on_buffer(&mut self, buffer: &NativeBuffer<'_>);
}

/// An installed capture callback.
///
/// The handler is moved onto the capture thread and handed back by
/// [`CaptureTap::remove`] once that thread has exited, so whatever it owns
/// outlives every callback invocation.
pub struct CaptureTap {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<Box<dyn BufferHandler>>>,
}

impl CaptureTap {
    pub fn install(
        mut stream: Box<dyn CaptureStream>,
        mut handler: Box<dyn BufferHandler>,
        stats: Arc<BridgeStats>,
    ) -> Result<Self> {
        let running = Arc::new(AtomicBool::new(true));

        let handle = {
            let running = running.clone();
            thread::Builder::new()
                .name("audio-capture".into())
                .spawn(move || {
                    capture_loop(stream.as_mut(), handler.as_mut(), &running, &stats);
                    // The stream is closed before the handler goes back to the caller.
                    drop(stream);
                    handler
                })?
        };

        Ok(Self {
            running,
            handle: Some(handle),
        })
    }

    pub fn is_alive(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the capture thread and wait for it.
    ///
    /// Returns after the last `on_buffer` call has completed. The handler is
    /// returned unless the capture thread panicked.
    pub fn remove(mut self) -> Option<Box<dyn BufferHandler>> {
        self.join()
    }

    fn join(&mut self) -> Option<Box<dyn BufferHandler>> {
        self.running.store(false, Ordering::SeqCst);
        let handle = self.handle.take()?;
        match handle.join() {
            Ok(handler) => Some(handler),
            Err(_) => {
                log::error!("Capture thread panicked");
                None
            }
        }
    }
}

impl Drop for CaptureTap {
    fn drop(&mut self) {
        self.join();
    }
}

fn capture_loop(
    stream: &mut dyn CaptureStream,
    handler: &mut dyn BufferHandler,
    running: &AtomicBool,
    stats: &BridgeStats,
) {
    let format = stream.format();
    log::info!(
        "Capture started: rate={}, ch={}, period={} ({:.1} ms)",
        format.sample_rate,
        format.channels,
        format.period_frames,
        format.period_ms(),
    );

    while running.load(Ordering::Acquire) {
        // Malformed periods still go to the handler, which drops and counts them.
        let result = stream.read().map(|buffer| handler.on_buffer(&buffer));

        if let Err(e) = result {
            let count = stats.record_capture_error();
            log::warn!("Capture read error #{}: {}, recovering...", count, e);
            if let Err(e2) = stream.recover() {
                log::error!("Failed to recover capture stream: {:#}", e2);
                break;
            }
        }
    }

    log::info!("Capture stopped");
}

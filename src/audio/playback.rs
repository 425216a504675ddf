//! Playback scheduling: processed buffers are queued from the capture thread
//! and written to the sink by a non-real-time worker, in FIFO order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::Result;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use super::backend::PlaybackSink;
use super::format::{AudioBuffer, FormatBridge};
use crate::error::BufferError;
use crate::stats::should_log;

enum PlaybackCommand {
    Play(Vec<f32>),
    Stop,
}

/// Owns the playback worker thread and the "player active" flag.
pub struct PlaybackScheduler {
    flushing: Arc<AtomicBool>,
    active: Arc<AtomicBool>,
    control_tx: mpsc::Sender<PlaybackCommand>,
    handle: Option<JoinHandle<()>>,
}

/// Producer side handed to the capture pipeline.
pub struct PlaybackQueue {
    bridge: FormatBridge,
    tx: mpsc::Sender<PlaybackCommand>,
    recycled: mpsc::Receiver<Vec<f32>>,
    spare: Option<Vec<f32>>,
    period_samples: usize,
}

impl PlaybackScheduler {
    /// Spawn the playback worker. `queue_depth` bounds how many buffers may
    /// wait for the sink before `enqueue` starts reporting backpressure.
    pub fn start(
        sink: Box<dyn PlaybackSink>,
        bridge: FormatBridge,
        queue_depth: usize,
    ) -> Result<(Self, PlaybackQueue)> {
        let queue_depth = queue_depth.max(1);
        let (tx, rx) = mpsc::channel::<PlaybackCommand>(queue_depth);
        let (recycle_tx, recycled) = mpsc::channel::<Vec<f32>>(queue_depth + 1);
        let flushing = Arc::new(AtomicBool::new(false));
        let active = Arc::new(AtomicBool::new(false));

        let handle = {
            let flushing = flushing.clone();
            let active = active.clone();
            thread::Builder::new()
                .name("audio-play".into())
                .spawn(move || play_loop(sink, rx, recycle_tx, &flushing, &active))?
        };

        let format = bridge.format();
        let queue = PlaybackQueue {
            bridge,
            tx: tx.clone(),
            recycled,
            spare: None,
            period_samples: format.period_frames * format.channels as usize,
        };

        Ok((
            Self {
                flushing,
                active,
                control_tx: tx,
                handle: Some(handle),
            },
            queue,
        ))
    }

    /// Whether the sink has been started and not stopped since.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Buffers waiting for the worker.
    pub fn queued(&self) -> usize {
        self.control_tx.max_capacity() - self.control_tx.capacity()
    }

    /// Drop everything still queued, stop the sink and join the worker.
    pub fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        self.flushing.store(true, Ordering::Release);
        // A full queue wakes the worker anyway; it sees `flushing` on the next item.
        let _ = self.control_tx.try_send(PlaybackCommand::Stop);
        if handle.join().is_err() {
            log::error!("Playback thread panicked");
            self.active.store(false, Ordering::Release);
        }
    }
}

impl Drop for PlaybackScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

impl PlaybackQueue {
    /// Copy `buffer` into interleaved playback format and queue it.
    ///
    /// Never blocks. Buffers are reused once the worker has played them, so
    /// in steady state this does not allocate.
    pub fn enqueue(&mut self, buffer: &AudioBuffer) -> Result<(), BufferError> {
        let mut samples = match self.spare.take() {
            Some(v) => v,
            None => self
                .recycled
                .try_recv()
                .unwrap_or_else(|_| Vec::with_capacity(self.period_samples)),
        };

        if let Err(e) = self.bridge.from_planar(buffer, &mut samples) {
            self.spare = Some(samples);
            return Err(e.into());
        }

        match self.tx.try_send(PlaybackCommand::Play(samples)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(cmd)) => {
                if let PlaybackCommand::Play(samples) = cmd {
                    self.spare = Some(samples);
                }
                Err(BufferError::Backpressure)
            }
            Err(TrySendError::Closed(_)) => Err(BufferError::PlaybackClosed),
        }
    }
}

// ======================== Playback thread ========================

fn play_loop(
    mut sink: Box<dyn PlaybackSink>,
    mut rx: mpsc::Receiver<PlaybackCommand>,
    recycle_tx: mpsc::Sender<Vec<f32>>,
    flushing: &AtomicBool,
    active: &AtomicBool,
) {
    log::info!("Playback worker started");
    let mut start_failures = 0u64;

    while let Some(cmd) = rx.blocking_recv() {
        let samples = match cmd {
            PlaybackCommand::Play(samples) => samples,
            PlaybackCommand::Stop => break,
        };
        if flushing.load(Ordering::Acquire) {
            break;
        }

        if !active.load(Ordering::Acquire) {
            match sink.start() {
                Ok(()) => {
                    active.store(true, Ordering::Release);
                    start_failures = 0;
                    log::info!("Player activated");
                }
                Err(e) => {
                    start_failures += 1;
                    if should_log(start_failures) {
                        log::error!("Failed to start player (attempt {}): {:#}", start_failures, e);
                    }
                    let _ = recycle_tx.try_send(samples);
                    continue;
                }
            }
        }

        if let Err(e) = sink.write(&samples) {
            log::error!("Playback write failed: {:#}", e);
        }
        let _ = recycle_tx.try_send(samples);
    }

    // Flush whatever is still queued without playing it.
    rx.close();
    let mut flushed = 0usize;
    while let Ok(cmd) = rx.try_recv() {
        if let PlaybackCommand::Play(_) = cmd {
            flushed += 1;
        }
    }

    if active.swap(false, Ordering::AcqRel) {
        sink.stop();
    }
    log::info!("Playback stopped, {} queued buffers flushed", flushed);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::backend::StreamFormat;
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    #[derive(Default)]
    struct Shared {
        started: usize,
        stopped: usize,
        written: Vec<Vec<f32>>,
    }

    struct RecordingSink {
        shared: Arc<Mutex<Shared>>,
        delay: Duration,
    }

    impl PlaybackSink for RecordingSink {
        fn start(&mut self) -> Result<()> {
            self.shared.lock().unwrap().started += 1;
            Ok(())
        }

        fn write(&mut self, interleaved: &[f32]) -> Result<()> {
            thread::sleep(self.delay);
            self.shared.lock().unwrap().written.push(interleaved.to_vec());
            Ok(())
        }

        fn stop(&mut self) {
            self.shared.lock().unwrap().stopped += 1;
        }
    }

    /// A sink whose device never comes up.
    struct DeadSink {
        shared: Arc<Mutex<Shared>>,
    }

    impl PlaybackSink for DeadSink {
        fn start(&mut self) -> Result<()> {
            self.shared.lock().unwrap().started += 1;
            anyhow::bail!("device busy")
        }

        fn write(&mut self, interleaved: &[f32]) -> Result<()> {
            self.shared.lock().unwrap().written.push(interleaved.to_vec());
            Ok(())
        }

        fn stop(&mut self) {
            self.shared.lock().unwrap().stopped += 1;
        }
    }

    fn mono_bridge() -> FormatBridge {
        FormatBridge::new(StreamFormat {
            sample_rate: 48000,
            channels: 1,
            period_frames: 4,
        })
    }

    fn tagged(tag: f32) -> AudioBuffer {
        AudioBuffer::from_channels(48000, vec![vec![tag; 4]]).unwrap()
    }

    fn wait_for(mut cond: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !cond() {
            assert!(Instant::now() < deadline, "timed out");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn buffers_play_in_enqueue_order() {
        let shared = Arc::new(Mutex::new(Shared::default()));
        let sink = RecordingSink { shared: shared.clone(), delay: Duration::ZERO };
        let (mut scheduler, mut queue) = PlaybackScheduler::start(Box::new(sink), mono_bridge(), 64).unwrap();

        for i in 0..32 {
            queue.enqueue(&tagged(i as f32)).unwrap();
        }
        wait_for(|| shared.lock().unwrap().written.len() == 32);
        assert!(scheduler.is_active());

        let order: Vec<f32> = shared.lock().unwrap().written.iter().map(|b| b[0]).collect();
        let expected: Vec<f32> = (0..32).map(|i| i as f32).collect();
        assert_eq!(order, expected);
        assert_eq!(shared.lock().unwrap().started, 1);

        scheduler.stop();
        assert!(!scheduler.is_active());
        assert_eq!(shared.lock().unwrap().stopped, 1);
    }

    #[test]
    fn full_queue_reports_backpressure_and_stop_flushes() {
        let shared = Arc::new(Mutex::new(Shared::default()));
        let sink = RecordingSink { shared: shared.clone(), delay: Duration::from_millis(50) };
        let (mut scheduler, mut queue) = PlaybackScheduler::start(Box::new(sink), mono_bridge(), 2).unwrap();

        let results: Vec<_> = (0..10).map(|i| queue.enqueue(&tagged(i as f32))).collect();
        assert!(results.contains(&Err(BufferError::Backpressure)));

        scheduler.stop();
        let shared = shared.lock().unwrap();
        assert!(shared.written.len() < 10);
        // Whatever was played kept its order.
        for pair in shared.written.windows(2) {
            assert!(pair[0][0] < pair[1][0]);
        }
        drop(shared);

        assert_eq!(queue.enqueue(&tagged(99.0)), Err(BufferError::PlaybackClosed));
    }

    #[test]
    fn failing_sink_start_is_retried_without_writing() {
        let shared = Arc::new(Mutex::new(Shared::default()));
        let sink = DeadSink { shared: shared.clone() };
        let (mut scheduler, mut queue) = PlaybackScheduler::start(Box::new(sink), mono_bridge(), 8).unwrap();

        for round in 0..50 {
            wait_for(|| queue.enqueue(&tagged(round as f32)).is_ok());
        }
        wait_for(|| shared.lock().unwrap().started == 50);
        assert!(!scheduler.is_active());

        scheduler.stop();
        let shared = shared.lock().unwrap();
        assert!(shared.written.is_empty());
        assert_eq!(shared.stopped, 0);
    }

    #[test]
    fn idle_scheduler_stops_without_touching_the_sink() {
        let shared = Arc::new(Mutex::new(Shared::default()));
        let sink = RecordingSink { shared: shared.clone(), delay: Duration::ZERO };
        let (mut scheduler, _queue) = PlaybackScheduler::start(Box::new(sink), mono_bridge(), 4).unwrap();
        assert_eq!(scheduler.queued(), 0);

        scheduler.stop();
        scheduler.stop();
        let shared = shared.lock().unwrap();
        assert_eq!(shared.started, 0);
        assert_eq!(shared.stopped, 0);
    }
}

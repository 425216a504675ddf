#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use noise_bridge::audio::{
    AudioBackend, AudioBuffer, CaptureStream, NativeBuffer, PlaybackSink, StreamFormat,
};
use noise_bridge::engine::{EngineSession, ProcessingEngine, SimulatedEngine};

/// What the scripted devices saw.
#[derive(Default)]
pub struct DeviceTrace {
    pub reads: AtomicUsize,
    pub captured: Mutex<Vec<Vec<f32>>>,
    pub played: Mutex<Vec<Vec<f32>>>,
    pub sink_started: AtomicUsize,
    pub sink_stopped: AtomicUsize,
}

impl DeviceTrace {
    pub fn played_count(&self) -> usize {
        self.played.lock().unwrap().len()
    }
}

pub struct ScriptedBackend {
    pub format: StreamFormat,
    pub period: Duration,
    pub fail_capture: bool,
    pub fail_playback: bool,
    /// Capture hands out zero-channel periods.
    pub malformed: bool,
    pub trace: Arc<DeviceTrace>,
}

impl ScriptedBackend {
    pub fn new(format: StreamFormat) -> (Self, Arc<DeviceTrace>) {
        let trace = Arc::new(DeviceTrace::default());
        (
            Self {
                format,
                period: Duration::from_millis(2),
                fail_capture: false,
                fail_playback: false,
                malformed: false,
                trace: trace.clone(),
            },
            trace,
        )
    }
}

impl AudioBackend for ScriptedBackend {
    fn open_capture(&mut self) -> Result<Box<dyn CaptureStream>> {
        if self.fail_capture {
            anyhow::bail!("no capture device");
        }
        Ok(Box::new(ScriptedCapture {
            format: self.format,
            period: self.period,
            seq: 0,
            malformed: self.malformed,
            buf: vec![0.0; self.format.period_frames * self.format.channels as usize],
            trace: self.trace.clone(),
        }))
    }

    fn open_playback(&mut self, format: StreamFormat) -> Result<Box<dyn PlaybackSink>> {
        if self.fail_playback {
            anyhow::bail!("no playback device");
        }
        assert_eq!(format, self.format);
        Ok(Box::new(RecordingSink {
            trace: self.trace.clone(),
        }))
    }
}

/// Produces a distinct interleaved ramp each period.
struct ScriptedCapture {
    format: StreamFormat,
    period: Duration,
    seq: u64,
    malformed: bool,
    buf: Vec<f32>,
    trace: Arc<DeviceTrace>,
}

impl CaptureStream for ScriptedCapture {
    fn format(&self) -> StreamFormat {
        self.format
    }

    fn read(&mut self) -> Result<NativeBuffer<'_>> {
        thread::sleep(self.period);
        self.seq += 1;
        let len = self.buf.len() as f32;
        for (i, s) in self.buf.iter_mut().enumerate() {
            *s = (i as f32 / len - 0.5) * 0.5 + (self.seq % 97) as f32 * 1e-3;
        }
        self.trace.reads.fetch_add(1, Ordering::SeqCst);
        self.trace.captured.lock().unwrap().push(self.buf.clone());
        let channels = if self.malformed { 0 } else { self.format.channels as usize };
        Ok(NativeBuffer::Interleaved {
            samples: &self.buf,
            channels,
        })
    }

    fn recover(&mut self) -> Result<()> {
        Ok(())
    }
}

struct RecordingSink {
    trace: Arc<DeviceTrace>,
}

impl PlaybackSink for RecordingSink {
    fn start(&mut self) -> Result<()> {
        self.trace.sink_started.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn write(&mut self, interleaved: &[f32]) -> Result<()> {
        self.trace.played.lock().unwrap().push(interleaved.to_vec());
        Ok(())
    }

    fn stop(&mut self) {
        self.trace.sink_stopped.fetch_add(1, Ordering::SeqCst);
    }
}

/// Counts sessions and records every level `process` and `set_noise_level` see.
#[derive(Default)]
pub struct EngineTrace {
    pub created: AtomicUsize,
    pub destroyed: AtomicUsize,
    pub in_process: AtomicBool,
    pub destroyed_during_process: AtomicBool,
    pub processed_levels: Mutex<Vec<f32>>,
    pub set_levels: Mutex<Vec<f32>>,
}

pub struct InstrumentedEngine {
    inner: SimulatedEngine,
    pub trace: Arc<EngineTrace>,
    process_delay: Duration,
    reject: bool,
    fail: bool,
}

impl InstrumentedEngine {
    pub fn new() -> Self {
        Self {
            inner: SimulatedEngine::with_seed(1),
            trace: Arc::new(EngineTrace::default()),
            process_delay: Duration::ZERO,
            reject: false,
            fail: false,
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            process_delay: delay,
            ..Self::new()
        }
    }

    /// Sessions open fine but every `process` call reports failure.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn rejecting() -> Self {
        Self {
            reject: true,
            ..Self::new()
        }
    }
}

impl ProcessingEngine for InstrumentedEngine {
    fn name(&self) -> &'static str {
        "instrumented"
    }

    fn create(&self, sample_rate: u32, channels: u32) -> Option<Box<dyn EngineSession>> {
        if self.reject {
            return None;
        }
        let inner = self.inner.create(sample_rate, channels)?;
        self.trace.created.fetch_add(1, Ordering::SeqCst);
        Some(Box::new(InstrumentedSession {
            inner,
            trace: self.trace.clone(),
            delay: self.process_delay,
            fail: self.fail,
        }))
    }
}

struct InstrumentedSession {
    inner: Box<dyn EngineSession>,
    trace: Arc<EngineTrace>,
    delay: Duration,
    fail: bool,
}

impl EngineSession for InstrumentedSession {
    fn process(&mut self, input: &AudioBuffer, output: &mut AudioBuffer, noise_level: f32) -> i32 {
        self.trace.in_process.store(true, Ordering::SeqCst);
        thread::sleep(self.delay);
        self.trace.processed_levels.lock().unwrap().push(noise_level);
        let status = if self.fail {
            0
        } else {
            self.inner.process(input, output, noise_level)
        };
        self.trace.in_process.store(false, Ordering::SeqCst);
        status
    }

    fn set_noise_level(&mut self, level: f32) {
        self.trace.set_levels.lock().unwrap().push(level);
        self.inner.set_noise_level(level);
    }

    fn noise_level(&self) -> f32 {
        self.inner.noise_level()
    }
}

impl Drop for InstrumentedSession {
    fn drop(&mut self) {
        if self.trace.in_process.load(Ordering::SeqCst) {
            self.trace.destroyed_during_process.store(true, Ordering::SeqCst);
        }
        self.trace.destroyed.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn stereo_48k() -> StreamFormat {
    StreamFormat {
        sample_rate: 48000,
        channels: 2,
        period_frames: 1024,
    }
}

pub fn wait_for(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(1));
    }
}

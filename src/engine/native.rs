//! Safe wrapper around the native noise engine (`native/noise_engine.c`).

use std::ffi::{c_int, c_void};

use super::{EngineSession, ProcessingEngine};
use crate::audio::AudioBuffer;

// ======================== FFI declarations ========================

unsafe extern "C" {
    fn noise_engine_create(sample_rate: c_int, channels: c_int) -> *mut c_void;
    fn noise_engine_process(
        engine: *mut c_void,
        input: *const *const f32,
        output: *const *mut f32,
        frames: c_int,
        noise_level: f32,
    ) -> c_int;
    fn noise_engine_set_noise_level(engine: *mut c_void, noise_level: f32);
    fn noise_engine_get_noise_level(engine: *mut c_void) -> f32;
    fn noise_engine_destroy(engine: *mut c_void);
}

/// The native engine linked by `build.rs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeEngine;

impl ProcessingEngine for NativeEngine {
    fn name(&self) -> &'static str {
        "native"
    }

    fn create(&self, sample_rate: u32, channels: u32) -> Option<Box<dyn EngineSession>> {
        NativeSession::new(sample_rate, channels).map(|s| Box::new(s) as Box<dyn EngineSession>)
    }
}

/// Owns one native engine handle.
pub struct NativeSession {
    handle: *mut c_void,
    channels: usize,
    // Per-call pointer tables; capacity is reserved up front so filling them
    // on the capture thread does not allocate.
    input_ptrs: Vec<*const f32>,
    output_ptrs: Vec<*mut f32>,
}

// The handle is only ever used through `&mut self`, i.e. from one thread at a time.
unsafe impl Send for NativeSession {}

impl NativeSession {
    pub fn new(sample_rate: u32, channels: u32) -> Option<Self> {
        let rate = c_int::try_from(sample_rate).ok()?;
        let ch = c_int::try_from(channels).ok()?;
        let handle = unsafe { noise_engine_create(rate, ch) };
        if handle.is_null() {
            return None;
        }
        Some(Self {
            handle,
            channels: channels as usize,
            input_ptrs: Vec::with_capacity(channels as usize),
            output_ptrs: Vec::with_capacity(channels as usize),
        })
    }
}

impl EngineSession for NativeSession {
    fn process(&mut self, input: &AudioBuffer, output: &mut AudioBuffer, noise_level: f32) -> i32 {
        let frames = input.frame_count();
        if input.channel_count() != self.channels
            || output.channel_count() != self.channels
            || output.frame_count() != frames
        {
            return 0;
        }
        let Ok(frames) = c_int::try_from(frames) else {
            return 0;
        };

        self.input_ptrs.clear();
        self.input_ptrs.extend(input.channels().map(<[f32]>::as_ptr));
        self.output_ptrs.clear();
        self.output_ptrs.extend(output.channels_mut().map(<[f32]>::as_mut_ptr));

        // The engine reads `channels` input spans and writes the same number of
        // output spans, `frames` samples each, and keeps none of the pointers
        // past the call. Both buffers stay borrowed until it returns.
        let status = unsafe {
            noise_engine_process(
                self.handle,
                self.input_ptrs.as_ptr(),
                self.output_ptrs.as_ptr(),
                frames,
                noise_level,
            )
        };
        self.input_ptrs.clear();
        self.output_ptrs.clear();
        status
    }

    fn set_noise_level(&mut self, level: f32) {
        unsafe {
            noise_engine_set_noise_level(self.handle, level);
        }
    }

    fn noise_level(&self) -> f32 {
        unsafe { noise_engine_get_noise_level(self.handle) }
    }
}

impl Drop for NativeSession {
    fn drop(&mut self) {
        unsafe {
            noise_engine_destroy(self.handle);
        }
    }
}

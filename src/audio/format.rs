//! Conversion between the audio subsystem's buffer layouts and the planar
//! layout the processing engine expects.

use super::backend::StreamFormat;
use crate::error::FormatError;

/// A transient view of one captured period, valid only until the next read
/// from the capture stream.
#[derive(Debug, Clone, Copy)]
pub enum NativeBuffer<'a> {
    /// Frame-major: `[L0, R0, L1, R1, ...]`.
    Interleaved { samples: &'a [f32], channels: usize },
    /// Channel-major: `[L0, L1, ..., R0, R1, ...]`, one span per channel.
    Planar { samples: &'a [f32], channels: usize },
}

impl NativeBuffer<'_> {
    pub fn channels(&self) -> usize {
        match *self {
            NativeBuffer::Interleaved { channels, .. } | NativeBuffer::Planar { channels, .. } => {
                channels
            }
        }
    }

    pub fn samples(&self) -> &[f32] {
        match *self {
            NativeBuffer::Interleaved { samples, .. } | NativeBuffer::Planar { samples, .. } => {
                samples
            }
        }
    }

    /// Frames in the buffer; zero when the channel count is zero.
    pub fn frames(&self) -> usize {
        match self.channels() {
            0 => 0,
            ch => self.samples().len() / ch,
        }
    }
}

/// Planar float audio: one contiguous span per channel, all `frame_count` long.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    sample_rate: u32,
    frames: usize,
    channels: Vec<Vec<f32>>,
}

impl AudioBuffer {
    /// An empty buffer with room for `capacity_frames` per channel, so that
    /// refilling it up to that size never allocates.
    pub fn with_capacity(sample_rate: u32, channels: usize, capacity_frames: usize) -> Self {
        Self {
            sample_rate,
            frames: 0,
            channels: (0..channels)
                .map(|_| Vec::with_capacity(capacity_frames))
                .collect(),
        }
    }

    pub fn from_channels(sample_rate: u32, channels: Vec<Vec<f32>>) -> Result<Self, FormatError> {
        let frames = channels.first().map_or(0, Vec::len);
        if channels.is_empty() || frames == 0 {
            return Err(FormatError::Empty {
                frames,
                channels: channels.len(),
            });
        }
        if let Some((channel, data)) = channels.iter().enumerate().find(|(_, c)| c.len() != frames) {
            return Err(FormatError::ChannelLength {
                channel,
                len: data.len(),
                expected: frames,
            });
        }
        Ok(Self {
            sample_rate,
            frames,
            channels,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frame_count(&self) -> usize {
        self.frames
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index]
    }

    pub fn channel_mut(&mut self, index: usize) -> &mut [f32] {
        &mut self.channels[index]
    }

    pub fn channels(&self) -> impl ExactSizeIterator<Item = &[f32]> {
        self.channels.iter().map(Vec::as_slice)
    }

    pub fn channels_mut(&mut self) -> impl ExactSizeIterator<Item = &mut [f32]> {
        self.channels.iter_mut().map(Vec::as_mut_slice)
    }

    /// Set every channel to `frames` samples. New samples are zeroed.
    pub fn resize(&mut self, frames: usize) {
        for channel in &mut self.channels {
            channel.resize(frames, 0.0);
        }
        self.frames = frames;
    }
}

/// Converts buffers for one session-bound stream format.
#[derive(Debug, Clone, Copy)]
pub struct FormatBridge {
    format: StreamFormat,
}

impl FormatBridge {
    pub fn new(format: StreamFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> StreamFormat {
        self.format
    }

    /// A planar buffer sized for this format's period.
    pub fn planar_buffer(&self) -> AudioBuffer {
        AudioBuffer::with_capacity(
            self.format.sample_rate,
            self.format.channels as usize,
            self.format.period_frames,
        )
    }

    /// Deinterleave/reshape `native` into `out`.
    ///
    /// `out` must have been created for this format; it is resized to the
    /// native frame count.
    pub fn to_planar(&self, native: &NativeBuffer<'_>, out: &mut AudioBuffer) -> Result<(), FormatError> {
        let channels = native.channels();
        let samples = native.samples();
        if channels == 0 || samples.is_empty() {
            return Err(FormatError::Empty {
                frames: native.frames(),
                channels,
            });
        }
        self.check_channels(channels)?;
        if out.channel_count() != channels {
            return Err(FormatError::ChannelMismatch {
                expected: out.channel_count(),
                actual: channels,
            });
        }
        if samples.len() % channels != 0 {
            return Err(FormatError::Ragged {
                len: samples.len(),
                channels,
            });
        }

        let frames = samples.len() / channels;
        out.resize(frames);
        out.sample_rate = self.format.sample_rate;

        match *native {
            NativeBuffer::Interleaved { .. } => {
                for (i, frame) in samples.chunks_exact(channels).enumerate() {
                    for (dst, &sample) in out.channels.iter_mut().zip(frame) {
                        dst[i] = sample;
                    }
                }
            }
            NativeBuffer::Planar { .. } => {
                for (dst, src) in out.channels.iter_mut().zip(samples.chunks_exact(frames)) {
                    dst.copy_from_slice(src);
                }
            }
        }
        Ok(())
    }

    /// Interleave `buffer` into `out`, which ends up exactly
    /// `frame_count * channel_count` samples long.
    pub fn from_planar(&self, buffer: &AudioBuffer, out: &mut Vec<f32>) -> Result<(), FormatError> {
        let channels = buffer.channel_count();
        let frames = buffer.frame_count();
        if channels == 0 || frames == 0 {
            return Err(FormatError::Empty { frames, channels });
        }
        self.check_channels(channels)?;

        out.clear();
        out.resize(frames * channels, 0.0);
        for (ch, src) in buffer.channels().enumerate() {
            for (i, &sample) in src.iter().enumerate() {
                out[i * channels + ch] = sample;
            }
        }
        Ok(())
    }

    fn check_channels(&self, actual: usize) -> Result<(), FormatError> {
        let expected = self.format.channels as usize;
        if actual != expected {
            return Err(FormatError::ChannelMismatch { expected, actual });
        }
        Ok(())
    }
}

//! ALSA PCM devices backing the capture/playback graph.

use alsa::pcm::{Access, Format, HwParams, PCM};
use alsa::{Direction, ValueOr};
use anyhow::{Context, Result};

use super::backend::{AudioBackend, CaptureStream, PlaybackSink, StreamFormat};
use super::format::NativeBuffer;

/// Audio device configuration.
#[derive(Debug, Clone)]
pub struct AudioConfig {
    /// ALSA capture device name (e.g. "default", "plughw:0,0")
    pub capture_device: String,
    /// ALSA playback device name
    pub playback_device: String,
    /// Desired capture sample rate (may be negotiated by hardware)
    pub sample_rate: u32,
    /// Desired capture channel count
    pub channels: u32,
    /// Desired period size in frames
    pub period_frames: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            capture_device: "default".to_string(),
            playback_device: "default".to_string(),
            sample_rate: 48000,
            channels: 2,
            period_frames: 1024,
        }
    }
}

/// Opens ALSA devices named in an [`AudioConfig`].
pub struct AlsaBackend {
    config: AudioConfig,
}

impl AlsaBackend {
    pub fn new(config: AudioConfig) -> Self {
        Self { config }
    }
}

impl AudioBackend for AlsaBackend {
    fn open_capture(&mut self) -> Result<Box<dyn CaptureStream>> {
        let requested = StreamFormat {
            sample_rate: self.config.sample_rate,
            channels: self.config.channels,
            period_frames: self.config.period_frames,
        };
        let (pcm, format) = open_pcm(&self.config.capture_device, Direction::Capture, requested)?;
        check_capture_format(format)?;
        let read_buf = vec![0.0f32; format.period_frames * format.channels as usize];
        Ok(Box::new(AlsaCapture {
            pcm,
            format,
            read_buf,
        }))
    }

    fn open_playback(&mut self, format: StreamFormat) -> Result<Box<dyn PlaybackSink>> {
        let (pcm, negotiated) = open_pcm(&self.config.playback_device, Direction::Playback, format)?;
        check_playback_format(&self.config.playback_device, format, negotiated)?;
        Ok(Box::new(AlsaPlayback {
            pcm,
            channels: format.channels as usize,
        }))
    }
}

/// The capture side dictates the graph format, so it must describe real audio.
fn check_capture_format(format: StreamFormat) -> Result<()> {
    if format.sample_rate == 0 || format.channels == 0 || format.period_frames == 0 {
        anyhow::bail!("Capture device negotiated an unusable format: {:?}", format);
    }
    Ok(())
}

/// Playback has to run at the capture rate and width; the period may differ.
fn check_playback_format(device: &str, wanted: StreamFormat, got: StreamFormat) -> Result<()> {
    if got.sample_rate != wanted.sample_rate || got.channels != wanted.channels {
        anyhow::bail!(
            "Playback device '{}' cannot match capture format: wanted {}Hz/{}ch, got {}Hz/{}ch",
            device,
            wanted.sample_rate,
            wanted.channels,
            got.sample_rate,
            got.channels,
        );
    }
    Ok(())
}

struct AlsaCapture {
    pcm: PCM,
    format: StreamFormat,
    // ALSA read buffer (interleaved f32, one period)
    read_buf: Vec<f32>,
}

impl CaptureStream for AlsaCapture {
    fn format(&self) -> StreamFormat {
        self.format
    }

    fn read(&mut self) -> Result<NativeBuffer<'_>> {
        let io = self.pcm.io_f32()?;
        let frames = io.readi(&mut self.read_buf)?;
        let channels = self.format.channels as usize;
        Ok(NativeBuffer::Interleaved {
            samples: &self.read_buf[..frames * channels],
            channels,
        })
    }

    fn recover(&mut self) -> Result<()> {
        self.pcm.prepare().context("Failed to recover PCM capture")
    }
}

struct AlsaPlayback {
    pcm: PCM,
    channels: usize,
}

impl PlaybackSink for AlsaPlayback {
    fn start(&mut self) -> Result<()> {
        self.pcm.prepare().context("Failed to prepare PCM playback")
    }

    fn write(&mut self, interleaved: &[f32]) -> Result<()> {
        let io = self.pcm.io_f32()?;
        // Retry loop handles short writes and XRUN recovery without losing frames.
        let total_frames = interleaved.len() / self.channels;
        let mut frames_written = 0;
        while frames_written < total_frames {
            let offset = frames_written * self.channels;
            match io.writei(&interleaved[offset..]) {
                Ok(n) => {
                    frames_written += n;
                }
                Err(e) => {
                    log::warn!("ALSA playback error: {}, recovering...", e);
                    self.pcm
                        .prepare()
                        .context("Failed to recover PCM playback")?;
                    // After recovery, the loop retries writing remaining frames
                }
            }
        }
        Ok(())
    }

    fn stop(&mut self) {
        if let Err(e) = self.pcm.drop() {
            log::warn!("Failed to stop PCM playback: {}", e);
        }
    }
}

/// Open `device` for float interleaved I/O close to `requested`, and return
/// the format the hardware actually accepted.
fn open_pcm(device: &str, direction: Direction, requested: StreamFormat) -> Result<(PCM, StreamFormat)> {
    let side = match direction {
        Direction::Capture => "capture",
        Direction::Playback => "playback",
    };
    let pcm = PCM::new(device, direction, false)
        .with_context(|| format!("Failed to open {} device '{}'", side, device))?;

    {
        let hwp = HwParams::any(&pcm).context("No hardware configuration available")?;
        hwp.set_access(Access::RWInterleaved)?;
        hwp.set_format(Format::FloatLE)?;
        hwp.set_channels(requested.channels)?;
        hwp.set_rate_near(requested.sample_rate, ValueOr::Nearest)?;
        hwp.set_period_size_near(requested.period_frames as alsa::pcm::Frames, ValueOr::Nearest)?;
        pcm.hw_params(&hwp)
            .with_context(|| format!("Device '{}' rejected {:?}", device, requested))?;
    }

    let negotiated = {
        let hwp = pcm.hw_params_current()?;
        StreamFormat {
            sample_rate: hwp.get_rate()?,
            channels: hwp.get_channels()?,
            period_frames: hwp.get_period_size()? as usize,
        }
    };

    if negotiated != requested {
        log::info!(
            "{} '{}': asked for {} Hz/{} ch/{} frames, using {} Hz/{} ch/{} frames",
            side,
            device,
            requested.sample_rate,
            requested.channels,
            requested.period_frames,
            negotiated.sample_rate,
            negotiated.channels,
            negotiated.period_frames,
        );
    } else {
        log::info!("{} '{}' opened at {:?}", side, device, negotiated);
    }

    Ok((pcm, negotiated))
}

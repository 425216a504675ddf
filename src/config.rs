use serde::{Deserialize, Serialize};

use crate::audio::AudioConfig;

/// Which processing engine backs the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Native,
    Simulated,
}

impl EngineKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "native" => Some(Self::Native),
            "simulated" => Some(Self::Simulated),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Config {
    pub app_name: &'static str,
    pub app_version: &'static str,

    // 音频设备配置
    pub capture_device: &'static str,
    pub playback_device: &'static str,
    pub sample_rate: u32,
    pub channels: u32,
    pub period_frames: usize,

    // 引擎配置
    pub engine: EngineKind,
    pub initial_noise_level: f32,

    // 控制面配置
    pub queue_depth: usize,
    pub event_log_capacity: usize,
}

impl Config {
    /// 从编译时设置的环境变量创建配置
    /// 所有参数都在编译时从 config.toml 中读取
    pub fn new() -> Result<Self, &'static str> {
        Ok(Self {
            app_name: env!("APP_NAME"),
            app_version: env!("APP_VERSION"),

            capture_device: env!("AUDIO_CAPTURE_DEVICE"),
            playback_device: env!("AUDIO_PLAYBACK_DEVICE"),
            sample_rate: env!("AUDIO_SAMPLE_RATE").parse()
                .map_err(|_| "Failed to parse AUDIO_SAMPLE_RATE")?,
            channels: env!("AUDIO_CHANNELS").parse()
                .map_err(|_| "Failed to parse AUDIO_CHANNELS")?,
            period_frames: env!("AUDIO_PERIOD_FRAMES").parse()
                .map_err(|_| "Failed to parse AUDIO_PERIOD_FRAMES")?,

            engine: EngineKind::parse(env!("ENGINE_KIND"))
                .ok_or("ENGINE_KIND must be \"native\" or \"simulated\"")?,
            initial_noise_level: env!("ENGINE_INITIAL_NOISE_LEVEL").parse()
                .map_err(|_| "Failed to parse ENGINE_INITIAL_NOISE_LEVEL")?,

            queue_depth: env!("CONTROL_QUEUE_DEPTH").parse()
                .map_err(|_| "Failed to parse CONTROL_QUEUE_DEPTH")?,
            event_log_capacity: env!("CONTROL_EVENT_LOG_CAPACITY").parse()
                .map_err(|_| "Failed to parse CONTROL_EVENT_LOG_CAPACITY")?,
        })
    }

    pub fn audio(&self) -> AudioConfig {
        AudioConfig {
            capture_device: self.capture_device.to_string(),
            playback_device: self.playback_device.to_string(),
            sample_rate: self.sample_rate,
            channels: self.channels,
            period_frames: self.period_frames,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "noise-bridge",
            app_version: "0.1.0",
            capture_device: "default",
            playback_device: "default",
            sample_rate: 48000,
            channels: 2,
            period_frames: 1024,
            engine: EngineKind::Native,
            initial_noise_level: 0.01,
            queue_depth: 8,
            event_log_capacity: 50,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_time_config_parses() {
        let config = Config::new().expect("config.toml values should parse");
        assert!(config.channels > 0);
        assert!(config.period_frames > 0);
        assert!((0.0..=1.0).contains(&config.initial_noise_level));
    }

    #[test]
    fn engine_kind_is_case_insensitive() {
        assert_eq!(EngineKind::parse("Native"), Some(EngineKind::Native));
        assert_eq!(EngineKind::parse(" simulated "), Some(EngineKind::Simulated));
        assert_eq!(EngineKind::parse("webrtc"), None);
    }
}

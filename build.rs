use std::fs;
use std::path::Path;
use serde::Deserialize;

#[derive(Deserialize)]
struct Config {
    application: Application,
    audio: Audio,
    engine: Engine,
    control: Control,
}

#[derive(Deserialize)]
struct Application {
    name: String,
    version: String,
}

#[derive(Deserialize)]
struct Audio {
    capture_device: String,
    playback_device: String,
    sample_rate: u32,
    channels: u32,
    period_frames: usize,
}

#[derive(Deserialize)]
struct Engine {
    kind: String,
    initial_noise_level: f32,
}

#[derive(Deserialize)]
struct Control {
    queue_depth: usize,
    event_log_capacity: usize,
}

fn main() {
    println!("cargo:rerun-if-changed=config.toml");
    println!("cargo:rerun-if-changed=native/noise_engine.c");
    println!("cargo:rerun-if-changed=native/noise_engine.h");

    let config_path = Path::new("config.toml");
    if !config_path.exists() {
        panic!("config.toml not found!");
    }

    let config_str = fs::read_to_string(config_path).expect("Failed to read config.toml");
    let config: Config = toml::from_str(&config_str).expect("Failed to parse config.toml");

    println!("cargo:rustc-env=APP_NAME={}", config.application.name);
    println!("cargo:rustc-env=APP_VERSION={}", config.application.version);

    // 音频配置
    println!("cargo:rustc-env=AUDIO_CAPTURE_DEVICE={}", config.audio.capture_device);
    println!("cargo:rustc-env=AUDIO_PLAYBACK_DEVICE={}", config.audio.playback_device);
    println!("cargo:rustc-env=AUDIO_SAMPLE_RATE={}", config.audio.sample_rate);
    println!("cargo:rustc-env=AUDIO_CHANNELS={}", config.audio.channels);
    println!("cargo:rustc-env=AUDIO_PERIOD_FRAMES={}", config.audio.period_frames);

    // 引擎配置
    println!("cargo:rustc-env=ENGINE_KIND={}", config.engine.kind);
    println!("cargo:rustc-env=ENGINE_INITIAL_NOISE_LEVEL={}", config.engine.initial_noise_level);

    println!("cargo:rustc-env=CONTROL_QUEUE_DEPTH={}", config.control.queue_depth);
    println!("cargo:rustc-env=CONTROL_EVENT_LOG_CAPACITY={}", config.control.event_log_capacity);

    link_noise_engine();
}

/// Prefer an installed libnoise-engine; fall back to the bundled C source.
fn link_noise_engine() {
    if pkg_config::Config::new().probe("noise-engine").is_ok() {
        return;
    }

    cc::Build::new()
        .file("native/noise_engine.c")
        .include("native")
        .opt_level(2)
        .warnings(true)
        .compile("noise_engine");
}

//! In-process noise engine honoring the same contract as the native one.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{EngineSession, ProcessingEngine};
use crate::audio::AudioBuffer;

pub const MIN_SAMPLE_RATE: u32 = 8000;
pub const MAX_SAMPLE_RATE: u32 = 192_000;
pub const MAX_CHANNELS: u32 = 8;

/// Adds uniform noise in `[-level, level]` to every sample.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimulatedEngine {
    seed: Option<u64>,
}

impl SimulatedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deterministic noise, for reproducible runs.
    pub fn with_seed(seed: u64) -> Self {
        Self { seed: Some(seed) }
    }
}

impl ProcessingEngine for SimulatedEngine {
    fn name(&self) -> &'static str {
        "simulated"
    }

    fn create(&self, sample_rate: u32, channels: u32) -> Option<Box<dyn EngineSession>> {
        if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&sample_rate)
            || !(1..=MAX_CHANNELS).contains(&channels)
        {
            return None;
        }
        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Some(Box::new(SimulatedSession {
            channels: channels as usize,
            noise_level: 0.0,
            rng,
        }))
    }
}

struct SimulatedSession {
    channels: usize,
    noise_level: f32,
    rng: StdRng,
}

impl EngineSession for SimulatedSession {
    fn process(&mut self, input: &AudioBuffer, output: &mut AudioBuffer, noise_level: f32) -> i32 {
        if input.channel_count() != self.channels
            || output.channel_count() != self.channels
            || output.frame_count() != input.frame_count()
            || input.frame_count() == 0
        {
            return 0;
        }
        let level = clamp_level(noise_level);
        self.noise_level = level;

        for (src, dst) in input.channels().zip(output.channels_mut()) {
            if level == 0.0 {
                dst.copy_from_slice(src);
                continue;
            }
            for (out, &sample) in dst.iter_mut().zip(src) {
                *out = sample + self.rng.gen_range(-level..=level);
            }
        }
        1
    }

    fn set_noise_level(&mut self, level: f32) {
        self.noise_level = clamp_level(level);
    }

    fn noise_level(&self) -> f32 {
        self.noise_level
    }
}

fn clamp_level(level: f32) -> f32 {
    if level.is_nan() {
        0.0
    } else {
        level.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn buffer(channels: Vec<Vec<f32>>) -> AudioBuffer {
        AudioBuffer::from_channels(48000, channels).unwrap()
    }

    #[test]
    fn zero_noise_is_passthrough() {
        let mut session = SimulatedEngine::with_seed(7).create(48000, 2).unwrap();
        let input = buffer(vec![vec![0.3; 1024], vec![-0.7; 1024]]);
        let mut output = AudioBuffer::with_capacity(48000, 2, 1024);
        output.resize(1024);

        assert!(session.process(&input, &mut output, 0.0) > 0);
        assert_eq!(output, input);
    }

    #[test]
    fn unsupported_formats_yield_no_session() {
        let engine = SimulatedEngine::new();
        assert!(engine.create(4000, 2).is_none());
        assert!(engine.create(48000, 0).is_none());
        assert!(engine.create(48000, MAX_CHANNELS + 1).is_none());
        assert!(engine.create(96000, MAX_CHANNELS).is_some());
    }

    #[test]
    fn seeded_sessions_are_reproducible() {
        let input = buffer(vec![vec![0.0; 256]]);
        let run = || {
            let mut session = SimulatedEngine::with_seed(42).create(48000, 1).unwrap();
            let mut output = AudioBuffer::with_capacity(48000, 1, 256);
            output.resize(256);
            session.process(&input, &mut output, 0.5);
            output
        };
        assert_eq!(run(), run());
    }

    proptest! {
        #[test]
        fn perturbation_is_bounded_by_level(
            level in 0.0f32..=1.0,
            samples in proptest::collection::vec(-1.0f32..=1.0, 1..512),
            seed in any::<u64>(),
        ) {
            let mut session = SimulatedEngine::with_seed(seed).create(48000, 1).unwrap();
            let input = buffer(vec![samples]);
            let mut output = AudioBuffer::with_capacity(48000, 1, input.frame_count());
            output.resize(input.frame_count());

            prop_assert!(session.process(&input, &mut output, level) > 0);
            for (o, i) in output.channel(0).iter().zip(input.channel(0)) {
                prop_assert!((o - i).abs() <= level + 1e-6);
            }
        }
    }
}

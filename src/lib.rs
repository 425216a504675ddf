//! Real-time microphone → noise-injection engine → speaker bridge.

pub mod audio;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod params;
pub mod stats;

pub use audio::{AudioGraphController, GraphState};
pub use config::{Config, EngineKind};
pub use error::{BridgeError, BufferError, FormatError};
pub use events::EventLog;
pub use params::ParameterStore;

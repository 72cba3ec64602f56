//! Volume Mixer - Library
//!
//! Audio session and device control for programmable button hosts on
//! Windows.
//!
//! ## Features
//!
//! - List active playback and recording devices and the defaults per role
//! - Find the audio sessions of running applications
//! - Set, step and mute per-application volume
//! - Switch or toggle the default output and microphone
//! - Publish device and tracked-app state as named variables on a timer

pub mod actions;
pub mod audio;
pub mod config;
pub mod logging;
pub mod publisher;
pub mod service;
pub mod variables;

pub use actions::{Action, ActionInstance, ActionKind};
pub use audio::{AudioError, DataFlow, DeviceRole, Endpoint, SessionSnapshot, SwitchOutcome};
pub use config::{ConfigError, EngineConfig};
pub use logging::init_logging;
pub use publisher::RefreshOutcome;
pub use service::MixerService;
pub use variables::{VariableStore, VariableValue};

//! Audio module for Windows Core Audio API interactions.
//!
//! This module provides endpoint enumeration, per-application session
//! lookup and mutation, and default device switching. The OS sits behind
//! the [`AudioBackend`] trait.

pub mod backend;
pub mod device;
pub mod enumerator;
pub mod policy;
pub mod sessions;

#[cfg(windows)]
pub mod wasapi;

#[cfg(not(windows))]
pub mod unsupported;

#[cfg(test)]
pub(crate) mod fake;

pub use backend::{AudioBackend, SessionControl};
pub use device::{AudioError, DataFlow, DeviceRole, DeviceState, Endpoint, SessionSnapshot};
pub use enumerator::DeviceEnumerator;
pub use policy::{toggle_target, DefaultEndpointSwitcher, SwitchOutcome};
pub use sessions::{names_match, SessionMutator, SessionResolver};

use std::sync::Arc;

/// The backend for the platform this crate was built for.
pub fn platform_backend() -> Arc<dyn AudioBackend> {
    #[cfg(windows)]
    {
        Arc::new(wasapi::WasapiBackend::new())
    }
    #[cfg(not(windows))]
    {
        Arc::new(unsupported::UnsupportedBackend::new())
    }
}

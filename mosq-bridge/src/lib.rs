//! Runs an external callback surface as a mosquitto 2.0 broker plugin.
//!
//! The broker only knows the native plugin ABI. This crate owns that boundary: it negotiates the
//! ABI version, starts the script runtime once per process, registers one handler per event kind
//! and turns each native event into a call on a [`Script`] implementation, relaying its status
//! code back unchanged.
//!
//! A plugin crate implements [`Script`] and exports the ABI symbols with [`plugin_entry!`].

pub use once_cell;

pub use broker::{Broker, NativeBroker};
pub use cert::CertificateBuffer;
pub use client::Client;
pub use context::PluginContext;
pub use directory::Directory;
pub use error::{Error, FatalError, Result};
pub use options::PluginOptions;
pub use runtime::Bridge;
pub use script::{PskKey, Script};
pub use settings::Settings;
pub use types::{Access, ClientHandle, Event, PluginId, Protocol, StatusCode};

pub mod broker;
pub mod cert;
pub mod client;
pub mod context;
pub mod directory;
pub mod entry;
pub mod error;
pub mod events;
pub mod ffi;
pub mod logger;
pub mod options;
pub mod runtime;
pub mod script;
pub mod settings;
pub mod types;

#[cfg(test)]
mod mock;

//! plughost-host: the plugin host core.
//!
//! [`PluginHost`] loads plugins, keeps what they register (commands, timers,
//! completions, windows, service discovery features), routes typed command
//! lines and client events to them, and contains their failures. Each plugin
//! runs on its own worker task; a fault in one never reaches the client or
//! another plugin.

pub mod autocomplete;
pub mod parser;
pub mod registry;
pub mod router;
pub mod services;

mod host;
mod worker;

#[cfg(test)]
mod testing;

pub use host::{HostOptions, PluginHost};
pub use services::{LogUi, MemorySettings, OfflineTransport, detached_services};

pub use plughost_hooks::DispatchOutcome;
pub use plughost_timers::TimerInfo;

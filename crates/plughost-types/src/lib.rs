use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ──────────────────── Client Types ────────────────────

/// Client identity handed to a plugin's `init` entry point.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientInfo {
    /// Client version string.
    pub version: String,
    /// Package status, "development" or "release".
    pub status: String,
    /// Account currently logged in, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_name: Option<String>,
    /// Full address (bare address and resource) if logged in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fulljid: Option<String>,
}

impl ClientInfo {
    pub fn new(version: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            status: status.into(),
            account_name: None,
            fulljid: None,
        }
    }
}

// ──────────────────── Command Types ────────────────────

/// Help text attached to a plugin command. Documentation only.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommandHelp {
    /// Usage lines, e.g. `/say <message>`.
    #[serde(default)]
    pub synopsis: Vec<String>,
    #[serde(default)]
    pub description: String,
    /// `(argument, description)` pairs.
    #[serde(default)]
    pub arguments: Vec<(String, String)>,
    #[serde(default)]
    pub examples: Vec<String>,
}

/// A command declared by a plugin.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommandSpec {
    /// Command name including the leading slash, e.g. `/say`.
    pub name: String,
    pub min_args: usize,
    pub max_args: usize,
    #[serde(default)]
    pub help: CommandHelp,
}

impl CommandSpec {
    pub fn new(name: impl Into<String>, min_args: usize, max_args: usize) -> Self {
        Self {
            name: name.into(),
            min_args,
            max_args,
            help: CommandHelp::default(),
        }
    }

    pub fn with_help(mut self, help: CommandHelp) -> Self {
        self.help = help;
        self
    }

    /// Check the name is a single `/token` and the argument range is ordered.
    pub fn validate(&self) -> Result<(), HostError> {
        let invalid = |reason: &str| HostError::InvalidCommand {
            command: self.name.clone(),
            reason: reason.to_string(),
        };

        if !self.name.starts_with('/') || self.name.len() < 2 {
            return Err(invalid("name must start with '/'"));
        }
        if self.name.chars().any(char::is_whitespace) {
            return Err(invalid("name must not contain whitespace"));
        }
        if self.min_args > self.max_args {
            return Err(invalid("min_args exceeds max_args"));
        }
        Ok(())
    }

    /// Whether `count` positional arguments fall inside the declared range.
    pub fn accepts(&self, count: usize) -> bool {
        (self.min_args..=self.max_args).contains(&count)
    }
}

// ──────────────────── Timer Types ────────────────────

/// Identifier assigned to a registered timed callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimerId(pub uuid::Uuid);

impl TimerId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for TimerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A periodic callback declared by a plugin.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimerSpec {
    /// Name of the plugin entry point to invoke on each tick.
    pub name: String,
    pub interval: Duration,
}

impl TimerSpec {
    pub fn new(name: impl Into<String>, interval: Duration) -> Self {
        Self {
            name: name.into(),
            interval,
        }
    }

    pub fn every_secs(name: impl Into<String>, secs: u64) -> Self {
        Self::new(name, Duration::from_secs(secs))
    }

    pub fn validate(&self) -> Result<(), HostError> {
        if self.interval.is_zero() {
            return Err(HostError::InvalidInterval {
                timer: self.name.clone(),
            });
        }
        Ok(())
    }
}

// ──────────────────── Fault Types ────────────────────

/// How a plugin entry point failed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "detail", rename_all = "snake_case")]
pub enum FaultKind {
    /// The callback returned an error.
    Error(String),
    /// The callback panicked.
    Panic(String),
    /// The host watchdog stopped waiting for the callback.
    TimedOut,
    /// The plugin was unloaded before the call started.
    Unavailable,
}

/// An uncaught failure from a plugin callback, contained by the host.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[error("plugin {plugin} failed in {entry_point}: {kind}")]
pub struct PluginFault {
    pub plugin: String,
    /// Hook, command, timer, or window entry point that failed.
    pub entry_point: String,
    pub kind: FaultKind,
}

impl PluginFault {
    pub fn new(plugin: impl Into<String>, entry_point: impl Into<String>, kind: FaultKind) -> Self {
        Self {
            plugin: plugin.into(),
            entry_point: entry_point.into(),
            kind,
        }
    }

    /// True when the plugin never ran the call.
    pub fn is_unavailable(&self) -> bool {
        self.kind == FaultKind::Unavailable
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultKind::Error(msg) => write!(f, "error: {msg}"),
            FaultKind::Panic(msg) => write!(f, "panic: {msg}"),
            FaultKind::TimedOut => f.write_str("timed out"),
            FaultKind::Unavailable => f.write_str("plugin unavailable"),
        }
    }
}

// ──────────────────── Host Errors ────────────────────

#[derive(Debug, Error)]
pub enum HostError {
    #[error("command {command} is already registered by plugin {owner}")]
    NameConflict { command: String, owner: String },
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("invalid usage of {command}: expected {min}..={max} arguments, got {given}")]
    ArgumentCount {
        command: String,
        min: usize,
        max: usize,
        given: usize,
        synopsis: Vec<String>,
    },
    #[error("invalid command {command}: {reason}")]
    InvalidCommand { command: String, reason: String },
    #[error("timer {timer} must have a positive interval")]
    InvalidInterval { timer: String },
    #[error("plugin {0} is already loaded")]
    AlreadyLoaded(String),
    #[error("plugin {0} is not loaded")]
    NotLoaded(String),
    #[error(transparent)]
    PluginFault(#[from] PluginFault),
    #[error("plugin host has shut down")]
    HostGone,
}

impl HostError {
    /// Errors the user caused by typing a bad line, as opposed to plugin or host failures.
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            HostError::UnknownCommand(_) | HostError::ArgumentCount { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_spec_validate() {
        assert!(CommandSpec::new("/say", 1, 1).validate().is_ok());
        assert!(CommandSpec::new("/zero", 0, 0).validate().is_ok());

        let err = CommandSpec::new("say", 0, 1).validate().unwrap_err();
        assert!(matches!(err, HostError::InvalidCommand { .. }));

        let err = CommandSpec::new("/", 0, 1).validate().unwrap_err();
        assert!(matches!(err, HostError::InvalidCommand { .. }));

        let err = CommandSpec::new("/two words", 0, 1).validate().unwrap_err();
        assert!(matches!(err, HostError::InvalidCommand { .. }));

        let err = CommandSpec::new("/range", 3, 2).validate().unwrap_err();
        assert!(err.to_string().contains("min_args exceeds max_args"));
    }

    #[test]
    fn test_command_spec_accepts() {
        let spec = CommandSpec::new("/cmd", 1, 3);
        assert!(!spec.accepts(0));
        assert!(spec.accepts(1));
        assert!(spec.accepts(3));
        assert!(!spec.accepts(4));
    }

    #[test]
    fn test_timer_spec_validate() {
        assert!(TimerSpec::every_secs("tick", 5).validate().is_ok());
        let err = TimerSpec::new("never", Duration::ZERO).validate().unwrap_err();
        assert!(matches!(err, HostError::InvalidInterval { timer } if timer == "never"));
    }

    #[test]
    fn test_plugin_fault_display() {
        let fault = PluginFault::new("weather", "/forecast", FaultKind::Error("no data".into()));
        assert_eq!(
            fault.to_string(),
            "plugin weather failed in /forecast: error: no data"
        );
        assert!(!fault.is_unavailable());
        assert!(PluginFault::new("p", "on_start", FaultKind::Unavailable).is_unavailable());
    }

    #[test]
    fn test_fault_kind_serde() {
        let json = serde_json::to_string(&FaultKind::Panic("boom".into())).unwrap();
        assert_eq!(json, r#"{"type":"panic","detail":"boom"}"#);
        let parsed: FaultKind = serde_json::from_str(r#"{"type":"timed_out"}"#).unwrap();
        assert_eq!(parsed, FaultKind::TimedOut);
    }

    #[test]
    fn test_client_info_defaults() {
        let json = r#"{"version": "0.9.0", "status": "release"}"#;
        let info: ClientInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info, ClientInfo::new("0.9.0", "release"));
        assert!(info.account_name.is_none());
    }

    #[test]
    fn test_usage_errors() {
        assert!(HostError::UnknownCommand("/nope".into()).is_usage_error());
        assert!(!HostError::HostGone.is_usage_error());
    }
}

//! Default service implementations for a host without a full client behind it.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, info};

use plughost_plugin_sdk::{Services, Settings, Transport, Ui};

/// UI that writes everything to the log.
#[derive(Debug, Default)]
pub struct LogUi;

impl Ui for LogUi {
    fn cons_show(&self, message: &str) {
        info!(target: "plughost::console", "{message}");
    }

    fn notify(&self, message: &str, timeout_ms: u64, category: Option<&str>) {
        info!(target: "plughost::notify", timeout_ms, category, "{message}");
    }
}

/// Transport with no connection; every stanza is dropped.
#[derive(Debug, Default)]
pub struct OfflineTransport;

impl Transport for OfflineTransport {
    fn send_stanza(&self, stanza: &str) -> bool {
        debug!(len = stanza.len(), "Not connected, stanza dropped");
        false
    }
}

#[derive(Debug, Clone, PartialEq)]
enum SettingValue {
    Boolean(bool),
    String(String),
    Int(i64),
}

impl From<serde_json::Value> for SettingValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Bool(b) => SettingValue::Boolean(b),
            serde_json::Value::String(s) => SettingValue::String(s),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => SettingValue::Int(i),
                None => SettingValue::String(n.to_string()),
            },
            other => SettingValue::String(other.to_string()),
        }
    }
}

/// In-memory settings store. A read of the wrong type returns the default.
#[derive(Debug, Default)]
pub struct MemorySettings {
    groups: RwLock<HashMap<String, HashMap<String, SettingValue>>>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from the `settings` section of the config file.
    pub fn from_seed(seed: HashMap<String, HashMap<String, serde_json::Value>>) -> Self {
        let groups = seed
            .into_iter()
            .map(|(group, keys)| {
                let keys = keys.into_iter().map(|(k, v)| (k, v.into())).collect();
                (group, keys)
            })
            .collect();
        Self {
            groups: RwLock::new(groups),
        }
    }

    fn get(&self, group: &str, key: &str) -> Option<SettingValue> {
        self.groups
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(group)
            .and_then(|keys| keys.get(key))
            .cloned()
    }

    fn set(&self, group: &str, key: &str, value: SettingValue) {
        self.groups
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(group.to_string())
            .or_default()
            .insert(key.to_string(), value);
    }
}

impl Settings for MemorySettings {
    fn get_boolean(&self, group: &str, key: &str, default: bool) -> bool {
        match self.get(group, key) {
            Some(SettingValue::Boolean(b)) => b,
            _ => default,
        }
    }

    fn set_boolean(&self, group: &str, key: &str, value: bool) {
        self.set(group, key, SettingValue::Boolean(value));
    }

    fn get_string(&self, group: &str, key: &str, default: Option<&str>) -> Option<String> {
        match self.get(group, key) {
            Some(SettingValue::String(s)) => Some(s),
            _ => default.map(str::to_string),
        }
    }

    fn set_string(&self, group: &str, key: &str, value: &str) {
        self.set(group, key, SettingValue::String(value.to_string()));
    }

    fn get_int(&self, group: &str, key: &str, default: i64) -> i64 {
        match self.get(group, key) {
            Some(SettingValue::Int(i)) => i,
            _ => default,
        }
    }

    fn set_int(&self, group: &str, key: &str, value: i64) {
        self.set(group, key, SettingValue::Int(value));
    }
}

/// Services for running plugins without a client: log UI, no connection,
/// settings seeded from config.
pub fn detached_services(settings: MemorySettings) -> Services {
    Services {
        ui: Arc::new(LogUi),
        transport: Arc::new(OfflineTransport),
        settings: Arc::new(settings),
    }
}

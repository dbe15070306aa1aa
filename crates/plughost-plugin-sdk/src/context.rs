//! Per-plugin handle back into the host.

use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;

use plughost_types::{ClientInfo, CommandSpec, HostError, TimerId, TimerSpec};

use crate::services::{Services, Ui};

/// The inbound call surface a host offers its plugins.
///
/// Every call names the plugin making it so the host can attribute the
/// registration and purge it when that plugin unloads.
#[async_trait]
pub trait HostApi: Send + Sync {
    async fn register_command(&self, plugin: &str, spec: CommandSpec) -> Result<(), HostError>;

    async fn register_timed(&self, plugin: &str, spec: TimerSpec) -> Result<TimerId, HostError>;

    async fn completer_add(&self, plugin: &str, key: &str, items: Vec<String>);

    async fn completer_remove(&self, plugin: &str, key: &str, items: Vec<String>);

    async fn completer_clear(&self, plugin: &str, key: &str);

    /// Claim a window tag. Returns false if another plugin owns it.
    async fn win_create(&self, plugin: &str, tag: &str) -> bool;

    async fn disco_add_feature(&self, plugin: &str, feature: &str);

    /// Queue a line to be handled as if the user typed it.
    fn send_line(&self, line: String);

    fn services(&self) -> Services;

    fn client_info(&self) -> ClientInfo;
}

/// Handed to every plugin callback.
///
/// Holds no plugin state of its own; a plugin keeps its state in `self`.
#[derive(Clone)]
pub struct PluginContext {
    plugin: String,
    host: Weak<dyn HostApi>,
}

impl PluginContext {
    pub fn new(plugin: impl Into<String>, host: Weak<dyn HostApi>) -> Self {
        Self {
            plugin: plugin.into(),
            host,
        }
    }

    /// Name of the plugin this context belongs to.
    pub fn plugin_name(&self) -> &str {
        &self.plugin
    }

    fn host(&self) -> Result<Arc<dyn HostApi>, HostError> {
        self.host.upgrade().ok_or(HostError::HostGone)
    }

    // ──────────────────── Registration ────────────────────

    /// Register a command routed to this plugin's `on_command`.
    pub async fn register_command(&self, spec: CommandSpec) -> Result<(), HostError> {
        self.host()?.register_command(&self.plugin, spec).await
    }

    /// Register a callback routed to this plugin's `on_timer` every `interval`.
    pub async fn register_timed(
        &self,
        name: &str,
        interval: Duration,
    ) -> Result<TimerId, HostError> {
        self.host()?
            .register_timed(&self.plugin, TimerSpec::new(name, interval))
            .await
    }

    pub async fn completer_add(&self, key: &str, items: &[&str]) -> Result<(), HostError> {
        let items = items.iter().map(|s| s.to_string()).collect();
        self.host()?.completer_add(&self.plugin, key, items).await;
        Ok(())
    }

    /// Withdraw this plugin's own `items` under `key`. Candidates other
    /// plugins also added stay.
    pub async fn completer_remove(&self, key: &str, items: &[&str]) -> Result<(), HostError> {
        let items = items.iter().map(|s| s.to_string()).collect();
        self.host()?.completer_remove(&self.plugin, key, items).await;
        Ok(())
    }

    /// Withdraw every candidate this plugin added under `key`.
    pub async fn completer_clear(&self, key: &str) -> Result<(), HostError> {
        self.host()?.completer_clear(&self.plugin, key).await;
        Ok(())
    }

    pub async fn disco_add_feature(&self, feature: &str) -> Result<(), HostError> {
        self.host()?.disco_add_feature(&self.plugin, feature).await;
        Ok(())
    }

    /// Create a window whose input lines are routed to `on_window_input`.
    pub async fn win_create(&self, tag: &str) -> Result<bool, HostError> {
        Ok(self.host()?.win_create(&self.plugin, tag).await)
    }

    /// Handle `line` as if the user typed it. Runs after the current callback
    /// returns; from `init`, commands this plugin registered are routable.
    pub fn send_line(&self, line: impl Into<String>) -> Result<(), HostError> {
        self.host()?.send_line(line.into());
        Ok(())
    }

    pub fn client_info(&self) -> Result<ClientInfo, HostError> {
        Ok(self.host()?.client_info())
    }

    // ──────────────────── Pass-through ────────────────────

    pub fn services(&self) -> Result<Services, HostError> {
        Ok(self.host()?.services())
    }

    pub fn ui(&self) -> Result<Arc<dyn Ui>, HostError> {
        Ok(self.services()?.ui)
    }

    pub fn cons_show(&self, message: &str) -> Result<(), HostError> {
        self.ui()?.cons_show(message);
        Ok(())
    }

    pub fn notify(
        &self,
        message: &str,
        timeout_ms: u64,
        category: Option<&str>,
    ) -> Result<(), HostError> {
        self.ui()?.notify(message, timeout_ms, category);
        Ok(())
    }

    pub fn win_show(&self, tag: &str, message: &str) -> Result<(), HostError> {
        self.ui()?.win_show(tag, message);
        Ok(())
    }

    pub fn send_stanza(&self, stanza: &str) -> Result<bool, HostError> {
        Ok(self.services()?.transport.send_stanza(stanza))
    }

    pub fn settings_get_boolean(&self, group: &str, key: &str, default: bool) -> Result<bool, HostError> {
        Ok(self.services()?.settings.get_boolean(group, key, default))
    }

    pub fn settings_set_boolean(&self, group: &str, key: &str, value: bool) -> Result<(), HostError> {
        self.services()?.settings.set_boolean(group, key, value);
        Ok(())
    }

    pub fn settings_get_string(
        &self,
        group: &str,
        key: &str,
        default: Option<&str>,
    ) -> Result<Option<String>, HostError> {
        Ok(self.services()?.settings.get_string(group, key, default))
    }

    pub fn settings_set_string(&self, group: &str, key: &str, value: &str) -> Result<(), HostError> {
        self.services()?.settings.set_string(group, key, value);
        Ok(())
    }

    pub fn settings_get_int(&self, group: &str, key: &str, default: i64) -> Result<i64, HostError> {
        Ok(self.services()?.settings.get_int(group, key, default))
    }

    pub fn settings_set_int(&self, group: &str, key: &str, value: i64) -> Result<(), HostError> {
        self.services()?.settings.set_int(group, key, value);
        Ok(())
    }

    // ──────────────────── Logging ────────────────────

    pub fn log_debug(&self, message: &str) {
        tracing::debug!(plugin = %self.plugin, "{message}");
    }

    pub fn log_info(&self, message: &str) {
        tracing::info!(plugin = %self.plugin, "{message}");
    }

    pub fn log_warning(&self, message: &str) {
        tracing::warn!(plugin = %self.plugin, "{message}");
    }

    pub fn log_error(&self, message: &str) {
        tracing::error!(plugin = %self.plugin, "{message}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{Settings, Transport};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn push(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    impl Ui for Recorder {
        fn cons_show(&self, message: &str) {
            self.push(format!("cons_show {message}"));
        }

        fn notify(&self, message: &str, timeout_ms: u64, _category: Option<&str>) {
            self.push(format!("notify {message} {timeout_ms}"));
        }
    }

    impl Transport for Recorder {
        fn send_stanza(&self, stanza: &str) -> bool {
            self.push(format!("stanza {stanza}"));
            true
        }
    }

    impl Settings for Recorder {
        fn get_boolean(&self, _group: &str, _key: &str, default: bool) -> bool {
            default
        }
        fn set_boolean(&self, group: &str, key: &str, value: bool) {
            self.push(format!("set {group}.{key}={value}"));
        }
        fn get_string(&self, _group: &str, _key: &str, default: Option<&str>) -> Option<String> {
            default.map(str::to_string)
        }
        fn set_string(&self, group: &str, key: &str, value: &str) {
            self.push(format!("set {group}.{key}={value}"));
        }
        fn get_int(&self, _group: &str, _key: &str, default: i64) -> i64 {
            default
        }
        fn set_int(&self, group: &str, key: &str, value: i64) {
            self.push(format!("set {group}.{key}={value}"));
        }
    }

    struct MockHost {
        recorder: Arc<Recorder>,
    }

    #[async_trait]
    impl HostApi for MockHost {
        async fn register_command(&self, plugin: &str, spec: CommandSpec) -> Result<(), HostError> {
            self.recorder.push(format!("{plugin} register {}", spec.name));
            Ok(())
        }

        async fn register_timed(&self, plugin: &str, spec: TimerSpec) -> Result<TimerId, HostError> {
            self.recorder
                .push(format!("{plugin} timed {} {:?}", spec.name, spec.interval));
            Ok(TimerId::new())
        }

        async fn completer_add(&self, plugin: &str, key: &str, items: Vec<String>) {
            self.recorder
                .push(format!("{plugin} add {key} {}", items.join(",")));
        }

        async fn completer_remove(&self, plugin: &str, key: &str, items: Vec<String>) {
            self.recorder
                .push(format!("{plugin} remove {key} {}", items.join(",")));
        }

        async fn completer_clear(&self, plugin: &str, key: &str) {
            self.recorder.push(format!("{plugin} clear {key}"));
        }

        async fn win_create(&self, plugin: &str, tag: &str) -> bool {
            self.recorder.push(format!("{plugin} win {tag}"));
            true
        }

        async fn disco_add_feature(&self, plugin: &str, feature: &str) {
            self.recorder.push(format!("{plugin} disco {feature}"));
        }

        fn send_line(&self, line: String) {
            self.recorder.push(format!("line {line}"));
        }

        fn services(&self) -> Services {
            Services {
                ui: self.recorder.clone(),
                transport: self.recorder.clone(),
                settings: self.recorder.clone(),
            }
        }

        fn client_info(&self) -> ClientInfo {
            ClientInfo::new("1.0.0", "release")
        }
    }

    fn context() -> (PluginContext, Arc<dyn HostApi>, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let host: Arc<dyn HostApi> = Arc::new(MockHost {
            recorder: recorder.clone(),
        });
        let ctx = PluginContext::new("weather", Arc::downgrade(&host));
        (ctx, host, recorder)
    }

    #[tokio::test]
    async fn test_calls_are_attributed_to_plugin() {
        let (ctx, _host, recorder) = context();

        ctx.register_command(CommandSpec::new("/forecast", 0, 1))
            .await
            .unwrap();
        ctx.register_timed("refresh", Duration::from_secs(60))
            .await
            .unwrap();
        ctx.completer_add("/forecast", &["today", "tomorrow"])
            .await
            .unwrap();
        ctx.completer_clear("/forecast").await.unwrap();
        assert!(ctx.win_create("weather-win").await.unwrap());
        ctx.disco_add_feature("urn:weather").await.unwrap();

        let calls = recorder.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![
                "weather register /forecast",
                "weather timed refresh 60s",
                "weather add /forecast today,tomorrow",
                "weather clear /forecast",
                "weather win weather-win",
                "weather disco urn:weather",
            ]
        );
    }

    #[tokio::test]
    async fn test_pass_through_services() {
        let (ctx, _host, recorder) = context();

        ctx.cons_show("hello").unwrap();
        ctx.notify("ding", 5000, None).unwrap();
        assert!(ctx.send_stanza("<presence/>").unwrap());
        ctx.settings_set_int("weather", "units", 2).unwrap();
        assert_eq!(
            ctx.settings_get_string("weather", "city", Some("Oslo")).unwrap(),
            Some("Oslo".into())
        );
        ctx.send_line("/forecast today").unwrap();
        assert_eq!(ctx.client_info().unwrap().status, "release");

        let calls = recorder.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![
                "cons_show hello",
                "notify ding 5000",
                "stanza <presence/>",
                "set weather.units=2",
                "line /forecast today",
            ]
        );
    }

    #[tokio::test]
    async fn test_context_outliving_host() {
        let (ctx, host, _recorder) = context();
        drop(host);

        let err = ctx
            .register_command(CommandSpec::new("/late", 0, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, HostError::HostGone));
        assert!(matches!(ctx.cons_show("x"), Err(HostError::HostGone)));
    }
}

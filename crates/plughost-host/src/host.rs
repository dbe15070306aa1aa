//! Plugin host: loads plugins, routes events, commands and timer ticks to
//! them, and keeps their registrations.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, Weak};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info, trace, warn};

use plughost_config::HostConfig;
use plughost_hooks::{DispatchOutcome, HookEvent, HookName};
use plughost_plugin_sdk::{HostApi, Plugin, PluginContext, Services};
use plughost_timers::{TimerCallback, TimerInfo, TimerScheduler};
use plughost_types::{ClientInfo, CommandHelp, CommandSpec, HostError, TimerId, TimerSpec};

use crate::registry::{Registry, TimerEntry};
use crate::router;
use crate::services::{MemorySettings, detached_services};
use crate::worker::{Invocation, Outcome, PluginHandle};

/// Host construction options.
#[derive(Debug, Clone)]
pub struct HostOptions {
    /// Identity passed to each plugin's `init`.
    pub client: ClientInfo,
    /// Stop waiting on a hook, command or window call after this long.
    pub call_timeout: Option<Duration>,
}

impl Default for HostOptions {
    fn default() -> Self {
        Self {
            client: ClientInfo::new(env!("CARGO_PKG_VERSION"), "development"),
            call_timeout: None,
        }
    }
}

impl HostOptions {
    pub fn from_config(config: &HostConfig) -> Self {
        Self {
            client: config.client.client_info(),
            call_timeout: config.plugins.call_timeout(),
        }
    }
}

#[derive(Default)]
struct HostState {
    /// Loaded plugins in load order. Dispatch visits them in this order.
    plugins: Vec<Arc<PluginHandle>>,
    /// Plugins whose `init` is still running.
    loading: HashMap<String, Arc<PluginHandle>>,
    /// Plugins running `on_unload`, out of dispatch but not yet purged.
    unloading: HashSet<String>,
    registry: Registry,
    closed: bool,
}

impl HostState {
    fn loaded(&self, name: &str) -> Option<Arc<PluginHandle>> {
        self.plugins.iter().find(|p| p.name() == name).cloned()
    }

    /// A plugin may register while it is loading or loaded.
    fn accepting(&self, name: &str) -> Option<Arc<PluginHandle>> {
        self.loaded(name).or_else(|| self.loading.get(name).cloned())
    }

    fn in_use(&self, name: &str) -> bool {
        self.accepting(name).is_some() || self.unloading.contains(name)
    }
}

pub(crate) struct HostInner {
    me: Weak<HostInner>,
    state: RwLock<HostState>,
    scheduler: TimerScheduler,
    services: Services,
    client: std::sync::RwLock<ClientInfo>,
    call_timeout: Option<Duration>,
}

impl HostInner {
    fn api(&self) -> Weak<dyn HostApi> {
        self.me.clone()
    }

    fn client(&self) -> ClientInfo {
        self.client
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Drop every registration `name` owns and stop its timers.
    fn purge(&self, state: &mut HostState, name: &str) {
        let purged = state.registry.unregister_all(name);
        for id in purged.timers {
            self.scheduler.cancel(id);
        }
    }
}

#[async_trait]
impl HostApi for HostInner {
    async fn register_command(&self, plugin: &str, spec: CommandSpec) -> Result<(), HostError> {
        let mut state = self.state.write().await;
        if state.accepting(plugin).is_none() {
            return Err(HostError::NotLoaded(plugin.to_string()));
        }

        let command = spec.name.clone();
        match state.registry.register_command(plugin, spec) {
            Ok(()) => {
                info!(plugin, command = %command, "Command registered");
                Ok(())
            }
            Err(e) => {
                warn!(plugin, command = %command, error = %e, "Command rejected");
                Err(e)
            }
        }
    }

    async fn register_timed(&self, plugin: &str, spec: TimerSpec) -> Result<TimerId, HostError> {
        let mut state = self.state.write().await;
        let handle = state
            .accepting(plugin)
            .ok_or_else(|| HostError::NotLoaded(plugin.to_string()))?;

        let timer = spec.name.clone();
        let callback: TimerCallback = Arc::new(move || {
            let handle = handle.clone();
            let timer = timer.clone();
            Box::pin(async move { handle.call(Invocation::Timer(timer)).await.map(|_| ()) })
        });

        let id = self.scheduler.schedule(plugin, spec.clone(), callback)?;
        state.registry.register_timer(TimerEntry {
            id,
            owner: plugin.to_string(),
            spec,
        });
        Ok(id)
    }

    async fn completer_add(&self, plugin: &str, key: &str, items: Vec<String>) {
        let mut state = self.state.write().await;
        if state.accepting(plugin).is_none() {
            debug!(plugin, key, "Completions from unloaded plugin ignored");
            return;
        }
        state.registry.add_completions(plugin, key, items);
    }

    async fn completer_remove(&self, plugin: &str, key: &str, items: Vec<String>) {
        let mut state = self.state.write().await;
        if state.accepting(plugin).is_some() {
            state.registry.remove_completions(plugin, key, &items);
        }
    }

    async fn completer_clear(&self, plugin: &str, key: &str) {
        let mut state = self.state.write().await;
        if state.accepting(plugin).is_some() {
            state.registry.clear_completions(plugin, key);
        }
    }

    async fn win_create(&self, plugin: &str, tag: &str) -> bool {
        let claimed = {
            let mut state = self.state.write().await;
            state.accepting(plugin).is_some() && state.registry.claim_window(plugin, tag)
        };

        if !claimed {
            warn!(plugin, tag, "Window tag already owned");
            return false;
        }
        if !self.services.ui.win_exists(tag) {
            self.services.ui.win_create(tag);
        }
        true
    }

    async fn disco_add_feature(&self, plugin: &str, feature: &str) {
        let mut state = self.state.write().await;
        if state.accepting(plugin).is_some() {
            state.registry.add_feature(plugin, feature);
        }
    }

    fn send_line(&self, line: String) {
        let Some(inner) = self.me.upgrade() else {
            return;
        };
        tokio::spawn(async move {
            let host = PluginHost { inner };
            if !host.handle_line(&line).await {
                host.inner
                    .services
                    .ui
                    .cons_show(&format!("Unknown command: {line}"));
            }
        });
    }

    fn services(&self) -> Services {
        self.services.clone()
    }

    fn client_info(&self) -> ClientInfo {
        self.client()
    }
}

/// Hosts plugins for one client. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct PluginHost {
    inner: Arc<HostInner>,
}

impl PluginHost {
    pub fn new(options: HostOptions, services: Services) -> Self {
        let inner = Arc::new_cyclic(|me| HostInner {
            me: me.clone(),
            state: RwLock::new(HostState::default()),
            scheduler: TimerScheduler::new(),
            services,
            client: std::sync::RwLock::new(options.client),
            call_timeout: options.call_timeout,
        });
        Self { inner }
    }

    /// A host with log-backed UI, no connection, and settings seeded from `config`.
    pub fn from_config(config: &HostConfig) -> Self {
        let settings = MemorySettings::from_seed(config.settings.clone());
        Self::new(HostOptions::from_config(config), detached_services(settings))
    }

    pub fn services(&self) -> Services {
        self.inner.services.clone()
    }

    pub fn client_info(&self) -> ClientInfo {
        self.inner.client()
    }

    /// Replace the identity handed to plugins loaded from now on.
    pub fn set_client_info(&self, client: ClientInfo) {
        *self
            .inner
            .client
            .write()
            .unwrap_or_else(PoisonError::into_inner) = client;
    }

    // ──────────────────── Lifecycle ────────────────────

    /// Start `plugin` and run its `init`.
    ///
    /// If `init` fails, or the host shuts down while it runs, the plugin is not
    /// added and anything it registered during `init` is removed again.
    pub async fn load(&self, plugin: Box<dyn Plugin>) -> Result<(), HostError> {
        let name = plugin.name().to_string();
        let handle = {
            let mut state = self.inner.state.write().await;
            if state.closed {
                return Err(HostError::HostGone);
            }
            if state.in_use(&name) {
                return Err(HostError::AlreadyLoaded(name));
            }
            let ctx = PluginContext::new(&name, self.inner.api());
            let handle = PluginHandle::spawn(plugin, ctx, self.inner.call_timeout);
            state.loading.insert(name.clone(), handle.clone());
            handle
        };

        let init = handle.call(Invocation::Init(self.client_info())).await;

        let mut state = self.inner.state.write().await;
        state.loading.remove(&name);
        if state.closed {
            self.inner.purge(&mut state, &name);
            drop(state);
            let _ = handle.call(Invocation::Unload { notify: false }).await;
            info!(plugin = %name, "Host shut down during init, plugin discarded");
            return Err(HostError::HostGone);
        }
        match init {
            Ok(_) => {
                let hooks: Vec<&str> = handle.hooks().iter().map(HookName::as_str).collect();
                info!(plugin = %name, hooks = ?hooks, "Plugin loaded");
                state.plugins.push(handle);
                Ok(())
            }
            Err(fault) => {
                self.inner.purge(&mut state, &name);
                drop(state);
                let _ = handle.call(Invocation::Unload { notify: false }).await;
                warn!(plugin = %name, error = %fault.kind, "Plugin init failed, not loaded");
                Err(fault.into())
            }
        }
    }

    /// Run `name`'s `on_unload`, then remove everything it registered.
    ///
    /// The plugin gets no new calls once this starts. Calls already queued for
    /// it finish first, then `on_unload` runs with its registrations still in
    /// place. Once this returns nothing of the plugin is reachable.
    pub async fn unload(&self, name: &str) -> Result<(), HostError> {
        let handle = {
            let mut state = self.inner.state.write().await;
            let Some(pos) = state.plugins.iter().position(|p| p.name() == name) else {
                return Err(HostError::NotLoaded(name.to_string()));
            };
            state.unloading.insert(name.to_string());
            state.plugins.remove(pos)
        };

        if let Err(fault) = handle.call(Invocation::Unload { notify: true }).await {
            warn!(plugin = name, error = %fault.kind, "on_unload failed");
        }

        let mut state = self.inner.state.write().await;
        self.inner.purge(&mut state, name);
        state.unloading.remove(name);
        info!(plugin = name, "Plugin unloaded");
        Ok(())
    }

    /// Unload every plugin in load order. Returns how many were unloaded.
    pub async fn unload_all(&self) -> usize {
        let mut count = 0;
        for name in self.loaded_plugins().await {
            if self.unload(&name).await.is_ok() {
                count += 1;
            }
        }
        count
    }

    /// Deliver `on_shutdown`, then stop every plugin and timer.
    ///
    /// Plugins get no `on_unload` here. The host refuses new plugins afterwards,
    /// including any whose `init` is still running.
    pub async fn shutdown(&self) {
        self.dispatch(HookEvent::OnShutdown).await;

        let handles = {
            let mut state = self.inner.state.write().await;
            state.closed = true;
            let handles = std::mem::take(&mut state.plugins);
            for handle in &handles {
                self.inner.purge(&mut state, handle.name());
            }
            let loading: Vec<String> = state.loading.drain().map(|(name, _)| name).collect();
            for name in &loading {
                self.inner.purge(&mut state, name);
            }
            handles
        };
        self.inner.scheduler.shutdown();

        for handle in &handles {
            let _ = handle.call(Invocation::Unload { notify: false }).await;
        }
        info!(plugins = handles.len(), "Plugin host shut down");
    }

    /// Names of loaded plugins, in load order.
    pub async fn loaded_plugins(&self) -> Vec<String> {
        let state = self.inner.state.read().await;
        state.plugins.iter().map(|p| p.name().to_string()).collect()
    }

    // ──────────────────── Hooks ────────────────────

    /// Run `event` through every loaded plugin implementing its hook.
    pub async fn dispatch(&self, event: HookEvent) -> DispatchOutcome {
        let hook = event.name();
        let targets: Vec<Arc<PluginHandle>> = {
            let state = self.inner.state.read().await;
            state
                .plugins
                .iter()
                .filter(|p| p.implements(hook))
                .cloned()
                .collect()
        };

        trace!(hook = %hook, targets = targets.len(), "Dispatching hook");
        plughost_hooks::dispatch(&targets, event).await
    }

    pub async fn on_start(&self) {
        self.dispatch(HookEvent::OnStart).await;
    }

    /// Record the connected account and deliver `on_connect`.
    pub async fn on_connect(&self, account_name: &str, fulljid: &str) {
        {
            let mut client = self
                .inner
                .client
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            client.account_name = Some(account_name.to_string());
            client.fulljid = Some(fulljid.to_string());
        }
        self.dispatch(HookEvent::OnConnect {
            account_name: account_name.to_string(),
            fulljid: fulljid.to_string(),
        })
        .await;
    }

    /// Deliver `on_disconnect` and forget the account.
    pub async fn on_disconnect(&self, account_name: &str, fulljid: &str) {
        self.dispatch(HookEvent::OnDisconnect {
            account_name: account_name.to_string(),
            fulljid: fulljid.to_string(),
        })
        .await;

        let mut client = self
            .inner
            .client
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        client.account_name = None;
        client.fulljid = None;
    }

    // ──────────────────── Commands ────────────────────

    /// Route a `/command` line to its plugin and return the command's result.
    pub async fn run_command(&self, line: &str) -> Result<Option<String>, HostError> {
        let (handle, command) = {
            let state = self.inner.state.read().await;
            let command = router::resolve(&state.registry, line)?;
            let handle = state
                .accepting(&command.owner)
                .ok_or_else(|| HostError::UnknownCommand(command.name.clone()))?;
            (handle, command)
        };

        debug!(
            plugin = %command.owner,
            command = %command.name,
            args = command.args.len(),
            "Routing command"
        );
        let name = command.name.clone();
        match handle
            .call(Invocation::Command {
                name: command.name,
                args: command.args,
            })
            .await
        {
            Ok(Outcome::Output(output)) => Ok(output),
            Ok(_) => Ok(None),
            Err(fault) if fault.is_unavailable() => Err(HostError::UnknownCommand(name)),
            Err(fault) => {
                warn!(
                    plugin = %fault.plugin,
                    command = %name,
                    error = %fault.kind,
                    "Plugin command failed"
                );
                Err(fault.into())
            }
        }
    }

    /// Handle a line the user typed. Returns false if no plugin command matched,
    /// leaving the line to the client.
    ///
    /// Usage errors and plugin failures are reported on the console.
    pub async fn handle_line(&self, line: &str) -> bool {
        let ui = &self.inner.services.ui;
        match self.run_command(line).await {
            Ok(Some(output)) => {
                ui.cons_show(&output);
                true
            }
            Ok(None) => true,
            Err(HostError::UnknownCommand(_)) => false,
            Err(HostError::ArgumentCount { command, .. }) => {
                ui.cons_bad_cmd_usage(&command);
                true
            }
            Err(err) => {
                ui.cons_show(&format!("Command failed: {err}"));
                true
            }
        }
    }

    /// Registered plugin command names, sorted.
    pub async fn command_names(&self) -> Vec<String> {
        self.inner.state.read().await.registry.command_names()
    }

    pub async fn command_help(&self, name: &str) -> Option<CommandHelp> {
        let state = self.inner.state.read().await;
        state
            .registry
            .lookup_command(name)
            .map(|c| c.spec.help.clone())
    }

    // ──────────────────── Completion ────────────────────

    /// Completions for a partially typed line.
    pub async fn autocomplete(&self, input: &str) -> Vec<String> {
        self.inner
            .state
            .read()
            .await
            .registry
            .completions()
            .complete(input)
    }

    /// Candidates registered under `key`.
    pub async fn completions(&self, key: &str) -> Option<Vec<String>> {
        self.inner.state.read().await.registry.lookup_completions(key)
    }

    // ──────────────────── Timers, windows, features ────────────────────

    pub fn timers(&self) -> Vec<TimerInfo> {
        self.inner.scheduler.list()
    }

    /// Pass a line typed into a plugin window to the owning plugin.
    /// Returns false if no plugin owns `tag`.
    pub async fn win_process_line(&self, tag: &str, line: &str) -> Result<bool, HostError> {
        let handle = {
            let state = self.inner.state.read().await;
            match state
                .registry
                .window_owner(tag)
                .and_then(|owner| state.loaded(owner))
            {
                Some(handle) => handle,
                None => return Ok(false),
            }
        };

        handle
            .call(Invocation::WindowInput {
                tag: tag.to_string(),
                line: line.to_string(),
            })
            .await?;
        Ok(true)
    }

    /// Service discovery features advertised by loaded plugins.
    pub async fn disco_features(&self) -> Vec<String> {
        self.inner.state.read().await.registry.features()
    }
}

//! Scriptable plugin and recording UI for host tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use plughost_hooks::{HookEvent, HookName, HookReply, HookSet};
use plughost_plugin_sdk::{ClientInfo, CommandSpec, Plugin, PluginContext, Services, Ui};

use crate::host::{HostOptions, PluginHost};
use crate::services::{MemorySettings, OfflineTransport};

/// Shared log of everything plugins and the UI saw, in order.
#[derive(Clone, Default)]
pub(crate) struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub(crate) fn push(&self, entry: String) {
        self.0.lock().unwrap().push(entry);
    }
}

pub(crate) fn entries(journal: &Journal) -> Vec<String> {
    journal.0.lock().unwrap().clone()
}

/// Entries equal to `needle` or starting with `needle` followed by a space.
pub(crate) fn count(journal: &Journal, needle: &str) -> usize {
    let spaced = format!("{needle} ");
    entries(journal)
        .iter()
        .filter(|e| *e == needle || e.starts_with(&spaced))
        .count()
}

pub(crate) fn position(journal: &Journal, needle: &str) -> Option<usize> {
    entries(journal).iter().position(|e| e == needle)
}

struct RecordingUi(Journal);

impl Ui for RecordingUi {
    fn cons_show(&self, message: &str) {
        self.0.push(format!("ui {message}"));
    }

    fn notify(&self, message: &str, _timeout_ms: u64, _category: Option<&str>) {
        self.0.push(format!("notify {message}"));
    }
}

pub(crate) fn test_host(journal: &Journal, options: HostOptions) -> PluginHost {
    let services = Services {
        ui: Arc::new(RecordingUi(journal.clone())),
        transport: Arc::new(OfflineTransport),
        settings: Arc::new(MemorySettings::new()),
    };
    PluginHost::new(options, services)
}

type ReplyFn = Box<dyn Fn(&HookEvent) -> HookReply + Send + Sync>;

/// A plugin built up from registrations. Every callback is journaled as
/// `"<name> <entry point> <detail>"`.
///
/// Command behavior is keyed on the name: `/slow*` sleeps five seconds first,
/// `/panic` panics, `/relay` sends its arguments back as a line, anything else
/// returns `"<command> ok"`. Timers named `bad*` fail.
pub(crate) struct ScriptedPlugin {
    name: String,
    journal: Journal,
    hooks: HookSet,
    commands: Vec<CommandSpec>,
    timers: Vec<(String, u64)>,
    completions: Vec<(String, Vec<String>)>,
    windows: Vec<String>,
    features: Vec<String>,
    reply: Option<ReplyFn>,
    init_line: Option<String>,
    init_delay: Option<Duration>,
    fail_init: bool,
}

impl ScriptedPlugin {
    pub(crate) fn new(name: &str, journal: &Journal) -> Self {
        Self {
            name: name.to_string(),
            journal: journal.clone(),
            hooks: HookSet::empty(),
            commands: Vec::new(),
            timers: Vec::new(),
            completions: Vec::new(),
            windows: Vec::new(),
            features: Vec::new(),
            reply: None,
            init_line: None,
            init_delay: None,
            fail_init: false,
        }
    }

    pub(crate) fn hook(mut self, hook: HookName) -> Self {
        self.hooks = self.hooks.with(hook);
        self
    }

    pub(crate) fn reply(
        mut self,
        reply: impl Fn(&HookEvent) -> HookReply + Send + Sync + 'static,
    ) -> Self {
        self.reply = Some(Box::new(reply));
        self
    }

    pub(crate) fn command(mut self, spec: CommandSpec) -> Self {
        self.commands.push(spec);
        self
    }

    pub(crate) fn timer(mut self, name: &str, secs: u64) -> Self {
        self.timers.push((name.to_string(), secs));
        self
    }

    pub(crate) fn completion(mut self, key: &str, items: &[&str]) -> Self {
        self.completions.push((
            key.to_string(),
            items.iter().map(|s| s.to_string()).collect(),
        ));
        self
    }

    pub(crate) fn window(mut self, tag: &str) -> Self {
        self.windows.push(tag.to_string());
        self
    }

    pub(crate) fn feature(mut self, feature: &str) -> Self {
        self.features.push(feature.to_string());
        self
    }

    /// Send `line` from `init`, after registering everything.
    pub(crate) fn init_line(mut self, line: &str) -> Self {
        self.init_line = Some(line.to_string());
        self
    }

    /// Keep `init` running this long after registering everything.
    pub(crate) fn init_delay(mut self, delay: Duration) -> Self {
        self.init_delay = Some(delay);
        self
    }

    pub(crate) fn fail_init(mut self) -> Self {
        self.fail_init = true;
        self
    }

    pub(crate) fn boxed(self) -> Box<dyn Plugin> {
        Box::new(self)
    }

    fn record(&self, entry: String) {
        self.journal.push(entry);
    }
}

#[async_trait]
impl Plugin for ScriptedPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn hooks(&self) -> HookSet {
        self.hooks.clone()
    }

    async fn init(&mut self, ctx: &PluginContext, client: &ClientInfo) -> anyhow::Result<()> {
        self.record(format!("{} init {}", self.name, client.version));

        for spec in &self.commands {
            if ctx.register_command(spec.clone()).await.is_err() {
                self.record(format!("{} rejected {}", self.name, spec.name));
            }
        }
        for (timer, secs) in &self.timers {
            ctx.register_timed(timer, Duration::from_secs(*secs)).await?;
        }
        for (key, items) in &self.completions {
            let items: Vec<&str> = items.iter().map(String::as_str).collect();
            ctx.completer_add(key, &items).await?;
        }
        for tag in &self.windows {
            if !ctx.win_create(tag).await? {
                self.record(format!("{} window refused {tag}", self.name));
            }
        }
        for feature in &self.features {
            ctx.disco_add_feature(feature).await?;
        }
        if let Some(line) = &self.init_line {
            ctx.send_line(line.clone())?;
        }
        if let Some(delay) = self.init_delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail_init {
            anyhow::bail!("init refused");
        }
        Ok(())
    }

    async fn on_hook(
        &mut self,
        _ctx: &PluginContext,
        event: &HookEvent,
    ) -> anyhow::Result<HookReply> {
        match event.payload() {
            Some(payload) => self.record(format!("{} {} {payload}", self.name, event.name())),
            None => self.record(format!("{} {}", self.name, event.name())),
        }
        Ok(self.reply.as_ref().map_or(HookReply::Keep, |reply| reply(event)))
    }

    async fn on_command(
        &mut self,
        ctx: &PluginContext,
        command: &str,
        args: &[String],
    ) -> anyhow::Result<Option<String>> {
        let mut entry = format!("{} {command}", self.name);
        if !args.is_empty() {
            entry.push(' ');
            entry.push_str(&args.join(" "));
        }
        self.record(entry);

        if command.starts_with("/slow") {
            tokio::time::sleep(Duration::from_secs(5)).await;
            self.record(format!("{} {command} done", self.name));
        }

        match command {
            "/panic" => panic!("command exploded"),
            "/relay" => {
                ctx.send_line(args.join(" "))?;
                Ok(None)
            }
            _ => Ok(Some(format!("{command} ok"))),
        }
    }

    async fn on_timer(&mut self, _ctx: &PluginContext, timer: &str) -> anyhow::Result<()> {
        self.record(format!("{} tick {timer}", self.name));
        if timer.starts_with("bad") {
            anyhow::bail!("timer {timer} failed");
        }
        Ok(())
    }

    async fn on_window_input(
        &mut self,
        _ctx: &PluginContext,
        tag: &str,
        line: &str,
    ) -> anyhow::Result<()> {
        self.record(format!("{} window {tag} {line}", self.name));
        Ok(())
    }
}

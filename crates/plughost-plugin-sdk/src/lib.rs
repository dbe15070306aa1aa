//! plughost Plugin SDK: the trait a plugin implements and the context it
//! calls back into the host with.
//!
//! A plugin is any type implementing [`Plugin`]. It declares which hooks it
//! implements through [`Plugin::hooks`]; every other entry point is optional
//! and has a no-op default. The host runs all entry points of one plugin on a
//! single queue, so `&mut self` is the plugin's own state and needs no locks.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use plughost_plugin_sdk::{ClientInfo, CommandSpec, HookEvent, HookName, HookReply, HookSet, Plugin, PluginContext};
//!
//! struct Shout { count: u64 }
//!
//! #[async_trait::async_trait]
//! impl Plugin for Shout {
//!     fn name(&self) -> &str { "shout" }
//!
//!     fn hooks(&self) -> HookSet { HookSet::from([HookName::PreChatMessageSend]) }
//!
//!     async fn init(&mut self, ctx: &PluginContext, _client: &ClientInfo) -> anyhow::Result<()> {
//!         ctx.register_command(CommandSpec::new("/shouts", 0, 0)).await?;
//!         Ok(())
//!     }
//!
//!     async fn on_hook(&mut self, _ctx: &PluginContext, event: &HookEvent) -> anyhow::Result<HookReply> {
//!         self.count += 1;
//!         Ok(HookReply::Replace(event.payload().unwrap_or_default().to_uppercase()))
//!     }
//!
//!     async fn on_command(&mut self, _ctx: &PluginContext, _cmd: &str, _args: &[String]) -> anyhow::Result<Option<String>> {
//!         Ok(Some(format!("{} messages shouted", self.count)))
//!     }
//! }
//! ```

pub mod context;
pub mod services;

pub use context::{HostApi, PluginContext};
pub use services::{Services, Settings, Transport, Ui};

pub use plughost_hooks::{HookEvent, HookKind, HookName, HookReply, HookSet};
pub use plughost_types::{
    ClientInfo, CommandHelp, CommandSpec, HostError, PluginFault, TimerId, TimerSpec,
};

/// A unit of extension loaded into the host.
#[async_trait::async_trait]
pub trait Plugin: Send + 'static {
    /// Unique plugin name.
    fn name(&self) -> &str;

    /// Hooks this plugin implements. Only these are ever delivered to `on_hook`.
    fn hooks(&self) -> HookSet {
        HookSet::empty()
    }

    /// Called once when the plugin is loaded, before any other entry point.
    ///
    /// Commands, timers and completions are usually registered here.
    async fn init(&mut self, _ctx: &PluginContext, _client: &ClientInfo) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called for each event whose hook is in [`Plugin::hooks`].
    ///
    /// The reply is interpreted per hook: see [`HookReply`].
    async fn on_hook(
        &mut self,
        _ctx: &PluginContext,
        _event: &HookEvent,
    ) -> anyhow::Result<HookReply> {
        Ok(HookReply::Keep)
    }

    /// Called when the user runs a command this plugin registered.
    ///
    /// Arguments are already checked against the declared range.
    async fn on_command(
        &mut self,
        _ctx: &PluginContext,
        command: &str,
        _args: &[String],
    ) -> anyhow::Result<Option<String>> {
        anyhow::bail!("plugin {} does not handle {command}", self.name())
    }

    /// Called on each tick of a timer this plugin registered.
    async fn on_timer(&mut self, _ctx: &PluginContext, _timer: &str) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called when the user enters a line in a window this plugin created.
    async fn on_window_input(
        &mut self,
        _ctx: &PluginContext,
        _tag: &str,
        _line: &str,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}

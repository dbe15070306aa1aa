//! Plugins compiled into the binary.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Local;

use plughost_plugin_sdk::{
    ClientInfo, CommandHelp, CommandSpec, HookEvent, HookName, HookReply, HookSet, Plugin,
    PluginContext,
};

pub const NAMES: [&str; 2] = ["echo", "clock"];

/// Instantiate a built-in plugin by name.
pub fn create(name: &str) -> Option<Box<dyn Plugin>> {
    match name {
        "echo" => Some(Box::new(Echo::default())),
        "clock" => Some(Box::new(Clock::default())),
        _ => None,
    }
}

// ──────────────────── echo ────────────────────

/// Repeats its arguments, and optionally shouts outgoing messages.
#[derive(Default)]
struct Echo {
    sent: u64,
}

#[async_trait]
impl Plugin for Echo {
    fn name(&self) -> &str {
        "echo"
    }

    fn hooks(&self) -> HookSet {
        HookSet::from([
            HookName::OnStart,
            HookName::PreChatMessageSend,
            HookName::PostChatMessageSend,
        ])
    }

    async fn init(&mut self, ctx: &PluginContext, _client: &ClientInfo) -> anyhow::Result<()> {
        let help = CommandHelp {
            synopsis: vec!["/echo <text>".into(), "/echo stats".into(), "/echo shout on|off".into()],
            description: "Repeat text back to the console.".into(),
            arguments: vec![
                ("stats".into(), "Show how many messages were sent.".into()),
                ("shout on|off".into(), "Upper-case outgoing messages.".into()),
            ],
            examples: vec!["/echo \"hello world\"".into(), "/echo shout on".into()],
        };
        ctx.register_command(CommandSpec::new("/echo", 1, 2).with_help(help))
            .await?;
        ctx.completer_add("/echo", &["stats", "shout"]).await?;
        ctx.completer_add("/echo shout", &["on", "off"]).await?;
        Ok(())
    }

    async fn on_hook(&mut self, ctx: &PluginContext, event: &HookEvent) -> anyhow::Result<HookReply> {
        match event {
            HookEvent::OnStart => {
                ctx.cons_show("echo plugin ready, try /echo")?;
                Ok(HookReply::Keep)
            }
            HookEvent::PreChatMessageSend { message, .. } => {
                if ctx.settings_get_boolean("echo", "shout", false)? {
                    Ok(HookReply::Replace(message.to_uppercase()))
                } else {
                    Ok(HookReply::Keep)
                }
            }
            HookEvent::PostChatMessageSend { .. } => {
                self.sent += 1;
                Ok(HookReply::Keep)
            }
            _ => Ok(HookReply::Keep),
        }
    }

    async fn on_command(
        &mut self,
        ctx: &PluginContext,
        _command: &str,
        args: &[String],
    ) -> anyhow::Result<Option<String>> {
        match args {
            [first] if first == "stats" => Ok(Some(format!("{} messages sent", self.sent))),
            [first, value] if first == "shout" => {
                let on = match value.as_str() {
                    "on" => true,
                    "off" => false,
                    _ => {
                        ctx.ui()?.cons_bad_cmd_usage("/echo");
                        return Ok(None);
                    }
                };
                ctx.settings_set_boolean("echo", "shout", on)?;
                Ok(Some(format!("shout {value}")))
            }
            _ => Ok(Some(args.join(" "))),
        }
    }
}

// ──────────────────── clock ────────────────────

const DEFAULT_FORMAT: &str = "%H:%M:%S";

/// Periodically prints the time into its own window.
#[derive(Default)]
struct Clock {
    ticks: u64,
}

impl Clock {
    fn now(ctx: &PluginContext) -> anyhow::Result<String> {
        let format = ctx
            .settings_get_string("clock", "format", Some(DEFAULT_FORMAT))?
            .unwrap_or_else(|| DEFAULT_FORMAT.to_string());
        Ok(Local::now().format(&format).to_string())
    }
}

#[async_trait]
impl Plugin for Clock {
    fn name(&self) -> &str {
        "clock"
    }

    async fn init(&mut self, ctx: &PluginContext, client: &ClientInfo) -> anyhow::Result<()> {
        let interval = ctx.settings_get_int("clock", "interval", 60)?.max(1) as u64;

        ctx.register_command(CommandSpec::new("/clock", 0, 2)).await?;
        ctx.completer_add("/clock", &["now", "format", "ticks"]).await?;
        ctx.register_timed("tick", Duration::from_secs(interval))
            .await?;
        ctx.win_create("clock").await?;
        ctx.disco_add_feature("urn:xmpp:time").await?;

        ctx.log_info(&format!(
            "clock loaded on {} {}, ticking every {interval}s",
            client.version, client.status
        ));
        Ok(())
    }

    async fn on_command(
        &mut self,
        ctx: &PluginContext,
        _command: &str,
        args: &[String],
    ) -> anyhow::Result<Option<String>> {
        match args {
            [] => Ok(Some(Self::now(ctx)?)),
            [first] if first == "now" => Ok(Some(Self::now(ctx)?)),
            [first] if first == "ticks" => Ok(Some(format!("{} ticks", self.ticks))),
            [first, format] if first == "format" => {
                ctx.settings_set_string("clock", "format", format)?;
                Ok(Some(format!("clock format set to {format}")))
            }
            _ => {
                ctx.ui()?.cons_bad_cmd_usage("/clock");
                Ok(None)
            }
        }
    }

    async fn on_timer(&mut self, ctx: &PluginContext, _timer: &str) -> anyhow::Result<()> {
        self.ticks += 1;
        ctx.win_show("clock", &Self::now(ctx)?)?;
        Ok(())
    }

    async fn on_window_input(
        &mut self,
        ctx: &PluginContext,
        tag: &str,
        line: &str,
    ) -> anyhow::Result<()> {
        ctx.win_show(tag, &format!("{line} @ {}", Self::now(ctx)?))?;
        Ok(())
    }
}

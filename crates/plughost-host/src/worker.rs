//! One task per loaded plugin.
//!
//! Every entry point of a plugin (hooks, commands, timer ticks, window input)
//! is queued on the plugin's own channel and run in arrival order, so a plugin
//! never sees two of its callbacks at once. Callback errors and panics are
//! caught here and reported back as a [`FaultKind`]; the worker keeps serving.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use plughost_hooks::{HookEvent, HookName, HookReply, HookSet, HookTarget};
use plughost_plugin_sdk::{Plugin, PluginContext};
use plughost_types::{ClientInfo, FaultKind, PluginFault};

/// A call into a plugin.
#[derive(Debug)]
pub(crate) enum Invocation {
    Init(ClientInfo),
    Hook(HookEvent),
    Command { name: String, args: Vec<String> },
    Timer(String),
    WindowInput { tag: String, line: String },
    /// Last job a worker runs. Delivers `on_unload` when `notify` is set.
    Unload { notify: bool },
}

impl Invocation {
    fn entry_point(&self) -> String {
        match self {
            Invocation::Init(_) => "init".to_string(),
            Invocation::Hook(event) => event.name().to_string(),
            Invocation::Command { name, .. } => name.clone(),
            Invocation::Timer(name) => format!("timer {name}"),
            Invocation::WindowInput { tag, .. } => format!("window {tag}"),
            Invocation::Unload { .. } => HookName::OnUnload.to_string(),
        }
    }

    /// Calls the host waits on while the user waits on the host.
    fn watched(&self) -> bool {
        matches!(
            self,
            Invocation::Hook(_) | Invocation::Command { .. } | Invocation::WindowInput { .. }
        )
    }
}

#[derive(Debug)]
pub(crate) enum Outcome {
    Done,
    Reply(HookReply),
    Output(Option<String>),
}

struct Job {
    invocation: Invocation,
    reply: oneshot::Sender<Result<Outcome, FaultKind>>,
}

/// Host-side handle to a plugin's worker.
pub(crate) struct PluginHandle {
    name: String,
    hooks: HookSet,
    tx: mpsc::UnboundedSender<Job>,
    call_timeout: Option<Duration>,
}

impl PluginHandle {
    /// Start the worker for `plugin`. Must be called from within a Tokio runtime.
    pub(crate) fn spawn(
        plugin: Box<dyn Plugin>,
        ctx: PluginContext,
        call_timeout: Option<Duration>,
    ) -> Arc<Self> {
        let name = plugin.name().to_string();
        let hooks = plugin.hooks();
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_worker(plugin, ctx, rx));

        Arc::new(Self {
            name,
            hooks,
            tx,
            call_timeout,
        })
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn hooks(&self) -> &HookSet {
        &self.hooks
    }

    pub(crate) fn implements(&self, hook: HookName) -> bool {
        self.hooks.contains(hook)
    }

    /// Queue `invocation` and wait for it to run.
    ///
    /// Fails with [`FaultKind::Unavailable`] if the worker has already taken
    /// its unload job, so the call never started.
    pub(crate) async fn call(&self, invocation: Invocation) -> Result<Outcome, PluginFault> {
        let entry_point = invocation.entry_point();
        let limit = self.call_timeout.filter(|_| invocation.watched());

        let (reply, receiver) = oneshot::channel();
        if self.tx.send(Job { invocation, reply }).is_err() {
            return Err(self.fault(entry_point, FaultKind::Unavailable));
        }

        let received = match limit {
            Some(limit) => match tokio::time::timeout(limit, receiver).await {
                Ok(received) => received,
                Err(_) => {
                    warn!(
                        plugin = %self.name,
                        entry_point = %entry_point,
                        timeout_ms = limit.as_millis() as u64,
                        "Plugin call timed out, no longer waiting"
                    );
                    return Err(self.fault(entry_point, FaultKind::TimedOut));
                }
            },
            None => receiver.await,
        };

        match received {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(kind)) => Err(self.fault(entry_point, kind)),
            Err(_) => Err(self.fault(entry_point, FaultKind::Unavailable)),
        }
    }

    fn fault(&self, entry_point: String, kind: FaultKind) -> PluginFault {
        PluginFault::new(self.name.clone(), entry_point, kind)
    }
}

#[async_trait]
impl HookTarget for PluginHandle {
    fn plugin_name(&self) -> &str {
        &self.name
    }

    async fn deliver(&self, event: HookEvent) -> Result<HookReply, PluginFault> {
        match self.call(Invocation::Hook(event)).await? {
            Outcome::Reply(reply) => Ok(reply),
            _ => Ok(HookReply::Keep),
        }
    }
}

async fn run_worker(
    mut plugin: Box<dyn Plugin>,
    ctx: PluginContext,
    mut rx: mpsc::UnboundedReceiver<Job>,
) {
    let name = plugin.name().to_string();
    debug!(plugin = %name, "Plugin worker started");

    let mut failed = false;
    while let Some(Job { invocation, reply }) = rx.recv().await {
        let last = matches!(invocation, Invocation::Unload { .. });
        if failed && !last {
            let _ = reply.send(Err(FaultKind::Unavailable));
            continue;
        }

        let init = matches!(invocation, Invocation::Init(_));
        let result = invoke(plugin.as_mut(), &ctx, invocation).await;
        if init && result.is_err() {
            // Only the unload job runs after a failed init.
            failed = true;
        }
        // The caller may have stopped waiting.
        let _ = reply.send(result);
        if last {
            break;
        }
    }

    debug!(plugin = %name, "Plugin worker stopped");
}

async fn invoke(
    plugin: &mut dyn Plugin,
    ctx: &PluginContext,
    invocation: Invocation,
) -> Result<Outcome, FaultKind> {
    let call = async {
        match invocation {
            Invocation::Init(client) => plugin.init(ctx, &client).await.map(|()| Outcome::Done),
            Invocation::Hook(event) => plugin.on_hook(ctx, &event).await.map(Outcome::Reply),
            Invocation::Command { name, args } => plugin
                .on_command(ctx, &name, &args)
                .await
                .map(Outcome::Output),
            Invocation::Timer(name) => plugin.on_timer(ctx, &name).await.map(|()| Outcome::Done),
            Invocation::WindowInput { tag, line } => plugin
                .on_window_input(ctx, &tag, &line)
                .await
                .map(|()| Outcome::Done),
            Invocation::Unload { notify } => {
                if notify && plugin.hooks().contains(HookName::OnUnload) {
                    plugin
                        .on_hook(ctx, &HookEvent::OnUnload)
                        .await
                        .map(|_| Outcome::Done)
                } else {
                    Ok(Outcome::Done)
                }
            }
        }
    };

    match AssertUnwindSafe(call).catch_unwind().await {
        Ok(Ok(outcome)) => Ok(outcome),
        Ok(Err(err)) => Err(FaultKind::Error(format!("{err:#}"))),
        Err(panic) => Err(FaultKind::Panic(panic_message(panic.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plughost_plugin_sdk::HostApi;
    use std::sync::Weak;

    struct Counter {
        seen: Vec<String>,
    }

    #[async_trait]
    impl Plugin for Counter {
        fn name(&self) -> &str {
            "counter"
        }

        fn hooks(&self) -> HookSet {
            HookSet::from([HookName::PreChatMessageSend])
        }

        async fn init(&mut self, _ctx: &PluginContext, client: &ClientInfo) -> anyhow::Result<()> {
            if client.status == "refuse" {
                anyhow::bail!("not starting");
            }
            Ok(())
        }

        async fn on_hook(
            &mut self,
            _ctx: &PluginContext,
            event: &HookEvent,
        ) -> anyhow::Result<HookReply> {
            let message = event.payload().unwrap_or_default().to_string();
            if message == "boom" {
                panic!("cannot send boom");
            }
            self.seen.push(message);
            Ok(HookReply::Replace(format!("#{}", self.seen.len())))
        }

        async fn on_command(
            &mut self,
            _ctx: &PluginContext,
            command: &str,
            args: &[String],
        ) -> anyhow::Result<Option<String>> {
            match command {
                "/seen" => Ok(Some(self.seen.join(","))),
                "/sleep" => {
                    tokio::time::sleep(Duration::from_secs(10)).await;
                    Ok(None)
                }
                _ => anyhow::bail!("bad command {command} {args:?}"),
            }
        }
    }

    fn detached_context() -> PluginContext {
        let host: Weak<dyn HostApi> = Weak::<crate::host::HostInner>::new();
        PluginContext::new("counter", host)
    }

    fn spawn(call_timeout: Option<Duration>) -> Arc<PluginHandle> {
        PluginHandle::spawn(
            Box::new(Counter { seen: Vec::new() }),
            detached_context(),
            call_timeout,
        )
    }

    fn send(message: &str) -> HookEvent {
        HookEvent::PreChatMessageSend {
            barejid: "bob@example.org".into(),
            message: message.into(),
        }
    }

    #[tokio::test]
    async fn test_state_persists_between_calls() {
        let handle = spawn(None);
        assert_eq!(handle.deliver(send("a")).await.unwrap(), HookReply::Replace("#1".into()));
        assert_eq!(handle.deliver(send("b")).await.unwrap(), HookReply::Replace("#2".into()));

        let outcome = handle
            .call(Invocation::Command {
                name: "/seen".into(),
                args: vec![],
            })
            .await
            .unwrap();
        assert!(matches!(outcome, Outcome::Output(Some(ref s)) if s == "a,b"));
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let handle = spawn(None);
        let fault = handle.deliver(send("boom")).await.unwrap_err();
        assert_eq!(fault.plugin, "counter");
        assert_eq!(fault.entry_point, "pre_chat_message_send");
        assert_eq!(fault.kind, FaultKind::Panic("cannot send boom".into()));

        // The worker is still serving.
        assert!(handle.deliver(send("after")).await.is_ok());
    }

    #[tokio::test]
    async fn test_error_becomes_fault() {
        let handle = spawn(None);
        let fault = handle
            .call(Invocation::Command {
                name: "/other".into(),
                args: vec!["x".into()],
            })
            .await
            .unwrap_err();
        assert!(matches!(fault.kind, FaultKind::Error(ref msg) if msg.contains("bad command /other")));
    }

    #[tokio::test]
    async fn test_calls_after_unload_are_unavailable() {
        let handle = spawn(None);
        handle
            .call(Invocation::Unload { notify: true })
            .await
            .unwrap();

        let fault = handle.deliver(send("late")).await.unwrap_err();
        assert!(fault.is_unavailable());
    }

    #[tokio::test]
    async fn test_failed_init_serves_only_unload() {
        let handle = spawn(None);
        let init = handle.call(Invocation::Init(ClientInfo::new("1.0", "refuse")));
        let queued = handle.deliver(send("queued"));
        let (init, queued) = tokio::join!(init, queued);

        assert!(matches!(init.unwrap_err().kind, FaultKind::Error(_)));
        assert!(queued.unwrap_err().is_unavailable());
        assert!(handle.call(Invocation::Unload { notify: false }).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_watchdog_abandons_slow_call() {
        let handle = spawn(Some(Duration::from_millis(100)));
        let fault = handle
            .call(Invocation::Command {
                name: "/sleep".into(),
                args: vec![],
            })
            .await
            .unwrap_err();
        assert_eq!(fault.kind, FaultKind::TimedOut);
        assert_eq!(fault.entry_point, "/sleep");
    }
}

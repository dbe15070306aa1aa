//! Hook dispatcher: routes one event through the plugins that implement it.
//!
//! Targets are visited in the order given, which the host keeps as plugin
//! registration order. Transform hooks fold the payload left to right, each
//! plugin seeing the previous plugin's output; a fault in one plugin is
//! logged and the chain carries on with the last good payload.

use std::ops::ControlFlow;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use plughost_types::PluginFault;

use crate::events::{HookEvent, HookKind, HookReply};

/// Something that can receive a hook event on behalf of one plugin.
#[async_trait]
pub trait HookTarget: Send + Sync {
    /// Name of the plugin behind this target.
    fn plugin_name(&self) -> &str;

    /// Deliver the event and wait for the plugin's reply.
    async fn deliver(&self, event: HookEvent) -> Result<HookReply, PluginFault>;
}

#[async_trait]
impl<T: HookTarget + ?Sized> HookTarget for Arc<T> {
    fn plugin_name(&self) -> &str {
        (**self).plugin_name()
    }

    async fn deliver(&self, event: HookEvent) -> Result<HookReply, PluginFault> {
        (**self).deliver(event).await
    }
}

/// Result of dispatching one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Notify hook; nothing to hand back.
    Notified,
    /// Transform hook; the payload the client should display or send.
    Deliver(String),
    /// A send hook was cancelled by the named plugin.
    Cancelled { plugin: String },
    /// Stanza receive hook; whether the client should keep processing.
    Continue(bool),
}

impl DispatchOutcome {
    /// The final payload, or `None` if the action was cancelled or carried none.
    pub fn into_payload(self) -> Option<String> {
        match self {
            DispatchOutcome::Deliver(payload) => Some(payload),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, DispatchOutcome::Cancelled { .. })
    }

    /// False only when a receive hook vetoed further processing.
    pub fn should_continue(&self) -> bool {
        !matches!(self, DispatchOutcome::Continue(false))
    }
}

/// Dispatch `event` to `targets` following the contract of its hook kind.
pub async fn dispatch<T: HookTarget>(targets: &[T], event: HookEvent) -> DispatchOutcome {
    let kind = event.name().kind();
    match kind {
        HookKind::Notify => {
            notify(targets, event).await;
            DispatchOutcome::Notified
        }
        HookKind::Display | HookKind::Send | HookKind::StanzaSend => {
            transform(targets, event, kind.cancellable()).await
        }
        HookKind::StanzaReceive => DispatchOutcome::Continue(filter(targets, event).await),
    }
}

async fn notify<T: HookTarget>(targets: &[T], event: HookEvent) {
    let hook = event.name();
    for target in targets {
        if let Err(fault) = target.deliver(event.clone()).await {
            log_fault(hook.as_str(), &fault);
        }
    }
}

async fn transform<T: HookTarget>(
    targets: &[T],
    mut event: HookEvent,
    cancellable: bool,
) -> DispatchOutcome {
    let hook = event.name();
    for target in targets {
        let reply = match target.deliver(event.clone()).await {
            Ok(reply) => reply,
            Err(fault) => {
                log_fault(hook.as_str(), &fault);
                continue;
            }
        };

        if let ControlFlow::Break(()) = apply(&mut event, reply, cancellable, target.plugin_name())
        {
            return DispatchOutcome::Cancelled {
                plugin: target.plugin_name().to_string(),
            };
        }
    }

    DispatchOutcome::Deliver(event.payload().unwrap_or_default().to_string())
}

/// One step of the transform fold.
fn apply(
    event: &mut HookEvent,
    reply: HookReply,
    cancellable: bool,
    plugin: &str,
) -> ControlFlow<()> {
    let hook = event.name();
    match reply {
        HookReply::Keep => ControlFlow::Continue(()),
        HookReply::Replace(next) => {
            if let Some(payload) = event.payload_mut() {
                *payload = next;
            }
            ControlFlow::Continue(())
        }
        HookReply::Cancel if cancellable => {
            debug!(plugin, hook = %hook, "Send cancelled by plugin");
            ControlFlow::Break(())
        }
        other => {
            debug!(plugin, hook = %hook, reply = ?other, "Ignoring reply not valid for hook");
            ControlFlow::Continue(())
        }
    }
}

async fn filter<T: HookTarget>(targets: &[T], event: HookEvent) -> bool {
    let hook = event.name();
    for target in targets {
        match target.deliver(event.clone()).await {
            Ok(HookReply::Continue(false)) | Ok(HookReply::Cancel) => {
                debug!(plugin = target.plugin_name(), hook = %hook, "Stanza processing stopped by plugin");
                return false;
            }
            Ok(_) => {}
            Err(fault) => log_fault(hook.as_str(), &fault),
        }
    }
    true
}

fn log_fault(hook: &str, fault: &PluginFault) {
    if fault.is_unavailable() {
        debug!(plugin = %fault.plugin, hook, "Skipping plugin that was unloaded mid-dispatch");
    } else {
        warn!(plugin = %fault.plugin, hook, "Plugin hook failed: {}", fault.kind);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plughost_types::FaultKind;
    use std::sync::Mutex;

    /// Scripted target that records what it saw.
    struct Scripted {
        name: String,
        seen: Mutex<Vec<String>>,
        respond: Box<dyn Fn(&HookEvent) -> Result<HookReply, FaultKind> + Send + Sync>,
    }

    impl Scripted {
        fn new(
            name: &str,
            respond: impl Fn(&HookEvent) -> Result<HookReply, FaultKind> + Send + Sync + 'static,
        ) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                seen: Mutex::new(Vec::new()),
                respond: Box::new(respond),
            })
        }

        fn seen(&self) -> Vec<String> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HookTarget for Scripted {
        fn plugin_name(&self) -> &str {
            &self.name
        }

        async fn deliver(&self, event: HookEvent) -> Result<HookReply, PluginFault> {
            self.seen
                .lock()
                .unwrap()
                .push(event.payload().unwrap_or(event.name().as_str()).to_string());
            (self.respond)(&event)
                .map_err(|kind| PluginFault::new(&self.name, event.name().as_str(), kind))
        }
    }

    fn chat_send(message: &str) -> HookEvent {
        HookEvent::PreChatMessageSend {
            barejid: "alice@example.org".into(),
            message: message.into(),
        }
    }

    #[tokio::test]
    async fn test_transform_chains_in_order() {
        let p1 = Scripted::new("p1", |_| Ok(HookReply::Replace("A".into())));
        let p2 = Scripted::new("p2", |e| {
            Ok(HookReply::Replace(format!("{}!", e.payload().unwrap())))
        });

        let outcome = dispatch(&[p1.clone(), p2.clone()], chat_send("hi")).await;

        assert_eq!(outcome, DispatchOutcome::Deliver("A!".into()));
        assert_eq!(p1.seen(), vec!["hi"]);
        assert_eq!(p2.seen(), vec!["A"]);
    }

    #[tokio::test]
    async fn test_keep_preserves_payload() {
        let p1 = Scripted::new("p1", |_| Ok(HookReply::Keep));
        let p2 = Scripted::new("p2", |_| Ok(HookReply::Replace(String::new())));

        let outcome = dispatch(&[p1.clone()], chat_send("unchanged")).await;
        assert_eq!(outcome, DispatchOutcome::Deliver("unchanged".into()));

        // Replacing with an empty string is distinct from keeping.
        let outcome = dispatch(&[p1, p2], chat_send("gone")).await;
        assert_eq!(outcome, DispatchOutcome::Deliver(String::new()));
    }

    #[tokio::test]
    async fn test_cancel_stops_chain() {
        let p1 = Scripted::new("p1", |_| Ok(HookReply::Cancel));
        let p2 = Scripted::new("p2", |_| Ok(HookReply::Replace("never".into())));

        let outcome = dispatch(&[p1, p2.clone()], chat_send("hi")).await;

        assert_eq!(outcome, DispatchOutcome::Cancelled { plugin: "p1".into() });
        assert!(outcome.clone().into_payload().is_none());
        assert!(p2.seen().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_ignored_for_display() {
        let p1 = Scripted::new("p1", |_| Ok(HookReply::Cancel));
        let p2 = Scripted::new("p2", |_| Ok(HookReply::Keep));
        let event = HookEvent::PreChatMessageDisplay {
            barejid: "bob@example.org".into(),
            resource: "laptop".into(),
            message: "shown".into(),
        };

        let outcome = dispatch(&[p1, p2.clone()], event).await;

        assert_eq!(outcome, DispatchOutcome::Deliver("shown".into()));
        assert_eq!(p2.seen(), vec!["shown"]);
    }

    #[tokio::test]
    async fn test_fault_keeps_last_good_payload() {
        let p1 = Scripted::new("p1", |_| Ok(HookReply::Replace("first".into())));
        let p2 = Scripted::new("p2", |_| Err(FaultKind::Panic("bad plugin".into())));
        let p3 = Scripted::new("p3", |e| {
            Ok(HookReply::Replace(format!("{}+third", e.payload().unwrap())))
        });

        let outcome = dispatch(&[p1, p2, p3.clone()], chat_send("zero")).await;

        assert_eq!(outcome, DispatchOutcome::Deliver("first+third".into()));
        assert_eq!(p3.seen(), vec!["first"]);
    }

    #[tokio::test]
    async fn test_stanza_send_replace_and_cancel() {
        let tagger = Scripted::new("tagger", |e| {
            Ok(HookReply::Replace(e.payload().unwrap().replace("/>", " id='1'/>")))
        });
        let event = HookEvent::OnIqStanzaSend {
            stanza: "<iq/>".into(),
        };
        let outcome = dispatch(&[tagger.clone()], event.clone()).await;
        assert_eq!(outcome, DispatchOutcome::Deliver("<iq id='1'/>".into()));

        let dropper = Scripted::new("dropper", |_| Ok(HookReply::Cancel));
        let outcome = dispatch(&[dropper, tagger], event).await;
        assert!(outcome.is_cancelled());
    }

    #[tokio::test]
    async fn test_receive_short_circuits_on_false() {
        let p1 = Scripted::new("p1", |_| Ok(HookReply::Continue(true)));
        let p2 = Scripted::new("p2", |_| Ok(HookReply::Continue(false)));
        let p3 = Scripted::new("p3", |_| Ok(HookReply::Continue(true)));
        let event = HookEvent::OnMessageStanzaReceive {
            stanza: "<message/>".into(),
        };

        let outcome = dispatch(&[p1.clone(), p2, p3.clone()], event).await;

        assert_eq!(outcome, DispatchOutcome::Continue(false));
        assert!(!outcome.should_continue());
        assert_eq!(p1.seen().len(), 1);
        assert!(p3.seen().is_empty());
    }

    #[tokio::test]
    async fn test_receive_fault_continues() {
        let p1 = Scripted::new("p1", |_| Err(FaultKind::Error("parse".into())));
        let p2 = Scripted::new("p2", |_| Ok(HookReply::Keep));
        let event = HookEvent::OnPresenceStanzaReceive {
            stanza: "<presence/>".into(),
        };

        let outcome = dispatch(&[p1, p2.clone()], event).await;

        assert_eq!(outcome, DispatchOutcome::Continue(true));
        assert_eq!(p2.seen().len(), 1);
    }

    #[tokio::test]
    async fn test_notify_reaches_everyone() {
        let p1 = Scripted::new("p1", |_| Err(FaultKind::Error("oops".into())));
        let p2 = Scripted::new("p2", |_| Ok(HookReply::Cancel));
        let p3 = Scripted::new("p3", |_| Ok(HookReply::Keep));

        let outcome = dispatch(&[p1.clone(), p2.clone(), p3.clone()], HookEvent::OnStart).await;

        assert_eq!(outcome, DispatchOutcome::Notified);
        for target in [p1, p2, p3] {
            assert_eq!(target.seen(), vec!["on_start"]);
        }
    }

    #[tokio::test]
    async fn test_empty_chain_passes_through() {
        let none: [Arc<Scripted>; 0] = [];
        let outcome = dispatch(&none, chat_send("solo")).await;
        assert_eq!(outcome, DispatchOutcome::Deliver("solo".into()));
    }
}

//! Hook vocabulary: names, event payloads, and plugin replies.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The fixed set of hooks a plugin may implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookName {
    OnStart,
    OnShutdown,
    OnUnload,
    OnConnect,
    OnDisconnect,
    PreChatMessageDisplay,
    PostChatMessageDisplay,
    PreChatMessageSend,
    PostChatMessageSend,
    PreRoomMessageDisplay,
    PostRoomMessageDisplay,
    PreRoomMessageSend,
    PostRoomMessageSend,
    OnRoomHistoryMessage,
    PrePrivMessageDisplay,
    PostPrivMessageDisplay,
    PrePrivMessageSend,
    PostPrivMessageSend,
    OnMessageStanzaSend,
    OnMessageStanzaReceive,
    OnPresenceStanzaSend,
    OnPresenceStanzaReceive,
    OnIqStanzaSend,
    OnIqStanzaReceive,
    OnContactOffline,
    OnContactPresence,
    OnChatWinFocus,
    OnRoomWinFocus,
}

/// How the dispatcher treats replies for a hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    /// Every implementing plugin runs; replies are ignored.
    Notify,
    /// Chained rewrite of a message about to be shown.
    Display,
    /// Chained rewrite of a message about to be sent; may be cancelled.
    Send,
    /// Chained rewrite of an outgoing stanza; may be cancelled.
    StanzaSend,
    /// Veto over further processing of an incoming stanza.
    StanzaReceive,
}

impl HookKind {
    /// Whether a `Cancel` reply aborts the action.
    pub fn cancellable(self) -> bool {
        matches!(self, HookKind::Send | HookKind::StanzaSend)
    }
}

impl HookName {
    pub const ALL: [HookName; 28] = [
        HookName::OnStart,
        HookName::OnShutdown,
        HookName::OnUnload,
        HookName::OnConnect,
        HookName::OnDisconnect,
        HookName::PreChatMessageDisplay,
        HookName::PostChatMessageDisplay,
        HookName::PreChatMessageSend,
        HookName::PostChatMessageSend,
        HookName::PreRoomMessageDisplay,
        HookName::PostRoomMessageDisplay,
        HookName::PreRoomMessageSend,
        HookName::PostRoomMessageSend,
        HookName::OnRoomHistoryMessage,
        HookName::PrePrivMessageDisplay,
        HookName::PostPrivMessageDisplay,
        HookName::PrePrivMessageSend,
        HookName::PostPrivMessageSend,
        HookName::OnMessageStanzaSend,
        HookName::OnMessageStanzaReceive,
        HookName::OnPresenceStanzaSend,
        HookName::OnPresenceStanzaReceive,
        HookName::OnIqStanzaSend,
        HookName::OnIqStanzaReceive,
        HookName::OnContactOffline,
        HookName::OnContactPresence,
        HookName::OnChatWinFocus,
        HookName::OnRoomWinFocus,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            HookName::OnStart => "on_start",
            HookName::OnShutdown => "on_shutdown",
            HookName::OnUnload => "on_unload",
            HookName::OnConnect => "on_connect",
            HookName::OnDisconnect => "on_disconnect",
            HookName::PreChatMessageDisplay => "pre_chat_message_display",
            HookName::PostChatMessageDisplay => "post_chat_message_display",
            HookName::PreChatMessageSend => "pre_chat_message_send",
            HookName::PostChatMessageSend => "post_chat_message_send",
            HookName::PreRoomMessageDisplay => "pre_room_message_display",
            HookName::PostRoomMessageDisplay => "post_room_message_display",
            HookName::PreRoomMessageSend => "pre_room_message_send",
            HookName::PostRoomMessageSend => "post_room_message_send",
            HookName::OnRoomHistoryMessage => "on_room_history_message",
            HookName::PrePrivMessageDisplay => "pre_priv_message_display",
            HookName::PostPrivMessageDisplay => "post_priv_message_display",
            HookName::PrePrivMessageSend => "pre_priv_message_send",
            HookName::PostPrivMessageSend => "post_priv_message_send",
            HookName::OnMessageStanzaSend => "on_message_stanza_send",
            HookName::OnMessageStanzaReceive => "on_message_stanza_receive",
            HookName::OnPresenceStanzaSend => "on_presence_stanza_send",
            HookName::OnPresenceStanzaReceive => "on_presence_stanza_receive",
            HookName::OnIqStanzaSend => "on_iq_stanza_send",
            HookName::OnIqStanzaReceive => "on_iq_stanza_receive",
            HookName::OnContactOffline => "on_contact_offline",
            HookName::OnContactPresence => "on_contact_presence",
            HookName::OnChatWinFocus => "on_chat_win_focus",
            HookName::OnRoomWinFocus => "on_room_win_focus",
        }
    }

    pub fn kind(self) -> HookKind {
        match self {
            HookName::PreChatMessageDisplay
            | HookName::PreRoomMessageDisplay
            | HookName::PrePrivMessageDisplay => HookKind::Display,
            HookName::PreChatMessageSend
            | HookName::PreRoomMessageSend
            | HookName::PrePrivMessageSend => HookKind::Send,
            HookName::OnMessageStanzaSend
            | HookName::OnPresenceStanzaSend
            | HookName::OnIqStanzaSend => HookKind::StanzaSend,
            HookName::OnMessageStanzaReceive
            | HookName::OnPresenceStanzaReceive
            | HookName::OnIqStanzaReceive => HookKind::StanzaReceive,
            _ => HookKind::Notify,
        }
    }

    /// Look up a hook by its snake_case name.
    pub fn parse(name: &str) -> Option<HookName> {
        HookName::ALL.into_iter().find(|h| h.as_str() == name)
    }
}

impl fmt::Display for HookName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event delivered to every plugin implementing the matching hook.
///
/// Addresses, nicks, messages and stanzas are opaque strings to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "hook", rename_all = "snake_case")]
pub enum HookEvent {
    OnStart,
    OnShutdown,
    OnUnload,
    OnConnect {
        account_name: String,
        fulljid: String,
    },
    OnDisconnect {
        account_name: String,
        fulljid: String,
    },
    PreChatMessageDisplay {
        barejid: String,
        resource: String,
        message: String,
    },
    PostChatMessageDisplay {
        barejid: String,
        resource: String,
        message: String,
    },
    PreChatMessageSend {
        barejid: String,
        message: String,
    },
    PostChatMessageSend {
        barejid: String,
        message: String,
    },
    PreRoomMessageDisplay {
        barejid: String,
        nick: String,
        message: String,
    },
    PostRoomMessageDisplay {
        barejid: String,
        nick: String,
        message: String,
    },
    PreRoomMessageSend {
        barejid: String,
        message: String,
    },
    PostRoomMessageSend {
        barejid: String,
        message: String,
    },
    OnRoomHistoryMessage {
        barejid: String,
        nick: String,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<DateTime<Utc>>,
    },
    PrePrivMessageDisplay {
        barejid: String,
        nick: String,
        message: String,
    },
    PostPrivMessageDisplay {
        barejid: String,
        nick: String,
        message: String,
    },
    PrePrivMessageSend {
        barejid: String,
        nick: String,
        message: String,
    },
    PostPrivMessageSend {
        barejid: String,
        nick: String,
        message: String,
    },
    OnMessageStanzaSend {
        stanza: String,
    },
    OnMessageStanzaReceive {
        stanza: String,
    },
    OnPresenceStanzaSend {
        stanza: String,
    },
    OnPresenceStanzaReceive {
        stanza: String,
    },
    OnIqStanzaSend {
        stanza: String,
    },
    OnIqStanzaReceive {
        stanza: String,
    },
    OnContactOffline {
        barejid: String,
        resource: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<String>,
    },
    OnContactPresence {
        barejid: String,
        resource: String,
        presence: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<String>,
        priority: i32,
    },
    OnChatWinFocus {
        barejid: String,
    },
    OnRoomWinFocus {
        barejid: String,
    },
}

/// Borrows the payload field of a `HookEvent`, shared or mutable depending on
/// how the event itself is borrowed.
macro_rules! payload_field {
    ($event:expr) => {
        match $event {
            HookEvent::PreChatMessageDisplay { message, .. }
            | HookEvent::PreChatMessageSend { message, .. }
            | HookEvent::PreRoomMessageDisplay { message, .. }
            | HookEvent::PreRoomMessageSend { message, .. }
            | HookEvent::PrePrivMessageDisplay { message, .. }
            | HookEvent::PrePrivMessageSend { message, .. } => Some(message),
            HookEvent::OnMessageStanzaSend { stanza }
            | HookEvent::OnMessageStanzaReceive { stanza }
            | HookEvent::OnPresenceStanzaSend { stanza }
            | HookEvent::OnPresenceStanzaReceive { stanza }
            | HookEvent::OnIqStanzaSend { stanza }
            | HookEvent::OnIqStanzaReceive { stanza } => Some(stanza),
            _ => None,
        }
    };
}

impl HookEvent {
    pub fn name(&self) -> HookName {
        match self {
            HookEvent::OnStart => HookName::OnStart,
            HookEvent::OnShutdown => HookName::OnShutdown,
            HookEvent::OnUnload => HookName::OnUnload,
            HookEvent::OnConnect { .. } => HookName::OnConnect,
            HookEvent::OnDisconnect { .. } => HookName::OnDisconnect,
            HookEvent::PreChatMessageDisplay { .. } => HookName::PreChatMessageDisplay,
            HookEvent::PostChatMessageDisplay { .. } => HookName::PostChatMessageDisplay,
            HookEvent::PreChatMessageSend { .. } => HookName::PreChatMessageSend,
            HookEvent::PostChatMessageSend { .. } => HookName::PostChatMessageSend,
            HookEvent::PreRoomMessageDisplay { .. } => HookName::PreRoomMessageDisplay,
            HookEvent::PostRoomMessageDisplay { .. } => HookName::PostRoomMessageDisplay,
            HookEvent::PreRoomMessageSend { .. } => HookName::PreRoomMessageSend,
            HookEvent::PostRoomMessageSend { .. } => HookName::PostRoomMessageSend,
            HookEvent::OnRoomHistoryMessage { .. } => HookName::OnRoomHistoryMessage,
            HookEvent::PrePrivMessageDisplay { .. } => HookName::PrePrivMessageDisplay,
            HookEvent::PostPrivMessageDisplay { .. } => HookName::PostPrivMessageDisplay,
            HookEvent::PrePrivMessageSend { .. } => HookName::PrePrivMessageSend,
            HookEvent::PostPrivMessageSend { .. } => HookName::PostPrivMessageSend,
            HookEvent::OnMessageStanzaSend { .. } => HookName::OnMessageStanzaSend,
            HookEvent::OnMessageStanzaReceive { .. } => HookName::OnMessageStanzaReceive,
            HookEvent::OnPresenceStanzaSend { .. } => HookName::OnPresenceStanzaSend,
            HookEvent::OnPresenceStanzaReceive { .. } => HookName::OnPresenceStanzaReceive,
            HookEvent::OnIqStanzaSend { .. } => HookName::OnIqStanzaSend,
            HookEvent::OnIqStanzaReceive { .. } => HookName::OnIqStanzaReceive,
            HookEvent::OnContactOffline { .. } => HookName::OnContactOffline,
            HookEvent::OnContactPresence { .. } => HookName::OnContactPresence,
            HookEvent::OnChatWinFocus { .. } => HookName::OnChatWinFocus,
            HookEvent::OnRoomWinFocus { .. } => HookName::OnRoomWinFocus,
        }
    }

    /// The message or stanza a transform or filter hook acts on.
    pub fn payload(&self) -> Option<&str> {
        payload_field!(self).map(String::as_str)
    }

    /// Mutable access to the payload, used to thread rewrites down the chain.
    pub fn payload_mut(&mut self) -> Option<&mut String> {
        payload_field!(self)
    }
}

/// A plugin's answer to a hook invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum HookReply {
    /// No change; the payload passes through as received.
    #[default]
    Keep,
    /// Replace the payload for later plugins and the client.
    Replace(String),
    /// Abort the send. Only honored by send hooks.
    Cancel,
    /// Stanza receive hooks: whether the client should keep processing.
    Continue(bool),
}

/// The hooks a plugin implements.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookSet(BTreeSet<HookName>);

impl HookSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        HookName::ALL.into_iter().collect()
    }

    pub fn with(mut self, hook: HookName) -> Self {
        self.0.insert(hook);
        self
    }

    pub fn contains(&self, hook: HookName) -> bool {
        self.0.contains(&hook)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = HookName> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<HookName> for HookSet {
    fn from_iter<I: IntoIterator<Item = HookName>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<const N: usize> From<[HookName; N]> for HookSet {
    fn from(hooks: [HookName; N]) -> Self {
        hooks.into_iter().collect()
    }
}

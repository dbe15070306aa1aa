//! Client collaborators reachable from plugins.
//!
//! The host does not render anything, speak the wire protocol, or persist
//! settings itself; it hands plugins these pass-through services instead.
//! Implementations must be callable from any task.

use std::sync::Arc;

/// Terminal UI: console, plugin windows, desktop notifications.
pub trait Ui: Send + Sync {
    /// Show a message in the console window.
    fn cons_show(&self, message: &str);

    /// Show a message in the console using a theme entry.
    fn cons_show_themed(
        &self,
        _group: Option<&str>,
        _key: Option<&str>,
        _default: Option<&str>,
        message: &str,
    ) {
        self.cons_show(message);
    }

    /// Highlight the console in the status bar.
    fn cons_alert(&self) {}

    /// Tell the user a command was called incorrectly.
    fn cons_bad_cmd_usage(&self, command: &str) {
        self.cons_show(&format!("Invalid usage, see '/help {command}' for details."));
    }

    /// Send a desktop notification.
    fn notify(&self, message: &str, timeout_ms: u64, category: Option<&str>);

    fn win_create(&self, _tag: &str) {}

    fn win_exists(&self, _tag: &str) -> bool {
        false
    }

    fn win_focus(&self, _tag: &str) {}

    fn win_show(&self, tag: &str, message: &str) {
        self.cons_show(&format!("[{tag}] {message}"));
    }

    fn win_show_themed(
        &self,
        tag: &str,
        _group: Option<&str>,
        _key: Option<&str>,
        _default: Option<&str>,
        message: &str,
    ) {
        self.win_show(tag, message);
    }

    /// Display a message as if it had been received from `barejid/resource`.
    fn incoming_message(&self, barejid: &str, resource: &str, message: &str) {
        self.cons_show(&format!("{barejid}/{resource}: {message}"));
    }

    fn current_recipient(&self) -> Option<String> {
        None
    }

    fn current_muc(&self) -> Option<String> {
        None
    }

    fn current_nick(&self) -> Option<String> {
        None
    }

    fn current_occupants(&self) -> Vec<String> {
        Vec::new()
    }

    fn current_win_is_console(&self) -> bool {
        true
    }
}

/// Protocol layer.
pub trait Transport: Send + Sync {
    /// Send a raw stanza. Returns false if there is no connection.
    fn send_stanza(&self, stanza: &str) -> bool;
}

/// Plugin settings store. Groups and keys are opaque to the host.
pub trait Settings: Send + Sync {
    fn get_boolean(&self, group: &str, key: &str, default: bool) -> bool;
    fn set_boolean(&self, group: &str, key: &str, value: bool);
    fn get_string(&self, group: &str, key: &str, default: Option<&str>) -> Option<String>;
    fn set_string(&self, group: &str, key: &str, value: &str);
    fn get_int(&self, group: &str, key: &str, default: i64) -> i64;
    fn set_int(&self, group: &str, key: &str, value: i64);
}

/// The collaborators a host was built with.
#[derive(Clone)]
pub struct Services {
    pub ui: Arc<dyn Ui>,
    pub transport: Arc<dyn Transport>,
    pub settings: Arc<dyn Settings>,
}

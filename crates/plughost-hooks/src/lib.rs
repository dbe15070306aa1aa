//! plughost-hooks: The fixed hook vocabulary and its dispatch rules.
//!
//! Plugins implement any subset of the hooks in [`HookName`]. The dispatcher
//! delivers each [`HookEvent`] to the implementing plugins in registration
//! order, folding transform replies into the payload and honoring cancel and
//! veto replies where the hook allows them.

pub mod dispatcher;
pub mod events;

pub use dispatcher::{DispatchOutcome, HookTarget, dispatch};
pub use events::{HookEvent, HookKind, HookName, HookReply, HookSet};

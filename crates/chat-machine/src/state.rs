use anyhow::Result;

use crate::session::Session;

/// Outcome of an `on_enter` / `on_update` callback.
#[must_use = "return the flow from the callback so a requested transition is applied"]
#[derive(Debug)]
pub enum Flow {
    /// Stay in the current state.
    Continue,
    /// A next state was recorded with [`Session::change_state`].
    Transition(Transition),
}

impl Flow {
    pub fn is_transition(&self) -> bool {
        matches!(self, Flow::Transition(_))
    }
}

/// Token proving a next state is pending on the session.
///
/// Only [`Session::change_state`] hands these out.
#[derive(Debug)]
pub struct Transition {
    _private: (),
}

impl Transition {
    pub(crate) fn new() -> Self {
        Self { _private: () }
    }
}

/// One node of a conversation graph.
///
/// States are usually field-less; per-conversation data lives on the
/// [`Session`]. A state may carry immutable configuration of its own.
pub trait State: Send + Sync + 'static {
    /// Runs once right after the session adopts this state, before any update.
    fn on_enter(&self, _session: &mut Session) -> Result<Flow> {
        Ok(Flow::Continue)
    }

    /// Runs on every turn that starts with this state already active.
    fn on_update(&self, _session: &mut Session) -> Result<Flow> {
        Ok(Flow::Continue)
    }

    /// Runs once right before the session leaves this state for another.
    /// Not called when a session ends without transitioning.
    fn on_exit(&self, _session: &mut Session) -> Result<()> {
        Ok(())
    }

    /// Human-readable name used in logs, errors and introspection.
    fn name(&self) -> &str {
        short_type_name(std::any::type_name::<Self>())
    }
}

fn short_type_name(full: &'static str) -> &'static str {
    // Strip module paths but keep generic arguments intact.
    let base = full.split('<').next().unwrap_or(full);
    match base.rfind("::") {
        Some(idx) => &full[idx + 2..],
        None => full,
    }
}

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::config::MachineConfig;
use crate::error::{MachineError, Phase};
use crate::session::Session;
use crate::state::{Flow, State, Transition};

/// Cross-cutting callback run around every state's lifecycle callbacks.
///
/// An enter or update hook may call [`Session::change_state`]; the state
/// callback it precedes is then skipped and the transition applied.
pub type Hook = Box<dyn Fn(&mut Session) + Send + Sync>;

struct Hooks {
    enter: Hook,
    update: Hook,
    exit: Hook,
}

impl Default for Hooks {
    fn default() -> Self {
        Self {
            enter: Box::new(|_| {}),
            update: Box::new(|_| {}),
            exit: Box::new(|_| {}),
        }
    }
}

/// Registry of live sessions plus the per-turn dispatch loop.
///
/// `run_turn` takes `&mut self`; hosts serving several sessions at once wrap
/// the machine in a [`crate::SharedMachine`] (or their own lock).
pub struct Machine {
    sessions: HashMap<String, Session>,
    start_state: Arc<dyn State>,
    hooks: Hooks,
    config: MachineConfig,
}

impl Machine {
    pub fn new<S: State>(start: S) -> Self {
        Self::build(Arc::new(start), MachineConfig::default())
    }

    pub fn with_config<S: State>(start: S, config: MachineConfig) -> Result<Self, MachineError> {
        Self::with_shared_start(Arc::new(start), config)
    }

    pub fn with_shared_start(
        start: Arc<dyn State>,
        config: MachineConfig,
    ) -> Result<Self, MachineError> {
        config.validate()?;
        Ok(Self::build(start, config))
    }

    fn build(start_state: Arc<dyn State>, config: MachineConfig) -> Self {
        Self {
            sessions: HashMap::new(),
            start_state,
            hooks: Hooks::default(),
            config,
        }
    }

    /// Runs right before every state's `on_enter`, including a new session's first state.
    pub fn set_on_enter_hook<F>(&mut self, hook: F)
    where
        F: Fn(&mut Session) + Send + Sync + 'static,
    {
        self.hooks.enter = Box::new(hook);
    }

    /// Runs right before every state's `on_update`.
    pub fn set_on_update_hook<F>(&mut self, hook: F)
    where
        F: Fn(&mut Session) + Send + Sync + 'static,
    {
        self.hooks.update = Box::new(hook);
    }

    /// Runs right before every state's `on_exit`, i.e. once per applied transition.
    pub fn set_on_exit_hook<F>(&mut self, hook: F)
    where
        F: Fn(&mut Session) + Send + Sync + 'static,
    {
        self.hooks.exit = Box::new(hook);
    }

    /// Feeds one message to the session under `key` and returns the text it produced.
    ///
    /// An unseen key starts a new session in the start state. Transitions
    /// requested during the turn, including ones requested from `on_enter`,
    /// are all applied before returning. A session that called
    /// [`Session::end`] is removed once its output has been captured.
    ///
    /// A callback error aborts the turn and is returned as
    /// [`MachineError::Callback`]; the session stays registered.
    pub fn run_turn(&mut self, input: &str, key: &str) -> Result<String, MachineError> {
        let session = match self.sessions.entry(key.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                debug!(session = key, "starting new session");
                entry.insert(Session::new(key))
            }
        };

        session.begin_turn(input);
        trace!(session = key, turn = session.turns(), "running turn");

        if let Err(e) = dispatch(
            session,
            &self.start_state,
            &self.hooks,
            self.config.max_transition_chain,
        ) {
            session.abort_turn();
            return Err(e);
        }

        let output = session.output().to_string();
        if session.is_ended() {
            self.sessions.remove(key);
            debug!(session = key, "session ended");
        }
        Ok(output)
    }

    pub fn session(&self, key: &str) -> Option<&Session> {
        self.sessions.get(key)
    }

    pub fn contains_session(&self, key: &str) -> bool {
        self.sessions.contains_key(key)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn session_keys(&self) -> impl Iterator<Item = &str> {
        self.sessions.keys().map(String::as_str)
    }

    pub fn current_state_name(&self, key: &str) -> Option<&str> {
        self.sessions.get(key).and_then(|s| s.current_state_name())
    }

    pub fn start_state_name(&self) -> &str {
        self.start_state.name()
    }

    /// Drops a session outside of a turn. No callbacks run.
    pub fn reset_session(&mut self, key: &str) -> bool {
        let existed = self.sessions.remove(key).is_some();
        if existed {
            debug!(session = key, "session reset");
        }
        existed
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }
}

fn dispatch(
    session: &mut Session,
    start: &Arc<dyn State>,
    hooks: &Hooks,
    limit: usize,
) -> Result<(), MachineError> {
    let (mut current, mut flow) = match session.current_state() {
        None => {
            let state = Arc::clone(start);
            session.set_current_state(Arc::clone(&state));
            let flow = enter(session, &state, hooks)?;
            (state, flow)
        }
        Some(state) => {
            (hooks.update)(session);
            let flow = match hook_transition(session) {
                Some(flow) => flow,
                None => state.on_update(session).map_err(|source| {
                    callback_error(session, state.as_ref(), Phase::Update, source)
                })?,
            };
            (state, flow)
        }
    };

    let mut applied = 0;
    while flow.is_transition() {
        let Some(next) = session.take_next_state() else {
            break;
        };
        if applied == limit {
            return Err(MachineError::TransitionChainExceeded {
                session: session.key().to_string(),
                limit,
            });
        }
        applied += 1;

        (hooks.exit)(session);
        current
            .on_exit(session)
            .map_err(|source| callback_error(session, current.as_ref(), Phase::Exit, source))?;

        debug!(
            session = session.key(),
            from = current.name(),
            to = next.name(),
            "state transition"
        );
        session.set_current_state(Arc::clone(&next));
        current = next;
        flow = enter(session, &current, hooks)?;
    }

    if session.take_next_state().is_some() {
        trace!(session = session.key(), "dropping next state that was never returned");
    }
    Ok(())
}

fn enter(session: &mut Session, state: &Arc<dyn State>, hooks: &Hooks) -> Result<Flow, MachineError> {
    (hooks.enter)(session);
    if let Some(flow) = hook_transition(session) {
        return Ok(flow);
    }
    state
        .on_enter(session)
        .map_err(|source| callback_error(session, state.as_ref(), Phase::Enter, source))
}

fn hook_transition(session: &Session) -> Option<Flow> {
    session
        .has_next_state()
        .then(|| Flow::Transition(Transition::new()))
}

fn callback_error(
    session: &Session,
    state: &dyn State,
    phase: Phase,
    source: anyhow::Error,
) -> MachineError {
    MachineError::Callback {
        session: session.key().to_string(),
        state: state.name().to_string(),
        phase,
        source,
    }
}

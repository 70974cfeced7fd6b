use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::state::{Flow, State, Transition};

/// One ongoing conversation.
///
/// Created by the machine on the first turn for an unseen key and dropped at
/// the end of the turn in which [`Session::end`] was called.
pub struct Session {
    key: String,
    instance_id: Uuid,
    created_at: DateTime<Utc>,
    turns: u64,
    input: String,
    output: String,
    next_state: Option<Arc<dyn State>>,
    data: HashMap<String, serde_json::Value>,
    ended: bool,
    current_state: Option<Arc<dyn State>>,
}

impl Session {
    pub(crate) fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            instance_id: Uuid::new_v4(),
            created_at: Utc::now(),
            turns: 0,
            input: String::new(),
            output: String::new(),
            next_state: None,
            data: HashMap::new(),
            ended: false,
            current_state: None,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Distinguishes a restarted session from an earlier one under the same key.
    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Number of turns started for this session, including the current one.
    pub fn turns(&self) -> u64 {
        self.turns
    }

    /// Text received this turn.
    pub fn input(&self) -> &str {
        &self.input
    }

    /// Text produced so far this turn.
    pub fn output(&self) -> &str {
        &self.output
    }

    /// Appends `text`, trimmed, followed by a single newline.
    pub fn add_output(&mut self, text: &str) {
        self.output.push_str(text.trim());
        self.output.push('\n');
    }

    /// Records `next` as the state to move to and returns the flow the
    /// callback must return:
    ///
    /// ```ignore
    /// return Ok(session.change_state(Confirmed));
    /// ```
    pub fn change_state<S: State>(&mut self, next: S) -> Flow {
        self.change_state_shared(Arc::new(next))
    }

    /// Like [`Session::change_state`] for a state instance that is shared.
    pub fn change_state_shared(&mut self, next: Arc<dyn State>) -> Flow {
        self.next_state = Some(next);
        Flow::Transition(Transition::new())
    }

    /// Marks the session for removal once this turn completes.
    /// The current callback keeps running.
    pub fn end(&mut self) {
        self.ended = true;
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// `None` until the session's first turn has started.
    pub fn current_state_name(&self) -> Option<&str> {
        self.current_state.as_deref().map(|s| s.name())
    }

    pub fn pending_state_name(&self) -> Option<&str> {
        self.next_state.as_deref().map(|s| s.name())
    }

    pub fn set_data(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.data.insert(key.into(), value);
    }

    pub fn get_data(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }

    /// Reads a data entry back into a typed value.
    pub fn get_data_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.data.get(key) {
            Some(value) => {
                let typed = serde_json::from_value(value.clone())
                    .with_context(|| format!("session data `{}` has an unexpected shape", key))?;
                Ok(Some(typed))
            }
            None => Ok(None),
        }
    }

    pub fn remove_data(&mut self, key: &str) -> Option<serde_json::Value> {
        self.data.remove(key)
    }

    pub fn data(&self) -> &HashMap<String, serde_json::Value> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut HashMap<String, serde_json::Value> {
        &mut self.data
    }

    pub(crate) fn begin_turn(&mut self, input: &str) {
        self.input.clear();
        self.input.push_str(input);
        self.output.clear();
        // Only a failed turn can leave these behind.
        self.next_state = None;
        self.ended = false;
        self.turns += 1;
    }

    pub(crate) fn abort_turn(&mut self) {
        self.next_state = None;
        self.ended = false;
    }

    pub(crate) fn current_state(&self) -> Option<Arc<dyn State>> {
        self.current_state.clone()
    }

    pub(crate) fn set_current_state(&mut self, state: Arc<dyn State>) {
        self.current_state = Some(state);
    }

    pub(crate) fn has_next_state(&self) -> bool {
        self.next_state.is_some()
    }

    pub(crate) fn take_next_state(&mut self) -> Option<Arc<dyn State>> {
        self.next_state.take()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("key", &self.key)
            .field("instance_id", &self.instance_id)
            .field("created_at", &self.created_at)
            .field("turns", &self.turns)
            .field("input", &self.input)
            .field("output", &self.output)
            .field("current_state", &self.current_state_name())
            .field("next_state", &self.pending_state_name())
            .field("data", &self.data)
            .field("ended", &self.ended)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Confirmed;
    impl State for Confirmed {}

    #[test]
    fn test_add_output_trims_and_terminates_lines() {
        let mut session = Session::new("s1");
        session.add_output(" hi ");
        session.add_output("there");
        assert_eq!(session.output(), "hi\nthere\n");
    }

    #[test]
    fn test_add_output_of_blank_text_is_a_bare_newline() {
        let mut session = Session::new("s1");
        session.add_output("   ");
        assert_eq!(session.output(), "\n");
    }

    #[test]
    fn test_begin_turn_resets_turn_scoped_fields() {
        let mut session = Session::new("s1");
        session.begin_turn("first");
        session.add_output("reply");
        let _ = session.change_state(Confirmed);
        session.end();

        session.begin_turn("second");
        assert_eq!(session.input(), "second");
        assert_eq!(session.output(), "");
        assert!(session.pending_state_name().is_none());
        assert!(!session.is_ended());
        assert_eq!(session.turns(), 2);
    }

    #[test]
    fn test_change_state_records_pending_state() {
        let mut session = Session::new("s1");
        let flow = session.change_state(Confirmed);
        assert!(flow.is_transition());
        assert_eq!(session.pending_state_name(), Some("Confirmed"));
        assert!(session.take_next_state().is_some());
        assert!(session.pending_state_name().is_none());
    }

    #[test]
    fn test_data_slot() {
        let mut session = Session::new("s1");
        assert!(session.get_data("count").is_none());

        session.set_data("count", json!(3));
        session.set_data("name", json!("ada"));
        assert_eq!(session.get_data("count"), Some(&json!(3)));
        assert_eq!(session.get_data_as::<u32>("count").unwrap(), Some(3));
        assert_eq!(session.get_data_as::<String>("missing").unwrap(), None);
        assert!(session.get_data_as::<u32>("name").is_err());

        assert_eq!(session.remove_data("name"), Some(json!("ada")));
        assert_eq!(session.data().len(), 1);
    }

    #[test]
    fn test_debug_shows_state_names_and_creation_time() {
        let mut session = Session::new("s1");
        let _ = session.change_state(Confirmed);
        let rendered = format!("{:?}", session);
        assert!(rendered.contains("next_state: Some(\"Confirmed\")"));
        assert!(rendered.contains(&format!("created_at: {:?}", session.created_at())));
    }

    #[test]
    fn test_new_session_has_no_state() {
        let session = Session::new("s1");
        assert_eq!(session.key(), "s1");
        assert!(session.current_state_name().is_none());
        assert_eq!(session.turns(), 0);
    }
}

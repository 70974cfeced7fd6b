use anyhow::Result;
use chat_machine::{Flow, Session, State};
use serde_json::json;

pub const NEXT_COMMAND: &str = "next";

/// Greets, then waits for `next`.
pub struct HelloState;

impl State for HelloState {
    fn on_enter(&self, session: &mut Session) -> Result<Flow> {
        session.add_output("Entered Hello State");
        Ok(Flow::Continue)
    }

    fn on_update(&self, session: &mut Session) -> Result<Flow> {
        if session.input() == NEXT_COMMAND {
            return Ok(session.change_state(WorldState));
        }

        let waited = session.get_data_as::<u64>("waited")?.unwrap_or_default() + 1;
        session.set_data("waited", json!(waited));
        session.add_output(&format!("Waiting for '{}' input... ({})", NEXT_COMMAND, waited));
        Ok(Flow::Continue)
    }

    fn on_exit(&self, session: &mut Session) -> Result<()> {
        session.add_output("Exiting Hello State");
        Ok(())
    }
}

/// Says hello and ends the conversation.
pub struct WorldState;

impl State for WorldState {
    fn on_enter(&self, session: &mut Session) -> Result<Flow> {
        session.add_output("Hello, World!");
        session.end();
        Ok(Flow::Continue)
    }
}

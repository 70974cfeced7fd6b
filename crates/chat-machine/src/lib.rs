//! Per-session finite-state-machine runtime for turn-based chat agents.
//!
//! A [`Machine`] owns one [`Session`] per session key. Each inbound message is
//! one turn: the session's current [`State`] sees it through `on_update` (or
//! `on_enter` on the very first turn), may append output, and may request a
//! transition by returning the [`Flow`] produced by [`Session::change_state`].

pub mod config;
pub mod error;
pub mod machine;
pub mod session;
pub mod shared;
pub mod state;

pub use config::MachineConfig;
pub use error::{MachineError, Phase};
pub use machine::{Hook, Machine};
pub use session::Session;
pub use shared::SharedMachine;
pub use state::{Flow, State, Transition};

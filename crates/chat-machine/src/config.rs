use serde::{Deserialize, Serialize};

use crate::error::MachineError;

/// Upper bound on transitions applied within a single turn.
pub const DEFAULT_MAX_TRANSITION_CHAIN: usize = 32;

pub const MAX_TRANSITION_CHAIN_ENV: &str = "CHAT_MACHINE_MAX_TRANSITION_CHAIN";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    /// A turn that needs more transitions than this fails instead of looping.
    pub max_transition_chain: usize,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            max_transition_chain: DEFAULT_MAX_TRANSITION_CHAIN,
        }
    }
}

impl MachineConfig {
    /// Defaults, overridden by `CHAT_MACHINE_MAX_TRANSITION_CHAIN` when set.
    pub fn from_env() -> Result<Self, MachineError> {
        let mut config = Self::default();
        if let Ok(raw) = std::env::var(MAX_TRANSITION_CHAIN_ENV) {
            config.max_transition_chain = parse_chain_limit(&raw)?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn with_max_transition_chain(mut self, limit: usize) -> Self {
        self.max_transition_chain = limit;
        self
    }

    pub fn validate(&self) -> Result<(), MachineError> {
        if self.max_transition_chain == 0 {
            return Err(MachineError::InvalidConfig(
                "max_transition_chain must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_chain_limit(raw: &str) -> Result<usize, MachineError> {
    raw.trim().parse::<usize>().map_err(|e| {
        MachineError::InvalidConfig(format!(
            "{} must be a positive integer, got `{}`: {}",
            MAX_TRANSITION_CHAIN_ENV, raw, e
        ))
    })
}

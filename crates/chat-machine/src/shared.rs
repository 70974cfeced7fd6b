use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};

use crate::error::MachineError;
use crate::machine::Machine;

/// Cloneable handle that serializes every turn behind one lock.
#[derive(Clone)]
pub struct SharedMachine {
    inner: Arc<Mutex<Machine>>,
}

impl SharedMachine {
    pub fn new(machine: Machine) -> Self {
        Self {
            inner: Arc::new(Mutex::new(machine)),
        }
    }

    pub async fn run_turn(&self, input: &str, key: &str) -> Result<String, MachineError> {
        self.inner.lock().await.run_turn(input, key)
    }

    /// Exclusive access for hook registration or introspection.
    pub async fn lock(&self) -> MutexGuard<'_, Machine> {
        self.inner.lock().await
    }
}

impl From<Machine> for SharedMachine {
    fn from(machine: Machine) -> Self {
        Self::new(machine)
    }
}

use std::sync::Arc;

use resurrect_core::{Env, ProcessId, ResurrectError, Result};
use resurrect_store::StateStore;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Persisted scheduler state. Survives across hook invocations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResurrectState {
    /// Environment captured by `prime`.
    #[serde(default)]
    pub env: Env,
    /// Outstanding re-dispatch process, if one is believed running.
    #[serde(default)]
    pub pid: Option<ProcessId>,
}

/// Typed view over one key of a [`StateStore`].
pub(crate) struct StateSlot {
    store: Arc<dyn StateStore>,
    key: String,
}

impl StateSlot {
    pub(crate) fn new(store: Arc<dyn StateStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// Write the default state if the slot has never been written.
    pub(crate) fn set_default(&self) -> Result<()> {
        if self.raw()?.is_none() {
            debug!(key = %self.key, "initialising state slot");
            self.save(&ResurrectState::default())?;
        }
        Ok(())
    }

    pub(crate) fn load(&self) -> Result<ResurrectState> {
        match self.raw()? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(ResurrectState::default()),
        }
    }

    pub(crate) fn save(&self, state: &ResurrectState) -> Result<()> {
        let value = serde_json::to_value(state)?;
        self.store
            .set(&self.key, &value)
            .map_err(|e| ResurrectError::State(e.to_string()))
    }

    /// Load, apply `f`, save.
    pub(crate) fn update(&self, f: impl FnOnce(&mut ResurrectState)) -> Result<ResurrectState> {
        let mut state = self.load()?;
        f(&mut state);
        self.save(&state)?;
        Ok(state)
    }

    fn raw(&self) -> Result<Option<serde_json::Value>> {
        self.store
            .get(&self.key)
            .map_err(|e| ResurrectError::State(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resurrect_store::MemoryStore;
    use serde_json::json;

    #[test]
    fn missing_slot_loads_defaults() {
        let slot = StateSlot::new(Arc::new(MemoryStore::new()), "resurrect");
        assert_eq!(slot.load().unwrap(), ResurrectState::default());
    }

    #[test]
    fn set_default_does_not_clobber_existing_state() {
        let store = Arc::new(MemoryStore::new());
        store.set("resurrect", &json!({"env": {"A": "1"}, "pid": 7})).unwrap();

        let slot = StateSlot::new(store, "resurrect");
        slot.set_default().unwrap();

        let state = slot.load().unwrap();
        assert_eq!(state.pid, Some(ProcessId(7)));
        assert_eq!(state.env.get("A").map(String::as_str), Some("1"));
    }

    #[test]
    fn partial_documents_fill_in_defaults() {
        let store = Arc::new(MemoryStore::new());
        store.set("resurrect", &json!({"pid": 9})).unwrap();
        let state = StateSlot::new(store, "resurrect").load().unwrap();
        assert!(state.env.is_empty());
        assert_eq!(state.pid, Some(ProcessId(9)));
    }

    #[test]
    fn update_persists() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStore::new());
        let slot = StateSlot::new(Arc::clone(&store), "k");
        slot.update(|s| s.pid = Some(ProcessId(1))).unwrap();
        assert_eq!(store.get("k").unwrap(), Some(json!({"env": {}, "pid": 1})));
    }
}

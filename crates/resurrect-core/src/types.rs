use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Environment snapshot handed to a re-dispatched run.
///
/// Ordered so persisted snapshots and logged diffs are deterministic.
pub type Env = BTreeMap<String, String>;

/// OS identity of a spawned re-dispatch process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessId(pub u32);

impl ProcessId {
    pub fn as_raw(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for ProcessId {
    fn from(pid: u32) -> Self {
        Self(pid)
    }
}

/// Build the dispatch path the host uses for hook `name`, e.g. `hooks/start`.
pub fn hook_path(name: &str) -> String {
    format!("{}{}", crate::config::HOOKS_PREFIX, name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hook_path_prefixes_hooks_dir() {
        assert_eq!(hook_path("resurrect"), "hooks/resurrect");
    }

    #[test]
    fn process_id_serializes_as_bare_number() {
        let json = serde_json::to_string(&Some(ProcessId(42))).unwrap();
        assert_eq!(json, "42");
        let back: Option<ProcessId> = serde_json::from_str("null").unwrap();
        assert_eq!(back, None);
    }
}

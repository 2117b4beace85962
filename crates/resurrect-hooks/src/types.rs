use resurrect_core::config::{HOOKS_PREFIX, JUJU_CHARM_DIR, JUJU_DISPATCH_PATH, OPERATOR_DISPATCH};
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{HookError, Result};

/// What the host told this invocation to do, decoded from its environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchContext {
    /// Raw dispatch path, e.g. `hooks/start` or `hooks/resurrect`.
    pub dispatch_path: String,
    /// True when the charm re-invoked itself (`OPERATOR_DISPATCH=1`).
    pub self_dispatch: bool,
    pub charm_dir: Option<PathBuf>,
    /// Unix timestamp (ms) when the context was decoded.
    pub timestamp: u64,
}

impl DispatchContext {
    pub fn new(dispatch_path: impl Into<String>) -> Self {
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;

        Self {
            dispatch_path: dispatch_path.into(),
            self_dispatch: false,
            charm_dir: None,
            timestamp,
        }
    }

    /// Decode the current process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(std::env::vars())
    }

    /// Decode an explicit set of variables; `from_env` delegates here.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut dispatch_path = None;
        let mut self_dispatch = false;
        let mut charm_dir = None;

        for (k, v) in vars {
            let v: String = v.into();
            match k.as_ref() {
                JUJU_DISPATCH_PATH => dispatch_path = Some(v),
                OPERATOR_DISPATCH => self_dispatch = v == "1",
                JUJU_CHARM_DIR => charm_dir = Some(PathBuf::from(v)),
                _ => {}
            }
        }

        let dispatch_path = dispatch_path
            .filter(|p| !p.is_empty())
            .ok_or_else(|| HookError::MissingDispatchPath(JUJU_DISPATCH_PATH.to_string()))?;

        Ok(Self {
            self_dispatch,
            charm_dir,
            ..Self::new(dispatch_path)
        })
    }

    pub fn with_self_dispatch(mut self, self_dispatch: bool) -> Self {
        self.self_dispatch = self_dispatch;
        self
    }

    /// Hook name without the `hooks/` directory, e.g. `start`.
    pub fn hook_name(&self) -> &str {
        self.dispatch_path
            .strip_prefix(HOOKS_PREFIX)
            .unwrap_or(&self.dispatch_path)
    }
}

/// Result type handlers return; any error type converts into it.
pub type HandlerResult = std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Synchronous hook handler.
///
/// Hooks are delivered one at a time by the host, so handlers run inline on
/// the dispatching thread.
pub trait HookHandler: Send + Sync {
    fn handle(&self, ctx: &DispatchContext) -> HandlerResult;
}

impl<F> HookHandler for F
where
    F: Fn(&DispatchContext) -> HandlerResult + Send + Sync,
{
    fn handle(&self, ctx: &DispatchContext) -> HandlerResult {
        self(ctx)
    }
}

/// A registered binding of a handler to one hook name.
pub struct HookDefinition {
    /// Unique name used for deregistration and log correlation.
    pub name: String,
    /// Hook this handler observes, without the `hooks/` prefix.
    pub hook: String,
    pub handler: Arc<dyn HookHandler>,
    /// Lower value = earlier execution. Ties broken by registration order.
    pub priority: i32,
}

impl HookDefinition {
    pub fn new(
        name: impl Into<String>,
        hook: impl Into<String>,
        handler: Arc<dyn HookHandler>,
    ) -> Self {
        Self {
            name: name.into(),
            hook: hook.into(),
            handler,
            priority: 0,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

/// What happened when a context was dispatched.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// At least one handler observed the hook. `failures` holds the errors of
    /// handlers that failed; the others still ran.
    Handled { ran: usize, failures: Vec<HookError> },
    /// Nothing observes this hook.
    Unhandled,
}

impl DispatchOutcome {
    pub fn is_handled(&self) -> bool {
        matches!(self, DispatchOutcome::Handled { .. })
    }

    /// True when handlers ran and none failed.
    pub fn is_clean(&self) -> bool {
        matches!(self, DispatchOutcome::Handled { failures, .. } if failures.is_empty())
    }
}

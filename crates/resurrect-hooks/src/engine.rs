use std::sync::{Arc, RwLock};
use std::time::Instant;

use tracing::{debug, error, info};

use crate::error::HookError;
use crate::types::{DispatchContext, DispatchOutcome, HookDefinition, HookHandler};

/// Registry of hook handlers for one charm invocation.
///
/// The host delivers exactly one hook per process, so the dispatcher is built
/// during startup, gets one `dispatch` call, and is dropped with the process.
pub struct Dispatcher {
    /// Sorted by priority ascending after every registration.
    hooks: RwLock<Vec<HookDefinition>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            hooks: RwLock::new(Vec::new()),
        }
    }

    /// Register a definition. Re-sorts the list so priority order is always correct.
    pub fn register(&self, def: HookDefinition) {
        let mut hooks = self.hooks.write().unwrap_or_else(|e| e.into_inner());
        debug!(name = %def.name, hook = %def.hook, "handler registered");
        hooks.push(def);
        // Stable sort preserves registration order within the same priority.
        hooks.sort_by_key(|h| h.priority);
    }

    /// Bind `handler` to `hook` at default priority. The handler is named
    /// after the hook.
    pub fn observe(&self, hook: impl Into<String>, handler: impl HookHandler + 'static) {
        let hook = hook.into();
        self.register(HookDefinition::new(hook.clone(), hook, Arc::new(handler)));
    }

    /// Remove a definition by name. Silent no-op if the name is not found.
    pub fn unregister(&self, name: &str) {
        let mut hooks = self.hooks.write().unwrap_or_else(|e| e.into_inner());
        let before = hooks.len();
        hooks.retain(|h| h.name != name);
        if hooks.len() < before {
            debug!(name, "handler unregistered");
        }
    }

    /// Run every handler observing `ctx`'s hook, in priority order.
    ///
    /// A failing handler is logged and recorded; later handlers still run.
    pub fn dispatch(&self, ctx: &DispatchContext) -> DispatchOutcome {
        let hook = ctx.hook_name();
        let hooks = self.hooks.read().unwrap_or_else(|e| e.into_inner());

        let mut ran = 0;
        let mut failures = Vec::new();

        for def in hooks.iter().filter(|d| d.hook == hook) {
            let t = Instant::now();
            let result = def.handler.handle(ctx);
            let elapsed_ms = t.elapsed().as_millis() as u64;
            ran += 1;

            match result {
                Ok(()) => {
                    debug!(
                        handler = %def.name,
                        hook,
                        duration_ms = elapsed_ms,
                        "handler completed"
                    );
                }
                Err(e) => {
                    error!(
                        handler = %def.name,
                        hook,
                        duration_ms = elapsed_ms,
                        "handler failed: {e}"
                    );
                    failures.push(HookError::HandlerFailed {
                        handler: def.name.clone(),
                        hook: hook.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        if ran == 0 {
            info!(hook, self_dispatch = ctx.self_dispatch, "no handler observes hook");
            return DispatchOutcome::Unhandled;
        }

        DispatchOutcome::Handled { ran, failures }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HandlerResult;
    use std::sync::Mutex;

    fn recorder(log: &Arc<Mutex<Vec<String>>>, tag: &'static str) -> impl HookHandler {
        let log = Arc::clone(log);
        move |_ctx: &DispatchContext| -> HandlerResult {
            log.lock().unwrap().push(tag.to_string());
            Ok(())
        }
    }

    #[test]
    fn routes_only_to_matching_hook() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let d = Dispatcher::new();
        d.observe("resurrect", recorder(&log, "trigger"));
        d.observe("start", recorder(&log, "start"));

        let ctx = DispatchContext::new("hooks/resurrect").with_self_dispatch(true);
        let outcome = d.dispatch(&ctx);

        assert!(outcome.is_clean());
        assert_eq!(*log.lock().unwrap(), vec!["trigger"]);
    }

    #[test]
    fn priority_orders_handlers_and_ties_keep_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let d = Dispatcher::new();
        let def = |tag: &'static str| {
            HookDefinition::new(tag, "start", Arc::new(recorder(&log, tag)))
        };
        d.register(def("late").with_priority(10));
        d.register(def("a"));
        d.register(def("b"));
        d.register(def("early").with_priority(-1));

        d.dispatch(&DispatchContext::new("hooks/start"));

        assert_eq!(*log.lock().unwrap(), vec!["early", "a", "b", "late"]);
    }

    #[test]
    fn failing_handler_does_not_stop_the_rest() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let d = Dispatcher::new();
        d.observe("remove", |_ctx: &DispatchContext| -> HandlerResult {
            Err("process already gone".into())
        });
        d.register(HookDefinition::new(
            "after",
            "remove",
            Arc::new(recorder(&log, "after")),
        ));

        match d.dispatch(&DispatchContext::new("hooks/remove")) {
            DispatchOutcome::Handled { ran, failures } => {
                assert_eq!(ran, 2);
                assert_eq!(failures.len(), 1);
                assert!(failures[0].to_string().contains("process already gone"));
            }
            DispatchOutcome::Unhandled => panic!("expected handlers to run"),
        }
        assert_eq!(*log.lock().unwrap(), vec!["after"]);
    }

    #[test]
    fn unknown_hook_is_unhandled() {
        let d = Dispatcher::new();
        d.observe("start", |_ctx: &DispatchContext| -> HandlerResult { Ok(()) });
        assert!(!d.dispatch(&DispatchContext::new("hooks/config-changed")).is_handled());
    }

    #[test]
    fn unregister_removes_by_name() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let d = Dispatcher::new();
        d.observe("start", recorder(&log, "start"));
        d.unregister("start");
        d.unregister("start");
        assert!(!d.dispatch(&DispatchContext::new("hooks/start")).is_handled());
        assert!(log.lock().unwrap().is_empty());
    }
}

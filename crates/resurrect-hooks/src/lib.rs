//! `resurrect-hooks` — decodes a dispatch invocation and routes it to the
//! handlers observing that hook.
//!
//! A re-dispatched run arrives with `JUJU_DISPATCH_PATH=hooks/<key>` and
//! `OPERATOR_DISPATCH=1`; [`DispatchContext::from_env`] picks those up and
//! [`Dispatcher::dispatch`] hands the context to whatever the owner bound to
//! `<key>`.

pub mod engine;
pub mod error;
pub mod types;

pub use engine::Dispatcher;
pub use error::{HookError, Result};
pub use types::{DispatchContext, DispatchOutcome, HandlerResult, HookDefinition, HookHandler};

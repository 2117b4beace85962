//! `resurrect` — lets a charm schedule its own re-invocation.
//!
//! # Overview
//!
//! A [`Resurrect`] is owned by the charm and bound to one persisted state
//! slot (captured environment + outstanding pid). `start` launches a detached
//! process that, when its trigger fires, re-runs the charm's `dispatch`
//! entrypoint with `JUJU_DISPATCH_PATH=hooks/<key>` and `OPERATOR_DISPATCH=1`.
//! The charm observes `<key>` on its [`resurrect_hooks::Dispatcher`] to
//! receive the completion.
//!
//! # Triggers
//!
//! | Variant   | Spawned process                                        |
//! |-----------|--------------------------------------------------------|
//! | `Check`   | Forked child runs the readiness check, then touches `dispatch` |
//! | `Every`   | `watch -n N '<charm>/dispatch'`                        |
//! | `Oneshot` | `/bin/sh -c "sleep N; '<charm>/dispatch'"`             |

pub mod launcher;
pub mod scheduler;
pub mod state;
pub mod trigger;

pub use launcher::{LaunchPlan, OsLauncher, ProcessLauncher, Signal};
pub use resurrect_core::{Env, ProcessId, ResurrectError, Result};
pub use scheduler::{PrimeOptions, Resurrect, ResurrectOptions, DEFAULT_STOP_SIGNAL};
pub use state::ResurrectState;
pub use trigger::{ReadinessCheck, Trigger};

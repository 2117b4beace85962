//! `resurrect-core` — shared constants, configuration and error types used by
//! every resurrect crate.

pub mod config;
pub mod error;
pub mod types;

pub use error::{ResurrectError, Result};
pub use types::{Env, ProcessId};

//! `resurrect-store` — persistent key-value slots that outlive a single hook
//! invocation.
//!
//! The managed process does not stay resident between hooks, so scheduler
//! state is read from and written to a [`StateStore`] on every call. Two
//! backends ship here: [`SqliteStore`] for real charms and [`MemoryStore`] for
//! tests and embedding.

pub mod db;
pub mod error;
pub mod store;

pub use error::{Result, StoreError};
pub use store::{MemoryStore, SqliteStore, StateStore};

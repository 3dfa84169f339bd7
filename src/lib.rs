//! Pluggable data-handler pipeline
//!
//! Re-exports the handler core and the built-in handlers under one crate.

pub use parity_core;
pub use parity_handlers;

pub use parity_core::prelude;
pub use parity_handlers::builtin_factory;

//! State-machine dispatch across pluggable domain handlers.
//!
//! The router owns no conversation logic. It maps the current chat state
//! key (or, when idle, a menu keyword) to one registered domain handler
//! and forwards the message by modality. State transitions are entirely
//! the handler's responsibility; the router never auto-clears or
//! auto-advances, so there are no hidden transitions to reason about.

pub mod dispatch;
pub mod handler;
pub mod registry;
pub mod rollout;

pub use {
    dispatch::dispatch,
    handler::{DomainHandler, RouterContext},
    registry::{DomainRegistry, RegistryError},
};

//! Webhook ingestion and the admission-to-dispatch pipeline.
//!
//! One HTTP POST per upstream delivery, at least once. The pipeline runs
//! each parsed event through rate limiting, the admission claim, context
//! building, the rollout gate and domain dispatch, in that order; the
//! claim sits before any mutating work so a retried delivery never
//! replays side effects.

pub mod config;
pub mod context;
pub mod home;
pub mod process;
pub mod server;
pub mod types;

pub use {
    config::GatewayConfig,
    context::ContextBuilder,
    process::{Gateway, Outcome},
    server::build_app,
    types::{parse_events, WebhookPayload},
};

//! The per-event pipeline: rate limit, admission claim, context build,
//! rollout gate, dispatch, fallback.
//!
//! The admission claim runs before any mutating work, so a transient
//! failure after the claim can release it best-effort and let the
//! transport redeliver without double-processing.

use std::{str::FromStr, sync::Arc, time::Duration};

use {
    metrics::counter,
    tracing::{debug, info, warn},
};

use {
    sango_common::{normalize_msisdn, CanonicalIdentity, InboundEvent, Result},
    sango_locale::Language,
    sango_outbound::ReplySink,
    sango_ratelimit::SlidingWindowLimiter,
    sango_router::{dispatch, rollout, DomainRegistry, RouterContext},
    sango_store::{AdmissionLedger, ChatStateStore, SessionStore},
};

use crate::{config::GatewayConfig, context::ContextBuilder, home};

/// How one event left the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Over the per-sender window; nothing was processed.
    RateLimited,
    /// Already claimed by an earlier delivery; successful no-op.
    Duplicate,
    /// A domain handler claimed the message.
    Dispatched,
    /// Nothing claimed it; the home menu was (re-)shown.
    MenuShown,
}

/// All pipeline collaborators, constructed once at startup and shared
/// across requests. No implicit singletons.
pub struct Gateway {
    config: GatewayConfig,
    default_locale: Language,
    admission: AdmissionLedger,
    sessions: SessionStore,
    states: ChatStateStore,
    context: ContextBuilder,
    limiter: SlidingWindowLimiter,
    registry: DomainRegistry,
    sink: Arc<dyn ReplySink>,
}

impl Gateway {
    pub fn new(
        pool: sqlx::SqlitePool,
        config: GatewayConfig,
        registry: DomainRegistry,
        sink: Arc<dyn ReplySink>,
    ) -> anyhow::Result<Self> {
        let default_locale = Language::from_str(&config.default_locale)
            .map_err(|e| anyhow::anyhow!("invalid default_locale: {e}"))?;
        let limiter = SlidingWindowLimiter::new(
            Duration::from_millis(config.rate_window_ms),
            config.rate_max_requests,
        );
        Ok(Self {
            default_locale,
            admission: AdmissionLedger::new(pool.clone()),
            sessions: SessionStore::new(pool.clone(), config.session_ttl_ms()),
            states: ChatStateStore::new(pool.clone()),
            context: ContextBuilder::new(pool, default_locale),
            limiter,
            registry,
            sink,
            config,
        })
    }

    /// Run one inbound event through the full pipeline.
    ///
    /// `Err` with a drop-class error means the event must be discarded
    /// and the transport answered with success; a retry-class error asks
    /// the transport to redeliver.
    pub async fn process_event(&self, event: &InboundEvent) -> Result<Outcome> {
        let identity = normalize_msisdn(&event.sender).inspect_err(|_| {
            counter!("sango_invalid_sender_total").increment(1);
        })?;

        let decision = self.limiter.check(identity.as_str());
        if !decision.allowed {
            counter!("sango_rate_limited_total").increment(1);
            warn!(
                sender = %identity.masked(),
                retry_after_secs = decision.retry_after_secs,
                "rate limited"
            );
            return Ok(Outcome::RateLimited);
        }

        if !self.admission.claim(&event.message_id).await? {
            counter!("sango_duplicate_events_total").increment(1);
            info!(
                message_id = %event.message_id,
                sender = %identity.masked(),
                "duplicate delivery ignored"
            );
            return Ok(Outcome::Duplicate);
        }

        match self.run_claimed(&identity, event).await {
            Ok(outcome) => {
                counter!("sango_events_processed_total").increment(1);
                Ok(outcome)
            },
            Err(err) if err.is_retryable() => {
                // Give the redelivery a fresh claim. Best-effort: losing
                // this release only costs one dropped event, never a
                // double-processed one.
                if let Err(release_err) = self.admission.release(&event.message_id).await {
                    warn!(
                        message_id = %event.message_id,
                        error = %release_err,
                        "failed to release admission claim"
                    );
                }
                Err(err)
            },
            Err(err) => Err(err),
        }
    }

    async fn run_claimed(
        &self,
        identity: &CanonicalIdentity,
        event: &InboundEvent,
    ) -> Result<Outcome> {
        let (msg, state) = self.context.build(event).await?;
        let session = self.sessions.get_or_create(identity.as_str()).await?;
        let locale = Language::from_str(&msg.locale).unwrap_or(self.default_locale);
        let ctx = RouterContext {
            msg,
            states: self.states.clone(),
            sessions: self.sessions.clone(),
            sink: Arc::clone(&self.sink),
        };

        // Home keywords escape from anywhere, including mid-flow; the
        // menu state overwrites whatever flow was active.
        if let Some(normalized) = event.message.normalized_text() {
            if home::is_home_keyword(&normalized) {
                home::show_home(&ctx, &self.registry, locale).await?;
                debug!(
                    correlation_id = %ctx.msg.correlation_id,
                    keyword = %normalized,
                    "home keyword, menu shown"
                );
                return Ok(Outcome::MenuShown);
            }
        }

        let percent = self.config.rollout_percent;
        let routed = rollout::should_enable(identity, percent)
            && dispatch(&self.registry, &ctx, &state, &event.message).await;

        if routed {
            if rollout::handoff_enabled(identity, percent) {
                self.record_current_agent(&ctx, &session.id).await?;
            }
            debug!(
                correlation_id = %ctx.msg.correlation_id,
                session_id = %session.id,
                "dispatched"
            );
            return Ok(Outcome::Dispatched);
        }

        home::show_home(&ctx, &self.registry, locale).await?;
        debug!(
            correlation_id = %ctx.msg.correlation_id,
            session_id = %session.id,
            "home menu shown"
        );
        Ok(Outcome::MenuShown)
    }

    /// Record which domain owns the conversation on the session row, for
    /// handoff bookkeeping. Reads the state the handler just wrote.
    async fn record_current_agent(&self, ctx: &RouterContext, session_id: &str) -> Result<()> {
        let next = self.states.get(&ctx.msg.profile_id).await?;
        let agent = if next.is_idle() {
            None
        } else {
            self.registry.by_state_key(&next.key).map(|h| h.name())
        };
        self.sessions.set_current_agent(session_id, agent).await?;
        Ok(())
    }

    /// Drop rate-limiter keys with no hits inside the window. Called from
    /// a periodic task; interval is a tunable, not a correctness knob.
    pub fn sweep_rate_limiter(&self) -> usize {
        self.limiter.sweep()
    }
}

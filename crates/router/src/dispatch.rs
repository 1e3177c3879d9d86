//! The dispatch boundary.
//!
//! Handler failures stop here: they are logged with the correlation id,
//! converted into one generic "try again" reply, and the chat state is
//! left untouched so a retry of the same input resumes from the same
//! point. One broken domain flow can never crash the router or corrupt
//! another sender's session.

use {
    std::str::FromStr,
    tracing::{debug, error, warn},
};

use {
    sango_common::InboundMessage,
    sango_locale::Language,
    sango_outbound::ReplyPayload,
    sango_store::ChatState,
};

use crate::{handler::RouterContext, registry::DomainRegistry};

/// Route one message to the owning domain handler.
///
/// Returns `true` when a domain claimed the message (even if the handler
/// then failed; the failure was absorbed and answered). Returns `false`
/// when nothing claimed it; the caller owns the generic fallback.
pub async fn dispatch(
    registry: &DomainRegistry,
    ctx: &RouterContext,
    state: &ChatState,
    message: &InboundMessage,
) -> bool {
    if !state.is_idle() {
        if let Some(handler) = registry.by_state_key(&state.key) {
            debug!(
                correlation_id = %ctx.msg.correlation_id,
                domain = handler.name(),
                state_key = %state.key,
                "forwarding in-flow message"
            );
            let outcome = match message {
                InboundMessage::Selection { id, .. } => {
                    handler.handle_selection(ctx, state, id).await
                },
                InboundMessage::Text { body } => handler.handle_free_text(ctx, state, body).await,
                InboundMessage::Media { .. } => handler.handle_media(ctx, state, message).await,
            };
            return absorb_failure(ctx, handler.name(), &state.key, outcome).await;
        }
        // The state key names no registered domain (a caller-owned menu
        // state, or a domain unregistered since it was written). Fall
        // through: selection ids and intent keywords still route.
        warn!(
            correlation_id = %ctx.msg.correlation_id,
            state_key = %state.key,
            "no domain owns active state key"
        );
    }

    // Selection ids are domain-qualified by construction, so a selection
    // routes by its id prefix even from an unowned state (the caller's
    // home menu emits ids like "insurance_submit").
    if let InboundMessage::Selection { id, .. } = message {
        if let Some(handler) = registry.by_state_key(id) {
            debug!(
                correlation_id = %ctx.msg.correlation_id,
                domain = handler.name(),
                selection = %id,
                "routing selection by id prefix"
            );
            let outcome = handler.handle_selection(ctx, state, id).await;
            return absorb_failure(ctx, handler.name(), &state.key, outcome).await;
        }
    }

    // Only a registered intent keyword opens a flow from here.
    let Some(keyword) = message.normalized_text() else {
        return false;
    };
    let Some(handler) = registry.by_keyword(&keyword) else {
        return false;
    };

    debug!(
        correlation_id = %ctx.msg.correlation_id,
        domain = handler.name(),
        keyword,
        "starting domain flow"
    );
    let outcome = handler.start(ctx).await;
    absorb_failure(ctx, handler.name(), sango_store::IDLE_KEY, outcome).await
}

async fn absorb_failure(
    ctx: &RouterContext,
    domain: &str,
    state_key: &str,
    outcome: anyhow::Result<()>,
) -> bool {
    let Err(err) = outcome else {
        return true;
    };

    // Chat state deliberately left untouched: the sender can retry the
    // same input and resume from the same point.
    error!(
        correlation_id = %ctx.msg.correlation_id,
        sender = %ctx.msg.masked_sender(),
        domain,
        state_key,
        error = %err,
        "domain handler failed"
    );

    let locale = Language::from_str(&ctx.msg.locale).unwrap_or(Language::En);
    if let Err(send_err) = ctx.reply(ReplyPayload::text(fallback_text(locale))).await {
        error!(
            correlation_id = %ctx.msg.correlation_id,
            error = %send_err,
            "failed to send fallback reply"
        );
    }
    true
}

fn fallback_text(locale: Language) -> &'static str {
    match locale {
        Language::En => "Something went wrong. Please try again.",
        Language::Fr => "Une erreur s'est produite. Veuillez réessayer.",
        Language::Rw => "Habaye ikibazo. Mwongere mugerageze.",
        Language::Sw => "Hitilafu imetokea. Tafadhali jaribu tena.",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {
        std::sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
        async_trait::async_trait,
    };

    use {
        sango_common::{normalize_msisdn, MediaKind, MessageContext},
        sango_outbound::RecordingSink,
        sango_store::{ChatStateStore, SessionStore},
    };

    use {
        super::*,
        crate::{handler::DomainHandler, registry::RegistryError},
    };

    struct Insurance {
        fail_first: AtomicUsize,
    }

    impl Insurance {
        fn reliable() -> Self {
            Self {
                fail_first: AtomicUsize::new(0),
            }
        }

        fn failing_once() -> Self {
            Self {
                fail_first: AtomicUsize::new(1),
            }
        }

        fn maybe_fail(&self) -> anyhow::Result<()> {
            if self.fail_first.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                n.checked_sub(1)
            }).is_ok()
            {
                anyhow::bail!("simulated outage");
            }
            Ok(())
        }
    }

    #[async_trait]
    impl DomainHandler for Insurance {
        fn name(&self) -> &str {
            "insurance"
        }

        fn state_prefixes(&self) -> &[&str] {
            &["insurance_", "ins_"]
        }

        fn menu_keywords(&self) -> &[&str] {
            &["insurance"]
        }

        async fn start(&self, ctx: &RouterContext) -> anyhow::Result<()> {
            self.maybe_fail()?;
            ctx.set_state(&ChatState {
                key: "insurance_menu".into(),
                data: serde_json::json!({}),
            })
            .await?;
            ctx.reply(ReplyPayload::text("Welcome to insurance")).await?;
            Ok(())
        }

        async fn handle_selection(
            &self,
            ctx: &RouterContext,
            _state: &ChatState,
            id: &str,
        ) -> anyhow::Result<()> {
            self.maybe_fail()?;
            if id == "insurance_submit" {
                ctx.set_state(&ChatState {
                    key: "ins_wait_doc".into(),
                    data: serde_json::json!({}),
                })
                .await?;
                ctx.reply(ReplyPayload::text("Send a photo of your document"))
                    .await?;
            }
            Ok(())
        }

        async fn handle_free_text(
            &self,
            ctx: &RouterContext,
            state: &ChatState,
            _text: &str,
        ) -> anyhow::Result<()> {
            self.maybe_fail()?;
            // Stay put with updated scratch data.
            ctx.set_state(&ChatState {
                key: state.key.clone(),
                data: serde_json::json!({"nudged": true}),
            })
            .await?;
            Ok(())
        }

        async fn handle_media(
            &self,
            ctx: &RouterContext,
            _state: &ChatState,
            _message: &InboundMessage,
        ) -> anyhow::Result<()> {
            self.maybe_fail()?;
            ctx.clear_state().await?;
            ctx.reply(ReplyPayload::text("Document received")).await?;
            Ok(())
        }
    }

    async fn test_ctx() -> (RouterContext, Arc<RecordingSink>) {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sango_store::run_migrations(&pool).await.unwrap();
        let sink = Arc::new(RecordingSink::new());
        let ctx = RouterContext {
            msg: MessageContext {
                identity: normalize_msisdn("+250700000001").unwrap(),
                profile_id: "p1".into(),
                locale: "en".into(),
                tone_locale: "en".into(),
                tone_confidence: 0.0,
                correlation_id: "corr-1".into(),
            },
            states: ChatStateStore::new(pool.clone()),
            sessions: SessionStore::new(pool, 60 * 60 * 1000),
            sink: sink.clone(),
        };
        (ctx, sink)
    }

    fn registry_with(handler: Insurance) -> DomainRegistry {
        let mut registry = DomainRegistry::new();
        registry.register(Arc::new(handler)).unwrap();
        registry
    }

    #[tokio::test]
    async fn idle_keyword_starts_flow() {
        let (ctx, sink) = test_ctx().await;
        let registry = registry_with(Insurance::reliable());

        let handled = dispatch(
            &registry,
            &ctx,
            &ChatState::idle(),
            &InboundMessage::Text {
                body: " Insurance ".into(),
            },
        )
        .await;

        assert!(handled);
        assert_eq!(ctx.states.get("p1").await.unwrap().key, "insurance_menu");
        assert_eq!(sink.sent().len(), 1);
    }

    #[tokio::test]
    async fn idle_unknown_keyword_is_unrouted() {
        let (ctx, _sink) = test_ctx().await;
        let registry = registry_with(Insurance::reliable());

        let handled = dispatch(
            &registry,
            &ctx,
            &ChatState::idle(),
            &InboundMessage::Text {
                body: "weather".into(),
            },
        )
        .await;

        assert!(!handled);
        assert!(ctx.states.get("p1").await.unwrap().is_idle());
    }

    #[tokio::test]
    async fn active_state_routes_by_prefix_and_modality() {
        let (ctx, sink) = test_ctx().await;
        let registry = registry_with(Insurance::reliable());
        let state = ChatState {
            key: "insurance_menu".into(),
            data: serde_json::json!({}),
        };

        let handled = dispatch(
            &registry,
            &ctx,
            &state,
            &InboundMessage::Selection {
                id: "insurance_submit".into(),
                title: None,
            },
        )
        .await;

        assert!(handled);
        assert_eq!(ctx.states.get("p1").await.unwrap().key, "ins_wait_doc");
        assert_eq!(sink.sent()[0].1.body, "Send a photo of your document");
    }

    #[tokio::test]
    async fn media_completion_clears_state() {
        let (ctx, _sink) = test_ctx().await;
        let registry = registry_with(Insurance::reliable());
        ctx.set_state(&ChatState {
            key: "ins_wait_doc".into(),
            data: serde_json::json!({}),
        })
        .await
        .unwrap();

        let handled = dispatch(
            &registry,
            &ctx,
            &ctx.states.get("p1").await.unwrap(),
            &InboundMessage::Media {
                kind: MediaKind::Image,
                media_id: "m1".into(),
                caption: None,
            },
        )
        .await;

        assert!(handled);
        assert!(ctx.states.get("p1").await.unwrap().is_idle());
    }

    #[tokio::test]
    async fn selection_routes_by_id_from_unowned_menu_state() {
        let (ctx, _sink) = test_ctx().await;
        let registry = registry_with(Insurance::reliable());
        let menu = ChatState {
            key: "home_menu".into(),
            data: serde_json::json!({}),
        };

        let handled = dispatch(
            &registry,
            &ctx,
            &menu,
            &InboundMessage::Selection {
                id: "insurance_submit".into(),
                title: Some("Submit a claim".into()),
            },
        )
        .await;

        assert!(handled);
        assert_eq!(ctx.states.get("p1").await.unwrap().key, "ins_wait_doc");
    }

    #[tokio::test]
    async fn orphaned_state_key_is_unrouted() {
        let (ctx, _sink) = test_ctx().await;
        let registry = registry_with(Insurance::reliable());
        let state = ChatState {
            key: "marketplace_browse".into(),
            data: serde_json::json!({}),
        };

        let handled = dispatch(
            &registry,
            &ctx,
            &state,
            &InboundMessage::Text { body: "hi".into() },
        )
        .await;
        assert!(!handled);
    }

    #[tokio::test]
    async fn handler_failure_is_absorbed_and_state_untouched() {
        let (ctx, sink) = test_ctx().await;
        let registry = registry_with(Insurance::failing_once());
        ctx.set_state(&ChatState {
            key: "ins_wait_doc".into(),
            data: serde_json::json!({}),
        })
        .await
        .unwrap();
        let state = ctx.states.get("p1").await.unwrap();
        let media = InboundMessage::Media {
            kind: MediaKind::Image,
            media_id: "m1".into(),
            caption: None,
        };

        // First attempt fails inside the handler.
        assert!(dispatch(&registry, &ctx, &state, &media).await);
        // State untouched, sender got the generic fallback.
        assert_eq!(ctx.states.get("p1").await.unwrap().key, "ins_wait_doc");
        assert_eq!(
            sink.sent()[0].1.body,
            "Something went wrong. Please try again."
        );

        // Retry of the same (state, input) succeeds and ends idle, the
        // same end state as a single successful call.
        assert!(dispatch(&registry, &ctx, &state, &media).await);
        assert!(ctx.states.get("p1").await.unwrap().is_idle());
    }

    #[tokio::test]
    async fn overlapping_prefixes_rejected_at_registration() {
        let mut registry = DomainRegistry::new();
        registry.register(Arc::new(Insurance::reliable())).unwrap();

        struct Clash;

        #[async_trait]
        impl DomainHandler for Clash {
            fn name(&self) -> &str {
                "clash"
            }
            fn state_prefixes(&self) -> &[&str] {
                &["insurance_claims_"]
            }
            fn menu_keywords(&self) -> &[&str] {
                &[]
            }
            async fn start(&self, _ctx: &RouterContext) -> anyhow::Result<()> {
                Ok(())
            }
            async fn handle_selection(
                &self,
                _ctx: &RouterContext,
                _state: &ChatState,
                _id: &str,
            ) -> anyhow::Result<()> {
                Ok(())
            }
            async fn handle_free_text(
                &self,
                _ctx: &RouterContext,
                _state: &ChatState,
                _text: &str,
            ) -> anyhow::Result<()> {
                Ok(())
            }
            async fn handle_media(
                &self,
                _ctx: &RouterContext,
                _state: &ChatState,
                _message: &InboundMessage,
            ) -> anyhow::Result<()> {
                Ok(())
            }
        }

        assert!(matches!(
            registry.register(Arc::new(Clash)),
            Err(RegistryError::OverlappingPrefix { .. })
        ));
    }
}

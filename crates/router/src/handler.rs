use std::sync::Arc;

use {anyhow::Result, async_trait::async_trait};

use {
    sango_common::{InboundMessage, MessageContext},
    sango_outbound::{send_validated, ReplyPayload, ReplySink, SendError},
    sango_store::{ChatState, ChatStateStore, SessionStore},
};

/// Everything a domain handler may touch while handling one message.
///
/// `msg` is immutable per-message context; the stores are the durable
/// seams through which handlers write their own state transitions.
pub struct RouterContext {
    pub msg: MessageContext,
    pub states: ChatStateStore,
    pub sessions: SessionStore,
    pub sink: Arc<dyn ReplySink>,
}

impl RouterContext {
    /// Send a reply to the current sender, validated before it leaves.
    pub async fn reply(&self, payload: ReplyPayload) -> Result<(), SendError> {
        send_validated(self.sink.as_ref(), self.msg.identity.as_str(), payload).await
    }

    /// Write the sender's next chat state (stay in or advance the flow).
    pub async fn set_state(&self, state: &ChatState) -> Result<()> {
        self.states.set(&self.msg.profile_id, state).await?;
        Ok(())
    }

    /// Return the sender to idle. Handlers call this on completion or
    /// cancel, before any cross-domain handoff.
    pub async fn clear_state(&self) -> Result<()> {
        self.states.clear(&self.msg.profile_id).await?;
        Ok(())
    }
}

/// A pluggable, opaque domain state machine (insurance, jobs, ...).
///
/// Contract with the router:
/// - `state_prefixes` names the domain's disjoint state-key namespace;
///   any chat state whose key starts with one of these prefixes is
///   forwarded here.
/// - `menu_keywords` are the idle-state intent words that trigger
///   `start`, which must write the flow's first chat state itself.
/// - A handler that wants to stay in its flow ends by writing a state
///   (possibly the same key with new data); exiting means explicitly
///   clearing the state. Handlers must be re-entrant on the same
///   `(state, input)` pair: a retry after a failure replays both.
#[async_trait]
pub trait DomainHandler: Send + Sync {
    /// Domain name (e.g. "insurance"), also used as the session's
    /// `current_agent` marker.
    fn name(&self) -> &str;

    /// Disjoint state-key prefixes owned by this domain.
    fn state_prefixes(&self) -> &[&str];

    /// Top-level intent keywords that open this domain from idle.
    fn menu_keywords(&self) -> &[&str];

    /// Open the domain's flow. Responsible for writing the first state.
    async fn start(&self, ctx: &RouterContext) -> Result<()>;

    /// A structured selection (list row or button id) while in-flow.
    async fn handle_selection(
        &self,
        ctx: &RouterContext,
        state: &ChatState,
        id: &str,
    ) -> Result<()>;

    /// Free text while in-flow.
    async fn handle_free_text(
        &self,
        ctx: &RouterContext,
        state: &ChatState,
        text: &str,
    ) -> Result<()>;

    /// Media while in-flow.
    async fn handle_media(
        &self,
        ctx: &RouterContext,
        state: &ChatState,
        message: &InboundMessage,
    ) -> Result<()>;
}

use crate::config::ClientConfig;
use crate::fallback::FallbackChannel;
use crate::protocol::InboundEvent;
use crate::router::{Delivery, MessageRouter};
use crate::transport::{ConnectionStatus, Transport, TransportEvent};
use supchat_core::{
    ChatMessage, MessageOrigin, RatingSubmission, SupchatError, SupchatResult, VisitorIdentity,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Capacity of the chat and transport event buffers.
const EVENT_BUFFER: usize = 64;

/// Lifecycle of one visitor session. `Closed` is not a distinct state: a
/// completed teardown lands back in `Idle`, ready for a fresh start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// No session; `start` is the only meaningful operation.
    Idle,
    /// Session creation in flight.
    Starting,
    /// Session established; messages flow.
    Active,
    /// `end` was requested; waiting for the rating flow to complete or be
    /// skipped.
    Ending,
}

/// Events the controller emits for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// A conversational message to render, in authoritative order.
    MessageRendered {
        /// Author role.
        role: supchat_core::SenderRole,
        /// Message content.
        text: String,
    },
    /// A locally generated status line, distinct from chat content.
    SystemNotice(String),
    /// The session reached `Active`.
    SessionActive,
    /// Teardown completed; all session state is cleared.
    SessionClosed,
}

/// Owns session identity and lifecycle, drives the transport, and exposes
/// the operations a frontend calls.
///
/// All mutation happens through `&mut self` on the owner's task; the
/// embedding drives a loop that feeds [`TransportEvent`]s back in via
/// [`handle_transport_event`](Self::handle_transport_event).
pub struct SessionController {
    fallback: FallbackChannel,
    transport: Transport,
    router: MessageRouter,
    state: LifecycleState,
    session_id: Option<String>,
    visitor: Option<VisitorIdentity>,
    messages: Vec<ChatMessage>,
    event_tx: mpsc::Sender<ChatEvent>,
    event_rx: Option<mpsc::Receiver<ChatEvent>>,
}

impl SessionController {
    /// Build a controller with collaborators derived from `config`.
    pub fn new(config: ClientConfig) -> Self {
        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
        Self {
            transport: Transport::new(config.ws_origin(), EVENT_BUFFER),
            fallback: FallbackChannel::new(config),
            router: MessageRouter,
            state: LifecycleState::Idle,
            session_id: None,
            visitor: None,
            messages: Vec::new(),
            event_tx,
            event_rx: Some(event_rx),
        }
    }

    /// Take the receiving half of the chat event channel. Single-shot.
    pub fn take_event_receiver(&mut self) -> Option<mpsc::Receiver<ChatEvent>> {
        self.event_rx.take()
    }

    /// Take the transport event receiver so the embedding can pump
    /// [`handle_transport_event`](Self::handle_transport_event). Single-shot.
    pub fn take_transport_events(&mut self) -> Option<mpsc::Receiver<TransportEvent>> {
        self.transport.take_event_receiver()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// The backend-assigned session identifier, while one exists.
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// The visitor identity captured at start, while a session exists.
    pub fn visitor(&self) -> Option<&VisitorIdentity> {
        self.visitor.as_ref()
    }

    /// Messages accumulated this session, in render order.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Read-only view of the realtime connection status.
    pub fn connection_status(&self) -> ConnectionStatus {
        self.transport.status()
    }

    /// Start a session for the given visitor.
    ///
    /// Validates both fields (trimmed, non-empty), creates the session over
    /// the fallback channel, then opens the realtime transport. On any
    /// failure the state returns to `Idle` and the error is surfaced; the
    /// caller may retry.
    pub async fn start(&mut self, name: &str, email: &str) -> SupchatResult<()> {
        if self.state != LifecycleState::Idle {
            return Err(SupchatError::Session(
                "a session is already in progress".into(),
            ));
        }
        let visitor = VisitorIdentity::new(name, email)?;

        self.state = LifecycleState::Starting;
        let session_id = match self
            .fallback
            .create_session(&visitor.name, &visitor.email)
            .await
        {
            Ok(id) => id,
            Err(e) => {
                warn!(error = %e, "Session creation failed");
                self.state = LifecycleState::Idle;
                return Err(e);
            }
        };

        info!(session_id = %session_id, "Support session created");
        self.session_id = Some(session_id.clone());
        self.state = LifecycleState::Active;
        self.emit(ChatEvent::SessionActive).await;
        self.notice(format!("Hi {}! 👋 How can we help you today?", visitor.name))
            .await;
        self.visitor = Some(visitor);

        self.transport.open(&session_id);
        Ok(())
    }

    /// Send a visitor message.
    ///
    /// Only meaningful while `Active`; otherwise a no-op. The local echo is
    /// rendered synchronously before any network exchange, so echo order is
    /// authoritative regardless of transport latency. A fallback delivery
    /// failure degrades to a system notice; the session stays `Active`.
    pub async fn send_message(&mut self, text: &str) -> SupchatResult<()> {
        if self.state != LifecycleState::Active {
            debug!("send_message outside an active session is a no-op");
            return Ok(());
        }
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }
        let session_id = self
            .session_id
            .clone()
            .ok_or_else(|| SupchatError::Session("active session has no id".into()))?;

        self.render(ChatMessage::visitor(text, MessageOrigin::Local))
            .await;

        let delivery = self
            .router
            .deliver(&self.transport, &self.fallback, &session_id, text)
            .await?;

        // Record which path actually carried the echo we just rendered.
        if let Some(echo) = self.messages.last_mut() {
            echo.origin = match delivery {
                Delivery::Realtime => MessageOrigin::Realtime,
                Delivery::Fallback | Delivery::FallbackFailed(_) => MessageOrigin::Fallback,
            };
        }

        if let Delivery::FallbackFailed(e) = delivery {
            warn!(error = %e, "Fallback message delivery failed");
            self.notice("Failed to send message").await;
        }
        Ok(())
    }

    /// Feed one transport event into the session.
    ///
    /// Events arriving after teardown (a late close from a connection the
    /// session already abandoned) are ignored without mutating anything.
    pub async fn handle_transport_event(&mut self, event: TransportEvent) {
        if self.session_id.is_none() {
            debug!("Transport event after teardown ignored");
            return;
        }
        match event {
            TransportEvent::Opened => self.notice("Connected to support team").await,
            TransportEvent::Frame(raw) => self.handle_frame(&raw).await,
            TransportEvent::Closed => {
                self.notice("Connection lost. Please try again.").await;
            }
        }
    }

    async fn handle_frame(&mut self, raw: &str) {
        match self.router.classify(raw) {
            InboundEvent::Message { role, text } => {
                self.render(ChatMessage::new(role, text, MessageOrigin::Realtime))
                    .await;
            }
            InboundEvent::AgentAssigned { agent_name } => {
                let notice = match agent_name {
                    Some(name) => format!("Agent {name}"),
                    None => "Agent joined".to_string(),
                };
                self.notice(notice).await;
            }
            InboundEvent::OwnEcho => {
                debug!("Suppressed rebroadcast of the visitor's own message");
            }
            InboundEvent::Unrecognized => {
                debug!("Ignored unrecognized realtime frame");
            }
        }
    }

    /// Request end of session. `Active` only; otherwise a no-op.
    ///
    /// The frontend collects the rating next and completes the teardown via
    /// [`submit_rating`](Self::submit_rating) or
    /// [`skip_rating`](Self::skip_rating).
    pub fn end(&mut self) {
        if self.state != LifecycleState::Active || self.session_id.is_none() {
            debug!("end outside an active session is a no-op");
            return;
        }
        self.state = LifecycleState::Ending;
    }

    /// Submit the rating and complete the teardown.
    ///
    /// Only meaningful while `Ending`. An out-of-range score is surfaced so
    /// the frontend can re-prompt; a submission failure is logged and
    /// swallowed — it never blocks teardown.
    pub async fn submit_rating(&mut self, score: u8, comment: &str) -> SupchatResult<()> {
        if self.state != LifecycleState::Ending {
            debug!("submit_rating outside session end is a no-op");
            return Ok(());
        }
        let session_id = self
            .session_id
            .clone()
            .ok_or_else(|| SupchatError::Session("ending session has no id".into()))?;
        let rating = RatingSubmission::new(session_id, score, comment)?;

        if let Err(e) = self.fallback.submit_rating(&rating).await {
            warn!(error = %e, "Rating submission failed");
        }
        self.close_out().await;
        Ok(())
    }

    /// Complete the teardown without submitting a rating.
    pub async fn skip_rating(&mut self) {
        if self.state != LifecycleState::Ending {
            debug!("skip_rating outside session end is a no-op");
            return;
        }
        self.close_out().await;
    }

    /// Tear down: close the transport and clear all session state. A
    /// subsequent `start` behaves as if no prior session existed.
    async fn close_out(&mut self) {
        self.transport.close();
        self.session_id = None;
        self.visitor = None;
        self.messages.clear();
        self.state = LifecycleState::Idle;
        self.emit(ChatEvent::SessionClosed).await;
        info!("Support session closed");
    }

    async fn render(&mut self, message: ChatMessage) {
        self.emit(ChatEvent::MessageRendered {
            role: message.role,
            text: message.text.clone(),
        })
        .await;
        self.messages.push(message);
    }

    async fn notice(&mut self, text: impl Into<String>) {
        let message = ChatMessage::system(text);
        self.emit(ChatEvent::SystemNotice(message.text.clone())).await;
        self.messages.push(message);
    }

    async fn emit(&self, event: ChatEvent) {
        if self.event_tx.send(event).await.is_err() {
            debug!("Chat event receiver dropped");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use supchat_core::SenderRole;

    fn controller() -> SessionController {
        // Empty api_root: any fallback call fails fast with a builder error.
        SessionController::new(ClientConfig::default())
    }

    /// Force an established session without a backend.
    fn activate(c: &mut SessionController, id: &str) {
        c.state = LifecycleState::Active;
        c.session_id = Some(id.to_string());
        c.visitor = Some(VisitorIdentity::new("Alice", "a@x.com").unwrap());
    }

    #[tokio::test]
    async fn test_start_rejects_blank_identity() {
        let mut c = controller();
        let err = c.start("   ", "a@x.com").await.unwrap_err();
        assert!(matches!(err, SupchatError::Validation(_)));
        assert_eq!(c.state(), LifecycleState::Idle);
        assert!(c.session_id().is_none());
    }

    #[tokio::test]
    async fn test_start_failure_returns_to_idle() {
        let mut c = controller();
        // No backend behind the empty api_root: create_session must fail
        // and the state must fall back to Idle, never Active.
        assert!(c.start("Alice", "a@x.com").await.is_err());
        assert_eq!(c.state(), LifecycleState::Idle);
        assert!(c.session_id().is_none());
        assert!(c.messages().is_empty());
    }

    #[tokio::test]
    async fn test_send_message_is_noop_when_idle() {
        let mut c = controller();
        let mut events = c.take_event_receiver().unwrap();
        c.send_message("hello?").await.unwrap();
        assert!(c.messages().is_empty());
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_local_echo_precedes_failure_notice() {
        let mut c = controller();
        let mut events = c.take_event_receiver().unwrap();
        activate(&mut c, "c1");

        c.send_message("  Hello  ").await.unwrap();

        // Echo first, trimmed; the fallback failure notice follows.
        assert_eq!(
            events.try_recv().unwrap(),
            ChatEvent::MessageRendered {
                role: SenderRole::Visitor,
                text: "Hello".into()
            }
        );
        assert_eq!(
            events.try_recv().unwrap(),
            ChatEvent::SystemNotice("Failed to send message".into())
        );
        assert_eq!(c.state(), LifecycleState::Active);
        assert_eq!(c.messages()[0].origin, MessageOrigin::Fallback);
    }

    #[tokio::test]
    async fn test_echo_order_is_call_order() {
        let mut c = controller();
        let mut events = c.take_event_receiver().unwrap();
        activate(&mut c, "c1");

        c.send_message("a").await.unwrap();
        c.send_message("b").await.unwrap();

        let mut rendered = Vec::new();
        while let Ok(ev) = events.try_recv() {
            if let ChatEvent::MessageRendered { text, .. } = ev {
                rendered.push(text);
            }
        }
        assert_eq!(rendered, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn test_whitespace_only_message_is_noop() {
        let mut c = controller();
        activate(&mut c, "c1");
        c.send_message("   ").await.unwrap();
        assert!(c.messages().is_empty());
    }

    #[tokio::test]
    async fn test_inbound_agent_frame_renders() {
        let mut c = controller();
        let mut events = c.take_event_receiver().unwrap();
        activate(&mut c, "c1");

        c.handle_transport_event(TransportEvent::Frame(
            r#"{"type":"message","payload":{"sender_type":"agent","message":"Hi"}}"#.into(),
        ))
        .await;

        assert_eq!(
            events.try_recv().unwrap(),
            ChatEvent::MessageRendered {
                role: SenderRole::Agent,
                text: "Hi".into()
            }
        );
        assert_eq!(c.messages()[0].origin, MessageOrigin::Realtime);
    }

    #[tokio::test]
    async fn test_inbound_visitor_frame_is_suppressed() {
        let mut c = controller();
        let mut events = c.take_event_receiver().unwrap();
        activate(&mut c, "c1");

        c.handle_transport_event(TransportEvent::Frame(
            r#"{"type":"message","payload":{"sender_type":"visitor","message":"echo"}}"#.into(),
        ))
        .await;

        assert!(events.try_recv().is_err());
        assert!(c.messages().is_empty());
    }

    #[tokio::test]
    async fn test_agent_assigned_notices() {
        let mut c = controller();
        let mut events = c.take_event_receiver().unwrap();
        activate(&mut c, "c1");

        c.handle_transport_event(TransportEvent::Frame(
            r#"{"type":"agent_assigned","agent_name":"Priya"}"#.into(),
        ))
        .await;
        c.handle_transport_event(TransportEvent::Frame(r#"{"type":"agent_assigned"}"#.into()))
            .await;

        assert_eq!(
            events.try_recv().unwrap(),
            ChatEvent::SystemNotice("Agent Priya".into())
        );
        assert_eq!(
            events.try_recv().unwrap(),
            ChatEvent::SystemNotice("Agent joined".into())
        );
    }

    #[tokio::test]
    async fn test_connection_lifecycle_notices() {
        let mut c = controller();
        let mut events = c.take_event_receiver().unwrap();
        activate(&mut c, "c1");

        c.handle_transport_event(TransportEvent::Opened).await;
        c.handle_transport_event(TransportEvent::Closed).await;

        assert_eq!(
            events.try_recv().unwrap(),
            ChatEvent::SystemNotice("Connected to support team".into())
        );
        assert_eq!(
            events.try_recv().unwrap(),
            ChatEvent::SystemNotice("Connection lost. Please try again.".into())
        );
    }

    #[tokio::test]
    async fn test_transport_events_after_teardown_are_ignored() {
        let mut c = controller();
        let mut events = c.take_event_receiver().unwrap();

        c.handle_transport_event(TransportEvent::Closed).await;
        c.handle_transport_event(TransportEvent::Frame(
            r#"{"type":"message","payload":{"sender_type":"agent","message":"late"}}"#.into(),
        ))
        .await;

        assert!(events.try_recv().is_err());
        assert!(c.messages().is_empty());
    }

    #[tokio::test]
    async fn test_end_is_noop_when_idle() {
        let mut c = controller();
        c.end();
        assert_eq!(c.state(), LifecycleState::Idle);
    }

    #[tokio::test]
    async fn test_rating_out_of_range_stays_ending() {
        let mut c = controller();
        activate(&mut c, "c1");
        c.end();
        assert_eq!(c.state(), LifecycleState::Ending);

        let err = c.submit_rating(9, "").await.unwrap_err();
        assert!(matches!(err, SupchatError::Validation(_)));
        assert_eq!(c.state(), LifecycleState::Ending);
        assert_eq!(c.session_id(), Some("c1"));
    }

    #[tokio::test]
    async fn test_skip_rating_clears_everything() {
        let mut c = controller();
        let mut events = c.take_event_receiver().unwrap();
        activate(&mut c, "c1");
        c.handle_transport_event(TransportEvent::Frame(
            r#"{"type":"message","payload":{"sender_type":"agent","message":"Hi"}}"#.into(),
        ))
        .await;
        c.end();
        c.skip_rating().await;

        assert_eq!(c.state(), LifecycleState::Idle);
        assert!(c.session_id().is_none());
        assert!(c.visitor().is_none());
        assert!(c.messages().is_empty());

        // Drain: the rendered message, then the close event.
        let mut saw_closed = false;
        while let Ok(ev) = events.try_recv() {
            if ev == ChatEvent::SessionClosed {
                saw_closed = true;
            }
        }
        assert!(saw_closed);
    }

    #[tokio::test]
    async fn test_submit_rating_is_noop_when_active() {
        let mut c = controller();
        activate(&mut c, "c1");
        // Rating without end() first: ignored, session stays active.
        c.submit_rating(5, "great").await.unwrap();
        assert_eq!(c.state(), LifecycleState::Active);
        assert_eq!(c.session_id(), Some("c1"));
    }
}

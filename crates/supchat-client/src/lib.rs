//! Session lifecycle and dual-transport message delivery for a
//! customer-support chat backend.
//!
//! The client establishes a visitor session over a one-shot HTTP channel,
//! then opens a persistent WebSocket bound to that session for low-latency
//! message exchange. Outgoing messages are routed to the realtime connection
//! while it is open and fall back to HTTP otherwise; a dropped connection is
//! terminal for the session's realtime path (no reconnect) and the fallback
//! channel carries the remainder of the session.
//!
//! # Main types
//!
//! - [`SessionController`] — Owns session identity and the lifecycle state
//!   machine; the operations a frontend calls.
//! - [`Transport`] — The single supervised realtime connection per session.
//! - [`FallbackChannel`] — One-shot request/response calls to the backend.
//! - [`MessageRouter`] — Per-message transport selection and inbound frame
//!   classification.
//! - [`ClientConfig`] — `api_root` / `ws_url` configuration surface.

/// Client configuration and realtime-origin derivation.
pub mod config;
/// Session controller and lifecycle state machine.
pub mod controller;
/// One-shot HTTP fallback channel.
pub mod fallback;
/// Wire frame encoding and tagged-variant decoding.
pub mod protocol;
/// Outbound routing and inbound classification.
pub mod router;
/// Realtime WebSocket transport.
pub mod transport;

pub use config::ClientConfig;
pub use controller::{ChatEvent, LifecycleState, SessionController};
pub use fallback::FallbackChannel;
pub use protocol::InboundEvent;
pub use router::{Delivery, MessageRouter};
pub use transport::{ConnectionStatus, Transport, TransportEvent};

pub use supchat_core::{
    ChatMessage, MessageOrigin, RatingSubmission, SenderRole, SupchatError, SupchatResult,
    VisitorIdentity,
};

//! Core types and error definitions for the supchat client.
//!
//! This crate provides the foundational types shared across the supchat
//! crates: the unified error enum, message and role representations, the
//! visitor identity captured at session start, and the end-of-session
//! rating.
//!
//! # Main types
//!
//! - [`SupchatError`] — Unified error enum for all supchat subsystems.
//! - [`SupchatResult`] — Convenience alias for `Result<T, SupchatError>`.
//! - [`SenderRole`] — Message author role (visitor, agent, system).
//! - [`ChatMessage`] — A single message within a support session.
//! - [`VisitorIdentity`] — Validated name/email pair captured at start.
//! - [`RatingSubmission`] — Optional satisfaction rating submitted at end.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// --- Error types ---

/// Top-level error type for the supchat client.
///
/// Each variant corresponds to a failure class with its own propagation
/// policy: validation and session-creation failures are surfaced to the
/// caller, send failures degrade to an in-band system notice, and rating
/// or decode failures are absorbed with a log line.
#[derive(Debug, thiserror::Error)]
pub enum SupchatError {
    /// Caller-supplied input was rejected (empty name/email, rating out of
    /// range). Recoverable by re-prompting.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The fallback backend could not be reached at all.
    #[error("Network error: {0}")]
    Network(String),

    /// The fallback backend answered with a non-2xx status.
    #[error("Server error: HTTP {0}")]
    Server(u16),

    /// A realtime send was attempted while the connection was not open.
    /// Internal signal that drives fallback selection; never user-visible.
    #[error("Realtime connection is not open")]
    NotConnected,

    /// A fallback message post failed. Surfaced as a system notice, never
    /// as a hard failure of the session.
    #[error("Send failed: {0}")]
    Send(String),

    /// A session-lifecycle misuse (e.g. starting over a live session).
    #[error("Session error: {0}")]
    Session(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A convenience `Result` alias using [`SupchatError`].
pub type SupchatResult<T> = Result<T, SupchatError>;

// --- Message types ---

/// The role of the participant that authored a [`ChatMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderRole {
    /// The human visitor on this end of the session.
    Visitor,
    /// A support agent on the backend side.
    Agent,
    /// A locally generated, non-conversational status line.
    System,
}

impl SenderRole {
    /// Maps a wire-level `sender_type` string to a role.
    ///
    /// Unknown or missing sender types render as system content, matching
    /// the backend contract where only `visitor` and `agent` are expected.
    pub fn from_wire(sender_type: Option<&str>) -> Self {
        match sender_type {
            Some("visitor") => Self::Visitor,
            Some("agent") => Self::Agent,
            _ => Self::System,
        }
    }
}

/// Which path carried a [`ChatMessage`]. Diagnostic only — rendering and
/// ordering never depend on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageOrigin {
    /// Delivered over the persistent realtime connection.
    Realtime,
    /// Delivered over the one-shot request/response channel.
    Fallback,
    /// Generated locally (system notices, pre-delivery echo).
    Local,
}

/// A single message within a support session.
///
/// Messages are append-only and ordered by arrival at the client; they are
/// not retained beyond the in-memory session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// The role of the message author.
    pub role: SenderRole,
    /// The textual content of the message.
    pub text: String,
    /// Which transport carried this message.
    pub origin: MessageOrigin,
    /// UTC timestamp of when the message was recorded locally.
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    /// Creates a new message with the given role, content, and origin.
    pub fn new(role: SenderRole, text: impl Into<String>, origin: MessageOrigin) -> Self {
        Self {
            role,
            text: text.into(),
            origin,
            timestamp: Utc::now(),
        }
    }

    /// Creates a visitor-authored message.
    pub fn visitor(text: impl Into<String>, origin: MessageOrigin) -> Self {
        Self::new(SenderRole::Visitor, text, origin)
    }

    /// Creates an agent-authored message.
    pub fn agent(text: impl Into<String>, origin: MessageOrigin) -> Self {
        Self::new(SenderRole::Agent, text, origin)
    }

    /// Creates a locally generated system notice.
    pub fn system(text: impl Into<String>) -> Self {
        Self::new(SenderRole::System, text, MessageOrigin::Local)
    }
}

// --- Visitor identity ---

/// The name/email pair captured once at session start, immutable thereafter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitorIdentity {
    /// Display name of the visitor.
    pub name: String,
    /// Contact email of the visitor.
    pub email: String,
}

impl VisitorIdentity {
    /// Validates and captures a visitor identity.
    ///
    /// Both fields are trimmed; an empty or whitespace-only value is a
    /// [`SupchatError::Validation`].
    pub fn new(name: &str, email: &str) -> SupchatResult<Self> {
        let name = name.trim();
        let email = email.trim();
        if name.is_empty() || email.is_empty() {
            return Err(SupchatError::Validation(
                "both name and email are required to start a session".into(),
            ));
        }
        Ok(Self {
            name: name.to_string(),
            email: email.to_string(),
        })
    }
}

// --- Rating ---

/// An end-of-session satisfaction rating. Created at most once per session
/// and submitted best-effort: a failed submission is logged, never retried.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingSubmission {
    /// The backend-assigned conversation identifier.
    pub session_id: String,
    /// Star rating, 0–5 where 0 means "not rated".
    pub score: u8,
    /// Free-text feedback; may be empty.
    pub comment: String,
}

impl RatingSubmission {
    /// Maximum accepted score.
    pub const MAX_SCORE: u8 = 5;

    /// Builds a rating submission, rejecting scores above
    /// [`Self::MAX_SCORE`].
    pub fn new(session_id: impl Into<String>, score: u8, comment: impl Into<String>) -> SupchatResult<Self> {
        if score > Self::MAX_SCORE {
            return Err(SupchatError::Validation(format!(
                "rating must be between 0 and {}, got {score}",
                Self::MAX_SCORE
            )));
        }
        Ok(Self {
            session_id: session_id.into(),
            score,
            comment: comment.into(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_role_from_wire() {
        assert_eq!(SenderRole::from_wire(Some("visitor")), SenderRole::Visitor);
        assert_eq!(SenderRole::from_wire(Some("agent")), SenderRole::Agent);
        assert_eq!(SenderRole::from_wire(Some("bot")), SenderRole::System);
        assert_eq!(SenderRole::from_wire(None), SenderRole::System);
    }

    #[test]
    fn test_message_constructors() {
        let msg = ChatMessage::visitor("Hello", MessageOrigin::Realtime);
        assert_eq!(msg.role, SenderRole::Visitor);
        assert_eq!(msg.origin, MessageOrigin::Realtime);

        let notice = ChatMessage::system("Connection lost");
        assert_eq!(notice.role, SenderRole::System);
        assert_eq!(notice.origin, MessageOrigin::Local);
    }

    #[test]
    fn test_identity_trims_fields() {
        let id = VisitorIdentity::new("  Alice ", " a@x.com  ").unwrap();
        assert_eq!(id.name, "Alice");
        assert_eq!(id.email, "a@x.com");
    }

    #[test]
    fn test_identity_rejects_blank_fields() {
        assert!(VisitorIdentity::new("", "a@x.com").is_err());
        assert!(VisitorIdentity::new("Alice", "   ").is_err());
        assert!(matches!(
            VisitorIdentity::new("  ", ""),
            Err(SupchatError::Validation(_))
        ));
    }

    #[test]
    fn test_rating_bounds() {
        assert!(RatingSubmission::new("c1", 0, "").is_ok());
        assert!(RatingSubmission::new("c1", 5, "great").is_ok());
        assert!(matches!(
            RatingSubmission::new("c1", 6, ""),
            Err(SupchatError::Validation(_))
        ));
    }

    #[test]
    fn test_role_serialization() {
        let json = serde_json::to_string(&SenderRole::Visitor).unwrap();
        assert_eq!(json, "\"visitor\"");
        let role: SenderRole = serde_json::from_str("\"agent\"").unwrap();
        assert_eq!(role, SenderRole::Agent);
    }
}

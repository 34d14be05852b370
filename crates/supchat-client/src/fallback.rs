use crate::config::ClientConfig;
use serde::{Deserialize, Serialize};
use supchat_core::{RatingSubmission, SupchatError, SupchatResult};
use tracing::debug;

/// One-shot request/response channel to the support backend.
///
/// Used to create the session, and to carry messages and the end-of-session
/// rating whenever the realtime transport is not connected. Operations are
/// single exchanges: idempotent on a manual retry, never retried here.
pub struct FallbackChannel {
    client: reqwest::Client,
    config: ClientConfig,
}

// ── Wire types ──────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct CreateSessionRequest<'a> {
    name: &'a str,
    email: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreateSessionResponse {
    conversation_id: String,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    conversation_id: &'a str,
    sender_type: &'static str,
    sender_id: Option<&'a str>,
    message: &'a str,
}

#[derive(Debug, Serialize)]
struct SendFeedbackRequest<'a> {
    conversation_id: &'a str,
    rating: u8,
    feedback: &'a str,
}

// ── Implementation ──────────────────────────────────────────────────────────

impl FallbackChannel {
    /// Create a new `FallbackChannel` for the configured backend.
    pub fn new(config: ClientConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Create a session for the given visitor, returning the
    /// backend-assigned conversation identifier.
    ///
    /// A failure here means the session cannot proceed: the caller must
    /// surface it and must not transition to an active state.
    pub async fn create_session(&self, name: &str, email: &str) -> SupchatResult<String> {
        let url = self.config.endpoint("create_session/");
        let payload = CreateSessionRequest { name, email };

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| SupchatError::Network(format!("create_session error: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SupchatError::Server(status.as_u16()));
        }

        let body: CreateSessionResponse = response
            .json()
            .await
            .map_err(|e| SupchatError::Network(format!("create_session parse error: {e}")))?;

        Ok(body.conversation_id)
    }

    /// Post a visitor message over HTTP.
    ///
    /// Fire-and-report-only: the caller degrades a failure to a local
    /// system notice and does not retry.
    pub async fn send_message(&self, conversation_id: &str, text: &str) -> SupchatResult<()> {
        let url = self.config.endpoint("send_message/");
        let payload = SendMessageRequest {
            conversation_id,
            sender_type: "visitor",
            sender_id: None,
            message: text,
        };

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| SupchatError::Send(format!("send_message error: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SupchatError::Send(format!(
                "send_message failed: HTTP {status}"
            )));
        }

        debug!(conversation_id = %conversation_id, "Message posted over fallback channel");
        Ok(())
    }

    /// Submit the end-of-session rating.
    ///
    /// Best-effort by contract: the caller logs a failure and proceeds with
    /// teardown regardless.
    pub async fn submit_rating(&self, rating: &RatingSubmission) -> SupchatResult<()> {
        let url = self.config.endpoint("send_feedback/");
        let payload = SendFeedbackRequest {
            conversation_id: &rating.session_id,
            rating: rating.score,
            feedback: &rating.comment,
        };

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| SupchatError::Network(format!("send_feedback error: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SupchatError::Server(status.as_u16()));
        }

        Ok(())
    }
}

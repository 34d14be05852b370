use serde::{Deserialize, Serialize};
use supchat_core::{SenderRole, SupchatResult};

// ── Outbound frames ─────────────────────────────────────────────────────────

/// The single outbound realtime frame shape:
/// `{"type":"message","sender_type":"visitor","sender_id":null,"message":...}`.
#[derive(Debug, Serialize)]
pub struct OutboundFrame<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    sender_type: &'static str,
    sender_id: Option<&'a str>,
    message: &'a str,
}

impl<'a> OutboundFrame<'a> {
    /// Builds a visitor-authored message frame.
    pub fn message(text: &'a str) -> Self {
        Self {
            kind: "message",
            sender_type: "visitor",
            sender_id: None,
            message: text,
        }
    }

    /// Serializes the frame to its wire representation.
    pub fn encode(&self) -> SupchatResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// ── Inbound frames ──────────────────────────────────────────────────────────

/// Raw inbound frame, discriminated by the `type` field. A closed set: any
/// tag outside the recognized ones lands in `Unrecognized` instead of
/// flowing downstream as loose JSON.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum RawFrame {
    /// A chat message, carried either under `payload` or `message`.
    #[serde(rename = "message")]
    Message {
        #[serde(default)]
        payload: Option<WireBody>,
        #[serde(default)]
        message: Option<WireBody>,
    },
    /// An agent was assigned to the conversation.
    #[serde(rename = "agent_assigned")]
    AgentAssigned {
        #[serde(default)]
        agent_name: Option<String>,
    },
    #[serde(other)]
    Unrecognized,
}

/// Message body common to both carrier keys.
#[derive(Debug, Deserialize)]
struct WireBody {
    #[serde(default)]
    sender_type: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// A classified inbound realtime event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// A renderable chat message from the agent or backend.
    Message {
        /// Author role mapped from the wire `sender_type`.
        role: SenderRole,
        /// Message content.
        text: String,
    },
    /// An agent was assigned; `None` when the backend omitted the name.
    AgentAssigned {
        /// Display name of the assigned agent, if any.
        agent_name: Option<String>,
    },
    /// A rebroadcast of the visitor's own message. Suppressed — the client
    /// already rendered its echo on the outbound path.
    OwnEcho,
    /// Anything outside the recognized frame set; discarded.
    Unrecognized,
}

/// Decodes a raw realtime frame into an [`InboundEvent`].
///
/// Returns `Err` only for frames that are not valid JSON or do not fit the
/// tagged shape at all; the caller logs and discards those.
pub fn decode_frame(raw: &str) -> SupchatResult<InboundEvent> {
    let frame: RawFrame = serde_json::from_str(raw)?;
    Ok(match frame {
        RawFrame::Message { payload, message } => match payload.or(message) {
            Some(body) => classify_body(body),
            None => InboundEvent::Unrecognized,
        },
        RawFrame::AgentAssigned { agent_name } => InboundEvent::AgentAssigned { agent_name },
        RawFrame::Unrecognized => InboundEvent::Unrecognized,
    })
}

fn classify_body(body: WireBody) -> InboundEvent {
    let role = SenderRole::from_wire(body.sender_type.as_deref());
    if role == SenderRole::Visitor {
        return InboundEvent::OwnEcho;
    }
    match body.message {
        Some(text) => InboundEvent::Message { role, text },
        None => InboundEvent::Unrecognized,
    }
}

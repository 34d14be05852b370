use crate::fallback::FallbackChannel;
use crate::protocol::{self, InboundEvent, OutboundFrame};
use crate::transport::{ConnectionStatus, Transport};
use supchat_core::{SupchatError, SupchatResult};
use tracing::{debug, warn};

/// Which path carried an outbound message, or why neither did fully.
///
/// Callers pattern-match this explicitly instead of relying on thrown
/// errors; the local echo has already been rendered by the time a delivery
/// outcome exists, so a failure only ever adds a supplementary notice.
#[derive(Debug)]
pub enum Delivery {
    /// Sent over the realtime connection.
    Realtime,
    /// Posted over the fallback HTTP channel.
    Fallback,
    /// The fallback post failed; best-effort, not retried.
    FallbackFailed(SupchatError),
}

/// Decides, per outgoing message, between the realtime transport and the
/// fallback channel, and classifies inbound realtime payloads.
#[derive(Debug, Default)]
pub struct MessageRouter;

impl MessageRouter {
    /// Deliver a visitor message, preferring the realtime transport.
    ///
    /// Routes to [`Transport::send`] while the connection is `Connected`;
    /// any other status — including a drop that races this call — selects
    /// the fallback channel. Exactly one path carries the message.
    pub async fn deliver(
        &self,
        transport: &Transport,
        fallback: &FallbackChannel,
        session_id: &str,
        text: &str,
    ) -> SupchatResult<Delivery> {
        if transport.status() == ConnectionStatus::Connected {
            let frame = OutboundFrame::message(text).encode()?;
            match transport.send(frame).await {
                Ok(()) => return Ok(Delivery::Realtime),
                Err(SupchatError::NotConnected) => {
                    debug!("Realtime connection dropped mid-send, using fallback");
                }
                Err(e) => return Err(e),
            }
        }

        match fallback.send_message(session_id, text).await {
            Ok(()) => Ok(Delivery::Fallback),
            Err(e) => Ok(Delivery::FallbackFailed(e)),
        }
    }

    /// Classify a raw inbound frame.
    ///
    /// A frame that fails to decode is logged and reported as
    /// [`InboundEvent::Unrecognized`] — never surfaced to the visitor,
    /// never fatal to the connection.
    pub fn classify(&self, raw: &str) -> InboundEvent {
        match protocol::decode_frame(raw) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "Discarding undecodable realtime frame");
                InboundEvent::Unrecognized
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use supchat_core::SenderRole;

    #[test]
    fn test_classify_delegates_to_decode() {
        let router = MessageRouter;
        let event =
            router.classify(r#"{"type":"message","payload":{"sender_type":"agent","message":"Hi"}}"#);
        assert_eq!(
            event,
            InboundEvent::Message {
                role: SenderRole::Agent,
                text: "Hi".into()
            }
        );
    }

    #[test]
    fn test_classify_absorbs_parse_failures() {
        let router = MessageRouter;
        assert_eq!(router.classify("not json at all"), InboundEvent::Unrecognized);
    }
}

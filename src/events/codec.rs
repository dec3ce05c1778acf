//! Event Codec
//!
//! The wire format is one flat JSON object per frame:
//!
//! ```json
//! { "event": "send_message", "id": "client-...", "timestamp": "2024-01-01T00:00:00Z", "content": { "message": "hi" } }
//! ```
//!
//! The shape of `content` depends on the `event` string, so decoding runs in
//! two passes: the first reads only the discriminant, the second decodes the
//! whole frame into the content type that discriminant selects.

use chrono::{DateTime, Utc};
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};

use super::error::{DecodeError, EncodeError};
use super::types::*;

/// First pass: only the discriminant
#[derive(Deserialize)]
struct Discriminant {
    event: String,
}

/// Second pass: the envelope with a concrete content shape
#[derive(Deserialize)]
struct Envelope<C> {
    id: String,
    timestamp: DateTime<Utc>,
    content: C,
}

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    event: &'static str,
    id: &'a str,
    timestamp: &'a DateTime<Utc>,
    content: &'a EventContent,
}

/// Decode a single frame into a typed event
pub fn decode(bytes: &[u8]) -> Result<Event, DecodeError> {
    let head: Discriminant =
        serde_json::from_slice(bytes).map_err(DecodeError::MalformedPayload)?;

    let kind = EventKind::from_wire(&head.event)
        .ok_or_else(|| DecodeError::UnknownEventKind(head.event))?;

    match kind {
        EventKind::RequestAuthentication => decode_as::<RequestAuthentication>(bytes),
        EventKind::ConnectionAccepted => decode_as::<ConnectionAccepted>(bytes),
        EventKind::ConnectionRejected => decode_as::<ConnectionRejected>(bytes),
        EventKind::ClientAuthenticated => decode_as::<ClientAuthenticated>(bytes),
        EventKind::ClientDisconnecting => decode_as::<ClientDisconnecting>(bytes),
        EventKind::ClientDisconnected => decode_as::<ClientDisconnected>(bytes),
        EventKind::SendMessage => decode_as::<SendMessage>(bytes),
        EventKind::BroadcastMessage => decode_as::<BroadcastMessage>(bytes),
    }
}

fn decode_as<C: EventPayload>(bytes: &[u8]) -> Result<Event, DecodeError> {
    let envelope: Envelope<C> =
        serde_json::from_slice(bytes).map_err(DecodeError::MalformedPayload)?;

    Ok(Event {
        id: envelope.id,
        timestamp: envelope.timestamp,
        content: envelope.content.into(),
    })
}

/// Encode an event into a single frame
pub fn encode(event: &Event) -> Result<Vec<u8>, EncodeError> {
    let envelope = EnvelopeRef {
        event: event.kind().as_str(),
        id: &event.id,
        timestamp: &event.timestamp,
        content: &event.content,
    };
    Ok(serde_json::to_vec(&envelope)?)
}

/// Decode every complete frame at the start of `bytes`
///
/// A single read may carry several frames back to back, or end in the middle
/// of one. Returns the decoded frames and the number of bytes consumed; the
/// unconsumed tail is an incomplete frame that needs more input.
pub fn decode_frames(bytes: &[u8]) -> (Vec<Result<Event, DecodeError>>, usize) {
    let mut stream = serde_json::Deserializer::from_slice(bytes).into_iter::<IgnoredAny>();
    let mut frames = Vec::new();
    let mut start = 0;

    loop {
        match stream.next() {
            Some(Ok(_)) => {
                let end = stream.byte_offset();
                frames.push(decode(&bytes[start..end]));
                start = end;
            }
            Some(Err(e)) if e.is_eof() => break,
            Some(Err(e)) => {
                // Garbage cannot be resynchronized; drop the rest of the buffer
                frames.push(Err(DecodeError::MalformedPayload(e)));
                start = bytes.len();
                break;
            }
            None => {
                start = bytes.len();
                break;
            }
        }
    }

    (frames, start)
}

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::{self, Read, Write};
use std::ops::ControlFlow;
use std::sync::mpsc::Receiver;

pub const UI_TO_HOST_CAP: usize = 65_536;
pub const HOST_TO_UI_CAP: usize = 1_048_576;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    GetState,
    SetState,
    InvokeCommand,
    Log,
}

impl MessageType {
    pub fn from_wire(raw: &str) -> Option<Self> {
        match raw {
            "getState" => Some(Self::GetState),
            "setState" => Some(Self::SetState),
            "invokeCommand" => Some(Self::InvokeCommand),
            "log" => Some(Self::Log),
            _ => None,
        }
    }

    pub fn as_wire(self) -> &'static str {
        match self {
            Self::GetState => "getState",
            Self::SetState => "setState",
            Self::InvokeCommand => "invokeCommand",
            Self::Log => "log",
        }
    }
}

/// Page → host message. `message_type` stays a raw string so unknown
/// types can be answered instead of failing to decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_id: Option<String>,
    pub message_type: String,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_id: Option<String>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResponseEnvelope {
    pub fn ok(callback_id: Option<String>, data: Value) -> Self {
        Self {
            callback_id,
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(
        callback_id: Option<String>,
        error: impl Into<String>,
        data: Option<Value>,
    ) -> Self {
        Self {
            callback_id,
            success: false,
            data,
            error: Some(error.into()),
        }
    }
}

/// Host-initiated push that is not a reply to any request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostEvent {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl HostEvent {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutboundMessage {
    Response(ResponseEnvelope),
    Event(HostEvent),
}

impl From<ResponseEnvelope> for OutboundMessage {
    fn from(response: ResponseEnvelope) -> Self {
        Self::Response(response)
    }
}

impl From<HostEvent> for OutboundMessage {
    fn from(event: HostEvent) -> Self {
        Self::Event(event)
    }
}

/// What the transport hands to the dispatcher for every inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Envelope(InboundEnvelope),
    Malformed {
        callback_id: Option<String>,
        reason: String,
    },
}

/// Decodes one inbound frame. Pages that post `JSON.stringify(envelope)`
/// arrive double-encoded as a JSON string; both shapes are accepted.
pub fn decode_inbound(payload: &[u8]) -> Inbound {
    let value = match serde_json::from_slice::<Value>(payload) {
        Ok(Value::String(inner)) => match serde_json::from_str::<Value>(&inner) {
            Ok(value) => value,
            Err(err) => {
                return Inbound::Malformed {
                    callback_id: None,
                    reason: format!("invalid json: {err}"),
                };
            }
        },
        Ok(value) => value,
        Err(err) => {
            return Inbound::Malformed {
                callback_id: None,
                reason: format!("invalid json: {err}"),
            };
        }
    };

    let callback_id = value
        .get("callbackId")
        .and_then(Value::as_str)
        .map(str::to_string);

    match serde_json::from_value::<InboundEnvelope>(value) {
        Ok(envelope) => Inbound::Envelope(envelope),
        Err(err) => Inbound::Malformed {
            callback_id,
            reason: format!("invalid envelope: {err}"),
        },
    }
}

pub fn writer_loop<W: Write>(mut writer: W, rx: Receiver<OutboundMessage>) -> io::Result<()> {
    for message in rx {
        let payload = match encode_outbound(&message)? {
            payload if payload.len() <= HOST_TO_UI_CAP => payload,
            oversized => match oversized_replacement(&message, oversized.len()) {
                Some(replacement) => encode_outbound(&replacement)?,
                None => {
                    tracing::error!(
                        len = oversized.len(),
                        cap = HOST_TO_UI_CAP,
                        "dropping oversized host event"
                    );
                    continue;
                }
            },
        };

        write_frame(&mut writer, &payload, HOST_TO_UI_CAP)?;
        writer.flush()?;
    }

    Ok(())
}

/// Reads frames until EOF or until `on_inbound` breaks. Decode failures
/// and oversized frames are reported as `Inbound::Malformed` and the
/// loop keeps going.
pub fn reader_loop<R, F>(mut reader: R, max_payload: usize, mut on_inbound: F) -> io::Result<()>
where
    R: Read,
    F: FnMut(Inbound) -> ControlFlow<()>,
{
    loop {
        let inbound = match read_frame(&mut reader, max_payload) {
            Ok(Frame::Payload(payload)) => decode_inbound(&payload),
            Ok(Frame::Oversized(len)) => Inbound::Malformed {
                callback_id: None,
                reason: format!("frame too large: {len} > {max_payload}"),
            },
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(err) => return Err(err),
        };

        if on_inbound(inbound).is_break() {
            return Ok(());
        }
    }
}

fn oversized_replacement(message: &OutboundMessage, len: usize) -> Option<OutboundMessage> {
    match message {
        OutboundMessage::Response(response) => {
            tracing::error!(
                len,
                cap = HOST_TO_UI_CAP,
                callback_id = ?response.callback_id,
                "response exceeds frame cap; replying with failure"
            );
            Some(
                ResponseEnvelope::failure(
                    response.callback_id.clone(),
                    format!("response too large: {len} > {HOST_TO_UI_CAP}"),
                    None,
                )
                .into(),
            )
        }
        OutboundMessage::Event(_) => None,
    }
}

fn encode_outbound(message: &OutboundMessage) -> io::Result<Vec<u8>> {
    serde_json::to_vec(message).map_err(json_error)
}

enum Frame {
    Payload(Vec<u8>),
    Oversized(usize),
}

fn read_frame(reader: &mut impl Read, max_payload: usize) -> io::Result<Frame> {
    let mut len_buf = [0_u8; 4];
    reader.read_exact(&mut len_buf)?;

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > max_payload {
        // Skip the body so the next frame header lines up again.
        let skipped = io::copy(&mut reader.take(len as u64), &mut io::sink())?;
        if skipped < len as u64 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("truncated oversized frame: {skipped} of {len} bytes"),
            ));
        }
        return Ok(Frame::Oversized(len));
    }

    let mut payload = vec![0_u8; len];
    reader.read_exact(&mut payload)?;
    Ok(Frame::Payload(payload))
}

fn write_frame(writer: &mut impl Write, payload: &[u8], max_payload: usize) -> io::Result<()> {
    if payload.len() > max_payload {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame too large: {} > {}", payload.len(), max_payload),
        ));
    }

    let len = u32::try_from(payload.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "payload exceeds u32"))?;

    writer.write_all(&len.to_be_bytes())?;
    writer.write_all(payload)?;
    Ok(())
}

fn json_error(err: serde_json::Error) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, err)
}

/// Convenience for tests and embedders that feed frames by hand.
pub fn encode_frame(payload: &[u8]) -> io::Result<Vec<u8>> {
    let mut out = Vec::with_capacity(payload.len() + 4);
    write_frame(&mut out, payload, UI_TO_HOST_CAP)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Cursor;
    use std::sync::mpsc;

    #[test]
    fn write_then_read_round_trip() {
        let payload = br#"{"messageType":"getState","callbackId":"c1"}"#;
        let mut out = Vec::new();

        write_frame(&mut out, payload, UI_TO_HOST_CAP).expect("frame write");

        let mut cursor = Cursor::new(out);
        match read_frame(&mut cursor, UI_TO_HOST_CAP).expect("frame read") {
            Frame::Payload(decoded) => assert_eq!(decoded, payload),
            Frame::Oversized(len) => panic!("unexpected oversized frame of {len} bytes"),
        }
    }

    #[test]
    fn truncated_frame_is_rejected() {
        let data = vec![0, 0, 0, 5, b'a', b'b'];
        let mut cursor = Cursor::new(data);
        let err = read_frame(&mut cursor, UI_TO_HOST_CAP)
            .err()
            .expect("expected eof");
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn endian_is_big_endian() {
        let payload = b"abc";
        let mut out = Vec::new();
        write_frame(&mut out, payload, UI_TO_HOST_CAP).expect("frame write");
        assert_eq!(&out[0..4], &[0, 0, 0, 3]);
    }

    #[test]
    fn oversized_frame_is_skipped_and_reading_continues() {
        let mut data = 8_u32.to_be_bytes().to_vec();
        data.extend_from_slice(b"01234567");
        data.extend(
            encode_frame(br#"{"messageType":"getState","callbackId":"c2"}"#).expect("frame"),
        );

        let mut seen = Vec::new();
        reader_loop(Cursor::new(data), 4, |inbound| {
            seen.push(inbound);
            ControlFlow::Continue(())
        })
        .expect("reader loop");

        assert_eq!(seen.len(), 2);
        match &seen[0] {
            Inbound::Malformed { callback_id, reason } => {
                assert_eq!(callback_id, &None);
                assert!(reason.contains("frame too large"), "{reason}");
            }
            other => panic!("expected malformed, got {other:?}"),
        }
        assert!(matches!(seen[1], Inbound::Malformed { .. }));
    }

    #[test]
    fn reader_loop_stops_when_handler_breaks() {
        let mut data = encode_frame(br#"{"messageType":"log","payload":{}}"#).expect("frame");
        data.extend(encode_frame(br#"{"messageType":"log","payload":{}}"#).expect("frame"));

        let mut count = 0;
        reader_loop(Cursor::new(data), UI_TO_HOST_CAP, |_| {
            count += 1;
            ControlFlow::Break(())
        })
        .expect("reader loop");

        assert_eq!(count, 1);
    }

    #[test]
    fn decodes_set_state_envelope() {
        let payload = br#"{"callbackId":"c1","messageType":"setState","payload":{"width":1500,"shape":"circle"}}"#;

        match decode_inbound(payload) {
            Inbound::Envelope(envelope) => {
                assert_eq!(envelope.callback_id.as_deref(), Some("c1"));
                assert_eq!(envelope.message_type, "setState");
                assert_eq!(envelope.payload["width"], 1500);
                assert_eq!(envelope.payload["shape"], "circle");
            }
            other => panic!("expected envelope, got {other:?}"),
        }
    }

    #[test]
    fn decodes_double_encoded_envelope() {
        let inner = r#"{"callbackId":"c9","messageType":"getState","payload":{}}"#;
        let outer = serde_json::to_vec(&Value::String(inner.to_string())).expect("encode");

        match decode_inbound(&outer) {
            Inbound::Envelope(envelope) => assert_eq!(envelope.callback_id.as_deref(), Some("c9")),
            other => panic!("expected envelope, got {other:?}"),
        }
    }

    #[test]
    fn malformed_envelope_keeps_recoverable_callback_id() {
        match decode_inbound(br#"{"callbackId":"c3","payload":{}}"#) {
            Inbound::Malformed { callback_id, .. } => {
                assert_eq!(callback_id.as_deref(), Some("c3"))
            }
            other => panic!("expected malformed, got {other:?}"),
        }

        match decode_inbound(b"not json") {
            Inbound::Malformed { callback_id, .. } => assert_eq!(callback_id, None),
            other => panic!("expected malformed, got {other:?}"),
        }
    }

    #[test]
    fn encodes_response_without_error_on_success() {
        let response = ResponseEnvelope::ok(Some("c1".to_string()), json!({}));
        let encoded = encode_outbound(&response.into()).expect("encode response");

        let value: Value = serde_json::from_slice(&encoded).expect("parse encoded json");
        assert_eq!(value, json!({"callbackId": "c1", "success": true, "data": {}}));
    }

    #[test]
    fn writer_loop_frames_each_message_in_order() {
        let (tx, rx) = mpsc::channel();
        let navigate = HostEvent::new(
            "navigate",
            json!({"url": "https://flowbridge.local/index.html"}),
        );
        tx.send(navigate.into()).expect("queue event");
        tx.send(ResponseEnvelope::failure(Some("c2".to_string()), "not bound", None).into())
            .expect("queue response");
        drop(tx);

        let mut out = Vec::new();
        writer_loop(&mut out, rx).expect("writer loop");

        let mut cursor = Cursor::new(out);
        let mut decoded = Vec::new();
        while let Ok(Frame::Payload(frame)) = read_frame(&mut cursor, HOST_TO_UI_CAP) {
            let message: OutboundMessage = serde_json::from_slice(&frame).expect("outbound json");
            decoded.push(message);
        }

        assert_eq!(decoded.len(), 2);
        match &decoded[0] {
            OutboundMessage::Event(event) => assert_eq!(event.event, "navigate"),
            other => panic!("expected event, got {other:?}"),
        }
        match &decoded[1] {
            OutboundMessage::Response(response) => {
                assert!(!response.success);
                assert_eq!(response.error.as_deref(), Some("not bound"));
            }
            other => panic!("expected response, got {other:?}"),
        }
    }

    #[test]
    fn message_types_round_trip_through_wire_names() {
        for message_type in [
            MessageType::GetState,
            MessageType::SetState,
            MessageType::InvokeCommand,
            MessageType::Log,
        ] {
            assert_eq!(MessageType::from_wire(message_type.as_wire()), Some(message_type));
        }
        assert_eq!(MessageType::from_wire("GetState"), None);
    }
}

use crate::binding::BoundViewModel;
use crate::protocol::{Inbound, InboundEnvelope, MessageType, ResponseEnvelope};
use crate::ui_log::forward_ui_log;
use serde::Deserialize;
use serde_json::{Map, Value, json};

/// What a successful `invokeCommand` carries back to the page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InvokeReply {
    Empty,
    #[default]
    Snapshot,
}

impl InvokeReply {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "empty" => Some(Self::Empty),
            "snapshot" => Some(Self::Snapshot),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct InvokePayload {
    command: String,
    #[serde(default)]
    param: Option<String>,
}

pub struct Dispatcher {
    binding: Option<Box<dyn BoundViewModel>>,
    invoke_reply: InvokeReply,
}

impl Dispatcher {
    pub fn new(invoke_reply: InvokeReply) -> Self {
        Self {
            binding: None,
            invoke_reply,
        }
    }

    pub fn bind(&mut self, binding: Box<dyn BoundViewModel>) {
        self.binding = Some(binding);
    }

    pub fn unbind(&mut self) -> Option<Box<dyn BoundViewModel>> {
        self.binding.take()
    }

    pub fn is_bound(&self) -> bool {
        self.binding.is_some()
    }

    /// Produces at most one response; exactly one whenever the inbound
    /// message carried a callback id.
    pub fn handle_inbound(&mut self, inbound: Inbound) -> Option<ResponseEnvelope> {
        match inbound {
            Inbound::Envelope(envelope) => self.handle(envelope),
            Inbound::Malformed {
                callback_id,
                reason,
            } => {
                tracing::warn!(callback_id = ?callback_id, %reason, "malformed inbound message");
                callback_id.map(|id| {
                    let error = format!("malformed envelope: {reason}");
                    ResponseEnvelope::failure(Some(id), error, None)
                })
            }
        }
    }

    pub fn handle(&mut self, envelope: InboundEnvelope) -> Option<ResponseEnvelope> {
        let InboundEnvelope {
            callback_id,
            message_type,
            payload,
        } = envelope;

        let result = match MessageType::from_wire(&message_type) {
            Some(MessageType::GetState) => self.get_state(),
            Some(MessageType::SetState) => self.set_state(&payload),
            Some(MessageType::InvokeCommand) => self.invoke_command(payload),
            Some(MessageType::Log) => {
                forward_ui_log(&payload);
                Ok(json!({}))
            }
            None => Err(Failure::plain(format!("unknown operation type: {message_type}"))),
        };

        let callback_id = callback_id?;
        Some(match result {
            Ok(data) => ResponseEnvelope::ok(Some(callback_id), data),
            Err(failure) => {
                tracing::debug!(
                    callback_id = %callback_id,
                    message_type = %message_type,
                    error = %failure.error,
                    "request failed"
                );
                ResponseEnvelope::failure(Some(callback_id), failure.error, failure.data)
            }
        })
    }

    fn bound(&mut self) -> Result<&mut Box<dyn BoundViewModel>, Failure> {
        self.binding
            .as_mut()
            .ok_or_else(|| Failure::plain("not bound"))
    }

    fn get_state(&mut self) -> Result<Value, Failure> {
        Ok(Value::Object(self.bound()?.snapshot()))
    }

    fn set_state(&mut self, payload: &Value) -> Result<Value, Failure> {
        let empty = Map::new();
        let fields = match payload {
            Value::Object(fields) => fields,
            Value::Null => &empty,
            _ => return Err(Failure::plain("setState payload must be an object")),
        };

        let report = self.bound()?.apply(fields);
        if report.is_clean() {
            return Ok(json!({}));
        }

        let details: Vec<String> = report
            .failures
            .iter()
            .map(|(_, err)| err.to_string())
            .collect();
        Err(Failure {
            error: format!("failed to set fields: {}", details.join("; ")),
            data: Some(json!({
                "applied": report.applied,
                "failedFields": report.failed_fields(),
            })),
        })
    }

    fn invoke_command(&mut self, payload: Value) -> Result<Value, Failure> {
        let request = serde_json::from_value::<InvokePayload>(payload)
            .map_err(|err| Failure::plain(format!("invalid invokeCommand payload: {err}")))?;

        let invoke_reply = self.invoke_reply;
        let binding = self.bound()?;
        binding
            .invoke(&request.command, request.param.as_deref())
            .map_err(|err| Failure::plain(err.to_string()))?;

        Ok(match invoke_reply {
            InvokeReply::Empty => json!({}),
            InvokeReply::Snapshot => Value::Object(binding.snapshot()),
        })
    }
}

struct Failure {
    error: String,
    data: Option<Value>,
}

impl Failure {
    fn plain(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            data: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::ViewModelBinding;
    use crate::invoker::{CommandInvoker, RelayCommand};
    use crate::projector::{FieldSpec, StateProjector};
    use crate::protocol::decode_inbound;

    struct Opening {
        width: f64,
        shape: String,
        confirmed: bool,
    }

    fn binding() -> Box<dyn BoundViewModel> {
        let projector = StateProjector::new()
            .field(FieldSpec::read_write(
                "Width",
                |vm: &Opening| vm.width,
                |vm: &mut Opening, value| vm.width = value,
            ))
            .field(FieldSpec::read_write(
                "Shape",
                |vm: &Opening| vm.shape.clone(),
                |vm: &mut Opening, value| vm.shape = value,
            ))
            .field(FieldSpec::read_only("IsConfirmed", |vm: &Opening| vm.confirmed));
        let commands = CommandInvoker::new()
            .register(
                "Confirm",
                RelayCommand::sync(|vm: &mut Opening, _| vm.confirmed = true),
            )
            .register(
                "Measure",
                RelayCommand::sync(|_: &mut Opening, _| panic!("index out of range")),
            );

        Box::new(ViewModelBinding::new(
            Opening {
                width: 900.0,
                shape: "rectangle".to_string(),
                confirmed: false,
            },
            projector,
            commands,
        ))
    }

    fn dispatcher(invoke_reply: InvokeReply) -> Dispatcher {
        let mut dispatcher = Dispatcher::new(invoke_reply);
        dispatcher.bind(binding());
        dispatcher
    }

    fn request(raw: &str) -> Inbound {
        decode_inbound(raw.as_bytes())
    }

    fn response(dispatcher: &mut Dispatcher, raw: &str) -> ResponseEnvelope {
        dispatcher
            .handle_inbound(request(raw))
            .expect("correlated request must be answered")
    }

    #[test]
    fn set_state_then_get_state_end_to_end() {
        let mut dispatcher = dispatcher(InvokeReply::Snapshot);

        let reply = response(
            &mut dispatcher,
            r#"{"callbackId":"c1","messageType":"setState","payload":{"width":1500,"shape":"circle"}}"#,
        );
        assert_eq!(
            serde_json::to_value(&reply).expect("encode"),
            json!({"callbackId": "c1", "success": true, "data": {}})
        );

        let state = response(&mut dispatcher, r#"{"callbackId":"c2","messageType":"getState"}"#);
        assert!(state.success);
        let data = state.data.expect("snapshot");
        assert_eq!(data["width"], json!(1500.0));
        assert_eq!(data["shape"], json!("circle"));
        assert_eq!(data["isConfirmed"], json!(false));
    }

    #[test]
    fn partial_set_state_applies_valid_fields() {
        let mut dispatcher = dispatcher(InvokeReply::Snapshot);

        let reply = response(
            &mut dispatcher,
            r#"{"callbackId":"c3","messageType":"setState","payload":{"width":1200,"depth":5}}"#,
        );
        assert!(!reply.success);
        assert!(reply.error.as_deref().unwrap_or_default().contains("depth"));
        let data = reply.data.expect("failure detail");
        assert_eq!(data["failedFields"], json!(["depth"]));
        assert_eq!(data["applied"], json!(["width"]));

        let state = response(&mut dispatcher, r#"{"callbackId":"c4","messageType":"getState"}"#);
        assert_eq!(state.data.expect("snapshot")["width"], json!(1200.0));
    }

    #[test]
    fn get_set_get_round_trip_keeps_state() {
        let mut dispatcher = dispatcher(InvokeReply::Snapshot);
        let before = response(&mut dispatcher, r#"{"callbackId":"a","messageType":"getState"}"#)
            .data
            .expect("snapshot");

        let set = InboundEnvelope {
            callback_id: Some("b".to_string()),
            message_type: "setState".to_string(),
            payload: before.clone(),
        };
        let reply = dispatcher.handle(set).expect("answered");
        assert!(!reply.success);
        assert_eq!(reply.data.expect("failure detail")["failedFields"], json!(["isConfirmed"]));

        let after = response(&mut dispatcher, r#"{"callbackId":"c","messageType":"getState"}"#)
            .data
            .expect("snapshot");
        assert_eq!(before, after);
    }

    #[test]
    fn panicking_command_still_gets_a_failure_reply() {
        let mut dispatcher = dispatcher(InvokeReply::Snapshot);

        let reply = response(
            &mut dispatcher,
            r#"{"callbackId":"p1","messageType":"invokeCommand","payload":{"command":"Measure"}}"#,
        );
        assert!(!reply.success);
        assert_eq!(reply.callback_id.as_deref(), Some("p1"));
        assert_eq!(
            reply.error.as_deref(),
            Some("command Measure failed: handler panicked: index out of range")
        );

        let state = response(&mut dispatcher, r#"{"callbackId":"p2","messageType":"getState"}"#);
        assert!(state.success);
    }

    #[test]
    fn unknown_command_fails_without_changing_state() {
        let mut dispatcher = dispatcher(InvokeReply::Snapshot);

        let reply = response(
            &mut dispatcher,
            r#"{"callbackId":"c5","messageType":"invokeCommand","payload":{"command":"Explode"}}"#,
        );
        assert!(!reply.success);
        assert_eq!(reply.error.as_deref(), Some("unknown command: Explode"));

        let state = response(&mut dispatcher, r#"{"callbackId":"c6","messageType":"getState"}"#);
        assert_eq!(state.data.expect("snapshot")["isConfirmed"], json!(false));
    }

    #[test]
    fn invoke_reply_variant_controls_data() {
        let mut snapshot = dispatcher(InvokeReply::Snapshot);
        let reply = response(
            &mut snapshot,
            r#"{"callbackId":"c7","messageType":"invokeCommand","payload":{"command":"Confirm","param":null}}"#,
        );
        assert!(reply.success);
        assert_eq!(reply.data.expect("snapshot")["isConfirmed"], json!(true));

        let mut empty = dispatcher(InvokeReply::Empty);
        let reply = response(
            &mut empty,
            r#"{"callbackId":"c8","messageType":"invokeCommand","payload":{"command":"Confirm"}}"#,
        );
        assert_eq!(reply.data, Some(json!({})));
    }

    #[test]
    fn uncorrelated_messages_get_no_response() {
        let mut dispatcher = dispatcher(InvokeReply::Snapshot);

        assert_eq!(
            dispatcher.handle_inbound(request(
                r#"{"messageType":"log","payload":{"level":"warn","message":"hi"}}"#
            )),
            None
        );
        assert_eq!(
            dispatcher.handle_inbound(request(
                r#"{"messageType":"setState","payload":{"width":1}}"#
            )),
            None
        );
        assert_eq!(dispatcher.handle_inbound(request("{broken")), None);

        let state = response(&mut dispatcher, r#"{"callbackId":"c9","messageType":"getState"}"#);
        assert_eq!(state.data.expect("snapshot")["width"], json!(1.0));
    }

    #[test]
    fn correlated_log_is_acknowledged_once() {
        let mut dispatcher = dispatcher(InvokeReply::Snapshot);
        let reply = response(
            &mut dispatcher,
            r#"{"callbackId":"l1","messageType":"log","payload":{"level":"info","message":"ready"}}"#,
        );
        assert!(reply.success);
        assert_eq!(reply.callback_id.as_deref(), Some("l1"));
    }

    #[test]
    fn unknown_type_and_unbound_state_are_reported() {
        let mut dispatcher = dispatcher(InvokeReply::Snapshot);
        let reply = response(&mut dispatcher, r#"{"callbackId":"u1","messageType":"teleport"}"#);
        assert_eq!(reply.error.as_deref(), Some("unknown operation type: teleport"));

        let mut unbound = Dispatcher::new(InvokeReply::Snapshot);
        let reply = response(&mut unbound, r#"{"callbackId":"u2","messageType":"getState"}"#);
        assert!(!reply.success);
        assert_eq!(reply.error.as_deref(), Some("not bound"));
        assert_eq!(reply.callback_id.as_deref(), Some("u2"));
    }

    #[test]
    fn malformed_envelope_with_callback_id_is_answered() {
        let mut dispatcher = dispatcher(InvokeReply::Snapshot);
        let reply = response(&mut dispatcher, r#"{"callbackId":"m1","payload":{}}"#);
        assert!(!reply.success);
        assert!(
            reply
                .error
                .as_deref()
                .unwrap_or_default()
                .starts_with("malformed envelope")
        );
    }
}

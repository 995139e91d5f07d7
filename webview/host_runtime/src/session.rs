use crate::close::CloseWatch;
use crate::dispatcher::Dispatcher;
use crate::protocol::{HostEvent, Inbound, UI_TO_HOST_CAP, reader_loop};
use crate::transport::OutboundSender;
use serde_json::json;
use std::io::{self, Read};
use std::ops::ControlFlow;

pub const CLOSE_EVENT: &str = "close";

/// UI context: drains the inbound side of the bridge and answers each
/// message through the dispatcher. Never waits on the host thread.
pub struct Session {
    dispatcher: Dispatcher,
    outbound: OutboundSender,
    close: Option<CloseWatch>,
}

impl Session {
    pub fn new(
        dispatcher: Dispatcher,
        outbound: OutboundSender,
        close: Option<CloseWatch>,
    ) -> Self {
        Self {
            dispatcher,
            outbound,
            close,
        }
    }

    pub fn on_inbound(&mut self, inbound: Inbound) -> ControlFlow<()> {
        if let Some(response) = self.dispatcher.handle_inbound(inbound) {
            if let Err(err) = self.outbound.send(response) {
                tracing::warn!(error = %err, "dropping response; ending session");
                return ControlFlow::Break(());
            }
        }

        if self.close.as_ref().is_some_and(CloseWatch::is_requested) {
            tracing::info!("panel requested close");
            if let Err(err) = self.outbound.send(HostEvent::new(CLOSE_EVENT, json!({}))) {
                tracing::warn!(error = %err, "failed to announce close");
            }
            return ControlFlow::Break(());
        }

        ControlFlow::Continue(())
    }

    /// Runs until the reader hits EOF or the panel asks to close, then
    /// releases the view-model so the host loop can wind down.
    pub fn serve<R: Read>(mut self, reader: R) -> io::Result<()> {
        let result = reader_loop(reader, UI_TO_HOST_CAP, |inbound| self.on_inbound(inbound));
        self.dispatcher.unbind();
        self.close = None;
        tracing::debug!("bridge session finished");
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::ViewModelBinding;
    use crate::close::{CloseRequest, close_channel};
    use crate::dispatcher::InvokeReply;
    use crate::invoker::{CommandInvoker, RelayCommand};
    use crate::projector::{FieldSpec, StateProjector};
    use crate::protocol::{OutboundMessage, encode_frame};
    use crate::transport::outbound_channel;
    use std::io::Cursor;

    struct Panel {
        count: i32,
        close: CloseRequest,
    }

    fn session(
        close: CloseRequest,
        watch: CloseWatch,
    ) -> (Session, std::sync::mpsc::Receiver<OutboundMessage>) {
        let binding = ViewModelBinding::new(
            Panel { count: 0, close },
            StateProjector::new().field(FieldSpec::read_write(
                "Count",
                |vm: &Panel| vm.count,
                |vm: &mut Panel, value| vm.count = value,
            )),
            CommandInvoker::new().register(
                "Done",
                RelayCommand::sync(|vm: &mut Panel, _| {
                    vm.close.request();
                }),
            ),
        );
        let mut dispatcher = Dispatcher::new(InvokeReply::Empty);
        dispatcher.bind(Box::new(binding));

        let (outbound, rx) = outbound_channel(16);
        (Session::new(dispatcher, outbound, Some(watch)), rx)
    }

    fn frames(messages: &[&str]) -> Cursor<Vec<u8>> {
        let mut data = Vec::new();
        for message in messages {
            data.extend(encode_frame(message.as_bytes()).expect("frame"));
        }
        Cursor::new(data)
    }

    fn responses(rx: &std::sync::mpsc::Receiver<OutboundMessage>) -> Vec<OutboundMessage> {
        rx.try_iter().collect()
    }

    #[test]
    fn answers_each_correlated_message_in_order() {
        let (close, watch) = close_channel();
        let (session, rx) = session(close, watch);

        session
            .serve(frames(&[
                r#"{"callbackId":"a","messageType":"setState","payload":{"count":3}}"#,
                r#"{"messageType":"log","payload":{"message":"no reply"}}"#,
                r#"{"callbackId":"b","messageType":"getState"}"#,
            ]))
            .expect("serve");

        let out = responses(&rx);
        assert_eq!(out.len(), 2);
        match (&out[0], &out[1]) {
            (OutboundMessage::Response(first), OutboundMessage::Response(second)) => {
                assert_eq!(first.callback_id.as_deref(), Some("a"));
                assert_eq!(second.callback_id.as_deref(), Some("b"));
                assert_eq!(second.data, Some(json!({"count": 3})));
            }
            other => panic!("expected two responses, got {other:?}"),
        }
    }

    #[test]
    fn close_request_ends_session_after_reply() {
        let (close, watch) = close_channel();
        let (session, rx) = session(close, watch);

        session
            .serve(frames(&[
                r#"{"callbackId":"x","messageType":"invokeCommand","payload":{"command":"Done"}}"#,
                r#"{"callbackId":"never","messageType":"getState"}"#,
            ]))
            .expect("serve");

        let out = responses(&rx);
        assert_eq!(out.len(), 2);
        match &out[0] {
            OutboundMessage::Response(response) => {
                assert!(response.success);
                assert_eq!(response.callback_id.as_deref(), Some("x"));
            }
            other => panic!("expected response, got {other:?}"),
        }
        match &out[1] {
            OutboundMessage::Event(event) => assert_eq!(event.event, CLOSE_EVENT),
            other => panic!("expected close event, got {other:?}"),
        }
    }

    #[test]
    fn session_stops_when_writer_is_gone() {
        let (close, watch) = close_channel();
        let (mut session, rx) = session(close, watch);
        drop(rx);

        let flow = session.on_inbound(Inbound::Malformed {
            callback_id: Some("m".to_string()),
            reason: "bad".to_string(),
        });
        assert!(flow.is_break());
    }
}

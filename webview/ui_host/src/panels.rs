use crate::document::ModelDocument;
use crate::model_host::{AutoPicker, ModelHost};
use crate::operations::curve_array::CurveArrayHandler;
use crate::operations::wall_opening::WallOpeningHandler;
use crate::view_models::curve_array::CurveArrayViewModel;
use crate::view_models::settings::SettingsViewModel;
use crate::view_models::wall_opening::WallOpeningViewModel;
use flowbridge_host_runtime::{
    ExternalRequest, HostBindings, HostConfig, HostContext, HostEvent, Panel, RuntimeError,
    close_channel,
};
use serde_json::json;

pub const FAMILY_LIST_EVENT: &str = "familyListReceived";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelKind {
    WallOpening,
    CurveArray,
    Settings,
}

impl PanelKind {
    pub fn parse(name: &str) -> Result<Self, RuntimeError> {
        match name.trim() {
            "wall-opening" => Ok(Self::WallOpening),
            "curve-array" => Ok(Self::CurveArray),
            "settings" => Ok(Self::Settings),
            other => Err(RuntimeError::UnknownPanel(other.to_string())),
        }
    }
}

/// Panels served against the in-process model document.
pub struct FlowPanels;

impl HostBindings for FlowPanels {
    type App = ModelHost;

    fn new_app(_config: &HostConfig) -> Result<ModelHost, RuntimeError> {
        let document =
            ModelDocument::sample().map_err(|err| RuntimeError::Startup(err.to_string()))?;
        tracing::info!(document = %document.title(), "opened model document");
        Ok(ModelHost::new(Some(document), Box::new(AutoPicker::default())))
    }

    fn open_panel(
        config: &HostConfig,
        app: &ModelHost,
        host: &HostContext<ModelHost>,
    ) -> Result<Panel, RuntimeError> {
        match PanelKind::parse(&config.panel)? {
            PanelKind::WallOpening => {
                let request = ExternalRequest::new(host.clone(), WallOpeningHandler);
                let reports = request.subscribe();
                let (close, watch) = close_channel();
                let binding = WallOpeningViewModel::new(request, close).into_binding();

                Ok(Panel::new("Wall Opening", "index.html?page=wall-opening", Box::new(binding))
                    .with_close(watch)
                    .with_reports(reports))
            }
            PanelKind::CurveArray => {
                let family_types = app
                    .active_document()
                    .map(ModelDocument::family_types)
                    .unwrap_or_default();
                let request = ExternalRequest::new(host.clone(), CurveArrayHandler);
                let reports = request.subscribe();
                let binding = CurveArrayViewModel::new(request, &family_types).into_binding();

                Ok(Panel::new("Curve Array", "index.html?page=curve-array", Box::new(binding))
                    .with_event(HostEvent::new(FAMILY_LIST_EVENT, json!(family_types)))
                    .with_reports(reports))
            }
            PanelKind::Settings => {
                let binding = SettingsViewModel::new(config.settings_path.clone()).into_binding();
                Ok(Panel::new("Settings", "setting.html", Box::new(binding)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowbridge_host_runtime::protocol::encode_frame;
    use flowbridge_host_runtime::{
        OPERATION_COMPLETED_EVENT, OutboundMessage, config, host_context, run_with_io,
    };
    use std::fs;
    use std::io::Cursor;
    use std::path::Path;

    fn config_for(panel: &str, web_root: &Path) -> HostConfig {
        let panel = panel.to_string();
        let root = web_root.display().to_string();
        HostConfig::from_lookup(move |key| match key {
            config::ENV_PANEL => Some(panel.clone()),
            config::ENV_WEB_ROOT => Some(root.clone()),
            _ => None,
        })
    }

    fn open(panel: &str) -> Result<Panel, RuntimeError> {
        let config = config_for(panel, Path::new("Web"));
        let app = FlowPanels::new_app(&config)?;
        let (host, _host_loop) = host_context::<ModelHost>();
        FlowPanels::open_panel(&config, &app, &host)
    }

    #[test]
    fn panel_names_parse() {
        assert_eq!(PanelKind::parse("wall-opening").expect("panel"), PanelKind::WallOpening);
        assert_eq!(PanelKind::parse(" settings ").expect("panel"), PanelKind::Settings);
        match PanelKind::parse("roof") {
            Err(RuntimeError::UnknownPanel(name)) => assert_eq!(name, "roof"),
            other => panic!("expected unknown panel, got {other:?}"),
        }
    }

    #[test]
    fn wall_opening_panel_watches_for_close() {
        let panel = open("wall-opening").expect("panel");
        assert_eq!(panel.title, "Wall Opening");
        assert_eq!(panel.page, "index.html?page=wall-opening");
        assert!(panel.close.is_some());
        assert_eq!(panel.reports.len(), 1);
        assert_eq!(panel.binding.snapshot()["shape"], json!("rectangle"));
    }

    #[test]
    fn curve_array_panel_announces_family_types() {
        let panel = open("curve-array").expect("panel");
        assert_eq!(panel.startup_events.len(), 1);
        let event = &panel.startup_events[0];
        assert_eq!(event.event, FAMILY_LIST_EVENT);
        assert_eq!(
            event.data,
            json!(["Bollard : 600mm", "Bollard : 900mm", "Planter : Round"])
        );
        assert_eq!(panel.binding.snapshot()["selectedFamilyName"], json!("Bollard : 600mm"));
    }

    #[test]
    fn settings_panel_uses_standalone_page() {
        let panel = open("settings").expect("panel");
        assert_eq!(panel.page, "setting.html");
        assert!(panel.close.is_none());
        assert!(panel.reports.is_empty());
    }

    #[test]
    fn unknown_panel_fails_to_open() {
        assert!(matches!(open("roof"), Err(RuntimeError::UnknownPanel(_))));
    }

    #[test]
    fn wall_opening_session_cuts_opening_on_host() {
        let dir = tempfile::tempdir().expect("temp dir");
        let web_root = dir.path().join("Web");
        fs::create_dir(&web_root).expect("web root");
        fs::write(web_root.join("index.html"), "<html></html>").expect("write index");
        let out_path = dir.path().join("bridge.out");
        let out = fs::File::create(&out_path).expect("output file");

        let mut input = Vec::new();
        for message in [
            r#"{"callbackId":"c1","messageType":"setState","payload":{"width":1200}}"#,
            r#"{"callbackId":"c2","messageType":"invokeCommand","payload":{"command":"CreateOpening"}}"#,
        ] {
            input.extend(encode_frame(message.as_bytes()).expect("frame"));
        }

        run_with_io::<FlowPanels, _, _>(
            config_for("wall-opening", &web_root),
            Cursor::new(input),
            out,
        )
        .expect("run");

        let bytes = fs::read(&out_path).expect("read output");
        let mut messages = Vec::new();
        let mut rest = bytes.as_slice();
        while rest.len() >= 4 {
            let len = u32::from_be_bytes([rest[0], rest[1], rest[2], rest[3]]) as usize;
            let message = serde_json::from_slice::<OutboundMessage>(&rest[4..4 + len])
                .expect("outbound json");
            messages.push(message);
            rest = &rest[4 + len..];
        }

        let completed = messages.iter().any(|message| match message {
            OutboundMessage::Event(event) => {
                event.event == OPERATION_COMPLETED_EVENT
                    && event.data == json!({"operation": "wallOpening", "status": "completed"})
            }
            OutboundMessage::Response(_) => false,
        });
        assert!(completed, "no completion event in {messages:?}");

        let confirmed = messages.iter().any(|message| match message {
            OutboundMessage::Response(response) => {
                response.callback_id.as_deref() == Some("c2")
                    && response
                        .data
                        .as_ref()
                        .is_some_and(|data| data["isConfirmed"] == json!(true))
            }
            OutboundMessage::Event(_) => false,
        });
        assert!(confirmed);
    }
}

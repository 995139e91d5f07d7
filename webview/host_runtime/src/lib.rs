pub mod assets;
pub mod binding;
pub mod bootstrap;
pub mod close;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod external;
pub mod host;
pub mod invoker;
pub mod naming;
pub mod projector;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod ui_log;

use crate::bootstrap::{BridgeVariant, bootstrap_script};
use crate::protocol::writer_loop;
use serde_json::json;
use std::io::{self, Read, Write};
use std::sync::mpsc::Receiver;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

pub use crate::binding::{BoundViewModel, ViewModelBinding};
pub use crate::close::{CloseRequest, CloseWatch, close_channel};
pub use crate::config::HostConfig;
pub use crate::dispatcher::{Dispatcher, InvokeReply};
pub use crate::error::{HandlerError, HostError, RuntimeError};
pub use crate::external::{
    ExecutionOutcome, ExecutionReport, ExternalHandler, ExternalRequest, HostContext, HostLoop,
    host_context,
};
pub use crate::host::{Document, HostApplication, Notice, NoticeLevel, Transaction};
pub use crate::invoker::{Command, CommandInvoker, Completion, CompletionHandle, RelayCommand};
pub use crate::projector::{FieldSpec, StateProjector};
pub use crate::protocol::{HostEvent, OutboundMessage};
pub use crate::session::Session;
pub use crate::transport::{OutboundSender, outbound_channel};
pub use serde_json;

pub const NAVIGATE_EVENT: &str = "navigate";
pub const LOAD_FAILED_EVENT: &str = "loadFailed";
pub const OPERATION_COMPLETED_EVENT: &str = "operationCompleted";

const WRITER_SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Application-specific half of the runtime: how to build the host
/// application and which panel to show.
pub trait HostBindings {
    type App: HostApplication;

    fn new_app(config: &HostConfig) -> Result<Self::App, RuntimeError>;

    /// Builds the panel's view-model. External requests created here
    /// must be wired to `host` so they run on the host loop.
    fn open_panel(
        config: &HostConfig,
        app: &Self::App,
        host: &HostContext<Self::App>,
    ) -> Result<Panel, RuntimeError>;
}

/// Everything the runtime needs to show one panel.
pub struct Panel {
    pub title: String,
    pub page: String,
    pub binding: Box<dyn BoundViewModel>,
    pub close: Option<CloseWatch>,
    pub startup_events: Vec<HostEvent>,
    pub reports: Vec<Receiver<ExecutionReport>>,
}

impl Panel {
    pub fn new(
        title: impl Into<String>,
        page: impl Into<String>,
        binding: Box<dyn BoundViewModel>,
    ) -> Self {
        Self {
            title: title.into(),
            page: page.into(),
            binding,
            close: None,
            startup_events: Vec::new(),
            reports: Vec::new(),
        }
    }

    pub fn with_close(mut self, close: CloseWatch) -> Self {
        self.close = Some(close);
        self
    }

    pub fn with_event(mut self, event: HostEvent) -> Self {
        self.startup_events.push(event);
        self
    }

    pub fn with_reports(mut self, reports: Receiver<ExecutionReport>) -> Self {
        self.reports.push(reports);
        self
    }
}

pub fn run<B: HostBindings>(config: HostConfig) -> Result<(), RuntimeError> {
    run_with_io::<B, _, _>(config, io::stdin(), io::stdout())
}

/// Same as [`run`] over an arbitrary framed duplex. The host loop runs on
/// the calling thread until the session ends and every scheduled host
/// call has drained.
pub fn run_with_io<B, R, W>(config: HostConfig, reader: R, writer: W) -> Result<(), RuntimeError>
where
    B: HostBindings,
    R: Read + Send + 'static,
    W: Write + Send + 'static,
{
    let mut app = B::new_app(&config)?;
    let (host, host_loop) = host_context::<B::App>();
    let panel = B::open_panel(&config, &app, &host)?;
    // Only the panel's requests may keep the host loop alive.
    drop(host);

    let (outbound, rx) = outbound_channel(config.outbound_queue_cap);
    let writer_handle = thread::spawn(move || writer_loop(writer, rx));

    let Panel {
        title,
        page,
        binding,
        close,
        startup_events,
        reports,
    } = panel;

    let target = match config.asset_origin().navigation_target(&page) {
        Ok(target) => target,
        Err(err) => {
            tracing::error!(page = %page, error = %err, "panel page failed to load");
            let _ = outbound.send(HostEvent::new(
                LOAD_FAILED_EVENT,
                json!({"page": page, "error": err.to_string()}),
            ));
            drop(outbound);
            drop(binding);
            join_worker("writer", writer_handle, WRITER_SHUTDOWN_GRACE);
            return Err(err.into());
        }
    };

    tracing::info!(panel = %config.panel, url = %target.url, "opening panel");
    send_or_log(
        &outbound,
        HostEvent::new(
            NAVIGATE_EVENT,
            json!({
                "url": target.url,
                "title": title,
                "bootstrapScript": bootstrap_script(BridgeVariant::Promise),
            }),
        ),
    );
    for event in startup_events {
        send_or_log(&outbound, event);
    }

    let forwarders: Vec<_> = reports
        .into_iter()
        .map(|reports| {
            let outbound = outbound.clone();
            thread::spawn(move || forward_reports(reports, outbound))
        })
        .collect();

    let mut dispatcher = Dispatcher::new(config.invoke_reply);
    dispatcher.bind(binding);
    let session = Session::new(dispatcher, outbound, close);
    let session_handle = thread::spawn(move || session.serve(reader));

    let executed = host_loop.run(&mut app);
    tracing::debug!(executed, "host loop drained");

    match session_handle.join() {
        Ok(Ok(())) => {}
        Ok(Err(err)) => tracing::warn!(error = %err, "session ended with error"),
        Err(err) => tracing::error!(error = ?err, "session thread join failed"),
    }
    for forwarder in forwarders {
        if let Err(err) = forwarder.join() {
            tracing::error!(error = ?err, "report forwarder join failed");
        }
    }
    join_worker("writer", writer_handle, WRITER_SHUTDOWN_GRACE);

    Ok(())
}

fn send_or_log(outbound: &OutboundSender, event: HostEvent) {
    let name = event.event.clone();
    if let Err(err) = outbound.send(event) {
        tracing::warn!(event = %name, error = %err, "failed to queue host event");
    }
}

fn forward_reports(reports: Receiver<ExecutionReport>, outbound: OutboundSender) {
    for report in reports {
        if outbound.send(report_event(&report)).is_err() {
            break;
        }
    }
}

pub fn report_event(report: &ExecutionReport) -> HostEvent {
    let data = match &report.outcome {
        ExecutionOutcome::Completed => json!({"operation": report.request, "status": "completed"}),
        ExecutionOutcome::Cancelled => json!({"operation": report.request, "status": "cancelled"}),
        ExecutionOutcome::Failed(reason) => {
            json!({"operation": report.request, "status": "failed", "error": reason})
        }
    };
    HostEvent::new(OPERATION_COMPLETED_EVENT, data)
}

/// Joins `handle` only once it has finished, waiting at most `grace`.
fn join_worker(name: &str, handle: JoinHandle<io::Result<()>>, grace: Duration) {
    let deadline = Instant::now() + grace;
    while !handle.is_finished() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }

    if handle.is_finished() {
        match handle.join() {
            Ok(Ok(())) => {}
            Ok(Err(err)) => tracing::warn!(thread = name, error = %err, "thread returned error"),
            Err(err) => tracing::error!(thread = name, error = ?err, "thread join failed"),
        }
    } else {
        // A blocked stdio write must not hang process exit.
        tracing::warn!(thread = name, "thread still active during shutdown; skipping join");
    }
}

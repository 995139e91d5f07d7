mod document;
mod model_host;
mod operations;
mod panels;
mod view_models;

use flowbridge_host_runtime::HostConfig;
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    init_tracing();

    let mut config = HostConfig::from_env();
    if let Some(panel) = std::env::args().nth(1) {
        config.panel = panel;
    }

    tracing::info!(
        panel = %config.panel,
        web_root = %config.web_root.display(),
        "ui_host starting"
    );
    if let Err(err) = flowbridge_host_runtime::run::<panels::FlowPanels>(config) {
        tracing::error!(error = %err, "ui_host fatal error");
        process::exit(1);
    }
}

// Stdout carries the bridge frames, so logs go to stderr.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiLogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl UiLogLevel {
    /// Case-insensitive; anything unrecognised is treated as info.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::to_ascii_lowercase).as_deref() {
            Some("debug") => Self::Debug,
            Some("warn") | Some("warning") => Self::Warn,
            Some("error") => Self::Error,
            _ => Self::Info,
        }
    }
}

/// Re-emits a page log entry under the `ui` target.
pub fn forward_ui_log(payload: &Value) -> UiLogLevel {
    let level = UiLogLevel::parse(payload.get("level").and_then(Value::as_str));
    let message = match payload.get("message") {
        Some(Value::String(message)) => message.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };

    match level {
        UiLogLevel::Debug => tracing::debug!(target: "ui", "{message}"),
        UiLogLevel::Info => tracing::info!(target: "ui", "{message}"),
        UiLogLevel::Warn => tracing::warn!(target: "ui", "{message}"),
        UiLogLevel::Error => tracing::error!(target: "ui", "{message}"),
    }

    level
}

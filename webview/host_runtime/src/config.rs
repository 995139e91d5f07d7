use crate::assets::{AssetOrigin, DEFAULT_VIRTUAL_HOST};
use crate::dispatcher::InvokeReply;
use crate::transport::DEFAULT_OUTBOUND_QUEUE_CAP;
use std::path::PathBuf;

pub const DEFAULT_PANEL: &str = "wall-opening";

pub const ENV_PANEL: &str = "FLOWBRIDGE_PANEL";
pub const ENV_WEB_ROOT: &str = "FLOWBRIDGE_WEB_ROOT";
pub const ENV_VIRTUAL_HOST: &str = "FLOWBRIDGE_VIRTUAL_HOST";
pub const ENV_OUTBOUND_QUEUE_CAP: &str = "FLOWBRIDGE_OUTBOUND_QUEUE_CAP";
pub const ENV_INVOKE_REPLY: &str = "FLOWBRIDGE_INVOKE_REPLY";
pub const ENV_SETTINGS_PATH: &str = "FLOWBRIDGE_SETTINGS_PATH";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    pub panel: String,
    pub web_root: PathBuf,
    pub virtual_host: String,
    pub outbound_queue_cap: usize,
    pub invoke_reply: InvokeReply,
    pub settings_path: Option<PathBuf>,
}

impl HostConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. Values that fail to parse
    /// fall back to their defaults with a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let outbound_queue_cap = match non_empty(ENV_OUTBOUND_QUEUE_CAP) {
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(value) if value > 0 => value,
                _ => {
                    tracing::warn!(
                        key = ENV_OUTBOUND_QUEUE_CAP,
                        value = %raw,
                        default = DEFAULT_OUTBOUND_QUEUE_CAP,
                        "invalid queue capacity; using default"
                    );
                    DEFAULT_OUTBOUND_QUEUE_CAP
                }
            },
            None => DEFAULT_OUTBOUND_QUEUE_CAP,
        };

        let invoke_reply = match non_empty(ENV_INVOKE_REPLY) {
            Some(raw) => InvokeReply::parse(&raw).unwrap_or_else(|| {
                tracing::warn!(
                    key = ENV_INVOKE_REPLY,
                    value = %raw,
                    "invalid invoke reply; using snapshot"
                );
                InvokeReply::default()
            }),
            None => InvokeReply::default(),
        };

        Self {
            panel: non_empty(ENV_PANEL).unwrap_or_else(|| DEFAULT_PANEL.to_string()),
            web_root: non_empty(ENV_WEB_ROOT)
                .map(PathBuf::from)
                .unwrap_or_else(default_web_root),
            virtual_host: non_empty(ENV_VIRTUAL_HOST)
                .unwrap_or_else(|| DEFAULT_VIRTUAL_HOST.to_string()),
            outbound_queue_cap,
            invoke_reply,
            settings_path: non_empty(ENV_SETTINGS_PATH).map(PathBuf::from),
        }
    }

    pub fn asset_origin(&self) -> AssetOrigin {
        AssetOrigin::new(self.virtual_host.clone(), self.web_root.clone())
    }
}

fn default_web_root() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("Web")))
        .unwrap_or_else(|| PathBuf::from("Web"))
}

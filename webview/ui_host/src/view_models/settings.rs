use flowbridge_host_runtime::{
    CommandInvoker, Completion, FieldSpec, RelayCommand, StateProjector, ViewModelBinding,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;

/// On-disk form of the settings panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedSettings {
    pub server_url: String,
    pub auto_connect: bool,
}

pub struct SettingsViewModel {
    pub server_url: String,
    pub auto_connect: bool,
    pub message: String,
    pub message_type: String,
    pub has_errors: bool,
    save_path: Option<PathBuf>,
}

impl SettingsViewModel {
    /// Starts from the saved file when one is readable.
    pub fn new(save_path: Option<PathBuf>) -> Self {
        let saved = save_path.as_deref().and_then(load_settings);
        let (server_url, auto_connect) = match saved {
            Some(saved) => (saved.server_url, saved.auto_connect),
            None => ("http://localhost:8080".to_string(), true),
        };

        Self {
            server_url,
            auto_connect,
            message: String::new(),
            message_type: String::new(),
            has_errors: false,
            save_path,
        }
    }

    fn validate(&mut self) -> bool {
        let url = self.server_url.trim();
        self.has_errors = !(url.starts_with("http://") || url.starts_with("https://"));
        if self.has_errors {
            self.message = "Server URL must start with http:// or https://".to_string();
            self.message_type = "error".to_string();
        }
        !self.has_errors
    }

    fn save(&mut self) -> Result<Completion, String> {
        if !self.validate() {
            return Ok(Completion::Done);
        }

        tracing::info!(
            server_url = %self.server_url,
            auto_connect = self.auto_connect,
            "saving settings"
        );
        self.message = "Settings saved".to_string();
        self.message_type = "success".to_string();

        let Some(path) = self.save_path.clone() else {
            return Ok(Completion::Done);
        };
        let settings = SavedSettings {
            server_url: self.server_url.trim().to_string(),
            auto_connect: self.auto_connect,
        };

        let (handle, completion) = Completion::pending();
        thread::spawn(move || match write_settings(&path, &settings) {
            Ok(()) => handle.succeed(),
            Err(err) => {
                tracing::error!(path = %path.display(), error = %err, "failed to write settings");
                handle.fail(format!("failed to write {}: {err}", path.display()));
            }
        });
        Ok(completion)
    }

    pub fn into_binding(self) -> ViewModelBinding<Self> {
        let projector = StateProjector::new()
            .field(FieldSpec::read_write(
                "ServerUrl",
                |vm: &Self| vm.server_url.clone(),
                |vm: &mut Self, value| vm.server_url = value,
            ))
            .field(FieldSpec::read_write(
                "AutoConnect",
                |vm: &Self| vm.auto_connect,
                |vm: &mut Self, value| vm.auto_connect = value,
            ))
            .field(FieldSpec::read_write(
                "Message",
                |vm: &Self| vm.message.clone(),
                |vm: &mut Self, value| vm.message = value,
            ))
            .field(FieldSpec::read_write(
                "MessageType",
                |vm: &Self| vm.message_type.clone(),
                |vm: &mut Self, value| vm.message_type = value,
            ))
            .field(FieldSpec::read_only("HasErrors", |vm: &Self| vm.has_errors))
            .exclude("HasErrors");

        let commands = CommandInvoker::new()
            .register("Save", RelayCommand::new(|vm: &mut Self, _| vm.save()));

        ViewModelBinding::new(self, projector, commands)
    }
}

fn load_settings(path: &Path) -> Option<SavedSettings> {
    let raw = fs::read(path).ok()?;
    match serde_json::from_slice(&raw) {
        Ok(settings) => Some(settings),
        Err(err) => {
            tracing::warn!(
                path = %path.display(),
                error = %err,
                "ignoring unreadable settings file"
            );
            None
        }
    }
}

fn write_settings(path: &Path, settings: &SavedSettings) -> std::io::Result<()> {
    let parent = path.parent().filter(|dir| !dir.as_os_str().is_empty());
    if let Some(parent) = parent {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_vec_pretty(settings).map_err(std::io::Error::other)?;
    fs::write(path, json)
}

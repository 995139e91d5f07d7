use crate::error::CommandError;
use crate::external::panic_message;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, SyncSender};

pub const COMMAND_SUFFIX: &str = "Command";

/// What a command hands back after it starts. `Pending` commands finish
/// on another thread and report through the paired [`CompletionHandle`].
#[derive(Debug)]
pub enum Completion {
    Done,
    Pending(Receiver<Result<(), String>>),
}

impl Completion {
    pub fn pending() -> (CompletionHandle, Completion) {
        let (tx, rx) = mpsc::sync_channel(1);
        (CompletionHandle { tx }, Completion::Pending(rx))
    }
}

#[derive(Debug)]
pub struct CompletionHandle {
    tx: SyncSender<Result<(), String>>,
}

impl CompletionHandle {
    pub fn succeed(self) {
        let _ = self.tx.send(Ok(()));
    }

    pub fn fail(self, reason: impl Into<String>) {
        let _ = self.tx.send(Err(reason.into()));
    }
}

pub trait Command<VM>: Send + Sync {
    fn can_execute(&self, _vm: &VM, _param: Option<&str>) -> bool {
        true
    }

    fn execute(&self, vm: &mut VM, param: Option<&str>) -> Result<Completion, String>;
}

type ExecuteFn<VM> = Box<dyn Fn(&mut VM, Option<&str>) -> Result<Completion, String> + Send + Sync>;
type CanExecuteFn<VM> = Box<dyn Fn(&VM, Option<&str>) -> bool + Send + Sync>;

/// Closure-backed command.
pub struct RelayCommand<VM> {
    execute: ExecuteFn<VM>,
    can_execute: Option<CanExecuteFn<VM>>,
}

impl<VM> RelayCommand<VM> {
    pub fn new<F>(execute: F) -> Self
    where
        F: Fn(&mut VM, Option<&str>) -> Result<Completion, String> + Send + Sync + 'static,
    {
        Self {
            execute: Box::new(execute),
            can_execute: None,
        }
    }

    pub fn sync<F>(execute: F) -> Self
    where
        F: Fn(&mut VM, Option<&str>) + Send + Sync + 'static,
    {
        Self::new(move |vm, param| {
            execute(vm, param);
            Ok(Completion::Done)
        })
    }

    pub fn with_can_execute<F>(mut self, can_execute: F) -> Self
    where
        F: Fn(&VM, Option<&str>) -> bool + Send + Sync + 'static,
    {
        self.can_execute = Some(Box::new(can_execute));
        self
    }
}

impl<VM> Command<VM> for RelayCommand<VM> {
    fn can_execute(&self, vm: &VM, param: Option<&str>) -> bool {
        self.can_execute
            .as_ref()
            .is_none_or(|can_execute| can_execute(vm, param))
    }

    fn execute(&self, vm: &mut VM, param: Option<&str>) -> Result<Completion, String> {
        (self.execute)(vm, param)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvokeOutcome {
    Executed,
    Disabled,
}

pub struct CommandInvoker<VM> {
    commands: HashMap<String, Box<dyn Command<VM>>>,
}

impl<VM> Default for CommandInvoker<VM> {
    fn default() -> Self {
        Self::new()
    }
}

impl<VM> CommandInvoker<VM> {
    pub fn new() -> Self {
        Self {
            commands: HashMap::new(),
        }
    }

    /// Registers `command` under `<name>Command`.
    pub fn register(mut self, name: &str, command: impl Command<VM> + 'static) -> Self {
        self.commands
            .insert(format!("{name}{COMMAND_SUFFIX}"), Box::new(command));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(&format!("{name}{COMMAND_SUFFIX}"))
    }

    /// Runs the command and waits for a pending completion, if any.
    pub fn invoke(
        &self,
        vm: &mut VM,
        name: &str,
        param: Option<&str>,
    ) -> Result<InvokeOutcome, CommandError> {
        let command = self
            .commands
            .get(&format!("{name}{COMMAND_SUFFIX}"))
            .ok_or_else(|| CommandError::Unknown(name.to_string()))?;

        if !command.can_execute(vm, param) {
            tracing::debug!(command = name, "command disabled; skipping");
            return Ok(InvokeOutcome::Disabled);
        }

        let failed = |reason: String| CommandError::Failed {
            command: name.to_string(),
            reason,
        };

        // A panicking action still owes the page a reply.
        let started = panic::catch_unwind(AssertUnwindSafe(|| command.execute(vm, param)))
            .unwrap_or_else(|payload| Err(panic_message(payload.as_ref())));

        match started.map_err(failed)? {
            Completion::Done => Ok(InvokeOutcome::Executed),
            Completion::Pending(rx) => match rx.recv() {
                Ok(Ok(())) => Ok(InvokeOutcome::Executed),
                Ok(Err(reason)) => Err(failed(reason)),
                Err(_) => Err(CommandError::CompletionDropped(name.to_string())),
            },
        }
    }
}

use crate::error::CommandError;
use crate::invoker::{CommandInvoker, InvokeOutcome};
use crate::projector::{ImportReport, StateProjector};
use serde_json::{Map, Value};

/// Type-erased view-model as seen by the dispatcher.
pub trait BoundViewModel: Send {
    fn snapshot(&self) -> Map<String, Value>;
    fn apply(&mut self, payload: &Map<String, Value>) -> ImportReport;
    fn invoke(&mut self, command: &str, param: Option<&str>) -> Result<InvokeOutcome, CommandError>;
}

pub struct ViewModelBinding<VM> {
    view_model: VM,
    projector: StateProjector<VM>,
    commands: CommandInvoker<VM>,
}

impl<VM> ViewModelBinding<VM> {
    pub fn new(
        view_model: VM,
        projector: StateProjector<VM>,
        commands: CommandInvoker<VM>,
    ) -> Self {
        Self {
            view_model,
            projector,
            commands,
        }
    }

    pub fn view_model(&self) -> &VM {
        &self.view_model
    }
}

impl<VM: Send + 'static> BoundViewModel for ViewModelBinding<VM> {
    fn snapshot(&self) -> Map<String, Value> {
        self.projector.export(&self.view_model)
    }

    fn apply(&mut self, payload: &Map<String, Value>) -> ImportReport {
        self.projector.import(&mut self.view_model, payload)
    }

    fn invoke(
        &mut self,
        command: &str,
        param: Option<&str>,
    ) -> Result<InvokeOutcome, CommandError> {
        self.commands.invoke(&mut self.view_model, command, param)
    }
}

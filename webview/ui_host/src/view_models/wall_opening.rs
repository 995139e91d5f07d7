use crate::model_host::ModelHost;
use crate::operations::wall_opening::{OpeningShape, WallOpeningHandler, WallOpeningParams};
use flowbridge_host_runtime::{
    CloseRequest, CommandInvoker, Completion, ExternalRequest, FieldSpec, RelayCommand,
    StateProjector, ViewModelBinding,
};

pub struct WallOpeningViewModel {
    pub width: f64,
    pub height: f64,
    pub sill_height: f64,
    pub radius: f64,
    pub shape: String,
    pub is_confirmed: bool,
    request: ExternalRequest<ModelHost, WallOpeningHandler>,
    close: CloseRequest,
}

impl WallOpeningViewModel {
    pub fn new(
        request: ExternalRequest<ModelHost, WallOpeningHandler>,
        close: CloseRequest,
    ) -> Self {
        Self {
            width: 1000.0,
            height: 2100.0,
            sill_height: 0.0,
            radius: 500.0,
            shape: "rectangle".to_string(),
            is_confirmed: false,
            request,
            close,
        }
    }

    pub fn params(&self) -> WallOpeningParams {
        WallOpeningParams {
            width: self.width,
            height: self.height,
            sill_height: self.sill_height,
            radius: self.radius,
            shape: OpeningShape::from_name(&self.shape),
        }
    }

    /// Returns false for an unknown preset, leaving the fields as they were.
    pub fn apply_preset(&mut self, preset: &str) -> bool {
        match preset {
            "door" => {
                self.width = 900.0;
                self.height = 2100.0;
                self.sill_height = 0.0;
                self.shape = "rectangle".to_string();
            }
            "window" => {
                self.width = 1500.0;
                self.height = 1500.0;
                self.sill_height = 900.0;
                self.shape = "rectangle".to_string();
            }
            "circle" => {
                self.radius = 300.0;
                self.sill_height = 1000.0;
                self.shape = "circle".to_string();
            }
            _ => return false,
        }
        true
    }

    /// Hands the current parameters to the host and asks the panel to close.
    pub fn create_opening(&mut self) -> Result<(), String> {
        self.request
            .raise(self.params())
            .map_err(|err| err.to_string())?;
        self.is_confirmed = true;
        self.close.request();
        Ok(())
    }

    pub fn into_binding(self) -> ViewModelBinding<Self> {
        ViewModelBinding::new(self, projector(), commands())
    }
}

fn projector() -> StateProjector<WallOpeningViewModel> {
    StateProjector::new()
        .field(FieldSpec::read_write(
            "Width",
            |vm: &WallOpeningViewModel| vm.width,
            |vm: &mut WallOpeningViewModel, value| vm.width = value,
        ))
        .field(FieldSpec::read_write(
            "Height",
            |vm: &WallOpeningViewModel| vm.height,
            |vm: &mut WallOpeningViewModel, value| vm.height = value,
        ))
        .field(FieldSpec::read_write(
            "SillHeight",
            |vm: &WallOpeningViewModel| vm.sill_height,
            |vm: &mut WallOpeningViewModel, value| vm.sill_height = value,
        ))
        .field(FieldSpec::read_write(
            "Radius",
            |vm: &WallOpeningViewModel| vm.radius,
            |vm: &mut WallOpeningViewModel, value| vm.radius = value,
        ))
        .field(FieldSpec::read_write(
            "Shape",
            |vm: &WallOpeningViewModel| vm.shape.clone(),
            |vm: &mut WallOpeningViewModel, value| vm.shape = value,
        ))
        .field(FieldSpec::read_only("IsConfirmed", |vm: &WallOpeningViewModel| {
            vm.is_confirmed
        }))
}

fn commands() -> CommandInvoker<WallOpeningViewModel> {
    CommandInvoker::new()
        .register(
            "ApplyPreset",
            RelayCommand::sync(|vm: &mut WallOpeningViewModel, preset: Option<&str>| {
                if let Some(preset) = preset {
                    vm.apply_preset(preset);
                }
            })
            .with_can_execute(|_: &WallOpeningViewModel, preset: Option<&str>| {
                matches!(preset, Some("door" | "window" | "circle"))
            }),
        )
        .register(
            "CreateOpening",
            RelayCommand::new(|vm: &mut WallOpeningViewModel, _| {
                vm.create_opening()?;
                Ok(Completion::Done)
            }),
        )
}

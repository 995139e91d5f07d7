use crate::model_host::ModelHost;
use crate::operations::curve_array::{CurveArrayHandler, CurveArrayParams};
use flowbridge_host_runtime::{
    CommandInvoker, Completion, ExternalRequest, FieldSpec, RelayCommand, StateProjector,
    ViewModelBinding,
};

pub struct CurveArrayViewModel {
    pub selected_family_name: String,
    pub count: i32,
    pub align_to_path: bool,
    request: ExternalRequest<ModelHost, CurveArrayHandler>,
}

impl CurveArrayViewModel {
    pub fn new(
        request: ExternalRequest<ModelHost, CurveArrayHandler>,
        family_types: &[String],
    ) -> Self {
        Self {
            selected_family_name: family_types.first().cloned().unwrap_or_default(),
            count: 10,
            align_to_path: true,
            request,
        }
    }

    pub fn params(&self) -> CurveArrayParams {
        CurveArrayParams {
            family_type: self.selected_family_name.clone(),
            count: self.count,
            align_to_path: self.align_to_path,
        }
    }

    pub fn into_binding(self) -> ViewModelBinding<Self> {
        let projector = StateProjector::new()
            .field(FieldSpec::read_write(
                "SelectedFamilyName",
                |vm: &Self| vm.selected_family_name.clone(),
                |vm: &mut Self, value| vm.selected_family_name = value,
            ))
            .field(FieldSpec::read_write(
                "Count",
                |vm: &Self| vm.count,
                |vm: &mut Self, value| vm.count = value,
            ))
            .field(FieldSpec::read_write(
                "AlignToPath",
                |vm: &Self| vm.align_to_path,
                |vm: &mut Self, value| vm.align_to_path = value,
            ));

        let commands = CommandInvoker::new().register(
            "CreateArray",
            RelayCommand::new(|vm: &mut Self, _| {
                tracing::info!(
                    family_type = %vm.selected_family_name,
                    count = vm.count,
                    "raising curve array"
                );
                vm.request
                    .raise(vm.params())
                    .map_err(|err| err.to_string())?;
                Ok(Completion::Done)
            })
            .with_can_execute(|vm: &Self, _| vm.count > 0),
        );

        ViewModelBinding::new(self, projector, commands)
    }
}

//! Reflects a view-model's declared fields into and out of bridge payloads.
//!
//! Each view-model registers its fields explicitly with typed getter and
//! setter closures. Export walks the readable fields, import walks the
//! incoming payload and applies each field independently.

use crate::error::FieldError;
use crate::naming::{to_host_name, to_wire_name};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

type Getter<VM> = Box<dyn Fn(&VM) -> Value + Send + Sync>;
type Setter<VM> = Box<dyn Fn(&mut VM, Value) -> Result<(), String> + Send + Sync>;

pub struct FieldSpec<VM> {
    name: String,
    get: Getter<VM>,
    set: Option<Setter<VM>>,
}

impl<VM: 'static> FieldSpec<VM> {
    pub fn read_only<T, G>(name: impl Into<String>, get: G) -> Self
    where
        T: Serialize,
        G: Fn(&VM) -> T + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            get: Box::new(move |vm| serde_json::to_value(get(vm)).unwrap_or(Value::Null)),
            set: None,
        }
    }

    pub fn read_write<T, G, S>(name: impl Into<String>, get: G, set: S) -> Self
    where
        T: Serialize + DeserializeOwned,
        G: Fn(&VM) -> T + Send + Sync + 'static,
        S: Fn(&mut VM, T) + Send + Sync + 'static,
    {
        let mut field = Self::read_only(name, get);
        field.set = Some(Box::new(move |vm, value| {
            let typed = serde_json::from_value::<T>(value).map_err(|err| err.to_string())?;
            set(vm, typed);
            Ok(())
        }));
        field
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_writable(&self) -> bool {
        self.set.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub applied: Vec<String>,
    pub failures: Vec<(String, FieldError)>,
}

impl ImportReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Wire names of the fields that were not applied, in the order the
    /// payload map iterates them (sorted by name).
    pub fn failed_fields(&self) -> Vec<String> {
        self.failures.iter().map(|(name, _)| name.clone()).collect()
    }
}

pub struct StateProjector<VM> {
    fields: Vec<FieldSpec<VM>>,
    excluded: Vec<String>,
}

impl<VM: 'static> Default for StateProjector<VM> {
    fn default() -> Self {
        Self::new()
    }
}

impl<VM: 'static> StateProjector<VM> {
    pub fn new() -> Self {
        Self {
            fields: Vec::new(),
            excluded: Vec::new(),
        }
    }

    pub fn field(mut self, field: FieldSpec<VM>) -> Self {
        self.fields.push(field);
        self
    }

    /// Keeps a field out of snapshots. It can still be written if it
    /// was registered as writable.
    pub fn exclude(mut self, host_name: impl Into<String>) -> Self {
        self.excluded.push(host_name.into());
        self
    }

    pub fn export(&self, vm: &VM) -> Map<String, Value> {
        self.fields
            .iter()
            .filter(|field| !self.excluded.iter().any(|name| name == &field.name))
            .map(|field| (to_wire_name(&field.name), (field.get)(vm)))
            .collect()
    }

    pub fn import(&self, vm: &mut VM, payload: &Map<String, Value>) -> ImportReport {
        let mut report = ImportReport::default();

        for (wire_name, value) in payload {
            match self.apply_field(vm, wire_name, value) {
                Ok(()) => report.applied.push(wire_name.clone()),
                Err(err) => {
                    tracing::debug!(field = %wire_name, error = %err, "field not applied");
                    report.failures.push((wire_name.clone(), err));
                }
            }
        }

        report
    }

    fn apply_field(&self, vm: &mut VM, wire_name: &str, value: &Value) -> Result<(), FieldError> {
        let host_name = to_host_name(wire_name);
        let field = self
            .fields
            .iter()
            .find(|field| field.name == host_name)
            .ok_or_else(|| FieldError::Unknown(wire_name.to_string()))?;

        let set = field
            .set
            .as_ref()
            .ok_or_else(|| FieldError::ReadOnly(wire_name.to_string()))?;

        if value.is_object() || value.is_array() {
            return Err(FieldError::NotScalar(wire_name.to_string()));
        }

        set(vm, value.clone()).map_err(|reason| FieldError::TypeMismatch {
            field: wire_name.to_string(),
            reason,
        })
    }
}

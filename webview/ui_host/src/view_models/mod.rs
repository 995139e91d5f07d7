//! Panel view-models and their bindings.

pub mod curve_array;
pub mod settings;
pub mod wall_opening;

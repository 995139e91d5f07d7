//! Field-name convention between the page (lower camel case) and the
//! view-model registry (upper camel case). Only the first character changes.

pub fn to_wire_name(host_name: &str) -> String {
    let mut chars = host_name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn to_host_name(wire_name: &str) -> String {
    let mut chars = wire_name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

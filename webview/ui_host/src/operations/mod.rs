//! Host-thread handlers behind the panels' external requests.

pub mod curve_array;
pub mod wall_opening;

/// Millimetres in one foot, the host document unit.
pub const MM_PER_FOOT: f64 = 304.8;

pub fn mm_to_feet(mm: f64) -> f64 {
    mm / MM_PER_FOOT
}

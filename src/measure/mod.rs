//! Measurement module
//!
//! Keeps the grams/cups/liters fields of an ingredient consistent.

pub mod converter;
pub mod units;

pub use converter::{coerce_quantity, convert_edit, round_measure, sanitize_quantity};
pub use units::{MeasureField, Quantities, Tracking};

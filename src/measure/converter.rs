//! Unit conversion functions
//!
//! Recomputes the sibling fields of an ingredient after a single-field edit.

use serde_json::Value;

use super::units::{
    MeasureField, Quantities, Tracking, CUPS_PER_GRAM, CUPS_PER_LITER, DECIMAL_PLACES,
    GRAMS_PER_CUP, GRAMS_PER_LITER, LITERS_PER_CUP, LITERS_PER_GRAM,
};

/// Round to the number of decimals stored for every converted value
///
/// Values too large to carry decimals are returned unchanged.
pub fn round_measure(value: f64) -> f64 {
    let scale = 10f64.powi(DECIMAL_PLACES);
    let scaled = value * scale;
    if !scaled.is_finite() {
        return value;
    }
    scaled.round() / scale
}

/// Clamp an amount into the valid domain: non-finite or negative becomes 0
pub fn sanitize_quantity(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

/// Read a JSON value as an amount, treating anything non-numeric as 0
///
/// Numeric strings ("12.5") are accepted since form inputs arrive as text.
pub fn coerce_quantity(value: &Value) -> f64 {
    let raw = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        _ => 0.0,
    };
    sanitize_quantity(raw)
}

/// Multiply by a conversion factor, saturating at `f64::MAX` on overflow
fn scale_by(value: f64, factor: f64) -> f64 {
    let product = round_measure(value * factor);
    if product.is_infinite() {
        f64::MAX
    } else {
        sanitize_quantity(product)
    }
}

pub fn grams_to_cups(grams: f64) -> f64 {
    scale_by(grams, CUPS_PER_GRAM)
}

pub fn grams_to_liters(grams: f64) -> f64 {
    scale_by(grams, LITERS_PER_GRAM)
}

pub fn cups_to_grams(cups: f64) -> f64 {
    scale_by(cups, GRAMS_PER_CUP)
}

pub fn cups_to_liters(cups: f64) -> f64 {
    scale_by(cups, LITERS_PER_CUP)
}

pub fn liters_to_grams(liters: f64) -> f64 {
    scale_by(liters, GRAMS_PER_LITER)
}

pub fn liters_to_cups(liters: f64) -> f64 {
    scale_by(liters, CUPS_PER_LITER)
}

/// Apply an edit of one field and recompute the others
///
/// With `Tracking::Full` the two untouched fields are derived from the new
/// value. With `Tracking::VolumeOnly` a cups edit derives liters and every
/// other edit changes only the edited field, so grams may go stale.
pub fn convert_edit(
    current: Quantities,
    field: MeasureField,
    value: f64,
    tracking: Tracking,
) -> Quantities {
    let value = sanitize_quantity(value);
    let mut updated = Quantities::new(
        sanitize_quantity(current.grams),
        sanitize_quantity(current.cups),
        sanitize_quantity(current.liters),
    );
    updated.set(field, value);

    match tracking {
        Tracking::VolumeOnly => {
            if field == MeasureField::Cups {
                updated.liters = cups_to_liters(value);
            }
        }
        Tracking::Full => match field {
            MeasureField::Grams => {
                updated.cups = grams_to_cups(value);
                updated.liters = grams_to_liters(value);
            }
            MeasureField::Cups => {
                updated.grams = cups_to_grams(value);
                updated.liters = cups_to_liters(value);
            }
            MeasureField::Liters => {
                updated.grams = liters_to_grams(value);
                updated.cups = liters_to_cups(value);
            }
        },
    }

    updated
}

//! Measurement fields and conversion constants
//!
//! Every ingredient carries the same amount three ways: grams, US cups and
//! liters. Conversions assume water-equivalent density (1 g == 1 mL).

use serde::{Deserialize, Serialize};

// ============================================================================
// Conversion Constants
// ============================================================================

/// Milliliters per cup (US)
pub const ML_PER_CUP: f64 = 236.588;
/// Milliliters per liter
pub const ML_PER_LITER: f64 = 1000.0;

/// Cups per gram of water
pub const CUPS_PER_GRAM: f64 = 0.00422675;
/// Liters per gram of water
pub const LITERS_PER_GRAM: f64 = 0.001;
/// Grams of water per cup
pub const GRAMS_PER_CUP: f64 = ML_PER_CUP;
/// Liters per cup
pub const LITERS_PER_CUP: f64 = 0.236588;
/// Grams of water per liter
pub const GRAMS_PER_LITER: f64 = ML_PER_LITER;
/// Cups per liter
pub const CUPS_PER_LITER: f64 = 4.22675;

/// Number of decimal places kept on every converted value
pub const DECIMAL_PLACES: i32 = 3;

/// One of the three measurement fields of an ingredient
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasureField {
    Grams,
    Cups,
    Liters,
}

impl MeasureField {
    pub fn as_str(&self) -> &'static str {
        match self {
            MeasureField::Grams => "grams",
            MeasureField::Cups => "cups",
            MeasureField::Liters => "liters",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "g" | "gram" | "grams" => Some(MeasureField::Grams),
            "cup" | "cups" => Some(MeasureField::Cups),
            "l" | "liter" | "liters" | "litre" | "litres" => Some(MeasureField::Liters),
            _ => None,
        }
    }
}

/// How an ingredient keeps its fields in step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tracking {
    /// All three fields are kept mutually consistent
    Full,
    /// Only cups drives liters; grams is never derived (ice)
    VolumeOnly,
}

/// The three redundant encodings of one physical amount
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Quantities {
    pub grams: f64,
    pub cups: f64,
    pub liters: f64,
}

impl Quantities {
    pub fn new(grams: f64, cups: f64, liters: f64) -> Self {
        Self { grams, cups, liters }
    }

    pub fn get(&self, field: MeasureField) -> f64 {
        match field {
            MeasureField::Grams => self.grams,
            MeasureField::Cups => self.cups,
            MeasureField::Liters => self.liters,
        }
    }

    pub fn set(&mut self, field: MeasureField, value: f64) {
        match field {
            MeasureField::Grams => self.grams = value,
            MeasureField::Cups => self.cups = value,
            MeasureField::Liters => self.liters = value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_from_str() {
        assert_eq!(MeasureField::from_str("grams"), Some(MeasureField::Grams));
        assert_eq!(MeasureField::from_str(" Cups "), Some(MeasureField::Cups));
        assert_eq!(MeasureField::from_str("litre"), Some(MeasureField::Liters));
        assert_eq!(MeasureField::from_str("tbsp"), None);
    }

    #[test]
    fn test_factors_are_reciprocal() {
        assert!((CUPS_PER_GRAM * GRAMS_PER_CUP - 1.0).abs() < 1e-5);
        assert!((CUPS_PER_LITER * LITERS_PER_CUP - 1.0).abs() < 1e-5);
        assert!((LITERS_PER_GRAM * GRAMS_PER_LITER - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_quantities_get_set() {
        let mut q = Quantities::default();
        q.set(MeasureField::Cups, 2.0);
        assert_eq!(q.get(MeasureField::Cups), 2.0);
        assert_eq!(q.get(MeasureField::Grams), 0.0);
    }
}

//! Display units
//!
//! The engine stores and computes in kilograms. Conversion happens only at
//! presentation edges and never touches stored values.

use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kilograms per avoirdupois pound
pub const KG_PER_LB: f64 = 0.45359237;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightUnit {
    #[default]
    #[serde(alias = "kg")]
    Kilograms,
    #[serde(alias = "lb", alias = "lbs")]
    Pounds,
}

impl WeightUnit {
    pub fn symbol(&self) -> &'static str {
        match self {
            WeightUnit::Kilograms => "kg",
            WeightUnit::Pounds => "lb",
        }
    }
}

impl FromStr for WeightUnit {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "kg" | "kgs" | "kilograms" => Ok(WeightUnit::Kilograms),
            "lb" | "lbs" | "pounds" => Ok(WeightUnit::Pounds),
            _ => Err(EngineError::ParseError(format!("unknown weight unit: {s}"))),
        }
    }
}

impl fmt::Display for WeightUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Stateless converter bound to one display unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UnitConverter {
    unit: WeightUnit,
}

impl UnitConverter {
    pub fn new(unit: WeightUnit) -> Self {
        Self { unit }
    }

    pub fn unit(&self) -> WeightUnit {
        self.unit
    }

    pub fn symbol(&self) -> &'static str {
        self.unit.symbol()
    }

    /// Canonical kilograms to the display unit
    pub fn from_kilograms(&self, kg: f64) -> f64 {
        match self.unit {
            WeightUnit::Kilograms => kg,
            WeightUnit::Pounds => kg / KG_PER_LB,
        }
    }

    /// Display unit back to canonical kilograms
    pub fn to_kilograms(&self, value: f64) -> f64 {
        match self.unit {
            WeightUnit::Kilograms => value,
            WeightUnit::Pounds => value * KG_PER_LB,
        }
    }

    /// Format a kilogram value in the display unit with at most one decimal
    pub fn format(&self, kg: f64) -> String {
        let value = (self.from_kilograms(kg) * 10.0).round() / 10.0;
        if value.fract() == 0.0 {
            format!("{value:.0} {}", self.symbol())
        } else {
            format!("{value:.1} {}", self.symbol())
        }
    }
}

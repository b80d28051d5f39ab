//! One-rep-max estimation formulas
//!
//! Each [`Formula`] maps to a pure `(weight, reps) -> e1RM` function and its
//! algebraic inverse `(weight, one_rm) -> reps`. Dispatch goes through a
//! function table so the numeric behavior never depends on display strings.
//!
//! Domain limits are preserved as-is:
//! - Brzycki divides by `37 - reps`: 37 reps yields `+inf`, more yields a
//!   negative estimate.
//! - Wathan divides by `101.3 - 2.67123 * reps`, which crosses zero just
//!   below 38 reps.

use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Forward estimator: `(weight, reps) -> estimated 1RM`
pub type EstimatorFn = fn(f64, f64) -> f64;

/// Inverse estimator: `(weight, one_rm) -> reps` (untruncated)
pub type InverseFn = fn(f64, f64) -> f64;

/// Named 1RM estimation formulas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Formula {
    #[default]
    Epley,
    Brzycki,
    Lombardi,
    #[serde(alias = "o'connor", alias = "o_connor")]
    OConnor,
    Wathan,
}

const ESTIMATORS: [(Formula, EstimatorFn, InverseFn); 5] = [
    (Formula::Epley, epley, epley_inverse),
    (Formula::Brzycki, brzycki, brzycki_inverse),
    (Formula::Lombardi, lombardi, lombardi_inverse),
    (Formula::OConnor, oconnor, oconnor_inverse),
    (Formula::Wathan, wathan, wathan_inverse),
];

impl Formula {
    /// All formulas, in table order
    pub fn all() -> [Formula; 5] {
        ESTIMATORS.map(|(formula, _, _)| formula)
    }

    /// Forward estimator for this formula
    pub fn estimator(self) -> EstimatorFn {
        ESTIMATORS[self.index()].1
    }

    /// Inverse estimator for this formula
    pub fn inverse(self) -> InverseFn {
        ESTIMATORS[self.index()].2
    }

    /// Stable identifier used in JSON and on the command line
    pub fn as_str(&self) -> &'static str {
        match self {
            Formula::Epley => "epley",
            Formula::Brzycki => "brzycki",
            Formula::Lombardi => "lombardi",
            Formula::OConnor => "oconnor",
            Formula::Wathan => "wathan",
        }
    }

    /// Human-readable name
    pub fn display_name(&self) -> &'static str {
        match self {
            Formula::Epley => "Epley",
            Formula::Brzycki => "Brzycki",
            Formula::Lombardi => "Lombardi",
            Formula::OConnor => "O'Connor",
            Formula::Wathan => "Wathan",
        }
    }

    fn index(self) -> usize {
        match self {
            Formula::Epley => 0,
            Formula::Brzycki => 1,
            Formula::Lombardi => 2,
            Formula::OConnor => 3,
            Formula::Wathan => 4,
        }
    }
}

impl FromStr for Formula {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "epley" => Ok(Formula::Epley),
            "brzycki" => Ok(Formula::Brzycki),
            "lombardi" => Ok(Formula::Lombardi),
            "oconnor" | "o'connor" | "o_connor" => Ok(Formula::OConnor),
            "wathan" => Ok(Formula::Wathan),
            _ => Err(EngineError::UnknownFormula(s.to_string())),
        }
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

// Epley: w × (1 + r/30)
fn epley(w: f64, r: f64) -> f64 {
    w * (1.0 + r / 30.0)
}

fn epley_inverse(w: f64, one_rm: f64) -> f64 {
    (one_rm / w - 1.0) * 30.0
}

// Brzycki: w × 36 / (37 - r)
fn brzycki(w: f64, r: f64) -> f64 {
    w * 36.0 / (37.0 - r)
}

fn brzycki_inverse(w: f64, one_rm: f64) -> f64 {
    37.0 - 36.0 * w / one_rm
}

// Lombardi: w × r^0.10
fn lombardi(w: f64, r: f64) -> f64 {
    w * r.powf(0.10)
}

fn lombardi_inverse(w: f64, one_rm: f64) -> f64 {
    (one_rm / w).powi(10)
}

// O'Connor: w × (1 + r/40)
fn oconnor(w: f64, r: f64) -> f64 {
    w * (1.0 + r / 40.0)
}

fn oconnor_inverse(w: f64, one_rm: f64) -> f64 {
    (one_rm / w - 1.0) * 40.0
}

// Wathan: w × 100 / (101.3 - 2.67123 × r)
fn wathan(w: f64, r: f64) -> f64 {
    w * 100.0 / (101.3 - 2.67123 * r)
}

fn wathan_inverse(w: f64, one_rm: f64) -> f64 {
    (101.3 - 100.0 * w / one_rm) / 2.67123
}

/// Estimate a one-rep max from a single set.
///
/// Returns 0 when `weight <= 0` or `reps == 0`; that zero means "no usable
/// input", not a computed value.
pub fn estimate_one_rm(weight: f64, reps: u32, formula: Formula) -> f64 {
    if weight <= 0.0 || reps == 0 {
        return 0.0;
    }
    (formula.estimator())(weight, reps as f64)
}

/// Mean of all five formulas, equally weighted
pub fn estimate_average_one_rm(weight: f64, reps: u32) -> f64 {
    let formulas = Formula::all();
    let total: f64 = formulas
        .iter()
        .map(|f| estimate_one_rm(weight, reps, *f))
        .sum();
    total / formulas.len() as f64
}

/// Estimate how many reps can be done at `weight` given a known 1RM.
///
/// The result is the formula's algebraic inverse truncated toward zero. It is
/// not clamped and may be negative when `weight > one_rm`. Returns 0 when
/// `one_rm <= 0` or `weight <= 0`.
pub fn estimate_max_reps(weight: f64, one_rm: f64, formula: Formula) -> i32 {
    if one_rm <= 0.0 || weight <= 0.0 {
        return 0;
    }
    // `as` truncates toward zero and saturates on overflow
    (formula.inverse())(weight, one_rm) as i32
}

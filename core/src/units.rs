//! Body-metric conversions and display formatting.
//!
//! Storage is always metric (kilograms, centimetres). These functions are
//! total over finite inputs and perform no validation: negative inputs give
//! whatever the arithmetic gives.

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

pub const LBS_PER_KG: f64 = 2.20462;
pub const KG_PER_LB: f64 = 0.453_592;
pub const CM_PER_INCH: f64 = 2.54;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitPreference {
    #[default]
    Metric,
    Imperial,
}

impl UnitPreference {
    /// Anything other than `imperial` displays as metric.
    #[must_use]
    pub fn parse_lenient(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("imperial") {
            Self::Imperial
        } else {
            Self::Metric
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Metric => "metric",
            Self::Imperial => "imperial",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FeetInches {
    pub feet: i64,
    pub inches: i64,
}

#[must_use]
pub fn kg_to_lb(kg: f64) -> f64 {
    kg * LBS_PER_KG
}

#[must_use]
pub fn lb_to_kg(lb: f64) -> f64 {
    lb * KG_PER_LB
}

/// Split a height into whole feet and rounded inches.
///
/// When the inches round up to 12 the result rolls over to the next foot,
/// so `X ft 12 in` is never produced.
#[must_use]
pub fn cm_to_feet_inches(cm: f64) -> FeetInches {
    let total_inches = cm / CM_PER_INCH;
    let mut feet = (total_inches / 12.0).floor() as i64;
    let mut inches = (total_inches % 12.0).round() as i64;
    if inches == 12 {
        feet += 1;
        inches = 0;
    }
    FeetInches { feet, inches }
}

#[must_use]
pub fn feet_inches_to_cm(feet: f64, inches: f64) -> f64 {
    (feet * 12.0 + inches) * CM_PER_INCH
}

/// Convert a user-entered weight in `kg`, `lb` or `lbs` to kilograms.
pub fn weight_from_unit(value: f64, unit: &str) -> Result<f64> {
    match unit.trim().to_lowercase().as_str() {
        "kg" | "kgs" => Ok(value),
        "lb" | "lbs" => Ok(lb_to_kg(value)),
        _ => bail!("Invalid unit '{unit}'. Use 'kg' or 'lbs'"),
    }
}

/// One decimal place, with a trailing `.0` dropped.
fn trim_decimal(value: f64) -> String {
    let rounded = (value * 10.0).round() / 10.0;
    let rounded = if rounded == 0.0 { 0.0 } else { rounded };
    if rounded.fract() == 0.0 {
        format!("{rounded:.0}")
    } else {
        format!("{rounded:.1}")
    }
}

#[must_use]
pub fn format_weight(kg: f64, preference: &str) -> String {
    format_weight_for(kg, UnitPreference::parse_lenient(preference))
}

#[must_use]
pub fn format_weight_for(kg: f64, preference: UnitPreference) -> String {
    match preference {
        UnitPreference::Metric => format!("{} kg", trim_decimal(kg)),
        UnitPreference::Imperial => format!("{} lb", trim_decimal(kg_to_lb(kg))),
    }
}

#[must_use]
pub fn format_height(cm: f64, preference: &str) -> String {
    format_height_for(cm, UnitPreference::parse_lenient(preference))
}

#[must_use]
pub fn format_height_for(cm: f64, preference: UnitPreference) -> String {
    match preference {
        UnitPreference::Metric => format!("{} cm", trim_decimal(cm)),
        UnitPreference::Imperial => {
            let FeetInches { feet, inches } = cm_to_feet_inches(cm);
            format!("{feet} ft {inches} in")
        }
    }
}

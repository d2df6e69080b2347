//! Genetic schema — the search-space contract between a strategy and the
//! optimizer.
//!
//! Each optimizable field of the options struct gets exactly one descriptor:
//! a numeric range (optionally integer or odd constrained) or a boolean flag.
//! Descriptors never describe fields outside the options struct; that
//! invariant is checked by [`validate_schema`] before any optimizer run.

use crate::domain::StrategyOptions;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Search constraint for one optimizable field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SchemaDescriptor {
    Number {
        min: f64,
        max: f64,
        /// Round to a whole number after sampling/crossover/mutation.
        #[serde(default)]
        int: bool,
        /// Snap to the nearest odd value (implies integer).
        #[serde(default)]
        odd: bool,
    },
    Bool,
}

/// A sampled or constrained value for one schema field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SchemaValue {
    Number(f64),
    Bool(bool),
}

impl SchemaValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            Self::Bool(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            Self::Number(_) => None,
        }
    }

    /// JSON form used when patching the options struct. Whole numbers are
    /// emitted as integers so integer-typed option fields deserialize.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Number(v) if v.fract() == 0.0 && v.abs() < i64::MAX as f64 => {
                serde_json::json!(*v as i64)
            }
            Self::Number(v) => serde_json::json!(v),
            Self::Bool(v) => serde_json::json!(v),
        }
    }
}

/// Ordered map from option field name to its descriptor. BTreeMap keeps
/// iteration deterministic across runs.
pub type GeneticSchema = BTreeMap<String, SchemaDescriptor>;

impl SchemaDescriptor {
    /// Uniform draw within the descriptor's bounds, honoring the
    /// integer/odd/boolean constraint.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> SchemaValue {
        match *self {
            Self::Bool => SchemaValue::Bool(rng.gen_bool(0.5)),
            Self::Number { min, max, .. } if min >= max => {
                self.constrain(SchemaValue::Number(min))
            }
            Self::Number { min, max, .. } => {
                self.constrain(SchemaValue::Number(rng.gen_range(min..=max)))
            }
        }
    }

    /// Repair a raw value into the descriptor's domain: clamp to bounds,
    /// round when integer, snap to the nearest in-range odd when odd.
    pub fn constrain(&self, value: SchemaValue) -> SchemaValue {
        match (*self, value) {
            (Self::Bool, SchemaValue::Bool(b)) => SchemaValue::Bool(b),
            // A numeric value landing on a bool field degrades to a threshold flip.
            (Self::Bool, SchemaValue::Number(v)) => SchemaValue::Bool(v >= 0.5),
            (Self::Number { min, max, int, odd }, v) => {
                let raw = v.as_number().unwrap_or(min);
                let mut value = raw.clamp(min, max);
                if odd {
                    value = snap_odd(value, min, max);
                } else if int {
                    value = value.round().clamp(min.ceil(), max.floor());
                }
                SchemaValue::Number(value)
            }
        }
    }

    /// Whether a value already satisfies this descriptor.
    pub fn contains(&self, value: &SchemaValue) -> bool {
        match (*self, value) {
            (Self::Bool, SchemaValue::Bool(_)) => true,
            (Self::Number { min, max, int, odd }, SchemaValue::Number(v)) => {
                let in_range = *v >= min && *v <= max;
                let int_ok = !int && !odd || v.fract() == 0.0;
                let odd_ok = !odd || (*v as i64) % 2 != 0;
                in_range && int_ok && odd_ok
            }
            _ => false,
        }
    }
}

/// Round to the nearest odd integer inside [min, max]. When the range holds
/// no odd value the nearest bound is returned rounded.
fn snap_odd(value: f64, min: f64, max: f64) -> f64 {
    let mut n = value.round() as i64;
    if n % 2 == 0 {
        let up = n + 1;
        let down = n - 1;
        n = if (up as f64) <= max {
            up
        } else if (down as f64) >= min {
            down
        } else {
            return value.round().clamp(min.ceil(), max.floor());
        };
    }
    (n as f64).clamp(min.ceil(), max.floor())
}

/// Result of checking a schema against the options struct it targets.
#[derive(Debug, Clone)]
pub struct SchemaValidation {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

/// Validate that every descriptor names a field present in the serialized
/// options struct and that numeric bounds are well-formed.
pub fn validate_schema(schema: &GeneticSchema, options: &StrategyOptions) -> SchemaValidation {
    let mut errors = Vec::new();

    let json = serde_json::to_value(options).expect("options serialization failed");
    let object = json.as_object().expect("options serialize to an object");

    for (field, descriptor) in schema {
        if !object.contains_key(field.as_str()) {
            errors.push(format!("descriptor '{field}' targets no options field"));
        }
        if let SchemaDescriptor::Number { min, max, .. } = descriptor {
            if !min.is_finite() || !max.is_finite() {
                errors.push(format!("descriptor '{field}' has non-finite bounds"));
            } else if min > max {
                errors.push(format!(
                    "descriptor '{field}' has inverted bounds: min {min} > max {max}"
                ));
            }
        }
    }

    SchemaValidation {
        is_valid: errors.is_empty(),
        errors,
    }
}

//! Parameter bounds and the bounded/unbounded coordinate transform.
//!
//! The optimizer works on unbounded internal coordinates; the Minuit-style
//! transform maps them onto the external, bounded values that the spectral
//! model sees.

use serde::{Deserialize, Serialize};
use std::f64::{INFINITY, NEG_INFINITY};
use thiserror::Error;

/// Errors that can occur when working with parameter bounds
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BoundsError {
    #[error("Invalid bounds: min ({min}) must not exceed max ({max})")]
    InvalidBounds { min: f64, max: f64 },

    #[error("Value {value} is outside bounds [{min}, {max}]")]
    ValueOutsideBounds { value: f64, min: f64, max: f64 },

    #[error("Non-finite parameter value is not allowed")]
    NonFiniteValue,
}

/// Lower and upper limit of a parameter. Infinite ends mean "no limit".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Serialize for Bounds {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;

        // JSON has no infinity; open ends are written as null
        let finite = |v: f64| if v.is_finite() { Some(v) } else { None };
        let mut state = serializer.serialize_struct("Bounds", 2)?;
        state.serialize_field("min", &finite(self.min))?;
        state.serialize_field("max", &finite(self.max))?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for Bounds {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct BoundsHelper {
            #[serde(default)]
            min: Option<f64>,
            #[serde(default)]
            max: Option<f64>,
        }

        let helper = BoundsHelper::deserialize(deserializer)?;
        Ok(Bounds {
            min: helper.min.unwrap_or(NEG_INFINITY),
            max: helper.max.unwrap_or(INFINITY),
        })
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            min: NEG_INFINITY,
            max: INFINITY,
        }
    }
}

impl Bounds {
    /// Create bounds `[min, max]`.
    ///
    /// # Examples
    ///
    /// ```
    /// use specfit_rs::parameters::bounds::Bounds;
    ///
    /// let bounds = Bounds::new(0.0, 10.0).unwrap();
    /// assert_eq!(bounds.min, 0.0);
    /// assert!(Bounds::new(1.0, 0.0).is_err());
    /// ```
    pub fn new(min: f64, max: f64) -> Result<Self, BoundsError> {
        if min > max || min.is_nan() || max.is_nan() {
            return Err(BoundsError::InvalidBounds { min, max });
        }
        Ok(Self { min, max })
    }

    /// Bounds open on both ends.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Multiplicative bounds `[V/F, V·F]`, ordered so that `min <= max` for
    /// negative values. Returns `None` when `value` is zero, since the
    /// interval would collapse onto a single point.
    ///
    /// ```
    /// use specfit_rs::parameters::bounds::Bounds;
    ///
    /// let b = Bounds::multiplicative(0.07, 3.0).unwrap();
    /// assert!((b.min - 0.07 / 3.0).abs() < 1e-15);
    /// assert!((b.max - 0.21).abs() < 1e-15);
    /// assert!(Bounds::multiplicative(0.0, 3.0).is_none());
    /// ```
    pub fn multiplicative(value: f64, factor: f64) -> Option<Self> {
        if value == 0.0 {
            return None;
        }
        let a = value / factor;
        let b = value * factor;
        Some(Self {
            min: a.min(b),
            max: a.max(b),
        })
    }

    /// Additive bounds `[V - M, V + M]`.
    pub fn additive(value: f64, magnitude: f64) -> Self {
        Self {
            min: value - magnitude,
            max: value + magnitude,
        }
    }

    /// Whether `value` lies inside the closed interval.
    pub fn is_within_bounds(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// `true` when neither end is infinite.
    pub fn is_finite(&self) -> bool {
        self.min.is_finite() && self.max.is_finite()
    }

    pub fn has_lower_bound(&self) -> bool {
        self.min.is_finite()
    }

    pub fn has_upper_bound(&self) -> bool {
        self.max.is_finite()
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }
}

/// Minuit-style transform between internal (unbounded) and external (bounded)
/// coordinates.
///
/// * two-sided: `ext = min + (sin(int) + 1)(max - min)/2`
/// * lower only: `ext = min - 1 + sqrt(int² + 1)`
/// * upper only: `ext = max + 1 - sqrt(int² + 1)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundsTransform {
    bounds: Bounds,
}

impl BoundsTransform {
    pub fn new(bounds: Bounds) -> Self {
        Self { bounds }
    }

    /// Map an internal value to the external, bounded domain.
    pub fn to_external(&self, internal_value: f64) -> f64 {
        let b = &self.bounds;
        match (b.has_lower_bound(), b.has_upper_bound()) {
            (false, false) => internal_value,
            (true, false) => b.min - 1.0 + (internal_value * internal_value + 1.0).sqrt(),
            (false, true) => b.max + 1.0 - (internal_value * internal_value + 1.0).sqrt(),
            (true, true) => b.min + (internal_value.sin() + 1.0) * (b.max - b.min) / 2.0,
        }
    }

    /// Map an external value to the internal domain.
    ///
    /// Fails if the value is non-finite or outside the bounds.
    pub fn to_internal(&self, external_value: f64) -> Result<f64, BoundsError> {
        if !external_value.is_finite() {
            return Err(BoundsError::NonFiniteValue);
        }

        let b = &self.bounds;
        if !b.is_within_bounds(external_value) {
            return Err(BoundsError::ValueOutsideBounds {
                value: external_value,
                min: b.min,
                max: b.max,
            });
        }

        let internal = match (b.has_lower_bound(), b.has_upper_bound()) {
            (false, false) => external_value,
            (true, false) => ((external_value - b.min + 1.0).powi(2) - 1.0).sqrt(),
            (false, true) => ((b.max - external_value + 1.0).powi(2) - 1.0).sqrt(),
            (true, true) => {
                let range = b.max - b.min;
                if range == 0.0 {
                    0.0
                } else {
                    let scaled = 2.0 * (external_value - b.min) / range - 1.0;
                    scaled.clamp(-1.0, 1.0).asin()
                }
            }
        };
        Ok(internal)
    }

    /// Derivative d(external)/d(internal) at `internal_value`.
    pub fn derivative(&self, internal_value: f64) -> f64 {
        let b = &self.bounds;
        match (b.has_lower_bound(), b.has_upper_bound()) {
            (false, false) => 1.0,
            (true, false) => internal_value / (internal_value * internal_value + 1.0).sqrt(),
            (false, true) => -internal_value / (internal_value * internal_value + 1.0).sqrt(),
            (true, true) => (b.max - b.min) * internal_value.cos() / 2.0,
        }
    }
}

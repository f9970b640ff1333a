/// Choropleth colour scale
///
/// Thresholds are breakpoints on the per-cell count. They feed the fill layer's
/// `interpolate` colour expression and a direct count → colour lookup.

use crate::constants::{DEFAULT_OVERFLOW_COLOR, DEFAULT_STYLING_STOPS};
use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

static DEFAULT_THRESHOLDS: Lazy<StylingThresholds> = Lazy::new(|| StylingThresholds {
    stops: DEFAULT_STYLING_STOPS
        .iter()
        .map(|(max, color)| Threshold::new(*max, color))
        .collect(),
    overflow_color: DEFAULT_OVERFLOW_COLOR.to_string(),
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    pub max: f64,
    pub color: String,
}

impl Threshold {
    pub fn new(max: f64, color: &str) -> Self {
        Self { max, color: color.to_string() }
    }
}

/// Ordered breakpoints; `max` strictly increasing, first `max >= 0`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawThresholds", into = "RawThresholds")]
pub struct StylingThresholds {
    stops: Vec<Threshold>,
    overflow_color: String,
}

#[derive(Serialize, Deserialize)]
struct RawThresholds {
    stops: Vec<Threshold>,
    overflow_color: String,
}

impl TryFrom<RawThresholds> for StylingThresholds {
    type Error = Error;

    fn try_from(raw: RawThresholds) -> Result<Self> {
        StylingThresholds::new(raw.stops, &raw.overflow_color)
    }
}

impl From<StylingThresholds> for RawThresholds {
    fn from(t: StylingThresholds) -> Self {
        RawThresholds { stops: t.stops, overflow_color: t.overflow_color }
    }
}

impl Default for StylingThresholds {
    fn default() -> Self {
        DEFAULT_THRESHOLDS.clone()
    }
}

impl StylingThresholds {
    pub fn new(stops: Vec<Threshold>, overflow_color: &str) -> Result<Self> {
        let first = stops
            .first()
            .ok_or_else(|| Error::InvalidThresholds("at least one threshold is required".into()))?;
        if !first.max.is_finite() || first.max < 0.0 {
            return Err(Error::InvalidThresholds(format!(
                "first threshold must be >= 0, got {}",
                first.max
            )));
        }
        for pair in stops.windows(2) {
            if !pair[1].max.is_finite() || pair[1].max <= pair[0].max {
                return Err(Error::InvalidThresholds(format!(
                    "thresholds must be strictly increasing: {} then {}",
                    pair[0].max, pair[1].max
                )));
            }
        }
        Ok(Self { stops, overflow_color: overflow_color.to_string() })
    }

    pub fn stops(&self) -> &[Threshold] {
        &self.stops
    }

    pub fn overflow_color(&self) -> &str {
        &self.overflow_color
    }

    /// MapLibre fill-color expression:
    /// `["interpolate", ["linear"], ["get", "count"], 0, c1, m1, c2, ..., cN, mN, overflow]`
    pub fn color_ramp_expression(&self) -> Value {
        let mut expr = vec![json!("interpolate"), json!(["linear"]), json!(["get", "count"]), json!(0)];
        for stop in &self.stops {
            expr.push(json!(stop.color));
            expr.push(json!(stop.max));
        }
        expr.push(json!(self.overflow_color));
        Value::Array(expr)
    }

    /// Colour of the first bucket whose max is at or above `count`
    pub fn color_for_count(&self, count: u64) -> &str {
        let count = count as f64;
        self.stops
            .iter()
            .find(|stop| count <= stop.max)
            .map(|stop| stop.color.as_str())
            .unwrap_or(self.overflow_color.as_str())
    }
}

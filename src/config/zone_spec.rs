//! Declarative per-display zone partitions
//!
//! Each display is split along one axis by relative weights:
//!
//! ```toml
//! [[displays]]
//! orientation = "landscape"
//! columns = [10, 80, 10]
//!
//! [[displays]]
//! orientation = "portrait"
//! rows = [35, 40, 25]
//! ```
//!
//! Displays are matched to monitors in left-to-right, top-to-bottom order.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::Orientation;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplaySpec {
    pub orientation: Orientation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<Vec<f64>>,
}

impl DisplaySpec {
    pub fn landscape(columns: Vec<f64>) -> Self {
        Self {
            orientation: Orientation::Landscape,
            columns: Some(columns),
            rows: None,
        }
    }

    pub fn portrait(rows: Vec<f64>) -> Self {
        Self {
            orientation: Orientation::Portrait,
            columns: None,
            rows: Some(rows),
        }
    }

    /// Weights for the declared orientation: `columns` for landscape, `rows`
    /// for portrait. The other key is ignored if present.
    pub fn weights(&self, display: usize) -> Result<&[f64], ConfigError> {
        let (key, weights) = match self.orientation {
            Orientation::Landscape => ("columns", self.columns.as_deref()),
            Orientation::Portrait => ("rows", self.rows.as_deref()),
        };

        let weights = weights.ok_or(ConfigError::MissingWeights {
            display,
            orientation: self.orientation,
            expected: key,
        })?;

        if weights.is_empty() {
            return Err(ConfigError::EmptyWeights { display, key });
        }
        if let Some(&weight) = weights.iter().find(|w| !w.is_finite() || **w <= 0.0) {
            return Err(ConfigError::InvalidWeight { display, weight });
        }
        let total: f64 = weights.iter().sum();
        if !total.is_finite() {
            return Err(ConfigError::WeightSumOverflow { display, total });
        }

        Ok(weights)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ZoneSpec {
    pub displays: Vec<DisplaySpec>,
}

impl ZoneSpec {
    pub fn new(displays: Vec<DisplaySpec>) -> Self {
        Self { displays }
    }

    /// Check every display up front so a broken entry is reported before the
    /// window system is even queried.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (index, display) in self.displays.iter().enumerate() {
            display.weights(index)?;
        }
        Ok(())
    }

    pub fn check_monitor_count(&self, detected: usize) -> Result<(), ConfigError> {
        if self.displays.len() != detected {
            return Err(ConfigError::DisplayCountMismatch {
                configured: self.displays.len(),
                detected,
            });
        }
        Ok(())
    }
}

pub fn default_displays() -> Vec<DisplaySpec> {
    vec![
        DisplaySpec::landscape(vec![10.0, 80.0, 10.0]),
        DisplaySpec::portrait(vec![35.0, 40.0, 25.0]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weights_for_declared_orientation() {
        let spec = DisplaySpec::landscape(vec![1.0, 2.0]);
        assert_eq!(spec.weights(0).unwrap(), &[1.0, 2.0]);

        let spec = DisplaySpec::portrait(vec![3.0]);
        assert_eq!(spec.weights(0).unwrap(), &[3.0]);
    }

    #[test]
    fn test_wrong_key_for_orientation_is_an_error() {
        let spec = DisplaySpec {
            orientation: Orientation::Landscape,
            columns: None,
            rows: Some(vec![50.0, 50.0]),
        };
        assert!(matches!(
            spec.weights(3),
            Err(ConfigError::MissingWeights { display: 3, expected: "columns", .. })
        ));
    }

    #[test]
    fn test_missing_both_keys_is_an_error() {
        let spec = DisplaySpec {
            orientation: Orientation::Portrait,
            columns: None,
            rows: None,
        };
        assert!(matches!(
            spec.weights(0),
            Err(ConfigError::MissingWeights { expected: "rows", .. })
        ));
    }

    #[test]
    fn test_empty_and_non_positive_weights_rejected() {
        assert!(matches!(
            DisplaySpec::landscape(vec![]).weights(1),
            Err(ConfigError::EmptyWeights { display: 1, key: "columns" })
        ));
        assert!(matches!(
            DisplaySpec::landscape(vec![10.0, 0.0]).weights(0),
            Err(ConfigError::InvalidWeight { weight, .. }) if weight == 0.0
        ));
        assert!(DisplaySpec::portrait(vec![f64::NAN]).weights(0).is_err());
    }

    #[test]
    fn test_weights_whose_sum_overflows_rejected() {
        assert!(matches!(
            DisplaySpec::landscape(vec![1e308, 1e308]).weights(2),
            Err(ConfigError::WeightSumOverflow { display: 2, total }) if total.is_infinite()
        ));
        assert!(DisplaySpec::portrait(vec![1e308, 1.0]).weights(0).is_ok());
    }

    #[test]
    fn test_validate_reports_first_broken_display() {
        let spec = ZoneSpec::new(vec![
            DisplaySpec::landscape(vec![50.0, 50.0]),
            DisplaySpec {
                orientation: Orientation::Portrait,
                columns: Some(vec![1.0]),
                rows: None,
            },
        ]);
        assert!(matches!(
            spec.validate(),
            Err(ConfigError::MissingWeights { display: 1, .. })
        ));
    }

    #[test]
    fn test_monitor_count_mismatch() {
        let spec = ZoneSpec::new(default_displays());
        assert!(spec.check_monitor_count(2).is_ok());
        assert!(matches!(
            spec.check_monitor_count(1),
            Err(ConfigError::DisplayCountMismatch { configured: 2, detected: 1 })
        ));
    }

    #[test]
    fn test_deserialize_integer_weights_from_toml() {
        #[derive(Deserialize)]
        struct Wrapper {
            displays: Vec<DisplaySpec>,
        }

        let parsed: Wrapper = toml::from_str(
            r#"
            [[displays]]
            orientation = "landscape"
            columns = [10, 80, 10]

            [[displays]]
            orientation = "portrait"
            rows = [35.5, 64.5]
            "#,
        )
        .unwrap();

        assert_eq!(parsed.displays[0], DisplaySpec::landscape(vec![10.0, 80.0, 10.0]));
        assert_eq!(parsed.displays[1], DisplaySpec::portrait(vec![35.5, 64.5]));
    }
}

//! Soil-class weight mappings
//!
//! A mapping assigns each integral soil class a signed percentage of area
//! change in `[-100, 100]`. Mappings are validated when they are built, so
//! a bad configuration is rejected before any geometry is touched.

use hydrorisk_core::{Error, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Validated map from soil class to percentage change
#[derive(Debug, Clone, PartialEq)]
pub struct WeightMapping {
    weights: BTreeMap<i64, f64>,
}

fn invalid(value: impl Into<String>, reason: impl Into<String>) -> Error {
    Error::InvalidParameter {
        name: "weights",
        value: value.into(),
        reason: reason.into(),
    }
}

/// Parse a class key; `"3"`, `"3.0"` and `" 3 "` all read as class 3
fn parse_class(key: &str) -> Result<i64> {
    let v: f64 = key
        .trim()
        .parse()
        .map_err(|_| invalid(key, "class keys must be numbers"))?;
    if !v.is_finite() || v.fract() != 0.0 {
        return Err(invalid(key, "class keys must be integral"));
    }
    Ok(v as i64)
}

impl WeightMapping {
    /// Validate a mapping: every percentage finite and within `[-100, 100]`
    pub fn new(weights: BTreeMap<i64, f64>) -> Result<Self> {
        if weights.is_empty() {
            return Err(invalid("{}", "mapping is empty"));
        }
        for (class, pct) in &weights {
            if !pct.is_finite() || !(-100.0..=100.0).contains(pct) {
                return Err(invalid(
                    format!("{}={}", class, pct),
                    "percentages must lie in [-100, 100]",
                ));
            }
        }
        Ok(Self { weights })
    }

    /// Parse a JSON object such as `{"1": 55, "2": -35}`
    pub fn from_json(text: &str) -> Result<Self> {
        let raw: BTreeMap<String, f64> = serde_json::from_str(text)
            .map_err(|e| invalid(text.trim(), format!("expected a JSON object of numbers: {}", e)))?;
        let weights = raw
            .iter()
            .map(|(k, v)| Ok((parse_class(k)?, *v)))
            .collect::<Result<BTreeMap<_, _>>>()?;
        Self::new(weights)
    }

    /// Load a JSON mapping from disk
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::InputNotFound(path.to_path_buf()));
        }
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    /// Parse comma-separated `class=percent` pairs such as `1=55,2=-35`
    pub fn from_pairs(text: &str) -> Result<Self> {
        let mut weights = BTreeMap::new();
        for pair in text.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (k, v) = pair
                .split_once('=')
                .ok_or_else(|| invalid(pair, "expected class=percent"))?;
            let pct: f64 = v
                .trim()
                .parse()
                .map_err(|_| invalid(pair, "percent must be a number"))?;
            weights.insert(parse_class(k)?, pct);
        }
        Self::new(weights)
    }

    /// Percentage for a class value, if the value is integral and mapped
    pub fn get(&self, class: f64) -> Option<f64> {
        if !class.is_finite() || class.fract() != 0.0 {
            return None;
        }
        self.weights.get(&(class as i64)).copied()
    }

    /// Classes and percentages in ascending class order
    pub fn iter(&self) -> impl Iterator<Item = (i64, f64)> + '_ {
        self.weights.iter().map(|(k, v)| (*k, *v))
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

/// Soil infiltration classes 1 (most favourable) to 6, plus neutral class 7
impl Default for WeightMapping {
    fn default() -> Self {
        let weights = [(1, 55.0), (2, 35.0), (3, 15.0), (4, -15.0), (5, -35.0), (6, -55.0), (7, 0.0)];
        Self {
            weights: weights.into_iter().collect(),
        }
    }
}

/// JSON when the text starts with `{`, `class=percent` pairs otherwise
impl FromStr for WeightMapping {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.trim_start().starts_with('{') {
            Self::from_json(s)
        } else {
            Self::from_pairs(s)
        }
    }
}

impl fmt::Display for WeightMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pairs: Vec<String> = self.iter().map(|(k, v)| format!("{}={:+}", k, v)).collect();
        write!(f, "{}", pairs.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_mapping() {
        let w = WeightMapping::default();
        assert_eq!(w.len(), 7);
        assert_eq!(w.get(1.0), Some(55.0));
        assert_eq!(w.get(6.0), Some(-55.0));
        assert_eq!(w.get(7.0), Some(0.0));
        assert_eq!(w.get(8.0), None);
        assert_eq!(w.get(1.5), None);
    }

    #[test]
    fn test_from_json() {
        let w = WeightMapping::from_json(r#"{"1": 55, "2.0": -35.5}"#).unwrap();
        assert_eq!(w.get(2.0), Some(-35.5));
        assert_eq!(w.iter().map(|(k, _)| k).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_from_pairs_and_from_str() {
        let w: WeightMapping = "1=55, 2=-35".parse().unwrap();
        assert_eq!(w.get(1.0), Some(55.0));
        assert_eq!(w.get(2.0), Some(-35.0));
        assert_eq!(w.to_string(), "1=+55,2=-35");

        let j: WeightMapping = r#"{"3": 10}"#.parse().unwrap();
        assert_eq!(j.get(3.0), Some(10.0));
    }

    #[test]
    fn test_rejects_invalid() {
        assert!(WeightMapping::from_pairs("1=150").is_err());
        assert!(WeightMapping::from_pairs("a=10").is_err());
        assert!(WeightMapping::from_pairs("1.5=10").is_err());
        assert!(WeightMapping::from_pairs("1:10").is_err());
        assert!(WeightMapping::from_pairs("").is_err());
        assert!(WeightMapping::from_json(r#"{"1": "ten"}"#).is_err());
        assert!(WeightMapping::from_json("[1, 2]").is_err());
        assert!(matches!(
            WeightMapping::from_pairs("1=-101"),
            Err(Error::InvalidParameter { name: "weights", .. })
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            WeightMapping::from_json_file("/nonexistent/weights.json"),
            Err(Error::InputNotFound(_))
        ));
    }
}

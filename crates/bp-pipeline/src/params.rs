//! Stage construction parameters
//!
//! A typed key-value map mirroring what hosts hand to `add_stage`. The
//! getters surface every type or presence violation as `InvalidParams`
//! so stage factories can validate with `?`.

use bp_core::{DspError, DspResult, Sample};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Str(String),
    Num(f64),
    Bool(bool),
    FloatArray(Vec<Sample>),
    IntArray(Vec<i64>),
    /// (b, a) coefficient pairs, for filter-bank definitions
    CoeffPairs(Vec<(Vec<f64>, Vec<f64>)>),
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Str(v.to_owned())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Str(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Num(v)
    }
}

impl From<f32> for ParamValue {
    fn from(v: f32) -> Self {
        ParamValue::Num(v as f64)
    }
}

impl From<usize> for ParamValue {
    fn from(v: usize) -> Self {
        ParamValue::Num(v as f64)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::Num(v as f64)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<Vec<Sample>> for ParamValue {
    fn from(v: Vec<Sample>) -> Self {
        ParamValue::FloatArray(v)
    }
}

impl From<Vec<i64>> for ParamValue {
    fn from(v: Vec<i64>) -> Self {
        ParamValue::IntArray(v)
    }
}

#[derive(Debug, Clone, Default)]
pub struct StageParams {
    map: HashMap<String, ParamValue>,
}

impl StageParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<ParamValue>) -> Self {
        self.map.insert(key.to_owned(), value.into());
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<ParamValue>) {
        self.map.insert(key.to_owned(), value.into());
    }

    pub fn has(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    fn get(&self, key: &str) -> Option<&ParamValue> {
        self.map.get(key)
    }

    fn missing(key: &str) -> DspError {
        DspError::InvalidParams(format!("'{key}' is required"))
    }

    fn wrong_type(key: &str, expected: &str) -> DspError {
        DspError::InvalidParams(format!("'{key}' must be a {expected}"))
    }

    pub fn require_str(&self, key: &str) -> DspResult<&str> {
        match self.get(key) {
            Some(ParamValue::Str(s)) => Ok(s),
            Some(_) => Err(Self::wrong_type(key, "string")),
            None => Err(Self::missing(key)),
        }
    }

    pub fn opt_str(&self, key: &str) -> DspResult<Option<&str>> {
        match self.get(key) {
            Some(ParamValue::Str(s)) => Ok(Some(s)),
            Some(_) => Err(Self::wrong_type(key, "string")),
            None => Ok(None),
        }
    }

    pub fn str_or(&self, key: &str, default: &'static str) -> DspResult<String> {
        Ok(self.opt_str(key)?.unwrap_or(default).to_owned())
    }

    pub fn require_f64(&self, key: &str) -> DspResult<f64> {
        match self.get(key) {
            Some(ParamValue::Num(v)) => Ok(*v),
            Some(_) => Err(Self::wrong_type(key, "number")),
            None => Err(Self::missing(key)),
        }
    }

    pub fn opt_f64(&self, key: &str) -> DspResult<Option<f64>> {
        match self.get(key) {
            Some(ParamValue::Num(v)) => Ok(Some(*v)),
            Some(_) => Err(Self::wrong_type(key, "number")),
            None => Ok(None),
        }
    }

    pub fn f64_or(&self, key: &str, default: f64) -> DspResult<f64> {
        Ok(self.opt_f64(key)?.unwrap_or(default))
    }

    pub fn require_f32(&self, key: &str) -> DspResult<Sample> {
        Ok(self.require_f64(key)? as Sample)
    }

    pub fn f32_or(&self, key: &str, default: Sample) -> DspResult<Sample> {
        Ok(self.f64_or(key, default as f64)? as Sample)
    }

    pub fn require_usize(&self, key: &str) -> DspResult<usize> {
        let v = self.require_f64(key)?;
        if v < 0.0 || v.fract() != 0.0 {
            return Err(DspError::InvalidParams(format!(
                "'{key}' must be a non-negative integer"
            )));
        }
        Ok(v as usize)
    }

    pub fn opt_usize(&self, key: &str) -> DspResult<Option<usize>> {
        match self.opt_f64(key)? {
            Some(v) if v >= 0.0 && v.fract() == 0.0 => Ok(Some(v as usize)),
            Some(_) => Err(DspError::InvalidParams(format!(
                "'{key}' must be a non-negative integer"
            ))),
            None => Ok(None),
        }
    }

    pub fn usize_or(&self, key: &str, default: usize) -> DspResult<usize> {
        Ok(self.opt_usize(key)?.unwrap_or(default))
    }

    pub fn bool_or(&self, key: &str, default: bool) -> DspResult<bool> {
        match self.get(key) {
            Some(ParamValue::Bool(v)) => Ok(*v),
            Some(_) => Err(Self::wrong_type(key, "boolean")),
            None => Ok(default),
        }
    }

    pub fn require_f32_array(&self, key: &str) -> DspResult<&[Sample]> {
        match self.get(key) {
            Some(ParamValue::FloatArray(v)) => Ok(v),
            Some(_) => Err(Self::wrong_type(key, "float array")),
            None => Err(Self::missing(key)),
        }
    }

    pub fn require_int_array(&self, key: &str) -> DspResult<&[i64]> {
        match self.get(key) {
            Some(ParamValue::IntArray(v)) => Ok(v),
            Some(_) => Err(Self::wrong_type(key, "integer array")),
            None => Err(Self::missing(key)),
        }
    }

    pub fn require_coeff_pairs(&self, key: &str) -> DspResult<&[(Vec<f64>, Vec<f64>)]> {
        match self.get(key) {
            Some(ParamValue::CoeffPairs(v)) => Ok(v),
            Some(_) => Err(Self::wrong_type(key, "coefficient pair array")),
            None => Err(Self::missing(key)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_getters() {
        let params = StageParams::new()
            .with("mode", "moving")
            .with("windowSize", 64usize)
            .with("epsilon", 1e-6f64)
            .with("normalized", true)
            .with("kernel", vec![1.0f32, 0.5]);

        assert_eq!(params.require_str("mode").unwrap(), "moving");
        assert_eq!(params.require_usize("windowSize").unwrap(), 64);
        assert!((params.f64_or("epsilon", 0.0).unwrap() - 1e-6).abs() < 1e-12);
        assert!(params.bool_or("normalized", false).unwrap());
        assert_eq!(params.require_f32_array("kernel").unwrap(), &[1.0, 0.5]);
    }

    #[test]
    fn test_missing_and_wrong_type() {
        let params = StageParams::new().with("windowSize", 8usize);
        assert!(matches!(
            params.require_str("mode"),
            Err(DspError::InvalidParams(_))
        ));
        assert!(matches!(
            params.require_str("windowSize"),
            Err(DspError::InvalidParams(_))
        ));
    }

    #[test]
    fn test_fractional_usize_rejected() {
        let params = StageParams::new().with("windowSize", 2.5f64);
        assert!(params.require_usize("windowSize").is_err());
    }

    #[test]
    fn test_defaults() {
        let params = StageParams::new();
        assert_eq!(params.usize_or("order", 51).unwrap(), 51);
        assert_eq!(params.str_or("method", "auto").unwrap(), "auto");
        assert!(!params.bool_or("normalized", false).unwrap());
    }
}

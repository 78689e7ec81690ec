use serde::{Deserialize, Serialize};

use crate::interpolate::interpolate;
use crate::{ModelError, ModelResult};

/// Values sampled at strictly increasing times. NaN samples are allowed and mean "no value".
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Timeseries {
    times: Vec<f64>,
    values: Vec<f64>,
}

impl Timeseries {
    pub fn new(times: Vec<f64>, values: Vec<f64>) -> ModelResult<Self> {
        if times.len() != values.len() {
            return Err(ModelError::LengthMismatch {
                what: "timeseries",
                expected: times.len(),
                actual: values.len(),
            });
        }
        if times.iter().any(|t| !t.is_finite()) || times.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ModelError::NonIncreasingTimes);
        }
        Ok(Self { times, values })
    }

    /// A series holding `value` at every time.
    pub fn filled(times: &[f64], value: f64) -> ModelResult<Self> {
        Self::new(times.to_vec(), vec![value; times.len()])
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// True when no sample carries a finite value.
    pub fn has_no_finite_values(&self) -> bool {
        !self.values.iter().any(|v| v.is_finite())
    }

    /// Linear resampling onto `grid`, using `left`/`right` outside the sampled domain.
    pub fn resample(&self, grid: &[f64], left: f64, right: f64) -> Vec<f64> {
        interpolate(grid, &self.times, &self.values, left, right)
    }
}

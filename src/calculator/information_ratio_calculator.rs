use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    error::{ComputeError, EngineResult},
    math::stats::{ols_slope, round2, std_dev},
};

/// A named, dated series of return values (percent).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedSeries {
    name: String,
    points: Vec<(NaiveDate, f64)>,
}

impl NamedSeries {
    pub fn new(name: impl Into<String>, points: Vec<(NaiveDate, f64)>) -> Self {
        Self {
            name: name.into(),
            points,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn points(&self) -> &[(NaiveDate, f64)] {
        &self.points
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|(_, v)| *v).collect()
    }
}

/// Trend-based information ratio of a subject series against a benchmark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InformationRatio {
    pub subject: String,
    pub benchmark: String,
    /// OLS trend slope of the subject minus that of the benchmark.
    pub excess_return: f64,
    /// Sample standard deviation of the pointwise return difference.
    pub tracking_error: f64,
    pub information_ratio: f64,
    /// Number of dates both series share.
    pub observations: usize,
}

/// Compares the trend slopes of two series normalized by their tracking error.
///
/// Both series are aligned on the dates they share; the time index of the trend fit
/// is the position in that common axis.
#[derive(Debug, Clone, Copy, Default)]
pub struct InformationRatioCalculator;

impl InformationRatioCalculator {
    /// # Errors
    /// - [`ComputeError::InsufficientData`] with fewer than two shared dates
    /// - [`ComputeError::DivisionByZero`] if the tracking error is zero up to
    ///   floating point noise, e.g. a constant offset between the series
    #[tracing::instrument(skip_all, fields(subject = subject.name(), benchmark = benchmark.name()))]
    pub fn calculate(subject: &NamedSeries, benchmark: &NamedSeries) -> EngineResult<InformationRatio> {
        let benchmark_by_date: BTreeMap<NaiveDate, f64> = benchmark.points().iter().copied().collect();

        let (subject_values, benchmark_values): (Vec<f64>, Vec<f64>) = subject
            .points()
            .iter()
            .filter_map(|(date, v)| benchmark_by_date.get(date).map(|b| (*v, *b)))
            .unzip();

        let observations = subject_values.len();
        let insufficient = || {
            ComputeError::InsufficientData(format!(
                "'{}' and '{}' share {observations} dates, at least 2 are required",
                subject.name(),
                benchmark.name()
            ))
        };

        let subject_slope = ols_slope(&subject_values).ok_or_else(insufficient)?;
        let benchmark_slope = ols_slope(&benchmark_values).ok_or_else(insufficient)?;

        let differences: Vec<f64> = subject_values
            .iter()
            .zip(&benchmark_values)
            .map(|(s, b)| s - b)
            .collect();
        let tracking_error = std_dev(&differences, 1).ok_or_else(insufficient)?;

        if is_negligible(tracking_error, &differences) {
            tracing::warn!("Tracking error is zero, information ratio undefined");
            return Err(ComputeError::DivisionByZero(format!(
                "tracking error between '{}' and '{}' is zero",
                subject.name(),
                benchmark.name()
            ))
            .into());
        }

        let excess_return = subject_slope - benchmark_slope;
        Ok(InformationRatio {
            subject: subject.name().to_string(),
            benchmark: benchmark.name().to_string(),
            excess_return,
            tracking_error,
            information_ratio: round2(excess_return / tracking_error),
            observations,
        })
    }
}

/// Relative tolerance below which a tracking error is rounding noise.
const TRACKING_ERROR_TOLERANCE: f64 = 1e-9;

fn is_negligible(tracking_error: f64, differences: &[f64]) -> bool {
    let scale = differences.iter().map(|d| d.abs()).fold(1.0, f64::max);
    tracking_error <= TRACKING_ERROR_TOLERANCE * scale
}

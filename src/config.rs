use std::{fs, path::Path};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    data::{domain::Period, window::DateWindow},
    error::{EngineError, EngineResult, IoError},
};

/// Largest `years_back` / `years_forward` a configuration accepts.
pub const MAX_WINDOW_YEARS: u32 = 200;

/// Explicit settings of one return analysis run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Aggregation period the daily prices are collapsed to.
    period: Period,

    /// Columns identifying an entity, e.g. `["Ticker"]` or `["Ticker", "Sector"]`.
    group_keys: Vec<String>,

    /// Upper bound on the number of period panels of a top-returns layout.
    max_panels: usize,

    /// Full calendar years of history to load.
    years_back: u32,

    /// Calendar years past the current one to include. `0` stops at yesterday.
    years_forward: u32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            period: Period::Month,
            group_keys: vec!["Ticker".to_string()],
            max_panels: 48,
            years_back: 5,
            years_forward: 0,
        }
    }
}

impl AnalysisConfig {
    pub fn new(period: Period) -> Self {
        Self {
            period,
            ..Default::default()
        }
    }

    /// Loads and validates a configuration from a JSON file. Missing fields take
    /// their default.
    pub fn from_json_file(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(IoError::Io)?;
        let config: Self = serde_json::from_str(&raw).map_err(IoError::Json)?;
        tracing::debug!(path = %path.display(), ?config, "Loaded analysis config");
        config.validated()
    }

    pub fn with_group_keys<I, S>(self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            group_keys: keys.into_iter().map(Into::into).collect(),
            ..self
        }
    }

    pub fn with_max_panels(self, max_panels: usize) -> Self {
        Self { max_panels, ..self }
    }

    pub fn with_years(self, years_back: u32, years_forward: u32) -> Self {
        Self {
            years_back,
            years_forward,
            ..self
        }
    }

    /// # Errors
    /// [`EngineError::Config`] without group keys, with `max_panels == 0` or with a
    /// window reaching more than [`MAX_WINDOW_YEARS`] in either direction.
    pub fn validated(self) -> EngineResult<Self> {
        if self.group_keys.is_empty() {
            return Err(EngineError::Config(
                "at least one group key column is required".to_string(),
            ));
        }
        if self.group_keys.iter().any(|k| k.trim().is_empty()) {
            return Err(EngineError::Config("group key names must not be blank".to_string()));
        }
        if self.max_panels == 0 {
            return Err(EngineError::Config("max_panels must be positive (> 0)".to_string()));
        }
        if self.years_back > MAX_WINDOW_YEARS || self.years_forward > MAX_WINDOW_YEARS {
            return Err(EngineError::Config(format!(
                "years_back ({}) and years_forward ({}) must not exceed {MAX_WINDOW_YEARS}",
                self.years_back, self.years_forward
            )));
        }
        Ok(self)
    }

    pub fn period(&self) -> Period {
        self.period
    }

    pub fn group_keys(&self) -> &[String] {
        &self.group_keys
    }

    pub fn max_panels(&self) -> usize {
        self.max_panels
    }

    /// The window prices should be loaded for, relative to `today`.
    pub fn date_window(&self, today: NaiveDate) -> EngineResult<DateWindow> {
        DateWindow::for_years(self.years_back, self.years_forward, today)
    }
}

use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

// ================================================================================================
// Period
// ================================================================================================

/// Aggregation granularity of a price or return table.
///
/// The period controls both how daily rows are bucketed and the annualization
/// factor applied to returns and volatility.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    EnumIter,
    IntoStaticStr,
    Default,
)]
pub enum Period {
    Year,
    Quarter,
    Month,
    #[default]
    Daily,
}

impl Period {
    /// Number of periods in one year (1, 4, 12 or 252 trading days).
    pub fn periods_per_year(&self) -> u16 {
        match self {
            Period::Year => 1,
            Period::Quarter => 4,
            Period::Month => 12,
            Period::Daily => 252,
        }
    }

    /// `true` for every period finer than a year.
    pub fn is_sub_annual(&self) -> bool {
        !matches!(self, Period::Year)
    }

    /// Prefix used for report column names, e.g. `"Month "`. Daily has no prefix.
    pub fn column_prefix(&self) -> &'static str {
        match self {
            Period::Year => "Year ",
            Period::Quarter => "Quarter ",
            Period::Month => "Month ",
            Period::Daily => "",
        }
    }

    /// Builds a `<PeriodLabel> <Metric>` column name.
    pub fn column(&self, metric: &str) -> String {
        format!("{}{}", self.column_prefix(), metric)
    }

    /// The bucket a date falls into: `(year, quarter | month)`.
    ///
    /// The second component is `0` for [`Period::Year`] and the day ordinal for
    /// [`Period::Daily`], so every date is its own bucket.
    pub fn bucket(&self, date: NaiveDate) -> (i32, u32) {
        match self {
            Period::Year => (date.year(), 0),
            Period::Quarter => (date.year(), quarter_of(date)),
            Period::Month => (date.year(), date.month()),
            Period::Daily => (date.year(), date.ordinal()),
        }
    }

    /// Human readable label of the bucket containing `date`.
    ///
    /// # Examples
    /// - Year: `2024`
    /// - Quarter: `2024-Q1`
    /// - Month: `2024-01`
    /// - Daily: `2024-01-31`
    pub fn label(&self, date: NaiveDate) -> String {
        match self {
            Period::Year => date.year().to_string(),
            Period::Quarter => format!("{}-Q{}", date.year(), quarter_of(date)),
            Period::Month => format!("{}-{:02}", date.year(), date.month()),
            Period::Daily => date.format("%Y-%m-%d").to_string(),
        }
    }

    /// Short label with an abbreviated month name (`Jan-2024`), used by panel layouts.
    /// Falls back to [`Period::label`] for every period other than Month.
    pub fn short_label(&self, date: NaiveDate) -> String {
        match self {
            Period::Month => date.format("%b-%Y").to_string(),
            _ => self.label(date),
        }
    }
}

pub(crate) fn quarter_of(date: NaiveDate) -> u32 {
    (date.month() - 1) / 3 + 1
}

// ================================================================================================
// Group Key
// ================================================================================================

/// Identifies the entity a series belongs to (e.g. a ticker, or ticker + sector).
///
/// Ordering is lexicographic over the parts, which gives the `(GroupKey, Date)`
/// ordering every calculator relies on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupKey(SmallVec<[String; 2]>);

impl GroupKey {
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(parts.into_iter().map(Into::into).collect())
    }

    pub fn single(part: impl Into<String>) -> Self {
        Self::new([part])
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0.join("/"))
    }
}

impl From<&str> for GroupKey {
    fn from(value: &str) -> Self {
        Self::single(value)
    }
}

// ================================================================================================
// Price Row
// ================================================================================================

/// One OHLCV observation of an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRow {
    pub key: GroupKey,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl PriceRow {
    /// Convenience constructor for a row where High/Low are derived from Open/Close.
    pub fn from_open_close(
        key: impl Into<GroupKey>,
        date: NaiveDate,
        open: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            key: key.into(),
            date,
            open,
            high: open.max(close),
            low: open.min(close),
            close,
            volume,
        }
    }
}

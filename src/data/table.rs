use std::path::Path;

use polars::prelude::{DataFrame, LazyCsvReader, LazyFileListReader, PlPath};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, IntoStaticStr};

use crate::{
    data::{
        domain::{GroupKey, Period, PriceRow},
        window::DateWindow,
    },
    error::{DataError, EngineResult, IoError},
    report::polars_ext::{DataFrameExt, polars_to_engine_error},
};

/// The OHLCV columns every price frame must carry besides its group key columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, IntoStaticStr, Display)]
pub enum PriceCol {
    Date,
    Open,
    High,
    Low,
    Close,
    Volume,
}

impl PriceCol {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

/// A validated, chronologically ordered set of price rows at one aggregation period.
///
/// Construction sorts the rows by `(GroupKey, Date)` and rejects prices a return
/// can not be computed from (non-finite, zero or negative Open/Close).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceTable {
    period: Period,
    group_cols: Vec<String>,
    rows: Vec<PriceRow>,
}

impl PriceTable {
    /// Builds a daily price table.
    pub fn new(group_cols: Vec<String>, rows: Vec<PriceRow>) -> EngineResult<Self> {
        Self::with_period(Period::Daily, group_cols, rows)
    }

    pub fn with_period(
        period: Period,
        group_cols: Vec<String>,
        mut rows: Vec<PriceRow>,
    ) -> EngineResult<Self> {
        if group_cols.is_empty() {
            return Err(DataError::MissingColumn("<group key>".to_string()).into());
        }
        for row in &rows {
            validate_row(row, group_cols.len())?;
        }
        rows.sort_by(|a, b| a.key.cmp(&b.key).then(a.date.cmp(&b.date)));

        Ok(Self {
            period,
            group_cols,
            rows,
        })
    }

    /// Reads a price table from a frame with the given group key columns plus the
    /// [`PriceCol`] columns.
    ///
    /// # Errors
    /// - [`DataError::MissingColumn`] if a group key or price column is absent.
    /// - [`DataError::DateParse`] if the `Date` column can not be parsed.
    pub fn try_from_df<S: AsRef<str>>(df: &DataFrame, group_cols: &[S]) -> EngineResult<Self> {
        let group_cols: Vec<String> = group_cols.iter().map(|c| c.as_ref().to_string()).collect();
        if group_cols.is_empty() {
            return Err(DataError::MissingColumn("<group key>".to_string()).into());
        }

        let rows = read_price_rows(df, &group_cols)?;
        Self::new(group_cols, rows)
    }

    /// Loads a daily price table from a CSV file with a header row.
    pub fn from_csv<S: AsRef<str>>(path: impl AsRef<Path>, group_cols: &[S]) -> EngineResult<Self> {
        let path = path.as_ref();
        let uri = path.to_str().ok_or_else(|| {
            IoError::FileSystem(format!(
                "Path contains invalid UTF-8 characters: {}",
                path.display()
            ))
        })?;

        let df = LazyCsvReader::new(PlPath::new(uri))
            .with_has_header(true)
            .with_try_parse_dates(true)
            .finish()
            .map_err(|e| polars_to_engine_error("price table", e))?
            .collect()
            .map_err(|e| polars_to_engine_error("price table", e))?;

        tracing::debug!(path = %path.display(), rows = df.height(), "Loaded price CSV");
        Self::try_from_df(&df, group_cols)
    }

    pub fn period(&self) -> Period {
        self.period
    }

    pub fn group_cols(&self) -> &[String] {
        &self.group_cols
    }

    pub fn rows(&self) -> &[PriceRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows dated inside `window`, keeping period and group columns.
    pub fn within(&self, window: &DateWindow) -> Self {
        Self {
            period: self.period,
            group_cols: self.group_cols.clone(),
            rows: self
                .rows
                .iter()
                .filter(|r| window.contains(r.date))
                .cloned()
                .collect(),
        }
    }

    /// Contiguous slices of rows sharing one group key, in key order.
    pub fn groups(&self) -> impl Iterator<Item = &[PriceRow]> {
        self.rows.chunk_by(|a, b| a.key == b.key)
    }
}

/// Reads the group key, `Date` and OHLCV columns of `df` without validating prices.
pub(crate) fn read_price_rows(df: &DataFrame, group_cols: &[String]) -> EngineResult<Vec<PriceRow>> {
    let key_parts = group_cols
        .iter()
        .map(|c| df.string_values(c))
        .collect::<EngineResult<Vec<_>>>()?;
    let dates = df.date_values(PriceCol::Date.as_str())?;
    let open = df.f64_values(PriceCol::Open.as_str())?;
    let high = df.f64_values(PriceCol::High.as_str())?;
    let low = df.f64_values(PriceCol::Low.as_str())?;
    let close = df.f64_values(PriceCol::Close.as_str())?;
    let volume = df.f64_values(PriceCol::Volume.as_str())?;

    Ok((0..df.height())
        .map(|i| PriceRow {
            key: GroupKey::new(key_parts.iter().map(|parts| parts[i].clone())),
            date: dates[i],
            open: open[i],
            high: high[i],
            low: low[i],
            close: close[i],
            volume: volume[i],
        })
        .collect())
}

pub(crate) fn validate_row(row: &PriceRow, key_len: usize) -> EngineResult<()> {
    if row.key.parts().len() != key_len {
        return Err(DataError::MissingColumn(format!(
            "group key '{}' has {} parts, expected {key_len}",
            row.key,
            row.key.parts().len()
        ))
        .into());
    }

    let invalid = |msg: &str| DataError::InvalidPrice {
        key: row.key.to_string(),
        date: row.date.to_string(),
        msg: msg.to_string(),
    };

    if !row.open.is_finite() || row.open <= 0.0 {
        return Err(invalid(&format!("open must be positive, got {}", row.open)).into());
    }
    if !row.close.is_finite() || row.close <= 0.0 {
        return Err(invalid(&format!("close must be positive, got {}", row.close)).into());
    }
    if !row.high.is_finite() || !row.low.is_finite() || !row.volume.is_finite() {
        return Err(invalid("high, low and volume must be finite").into());
    }
    Ok(())
}

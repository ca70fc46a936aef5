use chrono::{Datelike, NaiveDate, NaiveDateTime};
use polars::prelude::{Column, DataFrame, DataType, JsonFormat, JsonWriter, SerWriter};
use serde_json::Value;

use crate::error::{DataError, EngineError, EngineResult, IoError};

/// Days between 0001-01-01 (CE) and the Unix epoch, the physical origin of polars dates.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

pub(crate) fn polars_to_engine_error(report: &str, e: polars::error::PolarsError) -> EngineError {
    EngineError::Data(DataError::DataFrame(format!(
        "Error while building {report} DataFrame: {e}"
    )))
}

pub(crate) fn date_to_epoch_days(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

pub(crate) fn epoch_days_to_date(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days.checked_add(UNIX_EPOCH_DAYS_FROM_CE)?)
}

/// Parses `%Y-%m-%d`, optionally followed by a time part.
pub(crate) fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if let Ok(d) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(d);
    }
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|dt| dt.date())
}

/// Typed, null-checked access to named columns.
///
/// Every accessor fails with [`DataError::MissingColumn`] if the column is absent
/// and with [`DataError::NullValue`] on the first null it meets.
pub trait DataFrameExt {
    fn require_column(&self, name: &str) -> EngineResult<&Column>;

    fn f64_values(&self, name: &str) -> EngineResult<Vec<f64>>;

    fn string_values(&self, name: &str) -> EngineResult<Vec<String>>;

    /// Accepts `Date`, `Datetime` and string columns.
    fn date_values(&self, name: &str) -> EngineResult<Vec<NaiveDate>>;

    fn to_json_rows(&self) -> EngineResult<Vec<serde_json::Map<String, Value>>>;
}

impl DataFrameExt for DataFrame {
    fn require_column(&self, name: &str) -> EngineResult<&Column> {
        self.column(name)
            .map_err(|_| DataError::MissingColumn(name.to_string()).into())
    }

    fn f64_values(&self, name: &str) -> EngineResult<Vec<f64>> {
        let column = self.require_column(name)?;
        if matches!(column.dtype(), DataType::String | DataType::Boolean) {
            return Err(DataError::InvalidColumnType {
                column: name.to_string(),
                msg: format!("expected a numeric column, found {}", column.dtype()),
            }
            .into());
        }

        let casted = column
            .cast(&DataType::Float64)
            .map_err(|e| type_err(name, e))?;
        let ca = casted.f64().map_err(|e| type_err(name, e))?;

        ca.into_iter()
            .enumerate()
            .map(|(row, v)| v.ok_or_else(|| null_err(name, row)))
            .collect()
    }

    fn string_values(&self, name: &str) -> EngineResult<Vec<String>> {
        let column = self.require_column(name)?;
        let casted = column
            .cast(&DataType::String)
            .map_err(|e| type_err(name, e))?;
        let ca = casted.str().map_err(|e| type_err(name, e))?;

        ca.into_iter()
            .enumerate()
            .map(|(row, v)| v.map(str::to_string).ok_or_else(|| null_err(name, row)))
            .collect()
    }

    fn date_values(&self, name: &str) -> EngineResult<Vec<NaiveDate>> {
        let column = self.require_column(name)?;
        match column.dtype() {
            DataType::String => {
                let ca = column.str().map_err(|e| type_err(name, e))?;
                ca.into_iter()
                    .enumerate()
                    .map(|(row, v)| -> EngineResult<NaiveDate> {
                        let raw = v.ok_or_else(|| null_err(name, row))?;
                        parse_date(raw).ok_or_else(|| {
                            DataError::DateParse {
                                column: name.to_string(),
                                value: raw.to_string(),
                            }
                            .into()
                        })
                    })
                    .collect()
            }
            DataType::Date | DataType::Datetime(_, _) => {
                let days = column
                    .cast(&DataType::Date)
                    .and_then(|c| c.cast(&DataType::Int32))
                    .map_err(|e| type_err(name, e))?;
                let ca = days.i32().map_err(|e| type_err(name, e))?;
                ca.into_iter()
                    .enumerate()
                    .map(|(row, v)| -> EngineResult<NaiveDate> {
                        let raw = v.ok_or_else(|| null_err(name, row))?;
                        epoch_days_to_date(raw).ok_or_else(|| {
                            DataError::DateParse {
                                column: name.to_string(),
                                value: raw.to_string(),
                            }
                            .into()
                        })
                    })
                    .collect()
            }
            other => Err(DataError::InvalidColumnType {
                column: name.to_string(),
                msg: format!("expected a date or string column, found {other}"),
            }
            .into()),
        }
    }

    fn to_json_rows(&self) -> EngineResult<Vec<serde_json::Map<String, Value>>> {
        let height = self.height();
        if height == 0 {
            return Ok(Vec::new());
        }

        // Heuristic: approx 2^6 bytes per cell
        let estimated_row_size = self.width() * (1 << 6);
        let mut buf = Vec::with_capacity(height * estimated_row_size);

        JsonWriter::new(&mut buf)
            .with_json_format(JsonFormat::Json)
            .finish(&mut self.clone())
            .map_err(|e| DataError::DataFrame(e.to_string()))?;

        let json_val: Value = serde_json::from_slice(&buf).map_err(IoError::Json)?;

        match json_val {
            Value::Array(rows) => Ok(rows
                .into_iter()
                .filter_map(|v| match v {
                    Value::Object(map) => Some(map),
                    _ => None,
                })
                .collect()),
            _ => {
                Err(DataError::DataFrame("Polars JSON output was not an array".to_string()).into())
            }
        }
    }
}

// ================================================================================================
// Frame Builder
// ================================================================================================

/// Column-by-column construction of a report frame from typed rows.
#[derive(Debug, Default)]
pub(crate) struct FrameBuilder {
    columns: Vec<Column>,
}

impl FrameBuilder {
    pub(crate) fn with_capacity(width: usize) -> Self {
        Self {
            columns: Vec::with_capacity(width),
        }
    }

    pub(crate) fn f64(mut self, name: &str, values: Vec<f64>) -> Self {
        self.columns.push(Column::new(name.into(), values));
        self
    }

    pub(crate) fn str(mut self, name: &str, values: Vec<String>) -> Self {
        self.columns.push(Column::new(name.into(), values));
        self
    }

    pub(crate) fn i32(mut self, name: &str, values: Vec<i32>) -> Self {
        self.columns.push(Column::new(name.into(), values));
        self
    }

    pub(crate) fn u32(mut self, name: &str, values: Vec<u32>) -> Self {
        self.columns.push(Column::new(name.into(), values));
        self
    }

    pub(crate) fn date(mut self, name: &str, values: &[NaiveDate]) -> EngineResult<Self> {
        let days: Vec<i32> = values.iter().map(|d| date_to_epoch_days(*d)).collect();
        let column = Column::new(name.into(), days)
            .cast(&DataType::Date)
            .map_err(|e| type_err(name, e))?;
        self.columns.push(column);
        Ok(self)
    }

    pub(crate) fn finish(self, report: &str) -> EngineResult<DataFrame> {
        DataFrame::new(self.columns).map_err(|e| polars_to_engine_error(report, e))
    }
}

// ================================================================================================
// Helper Functions
// ================================================================================================

fn type_err(column: &str, e: polars::error::PolarsError) -> EngineError {
    DataError::InvalidColumnType {
        column: column.to_string(),
        msg: e.to_string(),
    }
    .into()
}

fn null_err(column: &str, row: usize) -> EngineError {
    DataError::NullValue {
        column: column.to_string(),
        row,
    }
    .into()
}

#[cfg(test)]
mod tests {
    use polars::df;

    use super::*;

    #[test]
    fn test_epoch_day_conversion() {
        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).expect("valid date");
        assert_eq!(date_to_epoch_days(epoch), 0);
        let d = NaiveDate::from_ymd_opt(2024, 2, 29).expect("valid date");
        assert_eq!(epoch_days_to_date(date_to_epoch_days(d)), Some(d));
    }

    #[test]
    fn test_parse_date_formats() {
        let want = NaiveDate::from_ymd_opt(2023, 7, 3);
        assert_eq!(parse_date("2023-07-03"), want);
        assert_eq!(parse_date("2023-07-03 16:00:00"), want);
        assert_eq!(parse_date("2023-07-03T16:00:00"), want);
        assert_eq!(parse_date("03/07/2023"), None);
    }

    #[test]
    fn test_missing_column_is_reported_by_name() {
        let df = df!["Close" => &[1.0, 2.0]].expect("Failed to create DF");
        let err = df.f64_values("Open").expect_err("Open is absent");
        assert!(
            matches!(err, EngineError::Data(DataError::MissingColumn(ref c)) if c == "Open"),
            "unexpected error: {err:?}"
        );
    }

    #[test]
    fn test_integer_columns_are_widened() {
        let df = df!["Volume" => &[10i64, 20, 30]].expect("Failed to create DF");
        let have = df.f64_values("Volume").expect("numeric column");
        assert_eq!(have, vec![10.0, 20.0, 30.0]);
    }

    #[test]
    fn test_string_column_rejected_as_numeric() {
        let df = df!["Close" => &["a", "b"]].expect("Failed to create DF");
        assert!(matches!(
            df.f64_values("Close"),
            Err(EngineError::Data(DataError::InvalidColumnType { .. }))
        ));
    }

    #[test]
    fn test_null_values_are_rejected() {
        let df = df!["Close" => &[Some(1.0), None]].expect("Failed to create DF");
        assert!(matches!(
            df.f64_values("Close"),
            Err(EngineError::Data(DataError::NullValue { row: 1, .. }))
        ));
    }

    #[test]
    fn test_unparseable_date_string() {
        let df = df!["Date" => &["2024-01-02", "not a date"]].expect("Failed to create DF");
        assert!(matches!(
            df.date_values("Date"),
            Err(EngineError::Data(DataError::DateParse { .. }))
        ));
    }

    #[test]
    fn test_frame_builder_round_trips_dates() {
        let dates = [
            NaiveDate::from_ymd_opt(2023, 12, 29).expect("valid date"),
            NaiveDate::from_ymd_opt(2024, 1, 2).expect("valid date"),
        ];
        let df = FrameBuilder::with_capacity(2)
            .str("Ticker", vec!["AAPL".into(), "AAPL".into()])
            .date("Date", &dates)
            .expect("date column")
            .finish("test")
            .expect("frame");

        assert_eq!(df.column("Date").expect("Date").dtype(), &DataType::Date);
        assert_eq!(df.date_values("Date").expect("dates"), dates.to_vec());
    }

    #[test]
    fn test_frame_builder_rejects_ragged_columns() {
        let result = FrameBuilder::default()
            .f64("a", vec![1.0, 2.0])
            .f64("b", vec![1.0])
            .finish("test");
        assert!(matches!(
            result,
            Err(EngineError::Data(DataError::DataFrame(_)))
        ));
    }

    #[test]
    fn test_string_dates_parse() {
        let df = df!["Date" => &["2024-01-02", "2024-01-03"]].expect("Failed to create DF");
        let have = df.date_values("Date").expect("valid dates");
        assert_eq!(have[1], NaiveDate::from_ymd_opt(2024, 1, 3).expect("valid date"));
    }
}

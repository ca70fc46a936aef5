use std::{fs, path::Path};

use polars::{
    frame::DataFrame,
    prelude::{
        CsvWriterOptions, IntoLazy, LazyFrame, ParquetWriteOptions, PlPath, SchemaRef, SinkOptions,
        SinkTarget, col,
    },
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::{
    data::domain::Period,
    error::{DataError, EngineResult, IoError},
    report::polars_ext::{DataFrameExt, polars_to_engine_error},
};

// ================================================================================================
// Traits
// ================================================================================================

/// Defines a common interface for all report types (Returns, Drawdowns, etc.).
pub trait Report {
    /// Access the underlying DataFrame (Immutable).
    fn as_df(&self) -> &DataFrame;

    /// Access the underlying DataFrame (Mutable).
    fn as_df_mut(&mut self) -> &mut DataFrame;
}

pub trait ReportName {
    fn base_name(&self) -> String;

    fn filename(&self, ext: FileExtension) -> String {
        format!("{}.{}", self.base_name(), ext)
    }
}

pub trait ToSchema {
    /// Returns the canonical schema of this report.
    ///
    /// Column names depend on the aggregation period and the group key columns, so
    /// the schema belongs to the report instance rather than to its type.
    fn to_schema(&self) -> SchemaRef;
}

pub trait AsFormattedLazyFrame {
    fn as_formatted_lf(&self) -> LazyFrame;
}

pub trait ToJson {
    /// Serializes the report to a generic JSON Value.
    /// Returns a `Value::Array` containing row objects.
    fn to_json(&self) -> EngineResult<serde_json::Value>;
}

pub trait ToCsv {
    /// Writes the report to a CSV file in the target directory.
    ///
    /// # Arguments
    /// - `dir`: Target directory. Created if it doesn't exist.
    /// - `opts`: CSV writing options (delimiter, headers, etc.).
    ///
    /// # Side Effects
    /// - Creates the directory if missing.
    /// - Overwrites the file if it exists.
    fn to_csv(
        &self,
        dir: impl AsRef<Path>,
        opts: Option<&CsvWriterOptions>,
        sink_opts: Option<&SinkOptions>,
    ) -> EngineResult<()>;
}

pub trait ToParquet {
    fn to_parquet(
        &self,
        dir: impl AsRef<Path>,
        opts: Option<&ParquetWriteOptions>,
        sink_opts: Option<&SinkOptions>,
    ) -> EngineResult<()>;
}

// ================================================================================================
// Blanket Implementations
// ================================================================================================

impl<T> AsFormattedLazyFrame for T
where
    T: Report + ToSchema,
{
    /// Selects the schema columns in canonical order.
    fn as_formatted_lf(&self) -> LazyFrame {
        let columns = self
            .to_schema()
            .iter_names()
            .map(|name| col(name.clone()))
            .collect::<Vec<_>>();
        self.as_df().clone().lazy().select(columns)
    }
}

impl<T> ToJson for T
where
    T: Report + ToSchema,
{
    fn to_json(&self) -> EngineResult<serde_json::Value> {
        let rows = self
            .as_formatted_lf()
            .collect()
            .map_err(|e| DataError::DataFrame(e.to_string()))?
            .to_json_rows()?;
        Ok(Value::Array(rows.into_iter().map(Value::Object).collect()))
    }
}

impl<T> ToCsv for T
where
    T: Report + ReportName + ToSchema,
{
    fn to_csv(
        &self,
        dir: impl AsRef<Path>,
        opts: Option<&CsvWriterOptions>,
        sink_opts: Option<&SinkOptions>,
    ) -> EngineResult<()> {
        let file_path = prepare_target(dir.as_ref(), &self.filename(FileExtension::Csv))?;
        let target = sink_target(&file_path)?;
        let options = opts.cloned().unwrap_or_default();
        let sink_opts = sink_opts.cloned().unwrap_or_default();

        let sink_plan = self
            .as_formatted_lf()
            .sink_csv(target, options, None, sink_opts)
            .map_err(|e| DataError::DataFrame(format!("Failed to build CSV sink plan: {e}")))?;

        let _ = sink_plan.collect().map_err(|e| {
            DataError::DataFrame(format!(
                "Failed to write CSV to '{}': {e}",
                file_path.display()
            ))
        })?;

        tracing::debug!(path = %file_path.display(), "Wrote CSV report");
        Ok(())
    }
}

impl<T> ToParquet for T
where
    T: Report + ReportName + ToSchema,
{
    fn to_parquet(
        &self,
        dir: impl AsRef<Path>,
        opts: Option<&ParquetWriteOptions>,
        sink_opts: Option<&SinkOptions>,
    ) -> EngineResult<()> {
        let file_path = prepare_target(dir.as_ref(), &self.filename(FileExtension::Parquet))?;
        let target = sink_target(&file_path)?;
        let options = opts.cloned().unwrap_or_default();
        let sink_opts = sink_opts.cloned().unwrap_or_default();

        let sink_plan = self
            .as_formatted_lf()
            .sink_parquet(target, options, None, sink_opts)
            .map_err(|e| DataError::DataFrame(format!("Failed to build Parquet sink plan: {e}")))?;

        let _ = sink_plan.collect().map_err(|e| {
            DataError::DataFrame(format!(
                "Failed to write Parquet to '{}': {e}",
                file_path.display()
            ))
        })?;

        tracing::debug!(path = %file_path.display(), "Wrote Parquet report");
        Ok(())
    }
}

fn prepare_target(dir: &Path, filename: &str) -> EngineResult<std::path::PathBuf> {
    if !dir.exists() {
        fs::create_dir_all(dir).map_err(|e| {
            IoError::FileSystem(format!(
                "Failed to create directory {}: {}",
                dir.display(),
                e
            ))
        })?;
    }
    Ok(dir.join(filename))
}

fn sink_target(file_path: &Path) -> EngineResult<SinkTarget> {
    let uri = file_path.to_str().ok_or_else(|| {
        IoError::FileSystem(format!(
            "Path contains invalid UTF-8 characters: {}",
            file_path.display()
        ))
    })?;
    Ok(SinkTarget::Path(PlPath::new(uri)))
}

/// Reads a report back from a CSV file written by [`ToCsv`].
pub fn read_report_csv(path: impl AsRef<Path>) -> EngineResult<DataFrame> {
    use polars::prelude::{LazyCsvReader, LazyFileListReader};

    let path = path.as_ref();
    let uri = path.to_str().ok_or_else(|| {
        IoError::FileSystem(format!(
            "Path contains invalid UTF-8 characters: {}",
            path.display()
        ))
    })?;

    LazyCsvReader::new(PlPath::new(uri))
        .with_has_header(true)
        .with_try_parse_dates(true)
        .finish()
        .and_then(|lf| lf.collect())
        .map_err(|e| polars_to_engine_error("report", e))
}

/// Generates a base name from the group key columns and the aggregation period.
///
/// # Example
/// - Grouped by Ticker, monthly: `ticker_month_returns`
/// - Ungrouped (portfolio), yearly: `year_portfolio`
pub(crate) fn generate_dynamic_base_name<S: AsRef<str>>(
    group_cols: &[S],
    period: Period,
    base_name: &str,
) -> String {
    let prefix = group_cols
        .iter()
        .map(|c| c.as_ref().trim().to_lowercase().replace(' ', "_"))
        .chain(std::iter::once(period.to_string().to_lowercase()))
        .collect::<Vec<_>>()
        .join("_");

    format!("{prefix}_{base_name}")
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    EnumIter,
    IntoStaticStr,
)]
#[strum(serialize_all = "lowercase")]
pub enum FileExtension {
    Csv,
    Parquet,
}

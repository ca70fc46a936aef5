use std::sync::Arc;

use chrono::NaiveDate;
use polars::{
    frame::DataFrame,
    prelude::{DataType, Field, Schema, SchemaRef},
};
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use crate::{
    calculator::return_calculator::{ReturnMetric, ReturnRow, ReturnTable},
    data::{
        domain::{Period, PriceRow},
        table::{PriceCol, read_price_rows, validate_row},
    },
    error::{DataError, EngineError, EngineResult},
    report::{
        io::{Report, ReportName, ToSchema, generate_dynamic_base_name},
        polars_ext::{DataFrameExt, FrameBuilder},
    },
};

pub(crate) const YEAR_COL: &str = "Year";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnsReport {
    df: DataFrame,
    period: Period,
    group_cols: Vec<String>,
}

impl ReturnsReport {
    pub fn period(&self) -> Period {
        self.period
    }

    pub fn group_cols(&self) -> &[String] {
        &self.group_cols
    }
}

impl ReportName for ReturnsReport {
    fn base_name(&self) -> String {
        generate_dynamic_base_name(&self.group_cols, self.period, "returns")
    }
}

impl Report for ReturnsReport {
    fn as_df(&self) -> &DataFrame {
        &self.df
    }

    fn as_df_mut(&mut self) -> &mut DataFrame {
        &mut self.df
    }
}

impl ToSchema for ReturnsReport {
    fn to_schema(&self) -> SchemaRef {
        let mut fields = key_fields(self.period, &self.group_cols);
        fields.extend(price_fields());
        fields.extend(metric_fields(self.period));
        Arc::new(Schema::from_iter(fields))
    }
}

impl TryFrom<&ReturnTable> for ReturnsReport {
    type Error = EngineError;

    fn try_from(table: &ReturnTable) -> EngineResult<Self> {
        let rows = table.rows();
        let prices: Vec<&PriceRow> = rows.iter().map(|r| &r.price).collect();

        let builder = key_columns(table.period(), table.group_cols(), &prices)?;
        let builder = price_columns(builder, &prices);
        let df = metric_columns(builder, table.period(), rows).finish("returns")?;

        Ok(Self {
            df,
            period: table.period(),
            group_cols: table.group_cols().to_vec(),
        })
    }
}

impl TryFrom<&ReturnsReport> for ReturnTable {
    type Error = EngineError;

    fn try_from(report: &ReturnsReport) -> EngineResult<Self> {
        ReturnTable::try_from_df(report.as_df(), report.period(), report.group_cols())
    }
}

impl ReturnTable {
    /// Reads a return table back from a frame in the [`ReturnsReport`] layout.
    ///
    /// # Errors
    /// - [`crate::error::DataError::MissingColumn`] if a key, price or
    ///   `<PeriodLabel> <Metric>` column is absent, e.g. a frame without
    ///   `Month Cumulative % Return` handed to the drawdown stage.
    /// - [`crate::error::DataError::PeriodMismatch`] if the frame carries the
    ///   return columns of a different period.
    pub fn try_from_df<S: AsRef<str>>(
        df: &DataFrame,
        period: Period,
        group_cols: &[S],
    ) -> EngineResult<Self> {
        let group_cols: Vec<String> = group_cols.iter().map(|c| c.as_ref().to_string()).collect();
        check_frame_period(df, period)?;
        let prices = read_prices(df, &group_cols)?;

        let metric = |m: ReturnMetric| df.f64_values(&period.column(m.as_str()));
        let period_return = metric(ReturnMetric::PeriodReturn)?;
        let cumulative = metric(ReturnMetric::CumulativeReturn)?;
        let annualized = metric(ReturnMetric::AnnualizedReturn)?;
        let volatility = metric(ReturnMetric::AnnualizedVolatility)?;
        let downside = metric(ReturnMetric::AnnualizedDownsideVolatility)?;

        let mut rows: Vec<ReturnRow> = prices
            .into_iter()
            .enumerate()
            .map(|(i, price)| ReturnRow {
                price,
                period_return: period_return[i],
                cumulative_return: cumulative[i],
                annualized_return: annualized[i],
                annualized_volatility: volatility[i],
                annualized_downside_volatility: downside[i],
            })
            .collect();
        rows.sort_by(|a, b| {
            a.price
                .key
                .cmp(&b.price.key)
                .then(a.price.date.cmp(&b.price.date))
        });

        Ok(ReturnTable {
            period,
            group_cols,
            rows,
        })
    }
}

// ================================================================================================
// Shared Column Layout
// ================================================================================================

/// Sub-period column carried next to `Year` (`Quarter` or `Month`).
fn sub_period_col(period: Period) -> Option<&'static str> {
    match period {
        Period::Quarter | Period::Month => Some(period.into()),
        Period::Year | Period::Daily => None,
    }
}

/// Group key columns, `Date`, and for sub-annual periods `Year` plus `Quarter` / `Month`.
pub(crate) fn key_fields(period: Period, group_cols: &[String]) -> Vec<Field> {
    let mut fields: Vec<Field> = group_cols
        .iter()
        .map(|c| Field::new(c.as_str().into(), DataType::String))
        .collect();
    fields.push(Field::new(PriceCol::Date.as_str().into(), DataType::Date));
    if period.is_sub_annual() {
        fields.push(Field::new(YEAR_COL.into(), DataType::Int32));
    }
    if let Some(sub) = sub_period_col(period) {
        fields.push(Field::new(sub.into(), DataType::UInt32));
    }
    fields
}

pub(crate) fn key_columns(
    period: Period,
    group_cols: &[String],
    prices: &[&PriceRow],
) -> EngineResult<FrameBuilder> {
    let mut builder = FrameBuilder::with_capacity(group_cols.len() + 16);
    for (i, name) in group_cols.iter().enumerate() {
        let parts = prices
            .iter()
            .map(|p| p.key.parts().get(i).cloned().unwrap_or_default())
            .collect();
        builder = builder.str(name, parts);
    }

    let dates: Vec<NaiveDate> = prices.iter().map(|p| p.date).collect();
    date_columns(builder, period, &dates)
}

/// `Date`, and for sub-annual periods `Year` plus `Quarter` / `Month`.
pub(crate) fn date_columns(
    builder: FrameBuilder,
    period: Period,
    dates: &[NaiveDate],
) -> EngineResult<FrameBuilder> {
    let mut builder = builder.date(PriceCol::Date.as_str(), dates)?;
    if period.is_sub_annual() {
        builder = builder.i32(YEAR_COL, dates.iter().map(|d| period.bucket(*d).0).collect());
    }
    if let Some(sub) = sub_period_col(period) {
        builder = builder.u32(sub, dates.iter().map(|d| period.bucket(*d).1).collect());
    }
    Ok(builder)
}

pub(crate) fn price_fields() -> Vec<Field> {
    PriceCol::iter()
        .filter(|c| *c != PriceCol::Date)
        .map(|c| Field::new(c.as_str().into(), DataType::Float64))
        .collect()
}

pub(crate) fn price_columns(builder: FrameBuilder, prices: &[&PriceRow]) -> FrameBuilder {
    let values = |f: fn(&PriceRow) -> f64| prices.iter().map(|p| f(p)).collect::<Vec<_>>();
    builder
        .f64(PriceCol::Open.as_str(), values(|p| p.open))
        .f64(PriceCol::High.as_str(), values(|p| p.high))
        .f64(PriceCol::Low.as_str(), values(|p| p.low))
        .f64(PriceCol::Close.as_str(), values(|p| p.close))
        .f64(PriceCol::Volume.as_str(), values(|p| p.volume))
}

pub(crate) fn metric_fields(period: Period) -> Vec<Field> {
    ReturnMetric::iter()
        .map(|m| Field::new(period.column(m.as_str()).into(), DataType::Float64))
        .collect()
}

pub(crate) fn metric_columns(
    builder: FrameBuilder,
    period: Period,
    rows: &[ReturnRow],
) -> FrameBuilder {
    ReturnMetric::iter().fold(builder, |builder, m| {
        builder.f64(
            &period.column(m.as_str()),
            rows.iter().map(|r| r.metric(m)).collect(),
        )
    })
}

/// Fails if the period return column is absent but another period's is present.
fn check_frame_period(df: &DataFrame, period: Period) -> EngineResult<()> {
    let return_col = |p: Period| p.column(ReturnMetric::PeriodReturn.as_str());
    if df.column(&return_col(period)).is_ok() {
        return Ok(());
    }
    match Period::iter().find(|p| *p != period && df.column(&return_col(*p)).is_ok()) {
        Some(found) => Err(DataError::PeriodMismatch {
            expected: period.to_string(),
            found: found.to_string(),
        }
        .into()),
        None => Ok(()),
    }
}

/// Reads the group key, `Date` and OHLCV columns, validating every row.
fn read_prices(df: &DataFrame, group_cols: &[String]) -> EngineResult<Vec<PriceRow>> {
    let rows = read_price_rows(df, group_cols)?;
    for row in &rows {
        validate_row(row, group_cols.len())?;
    }
    Ok(rows)
}

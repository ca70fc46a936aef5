use std::sync::Arc;

use chrono::NaiveDate;
use polars::{
    frame::DataFrame,
    prelude::{DataType, Field, Schema, SchemaRef},
};
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use crate::{
    calculator::{portfolio_aggregator::PortfolioTable, return_calculator::ReturnMetric},
    data::domain::Period,
    error::{EngineError, EngineResult},
    report::{
        io::{Report, ReportName, ToSchema, generate_dynamic_base_name},
        polars_ext::FrameBuilder,
        returns::{date_columns, key_fields},
    },
};

pub const MEMBERS_COL: &str = "Members";
pub const LOG_RETURN_COL: &str = "Log Return";

/// Equal-weighted portfolio series, one row per date. The period return column
/// holds the cross-sectional average (`Avg Month % Return`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioReport {
    df: DataFrame,
    period: Period,
}

fn metric_column(period: Period, metric: ReturnMetric) -> String {
    match metric {
        ReturnMetric::PeriodReturn => format!("Avg {}", period.column(metric.as_str())),
        _ => period.column(metric.as_str()),
    }
}

impl ReportName for PortfolioReport {
    fn base_name(&self) -> String {
        let no_groups: [&str; 0] = [];
        generate_dynamic_base_name(&no_groups, self.period, "portfolio")
    }
}

impl Report for PortfolioReport {
    fn as_df(&self) -> &DataFrame {
        &self.df
    }

    fn as_df_mut(&mut self) -> &mut DataFrame {
        &mut self.df
    }
}

impl ToSchema for PortfolioReport {
    fn to_schema(&self) -> SchemaRef {
        let mut fields = key_fields(self.period, &[]);
        fields.push(Field::new(MEMBERS_COL.into(), DataType::UInt32));
        fields.extend(
            ReturnMetric::iter()
                .map(|m| Field::new(metric_column(self.period, m).into(), DataType::Float64)),
        );
        fields.push(Field::new(LOG_RETURN_COL.into(), DataType::Float64));
        Arc::new(Schema::from_iter(fields))
    }
}

impl TryFrom<&PortfolioTable> for PortfolioReport {
    type Error = EngineError;

    fn try_from(table: &PortfolioTable) -> EngineResult<Self> {
        let period = table.period();
        let rows = table.rows();
        let dates: Vec<NaiveDate> = rows.iter().map(|r| r.date).collect();

        let builder = date_columns(FrameBuilder::with_capacity(12), period, &dates)?
            .u32(MEMBERS_COL, rows.iter().map(|r| r.members as u32).collect());
        let builder = ReturnMetric::iter().fold(builder, |builder, m| {
            builder.f64(
                &metric_column(period, m),
                rows.iter().map(|r| r.metric(m)).collect(),
            )
        });
        let df = builder
            .f64(LOG_RETURN_COL, rows.iter().map(|r| r.log_return).collect())
            .finish("portfolio")?;

        Ok(Self { df, period })
    }
}

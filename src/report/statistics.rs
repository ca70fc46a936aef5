use std::sync::Arc;

use polars::{
    frame::DataFrame,
    prelude::{DataType, Field, Schema, SchemaRef},
};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, IntoEnumIterator, IntoStaticStr};

use crate::{
    calculator::statistics_summarizer::{StatsRow, StatsTable},
    data::domain::Period,
    error::{EngineError, EngineResult},
    report::{
        io::{Report, ReportName, ToSchema, generate_dynamic_base_name},
        polars_ext::FrameBuilder,
        returns::YEAR_COL,
    },
};

pub const OBSERVATIONS_COL: &str = "Observations";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, IntoStaticStr, Display)]
pub enum StatCol {
    Lowest,
    Highest,
    Average,
    Median,
    Variance,
}

impl StatCol {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }

    /// `Lowest Month % Return` style names; `Month % Variance` for the dispersion.
    pub fn column(&self, period: Period) -> String {
        match self {
            StatCol::Variance => period.column("% Variance"),
            _ => format!("{} {}", self.as_str(), period.column("% Return")),
        }
    }

    fn value(&self, row: &StatsRow) -> f64 {
        match self {
            StatCol::Lowest => row.lowest,
            StatCol::Highest => row.highest,
            StatCol::Average => row.average,
            StatCol::Median => row.median,
            StatCol::Variance => row.variance,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatisticsReport {
    df: DataFrame,
    period: Period,
    group_cols: Vec<String>,
    by_year: bool,
    with_year_returns: bool,
}

impl ReportName for StatisticsReport {
    fn base_name(&self) -> String {
        generate_dynamic_base_name(&self.group_cols, self.period, "statistics")
    }
}

impl Report for StatisticsReport {
    fn as_df(&self) -> &DataFrame {
        &self.df
    }

    fn as_df_mut(&mut self) -> &mut DataFrame {
        &mut self.df
    }
}

impl ToSchema for StatisticsReport {
    fn to_schema(&self) -> SchemaRef {
        let mut fields: Vec<Field> = self
            .group_cols
            .iter()
            .map(|c| Field::new(c.as_str().into(), DataType::String))
            .collect();
        if self.by_year {
            fields.push(Field::new(YEAR_COL.into(), DataType::Int32));
        }
        if self.with_year_returns {
            fields.push(Field::new(
                Period::Year.column("% Return").into(),
                DataType::Float64,
            ));
        }
        fields.extend(
            StatCol::iter().map(|c| Field::new(c.column(self.period).into(), DataType::Float64)),
        );
        fields.push(Field::new(OBSERVATIONS_COL.into(), DataType::UInt32));
        Arc::new(Schema::from_iter(fields))
    }
}

impl TryFrom<&StatsTable> for StatisticsReport {
    type Error = EngineError;

    fn try_from(table: &StatsTable) -> EngineResult<Self> {
        let rows = table.rows();
        let by_year = table.is_by_year();
        let with_year_returns = by_year && table.has_year_returns();

        let mut builder = FrameBuilder::with_capacity(table.group_cols().len() + 8);
        for (i, name) in table.group_cols().iter().enumerate() {
            let parts = rows
                .iter()
                .map(|r| r.key.parts().get(i).cloned().unwrap_or_default())
                .collect();
            builder = builder.str(name, parts);
        }
        if by_year {
            builder = builder.i32(YEAR_COL, rows.iter().map(|r| r.year.unwrap_or_default()).collect());
        }
        if with_year_returns {
            builder = builder.f64(
                &Period::Year.column("% Return"),
                rows.iter().map(|r| r.year_return.unwrap_or(f64::NAN)).collect(),
            );
        }
        for c in StatCol::iter() {
            builder = builder.f64(&c.column(table.period()), rows.iter().map(|r| c.value(r)).collect());
        }
        let df = builder
            .u32(
                OBSERVATIONS_COL,
                rows.iter().map(|r| r.observations as u32).collect(),
            )
            .finish("statistics")?;

        Ok(Self {
            df,
            period: table.period(),
            group_cols: table.group_cols().to_vec(),
            by_year,
            with_year_returns,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::{
        calculator::{
            period_aggregator::PeriodAggregator, return_calculator::ReturnCalculator,
            statistics_summarizer::StatisticsSummarizer,
        },
        data::{domain::PriceRow, table::PriceTable},
        report::polars_ext::DataFrameExt,
    };

    fn daily() -> PriceTable {
        let mut close = 100.0;
        let rows = (0..24)
            .map(|i| {
                let d = NaiveDate::from_ymd_opt(2022 + i / 12, (i % 12) as u32 + 1, 10)
                    .expect("valid date");
                let open = close;
                close *= if i % 3 == 0 { 0.98 } else { 1.03 };
                PriceRow::from_open_close("AAPL", d, open, close, 1.0)
            })
            .collect();
        PriceTable::new(vec!["Ticker".into()], rows).expect("valid table")
    }

    fn returns(period: Period) -> crate::calculator::return_calculator::ReturnTable {
        let prices = PeriodAggregator::new(period)
            .aggregate(&daily())
            .expect("aggregation");
        ReturnCalculator::calculate(&prices).expect("returns")
    }

    #[test]
    fn test_monthly_statistics_column_names() {
        let stats = StatisticsSummarizer::summarize(&returns(Period::Month)).expect("stats");
        let report = StatisticsReport::try_from(&stats).expect("report");

        let names: Vec<String> = report
            .as_df()
            .get_column_names()
            .iter()
            .map(|n| n.to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "Ticker",
                "Year",
                "Lowest Month % Return",
                "Highest Month % Return",
                "Average Month % Return",
                "Median Month % Return",
                "Month % Variance",
                "Observations",
            ]
        );
        assert_eq!(report.as_df().height(), 2);
        assert_eq!(report.base_name(), "ticker_month_statistics");
    }

    #[test]
    fn test_year_return_column() {
        let stats = StatisticsSummarizer::summarize_with_year_returns(
            &returns(Period::Quarter),
            &returns(Period::Year),
        )
        .expect("stats");
        let report = StatisticsReport::try_from(&stats).expect("report");
        let df = report.as_df();

        let year_returns = df.f64_values("Year % Return").expect("column");
        let yearly = returns(Period::Year);
        let want: Vec<f64> = yearly.rows().iter().map(|r| r.period_return).collect();
        assert_eq!(year_returns, want);
        assert!(df.column("Quarter % Variance").is_ok());
        assert_eq!(report.to_schema().len(), df.width());
    }

    #[test]
    fn test_yearly_statistics_have_no_year_column() {
        let stats = StatisticsSummarizer::summarize(&returns(Period::Year)).expect("stats");
        let report = StatisticsReport::try_from(&stats).expect("report");
        let df = report.as_df();

        assert!(df.column("Year").is_err());
        assert!(df.column("Lowest Year % Return").is_ok());
        assert_eq!(
            df.f64_values("Observations").expect("column"),
            vec![2.0]
        );
    }
}

use std::sync::Arc;

use chrono::NaiveDate;
use polars::{
    frame::DataFrame,
    prelude::{DataType, Field, Schema, SchemaRef},
};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, IntoEnumIterator, IntoStaticStr};

use crate::{
    calculator::{
        drawdown_calculator::{DrawdownRow, DrawdownTable},
        return_calculator::ReturnRow,
    },
    data::domain::{Period, PriceRow},
    error::{EngineError, EngineResult},
    report::{
        io::{Report, ReportName, ToSchema, generate_dynamic_base_name},
        polars_ext::FrameBuilder,
        returns::{
            key_columns, key_fields, metric_columns, metric_fields, price_columns, price_fields,
        },
    },
};

/// Drawdown columns appended after the return columns, each prefixed by the period label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, IntoStaticStr, Display)]
pub enum DrawdownCol {
    #[strum(serialize = "Peak")]
    Peak,
    #[strum(serialize = "Drawdown")]
    Drawdown,
    #[strum(serialize = "% Drawdown")]
    PercentDrawdown,
    #[strum(serialize = "Cumulative Max % Drawdown")]
    CumulativeMaxPercentDrawdown,
    #[strum(serialize = "Max % Drawdown")]
    MaxPercentDrawdown,
    #[strum(serialize = "Max Drawdown Date")]
    MaxDrawdownDate,
}

impl DrawdownCol {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrawdownsReport {
    df: DataFrame,
    period: Period,
    group_cols: Vec<String>,
}

impl DrawdownsReport {
    pub fn period(&self) -> Period {
        self.period
    }
}

impl ReportName for DrawdownsReport {
    fn base_name(&self) -> String {
        generate_dynamic_base_name(&self.group_cols, self.period, "drawdowns")
    }
}

impl Report for DrawdownsReport {
    fn as_df(&self) -> &DataFrame {
        &self.df
    }

    fn as_df_mut(&mut self) -> &mut DataFrame {
        &mut self.df
    }
}

impl ToSchema for DrawdownsReport {
    fn to_schema(&self) -> SchemaRef {
        let mut fields = key_fields(self.period, &self.group_cols);
        fields.extend(price_fields());
        fields.extend(metric_fields(self.period));
        fields.extend(DrawdownCol::iter().map(|c| {
            let dtype = match c {
                DrawdownCol::MaxDrawdownDate => DataType::Date,
                _ => DataType::Float64,
            };
            Field::new(self.period.column(c.as_str()).into(), dtype)
        }));
        Arc::new(Schema::from_iter(fields))
    }
}

impl TryFrom<&DrawdownTable> for DrawdownsReport {
    type Error = EngineError;

    fn try_from(table: &DrawdownTable) -> EngineResult<Self> {
        let period = table.period();
        let rows = table.rows();
        let prices: Vec<&PriceRow> = rows.iter().map(|r| &r.returns.price).collect();
        let returns: Vec<ReturnRow> = rows.iter().map(|r| r.returns.clone()).collect();

        let builder = key_columns(period, table.group_cols(), &prices)?;
        let builder = price_columns(builder, &prices);
        let builder = metric_columns(builder, period, &returns);
        let df = drawdown_columns(builder, period, rows)?.finish("drawdowns")?;

        Ok(Self {
            df,
            period,
            group_cols: table.group_cols().to_vec(),
        })
    }
}

fn drawdown_columns(
    builder: FrameBuilder,
    period: Period,
    rows: &[DrawdownRow],
) -> EngineResult<FrameBuilder> {
    let name = |c: DrawdownCol| period.column(c.as_str());
    let values = |f: fn(&DrawdownRow) -> f64| rows.iter().map(f).collect::<Vec<_>>();
    let dates: Vec<NaiveDate> = rows.iter().map(|r| r.max_drawdown_date).collect();

    builder
        .f64(&name(DrawdownCol::Peak), values(|r| r.peak))
        .f64(&name(DrawdownCol::Drawdown), values(|r| r.drawdown))
        .f64(&name(DrawdownCol::PercentDrawdown), values(|r| r.percent_drawdown))
        .f64(
            &name(DrawdownCol::CumulativeMaxPercentDrawdown),
            values(|r| r.cumulative_max_percent_drawdown),
        )
        .f64(&name(DrawdownCol::MaxPercentDrawdown), values(|r| r.max_percent_drawdown))
        .date(&name(DrawdownCol::MaxDrawdownDate), &dates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        calculator::{drawdown_calculator::DrawdownCalculator, return_calculator::ReturnCalculator},
        data::table::PriceTable,
        report::{io::ToJson, polars_ext::DataFrameExt},
    };

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn drawdowns() -> DrawdownTable {
        // Period returns: +5%, -10%, +5%
        let rows = vec![
            PriceRow::from_open_close("A", date(2024, 1, 31), 100.0, 105.0, 1.0),
            PriceRow::from_open_close("A", date(2024, 2, 29), 105.0, 94.5, 1.0),
            PriceRow::from_open_close("A", date(2024, 3, 28), 94.5, 99.225, 1.0),
        ];
        let prices = PriceTable::with_period(Period::Quarter, vec!["Ticker".into()], rows)
            .expect("valid table");
        let returns = ReturnCalculator::calculate(&prices).expect("returns");
        DrawdownCalculator::calculate(&returns).expect("drawdowns")
    }

    #[test]
    fn test_drawdown_columns_are_prefixed() {
        let report = DrawdownsReport::try_from(&drawdowns()).expect("report");
        let df = report.as_df();

        assert_eq!(
            df.f64_values("Quarter Max % Drawdown").expect("column"),
            vec![210.0, 210.0, 210.0]
        );
        assert_eq!(
            df.date_values("Quarter Max Drawdown Date").expect("column"),
            vec![date(2024, 2, 29); 3]
        );
        assert!(df.column("Quarter Peak").is_ok());
        assert!(df.column("Quarter Cumulative % Return").is_ok());
        assert_eq!(report.to_schema().len(), df.width());
    }

    #[test]
    fn test_drawdowns_to_json() {
        let report = DrawdownsReport::try_from(&drawdowns()).expect("report");
        let json = report.to_json().expect("json");

        let rows = json.as_array().expect("array of rows");
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1]["Quarter % Drawdown"].as_f64(), Some(210.0));
        assert_eq!(rows[1]["Ticker"], serde_json::json!("A"));
    }
}

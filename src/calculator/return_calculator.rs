use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, IntoStaticStr};

use crate::{
    calculator::information_ratio_calculator::NamedSeries,
    data::{
        domain::{GroupKey, Period, PriceRow},
        table::PriceTable,
    },
    error::{ComputeError, EngineResult},
    math::{
        running::{Annualizer, Running},
        stats::round2,
    },
};

/// Return metrics carried by every [`ReturnRow`], all in percent.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, IntoStaticStr, Display,
)]
pub enum ReturnMetric {
    #[strum(serialize = "% Return")]
    PeriodReturn,
    #[strum(serialize = "Cumulative % Return")]
    CumulativeReturn,
    #[strum(serialize = "Annualized % Return")]
    AnnualizedReturn,
    #[strum(serialize = "Annualized Volatility")]
    AnnualizedVolatility,
    #[strum(serialize = "Annualized Downside Volatility")]
    AnnualizedDownsideVolatility,
}

impl ReturnMetric {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

/// A price row extended with its return and risk figures.
///
/// All figures are percentages rounded to two decimals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnRow {
    pub price: PriceRow,
    pub period_return: f64,
    pub cumulative_return: f64,
    pub annualized_return: f64,
    pub annualized_volatility: f64,
    pub annualized_downside_volatility: f64,
}

impl ReturnRow {
    pub fn metric(&self, metric: ReturnMetric) -> f64 {
        match metric {
            ReturnMetric::PeriodReturn => self.period_return,
            ReturnMetric::CumulativeReturn => self.cumulative_return,
            ReturnMetric::AnnualizedReturn => self.annualized_return,
            ReturnMetric::AnnualizedVolatility => self.annualized_volatility,
            ReturnMetric::AnnualizedDownsideVolatility => self.annualized_downside_volatility,
        }
    }
}

/// Return rows of one or more entities, ordered by `(GroupKey, Date)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnTable {
    pub(crate) period: Period,
    pub(crate) group_cols: Vec<String>,
    pub(crate) rows: Vec<ReturnRow>,
}

impl ReturnTable {
    pub fn period(&self) -> Period {
        self.period
    }

    pub fn group_cols(&self) -> &[String] {
        &self.group_cols
    }

    pub fn rows(&self) -> &[ReturnRow] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn groups(&self) -> impl Iterator<Item = &[ReturnRow]> {
        self.rows.chunk_by(|a, b| a.price.key == b.price.key)
    }

    pub fn keys(&self) -> Vec<&GroupKey> {
        self.groups().map(|g| &g[0].price.key).collect()
    }

    /// The price rows the returns were computed from.
    pub fn prices(&self) -> EngineResult<PriceTable> {
        PriceTable::with_period(
            self.period,
            self.group_cols.clone(),
            self.rows.iter().map(|r| r.price.clone()).collect(),
        )
    }

    /// Extracts one metric of one entity as a dated series, named after the entity.
    pub fn series(&self, key: &GroupKey, metric: ReturnMetric) -> EngineResult<NamedSeries> {
        let group = self
            .groups()
            .find(|g| &g[0].price.key == key)
            .ok_or_else(|| ComputeError::UnknownSeries(key.to_string()))?;

        Ok(NamedSeries::new(
            key.to_string(),
            group.iter().map(|r| (r.price.date, r.metric(metric))).collect(),
        ))
    }
}

// ================================================================================================
// Return Calculator
// ================================================================================================

/// Computes period, cumulative and annualized returns per group.
///
/// For each group ordered by date:
/// - the first row compares `Close` with its own `Open`, later rows with the prior `Close`
/// - cumulative return compounds log returns: `exp(sum(ln(1 + r))) - 1`
/// - annualized figures are expanding over all observations so far, see [`Annualizer`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ReturnCalculator;

impl ReturnCalculator {
    #[tracing::instrument(skip(prices), fields(period = %prices.period(), rows = prices.len()))]
    pub fn calculate(prices: &PriceTable) -> EngineResult<ReturnTable> {
        let periods_per_year = prices.period().periods_per_year();
        let mut rows = Vec::with_capacity(prices.len());

        for group in prices.groups() {
            rows.extend(group_returns(group, periods_per_year));
        }

        tracing::debug!(
            groups = prices.groups().count(),
            rows = rows.len(),
            "Calculated returns"
        );

        Ok(ReturnTable {
            period: prices.period(),
            group_cols: prices.group_cols().to_vec(),
            rows,
        })
    }
}

fn group_returns(group: &[PriceRow], periods_per_year: u16) -> Vec<ReturnRow> {
    let mut annualizer = Annualizer::new(periods_per_year);
    let mut cumulative_log_return = 0.0;
    let mut prev_close: Option<f64> = None;

    group
        .iter()
        .map(|row| {
            let base = prev_close.unwrap_or(row.open);
            let ratio = row.close / base;
            prev_close = Some(row.close);

            cumulative_log_return += ratio.ln();
            let annualized = annualizer.update(ratio - 1.0);

            ReturnRow {
                price: row.clone(),
                period_return: round2((ratio - 1.0) * 100.0),
                cumulative_return: round2((cumulative_log_return.exp() - 1.0) * 100.0),
                annualized_return: round2(annualized.annualized_return * 100.0),
                annualized_volatility: round2(annualized.volatility * 100.0),
                annualized_downside_volatility: round2(annualized.downside_volatility * 100.0),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn table(period: Period, rows: Vec<PriceRow>) -> PriceTable {
        PriceTable::with_period(period, vec!["Ticker".to_string()], rows).expect("valid table")
    }

    fn closes(key: &str, open: f64, closes: &[f64]) -> Vec<PriceRow> {
        closes
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let o = if i == 0 { open } else { closes[i - 1] };
                PriceRow::from_open_close(key, date(2020 + i as i32, 12, 31), o, *c, 1.0)
            })
            .collect()
    }

    // ========================================================================
    // Test: Two-Period Example
    // ========================================================================

    #[test]
    fn test_two_period_example() {
        let prices = table(Period::Year, closes("A", 100.0, &[110.0, 121.0]));
        let returns = ReturnCalculator::calculate(&prices).expect("returns");

        let period: Vec<_> = returns.rows().iter().map(|r| r.period_return).collect();
        let cumulative: Vec<_> = returns.rows().iter().map(|r| r.cumulative_return).collect();
        assert_eq!(period, vec![10.0, 10.0]);
        assert_eq!(cumulative, vec![10.0, 21.0]);

        // Yearly: annualized return is the geometric mean of the period returns
        assert_eq!(returns.rows()[1].annualized_return, 10.0);
        assert_eq!(returns.rows()[1].annualized_volatility, 0.0);
    }

    // ========================================================================
    // Test: First Row Uses Open, Later Rows Use Prior Close
    // ========================================================================

    #[test]
    fn test_first_row_uses_open_later_rows_use_prev_close() {
        let rows = vec![
            PriceRow::from_open_close("A", date(2024, 1, 2), 50.0, 55.0, 1.0),
            // Gap open: the return still measures close-to-close
            PriceRow::from_open_close("A", date(2024, 1, 3), 60.0, 66.0, 1.0),
        ];
        let returns = ReturnCalculator::calculate(&table(Period::Daily, rows)).expect("returns");
        assert_eq!(returns.rows()[0].period_return, 10.0);
        assert_eq!(returns.rows()[1].period_return, 20.0);
    }

    // ========================================================================
    // Test: Single Observation
    // ========================================================================

    #[test]
    fn test_single_row_group() {
        let rows = vec![
            PriceRow::from_open_close("A", date(2024, 1, 2), 80.0, 60.0, 1.0),
            PriceRow::from_open_close("B", date(2024, 1, 2), 40.0, 41.0, 1.0),
            PriceRow::from_open_close("B", date(2024, 1, 3), 41.0, 42.0, 1.0),
        ];
        let returns = ReturnCalculator::calculate(&table(Period::Daily, rows)).expect("returns");

        let a = &returns.rows()[0];
        assert_eq!(a.period_return, -25.0);
        assert_eq!(a.annualized_volatility, 0.0);
        assert_eq!(a.annualized_downside_volatility, 0.0);
        assert!(returns.rows().iter().all(|r| !r.annualized_return.is_nan()));

        // Group B restarts from its own open
        assert_eq!(returns.rows()[1].period_return, 2.5);
    }

    // ========================================================================
    // Test: Cumulative Return Compounds Geometrically
    // ========================================================================

    #[test]
    fn test_cumulative_return_matches_geometric_compounding() {
        let prices = closes("A", 100.0, &[103.0, 99.0, 104.5, 101.2, 108.9]);
        let returns = ReturnCalculator::calculate(&table(Period::Month, prices.clone()))
            .expect("returns");

        let mut growth = 1.0;
        let mut prev = 100.0;
        for (row, price) in returns.rows().iter().zip(&prices) {
            growth *= price.close / prev;
            prev = price.close;
            assert!(
                (row.cumulative_return - (growth - 1.0) * 100.0).abs() < 0.006,
                "cumulative mismatch on {}",
                price.date
            );
        }
    }

    // ========================================================================
    // Test: Volatility Columns
    // ========================================================================

    #[test]
    fn test_volatility_and_downside_volatility() {
        // Monthly returns: +5%, -10%, +5%, -2%
        let prices = closes("A", 100.0, &[105.0, 94.5, 99.225, 97.2405]);
        let returns = ReturnCalculator::calculate(&table(Period::Month, prices)).expect("returns");
        let rows = returns.rows();

        let want_vol = crate::math::stats::std_dev(&[0.05, -0.10, 0.05, -0.02], 1)
            .expect("enough observations")
            * 12f64.sqrt()
            * 100.0;
        assert_eq!(rows[3].annualized_volatility, round2(want_vol));

        // Only one negative return observed: downside volatility is guarded to 0
        assert_eq!(rows[1].annualized_downside_volatility, 0.0);
        assert_eq!(rows[2].annualized_downside_volatility, 0.0);

        let want_down = crate::math::stats::std_dev(&[-0.10, -0.02], 1)
            .expect("enough observations")
            * 12f64.sqrt()
            * 100.0;
        assert_eq!(rows[3].annualized_downside_volatility, round2(want_down));
    }

    // ========================================================================
    // Test: Idempotence
    // ========================================================================

    #[test]
    fn test_recalculating_from_output_prices_is_idempotent() {
        let prices = table(Period::Quarter, closes("A", 10.0, &[10.5, 9.8, 11.2, 12.0]));
        let first = ReturnCalculator::calculate(&prices).expect("returns");
        let second =
            ReturnCalculator::calculate(&first.prices().expect("prices")).expect("returns");
        assert_eq!(first, second);
    }

    // ========================================================================
    // Test: Series Extraction
    // ========================================================================

    #[test]
    fn test_series_extraction() {
        let prices = table(Period::Year, closes("A", 100.0, &[110.0, 121.0]));
        let returns = ReturnCalculator::calculate(&prices).expect("returns");

        let series = returns
            .series(&GroupKey::from("A"), ReturnMetric::CumulativeReturn)
            .expect("known key");
        assert_eq!(series.name(), "A");
        assert_eq!(series.values(), vec![10.0, 21.0]);

        assert!(returns.series(&GroupKey::from("Z"), ReturnMetric::PeriodReturn).is_err());
    }
}

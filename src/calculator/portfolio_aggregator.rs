use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    calculator::{
        information_ratio_calculator::NamedSeries,
        return_calculator::{ReturnMetric, ReturnTable},
    },
    data::domain::Period,
    error::EngineResult,
    math::{
        running::{Annualizer, Running},
        stats::round2,
    },
};

/// One date of an equal-weighted portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioRow {
    pub date: NaiveDate,
    /// Number of entities with an observation on this date.
    pub members: usize,
    /// Mean period return of the members (percent).
    pub avg_period_return: f64,
    /// Mean of `ln(1 + cumulative return)` over the members.
    pub log_return: f64,
    pub cumulative_return: f64,
    pub annualized_return: f64,
    pub annualized_volatility: f64,
    pub annualized_downside_volatility: f64,
}

impl PortfolioRow {
    pub fn metric(&self, metric: ReturnMetric) -> f64 {
        match metric {
            ReturnMetric::PeriodReturn => self.avg_period_return,
            ReturnMetric::CumulativeReturn => self.cumulative_return,
            ReturnMetric::AnnualizedReturn => self.annualized_return,
            ReturnMetric::AnnualizedVolatility => self.annualized_volatility,
            ReturnMetric::AnnualizedDownsideVolatility => self.annualized_downside_volatility,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioTable {
    pub(crate) period: Period,
    pub(crate) rows: Vec<PortfolioRow>,
}

impl PortfolioTable {
    pub fn period(&self) -> Period {
        self.period
    }

    pub fn rows(&self) -> &[PortfolioRow] {
        &self.rows
    }

    pub fn series(&self, name: impl Into<String>, metric: ReturnMetric) -> NamedSeries {
        NamedSeries::new(
            name,
            self.rows.iter().map(|r| (r.date, r.metric(metric))).collect(),
        )
    }
}

/// Collapses the return series of several entities into one equal-weighted series.
///
/// Per date, over the entities observed on that date:
/// - `LogReturn = mean(ln(1 + CumulativeReturn / 100))`
/// - `AvgPeriodReturn = mean(PeriodReturn)`
/// - `CumulativeReturn = exp(LogReturn) - 1`
///
/// The cumulative figure is rebuilt from each date's cross-sectional average of
/// log cumulative returns, not by compounding the averaged period returns.
/// Annualized figures are then recomputed on the `AvgPeriodReturn` path.
#[derive(Debug, Clone, Copy, Default)]
pub struct PortfolioAggregator;

#[derive(Default)]
struct DateAccumulator {
    log_sum: f64,
    return_sum: f64,
    members: usize,
}

impl PortfolioAggregator {
    #[tracing::instrument(skip(returns), fields(period = %returns.period(), rows = returns.rows().len()))]
    pub fn aggregate(returns: &ReturnTable) -> EngineResult<PortfolioTable> {
        let mut by_date: BTreeMap<NaiveDate, DateAccumulator> = BTreeMap::new();
        for row in returns.rows() {
            let acc = by_date.entry(row.price.date).or_default();
            acc.log_sum += (1.0 + row.cumulative_return / 100.0).ln();
            acc.return_sum += row.period_return;
            acc.members += 1;
        }

        let mut annualizer = Annualizer::new(returns.period().periods_per_year());
        let rows: Vec<PortfolioRow> = by_date
            .into_iter()
            .map(|(date, acc)| {
                let n = acc.members as f64;
                let log_return = acc.log_sum / n;
                let avg_period_return = acc.return_sum / n;
                let annualized = annualizer.update(avg_period_return / 100.0);

                PortfolioRow {
                    date,
                    members: acc.members,
                    avg_period_return: round2(avg_period_return),
                    log_return,
                    cumulative_return: round2((log_return.exp() - 1.0) * 100.0),
                    annualized_return: round2(annualized.annualized_return * 100.0),
                    annualized_volatility: round2(annualized.volatility * 100.0),
                    annualized_downside_volatility: round2(annualized.downside_volatility * 100.0),
                }
            })
            .collect();

        tracing::debug!(
            entities = returns.groups().count(),
            dates = rows.len(),
            "Aggregated portfolio"
        );

        Ok(PortfolioTable {
            period: returns.period(),
            rows,
        })
    }
}

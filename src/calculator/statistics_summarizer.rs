use std::collections::{BTreeMap, HashMap};

use chrono::Datelike;
use serde::{Deserialize, Serialize};

use crate::{
    calculator::return_calculator::{ReturnRow, ReturnTable},
    data::domain::{GroupKey, Period},
    error::{DataError, EngineResult},
    math::stats::{mean, median, round2, std_dev},
};

/// Distribution of period returns for one entity (and one year for sub-annual periods).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsRow {
    pub key: GroupKey,
    pub year: Option<i32>,
    /// Return of the whole calendar year, when yearly returns were supplied.
    pub year_return: Option<f64>,
    pub lowest: f64,
    pub highest: f64,
    pub average: f64,
    pub median: f64,
    /// Population standard deviation (ddof = 0) of the period returns.
    pub variance: f64,
    pub observations: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsTable {
    pub(crate) period: Period,
    pub(crate) group_cols: Vec<String>,
    pub(crate) rows: Vec<StatsRow>,
}

impl StatsTable {
    pub fn period(&self) -> Period {
        self.period
    }

    pub fn group_cols(&self) -> &[String] {
        &self.group_cols
    }

    pub fn rows(&self) -> &[StatsRow] {
        &self.rows
    }

    /// `true` if the rows carry a `year` (every period finer than a year).
    pub fn is_by_year(&self) -> bool {
        self.period.is_sub_annual()
    }

    /// `true` if yearly returns were attached.
    pub fn has_year_returns(&self) -> bool {
        self.rows.iter().any(|r| r.year_return.is_some())
    }
}

/// Summarizes the distribution of period returns per `GroupKey`, and per
/// `(GroupKey, Year)` for Quarter, Month and Daily tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatisticsSummarizer;

impl StatisticsSummarizer {
    pub fn summarize(returns: &ReturnTable) -> EngineResult<StatsTable> {
        Self::summarize_inner(returns, None)
    }

    /// Like [`StatisticsSummarizer::summarize`], attaching each `(GroupKey, Year)`'s
    /// return from a yearly return table.
    pub fn summarize_with_year_returns(
        returns: &ReturnTable,
        yearly: &ReturnTable,
    ) -> EngineResult<StatsTable> {
        if yearly.period() != Period::Year {
            return Err(DataError::PeriodMismatch {
                expected: Period::Year.to_string(),
                found: yearly.period().to_string(),
            }
            .into());
        }

        let lookup: HashMap<(GroupKey, i32), f64> = yearly
            .rows()
            .iter()
            .map(|r| ((r.price.key.clone(), r.price.date.year()), r.period_return))
            .collect();

        Self::summarize_inner(returns, Some(&lookup))
    }

    #[tracing::instrument(skip(returns, year_returns), fields(period = %returns.period(), rows = returns.rows().len()))]
    fn summarize_inner(
        returns: &ReturnTable,
        year_returns: Option<&HashMap<(GroupKey, i32), f64>>,
    ) -> EngineResult<StatsTable> {
        let by_year = returns.period().is_sub_annual();

        let mut buckets: BTreeMap<(GroupKey, Option<i32>), Vec<&ReturnRow>> = BTreeMap::new();
        for row in returns.rows() {
            let year = by_year.then(|| row.price.date.year());
            buckets
                .entry((row.price.key.clone(), year))
                .or_default()
                .push(row);
        }

        let rows: Vec<StatsRow> = buckets
            .into_iter()
            .filter_map(|((key, year), rows)| {
                let values: Vec<f64> = rows.iter().map(|r| r.period_return).collect();
                let year_return = match (year, year_returns) {
                    (Some(y), Some(lookup)) => lookup.get(&(key.clone(), y)).copied(),
                    _ => None,
                };
                summarize_values(&values).map(|s| StatsRow {
                    key,
                    year,
                    year_return,
                    lowest: s.0,
                    highest: s.1,
                    average: s.2,
                    median: s.3,
                    variance: s.4,
                    observations: values.len(),
                })
            })
            .collect();

        tracing::debug!(buckets = rows.len(), "Summarized return statistics");

        Ok(StatsTable {
            period: returns.period(),
            group_cols: returns.group_cols().to_vec(),
            rows,
        })
    }
}

fn summarize_values(values: &[f64]) -> Option<(f64, f64, f64, f64, f64)> {
    let lowest = values.iter().copied().reduce(f64::min)?;
    let highest = values.iter().copied().reduce(f64::max)?;
    Some((
        round2(lowest),
        round2(highest),
        round2(mean(values)?),
        round2(median(values)?),
        round2(std_dev(values, 0)?),
    ))
}

use std::cmp::Ordering;

use chrono::NaiveDate;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{
    calculator::return_calculator::ReturnTable,
    data::domain::{GroupKey, Period},
    error::{ComputeError, EngineResult},
};

/// Period returns of every entity within one period, best first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodPanel {
    pub label: String,
    pub entries: Vec<(GroupKey, f64)>,
}

/// Multi-panel layout of period returns: one panel per distinct period, arranged
/// on a square grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopReturns {
    period: Period,
    panels: Vec<PeriodPanel>,
}

impl TopReturns {
    /// # Errors
    /// [`ComputeError::CapacityExceeded`] for Daily tables, or when the table spans
    /// more distinct periods than `max_panels`.
    #[tracing::instrument(skip(returns), fields(period = %returns.period()))]
    pub fn layout(returns: &ReturnTable, max_panels: usize) -> EngineResult<Self> {
        let period = returns.period();
        if period == Period::Daily {
            tracing::warn!("Refusing a panel per trading day");
            return Err(ComputeError::CapacityExceeded {
                what: "daily period panels".to_string(),
                count: returns.rows().len(),
                max: max_panels,
            }
            .into());
        }

        let by_bucket = returns
            .rows()
            .iter()
            .map(|r| (period.bucket(r.price.date), r))
            .into_group_map();

        if by_bucket.len() > max_panels {
            tracing::warn!(periods = by_bucket.len(), max_panels, "Too many periods for the layout");
            return Err(ComputeError::CapacityExceeded {
                what: format!("{period} panels"),
                count: by_bucket.len(),
                max: max_panels,
            }
            .into());
        }

        let panels = by_bucket
            .into_iter()
            .sorted_by_key(|(bucket, _)| *bucket)
            .map(|(_, rows)| {
                let label_date: NaiveDate = rows
                    .iter()
                    .map(|r| r.price.date)
                    .min()
                    .unwrap_or_default();
                let entries = rows
                    .into_iter()
                    .map(|r| (r.price.key.clone(), r.period_return))
                    .sorted_by(|a, b| {
                        b.1.partial_cmp(&a.1)
                            .unwrap_or(Ordering::Equal)
                            .then_with(|| a.0.cmp(&b.0))
                    })
                    .collect();
                PeriodPanel {
                    label: period.short_label(label_date),
                    entries,
                }
            })
            .collect();

        Ok(Self { period, panels })
    }

    pub fn period(&self) -> Period {
        self.period
    }

    pub fn panels(&self) -> &[PeriodPanel] {
        &self.panels
    }

    /// Side of the smallest square grid holding every panel.
    pub fn grid_size(&self) -> usize {
        let n = self.panels.len();
        let mut side = (n as f64).sqrt() as usize;
        while side * side < n {
            side += 1;
        }
        side
    }
}

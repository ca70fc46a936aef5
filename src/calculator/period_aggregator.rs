use itertools::Itertools;

use crate::{
    data::{
        domain::{Period, PriceRow},
        table::PriceTable,
    },
    error::{DataError, EngineResult},
};

/// Collapses daily price rows into Year, Quarter or Month buckets.
///
/// Within each `(GroupKey, bucket)`:
/// - `Open`: first chronological open
/// - `High` / `Low`: max high / min low
/// - `Close`, `Volume`, `Date`: taken from the last chronological row
#[derive(Debug, Clone, Copy)]
pub struct PeriodAggregator {
    period: Period,
}

impl PeriodAggregator {
    pub fn new(period: Period) -> Self {
        Self { period }
    }

    #[tracing::instrument(skip(self, daily), fields(period = %self.period, rows = daily.len()))]
    pub fn aggregate(&self, daily: &PriceTable) -> EngineResult<PriceTable> {
        if daily.period() != Period::Daily {
            return Err(DataError::PeriodMismatch {
                expected: Period::Daily.to_string(),
                found: daily.period().to_string(),
            }
            .into());
        }

        if self.period == Period::Daily {
            return Ok(daily.clone());
        }

        let rows: Vec<PriceRow> = daily
            .groups()
            .flat_map(|group| {
                group
                    .iter()
                    .chunk_by(|row| self.period.bucket(row.date))
                    .into_iter()
                    .filter_map(|(_, bucket)| collapse(bucket))
                    .collect::<Vec<_>>()
            })
            .collect();

        tracing::debug!(buckets = rows.len(), "Aggregated price rows");
        PriceTable::with_period(self.period, daily.group_cols().to_vec(), rows)
    }
}

fn collapse<'a>(mut bucket: impl Iterator<Item = &'a PriceRow>) -> Option<PriceRow> {
    let first = bucket.next()?;
    let mut out = first.clone();
    for row in bucket {
        out.high = out.high.max(row.high);
        out.low = out.low.min(row.low);
        out.close = row.close;
        out.volume = row.volume;
        out.date = row.date;
    }
    Some(out)
}

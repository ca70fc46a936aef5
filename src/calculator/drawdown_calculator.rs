use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    calculator::return_calculator::{ReturnRow, ReturnTable},
    data::domain::Period,
    error::EngineResult,
    math::stats::round2,
};

/// A return row extended with drawdown figures of its group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawdownRow {
    pub returns: ReturnRow,
    /// Running max of the cumulative return (percent).
    pub peak: f64,
    /// Distance from the peak, in cumulative-return percentage points.
    pub drawdown: f64,
    /// `drawdown / peak * 100`, `0` while the peak is `0`.
    pub percent_drawdown: f64,
    /// Worst percent drawdown observed up to this row.
    pub cumulative_max_percent_drawdown: f64,
    /// Worst percent drawdown of the whole group.
    pub max_percent_drawdown: f64,
    /// Last date the group's worst percent drawdown was observed.
    pub max_drawdown_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawdownTable {
    pub(crate) period: Period,
    pub(crate) group_cols: Vec<String>,
    pub(crate) rows: Vec<DrawdownRow>,
}

impl DrawdownTable {
    pub fn period(&self) -> Period {
        self.period
    }

    pub fn group_cols(&self) -> &[String] {
        &self.group_cols
    }

    pub fn rows(&self) -> &[DrawdownRow] {
        &self.rows
    }

    pub fn groups(&self) -> impl Iterator<Item = &[DrawdownRow]> {
        self.rows
            .chunk_by(|a, b| a.returns.price.key == b.returns.price.key)
    }
}

/// Peak-tracking drawdown per group.
///
/// A negative cumulative return counts as an excursion beyond zero:
/// `drawdown = peak + |cumulative|` instead of `peak - cumulative`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DrawdownCalculator;

impl DrawdownCalculator {
    #[tracing::instrument(skip(returns), fields(period = %returns.period(), rows = returns.rows().len()))]
    pub fn calculate(returns: &ReturnTable) -> EngineResult<DrawdownTable> {
        let mut rows = Vec::with_capacity(returns.rows().len());
        for group in returns.groups() {
            rows.extend(group_drawdowns(group));
        }

        Ok(DrawdownTable {
            period: returns.period(),
            group_cols: returns.group_cols().to_vec(),
            rows,
        })
    }
}

fn group_drawdowns(group: &[ReturnRow]) -> Vec<DrawdownRow> {
    let mut peak = f64::NEG_INFINITY;
    let mut running_max_pct = f64::NEG_INFINITY;

    let partial: Vec<(f64, f64, f64, f64)> = group
        .iter()
        .map(|row| {
            let cumulative = row.cumulative_return;
            peak = peak.max(cumulative);

            let drawdown = if cumulative >= 0.0 {
                peak - cumulative
            } else {
                peak + cumulative.abs()
            };
            let percent = if peak != 0.0 {
                round2(drawdown / peak * 100.0)
            } else {
                0.0
            };
            running_max_pct = running_max_pct.max(percent);

            (peak, round2(drawdown), percent, running_max_pct)
        })
        .collect();

    let Some(max_pct) = partial.last().map(|p| p.3) else {
        return Vec::new();
    };
    let max_date = group
        .iter()
        .zip(&partial)
        .filter(|(_, p)| p.2 == max_pct)
        .map(|(row, _)| row.price.date)
        .last()
        .unwrap_or(group[group.len() - 1].price.date);

    group
        .iter()
        .zip(partial)
        .map(|(row, (peak, drawdown, percent, running_max))| DrawdownRow {
            returns: row.clone(),
            peak,
            drawdown,
            percent_drawdown: percent,
            cumulative_max_percent_drawdown: running_max,
            max_percent_drawdown: max_pct,
            max_drawdown_date: max_date,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        calculator::return_calculator::ReturnCalculator,
        data::{domain::PriceRow, table::PriceTable},
    };

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn returns_for(key: &str, open: f64, closes: &[f64]) -> ReturnTable {
        let rows = closes
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let o = if i == 0 { open } else { closes[i - 1] };
                PriceRow::from_open_close(key, date(2024, i as u32 + 1, 28), o, *c, 1.0)
            })
            .collect();
        let prices = PriceTable::with_period(Period::Month, vec!["Ticker".into()], rows)
            .expect("valid table");
        ReturnCalculator::calculate(&prices).expect("returns")
    }

    // ========================================================================
    // Test: Worst Drawdown After A Loss
    // ========================================================================

    #[test]
    fn test_max_drawdown_after_loss() {
        // Period returns: +5%, -10%, +5%
        let returns = returns_for("A", 100.0, &[105.0, 94.5, 99.225]);
        let dd = DrawdownCalculator::calculate(&returns).expect("drawdowns");
        let rows = dd.rows();

        let peaks: Vec<_> = rows.iter().map(|r| r.peak).collect();
        assert_eq!(peaks, vec![5.0, 5.0, 5.0]);

        // Cumulative -5.5% is below zero: drawdown = 5 + 5.5
        assert_eq!(rows[1].returns.cumulative_return, -5.5);
        assert_eq!(rows[1].drawdown, 10.5);
        assert_eq!(rows[1].percent_drawdown, 210.0);

        assert_eq!(rows[0].percent_drawdown, 0.0);
        assert!(rows[2].percent_drawdown < rows[1].percent_drawdown);

        for row in rows {
            assert_eq!(row.max_percent_drawdown, 210.0);
            assert_eq!(row.max_drawdown_date, date(2024, 2, 28));
        }
        let running: Vec<_> = rows.iter().map(|r| r.cumulative_max_percent_drawdown).collect();
        assert_eq!(running, vec![0.0, 210.0, 210.0]);
    }

    // ========================================================================
    // Test: Positive Cumulative Uses Plain Distance From Peak
    // ========================================================================

    #[test]
    fn test_drawdown_above_zero() {
        // Cumulative: 20%, 8%, 32%
        let returns = returns_for("A", 100.0, &[120.0, 108.0, 132.0]);
        let dd = DrawdownCalculator::calculate(&returns).expect("drawdowns");
        let rows = dd.rows();

        assert_eq!(rows[1].peak, 20.0);
        assert_eq!(rows[1].drawdown, 12.0);
        assert_eq!(rows[1].percent_drawdown, 60.0);
        assert_eq!(rows[2].peak, 32.0);
        assert_eq!(rows[2].percent_drawdown, 0.0);
        assert_eq!(rows[2].cumulative_max_percent_drawdown, 60.0);
    }

    // ========================================================================
    // Test: Zero Peak Guard
    // ========================================================================

    #[test]
    fn test_zero_peak_reports_zero_percent() {
        // Flat first period keeps the peak at 0 while the series falls
        let returns = returns_for("A", 100.0, &[100.0, 90.0]);
        let dd = DrawdownCalculator::calculate(&returns).expect("drawdowns");
        let rows = dd.rows();

        assert_eq!(rows[1].peak, 0.0);
        assert_eq!(rows[1].drawdown, 10.0);
        assert_eq!(rows[1].percent_drawdown, 0.0);
        assert!(rows.iter().all(|r| r.percent_drawdown.is_finite()));
    }

    // ========================================================================
    // Test: Negative Peak
    // ========================================================================

    #[test]
    fn test_negative_peak_yields_negative_percent() {
        // Cumulative: -5%, -10%. The peak never reaches zero.
        let returns = returns_for("A", 100.0, &[95.0, 90.0]);
        let dd = DrawdownCalculator::calculate(&returns).expect("drawdowns");
        let rows = dd.rows();

        assert_eq!(rows[1].returns.cumulative_return, -10.0);
        assert_eq!(rows[1].peak, -5.0);
        assert_eq!(rows[0].drawdown, 0.0);
        assert_eq!(rows[1].drawdown, 5.0);
        assert_eq!(rows[1].percent_drawdown, -100.0);

        // The running maximum stays at the first row
        assert!(rows.iter().all(|r| r.max_percent_drawdown == 0.0));
        assert!(rows.iter().all(|r| r.cumulative_max_percent_drawdown == 0.0));
        assert_eq!(rows[0].max_drawdown_date, date(2024, 1, 28));
    }

    // ========================================================================
    // Test: Last Date Of The Worst Drawdown
    // ========================================================================

    #[test]
    fn test_max_drawdown_date_is_last_occurrence() {
        // Cumulative: 10%, 5%, 10%, 5%
        let returns = returns_for("A", 100.0, &[110.0, 105.0, 110.0, 105.0]);
        let dd = DrawdownCalculator::calculate(&returns).expect("drawdowns");

        assert!(dd.rows().iter().all(|r| r.max_percent_drawdown == 50.0));
        assert_eq!(dd.rows()[0].max_drawdown_date, date(2024, 4, 28));
    }

    // ========================================================================
    // Test: Peak Monotonicity Per Group
    // ========================================================================

    #[test]
    fn test_peak_is_non_decreasing_and_groups_are_independent() {
        let mut a = returns_for("A", 100.0, &[104.0, 101.0, 107.0, 99.0, 111.0]);
        let b = returns_for("B", 50.0, &[60.0, 45.0]);
        a.rows.extend(b.rows);

        let dd = DrawdownCalculator::calculate(&a).expect("drawdowns");
        assert_eq!(dd.groups().count(), 2);

        for group in dd.groups() {
            for pair in group.windows(2) {
                assert!(pair[1].peak >= pair[0].peak);
            }
            assert!(group.iter().all(|r| r.percent_drawdown >= 0.0));
        }

        let b_rows: Vec<_> = dd
            .rows()
            .iter()
            .filter(|r| r.returns.price.key.to_string() == "B")
            .collect();
        assert_eq!(b_rows[0].peak, 20.0);
    }
}

use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{DataError, EngineResult};

/// Inclusive calendar window a row source is queried with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    /// Window reaching `years_back` full years into the past.
    ///
    /// - `start`: January 1st of `today.year() - years_back`
    /// - `end`: December 31st of `today.year() + years_forward` if `years_forward > 0`,
    ///   otherwise the day before `today`
    ///
    /// # Errors
    /// [`DataError::DateParse`] if either bound falls outside the representable
    /// calendar.
    pub fn for_years(years_back: u32, years_forward: u32, today: NaiveDate) -> EngineResult<Self> {
        let out_of_range = |column: &str, sign: char, years: u32| DataError::DateParse {
            column: column.to_string(),
            value: format!("{} {sign} {years} years", today.year()),
        };

        let start = i32::try_from(years_back)
            .ok()
            .and_then(|back| today.year().checked_sub(back))
            .and_then(|year| NaiveDate::from_ymd_opt(year, 1, 1))
            .ok_or_else(|| out_of_range("start", '-', years_back))?;

        let end = if years_forward > 0 {
            i32::try_from(years_forward)
                .ok()
                .and_then(|forward| today.year().checked_add(forward))
                .and_then(|year| NaiveDate::from_ymd_opt(year, 12, 31))
                .ok_or_else(|| out_of_range("end", '+', years_forward))?
        } else {
            today
                .checked_sub_days(Days::new(1))
                .ok_or_else(|| DataError::DateParse {
                    column: "end".to_string(),
                    value: today.to_string(),
                })?
        };

        Ok(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn test_backward_window_ends_yesterday() {
        let window = DateWindow::for_years(3, 0, date(2025, 3, 1)).expect("valid window");
        assert_eq!(window.start, date(2022, 1, 1));
        assert_eq!(window.end, date(2025, 2, 28));
    }

    #[test]
    fn test_forward_window_ends_on_new_years_eve() {
        let window = DateWindow::for_years(1, 2, date(2025, 6, 15)).expect("valid window");
        assert_eq!(window.start, date(2024, 1, 1));
        assert_eq!(window.end, date(2027, 12, 31));
        assert!(window.contains(date(2026, 7, 4)));
        assert!(!window.contains(date(2023, 12, 31)));
    }

    #[test]
    fn test_out_of_range_years_are_rejected() {
        let today = date(2025, 6, 15);
        for (back, forward) in [(0, i32::MAX as u32), (u32::MAX, 0), (1_000_000, 0)] {
            let err = DateWindow::for_years(back, forward, today).expect_err("beyond the calendar");
            assert!(matches!(
                err,
                crate::error::EngineError::Data(DataError::DateParse { .. })
            ));
        }
    }
}

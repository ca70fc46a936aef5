use std::path::PathBuf;

use returns_engine::prelude::*;

pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

/// Daily prices of AAPL, MSFT and XOM for 2022 and 2023, two rows per month.
pub fn daily_prices() -> PriceTable {
    PriceTable::from_csv(fixture_path("prices.csv"), &["Ticker"])
        .expect("failed to load price fixture")
}

pub fn returns_at(period: Period) -> ReturnTable {
    let prices = PeriodAggregator::new(period)
        .aggregate(&daily_prices())
        .expect("failed to aggregate prices");
    ReturnCalculator::calculate(&prices).expect("failed to calculate returns")
}

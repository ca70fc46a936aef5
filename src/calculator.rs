pub mod drawdown_calculator;
pub mod information_ratio_calculator;
pub mod period_aggregator;
pub mod portfolio_aggregator;
pub mod return_calculator;
pub mod statistics_summarizer;

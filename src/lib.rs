//! Period-aggregated return, risk, drawdown and distribution statistics over
//! historical security prices.
//!
//! The pipeline is a sequence of pure transforms over typed tables:
//! [`PeriodAggregator`] → [`ReturnCalculator`] → [`DrawdownCalculator`],
//! with [`PortfolioAggregator`], [`StatisticsSummarizer`] and
//! [`InformationRatioCalculator`] consuming the return table. Every table
//! converts into a polars-backed report that can be written as CSV, Parquet or JSON.
//!
//! [`PeriodAggregator`]: calculator::period_aggregator::PeriodAggregator
//! [`ReturnCalculator`]: calculator::return_calculator::ReturnCalculator
//! [`DrawdownCalculator`]: calculator::drawdown_calculator::DrawdownCalculator
//! [`PortfolioAggregator`]: calculator::portfolio_aggregator::PortfolioAggregator
//! [`StatisticsSummarizer`]: calculator::statistics_summarizer::StatisticsSummarizer
//! [`InformationRatioCalculator`]: calculator::information_ratio_calculator::InformationRatioCalculator

pub mod calculator;
pub mod config;
pub mod data;
pub mod error;
pub mod math;
pub mod prelude;
pub mod report;

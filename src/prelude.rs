// 1. Traits
pub use crate::math::running::Running;
pub use crate::report::io::{
    AsFormattedLazyFrame, Report, ReportName, ToCsv, ToJson, ToParquet, ToSchema,
};

// 2. Pipeline Stages
pub use crate::calculator::{
    drawdown_calculator::{DrawdownCalculator, DrawdownRow, DrawdownTable},
    information_ratio_calculator::{InformationRatio, InformationRatioCalculator, NamedSeries},
    period_aggregator::PeriodAggregator,
    portfolio_aggregator::{PortfolioAggregator, PortfolioRow, PortfolioTable},
    return_calculator::{ReturnCalculator, ReturnMetric, ReturnRow, ReturnTable},
    statistics_summarizer::{StatisticsSummarizer, StatsRow, StatsTable},
};

// 3. Domain Types
pub use crate::data::{
    domain::{GroupKey, Period, PriceRow},
    table::{PriceCol, PriceTable},
    window::DateWindow,
};

// 4. Reports
pub use crate::report::{
    drawdowns::DrawdownsReport,
    io::{FileExtension, read_report_csv},
    panels::{PeriodPanel, TopReturns},
    portfolio::PortfolioReport,
    returns::ReturnsReport,
    statistics::StatisticsReport,
};

// 5. Configuration
pub use crate::config::AnalysisConfig;

// 6. Errors
pub use crate::error::{ComputeError, DataError, EngineError, EngineResult, IoError};

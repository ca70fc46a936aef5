use serde::{Deserialize, Serialize};

/// Incremental statistics updated one observation at a time.
pub trait Running: std::fmt::Debug {
    type Output;

    /// Feeds the next observation and returns the statistic over everything seen so far.
    fn update(&mut self, value: f64) -> Self::Output;

    /// Clears the internal state (e.g. when moving on to the next group).
    fn reset(&mut self);
}

// ================================================================================================
// Expanding Standard Deviation
// ================================================================================================

/// Expanding-window sample standard deviation (ddof = 1), Welford's algorithm.
///
/// With fewer than two observations no variance is defined and `0.0` is reported.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExpandingStd {
    count: u64,
    mean: f64,
    m2: f64,
}

impl ExpandingStd {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn value(&self) -> f64 {
        if self.count < 2 {
            return 0.0;
        }
        (self.m2 / (self.count - 1) as f64).sqrt()
    }
}

impl Running for ExpandingStd {
    type Output = f64;

    fn update(&mut self, value: f64) -> f64 {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
        self.value()
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

// ================================================================================================
// Annualizer
// ================================================================================================

/// Annualized figures after one more period return, expressed as fractions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Annualized {
    pub cumulative_simple_return: f64,
    pub annualized_return: f64,
    pub volatility: f64,
    pub downside_volatility: f64,
}

/// Rolling annualization of a simple-return path.
///
/// - Return: `(1 + cumulative simple return)^(periods_per_year / n) - 1`
/// - Volatility: expanding sample std of all returns, scaled by `sqrt(periods_per_year)`
/// - Downside volatility: same over negative returns only, `0` if there are none
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Annualizer {
    periods_per_year: f64,
    count: u64,
    growth: f64,
    total: ExpandingStd,
    downside: ExpandingStd,
}

impl Annualizer {
    pub fn new(periods_per_year: u16) -> Self {
        Self {
            periods_per_year: f64::from(periods_per_year),
            count: 0,
            growth: 1.0,
            total: ExpandingStd::new(),
            downside: ExpandingStd::new(),
        }
    }
}

impl Running for Annualizer {
    type Output = Annualized;

    fn update(&mut self, period_return: f64) -> Annualized {
        self.count += 1;
        self.growth *= 1.0 + period_return;

        let scale = self.periods_per_year.sqrt();
        let volatility = self.total.update(period_return) * scale;
        if period_return < 0.0 {
            self.downside.update(period_return);
        }

        Annualized {
            cumulative_simple_return: self.growth - 1.0,
            annualized_return: self.growth.powf(self.periods_per_year / self.count as f64) - 1.0,
            volatility,
            downside_volatility: self.downside.value() * scale,
        }
    }

    fn reset(&mut self) {
        self.count = 0;
        self.growth = 1.0;
        self.total.reset();
        self.downside.reset();
    }
}

// 📈 Metrics Engine - Pure statistics over a 12-month collection series
//
// Everything here is a deterministic function of the dense monthly array.
// Nothing errors: missing data is zero-filled before it arrives, and every
// ratio with a zero denominator short-circuits to 0 instead of NaN/Inf.

use serde::{Deserialize, Serialize};

/// Month labels, index 0 = January.
pub const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

// ============================================================================
// MONTHLY SERIES
// ============================================================================

/// Exactly 12 collection totals for one calendar year, always dense.
///
/// The fixed-length array (rather than a sparse month map) is deliberate:
/// it removes "missing month" branching from every statistic below.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonthlySeries(pub [f64; 12]);

impl MonthlySeries {
    pub fn zeroed() -> Self {
        MonthlySeries([0.0; 12])
    }

    /// Zero-fill a possibly short or overlong slice into 12 slots.
    pub fn from_partial(values: &[f64]) -> Self {
        let mut slots = [0.0; 12];
        for (i, slot) in slots.iter_mut().enumerate() {
            *slot = values.get(i).copied().unwrap_or(0.0);
        }
        MonthlySeries(slots)
    }

    pub fn get(&self, month: usize) -> f64 {
        self.0[month]
    }

    pub fn as_slice(&self) -> &[f64; 12] {
        &self.0
    }

    pub fn sum(&self) -> f64 {
        self.0.iter().sum()
    }
}

impl Default for MonthlySeries {
    fn default() -> Self {
        Self::zeroed()
    }
}

// ============================================================================
// DERIVED VALUES
// ============================================================================

/// A month index paired with its label and value (peak/trough reporting).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthValue {
    pub month_index: usize,
    pub month: String,
    pub value: f64,
}

/// One histogram bin over the monthly values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramBin {
    pub label: String,
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

/// Every statistic the report page derives from one series.
///
/// Recomputable on demand from `monthly` alone; nothing here is persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesStats {
    pub monthly: MonthlySeries,
    pub cumulative: [f64; 12],
    pub last_active_index: usize,
    pub mom_delta: f64,
    pub mom_percent: f64,
    pub peak: MonthValue,
    pub trough: MonthValue,
    pub mean: f64,
    pub variance: f64,
    pub std_dev: f64,
    pub run_rate: f64,
    pub quarters: [f64; 4],
    pub histogram: Vec<HistogramBin>,
    /// Advisory check that the independently supplied total agrees with
    /// sum(monthly) within a cent. Never gates report production.
    pub sum_matches_total: bool,
}

// ============================================================================
// METRICS ENGINE
// ============================================================================

pub struct MetricsEngine {
    /// Trailing months feeding the run-rate (default 3)
    pub trailing_window: usize,

    /// Histogram bin count (default 5)
    pub histogram_bins: usize,

    /// Tolerance for the independent-total agreement check
    pub total_tolerance: f64,
}

impl MetricsEngine {
    pub fn new() -> Self {
        MetricsEngine {
            trailing_window: 3,
            histogram_bins: 5,
            total_tolerance: 0.01,
        }
    }

    pub fn with_trailing_window(window: usize) -> Self {
        MetricsEngine {
            trailing_window: window.max(1),
            ..Self::new()
        }
    }

    /// Compute every statistic in one pass over the series.
    pub fn analyze(&self, monthly: &MonthlySeries, independent_total: f64) -> SeriesStats {
        let last_active = self.last_active_index(monthly);
        let (mom_delta, mom_percent) = self.month_over_month(monthly);
        let (mean, variance, std_dev) = self.dispersion(monthly);

        SeriesStats {
            monthly: *monthly,
            cumulative: self.cumulative(monthly),
            last_active_index: last_active,
            mom_delta,
            mom_percent,
            peak: self.peak(monthly),
            trough: self.trough(monthly),
            mean,
            variance,
            std_dev,
            run_rate: self.run_rate(monthly),
            quarters: self.quarterly_sums(monthly),
            histogram: self.histogram(monthly),
            sum_matches_total: (monthly.sum() - independent_total).abs() < self.total_tolerance,
        }
    }

    /// Running prefix sum; slot 11 equals the series total.
    pub fn cumulative(&self, monthly: &MonthlySeries) -> [f64; 12] {
        let mut out = [0.0; 12];
        let mut run = 0.0;
        for (i, v) in monthly.0.iter().enumerate() {
            run += v;
            out[i] = run;
        }
        out
    }

    /// Highest month with a positive value; 11 when the year is empty.
    ///
    /// This anchors the month-over-month comparison so trailing zero
    /// months are not read as meaningful troughs.
    pub fn last_active_index(&self, monthly: &MonthlySeries) -> usize {
        monthly
            .0
            .iter()
            .rposition(|v| *v > 0.0)
            .unwrap_or(11)
    }

    /// (delta, percent) of the last active month vs its predecessor.
    ///
    /// Percent is 0 when the predecessor is 0 - never NaN or infinity.
    pub fn month_over_month(&self, monthly: &MonthlySeries) -> (f64, f64) {
        let last = self.last_active_index(monthly);
        let current = monthly.get(last);
        let previous = monthly.get(last.saturating_sub(1));

        let delta = current - previous;
        let percent = if previous != 0.0 {
            delta / previous * 100.0
        } else {
            0.0
        };
        (delta, percent)
    }

    /// Maximum month; ties report the earliest index.
    pub fn peak(&self, monthly: &MonthlySeries) -> MonthValue {
        let mut best = 0usize;
        for (i, v) in monthly.0.iter().enumerate() {
            if *v > monthly.0[best] {
                best = i;
            }
        }
        MonthValue {
            month_index: best,
            month: MONTHS[best].to_string(),
            value: monthly.0[best],
        }
    }

    /// Minimum month; ties report the earliest index.
    pub fn trough(&self, monthly: &MonthlySeries) -> MonthValue {
        let mut worst = 0usize;
        for (i, v) in monthly.0.iter().enumerate() {
            if *v < monthly.0[worst] {
                worst = i;
            }
        }
        MonthValue {
            month_index: worst,
            month: MONTHS[worst].to_string(),
            value: monthly.0[worst],
        }
    }

    /// Population mean/variance/stddev - divisor is always 12, including
    /// zero months.
    pub fn dispersion(&self, monthly: &MonthlySeries) -> (f64, f64, f64) {
        let mean = monthly.sum() / 12.0;
        let variance = monthly
            .0
            .iter()
            .map(|v| (v - mean).powi(2))
            .sum::<f64>()
            / 12.0;
        (mean, variance, variance.sqrt())
    }

    /// Annualized recent pace: average of the trailing window ending at
    /// the last active month (shorter near January), times 12.
    pub fn run_rate(&self, monthly: &MonthlySeries) -> f64 {
        let last = self.last_active_index(monthly);
        let start = (last + 1).saturating_sub(self.trailing_window);
        let window = &monthly.0[start..=last];

        if window.is_empty() {
            return 0.0;
        }
        window.iter().sum::<f64>() / window.len() as f64 * 12.0
    }

    /// Fixed calendar quarters: Q1=[0..3), Q2=[3..6), Q3=[6..9), Q4=[9..12).
    pub fn quarterly_sums(&self, monthly: &MonthlySeries) -> [f64; 4] {
        let mut quarters = [0.0; 4];
        for (i, v) in monthly.0.iter().enumerate() {
            quarters[i / 3] += v;
        }
        quarters
    }

    /// Equal-width bins over [min, max].
    ///
    /// Degenerate all-equal series collapse to a single bin holding all 12
    /// values (no zero-width division). The maximum value lands in the top
    /// bin via the clamp instead of overflowing into a phantom extra bin.
    pub fn histogram(&self, monthly: &MonthlySeries) -> Vec<HistogramBin> {
        let lo = monthly.0.iter().cloned().fold(f64::INFINITY, f64::min);
        let hi = monthly.0.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

        if hi == lo {
            return vec![HistogramBin {
                label: format!("{:.0}", lo),
                lower: lo,
                upper: hi,
                count: 12,
            }];
        }

        let bins = self.histogram_bins.max(1);
        let width = (hi - lo) / bins as f64;
        let mut counts = vec![0usize; bins];

        for v in monthly.0.iter() {
            let idx = (((v - lo) / width).floor() as usize).min(bins - 1);
            counts[idx] += 1;
        }

        counts
            .into_iter()
            .enumerate()
            .map(|(i, count)| {
                let lower = lo + i as f64 * width;
                let upper = lo + (i + 1) as f64 * width;
                HistogramBin {
                    label: format!("{:.0}-{:.0}", lower, upper),
                    lower,
                    upper,
                    count,
                }
            })
            .collect()
    }
}

impl Default for MetricsEngine {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================

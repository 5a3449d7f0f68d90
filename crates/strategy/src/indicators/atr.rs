//! Average True Range (ATR).
//!
//! True Range: max(high-low, |high-prev_close|, |low-prev_close|).
//! ATR is the Wilder-smoothed TR; the first bar has no previous close and is
//! left out, so the first ATR value sits at index `period`.

use common::PriceBar;

use super::moving_average::wilder;

#[derive(Debug, Clone)]
pub struct AtrIndicator {
    pub period: usize,
}

/// True Range per bar. TR[0] is NaN (no previous close).
pub fn true_range(bars: &[PriceBar]) -> Vec<f64> {
    let mut tr = vec![f64::NAN; bars.len()];
    for i in 1..bars.len() {
        let h = bars[i].high;
        let l = bars[i].low;
        let pc = bars[i - 1].close;
        tr[i] = (h - l).max((h - pc).abs()).max((l - pc).abs());
    }
    tr
}

impl AtrIndicator {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "ATR period must be >= 1");
        Self { period }
    }

    pub fn series(&self, bars: &[PriceBar]) -> Vec<f64> {
        wilder(&true_range(bars), self.period)
    }
}

//! Stochastic oscillator.
//!
//! %K = 100 × (close − lowest low) / (highest high − lowest low) over `k`
//! bars, %D = SMA(%K, d). A zero range reads as the midpoint, 50.

use common::PriceBar;

use super::moving_average::sma;

#[derive(Debug, Clone)]
pub struct StochasticIndicator {
    pub k_period: usize,
    pub d_period: usize,
}

#[derive(Debug, Clone)]
pub struct StochasticSeries {
    pub k: Vec<f64>,
    pub d: Vec<f64>,
}

impl StochasticIndicator {
    pub fn new(k_period: usize, d_period: usize) -> Self {
        assert!(k_period >= 1 && d_period >= 1, "Stochastic periods must be >= 1");
        Self { k_period, d_period }
    }

    pub fn series(&self, bars: &[PriceBar]) -> StochasticSeries {
        let n = bars.len();
        let mut k = vec![f64::NAN; n];

        if n >= self.k_period {
            for i in (self.k_period - 1)..n {
                let window = &bars[i + 1 - self.k_period..=i];
                let highest = window.iter().map(|b| b.high).fold(f64::MIN, f64::max);
                let lowest = window.iter().map(|b| b.low).fold(f64::MAX, f64::min);
                let range = highest - lowest;
                k[i] = if range > 0.0 {
                    100.0 * (bars[i].close - lowest) / range
                } else {
                    50.0
                };
            }
        }

        let d = sma(&k, self.d_period);
        StochasticSeries { k, d }
    }
}

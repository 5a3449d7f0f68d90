use super::moving_average::wilder;

/// RSI (Relative Strength Index) indicator.
///
/// Uses Wilder's smoothed moving average (same as TradingView / standard RSI).
/// The first value appears at index `period` (it needs `period` price changes).
#[derive(Debug, Clone)]
pub struct RsiIndicator {
    pub period: usize,
}

impl RsiIndicator {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "RSI period must be >= 1");
        Self { period }
    }

    /// RSI for every close (oldest first). NaN during warm-up.
    ///
    /// A perfectly flat window (no gains, no losses) reads as neutral 50.
    pub fn series(&self, closes: &[f64]) -> Vec<f64> {
        let n = closes.len();
        if n < self.period + 1 {
            return vec![f64::NAN; n];
        }

        let mut gains = vec![f64::NAN; n];
        let mut losses = vec![f64::NAN; n];
        for i in 1..n {
            let change = closes[i] - closes[i - 1];
            gains[i] = change.max(0.0);
            losses[i] = (-change).max(0.0);
        }

        let avg_gain = wilder(&gains, self.period);
        let avg_loss = wilder(&losses, self.period);

        avg_gain
            .iter()
            .zip(avg_loss.iter())
            .map(|(&g, &l)| {
                if g.is_nan() || l.is_nan() {
                    f64::NAN
                } else if l == 0.0 && g == 0.0 {
                    50.0
                } else if l == 0.0 {
                    100.0
                } else {
                    100.0 - 100.0 / (1.0 + g / l)
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rsi_is_nan_when_insufficient_data() {
        let rsi = RsiIndicator::new(14);
        // Need at least period+1 = 15 values
        let prices = vec![100.0; 14];
        assert!(rsi.series(&prices).iter().all(|v| v.is_nan()));
    }

    #[test]
    fn rsi_first_value_at_period() {
        let rsi = RsiIndicator::new(14);
        let prices: Vec<f64> = (0..15).map(|i| 100.0 + i as f64).collect();
        let out = rsi.series(&prices);
        assert!(out[13].is_nan());
        assert!(!out[14].is_nan());
    }

    #[test]
    fn rsi_all_gains_returns_100() {
        let rsi = RsiIndicator::new(3);
        // Strictly increasing prices → RSI = 100
        let prices = vec![10.0, 11.0, 12.0, 13.0, 14.0];
        let value = *rsi.series(&prices).last().unwrap();
        assert!((value - 100.0).abs() < 1e-6, "Expected ~100, got {value}");
    }

    #[test]
    fn rsi_all_losses_returns_0() {
        let rsi = RsiIndicator::new(3);
        // Strictly decreasing prices → RSI = 0
        let prices = vec![14.0, 13.0, 12.0, 11.0, 10.0];
        let value = *rsi.series(&prices).last().unwrap();
        assert!((value - 0.0).abs() < 1e-6, "Expected ~0, got {value}");
    }

    #[test]
    fn rsi_flat_is_neutral() {
        let rsi = RsiIndicator::new(3);
        let value = *rsi.series(&[10.0; 6]).last().unwrap();
        assert_eq!(value, 50.0);
    }

    #[test]
    fn rsi_known_series_stays_in_range() {
        // Prices sourced from Investopedia RSI example (rounded)
        let rsi = RsiIndicator::new(14);
        let prices = vec![
            44.34, 44.09, 44.15, 43.61, 44.33, 44.83, 45.10, 45.15, 43.61, 44.33, 44.83, 45.10,
            45.15, 44.34, 44.09, 44.70, 45.20,
        ];
        for v in rsi.series(&prices).into_iter().filter(|v| !v.is_nan()) {
            assert!((0.0..=100.0).contains(&v), "RSI out of range: {v}");
        }
    }
}

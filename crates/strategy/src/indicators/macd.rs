use super::moving_average::ema;

/// MACD (Moving Average Convergence/Divergence) indicator.
///
/// MACD line = EMA(fast) − EMA(slow), signal = EMA(macd_line, signal).
#[derive(Debug, Clone)]
pub struct MacdIndicator {
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
}

/// MACD line and its signal line, aligned with the input closes.
#[derive(Debug, Clone)]
pub struct MacdSeries {
    pub macd: Vec<f64>,
    pub signal: Vec<f64>,
}

impl MacdIndicator {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Self {
        assert!(
            fast >= 1 && slow >= 1 && signal >= 1,
            "MACD periods must be >= 1"
        );
        Self { fast, slow, signal }
    }

    /// The signal line starts once `signal` MACD values exist, i.e. at
    /// index `max(fast, slow) + signal - 2`.
    pub fn series(&self, closes: &[f64]) -> MacdSeries {
        let fast = ema(closes, self.fast);
        let slow = ema(closes, self.slow);
        let macd: Vec<f64> = fast
            .iter()
            .zip(slow.iter())
            .map(|(f, s)| f - s) // NaN propagates
            .collect();
        let signal = ema(&macd, self.signal);
        MacdSeries { macd, signal }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trending_up(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + i as f64 * 0.5).collect()
    }

    #[test]
    fn macd_warm_up_is_nan() {
        let macd = MacdIndicator::new(12, 26, 9);
        let out = macd.series(&trending_up(60));
        assert!(out.macd[24].is_nan());
        assert!(!out.macd[25].is_nan());
        assert!(out.signal[32].is_nan());
        assert!(!out.signal[33].is_nan());
    }

    #[test]
    fn macd_positive_on_steady_uptrend() {
        let macd = MacdIndicator::new(3, 6, 3);
        let out = macd.series(&trending_up(40));
        let last = *out.macd.last().unwrap();
        assert!(last > 0.0, "fast EMA should lead on an uptrend, got {last}");
    }

    #[test]
    fn macd_crosses_up_after_reversal() {
        let macd = MacdIndicator::new(3, 6, 3);
        // Down then sharply up → MACD must end above its signal line
        let mut prices: Vec<f64> = (0..20).map(|i| 100.0 - i as f64 * 0.5).collect();
        prices.extend((0..20).map(|i| 90.0 + i as f64 * 2.0));
        let out = macd.series(&prices);
        let crossed = (1..prices.len()).any(|i| {
            out.macd[i - 1] <= out.signal[i - 1] && out.macd[i] > out.signal[i]
        });
        assert!(crossed, "expected a bullish crossover");
    }

    #[test]
    fn macd_flat_is_zero() {
        let macd = MacdIndicator::new(3, 6, 3);
        let out = macd.series(&[50.0; 20]);
        assert!(out.macd.last().unwrap().abs() < 1e-12);
        assert!(out.signal.last().unwrap().abs() < 1e-12);
    }
}

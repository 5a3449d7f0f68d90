//! Bollinger Bands: SMA(close, period) ± multiplier × population stddev.

use super::moving_average::sma;

#[derive(Debug, Clone)]
pub struct BollingerIndicator {
    pub period: usize,
    pub multiplier: f64,
}

#[derive(Debug, Clone)]
pub struct BollingerSeries {
    pub upper: Vec<f64>,
    pub middle: Vec<f64>,
    pub lower: Vec<f64>,
}

impl BollingerIndicator {
    pub fn new(period: usize, multiplier: f64) -> Self {
        assert!(period >= 1, "Bollinger period must be >= 1");
        Self { period, multiplier }
    }

    pub fn series(&self, closes: &[f64]) -> BollingerSeries {
        let n = closes.len();
        let middle = sma(closes, self.period);
        let mut upper = vec![f64::NAN; n];
        let mut lower = vec![f64::NAN; n];

        for i in 0..n {
            let mean = middle[i];
            if mean.is_nan() {
                continue;
            }
            let window = &closes[i + 1 - self.period..=i];
            let variance = window
                .iter()
                .map(|c| {
                    let d = c - mean;
                    d * d
                })
                .sum::<f64>()
                / self.period as f64;
            let band = self.multiplier * variance.sqrt();
            upper[i] = mean + band;
            lower[i] = mean - band;
        }

        BollingerSeries {
            upper,
            middle,
            lower,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bands_use_population_stddev() {
        // Window [2, 4, 4, 4, 5, 5, 7, 9]: mean 5, population stddev 2
        let closes = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let out = BollingerIndicator::new(8, 2.0).series(&closes);
        assert!((out.middle[7] - 5.0).abs() < 1e-9);
        assert!((out.upper[7] - 9.0).abs() < 1e-9);
        assert!((out.lower[7] - 1.0).abs() < 1e-9);
        assert!(out.upper[6].is_nan());
    }

    #[test]
    fn flat_series_collapses_bands() {
        let out = BollingerIndicator::new(3, 2.0).series(&[10.0; 5]);
        assert_eq!(out.upper[4], out.lower[4]);
    }
}

//! Average Directional Index.
//!
//! +DM/−DM and TR are Wilder-smoothed into +DI/−DI, DX = |+DI − −DI| / (+DI + −DI),
//! and ADX is the Wilder-smoothed DX. First value at index `2 × period − 1`.

use common::PriceBar;

use super::atr::true_range;
use super::moving_average::wilder;

#[derive(Debug, Clone)]
pub struct AdxIndicator {
    pub period: usize,
}

impl AdxIndicator {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "ADX period must be >= 1");
        Self { period }
    }

    pub fn series(&self, bars: &[PriceBar]) -> Vec<f64> {
        let n = bars.len();
        let mut plus_dm = vec![f64::NAN; n];
        let mut minus_dm = vec![f64::NAN; n];
        for i in 1..n {
            let up_move = bars[i].high - bars[i - 1].high;
            let down_move = bars[i - 1].low - bars[i].low;
            plus_dm[i] = if up_move > down_move && up_move > 0.0 {
                up_move
            } else {
                0.0
            };
            minus_dm[i] = if down_move > up_move && down_move > 0.0 {
                down_move
            } else {
                0.0
            };
        }

        let tr = wilder(&true_range(bars), self.period);
        let plus = wilder(&plus_dm, self.period);
        let minus = wilder(&minus_dm, self.period);

        let dx: Vec<f64> = (0..n)
            .map(|i| {
                if tr[i].is_nan() {
                    return f64::NAN;
                }
                if tr[i] == 0.0 {
                    return 0.0;
                }
                let plus_di = 100.0 * plus[i] / tr[i];
                let minus_di = 100.0 * minus[i] / tr[i];
                let sum = plus_di + minus_di;
                if sum == 0.0 {
                    0.0
                } else {
                    100.0 * (plus_di - minus_di).abs() / sum
                }
            })
            .collect();

        wilder(&dx, self.period)
    }
}

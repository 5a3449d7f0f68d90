//! Moving averages and the smoothing helpers the other indicators build on.
//!
//! Every function returns a series of the same length as its input, with NaN
//! wherever the window is not yet filled.

/// Index of the first non-NaN value.
pub(crate) fn first_valid(values: &[f64]) -> Option<usize> {
    values.iter().position(|v| !v.is_nan())
}

/// Simple moving average. NaN if any value in the window is NaN.
pub fn sma(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut out = vec![f64::NAN; n];
    if period == 0 || n < period {
        return out;
    }
    for i in (period - 1)..n {
        let window = &values[i + 1 - period..=i];
        if window.iter().any(|v| v.is_nan()) {
            continue;
        }
        out[i] = window.iter().sum::<f64>() / period as f64;
    }
    out
}

/// Exponential moving average, `k = 2 / (period + 1)`.
///
/// Seeded with the SMA of the first `period` valid values; leading NaNs
/// (e.g. the warm-up of a MACD line) are skipped.
pub fn ema(values: &[f64], period: usize) -> Vec<f64> {
    let k = 2.0 / (period as f64 + 1.0);
    smooth(values, period, k)
}

/// Wilder's smoothing, `alpha = 1 / period`. Used by RSI, ATR and ADX.
pub fn wilder(values: &[f64], period: usize) -> Vec<f64> {
    let alpha = 1.0 / period as f64;
    smooth(values, period, alpha)
}

fn smooth(values: &[f64], period: usize, alpha: f64) -> Vec<f64> {
    let n = values.len();
    let mut out = vec![f64::NAN; n];
    if period == 0 {
        return out;
    }
    let Some(start) = first_valid(values) else {
        return out;
    };
    let seed_end = start + period;
    if seed_end > n {
        return out;
    }

    let seed_window = &values[start..seed_end];
    if seed_window.iter().any(|v| v.is_nan()) {
        return out;
    }
    let mut prev = seed_window.iter().sum::<f64>() / period as f64;
    out[seed_end - 1] = prev;

    for i in seed_end..n {
        if values[i].is_nan() {
            // A gap poisons everything after it.
            break;
        }
        prev += alpha * (values[i] - prev);
        out[i] = prev;
    }
    out
}

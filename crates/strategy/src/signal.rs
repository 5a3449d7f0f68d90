//! Weighted multi-indicator signal generator.
//!
//! Six sub-signals in {-2..=2} are combined with normalized weights, squashed
//! through `tanh` and discretized into -1 / 0 / 1.

use std::cmp::Ordering;

use common::FeatureBar;

use crate::config::StrategyParameters;

/// Fixed dampening applied to the buy/sell thresholds.
pub const SENSITIVITY: f64 = 0.85;

const WEIGHT_BOOST: f64 = 1.5;
const RSI_EXTREME_LOW: f64 = 30.0;
const RSI_EXTREME_HIGH: f64 = 70.0;
const RSI_DEEP_MARGIN: f64 = 10.0;
const STRONG_TREND_ADX: f64 = 25.0;
const STOCH_OVERSOLD: f64 = 20.0;
const STOCH_OVERBOUGHT: f64 = 80.0;
/// Share of the band width near each band that counts as "close to it".
const BAND_EDGE: f64 = 0.1;

/// Sub-signal slots, in the same order as [`StrategyParameters::weights`].
pub const EMA: usize = 0;
pub const TREND: usize = 1;
pub const RSI: usize = 2;
pub const MACD: usize = 3;
pub const BOLLINGER: usize = 4;
pub const STOCHASTIC: usize = 5;

/// Scale weights so they sum to 1. A zero sum means equal weighting.
pub fn normalize_weights(weights: [f64; 6]) -> [f64; 6] {
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return [1.0 / 6.0; 6];
    }
    weights.map(|w| w / total)
}

/// Assign `signal` and `position` to every bar after the first.
///
/// Fewer than two bars are left untouched.
pub fn generate_signals(features: &mut [FeatureBar], params: &StrategyParameters) {
    if features.len() < 2 {
        return;
    }
    let weights = normalize_weights(params.weights());

    for i in 1..features.len() {
        let score = combined_score(&features[i - 1], &features[i], params, &weights);
        let signal = discretize(score, params);
        let prev_signal = features[i - 1].signal;
        let bar = &mut features[i];
        bar.signal = signal;
        bar.position = signal - prev_signal;
    }
}

/// `tanh` of the weighted, boosted sub-signal sum. Always in (-1, 1).
pub fn combined_score(
    prev: &FeatureBar,
    cur: &FeatureBar,
    params: &StrategyParameters,
    normalized: &[f64; 6],
) -> f64 {
    let subs = sub_signals(prev, cur, params);

    let mut weights = *normalized;
    if cur.rsi < RSI_EXTREME_LOW || cur.rsi > RSI_EXTREME_HIGH {
        weights[RSI] *= WEIGHT_BOOST;
    }
    if subs[BOLLINGER] != 0 {
        weights[BOLLINGER] *= WEIGHT_BOOST;
    }

    let sum: f64 = subs
        .iter()
        .zip(weights.iter())
        .map(|(&s, &w)| f64::from(s) * w)
        .sum();
    sum.tanh()
}

pub fn discretize(score: f64, params: &StrategyParameters) -> i8 {
    if score > params.buy_threshold * SENSITIVITY {
        1
    } else if score < params.sell_threshold * SENSITIVITY {
        -1
    } else {
        0
    }
}

/// The six sub-signals for `cur`, using `prev` to detect crossings.
pub fn sub_signals(prev: &FeatureBar, cur: &FeatureBar, params: &StrategyParameters) -> [i8; 6] {
    let mut subs = [0i8; 6];
    subs[EMA] = crossover(prev.ema_short, prev.ema_long, cur.ema_short, cur.ema_long);
    subs[TREND] = trend_volatility(cur);
    subs[RSI] = rsi_zone(cur.rsi, params);
    subs[MACD] = crossover(prev.macd, prev.macd_signal, cur.macd, cur.macd_signal);
    subs[BOLLINGER] = bollinger_zone(cur.close(), cur.bollinger_upper, cur.bollinger_lower);
    subs[STOCHASTIC] = stochastic_zone(prev.stoch_k, prev.stoch_d, cur.stoch_k, cur.stoch_d);
    subs
}

/// Float comparison that treats values within a relative 1e-9 as equal, so
/// rounding noise between two averages of a flat series is not a trend.
fn compare(a: f64, b: f64) -> Ordering {
    let tolerance = 1e-9 * a.abs().max(b.abs()).max(1.0);
    if (a - b).abs() <= tolerance {
        Ordering::Equal
    } else if a > b {
        Ordering::Greater
    } else {
        Ordering::Less
    }
}

/// +2/-2 on the bar where `fast` crosses `slow`, +1/-1 while it stays on one side.
fn crossover(prev_fast: f64, prev_slow: f64, fast: f64, slow: f64) -> i8 {
    if [prev_fast, prev_slow, fast, slow].iter().any(|v| v.is_nan()) {
        return 0;
    }
    match (compare(prev_fast, prev_slow), compare(fast, slow)) {
        (Ordering::Less | Ordering::Equal, Ordering::Greater) => 2,
        (Ordering::Greater | Ordering::Equal, Ordering::Less) => -2,
        (_, Ordering::Greater) => 1,
        (_, Ordering::Less) => -1,
        _ => 0,
    }
}

fn trend_volatility(cur: &FeatureBar) -> i8 {
    if !cur.volatile {
        return 0;
    }
    let direction = if cur.trending { 1 } else { -1 };
    if cur.adx > STRONG_TREND_ADX {
        direction * 2
    } else {
        direction
    }
}

fn rsi_zone(rsi: f64, params: &StrategyParameters) -> i8 {
    if rsi.is_nan() {
        return 0;
    }
    if rsi <= params.rsi_buy_threshold {
        if rsi <= params.rsi_buy_threshold - RSI_DEEP_MARGIN {
            2
        } else {
            1
        }
    } else if rsi >= params.rsi_sell_threshold {
        if rsi >= params.rsi_sell_threshold + RSI_DEEP_MARGIN {
            -2
        } else {
            -1
        }
    } else {
        0
    }
}

fn bollinger_zone(close: f64, upper: f64, lower: f64) -> i8 {
    let width = upper - lower;
    if width.is_nan() || width <= 0.0 {
        return 0;
    }
    if close <= lower {
        2
    } else if close >= upper {
        -2
    } else if close <= lower + BAND_EDGE * width {
        1
    } else if close >= upper - BAND_EDGE * width {
        -1
    } else {
        0
    }
}

fn stochastic_zone(prev_k: f64, prev_d: f64, k: f64, d: f64) -> i8 {
    if [prev_k, prev_d, k, d].iter().any(|v| v.is_nan()) {
        return 0;
    }
    let crossed_up = prev_k <= prev_d && k > d;
    let crossed_down = prev_k >= prev_d && k < d;
    if crossed_up && k < STOCH_OVERSOLD && d < STOCH_OVERSOLD {
        2
    } else if crossed_down && k > STOCH_OVERBOUGHT && d > STOCH_OVERBOUGHT {
        -2
    } else if k < STOCH_OVERSOLD && k > d {
        1
    } else if k > STOCH_OVERBOUGHT && k < d {
        -1
    } else {
        0
    }
}

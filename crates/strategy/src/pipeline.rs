use common::{FeatureBar, PriceBar};
use tracing::debug;

use crate::config::StrategyParameters;
use crate::indicators::{
    ema, sma, AdxIndicator, AtrIndicator, BollingerIndicator, MacdIndicator, RsiIndicator,
    StochasticIndicator,
};

/// Derive the per-bar feature vector for a price series.
///
/// Returns one `FeatureBar` per input bar, or an empty vector when the series
/// is shorter than `params.required_window()` (not yet tradable) or the
/// parameters are invalid. Signals are left at 0; see
/// [`crate::signal::generate_signals`].
pub fn apply_indicators(bars: &[PriceBar], params: &StrategyParameters) -> Vec<FeatureBar> {
    if let Err(e) = params.validate() {
        debug!(error = %e, "Skipping indicator pipeline");
        return Vec::new();
    }
    if bars.len() < params.required_window() {
        return Vec::new();
    }

    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();

    let atr = AtrIndicator::new(params.atr_period).series(bars);
    let rsi = RsiIndicator::new(params.rsi_period).series(&closes);
    let sma_short = sma(&closes, params.ma_short_period);
    let sma_long = sma(&closes, params.ma_long_period);
    let ema_short = ema(&closes, params.ema_short_period);
    let ema_long = ema(&closes, params.ema_long_period);
    let macd = MacdIndicator::new(
        params.macd_short_period,
        params.macd_long_period,
        params.macd_signal_period,
    )
    .series(&closes);
    let bollinger =
        BollingerIndicator::new(params.bollinger_period, params.bollinger_std_dev).series(&closes);
    let stochastic =
        StochasticIndicator::new(params.stochastic_k_period, params.stochastic_d_period)
            .series(bars);
    let adx = AdxIndicator::new(params.atr_period).series(bars);

    bars.iter()
        .enumerate()
        .map(|(i, bar)| {
            let mut f = FeatureBar::from_bar(*bar);
            f.atr = atr[i];
            f.rsi = rsi[i];
            f.sma_short = sma_short[i];
            f.sma_long = sma_long[i];
            f.ema_short = ema_short[i];
            f.ema_long = ema_long[i];
            f.macd = macd.macd[i];
            f.macd_signal = macd.signal[i];
            f.bollinger_upper = bollinger.upper[i];
            f.bollinger_lower = bollinger.lower[i];
            f.stoch_k = stochastic.k[i];
            f.stoch_d = stochastic.d[i];
            f.adx = adx[i];
            // NaN comparisons are false, so warm-up bars carry no flags.
            f.trending = f.sma_short > f.sma_long;
            f.volatile = bar.close > 0.0 && f.atr / bar.close > params.atr_volatility_threshold;
            f
        })
        .collect()
}

/// True once every indicator on the bar has left its warm-up window.
pub fn is_warm(f: &FeatureBar) -> bool {
    [
        f.atr,
        f.rsi,
        f.sma_short,
        f.sma_long,
        f.ema_short,
        f.ema_long,
        f.macd,
        f.macd_signal,
        f.bollinger_upper,
        f.bollinger_lower,
        f.stoch_k,
        f.stoch_d,
        f.adx,
    ]
    .iter()
    .all(|v| v.is_finite())
}

use backtest::{simulate, BacktestConfig};
use common::{Error, PriceBar, Side, Trigger};
use strategy::{Strategy, StrategyParameters, WeightedStrategy};

/// Short periods and all weight on the EMA crossover.
fn ema_only() -> StrategyParameters {
    StrategyParameters {
        ma_short_period: 2,
        ma_long_period: 3,
        rsi_period: 3,
        atr_period: 3,
        ema_short_period: 3,
        ema_long_period: 6,
        macd_short_period: 3,
        macd_long_period: 6,
        macd_signal_period: 3,
        bollinger_period: 3,
        stochastic_k_period: 3,
        stochastic_d_period: 2,
        ema_weight: 1.0,
        trend_weight: 0.0,
        rsi_weight: 0.0,
        macd_weight: 0.0,
        bollinger_weight: 0.0,
        stochastic_weight: 0.0,
        ..StrategyParameters::default()
    }
}

/// Ten falling bars then twenty rising ones, each with a 2.0 high-low range.
fn v_shape() -> Vec<PriceBar> {
    (0..30)
        .map(|i| {
            let c = if i < 10 { 100.0 - i as f64 } else { 91.0 + (i - 9) as f64 };
            PriceBar::new(i as i64 * 60_000, c, c + 1.0, c - 1.0, c, 1.0)
        })
        .collect()
}

#[test]
fn ema_crossover_enters_at_next_open() {
    let params = ema_only();
    let bars = v_shape();

    let features = WeightedStrategy::new("ema", params.clone())
        .unwrap()
        .evaluate(&bars);
    let cross = features.iter().position(|f| f.signal == 1).unwrap();
    assert!(features[cross - 1].ema_short < features[cross - 1].ema_long);
    assert!(features[cross].ema_short > features[cross].ema_long);
    assert_eq!(cross, 13);

    let config = BacktestConfig::default();
    let result = simulate(&bars, &params, &config).unwrap();
    let buy = &result.actions()[0];
    assert_eq!(buy.side, Side::Buy);
    assert_eq!(buy.trigger, Trigger::Signal);
    assert_eq!(buy.timestamp, bars[cross + 1].timestamp);
    let expected = bars[cross + 1].open * (1.0 + config.costs.slippage + config.costs.spread);
    assert!((buy.price - expected).abs() < 1e-9);
}

#[test]
fn stop_loss_breach_closes_at_next_open() {
    let params = ema_only();
    let mut bars = v_shape();
    // Entry executes on bar 14; bar 16 collapses far below 5 x ATR.
    bars[16] = PriceBar::new(16 * 60_000, 97.0, 97.0, 59.0, 60.0, 1.0);
    for (i, bar) in bars.iter_mut().enumerate().skip(17) {
        *bar = PriceBar::new(i as i64 * 60_000, 60.0, 61.0, 59.0, 60.0, 1.0);
    }

    let config = BacktestConfig::default();
    let result = simulate(&bars, &params, &config).unwrap();
    let actions = result.actions();
    assert_eq!(actions[0].side, Side::Buy);

    let sell = &actions[1];
    assert_eq!(sell.side, Side::Sell);
    assert_eq!(sell.trigger, Trigger::StopLoss);
    assert_eq!(sell.timestamp, bars[17].timestamp);
    let expected = bars[17].open * (1.0 - config.costs.slippage - config.costs.spread);
    assert!((sell.price - expected).abs() < 1e-9);
    assert!(sell.profit.unwrap() < 0.0);
    assert!(result.max_drawdown_pct() > 0.0);
}

#[test]
fn zero_atr_fails_the_run() {
    let bars: Vec<PriceBar> = (0..30).map(|i| PriceBar::flat(i * 60_000, 100.0)).collect();
    let err = simulate(&bars, &ema_only(), &BacktestConfig::default()).unwrap_err();
    match err {
        Error::ZeroAtr { index, timestamp } => {
            assert_eq!(index, 7);
            assert_eq!(timestamp, bars[7].timestamp);
        }
        other => panic!("expected ZeroAtr, got {other:?}"),
    }
}

#[test]
fn identical_inputs_give_identical_results() {
    let bars: Vec<PriceBar> = (0..300)
        .map(|i| {
            let c = 50.0 + (i as f64 * 0.21).sin() * 6.0 + (i as f64 * 0.05).cos() * 3.0;
            PriceBar::new(i as i64 * 3_600_000, c - 0.1, c + 0.8, c - 0.8, c, 2.0)
        })
        .collect();
    let params = StrategyParameters::default();
    let config = BacktestConfig::default();

    let a = simulate(&bars, &params, &config).unwrap();
    let b = simulate(&bars, &params, &config).unwrap();
    assert_eq!(a, b);
    assert_eq!(
        serde_json::to_string(a.summary()).unwrap(),
        serde_json::to_string(b.summary()).unwrap()
    );
}

#[test]
fn cash_and_values_never_negative() {
    let bars: Vec<PriceBar> = (0..250)
        .map(|i| {
            let c = 20.0 + (i as f64 * 0.3).sin() * 4.0;
            PriceBar::new(i as i64, c, c + 0.5, c - 0.5, c, 1.0)
        })
        .collect();
    let result = simulate(&bars, &StrategyParameters::default(), &BacktestConfig::default())
        .unwrap();
    assert!(result.snapshots().iter().all(|s| s.value >= 0.0));
    assert!(result.actions().iter().all(|a| a.portfolio_value >= 0.0));
    assert!((0.0..=100.0).contains(&result.win_rate_pct()));
}

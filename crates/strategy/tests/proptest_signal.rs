use proptest::prelude::*;

use common::PriceBar;
use strategy::{normalize_weights, Strategy, StrategyParameters, WeightedStrategy};

fn small_params() -> StrategyParameters {
    StrategyParameters {
        ma_short_period: 3,
        ma_long_period: 6,
        rsi_period: 4,
        atr_period: 4,
        ema_short_period: 3,
        ema_long_period: 6,
        macd_short_period: 3,
        macd_long_period: 6,
        macd_signal_period: 3,
        bollinger_period: 5,
        stochastic_k_period: 4,
        stochastic_d_period: 2,
        ..StrategyParameters::default()
    }
}

fn bars_from(closes: &[f64]) -> Vec<PriceBar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| PriceBar::new(i as i64 * 60_000, c, c * 1.01, c * 0.99, c, 1.0))
        .collect()
}

proptest! {
    /// Every evaluated bar carries a signal in {-1, 0, 1}, whatever the prices.
    #[test]
    fn signals_stay_in_range(
        closes in prop::collection::vec(1.0f64..10_000.0f64, 0..120),
        ema_weight in 0.0f64..5.0,
        rsi_weight in 0.0f64..5.0,
        bollinger_weight in 0.0f64..5.0,
    ) {
        let params = StrategyParameters {
            ema_weight,
            rsi_weight,
            bollinger_weight,
            ..small_params()
        };
        let strategy = WeightedStrategy::new("prop", params).unwrap();
        let bars = bars_from(&closes);
        let features = strategy.evaluate(&bars);

        if bars.len() < strategy.required_window() {
            prop_assert!(features.is_empty());
        } else {
            prop_assert_eq!(features.len(), bars.len());
            prop_assert_eq!(features[0].signal, 0);
            for f in &features {
                prop_assert!((-1..=1).contains(&f.signal));
            }
        }
    }

    /// Normalized weights always sum to one.
    #[test]
    fn normalized_weights_sum_to_one(weights in prop::array::uniform6(0.0f64..100.0)) {
        let w = normalize_weights(weights);
        prop_assert!((w.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        prop_assert!(w.iter().all(|&x| x >= 0.0));
    }
}

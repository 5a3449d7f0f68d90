use serde::{Deserialize, Serialize};

use common::{OpenPosition, Trigger};

/// Transaction costs applied to every simulated or estimated fill.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostModel {
    /// Fraction of traded notional paid as fee (0.001 = 0.1%).
    pub commission: f64,
    /// Adverse price move between decision and fill.
    pub slippage: f64,
    /// Half the bid/ask spread paid on each side.
    pub spread: f64,
}

impl Default for CostModel {
    fn default() -> Self {
        Self {
            commission: 0.001,
            slippage: 0.001,
            spread: 0.0002,
        }
    }
}

/// Result of opening a long position with all available cash.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntryFill {
    pub price: f64,
    pub quantity: f64,
    pub commission: f64,
}

/// Result of closing a long position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExitFill {
    pub price: f64,
    /// Cash received after commission.
    pub proceeds: f64,
    pub commission: f64,
}

impl CostModel {
    pub fn buy_price(&self, reference: f64) -> f64 {
        reference * (1.0 + self.slippage + self.spread)
    }

    pub fn sell_price(&self, reference: f64) -> f64 {
        reference * (1.0 - self.slippage - self.spread)
    }

    /// Spend `cash` on a long entry at `reference`. Commission is taken from
    /// the cash before sizing, so the whole amount leaves the account.
    pub fn enter(&self, cash: f64, reference: f64) -> EntryFill {
        let price = self.buy_price(reference);
        let commission = cash * self.commission;
        EntryFill {
            price,
            quantity: (cash - commission) / price,
            commission,
        }
    }

    /// Sell `quantity` at `reference`.
    pub fn exit(&self, quantity: f64, reference: f64) -> ExitFill {
        let price = self.sell_price(reference);
        let gross = quantity * price;
        let commission = gross * self.commission;
        ExitFill {
            price,
            proceeds: gross - commission,
            commission,
        }
    }
}

/// ATR multiples for the stop-loss / take-profit bracket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub stop_loss_multiplier: f64,
    pub take_profit_multiplier: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            stop_loss_multiplier: 5.0,
            take_profit_multiplier: 5.0,
        }
    }
}

impl RiskConfig {
    /// `(stop_loss, take_profit)` around `entry`.
    pub fn bracket(&self, entry: f64, atr: f64) -> (f64, f64) {
        (
            entry - atr * self.stop_loss_multiplier,
            entry + atr * self.take_profit_multiplier,
        )
    }

    /// Build the open position for a fill, with the bracket fixed at entry.
    pub fn open(&self, entry: f64, quantity: f64, atr: f64, opened_at: i64) -> OpenPosition {
        let (stop_loss, take_profit) = self.bracket(entry, atr);
        OpenPosition {
            entry_price: entry,
            stop_loss,
            take_profit,
            quantity,
            opened_at,
        }
    }
}

/// Why an open long should be closed on this bar, if at all.
///
/// Checked in order: stop-loss, take-profit, then a sell signal.
pub fn exit_trigger(position: &OpenPosition, close: f64, signal: i8) -> Option<Trigger> {
    if close <= position.stop_loss {
        Some(Trigger::StopLoss)
    } else if close >= position.take_profit {
        Some(Trigger::TakeProfit)
    } else if signal == -1 {
        Some(Trigger::Signal)
    } else {
        None
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

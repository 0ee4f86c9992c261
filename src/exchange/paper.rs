// =============================================================================
// Paper Exchange — simulated leveraged account for backtests
// =============================================================================
//
// Account model (single instrument, one position at a time):
//
//   open   : margin = units * price / leverage moves from cash to margin
//   value  : unrealized = signed_units * (price - entry)
//   worth  : net_worth = cash + margin + unrealized
//   close  : cash += margin + unrealized, position flat
//
// Prices come from the tick stream: the exchange subscribes to the feed ahead
// of the strategy so fills always use the latest mark.  Warm-up candles are
// preloaded and served from `get_candles`.
//
// Thread-safety: all mutable state is behind `parking_lot` locks.
// =============================================================================

use std::sync::Arc;

use anyhow::{bail, ensure, Result};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::Exchange;
use crate::feed::TickObserver;
use crate::market_data::Candle;
use crate::types::{CloseTarget, DataPoint, Side};

// ---------------------------------------------------------------------------
// Backtest summary
// ---------------------------------------------------------------------------

/// Closed-trade statistics for a backtest run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BacktestSummary {
    pub total_pnl: f64,
    pub longs: u32,
    pub shorts: u32,
    pub won_longs: u32,
    pub won_shorts: u32,
    pub net_worth: f64,
}

impl BacktestSummary {
    fn record(&mut self, side: Side, pnl: f64) {
        self.total_pnl += pnl;
        let won = pnl >= 0.0;
        match side {
            Side::Long => {
                self.longs += 1;
                self.won_longs += u32::from(won);
            }
            Side::Short => {
                self.shorts += 1;
                self.won_shorts += u32::from(won);
            }
            Side::None => {}
        }
    }

    pub fn trades(&self) -> u32 {
        self.longs + self.shorts
    }

    /// Percentage of winning longs, 0.0 when there were none.
    pub fn long_win_pct(&self) -> f64 {
        win_pct(self.won_longs, self.longs)
    }

    /// Percentage of winning shorts, 0.0 when there were none.
    pub fn short_win_pct(&self) -> f64 {
        win_pct(self.won_shorts, self.shorts)
    }
}

fn win_pct(won: u32, total: u32) -> f64 {
    if total == 0 {
        0.0
    } else {
        f64::from(won) / f64::from(total) * 100.0
    }
}

// ---------------------------------------------------------------------------
// Internal mutable state (behind RwLock)
// ---------------------------------------------------------------------------

struct Inner {
    cash: f64,
    margin: f64,
    /// Signed units: positive long, negative short.
    position: i64,
    entry_price: f64,
    current_price: f64,
    last_timestamp: f64,
    history: Vec<Candle>,
    streaming: bool,
    summary: BacktestSummary,
}

impl Inner {
    fn side(&self) -> Side {
        match self.position {
            p if p > 0 => Side::Long,
            p if p < 0 => Side::Short,
            _ => Side::None,
        }
    }

    fn unrealized_pnl(&self) -> f64 {
        if self.position == 0 || self.current_price <= 0.0 {
            return 0.0;
        }
        self.position as f64 * (self.current_price - self.entry_price)
    }

    fn net_worth(&self) -> f64 {
        self.cash + self.margin + self.unrealized_pnl()
    }
}

// ---------------------------------------------------------------------------
// PaperExchange
// ---------------------------------------------------------------------------

pub struct PaperExchange {
    instrument: String,
    leverage: f64,
    state: RwLock<Inner>,
    /// Producer task feeding prices; aborted on `stop_price_streaming`.
    feed: Mutex<Option<AbortHandle>>,
}

impl PaperExchange {
    pub fn new(instrument: impl Into<String>, leverage: f64, starting_balance: f64) -> Self {
        let instrument = instrument.into();
        info!(instrument = %instrument, leverage, starting_balance, "paper exchange initialised");
        Self {
            instrument,
            leverage,
            state: RwLock::new(Inner {
                cash: starting_balance,
                margin: 0.0,
                position: 0,
                entry_price: 0.0,
                current_price: 0.0,
                last_timestamp: 0.0,
                history: Vec::new(),
                streaming: false,
                summary: BacktestSummary::default(),
            }),
            feed: Mutex::new(None),
        }
    }

    /// Preload the candles served by `get_candles`, oldest first.
    pub fn load_history(&self, candles: Vec<Candle>) {
        let mut s = self.state.write();
        if let Some(last) = candles.last() {
            s.current_price = last.close;
            s.last_timestamp = last.close_time;
        }
        debug!(count = candles.len(), "warm-up history loaded");
        s.history = candles;
    }

    /// Attach the task producing prices so streaming can be stopped.
    pub fn attach_feed(&self, handle: AbortHandle) {
        *self.feed.lock() = Some(handle);
    }

    /// Mark the account to a new price.
    pub fn mark_price(&self, timestamp: f64, price: f64) {
        if !price.is_finite() || price <= 0.0 {
            return;
        }
        let mut s = self.state.write();
        s.current_price = price;
        s.last_timestamp = timestamp;
    }

    pub fn current_price(&self) -> f64 {
        self.state.read().current_price
    }

    pub fn unrealized_pnl(&self) -> f64 {
        self.state.read().unrealized_pnl()
    }

    pub fn summary(&self) -> BacktestSummary {
        let s = self.state.read();
        BacktestSummary {
            net_worth: s.net_worth(),
            ..s.summary.clone()
        }
    }

    fn open(&self, side: Side, units: u64) -> Result<()> {
        ensure!(units > 0, "order size must be positive");

        let mut s = self.state.write();
        let price = s.current_price;
        if price <= 0.0 {
            bail!("no market price yet for {}", self.instrument);
        }

        if s.position != 0 {
            warn!(current = %s.side(), requested = %side, "replacing open position");
            Self::settle(&mut s);
        }

        let required = units as f64 * price / self.leverage;
        if required > s.net_worth() {
            bail!(
                "insufficient margin: need {required:.2}, net worth {:.2}",
                s.net_worth()
            );
        }

        let signed = i64::try_from(units)?;
        s.cash -= required;
        s.margin = required;
        s.position = if side == Side::Short { -signed } else { signed };
        s.entry_price = price;

        let trade_id = Uuid::new_v4().to_string();
        info!(
            trade_id = %trade_id,
            instrument = %self.instrument,
            %side,
            units,
            price,
            ts = s.last_timestamp,
            "paper fill"
        );
        Ok(())
    }

    fn settle(s: &mut Inner) {
        let side = s.side();
        let pnl = s.unrealized_pnl();
        s.cash += s.margin + pnl;
        s.margin = 0.0;
        s.summary.record(side, pnl);
        info!(
            %side,
            units = s.position,
            from = s.entry_price,
            to = s.current_price,
            pnl,
            net_worth = s.cash,
            "paper position closed"
        );
        s.position = 0;
        s.entry_price = 0.0;
    }
}

impl Exchange for PaperExchange {
    fn start_price_streaming(&self) -> Result<()> {
        self.state.write().streaming = true;
        info!(instrument = %self.instrument, "price streaming started");
        Ok(())
    }

    fn stop_price_streaming(&self) {
        let was_streaming = std::mem::replace(&mut self.state.write().streaming, false);
        if let Some(handle) = self.feed.lock().take() {
            handle.abort();
        }
        if was_streaming {
            info!(instrument = %self.instrument, "price streaming stopped");
        }
    }

    fn get_candles(&self, count: usize, size_minutes: u32) -> Result<Vec<Candle>> {
        let s = self.state.read();
        let start = s.history.len().saturating_sub(count);
        let candles = s.history[start..].to_vec();
        if candles.len() < count {
            warn!(
                requested = count,
                available = candles.len(),
                size_minutes,
                "not enough warm-up candles"
            );
        }
        Ok(candles)
    }

    fn current_position(&self) -> Result<i64> {
        Ok(self.state.read().position)
    }

    fn current_side(&self) -> Result<Side> {
        Ok(self.state.read().side())
    }

    fn available_units(&self) -> Result<u64> {
        let s = self.state.read();
        if s.current_price <= 0.0 {
            bail!("no market price yet for {}", self.instrument);
        }
        let units = (s.net_worth() * self.leverage / s.current_price).floor();
        Ok(if units.is_finite() && units > 0.0 { units as u64 } else { 0 })
    }

    fn get_net_worth(&self) -> Result<f64> {
        Ok(self.state.read().net_worth())
    }

    fn get_leverage(&self) -> Result<f64> {
        Ok(self.leverage)
    }

    fn buy(&self, units: u64) -> Result<()> {
        self.open(Side::Long, units)
    }

    fn sell(&self, units: u64) -> Result<()> {
        self.open(Side::Short, units)
    }

    fn close_position(&self, target: CloseTarget) -> Result<()> {
        let mut s = self.state.write();
        if !target.covers(s.side()) {
            return Ok(());
        }
        Self::settle(&mut s);
        Ok(())
    }
}

impl TickObserver for Arc<PaperExchange> {
    fn update(&mut self, datapoint: &DataPoint) {
        self.mark_price(datapoint.timestamp(), datapoint.price());
    }
}

impl std::fmt::Debug for PaperExchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = self.state.read();
        f.debug_struct("PaperExchange")
            .field("instrument", &self.instrument)
            .field("leverage", &self.leverage)
            .field("position", &s.position)
            .field("net_worth", &s.net_worth())
            .finish()
    }
}

// =============================================================================
// Strategy Controller — MACross trend follower
// =============================================================================
//
// Lifecycle:
//
//   Stopped --start()--> Priming --(warm-up fed)--> Trading <--pause/resume--> Paused
//   any --stop()--> Stopped
//
// Per update:
//   1. Fold a raw tick into the current candle (opening a new one when none
//      is open or the previous one closed).  Ticks also reach the stop and
//      the take-profit so they see every price.
//   2. Time stop: inside the weekend halt, flatten and return, even
//      mid-candle.
//   3. Nothing else happens until the current candle has closed.
//   4. Closed candle -> crossover, stop engine, take-profit (fixed order).
//   5. A fired stop or take-profit with an open position closes everything,
//      disarms itself and returns.  Exits always preempt entries.
//   6. A crossover edge enters long/short unless already on that side.
//
// Exchange failures in buy/sell/close are caught here, logged and handed to
// the notifier.  Nothing propagates to the consumer loop.
// =============================================================================

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::exchange::Exchange;
use crate::exit::{StopEngine, TakeProfit, TimeStop};
use crate::feed::TickObserver;
use crate::indicators::ma_cross::MACross;
use crate::indicators::Indicator;
use crate::market_data::Candle;
use crate::notify::{LogNotifier, Notifier};
use crate::risk::RiskManager;
use crate::runtime_config::{RuntimeConfig, StopMode};
use crate::types::{CloseTarget, ControllerState, DataPoint, Side, Signal, Tick};

pub struct StrategyController {
    instrument: String,
    exchange: Arc<dyn Exchange>,
    risk: RiskManager,
    notifier: Arc<dyn Notifier>,

    candle_minutes: u32,
    take_profit_distance: f64,

    current_candle: Option<Candle>,
    /// Latest valid price seen (tick price or candle close).
    last_price: f64,

    crossover: MACross,
    stop: StopEngine,
    take_profit: TakeProfit,
    time_stop: TimeStop,

    state: ControllerState,
}

impl StrategyController {
    pub fn new(config: &RuntimeConfig, exchange: Arc<dyn Exchange>) -> Self {
        let params = &config.strategy;
        let exits = &config.exits;

        let stop = match exits.stop_mode {
            StopMode::Fixed => StopEngine::fixed(exits.stop_loss_distance),
            StopMode::Trailing => StopEngine::trailing(
                exits.trailing_period,
                exits.trailing_multiplier,
                exits.stop_loss_distance,
            ),
        };
        let time_stop = if exits.time_stop_enabled {
            TimeStop::new(exits.friday_cutoff_hour, exits.sunday_reopen_hour)
        } else {
            TimeStop::disabled()
        };

        Self {
            instrument: config.instrument.clone(),
            risk: RiskManager::new(exchange.clone(), params.risk_percent),
            exchange,
            notifier: Arc::new(LogNotifier),
            candle_minutes: config.candle_minutes,
            take_profit_distance: exits.take_profit_distance,
            current_candle: None,
            last_price: 0.0,
            crossover: MACross::new(params.short_period, params.medium_period, params.long_period),
            stop,
            take_profit: TakeProfit::new(),
            time_stop,
            state: ControllerState::Stopped,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn is_trading_enabled(&self) -> bool {
        self.state == ControllerState::Trading
    }

    /// Candles needed to warm up the slowest indicator, plus one.
    pub fn warmup_candle_count(&self) -> usize {
        self.crossover
            .amount_of_data_still_missing()
            .max(self.stop.amount_of_data_still_missing())
            + 1
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Start streaming, replay the warm-up burst through every indicator
    /// without trading, then enable trading.
    pub fn start(&mut self) -> Result<()> {
        if self.state != ControllerState::Stopped {
            warn!(state = %self.state, "start ignored, controller already running");
            return Ok(());
        }
        self.set_state(ControllerState::Priming);

        match self.prime() {
            Ok(count) => {
                info!(candles = count, instrument = %self.instrument, "strategy primed");
                self.set_state(ControllerState::Trading);
                Ok(())
            }
            Err(e) => {
                self.set_state(ControllerState::Stopped);
                Err(e)
            }
        }
    }

    fn prime(&mut self) -> Result<usize> {
        let count = self.warmup_candle_count();
        self.exchange
            .start_price_streaming()
            .context("failed to start price streaming")?;
        let candles = self
            .exchange
            .get_candles(count, self.candle_minutes)
            .with_context(|| format!("failed to fetch {count} warm-up candles"))?;

        for candle in &candles {
            let datapoint = DataPoint::Candle(candle.clone());
            self.crossover.update(&datapoint);
            self.stop.update(&datapoint);
            self.take_profit.update(&datapoint);
            self.record_price(candle.close);
        }
        Ok(candles.len())
    }

    /// Keep indicators warm but stop issuing orders.
    pub fn pause_trading(&mut self) {
        if self.state == ControllerState::Trading {
            self.set_state(ControllerState::Paused);
        }
    }

    pub fn resume_trading(&mut self) {
        if self.state == ControllerState::Paused {
            self.set_state(ControllerState::Trading);
        }
    }

    /// Disable trading and close the upstream price stream.
    pub fn stop(&mut self) {
        if self.state == ControllerState::Stopped {
            return;
        }
        self.set_state(ControllerState::Stopped);
        self.exchange.stop_price_streaming();
    }

    fn set_state(&mut self, next: ControllerState) {
        if self.state != next {
            info!(from = %self.state, to = %next, "strategy state change");
            self.state = next;
        }
    }

    // -------------------------------------------------------------------------
    // Per-datapoint evaluation
    // -------------------------------------------------------------------------

    pub fn update(&mut self, datapoint: &DataPoint) {
        if matches!(self.state, ControllerState::Stopped | ControllerState::Priming) {
            return;
        }

        match datapoint {
            DataPoint::Tick(tick) => {
                self.fold_tick(tick);
                self.stop.update(datapoint);
                self.take_profit.update(datapoint);
                self.record_price(tick.price);
            }
            DataPoint::Candle(candle) => {
                self.current_candle = Some(candle.clone());
                self.record_price(candle.close);
            }
        }

        self.time_stop.update(datapoint);
        if self.time_stop.state().is_stop() {
            if self.position() != 0 {
                info!(ts = datapoint.timestamp(), "weekend time stop, flattening");
                self.close_position(CloseTarget::Both);
            }
            return;
        }

        let closed = match &self.current_candle {
            Some(candle) if candle.seen_enough_data() => DataPoint::Candle(candle.clone()),
            _ => return,
        };

        self.crossover.update(&closed);
        self.stop.update(&closed);
        self.take_profit.update(&closed);

        if self.handle_exits() {
            return;
        }
        self.handle_entry();
    }

    fn fold_tick(&mut self, tick: &Tick) {
        let needs_new = self
            .current_candle
            .as_ref()
            .map_or(true, |c| c.seen_enough_data());
        if needs_new {
            let span = f64::from(self.candle_minutes) * 60.0;
            match Candle::new(tick.timestamp, tick.timestamp + span) {
                Ok(candle) => self.current_candle = Some(candle),
                Err(e) => {
                    warn!(error = %e, "tick cannot open a candle, ignored");
                    self.current_candle = None;
                    return;
                }
            }
        }
        if let Some(candle) = self.current_candle.as_mut() {
            candle.update_tick(tick);
        }
    }

    fn record_price(&mut self, price: f64) {
        if price.is_finite() && price > 0.0 {
            self.last_price = price;
        }
    }

    /// Returns true when an exit closed the position.
    fn handle_exits(&mut self) -> bool {
        let stop_fired = self.stop.state().is_stop();
        let target_fired = self.take_profit.state().is_stop();
        if !stop_fired && !target_fired {
            return false;
        }

        if self.position() == 0 {
            debug!(stop_fired, target_fired, "exit fired while flat, disarming");
            if stop_fired {
                self.stop.cancel_stop();
            }
            if target_fired {
                self.take_profit.cancel_take_profit();
            }
            return false;
        }

        if stop_fired {
            info!(level = self.stop.price(), price = self.last_price, "stop-loss exit");
            self.close_position(CloseTarget::Both);
            self.stop.cancel_stop();
        } else {
            info!(
                level = self.take_profit.exit_state().level(),
                price = self.last_price,
                "take-profit exit"
            );
            self.close_position(CloseTarget::Both);
            self.take_profit.cancel_take_profit();
        }
        true
    }

    fn handle_entry(&mut self) {
        let (side, opposite) = match self.crossover.state() {
            Signal::EnterLong => (Side::Long, CloseTarget::Short),
            Signal::EnterShort => (Side::Short, CloseTarget::Long),
            _ => return,
        };

        if self.position() != 0 && self.side() == side {
            debug!(%side, "already positioned, entry skipped");
            return;
        }

        self.close_position(opposite);

        let target = match side {
            Side::Long => self.last_price + self.take_profit_distance,
            _ => self.last_price - self.take_profit_distance,
        };
        self.take_profit.set_take_profit(target, side);
        self.stop.set_stop(side, None);

        match side {
            Side::Long => self.buy(),
            _ => self.sell(),
        }
    }

    // -------------------------------------------------------------------------
    // Orders
    // -------------------------------------------------------------------------

    pub fn buy(&mut self) {
        if !self.is_trading_enabled() {
            return;
        }
        let units = self.risk.long_position_size(self.last_price);
        if units == 0 {
            debug!("long size is 0, not trading");
            return;
        }
        info!(instrument = %self.instrument, units, price = self.last_price, "entering long");
        if let Err(e) = self.exchange.buy(units) {
            self.report_failure("enter long", &e);
        }
    }

    pub fn sell(&mut self) {
        if !self.is_trading_enabled() {
            return;
        }
        let units = self.risk.short_position_size(self.last_price);
        if units == 0 {
            debug!("short size is 0, not trading");
            return;
        }
        info!(instrument = %self.instrument, units, price = self.last_price, "entering short");
        if let Err(e) = self.exchange.sell(units) {
            self.report_failure("enter short", &e);
        }
    }

    /// Close `target` and disarm the exits guarding it.
    ///
    /// The exits are disarmed even while paused; the order itself is skipped.
    /// Closing a side that is not held makes no exchange call.
    pub fn close_position(&mut self, target: CloseTarget) {
        self.stop.cancel_stop();
        if !target.covers(self.side()) {
            return;
        }
        self.take_profit.cancel_take_profit();

        if !self.is_trading_enabled() {
            return;
        }
        info!(instrument = %self.instrument, %target, price = self.last_price, "closing position");
        if let Err(e) = self.exchange.close_position(target) {
            self.report_failure("close", &e);
        }
    }

    fn position(&self) -> i64 {
        self.exchange.current_position().unwrap_or_else(|e| {
            warn!(error = %e, "position query failed, assuming flat");
            0
        })
    }

    fn side(&self) -> Side {
        self.exchange.current_side().unwrap_or_else(|e| {
            warn!(error = %e, "side query failed, assuming flat");
            Side::None
        })
    }

    fn report_failure(&self, action: &str, error: &anyhow::Error) {
        warn!(action, error = %error, "exchange call failed, continuing");
        self.notifier.notify(
            &format!("{}: failed to {action} position", self.instrument),
            &format!("Error while trying to {action} position: {error:#}\nIt was caught, the strategy is still running."),
        );
    }
}

impl TickObserver for StrategyController {
    fn update(&mut self, datapoint: &DataPoint) {
        StrategyController::update(self, datapoint);
    }

    fn stop_loss_price(&self) -> f64 {
        if self.stop.is_trailing() {
            0.0
        } else {
            self.stop.price()
        }
    }

    fn trailing_stop_price(&self) -> f64 {
        if self.stop.is_trailing() {
            self.stop.price()
        } else {
            0.0
        }
    }

    fn take_profit_price(&self) -> f64 {
        self.take_profit.price(self.side())
    }
}

impl std::fmt::Debug for StrategyController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyController")
            .field("instrument", &self.instrument)
            .field("state", &self.state)
            .field("last_price", &self.last_price)
            .field("crossover", &self.crossover)
            .field("stop", &self.stop.exit_state())
            .field("take_profit", &self.take_profit.exit_state())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::testing::MockExchange;
    use crate::exit::ExitState;
    use crate::notify::testing::RecordingNotifier;

    /// Wednesday 2016-01-06 00:00:00 UTC.
    const WEDNESDAY: f64 = 1_452_038_400.0;
    /// Friday 2016-01-08 00:00:00 UTC.
    const FRIDAY: f64 = 1_452_211_200.0;

    fn config() -> RuntimeConfig {
        let mut cfg = RuntimeConfig::default();
        cfg.strategy.short_period = 2;
        cfg.strategy.medium_period = 3;
        cfg.strategy.long_period = 5;
        cfg.exits.stop_mode = StopMode::Fixed;
        cfg.exits.stop_loss_distance = 0.01;
        cfg.exits.take_profit_distance = 0.02;
        cfg
    }

    fn candle_at(open_time: f64, close: f64) -> Candle {
        Candle::closed(open_time, open_time + 60.0, close, close, close, close).unwrap()
    }

    fn flat_history(start: f64, count: usize) -> Vec<Candle> {
        (0..count).map(|i| candle_at(start + i as f64 * 60.0, 1.0)).collect()
    }

    /// Controller primed on flat 1.0 candles starting at `start`.
    fn primed(start: f64) -> (Arc<MockExchange>, StrategyController) {
        let ex = Arc::new(MockExchange::new());
        ex.state.lock().candles = flat_history(start, 10);
        let mut ctl = StrategyController::new(&config(), ex.clone());
        ctl.start().unwrap();
        (ex, ctl)
    }

    fn feed_candle(ctl: &mut StrategyController, open_time: f64, close: f64) {
        ctl.update(&DataPoint::Candle(candle_at(open_time, close)));
    }

    // 4000 / 1.1
    const LONG_UNITS_AT_1_1: &str = "buy:3636";

    #[test]
    fn warmup_covers_slowest_indicator() {
        let ex: Arc<dyn Exchange> = Arc::new(MockExchange::new());
        let ctl = StrategyController::new(&config(), ex.clone());
        assert_eq!(ctl.warmup_candle_count(), 6);

        let mut cfg = config();
        cfg.exits.stop_mode = StopMode::Trailing;
        cfg.exits.trailing_period = 7;
        let ctl = StrategyController::new(&cfg, ex);
        assert_eq!(ctl.warmup_candle_count(), 9);
    }

    #[test]
    fn start_primes_without_trading() {
        let (ex, ctl) = primed(WEDNESDAY);
        assert_eq!(ctl.state(), ControllerState::Trading);
        assert!(ex.state.lock().streaming);
        assert!(ex.calls().is_empty());
    }

    #[test]
    fn updates_ignored_until_started() {
        let ex = Arc::new(MockExchange::new());
        let mut ctl = StrategyController::new(&config(), ex.clone());
        feed_candle(&mut ctl, WEDNESDAY, 1.1);
        assert!(ex.calls().is_empty());
        assert_eq!(ctl.state(), ControllerState::Stopped);
    }

    #[test]
    fn flat_data_never_trades() {
        let (ex, mut ctl) = primed(WEDNESDAY);
        for i in 10..13 {
            feed_candle(&mut ctl, WEDNESDAY + i as f64 * 60.0, 1.0);
        }
        assert!(ex.calls().is_empty());
    }

    #[test]
    fn buy_cross_enters_long_once() {
        let (ex, mut ctl) = primed(WEDNESDAY);
        feed_candle(&mut ctl, WEDNESDAY + 600.0, 1.1);
        assert_eq!(ex.calls(), vec![LONG_UNITS_AT_1_1]);

        // Cross persists: no second entry.
        feed_candle(&mut ctl, WEDNESDAY + 660.0, 1.105);
        assert_eq!(ex.calls(), vec![LONG_UNITS_AT_1_1]);

        assert!((ctl.stop_loss_price() - 1.09).abs() < 1e-10);
        assert!((ctl.take_profit_price() - 1.12).abs() < 1e-10);
        assert_eq!(ctl.trailing_stop_price(), 0.0);
    }

    #[test]
    fn already_long_skips_entry() {
        let (ex, mut ctl) = primed(WEDNESDAY);
        ex.state.lock().position = 500;
        feed_candle(&mut ctl, WEDNESDAY + 600.0, 1.1);
        assert!(ex.calls().is_empty());
    }

    #[test]
    fn already_short_skips_entry() {
        let (ex, mut ctl) = primed(WEDNESDAY);
        ex.state.lock().position = -500;
        feed_candle(&mut ctl, WEDNESDAY + 600.0, 0.9);
        assert!(ex.calls().is_empty());
        assert_eq!(ex.position(), -500);
    }

    #[test]
    fn sell_cross_closes_long_then_sells() {
        let (ex, mut ctl) = primed(WEDNESDAY);
        ex.state.lock().position = 500;
        feed_candle(&mut ctl, WEDNESDAY + 600.0, 0.9);
        // 4000 / 0.9 = 4444.4
        assert_eq!(ex.calls(), vec!["close:long", "sell:4444"]);
        assert_eq!(ex.position(), -4444);
        assert!((ctl.take_profit_price() - 0.88).abs() < 1e-10);
    }

    #[test]
    fn stop_preempts_entry_and_disarms() {
        let (ex, mut ctl) = primed(WEDNESDAY);
        feed_candle(&mut ctl, WEDNESDAY + 600.0, 1.1);
        feed_candle(&mut ctl, WEDNESDAY + 660.0, 1.08);
        assert_eq!(ex.calls(), vec![LONG_UNITS_AT_1_1, "close:both"]);
        assert_eq!(ex.position(), 0);
        assert_eq!(ctl.stop.exit_state(), ExitState::Idle);

        // Same price again: nothing re-fires.
        feed_candle(&mut ctl, WEDNESDAY + 720.0, 1.08);
        assert_eq!(ex.calls().len(), 2);
    }

    #[test]
    fn take_profit_closes_position() {
        let (ex, mut ctl) = primed(WEDNESDAY);
        feed_candle(&mut ctl, WEDNESDAY + 600.0, 1.1);
        feed_candle(&mut ctl, WEDNESDAY + 660.0, 1.13);
        assert_eq!(ex.calls(), vec![LONG_UNITS_AT_1_1, "close:both"]);
        assert_eq!(ctl.take_profit.exit_state(), ExitState::Idle);
        assert_eq!(ctl.take_profit_price(), 0.0);
    }

    #[test]
    fn ticks_only_evaluate_on_candle_close() {
        let (ex, mut ctl) = primed(WEDNESDAY);
        let t0 = WEDNESDAY + 1_000.0;
        ctl.update(&DataPoint::Tick(Tick::new(t0, 1.1)));
        ctl.update(&DataPoint::Tick(Tick::new(t0 + 30.0, 1.1)));
        assert!(ex.calls().is_empty());

        ctl.update(&DataPoint::Tick(Tick::new(t0 + 60.0, 1.1)));
        assert_eq!(ex.calls(), vec![LONG_UNITS_AT_1_1]);
    }

    #[test]
    fn trailing_take_profit_waits_for_candle_close() {
        let mut cfg = config();
        cfg.exits.stop_mode = StopMode::Trailing;
        cfg.exits.trailing_period = 7;
        cfg.exits.trailing_multiplier = 3.0;
        cfg.exits.stop_loss_distance = 0.1;
        let ex = Arc::new(MockExchange::new());
        ex.state.lock().candles = flat_history(WEDNESDAY, 10);
        let mut ctl = StrategyController::new(&cfg, ex.clone());
        ctl.start().unwrap();

        // Entry candle 1.0 -> 1.1 seeds ATR = 0.1 / 7.
        let distance = 3.0 * 0.1 / 7.0;
        let t0 = WEDNESDAY + 1_000.0;
        ctl.update(&DataPoint::Tick(Tick::new(t0, 1.1)));
        ctl.update(&DataPoint::Tick(Tick::new(t0 + 60.0, 1.1)));
        assert_eq!(ex.calls(), vec![LONG_UNITS_AT_1_1]);
        assert!((ctl.trailing_stop_price() - (1.1 - distance)).abs() < 1e-10);
        assert_eq!(ctl.stop_loss_price(), 0.0);

        // Opens the next candle: the trail tightens and the target fires,
        // but no order goes out until that candle closes.
        ctl.update(&DataPoint::Tick(Tick::new(t0 + 61.0, 1.2)));
        assert!((ctl.trailing_stop_price() - (1.2 - distance)).abs() < 1e-10);
        assert!(matches!(ctl.take_profit.exit_state(), ExitState::Fired { .. }));
        ctl.update(&DataPoint::Tick(Tick::new(t0 + 90.0, 1.2)));
        assert!(!ex.calls().iter().any(|c| c.starts_with("close:")));

        ctl.update(&DataPoint::Tick(Tick::new(t0 + 121.0, 1.2)));
        assert_eq!(ex.calls(), vec![LONG_UNITS_AT_1_1, "close:both"]);
        assert_eq!(ex.position(), 0);
        assert_eq!(ctl.trailing_stop_price(), 0.0);
        assert_eq!(ctl.take_profit.exit_state(), ExitState::Idle);
    }

    #[test]
    fn time_stop_flattens_mid_candle() {
        let (ex, mut ctl) = primed(FRIDAY);
        // Friday 19:00, enter long.
        feed_candle(&mut ctl, FRIDAY + 19.0 * 3600.0, 1.1);
        assert_eq!(ex.calls(), vec![LONG_UNITS_AT_1_1]);

        // Friday 20:30, first tick of a fresh candle.
        ctl.update(&DataPoint::Tick(Tick::new(FRIDAY + 20.5 * 3600.0, 1.1)));
        assert_eq!(ex.calls(), vec![LONG_UNITS_AT_1_1, "close:both"]);
        assert_eq!(ex.position(), 0);
        assert!(!ctl.current_candle.as_ref().unwrap().is_closed);
    }

    #[test]
    fn paused_keeps_indicators_warm_but_never_orders() {
        let (ex, mut ctl) = primed(WEDNESDAY);
        ctl.pause_trading();
        assert_eq!(ctl.state(), ControllerState::Paused);

        feed_candle(&mut ctl, WEDNESDAY + 600.0, 1.1);
        assert!(ex.calls().is_empty());
        // The cross edge was consumed while paused.
        let (s, _, _) = ctl.crossover.values();
        assert!(s > 1.0);

        ctl.resume_trading();
        assert_eq!(ctl.state(), ControllerState::Trading);
        feed_candle(&mut ctl, WEDNESDAY + 660.0, 1.105);
        assert!(ex.calls().is_empty());
    }

    #[test]
    fn exit_fired_while_flat_is_disarmed() {
        let (ex, mut ctl) = primed(WEDNESDAY);
        ctl.pause_trading();
        // Entry arms exits even though the order is skipped.
        feed_candle(&mut ctl, WEDNESDAY + 600.0, 1.1);
        assert!(matches!(ctl.stop.exit_state(), ExitState::Armed { .. }));

        ctl.resume_trading();
        feed_candle(&mut ctl, WEDNESDAY + 660.0, 1.05);
        assert_eq!(ctl.stop.exit_state(), ExitState::Idle);
        assert!(ex.calls().is_empty());
    }

    #[test]
    fn exchange_failure_is_notified_not_propagated() {
        let ex = Arc::new(MockExchange::new());
        ex.state.lock().candles = flat_history(WEDNESDAY, 10);
        let notifier = Arc::new(RecordingNotifier::default());
        let mut ctl = StrategyController::new(&config(), ex.clone()).with_notifier(notifier.clone());
        ctl.start().unwrap();

        ex.state.lock().fail_orders = true;
        feed_candle(&mut ctl, WEDNESDAY + 600.0, 1.1);

        let sent = notifier.sent.lock();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].0.contains("enter long"));
        assert!(sent[0].1.contains("order rejected"));
        assert_eq!(ctl.state(), ControllerState::Trading);
    }

    #[test]
    fn account_failure_skips_trade() {
        let (ex, mut ctl) = primed(WEDNESDAY);
        ex.state.lock().fail_account = true;
        feed_candle(&mut ctl, WEDNESDAY + 600.0, 1.1);
        assert!(ex.calls().is_empty());
    }

    #[test]
    fn close_when_flat_makes_no_exchange_call() {
        let (ex, mut ctl) = primed(WEDNESDAY);
        ctl.close_position(CloseTarget::Both);
        assert!(ex.calls().is_empty());
        assert_eq!(ex.position(), 0);
    }

    #[test]
    fn stop_disables_trading_and_streaming() {
        let (ex, mut ctl) = primed(WEDNESDAY);
        ctl.stop();
        assert_eq!(ctl.state(), ControllerState::Stopped);
        assert!(!ex.state.lock().streaming);

        feed_candle(&mut ctl, WEDNESDAY + 600.0, 1.1);
        assert!(ex.calls().is_empty());
    }

    #[test]
    fn start_failure_returns_to_stopped() {
        struct NoHistory;
        impl Exchange for NoHistory {
            fn start_price_streaming(&self) -> Result<()> {
                anyhow::bail!("stream refused")
            }
            fn stop_price_streaming(&self) {}
            fn get_candles(&self, _: usize, _: u32) -> Result<Vec<Candle>> {
                Ok(Vec::new())
            }
            fn current_position(&self) -> Result<i64> {
                Ok(0)
            }
            fn current_side(&self) -> Result<Side> {
                Ok(Side::None)
            }
            fn available_units(&self) -> Result<u64> {
                Ok(0)
            }
            fn get_net_worth(&self) -> Result<f64> {
                Ok(0.0)
            }
            fn get_leverage(&self) -> Result<f64> {
                Ok(1.0)
            }
            fn buy(&self, _: u64) -> Result<()> {
                Ok(())
            }
            fn sell(&self, _: u64) -> Result<()> {
                Ok(())
            }
            fn close_position(&self, _: CloseTarget) -> Result<()> {
                Ok(())
            }
        }

        let mut ctl = StrategyController::new(&config(), Arc::new(NoHistory));
        assert!(ctl.start().is_err());
        assert_eq!(ctl.state(), ControllerState::Stopped);
    }
}

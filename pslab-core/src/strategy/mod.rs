//! Strategy engine: positions, trades, equity and next-bar order fills.
//!
//! Scripts record intents during a bar. `on_bar_update` at the start of the
//! following bar fills them at that bar's open, so a signal at bar N fills at
//! `open[N+1]` and nothing fills intrabar. Intents recorded on the last bar
//! never fill.

pub mod order;
pub mod state;

pub use order::{OrderIntent, PendingOrders};
pub use state::StrategyField;

use tracing::{debug, warn};

use crate::domain::{ClosedTrade, Direction, MarketPosition, Position};
use crate::value::NA;

/// Capital used when a script's `strategy()` call omits `initial_capital`.
pub const DEFAULT_INITIAL_CAPITAL: f64 = 10_000.0;

#[derive(Debug, Clone)]
pub struct StrategyEngine {
    title: String,
    initial_capital: f64,
    cash: f64,
    /// Flat fee per fill. The entry fee leaves cash when the entry fills; a
    /// closed trade's `pnl` carries both fees.
    commission: f64,
    open_positions: Vec<Position>,
    trade_history: Vec<ClosedTrade>,
    pending: PendingOrders,
    market_position: MarketPosition,
    last_bar_time: Option<i64>,
}

impl StrategyEngine {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            title: String::new(),
            initial_capital,
            cash: initial_capital,
            commission: 0.0,
            open_positions: Vec::new(),
            trade_history: Vec::new(),
            pending: PendingOrders::new(),
            market_position: MarketPosition::Flat,
            last_bar_time: None,
        }
    }

    pub fn with_commission(mut self, per_order: f64) -> Self {
        self.commission = per_order;
        self
    }

    /// Declare the strategy. Cash movements so far are carried over.
    pub fn call(&mut self, title: &str, initial_capital: f64) {
        let realized = self.cash - self.initial_capital;
        self.title = title.to_string();
        self.initial_capital = initial_capital;
        self.cash = initial_capital + realized;
    }

    /// Fill everything recorded on the previous bar at `open`.
    pub fn on_bar_update(&mut self, bar: usize, open: f64, time: i64) {
        for intent in self.pending.take() {
            match intent {
                OrderIntent::Entry { id, direction, qty } => {
                    self.fill_entry(id, direction, qty, bar, open, time)
                }
                OrderIntent::Close { entry_id } => {
                    let closed = self.close_where(|p| p.id == entry_id, bar, open, time);
                    if closed == 0 {
                        debug!(bar, entry_id = %entry_id, "close ignored: no open position");
                    }
                }
                OrderIntent::CloseAll => {
                    self.close_where(|_| true, bar, open, time);
                }
            }
        }
        self.market_position = self
            .open_positions
            .first()
            .map_or(MarketPosition::Flat, |p| p.direction.into());
        self.last_bar_time = Some(time);
    }

    // ── Intents ──

    pub fn entry(&mut self, id: &str, direction: Direction, qty: f64) {
        if !qty.is_finite() || qty <= 0.0 {
            warn!(id, qty, "entry rejected: quantity must be finite and positive");
            return;
        }
        self.pending.push(OrderIntent::Entry {
            id: id.to_string(),
            direction,
            qty,
        });
    }

    /// Close the position opened by `from_entry`, or by `id` when absent.
    pub fn exit(&mut self, id: &str, from_entry: Option<&str>) {
        self.pending.push(OrderIntent::Close {
            entry_id: from_entry.unwrap_or(id).to_string(),
        });
    }

    pub fn close(&mut self, id: &str) {
        self.pending.push(OrderIntent::Close {
            entry_id: id.to_string(),
        });
    }

    pub fn close_all(&mut self) {
        self.pending.push(OrderIntent::CloseAll);
    }

    // ── Fills ──

    fn fill_entry(
        &mut self,
        id: String,
        direction: Direction,
        qty: f64,
        bar: usize,
        price: f64,
        time: i64,
    ) {
        if self
            .open_positions
            .iter()
            .any(|p| p.id == id && p.direction == direction)
        {
            debug!(bar, id = %id, "entry ignored: position already open");
            return;
        }
        self.close_where(|p| p.direction == direction.opposite(), bar, price, time);
        debug!(bar, id = %id, direction = direction.as_str(), qty, price, "entry filled");
        self.cash -= self.commission;
        self.open_positions.push(Position {
            id,
            direction,
            qty,
            entry_price: price,
            entry_time: time,
            entry_bar: bar,
        });
    }

    fn close_where(
        &mut self,
        matches: impl Fn(&Position) -> bool,
        bar: usize,
        price: f64,
        time: i64,
    ) -> usize {
        let (closing, keep): (Vec<Position>, Vec<Position>) =
            std::mem::take(&mut self.open_positions)
                .into_iter()
                .partition(|p| matches(p));
        self.open_positions = keep;
        let count = closing.len();
        for position in closing {
            let trade = position.close(price, time, bar, 2.0 * self.commission);
            debug!(bar, id = %trade.id, pnl = trade.pnl, "position closed");
            // The entry fee was paid at the fill.
            self.cash += trade.pnl + self.commission;
            self.trade_history.push(trade);
        }
        count
    }

    // ── Queries ──

    /// Cash plus the mark-to-market value of open positions at `mark`.
    pub fn get_equity(&self, mark: f64) -> f64 {
        self.cash
            + self
                .open_positions
                .iter()
                .map(|p| p.unrealized_pnl(mark))
                .sum::<f64>()
    }

    pub fn get_trade_history(&self) -> &[ClosedTrade] {
        &self.trade_history
    }

    pub fn open_positions(&self) -> &[Position] {
        &self.open_positions
    }

    pub fn pending(&self) -> &PendingOrders {
        &self.pending
    }

    /// Signed open quantity: positive long, negative short.
    pub fn position_size(&self) -> f64 {
        self.open_positions
            .iter()
            .map(|p| p.qty * p.direction.sign())
            .sum()
    }

    /// Quantity-weighted entry price of open positions, NA when flat.
    pub fn position_avg_price(&self) -> f64 {
        let qty: f64 = self.open_positions.iter().map(|p| p.qty).sum();
        if qty == 0.0 {
            return NA;
        }
        self.open_positions
            .iter()
            .map(|p| p.qty * p.entry_price)
            .sum::<f64>()
            / qty
    }

    /// Sum of closed-trade P&L. Entry fees of open positions are not in it.
    pub fn net_profit(&self) -> f64 {
        self.trade_history.iter().map(|t| t.pnl).sum()
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn initial_capital(&self) -> f64 {
        self.initial_capital
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn market_position(&self) -> MarketPosition {
        self.market_position
    }

    pub fn last_bar_time(&self) -> Option<i64> {
        self.last_bar_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> StrategyEngine {
        let mut e = StrategyEngine::new(DEFAULT_INITIAL_CAPITAL);
        e.call("test", 1_000.0);
        e
    }

    #[test]
    fn entry_fills_at_next_open() {
        let mut e = engine();
        e.on_bar_update(0, 100.0, 0);
        e.entry("L", Direction::Long, 1.0);
        assert!(e.open_positions().is_empty());

        e.on_bar_update(1, 101.0, 60);
        let pos = &e.open_positions()[0];
        assert_eq!(pos.entry_price, 101.0);
        assert_eq!(pos.entry_bar, 1);
        assert_eq!(pos.entry_time, 60);
        assert_eq!(e.market_position(), MarketPosition::Long);
        assert_eq!(e.last_bar_time(), Some(60));
    }

    #[test]
    fn opposite_entry_reverses_at_same_open() {
        let mut e = engine();
        e.entry("L", Direction::Long, 1.0);
        e.on_bar_update(1, 100.0, 60);
        e.entry("S", Direction::Short, 2.0);
        e.on_bar_update(2, 110.0, 120);

        let trades = e.get_trade_history();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].id, "L");
        assert_eq!(trades[0].exit_price, 110.0);
        assert_eq!(trades[0].pnl, 10.0);

        assert_eq!(e.open_positions().len(), 1);
        assert_eq!(e.open_positions()[0].direction, Direction::Short);
        assert_eq!(e.open_positions()[0].entry_price, 110.0);
        assert_eq!(e.market_position(), MarketPosition::Short);
        assert_eq!(e.cash(), 1_010.0);
    }

    #[test]
    fn same_id_same_direction_is_noop() {
        let mut e = engine();
        e.entry("L", Direction::Long, 1.0);
        e.on_bar_update(1, 100.0, 60);
        e.entry("L", Direction::Long, 5.0);
        e.on_bar_update(2, 120.0, 120);
        assert_eq!(e.open_positions().len(), 1);
        assert_eq!(e.open_positions()[0].qty, 1.0);
        assert_eq!(e.open_positions()[0].entry_price, 100.0);
    }

    #[test]
    fn different_ids_same_direction_coexist() {
        let mut e = engine();
        e.entry("A", Direction::Long, 1.0);
        e.entry("B", Direction::Long, 3.0);
        e.on_bar_update(1, 100.0, 60);
        assert_eq!(e.open_positions().len(), 2);
        assert_eq!(e.position_size(), 4.0);
    }

    #[test]
    fn close_and_exit_fill_at_next_open() {
        let mut e = engine();
        e.entry("A", Direction::Long, 1.0);
        e.entry("B", Direction::Short, 1.0);
        e.on_bar_update(1, 100.0, 60);
        // B reversed A at the same open; only B is open.
        assert_eq!(e.open_positions().len(), 1);
        assert_eq!(e.get_trade_history()[0].pnl, 0.0);

        e.exit("stop", Some("B"));
        e.on_bar_update(2, 90.0, 120);
        assert!(e.open_positions().is_empty());
        assert_eq!(e.get_trade_history()[1].pnl, 10.0);
        assert_eq!(e.market_position(), MarketPosition::Flat);
    }

    #[test]
    fn close_unknown_id_is_ignored() {
        let mut e = engine();
        e.entry("A", Direction::Long, 1.0);
        e.on_bar_update(1, 100.0, 60);
        e.close("nope");
        e.on_bar_update(2, 101.0, 120);
        assert_eq!(e.open_positions().len(), 1);
    }

    #[test]
    fn close_all_flattens() {
        let mut e = engine();
        e.entry("A", Direction::Long, 1.0);
        e.entry("B", Direction::Long, 2.0);
        e.on_bar_update(1, 100.0, 60);
        e.close_all();
        e.on_bar_update(2, 105.0, 120);
        assert!(e.open_positions().is_empty());
        assert_eq!(e.net_profit(), 15.0);
    }

    #[test]
    fn invalid_quantity_is_rejected() {
        let mut e = engine();
        e.entry("A", Direction::Long, 0.0);
        e.entry("B", Direction::Long, f64::NAN);
        e.entry("C", Direction::Long, -1.0);
        assert!(e.pending().is_empty());
    }

    #[test]
    fn equity_marks_open_positions() {
        let mut e = engine();
        e.entry("S", Direction::Short, 2.0);
        e.on_bar_update(1, 100.0, 60);
        assert_eq!(e.get_equity(90.0), 1_020.0);
        assert_eq!(e.get_equity(110.0), 980.0);
    }

    #[test]
    fn commission_is_charged_per_fill() {
        let mut e = StrategyEngine::new(1_000.0).with_commission(1.0);
        e.entry("L", Direction::Long, 1.0);
        e.on_bar_update(1, 100.0, 60);
        e.close("L");
        e.on_bar_update(2, 110.0, 120);
        assert_eq!(e.get_trade_history()[0].pnl, 8.0);
        assert_eq!(e.cash(), 1_008.0);
    }

    #[test]
    fn open_position_equity_is_net_of_entry_fee() {
        let mut e = StrategyEngine::new(1_000.0).with_commission(1.0);
        e.entry("L", Direction::Long, 2.0);
        e.on_bar_update(1, 100.0, 60);
        assert_eq!(e.cash(), 999.0);
        assert_eq!(e.get_equity(100.0), 999.0);
        assert_eq!(e.get_equity(105.0), 1_009.0);
        assert_eq!(e.net_profit(), 0.0);

        e.close("L");
        e.on_bar_update(2, 105.0, 120);
        assert_eq!(e.get_trade_history()[0].pnl, 8.0);
        assert_eq!(e.cash(), 1_008.0);
    }

    #[test]
    fn cash_closure_after_round_trips() {
        let mut e = engine();
        let opens = [100.0, 103.0, 99.0, 104.0, 97.0];
        for (bar, &open) in opens.iter().enumerate() {
            e.on_bar_update(bar, open, bar as i64 * 60);
            let direction = if bar % 2 == 0 {
                Direction::Long
            } else {
                Direction::Short
            };
            e.entry(direction.as_str(), direction, 1.5);
        }
        e.close_all();
        e.on_bar_update(5, 101.0, 300);
        let total: f64 = e.get_trade_history().iter().map(|t| t.pnl).sum();
        assert!((e.cash() - e.initial_capital() - total).abs() < 1e-9);
        assert!(e.open_positions().is_empty());
    }

    #[test]
    fn call_sets_capital() {
        let e = engine();
        assert_eq!(e.title(), "test");
        assert_eq!(e.initial_capital(), 1_000.0);
        assert_eq!(e.get_equity(1.0), 1_000.0);
    }
}

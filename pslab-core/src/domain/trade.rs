//! Positions and closed trades.

use serde::{Deserialize, Serialize};

/// Side of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Direction::Long => Direction::Short,
            Direction::Short => Direction::Long,
        }
    }

    /// +1 for long, -1 for short.
    pub fn sign(self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Long => "long",
            Direction::Short => "short",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "long" => Some(Direction::Long),
            "short" => Some(Direction::Short),
            _ => None,
        }
    }
}

/// Aggregate market position of the strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketPosition {
    #[default]
    Flat,
    Long,
    Short,
}

impl From<Direction> for MarketPosition {
    fn from(d: Direction) -> Self {
        match d {
            Direction::Long => MarketPosition::Long,
            Direction::Short => MarketPosition::Short,
        }
    }
}

/// An open position created by a filled entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: String,
    pub direction: Direction,
    pub qty: f64,
    pub entry_price: f64,
    pub entry_time: i64,
    pub entry_bar: usize,
}

impl Position {
    /// Gross profit if the position were closed at `price`.
    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        (price - self.entry_price) * self.qty * self.direction.sign()
    }

    pub fn close(self, exit_price: f64, exit_time: i64, exit_bar: usize, fees: f64) -> ClosedTrade {
        let pnl = self.unrealized_pnl(exit_price) - fees;
        ClosedTrade {
            id: self.id,
            direction: self.direction,
            qty: self.qty,
            entry_price: self.entry_price,
            entry_time: self.entry_time,
            entry_bar: self.entry_bar,
            exit_price,
            exit_time,
            exit_bar,
            pnl,
        }
    }
}

/// A round-trip: a position plus its exit. `pnl` is net of fees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub id: String,
    pub direction: Direction,
    pub qty: f64,
    pub entry_price: f64,
    pub entry_time: i64,
    pub entry_bar: usize,
    pub exit_price: f64,
    pub exit_time: i64,
    pub exit_bar: usize,
    pub pnl: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(direction: Direction) -> Position {
        Position {
            id: "A".into(),
            direction,
            qty: 2.0,
            entry_price: 100.0,
            entry_time: 10,
            entry_bar: 1,
        }
    }

    #[test]
    fn long_pnl() {
        let trade = position(Direction::Long).close(110.0, 20, 2, 0.0);
        assert_eq!(trade.pnl, 20.0);
        assert_eq!(trade.exit_bar, 2);
    }

    #[test]
    fn short_pnl_is_negated() {
        let trade = position(Direction::Short).close(110.0, 20, 2, 0.0);
        assert_eq!(trade.pnl, -20.0);
    }

    #[test]
    fn fees_reduce_pnl() {
        let trade = position(Direction::Long).close(110.0, 20, 2, 1.5);
        assert_eq!(trade.pnl, 18.5);
    }

    #[test]
    fn direction_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Direction::Short).unwrap(), "\"short\"");
        assert_eq!(Direction::parse("long"), Some(Direction::Long));
        assert_eq!(Direction::parse("sideways"), None);
    }
}

//! Domain types shared across the engine.

pub mod bar;
pub mod trade;

pub use bar::Bar;
pub use trade::{ClosedTrade, Direction, MarketPosition, Position};

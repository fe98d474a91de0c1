//! Limit order book state.
//!
//! Price-level aggregation per side, the order reference index, and the
//! per-instrument book set.

pub mod instrument_books;
pub mod order_book;
pub mod price_level;
pub mod reference_index;

pub use instrument_books::InstrumentBooks;
pub use order_book::{BookStats, OrderBook};
pub use price_level::PriceLevelBook;
pub use reference_index::ReferenceIndex;

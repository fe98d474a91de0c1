//! Single-instrument price-level book.
//!
//! Holds one [`PriceLevelBook`] per side, applies Add and reduction events,
//! and produces N-level snapshots. The book aggregates by price only; order
//! identity lives in the [`ReferenceIndex`](super::ReferenceIndex).
//!
//! Crossed (bid > ask) and locked (bid == ask) books are legal states here:
//! they are counted in [`BookStats`] and optionally logged, never rejected.

use crate::error::LevelUnderflow;
use crate::lob::price_level::PriceLevelBook;
use crate::types::{AddOrder, BookConsistency, BookSnapshot, Price, Side};

/// Counters for monitoring book health.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookStats {
    /// Add events applied
    pub adds: u64,
    /// Execute/Cancel events applied
    pub reductions: u64,
    pub levels_created: u64,
    pub levels_removed: u64,
    /// Mutations that left the book crossed
    pub crossed_quotes: u64,
    /// Mutations that left the book locked
    pub locked_quotes: u64,
    /// Snapshots taken
    pub snapshots: u64,
}

/// Bid and ask price-level books for one instrument.
#[derive(Debug, Clone)]
pub struct OrderBook {
    instrument: String,
    bids: PriceLevelBook,
    asks: PriceLevelBook,
    stats: BookStats,
    log_warnings: bool,
}

impl OrderBook {
    /// Create an empty book.
    ///
    /// # Example
    /// ```
    /// use itch_depth_reconstructor::{OrderBook, Price, Side};
    ///
    /// let mut book = OrderBook::new("AAPL");
    /// book.add(Side::Buy, Price::from_ticks(12_500), 100);
    /// let snap = book.snapshot(5);
    /// assert_eq!(snap.bid_volumes[0], 100);
    /// assert_eq!(snap.bid_prices[1], Price::ZERO);
    /// ```
    pub fn new(instrument: impl Into<String>) -> Self {
        Self {
            instrument: instrument.into(),
            bids: PriceLevelBook::new(Side::Buy),
            asks: PriceLevelBook::new(Side::Sell),
            stats: BookStats::default(),
            log_warnings: false,
        }
    }

    /// Enable/disable warning logs for crossed and locked books.
    pub fn with_logging(mut self, log: bool) -> Self {
        self.log_warnings = log;
        self
    }

    #[inline]
    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    #[inline]
    fn side_mut(&mut self, side: Side) -> &mut PriceLevelBook {
        match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        }
    }

    /// The price-level book for `side`.
    #[inline]
    pub fn side(&self, side: Side) -> &PriceLevelBook {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }

    /// Increase the aggregate at `price` on `side`.
    pub fn add(&mut self, side: Side, price: Price, volume: u64) {
        let book = self.side_mut(side);
        let before = book.len();
        book.add(price, volume);
        let created = book.len() > before;

        if created {
            self.stats.levels_created += 1;
        }
        self.track_consistency();
    }

    /// Decrease the aggregate at `price` on `side`. Returns the volume left.
    ///
    /// # Errors
    /// [`LevelUnderflow`] if the aggregate would go negative; the book is
    /// left unchanged.
    pub fn remove(&mut self, side: Side, price: Price, volume: u64) -> Result<u64, LevelUnderflow> {
        let remaining = self.side_mut(side).remove(price, volume)?;
        if remaining == 0 && volume > 0 {
            self.stats.levels_removed += 1;
        }
        self.track_consistency();
        Ok(remaining)
    }

    /// Apply an Add event.
    pub fn apply_add(&mut self, add: &AddOrder) {
        self.add(add.side, add.price, u64::from(add.volume));
        self.stats.adds += 1;
    }

    /// Apply an Execute or Cancel of `volume` against the order `origin`.
    pub fn apply_reduction(&mut self, origin: &AddOrder, volume: u32) -> Result<u64, LevelUnderflow> {
        let remaining = self.remove(origin.side, origin.price, u64::from(volume))?;
        self.stats.reductions += 1;
        Ok(remaining)
    }

    /// Top `n_levels` per side: bids descending, asks ascending, zero-padded.
    pub fn snapshot(&mut self, n_levels: usize) -> BookSnapshot {
        self.stats.snapshots += 1;
        self.peek(n_levels)
    }

    /// Like [`snapshot`](Self::snapshot) without counting it.
    pub fn peek(&self, n_levels: usize) -> BookSnapshot {
        let mut snap = BookSnapshot::new(n_levels);
        self.bids.fill_top(&mut snap.bid_prices, &mut snap.bid_volumes);
        self.asks.fill_top(&mut snap.ask_prices, &mut snap.ask_volumes);
        snap
    }

    #[inline]
    pub fn best_bid(&self) -> Option<Price> {
        self.bids.best()
    }

    #[inline]
    pub fn best_ask(&self) -> Option<Price> {
        self.asks.best()
    }

    pub fn consistency(&self) -> BookConsistency {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => {
                if bid < ask {
                    BookConsistency::Valid
                } else if bid == ask {
                    BookConsistency::Locked
                } else {
                    BookConsistency::Crossed
                }
            }
            _ => BookConsistency::Empty,
        }
    }

    /// `false` only for crossed or locked books.
    pub fn is_consistent(&self) -> bool {
        matches!(
            self.consistency(),
            BookConsistency::Valid | BookConsistency::Empty
        )
    }

    fn track_consistency(&mut self) {
        match self.consistency() {
            BookConsistency::Crossed => {
                self.stats.crossed_quotes += 1;
                if self.log_warnings {
                    if let (Some(bid), Some(ask)) = (self.best_bid(), self.best_ask()) {
                        log::warn!("{}: crossed book bid={bid} > ask={ask}", self.instrument);
                    }
                }
            }
            BookConsistency::Locked => {
                self.stats.locked_quotes += 1;
                if self.log_warnings {
                    if let Some(bid) = self.best_bid() {
                        log::debug!("{}: locked book at {bid}", self.instrument);
                    }
                }
            }
            BookConsistency::Valid | BookConsistency::Empty => {}
        }
    }

    /// Number of non-empty levels on `side`.
    pub fn level_count(&self, side: Side) -> usize {
        self.side(side).len()
    }

    pub fn bid_levels(&self) -> usize {
        self.bids.len()
    }

    pub fn ask_levels(&self) -> usize {
        self.asks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    pub fn stats(&self) -> &BookStats {
        &self.stats
    }

    /// Reset to an empty book, clearing statistics.
    pub fn reset(&mut self) {
        self.bids.clear();
        self.asks.clear();
        self.stats = BookStats::default();
    }
}

//! One side of an instrument's book, aggregated by price.
//!
//! This module provides a `PriceLevelBook` that maps price to the aggregate
//! resting volume at that price, plus a cached total across all levels.
//!
//! # Invariants
//!
//! - No level with zero volume is ever retained.
//! - A level's volume never goes below zero: a reduction larger than the
//!   resting volume is rejected with [`LevelUnderflow`] and leaves the book
//!   untouched.
//! - `total_volume` always equals the sum of all levels. Verified in debug
//!   builds via `verify_invariant()`.
//!
//! # Performance
//!
//! | Operation | Complexity |
//! |-----------|------------|
//! | `add` | O(log n) |
//! | `remove` | O(log n) |
//! | `best` | O(log n) |
//! | `total_volume` | O(1) |

use std::collections::BTreeMap;

use crate::error::LevelUnderflow;
use crate::types::{Price, Side};

/// Aggregate volume per price for one side of the book.
#[derive(Debug, Clone)]
pub struct PriceLevelBook {
    side: Side,
    /// price -> aggregate volume (always > 0)
    levels: BTreeMap<Price, u64>,
    /// Cached total (invariant: == levels.values().sum())
    total_volume: u64,
}

impl PriceLevelBook {
    /// Create an empty book for `side`.
    pub fn new(side: Side) -> Self {
        Self {
            side,
            levels: BTreeMap::new(),
            total_volume: 0,
        }
    }

    #[inline]
    pub fn side(&self) -> Side {
        self.side
    }

    /// Add volume at `price`, creating the level if absent.
    ///
    /// Adding zero volume is a no-op so that no empty level is created.
    #[inline]
    pub fn add(&mut self, price: Price, volume: u64) {
        if volume == 0 {
            return;
        }
        *self.levels.entry(price).or_insert(0) += volume;
        self.total_volume += volume;

        #[cfg(debug_assertions)]
        self.verify_invariant();
    }

    /// Remove volume at `price`. Returns the volume left at that price.
    ///
    /// A level that reaches exactly zero is deleted.
    ///
    /// # Errors
    /// [`LevelUnderflow`] when `volume` exceeds what rests at `price`
    /// (including a price with no level at all). The book is unchanged.
    pub fn remove(&mut self, price: Price, volume: u64) -> Result<u64, LevelUnderflow> {
        let resting = self.volume_at(price);
        if volume > resting {
            return Err(LevelUnderflow {
                side: self.side,
                price,
                resting,
                requested: volume,
            });
        }

        let remaining = resting - volume;
        if remaining == 0 {
            self.levels.remove(&price);
        } else if let Some(level) = self.levels.get_mut(&price) {
            *level = remaining;
        }
        self.total_volume -= volume;

        #[cfg(debug_assertions)]
        self.verify_invariant();

        Ok(remaining)
    }

    /// Aggregate volume at `price` (0 if there is no level).
    #[inline]
    pub fn volume_at(&self, price: Price) -> u64 {
        self.levels.get(&price).copied().unwrap_or(0)
    }

    /// Best price: highest bid or lowest ask.
    #[inline]
    pub fn best(&self) -> Option<Price> {
        match self.side {
            Side::Buy => self.levels.keys().next_back().copied(),
            Side::Sell => self.levels.keys().next().copied(),
        }
    }

    /// Write the top levels in priority order into the given slices.
    ///
    /// Bids descend by price, asks ascend. Slots past the available depth are
    /// left untouched, so callers pass zero-filled slices.
    pub fn fill_top(&self, prices: &mut [Price], volumes: &mut [u64]) {
        let n = prices.len().min(volumes.len());
        match self.side {
            Side::Buy => {
                for (i, (&price, &volume)) in self.levels.iter().rev().take(n).enumerate() {
                    prices[i] = price;
                    volumes[i] = volume;
                }
            }
            Side::Sell => {
                for (i, (&price, &volume)) in self.levels.iter().take(n).enumerate() {
                    prices[i] = price;
                    volumes[i] = volume;
                }
            }
        }
    }

    /// All levels in priority order.
    pub fn levels(&self) -> Vec<(Price, u64)> {
        let iter = self.levels.iter().map(|(&p, &v)| (p, v));
        match self.side {
            Side::Buy => iter.rev().collect(),
            Side::Sell => iter.collect(),
        }
    }

    /// Number of price levels.
    #[inline]
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Cached total volume across all levels (O(1)).
    #[inline]
    pub fn total_volume(&self) -> u64 {
        self.total_volume
    }

    pub fn clear(&mut self) {
        self.levels.clear();
        self.total_volume = 0;
    }

    /// Compute the total by summing all levels (O(n)).
    pub fn compute_actual_total(&self) -> u64 {
        self.levels.values().sum()
    }

    /// Verify the cached total and the no-empty-level invariant.
    #[cfg(debug_assertions)]
    pub fn verify_invariant(&self) {
        debug_assert_eq!(
            self.compute_actual_total(),
            self.total_volume,
            "PriceLevelBook total out of sync"
        );
        debug_assert!(
            self.levels.values().all(|&v| v > 0),
            "PriceLevelBook retained an empty level"
        );
    }

    #[cfg(not(debug_assertions))]
    #[inline]
    pub fn verify_invariant(&self) {}
}

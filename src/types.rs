//! Core data types for feed messages and book snapshots.
//!
//! These types are designed to be:
//! - Exact: prices are scaled integers, never floats, so sorting and equality
//!   on the book are exact
//! - Variant-typed: each message kind exposes only the fields it carries
//! - Serializable for export

use std::fmt;

use serde::{Deserialize, Serialize};

/// Implied decimal places of a feed price.
pub const PRICE_DECIMALS: u32 = 4;

/// Ticks per currency unit (10^`PRICE_DECIMALS`).
pub const PRICE_SCALE: i64 = 10_000;

/// Upper bound on snapshot depth accepted by the engine.
pub const MAX_LEVELS: usize = 50;

// ============================================================================
// Price
// ============================================================================

/// Fixed-point price in ticks of 1/10000.
///
/// The feed encodes prices as integers with four implied decimals, so
/// `12500` is `1.2500`. The integer form is kept everywhere inside the book;
/// the decimal form only appears through `Display` at the output boundary.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Price(i64);

impl Price {
    /// The padding price used for missing snapshot levels.
    pub const ZERO: Price = Price(0);

    #[inline]
    pub const fn from_ticks(ticks: i64) -> Self {
        Price(ticks)
    }

    #[inline]
    pub const fn ticks(self) -> i64 {
        self.0
    }

    /// Price as a float. Lossy; for analytics only.
    #[inline]
    pub fn as_f64(self) -> f64 {
        self.0 as f64 / PRICE_SCALE as f64
    }

    #[inline]
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let scale = PRICE_SCALE as u64;
        write!(
            f,
            "{sign}{}.{:0width$}",
            abs / scale,
            abs % scale,
            width = PRICE_DECIMALS as usize
        )
    }
}

// ============================================================================
// Side
// ============================================================================

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Resting on the bid
    Buy,
    /// Resting on the ask
    Sell,
}

impl Side {
    /// Parse the buy/sell indicator byte.
    ///
    /// Only `B` means buy. Every other byte, including lowercase `b`, is sell.
    #[inline]
    pub fn from_indicator(byte: u8) -> Self {
        if byte == b'B' {
            Side::Buy
        } else {
            Side::Sell
        }
    }

    /// Single-letter form used in exports.
    #[inline]
    pub fn indicator(self) -> char {
        match self {
            Side::Buy => 'B',
            Side::Sell => 'S',
        }
    }

    #[inline(always)]
    pub fn is_buy(self) -> bool {
        matches!(self, Side::Buy)
    }
}

impl fmt::Display for Side {
    /// Renders the book side the order rests on.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => f.write_str("bid"),
            Side::Sell => f.write_str("ask"),
        }
    }
}

// ============================================================================
// Messages
// ============================================================================

/// Message kind, keyed by the byte at offset 8 of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    Add,
    Execute,
    Cancel,
    Unknown,
}

impl MessageType {
    /// Classify a discriminator byte.
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            b'A' => MessageType::Add,
            b'E' => MessageType::Execute,
            b'X' => MessageType::Cancel,
            _ => MessageType::Unknown,
        }
    }

    /// Exact record length for recognized types.
    pub fn record_len(self) -> Option<usize> {
        match self {
            MessageType::Add => Some(42),
            MessageType::Execute => Some(33),
            MessageType::Cancel => Some(24),
            MessageType::Unknown => None,
        }
    }

    /// Discriminator character for recognized types.
    pub fn code(self) -> Option<char> {
        match self {
            MessageType::Add => Some('A'),
            MessageType::Execute => Some('E'),
            MessageType::Cancel => Some('X'),
            MessageType::Unknown => None,
        }
    }
}

/// A new resting order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddOrder {
    /// Opaque 8-character time token
    pub time: String,
    /// Opaque 9-character order reference
    pub ref_no: String,
    pub side: Side,
    pub volume: u32,
    /// Instrument token, whitespace trimmed
    pub instrument: String,
    pub price: Price,
    /// Display flag byte
    pub display: char,
}

/// Volume executed against a resting order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderExecuted {
    pub time: String,
    pub ref_no: String,
    pub volume: u32,
    /// Match number, whitespace trimmed
    pub match_no: String,
}

/// Volume cancelled from a resting order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCancel {
    pub time: String,
    pub ref_no: String,
    pub volume: u32,
}

/// A decoded feed record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    Add(AddOrder),
    Execute(OrderExecuted),
    Cancel(OrderCancel),
    /// Any other discriminator; carried through undecoded
    Unknown { code: char },
}

impl Message {
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::Add(_) => MessageType::Add,
            Message::Execute(_) => MessageType::Execute,
            Message::Cancel(_) => MessageType::Cancel,
            Message::Unknown { .. } => MessageType::Unknown,
        }
    }

    /// Discriminator character as it appeared on the wire.
    pub fn type_code(&self) -> char {
        match self {
            Message::Unknown { code } => *code,
            other => other.message_type().code().unwrap_or('?'),
        }
    }

    pub fn time(&self) -> Option<&str> {
        match self {
            Message::Add(m) => Some(&m.time),
            Message::Execute(m) => Some(&m.time),
            Message::Cancel(m) => Some(&m.time),
            Message::Unknown { .. } => None,
        }
    }

    pub fn ref_no(&self) -> Option<&str> {
        match self {
            Message::Add(m) => Some(&m.ref_no),
            Message::Execute(m) => Some(&m.ref_no),
            Message::Cancel(m) => Some(&m.ref_no),
            Message::Unknown { .. } => None,
        }
    }

    /// Volume carried by the event.
    pub fn volume(&self) -> Option<u32> {
        match self {
            Message::Add(m) => Some(m.volume),
            Message::Execute(m) => Some(m.volume),
            Message::Cancel(m) => Some(m.volume),
            Message::Unknown { .. } => None,
        }
    }
}

// ============================================================================
// Book snapshot
// ============================================================================

/// Book consistency status of a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookConsistency {
    /// best_bid < best_ask
    Valid,
    /// One or both sides empty
    Empty,
    /// best_bid == best_ask
    Locked,
    /// best_bid > best_ask
    Crossed,
}

/// Top-N view of one instrument's book.
///
/// Bids are ordered highest first, asks lowest first. Positions beyond the
/// available depth hold price 0 and volume 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookSnapshot {
    pub levels: usize,
    pub bid_prices: Vec<Price>,
    pub bid_volumes: Vec<u64>,
    pub ask_prices: Vec<Price>,
    pub ask_volumes: Vec<u64>,
}

impl BookSnapshot {
    /// An all-padding snapshot of `levels` positions per side.
    pub fn new(levels: usize) -> Self {
        Self {
            levels,
            bid_prices: vec![Price::ZERO; levels],
            bid_volumes: vec![0; levels],
            ask_prices: vec![Price::ZERO; levels],
            ask_volumes: vec![0; levels],
        }
    }

    #[inline]
    pub fn best_bid(&self) -> Option<Price> {
        match self.bid_volumes.first() {
            Some(&v) if v > 0 => Some(self.bid_prices[0]),
            _ => None,
        }
    }

    #[inline]
    pub fn best_ask(&self) -> Option<Price> {
        match self.ask_volumes.first() {
            Some(&v) if v > 0 => Some(self.ask_prices[0]),
            _ => None,
        }
    }

    pub fn check_consistency(&self) -> BookConsistency {
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

    /// Best ask minus best bid.
    pub fn spread(&self) -> Option<Price> {
        self.spread_ticks().map(Price::from_ticks)
    }

    /// Best ask minus best bid, in ticks.
    pub fn spread_ticks(&self) -> Option<i64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask.ticks() - bid.ticks()),
            _ => None,
        }
    }

    pub fn mid_price(&self) -> Option<f64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid.as_f64() + ask.as_f64()) / 2.0),
            _ => None,
        }
    }

    pub fn total_bid_volume(&self) -> u64 {
        self.bid_volumes.iter().sum()
    }

    pub fn total_ask_volume(&self) -> u64 {
        self.ask_volumes.iter().sum()
    }

    /// (bid - ask) / (bid + ask) over the visible depth.
    pub fn depth_imbalance(&self) -> Option<f64> {
        let bid = self.total_bid_volume() as f64;
        let ask = self.total_ask_volume() as f64;
        let total = bid + ask;
        if total > 0.0 {
            Some((bid - ask) / total)
        } else {
            None
        }
    }

    pub fn active_bid_levels(&self) -> usize {
        self.bid_volumes.iter().filter(|&&v| v > 0).count()
    }

    pub fn active_ask_levels(&self) -> usize {
        self.ask_volumes.iter().filter(|&&v| v > 0).count()
    }
}

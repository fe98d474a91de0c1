//! Tracked-instrument book set.
//!
//! Holds the caller's set of tracked instruments and one [`OrderBook`] per
//! instrument, created lazily on that instrument's first relevant event.
//! Events for instruments outside the set are ignored by the engine.

use ahash::{AHashMap, AHashSet};

use super::order_book::OrderBook;

/// Books for the tracked instruments of one stream.
///
/// # Example
/// ```
/// use itch_depth_reconstructor::InstrumentBooks;
///
/// let mut books = InstrumentBooks::new(["AAPL", "MSFT"]);
/// assert!(books.is_tracked("AAPL"));
/// assert!(books.book_mut("IBM").is_none());
///
/// // Created on first use
/// assert!(books.get("AAPL").is_none());
/// books.book_mut("AAPL").unwrap();
/// assert!(books.get("AAPL").is_some());
/// ```
#[derive(Debug, Clone, Default)]
pub struct InstrumentBooks {
    tracked: AHashSet<String>,
    books: AHashMap<String, OrderBook>,
    log_warnings: bool,
}

impl InstrumentBooks {
    /// Track the given instrument tokens. Tokens are whitespace-trimmed to
    /// match decoded instruments.
    pub fn new<I, S>(instruments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            tracked: instruments
                .into_iter()
                .map(|s| s.as_ref().trim().to_string())
                .collect(),
            books: AHashMap::new(),
            log_warnings: false,
        }
    }

    /// Enable/disable crossed/locked logging for books created from now on.
    pub fn with_logging(mut self, log: bool) -> Self {
        self.log_warnings = log;
        self
    }

    /// Start tracking an instrument. Returns false if already tracked.
    pub fn track(&mut self, instrument: &str) -> bool {
        self.tracked.insert(instrument.trim().to_string())
    }

    #[inline]
    pub fn is_tracked(&self, instrument: &str) -> bool {
        self.tracked.contains(instrument)
    }

    /// Book for a tracked instrument, created if this is its first event.
    /// `None` for untracked instruments.
    pub fn book_mut(&mut self, instrument: &str) -> Option<&mut OrderBook> {
        if !self.tracked.contains(instrument) {
            return None;
        }
        if !self.books.contains_key(instrument) {
            log::debug!("creating book for {instrument}");
            let book = OrderBook::new(instrument).with_logging(self.log_warnings);
            self.books.insert(instrument.to_string(), book);
        }
        self.books.get_mut(instrument)
    }

    /// Book for an instrument that has seen at least one event.
    pub fn get(&self, instrument: &str) -> Option<&OrderBook> {
        self.books.get(instrument)
    }

    /// Tracked instruments, sorted.
    pub fn tracked(&self) -> Vec<&str> {
        let mut out: Vec<&str> = self.tracked.iter().map(String::as_str).collect();
        out.sort_unstable();
        out
    }

    pub fn tracked_count(&self) -> usize {
        self.tracked.len()
    }

    /// Number of books created so far.
    pub fn active_count(&self) -> usize {
        self.books.len()
    }

    /// Iterate over created books in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &OrderBook)> {
        self.books.iter().map(|(k, v)| (k.as_str(), v))
    }
}

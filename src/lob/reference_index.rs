//! Order reference index.
//!
//! Maps a feed order reference to the Add that introduced it, so Execute and
//! Cancel events, which carry only the reference and a volume, can be
//! resolved to the order's side, price and instrument.
//!
//! An order's side and price never change over its lifetime, so entries are
//! never evicted within a stream: a later reduction must always resolve even
//! after earlier reductions brought the order to zero.

use ahash::AHashMap;

use crate::types::AddOrder;

/// ref_no -> originating Add.
#[derive(Debug, Clone, Default)]
pub struct ReferenceIndex {
    orders: AHashMap<String, AddOrder>,
}

impl ReferenceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            orders: AHashMap::with_capacity(capacity),
        }
    }

    /// Index an Add, replacing any stale entry with the same reference.
    ///
    /// Returns the replaced entry, if any.
    #[inline]
    pub fn insert(&mut self, add: AddOrder) -> Option<AddOrder> {
        self.orders.insert(add.ref_no.clone(), add)
    }

    /// The Add that introduced `ref_no`. `None` is expected for orders of
    /// untracked instruments.
    #[inline]
    pub fn lookup(&self, ref_no: &str) -> Option<&AddOrder> {
        self.orders.get(ref_no)
    }

    #[inline]
    pub fn contains(&self, ref_no: &str) -> bool {
        self.orders.contains_key(ref_no)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.orders.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Price, Side};

    fn add(ref_no: &str, side: Side, ticks: i64) -> AddOrder {
        AddOrder {
            time: "09300000".into(),
            ref_no: ref_no.into(),
            side,
            volume: 100,
            instrument: "AAPL".into(),
            price: Price::from_ticks(ticks),
            display: 'Y',
        }
    }

    #[test]
    fn test_insert_and_lookup() {
        let mut index = ReferenceIndex::new();
        assert!(index.insert(add("000000001", Side::Buy, 12_500)).is_none());

        let found = index.lookup("000000001").unwrap();
        assert_eq!(found.side, Side::Buy);
        assert_eq!(found.price, Price::from_ticks(12_500));
        assert!(index.contains("000000001"));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_lookup_absent() {
        let index = ReferenceIndex::new();
        assert!(index.lookup("000000042").is_none());
        assert!(index.is_empty());
    }

    #[test]
    fn test_insert_overwrites_stale_entry() {
        let mut index = ReferenceIndex::with_capacity(4);
        index.insert(add("000000001", Side::Buy, 12_500));
        let stale = index.insert(add("000000001", Side::Sell, 13_000)).unwrap();
        assert_eq!(stale.side, Side::Buy);

        let current = index.lookup("000000001").unwrap();
        assert_eq!(current.side, Side::Sell);
        assert_eq!(current.price, Price::from_ticks(13_000));
        assert_eq!(index.len(), 1);
    }
}

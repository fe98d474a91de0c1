//! Snapshot rows and their per-instrument event logs.
//!
//! Every book-changing event produces one [`SnapshotRow`]: the N-level book
//! after the event, the event itself and, for Execute/Cancel, the Add it
//! resolved to. Rows are appended in processing order and never modified.
//!
//! Flattened rows have a fixed column order:
//!
//! ```text
//! ask_price_1..N, ask_volume_1..N, bid_price_1..N, bid_volume_1..N,
//! event_time, event_message_type, event_ref_no, event_side, event_volume,
//! event_instrument, event_price, event_display, event_match_no,
//! ref_time, ref_message_type, ref_ref_no, ref_side, ref_volume,
//! ref_instrument, ref_price, ref_display
//! ```
//!
//! Fields that do not apply to a row are empty cells.

use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::ser::{Serialize, Serializer};

use crate::error::{ReplayError, Result};
use crate::types::{AddOrder, BookSnapshot, Message, Price};

/// Event columns, without the `event_` prefix.
pub const EVENT_FIELDS: [&str; 9] = [
    "time",
    "message_type",
    "ref_no",
    "side",
    "volume",
    "instrument",
    "price",
    "display",
    "match_no",
];

/// Resolved-Add columns, without the `ref_` prefix.
pub const REF_FIELDS: [&str; 8] = [
    "time",
    "message_type",
    "ref_no",
    "side",
    "volume",
    "instrument",
    "price",
    "display",
];

/// One value of a flattened row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    Empty,
    Text(String),
    Int(u64),
    Price(Price),
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Text(s) => f.write_str(s),
            Cell::Int(v) => write!(f, "{v}"),
            Cell::Price(p) => write!(f, "{p}"),
        }
    }
}

impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Cell::Empty => serializer.serialize_none(),
            Cell::Text(s) => serializer.serialize_str(s),
            Cell::Int(v) => serializer.serialize_u64(*v),
            // Decimal string keeps the exact fixed-point value.
            Cell::Price(p) => serializer.collect_str(p),
        }
    }
}

/// Book state after one event, with the event and its resolved origin.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SnapshotRow {
    pub book: BookSnapshot,
    pub event: Message,
    /// The originating Add for Execute/Cancel events
    pub reference: Option<AddOrder>,
}

impl SnapshotRow {
    pub fn new(book: BookSnapshot, event: Message, reference: Option<AddOrder>) -> Self {
        Self {
            book,
            event,
            reference,
        }
    }

    /// Flatten into named columns in the fixed export order.
    pub fn to_columns(&self) -> IndexMap<String, Cell> {
        let n = self.book.levels;
        let mut cols = IndexMap::with_capacity(4 * n + EVENT_FIELDS.len() + REF_FIELDS.len());

        for i in 0..n {
            cols.insert(format!("ask_price_{}", i + 1), Cell::Price(self.book.ask_prices[i]));
        }
        for i in 0..n {
            cols.insert(format!("ask_volume_{}", i + 1), Cell::Int(self.book.ask_volumes[i]));
        }
        for i in 0..n {
            cols.insert(format!("bid_price_{}", i + 1), Cell::Price(self.book.bid_prices[i]));
        }
        for i in 0..n {
            cols.insert(format!("bid_volume_{}", i + 1), Cell::Int(self.book.bid_volumes[i]));
        }

        for (name, cell) in EVENT_FIELDS.iter().zip(event_cells(&self.event)) {
            cols.insert(format!("event_{name}"), cell);
        }

        let ref_cells = match &self.reference {
            Some(add) => add_cells(add),
            None => std::array::from_fn(|_| Cell::Empty),
        };
        for (name, cell) in REF_FIELDS.iter().zip(ref_cells) {
            cols.insert(format!("ref_{name}"), cell);
        }

        cols
    }
}

fn add_cells(add: &AddOrder) -> [Cell; 8] {
    [
        Cell::Text(add.time.clone()),
        Cell::Text("A".into()),
        Cell::Text(add.ref_no.clone()),
        Cell::Text(add.side.indicator().to_string()),
        Cell::Int(u64::from(add.volume)),
        Cell::Text(add.instrument.clone()),
        Cell::Price(add.price),
        Cell::Text(add.display.to_string()),
    ]
}

fn event_cells(event: &Message) -> [Cell; 9] {
    let mut cells: [Cell; 9] = std::array::from_fn(|_| Cell::Empty);
    match event {
        Message::Add(add) => {
            for (slot, cell) in cells.iter_mut().zip(add_cells(add)) {
                *slot = cell;
            }
        }
        Message::Execute(exec) => {
            cells[0] = Cell::Text(exec.time.clone());
            cells[1] = Cell::Text("E".into());
            cells[2] = Cell::Text(exec.ref_no.clone());
            cells[4] = Cell::Int(u64::from(exec.volume));
            cells[8] = Cell::Text(exec.match_no.clone());
        }
        Message::Cancel(cancel) => {
            cells[0] = Cell::Text(cancel.time.clone());
            cells[1] = Cell::Text("X".into());
            cells[2] = Cell::Text(cancel.ref_no.clone());
            cells[4] = Cell::Int(u64::from(cancel.volume));
        }
        Message::Unknown { code } => {
            cells[1] = Cell::Text(code.to_string());
        }
    }
    cells
}

/// Column names for a given depth, in export order.
pub fn header(levels: usize) -> Vec<String> {
    let mut names = Vec::with_capacity(4 * levels + EVENT_FIELDS.len() + REF_FIELDS.len());
    for prefix in ["ask_price", "ask_volume", "bid_price", "bid_volume"] {
        names.extend((1..=levels).map(|i| format!("{prefix}_{i}")));
    }
    names.extend(EVENT_FIELDS.iter().map(|f| format!("event_{f}")));
    names.extend(REF_FIELDS.iter().map(|f| format!("ref_{f}")));
    names
}

/// Ordered snapshot rows per instrument.
#[derive(Debug, Clone)]
pub struct SnapshotRecorder {
    levels: usize,
    /// instrument -> rows, instruments in first-recorded order
    rows: IndexMap<String, Vec<SnapshotRow>>,
}

impl SnapshotRecorder {
    /// Create a recorder for snapshots of `levels` positions per side.
    pub fn new(levels: usize) -> Self {
        Self {
            levels,
            rows: IndexMap::new(),
        }
    }

    #[inline]
    pub fn levels(&self) -> usize {
        self.levels
    }

    /// Append a row to `instrument`'s log.
    pub fn append(&mut self, instrument: &str, row: SnapshotRow) {
        debug_assert_eq!(row.book.levels, self.levels, "snapshot depth mismatch");
        match self.rows.get_mut(instrument) {
            Some(rows) => rows.push(row),
            None => {
                self.rows.insert(instrument.to_string(), vec![row]);
            }
        }
    }

    /// Rows recorded for `instrument`, oldest first.
    pub fn rows(&self, instrument: &str) -> &[SnapshotRow] {
        self.rows.get(instrument).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Instruments with at least one row, in first-recorded order.
    pub fn instruments(&self) -> Vec<&str> {
        self.rows.keys().map(String::as_str).collect()
    }

    /// Number of instruments with rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn total_rows(&self) -> usize {
        self.rows.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Hand over the per-instrument logs.
    pub fn into_rows(self) -> IndexMap<String, Vec<SnapshotRow>> {
        self.rows
    }

    /// Write `instrument`'s rows as CSV with a header line.
    ///
    /// Returns the number of data rows written.
    pub fn write_csv<W: Write>(&self, instrument: &str, writer: &mut W) -> Result<usize> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(header(self.levels))?;

        let rows = self.rows(instrument);
        for row in rows {
            wtr.write_record(row.to_columns().values().map(Cell::to_string))?;
        }
        wtr.flush()?;
        Ok(rows.len())
    }

    /// Write `instrument`'s rows as JSON lines, one object per row.
    pub fn write_jsonl<W: Write>(&self, instrument: &str, writer: &mut W) -> Result<usize> {
        let rows = self.rows(instrument);
        for row in rows {
            let json = serde_json::to_string(&row.to_columns())?;
            writeln!(writer, "{json}")?;
        }
        Ok(rows.len())
    }

    /// Write one `<instrument>_<session>.csv` per instrument into `dir`.
    pub fn export_csv(&self, dir: impl AsRef<Path>, session: &str) -> Result<Vec<PathBuf>> {
        self.export_with(dir.as_ref(), session, "csv", |rec, inst, w| {
            rec.write_csv(inst, w)
        })
    }

    /// Write one `<instrument>_<session>.jsonl` per instrument into `dir`.
    pub fn export_jsonl(&self, dir: impl AsRef<Path>, session: &str) -> Result<Vec<PathBuf>> {
        self.export_with(dir.as_ref(), session, "jsonl", |rec, inst, w| {
            rec.write_jsonl(inst, w)
        })
    }

    fn export_with<F>(&self, dir: &Path, session: &str, ext: &str, write: F) -> Result<Vec<PathBuf>>
    where
        F: Fn(&Self, &str, &mut BufWriter<File>) -> Result<usize>,
    {
        fs::create_dir_all(dir).map_err(|e| {
            ReplayError::Io(format!("Failed to create {}: {e}", dir.display()))
        })?;

        let mut written = Vec::with_capacity(self.rows.len());
        for instrument in self.rows.keys() {
            let path = dir.join(format!("{instrument}_{session}.{ext}"));
            let file = File::create(&path).map_err(|e| {
                ReplayError::Io(format!("Failed to create {}: {e}", path.display()))
            })?;
            let mut writer = BufWriter::new(file);
            let count = write(self, instrument, &mut writer)?;
            writer.flush()?;
            log::debug!("wrote {count} rows to {}", path.display());
            written.push(path);
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{OrderCancel, OrderExecuted, Side};

    fn origin() -> AddOrder {
        AddOrder {
            time: "09300000".into(),
            ref_no: "000000001".into(),
            side: Side::Buy,
            volume: 100,
            instrument: "AAPL".into(),
            price: Price::from_ticks(12_500),
            display: 'Y',
        }
    }

    fn book_with_bid() -> BookSnapshot {
        let mut book = BookSnapshot::new(2);
        book.bid_prices[0] = Price::from_ticks(12_500);
        book.bid_volumes[0] = 100;
        book
    }

    #[test]
    fn test_header_shape() {
        let names = header(2);
        assert_eq!(names.len(), 8 + 9 + 8);
        assert_eq!(&names[..4], ["ask_price_1", "ask_price_2", "ask_volume_1", "ask_volume_2"]);
        assert_eq!(names[4], "bid_price_1");
        assert_eq!(names[8], "event_time");
        assert_eq!(names[16], "event_match_no");
        assert_eq!(names[17], "ref_time");
        assert_eq!(names.last().unwrap(), "ref_display");
    }

    #[test]
    fn test_columns_match_header() {
        let row = SnapshotRow::new(book_with_bid(), Message::Add(origin()), None);
        let cols = row.to_columns();
        let keys: Vec<&String> = cols.keys().collect();
        let expected = header(2);
        assert_eq!(keys, expected.iter().collect::<Vec<_>>());
    }

    #[test]
    fn test_add_row_values() {
        let row = SnapshotRow::new(book_with_bid(), Message::Add(origin()), None);
        let cols = row.to_columns();
        assert_eq!(cols["bid_price_1"].to_string(), "1.2500");
        assert_eq!(cols["bid_volume_1"], Cell::Int(100));
        assert_eq!(cols["bid_price_2"].to_string(), "0.0000");
        assert_eq!(cols["event_message_type"].to_string(), "A");
        assert_eq!(cols["event_side"].to_string(), "B");
        assert_eq!(cols["event_instrument"].to_string(), "AAPL");
        assert_eq!(cols["event_match_no"], Cell::Empty);
        assert_eq!(cols["ref_ref_no"], Cell::Empty);
    }

    #[test]
    fn test_execute_row_carries_reference() {
        let exec = Message::Execute(OrderExecuted {
            time: "09300100".into(),
            ref_no: "000000001".into(),
            volume: 40,
            match_no: "M1".into(),
        });
        let row = SnapshotRow::new(book_with_bid(), exec, Some(origin()));
        let cols = row.to_columns();
        assert_eq!(cols["event_message_type"].to_string(), "E");
        assert_eq!(cols["event_volume"], Cell::Int(40));
        assert_eq!(cols["event_match_no"].to_string(), "M1");
        assert_eq!(cols["event_price"], Cell::Empty);
        assert_eq!(cols["ref_price"].to_string(), "1.2500");
        assert_eq!(cols["ref_side"].to_string(), "B");
        assert_eq!(cols["ref_volume"], Cell::Int(100));
    }

    #[test]
    fn test_append_preserves_order() {
        let mut rec = SnapshotRecorder::new(2);
        rec.append("MSFT", SnapshotRow::new(BookSnapshot::new(2), Message::Add(origin()), None));
        rec.append("AAPL", SnapshotRow::new(BookSnapshot::new(2), Message::Add(origin()), None));
        let cancel = Message::Cancel(OrderCancel {
            time: "09300200".into(),
            ref_no: "000000001".into(),
            volume: 100,
        });
        rec.append("MSFT", SnapshotRow::new(BookSnapshot::new(2), cancel, Some(origin())));

        assert_eq!(rec.instruments(), vec!["MSFT", "AAPL"]);
        assert_eq!(rec.rows("MSFT").len(), 2);
        assert_eq!(rec.rows("MSFT")[1].event.type_code(), 'X');
        assert_eq!(rec.rows("IBM").len(), 0);
        assert_eq!(rec.total_rows(), 3);
        assert_eq!(rec.len(), 2);
    }

    #[test]
    fn test_write_csv() {
        let mut rec = SnapshotRecorder::new(2);
        rec.append("AAPL", SnapshotRow::new(book_with_bid(), Message::Add(origin()), None));

        let mut out = Vec::new();
        assert_eq!(rec.write_csv("AAPL", &mut out).unwrap(), 1);
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("ask_price_1,ask_price_2,ask_volume_1"));
        assert!(lines[1].starts_with("0.0000,0.0000,0,0,1.2500,0.0000,100,0,09300000,A,"));
        assert_eq!(lines[1].split(',').count(), header(2).len());
    }

    #[test]
    fn test_write_jsonl() {
        let mut rec = SnapshotRecorder::new(2);
        rec.append("AAPL", SnapshotRow::new(book_with_bid(), Message::Add(origin()), None));

        let mut out = Vec::new();
        rec.write_jsonl("AAPL", &mut out).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["bid_price_1"], "1.2500");
        assert_eq!(value["bid_volume_1"], 100);
        assert!(value["ref_time"].is_null());
    }

    #[test]
    fn test_write_csv_quotes_separator_values() {
        let mut add = origin();
        add.display = ',';
        let mut rec = SnapshotRecorder::new(2);
        rec.append("AAPL", SnapshotRow::new(book_with_bid(), Message::Add(add), None));

        let mut out = Vec::new();
        rec.write_csv("AAPL", &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let data = text.lines().nth(1).unwrap();
        assert!(data.contains(",1.2500,\",\","), "{data}");

        let mut reader = csv::Reader::from_reader(text.as_bytes());
        let record = reader.records().next().unwrap().unwrap();
        assert_eq!(record.len(), header(2).len());
        assert_eq!(&record[15], ",");
    }

    #[test]
    fn test_export_csv_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut rec = SnapshotRecorder::new(2);
        rec.append("AAPL", SnapshotRow::new(book_with_bid(), Message::Add(origin()), None));

        let paths = rec.export_csv(dir.path(), "122607").unwrap();
        assert_eq!(paths.len(), 1);
        assert!(paths[0].ends_with("AAPL_122607.csv"));
        let text = std::fs::read_to_string(&paths[0]).unwrap();
        assert_eq!(text.lines().count(), 2);
    }
}

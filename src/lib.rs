//! # ITCH-Depth-Reconstructor
//!
//! Fixed-width market-data feed → per-instrument price-level depth snapshots.
//!
//! This library replays an order-level feed of Add, Execute and Cancel
//! records and produces, for each tracked instrument, one N-level book
//! snapshot per book-changing event. Each snapshot row carries the event
//! that caused it and, for Execute/Cancel, the Add it resolved to.
//!
//! ## Features
//!
//! - **Exact prices**: scaled-integer prices (ticks of 1/10000), so level
//!   sorting and equality never drift
//! - **Typed messages**: `Message` is a tagged enum, each variant carrying
//!   only its own fields
//! - **Indexed resolution**: Execute/Cancel resolve through a hash index of
//!   tracked Adds in O(1)
//! - **Fail-fast streams**: malformed records and level underflows halt the
//!   stream with the offending line and its position
//! - **Parallel streams**: independent sessions replay concurrently with
//!   `rayon`
//! - **Export**: CSV and JSON-lines per instrument and session
//!
//! ## Quick Start
//!
//! ```rust
//! use itch_depth_reconstructor::{Engine, EngineConfig, Price, VecSource};
//!
//! let config = EngineConfig::new(10).with_instruments(["AAPL"]);
//! let mut engine = Engine::new(config).unwrap();
//!
//! let feed = VecSource::from_lines([
//!     "09300000A000000001B000100AAPL  0000012500Y",
//!     "09300001A000000002B000050AAPL  0000012500Y",
//!     "09300200X000000001000100",
//! ]);
//! engine.run(feed).unwrap();
//!
//! let rows = engine.recorder().rows("AAPL");
//! assert_eq!(rows.len(), 3);
//! assert_eq!(rows[2].book.bid_prices[0], Price::from_ticks(12_500));
//! assert_eq!(rows[2].book.bid_volumes[0], 50);
//! ```
//!
//! ### Replay Files
//!
//! ```ignore
//! use itch_depth_reconstructor::{replay_streams, EngineConfig, FileSource};
//!
//! let config = EngineConfig::new(10).with_instruments(["AAPL", "MSFT"]);
//! let sources = vec![
//!     FileSource::new("data/S122607-v2.txt.zst")?,
//!     FileSource::new("data/S122707-v2.txt.zst")?,
//! ];
//!
//! for report in replay_streams(&config, sources)? {
//!     match &report.fault {
//!         None => {
//!             report.recorder.export_csv("out/", report.metadata.label())?;
//!         }
//!         Some(fault) => eprintln!("{}: {fault}", report.metadata.label()),
//!     }
//! }
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`types`] | Core types: `Price`, `Side`, `Message`, `BookSnapshot` |
//! | [`decoder`] | Fixed-width record decoding: `MessageDecoder`, `decode_line` |
//! | [`lob`] | Book state: `ReferenceIndex`, `PriceLevelBook`, `OrderBook`, `InstrumentBooks` |
//! | [`recorder`] | Snapshot rows, column flattening, CSV/JSON-lines export |
//! | [`engine`] | Stream replay: `Engine`, `EngineConfig`, `replay_streams` |
//! | [`source`] | Line sources: `LineSource`, `FileSource`, `VecSource` |
//! | [`error`] | `ReplayError`, `DecodeFault`, `BookIntegrityFault` |
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `zstd` | ✅ | Read `.zst`-compressed feed files |

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod decoder;
pub mod engine;
pub mod error;
pub mod lob;
pub mod recorder;
pub mod source;
pub mod types;

// Re-exports - Core types
pub use error::{BookIntegrityFault, DecodeFault, LevelUnderflow, ReplayError, Result};
pub use types::{
    AddOrder, BookConsistency, BookSnapshot, Message, MessageType, OrderCancel, OrderExecuted,
    Price, Side, MAX_LEVELS, PRICE_SCALE,
};

// Re-exports - Decoding
pub use decoder::{decode_line, DecoderStats, MessageDecoder};

// Re-exports - Book state
pub use lob::{BookStats, InstrumentBooks, OrderBook, PriceLevelBook, ReferenceIndex};

// Re-exports - Recording
pub use recorder::{Cell, SnapshotRecorder, SnapshotRow};

// Re-exports - Engine
pub use engine::{replay_streams, Engine, EngineConfig, EngineStats, LineOutcome, StreamReport};

// Re-exports - Source abstraction
pub use source::{FileSource, LineSource, SourceMetadata, VecSource};

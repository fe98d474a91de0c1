//! Stream replay engine.
//!
//! One [`Engine`] replays one feed stream strictly in arrival order:
//!
//! 1. Decode the line. Blank lines and unknown message types have no effect.
//! 2. Add for a tracked instrument: index it, apply it to the instrument's
//!    book, snapshot, record with no reference.
//! 3. Execute/Cancel: resolve the reference. Unresolved references are
//!    counted and otherwise ignored. Resolved ones reduce the originating
//!    order's level, then snapshot and record with the resolved Add.
//!
//! A [`DecodeFault`](crate::DecodeFault) or
//! [`BookIntegrityFault`](crate::BookIntegrityFault) halts the stream: every
//! later call returns the same fault. Rows recorded before the fault stay in
//! the recorder.
//!
//! Streams share nothing, so [`replay_streams`] runs them in parallel with
//! one engine per stream.
//!
//! # Example
//!
//! ```
//! use itch_depth_reconstructor::{Engine, EngineConfig};
//!
//! let config = EngineConfig::new(5).with_instruments(["AAPL"]);
//! let mut engine = Engine::new(config)?;
//!
//! engine.process_line("09300000A000000001B000100AAPL  0000012500Y", 0)?;
//! engine.process_line("09300100E000000001000040M00000007", 1)?;
//!
//! let recorder = engine.finish();
//! let rows = recorder.rows("AAPL");
//! assert_eq!(rows.len(), 2);
//! assert_eq!(rows[1].book.bid_volumes[0], 60);
//! # Ok::<(), itch_depth_reconstructor::ReplayError>(())
//! ```

use std::path::Path;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::decoder::{DecoderStats, MessageDecoder};
use crate::error::{ReplayError, Result};
use crate::lob::{InstrumentBooks, ReferenceIndex};
use crate::recorder::{SnapshotRecorder, SnapshotRow};
use crate::source::{LineSource, SourceMetadata};
use crate::types::{Message, MAX_LEVELS};

/// Longest instrument token the feed can carry.
pub const MAX_INSTRUMENT_LEN: usize = 6;

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for one replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Snapshot depth per side.
    ///
    /// Default: 10
    pub levels: usize,

    /// Instrument tokens to maintain books for. Everything else is decoded
    /// and dropped.
    pub tracked_instruments: Vec<String>,

    /// Log crossed/locked books.
    ///
    /// Default: true
    pub log_warnings: bool,

    /// Log progress every this many lines. `None` disables it.
    #[serde(default)]
    pub progress_every: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            levels: 10,
            tracked_instruments: Vec::new(),
            log_warnings: true,
            progress_every: None,
        }
    }
}

impl EngineConfig {
    /// Default configuration with `levels` snapshot depth.
    pub fn new(levels: usize) -> Self {
        Self {
            levels,
            ..Self::default()
        }
    }

    /// Track these instruments, in addition to any already tracked.
    pub fn with_instruments<I, S>(mut self, instruments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tracked_instruments
            .extend(instruments.into_iter().map(Into::into));
        self
    }

    pub fn with_logging(mut self, log: bool) -> Self {
        self.log_warnings = log;
        self
    }

    pub fn with_progress(mut self, every: u64) -> Self {
        self.progress_every = (every > 0).then_some(every);
        self
    }

    /// Check depth, progress interval and instrument tokens.
    pub fn validate(&self) -> Result<()> {
        if self.levels == 0 || self.levels > MAX_LEVELS {
            return Err(ReplayError::config(format!(
                "levels must be between 1 and {MAX_LEVELS}, got {}",
                self.levels
            )));
        }
        if self.progress_every == Some(0) {
            return Err(ReplayError::config("progress_every must be positive"));
        }
        if self.tracked_instruments.is_empty() {
            return Err(ReplayError::config("no tracked instruments"));
        }
        for token in &self.tracked_instruments {
            let trimmed = token.trim();
            if trimmed.is_empty() {
                return Err(ReplayError::config("empty instrument token"));
            }
            if trimmed.len() > MAX_INSTRUMENT_LEN {
                return Err(ReplayError::config(format!(
                    "instrument {trimmed:?} exceeds {MAX_INSTRUMENT_LEN} characters"
                )));
            }
        }
        Ok(())
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json).map_err(|e| {
            ReplayError::Io(format!("Failed to write {}: {e}", path.as_ref().display()))
        })
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ReplayError::Io(format!("Failed to read {}: {e}", path.as_ref().display()))
        })?;
        Ok(serde_json::from_str(&json)?)
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// Per-stream counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    /// Lines handed to the engine, blank ones included
    pub lines: u64,
    pub blank_lines: u64,
    pub adds: u64,
    pub executes: u64,
    pub cancels: u64,
    /// Messages of an unrecognized type
    pub unknown: u64,
    /// Adds for instruments outside the tracked set
    pub untracked_adds: u64,
    /// Executes/Cancels whose reference was never indexed
    pub unresolved_refs: u64,
    /// Rows recorded
    pub snapshots: u64,
}

/// What one line did to the engine state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    Blank,
    Unknown,
    /// Add for an instrument outside the tracked set
    Untracked,
    /// Execute/Cancel whose reference was never indexed
    Unresolved,
    /// A row was recorded for this instrument
    Recorded(String),
}

// ============================================================================
// Engine
// ============================================================================

/// Replays one stream into per-instrument snapshot rows.
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    decoder: MessageDecoder,
    index: ReferenceIndex,
    books: InstrumentBooks,
    recorder: SnapshotRecorder,
    stats: EngineStats,
    fault: Option<ReplayError>,
}

impl Engine {
    /// Create an engine for one stream.
    ///
    /// # Errors
    /// [`ReplayError::Config`] if the configuration does not validate.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;

        let books = InstrumentBooks::new(&config.tracked_instruments)
            .with_logging(config.log_warnings);
        let recorder = SnapshotRecorder::new(config.levels);

        Ok(Self {
            decoder: MessageDecoder::new(),
            index: ReferenceIndex::new(),
            books,
            recorder,
            stats: EngineStats::default(),
            fault: None,
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Process one raw line at position `line_no` of the stream.
    ///
    /// # Errors
    /// The stream's fault. Once a fault is returned the engine is halted and
    /// keeps returning it.
    pub fn process_line(&mut self, raw: &str, line_no: u64) -> Result<LineOutcome> {
        if let Some(fault) = &self.fault {
            return Err(fault.clone());
        }

        let result = self.apply_line(raw, line_no);
        if let Err(err) = &result {
            log::debug!("stream halted at line {line_no}: {err}");
            self.fault = Some(err.clone());
        }
        result
    }

    fn apply_line(&mut self, raw: &str, line_no: u64) -> Result<LineOutcome> {
        self.stats.lines += 1;

        let Some(message) = self.decoder.decode(raw, line_no)? else {
            self.stats.blank_lines += 1;
            return Ok(LineOutcome::Blank);
        };

        match message {
            Message::Unknown { .. } => {
                self.stats.unknown += 1;
                Ok(LineOutcome::Unknown)
            }
            Message::Add(add) => {
                self.stats.adds += 1;
                let levels = self.config.levels;
                let Some(book) = self.books.book_mut(&add.instrument) else {
                    self.stats.untracked_adds += 1;
                    return Ok(LineOutcome::Untracked);
                };

                book.apply_add(&add);
                let snapshot = book.snapshot(levels);
                let instrument = add.instrument.clone();

                self.index.insert(add.clone());
                self.record(&instrument, SnapshotRow::new(snapshot, Message::Add(add), None));
                Ok(LineOutcome::Recorded(instrument))
            }
            Message::Execute(exec) => {
                self.stats.executes += 1;
                let (ref_no, volume) = (exec.ref_no.clone(), exec.volume);
                self.reduce(raw, line_no, &ref_no, volume, Message::Execute(exec))
            }
            Message::Cancel(cancel) => {
                self.stats.cancels += 1;
                let (ref_no, volume) = (cancel.ref_no.clone(), cancel.volume);
                self.reduce(raw, line_no, &ref_no, volume, Message::Cancel(cancel))
            }
        }
    }

    /// Apply an Execute/Cancel of `volume` against the order `ref_no`.
    fn reduce(
        &mut self,
        raw: &str,
        line_no: u64,
        ref_no: &str,
        volume: u32,
        event: Message,
    ) -> Result<LineOutcome> {
        let Some(origin) = self.index.lookup(ref_no) else {
            self.stats.unresolved_refs += 1;
            return Ok(LineOutcome::Unresolved);
        };
        let origin = origin.clone();

        // Only tracked Adds are indexed, so the book exists.
        let Some(book) = self.books.book_mut(&origin.instrument) else {
            self.stats.unresolved_refs += 1;
            return Ok(LineOutcome::Unresolved);
        };

        book.apply_reduction(&origin, volume)
            .map_err(|underflow| underflow.at_line(raw, line_no))?;
        let snapshot = book.snapshot(self.config.levels);

        let instrument = origin.instrument.clone();
        self.record(&instrument, SnapshotRow::new(snapshot, event, Some(origin)));
        Ok(LineOutcome::Recorded(instrument))
    }

    fn record(&mut self, instrument: &str, row: SnapshotRow) {
        self.recorder.append(instrument, row);
        self.stats.snapshots += 1;
    }

    /// Drive `source` to completion or to its first fault.
    ///
    /// Lines are numbered from 0 in source order, blank lines included.
    /// Returns the number of lines processed.
    pub fn run<S: LineSource>(&mut self, source: S) -> Result<u64> {
        let label = source.metadata().label().to_string();
        log::info!("replaying stream {label}");

        let mut processed = 0u64;
        for (line_no, line) in source.lines()?.enumerate() {
            let line = line?;
            self.process_line(&line, line_no as u64)?;
            processed += 1;

            if let Some(every) = self.config.progress_every {
                if processed % every == 0 {
                    log::info!(
                        "{label}: {processed} lines, {} rows",
                        self.stats.snapshots
                    );
                }
            }
        }

        log::info!(
            "stream {label} done: {} lines, {} adds, {} executes, {} cancels, {} rows ({} unresolved refs)",
            self.stats.lines,
            self.stats.adds,
            self.stats.executes,
            self.stats.cancels,
            self.stats.snapshots,
            self.stats.unresolved_refs,
        );
        Ok(processed)
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    pub fn decoder_stats(&self) -> &DecoderStats {
        self.decoder.stats()
    }

    pub fn books(&self) -> &InstrumentBooks {
        &self.books
    }

    pub fn reference_index(&self) -> &ReferenceIndex {
        &self.index
    }

    pub fn recorder(&self) -> &SnapshotRecorder {
        &self.recorder
    }

    /// The fault that halted this stream, if any.
    pub fn fault(&self) -> Option<&ReplayError> {
        self.fault.as_ref()
    }

    pub fn is_halted(&self) -> bool {
        self.fault.is_some()
    }

    /// Consume the engine and hand over its rows.
    pub fn finish(self) -> SnapshotRecorder {
        self.recorder
    }
}

// ============================================================================
// Multi-stream replay
// ============================================================================

/// Result of replaying one stream.
#[derive(Debug)]
pub struct StreamReport {
    pub metadata: SourceMetadata,
    pub stats: EngineStats,
    /// Rows recorded, including those before a fault
    pub recorder: SnapshotRecorder,
    /// Fault that halted the stream, or the error that kept it from starting
    pub fault: Option<ReplayError>,
}

impl StreamReport {
    pub fn is_ok(&self) -> bool {
        self.fault.is_none()
    }
}

/// Replay independent streams in parallel, one engine per stream.
///
/// Reports come back in input order. A fault in one stream does not affect
/// the others.
///
/// # Errors
/// [`ReplayError::Config`] if `config` does not validate.
pub fn replay_streams<S>(config: &EngineConfig, sources: Vec<S>) -> Result<Vec<StreamReport>>
where
    S: LineSource + Send,
{
    config.validate()?;

    let reports = sources
        .into_par_iter()
        .map(|source| replay_one(config, source))
        .collect();
    Ok(reports)
}

fn replay_one<S: LineSource>(config: &EngineConfig, source: S) -> StreamReport {
    let metadata = source.metadata().clone();
    let mut engine = match Engine::new(config.clone()) {
        Ok(engine) => engine,
        Err(err) => {
            return StreamReport {
                metadata,
                stats: EngineStats::default(),
                recorder: SnapshotRecorder::new(config.levels),
                fault: Some(err),
            }
        }
    };

    let fault = engine.run(source).err();
    if let Some(err) = &fault {
        log::warn!("stream {} halted: {err}", metadata.label());
    }

    StreamReport {
        metadata,
        stats: engine.stats().clone(),
        recorder: engine.finish(),
        fault,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::VecSource;
    use crate::types::{Price, Side};

    const ADD_R1: &str = "09300000A000000001B000100AAPL  0000012500Y";
    const ADD_R2: &str = "09300001A000000002B000050AAPL  0000012500Y";
    const CANCEL_R1: &str = "09300200X000000001000100";
    const CANCEL_R2: &str = "09300201X000000002000050";

    fn engine() -> Engine {
        Engine::new(EngineConfig::new(3).with_instruments(["AAPL"]).with_logging(false)).unwrap()
    }

    #[test]
    fn test_config_default() {
        let config = EngineConfig::default();
        assert_eq!(config.levels, 10);
        assert!(config.tracked_instruments.is_empty());
        assert!(config.log_warnings);
        assert!(config.progress_every.is_none());
    }

    #[test]
    fn test_config_validate() {
        assert!(EngineConfig::new(10).validate().is_err());
        assert!(EngineConfig::new(0).with_instruments(["AAPL"]).validate().is_err());
        assert!(EngineConfig::new(MAX_LEVELS + 1)
            .with_instruments(["AAPL"])
            .validate()
            .is_err());
        assert!(EngineConfig::new(5).with_instruments(["  "]).validate().is_err());
        assert!(EngineConfig::new(5).with_instruments(["TOOLONG"]).validate().is_err());
        assert!(EngineConfig::new(MAX_LEVELS)
            .with_instruments(["AAPL", " MSFT "])
            .validate()
            .is_ok());
    }

    #[test]
    fn test_config_json_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        let config = EngineConfig::new(5)
            .with_instruments(["AAPL", "MSFT"])
            .with_progress(1000);
        config.save_json(&path).unwrap();
        assert_eq!(EngineConfig::load_json(&path).unwrap(), config);
    }

    #[test]
    fn test_zero_progress_interval_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        std::fs::write(
            &path,
            r#"{"levels":5,"tracked_instruments":["AAPL"],"log_warnings":false,"progress_every":0}"#,
        )
        .unwrap();

        let config = EngineConfig::load_json(&path).unwrap();
        assert_eq!(config.progress_every, Some(0));
        assert!(matches!(config.validate(), Err(ReplayError::Config(_))));
        assert!(Engine::new(config).is_err());

        // The builder maps 0 to disabled
        assert!(EngineConfig::new(5).with_progress(0).progress_every.is_none());
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let err = Engine::new(EngineConfig::new(0).with_instruments(["AAPL"])).unwrap_err();
        assert!(matches!(err, ReplayError::Config(_)));
    }

    #[test]
    fn test_aggregate_then_cancel_sequence() {
        let mut engine = engine();
        engine.process_line(ADD_R1, 0).unwrap();
        engine.process_line(ADD_R2, 1).unwrap();
        engine.process_line(CANCEL_R1, 2).unwrap();
        engine.process_line(CANCEL_R2, 3).unwrap();

        let rows = engine.recorder().rows("AAPL");
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[1].book.bid_prices[0], Price::from_ticks(12_500));
        assert_eq!(rows[1].book.bid_volumes[0], 150);
        assert_eq!(rows[2].book.bid_volumes[0], 50);
        assert_eq!(rows[3].book.bid_volumes[0], 0);
        assert_eq!(rows[3].book.bid_prices[0], Price::ZERO);

        assert!(rows[0].reference.is_none());
        assert_eq!(rows[2].reference.as_ref().unwrap().ref_no, "000000001");
        assert_eq!(rows[3].reference.as_ref().unwrap().side, Side::Buy);
        assert!(engine.books().get("AAPL").unwrap().is_empty());
    }

    #[test]
    fn test_unresolved_reference_is_inert() {
        let mut engine = engine();
        engine.process_line(ADD_R1, 0).unwrap();
        let outcome = engine
            .process_line("09300100E000000099000040M00000007", 1)
            .unwrap();
        assert_eq!(outcome, LineOutcome::Unresolved);
        assert_eq!(engine.recorder().total_rows(), 1);
        assert_eq!(engine.stats().unresolved_refs, 1);
        assert_eq!(engine.reference_index().len(), 1);
    }

    #[test]
    fn test_untracked_add_is_not_indexed() {
        let mut engine = engine();
        let outcome = engine
            .process_line("09300000A000000005S000100MSFT  0000030000Y", 0)
            .unwrap();
        assert_eq!(outcome, LineOutcome::Untracked);
        assert!(engine.reference_index().is_empty());

        // Its cancel cannot resolve
        let outcome = engine.process_line("09300200X000000005000100", 1).unwrap();
        assert_eq!(outcome, LineOutcome::Unresolved);
        assert!(engine.recorder().is_empty());
    }

    #[test]
    fn test_blank_and_unknown_lines() {
        let mut engine = engine();
        assert_eq!(engine.process_line("   \r\n", 0).unwrap(), LineOutcome::Blank);
        assert_eq!(
            engine.process_line("09300000S000000001", 1).unwrap(),
            LineOutcome::Unknown
        );
        assert!(engine.recorder().is_empty());
        assert_eq!(engine.stats().lines, 2);
        assert_eq!(engine.stats().blank_lines, 1);
        assert_eq!(engine.stats().unknown, 1);
    }

    #[test]
    fn test_decode_fault_halts_stream() {
        let mut engine = engine();
        engine.process_line(ADD_R1, 0).unwrap();
        let err = engine.process_line("09300200X00000000100010", 1).unwrap_err();
        assert!(matches!(err, ReplayError::Decode(_)));
        assert_eq!(err.line_no(), Some(1));

        // Halted: even valid lines return the fault
        let again = engine.process_line(CANCEL_R1, 2).unwrap_err();
        assert_eq!(again.line_no(), Some(1));
        assert!(engine.is_halted());
        assert_eq!(engine.recorder().total_rows(), 1);
    }

    #[test]
    fn test_underflow_is_book_integrity_fault() {
        let mut engine = engine();
        engine.process_line(ADD_R1, 0).unwrap();
        let err = engine
            .process_line("09300200X000000001000101", 7)
            .unwrap_err();
        match err {
            ReplayError::BookIntegrity(fault) => {
                assert_eq!(fault.line_no, 7);
                assert_eq!(fault.line, "09300200X000000001000101");
            }
            other => panic!("expected book integrity fault, got {other}"),
        }

        // Book untouched by the failed reduction
        let book = engine.books().get("AAPL").unwrap();
        assert_eq!(book.side(Side::Buy).volume_at(Price::from_ticks(12_500)), 100);
    }

    #[test]
    fn test_faults_keep_line_as_received() {
        let mut engine = engine();
        engine.process_line(ADD_R1, 0).unwrap();
        let err = engine
            .process_line("09300200X000000001000101  \r", 1)
            .unwrap_err();
        let ReplayError::BookIntegrity(fault) = err else {
            panic!("expected book integrity fault");
        };
        assert_eq!(fault.line, "09300200X000000001000101  \r");

        let mut engine = Engine::new(
            EngineConfig::new(3).with_instruments(["AAPL"]).with_logging(false),
        )
        .unwrap();
        let err = engine.process_line("09300200X00000000100010 \r", 4).unwrap_err();
        let ReplayError::Decode(fault) = err else {
            panic!("expected decode fault");
        };
        assert_eq!(fault.line, "09300200X00000000100010 \r");
        assert_eq!(fault.line_no, 4);
    }

    #[test]
    fn test_run_numbers_lines_from_zero() {
        let mut engine = engine();
        let source = VecSource::from_lines([ADD_R1, "", "09300200X0000000010001"]);
        let err = engine.run(source).unwrap_err();
        assert_eq!(err.line_no(), Some(2));
        assert_eq!(engine.stats().lines, 3);
    }

    #[test]
    fn test_replay_streams_isolated() {
        let config = EngineConfig::new(2).with_instruments(["AAPL"]).with_logging(false);
        let good = VecSource::from_lines([ADD_R1, CANCEL_R1]);
        let bad = VecSource::from_lines([ADD_R2, "09300200X0000000020000"]);
        let other = VecSource::from_lines([ADD_R2]);

        let reports = replay_streams(&config, vec![good, bad, other]).unwrap();
        assert_eq!(reports.len(), 3);
        assert!(reports[0].is_ok());
        assert_eq!(reports[0].recorder.total_rows(), 2);
        assert!(!reports[1].is_ok());
        assert_eq!(reports[1].recorder.total_rows(), 1);
        assert!(reports[2].is_ok());
        assert_eq!(reports[2].recorder.rows("AAPL")[0].book.bid_volumes[0], 50);
    }
}

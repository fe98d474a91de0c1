//! Fixed-width record decoder.
//!
//! Each feed line is one ASCII record. Byte 8 selects the layout:
//!
//! | Type | Len | Fields (0-indexed, end-exclusive) |
//! |------|-----|-----------------------------------|
//! | `A` Add | 42 | time `[0,8)` type `[8,9)` ref `[9,18)` side `[18,19)` volume `[19,25)` instrument `[25,31)` price `[31,41)` display `[41,42)` |
//! | `E` Execute | 33 | time, type, ref, volume `[18,24)` match `[24,33)` |
//! | `X` Cancel | 24 | time, type, ref, volume `[18,24)` |
//!
//! Any other discriminator decodes to [`Message::Unknown`] without looking at
//! the rest of the record.

use crate::error::DecodeFault;
use crate::types::{AddOrder, Message, MessageType, OrderCancel, OrderExecuted, Price, Side};

const TIME: (usize, usize) = (0, 8);
const TYPE_OFFSET: usize = 8;
const REF_NO: (usize, usize) = (9, 18);

const ADD_SIDE: usize = 18;
const ADD_VOLUME: (usize, usize) = (19, 25);
const ADD_INSTRUMENT: (usize, usize) = (25, 31);
const ADD_PRICE: (usize, usize) = (31, 41);
const ADD_DISPLAY: usize = 41;

const EXEC_VOLUME: (usize, usize) = (18, 24);
const EXEC_MATCH_NO: (usize, usize) = (24, 33);

const CANCEL_VOLUME: (usize, usize) = (18, 24);

/// Counters kept while decoding a stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecoderStats {
    /// Lines handed to the decoder, including empty ones
    pub lines_seen: u64,
    pub empty_lines: u64,
    pub adds: u64,
    pub executes: u64,
    pub cancels: u64,
    pub unknown: u64,
    pub faults: u64,
}

/// Stateful wrapper over [`decode_line`] that keeps [`DecoderStats`].
#[derive(Debug, Clone, Default)]
pub struct MessageDecoder {
    stats: DecoderStats,
}

impl MessageDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one raw line. `Ok(None)` for blank lines.
    pub fn decode(&mut self, raw: &str, line_no: u64) -> Result<Option<Message>, DecodeFault> {
        self.stats.lines_seen += 1;

        let result = decode_line(raw, line_no);
        match &result {
            Ok(None) => self.stats.empty_lines += 1,
            Ok(Some(msg)) => match msg.message_type() {
                MessageType::Add => self.stats.adds += 1,
                MessageType::Execute => self.stats.executes += 1,
                MessageType::Cancel => self.stats.cancels += 1,
                MessageType::Unknown => self.stats.unknown += 1,
            },
            Err(_) => self.stats.faults += 1,
        }
        result
    }

    pub fn stats(&self) -> &DecoderStats {
        &self.stats
    }
}

/// Decode one raw line into a [`Message`].
///
/// Trailing whitespace (including `\r\n`) is removed first; leading
/// whitespace is significant because offsets are absolute.
///
/// # Errors
/// A [`DecodeFault`] carrying the line as received when a recognized record has
/// the wrong length, is not ASCII, or holds an unparsable numeric field, or
/// when a non-empty line is too short to carry a discriminator.
pub fn decode_line(raw: &str, line_no: u64) -> Result<Option<Message>, DecodeFault> {
    let line = raw.trim_end();
    if line.is_empty() {
        return Ok(None);
    }

    let bytes = line.as_bytes();
    if bytes.len() <= TYPE_OFFSET {
        return Err(DecodeFault::new(
            raw,
            line_no,
            format!(
                "record of length {} has no type byte at offset {TYPE_OFFSET}",
                bytes.len()
            ),
        ));
    }

    let discriminator = bytes[TYPE_OFFSET];
    let message_type = MessageType::from_byte(discriminator);
    let Some(expected_len) = message_type.record_len() else {
        return Ok(Some(Message::Unknown {
            code: discriminator as char,
        }));
    };

    if bytes.len() != expected_len {
        return Err(DecodeFault::new(
            raw,
            line_no,
            format!(
                "type {} record must be {expected_len} bytes, got {}",
                discriminator as char,
                bytes.len()
            ),
        ));
    }
    if !line.is_ascii() {
        return Err(DecodeFault::new(raw, line_no, "record is not ASCII"));
    }

    let decoded = match message_type {
        MessageType::Add => decode_add(line).map(Message::Add),
        MessageType::Execute => decode_execute(line).map(Message::Execute),
        MessageType::Cancel => decode_cancel(line).map(Message::Cancel),
        MessageType::Unknown => Ok(Message::Unknown {
            code: discriminator as char,
        }),
    };

    decoded
        .map(Some)
        .map_err(|reason| DecodeFault::new(raw, line_no, reason))
}

fn decode_add(line: &str) -> Result<AddOrder, String> {
    let bytes = line.as_bytes();
    Ok(AddOrder {
        time: slice(line, TIME).to_string(),
        ref_no: slice(line, REF_NO).to_string(),
        side: Side::from_indicator(bytes[ADD_SIDE]),
        volume: parse_u32(line, ADD_VOLUME, "volume")?,
        instrument: slice(line, ADD_INSTRUMENT).trim().to_string(),
        price: parse_price(line, ADD_PRICE)?,
        display: bytes[ADD_DISPLAY] as char,
    })
}

fn decode_execute(line: &str) -> Result<OrderExecuted, String> {
    Ok(OrderExecuted {
        time: slice(line, TIME).to_string(),
        ref_no: slice(line, REF_NO).to_string(),
        volume: parse_u32(line, EXEC_VOLUME, "volume")?,
        match_no: slice(line, EXEC_MATCH_NO).trim().to_string(),
    })
}

fn decode_cancel(line: &str) -> Result<OrderCancel, String> {
    Ok(OrderCancel {
        time: slice(line, TIME).to_string(),
        ref_no: slice(line, REF_NO).to_string(),
        volume: parse_u32(line, CANCEL_VOLUME, "volume")?,
    })
}

/// Callers have checked length and ASCII-ness, so byte ranges are char
/// boundaries.
#[inline]
fn slice(line: &str, (start, end): (usize, usize)) -> &str {
    &line[start..end]
}

/// Trimmed digits of a numeric field. Signs and other bytes are rejected.
fn digits<'a>(line: &'a str, range: (usize, usize), name: &str) -> Result<&'a str, String> {
    let text = slice(line, range).trim();
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!(
            "{name} field {text:?} at [{},{}) is not an unsigned integer",
            range.0, range.1
        ));
    }
    Ok(text)
}

fn parse_u32(line: &str, range: (usize, usize), name: &str) -> Result<u32, String> {
    let text = digits(line, range, name)?;
    text.parse::<u32>()
        .map_err(|e| format!("{name} field {text:?} at [{},{}): {e}", range.0, range.1))
}

fn parse_price(line: &str, range: (usize, usize)) -> Result<Price, String> {
    let text = digits(line, range, "price")?;
    let ticks = text
        .parse::<i64>()
        .map_err(|e| format!("price field {text:?} at [{},{}): {e}", range.0, range.1))?;
    Ok(Price::from_ticks(ticks))
}

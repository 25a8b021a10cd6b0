//! A line-oriented text format for captured bus events.
//!
//! ``` text
//! # chip-select asserted 100 µs into the capture
//! enable  0.000100
//! # <start> <end> <value>
//! mosi    0.000101 0.000102 FF
//! miso    0.000101 0.000102 FF
//! disable 0.000250
//! ```
//!
//! Times are in seconds from the start of the capture. Bytes are
//! hexadecimal, optionally prefixed with `0x`. Everything after a `#` is
//! ignored.

use std::io::BufRead;
use std::time::Duration;

use crate::window::{BusEvent, ByteEvent, Direction};

/// Set of errors that can occur while reading a trace.
#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    #[error("Failed to read trace: {0}")]
    Io(#[from] std::io::Error),

    #[error("Line {line}: unknown event `{keyword}`")]
    UnknownEvent { line: usize, keyword: String },

    #[error("Line {line}: missing {field}")]
    MissingField { line: usize, field: &'static str },

    #[error("Line {line}: `{value}` is not a valid time")]
    InvalidTime { line: usize, value: String },

    #[error("Line {line}: `{value}` is not a valid byte")]
    InvalidByte { line: usize, value: String },
}

/// Reads [`BusEvent`]s from a text trace.
pub struct TraceReader<R> {
    reader: R,
    line: usize,
    buffer: String,
}

impl<R> TraceReader<R>
where
    R: BufRead,
{
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: 0,
            buffer: String::new(),
        }
    }

    /// Returns a reference to the underlying reader.
    pub fn get_ref(&self) -> &R {
        &self.reader
    }

    /// Reads the next event. `None` at the end of the trace.
    pub fn read_event(&mut self) -> Result<Option<BusEvent>, TraceError> {
        loop {
            self.buffer.clear();
            if self.reader.read_line(&mut self.buffer)? == 0 {
                return Ok(None);
            }
            self.line += 1;

            let content = self.buffer.split('#').next().unwrap_or_default().trim();
            if !content.is_empty() {
                return parse_line(self.line, content).map(Some);
            }
        }
    }
}

impl<R> Iterator for TraceReader<R>
where
    R: BufRead,
{
    type Item = Result<BusEvent, TraceError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_event().transpose()
    }
}

fn parse_line(line: usize, content: &str) -> Result<BusEvent, TraceError> {
    let mut fields = content.split_whitespace();
    let keyword = fields.next().unwrap_or_default();
    let mut next = |field| fields.next().ok_or(TraceError::MissingField { line, field });

    match keyword {
        "enable" => Ok(BusEvent::Enable {
            at: parse_time(line, next("time")?)?,
        }),
        "disable" => Ok(BusEvent::Disable {
            at: parse_time(line, next("time")?)?,
        }),
        "mosi" | "miso" => {
            let start = parse_time(line, next("start time")?)?;
            let end = parse_time(line, next("end time")?)?;
            let value = parse_byte(line, next("byte value")?)?;

            Ok(BusEvent::Byte(ByteEvent {
                value,
                direction: if keyword == "mosi" {
                    Direction::Outbound
                } else {
                    Direction::Inbound
                },
                start,
                end,
            }))
        }
        _ => Err(TraceError::UnknownEvent {
            line,
            keyword: keyword.to_owned(),
        }),
    }
}

fn parse_time(line: usize, value: &str) -> Result<Duration, TraceError> {
    let invalid = || TraceError::InvalidTime {
        line,
        value: value.to_owned(),
    };
    let is_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());

    let (secs, frac) = value.split_once('.').unwrap_or((value, ""));
    if (secs.is_empty() && frac.is_empty()) || !is_digits(secs) || !is_digits(frac) {
        return Err(invalid());
    }

    let secs: u64 = if secs.is_empty() {
        0
    } else {
        secs.parse().map_err(|_| invalid())?
    };
    // sub-nanosecond digits are dropped
    let frac = &frac[..frac.len().min(9)];
    let nanos: u32 = format!("{:0<9}", frac).parse().map_err(|_| invalid())?;

    Ok(Duration::new(secs, nanos))
}

fn parse_byte(line: usize, value: &str) -> Result<u8, TraceError> {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);

    u8::from_str_radix(digits, 16).map_err(|_| TraceError::InvalidByte {
        line,
        value: value.to_owned(),
    })
}

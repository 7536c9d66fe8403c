//! Line-oriented text encoding of a phone bill.
//!
//! ```text
//! CUSTOMER:
//! <customer name>
//! PHONE CALL:
//! <caller>
//! <callee>
//! <start>
//! <end>
//! ...
//! ```
//!
//! Field text is written exactly as stored, so `parse(dump(bill))` reproduces
//! every raw field.

use std::{
    fs::File,
    io::{BufRead, BufReader, BufWriter, Write},
    path::Path,
};

use thiserror::Error;
use tracing::debug;

use crate::{
    bill::{check_customer_name, PhoneBill},
    call::PhoneCall,
    types::{PhoneNumber, Timestamp, ValidationError},
};

/// Marker line that opens a file.
pub const CUSTOMER_MARKER: &str = "CUSTOMER:";
/// Marker line that opens each call record.
pub const CALL_MARKER: &str = "PHONE CALL:";

/// Encoding and decoding failures. Line numbers are 1-based.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Structural markers are missing or out of place.
    #[error("malformed phone bill file at line {line}: {reason}")]
    Malformed {
        /// Offending line.
        line: usize,
        /// What was wrong.
        reason: String,
    },
    /// A field inside a call record failed validation.
    #[error("malformed phone bill file at line {line}: {source}")]
    InvalidField {
        /// Offending line.
        line: usize,
        /// Underlying validation failure.
        #[source]
        source: ValidationError,
    },
    /// A call record does not start with its marker, or is cut short.
    #[error("corrupt phone call record at line {line}: {reason}")]
    CorruptRecord {
        /// Offending line.
        line: usize,
        /// What was wrong.
        reason: String,
    },
    /// The bill has no customer name to write.
    #[error("cannot encode a phone bill without a customer name")]
    UnnamedBill,
    /// The customer name spans more than one line.
    #[error("cannot encode customer name {0:?}: it contains a line break")]
    InvalidCustomer(String),
    /// Underlying stream failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl CodecError {
    /// True for every kind that indicates a malformed file, including
    /// field-level validation failures.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed { .. } | Self::InvalidField { .. })
    }
}

/// Writes `bill` to `out` in its current call order.
pub fn dump<W: Write>(bill: &PhoneBill, mut out: W) -> Result<(), CodecError> {
    let customer = bill.customer().ok_or(CodecError::UnnamedBill)?;
    check_customer_name(customer).map_err(|_| CodecError::InvalidCustomer(customer.to_string()))?;
    writeln!(out, "{CUSTOMER_MARKER}")?;
    writeln!(out, "{customer}")?;
    for call in bill.calls() {
        writeln!(out, "{CALL_MARKER}")?;
        writeln!(out, "{}", call.caller())?;
        writeln!(out, "{}", call.callee())?;
        writeln!(out, "{}", call.start())?;
        writeln!(out, "{}", call.end())?;
    }
    out.flush()?;
    Ok(())
}

/// Reads a whole bill from `input`. Any failure aborts the parse; no partial
/// bill is returned.
pub fn parse<R: BufRead>(input: R) -> Result<PhoneBill, CodecError> {
    let mut lines = Lines::new(input);

    match lines.next()? {
        Some(first) if first == CUSTOMER_MARKER => {}
        Some(other) => {
            return Err(CodecError::Malformed {
                line: lines.number,
                reason: format!("expected {CUSTOMER_MARKER:?}, found {other:?}"),
            });
        }
        None => {
            return Err(CodecError::Malformed {
                line: 1,
                reason: "file is empty".to_string(),
            });
        }
    }

    let customer = lines.next()?.ok_or_else(|| CodecError::Malformed {
        line: lines.number + 1,
        reason: "missing customer name".to_string(),
    })?;
    let mut bill = PhoneBill::new(customer);

    while let Some(marker) = lines.next()? {
        if marker != CALL_MARKER {
            return Err(CodecError::CorruptRecord {
                line: lines.number,
                reason: format!("expected {CALL_MARKER:?}, found {marker:?}"),
            });
        }
        bill.add_call(parse_record(&mut lines)?);
    }

    debug!(customer = bill.customer(), calls = bill.len(), "parsed phone bill");
    Ok(bill)
}

/// Writes `bill` to `path`, replacing any existing content.
pub fn dump_file(path: impl AsRef<Path>, bill: &PhoneBill) -> Result<(), CodecError> {
    let path = path.as_ref();
    let file = File::create(path)?;
    dump(bill, BufWriter::new(file))?;
    debug!(path = %path.display(), calls = bill.len(), "dumped phone bill");
    Ok(())
}

/// Reads a bill from the file at `path`.
pub fn parse_file(path: impl AsRef<Path>) -> Result<PhoneBill, CodecError> {
    parse(BufReader::new(File::open(path)?))
}

/// Customer named by an existing file, or `None` when the file does not exist
/// or does not open with the customer marker.
pub fn customer_on_record(path: impl AsRef<Path>) -> Result<Option<String>, CodecError> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(None);
    }
    let mut lines = Lines::new(BufReader::new(File::open(path)?));
    if lines.next()?.as_deref() != Some(CUSTOMER_MARKER) {
        return Ok(None);
    }
    lines.next()
}

fn parse_record<R: BufRead>(lines: &mut Lines<R>) -> Result<PhoneCall, CodecError> {
    let caller = record_field(lines, "caller", PhoneNumber::parse)?;
    let callee = record_field(lines, "callee", PhoneNumber::parse)?;
    let start = record_field(lines, "start time", Timestamp::parse)?;
    let end = record_field(lines, "end time", Timestamp::parse)?;
    Ok(PhoneCall::from_parts(caller, callee, start, end))
}

fn record_field<R, T>(
    lines: &mut Lines<R>,
    name: &str,
    validate: impl FnOnce(&str) -> Result<T, ValidationError>,
) -> Result<T, CodecError>
where
    R: BufRead,
{
    let text = match lines.next()? {
        Some(text) if text != CALL_MARKER => text,
        Some(_) => {
            return Err(CodecError::CorruptRecord {
                line: lines.number,
                reason: format!("record ends before its {name}"),
            });
        }
        None => {
            return Err(CodecError::CorruptRecord {
                line: lines.number + 1,
                reason: format!("unexpected end of file, missing {name}"),
            });
        }
    };
    validate(&text).map_err(|source| CodecError::InvalidField {
        line: lines.number,
        source,
    })
}

/// Line reader that remembers the number of the last line returned.
struct Lines<R> {
    inner: std::io::Lines<R>,
    number: usize,
}

impl<R: BufRead> Lines<R> {
    fn new(input: R) -> Self {
        Self {
            inner: input.lines(),
            number: 0,
        }
    }

    fn next(&mut self) -> Result<Option<String>, CodecError> {
        match self.inner.next() {
            Some(line) => {
                self.number += 1;
                Ok(Some(line?))
            }
            None => Ok(None),
        }
    }
}

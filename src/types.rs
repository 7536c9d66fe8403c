//! Validated phone-number and timestamp values.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Monotonic journal sequence number.
pub type OpSeq = u64;

static PHONE_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{3}-[0-9]{3}-[0-9]{4}$").expect("valid phone number regex"));

static TIMESTAMP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([0-9]{1,2})/([0-9]{1,2})/([0-9]{4}) ([0-9]{1,2}):([0-9]{2}) ([AaPp][Mm])$")
        .expect("valid timestamp regex")
});

/// Field-level validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Text is not of the form `NNN-NNN-NNNN`.
    #[error("invalid phone number format: {0:?}")]
    InvalidPhoneNumber(String),
    /// Text is not a valid `MM/DD/YYYY HH:MM AM|PM` date and time.
    #[error("invalid timestamp format: {0:?}")]
    InvalidTimestamp(String),
    /// A single-line call description does not have the expected shape.
    #[error("malformed phone call {text:?}: expected {expected} fields, found {found}")]
    MalformedCall {
        /// The offending text.
        text: String,
        /// Number of whitespace-separated fields required.
        expected: usize,
        /// Number of fields present.
        found: usize,
    },
}

/// A phone number in `NNN-NNN-NNNN` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PhoneNumber {
    raw: String,
    value: u64,
}

impl PhoneNumber {
    /// Validates `raw` and keeps it verbatim.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        if !PHONE_NUMBER.is_match(raw) {
            return Err(ValidationError::InvalidPhoneNumber(raw.to_string()));
        }
        // The regex admits exactly ten ASCII digits, which always fit in a u64.
        let value = raw
            .bytes()
            .filter(u8::is_ascii_digit)
            .fold(0u64, |acc, b| acc * 10 + u64::from(b - b'0'));
        Ok(Self {
            raw: raw.to_string(),
            value,
        })
    }

    /// The text as supplied.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The ten digits read as one integer, dashes stripped.
    pub fn numeric_value(&self) -> u64 {
        self.value
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl TryFrom<String> for PhoneNumber {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PhoneNumber> for String {
    fn from(value: PhoneNumber) -> Self {
        value.raw
    }
}

/// A minute-resolution date and time with an AM/PM designator.
///
/// The raw text is what gets persisted; the parsed instant is what gets compared.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Timestamp {
    raw: String,
    instant: NaiveDateTime,
}

impl Timestamp {
    /// Parses `M[M]/D[D]/YYYY H[H]:MM AM|PM`, rejecting impossible dates and
    /// hours outside `1..=12`.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let invalid = || ValidationError::InvalidTimestamp(raw.to_string());
        let caps = TIMESTAMP.captures(raw).ok_or_else(invalid)?;
        let field = |i: usize| -> Result<u32, ValidationError> {
            caps[i].parse::<u32>().map_err(|_| invalid())
        };

        let (month, day) = (field(1)?, field(2)?);
        let year = caps[3].parse::<i32>().map_err(|_| invalid())?;
        let (hour12, minute) = (field(4)?, field(5)?);
        if !(1..=12).contains(&hour12) {
            return Err(invalid());
        }

        let pm = caps[6].eq_ignore_ascii_case("pm");
        let hour = match (hour12, pm) {
            (12, false) => 0,
            (12, true) => 12,
            (h, false) => h,
            (h, true) => h + 12,
        };

        let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid)?;
        let time = NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(invalid)?;
        Ok(Self {
            raw: raw.to_string(),
            instant: NaiveDateTime::new(date, time),
        })
    }

    /// The text as supplied.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The parsed instant.
    pub fn instant(&self) -> NaiveDateTime {
        self.instant
    }

    /// Short display date, e.g. `1/2/20`.
    pub fn short_date(&self) -> String {
        self.instant.format("%-m/%-d/%y").to_string()
    }

    /// Short display time, e.g. `9:00 AM`.
    pub fn short_time(&self) -> String {
        self.instant.format("%-I:%M %p").to_string()
    }

    /// Short display date and time, e.g. `1/2/20 9:00 AM`.
    pub fn short(&self) -> String {
        format!("{} {}", self.short_date(), self.short_time())
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl TryFrom<String> for Timestamp {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Timestamp> for String {
    fn from(value: Timestamp) -> Self {
        value.raw
    }
}

//! Phone call records and their canonical ordering.

use std::{cmp::Ordering, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::types::{PhoneNumber, Timestamp, ValidationError};

/// Number of whitespace-separated tokens in the single-line call form.
const CALL_LINE_FIELDS: usize = 8;

/// One phone call: who called whom, and when it started and ended.
///
/// Immutable once built. `start <= end` is expected but not enforced, so
/// [`PhoneCall::duration_minutes`] can be negative.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PhoneCall {
    caller: PhoneNumber,
    callee: PhoneNumber,
    start: Timestamp,
    end: Timestamp,
}

impl PhoneCall {
    /// Validates and builds a call from its four raw fields.
    pub fn new(caller: &str, callee: &str, start: &str, end: &str) -> Result<Self, ValidationError> {
        Ok(Self::from_parts(
            PhoneNumber::parse(caller)?,
            PhoneNumber::parse(callee)?,
            Timestamp::parse(start)?,
            Timestamp::parse(end)?,
        ))
    }

    /// Builds a call from already-validated fields.
    pub fn from_parts(caller: PhoneNumber, callee: PhoneNumber, start: Timestamp, end: Timestamp) -> Self {
        Self {
            caller,
            callee,
            start,
            end,
        }
    }

    /// Number of the party who placed the call.
    pub fn caller(&self) -> &PhoneNumber {
        &self.caller
    }

    /// Number of the party who received the call.
    pub fn callee(&self) -> &PhoneNumber {
        &self.callee
    }

    /// When the call began.
    pub fn start(&self) -> &Timestamp {
        &self.start
    }

    /// When the call ended.
    pub fn end(&self) -> &Timestamp {
        &self.end
    }

    /// Whole minutes between start and end, truncated toward zero.
    pub fn duration_minutes(&self) -> i64 {
        (self.end.instant() - self.start.instant()).num_minutes()
    }

    /// True when the call ends on a different calendar day than it starts.
    pub fn spans_days(&self) -> bool {
        self.start.instant().date() != self.end.instant().date()
    }
}

/// Canonical order: start instant ascending, then caller number ascending.
///
/// Calls equal on both keys compare `Equal`; a stable sort keeps their
/// relative order.
pub fn call_order(a: &PhoneCall, b: &PhoneCall) -> Ordering {
    a.start
        .instant()
        .cmp(&b.start.instant())
        .then_with(|| a.caller.numeric_value().cmp(&b.caller.numeric_value()))
}

impl fmt::Display for PhoneCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Phone call from {} to {} from {} to {}",
            self.caller,
            self.callee,
            self.start.short(),
            self.end.short()
        )
    }
}

/// Parses `caller callee MM/DD/YYYY HH:MM AM MM/DD/YYYY HH:MM PM`.
impl FromStr for PhoneCall {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split_whitespace().collect();
        if parts.len() != CALL_LINE_FIELDS {
            return Err(ValidationError::MalformedCall {
                text: s.to_string(),
                expected: CALL_LINE_FIELDS,
                found: parts.len(),
            });
        }
        let start = parts[2..5].join(" ");
        let end = parts[5..8].join(" ");
        Self::new(parts[0], parts[1], &start, &end)
    }
}

//! Start-time range queries over a bill.

use serde::{Deserialize, Serialize};

use crate::{
    bill::PhoneBill,
    call::PhoneCall,
    types::{Timestamp, ValidationError},
};

/// Closed interval `[lower, upper]` over call start times.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    /// Earliest start time included.
    pub lower: Timestamp,
    /// Latest start time included.
    pub upper: Timestamp,
}

impl TimeRange {
    /// Builds a range from validated bounds. An inverted range matches nothing.
    pub fn new(lower: Timestamp, upper: Timestamp) -> Self {
        Self { lower, upper }
    }

    /// Builds a range from raw timestamp text.
    pub fn parse(lower: &str, upper: &str) -> Result<Self, ValidationError> {
        Ok(Self::new(Timestamp::parse(lower)?, Timestamp::parse(upper)?))
    }

    /// True when `call` started within the range, both ends inclusive.
    pub fn contains(&self, call: &PhoneCall) -> bool {
        let start = call.start().instant();
        self.lower.instant() <= start && start <= self.upper.instant()
    }
}

/// Every call in `bill` whose start falls within `range`, in the bill's
/// current order. An empty result means no calls were found.
pub fn calls_in_range<'a>(bill: &'a PhoneBill, range: &TimeRange) -> Vec<&'a PhoneCall> {
    bill.calls().iter().filter(|call| range.contains(call)).collect()
}

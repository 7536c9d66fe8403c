//! A customer's phone bill.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    call::{call_order, PhoneCall},
    search::{calls_in_range, TimeRange},
};

/// Errors raised by bill accessors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BillError {
    /// The bill holds no calls.
    #[error("phone bill has no calls on record")]
    Empty,
    /// The name would not survive a trip through the line-oriented text format.
    #[error("customer name {0:?} contains a line break")]
    InvalidCustomer(String),
}

/// Accepts any customer name that fits on one line of a bill file.
pub fn check_customer_name(name: &str) -> Result<(), BillError> {
    if name.contains(['\n', '\r']) {
        return Err(BillError::InvalidCustomer(name.to_string()));
    }
    Ok(())
}

/// One customer's calls, in insertion order until [`PhoneBill::sort`] is called.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PhoneBill {
    customer: Option<String>,
    calls: Vec<PhoneCall>,
}

impl PhoneBill {
    /// Creates an empty bill for `customer`.
    pub fn new(customer: impl Into<String>) -> Self {
        Self {
            customer: Some(customer.into()),
            calls: Vec::new(),
        }
    }

    /// The customer's display name, if one has been assigned.
    pub fn customer(&self) -> Option<&str> {
        self.customer.as_deref()
    }

    /// Assigns or replaces the customer's display name.
    pub fn set_customer(&mut self, customer: impl Into<String>) {
        self.customer = Some(customer.into());
    }

    /// Appends `call` to the end of the bill and returns it. Duplicates are kept.
    pub fn add_call(&mut self, call: PhoneCall) -> &PhoneCall {
        let idx = self.calls.len();
        self.calls.push(call);
        &self.calls[idx]
    }

    /// Calls in their current stored order.
    pub fn calls(&self) -> &[PhoneCall] {
        &self.calls
    }

    /// Number of calls on record.
    pub fn len(&self) -> usize {
        self.calls.len()
    }

    /// True when no calls are on record.
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// The last call appended, which is not necessarily the latest by time.
    pub fn most_recent_call(&self) -> Result<&PhoneCall, BillError> {
        self.calls.last().ok_or(BillError::Empty)
    }

    /// Stable in-place sort by [`call_order`]. The new order is permanent.
    pub fn sort(&mut self) {
        self.calls.sort_by(call_order);
    }

    /// Calls whose start lies within `range`, in stored order.
    pub fn calls_in_range(&self, range: &TimeRange) -> Vec<&PhoneCall> {
        calls_in_range(self, range)
    }
}

//! Response text for the customer/bill query surface.

use crate::{bill::PhoneBill, call::PhoneCall, report};

/// Header line announcing how many customer bills a response holds.
pub fn mapping_count(count: usize) -> String {
    format!("Phone bill contains {count} customer/phone call records")
}

/// One customer's bill, rendered as a report.
pub fn customer_bill_pair(customer: &str, bill: &PhoneBill) -> String {
    format!("  {customer}'s {}", report::render(bill))
}

/// Indicator returned in place of a bill that does not exist.
pub fn no_bill_on_record(customer: &str) -> String {
    format!("No phone bill on record for {customer}")
}

/// Complaint about a request missing a required parameter.
pub fn missing_required_parameter(name: &str) -> String {
    format!("The required parameter \"{name}\" is missing")
}

/// Confirmation that `call` was appended to `customer`'s bill.
pub fn mapped_customer_call(customer: &str, call: &PhoneCall) -> String {
    format!("Mapped {customer} to {call}")
}

/// Preamble for a range search response.
pub fn searching_calls(customer: &str) -> String {
    format!("Searching {customer}'s phone bill for calls")
}

/// Empty range search result.
pub fn no_calls_found(customer: &str) -> String {
    format!("No calls found for {customer} in the requested time range")
}

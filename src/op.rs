//! Mutation operations as handed to a journal sink.

use serde::{Deserialize, Serialize};

use crate::{bill::PhoneBill, call::PhoneCall, types::OpSeq};

/// Immutable operation appended to the journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Op {
    /// Append a call to a customer's bill, creating the bill if absent.
    AddCall {
        /// Customer key.
        customer: String,
        /// Appended call.
        call: PhoneCall,
    },
    /// Replace a customer's bill wholesale.
    PutBill {
        /// Customer key.
        customer: String,
        /// New bill.
        bill: PhoneBill,
    },
    /// Sort a customer's calls into canonical order.
    SortBill {
        /// Customer key.
        customer: String,
    },
}

impl Op {
    /// Customer key the operation touches.
    pub fn customer(&self) -> &str {
        match self {
            Op::AddCall { customer, .. } | Op::PutBill { customer, .. } | Op::SortBill { customer } => customer,
        }
    }
}

/// Journal row metadata plus operation payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredOp {
    /// Monotonic operation sequence.
    pub seq: OpSeq,
    /// Operation timestamp in milliseconds.
    pub ts_ms: u64,
    /// Operation body.
    pub op: Op,
}

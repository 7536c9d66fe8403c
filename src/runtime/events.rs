//! Runtime event stream payloads.

use crate::types::OpSeq;

/// Events emitted from the single-writer runtime loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillEvent {
    /// A call was appended to a customer's bill.
    CallAdded {
        /// Customer key.
        customer: String,
        /// Journal sequence of the append.
        op_seq: OpSeq,
    },
    /// A customer's bill was replaced.
    BillStored {
        /// Customer key.
        customer: String,
    },
    /// A customer's bill was sorted into canonical order.
    BillSorted {
        /// Customer key.
        customer: String,
    },
    /// Persistence has reached at least this op sequence.
    DurableUpTo {
        /// Highest sequence known durable.
        op_seq: OpSeq,
    },
}

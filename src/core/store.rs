use std::time::{SystemTime, UNIX_EPOCH};

use hashbrown::HashMap;
use thiserror::Error;
use tracing::{debug, trace};

use crate::{
    bill::{check_customer_name, BillError, PhoneBill},
    call::PhoneCall,
    op::{Op, StoredOp},
    search::TimeRange,
    types::OpSeq,
};

/// Store mutation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No bill is held for the customer.
    #[error("no phone bill on record for {0:?}")]
    UnknownCustomer(String),
    /// Bill-level failure.
    #[error(transparent)]
    Bill(#[from] BillError),
}

/// Customer name to bill mapping. Each bill is owned by exactly one key and
/// always carries that key as its customer name.
///
/// Mutations record a [`StoredOp`] which callers drain with
/// [`BillStore::drain_pending_ops`] and hand to a journal. The store does no
/// locking; callers serialize writers (see `runtime`).
#[derive(Debug, Default, Clone)]
pub struct BillStore {
    bills: HashMap<String, PhoneBill>,
    pending_ops: Vec<StoredOp>,
    next_op_seq: OpSeq,
}

impl BillStore {
    pub fn new() -> Self {
        Self {
            next_op_seq: 1,
            ..Self::default()
        }
    }

    pub fn get_bill(&self, customer: &str) -> Option<&PhoneBill> {
        self.bills.get(customer)
    }

    pub fn get_cloned(&self, customer: &str) -> Option<PhoneBill> {
        self.get_bill(customer).cloned()
    }

    /// Every held bill, sorted by customer key.
    pub fn all_bills(&self) -> Vec<(&str, &PhoneBill)> {
        let mut out: Vec<(&str, &PhoneBill)> = self.bills.iter().map(|(k, v)| (k.as_str(), v)).collect();
        out.sort_by(|a, b| a.0.cmp(b.0));
        out
    }

    pub fn len(&self) -> usize {
        self.bills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bills.is_empty()
    }

    /// Stores `bill` under `customer`, replacing any previous bill. The bill is
    /// renamed to the key.
    pub fn put_bill(&mut self, customer: impl Into<String>, bill: PhoneBill) -> Result<StoredOp, StoreError> {
        let customer = customer.into();
        check_customer_name(&customer)?;
        let seq = self.take_next_op_seq();
        Ok(self.apply_op_with_seq(Op::PutBill { customer, bill }, seq))
    }

    /// Appends `call` to `customer`'s bill, creating the bill if absent, and
    /// returns the bill's most recently added call.
    pub fn add_call(&mut self, customer: impl Into<String>, call: PhoneCall) -> Result<(&PhoneCall, StoredOp), StoreError> {
        let customer = customer.into();
        check_customer_name(&customer)?;
        let seq = self.take_next_op_seq();
        let stored = self.record(
            Op::AddCall {
                customer: customer.clone(),
                call: call.clone(),
            },
            seq,
        );
        let latest = self
            .bills
            .entry(customer.clone())
            .or_insert_with(|| PhoneBill::new(customer))
            .add_call(call);
        Ok((latest, stored))
    }

    pub fn sort_bill(&mut self, customer: &str) -> Result<StoredOp, StoreError> {
        if !self.bills.contains_key(customer) {
            return Err(StoreError::UnknownCustomer(customer.to_string()));
        }
        let seq = self.take_next_op_seq();
        Ok(self.apply_op_with_seq(
            Op::SortBill {
                customer: customer.to_string(),
            },
            seq,
        ))
    }

    /// Calls on `customer`'s bill whose start lies within `range`. Unknown
    /// customers yield no calls.
    pub fn calls_in_range(&self, customer: &str, range: &TimeRange) -> Vec<&PhoneCall> {
        self.get_bill(customer)
            .map(|bill| bill.calls_in_range(range))
            .unwrap_or_default()
    }

    /// Applies an op read back from a journal, keeping its sequence number.
    pub fn apply_replayed_op(&mut self, stored: StoredOp) {
        let seq = stored.seq;
        self.apply_op_without_journal(stored.op);
        self.bump_next_seq_from(seq);
    }

    pub fn drain_pending_ops(&mut self) -> Vec<StoredOp> {
        std::mem::take(&mut self.pending_ops)
    }

    pub fn latest_op_seq(&self) -> OpSeq {
        self.next_op_seq.saturating_sub(1)
    }

    fn record(&mut self, op: Op, seq: OpSeq) -> StoredOp {
        let stored = StoredOp {
            seq,
            ts_ms: now_ms(),
            op,
        };
        self.bump_next_seq_from(seq);
        self.pending_ops.push(stored.clone());
        trace!(seq, customer = stored.op.customer(), "recorded store op");
        stored
    }

    fn apply_op_with_seq(&mut self, op: Op, seq: OpSeq) -> StoredOp {
        let stored = self.record(op.clone(), seq);
        self.apply_op_without_journal(op);
        stored
    }

    fn apply_op_without_journal(&mut self, op: Op) {
        match op {
            Op::AddCall { customer, call } => {
                self.bills
                    .entry(customer.clone())
                    .or_insert_with(|| PhoneBill::new(customer))
                    .add_call(call);
            }
            Op::PutBill { customer, mut bill } => {
                bill.set_customer(customer.clone());
                debug!(customer = %customer, calls = bill.len(), "stored phone bill");
                self.bills.insert(customer, bill);
            }
            Op::SortBill { customer } => {
                if let Some(bill) = self.bills.get_mut(&customer) {
                    bill.sort();
                }
            }
        }
    }

    fn take_next_op_seq(&mut self) -> OpSeq {
        let seq = self.next_op_seq.max(1);
        self.next_op_seq = seq + 1;
        seq
    }

    fn bump_next_seq_from(&mut self, seq: OpSeq) {
        self.next_op_seq = self.next_op_seq.max(seq.saturating_add(1));
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use tokio::{
    sync::{Mutex, broadcast, mpsc, oneshot},
    time::{Duration, Instant},
};
use tracing::{debug, error, info, warn};

use crate::{
    bill::PhoneBill,
    call::PhoneCall,
    core::store::{BillStore, StoreError},
    op::{Op, StoredOp},
    persist::{OpSink, PersistError},
    search::TimeRange,
    types::OpSeq,
};

use super::events::BillEvent;

/// Failures surfaced through a [`PhoneBillHandle`].
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The store rejected the request.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The journal could not accept or write the change.
    #[error(transparent)]
    Persist(#[from] PersistError),
    /// The runtime task has stopped.
    #[error("phone bill runtime is not running")]
    ChannelClosed,
}

/// Batching policy for the runtime.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Write through to the sink on every appended call.
    pub flush_on_add: bool,
    /// Flush once this many ops are buffered.
    pub batch_max_ops: usize,
    /// Flush buffered ops after this long.
    pub batch_max_latency_ms: u64,
    /// Capacity of the queue between the writer and the sink. A full queue
    /// holds the writer until the sink catches up.
    pub persist_queue_bound: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            flush_on_add: true,
            batch_max_ops: 32,
            batch_max_latency_ms: 75,
            persist_queue_bound: 64,
        }
    }
}

/// Cloneable client for the single task that owns the [`BillStore`].
///
/// Every mutation is applied by that one task, so a customer's bill never has
/// two concurrent writers and readers only ever see fully applied changes.
#[derive(Clone)]
pub struct PhoneBillHandle {
    cmd_tx: mpsc::Sender<Command>,
    events_tx: broadcast::Sender<BillEvent>,
}

enum Command {
    AddCall {
        customer: String,
        call: PhoneCall,
        resp: oneshot::Sender<Result<PhoneCall, RuntimeError>>,
    },
    PutBill {
        customer: String,
        bill: PhoneBill,
        resp: oneshot::Sender<Result<(), RuntimeError>>,
    },
    SortBill {
        customer: String,
        resp: oneshot::Sender<Result<(), RuntimeError>>,
    },
    GetBill {
        customer: String,
        resp: oneshot::Sender<Option<PhoneBill>>,
    },
    AllBills {
        resp: oneshot::Sender<Vec<(String, PhoneBill)>>,
    },
    Search {
        customer: String,
        range: TimeRange,
        resp: oneshot::Sender<Vec<PhoneCall>>,
    },
    Flush {
        resp: oneshot::Sender<Result<OpSeq, RuntimeError>>,
    },
    Shutdown {
        resp: oneshot::Sender<Result<(), RuntimeError>>,
    },
}

enum PersistMsg {
    Op(StoredOp),
    Flush {
        resp: oneshot::Sender<Result<OpSeq, PersistError>>,
    },
    Shutdown {
        resp: oneshot::Sender<()>,
    },
}

/// Starts the writer task over `store`, journaling to `sink` when given.
///
/// Must be called from within a tokio runtime.
pub fn spawn_phonebill(
    store: BillStore,
    sink: Option<Box<dyn OpSink>>,
    config: RuntimeConfig,
) -> PhoneBillHandle {
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<Command>(256);
    let (events_tx, _) = broadcast::channel::<BillEvent>(1024);

    let (persist_tx_opt, mut durable_rx) = if let Some(sink) = sink {
        let (persist_tx, persist_rx) = mpsc::channel::<PersistMsg>(config.persist_queue_bound.max(1));
        let (durable_tx, durable_rx) = mpsc::unbounded_channel::<Result<OpSeq, PersistError>>();
        spawn_persistence_worker(sink, persist_rx, durable_tx, config);
        (Some(persist_tx), Some(durable_rx))
    } else {
        (None, None)
    };

    let events_tx_loop = events_tx.clone();
    info!(bills = store.len(), journaled = persist_tx_opt.is_some(), "phone bill runtime started");

    tokio::spawn(async move {
        let mut store = store;
        let mut durable_open = durable_rx.is_some();

        loop {
            let cmd = match durable_rx.as_mut() {
                Some(rx) if durable_open => tokio::select! {
                    cmd = cmd_rx.recv() => cmd,
                    durable = rx.recv() => {
                        match durable {
                            Some(Ok(op_seq)) => {
                                let _ = events_tx_loop.send(BillEvent::DurableUpTo { op_seq });
                            }
                            Some(Err(err)) => warn!(error = %err, "journal write failed"),
                            None => durable_open = false,
                        }
                        continue;
                    }
                },
                _ => cmd_rx.recv().await,
            };

            let Some(cmd) = cmd else { break };
            let done = handle_command(cmd, &mut store, &events_tx_loop, persist_tx_opt.as_ref()).await;
            if done {
                break;
            }
        }
        info!("phone bill runtime stopped");
    });

    PhoneBillHandle { cmd_tx, events_tx }
}

impl PhoneBillHandle {
    /// Subscribes to mutation and durability events.
    pub fn subscribe(&self) -> broadcast::Receiver<BillEvent> {
        self.events_tx.subscribe()
    }

    /// Appends `call` to `customer`'s bill, creating it if absent, and returns
    /// the bill's most recently added call.
    pub async fn add_call(&self, customer: impl Into<String>, call: PhoneCall) -> Result<PhoneCall, RuntimeError> {
        let customer = customer.into();
        self.request(|resp| Command::AddCall { customer, call, resp }).await?
    }

    /// Replaces `customer`'s bill.
    pub async fn put_bill(&self, customer: impl Into<String>, bill: PhoneBill) -> Result<(), RuntimeError> {
        let customer = customer.into();
        self.request(|resp| Command::PutBill { customer, bill, resp }).await?
    }

    /// Sorts `customer`'s bill into canonical order.
    pub async fn sort_bill(&self, customer: impl Into<String>) -> Result<(), RuntimeError> {
        let customer = customer.into();
        self.request(|resp| Command::SortBill { customer, resp }).await?
    }

    /// `customer`'s bill, or `None` when no bill is on record.
    pub async fn bill(&self, customer: impl Into<String>) -> Result<Option<PhoneBill>, RuntimeError> {
        let customer = customer.into();
        self.request(|resp| Command::GetBill { customer, resp }).await
    }

    /// Every customer/bill pair, sorted by customer. The count is the length.
    pub async fn all_bills(&self) -> Result<Vec<(String, PhoneBill)>, RuntimeError> {
        self.request(|resp| Command::AllBills { resp }).await
    }

    /// Calls on `customer`'s bill that started within `range`, in bill order.
    /// An empty result means no calls were found.
    pub async fn search(&self, customer: impl Into<String>, range: TimeRange) -> Result<Vec<PhoneCall>, RuntimeError> {
        let customer = customer.into();
        self.request(|resp| Command::Search { customer, range, resp }).await
    }

    /// Waits until every journaled op is durable; returns the durable sequence.
    pub async fn flush(&self) -> Result<OpSeq, RuntimeError> {
        self.request(|resp| Command::Flush { resp }).await?
    }

    /// Flushes the sink and stops the runtime.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        self.request(|resp| Command::Shutdown { resp }).await?
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(build(tx))
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }
}

async fn handle_command(
    cmd: Command,
    store: &mut BillStore,
    events_tx: &broadcast::Sender<BillEvent>,
    persist_tx: Option<&mpsc::Sender<PersistMsg>>,
) -> bool {
    match cmd {
        Command::AddCall { customer, call, resp } => {
            let _ = resp.send(add_call(store, customer, call, events_tx, persist_tx).await);
        }
        Command::PutBill { customer, bill, resp } => {
            let _ = resp.send(put_bill(store, customer, bill, events_tx, persist_tx).await);
        }
        Command::SortBill { customer, resp } => {
            let _ = resp.send(sort_bill(store, customer, events_tx, persist_tx).await);
        }
        Command::GetBill { customer, resp } => {
            let _ = resp.send(store.get_cloned(&customer));
        }
        Command::AllBills { resp } => {
            let all = store
                .all_bills()
                .into_iter()
                .map(|(customer, bill)| (customer.to_string(), bill.clone()))
                .collect();
            let _ = resp.send(all);
        }
        Command::Search { customer, range, resp } => {
            let found: Vec<PhoneCall> = store.calls_in_range(&customer, &range).into_iter().cloned().collect();
            debug!(customer = %customer, found = found.len(), "range search");
            let _ = resp.send(found);
        }
        Command::Flush { resp } => {
            let out = if let Some(tx) = persist_tx {
                let (flush_tx, flush_rx) = oneshot::channel();
                if tx.send(PersistMsg::Flush { resp: flush_tx }).await.is_err() {
                    Err(RuntimeError::ChannelClosed)
                } else {
                    flush_rx
                        .await
                        .map_err(|_| RuntimeError::ChannelClosed)
                        .and_then(|r| r.map_err(RuntimeError::from))
                }
            } else {
                Ok(store.latest_op_seq())
            };
            let _ = resp.send(out);
        }
        Command::Shutdown { resp } => {
            let out = if let Some(tx) = persist_tx {
                let (done_tx, done_rx) = oneshot::channel();
                if tx.send(PersistMsg::Shutdown { resp: done_tx }).await.is_err() {
                    Err(RuntimeError::ChannelClosed)
                } else {
                    done_rx.await.map_err(|_| RuntimeError::ChannelClosed)
                }
            } else {
                Ok(())
            };
            let _ = resp.send(out);
            return true;
        }
    }

    false
}

async fn add_call(
    store: &mut BillStore,
    customer: String,
    call: PhoneCall,
    events_tx: &broadcast::Sender<BillEvent>,
    persist_tx: Option<&mpsc::Sender<PersistMsg>>,
) -> Result<PhoneCall, RuntimeError> {
    ensure_journal_open(persist_tx)?;
    let (latest, stored) = store.add_call(customer.clone(), call)?;
    let latest = latest.clone();
    let op_seq = stored.seq;
    journal(stored, store, events_tx, persist_tx).await?;
    let _ = events_tx.send(BillEvent::CallAdded { customer, op_seq });
    Ok(latest)
}

async fn put_bill(
    store: &mut BillStore,
    customer: String,
    bill: PhoneBill,
    events_tx: &broadcast::Sender<BillEvent>,
    persist_tx: Option<&mpsc::Sender<PersistMsg>>,
) -> Result<(), RuntimeError> {
    ensure_journal_open(persist_tx)?;
    let stored = store.put_bill(customer.clone(), bill)?;
    journal(stored, store, events_tx, persist_tx).await?;
    let _ = events_tx.send(BillEvent::BillStored { customer });
    Ok(())
}

async fn sort_bill(
    store: &mut BillStore,
    customer: String,
    events_tx: &broadcast::Sender<BillEvent>,
    persist_tx: Option<&mpsc::Sender<PersistMsg>>,
) -> Result<(), RuntimeError> {
    ensure_journal_open(persist_tx)?;
    let stored = store.sort_bill(&customer)?;
    journal(stored, store, events_tx, persist_tx).await?;
    let _ = events_tx.send(BillEvent::BillSorted { customer });
    Ok(())
}

/// Refuses a mutation up front when its op could never reach the sink.
fn ensure_journal_open(persist_tx: Option<&mpsc::Sender<PersistMsg>>) -> Result<(), RuntimeError> {
    match persist_tx {
        Some(tx) if tx.is_closed() => Err(RuntimeError::ChannelClosed),
        _ => Ok(()),
    }
}

/// Hands `stored` to the sink, waiting for queue space, or reports it durable
/// at once without one.
async fn journal(
    stored: StoredOp,
    store: &mut BillStore,
    events_tx: &broadcast::Sender<BillEvent>,
    persist_tx: Option<&mpsc::Sender<PersistMsg>>,
) -> Result<(), RuntimeError> {
    // The op is already in hand; the store's own pending copy is redundant.
    store.drain_pending_ops();
    match persist_tx {
        Some(tx) => tx
            .send(PersistMsg::Op(stored))
            .await
            .map_err(|_| RuntimeError::ChannelClosed),
        None => {
            let _ = events_tx.send(BillEvent::DurableUpTo { op_seq: stored.seq });
            Ok(())
        }
    }
}

fn spawn_persistence_worker(
    sink: Box<dyn OpSink>,
    mut rx: mpsc::Receiver<PersistMsg>,
    durable_tx: mpsc::UnboundedSender<Result<OpSeq, PersistError>>,
    config: RuntimeConfig,
) {
    let sink = Arc::new(Mutex::new(sink));
    let latency = Duration::from_millis(config.batch_max_latency_ms);
    tokio::spawn(async move {
        let mut buf = Vec::<StoredOp>::new();
        let mut deadline = Instant::now() + latency;
        let mut last_durable: OpSeq = 0;

        loop {
            tokio::select! {
                msg = rx.recv() => {
                    let Some(msg) = msg else {
                        let _ = flush_buf(&sink, &mut buf, &mut last_durable, &durable_tx, true).await;
                        break;
                    };

                    match msg {
                        PersistMsg::Op(stored) => {
                            let is_add = matches!(stored.op, Op::AddCall { .. });
                            buf.push(stored);

                            if buf.len() >= config.batch_max_ops || (config.flush_on_add && is_add) {
                                let _ = flush_buf(&sink, &mut buf, &mut last_durable, &durable_tx, true).await;
                                deadline = Instant::now() + latency;
                            }
                        }
                        PersistMsg::Flush { resp } => {
                            let result = flush_buf(&sink, &mut buf, &mut last_durable, &durable_tx, true).await;
                            let _ = resp.send(result.map(|_| last_durable));
                            deadline = Instant::now() + latency;
                        }
                        PersistMsg::Shutdown { resp } => {
                            let _ = flush_buf(&sink, &mut buf, &mut last_durable, &durable_tx, true).await;
                            let _ = resp.send(());
                            break;
                        }
                    }
                }
                _ = tokio::time::sleep_until(deadline), if !buf.is_empty() => {
                    let _ = flush_buf(&sink, &mut buf, &mut last_durable, &durable_tx, false).await;
                    deadline = Instant::now() + latency;
                }
            }
        }
    });
}

async fn flush_buf(
    sink: &Arc<Mutex<Box<dyn OpSink>>>,
    buf: &mut Vec<StoredOp>,
    last_durable: &mut OpSeq,
    durable_tx: &mpsc::UnboundedSender<Result<OpSeq, PersistError>>,
    call_flush: bool,
) -> Result<(), PersistError> {
    if buf.is_empty() {
        if call_flush {
            let sink_ref = Arc::clone(sink);
            tokio::task::spawn_blocking(move || {
                let mut sink = sink_ref.blocking_lock();
                sink.flush()
            })
            .await
            .map_err(|e| PersistError::Message(format!("join error: {e}")))??;
        }
        return Ok(());
    }

    let ops = std::mem::take(buf);
    let sink_ref = Arc::clone(sink);
    let append_res: Result<OpSeq, PersistError> = tokio::task::spawn_blocking(move || {
        let mut sink = sink_ref.blocking_lock();
        let seq = sink.append_ops(&ops)?;
        if call_flush {
            sink.flush()?;
        }
        Ok(seq)
    })
    .await
    .map_err(|e| PersistError::Message(format!("join error: {e}")))?;

    match append_res {
        Ok(seq) => {
            *last_durable = (*last_durable).max(seq);
            let _ = durable_tx.send(Ok(*last_durable));
            Ok(())
        }
        Err(err) => {
            error!(error = %err, "failed to append ops to journal");
            let _ = durable_tx.send(Err(PersistError::Message(format!("append failed: {err}"))));
            Err(err)
        }
    }
}

/// Directory of per-customer text files.
pub mod text;

use thiserror::Error;

use crate::{codec::CodecError, core::store::StoreError, op::StoredOp, types::OpSeq};

/// Sink write and load failures.
#[derive(Debug, Error)]
pub enum PersistError {
    /// Text file encoding or decoding failure.
    #[error("text file error: {0}")]
    Codec(#[from] CodecError),
    /// A loaded bill could not be placed in the store.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Filesystem failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    /// Anything else.
    #[error("{0}")]
    Message(String),
}

/// Result alias for sink operations.
pub type PersistResult<T> = Result<T, PersistError>;

/// Destination for store mutations, fed in sequence order by the runtime.
pub trait OpSink: Send {
    /// Persists `ops` in order and returns the highest sequence now durable.
    fn append_ops(&mut self, ops: &[StoredOp]) -> PersistResult<OpSeq>;
    /// Forces buffered writes out.
    fn flush(&mut self) -> PersistResult<()> {
        Ok(())
    }
}

//! One text file per customer, in the line-oriented bill format.
//!
//! Each batch of ops rewrites the whole file of every customer it touches.
//! Readers must not parse a file while a batch is being written.

use std::{
    fs,
    path::{Path, PathBuf},
};

use hashbrown::HashSet;
use tracing::{debug, info, warn};

use crate::{
    codec,
    core::store::BillStore,
    op::StoredOp,
    types::OpSeq,
};

use super::{OpSink, PersistError, PersistResult};

const EXTENSION: &str = "txt";

/// [`OpSink`] that mirrors every bill into `<dir>/<customer>.txt`.
pub struct TextDirSink {
    dir: PathBuf,
    mirror: BillStore,
}

impl TextDirSink {
    /// Opens `dir`, creating it if needed, and loads every bill file in it.
    pub fn open(dir: impl AsRef<Path>) -> PersistResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let mut mirror = BillStore::new();
        let mut paths: Vec<PathBuf> = fs::read_dir(&dir)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<Result<_, _>>()?;
        paths.sort();

        for path in paths {
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            let bill = codec::parse_file(&path)?;
            let Some(customer) = bill.customer().map(str::to_string) else {
                continue;
            };
            if mirror.get_bill(&customer).is_some() {
                warn!(customer = %customer, path = %path.display(), "duplicate customer file ignored");
                continue;
            }
            mirror.put_bill(customer, bill)?;
        }
        mirror.drain_pending_ops();
        info!(dir = %dir.display(), bills = mirror.len(), "opened text bill directory");

        Ok(Self { dir, mirror })
    }

    /// The bills currently on disk, as a fresh store.
    pub fn load_store(&self) -> BillStore {
        self.mirror.clone()
    }

    /// File that holds `customer`'s bill.
    pub fn path_for(&self, customer: &str) -> PathBuf {
        self.dir.join(format!("{}.{EXTENSION}", file_stem(customer)))
    }

    fn write_customer(&self, customer: &str) -> PersistResult<()> {
        let Some(bill) = self.mirror.get_bill(customer) else {
            return Ok(());
        };
        let path = self.path_for(customer);
        if let Some(existing) = codec::customer_on_record(&path)? {
            if existing != customer {
                return Err(PersistError::Message(format!(
                    "{} belongs to {existing:?}, not {customer:?}",
                    path.display()
                )));
            }
        }
        codec::dump_file(&path, bill)?;
        Ok(())
    }
}

impl OpSink for TextDirSink {
    fn append_ops(&mut self, ops: &[StoredOp]) -> PersistResult<OpSeq> {
        let mut touched = HashSet::new();
        for stored in ops {
            touched.insert(stored.op.customer().to_string());
            self.mirror.apply_replayed_op(stored.clone());
        }
        self.mirror.drain_pending_ops();

        for customer in &touched {
            self.write_customer(customer)?;
        }
        debug!(ops = ops.len(), files = touched.len(), "rewrote bill files");
        Ok(self.mirror.latest_op_seq())
    }
}

/// Filesystem-safe stem for a customer name.
fn file_stem(customer: &str) -> String {
    let stem: String = customer
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    if stem.is_empty() { "_".to_string() } else { stem }
}

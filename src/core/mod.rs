//! In-memory customer-to-bill store.

/// Authoritative bill store and its mutation journal.
pub mod store;

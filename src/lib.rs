//! Customer phone bills: validated call records, canonical ordering, range
//! search, a line-oriented text format, and a printable report.
//!
//! # Examples
//!
//! Building, sorting and encoding a bill:
//! ```
//! use phonebill::{bill::PhoneBill, call::PhoneCall, codec, report};
//!
//! let mut bill = PhoneBill::new("Ada Lovelace");
//! bill.add_call(PhoneCall::new("503-555-0100", "503-555-0199", "01/02/2020 9:00 AM", "01/02/2020 9:10 AM").expect("valid call"));
//! bill.add_call(PhoneCall::new("503-555-0142", "971-555-0123", "01/01/2020 8:00 AM", "01/01/2020 8:05 AM").expect("valid call"));
//! bill.sort();
//! assert_eq!(bill.calls()[0].start().as_str(), "01/01/2020 8:00 AM");
//!
//! let mut text = Vec::new();
//! codec::dump(&bill, &mut text).expect("dump");
//! let decoded = codec::parse(text.as_slice()).expect("parse");
//! assert_eq!(decoded, bill);
//! assert!(report::render(&bill).contains("No. of Calls on Record: 2"));
//! ```
//!
//! Sharing bills between concurrent requests through the single-writer runtime:
//! ```no_run
//! use phonebill::{
//!     core::store::BillStore,
//!     persist::text::TextDirSink,
//!     runtime::handle::{spawn_phonebill, RuntimeConfig},
//! };
//!
//! # #[tokio::main]
//! # async fn main() {
//! let sink = TextDirSink::open("bills").expect("open bill directory");
//! let store = sink.load_store();
//! let handle = spawn_phonebill(store, Some(Box::new(sink)), RuntimeConfig::default());
//! let call = "503-555-0100 503-555-0199 01/02/2020 9:00 AM 01/02/2020 9:10 AM".parse().expect("call");
//! let latest = handle.add_call("Ada Lovelace", call).await.expect("add call");
//! println!("{latest}");
//! handle.shutdown().await.expect("shutdown");
//! # }
//! ```
#![warn(missing_docs)]

/// Customer bills.
pub mod bill;
/// Call records and their ordering.
pub mod call;
/// Text encoding and decoding of bills.
pub mod codec;
/// In-memory customer-to-bill store.
pub mod core;
/// Tracing subscriber setup.
pub mod logging;
/// Query-surface response text.
pub mod messages;
/// Store mutation ops.
pub mod op;
/// Sinks that persist store mutations.
pub mod persist;
/// Human-readable bill reports.
pub mod report;
/// Single-writer runtime handle and events.
pub mod runtime;
/// Start-time range search.
pub mod search;
/// Validated phone numbers and timestamps.
pub mod types;

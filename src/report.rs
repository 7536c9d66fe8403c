//! Human-readable phone bill report.

use std::{fs, path::Path};

use tracing::debug;

use crate::{bill::PhoneBill, call::PhoneCall, codec::CodecError};

/// Banner printed at the top of every report.
pub const BANNER: &str = "Phone Bill\n==========";

const COLUMNS: &str = "Date(s)\t\t\tCaller\t\t\t\tCallee\t\t\t\tCall Began\t\t\tCall Ended\t\t\tDuration (mins)";

/// Renders `bill` with a header and one line group per call, in the bill's
/// current order. Sort the bill first for a chronological report.
pub fn render(bill: &PhoneBill) -> String {
    let mut out = format!(
        "{BANNER}\n{}\nNo. of Calls on Record: {}\n\n{COLUMNS}",
        bill.customer().unwrap_or_default(),
        bill.len()
    );
    for call in bill.calls() {
        out.push_str(&render_call(call));
    }
    out
}

/// Renders one call. A second line carries the end date when the call
/// crosses midnight.
pub fn render_call(call: &PhoneCall) -> String {
    let mut out = format!(
        "\n  {}\t{}\t{}\t{}\t\t{}\t\t{}\n",
        call.start().short_date(),
        call.caller(),
        call.callee(),
        call.start().short_time(),
        call.end().short_time(),
        call.duration_minutes()
    );
    if call.spans_days() {
        out.push_str(&format!("  {}\n", call.end().short_date()));
    }
    out
}

/// Writes the rendered report for `bill` to `path`, replacing any existing content.
pub fn write_report(path: impl AsRef<Path>, bill: &PhoneBill) -> Result<(), CodecError> {
    let path = path.as_ref();
    fs::write(path, render(bill))?;
    debug!(path = %path.display(), calls = bill.len(), "wrote phone bill report");
    Ok(())
}

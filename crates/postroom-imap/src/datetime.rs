//! INTERNALDATE formatting for APPEND.

use chrono::{DateTime, Utc};

/// Formats a timestamp as an IMAP `date-time` (RFC 9051), e.g.
/// `30-Aug-2026 14:05:09 +0000`. The caller quotes it on the wire.
#[must_use]
pub fn internal_date(when: DateTime<Utc>) -> String {
    when.format("%d-%b-%Y %H:%M:%S +0000").to_string()
}

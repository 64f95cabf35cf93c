//! FHIR date and instant parsing.
//!
//! Servers are inconsistent about timezone suffixes on `issued`/`effectiveDateTime`, so
//! observation timestamps go through [`parse_instant_assume_utc`]. Anything compared against an
//! encounter start (e.g. `authoredOn`) must carry an offset and goes through [`parse_instant`].

use crate::{FhirError, FhirResult};
use chrono::{DateTime, FixedOffset, NaiveDate};

/// UTC offset suffix appended to timestamps that arrive without one.
pub const UTC_SUFFIX: &str = "+00:00";

/// Parse an RFC 3339 instant that must carry a timezone offset.
///
/// # Errors
///
/// Returns [`FhirError::InvalidTimestamp`] if the text is not RFC 3339 or has no offset.
pub fn parse_instant(text: &str) -> FhirResult<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(text.trim())
        .map_err(|e| FhirError::InvalidTimestamp(format!("'{text}': {e}")))
}

/// Parse an instant, treating a missing offset as UTC.
///
/// Accepts a full RFC 3339 instant, a date-time without offset (suffixed with `+00:00` and
/// re-parsed), or a bare date (midnight UTC).
///
/// # Errors
///
/// Returns [`FhirError::InvalidTimestamp`] if none of the accepted shapes match.
pub fn parse_instant_assume_utc(text: &str) -> FhirResult<DateTime<FixedOffset>> {
    let trimmed = text.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed);
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(&format!("{trimmed}{UTC_SUFFIX}")) {
        return Ok(parsed);
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        let midnight = date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc().fixed_offset());
        if let Some(midnight) = midnight {
            return Ok(midnight);
        }
    }

    Err(FhirError::InvalidTimestamp(format!(
        "'{text}' is not a FHIR instant, dateTime or date"
    )))
}

/// Best-effort calendar date from a FHIR `date` or `dateTime`.
///
/// The date is taken as written, without shifting to UTC.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let trimmed = text.trim();
    let date_part = trimmed.get(..10).unwrap_or(trimmed);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

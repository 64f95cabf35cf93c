//! Patient flattening, falling back to a loose read when strict validation fails.

use fhir::{Patient, PatientData};
use serde_json::Value;

/// Patient demographics as used by cohort assembly.
pub type PatientRow = PatientData;

/// Flatten a Patient resource.
///
/// Strict parsing is tried first. If it fails, fields are read directly from the raw JSON so
/// that one badly shaped element does not cost the whole demographic record.
pub fn flatten_patient(value: &Value) -> PatientRow {
    match Patient::parse_strict(value) {
        Ok(patient) => patient,
        Err(e) => {
            tracing::warn!("strict Patient parse failed, reading fields directly: {}", e);
            Patient::parse_loose(value)
        }
    }
}

//! FHIR R4 wire/boundary support for the seneca pipeline.
//!
//! This crate provides **wire models** and **translation helpers** for the JSON resources
//! returned by clinical data servers:
//! - Bundle (search pages and their pagination links)
//! - Patient, Observation, MedicationRequest, Medication, Condition
//!
//! This crate focuses on:
//! - strict deserialisation with a path to the failing field
//! - best-effort field lookup where a strict parse is known to be too strict for some servers
//! - translation from wire structs into flat domain-level carriers
//!
//! It performs no HTTP; see `seneca-core` for transport and paging.

pub mod bundle;
pub mod condition;
pub mod datatypes;
pub mod datetime;
pub mod medication;
pub mod observation;
pub mod patient;

// Re-export facades
pub use bundle::Bundle;
pub use condition::Condition;
pub use medication::{Medication, MedicationRequest};
pub use observation::Observation;
pub use patient::Patient;

// Re-export public domain-level types
pub use bundle::BundleData;
pub use condition::ConditionData;
pub use datatypes::{CodeableConcept, Coding, Period, Quantity, Reference};
pub use medication::{MedicationData, MedicationRequestData};
pub use observation::{ComponentData, ObservationData, ObservationValue};
pub use patient::{AdministrativeGender, PatientData};

use serde::de::DeserializeOwned;
use serde_json::Value;

/// LOINC code system URIs as sent by the servers we talk to.
pub const LOINC_SYSTEMS: [&str; 2] = ["http://loinc.org", "https://loinc.org"];

/// RxNorm code system URI.
pub const RXNORM_SYSTEM: &str = "http://www.nlm.nih.gov/research/umls/rxnorm";

/// Errors returned by the `fhir` boundary crate.
#[derive(Debug, thiserror::Error)]
pub enum FhirError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("translation error: {0}")]
    Translation(String),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("invalid reference: {0}")]
    InvalidReference(#[from] seneca_types::TextError),
}

/// Type alias for Results that can fail with a [`FhirError`].
pub type FhirResult<T> = Result<T, FhirError>;

/// Read the `resourceType` discriminator of a raw resource.
pub fn resource_type(value: &Value) -> Option<&str> {
    value.get("resourceType").and_then(Value::as_str)
}

/// True for the `OperationOutcome` entries some servers append to search results.
pub fn is_operation_outcome(value: &Value) -> bool {
    resource_type(value) == Some("OperationOutcome")
}

/// Deserialise `value` into a wire struct, reporting the path of the first mismatch.
pub(crate) fn strict<T: DeserializeOwned>(value: &Value, label: &str) -> FhirResult<T> {
    match serde_path_to_error::deserialize::<_, T>(value) {
        Ok(parsed) => Ok(parsed),
        Err(err) => {
            let path = err.path().to_string();
            let source = err.into_inner();
            let path = if path.is_empty() || path == "." {
                "<root>"
            } else {
                path.as_str()
            };
            Err(FhirError::Translation(format!(
                "{label} schema mismatch at {path}: {source}"
            )))
        }
    }
}

/// Reject resources whose `resourceType` is not the one expected.
pub(crate) fn expect_resource_type(actual: &str, expected: &str) -> FhirResult<()> {
    if actual != expected {
        return Err(FhirError::InvalidInput(format!(
            "Expected resourceType '{expected}', got '{actual}'"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_resource_type() {
        assert_eq!(resource_type(&json!({"resourceType": "Bundle"})), Some("Bundle"));
        assert_eq!(resource_type(&json!({"id": "x"})), None);
    }

    #[test]
    fn recognises_operation_outcome() {
        assert!(is_operation_outcome(&json!({"resourceType": "OperationOutcome"})));
        assert!(!is_operation_outcome(&json!({"resourceType": "Condition"})));
    }
}

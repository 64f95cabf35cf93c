//! FHIR MedicationRequest and Medication wire models.
//!
//! A medication order references a separate Medication resource; the normalised drug codes
//! live on the Medication, so flattening an order needs both.

use crate::datatypes::{CodeableConcept, Reference};
use crate::{datetime, expect_resource_type, strict, FhirResult, RXNORM_SYSTEM};
use chrono::{DateTime, FixedOffset};
use serde::Deserialize;
use serde_json::Value;

// ============================================================================
// Public domain-level types
// ============================================================================

/// Domain-level carrier for a medication order.
#[derive(Clone, Debug, PartialEq)]
pub struct MedicationRequestData {
    pub id: Option<String>,

    /// When the order was placed. Always carries a timezone offset.
    pub authored_on: Option<DateTime<FixedOffset>>,

    pub medication: Option<Reference>,
    pub subject: Option<Reference>,
    pub encounter: Option<Reference>,
    pub course_of_therapy_type: Option<CodeableConcept>,
}

/// Domain-level carrier for a medication definition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MedicationData {
    pub id: Option<String>,
    pub code: Option<CodeableConcept>,
    pub form: Option<CodeableConcept>,
}

impl MedicationData {
    /// RxNorm codes of this medication, in document order.
    pub fn rxnorm_codes(&self) -> Vec<String> {
        self.code
            .as_ref()
            .map(|c| c.codes_from(RXNORM_SYSTEM).map(str::to_owned).collect())
            .unwrap_or_default()
    }
}

// ============================================================================
// Public operations
// ============================================================================

/// MedicationRequest resource operations.
pub struct MedicationRequest;

impl MedicationRequest {
    /// Parse a medication order.
    ///
    /// # Errors
    ///
    /// Returns [`crate::FhirError`] if the resource does not match the wire schema, is not a
    /// MedicationRequest, or `authoredOn` lacks a timezone offset. A naive `authoredOn` cannot
    /// be compared with a timezone-aware encounter start, so it is rejected rather than
    /// coerced.
    pub fn parse(value: &Value) -> FhirResult<MedicationRequestData> {
        let wire: MedicationRequestWire = strict(value, "MedicationRequest")?;
        expect_resource_type(&wire.resource_type, "MedicationRequest")?;

        let authored_on = wire
            .authored_on
            .as_deref()
            .map(datetime::parse_instant)
            .transpose()?;

        Ok(MedicationRequestData {
            id: wire.id,
            authored_on,
            medication: wire.medication_reference,
            subject: wire.subject,
            encounter: wire.encounter,
            course_of_therapy_type: wire.course_of_therapy_type,
        })
    }
}

/// Medication resource operations.
pub struct Medication;

impl Medication {
    /// Parse a medication definition.
    ///
    /// # Errors
    ///
    /// Returns [`crate::FhirError`] if the resource does not match the wire schema or is not a
    /// Medication.
    pub fn parse(value: &Value) -> FhirResult<MedicationData> {
        let wire: MedicationWire = strict(value, "Medication")?;
        expect_resource_type(&wire.resource_type, "Medication")?;

        Ok(MedicationData {
            id: wire.id,
            code: wire.code,
            form: wire.form,
        })
    }
}

// ============================================================================
// Wire types (internal)
// ============================================================================

#[derive(Clone, Debug, Deserialize)]
struct MedicationRequestWire {
    #[serde(rename = "resourceType")]
    resource_type: String,

    #[serde(default)]
    id: Option<String>,

    #[serde(rename = "authoredOn", default)]
    authored_on: Option<String>,

    #[serde(rename = "medicationReference", default)]
    medication_reference: Option<Reference>,

    #[serde(default)]
    subject: Option<Reference>,

    #[serde(default)]
    encounter: Option<Reference>,

    #[serde(rename = "courseOfTherapyType", default)]
    course_of_therapy_type: Option<CodeableConcept>,
}

#[derive(Clone, Debug, Deserialize)]
struct MedicationWire {
    #[serde(rename = "resourceType")]
    resource_type: String,

    #[serde(default)]
    id: Option<String>,

    #[serde(default)]
    code: Option<CodeableConcept>,

    #[serde(default)]
    form: Option<CodeableConcept>,
}

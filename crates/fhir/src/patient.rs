//! FHIR Patient wire model and translation helpers.
//!
//! Responsibilities:
//! - Define the domain-level demographic carrier used by the cohort assembler
//! - Provide a strict parse that validates the resource against the wire schema
//! - Provide a loose parse that reads the needed fields directly from the raw JSON
//!
//! Notes:
//! - Some servers emit `link` entries without the required `other` element, which fails the
//!   strict parse. Callers fall back to [`Patient::parse_loose`] rather than losing the
//!   patient record.

use crate::datatypes::Reference;
use crate::{datetime, expect_resource_type, strict, FhirError, FhirResult};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;

// ============================================================================
// Public domain-level types
// ============================================================================

/// Administrative gender.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdministrativeGender {
    Male,
    Female,
    Other,
    Unknown,
}

impl AdministrativeGender {
    /// Parse from FHIR wire format string.
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "male" => Some(AdministrativeGender::Male),
            "female" => Some(AdministrativeGender::Female),
            "other" => Some(AdministrativeGender::Other),
            "unknown" => Some(AdministrativeGender::Unknown),
            _ => None,
        }
    }
}

/// Domain-level carrier for patient demographics.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatientData {
    /// Server-internal id. Always present after a strict parse.
    pub id: Option<String>,

    pub gender: Option<AdministrativeGender>,

    pub birth_date: Option<NaiveDate>,

    pub deceased: Option<bool>,
}

// ============================================================================
// Public Patient operations
// ============================================================================

/// Patient resource operations.
///
/// This is a zero-sized type used for namespacing patient-related operations.
/// All methods are associated functions.
pub struct Patient;

impl Patient {
    /// Parse a patient resource, validating it against the wire schema.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError`] if:
    /// - any field has an unexpected type or a required element is missing,
    /// - resourceType is not "Patient",
    /// - birthDate is not a `YYYY-MM-DD` date.
    pub fn parse_strict(value: &Value) -> FhirResult<PatientData> {
        let wire: PatientWire = strict(value, "Patient")?;
        expect_resource_type(&wire.resource_type, "Patient")?;

        let birth_date = wire
            .birth_date
            .as_deref()
            .map(|s| {
                NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| {
                    FhirError::Translation(format!("Invalid Patient.birthDate '{s}': {e}"))
                })
            })
            .transpose()?;

        Ok(PatientData {
            id: Some(wire.id),
            gender: wire.gender,
            birth_date,
            deceased: wire.deceased_boolean,
        })
    }

    /// Read demographics directly from the raw JSON without schema validation.
    ///
    /// Fields that are absent or of the wrong shape come back as `None`.
    pub fn parse_loose(value: &Value) -> PatientData {
        PatientData {
            id: value.get("id").and_then(Value::as_str).map(str::to_owned),
            gender: value
                .get("gender")
                .and_then(Value::as_str)
                .and_then(AdministrativeGender::from_wire),
            birth_date: value
                .get("birthDate")
                .and_then(Value::as_str)
                .and_then(datetime::parse_date),
            deceased: value.get("deceasedBoolean").and_then(Value::as_bool),
        }
    }
}

// ============================================================================
// Wire types (internal)
// ============================================================================

#[derive(Clone, Debug, Deserialize)]
struct PatientWire {
    #[serde(rename = "resourceType")]
    resource_type: String,

    id: String,

    #[serde(default)]
    gender: Option<AdministrativeGender>,

    #[serde(rename = "birthDate", default)]
    birth_date: Option<String>,

    #[serde(rename = "deceasedBoolean", default)]
    deceased_boolean: Option<bool>,

    #[serde(default)]
    #[allow(dead_code)]
    link: Vec<PatientLinkWire>,
}

/// `Patient.link`; both elements are mandatory in R4.
#[derive(Clone, Debug, Deserialize)]
#[allow(dead_code)]
struct PatientLinkWire {
    other: Reference,
    #[serde(rename = "type")]
    link_type: String,
}

//! FHIR Observation wire model and translation helpers.
//!
//! Covers both single-valued observations (labs, most vitals) and multi-component panels such
//! as blood pressure, where each component carries its own code and quantity.

use crate::datatypes::{CodeableConcept, Quantity};
use crate::{datetime, expect_resource_type, strict, FhirResult};
use chrono::{DateTime, FixedOffset};
use serde::Deserialize;
use serde_json::Value;

// ============================================================================
// Public domain-level types
// ============================================================================

/// The recorded value of an observation.
#[derive(Clone, Debug, PartialEq)]
pub enum ObservationValue {
    Quantity { value: f64, unit: Option<String> },
    Text(String),
}

impl ObservationValue {
    /// Numeric reading; text values are parsed when they hold a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            ObservationValue::Quantity { value, .. } => Some(*value),
            ObservationValue::Text(text) => text.trim().parse().ok(),
        }
    }

    pub fn unit(&self) -> Option<&str> {
        match self {
            ObservationValue::Quantity { unit, .. } => unit.as_deref(),
            ObservationValue::Text(_) => None,
        }
    }
}

/// One component of a multi-component observation.
#[derive(Clone, Debug, PartialEq)]
pub struct ComponentData {
    pub code: CodeableConcept,
    pub value: Option<Quantity>,
}

/// Domain-level carrier for an observation.
#[derive(Clone, Debug, PartialEq)]
pub struct ObservationData {
    pub id: String,
    pub code: CodeableConcept,
    pub issued: Option<DateTime<FixedOffset>>,
    pub effective: Option<DateTime<FixedOffset>>,
    pub value: Option<ObservationValue>,
    /// `Some` whenever the resource carries a `component` array, even an empty one.
    pub components: Option<Vec<ComponentData>>,
}

impl ObservationData {
    /// `issued` if present, otherwise `effectiveDateTime`.
    pub fn timestamp(&self) -> Option<DateTime<FixedOffset>> {
        self.issued.or(self.effective)
    }
}

// ============================================================================
// Public Observation operations
// ============================================================================

/// Observation resource operations.
///
/// This is a zero-sized type used for namespacing observation-related operations.
pub struct Observation;

impl Observation {
    /// Parse an observation resource.
    ///
    /// Timestamps without a timezone suffix are read as UTC.
    ///
    /// # Errors
    ///
    /// Returns [`crate::FhirError`] if the resource does not match the wire schema, is not an
    /// Observation, or carries an unreadable timestamp.
    pub fn parse(value: &Value) -> FhirResult<ObservationData> {
        let wire: ObservationWire = strict(value, "Observation")?;
        expect_resource_type(&wire.resource_type, "Observation")?;

        let issued = wire
            .issued
            .as_deref()
            .map(datetime::parse_instant_assume_utc)
            .transpose()?;
        let effective = wire
            .effective_date_time
            .as_deref()
            .map(datetime::parse_instant_assume_utc)
            .transpose()?;

        let value = match (wire.value_quantity, wire.value_string) {
            (Some(Quantity { value: Some(v), unit }), _) => {
                Some(ObservationValue::Quantity { value: v, unit })
            }
            (_, Some(text)) => Some(ObservationValue::Text(text)),
            _ => None,
        };

        let components = wire.component.map(|components| {
            components
                .into_iter()
                .map(|c| ComponentData {
                    code: c.code.unwrap_or_default(),
                    value: c.value_quantity,
                })
                .collect()
        });

        Ok(ObservationData {
            id: wire.id,
            code: wire.code,
            issued,
            effective,
            value,
            components,
        })
    }
}

// ============================================================================
// Wire types (internal)
// ============================================================================

#[derive(Clone, Debug, Deserialize)]
struct ObservationWire {
    #[serde(rename = "resourceType")]
    resource_type: String,

    id: String,

    code: CodeableConcept,

    #[serde(default)]
    issued: Option<String>,

    #[serde(rename = "effectiveDateTime", default)]
    effective_date_time: Option<String>,

    #[serde(rename = "valueQuantity", default)]
    value_quantity: Option<Quantity>,

    #[serde(rename = "valueString", default)]
    value_string: Option<String>,

    #[serde(default)]
    component: Option<Vec<ComponentWire>>,
}

#[derive(Clone, Debug, Deserialize)]
struct ComponentWire {
    #[serde(default)]
    code: Option<CodeableConcept>,

    #[serde(rename = "valueQuantity", default)]
    value_quantity: Option<Quantity>,
}

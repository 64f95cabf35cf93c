//! FHIR Condition wire model.

use crate::datatypes::{CodeableConcept, Period};
use crate::{expect_resource_type, strict, FhirResult};
use serde::Deserialize;
use serde_json::Value;

/// Domain-level carrier for a condition / diagnosis.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConditionData {
    pub id: Option<String>,
    pub category: Vec<CodeableConcept>,
    pub code: Option<CodeableConcept>,
    pub onset_period: Option<Period>,
}

/// Condition resource operations.
pub struct Condition;

impl Condition {
    /// Parse a condition resource.
    ///
    /// # Errors
    ///
    /// Returns [`crate::FhirError`] if the resource does not match the wire schema or is not a
    /// Condition.
    pub fn parse(value: &Value) -> FhirResult<ConditionData> {
        let wire: ConditionWire = strict(value, "Condition")?;
        expect_resource_type(&wire.resource_type, "Condition")?;

        Ok(ConditionData {
            id: wire.id,
            category: wire.category,
            code: wire.code,
            onset_period: wire.onset_period,
        })
    }
}

#[derive(Clone, Debug, Deserialize)]
struct ConditionWire {
    #[serde(rename = "resourceType")]
    resource_type: String,

    #[serde(default)]
    id: Option<String>,

    #[serde(default)]
    category: Vec<CodeableConcept>,

    #[serde(default)]
    code: Option<CodeableConcept>,

    #[serde(rename = "onsetPeriod", default)]
    onset_period: Option<Period>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_condition() {
        let value = json!({
            "resourceType": "Condition",
            "id": "c1",
            "category": [{"text": "Problem List Item"}],
            "code": {"coding": [{"system": "http://hl7.org/fhir/sid/icd-10-cm", "code": "A41.9"}], "text": "Sepsis"},
            "onsetPeriod": {"start": "2020-02-01"}
        });

        let cond = Condition::parse(&value).expect("parse condition");
        assert_eq!(cond.category[0].text.as_deref(), Some("Problem List Item"));
        assert_eq!(cond.code.and_then(|c| c.text), Some("Sepsis".to_string()));
        assert_eq!(
            cond.onset_period.and_then(|p| p.start),
            Some("2020-02-01".to_string())
        );
    }

    #[test]
    fn category_must_be_a_list() {
        let value = json!({"resourceType": "Condition", "category": {"text": "x"}});
        assert!(Condition::parse(&value).is_err());
    }
}

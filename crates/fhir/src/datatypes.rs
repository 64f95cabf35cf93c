//! FHIR complex datatypes shared across resources.
//!
//! These are permissive: every element is optional and unknown elements are ignored, since
//! servers populate far more of each datatype than the pipeline reads.

use serde::{Deserialize, Serialize};

/// A code drawn from a terminology system.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Coding {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

impl Coding {
    /// True if this coding comes from one of `systems`.
    pub fn is_from(&self, systems: &[&str]) -> bool {
        self.system
            .as_deref()
            .is_some_and(|system| systems.contains(&system))
    }
}

/// A set of codings plus free text.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct CodeableConcept {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub coding: Vec<Coding>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl CodeableConcept {
    /// Codes from the given system, in document order.
    pub fn codes_from<'a>(&'a self, system: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.coding
            .iter()
            .filter(move |c| c.system.as_deref() == Some(system))
            .filter_map(|c| c.code.as_deref())
    }
}

/// A measured amount.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct Quantity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

/// A literal reference to another resource.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Reference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

impl Reference {
    /// The id half of a `Type/id` reference, if the reference is well formed.
    pub fn target_id(&self) -> Option<String> {
        self.reference
            .as_deref()
            .and_then(|r| seneca_types::ResourceReference::parse(r).ok())
            .map(|r| r.id().to_owned())
    }
}

/// A time range; either bound may be absent. Bounds are kept as sent.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Period {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_codes_by_system() {
        let concept: CodeableConcept = serde_json::from_value(serde_json::json!({
            "coding": [
                {"system": "http://loinc.org", "code": "2524-7"},
                {"system": "urn:oid:1.2.840", "code": "LAC"},
                {"system": "http://loinc.org", "code": "32693-4"}
            ],
            "text": "Lactate"
        }))
        .expect("parse concept");

        let loinc: Vec<_> = concept.codes_from("http://loinc.org").collect();
        assert_eq!(loinc, vec!["2524-7", "32693-4"]);
    }

    #[test]
    fn target_id_requires_type_and_id() {
        let r = Reference {
            reference: Some("Encounter/eKUr1".into()),
            display: None,
        };
        assert_eq!(r.target_id(), Some("eKUr1".to_string()));

        let bad = Reference {
            reference: Some("eKUr1".into()),
            display: None,
        };
        assert_eq!(bad.target_id(), None);
    }
}

//! Condition flattening: diagnosis codes, category, description and best-effort onset dates.

use super::{flatten_pages, page_resources};
use crate::constants::DEFAULT_CONDITION_CATEGORY;
use crate::{CoreError, CoreResult};
use chrono::NaiveDate;
use fhir::datetime::parse_date;
use fhir::Condition;
use serde::Serialize;
use serde_json::Value;

/// One flattened condition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ConditionRow {
    pub id: Option<String>,
    pub category: String,
    /// Diagnosis-classification codes only; see [`is_diagnosis_code`].
    pub codes: Vec<String>,
    pub description: Option<String>,
    pub onset_start: Option<NaiveDate>,
    pub onset_end: Option<NaiveDate>,
}

/// True for codes shaped like a diagnosis classification (`A41.9`, `R65`), false for purely
/// numeric codes from other terminologies.
///
/// Only the part before the first `.` is inspected. It must be non-empty, alphanumeric, and
/// contain at least one letter.
pub fn is_diagnosis_code(code: &str) -> bool {
    let head = code.split('.').next().unwrap_or_default();
    !head.is_empty()
        && head.chars().all(char::is_alphanumeric)
        && head.chars().any(|c| !c.is_numeric())
}

/// Flatten one Condition search page.
///
/// # Errors
///
/// Returns [`CoreError::NoSearchResults`] for an empty page and [`CoreError::Parse`] if the
/// page or any condition on it is malformed.
pub fn condition_rows(page: &Value) -> CoreResult<Vec<ConditionRow>> {
    let resources = page_resources("Condition", page)?;

    resources
        .iter()
        .map(|resource| {
            let condition =
                Condition::parse(resource).map_err(|e| CoreError::parse("Condition", e))?;

            let category = condition
                .category
                .first()
                .and_then(|c| c.text.clone())
                .unwrap_or_else(|| DEFAULT_CONDITION_CATEGORY.to_owned());

            let codes = condition
                .code
                .as_ref()
                .map(|c| {
                    c.coding
                        .iter()
                        .filter_map(|coding| coding.code.as_deref())
                        .filter(|code| is_diagnosis_code(code))
                        .map(str::to_owned)
                        .collect()
                })
                .unwrap_or_default();

            let onset = condition.onset_period.as_ref();
            Ok(ConditionRow {
                id: condition.id.clone(),
                category,
                codes,
                description: condition.code.as_ref().and_then(|c| c.text.clone()),
                onset_start: onset.and_then(|p| p.start.as_deref()).and_then(parse_date),
                onset_end: onset.and_then(|p| p.end.as_deref()).and_then(parse_date),
            })
        })
        .collect()
}

/// Flatten every page of a Condition search.
pub fn flatten_conditions<I>(pages: I) -> Vec<ConditionRow>
where
    I: IntoIterator<Item = Value>,
{
    flatten_pages("Condition", pages, condition_rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn diagnosis_code_shape() {
        assert!(is_diagnosis_code("A41.9"));
        assert!(is_diagnosis_code("R65"));
        assert!(is_diagnosis_code("E11.65"));
        assert!(!is_diagnosis_code("91302008"));
        assert!(!is_diagnosis_code("038.9"));
        assert!(!is_diagnosis_code(""));
        assert!(!is_diagnosis_code(".5"));
        assert!(!is_diagnosis_code("A-41"));
    }

    #[test]
    fn flattens_condition_page() {
        let page = json!({
            "resourceType": "Bundle",
            "entry": [
                {"resource": {
                    "resourceType": "Condition",
                    "id": "c1",
                    "category": [{"text": "Problem List"}],
                    "code": {
                        "coding": [
                            {"system": "http://snomed.info/sct", "code": "91302008"},
                            {"system": "http://hl7.org/fhir/sid/icd-10-cm", "code": "A41.9"}
                        ],
                        "text": "Sepsis"
                    },
                    "onsetPeriod": {"start": "2022-01-09", "end": "not a date"}
                }},
                {"resource": {"resourceType": "Condition", "id": "c2"}}
            ]
        });

        let rows = condition_rows(&page).expect("rows");
        assert_eq!(rows.len(), 2);

        assert_eq!(rows[0].category, "Problem List");
        assert_eq!(rows[0].codes, vec!["A41.9"]);
        assert_eq!(rows[0].description.as_deref(), Some("Sepsis"));
        assert_eq!(rows[0].onset_start, NaiveDate::from_ymd_opt(2022, 1, 9));
        assert_eq!(rows[0].onset_end, None);

        assert_eq!(rows[1].category, "default");
        assert!(rows[1].codes.is_empty());
    }

    #[test]
    fn empty_search_yields_empty_table() {
        let rows = flatten_conditions(vec![json!({"resourceType": "Bundle", "total": 0})]);
        assert!(rows.is_empty());
    }
}

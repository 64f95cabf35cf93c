//! Resource flattening.
//!
//! Each flattener turns one search page into typed rows. Per page, the rules are the same for
//! every resource type:
//! - a page with no entries is [`CoreError::NoSearchResults`]
//! - a page that does not parse is [`CoreError::Parse`], and none of its rows survive
//! - `OperationOutcome` entries are skipped
//!
//! The `flatten_*` functions run a page flattener over a whole search and concatenate the
//! results. Page-level faults are logged there and the page contributes an empty table, so a
//! bad page never takes the rest of the encounter with it.

pub mod condition;
pub mod medication;
pub mod observation;
pub mod patient;

pub use condition::{condition_rows, flatten_conditions, is_diagnosis_code, ConditionRow};
pub use medication::{
    flatten_medication_requests, medication_request_rows, MedicationRow, MedicationSource,
};
pub use observation::{flatten_observations, observation_rows, ObservationRow};
pub use patient::{flatten_patient, PatientRow};

use crate::{CoreError, CoreResult};
use fhir::Bundle;
use serde_json::Value;

/// Resources carried by a search page, excluding `OperationOutcome` entries.
pub(crate) fn page_resources(resource_type: &str, page: &Value) -> CoreResult<Vec<Value>> {
    let bundle =
        Bundle::parse(page).map_err(|e| CoreError::parse(format!("{resource_type} bundle"), e))?;

    if bundle.is_empty() {
        return Err(CoreError::no_results(resource_type));
    }

    Ok(bundle
        .entries
        .into_iter()
        .filter(|entry| {
            let outcome = fhir::is_operation_outcome(entry);
            if outcome {
                tracing::debug!("skipping OperationOutcome in {} page", resource_type);
            }
            !outcome
        })
        .collect())
}

/// Run a page flattener over every page, keeping the rows of pages that succeed.
pub(crate) fn flatten_pages<T, I, F>(resource_type: &str, pages: I, mut flatten_page: F) -> Vec<T>
where
    I: IntoIterator<Item = Value>,
    F: FnMut(&Value) -> CoreResult<Vec<T>>,
{
    let mut rows = Vec::new();
    for (idx, page) in pages.into_iter().enumerate() {
        match flatten_page(&page) {
            Ok(mut page_rows) => rows.append(&mut page_rows),
            Err(CoreError::NoSearchResults { .. }) => {
                tracing::info!("no {} results on page {}", resource_type, idx + 1);
            }
            Err(e) => {
                tracing::warn!("dropping {} page {}: {}", resource_type, idx + 1, e);
            }
        }
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_bundle_is_no_search_results() {
        let err = page_resources("Observation", &json!({"resourceType": "Bundle", "total": 0}))
            .expect_err("should fail");
        match err {
            CoreError::NoSearchResults { resource_type } => {
                assert_eq!(resource_type, "Observation")
            }
            other => panic!("expected NoSearchResults, got {other:?}"),
        }
    }

    #[test]
    fn non_bundle_page_is_parse_error() {
        let err = page_resources(
            "Condition",
            &json!({"resourceType": "OperationOutcome", "issue": []}),
        )
        .expect_err("should fail");
        assert!(matches!(err, CoreError::Parse { .. }));
    }

    #[test]
    fn operation_outcome_entries_are_skipped() {
        let page = json!({
            "resourceType": "Bundle",
            "entry": [
                {"resource": {"resourceType": "OperationOutcome", "issue": []}},
                {"resource": {"resourceType": "Condition", "id": "c1"}}
            ]
        });
        let resources = page_resources("Condition", &page).expect("resources");
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0]["id"], "c1");
    }

    #[test]
    fn failed_pages_contribute_nothing() {
        let pages = vec![json!(1), json!(2), json!(3)];
        let rows: Vec<i64> = flatten_pages("Test", pages, |page| match page.as_i64() {
            Some(2) => Err(CoreError::parse("Test", "bad page")),
            Some(3) => Err(CoreError::no_results("Test")),
            Some(n) => Ok(vec![n, n * 10]),
            None => Ok(vec![]),
        });
        assert_eq!(rows, vec![1, 10]);
    }
}

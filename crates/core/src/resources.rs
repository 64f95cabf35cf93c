//! Resource-specific searches and reads used by cohort assembly.

use crate::connection::Connection;
use crate::constants::INPATIENT_ORDER_CATEGORY;
use crate::fetcher::{DateWindow, PageFetcher};
use crate::CoreResult;
use serde_json::Value;

impl Connection {
    /// Encounters within a date window.
    pub fn encounters(&self, window: &DateWindow) -> CoreResult<PageFetcher<'_>> {
        self.search("Encounter", &window.query_pairs())
    }

    /// A patient's observations in one category (`vital-signs`, `laboratory`) within a window.
    pub fn observations(
        &self,
        patient_id: &str,
        category: &str,
        window: &DateWindow,
    ) -> CoreResult<PageFetcher<'_>> {
        let mut query = vec![
            ("patient", patient_id.to_owned()),
            ("category", category.to_owned()),
        ];
        query.extend(window.query_pairs());
        self.search("Observation", &query)
    }

    /// A patient's inpatient medication orders within a window.
    pub fn medication_requests(
        &self,
        patient_id: &str,
        window: &DateWindow,
    ) -> CoreResult<PageFetcher<'_>> {
        let mut query = vec![
            ("patient", patient_id.to_owned()),
            ("category", INPATIENT_ORDER_CATEGORY.to_owned()),
        ];
        query.extend(window.query_pairs());
        self.search("MedicationRequest", &query)
    }

    /// All of a patient's conditions. Condition searches carry no date filter.
    pub fn conditions(&self, patient_id: &str) -> CoreResult<PageFetcher<'_>> {
        self.search("Condition", &[("patient", patient_id.to_owned())])
    }

    pub fn patient(&self, patient_id: &str) -> CoreResult<Value> {
        self.read("Patient", patient_id)
    }

    pub fn medication(&self, medication_id: &str) -> CoreResult<Value> {
        self.read("Medication", medication_id)
    }
}

//! Medication order flattening.
//!
//! Drug codes live on the Medication resource an order points at, so every retained order costs
//! one extra read. Orders placed before the encounter started are dropped before that read.

use super::{flatten_pages, page_resources};
use crate::connection::Connection;
use crate::reference::ReferenceData;
use crate::{CoreError, CoreResult};
use chrono::{DateTime, FixedOffset};
use fhir::{Medication, MedicationRequest};
use serde::Serialize;
use serde_json::Value;

/// Reads Medication resources by id.
pub trait MedicationSource {
    fn fetch_medication(&self, medication_id: &str) -> CoreResult<Value>;
}

impl MedicationSource for Connection {
    fn fetch_medication(&self, medication_id: &str) -> CoreResult<Value> {
        self.medication(medication_id)
    }
}

/// One medication order placed during an encounter.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MedicationRow {
    pub order_id: Option<String>,
    pub medication_id: String,
    pub patient_id: Option<String>,
    pub encounter_id: Option<String>,
    pub ordered_at: DateTime<FixedOffset>,
    pub display: Option<String>,
    pub code_text: Option<String>,
    pub form_text: Option<String>,
    pub therapy_type: Option<String>,
    pub rxnorm_codes: Vec<String>,
    pub is_antibiotic: bool,
    /// Hours from encounter start to the order. Never negative.
    pub hours_since_start: f64,
}

fn hours_between(start: DateTime<FixedOffset>, end: DateTime<FixedOffset>) -> f64 {
    (end - start).num_milliseconds() as f64 / 3_600_000.0
}

/// Flatten one MedicationRequest search page.
///
/// # Arguments
///
/// * `page` - Search page.
/// * `encounter_start` - Orders authored before this instant are dropped.
/// * `source` - Reader for the Medication resources the orders reference.
/// * `reference` - Supplies the antibiotic code set.
///
/// # Errors
///
/// Returns [`CoreError::NoSearchResults`] for an empty page, [`CoreError::Parse`] if an order
/// or medication is malformed (including an `authoredOn` without a timezone), or the
/// medication reader's error if a lookup fails. Any error discards the whole page.
pub fn medication_request_rows(
    page: &Value,
    encounter_start: DateTime<FixedOffset>,
    source: &dyn MedicationSource,
    reference: &ReferenceData,
) -> CoreResult<Vec<MedicationRow>> {
    let resources = page_resources("MedicationRequest", page)?;

    let mut rows = Vec::new();
    for resource in &resources {
        let order = MedicationRequest::parse(resource)
            .map_err(|e| CoreError::parse("MedicationRequest", e))?;

        let Some(ordered_at) = order.authored_on else {
            tracing::debug!("order {:?} has no authoredOn; skipped", order.id);
            continue;
        };
        if ordered_at < encounter_start {
            continue;
        }

        let Some(medication_id) = order.medication.as_ref().and_then(|m| m.target_id()) else {
            tracing::warn!("order {:?} references no Medication; skipped", order.id);
            continue;
        };

        let medication = Medication::parse(&source.fetch_medication(&medication_id)?)
            .map_err(|e| CoreError::parse("Medication", e))?;
        let rxnorm_codes = medication.rxnorm_codes();
        let hours_since_start = hours_between(encounter_start, ordered_at);
        debug_assert!(hours_since_start >= 0.0);

        rows.push(MedicationRow {
            order_id: order.id.clone(),
            medication_id,
            patient_id: order.subject.as_ref().and_then(|s| s.target_id()),
            encounter_id: order.encounter.as_ref().and_then(|e| e.target_id()),
            ordered_at,
            display: order.medication.as_ref().and_then(|m| m.display.clone()),
            code_text: medication.code.as_ref().and_then(|c| c.text.clone()),
            form_text: medication.form.as_ref().and_then(|f| f.text.clone()),
            therapy_type: order
                .course_of_therapy_type
                .as_ref()
                .and_then(|t| t.text.clone()),
            is_antibiotic: reference.is_antibiotic(rxnorm_codes.as_slice()),
            rxnorm_codes,
            hours_since_start,
        });
    }

    Ok(rows)
}

/// Flatten every page of a MedicationRequest search.
pub fn flatten_medication_requests<I>(
    pages: I,
    encounter_start: DateTime<FixedOffset>,
    source: &dyn MedicationSource,
    reference: &ReferenceData,
) -> Vec<MedicationRow>
where
    I: IntoIterator<Item = Value>,
{
    flatten_pages("MedicationRequest", pages, |page| {
        medication_request_rows(page, encounter_start, source, reference)
    })
}

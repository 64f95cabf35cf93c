//! Observation flattening.
//!
//! Only LOINC codings are candidates for value-set matching, and the bare vital-signs panel code
//! is never one. A single-valued observation becomes one row matched on the first candidate
//! the value-set table knows. A multi-component observation becomes one row per coding of each
//! valued component, each carrying the parent's candidate codes plus its own; components
//! without a value are dropped.

use super::{flatten_pages, page_resources};
use crate::constants::VITAL_SIGNS_PANEL_CODE;
use crate::reference::{ReferenceData, ValueSetEntry};
use crate::{CoreError, CoreResult};
use chrono::{DateTime, FixedOffset};
use fhir::{Coding, Observation, ObservationData, ObservationValue, LOINC_SYSTEMS};
use serde::Serialize;
use serde_json::Value;

/// One flattened observation value.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ObservationRow {
    pub id: String,
    pub timestamp: DateTime<FixedOffset>,
    pub value: Option<f64>,
    pub value_text: Option<String>,
    pub unit: Option<String>,
    pub codes: Vec<String>,
    pub code_text: Option<String>,
    pub matched_code: Option<String>,
    pub matched_display: Option<String>,
    pub code_system: Option<String>,
    pub element_id: Option<u32>,
    pub element_name: Option<String>,
    pub is_culture: bool,
}

impl ObservationRow {
    fn new(observation: &ObservationData, timestamp: DateTime<FixedOffset>) -> Self {
        Self {
            id: observation.id.clone(),
            timestamp,
            value: None,
            value_text: None,
            unit: None,
            codes: Vec::new(),
            code_text: observation.code.text.clone(),
            matched_code: None,
            matched_display: None,
            code_system: None,
            element_id: None,
            element_name: None,
            is_culture: false,
        }
    }

    fn with_match(
        mut self,
        entry: Option<&ValueSetEntry>,
        coding: Option<&Coding>,
        reference: &ReferenceData,
    ) -> Self {
        if let Some(entry) = entry {
            self.matched_code = Some(entry.code.clone());
            self.code_system = Some(entry.code_system.clone());
            self.element_id = Some(entry.element_id);
            self.element_name = Some(entry.element_name.clone());
            self.matched_display = coding.and_then(|c| c.display.clone());
            self.is_culture = reference.is_blood_culture(entry);
        }
        self
    }
}

fn is_candidate(coding: &Coding) -> bool {
    coding.is_from(&LOINC_SYSTEMS) && coding.code.as_deref() != Some(VITAL_SIGNS_PANEL_CODE)
}

fn rows_for(observation: &ObservationData, reference: &ReferenceData) -> Vec<ObservationRow> {
    let Some(timestamp) = observation.timestamp() else {
        tracing::warn!(
            "observation {} has neither issued nor effective time; skipped",
            observation.id
        );
        return Vec::new();
    };

    let candidates: Vec<&Coding> = observation
        .code
        .coding
        .iter()
        .filter(|c| is_candidate(c))
        .collect();
    let codes: Vec<String> = candidates.iter().filter_map(|c| c.code.clone()).collect();
    let table = reference.value_sets();

    match observation.components.as_deref() {
        Some(components) if !components.is_empty() => components
            .iter()
            .filter_map(|component| {
                let quantity = component.value.as_ref()?;
                quantity.value.map(|value| (component, quantity, value))
            })
            .flat_map(|(component, quantity, value)| {
                component
                    .code
                    .coding
                    .iter()
                    .map(move |coding| (quantity, value, coding))
            })
            .map(|(quantity, value, coding)| {
                let entry = coding.code.as_deref().and_then(|code| table.lookup(code));

                let mut row = ObservationRow::new(observation, timestamp);
                row.codes = codes.clone();
                row.codes.extend(coding.code.clone());
                row.value = Some(value);
                row.unit = quantity.unit.clone();
                row.with_match(entry, Some(coding), reference)
            })
            .collect(),
        _ => {
            let entry = table.best_match(codes.iter().map(String::as_str));
            let coding = entry.and_then(|e| {
                candidates
                    .iter()
                    .copied()
                    .find(|c| c.code.as_deref() == Some(e.code.as_str()))
            });

            let mut row = ObservationRow::new(observation, timestamp);
            row.codes = codes;
            if let Some(value) = &observation.value {
                row.value = value.as_number();
                row.unit = value.unit().map(str::to_owned);
                if let ObservationValue::Text(text) = value {
                    row.value_text = Some(text.clone());
                }
            }
            vec![row.with_match(entry, coding, reference)]
        }
    }
}

/// Flatten one Observation search page. Rows are ordered by observation id.
///
/// # Errors
///
/// Returns [`CoreError::NoSearchResults`] for an empty page and [`CoreError::Parse`] if the
/// page or any observation on it is malformed.
pub fn observation_rows(
    page: &Value,
    reference: &ReferenceData,
) -> CoreResult<Vec<ObservationRow>> {
    let resources = page_resources("Observation", page)?;

    let mut rows = Vec::new();
    for resource in &resources {
        let observation =
            Observation::parse(resource).map_err(|e| CoreError::parse("Observation", e))?;
        rows.extend(rows_for(&observation, reference));
    }

    rows.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(rows)
}

/// Flatten every page of an Observation search.
pub fn flatten_observations<I>(pages: I, reference: &ReferenceData) -> Vec<ObservationRow>
where
    I: IntoIterator<Item = Value>,
{
    flatten_pages("Observation", pages, |page| observation_rows(page, reference))
}

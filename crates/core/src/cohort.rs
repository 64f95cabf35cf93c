//! Cohort assembly.
//!
//! Turns one encounter's flattened rows into a phenotype feature row:
//! 1. labs and vitals are each reduced to the latest row per value-set element
//! 2. temperatures in Fahrenheit and CRP in mg/dL are converted
//! 3. the two sets are merged and reduced again
//! 4. the survivors are joined onto the feature key list
//! 5. age, sex and the comorbidity scalar are derived from demographics and diagnoses

use crate::flatten::{ConditionRow, MedicationRow, ObservationRow, PatientRow};
use crate::reference::ReferenceData;
use chrono::{Datelike, NaiveDate};
use fhir::AdministrativeGender;
use phenotype::{Feature, FeatureRow};
use std::collections::{BTreeMap, BTreeSet};

const CELSIUS_UNIT: &str = "degC";
const CRP_MG_PER_L_UNIT: &str = "mg/L";

/// External comorbidity scoring, fed the encounter's diagnosis codes.
pub trait ComorbidityIndex {
    /// Mortality-risk scalar for a set of diagnosis codes, if one can be computed.
    fn mortality_score(&self, codes: &BTreeSet<String>) -> Option<f64>;
}

/// Comorbidity index that never produces a score. The `elix` feature is left missing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoComorbidityIndex;

impl ComorbidityIndex for NoComorbidityIndex {
    fn mortality_score(&self, _codes: &BTreeSet<String>) -> Option<f64> {
        None
    }
}

/// Keep the latest row for each value-set element.
///
/// Rows without an element are dropped. When two rows share an element and a timestamp, the
/// one later in `rows` wins. Output is ordered by element id.
pub fn latest_per_element(rows: &[ObservationRow]) -> Vec<ObservationRow> {
    let mut latest: BTreeMap<u32, &ObservationRow> = BTreeMap::new();
    for row in rows {
        let Some(element_id) = row.element_id else {
            continue;
        };
        match latest.get(&element_id) {
            Some(current) if current.timestamp > row.timestamp => {}
            _ => {
                latest.insert(element_id, row);
            }
        }
    }
    latest.into_values().cloned().collect()
}

fn is_fahrenheit(unit: &str) -> bool {
    matches!(
        unit.trim().to_ascii_lowercase().as_str(),
        "degf" | "[degf]" | "°f"
    )
}

/// Rewrite Fahrenheit vitals to Celsius. Rows already in Celsius are untouched.
pub fn normalise_vital_units(rows: &mut [ObservationRow]) {
    for row in rows.iter_mut() {
        if row.unit.as_deref().is_some_and(is_fahrenheit) {
            row.value = row.value.map(|v| (v - 32.0) * 5.0 / 9.0);
            row.unit = Some(CELSIUS_UNIT.to_owned());
        }
    }
}

/// Rewrite CRP results reported in mg/dL to mg/L.
pub fn normalise_lab_units(rows: &mut [ObservationRow], crp_element_id: u32) {
    for row in rows.iter_mut() {
        if row.element_id == Some(crp_element_id) && row.unit.as_deref() == Some("mg/dL") {
            row.value = row.value.map(|v| v * 10.0);
            row.unit = Some(CRP_MG_PER_L_UNIT.to_owned());
        }
    }
}

/// Whole years from `birth_date` to `on`, counting a year only once the birthday has passed.
pub fn calc_age(birth_date: NaiveDate, on: NaiveDate) -> i32 {
    let before_birthday = (on.month(), on.day()) < (birth_date.month(), birth_date.day());
    on.year() - birth_date.year() - i32::from(before_birthday)
}

/// Female = 0, male = 1, anything else is missing.
pub fn sex_indicator(gender: Option<AdministrativeGender>) -> Option<f64> {
    match gender {
        Some(AdministrativeGender::Female) => Some(0.0),
        Some(AdministrativeGender::Male) => Some(1.0),
        _ => None,
    }
}

/// De-duplicated diagnosis codes across an encounter's conditions.
pub fn diagnosis_codes(conditions: &[ConditionRow]) -> BTreeSet<String> {
    conditions
        .iter()
        .flat_map(|c| c.codes.iter().cloned())
        .collect()
}

/// Antibiotic orders placed less than `hours` after encounter start.
pub fn antibiotics_within(rows: &[MedicationRow], hours: f64) -> Vec<&MedicationRow> {
    rows.iter()
        .filter(|row| row.is_antibiotic && row.hours_since_start < hours)
        .collect()
}

/// Assemble one encounter's feature row.
///
/// # Arguments
///
/// * `patient` - Demographics; supplies age and sex.
/// * `vitals` - Flattened vital-sign rows.
/// * `labs` - Flattened laboratory rows.
/// * `conditions` - Flattened conditions; their codes feed the comorbidity index.
/// * `encounter_date` - Date age is measured at.
/// * `reference` - Feature key list and CRP element id.
/// * `comorbidity` - Source of the `elix` feature.
///
/// # Returns
///
/// A feature row with every column the encounter's data supports; the rest are missing.
pub fn assemble_features(
    patient: &PatientRow,
    vitals: &[ObservationRow],
    labs: &[ObservationRow],
    conditions: &[ConditionRow],
    encounter_date: NaiveDate,
    reference: &ReferenceData,
    comorbidity: &dyn ComorbidityIndex,
) -> FeatureRow {
    let mut labs = latest_per_element(labs);
    normalise_lab_units(&mut labs, reference.crp_element_id());

    let mut vitals = latest_per_element(vitals);
    normalise_vital_units(&mut vitals);

    let mut merged = labs;
    merged.extend(vitals);
    let by_element: BTreeMap<u32, Option<f64>> = latest_per_element(&merged)
        .into_iter()
        .filter_map(|row| row.element_id.map(|id| (id, row.value)))
        .collect();

    let mut features = FeatureRow::empty();
    for key in reference.features() {
        if let Some(value) = by_element.get(&key.element_id) {
            features.set(key.feature, *value);
        }
    }

    features.set(
        Feature::Age,
        patient
            .birth_date
            .map(|dob| f64::from(calc_age(dob, encounter_date))),
    );
    features.set(Feature::Sex, sex_indicator(patient.gender));
    features.set(
        Feature::Elix,
        comorbidity.mortality_score(&diagnosis_codes(conditions)),
    );

    tracing::debug!(
        "assembled {} of {} features",
        features.observed(),
        Feature::COUNT
    );
    features
}

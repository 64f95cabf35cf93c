//! Per-encounter retrieval, assembly and scoring.

use crate::cohort::{antibiotics_within, assemble_features, ComorbidityIndex};
use crate::connection::Connection;
use crate::constants::{
    DEFAULT_ANTIBIOTIC_WINDOW_HOURS, LABORATORY_CATEGORY, VITAL_SIGNS_CATEGORY,
};
use crate::fetcher::DateWindow;
use crate::flatten::{
    flatten_conditions, flatten_medication_requests, flatten_observations, flatten_patient,
    ConditionRow, MedicationRow, ObservationRow, PatientRow,
};
use crate::reference::ReferenceData;
use crate::CoreResult;
use chrono::{DateTime, FixedOffset, NaiveDate};
use phenotype::{FeatureRow, PhenotypeScore};
use seneca_types::NonEmptyText;
use serde::{Deserialize, Serialize};

/// One encounter to phenotype.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncounterRequest {
    pub encounter_id: NonEmptyText,
    /// Medical record number, resolved to a FHIR patient id by the backend.
    pub mrn: NonEmptyText,
    pub admitted_at: DateTime<FixedOffset>,
    #[serde(default)]
    pub discharged_at: Option<DateTime<FixedOffset>>,
    /// Identifier scope for lookup services that need one.
    #[serde(default)]
    pub scope: Option<NonEmptyText>,
}

impl EncounterRequest {
    /// Search window from the admission date to the discharge date, or `today` while the
    /// encounter is still open.
    pub fn window(&self, today: NaiveDate) -> DateWindow {
        let end = self
            .discharged_at
            .map(|d| d.date_naive())
            .unwrap_or(today);
        DateWindow::new(Some(self.admitted_at.date_naive()), Some(end))
    }
}

/// Everything retrieved for one encounter.
#[derive(Clone, Debug, PartialEq)]
pub struct EncounterData {
    pub patient_id: String,
    pub patient: PatientRow,
    pub vitals: Vec<ObservationRow>,
    pub labs: Vec<ObservationRow>,
    pub medications: Vec<MedicationRow>,
    pub conditions: Vec<ConditionRow>,
}

/// Output row for one encounter: identifiers, the 29 feature columns, one distance per
/// phenotype and the assigned phenotype.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EncounterResult {
    pub encounter_id: String,
    pub patient_id: String,
    #[serde(flatten)]
    pub features: FeatureRow,
    #[serde(flatten)]
    pub score: PhenotypeScore,
    pub early_antibiotics: usize,
}

/// Runs encounters against one connection.
pub struct Pipeline<'a> {
    connection: &'a Connection,
    reference: &'a ReferenceData,
    comorbidity: &'a dyn ComorbidityIndex,
    antibiotic_window_hours: f64,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        connection: &'a Connection,
        reference: &'a ReferenceData,
        comorbidity: &'a dyn ComorbidityIndex,
    ) -> Self {
        Self {
            connection,
            reference,
            comorbidity,
            antibiotic_window_hours: DEFAULT_ANTIBIOTIC_WINDOW_HOURS,
        }
    }

    pub fn with_antibiotic_window(mut self, hours: f64) -> Self {
        self.antibiotic_window_hours = hours;
        self
    }

    /// Retrieve and flatten everything one encounter needs.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError::Lookup`] if the MRN does not resolve, or the transport error
    /// if the Patient resource cannot be read. Faults in the observation, medication and
    /// condition searches are logged and leave the affected table short instead.
    pub fn collect(
        &self,
        request: &EncounterRequest,
        today: NaiveDate,
    ) -> CoreResult<EncounterData> {
        let conn = self.connection;
        let patient_id = conn.lookup_patient_id(
            request.mrn.as_str(),
            request.scope.as_ref().map(NonEmptyText::as_str),
        )?;
        let patient = flatten_patient(&conn.patient(&patient_id)?);
        let window = request.window(today);

        let vitals = flatten_observations(
            conn.observations(&patient_id, VITAL_SIGNS_CATEGORY, &window)?,
            self.reference,
        );
        let labs = flatten_observations(
            conn.observations(&patient_id, LABORATORY_CATEGORY, &window)?,
            self.reference,
        );
        let medications = flatten_medication_requests(
            conn.medication_requests(&patient_id, &window)?,
            request.admitted_at,
            conn,
            self.reference,
        );
        let conditions = flatten_conditions(conn.conditions(&patient_id)?);

        tracing::debug!(
            "encounter {}: {} vitals, {} labs, {} orders, {} conditions",
            request.encounter_id,
            vitals.len(),
            labs.len(),
            medications.len(),
            conditions.len()
        );

        Ok(EncounterData {
            patient_id,
            patient,
            vitals,
            labs,
            medications,
            conditions,
        })
    }

    /// Assemble and score already-collected encounter data.
    pub fn score(&self, request: &EncounterRequest, data: &EncounterData) -> EncounterResult {
        let features = assemble_features(
            &data.patient,
            &data.vitals,
            &data.labs,
            &data.conditions,
            request.admitted_at.date_naive(),
            self.reference,
            self.comorbidity,
        );
        let score = phenotype::score(&features);
        let early_antibiotics =
            antibiotics_within(&data.medications, self.antibiotic_window_hours).len();

        EncounterResult {
            encounter_id: request.encounter_id.to_string(),
            patient_id: data.patient_id.clone(),
            features,
            score,
            early_antibiotics,
        }
    }

    /// Collect, assemble and score one encounter.
    pub fn run_encounter(
        &self,
        request: &EncounterRequest,
        today: NaiveDate,
    ) -> CoreResult<EncounterResult> {
        let data = self.collect(request, today)?;
        let result = self.score(request, &data);
        tracing::info!(
            "encounter {} scored {} from {} features",
            request.encounter_id,
            result.score.phenotype,
            result.score.observed_features
        );
        Ok(result)
    }

    /// Score every encounter. An encounter that fails is logged and left out; the rest of the
    /// cohort still runs.
    pub fn run_cohort(
        &self,
        requests: &[EncounterRequest],
        today: NaiveDate,
    ) -> Vec<EncounterResult> {
        let results: Vec<EncounterResult> = requests
            .iter()
            .filter_map(|request| match self.run_encounter(request, today) {
                Ok(result) => Some(result),
                Err(e) => {
                    tracing::error!("dropping encounter {}: {}", request.encounter_id, e);
                    None
                }
            })
            .collect();

        tracing::info!(
            "scored {} of {} encounters",
            results.len(),
            requests.len()
        );
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cohort::NoComorbidityIndex;
    use crate::connection::testing::hapi_connection;
    use crate::transport::testing::FakeTransport;
    use phenotype::{Feature, Phenotype};
    use serde_json::{json, Value};

    const BASE: &str = "https://hapi.example.org/fhir";

    fn bundle(resources: Vec<Value>) -> Value {
        json!({
            "resourceType": "Bundle",
            "entry": resources.into_iter().map(|r| json!({"resource": r})).collect::<Vec<_>>()
        })
    }

    fn request(encounter_id: &str, mrn: &str) -> EncounterRequest {
        EncounterRequest {
            encounter_id: NonEmptyText::new(encounter_id).expect("id"),
            mrn: NonEmptyText::new(mrn).expect("mrn"),
            admitted_at: DateTime::parse_from_rfc3339("2022-01-10T08:00:00+00:00").expect("admit"),
            discharged_at: Some(
                DateTime::parse_from_rfc3339("2022-01-14T12:00:00+00:00").expect("discharge"),
            ),
            scope: None,
        }
    }

    fn transport() -> FakeTransport {
        let window = "date=ge2022-01-10&date=le2022-01-14";
        FakeTransport::new()
            .respond(
                &format!("{BASE}/Patient?identifier=MRN-1"),
                bundle(vec![json!({"resourceType": "Patient", "id": "p1"})]),
            )
            .respond(
                &format!("{BASE}/Patient/p1"),
                json!({
                    "resourceType": "Patient",
                    "id": "p1",
                    "gender": "female",
                    "birthDate": "1956-06-01"
                }),
            )
            .respond(
                &format!("{BASE}/Observation?patient=p1&category=vital-signs&{window}"),
                bundle(vec![json!({
                    "resourceType": "Observation",
                    "id": "hr-1",
                    "code": {"coding": [{"system": "http://loinc.org", "code": "8867-4"}]},
                    "issued": "2022-01-10T09:00:00+00:00",
                    "valueQuantity": {"value": 104.0, "unit": "/min"}
                })]),
            )
            .respond(
                &format!("{BASE}/Observation?patient=p1&category=laboratory&{window}"),
                json!({"resourceType": "Bundle", "total": 0}),
            )
            .respond(
                &format!("{BASE}/MedicationRequest?patient=p1&category=Inpatient&{window}"),
                bundle(vec![json!({
                    "resourceType": "MedicationRequest",
                    "id": "o1",
                    "authoredOn": "2022-01-10T10:00:00+00:00",
                    "medicationReference": {"reference": "Medication/m1"}
                })]),
            )
            .respond(
                &format!("{BASE}/Medication/m1"),
                json!({
                    "resourceType": "Medication",
                    "id": "m1",
                    "code": {"coding": [{"system": "http://www.nlm.nih.gov/research/umls/rxnorm", "code": "2193"}]}
                }),
            )
            .respond(
                &format!("{BASE}/Condition?patient=p1"),
                json!({"resourceType": "Bundle", "total": 0}),
            )
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2022, 2, 1).expect("today")
    }

    #[test]
    fn open_encounter_window_ends_today() {
        let mut req = request("e1", "MRN-1");
        req.discharged_at = None;
        let window = req.window(today());
        assert_eq!(window.start, NaiveDate::from_ymd_opt(2022, 1, 10));
        assert_eq!(window.end, Some(today()));
    }

    #[test]
    fn runs_one_encounter_end_to_end() {
        let conn = hapi_connection(transport());
        let reference = ReferenceData::bundled().expect("bundled reference");
        let pipeline = Pipeline::new(&conn, &reference, &NoComorbidityIndex);

        let result = pipeline
            .run_encounter(&request("e1", "MRN-1"), today())
            .expect("result");

        assert_eq!(result.encounter_id, "e1");
        assert_eq!(result.patient_id, "p1");
        assert_eq!(result.features.get(Feature::Age), Some(65.0));
        assert_eq!(result.features.get(Feature::Sex), Some(0.0));
        assert_eq!(result.features.get(Feature::Hr), Some(104.0));
        assert_eq!(result.score.observed_features, 3);
        assert_eq!(result.early_antibiotics, 1);
        assert_eq!(result.score.phenotype, phenotype::score(&result.features).phenotype);
    }

    #[test]
    fn cohort_drops_failed_encounters() {
        let conn = hapi_connection(transport());
        let reference = ReferenceData::bundled().expect("bundled reference");
        let pipeline = Pipeline::new(&conn, &reference, &NoComorbidityIndex);

        let results = pipeline.run_cohort(
            &[request("e1", "MRN-1"), request("e2", "MRN-UNKNOWN")],
            today(),
        );

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].encounter_id, "e1");
    }

    #[test]
    fn result_serialises_flat() {
        let conn = hapi_connection(transport());
        let reference = ReferenceData::bundled().expect("bundled reference");
        let pipeline = Pipeline::new(&conn, &reference, &NoComorbidityIndex);

        let result = pipeline
            .run_encounter(&request("e1", "MRN-1"), today())
            .expect("result");
        let value = serde_json::to_value(&result).expect("serialise");

        assert_eq!(value["encounter_id"], "e1");
        assert_eq!(value["hr"], 104.0);
        assert!(value["wbc"].is_null());
        assert!(value["dist_alpha"].is_number());
        assert!(value["dist_delta"].is_number());
        assert!(value.get("phenotype").is_some());
    }

    #[test]
    fn age_and_sex_only_encounter_scores_gamma() {
        let conn = hapi_connection(FakeTransport::new());
        let reference = ReferenceData::bundled().expect("bundled reference");
        let pipeline = Pipeline::new(&conn, &reference, &NoComorbidityIndex);

        let data = EncounterData {
            patient_id: "p1".into(),
            patient: PatientRow {
                id: Some("p1".into()),
                gender: Some(fhir::AdministrativeGender::Female),
                birth_date: NaiveDate::from_ymd_opt(1956, 6, 1),
                deceased: None,
            },
            vitals: Vec::new(),
            labs: Vec::new(),
            medications: Vec::new(),
            conditions: Vec::new(),
        };

        let result = pipeline.score(&request("e1", "MRN-1"), &data);
        assert_eq!(result.features.get(Feature::Age), Some(65.0));
        assert_eq!(result.score.phenotype, Phenotype::Gamma);
        assert!((result.score.distances.gamma - 0.9505965510316187).abs() < 1e-12);
    }

    #[test]
    fn deserialises_request_requiring_timezone() {
        let ok: EncounterRequest = serde_json::from_value(json!({
            "encounter_id": "e1",
            "mrn": "MRN-1",
            "admitted_at": "2022-01-10T08:00:00-05:00"
        }))
        .expect("request");
        assert!(ok.discharged_at.is_none());

        let naive = serde_json::from_value::<EncounterRequest>(json!({
            "encounter_id": "e1",
            "mrn": "MRN-1",
            "admitted_at": "2022-01-10T08:00:00"
        }));
        assert!(naive.is_err());
    }
}

//! # Seneca Core
//!
//! Retrieval and cohort assembly for sepsis phenotyping.
//!
//! This crate talks to FHIR R4 backends and turns what they return into phenotype feature rows:
//! - Backend profiles loaded from YAML and resolved once per connection
//! - Two URL/paging dialects behind a single `Connection`
//! - A lazy page fetcher that follows `next` links until the server stops sending them
//! - Flatteners that turn bundles into typed rows, and an assembler that turns rows into features
//!
//! **No scoring concerns**: the distance model itself lives in the `phenotype` crate and is
//! deliberately free of I/O.

pub mod cohort;
pub mod config;
pub mod connection;
pub mod constants;
pub mod dialect;
pub mod error;
pub mod fetcher;
pub mod flatten;
pub mod pipeline;
pub mod profile;
pub mod reference;
pub mod resources;
pub mod secrets;
pub mod transport;

pub use cohort::{
    antibiotics_within, assemble_features, calc_age, diagnosis_codes, latest_per_element,
    normalise_lab_units, normalise_vital_units, sex_indicator, ComorbidityIndex,
    NoComorbidityIndex,
};
pub use config::{BackendConfigSource, BackendSection, RunConfig, YamlBackendConfig};
pub use connection::Connection;
pub use dialect::{Dialect, DialectKind, EpicDialect, HapiDialect, LookupCall};
pub use error::{CoreError, CoreResult};
pub use fetcher::{DateWindow, FetchState, PageFetcher};
pub use flatten::{
    flatten_conditions, flatten_medication_requests, flatten_observations, flatten_patient,
    ConditionRow, MedicationRow, MedicationSource, ObservationRow, PatientRow,
};
pub use pipeline::{EncounterData, EncounterRequest, EncounterResult, Pipeline};
pub use profile::{AuthStrategy, BackendProfile};
pub use reference::{FeatureKey, ReferenceData, ValueSetEntry, ValueSetTable};
pub use secrets::{scoped_secret_path, EnvSecretStore, SecretStore};
pub use transport::{BasicAuth, HttpTransport, RequestParams, Transport};

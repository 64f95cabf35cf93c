//! Constants used throughout the Seneca core crate.

/// Environment variable naming the backend id to connect to.
pub const BACKEND_ENV: &str = "SENECA_BACKEND";

/// Environment variable pointing at the backend configuration YAML.
pub const BACKENDS_FILE_ENV: &str = "SENECA_BACKENDS_FILE";

/// Environment variable pointing at a reference-data YAML that replaces the bundled one.
pub const REFERENCE_FILE_ENV: &str = "SENECA_REFERENCE_FILE";

/// Environment variable holding the operating user, used to scope secret paths.
pub const USER_ENV: &str = "USER";

/// Prefix for secrets served by `EnvSecretStore`.
pub const SECRET_ENV_PREFIX: &str = "SENECA_SECRET";

/// Default backend configuration file, relative to the working directory.
pub const DEFAULT_BACKENDS_FILE: &str = "backends.yaml";

/// Certificate bundle pinned for token-authenticated backends when none is configured.
pub const DEFAULT_CERT_BUNDLE: &str = "gitlab-bundle.pem";

/// Header carrying the API key for token-authenticated backends.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Vault field holding the API key when the profile does not name one.
pub const DEFAULT_API_KEY_FIELD: &str = "apikey";

/// Observation categories fetched per encounter.
pub const VITAL_SIGNS_CATEGORY: &str = "vital-signs";
pub const LABORATORY_CATEGORY: &str = "laboratory";

/// Order category applied to medication request searches.
pub const INPATIENT_ORDER_CATEGORY: &str = "Inpatient";

/// Condition category used when a condition carries none.
pub const DEFAULT_CONDITION_CATEGORY: &str = "default";

/// Value-set element name that marks a blood culture.
pub const BLOOD_CULTURE_ELEMENT: &str = "Blood culture";

/// Value-set element id of C-reactive protein.
pub const DEFAULT_CRP_ELEMENT_ID: u32 = 38;

/// Window, in hours from encounter start, for counting antibiotic orders.
pub const DEFAULT_ANTIBIOTIC_WINDOW_HOURS: f64 = 6.0;

/// LOINC code for a bare vital-signs panel. It carries no value of its own.
pub const VITAL_SIGNS_PANEL_CODE: &str = "8716-3";

/// Identifier type that carries the FHIR id in service lookups.
pub const FHIR_IDENTIFIER_TYPE: &str = "FHIR";

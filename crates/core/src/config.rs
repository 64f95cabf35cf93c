//! Core runtime configuration.
//!
//! Backend sections are read from YAML once at startup and handed to connections as validated
//! profiles. Nothing in this crate reads process environment variables while fetching or
//! assembling; the binary resolves `RunConfig` up front and passes it in.

use crate::{CoreError, CoreResult};
use seneca_types::NonEmptyText;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// One backend's raw configuration, as stored in the backends file.
///
/// Fields are optional here; `BackendProfile::resolve` decides which ones a given dialect and
/// auth strategy actually require.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendSection {
    pub url_root_fhir: Option<String>,
    pub url_root_service: Option<String>,
    pub lookup_path: Option<String>,
    pub conn_type: Option<String>,
    pub auth_type: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    pub user_id_field: Option<String>,
    pub pwd_field: Option<String>,
    pub api_key_field: Option<String>,
    pub api_vault_path: Option<String>,
    pub cert_bundle: Option<PathBuf>,
}

/// Source of backend sections keyed by backend id.
pub trait BackendConfigSource {
    /// Return the section stored under `backend_id`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Configuration`] if no such backend is configured.
    fn section(&self, backend_id: &str) -> CoreResult<BackendSection>;
}

/// Backend sections loaded from a YAML mapping of backend id to section.
#[derive(Clone, Debug)]
pub struct YamlBackendConfig {
    base_dir: PathBuf,
    sections: BTreeMap<String, BackendSection>,
}

impl YamlBackendConfig {
    /// Load backend sections from a YAML file.
    ///
    /// Relative certificate bundle paths are resolved against the file's directory.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::FileRead`] if the file cannot be read, or
    /// [`CoreError::YamlDeserialization`] if it is not a mapping of sections.
    pub fn load(path: &Path) -> CoreResult<Self> {
        let contents = fs::read_to_string(path).map_err(|source| CoreError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_yaml_str(&contents, base_dir)
    }

    /// Parse backend sections from YAML text.
    pub fn from_yaml_str(contents: &str, base_dir: &Path) -> CoreResult<Self> {
        let sections: BTreeMap<String, BackendSection> =
            serde_yaml::from_str(contents).map_err(CoreError::YamlDeserialization)?;

        Ok(Self {
            base_dir: base_dir.to_path_buf(),
            sections,
        })
    }

    pub fn backend_ids(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(String::as_str)
    }
}

impl BackendConfigSource for YamlBackendConfig {
    fn section(&self, backend_id: &str) -> CoreResult<BackendSection> {
        let mut section = self.sections.get(backend_id).cloned().ok_or_else(|| {
            CoreError::Configuration(format!("unknown backend '{backend_id}'"))
        })?;

        if let Some(bundle) = section.cert_bundle.as_mut() {
            if bundle.is_relative() {
                *bundle = self.base_dir.join(&*bundle);
            }
        }

        Ok(section)
    }
}

/// Run configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct RunConfig {
    backend: NonEmptyText,
    backends_file: PathBuf,
    reference_file: Option<PathBuf>,
    user: NonEmptyText,
}

impl RunConfig {
    /// Create a new `RunConfig`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Configuration`] if the backend id or user is blank.
    pub fn new(
        backend: &str,
        backends_file: PathBuf,
        reference_file: Option<PathBuf>,
        user: &str,
    ) -> CoreResult<Self> {
        let backend = NonEmptyText::new(backend)
            .map_err(|_| CoreError::Configuration("backend id cannot be empty".into()))?;
        let user = NonEmptyText::new(user)
            .map_err(|_| CoreError::Configuration("user cannot be empty".into()))?;

        Ok(Self {
            backend,
            backends_file,
            reference_file,
            user,
        })
    }

    pub fn backend(&self) -> &NonEmptyText {
        &self.backend
    }

    pub fn backends_file(&self) -> &Path {
        &self.backends_file
    }

    pub fn reference_file(&self) -> Option<&Path> {
        self.reference_file.as_deref()
    }

    pub fn user(&self) -> &NonEmptyText {
        &self.user
    }
}

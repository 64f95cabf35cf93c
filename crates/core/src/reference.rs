//! Reference data.
//!
//! Value-set table, antibiotic code set and feature key list, loaded once per run and passed
//! explicitly to the flatteners and the assembler. A default copy ships with the crate.

use crate::constants::{BLOOD_CULTURE_ELEMENT, DEFAULT_CRP_ELEMENT_ID};
use crate::{CoreError, CoreResult};
use phenotype::Feature;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;

const BUNDLED_REFERENCE: &str = include_str!("../reference/seneca_reference.yaml");

/// One code's membership in a value-set element.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueSetEntry {
    pub code: String,
    pub code_system: String,
    pub element_id: u32,
    pub element_name: String,
}

/// Joins a value-set element onto a model feature column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureKey {
    pub element_id: u32,
    pub feature: Feature,
}

/// Code to value-set lookup.
#[derive(Clone, Debug, Default)]
pub struct ValueSetTable {
    entries: Vec<ValueSetEntry>,
    by_code: HashMap<String, usize>,
}

impl ValueSetTable {
    /// Build a table. When a code is listed more than once the first entry wins.
    pub fn new(entries: Vec<ValueSetEntry>) -> Self {
        let mut by_code = HashMap::with_capacity(entries.len());
        for (idx, entry) in entries.iter().enumerate() {
            by_code.entry(entry.code.clone()).or_insert(idx);
        }
        Self { entries, by_code }
    }

    pub fn lookup(&self, code: &str) -> Option<&ValueSetEntry> {
        self.by_code.get(code).map(|&idx| &self.entries[idx])
    }

    /// First candidate code, in order, that belongs to a known value-set element.
    pub fn best_match<'a, I>(&self, candidates: I) -> Option<&ValueSetEntry>
    where
        I: IntoIterator<Item = &'a str>,
    {
        candidates.into_iter().find_map(|code| self.lookup(code))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ReferenceWire {
    #[serde(default)]
    crp_element_id: Option<u32>,
    #[serde(default)]
    blood_culture_element: Option<String>,
    value_sets: Vec<ValueSetEntry>,
    features: Vec<FeatureKey>,
    antibiotic_rxnorm: Vec<String>,
}

/// Reference tables for one pipeline run.
#[derive(Clone, Debug)]
pub struct ReferenceData {
    value_sets: ValueSetTable,
    features: Vec<FeatureKey>,
    antibiotics: BTreeSet<String>,
    crp_element_id: u32,
    blood_culture_element: String,
}

impl ReferenceData {
    /// The reference data shipped with this crate.
    pub fn bundled() -> CoreResult<Self> {
        Self::from_yaml_str(BUNDLED_REFERENCE)
    }

    /// Load reference data from a YAML file.
    pub fn load(path: &Path) -> CoreResult<Self> {
        let contents = fs::read_to_string(path).map_err(|source| CoreError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&contents)
    }

    /// Parse and validate reference data.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::YamlDeserialization`] if the document is malformed, or
    /// [`CoreError::Configuration`] if the feature list names a derived feature (age, sex,
    /// comorbidity) or names any feature twice.
    pub fn from_yaml_str(contents: &str) -> CoreResult<Self> {
        let wire: ReferenceWire =
            serde_yaml::from_str(contents).map_err(CoreError::YamlDeserialization)?;

        let mut seen = BTreeSet::new();
        for key in &wire.features {
            if matches!(key.feature, Feature::Age | Feature::Sex | Feature::Elix) {
                return Err(CoreError::Configuration(format!(
                    "feature '{}' is derived and cannot be keyed to a value set",
                    key.feature
                )));
            }
            if !seen.insert(key.feature) {
                return Err(CoreError::Configuration(format!(
                    "feature '{}' is listed more than once",
                    key.feature
                )));
            }
        }

        Ok(Self {
            value_sets: ValueSetTable::new(wire.value_sets),
            features: wire.features,
            antibiotics: wire
                .antibiotic_rxnorm
                .into_iter()
                .map(|c| c.trim().to_owned())
                .collect(),
            crp_element_id: wire.crp_element_id.unwrap_or(DEFAULT_CRP_ELEMENT_ID),
            blood_culture_element: wire
                .blood_culture_element
                .unwrap_or_else(|| BLOOD_CULTURE_ELEMENT.to_owned()),
        })
    }

    pub fn value_sets(&self) -> &ValueSetTable {
        &self.value_sets
    }

    pub fn features(&self) -> &[FeatureKey] {
        &self.features
    }

    pub fn antibiotics(&self) -> &BTreeSet<String> {
        &self.antibiotics
    }

    pub fn crp_element_id(&self) -> u32 {
        self.crp_element_id
    }

    /// True if any of `codes` is in the antibiotic set.
    pub fn is_antibiotic<S: AsRef<str>>(&self, codes: &[S]) -> bool {
        codes
            .iter()
            .any(|code| self.antibiotics.contains(code.as_ref()))
    }

    pub fn is_blood_culture(&self, entry: &ValueSetEntry) -> bool {
        entry.element_name == self.blood_culture_element
    }
}

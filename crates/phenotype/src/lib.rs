//! Deterministic sepsis phenotype scoring.
//!
//! This crate maps one encounter's feature row onto four fixed phenotype centroids
//! (Alpha, Beta, Gamma, Delta):
//! - log-transform the skewed laboratory features
//! - standardise every feature with the published derivation-cohort constants
//! - take the Euclidean distance to each centroid over the features that are present
//! - label the encounter with the nearest centroid
//!
//! The crate performs no I/O and holds no state; the same row always yields the same score.

mod model;
mod score;

pub use model::{FeatureParams, Transform};
pub use score::{classify, distances, score, score_all, standardise, standardised, transform};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Errors returned by the `phenotype` crate.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PhenotypeError {
    #[error("unknown feature: {0}")]
    UnknownFeature(String),
}

// ============================================================================
// Features
// ============================================================================

/// The 29 model features, in model column order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Feature {
    Age,
    Alb,
    Alt,
    Ast,
    Bands,
    Bicarb,
    Bili,
    Bun,
    Cl,
    Creat,
    Crp,
    /// Comorbidity mortality-risk scalar.
    Elix,
    Esr,
    Gcs,
    Gluc,
    Hgb,
    Hr,
    Inr,
    Lactate,
    Pao2,
    Plt,
    Rr,
    Sao2,
    /// Binary indicator, female = 0, male = 1.
    Sex,
    Sodium,
    Sbp,
    Temp,
    Trop,
    Wbc,
}

impl Feature {
    pub const COUNT: usize = 29;

    pub const ALL: [Feature; Feature::COUNT] = [
        Feature::Age,
        Feature::Alb,
        Feature::Alt,
        Feature::Ast,
        Feature::Bands,
        Feature::Bicarb,
        Feature::Bili,
        Feature::Bun,
        Feature::Cl,
        Feature::Creat,
        Feature::Crp,
        Feature::Elix,
        Feature::Esr,
        Feature::Gcs,
        Feature::Gluc,
        Feature::Hgb,
        Feature::Hr,
        Feature::Inr,
        Feature::Lactate,
        Feature::Pao2,
        Feature::Plt,
        Feature::Rr,
        Feature::Sao2,
        Feature::Sex,
        Feature::Sodium,
        Feature::Sbp,
        Feature::Temp,
        Feature::Trop,
        Feature::Wbc,
    ];

    /// Position of this feature in [`Feature::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }

    /// Column name used in feature rows and reference data.
    pub fn name(self) -> &'static str {
        match self {
            Feature::Age => "age",
            Feature::Alb => "alb",
            Feature::Alt => "alt",
            Feature::Ast => "ast",
            Feature::Bands => "bands",
            Feature::Bicarb => "bicarb",
            Feature::Bili => "bili",
            Feature::Bun => "bun",
            Feature::Cl => "cl",
            Feature::Creat => "creat",
            Feature::Crp => "crp",
            Feature::Elix => "elix",
            Feature::Esr => "esr",
            Feature::Gcs => "gcs",
            Feature::Gluc => "gluc",
            Feature::Hgb => "hgb",
            Feature::Hr => "hr",
            Feature::Inr => "inr",
            Feature::Lactate => "lactate",
            Feature::Pao2 => "pao2",
            Feature::Plt => "plt",
            Feature::Rr => "rr",
            Feature::Sao2 => "sao2",
            Feature::Sex => "sex",
            Feature::Sodium => "sodium",
            Feature::Sbp => "sbp",
            Feature::Temp => "temp",
            Feature::Trop => "trop",
            Feature::Wbc => "wbc",
        }
    }

    /// Published model parameters for this feature.
    pub fn params(self) -> &'static FeatureParams {
        &model::MODEL[self.index()]
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Feature {
    type Err = PhenotypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Feature::ALL
            .into_iter()
            .find(|f| f.name() == s)
            .ok_or_else(|| PhenotypeError::UnknownFeature(s.to_owned()))
    }
}

impl Serialize for Feature {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Feature {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Feature rows
// ============================================================================

/// One encounter's raw (untransformed) feature values.
///
/// Missing features are `None`, never zero. Serialises as a map from feature name to value
/// with every one of the 29 columns present.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FeatureRow {
    values: [Option<f64>; Feature::COUNT],
}

impl FeatureRow {
    /// A row with every feature missing.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, feature: Feature) -> Option<f64> {
        self.values[feature.index()]
    }

    pub fn set(&mut self, feature: Feature, value: Option<f64>) {
        self.values[feature.index()] = value;
    }

    /// Builder-style setter.
    pub fn with(mut self, feature: Feature, value: f64) -> Self {
        self.set(feature, Some(value));
        self
    }

    /// Number of features with a value.
    pub fn observed(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.observed() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (Feature, Option<f64>)> + '_ {
        Feature::ALL.into_iter().map(|f| (f, self.get(f)))
    }
}

impl Serialize for FeatureRow {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(Feature::COUNT))?;
        for (feature, value) in self.iter() {
            map.serialize_entry(feature.name(), &value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for FeatureRow {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<Feature, Option<f64>>::deserialize(deserializer)?;
        let mut row = FeatureRow::empty();
        for (feature, value) in raw {
            row.set(feature, value);
        }
        Ok(row)
    }
}

// ============================================================================
// Scores
// ============================================================================

/// Phenotype label. Declaration order is the tie-break order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phenotype {
    Alpha,
    Beta,
    Gamma,
    Delta,
}

impl Phenotype {
    pub const ALL: [Phenotype; 4] = [
        Phenotype::Alpha,
        Phenotype::Beta,
        Phenotype::Gamma,
        Phenotype::Delta,
    ];
}

impl std::fmt::Display for Phenotype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Phenotype::Alpha => "Alpha",
            Phenotype::Beta => "Beta",
            Phenotype::Gamma => "Gamma",
            Phenotype::Delta => "Delta",
        };
        f.write_str(label)
    }
}

/// Euclidean distance from one encounter to each centroid.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Distances {
    #[serde(rename = "dist_alpha")]
    pub alpha: f64,
    #[serde(rename = "dist_beta")]
    pub beta: f64,
    #[serde(rename = "dist_gamma")]
    pub gamma: f64,
    #[serde(rename = "dist_delta")]
    pub delta: f64,
}

impl Distances {
    pub fn get(&self, phenotype: Phenotype) -> f64 {
        match phenotype {
            Phenotype::Alpha => self.alpha,
            Phenotype::Beta => self.beta,
            Phenotype::Gamma => self.gamma,
            Phenotype::Delta => self.delta,
        }
    }
}

/// Result of scoring one feature row.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhenotypeScore {
    #[serde(flatten)]
    pub distances: Distances,
    pub phenotype: Phenotype,
    /// Count of features that contributed a term to the distances.
    pub observed_features: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feature_names_round_trip_through_from_str() {
        for feature in Feature::ALL {
            assert_eq!(feature.name().parse::<Feature>(), Ok(feature));
        }
        assert_eq!(
            "lactic".parse::<Feature>(),
            Err(PhenotypeError::UnknownFeature("lactic".into()))
        );
    }

    #[test]
    fn index_matches_position_in_all() {
        for (i, feature) in Feature::ALL.into_iter().enumerate() {
            assert_eq!(feature.index(), i);
        }
    }

    #[test]
    fn feature_row_serialises_every_column_with_nulls() {
        let row = FeatureRow::empty().with(Feature::Age, 65.0);
        let json = serde_json::to_value(&row).expect("serialise row");
        let obj = json.as_object().expect("object");
        assert_eq!(obj.len(), Feature::COUNT);
        assert_eq!(obj["age"], serde_json::json!(65.0));
        assert!(obj["wbc"].is_null());
    }

    #[test]
    fn feature_row_deserialises_partial_map() {
        let row: FeatureRow =
            serde_json::from_str(r#"{"age": 70, "sex": 1, "crp": null}"#).expect("parse row");
        assert_eq!(row.get(Feature::Age), Some(70.0));
        assert_eq!(row.get(Feature::Sex), Some(1.0));
        assert_eq!(row.get(Feature::Crp), None);
        assert_eq!(row.observed(), 2);
    }

    #[test]
    fn feature_row_rejects_unknown_column() {
        let err = serde_json::from_str::<FeatureRow>(r#"{"pulse": 80}"#).expect_err("unknown");
        assert!(err.to_string().contains("pulse"));
    }
}

//! Transform, standardise, measure and classify.

use crate::model::Transform;
use crate::{Distances, Feature, FeatureRow, Phenotype, PhenotypeScore};

/// Apply the feature's model transform to a raw value.
///
/// Values the transform is undefined for (e.g. the log of a negative number) come back as
/// `None` and are treated as missing downstream. `ln(0)` is `-inf`, not missing.
pub fn transform(feature: Feature, value: f64) -> Option<f64> {
    let transformed = match feature.params().transform {
        Transform::Identity => value,
        Transform::Ln => value.ln(),
        Transform::LnComplement101 => (101.0 - value).ln(),
    };
    (!transformed.is_nan()).then_some(transformed)
}

/// Z-transform an already-transformed value with the published mean and SD.
pub fn standardise(feature: Feature, transformed: f64) -> f64 {
    let params = feature.params();
    (transformed - params.mean) / params.sd
}

/// Transform then standardise every feature of a row.
pub fn standardised(row: &FeatureRow) -> [Option<f64>; Feature::COUNT] {
    let mut z = [None; Feature::COUNT];
    for (feature, value) in row.iter() {
        z[feature.index()] = value
            .and_then(|v| transform(feature, v))
            .map(|t| standardise(feature, t));
    }
    z
}

/// Distance to each centroid over the features that are present.
///
/// A missing feature contributes no term; it is not imputed.
pub fn distances(z: &[Option<f64>; Feature::COUNT]) -> Distances {
    let mut sums = [0.0_f64; 4];
    for feature in Feature::ALL {
        let Some(value) = z[feature.index()] else {
            continue;
        };
        for (sum, centroid) in sums.iter_mut().zip(feature.params().centroids) {
            *sum += (value - centroid).powi(2);
        }
    }

    Distances {
        alpha: sums[0].sqrt(),
        beta: sums[1].sqrt(),
        gamma: sums[2].sqrt(),
        delta: sums[3].sqrt(),
    }
}

/// Nearest centroid; ties go to the earliest of Alpha, Beta, Gamma, Delta.
pub fn classify(distances: &Distances) -> Phenotype {
    let mut best = Phenotype::Alpha;
    for candidate in &Phenotype::ALL[1..] {
        if distances.get(*candidate) < distances.get(best) {
            best = *candidate;
        }
    }
    best
}

/// Score a single feature row.
///
/// A row with no usable features has distance 0 to every centroid and is labelled Alpha.
/// `observed_features` is 0 in that case so callers can tell it apart.
pub fn score(row: &FeatureRow) -> PhenotypeScore {
    let z = standardised(row);
    let distances = distances(&z);
    PhenotypeScore {
        distances,
        phenotype: classify(&distances),
        observed_features: z.iter().filter(|v| v.is_some()).count(),
    }
}

/// Score rows independently; output order follows input order.
pub fn score_all(rows: &[FeatureRow]) -> Vec<PhenotypeScore> {
    rows.iter().map(score).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-12;

    fn sample_row() -> FeatureRow {
        FeatureRow::empty()
            .with(Feature::Age, 71.0)
            .with(Feature::Sex, 1.0)
            .with(Feature::Alt, 45.0)
            .with(Feature::Ast, 60.0)
            .with(Feature::Creat, 2.1)
            .with(Feature::Lactate, 4.2)
            .with(Feature::Sao2, 92.0)
            .with(Feature::Hr, 118.0)
            .with(Feature::Sbp, 88.0)
            .with(Feature::Temp, 38.9)
            .with(Feature::Wbc, 17.5)
            .with(Feature::Elix, 3.0)
    }

    #[test]
    fn age_and_sex_only_matches_hand_computed_distances() {
        let row = FeatureRow::empty()
            .with(Feature::Age, 65.0)
            .with(Feature::Sex, 0.0);

        let result = score(&row);

        assert!((result.distances.alpha - 1.0660702219873217).abs() < TOLERANCE);
        assert!((result.distances.beta - 1.0082488545724353).abs() < TOLERANCE);
        assert!((result.distances.gamma - 0.9505965510316187).abs() < TOLERANCE);
        assert!((result.distances.delta - 1.1068943612938782).abs() < TOLERANCE);
        // Alpha is not strictly nearest for this pair, so it must not win.
        assert_eq!(result.phenotype, Phenotype::Gamma);
        assert_eq!(result.observed_features, 2);
    }

    #[test]
    fn all_missing_row_lands_on_alpha_with_zero_distances() {
        let result = score(&FeatureRow::empty());
        assert_eq!(result.distances.alpha, 0.0);
        assert_eq!(result.distances.beta, 0.0);
        assert_eq!(result.distances.gamma, 0.0);
        assert_eq!(result.distances.delta, 0.0);
        assert_eq!(result.phenotype, Phenotype::Alpha);
        assert_eq!(result.observed_features, 0);
    }

    #[test]
    fn standardise_round_trips_for_every_feature() {
        for feature in Feature::ALL {
            let params = feature.params();
            for x in [-3.5, 0.0, 0.25, 1.0, 42.0, 137.0] {
                let back = standardise(feature, x) * params.sd + params.mean;
                assert!(
                    (back - x).abs() < 1e-9,
                    "{feature}: {x} came back as {back}"
                );
            }
        }
    }

    #[test]
    fn sao2_uses_complement_log() {
        let t = transform(Feature::Sao2, 96.0).expect("defined");
        assert!((t - 5.0_f64.ln()).abs() < TOLERANCE);
        let t = transform(Feature::Lactate, 2.0).expect("defined");
        assert!((t - 2.0_f64.ln()).abs() < TOLERANCE);
        assert_eq!(transform(Feature::Hr, 90.0), Some(90.0));
    }

    #[test]
    fn undefined_log_is_treated_as_missing() {
        assert_eq!(transform(Feature::Crp, -1.0), None);
        let row = FeatureRow::empty().with(Feature::Crp, -1.0);
        assert_eq!(score(&row).observed_features, 0);
    }

    #[test]
    fn ties_resolve_in_declaration_order() {
        let d = Distances {
            alpha: 2.0,
            beta: 1.0,
            gamma: 1.0,
            delta: 1.0,
        };
        assert_eq!(classify(&d), Phenotype::Beta);

        let d = Distances {
            alpha: 3.0,
            beta: 3.0,
            gamma: 2.5,
            delta: 2.5,
        };
        assert_eq!(classify(&d), Phenotype::Gamma);
    }

    #[test]
    fn scoring_is_deterministic() {
        let row = sample_row();
        let first = score(&row);
        for _ in 0..10 {
            assert_eq!(score(&row), first);
        }
    }

    #[test]
    fn batch_scores_do_not_depend_on_row_order() {
        let a = sample_row();
        let b = FeatureRow::empty()
            .with(Feature::Age, 45.0)
            .with(Feature::Bili, 3.4)
            .with(Feature::Inr, 2.2)
            .with(Feature::Plt, 90.0);
        let c = FeatureRow::empty().with(Feature::Gcs, 9.0);

        let forward = score_all(&[a.clone(), b.clone(), c.clone()]);
        let reversed = score_all(&[c, b, a]);

        assert_eq!(forward[0], reversed[2]);
        assert_eq!(forward[1], reversed[1]);
        assert_eq!(forward[2], reversed[0]);
    }

    #[test]
    fn missing_feature_adds_no_term() {
        let with_age = FeatureRow::empty().with(Feature::Age, 64.41131);
        let result = score(&with_age);
        // z(age) is 0, so each distance is the magnitude of that centroid's age coordinate.
        assert!((result.distances.alpha - 0.282231680).abs() < TOLERANCE);
        assert!((result.distances.beta - 0.366160979).abs() < TOLERANCE);
        assert!((result.distances.gamma - 0.015976043).abs() < TOLERANCE);
        assert!((result.distances.delta - 0.087936040).abs() < TOLERANCE);
        assert_eq!(result.phenotype, Phenotype::Gamma);
    }
}

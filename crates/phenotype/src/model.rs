//! Published constants of the sepsis phenotype model.
//!
//! Means and standard deviations are those of the derivation cohort, taken on the transformed
//! scale (e.g. mean and SD of ln(ALT)). Centroids are in standardised space and ordered
//! Alpha, Beta, Gamma, Delta. None of these values are estimated at runtime.

use crate::Feature;

/// Transform applied before standardisation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transform {
    /// Value is used as recorded.
    Identity,
    /// Natural log of the value.
    Ln,
    /// `ln(101 - value)`, used for oxygen saturation.
    LnComplement101,
}

/// Model parameters for a single feature.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FeatureParams {
    pub transform: Transform,
    pub mean: f64,
    pub sd: f64,
    pub centroids: [f64; 4],
}

const fn params(transform: Transform, mean: f64, sd: f64, centroids: [f64; 4]) -> FeatureParams {
    FeatureParams {
        transform,
        mean,
        sd,
        centroids,
    }
}

use Transform::{Identity, Ln, LnComplement101};

/// Parameters indexed by [`Feature::index`].
pub(crate) const MODEL: [FeatureParams; Feature::COUNT] = [
    // age
    params(Identity, 64.41131, 17.11103, [-0.282231680, 0.366160979, 0.015976043, -0.087936040]),
    // alb
    params(Identity, 2.933706, 0.723259, [0.716941788, 0.058423097, -0.694629256, -0.499133452]),
    // alt
    params(Ln, 3.538419, 0.901215, [0.003226264, -0.336533408, -0.226549811, 1.144945208]),
    // ast
    params(Ln, 3.598596, 0.969935, [-0.163922218, -0.386172035, -0.139338316, 1.486652343]),
    // bands
    params(Ln, 1.821413, 1.118881, [-0.253857263, -0.267407242, 0.298891480, 0.579760956]),
    // bicarb
    params(Identity, 25.03647, 5.131436, [0.311171647, 0.017263985, 0.037482070, -0.884331532]),
    // bili
    params(Ln, -0.143662, 0.840652, [-0.002667732, -0.380987513, 0.000477357, 0.793065739]),
    // bun
    params(Ln, 3.171860, 0.712280, [-0.659563022, 0.700632855, -0.104459930, 0.401287380]),
    // cl
    params(Identity, 102.7818, 6.715770, [-0.028323656, 0.009290949, -0.203177313, 0.461395728]),
    // creat
    params(Ln, 0.425669, 0.667512, [-0.556978928, 0.788307539, -0.260659215, 0.280646464]),
    // crp
    params(Ln, 1.504626, 1.858398, [-0.603062721, -0.137781835, 0.702551188, 0.364269160]),
    // elix
    params(Identity, 1.817871, 1.170719, [-0.255208039, 0.467208085, -0.102982737, -0.123710575]),
    // esr
    params(Ln, 3.738153, 0.910863, [-0.580672802, 0.281220424, 0.685360052, -0.522607275]),
    // gcs
    params(Identity, 12.83853, 3.127180, [-0.022069890, 0.234033835, 0.164700720, -0.761415458]),
    // gluc
    params(Ln, 4.964519, 0.448293, [-0.201601890, 0.020278755, 0.053908265, 0.350033751]),
    // hgb
    params(Identity, 11.50954, 2.329503, [0.631583437, -0.286660522, -0.456098749, -0.055521451]),
    // hr
    params(Identity, 97.17861, 21.92295, [-0.147992075, -0.590184626, 0.543281654, 0.490428737]),
    // inr
    params(Ln, 0.367357, 0.403954, [-0.338345030, -0.055712128, 0.084362244, 0.785275737]),
    // lactate
    params(Ln, 0.496778, 0.676092, [-0.254416263, -0.404554650, 0.185959917, 1.092620482]),
    // pao2
    params(Identity, 109.4560, 76.86320, [-0.121989635, 0.019043137, -0.146087373, 0.558641193]),
    // plt
    params(Ln, 5.139547, 0.654274, [-0.057589639, 0.147947739, 0.037279715, -0.237985698]),
    // rr
    params(Identity, 22.16539, 6.146117, [-0.316314201, -0.337499772, 0.511269045, 0.450954748]),
    // sao2
    params(LnComplement101, 1.818297, 0.767377, [0.005663652, -0.272829662, 0.266455863, 0.011792492]),
    // sex
    params(Identity, 0.496408, 0.499999, [0.025144433, -0.040713400, -0.042400073, 0.107294741]),
    // sodium
    params(Identity, 137.1170, 5.522682, [0.065611647, 0.073153049, -0.270658297, 0.232320267]),
    // sbp
    params(Ln, 4.678142, 0.270757, [0.303289160, 0.333667198, -0.399313346, -0.636731112]),
    // temp
    params(Identity, 36.98350, 1.006374, [0.126497810, -0.319145547, 0.331493219, -0.323962774]),
    // trop
    params(Ln, -2.288375, 1.230468, [-0.226681667, -0.187150084, -0.080529879, 1.112482455]),
    // wbc
    params(Ln, 2.237017, 0.716883, [-0.211849439, -0.056699022, 0.158379065, 0.323643150]),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifteen_features_are_log_transformed() {
        let ln = MODEL.iter().filter(|p| p.transform == Ln).count();
        assert_eq!(ln, 15);
        assert_eq!(MODEL[Feature::Sao2.index()].transform, LnComplement101);
    }

    #[test]
    fn standard_deviations_are_positive() {
        assert!(MODEL.iter().all(|p| p.sd > 0.0));
    }
}

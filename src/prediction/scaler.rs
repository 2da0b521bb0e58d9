//! Standard-score feature scaling for phase models

use crate::types::SensorReading;

/// Number of telemetry features fed to a phase model.
pub const FEATURE_COUNT: usize = 12;

/// Per-feature mean / standard deviation standardiser.
///
/// Feature order matches [`SensorReading::features`].
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureScaler {
    means: [f64; FEATURE_COUNT],
    std_devs: [f64; FEATURE_COUNT],
}

impl FeatureScaler {
    /// Build a scaler; zero or non-finite deviations are replaced by 1.0 so
    /// the transform never divides by zero.
    pub fn new(means: [f64; FEATURE_COUNT], std_devs: [f64; FEATURE_COUNT]) -> Self {
        let std_devs = std_devs.map(|s| if s.is_finite() && s > 0.0 { s } else { 1.0 });
        Self { means, std_devs }
    }

    /// Typical operating statistics of a dry-process rotary kiln.
    pub fn typical() -> Self {
        Self::new(
            [
                1400.0, // flame temperature
                1200.0, // material temperature
                350.0,  // shell temperature
                -50.0,  // draft pressure
                200.0,  // combustion air pressure
                3.0,    // O2
                50.0,   // CO
                800.0,  // NOx
                100.0,  // raw meal flow
                45.0,   // fuel flow
                2.5,    // kiln rpm
                120.0,  // feed rate
            ],
            [
                50.0, 100.0, 30.0, 10.0, 20.0, 0.5, 20.0, 100.0, 10.0, 5.0, 0.2, 15.0,
            ],
        )
    }

    pub fn transform(&self, features: &[f64; FEATURE_COUNT]) -> [f64; FEATURE_COUNT] {
        std::array::from_fn(|i| (features[i] - self.means[i]) / self.std_devs[i])
    }

    pub fn transform_reading(&self, reading: &SensorReading) -> [f64; FEATURE_COUNT] {
        self.transform(&reading.features())
    }
}

impl Default for FeatureScaler {
    fn default() -> Self {
        Self::typical()
    }
}

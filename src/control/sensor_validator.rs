//! Telemetry plausibility and freshness gate

use chrono::{DateTime, Utc};

use crate::config::SensorLimits;
use crate::types::SensorReading;

/// Why a reading was discarded. Not an error: the cycle ends cleanly.
#[derive(Debug, Clone, PartialEq)]
pub enum SensorRejection {
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    Stale {
        age_secs: i64,
        max_age_secs: i64,
    },
}

impl std::fmt::Display for SensorRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SensorRejection::OutOfRange {
                field,
                value,
                min,
                max,
            } => write!(f, "{field} = {value} outside [{min}, {max}]"),
            SensorRejection::Stale {
                age_secs,
                max_age_secs,
            } => write!(f, "reading is {age_secs}s old (max {max_age_secs}s)"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SensorValidator {
    limits: SensorLimits,
}

impl SensorValidator {
    pub fn new(limits: SensorLimits) -> Self {
        Self { limits }
    }

    /// Accept or reject a reading.
    ///
    /// Freshness is only checked when `now` is supplied (live operation);
    /// replayed data passes `None`. Readings stamped in the future are not stale.
    pub fn validate(
        &self,
        reading: &SensorReading,
        now: Option<DateTime<Utc>>,
    ) -> Result<(), SensorRejection> {
        let l = &self.limits;
        let checks = [
            ("flame_temperature", reading.flame_temperature, l.min_flame_temp, l.max_flame_temp),
            (
                "material_temperature",
                reading.material_temperature,
                l.min_material_temp,
                l.max_material_temp,
            ),
            ("o2_level", reading.o2_level, l.min_o2, l.max_o2),
            ("co_level", reading.co_level, l.min_co, l.max_co),
            ("fuel_flow_rate", reading.fuel_flow_rate, l.min_fuel_flow, l.max_fuel_flow),
        ];

        for (field, value, min, max) in checks {
            // NaN fails the range test
            if !(min..=max).contains(&value) {
                return Err(SensorRejection::OutOfRange {
                    field,
                    value,
                    min,
                    max,
                });
            }
        }

        if let Some(now) = now {
            let age_secs = (now - reading.timestamp).num_seconds();
            if age_secs > l.max_age_secs {
                return Err(SensorRejection::Stale {
                    age_secs,
                    max_age_secs: l.max_age_secs,
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fixtures::nominal_reading;
    use chrono::Duration;

    #[test]
    fn test_nominal_reading_accepted() {
        let v = SensorValidator::default();
        assert!(v.validate(&nominal_reading(), Some(Utc::now())).is_ok());
    }

    #[test]
    fn test_boundaries_are_inclusive() {
        let v = SensorValidator::default();
        let mut r = nominal_reading();
        r.flame_temperature = 1800.0;
        r.o2_level = 0.0;
        r.fuel_flow_rate = 200.0;
        assert!(v.validate(&r, None).is_ok());
    }

    #[test]
    fn test_each_range_rejects() {
        let v = SensorValidator::default();
        let cases: [(fn(&mut SensorReading), &str); 5] = [
            (|r| r.flame_temperature = 999.0, "flame_temperature"),
            (|r| r.material_temperature = 1401.0, "material_temperature"),
            (|r| r.o2_level = 10.5, "o2_level"),
            (|r| r.co_level = -1.0, "co_level"),
            (|r| r.fuel_flow_rate = f64::NAN, "fuel_flow_rate"),
        ];
        for (mutate, expected) in cases {
            let mut r = nominal_reading();
            mutate(&mut r);
            match v.validate(&r, None) {
                Err(SensorRejection::OutOfRange { field, .. }) => assert_eq!(field, expected),
                other => panic!("expected {expected} rejection, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_freshness_only_with_live_clock() {
        let v = SensorValidator::default();
        let mut r = nominal_reading();
        r.timestamp = Utc::now() - Duration::minutes(6);
        assert!(v.validate(&r, None).is_ok());
        let err = v.validate(&r, Some(Utc::now())).unwrap_err();
        assert!(matches!(err, SensorRejection::Stale { max_age_secs: 300, .. }));
        assert!(err.to_string().contains("max 300s"));
    }

    #[test]
    fn test_future_timestamp_is_not_stale() {
        let v = SensorValidator::default();
        let mut r = nominal_reading();
        r.timestamp = Utc::now() + Duration::minutes(2);
        assert!(v.validate(&r, Some(Utc::now())).is_ok());
    }
}

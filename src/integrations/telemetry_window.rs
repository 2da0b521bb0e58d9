//! In-process telemetry aggregation
//!
//! Keeps a bounded ring of (reading, prediction) samples stamped at arrival
//! and serves both the one-hour predictor context and the short outcome
//! windows from it. Stands in for an external analytics store.

use std::collections::VecDeque;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use statrs::statistics::Statistics;

use super::{
    AggregateError, AggregateSource, HistoricalContextProvider, TelemetrySink, WindowAggregate,
};
use crate::config::defaults::{
    DEFAULT_TEMP_VARIANCE, HISTORICAL_CONTEXT_WINDOW_SECS, TELEMETRY_WINDOW_CAPACITY,
};
use crate::types::{HistoricalContext, QualityPrediction, SensorReading};

#[derive(Debug, Clone, Copy)]
struct Sample {
    at: DateTime<Utc>,
    flame_temperature: f64,
    quality_score: f64,
    energy_efficiency: f64,
}

#[derive(Debug)]
pub struct TelemetryWindow {
    samples: RwLock<VecDeque<Sample>>,
    capacity: usize,
    context_window: Duration,
}

impl TelemetryWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: RwLock::new(VecDeque::with_capacity(capacity.min(4096))),
            capacity,
            context_window: Duration::seconds(HISTORICAL_CONTEXT_WINDOW_SECS),
        }
    }

    /// Insert a sample with an explicit arrival time.
    pub fn record_at(&self, at: DateTime<Utc>, reading: &SensorReading, prediction: &QualityPrediction) {
        let mut samples = self.samples.write().unwrap_or_else(PoisonError::into_inner);
        if samples.len() == self.capacity {
            samples.pop_front();
        }
        samples.push_back(Sample {
            at,
            flame_temperature: reading.flame_temperature,
            quality_score: prediction.quality_score,
            energy_efficiency: prediction.energy_efficiency,
        });
    }

    pub fn len(&self) -> usize {
        self.samples.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn since(&self, cutoff: DateTime<Utc>) -> Vec<Sample> {
        let samples = self.samples.read().unwrap_or_else(PoisonError::into_inner);
        samples.iter().filter(|s| s.at >= cutoff).copied().collect()
    }

    /// Context over the window ending at `now`.
    pub fn context_at(&self, now: DateTime<Utc>) -> HistoricalContext {
        let window = self.since(now - self.context_window);
        if window.is_empty() {
            return HistoricalContext::default();
        }
        let temps: Vec<f64> = window.iter().map(|s| s.flame_temperature).collect();
        HistoricalContext {
            avg_flame_temp: temps.iter().mean(),
            avg_efficiency: window.iter().map(|s| s.energy_efficiency).mean(),
            avg_quality: window.iter().map(|s| s.quality_score).mean(),
            temp_variance: spread(&temps).unwrap_or(DEFAULT_TEMP_VARIANCE),
            data_points: window.len() as u64,
        }
    }

    pub fn aggregate_at(
        &self,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Result<WindowAggregate, AggregateError> {
        let samples = self.since(now - window);
        if samples.is_empty() {
            return Err(AggregateError::NoData);
        }
        let temps: Vec<f64> = samples.iter().map(|s| s.flame_temperature).collect();
        Ok(WindowAggregate {
            avg_quality: samples.iter().map(|s| s.quality_score).mean(),
            avg_efficiency: samples.iter().map(|s| s.energy_efficiency).mean(),
            // A single sample has no spread
            temp_stddev: spread(&temps).unwrap_or(0.0),
            samples: samples.len() as u64,
        })
    }
}

impl Default for TelemetryWindow {
    fn default() -> Self {
        Self::new(TELEMETRY_WINDOW_CAPACITY)
    }
}

/// Sample standard deviation; `None` below two samples.
fn spread(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let sd = values.iter().std_dev();
    sd.is_finite().then_some(sd)
}

impl TelemetrySink for TelemetryWindow {
    fn record(&self, reading: &SensorReading, prediction: &QualityPrediction) {
        self.record_at(Utc::now(), reading, prediction);
    }
}

#[async_trait]
impl HistoricalContextProvider for TelemetryWindow {
    async fn historical_context(&self) -> HistoricalContext {
        self.context_at(Utc::now())
    }
}

#[async_trait]
impl AggregateSource for TelemetryWindow {
    async fn window_aggregate(&self, window: Duration) -> Result<WindowAggregate, AggregateError> {
        self.aggregate_at(Utc::now(), window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::decision_history::test_records::prediction;
    use crate::types::fixtures::nominal_reading;

    fn reading(flame: f64) -> SensorReading {
        SensorReading {
            flame_temperature: flame,
            ..nominal_reading()
        }
    }

    #[test]
    fn test_empty_window_yields_defaults() {
        let w = TelemetryWindow::default();
        assert_eq!(w.context_at(Utc::now()), HistoricalContext::default());
        assert!(matches!(
            w.aggregate_at(Utc::now(), Duration::minutes(5)),
            Err(AggregateError::NoData)
        ));
    }

    #[test]
    fn test_context_statistics() {
        let w = TelemetryWindow::default();
        let now = Utc::now();
        let p = prediction();
        for flame in [1440.0, 1450.0, 1460.0] {
            w.record_at(now - Duration::minutes(10), &reading(flame), &p);
        }
        // outside the one-hour window
        w.record_at(now - Duration::minutes(90), &reading(1000.0), &p);

        let ctx = w.context_at(now);
        assert_eq!(ctx.data_points, 3);
        assert!((ctx.avg_flame_temp - 1450.0).abs() < 1e-9);
        assert!((ctx.temp_variance - 10.0).abs() < 1e-9);
        assert!((ctx.avg_quality - 1.0).abs() < 1e-9);
        assert!((ctx.avg_efficiency - 0.87).abs() < 1e-9);
    }

    #[test]
    fn test_single_sample_uses_default_variance() {
        let w = TelemetryWindow::default();
        let now = Utc::now();
        w.record_at(now, &reading(1470.0), &prediction());
        let ctx = w.context_at(now);
        assert_eq!(ctx.data_points, 1);
        assert_eq!(ctx.temp_variance, DEFAULT_TEMP_VARIANCE);
        let agg = w.aggregate_at(now, Duration::minutes(5)).unwrap();
        assert_eq!(agg.temp_stddev, 0.0);
        assert_eq!(agg.samples, 1);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let w = TelemetryWindow::new(2);
        let now = Utc::now();
        for flame in [1400.0, 1450.0, 1500.0] {
            w.record_at(now, &reading(flame), &prediction());
        }
        assert_eq!(w.len(), 2);
        assert!((w.context_at(now).avg_flame_temp - 1475.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_trait_views() {
        let w = TelemetryWindow::default();
        w.record(&nominal_reading(), &prediction());
        assert_eq!(w.historical_context().await.data_points, 1);
        assert!(w.window_aggregate(Duration::minutes(5)).await.is_ok());
    }
}

//! Prometheus instrument registry. Names and label sets are contracts with
//! the outside world — do not rename without a migration plan.

use prometheus::{
    CounterVec, GaugeVec, HistogramVec, Opts, Registry, TextEncoder,
};

const LATENCY_BUCKETS: &[f64] = &[
    0.005, 0.010, 0.025, 0.050, 0.075, 0.100, 0.250, 0.500, 0.750, 1.0, 2.5, 5.0, 7.5, 10.0,
];

/// Owns every metric instrument and the registry they're bound to. One
/// instance per process, shared behind an `Arc` with the server state.
pub struct Telemetry {
    registry: Registry,
    pub predictions_total: CounterVec,
    pub prediction_duration_seconds: HistogramVec,
    pub model_loads_total: CounterVec,
    pub model_load_duration_seconds: HistogramVec,
    pub current_model_version: GaugeVec,
    pub feature_cache_hits_total: prometheus::Counter,
    pub feature_cache_misses_total: prometheus::Counter,
    pub prediction_cache_hits_total: prometheus::Counter,
    pub prediction_cache_misses_total: prometheus::Counter,
}

impl Telemetry {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let predictions_total = CounterVec::new(
            Opts::new("ml_predictions_total", "Completed prediction requests"),
            &["model_name", "model_version", "status"],
        )?;
        let prediction_duration_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "ml_prediction_duration_seconds",
                "Prediction request latency",
            )
            .buckets(LATENCY_BUCKETS.to_vec()),
            &["model_name", "model_version"],
        )?;
        let model_loads_total = CounterVec::new(
            Opts::new("ml_model_loads_total", "Completed model load attempts"),
            &["model_name", "model_version", "status"],
        )?;
        let model_load_duration_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "ml_model_load_duration_seconds",
                "Model artifact load + validate latency",
            ),
            &["model_name", "model_version"],
        )?;
        let current_model_version = GaugeVec::new(
            Opts::new("ml_current_model_version", "Version currently serving traffic"),
            &["model_name"],
        )?;
        let feature_cache_hits_total =
            prometheus::Counter::new("ml_feature_cache_hits_total", "Tier-1 feature cache hits")?;
        let feature_cache_misses_total =
            prometheus::Counter::new("ml_feature_cache_misses_total", "Tier-1 feature cache misses")?;
        let prediction_cache_hits_total = prometheus::Counter::new(
            "ml_prediction_cache_hits_total",
            "Prediction cache hits",
        )?;
        let prediction_cache_misses_total = prometheus::Counter::new(
            "ml_prediction_cache_misses_total",
            "Prediction cache misses",
        )?;

        registry.register(Box::new(predictions_total.clone()))?;
        registry.register(Box::new(prediction_duration_seconds.clone()))?;
        registry.register(Box::new(model_loads_total.clone()))?;
        registry.register(Box::new(model_load_duration_seconds.clone()))?;
        registry.register(Box::new(current_model_version.clone()))?;
        registry.register(Box::new(feature_cache_hits_total.clone()))?;
        registry.register(Box::new(feature_cache_misses_total.clone()))?;
        registry.register(Box::new(prediction_cache_hits_total.clone()))?;
        registry.register(Box::new(prediction_cache_misses_total.clone()))?;

        Ok(Self {
            registry,
            predictions_total,
            prediction_duration_seconds,
            model_loads_total,
            model_load_duration_seconds,
            current_model_version,
            feature_cache_hits_total,
            feature_cache_misses_total,
            prediction_cache_hits_total,
            prediction_cache_misses_total,
        })
    }

    pub fn record_prediction(&self, model_name: &str, version: u64, status: &str, seconds: f64) {
        let version = version.to_string();
        self.predictions_total
            .with_label_values(&[model_name, &version, status])
            .inc();
        self.prediction_duration_seconds
            .with_label_values(&[model_name, &version])
            .observe(seconds);
    }

    pub fn record_model_load(&self, model_name: &str, version: u64, status: &str, seconds: f64) {
        let version_label = version.to_string();
        self.model_loads_total
            .with_label_values(&[model_name, &version_label, status])
            .inc();
        self.model_load_duration_seconds
            .with_label_values(&[model_name, &version_label])
            .observe(seconds);
        if status == "success" {
            self.current_model_version
                .with_label_values(&[model_name])
                .set(version as f64);
        }
    }

    /// Render the registry in Prometheus text exposition format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let metric_families = self.registry.gather();
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::new().expect("static metric definitions are well-formed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_includes_registered_instrument_names() {
        let telemetry = Telemetry::new().unwrap();
        telemetry.record_prediction("fraud_detector", 1, "success", 0.012);
        let rendered = telemetry.render().unwrap();
        assert!(rendered.contains("ml_predictions_total"));
        assert!(rendered.contains("ml_prediction_duration_seconds"));
    }

    #[test]
    fn current_model_version_gauge_reflects_last_successful_load() {
        let telemetry = Telemetry::new().unwrap();
        telemetry.record_model_load("fraud_detector", 3, "success", 0.5);
        let rendered = telemetry.render().unwrap();
        assert!(rendered.contains("ml_current_model_version"));
        assert!(rendered.contains('3'));
    }

    #[test]
    fn cache_counters_are_independently_incrementable() {
        let telemetry = Telemetry::new().unwrap();
        telemetry.prediction_cache_hits_total.inc();
        telemetry.prediction_cache_hits_total.inc();
        telemetry.prediction_cache_misses_total.inc();
        assert_eq!(telemetry.prediction_cache_hits_total.get(), 2.0);
        assert_eq!(telemetry.prediction_cache_misses_total.get(), 1.0);
    }
}

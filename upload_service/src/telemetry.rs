use opentelemetry::{
    metrics::{Counter, Histogram, MeterProvider},
    KeyValue,
};
use opentelemetry_sdk::metrics::SdkMeterProvider;
use prometheus::Registry;

const PREDICTION_BOUNDARIES_MS: [f64; 12] = [
    5.0, 10.0, 25.0, 50.0, 75.0, 100.0, 150.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0,
];

pub struct Metrics {
    upload_counter: Counter<u64>,
    prediction_duration: Histogram<u64>,
    provider: SdkMeterProvider,
    pub registry: Registry,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();
        let exporter = opentelemetry_prometheus::exporter()
            .with_registry(registry.clone())
            .build()?;

        let provider = SdkMeterProvider::builder().with_reader(exporter).build();
        let meter = provider.meter("upload_service");

        let upload_counter = meter
            .u64_counter("uploads")
            .with_description("Uploads handled, by outcome")
            .build();

        let prediction_duration = meter
            .u64_histogram("prediction_duration_ms")
            .with_boundaries(PREDICTION_BOUNDARIES_MS.to_vec())
            .with_description("Time spent persisting, preprocessing and predicting an upload")
            .build();

        Ok(Metrics {
            upload_counter,
            prediction_duration,
            provider,
            registry,
        })
    }

    /// Provider to install globally so the HTTP metrics layer reports into
    /// the same registry.
    pub fn provider(&self) -> SdkMeterProvider {
        self.provider.clone()
    }

    pub fn record_upload(&self, outcome: &str) {
        let attributes = [KeyValue::new("outcome", outcome.to_string())];
        self.upload_counter.add(1, &attributes);
    }

    pub fn record_prediction_duration(&self, duration_ms: u64) {
        self.prediction_duration.record(duration_ms, &[]);
    }
}

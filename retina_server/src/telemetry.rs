use opentelemetry::{
    global,
    metrics::{Counter, Histogram, MeterProvider},
    KeyValue,
};
use prometheus::Registry;
use std::collections::HashSet;

pub struct Metrics {
    request_counter: Counter<u64>,
    inference_duration: Histogram<f64>,
    images_processed: Counter<u64>,
    pub registry: Registry,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();
        let exporter = opentelemetry_prometheus::exporter()
            .with_registry(registry.clone())
            .build()?;

        let provider = opentelemetry_sdk::metrics::SdkMeterProvider::builder()
            .with_reader(exporter)
            .build();

        let meter = provider.meter("retina_server");
        global::set_meter_provider(provider);

        let request_counter = meter
            .u64_counter("requests_total")
            .with_description("Total number of requests")
            .build();

        let boundaries = generate_boundaries((1, 21, 101, 1001, 5001));

        let inference_duration = meter
            .f64_histogram("inference_duration_ms")
            .with_boundaries(boundaries)
            .with_description("Duration of a single model forward pass in milliseconds")
            .build();

        let images_processed = meter
            .u64_counter("images_processed_total")
            .with_description("Images run through the model registry")
            .build();

        Ok(Metrics {
            request_counter,
            inference_duration,
            images_processed,
            registry,
        })
    }

    pub fn record_request(&self, route: &str) {
        let attributes = vec![KeyValue::new("route", route.to_string())];
        self.request_counter.add(1, &attributes);
    }

    pub fn record_inference_duration(&self, duration_secs: f64, model: &str) {
        let attributes = vec![KeyValue::new("model", model.to_string())];
        self.inference_duration
            .record(duration_secs * 1000.0, &attributes);
    }

    pub fn record_images(&self, count: u64, mode: &str) {
        let attributes = vec![KeyValue::new("mode", mode.to_string())];
        self.images_processed.add(count, &attributes);
    }
}

/// Histogram buckets: fine below the second boundary, coarser further out.
fn generate_boundaries(parts: (i32, i32, i32, i32, i32)) -> Vec<f64> {
    let first_step: usize = 5;
    let middle_step: usize = 20;
    let end_step: usize = 100;
    let tail_step: usize = 1000;
    let first_part = (parts.0..=parts.1).step_by(first_step);
    let middle_part = (parts.1..=parts.2).step_by(middle_step);
    let end_part = (parts.2..=parts.3).step_by(end_step);
    let tail_part = (parts.3..=parts.4).step_by(tail_step);

    let mut seen = HashSet::new();
    first_part
        .chain(middle_part)
        .chain(end_part)
        .chain(tail_part)
        .filter(|&x| seen.insert(x))
        .map(|x| x as f64)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_boundaries() {
        let get = generate_boundaries((1, 21, 101, 1001, 5001));
        let expected = vec![
            1.0, 6.0, 11.0, 16.0, 21.0, 41.0, 61.0, 81.0, 101.0, 201.0, 301.0, 401.0, 501.0,
            601.0, 701.0, 801.0, 901.0, 1001.0, 2001.0, 3001.0, 4001.0, 5001.0,
        ];

        assert_eq!(get, expected);
    }
}

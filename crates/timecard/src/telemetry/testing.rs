// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Helpers for asserting on emitted counters and logs.

use std::io::Write;
use std::sync::Arc;

use opentelemetry::{KeyValue, Value};
use opentelemetry_sdk::metrics::data::{AggregatedMetrics, MetricData, ResourceMetrics, SumDataPoint};
use opentelemetry_sdk::metrics::{InMemoryMetricExporter, SdkMeterProvider};
use parking_lot::Mutex;
use tracing_subscriber::fmt::MakeWriter;

use super::attributes::EVENT_NAME;
use super::meter::ATTENDANCE_EVENT;

/// Collects the `attendance.event` counter through an in-memory exporter.
#[derive(Debug)]
pub(crate) struct MetricTester {
    exporter: InMemoryMetricExporter,
    provider: SdkMeterProvider,
}

impl MetricTester {
    pub fn new() -> Self {
        let exporter = InMemoryMetricExporter::default();
        let provider = SdkMeterProvider::builder().with_periodic_exporter(exporter.clone()).build();

        Self { exporter, provider }
    }

    pub fn meter_provider(&self) -> &SdkMeterProvider {
        &self.provider
    }

    /// Every attribute reported so far, across all data points.
    pub fn collect_attributes(&self) -> Vec<KeyValue> {
        self.with_data_points(|points| points.iter().flat_map(|point| point.attributes().cloned()).collect())
    }

    /// Number of times `event` was reported.
    pub fn event_count(&self, event: &str) -> u64 {
        self.with_data_points(|points| {
            points
                .iter()
                .filter(|point| {
                    point
                        .attributes()
                        .any(|kv| kv.key.as_str() == EVENT_NAME && kv.value == Value::from(event.to_owned()))
                })
                .map(|point| point.value())
                .sum()
        })
    }

    pub fn assert_attributes_contain(&self, expected: &[KeyValue]) {
        let attributes = self.collect_attributes();

        for kv in expected {
            assert!(attributes.contains(kv), "attribute {kv:?} not reported, got: {attributes:?}");
        }
    }

    /// Flushes and hands the data points of the latest export to `f`.
    fn with_data_points<R>(&self, f: impl FnOnce(&[&SumDataPoint<u64>]) -> R) -> R {
        self.provider.force_flush().unwrap();

        let exported = self.exporter.get_finished_metrics().unwrap();
        let points: Vec<_> = exported
            .last()
            .into_iter()
            .flat_map(ResourceMetrics::scope_metrics)
            .flat_map(|scope| scope.metrics())
            .filter(|metric| metric.name() == ATTENDANCE_EVENT)
            .flat_map(|metric| match metric.data() {
                AggregatedMetrics::U64(MetricData::Sum(sum)) => sum.data_points().collect(),
                _ => Vec::new(),
            })
            .collect();

        f(&points)
    }
}

/// Captures formatted log output of the thread-local subscriber.
#[derive(Debug, Clone, Default)]
pub(crate) struct LogCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn output(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock()).into_owned()
    }

    pub fn assert_contains(&self, expected: &str) {
        let output = self.output();
        assert!(output.contains(expected), "expected '{expected}' in logs:\n{output}");
    }

    pub fn assert_not_contains(&self, unexpected: &str) {
        let output = self.output();
        assert!(!output.contains(unexpected), "unexpected '{unexpected}' in logs:\n{output}");
    }

    /// A subscriber writing plain text into this capture; install it with `set_default()`.
    pub fn subscriber(&self) -> impl tracing::Subscriber + Send + Sync + use<> {
        use tracing_subscriber::layer::SubscriberExt;

        tracing_subscriber::registry().with(tracing_subscriber::fmt::layer().with_writer(self.clone()).with_ansi(false))
    }
}

impl MakeWriter<'_> for LogCapture {
    type Writer = Self;

    fn make_writer(&self) -> Self::Writer {
        self.clone()
    }
}

impl Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

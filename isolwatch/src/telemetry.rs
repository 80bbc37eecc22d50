//! OpenTelemetry metrics export module
//!
//! Exports per-tick detection counters to an OpenTelemetry Collector.
//! Export is enabled only when `OTEL_EXPORTER_OTLP_ENDPOINT` is set.

use anyhow::{Context, Result};
use log::info;
use opentelemetry::metrics::{Counter, Meter};
use opentelemetry::{KeyValue, global};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::monitored::RemovalReason;
use crate::report::TickReport;

/// Metric export interval in seconds
const METRIC_EXPORT_INTERVAL_SECS: u64 = 30;

/// Global metrics handle
static METRICS: OnceLock<IsolWatchMetrics> = OnceLock::new();

/// Global MeterProvider for graceful shutdown
static METER_PROVIDER: OnceLock<SdkMeterProvider> = OnceLock::new();

/// Monitored set size after the last tick (read by the ObservableGauge callback)
static MONITORED_PIDS: AtomicU64 = AtomicU64::new(0);

/// isolwatch metrics collection
///
/// Note: Do NOT add _total suffix to Counter names (Prometheus adds it automatically)
pub struct IsolWatchMetrics {
    pub ticks: Counter<u64>,
    pub violations_detected: Counter<u64>,
    pub monitored_removals: Counter<u64>,
    pub source_unavailable: Counter<u64>,
}

impl IsolWatchMetrics {
    fn new(meter: &Meter) -> Self {
        Self {
            ticks: meter
                .u64_counter("ticks")
                .with_description("Number of completed polling ticks")
                .with_unit("ticks")
                .build(),
            violations_detected: meter
                .u64_counter("violations_detected")
                .with_description("Processes newly found running on an isolated CPU")
                .with_unit("events")
                .build(),
            monitored_removals: meter
                .u64_counter("monitored_removals")
                .with_description("Processes dropped from the monitored set")
                .with_unit("events")
                .build(),
            source_unavailable: meter
                .u64_counter("source_unavailable")
                .with_description("Ticks where the scheduler debug view could not be read")
                .with_unit("ticks")
                .build(),
        }
    }
}

/// Priority:
/// 1. OTEL_EXPORTER_OTLP_ENDPOINT environment variable
/// 2. If not set, metrics are disabled (no default fallback)
fn get_otlp_endpoint() -> Option<String> {
    let endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok()?;
    if endpoint.is_empty() {
        return None;
    }

    if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
        Some(format!("http://{}", endpoint))
    } else {
        Some(endpoint)
    }
}

/// Initialize OpenTelemetry metrics provider
///
/// Skips initialization if OTEL_EXPORTER_OTLP_ENDPOINT is not set.
pub fn init_metrics() -> Result<()> {
    let endpoint = match get_otlp_endpoint() {
        Some(ep) => ep,
        None => {
            info!("OTEL_EXPORTER_OTLP_ENDPOINT not set. Metrics export disabled.");
            return Ok(());
        }
    };

    info!("Initializing OpenTelemetry metrics exporter");
    info!("OTLP endpoint: {}", endpoint);

    let exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .with_endpoint(&endpoint)
        .with_timeout(Duration::from_secs(10))
        .build()
        .context("Failed to create OTLP metric exporter")?;

    let reader = PeriodicReader::builder(exporter, opentelemetry_sdk::runtime::TokioCurrentThread)
        .with_interval(Duration::from_secs(METRIC_EXPORT_INTERVAL_SECS))
        .build();

    let resource = Resource::default().merge(&Resource::new(vec![
        KeyValue::new("service.name", "isolwatch"),
        KeyValue::new("telemetry.sdk.language", "rust"),
    ]));

    let provider = SdkMeterProvider::builder()
        .with_reader(reader)
        .with_resource(resource)
        .build();

    global::set_meter_provider(provider.clone());
    let _ = METER_PROVIDER.set(provider);

    let meter = global::meter("isolwatch");

    let _monitored_gauge = meter
        .u64_observable_gauge("monitored_pids")
        .with_description("Processes currently starving an isolated CPU")
        .with_unit("processes")
        .with_callback(|observer| {
            observer.observe(MONITORED_PIDS.load(Ordering::Relaxed), &[]);
        })
        .build();

    let _ = METRICS.set(IsolWatchMetrics::new(&meter));

    info!("OpenTelemetry metrics initialized successfully");
    Ok(())
}

pub fn metrics() -> Option<&'static IsolWatchMetrics> {
    METRICS.get()
}

/// Record the outcome of one polling tick.
pub fn record_tick(report: &TickReport) {
    MONITORED_PIDS.store(report.monitored.len() as u64, Ordering::Relaxed);

    let Some(m) = metrics() else {
        return;
    };

    m.ticks.add(1, &[]);
    if !report.scan_available {
        m.source_unavailable.add(1, &[]);
    }

    for violation in &report.violations {
        let attrs = [
            KeyValue::new("comm", violation.comm.clone()),
            KeyValue::new("cpu", violation.cpu as i64),
        ];
        m.violations_detected.add(1, &attrs);
    }

    for removal in &report.removals {
        let reason = match removal.reason {
            RemovalReason::Exited => "exited",
            RemovalReason::StateChanged(_) => "state_changed",
        };
        m.monitored_removals
            .add(1, &[KeyValue::new("reason", reason)]);
    }
}

/// Shutdown OpenTelemetry (graceful shutdown)
/// Flushes pending metrics and shuts down the MeterProvider
pub fn shutdown_metrics() {
    if let Some(provider) = METER_PROVIDER.get() {
        info!("Shutting down OpenTelemetry metrics...");
        if let Err(e) = provider.shutdown() {
            log::warn!("Failed to shutdown MeterProvider: {}", e);
        } else {
            info!("OpenTelemetry metrics shutdown complete");
        }
    }
}

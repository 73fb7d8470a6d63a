use crate::collect::FrontendReport;
use prometheus::{
    register_int_counter_with_registry, register_int_gauge_with_registry, Encoder, IntCounter,
    IntGauge, Registry, TextEncoder,
};

/// Counters describing the exporter itself, as opposed to the tuners it polls.
#[derive(Clone)]
pub struct ExporterMetrics {
    pub scrapes: IntCounter,
    pub samples: IntCounter,
    pub reading_errors: IntCounter,
    pub device_timeouts: IntCounter,
    pub frontends: IntGauge,
}

impl ExporterMetrics {
    fn register(registry: &Registry) -> prometheus::Result<Self> {
        Ok(Self {
            scrapes: register_int_counter_with_registry!(
                "dvb_exporter_scrapes_total",
                "Total /metrics requests served",
                registry
            )?,
            samples: register_int_counter_with_registry!(
                "dvb_exporter_samples_total",
                "Frontend samples written to /metrics",
                registry
            )?,
            reading_errors: register_int_counter_with_registry!(
                "dvb_exporter_reading_errors_total",
                "Frontend readings that failed with an error",
                registry
            )?,
            device_timeouts: register_int_counter_with_registry!(
                "dvb_exporter_device_timeouts_total",
                "Frontend polls abandoned or skipped because a driver call did not return in time",
                registry
            )?,
            frontends: register_int_gauge_with_registry!(
                "dvb_exporter_frontends",
                "Number of frontends registered",
                registry
            )?,
        })
    }
}

/// Private prometheus registry for the exporter's own metrics.
#[derive(Clone)]
pub struct MetricsHub {
    registry: Registry,
    pub exporter: ExporterMetrics,
}

impl MetricsHub {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new_custom(None, None)?;
        let exporter = ExporterMetrics::register(&registry)?;
        Ok(Self { registry, exporter })
    }

    pub fn set_frontends(&self, count: usize) {
        self.exporter
            .frontends
            .set(i64::try_from(count).unwrap_or(i64::MAX));
    }

    /// Fold one device's collection outcome into the totals.
    pub fn record(&self, report: &FrontendReport) {
        self.exporter.samples.inc_by(report.records as u64);
        self.exporter.reading_errors.inc_by(report.errors as u64);
    }

    pub fn record_timeout(&self) {
        self.exporter.device_timeouts.inc();
    }

    pub fn encode_text(&self) -> prometheus::Result<String> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

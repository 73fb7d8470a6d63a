//! dvb-registry: discovered DVB frontends and their Prometheus text exposition

mod types;
pub use types::{AdapterEntry, DeviceIdentity, FrontendEntry, PollGuard};

mod error;
pub use error::{RegistryError, Result};

mod scan;
pub use scan::Registry;

pub mod exposition;
pub use exposition::{format_labels, MetricKind, MetricRecord, MetricValue};

mod collect;
pub use collect::{
    percent_of_full_scale, render_frontend, write_frontend, write_registry, FrontendReport,
    ReadingOutcome,
};

mod metrics;
pub use metrics::{ExporterMetrics, MetricsHub};

use crate::exposition::{MetricKind, MetricRecord, MetricValue};
use crate::types::{DeviceIdentity, FrontendEntry};
use crate::Registry;
use dvb_frontend::{FrontendError, FrontendStatus, Measurement, StatKind};
use std::fmt;
use tracing::{debug, warn};

/// Classified result of one hardware query.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadingOutcome<T> {
    Success(T),
    Unavailable,
    Error(FrontendError),
}

impl<T> From<dvb_frontend::Result<T>> for ReadingOutcome<T> {
    fn from(res: dvb_frontend::Result<T>) -> Self {
        match res {
            Ok(v) => ReadingOutcome::Success(v),
            Err(e) if e.is_unsupported() => ReadingOutcome::Unavailable,
            Err(e) => ReadingOutcome::Error(e),
        }
    }
}

impl ReadingOutcome<Measurement> {
    /// Like `From`, but a statistic the driver marks as not available is
    /// `Unavailable` rather than a success.
    pub fn from_measurement(res: dvb_frontend::Result<Measurement>) -> Self {
        match ReadingOutcome::from(res) {
            ReadingOutcome::Success(Measurement::NotAvailable) => ReadingOutcome::Unavailable,
            other => other,
        }
    }
}

/// Convert a reading on the driver's 16-bit scale to a whole percentage.
///
/// Truncating integer arithmetic: `raw * 100 / 0xFFFF`, so `0xFFFF` is 100 and
/// anything below `0x0290` is 0.
pub fn percent_of_full_scale(raw: u16) -> u32 {
    u32::from(raw) * 100 / u32::from(u16::MAX)
}

/// What one device contributed to a scrape.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FrontendReport {
    pub records: usize,
    pub errors: usize,
}

impl std::ops::AddAssign for FrontendReport {
    fn add_assign(&mut self, rhs: Self) {
        self.records += rhs.records;
        self.errors += rhs.errors;
    }
}

struct MetricSpec {
    name: &'static str,
    kind: MetricKind,
    help: &'static str,
}

const fn gauge(name: &'static str, help: &'static str) -> MetricSpec {
    MetricSpec {
        name,
        kind: MetricKind::Gauge,
        help,
    }
}

const fn counter(name: &'static str, help: &'static str) -> MetricSpec {
    MetricSpec {
        name,
        kind: MetricKind::Counter,
        help,
    }
}

const STATUS_GAUGES: [(FrontendStatus, MetricSpec); 5] = [
    (
        FrontendStatus::HAS_SIGNAL,
        gauge(
            "dvb_fe_has_signal",
            "Frontend found something above the noise level",
        ),
    ),
    (
        FrontendStatus::HAS_CARRIER,
        gauge("dvb_fe_has_carrier", "Frontend found a DVB signal"),
    ),
    (
        FrontendStatus::HAS_VITERBI,
        gauge("dvb_fe_has_viterbi", "FEC is stable"),
    ),
    (
        FrontendStatus::HAS_SYNC,
        gauge("dvb_fe_has_sync", "Frontend found sync bytes"),
    ),
    (
        FrontendStatus::HAS_LOCK,
        gauge("dvb_fe_has_lock", "Frontend is receiving data"),
    ),
];

const BER: MetricSpec = gauge(
    "dvb_fe_ber",
    "Bit error rate for the signal currently received/demodulated",
);
const SNR_PERCENT: MetricSpec = gauge(
    "dvb_fe_snr_percent",
    "Signal-to-noise ratio for the signal currently received by the front-end",
);
const SIGNAL_STRENGTH_PERCENT: MetricSpec = gauge(
    "dvb_fe_signal_strength_percent",
    "Signal strength value for the signal currently received by the front-end",
);
const UNCORRECTED_BLOCKS: MetricSpec = counter(
    "dvb_fe_uncorrected_blocks_total",
    "Number of uncorrected blocks detected by the device driver during its lifetime",
);

/// Metrics a statistic may map to, one per scale it is meaningful in.
struct StatMetrics {
    kind: StatKind,
    decibel: Option<MetricSpec>,
    relative: Option<MetricSpec>,
    counter: Option<MetricSpec>,
}

const fn counter_stat(kind: StatKind, spec: MetricSpec) -> StatMetrics {
    StatMetrics {
        kind,
        decibel: None,
        relative: None,
        counter: Some(spec),
    }
}

const STATS: [StatMetrics; 8] = [
    StatMetrics {
        kind: StatKind::CarrierToNoise,
        decibel: Some(gauge(
            "dvb_fe_cnr_decibels",
            "Carrier-to-noise ratio of the main carrier in dB",
        )),
        relative: Some(gauge(
            "dvb_fe_cnr_percent",
            "Carrier-to-noise ratio of the main carrier as a percentage of the driver scale",
        )),
        counter: None,
    },
    StatMetrics {
        kind: StatKind::SignalStrength,
        decibel: Some(gauge(
            "dvb_fe_signal_level_dbm",
            "Signal level at the tuner input in dBm",
        )),
        relative: Some(gauge(
            "dvb_fe_signal_level_percent",
            "Signal level at the tuner input as a percentage of the driver scale",
        )),
        counter: None,
    },
    counter_stat(
        StatKind::PreErrorBitCount,
        counter(
            "dvb_fe_pre_error_bits_total",
            "Bit errors counted before the inner code block (Viterbi, LDPC) decoder",
        ),
    ),
    counter_stat(
        StatKind::PreTotalBitCount,
        counter(
            "dvb_fe_pre_total_bits_total",
            "Bits received before the inner code block decoder",
        ),
    ),
    counter_stat(
        StatKind::PostErrorBitCount,
        counter(
            "dvb_fe_post_error_bits_total",
            "Bit errors counted after the inner coding",
        ),
    ),
    counter_stat(
        StatKind::PostTotalBitCount,
        counter(
            "dvb_fe_post_total_bits_total",
            "Bits received after the inner coding",
        ),
    ),
    counter_stat(
        StatKind::ErrorBlockCount,
        counter(
            "dvb_fe_error_blocks_total",
            "Blocks received with errors after the outer (Reed-Solomon, BCH) decoder",
        ),
    ),
    counter_stat(
        StatKind::TotalBlockCount,
        counter(
            "dvb_fe_total_blocks_total",
            "Blocks received by the outer decoder",
        ),
    ),
];

impl StatMetrics {
    fn select(&self, m: Measurement) -> Option<(&MetricSpec, MetricValue)> {
        match m {
            Measurement::Decibel { .. } => self
                .decibel
                .as_ref()
                .zip(m.as_decibels())
                .map(|(spec, db)| (spec, MetricValue::Float(db))),
            Measurement::Relative(raw) => self
                .relative
                .as_ref()
                .map(|spec| (spec, MetricValue::from(percent_of_full_scale(raw)))),
            Measurement::Counter(n) => self
                .counter
                .as_ref()
                .map(|spec| (spec, MetricValue::Unsigned(n))),
            Measurement::NotAvailable => None,
        }
    }
}

struct DeviceWriter<'a, W> {
    out: &'a mut W,
    id: DeviceIdentity,
    labels: [String; 4],
    report: FrontendReport,
}

impl<W: fmt::Write> DeviceWriter<'_, W> {
    fn emit(&mut self, spec: &MetricSpec, value: MetricValue) -> fmt::Result {
        let rec = MetricRecord {
            name: spec.name,
            kind: spec.kind,
            help: spec.help,
            labels: &self.labels,
            value,
        };
        write!(self.out, "{rec}")?;
        self.report.records += 1;
        Ok(())
    }

    fn take<T>(&mut self, reading: &str, outcome: ReadingOutcome<T>) -> Option<T> {
        match outcome {
            ReadingOutcome::Success(v) => Some(v),
            ReadingOutcome::Unavailable => {
                debug!(adapter = self.id.adapter, frontend = self.id.frontend, reading, "reading not available");
                None
            }
            ReadingOutcome::Error(e) => {
                warn!(adapter = self.id.adapter, frontend = self.id.frontend, reading, error = %e, "error reading frontend");
                self.report.errors += 1;
                None
            }
        }
    }
}

/// Write every obtainable reading of one frontend.
///
/// A failed or unsupported reading only drops that reading; the rest of the
/// device is still queried.
pub fn write_frontend<W: fmt::Write>(
    out: &mut W,
    entry: &FrontendEntry,
) -> Result<FrontendReport, fmt::Error> {
    let fe = entry.device.as_ref();
    let mut w = DeviceWriter {
        out,
        id: entry.id,
        labels: entry.id.label_pairs(),
        report: FrontendReport::default(),
    };

    if let Some(st) = w.take("status", fe.status().into()) {
        for (flag, spec) in &STATUS_GAUGES {
            w.emit(spec, MetricValue::Boolean(st.contains(*flag)))?;
        }
    }
    if let Some(ber) = w.take("ber", fe.ber().into()) {
        w.emit(&BER, MetricValue::from(ber))?;
    }
    if let Some(snr) = w.take("snr", fe.snr().into()) {
        w.emit(&SNR_PERCENT, MetricValue::from(percent_of_full_scale(snr)))?;
    }
    if let Some(ss) = w.take("signal-strength", fe.signal_strength().into()) {
        w.emit(
            &SIGNAL_STRENGTH_PERCENT,
            MetricValue::from(percent_of_full_scale(ss)),
        )?;
    }
    if let Some(ub) = w.take("uncorrected-blocks", fe.uncorrected_blocks().into()) {
        w.emit(&UNCORRECTED_BLOCKS, MetricValue::from(ub))?;
    }

    for stat in &STATS {
        let reading = stat.kind.to_string();
        let outcome = ReadingOutcome::from_measurement(fe.stat(stat.kind));
        let Some(m) = w.take(&reading, outcome) else {
            continue;
        };
        match stat.select(m) {
            Some((spec, value)) => w.emit(spec, value)?,
            None => debug!(
                adapter = w.id.adapter,
                frontend = w.id.frontend,
                reading = %reading,
                scale = %m.scale(),
                "no metric for reported scale"
            ),
        }
    }

    Ok(w.report)
}

/// Render one frontend into a fresh buffer.
pub fn render_frontend(entry: &FrontendEntry) -> (String, FrontendReport) {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let report = write_frontend(&mut out, entry).unwrap_or_default();
    (out, report)
}

/// Write every registered frontend, one after another.
pub fn write_registry<W: fmt::Write>(
    out: &mut W,
    registry: &Registry,
) -> Result<FrontendReport, fmt::Error> {
    let mut total = FrontendReport::default();
    for entry in registry.frontends() {
        total += write_frontend(out, entry)?;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dvb_frontend::MockFrontend;
    use std::sync::Arc;

    fn entry(adapter: u32, frontend: u32, fe: MockFrontend) -> FrontendEntry {
        FrontendEntry::new(
            DeviceIdentity::new(adapter, frontend),
            fe.path().to_path_buf(),
            Arc::new(fe),
        )
    }

    fn registry(entries: Vec<FrontendEntry>) -> Registry {
        let mut reg = Registry::default();
        for e in entries {
            let adapter = format!("/dev/dvb/adapter{}", e.id.adapter);
            reg.insert(adapter, e);
        }
        reg
    }

    #[test]
    fn percent_conversion_truncates() {
        assert_eq!(percent_of_full_scale(0), 0);
        assert_eq!(percent_of_full_scale(123), 0);
        assert_eq!(percent_of_full_scale(0x028F), 0);
        assert_eq!(percent_of_full_scale(0x0290), 1);
        assert_eq!(percent_of_full_scale(0x8000), 50);
        assert_eq!(percent_of_full_scale(0xFFFE), 99);
        assert_eq!(percent_of_full_scale(0xFFFF), 100);
    }

    #[test]
    fn outcome_classification() {
        let ok: ReadingOutcome<u32> = Ok(5).into();
        assert_eq!(ok, ReadingOutcome::Success(5));
        let unsupported: ReadingOutcome<u32> = Err(FrontendError::Unsupported("x")).into();
        assert_eq!(unsupported, ReadingOutcome::Unavailable);
        let failed: ReadingOutcome<u32> = Err(FrontendError::Timeout).into();
        assert_eq!(failed, ReadingOutcome::Error(FrontendError::Timeout));
        assert_eq!(
            ReadingOutcome::from_measurement(Ok(Measurement::NotAvailable)),
            ReadingOutcome::Unavailable
        );
    }

    #[test]
    fn locked_frontend_renders_full_set() {
        let e = entry(0, 0, MockFrontend::locked("/dev/dvb/adapter0/frontend0"));
        let (out, report) = render_frontend(&e);
        assert_eq!(report, FrontendReport { records: 17, errors: 0 });
        assert!(out.contains("dvb_fe_has_lock{adapter=\"0\",frontend=\"0\"} 1\n"));
        assert!(out.contains("# TYPE dvb_fe_uncorrected_blocks_total counter\n"));
        // 0xA000 * 100 / 0xFFFF
        assert!(out.contains("dvb_fe_snr_percent{adapter=\"0\",frontend=\"0\"} 62\n"));
        assert!(out.contains("dvb_fe_cnr_decibels{adapter=\"0\",frontend=\"0\"} 28.500000\n"));
        assert!(out.contains("dvb_fe_signal_level_dbm{adapter=\"0\",frontend=\"0\"} -42.000000\n"));
        assert!(out.contains("dvb_fe_total_blocks_total{adapter=\"0\",frontend=\"0\"} 4096\n"));
        assert!(!out.contains("{}"));
    }

    #[test]
    fn status_flags_render_as_booleans() {
        let fe = MockFrontend::empty("/dev/dvb/adapter1/frontend2")
            .with_status(Ok(FrontendStatus::HAS_SIGNAL | FrontendStatus::HAS_CARRIER));
        let (out, report) = render_frontend(&entry(1, 2, fe));
        assert_eq!(report.records, 5);
        assert!(out.contains("dvb_fe_has_signal{adapter=\"1\",frontend=\"2\"} 1\n"));
        assert!(out.contains("dvb_fe_has_carrier{adapter=\"1\",frontend=\"2\"} 1\n"));
        assert!(out.contains("dvb_fe_has_viterbi{adapter=\"1\",frontend=\"2\"} 0\n"));
        assert!(out.contains("dvb_fe_has_lock{adapter=\"1\",frontend=\"2\"} 0\n"));
    }

    #[test]
    fn status_failure_keeps_other_readings() {
        let fe = MockFrontend::locked("/dev/dvb/adapter0/frontend0")
            .with_status(Err(FrontendError::Io("EIO".into())));
        let (out, report) = render_frontend(&entry(0, 0, fe));
        assert_eq!(report, FrontendReport { records: 12, errors: 1 });
        assert!(!out.contains("dvb_fe_has_lock"));
        assert!(out.contains("dvb_fe_ber{"));
    }

    #[test]
    fn scale_must_match_metric() {
        let fe = MockFrontend::empty("/dev/dvb/adapter0/frontend0")
            .with_stat(StatKind::CarrierToNoise, Ok(Measurement::Counter(9)))
            .with_stat(StatKind::PreErrorBitCount, Ok(Measurement::Decibel { millis: 1 }))
            .with_stat(StatKind::SignalStrength, Ok(Measurement::Relative(0x8000)))
            .with_stat(StatKind::ErrorBlockCount, Ok(Measurement::NotAvailable));
        let (out, report) = render_frontend(&entry(0, 0, fe));
        assert_eq!(report, FrontendReport { records: 1, errors: 0 });
        assert_eq!(
            out,
            "# HELP dvb_fe_signal_level_percent Signal level at the tuner input as a percentage of the driver scale\n\
             # TYPE dvb_fe_signal_level_percent gauge\n\
             dvb_fe_signal_level_percent{adapter=\"0\",frontend=\"0\"} 50\n\n"
        );
    }

    #[test]
    fn legacy_only_driver_skips_statistics() {
        let fe = MockFrontend::locked("/dev/dvb/adapter0/frontend0").without_stats();
        let (out, report) = render_frontend(&entry(0, 0, fe));
        assert_eq!(report, FrontendReport { records: 9, errors: 0 });
        assert!(!out.contains("dvb_fe_cnr"));
    }

    #[test]
    fn silent_frontend_renders_nothing() {
        let (out, report) = render_frontend(&entry(0, 0, MockFrontend::empty("/x")));
        assert!(out.is_empty());
        assert_eq!(report, FrontendReport::default());
    }

    #[test]
    fn failing_device_does_not_blank_others() -> Result<(), fmt::Error> {
        let broken = MockFrontend::empty("/dev/dvb/adapter0/frontend0")
            .with_status(Err(FrontendError::Io("EIO".into())))
            .with_ber(Err(FrontendError::Io("EIO".into())));
        let healthy = MockFrontend::locked("/dev/dvb/adapter1/frontend0");
        let reg = registry(vec![entry(0, 0, broken), entry(1, 0, healthy)]);

        let mut out = String::new();
        let report = write_registry(&mut out, &reg)?;
        assert_eq!(report, FrontendReport { records: 17, errors: 2 });
        assert!(!out.contains("adapter=\"0\""));
        assert_eq!(out.matches("adapter=\"1\"").count(), 17);
        Ok(())
    }

    #[test]
    fn repeated_writes_are_identical() -> Result<(), fmt::Error> {
        let reg = registry(vec![
            entry(0, 0, MockFrontend::locked("/dev/dvb/adapter0/frontend0")),
            entry(0, 1, MockFrontend::locked("/dev/dvb/adapter0/frontend1")),
        ]);
        let mut first = String::new();
        let mut second = String::new();
        write_registry(&mut first, &reg)?;
        write_registry(&mut second, &reg)?;
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn empty_registry_writes_empty_body() -> Result<(), fmt::Error> {
        let mut out = String::new();
        let report = write_registry(&mut out, &Registry::default())?;
        assert!(out.is_empty());
        assert_eq!(report.records, 0);
        Ok(())
    }
}

use crate::{Frontend, FrontendError, FrontendStatus, Measurement, Result, StatKind};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A scripted in-process frontend. Each query replays the configured result.
#[derive(Debug, Clone)]
pub struct MockFrontend {
    path: PathBuf,
    status: Result<FrontendStatus>,
    ber: Result<u32>,
    snr: Result<u16>,
    signal_strength: Result<u16>,
    uncorrected_blocks: Result<u32>,
    stats: HashMap<StatKind, Result<Measurement>>,
    delay: Option<Duration>,
}

impl MockFrontend {
    /// A frontend where every query is unsupported.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        let unsupported = FrontendError::Unsupported("mock reading not scripted");
        Self {
            path: path.into(),
            status: Err(unsupported.clone()),
            ber: Err(unsupported.clone()),
            snr: Err(unsupported.clone()),
            signal_strength: Err(unsupported.clone()),
            uncorrected_blocks: Err(unsupported),
            stats: HashMap::new(),
            delay: None,
        }
    }

    /// A fully locked tuner with plausible legacy and statistics readings.
    pub fn locked(path: impl Into<PathBuf>) -> Self {
        Self::empty(path)
            .with_status(Ok(FrontendStatus::HAS_SIGNAL
                | FrontendStatus::HAS_CARRIER
                | FrontendStatus::HAS_VITERBI
                | FrontendStatus::HAS_SYNC
                | FrontendStatus::HAS_LOCK))
            .with_ber(Ok(0))
            .with_snr(Ok(0xA000))
            .with_signal_strength(Ok(0xC000))
            .with_uncorrected_blocks(Ok(0))
            .with_stat(
                StatKind::CarrierToNoise,
                Ok(Measurement::Decibel { millis: 28_500 }),
            )
            .with_stat(
                StatKind::SignalStrength,
                Ok(Measurement::Decibel { millis: -42_000 }),
            )
            .with_stat(StatKind::PreErrorBitCount, Ok(Measurement::Counter(12)))
            .with_stat(
                StatKind::PreTotalBitCount,
                Ok(Measurement::Counter(1_000_000)),
            )
            .with_stat(StatKind::PostErrorBitCount, Ok(Measurement::Counter(0)))
            .with_stat(
                StatKind::PostTotalBitCount,
                Ok(Measurement::Counter(1_000_000)),
            )
            .with_stat(StatKind::ErrorBlockCount, Ok(Measurement::Counter(0)))
            .with_stat(StatKind::TotalBlockCount, Ok(Measurement::Counter(4_096)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn with_status(mut self, status: Result<FrontendStatus>) -> Self {
        self.status = status;
        self
    }

    pub fn with_ber(mut self, ber: Result<u32>) -> Self {
        self.ber = ber;
        self
    }

    pub fn with_snr(mut self, snr: Result<u16>) -> Self {
        self.snr = snr;
        self
    }

    pub fn with_signal_strength(mut self, ss: Result<u16>) -> Self {
        self.signal_strength = ss;
        self
    }

    pub fn with_uncorrected_blocks(mut self, ub: Result<u32>) -> Self {
        self.uncorrected_blocks = ub;
        self
    }

    pub fn with_stat(mut self, kind: StatKind, value: Result<Measurement>) -> Self {
        self.stats.insert(kind, value);
        self
    }

    /// Drop every scripted statistic, as on a driver without the property API.
    pub fn without_stats(mut self) -> Self {
        self.stats.clear();
        self
    }

    /// Sleep before answering each query, to simulate a slow or hung driver.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn wait(&self) {
        if let Some(d) = self.delay {
            std::thread::sleep(d);
        }
    }
}

impl Frontend for MockFrontend {
    fn open_ro(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(FrontendError::NotFound(path.display().to_string()));
        }
        Ok(Self::locked(path))
    }

    fn status(&self) -> Result<FrontendStatus> {
        self.wait();
        self.status.clone()
    }

    fn ber(&self) -> Result<u32> {
        self.wait();
        self.ber.clone()
    }

    fn snr(&self) -> Result<u16> {
        self.wait();
        self.snr.clone()
    }

    fn signal_strength(&self) -> Result<u16> {
        self.wait();
        self.signal_strength.clone()
    }

    fn uncorrected_blocks(&self) -> Result<u32> {
        self.wait();
        self.uncorrected_blocks.clone()
    }

    fn stat(&self, kind: StatKind) -> Result<Measurement> {
        self.wait();
        self.stats
            .get(&kind)
            .cloned()
            .unwrap_or(Err(FrontendError::Unsupported("mock statistic not scripted")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_requires_existing_path() {
        let err = MockFrontend::open_ro(Path::new("/nonexistent/adapter9/frontend9"))
            .err()
            .map(|e| e.to_string())
            .unwrap_or_default();
        assert!(err.contains("device not found"));
    }

    #[test]
    fn open_existing_path_is_locked() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let fe = MockFrontend::open_ro(dir.path())?;
        assert!(fe.status()?.contains(FrontendStatus::HAS_LOCK));
        assert_eq!(fe.path(), dir.path());
        Ok(())
    }

    #[test]
    fn unscripted_stat_is_unsupported() {
        let fe = MockFrontend::locked("/dev/null").without_stats();
        assert!(fe
            .stat(StatKind::CarrierToNoise)
            .err()
            .is_some_and(|e| e.is_unsupported()));
    }
}

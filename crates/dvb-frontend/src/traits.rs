use crate::{FrontendError, FrontendStatus, Measurement, Result, StatKind};
use std::path::Path;

/// Read-only view of one DVB frontend.
///
/// Implementations must be shareable between request handlers; every query
/// takes `&self` and may block on the device.
pub trait Frontend: Send + Sync {
    /// Open a frontend device node read-only (e.g. `/dev/dvb/adapter0/frontend0`).
    fn open_ro(path: &Path) -> Result<Self>
    where
        Self: Sized;

    /// Current lock state flags.
    fn status(&self) -> Result<FrontendStatus>;

    /// Legacy bit error rate.
    fn ber(&self) -> Result<u32>;

    /// Legacy signal-to-noise ratio on the driver's 16-bit scale.
    fn snr(&self) -> Result<u16>;

    /// Legacy signal strength on the driver's 16-bit scale.
    fn signal_strength(&self) -> Result<u16>;

    /// Legacy uncorrected block counter.
    fn uncorrected_blocks(&self) -> Result<u32>;

    /// Scaled statistic from the property API, when the driver has one.
    fn stat(&self, kind: StatKind) -> Result<Measurement> {
        let _ = kind;
        Err(FrontendError::Unsupported("statistics API not available"))
    }
}

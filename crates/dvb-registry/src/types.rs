use dvb_frontend::Frontend;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Stable `(adapter, frontend)` pair used as the label set of every metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeviceIdentity {
    pub adapter: u32,
    pub frontend: u32,
}

impl DeviceIdentity {
    pub fn new(adapter: u32, frontend: u32) -> Self {
        Self { adapter, frontend }
    }

    /// Alternating key/value label tokens: `adapter`, `<n>`, `frontend`, `<m>`.
    pub fn label_pairs(&self) -> [String; 4] {
        [
            "adapter".to_string(),
            self.adapter.to_string(),
            "frontend".to_string(),
            self.frontend.to_string(),
        ]
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "adapter{}/frontend{}", self.adapter, self.frontend)
    }
}

/// One opened frontend and its identity.
///
/// Clones share the device and its in-flight marker.
#[derive(Clone)]
pub struct FrontendEntry {
    pub id: DeviceIdentity,
    pub path: PathBuf,
    pub device: Arc<dyn Frontend>,
    polling: Arc<AtomicBool>,
}

impl FrontendEntry {
    pub fn new(id: DeviceIdentity, path: impl Into<PathBuf>, device: Arc<dyn Frontend>) -> Self {
        Self {
            id,
            path: path.into(),
            device,
            polling: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Claim the device for one poll. Returns `None` while an earlier poll is still
    /// running, e.g. one abandoned after a timeout whose driver call never returned.
    pub fn try_begin_poll(&self) -> Option<PollGuard> {
        self.polling
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| PollGuard {
                polling: Arc::clone(&self.polling),
            })
    }

    pub fn is_polling(&self) -> bool {
        self.polling.load(Ordering::Acquire)
    }
}

/// Releases the device's poll claim on drop.
#[derive(Debug)]
pub struct PollGuard {
    polling: Arc<AtomicBool>,
}

impl Drop for PollGuard {
    fn drop(&mut self) {
        self.polling.store(false, Ordering::Release);
    }
}

impl fmt::Debug for FrontendEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrontendEntry")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("polling", &self.is_polling())
            .finish_non_exhaustive()
    }
}

/// An adapter directory and the frontends discovered inside it, keyed by path.
#[derive(Debug, Clone)]
pub struct AdapterEntry {
    pub id: u32,
    pub path: PathBuf,
    pub frontends: BTreeMap<PathBuf, FrontendEntry>,
}

impl AdapterEntry {
    pub fn new(id: u32, path: impl AsRef<Path>) -> Self {
        Self {
            id,
            path: path.as_ref().to_path_buf(),
            frontends: BTreeMap::new(),
        }
    }
}

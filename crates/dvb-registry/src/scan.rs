use crate::types::{AdapterEntry, DeviceIdentity, FrontendEntry};
use crate::{RegistryError, Result};
use dvb_frontend::Frontend;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

const ADAPTER_PREFIX: &str = "adapter";
const FRONTEND_PREFIX: &str = "frontend";

/// Opened frontends grouped by adapter, keyed by the discovered paths.
///
/// Built once before serving and shared read-only afterwards.
#[derive(Debug, Default, Clone)]
pub struct Registry {
    adapters: BTreeMap<PathBuf, AdapterEntry>,
}

impl Registry {
    /// Scan `base` and open every frontend with backend `F`.
    pub fn scan<F: Frontend + 'static>(base: impl AsRef<Path>) -> Result<Self> {
        Self::scan_with(base, |path| {
            F::open_ro(path).map(|fe| Arc::new(fe) as Arc<dyn Frontend>)
        })
    }

    /// Scan `base`, opening frontends through `open`.
    pub fn scan_with<O>(base: impl AsRef<Path>, open: O) -> Result<Self>
    where
        O: FnMut(&Path) -> dvb_frontend::Result<Arc<dyn Frontend>>,
    {
        let mut reg = Self::default();
        reg.discover(base, open)?;
        Ok(reg)
    }

    /// Add every frontend under `base` that is not registered yet.
    ///
    /// Paths already present are neither reopened nor replaced, so running this
    /// again over an unchanged tree is a no-op. Returns the number of frontends added.
    pub fn discover<O>(&mut self, base: impl AsRef<Path>, mut open: O) -> Result<usize>
    where
        O: FnMut(&Path) -> dvb_frontend::Result<Arc<dyn Frontend>>,
    {
        let base = base.as_ref();
        if !base.exists() {
            return Err(RegistryError::BasePathMissing(base.to_path_buf()));
        }
        let adapters = list_numbered(base, ADAPTER_PREFIX).map_err(|source| {
            RegistryError::ListBase {
                path: base.to_path_buf(),
                source,
            }
        })?;

        let mut added = 0;
        for (adapter_num, adapter_path) in adapters {
            let frontends = match list_numbered(&adapter_path, FRONTEND_PREFIX) {
                Ok(f) => f,
                Err(e) => {
                    warn!(adapter = %adapter_path.display(), error = %e, "error listing frontends, skipping adapter");
                    continue;
                }
            };
            for (frontend_num, frontend_path) in frontends {
                let already = self
                    .adapters
                    .get(&adapter_path)
                    .is_some_and(|a| a.frontends.contains_key(&frontend_path));
                if already {
                    continue;
                }
                let id = DeviceIdentity::new(adapter_num, frontend_num);
                if let Some(taken) = self.frontends().find(|f| f.id == id) {
                    warn!(
                        entry = %frontend_path.display(),
                        registered = %taken.path.display(),
                        "{id} is already registered under another path, skipping"
                    );
                    continue;
                }

                info!(adapter = adapter_num, frontend = frontend_num, "found a device");
                let device = open(&frontend_path).map_err(|source| RegistryError::Open {
                    path: frontend_path.clone(),
                    source,
                })?;
                self.insert(&adapter_path, FrontendEntry::new(id, &frontend_path, device));
                added += 1;
            }
        }
        Ok(added)
    }

    /// Register a frontend under `adapter_path`. Returns false if its path is taken.
    pub fn insert(&mut self, adapter_path: impl AsRef<Path>, entry: FrontendEntry) -> bool {
        let adapter_path = adapter_path.as_ref();
        let adapter = self
            .adapters
            .entry(adapter_path.to_path_buf())
            .or_insert_with(|| AdapterEntry::new(entry.id.adapter, adapter_path));
        if adapter.frontends.contains_key(&entry.path) {
            return false;
        }
        adapter.frontends.insert(entry.path.clone(), entry);
        true
    }

    pub fn adapters(&self) -> impl Iterator<Item = &AdapterEntry> {
        self.adapters.values()
    }

    pub fn frontends(&self) -> impl Iterator<Item = &FrontendEntry> {
        self.adapters.values().flat_map(|a| a.frontends.values())
    }

    pub fn identities(&self) -> Vec<DeviceIdentity> {
        self.frontends().map(|f| f.id).collect()
    }

    /// Number of registered frontends.
    pub fn len(&self) -> usize {
        self.adapters.values().map(|a| a.frontends.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Entries of `dir` named `<prefix><N>`, sorted by path. Entries with the prefix but
/// a bad number are logged and skipped.
fn list_numbered(dir: &Path, prefix: &str) -> std::io::Result<Vec<(u32, PathBuf)>> {
    let mut out = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        let Some(suffix) = name.strip_prefix(prefix) else {
            continue;
        };
        match suffix.parse::<u32>() {
            Ok(n) => out.push((n, entry.path())),
            Err(e) => {
                warn!(entry = %entry.path().display(), error = %e, "invalid {prefix} number, skipping");
            }
        }
    }
    out.sort_by(|a, b| a.1.cmp(&b.1));
    Ok(out)
}

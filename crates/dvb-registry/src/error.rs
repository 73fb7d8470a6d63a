use dvb_frontend::FrontendError;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = RegistryError> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("base path {} does not exist", .0.display())]
    BasePathMissing(PathBuf),
    #[error("listing {}: {source}", path.display())]
    ListBase {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("opening frontend {}: {source}", path.display())]
    Open {
        path: PathBuf,
        source: FrontendError,
    },
}

impl RegistryError {
    /// Process exit status for a startup failure: 2 for a device that could not be
    /// opened, 1 for everything wrong with the base directory.
    pub fn exit_code(&self) -> i32 {
        match self {
            RegistryError::Open { .. } => 2,
            RegistryError::BasePathMissing(_) | RegistryError::ListBase { .. } => 1,
        }
    }
}

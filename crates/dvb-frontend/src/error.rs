use thiserror::Error;

pub type Result<T, E = FrontendError> = core::result::Result<T, E>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FrontendError {
    #[error("operation not supported by this frontend: {0}")]
    Unsupported(&'static str),
    #[error("device not found: {0}")]
    NotFound(String),
    #[error("I/O error: {0}")]
    Io(String),
    #[error("timeout")]
    Timeout,
}

impl FrontendError {
    pub fn is_unsupported(&self) -> bool {
        matches!(self, FrontendError::Unsupported(_))
    }
}

impl From<std::io::Error> for FrontendError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::NotFound => FrontendError::NotFound(e.to_string()),
            std::io::ErrorKind::TimedOut => FrontendError::Timeout,
            _ => FrontendError::Io(e.to_string()),
        }
    }
}

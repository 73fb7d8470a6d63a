//! dvb-frontend: read-only access to DVB tuner frontends
//!
//! This crate provides the `Frontend` trait and the status and statistics types a
//! monitoring process reads from a tuner. The default build enables a `mock`
//! backend so binaries compile and test on any host; the `linuxdvb` feature adds the
//! ioctl-based Linux DVB API backend.

mod types;
pub use types::{FrontendStatus, Measurement, Scale, StatKind};

mod error;
pub use error::{FrontendError, Result};

mod traits;
pub use traits::Frontend;

#[cfg(feature = "mock")]
mod mock;

#[cfg(feature = "mock")]
pub use mock::MockFrontend;

#[cfg(all(feature = "linuxdvb", target_os = "linux"))]
mod linux;

#[cfg(all(feature = "linuxdvb", target_os = "linux"))]
pub use linux::LinuxFrontend;

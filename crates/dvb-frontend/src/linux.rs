#![allow(unsafe_code)]

use crate::{Frontend, FrontendError, FrontendStatus, Measurement, Result, StatKind};
use libc::{c_ulong, c_void};
use std::fs::{File, OpenOptions};
use std::mem::size_of;
use std::os::unix::io::AsRawFd;
use std::path::Path;

// Kernel errno for "operation not supported" that some DVB drivers leak to userspace.
const ENOTSUPP: i32 = 524;

#[cfg(any(
    target_arch = "powerpc",
    target_arch = "powerpc64",
    target_arch = "mips",
    target_arch = "mips64",
    target_arch = "sparc64"
))]
const IOC_READ: c_ulong = 2 << 29;
#[cfg(not(any(
    target_arch = "powerpc",
    target_arch = "powerpc64",
    target_arch = "mips",
    target_arch = "mips64",
    target_arch = "sparc64"
)))]
const IOC_READ: c_ulong = 2 << 30;

const fn ior(nr: u8, size: usize) -> c_ulong {
    IOC_READ | ((size as c_ulong & 0x1FFF) << 16) | ((b'o' as c_ulong) << 8) | nr as c_ulong
}

const FE_READ_STATUS: c_ulong = ior(69, size_of::<u32>());
const FE_READ_BER: c_ulong = ior(70, size_of::<u32>());
const FE_READ_SIGNAL_STRENGTH: c_ulong = ior(71, size_of::<u16>());
const FE_READ_SNR: c_ulong = ior(72, size_of::<u16>());
const FE_READ_UNCORRECTED_BLOCKS: c_ulong = ior(73, size_of::<u32>());
const FE_GET_PROPERTY: c_ulong = ior(83, size_of::<DtvProperties>());

const FE_SCALE_DECIBEL: u8 = 1;
const FE_SCALE_RELATIVE: u8 = 2;
const FE_SCALE_COUNTER: u8 = 3;

// Union payload of `struct dtv_property`: the largest member is the buffer
// variant ending in a pointer.
const DTV_PROPERTY_PAYLOAD: usize = 48 + size_of::<*mut c_void>();

#[allow(dead_code)]
#[repr(C, packed)]
struct DtvProperty {
    cmd: u32,
    reserved: [u32; 3],
    payload: [u8; DTV_PROPERTY_PAYLOAD],
    result: i32,
}

#[allow(dead_code)]
#[repr(C)]
struct DtvProperties {
    num: u32,
    props: *mut DtvProperty,
}

/// A frontend device node opened read-only through the Linux DVB API.
pub struct LinuxFrontend {
    file: File,
}

impl LinuxFrontend {
    fn read_scalar<T: Copy + Default>(&self, request: c_ulong, what: &'static str) -> Result<T> {
        let mut value = T::default();
        // SAFETY: `request` is a read ioctl whose size is `size_of::<T>()`.
        let rc = unsafe {
            libc::ioctl(
                self.file.as_raw_fd(),
                request as _,
                &mut value as *mut T as *mut c_void,
            )
        };
        if rc < 0 {
            return Err(last_error(what));
        }
        Ok(value)
    }
}

impl Frontend for LinuxFrontend {
    fn open_ro(path: &Path) -> Result<Self> {
        let file = OpenOptions::new().read(true).open(path)?;
        tracing::debug!(path = %path.display(), "opened frontend read-only");
        Ok(Self { file })
    }

    fn status(&self) -> Result<FrontendStatus> {
        let raw: u32 = self.read_scalar(FE_READ_STATUS, "FE_READ_STATUS")?;
        Ok(FrontendStatus::from_bits_truncate(raw))
    }

    fn ber(&self) -> Result<u32> {
        self.read_scalar(FE_READ_BER, "FE_READ_BER")
    }

    fn snr(&self) -> Result<u16> {
        self.read_scalar(FE_READ_SNR, "FE_READ_SNR")
    }

    fn signal_strength(&self) -> Result<u16> {
        self.read_scalar(FE_READ_SIGNAL_STRENGTH, "FE_READ_SIGNAL_STRENGTH")
    }

    fn uncorrected_blocks(&self) -> Result<u32> {
        self.read_scalar(FE_READ_UNCORRECTED_BLOCKS, "FE_READ_UNCORRECTED_BLOCKS")
    }

    fn stat(&self, kind: StatKind) -> Result<Measurement> {
        let mut prop = DtvProperty {
            cmd: kind.property(),
            reserved: [0; 3],
            payload: [0; DTV_PROPERTY_PAYLOAD],
            result: 0,
        };
        let mut props = DtvProperties {
            num: 1,
            props: &mut prop,
        };
        // SAFETY: `props` points at one live, correctly sized `dtv_property`.
        let rc = unsafe {
            libc::ioctl(
                self.file.as_raw_fd(),
                FE_GET_PROPERTY as _,
                &mut props as *mut DtvProperties as *mut c_void,
            )
        };
        if rc < 0 {
            return Err(last_error("FE_GET_PROPERTY"));
        }
        let payload = prop.payload;
        Ok(decode_fe_stats(&payload))
    }
}

/// Decode the first layer of a `struct dtv_fe_stats` (packed: `u8 len`, then
/// `{u8 scale; u64 value}` entries).
fn decode_fe_stats(payload: &[u8]) -> Measurement {
    if payload.len() < 10 || payload[0] == 0 {
        return Measurement::NotAvailable;
    }
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&payload[2..10]);
    match payload[1] {
        FE_SCALE_DECIBEL => Measurement::Decibel {
            millis: i64::from_ne_bytes(raw),
        },
        FE_SCALE_RELATIVE => {
            let v = u64::from_ne_bytes(raw);
            Measurement::Relative(u16::try_from(v).unwrap_or(u16::MAX))
        }
        FE_SCALE_COUNTER => Measurement::Counter(u64::from_ne_bytes(raw)),
        _ => Measurement::NotAvailable,
    }
}

fn last_error(what: &'static str) -> FrontendError {
    let err = std::io::Error::last_os_error();
    match err.raw_os_error() {
        Some(code)
            if code == libc::EOPNOTSUPP
                || code == ENOTSUPP
                || code == libc::ENOTTY
                || code == libc::ENOSYS =>
        {
            FrontendError::Unsupported(what)
        }
        Some(libc::ETIMEDOUT) => FrontendError::Timeout,
        _ => FrontendError::Io(format!("{what}: {err}")),
    }
}

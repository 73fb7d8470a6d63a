use bitflags::bitflags;
use core::fmt;

bitflags! {
    /// Lock state reported by `FE_READ_STATUS`.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
    pub struct FrontendStatus: u32 {
        /// Something above the noise floor was found.
        const HAS_SIGNAL = 0x01;
        /// A DVB signal was found.
        const HAS_CARRIER = 0x02;
        /// Inner FEC (viterbi) is stable.
        const HAS_VITERBI = 0x04;
        /// Sync bytes were found.
        const HAS_SYNC = 0x08;
        /// Everything is locked; the frontend is receiving data.
        const HAS_LOCK = 0x10;
        const TIMEDOUT = 0x20;
        const REINIT = 0x40;
    }
}

/// Physical unit a statistic is expressed in.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Scale {
    NotAvailable,
    Decibel,
    Relative,
    Counter,
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Scale::NotAvailable => "not-available",
            Scale::Decibel => "decibel",
            Scale::Relative => "relative",
            Scale::Counter => "counter",
        };
        f.write_str(s)
    }
}

/// A single scaled statistic as returned by the DVBv5 property API.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Measurement {
    NotAvailable,
    /// Signed value in units of 0.001 dB.
    Decibel { millis: i64 },
    /// Fraction of full scale, 0..=65535.
    Relative(u16),
    Counter(u64),
}

impl Measurement {
    pub fn scale(&self) -> Scale {
        match self {
            Measurement::NotAvailable => Scale::NotAvailable,
            Measurement::Decibel { .. } => Scale::Decibel,
            Measurement::Relative(_) => Scale::Relative,
            Measurement::Counter(_) => Scale::Counter,
        }
    }

    /// Decibel value as a float, or `None` for any other scale.
    pub fn as_decibels(&self) -> Option<f64> {
        match *self {
            Measurement::Decibel { millis } => Some(millis as f64 / 1000.0),
            _ => None,
        }
    }
}

/// Statistics exposed through `FE_GET_PROPERTY` (`DTV_STAT_*`).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum StatKind {
    SignalStrength,
    CarrierToNoise,
    PreErrorBitCount,
    PreTotalBitCount,
    PostErrorBitCount,
    PostTotalBitCount,
    ErrorBlockCount,
    TotalBlockCount,
}

impl StatKind {
    /// Kernel `DTV_STAT_*` property command.
    pub fn property(self) -> u32 {
        match self {
            StatKind::SignalStrength => 62,
            StatKind::CarrierToNoise => 63,
            StatKind::PreErrorBitCount => 64,
            StatKind::PreTotalBitCount => 65,
            StatKind::PostErrorBitCount => 66,
            StatKind::PostTotalBitCount => 67,
            StatKind::ErrorBlockCount => 68,
            StatKind::TotalBlockCount => 69,
        }
    }
}

impl fmt::Display for StatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StatKind::SignalStrength => "signal-level",
            StatKind::CarrierToNoise => "carrier-snr",
            StatKind::PreErrorBitCount => "pre-fec-error-bits",
            StatKind::PreTotalBitCount => "pre-fec-total-bits",
            StatKind::PostErrorBitCount => "post-fec-error-bits",
            StatKind::PostTotalBitCount => "post-fec-total-bits",
            StatKind::ErrorBlockCount => "error-blocks",
            StatKind::TotalBlockCount => "total-blocks",
        };
        f.write_str(s)
    }
}

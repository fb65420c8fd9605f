//! Units shared by scenarios and engines: byte counts, simulated time, data rates, distances
//! and transmit power.

macro_rules! unit {
    ($name: ident) => {
        #[derive(
            Debug,
            Default,
            Copy,
            Clone,
            PartialOrd,
            Ord,
            PartialEq,
            Eq,
            Hash,
            derive_more::Add,
            derive_more::Sub,
            derive_more::AddAssign,
            derive_more::SubAssign,
            derive_more::Sum,
            derive_more::FromStr,
            serde::Serialize,
            serde::Deserialize,
        )]
        pub struct $name(u64);

        impl $name {
            pub const ZERO: $name = Self::new(0);
            pub const ONE: $name = Self::new(1);
            pub const MAX: $name = Self::new(u64::MAX);

            pub const fn new(value: u64) -> Self {
                Self(value)
            }

            pub const fn into_u64(self) -> u64 {
                self.0
            }

            pub fn into_f64(self) -> f64 {
                self.0 as f64
            }
        }
    };
}

unit!(Bytes);

impl Bytes {
    pub const fn into_bits(self) -> u64 {
        self.0.saturating_mul(8)
    }
}

impl std::fmt::Display for Bytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}B", self.0)
    }
}

unit!(Nanosecs);

impl Nanosecs {
    const PER_SEC: f64 = 1e9;

    pub const fn from_secs(secs: u64) -> Self {
        Self(secs * 1_000_000_000)
    }

    pub const fn from_micros(micros: u64) -> Self {
        Self(micros * 1_000)
    }

    pub const fn from_millis(millis: u64) -> Self {
        Self(millis * 1_000_000)
    }

    /// Converts fractional seconds, rounding to the nearest nanosecond. Negative and NaN
    /// inputs become zero.
    pub fn from_secs_f64(secs: f64) -> Self {
        Self((secs * Self::PER_SEC).round() as u64)
    }

    pub fn into_secs_f64(self) -> f64 {
        self.0 as f64 / Self::PER_SEC
    }

    pub fn saturating_mul(self, n: u64) -> Self {
        Self(self.0.saturating_mul(n))
    }
}

impl std::fmt::Display for Nanosecs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}ns", self.0)
    }
}

unit!(BitsPerSec);

impl BitsPerSec {
    /// Converts a rate computed in floating point. Fractional bits are truncated, negative and
    /// NaN rates become zero and rates beyond `u64::MAX` saturate.
    pub fn from_f64_saturating(bps: f64) -> Self {
        Self(bps as u64)
    }

    /// The time needed to serialize `size` bytes at this rate, rounded to the nearest
    /// nanosecond. Returns `None` for a zero rate.
    pub fn transmission_time(self, size: Bytes) -> Option<Nanosecs> {
        if self.0 == 0 {
            return None;
        }
        let bits = u128::from(size.into_bits());
        let rate = u128::from(self.0);
        let ns = (bits * 1_000_000_000 + rate / 2) / rate;
        Some(Nanosecs::new(u64::try_from(ns).unwrap_or(u64::MAX)))
    }
}

impl std::fmt::Display for BitsPerSec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}bps", self.0)
    }
}

unit!(Meters);

impl std::fmt::Display for Meters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}m", self.0)
    }
}

/// Transmit power in milliwatts.
#[derive(
    Debug,
    Default,
    Copy,
    Clone,
    PartialEq,
    PartialOrd,
    derive_more::FromStr,
    serde::Serialize,
    serde::Deserialize,
)]
pub struct Milliwatts(f64);

impl Milliwatts {
    pub const fn new(mw: f64) -> Self {
        Self(mw)
    }

    pub fn into_f64(self) -> f64 {
        self.0
    }

    /// `10 * log10(mW)`. Zero milliwatts maps to negative infinity.
    pub fn to_dbm(self) -> Dbm {
        Dbm(10.0 * self.0.log10())
    }
}

impl std::fmt::Display for Milliwatts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}mW", self.0)
    }
}

/// Power in decibel-milliwatts.
#[derive(Debug, Default, Copy, Clone, PartialEq, PartialOrd, serde::Serialize, serde::Deserialize)]
pub struct Dbm(f64);

impl Dbm {
    pub const fn new(dbm: f64) -> Self {
        Self(dbm)
    }

    pub fn into_f64(self) -> f64 {
        self.0
    }

    pub fn to_milliwatts(self) -> Milliwatts {
        Milliwatts(10f64.powf(self.0 / 10.0))
    }
}

impl std::fmt::Display for Dbm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}dBm", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_milliwatt_is_zero_dbm() {
        assert_eq!(Milliwatts::new(1.0).to_dbm(), Dbm::new(0.0));
        let dbm = Milliwatts::new(100.0).to_dbm().into_f64();
        assert!((dbm - 20.0).abs() < 1e-12);
        let mw = Dbm::new(-30.0).to_milliwatts().into_f64();
        assert!((mw - 0.001).abs() < 1e-15);
    }

    #[test]
    fn transmission_time_of_one_packet() {
        let rate = BitsPerSec::new(5_000);
        assert_eq!(
            rate.transmission_time(Bytes::new(32)),
            Some(Nanosecs::from_micros(51_200))
        );
        assert_eq!(BitsPerSec::ZERO.transmission_time(Bytes::new(32)), None);
    }

    #[test]
    fn float_rates_truncate_and_saturate() {
        assert_eq!(BitsPerSec::from_f64_saturating(4_999.9), BitsPerSec::new(4_999));
        assert_eq!(BitsPerSec::from_f64_saturating(-10.0), BitsPerSec::ZERO);
        assert_eq!(BitsPerSec::from_f64_saturating(f64::NAN), BitsPerSec::ZERO);
        assert_eq!(BitsPerSec::from_f64_saturating(f64::INFINITY), BitsPerSec::MAX);
    }

    #[test]
    fn seconds_round_trip_through_nanoseconds() {
        assert_eq!(Nanosecs::from_secs_f64(5.0), Nanosecs::from_secs(5));
        assert_eq!(Nanosecs::from_secs_f64(-1.0), Nanosecs::ZERO);
        assert_eq!(Nanosecs::from_millis(1_500).into_secs_f64(), 1.5);
    }
}

//! Values for working with time in simulation units.
//!
//! All simulation time is represented as an unsigned count of nanoseconds since the start of the
//! simulation, stored in [`SimulationTime`]. This module also defines the well-known constants
//! used throughout the core (one millisecond, one second, etc) and the conversions to/from
//! [`std::time::Duration`] that the rest of the crate relies on.

use std::time::Duration;

/// Maximum and minimum valid values.
pub const SIMTIME_MAX: u64 = 17_500_059_273_709_551_614;
pub const SIMTIME_MIN: u64 = 0;

/// Represents one nanosecond in simulation time.
pub const SIMTIME_ONE_NANOSECOND: u64 = 1;

/// Represents one microsecond in simulation time.
pub const SIMTIME_ONE_MICROSECOND: u64 = 1_000;

/// Represents one millisecond in simulation time.
pub const SIMTIME_ONE_MILLISECOND: u64 = 1_000_000;

/// Represents one second in simulation time.
pub const SIMTIME_ONE_SECOND: u64 = 1_000_000_000;

/// Represents one minute in simulation time.
pub const SIMTIME_ONE_MINUTE: u64 = 60_000_000_000;

/// Represents one hour in simulation time.
pub const SIMTIME_ONE_HOUR: u64 = 3_600_000_000_000;

/// An unsigned count of nanoseconds since the start of the simulation. Monotonic.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub struct SimulationTime(u64);

impl SimulationTime {
    pub const ZERO: Self = Self(SIMTIME_MIN);
    pub const MAX: Self = Self(SIMTIME_MAX);

    pub const fn from_nanos(nanos: u64) -> Self {
        assert!(nanos <= SIMTIME_MAX, "nanosecond count out of range");
        Self(nanos)
    }

    pub const fn from_millis(millis: u64) -> Self {
        Self::from_nanos(millis * SIMTIME_ONE_MILLISECOND)
    }

    pub const fn from_secs(secs: u64) -> Self {
        Self::from_nanos(secs * SIMTIME_ONE_SECOND)
    }

    pub const fn from_duration(duration: Duration) -> Self {
        let nanos = duration.as_nanos();
        assert!(nanos <= SIMTIME_MAX as u128, "duration is too large");
        Self(nanos as u64)
    }

    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub const fn as_nanos(&self) -> u64 {
        self.0
    }

    pub fn as_micros(&self) -> u64 {
        self.0 / SIMTIME_ONE_MICROSECOND
    }

    pub fn as_millis(&self) -> u64 {
        self.0 / SIMTIME_ONE_MILLISECOND
    }

    pub fn as_secs(&self) -> u64 {
        self.0 / SIMTIME_ONE_SECOND
    }

    pub fn as_nanos_f64(&self) -> f64 {
        self.0 as f64
    }

    pub fn as_millis_f64(&self) -> f64 {
        self.0 as f64 / SIMTIME_ONE_MILLISECOND as f64
    }

    pub fn checked_add(&self, other: Self) -> Option<Self> {
        let sum = self.0.checked_add(other.0)?;
        (sum <= SIMTIME_MAX).then_some(Self(sum))
    }

    pub fn checked_sub(&self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    pub fn saturating_add(&self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0).min(SIMTIME_MAX))
    }

    pub fn saturating_sub(&self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }
}

impl std::ops::Add for SimulationTime {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        self.checked_add(other).expect("SimulationTime overflow")
    }
}

impl std::ops::Sub for SimulationTime {
    type Output = Self;
    fn sub(self, other: Self) -> Self {
        self.checked_sub(other).expect("SimulationTime underflow")
    }
}

impl std::fmt::Display for SimulationTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ns", self.0)
    }
}

impl TryFrom<Duration> for SimulationTime {
    type Error = std::num::TryFromIntError;

    fn try_from(duration: Duration) -> Result<Self, Self::Error> {
        let nanos: u64 = duration.as_nanos().try_into()?;
        if nanos > SIMTIME_MAX {
            // reuse a TryFromIntError by forcing an overflow
            u32::try_from(u64::MAX)?;
        }
        Ok(Self(nanos))
    }
}

impl From<SimulationTime> for Duration {
    fn from(time: SimulationTime) -> Self {
        Duration::from_nanos(time.0)
    }
}

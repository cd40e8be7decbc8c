//! Timeout values used as budgets for blocking BLE operations.
//!
//! A [`Timeout`] is a magnitude paired with a [`TimeUnit`]. Conversions
//! follow integer floor division, so converting to a coarser unit may
//! truncate while converting to a finer unit is exact (saturating at
//! `u64::MAX`).

use std::fmt;
use std::hash::{Hash, Hasher};
use std::time::{Duration, Instant};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Unit of a [`Timeout`] magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TimeUnit {
    Nanoseconds,
    Microseconds,
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    /// All units, finest first.
    pub const ALL: [TimeUnit; 7] = [
        TimeUnit::Nanoseconds,
        TimeUnit::Microseconds,
        TimeUnit::Milliseconds,
        TimeUnit::Seconds,
        TimeUnit::Minutes,
        TimeUnit::Hours,
        TimeUnit::Days,
    ];

    /// Number of nanoseconds in one unit.
    pub const fn nanos(self) -> u128 {
        match self {
            TimeUnit::Nanoseconds => 1,
            TimeUnit::Microseconds => 1_000,
            TimeUnit::Milliseconds => 1_000_000,
            TimeUnit::Seconds => NANOS_PER_SEC,
            TimeUnit::Minutes => 60 * NANOS_PER_SEC,
            TimeUnit::Hours => 3_600 * NANOS_PER_SEC,
            TimeUnit::Days => 86_400 * NANOS_PER_SEC,
        }
    }

    /// Short suffix used in human-readable output.
    pub const fn suffix(self) -> &'static str {
        match self {
            TimeUnit::Nanoseconds => "ns",
            TimeUnit::Microseconds => "us",
            TimeUnit::Milliseconds => "ms",
            TimeUnit::Seconds => "s",
            TimeUnit::Minutes => "min",
            TimeUnit::Hours => "h",
            TimeUnit::Days => "d",
        }
    }

    /// Convert `value` expressed in `from` into this unit.
    ///
    /// Truncates toward zero when `from` is finer than `self` and
    /// saturates at `u64::MAX` when the result does not fit.
    pub fn convert(self, value: u64, from: TimeUnit) -> u64 {
        let converted = u128::from(value) * from.nanos() / self.nanos();
        u64::try_from(converted).unwrap_or(u64::MAX)
    }
}

/// An immutable (magnitude, unit) budget for a blocking operation.
///
/// Equality, ordering and hashing compare the represented span, so
/// `Timeout::secs(1) == Timeout::millis(1000)`.
///
/// # Example
///
/// ```
/// use bleinq_types::{TimeUnit, Timeout};
///
/// let timeout = Timeout::secs(30);
/// assert_eq!(timeout.convert_to(TimeUnit::Milliseconds).value(), 30_000);
/// assert_eq!(timeout.convert_to(TimeUnit::Minutes).value(), 0);
/// assert_eq!(timeout.to_string(), "30s");
/// ```
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Timeout {
    value: u64,
    unit: TimeUnit,
}

impl Timeout {
    /// A zero-length budget.
    pub const ZERO: Timeout = Timeout::of(0, TimeUnit::Milliseconds);

    /// Create a timeout of `value` units.
    pub const fn of(value: u64, unit: TimeUnit) -> Self {
        Self { value, unit }
    }

    /// Create a timeout in seconds.
    pub const fn secs(value: u64) -> Self {
        Self::of(value, TimeUnit::Seconds)
    }

    /// Create a timeout in milliseconds.
    pub const fn millis(value: u64) -> Self {
        Self::of(value, TimeUnit::Milliseconds)
    }

    /// The magnitude in [`Timeout::unit`].
    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn unit(&self) -> TimeUnit {
        self.unit
    }

    /// Express this timeout in another unit.
    ///
    /// Finer-to-coarser conversions floor, e.g. 1999 ms is 1 s.
    #[must_use]
    pub fn convert_to(&self, unit: TimeUnit) -> Timeout {
        Timeout::of(unit.convert(self.value, self.unit), unit)
    }

    /// Whether this budget is exhausted.
    pub fn is_zero(&self) -> bool {
        self.value == 0
    }

    /// The span in nanoseconds, without overflow.
    pub fn as_nanos(&self) -> u128 {
        u128::from(self.value) * self.unit.nanos()
    }

    /// The span as a [`Duration`], saturating at `Duration::MAX` seconds.
    pub fn as_duration(&self) -> Duration {
        let nanos = self.as_nanos();
        let secs = u64::try_from(nanos / NANOS_PER_SEC).unwrap_or(u64::MAX);
        // Always below one billion, so it fits.
        let subsec = (nanos % NANOS_PER_SEC) as u32;
        Duration::new(secs, subsec)
    }

    /// Budget left after `elapsed`, in milliseconds, clamped at zero.
    #[must_use]
    pub fn remaining_after(&self, elapsed: Duration) -> Timeout {
        let left = self.as_duration().saturating_sub(elapsed);
        let millis = u64::try_from(left.as_millis()).unwrap_or(u64::MAX);
        Timeout::millis(millis)
    }

    /// Budget left since `since`, in milliseconds, clamped at zero.
    #[must_use]
    pub fn remaining(&self, since: Instant) -> Timeout {
        self.remaining_after(since.elapsed())
    }

    /// Render as magnitude plus unit suffix, e.g. `30s` or `250ms`.
    pub fn human_readable(&self) -> String {
        format!("{}{}", self.value, self.unit.suffix())
    }
}

impl Default for Timeout {
    fn default() -> Self {
        Timeout::secs(30)
    }
}

impl PartialEq for Timeout {
    fn eq(&self, other: &Self) -> bool {
        self.as_nanos() == other.as_nanos()
    }
}

impl Eq for Timeout {}

impl Hash for Timeout {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_nanos().hash(state);
    }
}

impl PartialOrd for Timeout {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timeout {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_nanos().cmp(&other.as_nanos())
    }
}

impl fmt::Display for Timeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.value, self.unit.suffix())
    }
}

impl From<Duration> for Timeout {
    /// Picks the coarsest unit that represents `duration` exactly.
    fn from(duration: Duration) -> Self {
        let nanos = duration.as_nanos();
        for unit in TimeUnit::ALL.iter().rev() {
            if nanos % unit.nanos() == 0
                && let Ok(value) = u64::try_from(nanos / unit.nanos())
            {
                return Timeout::of(value, *unit);
            }
        }
        Timeout::of(
            u64::try_from(nanos).unwrap_or(u64::MAX),
            TimeUnit::Nanoseconds,
        )
    }
}

impl From<Timeout> for Duration {
    fn from(timeout: Timeout) -> Self {
        timeout.as_duration()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_to_finer_unit_is_exact() {
        let timeout = Timeout::secs(30).convert_to(TimeUnit::Milliseconds);
        assert_eq!(timeout.value(), 30_000);
        assert_eq!(timeout.unit(), TimeUnit::Milliseconds);
    }

    #[test]
    fn test_convert_to_coarser_unit_floors() {
        assert_eq!(Timeout::millis(1999).convert_to(TimeUnit::Seconds).value(), 1);
        assert_eq!(Timeout::secs(59).convert_to(TimeUnit::Minutes).value(), 0);
        assert_eq!(
            Timeout::of(90, TimeUnit::Minutes)
                .convert_to(TimeUnit::Hours)
                .value(),
            1
        );
    }

    #[test]
    fn test_convert_keeps_target_unit() {
        // The converted value carries the requested unit, not a default one.
        let timeout = Timeout::of(2, TimeUnit::Minutes).convert_to(TimeUnit::Seconds);
        assert_eq!(timeout.unit(), TimeUnit::Seconds);
        assert_eq!(timeout.value(), 120);
    }

    #[test]
    fn test_convert_saturates() {
        let timeout = Timeout::of(u64::MAX, TimeUnit::Days).convert_to(TimeUnit::Nanoseconds);
        assert_eq!(timeout.value(), u64::MAX);
    }

    #[test]
    fn test_equality_across_units() {
        assert_eq!(Timeout::secs(1), Timeout::millis(1000));
        assert_ne!(Timeout::secs(1), Timeout::millis(999));
        assert!(Timeout::millis(999) < Timeout::secs(1));
    }

    #[test]
    fn test_as_duration() {
        assert_eq!(Timeout::secs(30).as_duration(), Duration::from_secs(30));
        assert_eq!(
            Timeout::of(1500, TimeUnit::Microseconds).as_duration(),
            Duration::from_micros(1500)
        );
    }

    #[test]
    fn test_remaining_after_subtracts() {
        let left = Timeout::secs(10).remaining_after(Duration::from_millis(2500));
        assert_eq!(left, Timeout::millis(7500));
        assert_eq!(left.unit(), TimeUnit::Milliseconds);
    }

    #[test]
    fn test_remaining_after_clamps_at_zero() {
        let left = Timeout::secs(1).remaining_after(Duration::from_secs(5));
        assert!(left.is_zero());
        assert_eq!(left, Timeout::ZERO);
    }

    #[test]
    fn test_remaining_since_instant() {
        let start = Instant::now();
        let left = Timeout::secs(60).remaining(start);
        assert!(left <= Timeout::secs(60));
        assert!(left > Timeout::secs(50));
    }

    #[test]
    fn test_human_readable() {
        assert_eq!(Timeout::secs(30).human_readable(), "30s");
        assert_eq!(Timeout::millis(250).to_string(), "250ms");
        assert_eq!(Timeout::of(2, TimeUnit::Minutes).to_string(), "2min");
        assert_eq!(Timeout::of(7, TimeUnit::Microseconds).to_string(), "7us");
    }

    #[test]
    fn test_from_duration_picks_coarsest_exact_unit() {
        assert_eq!(Timeout::from(Duration::from_secs(120)).unit(), TimeUnit::Minutes);
        assert_eq!(Timeout::from(Duration::from_millis(1500)).unit(), TimeUnit::Milliseconds);
        assert_eq!(Timeout::from(Duration::ZERO).unit(), TimeUnit::Days);
        assert_eq!(Timeout::from(Duration::from_nanos(3)), Timeout::of(3, TimeUnit::Nanoseconds));
    }

    #[test]
    fn test_default_is_thirty_seconds() {
        assert_eq!(Timeout::default(), Timeout::secs(30));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serde_roundtrip() {
        let timeout = Timeout::of(5, TimeUnit::Minutes);
        let json = serde_json::to_string(&timeout).unwrap();
        assert_eq!(json, r#"{"value":5,"unit":"minutes"}"#);
        let back: Timeout = serde_json::from_str(&json).unwrap();
        assert_eq!(back, timeout);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn any_unit() -> impl Strategy<Value = TimeUnit> {
        prop::sample::select(TimeUnit::ALL.to_vec())
    }

    proptest! {
        /// Converting to any unit never panics and never grows the span.
        #[test]
        fn convert_never_grows(value: u64, from in any_unit(), to in any_unit()) {
            let timeout = Timeout::of(value, from);
            let converted = timeout.convert_to(to);
            prop_assert!(converted <= timeout);
        }

        /// Finer-then-back conversions are lossless when nothing saturates.
        #[test]
        fn finer_roundtrip_is_lossless(value in 0u64..100_000, unit in any_unit()) {
            let timeout = Timeout::of(value, unit);
            let roundtrip = timeout
                .convert_to(TimeUnit::Nanoseconds)
                .convert_to(unit);
            prop_assert_eq!(roundtrip.value(), value);
        }

        /// Remaining budget is never more than the total.
        #[test]
        fn remaining_is_bounded(total in 0u64..100_000, elapsed in 0u64..200_000) {
            let timeout = Timeout::millis(total);
            let left = timeout.remaining_after(Duration::from_millis(elapsed));
            prop_assert!(left <= timeout);
            prop_assert_eq!(left.value(), total.saturating_sub(elapsed));
        }
    }
}

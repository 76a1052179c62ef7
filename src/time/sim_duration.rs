//! Picosecond-resolution virtual duration.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};
use std::time::Duration;

/// Picoseconds per nanosecond.
pub const PICOS_PER_NANO: i64 = 1_000;
/// Picoseconds per microsecond.
pub const PICOS_PER_MICRO: i64 = 1_000_000;
/// Picoseconds per millisecond.
pub const PICOS_PER_MILLI: i64 = 1_000_000_000;
/// Picoseconds per second.
pub const PICOS_PER_SEC: i64 = 1_000_000_000_000;
/// Picoseconds per minute.
pub const PICOS_PER_MIN: i64 = 60 * PICOS_PER_SEC;
/// Picoseconds per hour.
pub const PICOS_PER_HOUR: i64 = 3_600 * PICOS_PER_SEC;
/// Picoseconds per day.
pub const PICOS_PER_DAY: i64 = 24 * PICOS_PER_HOUR;

/// A signed virtual duration with picosecond resolution.
///
/// `SimDuration` is the time scalar of the simulator: timer deadlines, clock
/// periods and the virtual `elapsed` cursor are all expressed with it. It is
/// internally a single signed 64-bit picosecond count, which covers a range
/// of roughly ±106 days, ample for hardware modelling. Minutes are always
/// 60 seconds and days always 24 hours; there are no calendar semantics.
///
/// A duration is built from any mix of unit constructors combined with `+`
/// and `-`, each part possibly negative:
///
/// ```
/// use picosim::time::SimDuration;
///
/// let d = SimDuration::from_secs(1) + SimDuration::from_picos(250);
/// assert_eq!(d.as_picos(), 1_000_000_000_250);
///
/// let e = SimDuration::from_mins(1) - SimDuration::from_secs(90);
/// assert!(e.is_negative());
/// ```
///
/// The native [`Duration`](std::time::Duration) type interoperates freely:
/// it is lifted exactly into picoseconds by all mixed-type arithmetic and
/// comparison operators.
///
/// ```
/// use std::time::Duration;
/// use picosim::time::SimDuration;
///
/// let d = SimDuration::from_picos(1) + Duration::from_secs(1);
/// assert_eq!(d, SimDuration::from_secs(1) + SimDuration::from_picos(1));
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimDuration {
    picos: i64,
}

impl SimDuration {
    /// A zero duration, the additive identity.
    pub const ZERO: Self = Self { picos: 0 };

    /// The largest representable duration.
    pub const MAX: Self = Self { picos: i64::MAX };

    /// The smallest (most negative) representable duration.
    pub const MIN: Self = Self { picos: i64::MIN };

    /// Creates a duration from a signed number of picoseconds.
    pub const fn from_picos(picos: i64) -> Self {
        Self { picos }
    }

    /// Creates a duration from a signed number of nanoseconds.
    pub const fn from_nanos(nanos: i64) -> Self {
        Self {
            picos: nanos * PICOS_PER_NANO,
        }
    }

    /// Creates a duration from a signed number of microseconds.
    pub const fn from_micros(micros: i64) -> Self {
        Self {
            picos: micros * PICOS_PER_MICRO,
        }
    }

    /// Creates a duration from a signed number of milliseconds.
    pub const fn from_millis(millis: i64) -> Self {
        Self {
            picos: millis * PICOS_PER_MILLI,
        }
    }

    /// Creates a duration from a signed number of seconds.
    pub const fn from_secs(secs: i64) -> Self {
        Self {
            picos: secs * PICOS_PER_SEC,
        }
    }

    /// Creates a duration from a signed number of minutes.
    pub const fn from_mins(mins: i64) -> Self {
        Self {
            picos: mins * PICOS_PER_MIN,
        }
    }

    /// Creates a duration from a signed number of hours.
    pub const fn from_hours(hours: i64) -> Self {
        Self {
            picos: hours * PICOS_PER_HOUR,
        }
    }

    /// Creates a duration from a signed number of days.
    pub const fn from_days(days: i64) -> Self {
        Self {
            picos: days * PICOS_PER_DAY,
        }
    }

    /// Returns the total number of picoseconds.
    pub const fn as_picos(self) -> i64 {
        self.picos
    }

    /// Returns the number of whole nanoseconds, truncated toward zero.
    pub const fn as_nanos(self) -> i64 {
        self.picos / PICOS_PER_NANO
    }

    /// Returns the number of whole microseconds, truncated toward zero.
    pub const fn as_micros(self) -> i64 {
        self.picos / PICOS_PER_MICRO
    }

    /// Returns the number of whole milliseconds, truncated toward zero.
    pub const fn as_millis(self) -> i64 {
        self.picos / PICOS_PER_MILLI
    }

    /// Returns the number of whole seconds, truncated toward zero.
    pub const fn as_secs(self) -> i64 {
        self.picos / PICOS_PER_SEC
    }

    /// Returns the number of whole minutes, truncated toward zero.
    pub const fn as_mins(self) -> i64 {
        self.picos / PICOS_PER_MIN
    }

    /// Returns the number of whole hours, truncated toward zero.
    pub const fn as_hours(self) -> i64 {
        self.picos / PICOS_PER_HOUR
    }

    /// Returns the number of whole days, truncated toward zero.
    pub const fn as_days(self) -> i64 {
        self.picos / PICOS_PER_DAY
    }

    /// Reports whether the duration is strictly negative.
    pub const fn is_negative(self) -> bool {
        self.picos < 0
    }

    /// Reports whether the duration is zero.
    pub const fn is_zero(self) -> bool {
        self.picos == 0
    }

    /// Returns the non-negative magnitude of the duration.
    ///
    /// # Panics
    ///
    /// Panics if the magnitude is not representable, i.e. for
    /// [`SimDuration::MIN`].
    pub fn abs(self) -> Self {
        Self {
            picos: self
                .picos
                .checked_abs()
                .expect("overflow when computing the duration magnitude"),
        }
    }

    /// Returns the larger of two durations.
    pub fn max(self, other: Self) -> Self {
        if self.picos >= other.picos {
            self
        } else {
            other
        }
    }

    /// Returns the smaller of two durations.
    pub fn min(self, other: Self) -> Self {
        if self.picos <= other.picos {
            self
        } else {
            other
        }
    }

    /// Checked addition, returning `None` on overflow.
    pub const fn checked_add(self, rhs: Self) -> Option<Self> {
        match self.picos.checked_add(rhs.picos) {
            Some(picos) => Some(Self { picos }),
            None => None,
        }
    }

    /// Checked subtraction, returning `None` on overflow.
    pub const fn checked_sub(self, rhs: Self) -> Option<Self> {
        match self.picos.checked_sub(rhs.picos) {
            Some(picos) => Some(Self { picos }),
            None => None,
        }
    }

    /// Checked integer division, truncated toward zero.
    ///
    /// Returns `None` if `rhs` is zero or if the quotient overflows.
    pub const fn checked_div(self, rhs: i64) -> Option<Self> {
        match self.picos.checked_div(rhs) {
            Some(picos) => Some(Self { picos }),
            None => None,
        }
    }
}

impl Add for SimDuration {
    type Output = Self;

    /// Adds two durations.
    ///
    /// # Panics
    ///
    /// Panics if the result is not representable.
    fn add(self, rhs: Self) -> Self {
        self.checked_add(rhs)
            .expect("overflow when adding durations")
    }
}

impl Sub for SimDuration {
    type Output = Self;

    /// Subtracts a duration.
    ///
    /// # Panics
    ///
    /// Panics if the result is not representable.
    fn sub(self, rhs: Self) -> Self {
        self.checked_sub(rhs)
            .expect("overflow when subtracting durations")
    }
}

impl Add<Duration> for SimDuration {
    type Output = Self;

    /// Adds a native duration, lifted to picoseconds.
    ///
    /// # Panics
    ///
    /// Panics if the result is not representable.
    fn add(self, rhs: Duration) -> Self {
        self + Self::from(rhs)
    }
}

impl Sub<Duration> for SimDuration {
    type Output = Self;

    /// Subtracts a native duration, lifted to picoseconds.
    ///
    /// # Panics
    ///
    /// Panics if the result is not representable.
    fn sub(self, rhs: Duration) -> Self {
        self - Self::from(rhs)
    }
}

impl Add<SimDuration> for Duration {
    type Output = SimDuration;

    /// Adds a virtual duration to a native duration, lifted to picoseconds.
    ///
    /// # Panics
    ///
    /// Panics if the result is not representable.
    fn add(self, rhs: SimDuration) -> SimDuration {
        SimDuration::from(self) + rhs
    }
}

impl Sub<SimDuration> for Duration {
    type Output = SimDuration;

    /// Subtracts a virtual duration from a native duration, lifted to
    /// picoseconds.
    ///
    /// # Panics
    ///
    /// Panics if the result is not representable.
    fn sub(self, rhs: SimDuration) -> SimDuration {
        SimDuration::from(self) - rhs
    }
}

impl AddAssign for SimDuration {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl SubAssign for SimDuration {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl AddAssign<Duration> for SimDuration {
    fn add_assign(&mut self, rhs: Duration) {
        *self = *self + rhs;
    }
}

impl SubAssign<Duration> for SimDuration {
    fn sub_assign(&mut self, rhs: Duration) {
        *self = *self - rhs;
    }
}

impl Neg for SimDuration {
    type Output = Self;

    /// Returns the additive inverse.
    ///
    /// # Panics
    ///
    /// Panics if the result is not representable, i.e. for
    /// [`SimDuration::MIN`].
    fn neg(self) -> Self {
        Self {
            picos: self
                .picos
                .checked_neg()
                .expect("overflow when negating a duration"),
        }
    }
}

impl Mul<i64> for SimDuration {
    type Output = Self;

    /// Multiplies the duration by an integer factor.
    ///
    /// # Panics
    ///
    /// Panics if the result is not representable.
    fn mul(self, rhs: i64) -> Self {
        Self {
            picos: self
                .picos
                .checked_mul(rhs)
                .expect("overflow when multiplying a duration"),
        }
    }
}

impl Mul<SimDuration> for i64 {
    type Output = SimDuration;

    /// Multiplies the duration by an integer factor.
    ///
    /// # Panics
    ///
    /// Panics if the result is not representable.
    fn mul(self, rhs: SimDuration) -> SimDuration {
        rhs * self
    }
}

impl Mul<f64> for SimDuration {
    type Output = Self;

    /// Multiplies the duration by a real factor.
    ///
    /// The fractional picosecond product is rounded to the nearest integer,
    /// with ties rounded away from zero ([`f64::round`] semantics).
    ///
    /// # Panics
    ///
    /// Panics if the result is not representable.
    fn mul(self, rhs: f64) -> Self {
        let picos = (self.picos as f64 * rhs).round();
        assert!(
            picos >= i64::MIN as f64 && picos <= i64::MAX as f64,
            "overflow when multiplying a duration"
        );

        Self {
            picos: picos as i64,
        }
    }
}

impl Mul<SimDuration> for f64 {
    type Output = SimDuration;

    /// Multiplies the duration by a real factor.
    ///
    /// # Panics
    ///
    /// Panics if the result is not representable.
    fn mul(self, rhs: SimDuration) -> SimDuration {
        rhs * self
    }
}

impl Div<i64> for SimDuration {
    type Output = Self;

    /// Divides the duration by an integer quotient, truncating toward zero.
    ///
    /// # Panics
    ///
    /// Panics if `rhs` is zero, or if the quotient overflows. For a
    /// non-panicking variant, see [`SimDuration::checked_div`].
    fn div(self, rhs: i64) -> Self {
        if rhs == 0 {
            panic!("division of a duration by zero");
        }

        self.checked_div(rhs)
            .expect("overflow when dividing a duration")
    }
}

impl Sum for SimDuration {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl From<Duration> for SimDuration {
    /// Lifts a native duration exactly into picoseconds.
    ///
    /// # Panics
    ///
    /// Panics if the lifted value exceeds [`SimDuration::MAX`].
    fn from(duration: Duration) -> Self {
        let picos = duration.as_nanos() * PICOS_PER_NANO as u128;

        Self {
            picos: i64::try_from(picos).expect("native duration overflows the picosecond range"),
        }
    }
}

/// Exact comparison of a picosecond count with a lifted native duration.
///
/// The comparison is performed with 128-bit intermediates so that native
/// durations beyond the `SimDuration` range compare correctly instead of
/// overflowing.
fn cmp_picos(picos: i64, duration: &Duration) -> std::cmp::Ordering {
    let lifted = duration.as_nanos() as i128 * PICOS_PER_NANO as i128;

    (picos as i128).cmp(&lifted)
}

impl PartialEq<Duration> for SimDuration {
    fn eq(&self, other: &Duration) -> bool {
        cmp_picos(self.picos, other).is_eq()
    }
}

impl PartialEq<SimDuration> for Duration {
    fn eq(&self, other: &SimDuration) -> bool {
        cmp_picos(other.picos, self).is_eq()
    }
}

impl PartialOrd<Duration> for SimDuration {
    fn partial_cmp(&self, other: &Duration) -> Option<std::cmp::Ordering> {
        Some(cmp_picos(self.picos, other))
    }
}

impl PartialOrd<SimDuration> for Duration {
    fn partial_cmp(&self, other: &SimDuration) -> Option<std::cmp::Ordering> {
        Some(cmp_picos(other.picos, self).reverse())
    }
}

impl fmt::Display for SimDuration {
    /// Renders the duration as `H:MM:SS.mmmmmm`, appending a `.pppppp`
    /// sub-microsecond remainder when it is non-zero.
    ///
    /// # Examples
    ///
    /// ```
    /// use picosim::time::SimDuration;
    ///
    /// let d = SimDuration::from_micros(1) + SimDuration::from_nanos(1)
    ///     + SimDuration::from_picos(1);
    /// assert_eq!(d.to_string(), "0:00:00.000001.001001");
    /// ```
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.picos < 0 {
            write!(f, "-")?;
        }
        let magnitude = self.picos.unsigned_abs();
        let micros = magnitude / PICOS_PER_MICRO as u64;
        let sub_micro_picos = magnitude % PICOS_PER_MICRO as u64;

        let hours = micros / 3_600_000_000;
        let mins = micros / 60_000_000 % 60;
        let secs = micros / 1_000_000 % 60;
        let micros = micros % 1_000_000;

        write!(f, "{}:{:02}:{:02}.{:06}", hours, mins, secs, micros)?;
        if sub_micro_picos != 0 {
            write!(f, ".{:06}", sub_micro_picos)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_constructors_weigh_parts() {
        assert_eq!(SimDuration::from_nanos(1).as_picos(), 1_000);
        assert_eq!(SimDuration::from_micros(1).as_picos(), 1_000_000);
        assert_eq!(SimDuration::from_millis(1).as_picos(), 1_000_000_000);
        assert_eq!(SimDuration::from_secs(1).as_picos(), 1_000_000_000_000);
        assert_eq!(SimDuration::from_mins(1), SimDuration::from_secs(60));
        assert_eq!(SimDuration::from_hours(1), SimDuration::from_mins(60));
        assert_eq!(SimDuration::from_days(1), SimDuration::from_hours(24));
    }

    #[test]
    fn mixed_part_construction_sums() {
        let d = SimDuration::from_days(1) + SimDuration::from_secs(-1) + SimDuration::from_picos(7);

        assert_eq!(d.as_picos(), PICOS_PER_DAY - PICOS_PER_SEC + 7);
    }

    #[test]
    fn picosecond_round_trip() {
        let d = SimDuration::from_secs(3) + SimDuration::from_picos(17);

        assert_eq!(SimDuration::from_picos(d.as_picos()), d);
    }

    #[test]
    fn additive_identity_and_inverse() {
        let d = SimDuration::from_millis(42);

        assert_eq!(d + SimDuration::ZERO, d);
        assert_eq!((d + SimDuration::from_nanos(3)) - SimDuration::from_nanos(3), d);
        assert_eq!(d + -d, SimDuration::ZERO);
        assert_eq!((-d).abs(), d);
    }

    #[test]
    fn real_factor_multiplication_rounds() {
        assert_eq!(
            SimDuration::from_micros(1) * 0.002,
            SimDuration::from_nanos(2)
        );
        assert_eq!(0.5 * SimDuration::from_picos(5), SimDuration::from_picos(3));
        assert_eq!(
            SimDuration::from_picos(-5) * 0.5,
            SimDuration::from_picos(-3)
        );
    }

    #[test]
    fn integer_division_truncates() {
        assert_eq!(
            SimDuration::from_picos(7) / 2,
            SimDuration::from_picos(3)
        );
        assert_eq!(
            SimDuration::from_picos(-7) / 2,
            SimDuration::from_picos(-3)
        );
        assert_eq!(SimDuration::from_secs(1).checked_div(0), None);
    }

    #[test]
    #[should_panic(expected = "division of a duration by zero")]
    fn division_by_zero_panics() {
        let _ = SimDuration::from_secs(1) / 0;
    }

    #[test]
    fn native_duration_lift() {
        assert_eq!(
            SimDuration::from(Duration::from_micros(1)),
            SimDuration::from_micros(1)
        );
        assert_eq!(
            SimDuration::from_picos(1) + Duration::from_secs(1),
            SimDuration::from_secs(1) + SimDuration::from_picos(1)
        );
        assert_eq!(
            Duration::from_secs(2) - SimDuration::from_secs(1),
            SimDuration::from_secs(1)
        );
    }

    #[test]
    fn native_duration_comparison() {
        assert_eq!(SimDuration::from_secs(1), Duration::from_secs(1));
        assert_eq!(Duration::from_secs(1), SimDuration::from_secs(1));
        assert!(SimDuration::from_secs(1) < Duration::from_nanos(1_000_000_001));
        assert!(Duration::from_nanos(1_000_000_001) > SimDuration::from_secs(1));
        assert!(SimDuration::from_picos(-1) < Duration::ZERO);

        // A native duration beyond the i64 picosecond range compares larger,
        // without overflowing.
        assert!(SimDuration::MAX < Duration::from_secs(u64::MAX));
    }

    #[test]
    fn whole_unit_accessors_truncate_toward_zero() {
        let d = SimDuration::from_millis(1_500);

        assert_eq!(d.as_secs(), 1);
        assert_eq!((-d).as_secs(), -1);
        assert_eq!(d.as_millis(), 1_500);
        assert_eq!(d.as_mins(), 0);

        let e = SimDuration::from_hours(25);
        assert_eq!(e.as_days(), 1);
        assert_eq!(e.as_hours(), 25);
    }

    #[test]
    fn ordering_follows_picosecond_count() {
        let mut durations = [
            SimDuration::from_secs(1),
            SimDuration::from_picos(-1),
            SimDuration::ZERO,
            SimDuration::from_nanos(1),
        ];
        durations.sort();

        assert_eq!(
            durations,
            [
                SimDuration::from_picos(-1),
                SimDuration::ZERO,
                SimDuration::from_nanos(1),
                SimDuration::from_secs(1),
            ]
        );
    }

    #[test]
    fn canonical_formatting() {
        let d = SimDuration::from_micros(1) + SimDuration::from_nanos(1) + SimDuration::from_picos(1);
        assert_eq!(d.to_string(), "0:00:00.000001.001001");

        assert_eq!(SimDuration::ZERO.to_string(), "0:00:00.000000");
        assert_eq!(SimDuration::from_picos(1).to_string(), "0:00:00.000000.000001");
        assert_eq!(
            (SimDuration::from_hours(26) + SimDuration::from_mins(3)).to_string(),
            "26:03:00.000000"
        );
        assert_eq!(SimDuration::from_secs(-1).to_string(), "-0:00:01.000000");
    }

    #[test]
    fn sums_over_iterators() {
        let total: SimDuration = (1..=4).map(SimDuration::from_picos).sum();

        assert_eq!(total, SimDuration::from_picos(10));
    }
}

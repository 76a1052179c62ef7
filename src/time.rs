//! Virtual time.
//!
//! This module provides [`SimDuration`], the picosecond-resolution scalar on
//! which the whole simulator is built: timer deadlines, clock periods and the
//! virtual time cursor are all `SimDuration` values.
//!
//! Native [`std::time::Duration`] values interoperate with `SimDuration`
//! everywhere a duration is expected; they are lifted exactly into
//! picoseconds.
//!
//! # Examples
//!
//! A clock period of 1.25 ns, expressed three equivalent ways:
//!
//! ```
//! use std::time::Duration;
//! use picosim::time::SimDuration;
//!
//! let a = SimDuration::from_picos(1_250);
//! let b = SimDuration::from_nanos(1) + SimDuration::from_picos(250);
//! let c = Duration::from_nanos(1) + SimDuration::from_picos(250);
//!
//! assert_eq!(a, b);
//! assert_eq!(b, c);
//! ```

mod sim_duration;

pub use sim_duration::{
    SimDuration, PICOS_PER_DAY, PICOS_PER_HOUR, PICOS_PER_MICRO, PICOS_PER_MILLI, PICOS_PER_MIN,
    PICOS_PER_NANO, PICOS_PER_SEC,
};

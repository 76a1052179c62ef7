//! Simulator builder.

use std::fmt;

use crate::time::SimDuration;

use super::Simulator;

/// Builder for a [`Simulator`].
///
/// All configuration options have defaults, so the two shortest ways to
/// obtain a simulator are equivalent:
///
/// ```
/// use picosim::simulation::{SimInit, Simulator};
///
/// let a = Simulator::new();
/// let b = SimInit::new().init();
///
/// assert_eq!(a.clock_period(), b.clock_period());
/// ```
///
/// # Examples
///
/// ```
/// use picosim::simulation::SimInit;
/// use picosim::time::SimDuration;
///
/// let simulator = SimInit::new()
///     .clock_period(SimDuration::from_nanos(10))
///     .include_timer_stack_trace(false)
///     .name("dut")
///     .init();
///
/// assert_eq!(simulator.name(), "dut");
/// assert_eq!(simulator.clock_period(), SimDuration::from_nanos(10));
/// ```
pub struct SimInit {
    clock_period: SimDuration,
    include_timer_stack_trace: bool,
    name: String,
}

impl SimInit {
    /// Creates a builder with the default configuration: a 1 ps clock
    /// period, timer stack traces enabled and the name `"simulator"`.
    pub fn new() -> Self {
        Self {
            clock_period: SimDuration::from_picos(1),
            include_timer_stack_trace: true,
            name: String::from("simulator"),
        }
    }

    /// Sets the clock period from which
    /// [`elapsed_ticks`](Simulator::elapsed_ticks) is derived.
    ///
    /// # Panics
    ///
    /// Panics if the period is not strictly positive.
    pub fn clock_period(mut self, period: SimDuration) -> Self {
        assert!(
            period > SimDuration::ZERO,
            "the clock period must be strictly positive"
        );
        self.clock_period = period;

        self
    }

    /// Sets whether timers capture a stack trace at construction, to be
    /// rendered by [`SimTimer::debug_string`](super::SimTimer::debug_string).
    ///
    /// Capturing is enabled by default; disabling it makes timer creation
    /// considerably cheaper.
    pub fn include_timer_stack_trace(mut self, enable: bool) -> Self {
        self.include_timer_stack_trace = enable;

        self
    }

    /// Sets the simulator name, published to hosted code through the
    /// scheduling context.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();

        self
    }

    /// Builds the simulator, with its virtual time at zero.
    pub fn init(self) -> Simulator {
        tracing::debug!(
            name = %self.name,
            clock_period = %self.clock_period,
            "new simulator"
        );

        Simulator::build(self.clock_period, self.include_timer_stack_trace, self.name)
    }
}

impl Default for SimInit {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SimInit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimInit")
            .field("clock_period", &self.clock_period)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

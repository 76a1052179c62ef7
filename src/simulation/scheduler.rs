//! The intercepted scheduling context.

use std::backtrace::Backtrace;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ptr;
use std::rc::Rc;

use crate::time::SimDuration;

use super::timer::TimerCallback;
use super::{SimTimer, Simulator, SimulatorInner};

/// An opaque scheduling-context token.
///
/// Every [`Scheduler`] handle carries a `SimZone`; timers record the zone of
/// the handle that created them. Zones exist so that machinery layered above
/// the simulator (process or thread models, for instance) can partition
/// timers and [suspend](Simulator::suspend_timers) a subset of them by
/// predicate over their birth zone.
///
/// Zones compare by identity and form a tree: forking a scheduler creates a
/// child zone whose parent is the forking handle's zone.
#[derive(Clone)]
pub struct SimZone {
    inner: Rc<ZoneInner>,
}

struct ZoneInner {
    parent: Option<SimZone>,
}

impl SimZone {
    /// Creates the root zone of a simulator.
    pub(crate) fn root() -> Self {
        Self {
            inner: Rc::new(ZoneInner { parent: None }),
        }
    }

    /// Creates a child of this zone.
    pub(crate) fn child(&self) -> Self {
        Self {
            inner: Rc::new(ZoneInner {
                parent: Some(self.clone()),
            }),
        }
    }

    /// Returns the parent zone, if this is not a root zone.
    pub fn parent(&self) -> Option<&SimZone> {
        self.inner.parent.as_ref()
    }

    /// Reports whether `other` is this zone or one of its descendants.
    pub fn is_ancestor_of(&self, other: &SimZone) -> bool {
        let mut zone = Some(other);
        while let Some(z) = zone {
            if z == self {
                return true;
            }
            zone = z.parent();
        }

        false
    }
}

impl PartialEq for SimZone {
    /// Implements equality as token identity.
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for SimZone {}

impl Hash for SimZone {
    fn hash<H>(&self, state: &mut H)
    where
        H: Hasher,
    {
        ptr::hash(&*self.inner, state)
    }
}

impl fmt::Debug for SimZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimZone")
            .field("is_root", &self.inner.parent.is_none())
            .finish_non_exhaustive()
    }
}

/// A handle to the simulator's intercepted scheduling context.
///
/// Hosted callback code schedules exclusively through a `Scheduler`. Its
/// three hooks, [`create_timer`](Scheduler::create_timer),
/// [`create_periodic_timer`](Scheduler::create_periodic_timer) and
/// [`schedule_micro_task`](Scheduler::schedule_micro_task), replace the
/// native timer and micro-task primitives, so that the hosted program runs
/// against virtual time without noticing.
///
/// The handle also exposes the context values published by the simulator:
/// [`clock_period`](Scheduler::clock_period), [`name`](Scheduler::name) and
/// the [`simulator`](Scheduler::simulator) itself.
///
/// A scheduler is obtained from [`Simulator::run`] or
/// [`Simulator::scheduler`], and may be [forked](Scheduler::fork) to give a
/// sub-component its own [`SimZone`].
#[derive(Clone)]
pub struct Scheduler {
    simulator: Rc<SimulatorInner>,
    zone: SimZone,
}

impl Scheduler {
    pub(crate) fn new(simulator: Rc<SimulatorInner>, zone: SimZone) -> Self {
        Self { simulator, zone }
    }

    /// Returns the simulator this context schedules into.
    pub fn simulator(&self) -> Simulator {
        Simulator::from_inner(self.simulator.clone())
    }

    /// Returns the simulator's clock period.
    pub fn clock_period(&self) -> SimDuration {
        self.simulator.clock_period()
    }

    /// Returns the simulator's name.
    pub fn name(&self) -> &str {
        self.simulator.name()
    }

    /// Returns the zone of this handle.
    pub fn zone(&self) -> &SimZone {
        &self.zone
    }

    /// Forks this context, returning a handle to the same simulator with a
    /// fresh child [`SimZone`].
    pub fn fork(&self) -> Scheduler {
        Self {
            simulator: self.simulator.clone(),
            zone: self.zone.child(),
        }
    }

    /// Creates a one-shot timer firing after `duration` of virtual time.
    ///
    /// A negative duration is clamped to zero, in which case the timer fires
    /// at the current virtual time, on the next delta cycle.
    pub fn create_timer(
        &self,
        duration: impl Into<SimDuration>,
        callback: impl FnOnce() + 'static,
    ) -> SimTimer {
        self.new_timer(duration.into(), TimerCallback::Once(Box::new(callback)))
    }

    /// Creates a periodic timer firing every `duration` of virtual time.
    ///
    /// The callback receives the timer handle, so that it can consult
    /// [`tick`](SimTimer::tick) or [`cancel`](SimTimer::cancel) itself. A
    /// negative duration is clamped to zero; a zero-period timer re-fires on
    /// every subsequent delta cycle until cancelled.
    pub fn create_periodic_timer(
        &self,
        duration: impl Into<SimDuration>,
        callback: impl FnMut(&SimTimer) + 'static,
    ) -> SimTimer {
        self.new_timer(
            duration.into(),
            TimerCallback::Periodic(Box::new(callback)),
        )
    }

    /// Schedules a micro-task: a zero-duration deferred callback.
    ///
    /// Micro-tasks run in FIFO order and are drained by the event wheel
    /// before virtual time advances and between delta cycles.
    pub fn schedule_micro_task(&self, task: impl FnOnce() + 'static) {
        self.simulator.push_micro_task(Box::new(task));
    }

    fn new_timer(&self, duration: SimDuration, callback: TimerCallback) -> SimTimer {
        let duration = duration.max(SimDuration::ZERO);
        let next_call = self.simulator.elapsed() + duration;
        let creation_trace = if self.simulator.include_timer_stack_trace() {
            Some(Backtrace::force_capture())
        } else {
            None
        };

        let timer = SimTimer::new(
            Rc::downgrade(&self.simulator),
            duration,
            next_call,
            callback,
            self.zone.clone(),
            creation_trace,
        );
        self.simulator.schedule_timer(timer.clone());

        timer
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("name", &self.name())
            .finish_non_exhaustive()
    }
}

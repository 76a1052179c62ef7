//! Discrete-event simulation management.
//!
//! This module contains most notably the [`Simulator`] event wheel, the
//! [`SimInit`] simulator builder, the [`Scheduler`] scheduling context handed
//! to hosted code, and the [`SimTimer`] timer handle.
//!
//! # Simulation lifecycle
//!
//! Driving a hosted callback program typically goes through the following
//! stages:
//!
//! 1. construction of a [`Simulator`] with [`SimInit`], or with
//!    [`Simulator::new`] for the default configuration,
//! 2. installation of the hosted callbacks with [`Simulator::run`]: the
//!    closure receives a [`Scheduler`] through which all timer creation and
//!    micro-task scheduling is intercepted,
//! 3. simulation proper, by advancing virtual time with
//!    [`Simulator::elapse`] or draining everything with
//!    [`Simulator::flush_timers`], while observing the hosted program's
//!    outputs.
//!
//! `run` itself never advances time; it only arranges for scheduling calls
//! to be captured.
//!
//! # Delta-cycle semantics
//!
//! The event wheel fires timers in delta cycles: all timers sharing the
//! smallest pending firing time are detached as one batch and fired in
//! creation order, *before* any micro-task they schedule runs. Micro-tasks
//! are drained before virtual time advances and between batches. This is
//! what distinguishes the simulator from a native scheduler, which would
//! interleave micro-tasks between individual same-time timers, and it is the
//! property that makes simulations of digital hardware deterministic.
//!
//! The resulting ordering guarantees are:
//!
//! * timers with distinct firing times fire in strictly ascending time
//!   order,
//! * timers sharing a firing time fire in creation order,
//! * all micro-tasks scheduled before time advances beyond `T` complete
//!   before any timer scheduled after `T` fires,
//! * within one delta, all due timers fire before any micro-task they
//!   scheduled.
//!
//! # Concurrency
//!
//! Scheduling is single-threaded and cooperative: callbacks run to
//! completion on the thread that called [`Simulator::elapse`] (or a flush),
//! and no callback ever executes concurrently with another. The simulator
//! handle is deliberately not `Send`; a multithreaded host must keep
//! simulator and callbacks confined to one thread.

mod scheduler;
mod sim_init;
mod timer;

pub use scheduler::{Scheduler, SimZone};
pub use sim_init::SimInit;
pub use timer::SimTimer;

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::error::Error;
use std::fmt;
use std::rc::Rc;

use crate::time::SimDuration;
use crate::util::queue_map::QueueMap;

/// A queued zero-duration deferred callback.
pub(crate) type MicroTask = Box<dyn FnOnce()>;

/// A deterministic discrete-event simulator with a picosecond-resolution
/// virtual clock.
///
/// A `Simulator` intercepts the scheduling primitives of a hosted callback
/// program (one-shot timers, periodic timers and micro-tasks) and replaces
/// real elapsed time with a virtual time cursor that only moves when
/// [`elapse`](Simulator::elapse) or one of the flushing operations is
/// called.
///
/// The handle is cheaply cloneable so that hosted callbacks can keep their
/// own reference, e.g. to inspect [`elapsed`](Simulator::elapsed) or request
/// a blocking elapsement.
///
/// # Examples
///
/// ```
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// use picosim::simulation::Simulator;
/// use picosim::time::SimDuration;
///
/// let simulator = Simulator::new();
/// let log = Rc::new(RefCell::new(Vec::new()));
///
/// simulator.run(|scheduler| {
///     let log_ = log.clone();
///     scheduler.create_timer(SimDuration::from_nanos(3), move || {
///         log_.borrow_mut().push("timer");
///     });
///     let log_ = log.clone();
///     scheduler.schedule_micro_task(move || {
///         log_.borrow_mut().push("micro-task");
///     });
/// });
///
/// // Micro-tasks drain before time advances.
/// simulator.elapse(SimDuration::from_nanos(3)).unwrap();
/// assert_eq!(*log.borrow(), ["micro-task", "timer"]);
/// assert_eq!(simulator.elapsed(), SimDuration::from_nanos(3));
/// ```
#[derive(Clone)]
pub struct Simulator {
    inner: Rc<SimulatorInner>,
}

impl Simulator {
    /// The virtual-time budget of [`flush_timers`](Simulator::flush_timers).
    pub const DEFAULT_FLUSH_TIMEOUT: SimDuration = SimDuration::from_hours(1);

    /// Creates a simulator with the default configuration.
    ///
    /// This is a shorthand for `SimInit::new().init()`; see [`SimInit`] for
    /// the configurable options.
    pub fn new() -> Self {
        SimInit::new().init()
    }

    pub(crate) fn build(
        clock_period: SimDuration,
        include_timer_stack_trace: bool,
        name: String,
    ) -> Self {
        Self {
            inner: Rc::new(SimulatorInner {
                name,
                clock_period,
                include_timer_stack_trace,
                root_zone: SimZone::root(),
                elapsed: Cell::new(SimDuration::ZERO),
                elapsing_to: Cell::new(None),
                micro_tasks: RefCell::new(VecDeque::new()),
                pending: RefCell::new(QueueMap::new()),
                current_delta: RefCell::new(VecDeque::new()),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Rc<SimulatorInner>) -> Self {
        Self { inner }
    }

    /// Returns the simulator name.
    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// Returns the configured clock period.
    pub fn clock_period(&self) -> SimDuration {
        self.inner.clock_period()
    }

    /// Returns the current virtual time.
    ///
    /// Virtual time starts at zero and is monotonically non-decreasing.
    pub fn elapsed(&self) -> SimDuration {
        self.inner.elapsed.get()
    }

    /// Returns the current virtual time expressed in whole clock periods.
    pub fn elapsed_ticks(&self) -> i64 {
        self.inner.elapsed.get().as_picos() / self.inner.clock_period.as_picos()
    }

    /// Returns a [`Scheduler`] handle bound to the simulator's root zone.
    pub fn scheduler(&self) -> Scheduler {
        Scheduler::new(self.inner.clone(), self.inner.root_zone.clone())
    }

    /// Runs `callback` inside the simulator's scheduling context and returns
    /// its result.
    ///
    /// All timer creation and micro-task scheduling performed transitively
    /// through the provided [`Scheduler`] is captured by this simulator.
    /// `run` does not advance virtual time; a typical usage pattern is `run`
    /// to install callbacks, then [`elapse`](Simulator::elapse) to drive
    /// them.
    pub fn run<T>(&self, callback: impl FnOnce(&Scheduler) -> T) -> T {
        let scheduler = self.scheduler();

        callback(&scheduler)
    }

    /// Simulates the asynchronous passage of `duration`, firing all timers
    /// due within it and draining micro-tasks between delta cycles.
    ///
    /// Upon return, the virtual time has advanced by at least `duration`; it
    /// may have advanced further if a callback requested a
    /// [blocking elapsement](Simulator::elapse_blocking) beyond the target.
    ///
    /// # Errors
    ///
    /// [`SimulationError::NegativeElapseDuration`] if `duration` is negative, and
    /// [`SimulationError::AlreadyElapsing`] if an `elapse` is already in
    /// progress, i.e. when a hosted callback re-enters `elapse`.
    pub fn elapse(&self, duration: impl Into<SimDuration>) -> Result<(), SimulationError> {
        let duration = duration.into();
        if duration.is_negative() {
            return Err(SimulationError::NegativeElapseDuration(duration));
        }
        if self.inner.elapsing_to.get().is_some() {
            return Err(SimulationError::AlreadyElapsing);
        }
        self.inner
            .elapsing_to
            .set(Some(self.inner.elapsed.get() + duration));
        // The guard clears the target even if a hosted callback unwinds out
        // of the event wheel, so later elapsements are not refused.
        let guard = ElapsingGuard(&self.inner.elapsing_to);

        let inner = self.inner.clone();
        let result = self.fire_timers_while(move |delta_time| {
            // The target may have been extended by a blocking elapsement.
            let target = inner.elapsing_to.get().unwrap_or(delta_time);

            Ok(delta_time <= target)
        });

        if let Some(target) = self.inner.elapsing_to.get() {
            self.inner.elapsed.set(self.inner.elapsed.get().max(target));
        }
        drop(guard);

        result
    }

    /// Simulates the synchronous passage of `duration`, as if the hosted
    /// program had blocked on a computation.
    ///
    /// No timer or micro-task runs. When called from within an
    /// [`elapse`](Simulator::elapse) whose target the new virtual time
    /// exceeds, the enclosing elapsement extends its target so that timers
    /// due before the new virtual time still fire before it returns.
    ///
    /// # Errors
    ///
    /// [`SimulationError::NegativeElapseDuration`] if `duration` is negative.
    pub fn elapse_blocking(&self, duration: impl Into<SimDuration>) -> Result<(), SimulationError> {
        let duration = duration.into();
        if duration.is_negative() {
            return Err(SimulationError::NegativeElapseDuration(duration));
        }

        let elapsed = self.inner.elapsed.get() + duration;
        self.inner.elapsed.set(elapsed);
        if let Some(target) = self.inner.elapsing_to.get() {
            if elapsed > target {
                self.inner.elapsing_to.set(Some(elapsed));
            }
        }

        Ok(())
    }

    /// Executes queued micro-tasks until the queue is empty.
    ///
    /// Micro-tasks scheduled by micro-tasks are executed in scheduling
    /// order, forming a transitive drain. Timers do not run and virtual time
    /// does not advance.
    pub fn flush_micro_tasks(&self) {
        loop {
            let task = self.inner.micro_tasks.borrow_mut().pop_front();
            match task {
                Some(task) => task(),
                None => break,
            }
        }
    }

    /// Fires all pending timers, advancing virtual time as needed, within
    /// the [default timeout budget](Simulator::DEFAULT_FLUSH_TIMEOUT).
    ///
    /// Periodic timers are flushed as well; see
    /// [`flush_timers_with`](Simulator::flush_timers_with) for the variant
    /// that leaves future periodic firings pending.
    ///
    /// # Errors
    ///
    /// [`SimulationError::FlushTimeout`] if flushing would advance virtual
    /// time beyond the budget, which typically indicates a periodic-timer
    /// livelock.
    pub fn flush_timers(&self) -> Result<(), SimulationError> {
        self.flush_timers_with(Self::DEFAULT_FLUSH_TIMEOUT, true)
    }

    /// Fires pending timers within an explicit virtual `timeout` budget.
    ///
    /// When `flush_periodic` is `true`, the wheel runs until no timer is
    /// pending at all. When it is `false`, the wheel runs until the only
    /// pending timers are periodic ones whose next firing lies in the future
    /// of the virtual time reached, i.e. every periodic timer has fired
    /// against the current virtual time at least once.
    ///
    /// # Errors
    ///
    /// [`SimulationError::FlushTimeout`] if flushing would advance virtual
    /// time beyond `timeout`.
    pub fn flush_timers_with(
        &self,
        timeout: SimDuration,
        flush_periodic: bool,
    ) -> Result<(), SimulationError> {
        let absolute_timeout = self.inner.elapsed.get() + timeout;

        let inner = self.inner.clone();
        self.fire_timers_while(move |delta_time| {
            if delta_time > absolute_timeout {
                return Err(SimulationError::FlushTimeout(timeout));
            }
            if flush_periodic {
                return Ok(true);
            }

            let elapsed = inner.elapsed.get();
            let pending = inner.pending.borrow();
            Ok(pending
                .iter()
                .any(|timer| !timer.is_periodic() || timer.next_call() <= elapsed))
        })
    }

    /// Detaches every timer whose birth zone matches the selector, from both
    /// the current-delta queue and the pending storage.
    ///
    /// The detached timers remain active and keep their firing times; they
    /// are re-attached with [`resume_timers`](Simulator::resume_timers).
    /// This is the hook through which process or thread models layered above
    /// the simulator park the timers of a de-scheduled process.
    pub fn suspend_timers(
        &self,
        mut selector: impl FnMut(&SimZone) -> bool,
    ) -> SuspendedTimers {
        let mut suspended = Vec::new();

        // Both queues are filtered outside their cells so the selector can
        // freely inspect the simulator; anything scheduled while it runs is
        // merged back afterwards.
        let mut current_delta = self.inner.current_delta.take();
        current_delta.retain(|timer| {
            if selector(timer.zone()) {
                suspended.push(timer.clone());
                false
            } else {
                true
            }
        });
        let added = self.inner.current_delta.replace(current_delta);
        self.inner.current_delta.borrow_mut().extend(added);

        let mut pending = self.inner.pending.take();
        pending.retain(|timer| {
            if selector(timer.zone()) {
                suspended.push(timer.clone());
                false
            } else {
                true
            }
        });
        let added = self.inner.pending.replace(pending);
        self.inner.pending.borrow_mut().append(added);

        SuspendedTimers { timers: suspended }
    }

    /// Re-attaches a set of previously suspended timers, draining the set.
    ///
    /// # Errors
    ///
    /// [`SimulationError::TimerNotInFuture`] if any timer's firing time lies
    /// in the past of the current virtual time; in that case no timer is
    /// re-attached and the set is left untouched.
    pub fn resume_timers(&self, timers: &mut SuspendedTimers) -> Result<(), SimulationError> {
        let elapsed = self.inner.elapsed.get();
        for timer in &timers.timers {
            if timer.next_call() < elapsed {
                return Err(SimulationError::TimerNotInFuture {
                    elapsed,
                    next_call: timer.next_call(),
                });
            }
        }

        let mut resumed = QueueMap::new();
        for timer in timers.timers.drain(..) {
            resumed.insert(timer);
        }
        self.inner.pending.borrow_mut().append(resumed);

        Ok(())
    }

    /// Returns a snapshot of all tracked timers: the current-delta queue
    /// first, then the pending timers in firing order.
    pub fn pending_timers(&self) -> Vec<SimTimer> {
        let current_delta = self.inner.current_delta.borrow();
        let pending = self.inner.pending.borrow();

        current_delta
            .iter()
            .chain(pending.iter())
            .cloned()
            .collect()
    }

    /// Returns the [`debug_string`](SimTimer::debug_string) of every tracked
    /// timer, in the order of [`pending_timers`](Simulator::pending_timers).
    pub fn pending_timers_debug_string(&self) -> Vec<String> {
        self.pending_timers()
            .iter()
            .map(SimTimer::debug_string)
            .collect()
    }

    /// Returns the number of tracked periodic timers.
    pub fn periodic_timer_count(&self) -> usize {
        self.count_timers(SimTimer::is_periodic)
    }

    /// Returns the number of tracked one-shot timers.
    pub fn non_periodic_timer_count(&self) -> usize {
        self.count_timers(|timer| !timer.is_periodic())
    }

    /// Returns the number of queued micro-tasks.
    pub fn micro_task_count(&self) -> usize {
        self.inner.micro_tasks.borrow().len()
    }

    fn count_timers(&self, mut filter: impl FnMut(&SimTimer) -> bool) -> usize {
        let current_delta = self.inner.current_delta.borrow();
        let pending = self.inner.pending.borrow();

        current_delta
            .iter()
            .chain(pending.iter())
            .filter(|timer| filter(timer))
            .count()
    }

    /// Runs the event wheel while the next pending firing time satisfies the
    /// predicate.
    ///
    /// Each round drains the micro-task queue, advances the virtual clock to
    /// the smallest pending firing time and fires that whole delta's worth
    /// of timers in creation order. Timers scheduled by the round go through
    /// the pending storage and are only picked up by a later round; this
    /// includes a zero-period timer re-scheduling itself for the very same
    /// time.
    fn fire_timers_while(
        &self,
        mut predicate: impl FnMut(SimDuration) -> Result<bool, SimulationError>,
    ) -> Result<(), SimulationError> {
        loop {
            self.flush_micro_tasks();
            // Normally a no-op: the current-delta queue is only non-empty
            // here if a previous invocation was unwound by a panicking
            // callback.
            self.drain_current_delta();

            let first_key = self.inner.pending.borrow().first_key();
            let delta_time = match first_key {
                Some(delta_time) => delta_time,
                None => break,
            };
            if !predicate(delta_time)? {
                break;
            }

            // Advance the virtual clock, upward only.
            let elapsed = self.inner.elapsed.get();
            self.inner.elapsed.set(elapsed.max(delta_time));

            let batch = self
                .inner
                .pending
                .borrow_mut()
                .pop_first_queue()
                .unwrap_or_default();
            tracing::trace!(time = %delta_time, timers = batch.len(), "starting delta cycle");
            *self.inner.current_delta.borrow_mut() = batch;
            self.drain_current_delta();
        }

        Ok(())
    }

    /// Fires the timers of the current delta in FIFO order.
    ///
    /// The queue is re-locked at every step: callbacks may cancel or suspend
    /// timers still in the batch.
    fn drain_current_delta(&self) {
        loop {
            let timer = self.inner.current_delta.borrow_mut().pop_front();
            match timer {
                Some(timer) => {
                    debug_assert!(timer.next_call() <= self.inner.elapsed.get());
                    timer.fire(&self.inner);
                }
                None => break,
            }
        }
    }
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Simulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulator")
            .field("name", &self.inner.name)
            .field("elapsed", &self.inner.elapsed.get())
            .field("pending_timer_count", &self.inner.pending.borrow().len())
            .field("micro_task_count", &self.inner.micro_tasks.borrow().len())
            .finish_non_exhaustive()
    }
}

/// Shared state of a simulator.
pub(crate) struct SimulatorInner {
    name: String,
    clock_period: SimDuration,
    include_timer_stack_trace: bool,
    root_zone: SimZone,
    elapsed: Cell<SimDuration>,
    elapsing_to: Cell<Option<SimDuration>>,
    micro_tasks: RefCell<VecDeque<MicroTask>>,
    pending: RefCell<QueueMap<SimDuration, SimTimer>>,
    current_delta: RefCell<VecDeque<SimTimer>>,
}

impl SimulatorInner {
    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn clock_period(&self) -> SimDuration {
        self.clock_period
    }

    pub(crate) fn include_timer_stack_trace(&self) -> bool {
        self.include_timer_stack_trace
    }

    pub(crate) fn elapsed(&self) -> SimDuration {
        self.elapsed.get()
    }

    /// Inserts a timer into the pending storage.
    pub(crate) fn schedule_timer(&self, timer: SimTimer) {
        self.pending.borrow_mut().insert(timer);
    }

    /// Removes a timer from both the pending storage and the current-delta
    /// queue.
    pub(crate) fn unschedule_timer(&self, timer: &SimTimer) {
        self.pending.borrow_mut().remove(timer);
        self.current_delta.borrow_mut().retain(|t| t != timer);
    }

    /// Queues a micro-task.
    pub(crate) fn push_micro_task(&self, task: MicroTask) {
        self.micro_tasks.borrow_mut().push_back(task);
    }
}

/// Clears the elapse target on drop.
///
/// The target must not outlive its `elapse` call, including when a hosted
/// callback unwinds out of the event wheel.
struct ElapsingGuard<'a>(&'a Cell<Option<SimDuration>>);

impl Drop for ElapsingGuard<'_> {
    fn drop(&mut self) {
        self.0.set(None);
    }
}

/// A set of timers detached by [`Simulator::suspend_timers`].
///
/// The set preserves the firing order of the detached timers so that
/// [`Simulator::resume_timers`] restores FIFO order among timers sharing a
/// firing time.
#[derive(Debug)]
pub struct SuspendedTimers {
    timers: Vec<SimTimer>,
}

impl SuspendedTimers {
    /// Returns the number of detached timers.
    pub fn len(&self) -> usize {
        self.timers.len()
    }

    /// Reports whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// Returns the detached timers, in firing order.
    pub fn timers(&self) -> &[SimTimer] {
        &self.timers
    }
}

/// Error returned by the simulator operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulationError {
    /// A negative duration was passed to [`Simulator::elapse`] or
    /// [`Simulator::elapse_blocking`].
    NegativeElapseDuration(SimDuration),
    /// [`Simulator::elapse`] was called while another elapsement was in
    /// progress.
    AlreadyElapsing,
    /// Flushing timers would advance virtual time beyond the timeout budget
    /// given in the payload; this typically indicates a periodic-timer
    /// livelock.
    FlushTimeout(SimDuration),
    /// A suspended timer could not be resumed because its firing time lies
    /// in the past of the current virtual time.
    TimerNotInFuture {
        /// The current virtual time.
        elapsed: SimDuration,
        /// The firing time of the offending timer.
        next_call: SimDuration,
    },
}

impl fmt::Display for SimulationError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NegativeElapseDuration(duration) => {
                write!(fmt, "the duration to elapse cannot be negative ({})", duration)
            }
            Self::AlreadyElapsing => {
                write!(fmt, "a virtual time elapsement is already in progress")
            }
            Self::FlushTimeout(timeout) => write!(
                fmt,
                "timers could not be flushed within the {} timeout budget",
                timeout
            ),
            Self::TimerNotInFuture { elapsed, next_call } => write!(
                fmt,
                "a timer due at {} cannot be resumed at the current virtual time {}",
                next_call, elapsed
            ),
        }
    }
}

impl Error for SimulationError {}

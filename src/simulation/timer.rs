//! Virtual timers.

use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ptr;
use std::rc::{Rc, Weak};

use crate::time::SimDuration;
use crate::util::queue_map::Indexable;

use super::{SimZone, SimulatorInner};

/// The callback of a virtual timer.
pub(crate) enum TimerCallback {
    /// A nullary callback, invoked once.
    Once(Box<dyn FnOnce()>),
    /// A callback invoked with the timer handle on every firing.
    Periodic(Box<dyn FnMut(&SimTimer)>),
}

/// A handle to a one-shot or periodic virtual timer.
///
/// A `SimTimer` is created by the [`Scheduler`](super::Scheduler) timer
/// hooks and mirrors a native timer: it exposes
/// [`is_active`](SimTimer::is_active), [`tick`](SimTimer::tick) and
/// [`cancel`](SimTimer::cancel). The handle is cheaply cloneable; all clones
/// refer to the same timer.
///
/// The simulator fires the timer when its virtual deadline is reached. A
/// one-shot timer becomes inactive after its single firing; a periodic timer
/// is re-scheduled one period further after each firing until cancelled.
#[derive(Clone)]
pub struct SimTimer {
    inner: Rc<TimerInner>,
}

struct TimerInner {
    simulator: Weak<SimulatorInner>,
    duration: SimDuration,
    next_call: Cell<SimDuration>,
    is_periodic: bool,
    callback: RefCell<Option<TimerCallback>>,
    tick: Cell<u64>,
    is_cancelled: Cell<bool>,
    is_active: Cell<bool>,
    zone: SimZone,
    creation_trace: Option<Backtrace>,
}

impl SimTimer {
    /// Creates a new active timer.
    ///
    /// `duration` must already be clamped to a non-negative value and
    /// `next_call` resolved against the current virtual time by the caller.
    pub(crate) fn new(
        simulator: Weak<SimulatorInner>,
        duration: SimDuration,
        next_call: SimDuration,
        callback: TimerCallback,
        zone: SimZone,
        creation_trace: Option<Backtrace>,
    ) -> Self {
        Self {
            inner: Rc::new(TimerInner {
                simulator,
                duration,
                next_call: Cell::new(next_call),
                is_periodic: matches!(callback, TimerCallback::Periodic(_)),
                callback: RefCell::new(Some(callback)),
                tick: Cell::new(0),
                is_cancelled: Cell::new(false),
                is_active: Cell::new(true),
                zone,
                creation_trace,
            }),
        }
    }

    /// Returns the interval configured at creation.
    pub fn duration(&self) -> SimDuration {
        self.inner.duration
    }

    /// Returns the absolute virtual time of the next firing.
    pub fn next_call(&self) -> SimDuration {
        self.inner.next_call.get()
    }

    /// Reports whether this is a periodic timer.
    pub fn is_periodic(&self) -> bool {
        self.inner.is_periodic
    }

    /// Returns the number of times the timer has fired so far.
    pub fn tick(&self) -> u64 {
        self.inner.tick.get()
    }

    /// Reports whether the timer is still tracked by the simulator.
    ///
    /// A one-shot timer stops being active once it fires; a periodic timer
    /// remains active across firings until it is cancelled.
    pub fn is_active(&self) -> bool {
        self.inner.is_active.get()
    }

    /// Reports whether the timer was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled.get()
    }

    /// Returns the scheduling context the timer was created in.
    pub fn zone(&self) -> &SimZone {
        &self.inner.zone
    }

    /// Cancels the timer.
    ///
    /// Cancellation is idempotent and sticky: a cancelled timer never fires
    /// again. Cancelling a periodic timer from within its own callback
    /// prevents its re-scheduling.
    pub fn cancel(&self) {
        if self.inner.is_cancelled.replace(true) {
            return;
        }
        self.inner.is_active.set(false);
        if let Some(simulator) = self.inner.simulator.upgrade() {
            simulator.unschedule_timer(self);
        }
    }

    /// Fires the timer once.
    ///
    /// The caller must have removed the timer from the current-delta queue
    /// beforehand.
    pub(crate) fn fire(&self, simulator: &SimulatorInner) {
        let inner = &*self.inner;
        inner.tick.set(inner.tick.get() + 1);
        tracing::trace!(
            tick = inner.tick.get(),
            periodic = inner.is_periodic,
            time = %inner.next_call.get(),
            "firing timer"
        );

        // The callback is moved out for the duration of the call so that it
        // can freely re-enter this timer's accessors.
        let callback = inner.callback.borrow_mut().take();
        match callback {
            Some(TimerCallback::Periodic(mut callback)) => {
                callback(self);
                *inner.callback.borrow_mut() = Some(TimerCallback::Periodic(callback));
                if !inner.is_cancelled.get() {
                    inner.next_call.set(inner.next_call.get() + inner.duration);
                    simulator.schedule_timer(self.clone());
                }
            }
            Some(TimerCallback::Once(callback)) => {
                inner.is_active.set(false);
                callback();
            }
            None => {}
        }
    }

    /// Renders the timer configuration, including the capture point of its
    /// construction when the simulator was configured to record it.
    pub fn debug_string(&self) -> String {
        let mut rendered = format!(
            "timer (duration: {}, periodic: {})",
            self.inner.duration, self.inner.is_periodic
        );
        if let Some(trace) = &self.inner.creation_trace {
            rendered.push_str("\ncreated at:\n");
            rendered.push_str(&trace.to_string());
        }

        rendered
    }
}

impl PartialEq for SimTimer {
    /// Implements equality as handle identity: two handles are equal iff they
    /// refer to the same timer.
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for SimTimer {}

impl Hash for SimTimer {
    /// Implements `Hash` consistently with handle-identity equality.
    fn hash<H>(&self, state: &mut H)
    where
        H: Hasher,
    {
        ptr::hash(&*self.inner, state)
    }
}

impl Indexable<SimDuration> for SimTimer {
    /// A timer is indexed by its next firing time.
    fn index(&self) -> SimDuration {
        self.next_call()
    }
}

impl fmt::Debug for SimTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimTimer")
            .field("duration", &self.inner.duration)
            .field("next_call", &self.inner.next_call.get())
            .field("is_periodic", &self.inner.is_periodic)
            .field("tick", &self.inner.tick.get())
            .field("is_active", &self.inner.is_active.get())
            .finish_non_exhaustive()
    }
}

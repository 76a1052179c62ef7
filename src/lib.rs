//! A deterministic discrete-event simulator for modelling digital hardware
//! systems.
//!
//! Picosim intercepts the time- and asynchrony-related primitives of a
//! hosted callback program (one-shot timers, periodic timers and
//! micro-tasks) and replaces real elapsed time with a virtual clock of
//! picosecond resolution. Hosted code believes it is running under a normal
//! asynchronous runtime; in reality the simulator advances a virtual time
//! cursor and fires callbacks in a precisely defined order, making every
//! simulation run reproducible down to the interleaving of same-time
//! callbacks.
//!
//! # A practical overview
//!
//! Simulating a system involves three activities:
//!
//! 1. building a [`Simulator`](simulation::Simulator), usually through the
//!    [`SimInit`](simulation::SimInit) builder,
//! 2. installing the hosted callbacks with
//!    [`run`](simulation::Simulator::run), which hands them a
//!    [`Scheduler`](simulation::Scheduler): the intercepted scheduling
//!    context through which all timers and micro-tasks are created,
//! 3. driving the program by advancing virtual time with
//!    [`elapse`](simulation::Simulator::elapse) or draining all pending
//!    work with [`flush_timers`](simulation::Simulator::flush_timers).
//!
//! Durations are expressed with [`SimDuration`](time::SimDuration), a
//! signed picosecond-resolution scalar; native
//! [`Duration`](std::time::Duration) values are accepted anywhere a
//! duration is expected and lifted exactly into picoseconds.
//!
//! # Examples
//!
//! A free-running 100 MHz clock driving an edge counter:
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! use picosim::simulation::SimInit;
//! use picosim::time::SimDuration;
//!
//! let period = SimDuration::from_nanos(10);
//! let simulator = SimInit::new()
//!     .clock_period(period)
//!     .name("counter_bench")
//!     .init();
//!
//! let edges = Rc::new(Cell::new(0u64));
//!
//! simulator.run(|scheduler| {
//!     let edges = edges.clone();
//!     scheduler.create_periodic_timer(scheduler.clock_period(), move |_| {
//!         edges.set(edges.get() + 1);
//!     });
//! });
//!
//! simulator.elapse(period * 100).unwrap();
//!
//! assert_eq!(edges.get(), 100);
//! assert_eq!(simulator.elapsed_ticks(), 100);
//! ```
//!
//! # Ordering guarantees
//!
//! The simulator fires timers in *delta cycles*: all timers sharing the
//! smallest pending firing time fire as one batch, in creation order,
//! before any micro-task they schedule runs. Micro-tasks are drained in
//! FIFO order before virtual time advances and between batches. The
//! [`simulation`] module documentation spells out the resulting guarantees.
//!
//! # Modules
//!
//! * the [`time`] module provides the picosecond-resolution
//!   [`SimDuration`](time::SimDuration) scalar,
//! * the [`simulation`] module provides the simulator itself, its builder,
//!   the scheduling context and the timer handle.
#![warn(missing_docs, missing_debug_implementations, unreachable_pub)]

pub mod simulation;
pub mod time;
pub(crate) mod util;

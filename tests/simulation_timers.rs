//! Timer lifecycle, cancellation and introspection.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use picosim::simulation::{SimInit, SimTimer, Simulator};
use picosim::time::SimDuration;

#[test]
fn one_shot_timer_lifecycle() {
    let simulator = Simulator::new();
    let fired = Rc::new(Cell::new(false));
    let d = SimDuration::from_nanos(5);

    let timer = simulator.run(|scheduler| {
        let fired = fired.clone();
        scheduler.create_timer(d, move || fired.set(true))
    });

    assert!(timer.is_active());
    assert!(!timer.is_periodic());
    assert_eq!(timer.tick(), 0);
    assert_eq!(timer.duration(), d);
    assert_eq!(timer.next_call(), d);

    simulator.elapse(d).unwrap();

    assert!(fired.get());
    assert!(!timer.is_active());
    assert_eq!(timer.tick(), 1);
}

#[test]
fn periodic_timer_remains_active_across_firings() {
    let simulator = Simulator::new();
    let d = SimDuration::from_nanos(3);

    let timer = simulator.run(|scheduler| scheduler.create_periodic_timer(d, |_| {}));

    simulator.elapse(d * 2).unwrap();

    assert!(timer.is_active());
    assert_eq!(timer.tick(), 2);
    // The next firing is one period past the last one.
    assert_eq!(timer.next_call(), d * 3);
}

#[test]
fn negative_timer_duration_is_clamped_to_zero() {
    let simulator = Simulator::new();
    let fired = Rc::new(Cell::new(false));

    simulator.elapse(SimDuration::from_nanos(7)).unwrap();

    let timer = simulator.run(|scheduler| {
        let fired = fired.clone();
        scheduler.create_timer(SimDuration::from_secs(-1), move || fired.set(true))
    });

    assert_eq!(timer.duration(), SimDuration::ZERO);
    // The timer fires at the virtual time of its creation.
    assert_eq!(timer.next_call(), SimDuration::from_nanos(7));

    simulator.elapse(SimDuration::ZERO).unwrap();
    assert!(fired.get());
}

#[test]
fn cancelled_timer_never_fires() {
    let simulator = Simulator::new();
    let fired = Rc::new(Cell::new(false));
    let d = SimDuration::from_nanos(5);

    let timer = simulator.run(|scheduler| {
        let fired = fired.clone();
        scheduler.create_timer(d, move || fired.set(true))
    });

    timer.cancel();
    // Cancellation is idempotent.
    timer.cancel();

    assert!(!timer.is_active());
    assert!(timer.is_cancelled());

    simulator.elapse(d * 2).unwrap();

    assert!(!fired.get());
    assert_eq!(simulator.pending_timers().len(), 0);
}

#[test]
fn periodic_timer_cancelled_from_its_own_callback() {
    let simulator = Simulator::new();
    let d = SimDuration::from_nanos(2);

    let timer = simulator.run(|scheduler| {
        scheduler.create_periodic_timer(d, |timer| {
            if timer.tick() == 2 {
                timer.cancel();
            }
        })
    });

    simulator.elapse(d * 10).unwrap();

    // The cancellation during the second callback prevented re-insertion.
    assert_eq!(timer.tick(), 2);
    assert!(!timer.is_active());
    assert_eq!(simulator.periodic_timer_count(), 0);
}

#[test]
fn timer_cancelled_by_an_earlier_same_delta_peer_does_not_fire() {
    let simulator = Simulator::new();
    let fired = Rc::new(Cell::new(false));
    let victim_slot: Rc<RefCell<Option<SimTimer>>> = Rc::new(RefCell::new(None));
    let d = SimDuration::from_nanos(5);

    simulator.run(|scheduler| {
        // The canceller is created first and thus fires first within the
        // shared delta.
        let slot = victim_slot.clone();
        scheduler.create_timer(d, move || {
            if let Some(victim) = slot.borrow().as_ref() {
                victim.cancel();
            }
        });

        let fired = fired.clone();
        let victim = scheduler.create_timer(d, move || fired.set(true));
        *victim_slot.borrow_mut() = Some(victim);
    });

    simulator.elapse(d).unwrap();

    assert!(!fired.get());
}

#[test]
fn timer_created_and_cancelled_within_a_callback_does_not_fire() {
    let simulator = Simulator::new();
    let fired = Rc::new(Cell::new(false));
    let d = SimDuration::from_nanos(5);

    simulator.run(|scheduler| {
        let scheduler_ = scheduler.clone();
        let fired_ = fired.clone();
        scheduler.create_timer(d, move || {
            let fired = fired_.clone();
            let victim = scheduler_.create_timer(SimDuration::ZERO, move || fired.set(true));
            // `victim` is due at this very delta; cancelling it here must
            // keep it from firing in the next rounds of this elapsement.
            victim.cancel();
            assert!(!victim.is_active());
        });
    });

    simulator.elapse(d).unwrap();

    assert!(!fired.get());
    assert_eq!(simulator.pending_timers().len(), 0);
}

#[test]
fn timer_counts_and_snapshots() {
    let simulator = Simulator::new();
    let d = SimDuration::from_nanos(10);

    simulator.run(|scheduler| {
        scheduler.create_timer(d, || {});
        scheduler.create_timer(d * 2, || {});
        scheduler.create_periodic_timer(d * 3, |_| {});
        scheduler.schedule_micro_task(|| {});
    });

    assert_eq!(simulator.non_periodic_timer_count(), 2);
    assert_eq!(simulator.periodic_timer_count(), 1);
    assert_eq!(simulator.micro_task_count(), 1);

    let snapshot = simulator.pending_timers();
    assert_eq!(snapshot.len(), 3);
    // Snapshot order follows the firing order.
    assert_eq!(snapshot[0].next_call(), d);
    assert_eq!(snapshot[1].next_call(), d * 2);
    assert_eq!(snapshot[2].next_call(), d * 3);

    simulator.elapse(d * 2).unwrap();

    assert_eq!(simulator.non_periodic_timer_count(), 0);
    assert_eq!(simulator.periodic_timer_count(), 1);
    assert_eq!(simulator.micro_task_count(), 0);
}

#[test]
fn debug_strings_render_configuration() {
    let simulator = SimInit::new().include_timer_stack_trace(false).init();

    simulator.run(|scheduler| {
        scheduler.create_timer(SimDuration::from_secs(1), || {});
        scheduler.create_periodic_timer(SimDuration::from_millis(1), |_| {});
    });

    let rendered = simulator.pending_timers_debug_string();
    assert_eq!(rendered.len(), 2);
    assert!(rendered[1].contains("duration: 0:00:01.000000"));
    assert!(rendered[1].contains("periodic: false"));
    assert!(rendered[0].contains("periodic: true"));
    assert!(!rendered[0].contains("created at:"));
}

#[test]
fn debug_strings_include_creation_point_when_enabled() {
    let simulator = Simulator::new();

    let timer = simulator.run(|scheduler| scheduler.create_timer(SimDuration::from_secs(1), || {}));

    assert!(timer.debug_string().contains("created at:"));
}

#[test]
fn native_durations_are_accepted_by_the_hooks() {
    let simulator = Simulator::new();
    let fired = Rc::new(Cell::new(false));

    simulator.run(|scheduler| {
        let fired = fired.clone();
        scheduler.create_timer(Duration::from_micros(3), move || fired.set(true));
    });

    simulator.elapse(Duration::from_micros(3)).unwrap();

    assert!(fired.get());
    assert_eq!(simulator.elapsed(), SimDuration::from_micros(3));
}

#[test]
fn run_returns_the_callback_result_and_publishes_context_values() {
    let simulator = SimInit::new()
        .clock_period(SimDuration::from_nanos(2))
        .name("bench")
        .init();

    let period = simulator.run(|scheduler| {
        assert_eq!(scheduler.name(), "bench");
        assert_eq!(scheduler.simulator().elapsed(), SimDuration::ZERO);

        scheduler.clock_period()
    });

    assert_eq!(period, SimDuration::from_nanos(2));
    assert_eq!(simulator.name(), "bench");
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use orchestra_core::worker::WorkerId;
use std::sync::atomic::{AtomicUsize, Ordering};

fn worker_deleted(id: u64) -> Event {
    Event::WorkerDeleted {
        worker_id: WorkerId(id),
    }
}

#[test]
fn subscribed_handler_receives_matching_events() {
    let bus = EventBus::new();
    let seen = Arc::new(AtomicUsize::new(0));
    let seen2 = seen.clone();
    bus.subscribe("worker:deleted", move |_event| {
        seen2.fetch_add(1, Ordering::SeqCst);
    });

    bus.emit(worker_deleted(1));
    assert_eq!(seen.load(Ordering::SeqCst), 1);
}

#[test]
fn handler_does_not_receive_events_of_other_kinds() {
    let bus = EventBus::new();
    let seen = Arc::new(AtomicUsize::new(0));
    let seen2 = seen.clone();
    bus.subscribe("worker:created", move |_event| {
        seen2.fetch_add(1, Ordering::SeqCst);
    });

    bus.emit(worker_deleted(1));
    assert_eq!(seen.load(Ordering::SeqCst), 0);
}

#[test]
fn once_handler_fires_only_on_first_matching_event() {
    let bus = EventBus::new();
    let seen = Arc::new(AtomicUsize::new(0));
    let seen2 = seen.clone();
    bus.once("worker:deleted", move |_event| {
        seen2.fetch_add(1, Ordering::SeqCst);
    });

    bus.emit(worker_deleted(1));
    bus.emit(worker_deleted(2));
    assert_eq!(seen.load(Ordering::SeqCst), 1);
}

#[test]
fn unsubscribe_stops_further_dispatch_to_that_handler() {
    let bus = EventBus::new();
    let seen = Arc::new(AtomicUsize::new(0));
    let seen2 = seen.clone();
    let subscription = bus.subscribe("worker:deleted", move |_event| {
        seen2.fetch_add(1, Ordering::SeqCst);
    });

    bus.emit(worker_deleted(1));
    subscription.unsubscribe();
    bus.emit(worker_deleted(2));

    assert_eq!(seen.load(Ordering::SeqCst), 1);
}

#[test]
fn once_handler_unsubscribes_itself_rather_than_just_gating_on_a_flag() {
    let bus = EventBus::new();
    let seen = Arc::new(AtomicUsize::new(0));
    let seen2 = seen.clone();
    bus.once("worker:deleted", move |_event| {
        seen2.fetch_add(1, Ordering::SeqCst);
    });

    bus.emit(worker_deleted(1));
    assert_eq!(bus.state.lock().handlers.get("worker:deleted").map(|v| v.len()).unwrap_or(0), 0);
    bus.emit(worker_deleted(2));
    assert_eq!(seen.load(Ordering::SeqCst), 1);
}

#[test]
fn reentrant_emit_from_handler_is_queued_and_drained_in_fifo_order() {
    let bus = EventBus::new();
    let order = Arc::new(Mutex::new(Vec::new()));

    let bus_for_handler = bus.clone();
    let order_for_first = order.clone();
    bus.subscribe("worker:deleted", move |event| {
        let Event::WorkerDeleted { worker_id } = event else {
            return;
        };
        order_for_first.lock().push(worker_id.0);
        if worker_id.0 == 1 {
            // Re-entrant emits from inside a handler must not dispatch
            // synchronously — they queue behind the rest of this emit's
            // own handlers.
            bus_for_handler.emit(worker_deleted(2));
            bus_for_handler.emit(worker_deleted(3));
        }
    });

    bus.emit(worker_deleted(1));

    assert_eq!(*order.lock(), vec![1, 2, 3]);
}

#[test]
fn panicking_handler_does_not_prevent_other_handlers_from_running() {
    let bus = EventBus::new();
    let seen = Arc::new(AtomicUsize::new(0));
    let seen2 = seen.clone();

    bus.subscribe("worker:deleted", |_event| {
        panic!("boom");
    });
    bus.subscribe("worker:deleted", move |_event| {
        seen2.fetch_add(1, Ordering::SeqCst);
    });

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        bus.emit(worker_deleted(1));
    }));
    assert!(result.is_ok());
    assert_eq!(seen.load(Ordering::SeqCst), 1);
}

#[test]
fn panicking_handler_enqueues_synthetic_error_recoverable() {
    let bus = EventBus::new();
    let errors = Arc::new(AtomicUsize::new(0));
    let errors2 = errors.clone();

    bus.subscribe("worker:deleted", |_event| {
        panic!("boom");
    });
    bus.subscribe("error:recoverable", move |_event| {
        errors2.fetch_add(1, Ordering::SeqCst);
    });

    bus.emit(worker_deleted(1));
    assert_eq!(errors.load(Ordering::SeqCst), 1);
}

#[test]
fn panicking_handler_on_an_error_event_does_not_enqueue_another_error() {
    let bus = EventBus::new();
    let errors = Arc::new(AtomicUsize::new(0));
    let errors2 = errors.clone();

    bus.subscribe("error:recoverable", |_event| {
        panic!("boom");
    });
    bus.subscribe("error:recoverable", move |_event| {
        errors2.fetch_add(1, Ordering::SeqCst);
    });

    bus.emit(Event::ErrorRecoverable {
        source: orchestra_core::ErrorSource::EventBus,
        code: orchestra_core::ErrorCode::new("TEST"),
        message: "boom".to_string(),
        context: Default::default(),
        recovery_action: None,
    });

    // Only the surviving (non-panicking) handler ran once — no synthetic
    // error was queued on top of it.
    assert_eq!(errors.load(Ordering::SeqCst), 1);
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed pub/sub event bus (spec §4.3).
//!
//! Dispatch is synchronous over a snapshot of the handlers registered for an
//! event's kind at emit time. A handler that emits while already inside a
//! dispatch doesn't recurse — the event is queued FIFO and drained once the
//! outermost `emit` finishes its own handlers. A panicking handler is
//! contained: it's logged, dispatch continues to the remaining handlers, and
//! (unless the failing event was itself an `error:*` event, to avoid an
//! infinite loop) a synthetic `error:recoverable` is queued.

use orchestra_core::event::{ErrorCode, ErrorSource};
use orchestra_core::Event;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

type Handler = Arc<dyn Fn(&Event) + Send + Sync>;

struct State {
    handlers: HashMap<&'static str, Vec<(u64, Handler)>>,
    next_id: u64,
    emitting: bool,
    queue: VecDeque<Event>,
}

/// A handle returned by [`EventBus::subscribe`]/[`EventBus::once`]. Dropping
/// it leaves the handler registered — call [`Subscription::unsubscribe`]
/// explicitly to remove it.
pub struct Subscription {
    bus: EventBus,
    kind: &'static str,
    id: u64,
}

impl Subscription {
    pub fn unsubscribe(self) {
        self.bus.unsubscribe(self.kind, self.id);
    }
}

/// Synchronous, in-process typed event bus.
#[derive(Clone)]
pub struct EventBus {
    state: Arc<Mutex<State>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                handlers: HashMap::new(),
                next_id: 0,
                emitting: false,
                queue: VecDeque::new(),
            })),
        }
    }

    fn next_id(&self) -> u64 {
        let mut state = self.state.lock();
        let id = state.next_id;
        state.next_id += 1;
        id
    }

    fn register(&self, kind: &'static str, id: u64, handler: Handler) {
        self.state.lock().handlers.entry(kind).or_default().push((id, handler));
    }

    /// Subscribe `handler` to every event whose `kind()` equals `kind`.
    /// Returns a [`Subscription`] that can later be passed to
    /// [`Subscription::unsubscribe`] to remove it.
    pub fn subscribe(
        &self,
        kind: &'static str,
        handler: impl Fn(&Event) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.next_id();
        self.register(kind, id, Arc::new(handler));
        Subscription { bus: self.clone(), kind, id }
    }

    /// Remove a previously registered handler for `kind`. A no-op if it was
    /// already removed (e.g. by `once`'s own wrapper).
    pub fn unsubscribe(&self, kind: &'static str, id: u64) {
        if let Some(handlers) = self.state.lock().handlers.get_mut(kind) {
            handlers.retain(|(hid, _)| *hid != id);
        }
    }

    /// Subscribe a handler that fires at most once: the wrapper unsubscribes
    /// itself before invoking `handler`, so a re-entrant `emit` from inside
    /// `handler` can never observe itself still registered.
    pub fn once(&self, kind: &'static str, handler: impl Fn(&Event) + Send + Sync + 'static) -> Subscription {
        let id = self.next_id();
        let bus = self.clone();
        self.register(
            kind,
            id,
            Arc::new(move |event: &Event| {
                bus.unsubscribe(kind, id);
                handler(event);
            }),
        );
        Subscription { bus: self.clone(), kind, id }
    }

    /// Publish `event`. Re-entrant emits from within a handler are queued
    /// and drained after the current dispatch completes.
    pub fn emit(&self, event: Event) {
        let mut state = self.state.lock();
        if state.emitting {
            state.queue.push_back(event);
            return;
        }
        state.emitting = true;
        drop(state);

        self.dispatch(event);
        loop {
            let next = self.state.lock().queue.pop_front();
            match next {
                Some(queued) => self.dispatch(queued),
                None => break,
            }
        }

        self.state.lock().emitting = false;
    }

    fn dispatch(&self, event: Event) {
        let handlers = {
            let state = self.state.lock();
            state.handlers.get(event.kind()).cloned().unwrap_or_default()
        };

        for (_, handler) in &handlers {
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| handler(&event)));
            if let Err(panic) = outcome {
                let message = panic_message(&panic);
                tracing::error!(kind = event.kind(), message, "event handler panicked");
                if !event.is_error() {
                    self.state.lock().queue.push_back(Event::ErrorRecoverable {
                        source: ErrorSource::EventBus,
                        code: ErrorCode::new("HANDLER_PANIC"),
                        message,
                        context: HashMap::from([("kind".to_string(), event.kind().to_string())]),
                        recovery_action: None,
                    });
                }
            }
        }
    }
}

fn panic_message(payload: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
#[path = "event_bus_tests.rs"]
mod tests;

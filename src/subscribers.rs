//! Listener bundles and the subscriber registry.
//!
//! Subscribers live in an arena of slots addressed by generational handles.
//! Unsubscribing clears a slot; a stale handle can never remove a later
//! subscriber that happens to reuse the same slot.

use crate::error::ListenerError;
use crate::monitor::MonitorSnapshot;
use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::warn;

/// Events emitted by the monitor, in per-tick dispatch order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MonitorEvent {
    Incline,
    Decline,
    Change,
    Fallback,
}

impl fmt::Display for MonitorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MonitorEvent::Incline => "incline",
            MonitorEvent::Decline => "decline",
            MonitorEvent::Change => "change",
            MonitorEvent::Fallback => "fallback",
        };
        f.write_str(name)
    }
}

/// A bundle of handlers for monitor events.
///
/// Every handler defaults to a no-op, so implementors only override the
/// events they care about.
pub trait PerformanceListener {
    fn on_incline(&mut self, _snapshot: &MonitorSnapshot) -> Result<(), ListenerError> {
        Ok(())
    }

    fn on_decline(&mut self, _snapshot: &MonitorSnapshot) -> Result<(), ListenerError> {
        Ok(())
    }

    fn on_change(&mut self, _snapshot: &MonitorSnapshot) -> Result<(), ListenerError> {
        Ok(())
    }

    fn on_fallback(&mut self, _snapshot: &MonitorSnapshot) -> Result<(), ListenerError> {
        Ok(())
    }
}

type Handler = Box<dyn FnMut(&MonitorSnapshot)>;

/// Closure-based listener bundle.
///
/// ```
/// use adaptive_perf_monitor::Handlers;
///
/// let handlers = Handlers::new()
///     .on_decline(|snapshot| println!("dropping quality to {}", snapshot.factor));
/// ```
#[derive(Default)]
pub struct Handlers {
    incline: Option<Handler>,
    decline: Option<Handler>,
    change: Option<Handler>,
    fallback: Option<Handler>,
}

impl Handlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_incline(mut self, f: impl FnMut(&MonitorSnapshot) + 'static) -> Self {
        self.incline = Some(Box::new(f));
        self
    }

    pub fn on_decline(mut self, f: impl FnMut(&MonitorSnapshot) + 'static) -> Self {
        self.decline = Some(Box::new(f));
        self
    }

    pub fn on_change(mut self, f: impl FnMut(&MonitorSnapshot) + 'static) -> Self {
        self.change = Some(Box::new(f));
        self
    }

    pub fn on_fallback(mut self, f: impl FnMut(&MonitorSnapshot) + 'static) -> Self {
        self.fallback = Some(Box::new(f));
        self
    }

    fn call(handler: &mut Option<Handler>, snapshot: &MonitorSnapshot) -> Result<(), ListenerError> {
        if let Some(f) = handler.as_mut() {
            f(snapshot);
        }
        Ok(())
    }
}

impl fmt::Debug for Handlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handlers")
            .field("on_incline", &self.incline.is_some())
            .field("on_decline", &self.decline.is_some())
            .field("on_change", &self.change.is_some())
            .field("on_fallback", &self.fallback.is_some())
            .finish()
    }
}

impl PerformanceListener for Handlers {
    fn on_incline(&mut self, snapshot: &MonitorSnapshot) -> Result<(), ListenerError> {
        Self::call(&mut self.incline, snapshot)
    }

    fn on_decline(&mut self, snapshot: &MonitorSnapshot) -> Result<(), ListenerError> {
        Self::call(&mut self.decline, snapshot)
    }

    fn on_change(&mut self, snapshot: &MonitorSnapshot) -> Result<(), ListenerError> {
        Self::call(&mut self.change, snapshot)
    }

    fn on_fallback(&mut self, snapshot: &MonitorSnapshot) -> Result<(), ListenerError> {
        Self::call(&mut self.fallback, snapshot)
    }
}

/// Invoke the handler for `event`, converting a panic into a `ListenerError`.
pub(crate) fn invoke(
    listener: &mut dyn PerformanceListener,
    event: MonitorEvent,
    snapshot: &MonitorSnapshot,
) -> Result<(), ListenerError> {
    let outcome = catch_unwind(AssertUnwindSafe(|| match event {
        MonitorEvent::Incline => listener.on_incline(snapshot),
        MonitorEvent::Decline => listener.on_decline(snapshot),
        MonitorEvent::Change => listener.on_change(snapshot),
        MonitorEvent::Fallback => listener.on_fallback(snapshot),
    }));

    match outcome {
        Ok(result) => result,
        Err(payload) => Err(ListenerError::Panicked(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Stable address of a registered subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    index: u32,
    generation: u32,
}

/// Who raised a listener failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerOrigin {
    /// Handlers installed when the monitor was created
    Root,
    Subscriber(SubscriptionHandle),
}

/// A listener error captured during fan-out.
#[derive(Debug, Clone, PartialEq)]
pub struct ListenerFailure {
    pub origin: ListenerOrigin,
    pub event: MonitorEvent,
    pub error: ListenerError,
}

struct Slot {
    generation: u32,
    listener: Option<Box<dyn PerformanceListener>>,
}

/// Arena of subscribers, notified in registration order.
#[derive(Default)]
pub struct SubscriberRegistry {
    slots: Vec<Slot>,
    /// Vacant slot indices available for reuse
    free: Vec<u32>,
    /// Live slot indices in registration order
    order: Vec<u32>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener bundle.
    pub fn subscribe(&mut self, listener: Box<dyn PerformanceListener>) -> SubscriptionHandle {
        let index = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.generation = slot.generation.wrapping_add(1);
                slot.listener = Some(listener);
                index
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    listener: Some(listener),
                });
                index
            }
        };

        self.order.push(index);
        SubscriptionHandle {
            index,
            generation: self.slots[index as usize].generation,
        }
    }

    /// Remove the registration behind `handle`.
    ///
    /// Returns `false` if it was already removed; calling this twice is
    /// harmless.
    pub fn unsubscribe(&mut self, handle: SubscriptionHandle) -> bool {
        let Some(slot) = self.slots.get_mut(handle.index as usize) else {
            return false;
        };
        if slot.generation != handle.generation || slot.listener.is_none() {
            return false;
        }

        slot.listener = None;
        self.order.retain(|&index| index != handle.index);
        self.free.push(handle.index);
        true
    }

    /// Check if `handle` still refers to a live subscriber.
    pub fn contains(&self, handle: SubscriptionHandle) -> bool {
        self.slots
            .get(handle.index as usize)
            .map(|slot| slot.generation == handle.generation && slot.listener.is_some())
            .unwrap_or(false)
    }

    /// Number of live subscribers.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Deliver `event` to every subscriber, continuing past failures.
    pub fn notify(&mut self, event: MonitorEvent, snapshot: &MonitorSnapshot) -> Vec<ListenerFailure> {
        let Self { slots, order, .. } = self;
        let mut failures = Vec::new();

        for &index in order.iter() {
            let slot = &mut slots[index as usize];
            let Some(listener) = slot.listener.as_mut() else {
                continue;
            };

            if let Err(error) = invoke(listener.as_mut(), event, snapshot) {
                let handle = SubscriptionHandle {
                    index,
                    generation: slot.generation,
                };
                warn!(%event, %error, ?handle, "Subscriber failed, continuing fan-out");
                failures.push(ListenerFailure {
                    origin: ListenerOrigin::Subscriber(handle),
                    event,
                    error,
                });
            }
        }

        failures
    }
}

impl fmt::Debug for SubscriberRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberRegistry")
            .field("live", &self.order.len())
            .field("slots", &self.slots.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn recorder(log: &Rc<RefCell<Vec<String>>>, name: &'static str) -> Handlers {
        let log = Rc::clone(log);
        Handlers::new().on_change(move |_| log.borrow_mut().push(name.to_string()))
    }

    struct Failing;

    impl PerformanceListener for Failing {
        fn on_change(&mut self, _snapshot: &MonitorSnapshot) -> Result<(), ListenerError> {
            Err(ListenerError::Failed("quality switch rejected".to_string()))
        }
    }

    struct Panicking;

    impl PerformanceListener for Panicking {
        fn on_change(&mut self, _snapshot: &MonitorSnapshot) -> Result<(), ListenerError> {
            panic!("listener exploded");
        }
    }

    #[test]
    fn test_notifies_in_registration_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut registry = SubscriberRegistry::new();
        registry.subscribe(Box::new(recorder(&log, "a")));
        registry.subscribe(Box::new(recorder(&log, "b")));
        registry.subscribe(Box::new(recorder(&log, "c")));

        let failures = registry.notify(MonitorEvent::Change, &MonitorSnapshot::default());
        assert!(failures.is_empty());
        assert_eq!(*log.borrow(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_missing_handlers_are_skipped() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut registry = SubscriberRegistry::new();
        registry.subscribe(Box::new(recorder(&log, "a")));

        let failures = registry.notify(MonitorEvent::Incline, &MonitorSnapshot::default());
        assert!(failures.is_empty());
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut registry = SubscriberRegistry::new();
        let a = registry.subscribe(Box::new(recorder(&log, "a")));
        registry.subscribe(Box::new(recorder(&log, "b")));

        assert!(registry.unsubscribe(a));
        assert!(!registry.unsubscribe(a));
        assert_eq!(registry.len(), 1);

        registry.notify(MonitorEvent::Change, &MonitorSnapshot::default());
        assert_eq!(*log.borrow(), vec!["b"]);
    }

    #[test]
    fn test_stale_handle_does_not_remove_reused_slot() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut registry = SubscriberRegistry::new();
        let stale = registry.subscribe(Box::new(recorder(&log, "old")));
        registry.unsubscribe(stale);

        let fresh = registry.subscribe(Box::new(recorder(&log, "new")));
        assert_ne!(stale, fresh);
        assert!(!registry.unsubscribe(stale));
        assert!(registry.contains(fresh));

        registry.notify(MonitorEvent::Change, &MonitorSnapshot::default());
        assert_eq!(*log.borrow(), vec!["new"]);
    }

    #[test]
    fn test_reused_slot_keeps_registration_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut registry = SubscriberRegistry::new();
        let a = registry.subscribe(Box::new(recorder(&log, "a")));
        registry.subscribe(Box::new(recorder(&log, "b")));
        registry.unsubscribe(a);
        // Reuses slot 0 but registered after "b"
        registry.subscribe(Box::new(recorder(&log, "c")));

        registry.notify(MonitorEvent::Change, &MonitorSnapshot::default());
        assert_eq!(*log.borrow(), vec!["b", "c"]);
    }

    #[test]
    fn test_failures_do_not_stop_fan_out() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut registry = SubscriberRegistry::new();
        let failing = registry.subscribe(Box::new(Failing));
        let panicking = registry.subscribe(Box::new(Panicking));
        registry.subscribe(Box::new(recorder(&log, "survivor")));

        let failures = registry.notify(MonitorEvent::Change, &MonitorSnapshot::default());

        assert_eq!(*log.borrow(), vec!["survivor"]);
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].origin, ListenerOrigin::Subscriber(failing));
        assert_eq!(
            failures[0].error,
            ListenerError::Failed("quality switch rejected".to_string())
        );
        assert_eq!(failures[1].origin, ListenerOrigin::Subscriber(panicking));
        assert_eq!(
            failures[1].error,
            ListenerError::Panicked("listener exploded".to_string())
        );
    }

    #[test]
    fn test_event_display() {
        assert_eq!(MonitorEvent::Incline.to_string(), "incline");
        assert_eq!(MonitorEvent::Fallback.to_string(), "fallback");
    }
}

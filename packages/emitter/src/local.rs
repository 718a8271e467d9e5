//! Single-threaded emitter.
//!
//! This flavor has lower overhead than [`Emitter`][crate::Emitter] but neither the emitter nor
//! its listeners can be shared across threads.

use std::any::type_name;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::trace;

use crate::{
    DEFAULT_MAX_LISTENERS, EmitterBuilder, Error, ListenerIdentity, Payload, Registry, Result,
    Target,
};

/// A listener that can be registered with a [`LocalEmitter`].
///
/// Identity is decided by the shared callback: clones of a `LocalListener` are the same listener,
/// while two listeners created separately from identical closures are different listeners.
///
/// # Example
///
/// ```
/// use emitter::{LocalEmitter, LocalListener};
///
/// let emitter = LocalEmitter::<()>::new();
/// let listener = LocalListener::new(|_| println!("clicked"));
///
/// emitter.on("click", &listener);
/// emitter.on("click", &listener.clone());
///
/// assert_eq!(emitter.listener_count("click"), 1);
/// ```
pub struct LocalListener<D> {
    callback: Rc<dyn Fn(&Payload<D>)>,
}

impl<D> LocalListener<D> {
    /// Creates a new listener from a callback.
    #[must_use]
    pub fn new(callback: impl Fn(&Payload<D>) + 'static) -> Self {
        Self {
            callback: Rc::new(callback),
        }
    }

    fn call(&self, payload: &Payload<D>) {
        (self.callback)(payload);
    }
}

impl<D> Clone for LocalListener<D> {
    fn clone(&self) -> Self {
        Self {
            callback: Rc::clone(&self.callback),
        }
    }
}

impl<D> PartialEq for LocalListener<D> {
    fn eq(&self, other: &Self) -> bool {
        self.same_listener(other)
    }
}

impl<D> Eq for LocalListener<D> {}

impl<D> ListenerIdentity for LocalListener<D> {
    fn same_listener(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.callback, &other.callback)
    }
}

impl<D> fmt::Debug for LocalListener<D> {
    #[cfg_attr(test, mutants::skip)] // No API contract for debug output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("callback", &Rc::as_ptr(&self.callback).cast::<()>())
            .finish()
    }
}

type SharedRegistry<D> = Rc<RefCell<Registry<LocalListener<D>>>>;

/// A single-threaded registry of event listeners, delivering payloads of type `D`.
///
/// All operations take `&self`. The registry is never borrowed while a listener runs, so
/// listeners are free to register, remove and emit on the same emitter.
///
/// # Example
///
/// ```
/// use emitter::{LocalEmitter, LocalListener};
///
/// let emitter = LocalEmitter::<String>::new();
///
/// let unlisten = emitter.on(
///     "message_received",
///     &LocalListener::new(|payload| {
///         println!("received: {:?}", payload.data());
///     }),
/// );
///
/// emitter.emit_with("message_received", "hello".to_string());
///
/// unlisten.unlisten();
/// assert_eq!(emitter.listener_count("message_received"), 0);
/// ```
pub struct LocalEmitter<D> {
    registry: SharedRegistry<D>,
}

impl<D> LocalEmitter<D> {
    /// Creates an emitter with an empty registry and default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_listeners(DEFAULT_MAX_LISTENERS)
    }

    /// Starts configuring a new emitter.
    #[must_use]
    pub fn builder() -> EmitterBuilder<D> {
        EmitterBuilder::new()
    }

    pub(crate) fn with_max_listeners(max_listeners: usize) -> Self {
        Self {
            registry: Rc::new(RefCell::new(Registry::new(max_listeners))),
        }
    }

    fn handle(&self, target: Target<LocalListener<D>>) -> LocalUnlisten<D> {
        LocalUnlisten {
            registry: Rc::downgrade(&self.registry),
            target,
        }
    }

    /// Registers `listener` to be invoked on every emission of `name`.
    ///
    /// Registering the same listener for the same event again does not add a second
    /// registration, but still returns a working handle.
    ///
    /// The returned handle removes this listener from `name`.
    pub fn on(&self, name: &str, listener: &LocalListener<D>) -> LocalUnlisten<D> {
        let target = self.registry.borrow_mut().add_persistent(name, listener);
        self.handle(target)
    }

    /// Like [`on()`][Self::on] but for callers that may not have a listener to register.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `listener` is `None`.
    pub fn try_on(
        &self,
        name: &str,
        listener: Option<&LocalListener<D>>,
    ) -> Result<LocalUnlisten<D>> {
        let listener = listener.ok_or_else(|| Error::no_callback(name))?;
        Ok(self.on(name, listener))
    }

    /// Removes every registration of `listener` under `name`.
    ///
    /// Does nothing if there is no such registration.
    pub fn off(&self, name: &str, listener: &LocalListener<D>) {
        self.registry.borrow_mut().remove_listener(name, listener);
    }

    /// Registers `listener` to be invoked on the next emission of `name` only.
    ///
    /// The registration is removed before the listener runs, so an emission of the same event
    /// from inside the listener does not invoke it again. The returned handle cancels the
    /// registration if it has not fired yet.
    pub fn once(&self, name: &str, listener: &LocalListener<D>) -> LocalUnlisten<D> {
        let target = self.registry.borrow_mut().add_once(name, listener);
        self.handle(target)
    }

    /// Like [`once()`][Self::once] but for callers that may not have a listener to register.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `listener` is `None`.
    pub fn try_once(
        &self,
        name: &str,
        listener: Option<&LocalListener<D>>,
    ) -> Result<LocalUnlisten<D>> {
        let listener = listener.ok_or_else(|| Error::no_callback(name))?;
        Ok(self.once(name, listener))
    }

    /// Registers a group of one-shot listeners of which only the first to fire is invoked.
    ///
    /// Whichever event of `pairs` is emitted first invokes its paired listener, and at the same
    /// time removes every other registration of the group. The returned handle removes every
    /// registration of the group that is still present.
    ///
    /// Groups created by separate calls are independent of each other.
    pub fn race(&self, pairs: &[(&str, &LocalListener<D>)]) -> LocalUnlisten<D> {
        let target = self
            .registry
            .borrow_mut()
            .add_race(pairs.iter().map(|(name, listener)| (*name, *listener)));

        self.handle(target)
    }

    /// Like [`race()`][Self::race] but for callers that may not have a listener for every event.
    ///
    /// Nothing is registered if any pair lacks a listener.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] naming the first event without a listener.
    pub fn try_race(
        &self,
        pairs: &[(&str, Option<&LocalListener<D>>)],
    ) -> Result<LocalUnlisten<D>> {
        let pairs = pairs
            .iter()
            .map(|&(name, listener)| {
                listener
                    .map(|listener| (name, listener))
                    .ok_or_else(|| Error::no_callback(name))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(self.race(&pairs))
    }

    /// Invokes every listener of `name` with a synthesized payload carrying the event name.
    ///
    /// Returns the number of listeners invoked.
    pub fn emit(&self, name: &str) -> usize {
        self.dispatch(name, || Payload::synthetic(name))
    }

    /// Invokes every listener of `name` with `data` as the payload.
    ///
    /// Returns the number of listeners invoked.
    pub fn emit_with(&self, name: &str, data: D) -> usize {
        self.dispatch(name, || Payload::Data(data))
    }

    fn dispatch(&self, name: &str, payload: impl FnOnce() -> Payload<D>) -> usize {
        let pending = self.registry.borrow().snapshot(name);

        if pending.is_empty() {
            trace!(event = name, "no listeners to invoke");
            return 0;
        }

        let payload = payload();
        let mut invoked: usize = 0;

        for id in pending {
            // The borrow ends with this statement, before the listener runs.
            let listener = self.registry.borrow_mut().claim(name, id);

            if let Some(listener) = listener {
                listener.call(&payload);
                invoked = invoked.wrapping_add(1);
            }
        }

        trace!(event = name, invoked, "event emitted");

        invoked
    }

    /// Removes every registration under `name`.
    pub fn remove_all(&self, name: &str) {
        self.registry.borrow_mut().remove_all(name);
    }

    /// Removes every registration of every event.
    pub fn clear(&self) {
        self.registry.borrow_mut().clear();
    }

    /// The listeners currently registered for `name`, in the order they will be invoked.
    #[must_use]
    pub fn listeners(&self, name: &str) -> Vec<LocalListener<D>> {
        self.registry.borrow().listeners(name)
    }

    /// The number of registrations currently present for `name`.
    #[must_use]
    pub fn listener_count(&self, name: &str) -> usize {
        self.registry.borrow().listener_count(name)
    }

    /// Whether `name` has at least one registration.
    #[must_use]
    pub fn has_listeners(&self, name: &str) -> bool {
        self.listener_count(name) != 0
    }

    /// The names of all events that have at least one registration, sorted.
    #[must_use]
    pub fn event_names(&self) -> Vec<String> {
        self.registry.borrow().event_names()
    }
}

impl<D> Default for LocalEmitter<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D> fmt::Debug for LocalEmitter<D> {
    #[cfg_attr(test, mutants::skip)] // No API contract for debug output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("registry", &self.registry)
            .finish()
    }
}

/// Removes the registration(s) created by one [`LocalEmitter`] call.
///
/// Calling [`unlisten()`][Self::unlisten] any number of times is safe, including after the
/// registrations were already removed by other means or the emitter was dropped.
/// Dropping the handle does not remove anything.
pub struct LocalUnlisten<D> {
    registry: Weak<RefCell<Registry<LocalListener<D>>>>,
    target: Target<LocalListener<D>>,
}

impl<D> LocalUnlisten<D> {
    /// Removes the registration(s) this handle is bound to, if still present.
    pub fn unlisten(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.borrow_mut().release(&self.target);
        }
    }
}

impl<D> fmt::Debug for LocalUnlisten<D> {
    #[cfg_attr(test, mutants::skip)] // No API contract for debug output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::cell::Cell;
    use std::panic::{self, AssertUnwindSafe};
    use std::ptr;

    use static_assertions::assert_not_impl_any;

    use super::*;

    assert_not_impl_any!(LocalEmitter<u32>: Send, Sync);
    assert_not_impl_any!(LocalListener<u32>: Send, Sync);
    assert_not_impl_any!(LocalUnlisten<u32>: Send, Sync);

    fn counting_listener<D>() -> (LocalListener<D>, Rc<Cell<usize>>) {
        let count = Rc::new(Cell::new(0));
        let count_clone = Rc::clone(&count);

        let listener = LocalListener::new(move |_| count_clone.set(count_clone.get() + 1));

        (listener, count)
    }

    #[test]
    fn new_emitter_is_empty() {
        let emitter = LocalEmitter::<()>::default();

        assert!(emitter.event_names().is_empty());
        assert!(!emitter.has_listeners("fooBar"));
    }

    #[test]
    fn on_registers_listener() {
        let emitter = LocalEmitter::<()>::new();
        let (listener, _) = counting_listener();

        emitter.on("fooBar", &listener);

        assert_eq!(emitter.listeners("fooBar"), vec![listener]);
    }

    #[test]
    fn try_on_without_listener_fails() {
        let emitter = LocalEmitter::<()>::new();

        let result = emitter.try_on("keyup", None);

        assert!(matches!(result, Err(Error::InvalidArgument { .. })));
        assert!(!emitter.has_listeners("keyup"));
    }

    #[test]
    fn try_on_with_listener_registers() {
        let emitter = LocalEmitter::<()>::new();
        let (listener, count) = counting_listener();

        emitter.try_on("keyup", Some(&listener)).unwrap();
        emitter.emit("keyup");

        assert_eq!(count.get(), 1);
    }

    #[test]
    fn try_once_without_listener_fails() {
        let emitter = LocalEmitter::<()>::new();

        assert!(emitter.try_once("keyup", None).is_err());
        assert!(!emitter.has_listeners("keyup"));
    }

    #[test]
    fn try_race_with_missing_listener_registers_nothing() {
        let emitter = LocalEmitter::<()>::new();
        let (listener, _) = counting_listener();

        let result = emitter.try_race(&[("success", Some(&listener)), ("failure", None)]);

        let Err(Error::InvalidArgument { event, .. }) = result else {
            panic!("expected an invalid argument error");
        };
        assert_eq!(event, "failure");
        assert!(emitter.event_names().is_empty());
    }

    #[test]
    fn emit_returns_invoked_count() {
        let emitter = LocalEmitter::<()>::new();
        let (a, _) = counting_listener();
        let (b, _) = counting_listener();

        emitter.on("click", &a);
        emitter.once("click", &b);

        assert_eq!(emitter.emit("click"), 2);
        assert_eq!(emitter.emit("click"), 1);
        assert_eq!(emitter.emit("keyup"), 0);
    }

    #[test]
    fn listener_can_remove_later_listener() {
        let emitter = Rc::new(LocalEmitter::<()>::new());
        let (victim, victim_count) = counting_listener();

        let remover = {
            let emitter = Rc::clone(&emitter);
            let victim = victim.clone();
            LocalListener::new(move |_| emitter.off("click", &victim))
        };

        emitter.on("click", &remover);
        emitter.on("click", &victim);

        emitter.emit("click");

        assert_eq!(victim_count.get(), 0);
        assert_eq!(emitter.listeners("click"), vec![remover]);
    }

    #[test]
    fn listener_added_during_emit_waits_for_next_emit() {
        let emitter = Rc::new(LocalEmitter::<()>::new());
        let (late, late_count) = counting_listener();

        let adder = {
            let emitter = Rc::clone(&emitter);
            LocalListener::new(move |_| {
                emitter.on("click", &late);
            })
        };

        emitter.on("click", &adder);

        emitter.emit("click");
        assert_eq!(late_count.get(), 0);

        emitter.emit("click");
        assert_eq!(late_count.get(), 1);
    }

    #[test]
    fn once_listener_is_not_reentered_by_nested_emit() {
        let emitter = Rc::new(LocalEmitter::<()>::new());
        let count = Rc::new(Cell::new(0));

        let listener = {
            let emitter = Rc::clone(&emitter);
            let count = Rc::clone(&count);
            LocalListener::new(move |_| {
                count.set(count.get() + 1);
                emitter.emit("click");
            })
        };

        emitter.once("click", &listener);
        emitter.emit("click");

        assert_eq!(count.get(), 1);
        assert!(!emitter.has_listeners("click"));
    }

    #[test]
    fn nested_emit_runs_to_completion_before_outer_continues() {
        let emitter = Rc::new(LocalEmitter::<()>::new());
        let log = Rc::new(RefCell::new(Vec::new()));

        let outer_first = {
            let emitter = Rc::clone(&emitter);
            let log = Rc::clone(&log);
            LocalListener::new(move |_| {
                log.borrow_mut().push("outer-first");
                emitter.emit("inner");
            })
        };
        let outer_second = {
            let log = Rc::clone(&log);
            LocalListener::new(move |_| log.borrow_mut().push("outer-second"))
        };
        let inner = {
            let log = Rc::clone(&log);
            LocalListener::new(move |_| log.borrow_mut().push("inner"))
        };

        emitter.on("outer", &outer_first);
        emitter.on("outer", &outer_second);
        emitter.on("inner", &inner);

        emitter.emit("outer");

        assert_eq!(*log.borrow(), vec!["outer-first", "inner", "outer-second"]);
    }

    #[test]
    fn every_listener_sees_the_same_payload() {
        let emitter = LocalEmitter::<u32>::new();
        let seen = Rc::new(RefCell::new(Vec::new()));

        for _ in 0..3 {
            let seen = Rc::clone(&seen);
            emitter.once(
                "tick",
                &LocalListener::new(move |payload: &Payload<u32>| {
                    seen.borrow_mut().push(ptr::from_ref(payload) as usize);
                }),
            );
        }

        emitter.emit_with("tick", 7);

        let seen = seen.borrow();
        let first = seen.first().copied();
        assert_eq!(seen.len(), 3);
        assert!(seen.iter().all(|address| Some(*address) == first));
    }

    #[test]
    fn unlisten_after_emitter_dropped_is_noop() {
        let emitter = LocalEmitter::<()>::new();
        let (listener, _) = counting_listener();

        let unlisten = emitter.on("click", &listener);
        drop(emitter);

        unlisten.unlisten();
    }

    #[test]
    fn remove_all_and_clear() {
        let emitter = LocalEmitter::<()>::new();
        let (a, a_count) = counting_listener();
        let (b, b_count) = counting_listener();

        emitter.on("click", &a);
        emitter.once("click", &b);
        emitter.on("keyup", &b);

        emitter.remove_all("click");
        assert_eq!(emitter.event_names(), vec!["keyup".to_owned()]);

        emitter.clear();
        assert!(emitter.event_names().is_empty());

        emitter.emit("click");
        emitter.emit("keyup");
        assert_eq!(a_count.get(), 0);
        assert_eq!(b_count.get(), 0);
    }

    #[test]
    #[should_panic]
    fn listener_panic_propagates_out_of_emit() {
        let emitter = LocalEmitter::<()>::new();

        emitter.on("click", &LocalListener::new(|_| panic!("listener failure")));

        emitter.emit("click");
    }

    #[test]
    fn listener_panic_aborts_rest_of_emission_but_keeps_registry_usable() {
        let emitter = LocalEmitter::<()>::new();
        let (after, after_count) = counting_listener();

        emitter.once("click", &LocalListener::new(|_| panic!("listener failure")));
        emitter.on("click", &after);

        let result = panic::catch_unwind(AssertUnwindSafe(|| emitter.emit("click")));
        assert!(result.is_err());
        assert_eq!(after_count.get(), 0);

        // The failed one-shot listener was removed before it ran.
        assert_eq!(emitter.emit("click"), 1);
        assert_eq!(after_count.get(), 1);
    }
}

//! Thread-safe emitter.
//!
//! Every emitter owns one `parking_lot::Mutex` around its registry. All mutations, including the
//! self-removal of one-shot listeners during dispatch, are serialized on that lock. The lock is
//! never held while a listener runs.

use std::any::type_name;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::trace;

use crate::{
    DEFAULT_MAX_LISTENERS, EmitterBuilder, Error, ListenerIdentity, Payload, Registry, Result,
    Target,
};

/// A listener that can be registered with an [`Emitter`].
///
/// Identity is decided by the shared callback: clones of a `Listener` are the same listener,
/// while two listeners created separately from identical closures are different listeners.
pub struct Listener<D> {
    callback: Arc<dyn Fn(&Payload<D>) + Send + Sync>,
}

impl<D> Listener<D> {
    /// Creates a new listener from a callback.
    #[must_use]
    pub fn new(callback: impl Fn(&Payload<D>) + Send + Sync + 'static) -> Self {
        Self {
            callback: Arc::new(callback),
        }
    }

    fn call(&self, payload: &Payload<D>) {
        (self.callback)(payload);
    }
}

impl<D> Clone for Listener<D> {
    fn clone(&self) -> Self {
        Self {
            callback: Arc::clone(&self.callback),
        }
    }
}

impl<D> PartialEq for Listener<D> {
    fn eq(&self, other: &Self) -> bool {
        self.same_listener(other)
    }
}

impl<D> Eq for Listener<D> {}

impl<D> ListenerIdentity for Listener<D> {
    fn same_listener(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.callback, &other.callback)
    }
}

impl<D> fmt::Debug for Listener<D> {
    #[cfg_attr(test, mutants::skip)] // No API contract for debug output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("callback", &Arc::as_ptr(&self.callback).cast::<()>())
            .finish()
    }
}

type SharedRegistry<D> = Arc<Mutex<Registry<Listener<D>>>>;

/// A thread-safe registry of event listeners, delivering payloads of type `D`.
///
/// Emission is synchronous: [`emit()`][Self::emit] invokes every matching listener on the
/// calling thread before returning. Any thread may register, remove and emit concurrently.
///
/// For single-threaded use, [`LocalEmitter`][crate::LocalEmitter] has lower overhead.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// use emitter::{Emitter, Listener};
///
/// let emitter = Emitter::<()>::new();
/// let clicks = Arc::new(AtomicUsize::new(0));
///
/// let clicks_clone = Arc::clone(&clicks);
/// emitter.once(
///     "click",
///     &Listener::new(move |_| {
///         clicks_clone.fetch_add(1, Ordering::Relaxed);
///     }),
/// );
///
/// emitter.emit("click");
/// emitter.emit("click");
///
/// assert_eq!(clicks.load(Ordering::Relaxed), 1);
/// ```
pub struct Emitter<D> {
    registry: SharedRegistry<D>,
}

impl<D> Emitter<D> {
    /// Creates an emitter with an empty registry and default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_listeners(DEFAULT_MAX_LISTENERS)
    }

    /// Starts configuring a new emitter.
    ///
    /// # Example
    ///
    /// ```
    /// use emitter::Emitter;
    ///
    /// let emitter = Emitter::<String>::builder().max_listeners(100).build();
    /// ```
    #[must_use]
    pub fn builder() -> EmitterBuilder<D> {
        EmitterBuilder::new()
    }

    pub(crate) fn with_max_listeners(max_listeners: usize) -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry::new(max_listeners))),
        }
    }

    fn handle(&self, target: Target<Listener<D>>) -> Unlisten<D> {
        Unlisten {
            registry: Arc::downgrade(&self.registry),
            target,
        }
    }

    /// Registers `listener` to be invoked on every emission of `name`.
    ///
    /// Registering the same listener for the same event again does not add a second
    /// registration, but still returns a working handle.
    ///
    /// The returned handle removes this listener from `name`.
    pub fn on(&self, name: &str, listener: &Listener<D>) -> Unlisten<D> {
        let target = self.registry.lock().add_persistent(name, listener);
        self.handle(target)
    }

    /// Like [`on()`][Self::on] but for callers that may not have a listener to register.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `listener` is `None`.
    pub fn try_on(&self, name: &str, listener: Option<&Listener<D>>) -> Result<Unlisten<D>> {
        let listener = listener.ok_or_else(|| Error::no_callback(name))?;
        Ok(self.on(name, listener))
    }

    /// Removes every registration of `listener` under `name`.
    ///
    /// Does nothing if there is no such registration.
    pub fn off(&self, name: &str, listener: &Listener<D>) {
        self.registry.lock().remove_listener(name, listener);
    }

    /// Registers `listener` to be invoked on the next emission of `name` only.
    ///
    /// The registration is removed before the listener runs, so neither a nested emission from
    /// inside the listener nor a concurrent emission on another thread invokes it again.
    /// The returned handle cancels the registration if it has not fired yet.
    pub fn once(&self, name: &str, listener: &Listener<D>) -> Unlisten<D> {
        let target = self.registry.lock().add_once(name, listener);
        self.handle(target)
    }

    /// Like [`once()`][Self::once] but for callers that may not have a listener to register.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `listener` is `None`.
    pub fn try_once(&self, name: &str, listener: Option<&Listener<D>>) -> Result<Unlisten<D>> {
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
    ///
    /// # Example
    ///
    /// ```
    /// use emitter::{Emitter, Listener};
    ///
    /// let emitter = Emitter::<&'static str>::new();
    ///
    /// emitter.race(&[
    ///     ("success", &Listener::new(|_| println!("succeeded"))),
    ///     ("failure", &Listener::new(|payload| println!("failed: {:?}", payload.data()))),
    /// ]);
    ///
    /// emitter.emit_with("failure", "timed out");
    ///
    /// assert!(!emitter.has_listeners("success"));
    /// assert!(!emitter.has_listeners("failure"));
    /// ```
    pub fn race(&self, pairs: &[(&str, &Listener<D>)]) -> Unlisten<D> {
        let target = self
            .registry
            .lock()
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
    pub fn try_race(&self, pairs: &[(&str, Option<&Listener<D>>)]) -> Result<Unlisten<D>> {
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
        let pending = self.registry.lock().snapshot(name);

        if pending.is_empty() {
            trace!(event = name, "no listeners to invoke");
            return 0;
        }

        let payload = payload();
        let mut invoked: usize = 0;

        for id in pending {
            // The lock is released at the end of this statement, before the listener runs.
            let listener = self.registry.lock().claim(name, id);

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
        self.registry.lock().remove_all(name);
    }

    /// Removes every registration of every event.
    pub fn clear(&self) {
        self.registry.lock().clear();
    }

    /// The listeners currently registered for `name`, in the order they will be invoked.
    #[must_use]
    pub fn listeners(&self, name: &str) -> Vec<Listener<D>> {
        self.registry.lock().listeners(name)
    }

    /// The number of registrations currently present for `name`.
    #[must_use]
    pub fn listener_count(&self, name: &str) -> usize {
        self.registry.lock().listener_count(name)
    }

    /// Whether `name` has at least one registration.
    #[must_use]
    pub fn has_listeners(&self, name: &str) -> bool {
        self.listener_count(name) != 0
    }

    /// The names of all events that have at least one registration, sorted.
    #[must_use]
    pub fn event_names(&self) -> Vec<String> {
        self.registry.lock().event_names()
    }
}

impl<D> Default for Emitter<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D> fmt::Debug for Emitter<D> {
    #[cfg_attr(test, mutants::skip)] // No API contract for debug output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("registry", &self.registry)
            .finish()
    }
}

/// Removes the registration(s) created by one [`Emitter`] call.
///
/// Calling [`unlisten()`][Self::unlisten] any number of times, from any thread, is safe,
/// including after the registrations were already removed by other means or the emitter was
/// dropped. Dropping the handle does not remove anything.
pub struct Unlisten<D> {
    registry: Weak<Mutex<Registry<Listener<D>>>>,
    target: Target<Listener<D>>,
}

impl<D> Unlisten<D> {
    /// Removes the registration(s) this handle is bound to, if still present.
    pub fn unlisten(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.lock().release(&self.target);
        }
    }
}

impl<D> fmt::Debug for Unlisten<D> {
    #[cfg_attr(test, mutants::skip)] // No API contract for debug output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

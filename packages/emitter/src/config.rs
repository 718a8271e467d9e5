use std::any::type_name;
use std::fmt;
use std::marker::PhantomData;

use crate::{Emitter, LocalEmitter};

/// How many registrations one event name may have before we log a possible listener leak,
/// unless configured otherwise via [`EmitterBuilder::max_listeners()`].
pub const DEFAULT_MAX_LISTENERS: usize = 10;

/// Creates instances of [`Emitter`] and [`LocalEmitter`] delivering payloads of type `D`.
///
/// There are no required parameters. Use `Emitter::builder()` or `LocalEmitter::builder()` to
/// create a new instance of this builder.
///
/// # Example
///
/// ```
/// use emitter::{Emitter, LocalEmitter};
///
/// let shared = Emitter::<u64>::builder().max_listeners(50).build();
/// let local = LocalEmitter::<u64>::builder().max_listeners(0).build_local();
/// ```
pub struct EmitterBuilder<D> {
    /// Registrations per event name above which a warning is logged.
    /// Zero disables the warning.
    max_listeners: usize,

    _payload: PhantomData<fn() -> D>,
}

impl<D> EmitterBuilder<D> {
    pub(crate) fn new() -> Self {
        Self {
            max_listeners: DEFAULT_MAX_LISTENERS,
            _payload: PhantomData,
        }
    }

    /// Sets how many registrations one event name may have before the emitter logs a warning
    /// about a possible listener leak. Zero disables the warning.
    ///
    /// The warning is logged once per event name and registration is never refused.
    /// The default is [`DEFAULT_MAX_LISTENERS`].
    #[must_use]
    pub fn max_listeners(self, max_listeners: usize) -> Self {
        Self {
            max_listeners,
            ..self
        }
    }

    /// Creates a thread-safe emitter with the configured settings.
    #[must_use]
    pub fn build(self) -> Emitter<D> {
        Emitter::with_max_listeners(self.max_listeners)
    }

    /// Creates a single-threaded emitter with the configured settings.
    #[must_use]
    pub fn build_local(self) -> LocalEmitter<D> {
        LocalEmitter::with_max_listeners(self.max_listeners)
    }
}

impl<D> fmt::Debug for EmitterBuilder<D> {
    #[cfg_attr(test, mutants::skip)] // No API contract for debug output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("max_listeners", &self.max_listeners)
            .finish()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::rc::Rc;

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(EmitterBuilder<Rc<u32>>: Send, Sync);

    #[test]
    fn default_is_default_max_listeners() {
        assert_eq!(EmitterBuilder::<()>::new().max_listeners, DEFAULT_MAX_LISTENERS);
    }

    #[test]
    fn max_listeners_is_applied() {
        let builder = Emitter::<()>::builder().max_listeners(3);

        assert_eq!(builder.max_listeners, 3);
    }

    #[test]
    fn builds_working_emitters() {
        let shared = Emitter::<u8>::builder().max_listeners(1).build();
        let local = LocalEmitter::<u8>::builder().build_local();

        assert!(shared.event_names().is_empty());
        assert!(local.event_names().is_empty());
    }
}

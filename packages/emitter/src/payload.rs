/// The value delivered to every listener invoked by one emission.
///
/// A payload is built once per emit call and every listener of that call receives a shared
/// reference to the same instance.
///
/// # Example
///
/// ```
/// use emitter::{LocalEmitter, LocalListener};
///
/// let emitter = LocalEmitter::<u32>::new();
///
/// emitter.on(
///     "loading",
///     &LocalListener::new(|payload| {
///         assert_eq!(payload.event_type(), Some("loading"));
///         assert_eq!(payload.data(), None);
///     }),
/// );
///
/// emitter.emit("loading");
/// ```
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum Payload<D> {
    /// Data supplied by the emitting caller, delivered verbatim.
    Data(D),

    /// Synthesized when the emitting caller supplied no data.
    ///
    /// Carries the name of the event that was emitted, under the `type` key
    /// in the usual event-object terminology.
    Synthetic {
        /// Name of the emitted event.
        event_type: String,
    },
}

impl<D> Payload<D> {
    pub(crate) fn synthetic(name: &str) -> Self {
        Self::Synthetic {
            event_type: name.to_owned(),
        }
    }

    /// The caller-supplied data, if the emission carried any.
    #[must_use]
    pub fn data(&self) -> Option<&D> {
        match self {
            Self::Data(data) => Some(data),
            Self::Synthetic { .. } => None,
        }
    }

    /// The event name of a synthesized payload.
    ///
    /// Payloads carrying caller-supplied data are delivered verbatim, so this is `None` for them.
    #[must_use]
    pub fn event_type(&self) -> Option<&str> {
        match self {
            Self::Data(_) => None,
            Self::Synthetic { event_type } => Some(event_type),
        }
    }

    /// Consumes the payload, returning the caller-supplied data if there was any.
    #[must_use]
    pub fn into_data(self) -> Option<D> {
        match self {
            Self::Data(data) => Some(data),
            Self::Synthetic { .. } => None,
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn synthetic_payload_carries_only_event_type() {
        let payload = Payload::<u32>::synthetic("loading");

        assert_eq!(payload.event_type(), Some("loading"));
        assert_eq!(payload.data(), None);
        assert_eq!(payload.into_data(), None);
    }

    #[test]
    fn data_payload_is_verbatim() {
        let payload = Payload::Data("hello");

        assert_eq!(payload.data(), Some(&"hello"));
        assert_eq!(payload.event_type(), None);
        assert_eq!(payload.into_data(), Some("hello"));
    }

    #[test]
    fn falsy_data_is_still_data() {
        let payload = Payload::Data(0_u8);

        assert_eq!(payload.data(), Some(&0));
        assert_eq!(payload.event_type(), None);
    }
}

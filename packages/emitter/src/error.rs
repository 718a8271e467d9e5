use thiserror::Error;

/// Errors that can occur when registering listeners with an emitter.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The caller asked for a registration without supplying a usable listener.
    #[error("invalid argument for event '{event}': {problem}")]
    InvalidArgument {
        /// The event name the registration was requested for.
        event: String,

        /// A human-readable description of the problem.
        problem: String,
    },
}

impl Error {
    pub(crate) fn no_callback(event: &str) -> Self {
        Self::InvalidArgument {
            event: event.to_owned(),
            problem: "no callback passed".to_owned(),
        }
    }
}

/// A specialized `Result` type for emitter operations, returning the crate's
/// [`Error`] type as the error value.
pub type Result<T> = std::result::Result<T, Error>;

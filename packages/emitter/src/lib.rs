#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Synchronous in-process event emitter.
//!
//! Independent pieces of code register interest in named events, receive the data associated
//! with an event when it is emitted, and later cancel that interest. Everything happens on the
//! calling thread: [`emit()`][Emitter::emit] invokes every matching listener, in registration
//! order, before returning.
//!
//! This is part of the [Folo project](https://github.com/folo-rs/folo) that provides mechanisms for
//! high-performance hardware-aware programming in Rust.
//!
//! # Listening modes
//!
//! * [`on()`][Emitter::on] - the listener is invoked on every emission until removed.
//! * [`once()`][Emitter::once] - the listener is invoked on the next emission only.
//! * [`race()`][Emitter::race] - a group of `(event, listener)` pairs of which only the first
//!   event to be emitted invokes its listener; the rest of the group is removed at that moment.
//!
//! Every mode returns a handle whose `unlisten()` removes what the call registered. Handles may
//! be invoked any number of times and outlive the emitter without consequence.
//!
//! # Payloads
//!
//! [`emit_with()`][Emitter::emit_with] delivers the caller's data verbatim as
//! [`Payload::Data`]. [`emit()`][Emitter::emit] delivers a [`Payload::Synthetic`] carrying just
//! the event name. Either way, every listener invoked by one emission receives the same instance.
//!
//! # Example
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! use emitter::{LocalEmitter, LocalListener};
//!
//! let emitter = LocalEmitter::<String>::new();
//! let log = Rc::new(RefCell::new(Vec::new()));
//!
//! let log_clone = Rc::clone(&log);
//! let listener = LocalListener::new(move |payload| {
//!     log_clone.borrow_mut().push(payload.clone());
//! });
//!
//! let unlisten = emitter.on("message_received", &listener);
//!
//! emitter.emit_with("message_received", "hello".to_string());
//! emitter.emit("message_received");
//!
//! unlisten.unlisten();
//! emitter.emit("message_received");
//!
//! assert_eq!(log.borrow().len(), 2);
//! assert_eq!(log.borrow()[0].data().map(String::as_str), Some("hello"));
//! assert_eq!(log.borrow()[1].event_type(), Some("message_received"));
//! ```
//!
//! # Thread safety
//!
//! [`Emitter`] can be shared between threads and requires listeners to be `Send + Sync`.
//! [`LocalEmitter`] is single-threaded and accepts any listener. Both behave identically
//! otherwise.
//!
//! # Modifying the emitter from a listener
//!
//! Listeners may call any method of the emitter that invoked them, including a nested `emit`,
//! which runs to completion before the outer emission continues. An emission considers the
//! registrations present when it started: a listener removed by an earlier listener of the same
//! emission is not invoked, and a listener added during the emission is first invoked by the next
//! one. One-shot registrations are removed just before their listener is invoked.
//!
//! # Panic policy
//!
//! A panic in a listener propagates out of `emit`, and the remaining listeners of that emission
//! are not invoked. The emitter itself stays fully usable afterwards.
//!
//! # Logging
//!
//! Registration, removal and dispatch are traced via the `tracing` crate at `trace` level.
//! Exceeding the configured [maximum listener count][EmitterBuilder::max_listeners] for an event
//! logs a `warn` level message once per event name.

mod config;
mod error;
mod local;
mod payload;
mod registry;
mod sync;

pub use config::*;
pub use error::*;
pub use local::*;
pub use payload::*;
pub(crate) use registry::*;
pub use sync::*;

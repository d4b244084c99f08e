#![forbid(unsafe_code)]

//! Signal/slot linkage for objects with independent lifetimes.
//!
//! # Role
//! `tether` connects notifiers ([`Signal`]) to receivers (anything that
//! implements [`Receiver`] by embedding a [`Trackable`]) so that either side
//! can be dropped first, in any order, even while a signal is firing, and no
//! callback ever reaches a dead receiver.
//!
//! # Architecture
//!
//! Each connection is a linkage pair: a token in the signal's ordered list
//! and a binding in the receiver's anchor list. Both lists are slab-backed
//! and own their nodes outright; the two halves refer to each other only
//! through `Weak` handles and slab keys. Releasing either half releases the
//! other, after first clearing its own back-reference, so teardown is
//! idempotent.
//!
//! A token either calls a [`Delegate`] (a method on a receiver object) or
//! chains into another signal, which then fires with the same arguments.
//!
//! # Invariants
//!
//! 1. Subscribers fire in connection order.
//! 2. Dropping a receiver removes all of its subscriptions before the next
//!    token is visited.
//! 3. A subscriber removed during dispatch is never invoked afterwards and
//!    does not cause its neighbours to be skipped or repeated.
//! 4. Dropping a signal leaves every receiver it was connected to unbound.
//!
//! # Example
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use tether::{Receiver, Signal, Trackable};
//!
//! struct Label {
//!     trackable: Trackable,
//!     width: Cell<u16>,
//! }
//!
//! impl Receiver for Label {
//!     fn trackable(&self) -> &Trackable {
//!         &self.trackable
//!     }
//! }
//!
//! impl Label {
//!     fn on_resize(&self, width: &u16) {
//!         self.width.set(*width);
//!     }
//! }
//!
//! let resized: Signal<u16> = Signal::new();
//! let label = Rc::new(Label { trackable: Trackable::new(), width: Cell::new(0) });
//! resized.connect(&label, Label::on_resize);
//!
//! resized.emit(&80);
//! assert_eq!(label.width.get(), 80);
//!
//! drop(label);
//! assert_eq!(resized.count_connections(), 0);
//! resized.emit(&120);
//! ```

pub mod config;
pub mod delegate;
pub mod error;
pub mod signal;
pub mod signal_ref;
mod token;
pub mod trackable;

pub use config::SignalConfig;
pub use delegate::Delegate;
pub use error::SignalError;
pub use signal::{ScanFrom, Signal};
pub use signal_ref::SignalRef;
pub use trackable::{Receiver, Trackable};

#![forbid(unsafe_code)]

//! Signal-side half of a linkage pair.

use std::cell::RefCell;
use std::rc::Weak;

use tracing::{debug, warn};

use crate::delegate::Delegate;
use crate::signal::{SignalCore, dispatch};
use crate::trackable::BindingRef;

/// What a token does when its signal fires.
pub(crate) enum Payload<A: 'static> {
    /// Call a method on a receiver object.
    Delegate(Delegate<A>),
    /// Re-fire another signal with the same arguments.
    Chain(Weak<RefCell<SignalCore<A>>>),
}

impl<A: 'static> Payload<A> {
    pub(crate) fn invoke(&self, args: &A) {
        match self {
            Self::Delegate(delegate) => {
                if !delegate.invoke(args) {
                    debug!(object = ?delegate.object_addr(), "delegate target already dropped");
                }
            }
            Self::Chain(target) => {
                let Some(target) = target.upgrade() else {
                    return;
                };
                if let Err(err) = dispatch(&target, args) {
                    warn!(%err, "chained emit refused");
                }
            }
        }
    }

    pub(crate) fn delegate(&self) -> Option<&Delegate<A>> {
        match self {
            Self::Delegate(delegate) => Some(delegate),
            Self::Chain(_) => None,
        }
    }

    /// Whether this is a chain into the signal whose core lives at `core`.
    pub(crate) fn chains_to(&self, core: *const RefCell<SignalCore<A>>) -> bool {
        match self {
            Self::Chain(target) => std::ptr::eq(target.as_ptr(), core),
            Self::Delegate(_) => false,
        }
    }
}

impl<A: 'static> Clone for Payload<A> {
    fn clone(&self) -> Self {
        match self {
            Self::Delegate(delegate) => Self::Delegate(delegate.clone()),
            Self::Chain(target) => Self::Chain(Weak::clone(target)),
        }
    }
}

/// A node in a signal's subscription list.
pub(crate) struct Token<A: 'static> {
    pub(crate) prev: Option<usize>,
    pub(crate) next: Option<usize>,
    pub(crate) payload: Payload<A>,
    /// Paired binding; `None` only between allocation and binding.
    pub(crate) binding: Option<BindingRef>,
}

impl<A: 'static> Token<A> {
    pub(crate) fn new(payload: Payload<A>) -> Self {
        Self {
            prev: None,
            next: None,
            payload,
            binding: None,
        }
    }
}

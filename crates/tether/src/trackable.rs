#![forbid(unsafe_code)]

//! Receiver-side bookkeeping: the anchor list every subscription target owns.
//!
//! # Design
//!
//! A [`Trackable`] owns an insertion-ordered doubly linked list of bindings,
//! stored in a [`Slab`] and linked by slab keys. Each binding is the
//! receiver-side half of a linkage pair; it holds a weak `TokenRef` naming
//! the signal-side half. The list never looks at what a subscription does,
//! only at which token it is paired with.
//!
//! # Invariants
//!
//! 1. Every binding in the list is paired with exactly one live token, and
//!    that token's `BindingRef` names this list and this binding's key.
//! 2. Releasing a binding unlinks it in O(1) and clears its back-reference
//!    before the peer token is touched.
//! 3. After [`Trackable::unbind_all`] or drop the list is empty.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use slab::Slab;
use tracing::trace;

/// The receiver capability: anything that can be the target of a connection.
///
/// Implementors embed a [`Trackable`] and hand it out here. Dropping the
/// implementor drops the `Trackable`, which severs every connection that
/// targets it.
pub trait Receiver {
    fn trackable(&self) -> &Trackable;
}

/// Signal-side owner of tokens, seen from a binding.
pub(crate) trait TokenHost {
    /// Detach token `key` if it is still paired with binding `binding` of
    /// `list`. The binding has already been unlinked by the caller.
    fn release_token(&self, key: usize, list: *const RefCell<BindingList>, binding: usize);
}

/// Weak reference from a binding to its token.
pub(crate) struct TokenRef {
    pub(crate) host: Weak<dyn TokenHost>,
    pub(crate) key: usize,
}

impl TokenRef {
    fn is(&self, host: *const (), key: usize) -> bool {
        self.key == key && std::ptr::addr_eq(self.host.as_ptr(), host)
    }
}

/// Weak reference from a token to its binding.
pub(crate) struct BindingRef {
    list: Weak<RefCell<BindingList>>,
    key: usize,
}

impl BindingRef {
    /// Unlink the paired binding, provided it still points back at token
    /// `token` of `host`.
    pub(crate) fn release(self, host: *const (), token: usize) {
        if let Some(list) = self.list.upgrade() {
            list.borrow_mut().release(self.key, host, token);
        }
    }

    pub(crate) fn points_to(&self, list: *const RefCell<BindingList>, key: usize) -> bool {
        self.key == key && std::ptr::eq(self.list.as_ptr(), list)
    }

    pub(crate) fn lives_in(&self, trackable: &Trackable) -> bool {
        std::ptr::eq(self.list.as_ptr(), Rc::as_ptr(&trackable.bindings))
    }
}

struct Binding {
    prev: Option<usize>,
    next: Option<usize>,
    token: Option<TokenRef>,
}

#[derive(Default)]
pub(crate) struct BindingList {
    nodes: Slab<Binding>,
    head: Option<usize>,
    tail: Option<usize>,
}

impl BindingList {
    fn push_back(&mut self, token: TokenRef) -> usize {
        let key = self.nodes.insert(Binding {
            prev: self.tail,
            next: None,
            token: Some(token),
        });
        match self.tail {
            Some(tail) => self.nodes[tail].next = Some(key),
            None => self.head = Some(key),
        }
        self.tail = Some(key);
        key
    }

    fn unlink(&mut self, key: usize) -> Binding {
        let node = self.nodes.remove(key);
        match node.prev {
            Some(prev) => self.nodes[prev].next = node.next,
            None => self.head = node.next,
        }
        match node.next {
            Some(next) => self.nodes[next].prev = node.prev,
            None => self.tail = node.prev,
        }
        node
    }

    fn release(&mut self, key: usize, host: *const (), token: usize) -> bool {
        let paired = self
            .nodes
            .get(key)
            .and_then(|binding| binding.token.as_ref())
            .is_some_and(|t| t.is(host, token));
        if paired {
            self.unlink(key);
        }
        paired
    }

    /// Empty the list, handing back each binding key with its token.
    fn drain(&mut self) -> Vec<(usize, TokenRef)> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut cursor = self.head;
        while let Some(key) = cursor {
            let binding = &mut self.nodes[key];
            cursor = binding.next;
            if let Some(token) = binding.token.take() {
                out.push((key, token));
            }
        }
        self.nodes.clear();
        self.head = None;
        self.tail = None;
        out
    }

    fn len(&self) -> usize {
        self.nodes.len()
    }
}

/// Anchor list for an object that can receive connections.
///
/// Embed one in any type that implements [`Receiver`]. Dropping it (or
/// calling [`unbind_all`](Self::unbind_all)) disconnects the owner from every
/// signal, so a signal can never call into a dead receiver.
///
/// Cloning yields a fresh, unbound `Trackable`: copying an object does not
/// copy its subscriptions.
pub struct Trackable {
    bindings: Rc<RefCell<BindingList>>,
}

impl Trackable {
    #[must_use]
    pub fn new() -> Self {
        Self {
            bindings: Rc::new(RefCell::new(BindingList::default())),
        }
    }

    /// Number of live connections targeting this object.
    #[must_use]
    pub fn count_bindings(&self) -> usize {
        self.bindings.borrow().len()
    }

    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.count_bindings() > 0
    }

    /// Sever every connection that targets this object.
    ///
    /// Safe to call from inside a callback this object is receiving; the
    /// dispatching signal skips ahead past the removed connection.
    pub fn unbind_all(&self) {
        let list = Rc::as_ptr(&self.bindings);
        let drained = self.bindings.borrow_mut().drain();
        if drained.is_empty() {
            return;
        }
        trace!(count = drained.len(), "unbinding receiver");
        for (binding, token) in drained {
            if let Some(host) = token.host.upgrade() {
                host.release_token(token.key, list, binding);
            }
        }
    }

    pub(crate) fn bind(&self, token: TokenRef) -> BindingRef {
        let key = self.bindings.borrow_mut().push_back(token);
        BindingRef {
            list: Rc::downgrade(&self.bindings),
            key,
        }
    }
}

impl Default for Trackable {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Trackable {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl Drop for Trackable {
    fn drop(&mut self) {
        self.unbind_all();
    }
}

impl Receiver for Trackable {
    fn trackable(&self) -> &Trackable {
        self
    }
}

impl fmt::Debug for Trackable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trackable")
            .field("bindings", &self.count_bindings())
            .finish()
    }
}

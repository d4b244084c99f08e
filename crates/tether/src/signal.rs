#![forbid(unsafe_code)]

//! Signals: ordered subscription lists with teardown-safe dispatch.
//!
//! # Design
//!
//! A [`Signal<A>`] owns its tokens in a [`Slab`], linked into an
//! insertion-ordered doubly linked list. Each token is paired with a binding
//! in the target's [`Trackable`]; dropping either half releases the other.
//!
//! Every [`emit`](Signal::emit) pushes its own cursor frame. Removing a token
//! moves any frame parked on it to the successor and marks the frame as
//! already advanced, so a callback may disconnect itself, disconnect a
//! neighbour, drop its receiver or clear the whole signal without the
//! dispatch loop touching a removed node. Nested emits on the same signal
//! each keep an independent frame.
//!
//! A callback that needs to remove exactly the connection it was reached
//! through calls [`disconnect_current`](Signal::disconnect_current), which
//! severs the token under the innermost frame. A token appended at the tail
//! is picked up by a frame that already ran past the old tail.
//!
//! No `RefCell` borrow is held while a callback runs.
//!
//! # Failure Modes
//!
//! | Condition | Behavior |
//! |-----------|----------|
//! | Emit with no connections | Returns immediately |
//! | Disconnect of an absent subscription | No-op, reports `false` / `0` |
//! | Chain cycle, no `max_nesting` | Recurses until the stack overflows |
//! | Chain cycle, `max_nesting = n` | Innermost emit refused and logged |
//! | Receiver dropped mid-dispatch | Its tokens vanish; dispatch skips them |

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use slab::Slab;
use smallvec::SmallVec;
use tracing::{trace, trace_span, warn};

use crate::config::SignalConfig;
use crate::delegate::Delegate;
use crate::error::SignalError;
use crate::signal_ref::SignalRef;
use crate::token::{Payload, Token};
use crate::trackable::{BindingList, Receiver, TokenHost, TokenRef, Trackable};

/// Origin and skip count for positional disconnects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanFrom {
    /// Walk head to tail (call order), skipping the first `n` tokens.
    Head(usize),
    /// Walk tail to head (reverse call order), skipping the last `n` tokens.
    Tail(usize),
}

/// One in-flight dispatch.
#[derive(Debug, Clone, Copy)]
struct Frame {
    cursor: Option<usize>,
    advanced: bool,
}

pub(crate) struct SignalCore<A: 'static> {
    tokens: Slab<Token<A>>,
    head: Option<usize>,
    tail: Option<usize>,
    frames: SmallVec<[Frame; 2]>,
    config: SignalConfig,
}

impl<A: 'static> SignalCore<A> {
    fn new(config: SignalConfig) -> Self {
        Self {
            tokens: Slab::new(),
            head: None,
            tail: None,
            frames: SmallVec::new(),
            config,
        }
    }

    fn scan(&self, from: ScanFrom) -> impl Iterator<Item = usize> + '_ {
        let (start, skip, backward) = match from {
            ScanFrom::Head(skip) => (self.head, skip, false),
            ScanFrom::Tail(skip) => (self.tail, skip, true),
        };
        std::iter::successors(start, move |&key| {
            let token = &self.tokens[key];
            if backward { token.prev } else { token.next }
        })
        .skip(skip)
    }

    fn insert_between(
        &mut self,
        prev: Option<usize>,
        next: Option<usize>,
        mut token: Token<A>,
    ) -> usize {
        token.prev = prev;
        token.next = next;
        let key = self.tokens.insert(token);
        match prev {
            Some(prev) => self.tokens[prev].next = Some(key),
            None => self.head = Some(key),
        }
        match next {
            Some(next) => self.tokens[next].prev = Some(key),
            None => {
                self.tail = Some(key);
                // A frame that ran off the end after removing the old tail
                // picks up the new one.
                for frame in &mut self.frames {
                    if frame.advanced && frame.cursor.is_none() {
                        frame.cursor = Some(key);
                    }
                }
            }
        }
        key
    }

    /// Insert `token` at `index`: before the `index`-th token from the head
    /// when non-negative, after the `(-index - 1)`-th token from the tail
    /// when negative. Out-of-range indices clamp to the nearest end.
    fn link(&mut self, index: isize, token: Token<A>) -> usize {
        if index >= 0 {
            let at = self.scan(ScanFrom::Head(index.unsigned_abs())).next();
            match at {
                Some(at) => self.insert_between(self.tokens[at].prev, Some(at), token),
                None => self.insert_between(self.tail, None, token),
            }
        } else {
            let at = self.scan(ScanFrom::Tail(index.unsigned_abs() - 1)).next();
            match at {
                Some(at) => self.insert_between(Some(at), self.tokens[at].next, token),
                None => self.insert_between(None, self.head, token),
            }
        }
    }

    /// Unlink token `key`, moving any dispatch frame parked on it.
    fn detach(&mut self, key: usize) -> Option<Token<A>> {
        let token = self.tokens.try_remove(key)?;
        match token.prev {
            Some(prev) => self.tokens[prev].next = token.next,
            None => self.head = token.next,
        }
        match token.next {
            Some(next) => self.tokens[next].prev = token.prev,
            None => self.tail = token.prev,
        }
        for frame in &mut self.frames {
            if frame.cursor == Some(key) {
                frame.cursor = token.next;
                frame.advanced = true;
            }
        }
        Some(token)
    }

    fn detach_all(&mut self) -> Vec<(usize, Token<A>)> {
        let keys: Vec<usize> = self.scan(ScanFrom::Head(0)).collect();
        keys.into_iter()
            .filter_map(|key| self.detach(key).map(|token| (key, token)))
            .collect()
    }
}

impl<A: 'static> TokenHost for RefCell<SignalCore<A>> {
    fn release_token(&self, key: usize, list: *const RefCell<BindingList>, binding: usize) {
        let detached = {
            let mut core = self.borrow_mut();
            let paired = core
                .tokens
                .get(key)
                .and_then(|token| token.binding.as_ref())
                .is_some_and(|b| b.points_to(list, binding));
            if paired { core.detach(key) } else { None }
        };
        if detached.is_some() {
            trace!(
                label = self.borrow().config.display_label(),
                token = key,
                "receiver released token"
            );
        }
    }
}

/// Pops the dispatch frame when the loop exits, including on unwind.
struct FrameGuard<'a, A: 'static> {
    core: &'a RefCell<SignalCore<A>>,
}

impl<A: 'static> Drop for FrameGuard<'_, A> {
    fn drop(&mut self) {
        if let Ok(mut core) = self.core.try_borrow_mut() {
            core.frames.pop();
        }
    }
}

/// Fire every token of `core` in list order.
pub(crate) fn dispatch<A: 'static>(
    core: &Rc<RefCell<SignalCore<A>>>,
    args: &A,
) -> Result<(), SignalError> {
    // Keep the list alive even if the owning `Signal` is dropped by a callback.
    let core = Rc::clone(core);
    let depth = {
        let mut inner = core.borrow_mut();
        let active = inner.frames.len();
        if let Some(limit) = inner.config.max_nesting.filter(|&limit| active >= limit) {
            return Err(SignalError::NestingLimit {
                label: inner.config.label.clone(),
                limit,
            });
        }
        let cursor = inner.head;
        inner.frames.push(Frame {
            cursor,
            advanced: false,
        });
        inner.frames.len() - 1
    };
    let _guard = FrameGuard { core: &core };
    let _span = {
        let inner = core.borrow();
        trace_span!("signal_emit", label = inner.config.display_label(), depth).entered()
    };

    loop {
        let payload = {
            let inner = core.borrow();
            let Some(key) = inner.frames[depth].cursor else {
                break;
            };
            inner.tokens[key].payload.clone()
        };

        payload.invoke(args);

        let mut inner = core.borrow_mut();
        let SignalCore { tokens, frames, .. } = &mut *inner;
        let frame = &mut frames[depth];
        if frame.advanced {
            frame.advanced = false;
        } else {
            frame.cursor = frame
                .cursor
                .and_then(|key| tokens.get(key))
                .and_then(|token| token.next);
        }
    }
    Ok(())
}

/// A notifier with an ordered list of subscriptions.
///
/// `A` is the argument type handed to every subscriber by reference; use a
/// tuple for several values.
///
/// A `Signal` is itself a [`Receiver`]: other signals may chain into it with
/// [`connect_signal`](Self::connect_signal). Dropping a signal disconnects
/// everything it calls and everything that chains into it.
///
/// # Invariants
///
/// 1. Subscribers fire in list order; `connect` appends.
/// 2. A token removed during dispatch is never invoked afterwards, and its
///    successors are invoked exactly once.
/// 3. Each token is paired with exactly one binding in its target's
///    [`Trackable`], and vice versa.
pub struct Signal<A: 'static> {
    core: Rc<RefCell<SignalCore<A>>>,
    trackable: Trackable,
}

impl<A: 'static> Signal<A> {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(SignalConfig::default())
    }

    #[must_use]
    pub fn with_config(config: SignalConfig) -> Self {
        Self {
            core: Rc::new(RefCell::new(SignalCore::new(config))),
            trackable: Trackable::new(),
        }
    }

    #[must_use]
    pub fn config(&self) -> SignalConfig {
        self.core.borrow().config.clone()
    }

    /// Borrowed handle that can connect and disconnect but not emit.
    #[must_use]
    pub fn as_signal_ref(&self) -> SignalRef<'_, A> {
        SignalRef::new(self)
    }

    // -- connect --------------------------------------------------------------

    /// Call `method` on `object` whenever this signal fires. Appends.
    pub fn connect<T: Receiver + 'static>(&self, object: &Rc<T>, method: fn(&T, &A)) {
        self.connect_at(-1, object, method);
    }

    /// Like [`connect`](Self::connect), at a position.
    ///
    /// `index >= 0` inserts before the `index`-th subscription counted from
    /// the head; `index < 0` inserts after the `(-index - 1)`-th counted from
    /// the tail, so `-1` appends. Out-of-range indices clamp to the nearest end.
    pub fn connect_at<T: Receiver + 'static>(
        &self,
        index: isize,
        object: &Rc<T>,
        method: fn(&T, &A),
    ) {
        let delegate = Delegate::from_method(object, method);
        self.attach(index, Payload::Delegate(delegate), object.trackable());
    }

    /// Re-fire `other` with the same arguments whenever this signal fires.
    pub fn connect_signal(&self, other: &Signal<A>) {
        self.connect_signal_at(-1, other);
    }

    /// Like [`connect_signal`](Self::connect_signal), at a position (see
    /// [`connect_at`](Self::connect_at)).
    pub fn connect_signal_at(&self, index: isize, other: &Signal<A>) {
        let target = Rc::downgrade(&other.core);
        self.attach(index, Payload::Chain(target), &other.trackable);
    }

    fn attach(&self, index: isize, payload: Payload<A>, target: &Trackable) {
        let key = self.core.borrow_mut().link(index, Token::new(payload));
        let host: Weak<RefCell<SignalCore<A>>> = Rc::downgrade(&self.core);
        let binding = target.bind(TokenRef { host, key });
        let mut core = self.core.borrow_mut();
        core.tokens[key].binding = Some(binding);
        trace!(
            label = core.config.display_label(),
            token = key,
            index,
            "connected"
        );
    }

    // -- disconnect -----------------------------------------------------------

    /// Remove the most recently connected `method` on `object`.
    ///
    /// Returns whether a subscription was removed.
    pub fn disconnect_one<T: 'static>(&self, object: &T, method: fn(&T, &A)) -> bool {
        self.disconnect_from(object, method, ScanFrom::Tail(0), Some(1)) == 1
    }

    /// Remove every subscription of `method` on `object`.
    pub fn disconnect_all<T: 'static>(&self, object: &T, method: fn(&T, &A)) -> usize {
        self.disconnect_from(object, method, ScanFrom::Tail(0), None)
    }

    /// Remove up to `limit` subscriptions of `method` on `object`, scanning
    /// from `from`. `None` removes every match in range.
    pub fn disconnect_from<T: 'static>(
        &self,
        object: &T,
        method: fn(&T, &A),
        from: ScanFrom,
        limit: Option<usize>,
    ) -> usize {
        self.sever_matching(from, limit, |payload| {
            payload
                .delegate()
                .is_some_and(|delegate| delegate.matches(object, method))
        })
    }

    /// Remove the most recently connected chain into `other`.
    pub fn disconnect_signal_one(&self, other: &Signal<A>) -> bool {
        self.disconnect_signal_from(other, ScanFrom::Tail(0), Some(1)) == 1
    }

    /// Remove every chain into `other`.
    pub fn disconnect_signal_all(&self, other: &Signal<A>) -> usize {
        self.disconnect_signal_from(other, ScanFrom::Tail(0), None)
    }

    /// Remove up to `limit` chains into `other`, scanning from `from`.
    pub fn disconnect_signal_from(
        &self,
        other: &Signal<A>,
        from: ScanFrom,
        limit: Option<usize>,
    ) -> usize {
        let target = Rc::as_ptr(&other.core);
        self.sever_matching(from, limit, |payload| payload.chains_to(target))
    }

    /// Remove every subscription. Calling it again is a no-op.
    pub fn clear(&self) {
        let host = self.host_ptr();
        let detached = self.core.borrow_mut().detach_all();
        if detached.is_empty() {
            return;
        }
        trace!(
            label = self.core.borrow().config.display_label(),
            count = detached.len(),
            "cleared"
        );
        for (key, token) in detached {
            if let Some(binding) = token.binding {
                binding.release(host, key);
            }
        }
    }

    fn sever_matching(
        &self,
        from: ScanFrom,
        limit: Option<usize>,
        matches: impl Fn(&Payload<A>) -> bool,
    ) -> usize {
        let victims: Vec<usize> = {
            let core = self.core.borrow();
            core.scan(from)
                .filter(|&key| matches(&core.tokens[key].payload))
                .take(limit.unwrap_or(usize::MAX))
                .collect()
        };
        for &key in &victims {
            self.sever(key);
        }
        victims.len()
    }

    /// Remove the subscription this signal is calling right now.
    ///
    /// Meant for callbacks: when the same method is connected more than once,
    /// only the firing connection goes, whatever its position. With nested
    /// emits the innermost dispatch wins. Returns `false` outside a dispatch
    /// or when the firing connection is already gone.
    pub fn disconnect_current(&self) -> bool {
        let current = self
            .core
            .borrow()
            .frames
            .last()
            .filter(|frame| !frame.advanced)
            .and_then(|frame| frame.cursor);
        current.is_some_and(|key| self.sever(key))
    }

    fn sever(&self, key: usize) -> bool {
        let detached = self.core.borrow_mut().detach(key);
        let Some(token) = detached else {
            return false;
        };
        trace!(
            label = self.core.borrow().config.display_label(),
            token = key,
            "disconnected"
        );
        if let Some(binding) = token.binding {
            binding.release(self.host_ptr(), key);
        }
        true
    }

    fn host_ptr(&self) -> *const () {
        Rc::as_ptr(&self.core).cast()
    }

    // -- emit -----------------------------------------------------------------

    /// Fire every subscription in order with `args`.
    ///
    /// A refusal from the nesting limit is logged and otherwise ignored; use
    /// [`try_emit`](Self::try_emit) to observe it.
    pub fn emit(&self, args: &A) {
        if let Err(err) = self.try_emit(args) {
            warn!(%err, "emit refused");
        }
    }

    /// Fire every subscription in order with `args`.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::NestingLimit`] when the configured
    /// `max_nesting` dispatches are already running on this signal.
    pub fn try_emit(&self, args: &A) -> Result<(), SignalError> {
        dispatch(&self.core, args)
    }

    /// Whether a dispatch is currently running on this signal.
    #[must_use]
    pub fn is_emitting(&self) -> bool {
        !self.core.borrow().frames.is_empty()
    }

    // -- queries --------------------------------------------------------------

    #[must_use]
    pub fn count_connections(&self) -> usize {
        self.core.borrow().tokens.len()
    }

    #[must_use]
    pub fn count_connections_to<T: 'static>(&self, object: &T, method: fn(&T, &A)) -> usize {
        self.count_where(|payload| {
            payload
                .delegate()
                .is_some_and(|delegate| delegate.matches(object, method))
        })
    }

    #[must_use]
    pub fn count_connections_to_signal(&self, other: &Signal<A>) -> usize {
        let target = Rc::as_ptr(&other.core);
        self.count_where(|payload| payload.chains_to(target))
    }

    #[must_use]
    pub fn is_connected_to<T: 'static>(&self, object: &T, method: fn(&T, &A)) -> bool {
        self.count_connections_to(object, method) > 0
    }

    #[must_use]
    pub fn is_connected_to_signal(&self, other: &Signal<A>) -> bool {
        self.count_connections_to_signal(other) > 0
    }

    /// Whether any subscription targets `object`, by method or by chain.
    #[must_use]
    pub fn is_connected_to_receiver<R: Receiver + ?Sized>(&self, object: &R) -> bool {
        let trackable = object.trackable();
        self.core.borrow().tokens.iter().any(|(_, token)| {
            token
                .binding
                .as_ref()
                .is_some_and(|binding| binding.lives_in(trackable))
        })
    }

    fn count_where(&self, pred: impl Fn(&Payload<A>) -> bool) -> usize {
        self.core
            .borrow()
            .tokens
            .iter()
            .filter(|(_, token)| pred(&token.payload))
            .count()
    }
}

impl<A: 'static> Default for Signal<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: 'static> Drop for Signal<A> {
    fn drop(&mut self) {
        self.clear();
    }
}

impl<A: 'static> Receiver for Signal<A> {
    fn trackable(&self) -> &Trackable {
        &self.trackable
    }
}

impl<A: 'static> fmt::Debug for Signal<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.core.borrow();
        f.debug_struct("Signal")
            .field("label", &core.config.label)
            .field("connections", &core.tokens.len())
            .field("bindings", &self.trackable.count_bindings())
            .field("emitting", &!core.frames.is_empty())
            .finish()
    }
}

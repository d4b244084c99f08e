#![forbid(unsafe_code)]

//! Subscription-only view of a signal.

use std::fmt;
use std::rc::Rc;

use crate::signal::{ScanFrom, Signal};
use crate::trackable::Receiver;

/// A borrowed handle on a [`Signal`] that can manage subscriptions but cannot
/// fire it.
///
/// An owner typically keeps its `Signal` private and hands out a `SignalRef`
/// so other objects may subscribe without being able to emit.
pub struct SignalRef<'a, A: 'static> {
    signal: &'a Signal<A>,
}

impl<'a, A: 'static> SignalRef<'a, A> {
    #[must_use]
    pub fn new(signal: &'a Signal<A>) -> Self {
        Self { signal }
    }

    pub fn connect<T: Receiver + 'static>(&self, object: &Rc<T>, method: fn(&T, &A)) {
        self.signal.connect(object, method);
    }

    pub fn connect_at<T: Receiver + 'static>(
        &self,
        index: isize,
        object: &Rc<T>,
        method: fn(&T, &A),
    ) {
        self.signal.connect_at(index, object, method);
    }

    pub fn connect_signal(&self, other: &Signal<A>) {
        self.signal.connect_signal(other);
    }

    pub fn connect_signal_at(&self, index: isize, other: &Signal<A>) {
        self.signal.connect_signal_at(index, other);
    }

    pub fn disconnect_one<T: 'static>(&self, object: &T, method: fn(&T, &A)) -> bool {
        self.signal.disconnect_one(object, method)
    }

    pub fn disconnect_all<T: 'static>(&self, object: &T, method: fn(&T, &A)) -> usize {
        self.signal.disconnect_all(object, method)
    }

    pub fn disconnect_from<T: 'static>(
        &self,
        object: &T,
        method: fn(&T, &A),
        from: ScanFrom,
        limit: Option<usize>,
    ) -> usize {
        self.signal.disconnect_from(object, method, from, limit)
    }

    pub fn disconnect_signal_one(&self, other: &Signal<A>) -> bool {
        self.signal.disconnect_signal_one(other)
    }

    pub fn disconnect_signal_all(&self, other: &Signal<A>) -> usize {
        self.signal.disconnect_signal_all(other)
    }

    pub fn disconnect_signal_from(
        &self,
        other: &Signal<A>,
        from: ScanFrom,
        limit: Option<usize>,
    ) -> usize {
        self.signal.disconnect_signal_from(other, from, limit)
    }

    /// See [`Signal::disconnect_current`].
    pub fn disconnect_current(&self) -> bool {
        self.signal.disconnect_current()
    }

    pub fn clear(&self) {
        self.signal.clear();
    }

    #[must_use]
    pub fn is_connected_to<T: 'static>(&self, object: &T, method: fn(&T, &A)) -> bool {
        self.signal.is_connected_to(object, method)
    }

    #[must_use]
    pub fn is_connected_to_signal(&self, other: &Signal<A>) -> bool {
        self.signal.is_connected_to_signal(other)
    }

    #[must_use]
    pub fn is_connected_to_receiver<R: Receiver + ?Sized>(&self, object: &R) -> bool {
        self.signal.is_connected_to_receiver(object)
    }

    #[must_use]
    pub fn count_connections(&self) -> usize {
        self.signal.count_connections()
    }

    #[must_use]
    pub fn count_connections_to<T: 'static>(&self, object: &T, method: fn(&T, &A)) -> usize {
        self.signal.count_connections_to(object, method)
    }

    #[must_use]
    pub fn count_connections_to_signal(&self, other: &Signal<A>) -> usize {
        self.signal.count_connections_to_signal(other)
    }

    /// Number of signals chaining into the referenced signal.
    #[must_use]
    pub fn count_bindings(&self) -> usize {
        self.signal.trackable().count_bindings()
    }
}

// Manual impls: `A` need not be `Clone` for the reference to be copied.
impl<A: 'static> Clone for SignalRef<'_, A> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<A: 'static> Copy for SignalRef<'_, A> {}

impl<A: 'static> fmt::Debug for SignalRef<'_, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SignalRef").field(self.signal).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Trackable;
    use std::cell::Cell;

    struct Listener {
        trackable: Trackable,
        hits: Cell<u32>,
    }

    impl Receiver for Listener {
        fn trackable(&self) -> &Trackable {
            &self.trackable
        }
    }

    impl Listener {
        fn on_event(&self, _: &u8) {
            self.hits.set(self.hits.get() + 1);
        }
    }

    /// Owner exposing only a subscription handle.
    struct Button {
        clicked: Signal<u8>,
    }

    impl Button {
        fn clicked(&self) -> SignalRef<'_, u8> {
            self.clicked.as_signal_ref()
        }

        fn press(&self) {
            self.clicked.emit(&1);
        }
    }

    #[test]
    fn subscribe_through_ref() {
        let button = Button {
            clicked: Signal::new(),
        };
        let listener = Rc::new(Listener {
            trackable: Trackable::new(),
            hits: Cell::new(0),
        });

        let handle = button.clicked();
        handle.connect(&listener, Listener::on_event);
        assert_eq!(handle.count_connections(), 1);
        assert!(handle.is_connected_to(&*listener, Listener::on_event));
        assert!(handle.is_connected_to_receiver(&*listener));

        button.press();
        assert_eq!(listener.hits.get(), 1);

        assert!(handle.disconnect_one(&*listener, Listener::on_event));
        button.press();
        assert_eq!(listener.hits.get(), 1);
    }

    #[test]
    fn ref_is_copy() {
        let signal: Signal<u8> = Signal::new();
        let a = signal.as_signal_ref();
        let b = a;
        assert_eq!(a.count_connections(), b.count_connections());
    }

    #[test]
    fn chain_through_ref_counts_bindings() {
        let upstream: Signal<u8> = Signal::new();
        let downstream: Signal<u8> = Signal::new();
        upstream.as_signal_ref().connect_signal(&downstream);
        assert_eq!(downstream.as_signal_ref().count_bindings(), 1);
        assert!(upstream.as_signal_ref().is_connected_to_signal(&downstream));
        assert_eq!(upstream.as_signal_ref().disconnect_signal_all(&downstream), 1);
        assert_eq!(downstream.as_signal_ref().count_bindings(), 0);
    }

    #[test]
    fn positional_chain_disconnect_through_ref() {
        let upstream: Signal<u8> = Signal::new();
        let downstream: Signal<u8> = Signal::new();
        let handle = upstream.as_signal_ref();
        handle.connect_signal(&downstream);
        handle.connect_signal(&downstream);
        handle.connect_signal(&downstream);
        assert_eq!(handle.count_connections_to_signal(&downstream), 3);

        // Keep the head chain, drop the next one.
        assert_eq!(
            handle.disconnect_signal_from(&downstream, ScanFrom::Head(1), Some(1)),
            1
        );
        assert_eq!(handle.count_connections_to_signal(&downstream), 2);
        assert_eq!(downstream.trackable().count_bindings(), 2);
        assert!(!handle.disconnect_current());
    }
}

#![forbid(unsafe_code)]

//! Method delegates: "call `method` on `object`" as a comparable value.
//!
//! A [`Delegate<A>`] captures a weak handle on a receiver object and a plain
//! function pointer `fn(&T, &A)`. It never keeps the object alive. Invoking a
//! delegate whose object is already gone (strong count reached zero) does
//! nothing and reports `false`.
//!
//! Identity is the pair (object address, method address). Two delegates built
//! from the same `Rc` and the same method compare equal.

use std::any::Any;
use std::fmt;
use std::rc::{Rc, Weak};

/// Type-erased call target behind a [`Delegate`].
trait Thunk<A> {
    fn call(&self, args: &A) -> bool;
    fn object_addr(&self) -> *const ();
    fn method_addr(&self) -> usize;
    fn as_any(&self) -> &dyn Any;
}

struct MethodThunk<T, A> {
    object: Weak<T>,
    method: fn(&T, &A),
}

impl<T: 'static, A: 'static> Thunk<A> for MethodThunk<T, A> {
    fn call(&self, args: &A) -> bool {
        match self.object.upgrade() {
            Some(object) => {
                (self.method)(&object, args);
                true
            }
            None => false,
        }
    }

    fn object_addr(&self) -> *const () {
        self.object.as_ptr().cast()
    }

    fn method_addr(&self) -> usize {
        self.method as usize
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// An invocable, identity-comparable "method on an object" value.
///
/// Cloning is cheap and yields a delegate with the same identity.
pub struct Delegate<A: 'static> {
    thunk: Rc<dyn Thunk<A>>,
}

impl<A: 'static> Delegate<A> {
    /// Build a delegate that calls `method` on `object`.
    ///
    /// Only a weak handle on `object` is retained.
    #[must_use]
    pub fn from_method<T: 'static>(object: &Rc<T>, method: fn(&T, &A)) -> Self {
        Self {
            thunk: Rc::new(MethodThunk {
                object: Rc::downgrade(object),
                method,
            }),
        }
    }

    /// Call the method with `args`.
    ///
    /// Returns `false` without calling anything when the object has already
    /// been dropped.
    pub fn invoke(&self, args: &A) -> bool {
        self.thunk.call(args)
    }

    /// Whether this delegate targets exactly `method` on `object`.
    #[must_use]
    pub fn matches<T: 'static>(&self, object: &T, method: fn(&T, &A)) -> bool {
        self.thunk
            .as_any()
            .downcast_ref::<MethodThunk<T, A>>()
            .is_some_and(|thunk| {
                std::ptr::eq(thunk.object.as_ptr(), object)
                    && thunk.method as usize == method as usize
            })
    }

    /// Whether this delegate targets `object`, whatever the method.
    #[must_use]
    pub fn targets<T>(&self, object: &T) -> bool {
        std::ptr::addr_eq(self.thunk.object_addr(), object as *const T)
    }

    /// Address of the target object, for identity comparisons.
    #[must_use]
    pub fn object_addr(&self) -> *const () {
        self.thunk.object_addr()
    }
}

impl<A: 'static> Clone for Delegate<A> {
    fn clone(&self) -> Self {
        Self {
            thunk: Rc::clone(&self.thunk),
        }
    }
}

impl<A: 'static> PartialEq for Delegate<A> {
    fn eq(&self, other: &Self) -> bool {
        self.thunk.object_addr() == other.thunk.object_addr()
            && self.thunk.method_addr() == other.thunk.method_addr()
    }
}

impl<A: 'static> Eq for Delegate<A> {}

impl<A: 'static> fmt::Debug for Delegate<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delegate")
            .field("object", &self.thunk.object_addr())
            .field("method", &format_args!("{:#x}", self.thunk.method_addr()))
            .finish()
    }
}

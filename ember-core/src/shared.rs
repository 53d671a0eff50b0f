// Copyright (c) 2024-present Ember Engine contributors.
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

//! Thread-safe shared ownership wrapper used by every engine-visible object
//! that has to live in more than one place at once: textures, shaders, meshes,
//! sound buffers, stages. It is a thin newtype over `Arc<Mutex<T>>` with weak
//! counterparts and an optional debug label that survives in panic messages
//! and logs.

use crate::parking_lot::{Mutex, MutexGuard};
use std::{
    fmt::{Debug, Formatter},
    sync::{Arc, Weak},
};

struct State<T> {
    label: Option<String>,
    data: Mutex<T>,
}

/// Strong shared reference. Dropping the last strong reference destroys the
/// payload; weak references observe the invalidation.
pub struct Shared<T>(Arc<State<T>>);

/// Weak counterpart of [`Shared`]. Does not keep the payload alive.
pub struct WeakShared<T>(Weak<State<T>>);

impl<T> Shared<T> {
    #[inline]
    pub fn new(data: T) -> Self {
        Self(Arc::new(State {
            label: None,
            data: Mutex::new(data),
        }))
    }

    /// Creates a shared value carrying a debug label. The label shows up in
    /// `Debug` output which makes leak hunting much easier.
    #[inline]
    pub fn with_label<S: Into<String>>(data: T, label: S) -> Self {
        Self(Arc::new(State {
            label: Some(label.into()),
            data: Mutex::new(data),
        }))
    }

    #[inline]
    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.0.data.lock()
    }

    #[inline]
    pub fn downgrade(&self) -> WeakShared<T> {
        WeakShared(Arc::downgrade(&self.0))
    }

    #[inline]
    pub fn label(&self) -> Option<&str> {
        self.0.label.as_deref()
    }

    /// Amount of strong references to the payload.
    #[inline]
    pub fn use_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }

    /// Returns true if both handles point to the same payload.
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Stable identity of the payload for the lifetime of the value.
    #[inline]
    pub fn key(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }
}

impl<T> WeakShared<T> {
    /// Attempts to restore a strong reference. Returns `None` if the payload
    /// has already been destroyed.
    #[inline]
    pub fn upgrade(&self) -> Option<Shared<T>> {
        self.0.upgrade().map(Shared)
    }

    #[inline]
    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

impl<T> Clone for Shared<T> {
    #[inline]
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Clone for WeakShared<T> {
    #[inline]
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Default for WeakShared<T> {
    #[inline]
    fn default() -> Self {
        Self(Weak::new())
    }
}

impl<T> Debug for Shared<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Shared({}, uses: {})",
            self.0.label.as_deref().unwrap_or("?"),
            Arc::strong_count(&self.0)
        )
    }
}

impl<T> Debug for WeakShared<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "WeakShared(alive: {})", self.is_alive())
    }
}

impl<T> PartialEq for Shared<T> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl<T> Eq for Shared<T> {}

impl<T> std::hash::Hash for Shared<T> {
    #[inline]
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.key().hash(state)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn weak_observes_destruction() {
        let strong = Shared::new(123u32);
        let weak = strong.downgrade();
        assert!(weak.is_alive());
        assert_eq!(weak.upgrade().map(|s| *s.lock()), Some(123));
        drop(strong);
        assert!(!weak.is_alive());
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn clone_shares_payload() {
        let a = Shared::with_label(0u32, "counter");
        let b = a.clone();
        *b.lock() = 7;
        assert_eq!(*a.lock(), 7);
        assert_eq!(a.use_count(), 2);
        assert!(a.ptr_eq(&b));
        assert_eq!(a.label(), Some("counter"));
    }
}

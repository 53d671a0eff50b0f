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

//! A generational arena - a contiguous growable array type which allows removing
//! from the middle without shifting and therefore without invalidating other indices.
//!
//! Pool is a contiguous block of memory with fixed-size entries, each entry can be
//! either vacant or occupied. When you put an object into the pool you get a handle to
//! that object. You can use that handle later on to borrow a reference to an object.
//! A handle can point to some object or be invalid, this may look similar to raw
//! pointers, but there is two major differences:
//!
//! 1) We can check if a handle is valid before accessing the object it might point to.
//! 2) We can ensure the handle we're using is still valid for the object it points to
//!    to make sure it hasn't been replaced with a different object on the same position.
//!
//! Each handle stores a special field called generation which is shared across the entry
//! and the handle, so the handle is valid if these fields are the same on both the entry
//! and the handle. This protects from situations where you have a handle that has
//! a valid index of a record, but the payload in this record has been replaced.

use std::{
    fmt::Debug,
    ops::{Index, IndexMut},
};

pub mod handle;

pub use handle::*;

const INVALID_GENERATION: u32 = 0;

/// Pool allows to create as many objects as you want in contiguous memory
/// block. It allows to create and delete objects much faster than if they'll
/// be allocated on heap. Also since objects stored in contiguous memory block
/// they can be effectively accessed because such memory layout is cache-friendly.
#[derive(Debug)]
pub struct Pool<T> {
    records: Vec<PoolRecord<T>>,
    free_stack: Vec<u32>,
}

#[derive(Debug)]
struct PoolRecord<T> {
    // Generation number, used to keep info about lifetime. The handle is valid
    // only if record it points to is of the same generation as the pool record.
    // Notes: Zero is unknown generation used for None handles.
    generation: u32,
    payload: Option<T>,
}

impl<T> Default for PoolRecord<T> {
    #[inline]
    fn default() -> Self {
        Self {
            generation: INVALID_GENERATION,
            payload: None,
        }
    }
}

impl<T> Default for Pool<T> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Clone for PoolRecord<T> {
    #[inline]
    fn clone(&self) -> Self {
        Self {
            generation: self.generation,
            payload: self.payload.clone(),
        }
    }
}

impl<T: Clone> Clone for Pool<T> {
    #[inline]
    fn clone(&self) -> Self {
        Self {
            records: self.records.clone(),
            free_stack: self.free_stack.clone(),
        }
    }
}

impl<T> Pool<T> {
    #[inline]
    pub fn new() -> Self {
        Pool {
            records: Vec::new(),
            free_stack: Vec::new(),
        }
    }

    #[inline]
    pub fn with_capacity(capacity: u32) -> Self {
        Pool {
            records: Vec::with_capacity(capacity as usize),
            free_stack: Vec::new(),
        }
    }

    fn records_len(&self) -> u32 {
        u32::try_from(self.records.len()).expect("Number of records overflowed u32")
    }

    /// Moves an object into the pool and returns a handle to it.
    #[inline]
    #[must_use]
    pub fn spawn(&mut self, payload: T) -> Handle<T> {
        if let Some(free_index) = self.free_stack.pop() {
            let record = &mut self.records[free_index as usize];
            debug_assert!(record.payload.is_none());
            // Move to the next generation, so any dangling handle becomes invalid.
            record.generation += 1;
            record.payload = Some(payload);
            Handle::new(free_index, record.generation)
        } else {
            let index = self.records_len();
            self.records.push(PoolRecord {
                generation: 1,
                payload: Some(payload),
            });
            Handle::new(index, 1)
        }
    }

    /// Destroys the object the handle points to and returns its payload.
    /// Returns `None` if the handle is invalid or stale.
    #[inline]
    pub fn free(&mut self, handle: Handle<T>) -> Option<T> {
        let record = self.records.get_mut(handle.index as usize)?;
        if record.generation != handle.generation {
            return None;
        }
        let payload = record.payload.take()?;
        self.free_stack.push(handle.index);
        Some(payload)
    }

    /// Returns true if the handle points to a live object.
    #[inline]
    pub fn is_valid_handle(&self, handle: Handle<T>) -> bool {
        self.records
            .get(handle.index as usize)
            .is_some_and(|r| r.generation == handle.generation && r.payload.is_some())
    }

    #[inline]
    pub fn try_borrow(&self, handle: Handle<T>) -> Option<&T> {
        self.records
            .get(handle.index as usize)
            .filter(|r| r.generation == handle.generation)
            .and_then(|r| r.payload.as_ref())
    }

    #[inline]
    pub fn try_borrow_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
        self.records
            .get_mut(handle.index as usize)
            .filter(|r| r.generation == handle.generation)
            .and_then(|r| r.payload.as_mut())
    }

    /// Borrows two objects mutably at once.
    ///
    /// # Panics
    ///
    /// Panics if the handles overlap or either of them is invalid.
    #[inline]
    pub fn borrow_two_mut(&mut self, handles: (Handle<T>, Handle<T>)) -> (&mut T, &mut T) {
        assert_ne!(handles.0.index, handles.1.index);
        let (a, b) = if handles.0.index < handles.1.index {
            let (left, right) = self.records.split_at_mut(handles.1.index as usize);
            (&mut left[handles.0.index as usize], &mut right[0])
        } else {
            let (left, right) = self.records.split_at_mut(handles.0.index as usize);
            (&mut right[0], &mut left[handles.1.index as usize])
        };
        assert_eq!(a.generation, handles.0.generation);
        assert_eq!(b.generation, handles.1.generation);
        (
            a.payload.as_mut().expect("attempt to borrow destroyed object"),
            b.payload.as_mut().expect("attempt to borrow destroyed object"),
        )
    }

    /// Returns a handle to the object at the given record index, or
    /// `Handle::NONE` if the record is vacant.
    #[inline]
    pub fn handle_of_index(&self, index: u32) -> Handle<T> {
        match self.records.get(index as usize) {
            Some(record) if record.payload.is_some() => Handle::new(index, record.generation),
            _ => Handle::NONE,
        }
    }

    /// Amount of live objects in the pool.
    #[inline]
    pub fn alive_count(&self) -> u32 {
        self.records_len() - u32::try_from(self.free_stack.len()).unwrap_or_default()
    }

    /// Total amount of records, vacant ones included.
    #[inline]
    pub fn capacity(&self) -> u32 {
        self.records_len()
    }

    #[inline]
    pub fn clear(&mut self) {
        self.records.clear();
        self.free_stack.clear();
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.records.iter().filter_map(|r| r.payload.as_ref())
    }

    #[inline]
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.records.iter_mut().filter_map(|r| r.payload.as_mut())
    }

    /// Iterates over live objects together with their handles.
    #[inline]
    pub fn pair_iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> {
        self.records.iter().enumerate().filter_map(|(i, r)| {
            r.payload
                .as_ref()
                .map(|p| (Handle::new(i as u32, r.generation), p))
        })
    }

    #[inline]
    pub fn pair_iter_mut(&mut self) -> impl Iterator<Item = (Handle<T>, &mut T)> {
        self.records.iter_mut().enumerate().filter_map(|(i, r)| {
            let generation = r.generation;
            r.payload
                .as_mut()
                .map(move |p| (Handle::new(i as u32, generation), p))
        })
    }

    /// Collects handles of every live object. Useful to iterate the pool while
    /// mutating it.
    #[inline]
    pub fn alive_handles(&self) -> Vec<Handle<T>> {
        self.pair_iter().map(|(h, _)| h).collect()
    }
}

impl<T> Index<Handle<T>> for Pool<T> {
    type Output = T;

    #[inline]
    fn index(&self, index: Handle<T>) -> &Self::Output {
        self.try_borrow(index)
            .expect("attempt to borrow destroyed or stale object")
    }
}

impl<T> IndexMut<Handle<T>> for Pool<T> {
    #[inline]
    fn index_mut(&mut self, index: Handle<T>) -> &mut Self::Output {
        self.try_borrow_mut(index)
            .expect("attempt to borrow destroyed or stale object")
    }
}

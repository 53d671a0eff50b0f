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

//! Core data structures and utilities shared by every crate of the engine.
//!
//! The crate is intentionally small: a generational pool with typed handles,
//! a thread-safe shared-ownership wrapper with weak references, interned
//! strings, colours and the engine-wide logger. Everything else builds on
//! top of these primitives.

pub use lazy_static;
pub use nalgebra as algebra;
pub use parking_lot;
pub use uuid;

pub use ember_math as math;

pub mod color;
pub mod log;
pub mod pool;
pub mod shared;
pub mod sstorage;

/// Error that may occur during "type-erasure" conversions of handles and
/// similar identity values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidIdError(pub String);

impl std::fmt::Display for InvalidIdError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid id: {}", self.0)
    }
}

impl std::error::Error for InvalidIdError {}

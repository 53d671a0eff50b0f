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

//! Signals: tagged messages with a typed argument bag.
//!
//! A node dispatches on the interned tag name; unknown tags are simply
//! ignored by the receiver.

use crate::scene::node::Node;
use crate::core::{pool::Handle, sstorage::ImmutableString};
use fxhash::FxHashMap;

/// One argument value of a signal.
#[derive(Clone, Debug, PartialEq)]
pub enum SignalValue {
    Int(i64),
    Float(f32),
    Str(String),
    Blob(Vec<u8>),
    Node(Handle<Node>),
}

impl From<i64> for SignalValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for SignalValue {
    fn from(v: i32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<f32> for SignalValue {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for SignalValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_owned())
    }
}

impl From<String> for SignalValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<Vec<u8>> for SignalValue {
    fn from(v: Vec<u8>) -> Self {
        Self::Blob(v)
    }
}

impl From<Handle<Node>> for SignalValue {
    fn from(v: Handle<Node>) -> Self {
        Self::Node(v)
    }
}

/// A tagged message. Cheap to clone: the tag is interned and argument maps
/// are small.
#[derive(Clone, Debug, Default)]
pub struct Signal {
    tag: ImmutableString,
    args: FxHashMap<ImmutableString, SignalValue>,
}

impl Signal {
    pub fn new<S: AsRef<str>>(tag: S) -> Self {
        Self {
            tag: ImmutableString::new(tag),
            args: Default::default(),
        }
    }

    #[inline]
    pub fn tag(&self) -> &ImmutableString {
        &self.tag
    }

    #[inline]
    pub fn is<S: AsRef<str>>(&self, tag: S) -> bool {
        self.tag == ImmutableString::new(tag)
    }

    /// Builder-style argument insertion.
    pub fn with_arg<S: AsRef<str>, V: Into<SignalValue>>(mut self, name: S, value: V) -> Self {
        self.set_arg(name, value);
        self
    }

    pub fn set_arg<S: AsRef<str>, V: Into<SignalValue>>(&mut self, name: S, value: V) {
        self.args.insert(ImmutableString::new(name), value.into());
    }

    pub fn arg<S: AsRef<str>>(&self, name: S) -> Option<&SignalValue> {
        self.args.get(&ImmutableString::new(name))
    }

    pub fn int_arg<S: AsRef<str>>(&self, name: S) -> Option<i64> {
        match self.arg(name) {
            Some(SignalValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn float_arg<S: AsRef<str>>(&self, name: S) -> Option<f32> {
        match self.arg(name) {
            Some(SignalValue::Float(v)) => Some(*v),
            Some(SignalValue::Int(v)) => Some(*v as f32),
            _ => None,
        }
    }

    pub fn str_arg<S: AsRef<str>>(&self, name: S) -> Option<&str> {
        match self.arg(name) {
            Some(SignalValue::Str(v)) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn blob_arg<S: AsRef<str>>(&self, name: S) -> Option<&[u8]> {
        match self.arg(name) {
            Some(SignalValue::Blob(v)) => Some(v.as_slice()),
            _ => None,
        }
    }

    pub fn node_arg<S: AsRef<str>>(&self, name: S) -> Option<Handle<Node>> {
        match self.arg(name) {
            Some(SignalValue::Node(v)) => Some(*v),
            _ => None,
        }
    }
}

/// A signal waiting in the delay queue of the graph.
pub(crate) struct DelayedSignal {
    pub target: Handle<Node>,
    pub signal: Signal,
    pub frames_left: u32,
}

/// A signal sent to a node that was not yet attached to the tree.
pub(crate) struct PendingSignal {
    pub target: Handle<Node>,
    pub signal: Signal,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn typed_args() {
        let sig = Signal::new("hit")
            .with_arg("damage", 12i64)
            .with_arg("knockback", 1.5f32)
            .with_arg("source", "spike")
            .with_arg("payload", vec![1u8, 2, 3]);
        assert!(sig.is("hit"));
        assert_eq!(sig.int_arg("damage"), Some(12));
        assert_eq!(sig.float_arg("knockback"), Some(1.5));
        assert_eq!(sig.str_arg("source"), Some("spike"));
        assert_eq!(sig.blob_arg("payload"), Some(&[1u8, 2, 3][..]));
        // Unknown arg names and type mismatches yield None.
        assert!(sig.arg("missing").is_none());
        assert_eq!(sig.int_arg("source"), None);
    }

    #[test]
    fn int_promotes_to_float() {
        let sig = Signal::new("x").with_arg("v", 3i64);
        assert_eq!(sig.float_arg("v"), Some(3.0));
    }
}

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

//! Engine initialisation errors.

use crate::sound::SoundError;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum EngineError {
    /// The host passed an unusable configuration.
    InvalidParams(String),
    /// The graphics device rejected a required resource.
    Device(String),
    /// Sound subsystem failure.
    Sound(SoundError),
}

impl Display for EngineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::InvalidParams(reason) => write!(f, "invalid init params: {reason}"),
            EngineError::Device(reason) => write!(f, "device error: {reason}"),
            EngineError::Sound(err) => write!(f, "sound error: {err}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<SoundError> for EngineError {
    fn from(err: SoundError) -> Self {
        EngineError::Sound(err)
    }
}

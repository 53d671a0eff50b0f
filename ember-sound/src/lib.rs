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

//! Sound scheduler of the engine.
//!
//! Playback state lives in one table guarded by a single mutex. A background
//! worker thread keeps streaming buffers refilled ahead of their read
//! cursors; everything else - fades, group mixing, parameter changes -
//! happens on the main thread once per frame.

pub mod buffer;
pub mod decoder;
pub mod engine;

pub use buffer::{SoundBuffer, StreamingInstance};
pub use decoder::Decoder;
pub use engine::{FadeTarget, Group, SoundScheduler};

use std::fmt::{Display, Formatter};

/// Identifier of a playing (or paused) sound. Never reused within a run.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SoundId(pub(crate) u64);

impl SoundId {
    /// The null id returned by failed play calls. Operations on it are no-ops.
    pub const NONE: SoundId = SoundId(0);

    #[inline]
    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn is_some(self) -> bool {
        self.0 != 0
    }
}

impl Display for SoundId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "snd#{}", self.0)
    }
}

/// Errors of sound data decoding.
#[derive(Debug)]
pub enum SoundError {
    /// The byte blob is not a supported container (WAV or OGG Vorbis).
    UnsupportedFormat,
    /// Container parsing failed.
    InvalidData(String),
    /// Only 8-bit and 16-bit integer PCM WAV files are supported.
    UnsupportedSampleFormat,
}

impl Display for SoundError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SoundError::UnsupportedFormat => write!(f, "unsupported sound container"),
            SoundError::InvalidData(reason) => write!(f, "malformed sound data: {reason}"),
            SoundError::UnsupportedSampleFormat => {
                write!(f, "unsupported sample format, expected 8/16-bit integer PCM")
            }
        }
    }
}

impl std::error::Error for SoundError {}

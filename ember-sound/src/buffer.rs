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

//! Playback buffers. A [`SoundBuffer`] is a fully decoded blob shared between
//! every playback of the same pool entry; a [`StreamingInstance`] owns its
//! decoder and refills a bounded read-ahead queue on the worker thread.

use crate::{decoder::Decoder, SoundError};
use std::collections::VecDeque;

/// Fully decoded, immutable sample data. Playbacks of the same pool entry
/// share one buffer but keep independent cursors.
pub struct SoundBuffer {
    samples: Vec<i16>,
    channels: u16,
    sample_rate: u32,
}

impl SoundBuffer {
    /// Decodes the whole container up front.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, SoundError> {
        let mut decoder = Decoder::new(bytes)?;
        let samples = decoder.read_to_end();
        Ok(Self {
            channels: decoder.channel_count(),
            sample_rate: decoder.sample_rate(),
            samples,
        })
    }

    #[inline]
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    #[inline]
    pub fn channel_count(&self) -> u16 {
        self.channels
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[inline]
    pub fn total_items(&self) -> u64 {
        self.samples.len() as u64
    }

    #[inline]
    pub fn duration_seconds(&self) -> f32 {
        if self.sample_rate == 0 || self.channels == 0 {
            0.0
        } else {
            self.samples.len() as f32 / (self.sample_rate as f32 * self.channels as f32)
        }
    }
}

/// Streaming playback object. The worker thread keeps `queue` filled at least
/// `buffer_items` ahead of the consumer; the consumer drains it once per
/// frame. Underruns produce silence for that frame, never a stall.
pub struct StreamingInstance {
    decoder: Decoder,
    queue: VecDeque<i16>,
    looping: bool,
    loop_start_items: u64,
    loop_end_items: u64,
    buffer_items: usize,
    consumed_items: u64,
    exhausted: bool,
}

impl StreamingInstance {
    pub fn new(
        bytes: Vec<u8>,
        offset_seconds: f32,
        looping: bool,
        loop_start_seconds: f32,
        loop_end_seconds: f32,
        buffer_seconds: f32,
    ) -> Result<Self, SoundError> {
        let mut decoder = Decoder::new(bytes)?;
        let items_per_second = decoder.sample_rate() as u64 * decoder.channel_count() as u64;
        // Seek in whole frames to keep channel alignment.
        let channels = decoder.channel_count() as u64;
        let to_items = |seconds: f32| -> u64 {
            let items = (seconds.max(0.0) as f64 * items_per_second as f64) as u64;
            items / channels * channels
        };
        let start = to_items(offset_seconds);
        if start > 0 {
            decoder.seek_items(start);
        }
        Ok(Self {
            buffer_items: (buffer_seconds.max(0.001) as f64 * items_per_second as f64) as usize,
            loop_start_items: to_items(loop_start_seconds),
            loop_end_items: to_items(loop_end_seconds),
            consumed_items: start,
            queue: VecDeque::new(),
            exhausted: false,
            looping,
            decoder,
        })
    }

    #[inline]
    pub fn channel_count(&self) -> u16 {
        self.decoder.channel_count()
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.decoder.sample_rate()
    }

    #[inline]
    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
        if looping {
            self.exhausted = false;
        }
    }

    #[inline]
    pub fn is_looping(&self) -> bool {
        self.looping
    }

    /// Position of the consumer cursor in seconds.
    pub fn position_seconds(&self) -> f32 {
        let per_second = self.sample_rate() as f64 * self.channel_count() as f64;
        if per_second == 0.0 {
            0.0
        } else {
            (self.consumed_items as f64 / per_second) as f32
        }
    }

    /// Total length in seconds; zero when the container does not know it
    /// without a full decode.
    pub fn length_seconds(&self) -> f32 {
        let per_second = self.sample_rate() as f64 * self.channel_count() as f64;
        match self.decoder.total_items() {
            Some(total) if per_second > 0.0 => (total as f64 / per_second) as f32,
            _ => 0.0,
        }
    }

    /// Moves the consumer cursor. Queued data is discarded and refilled by
    /// the next worker pass.
    pub fn set_position_seconds(&mut self, seconds: f32) {
        let channels = self.channel_count() as u64;
        let per_second = self.sample_rate() as u64 * channels;
        let items = ((seconds.max(0.0) as f64 * per_second as f64) as u64) / channels * channels;
        self.decoder.seek_items(items);
        self.queue.clear();
        self.consumed_items = items;
        self.exhausted = false;
    }

    /// Refills the read-ahead queue. Called from the worker thread.
    pub fn update_streaming(&mut self) {
        if self.exhausted {
            return;
        }
        while self.queue.len() < self.buffer_items {
            let mut chunk = Vec::new();
            let want = self.buffer_items - self.queue.len();
            let got = if self.looping {
                self.decoder
                    .read_looped(&mut chunk, want, self.loop_start_items, self.loop_end_items)
            } else {
                self.decoder.read(&mut chunk, want)
            };
            self.queue.extend(chunk);
            if got == 0 {
                if !self.looping {
                    self.exhausted = true;
                }
                break;
            }
        }
    }

    /// Drains up to `items` samples into `out`, returning the amount
    /// actually produced; the shortfall of an underrun is the caller's
    /// silence.
    pub fn consume(&mut self, items: usize, out: &mut Vec<i16>) -> usize {
        let take = items.min(self.queue.len());
        for _ in 0..take {
            // Queue is non-empty for the first `take` pops.
            if let Some(sample) = self.queue.pop_front() {
                out.push(sample);
            }
        }
        self.consumed_items += take as u64;
        take
    }

    /// Advances the consumer cursor without producing samples. Used by the
    /// frame scheduler which tracks time, not audio data.
    pub fn skip(&mut self, items: usize) -> usize {
        let take = items.min(self.queue.len());
        self.queue.drain(..take);
        self.consumed_items += take as u64;
        take
    }

    /// True when a non-looping stream has decoded and consumed everything.
    #[inline]
    pub fn is_ended(&self) -> bool {
        self.exhausted && self.queue.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    fn wav(samples: &[i16], rate: u32) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for &s in samples {
                writer.write_sample(s).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn buffer_decodes_fully() {
        let samples: Vec<i16> = (0..50).collect();
        let buffer = SoundBuffer::from_bytes(wav(&samples, 10)).unwrap();
        assert_eq!(buffer.samples(), samples.as_slice());
        assert_eq!(buffer.total_items(), 50);
        assert!((buffer.duration_seconds() - 5.0).abs() < 1e-6);
    }

    #[test]
    fn streaming_refill_and_consume() {
        let samples: Vec<i16> = (0..100).collect();
        let mut stream =
            StreamingInstance::new(wav(&samples, 10), 0.0, false, 0.0, 0.0, 1.0).unwrap();
        stream.update_streaming();
        let mut out = Vec::new();
        assert_eq!(stream.consume(5, &mut out), 5);
        assert_eq!(out, vec![0, 1, 2, 3, 4]);
        assert!((stream.position_seconds() - 0.5).abs() < 1e-6);
        assert!(!stream.is_ended());
    }

    #[test]
    fn streaming_ends_without_looping() {
        let samples: Vec<i16> = (0..10).collect();
        let mut stream =
            StreamingInstance::new(wav(&samples, 10), 0.0, false, 0.0, 0.0, 10.0).unwrap();
        stream.update_streaming();
        let mut out = Vec::new();
        stream.consume(100, &mut out);
        stream.update_streaming();
        assert_eq!(out.len(), 10);
        assert!(stream.is_ended());
    }

    #[test]
    fn streaming_loops_forever() {
        let samples: Vec<i16> = (0..10).collect();
        let mut stream =
            StreamingInstance::new(wav(&samples, 10), 0.0, true, 0.0, 0.0, 2.5).unwrap();
        let mut out = Vec::new();
        for _ in 0..4 {
            stream.update_streaming();
            stream.consume(25, &mut out);
        }
        assert_eq!(out.len(), 100);
        assert_eq!(&out[..12], &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 0, 1]);
        assert!(!stream.is_ended());
    }

    #[test]
    fn streaming_starts_at_offset() {
        let samples: Vec<i16> = (0..100).collect();
        let mut stream =
            StreamingInstance::new(wav(&samples, 10), 2.0, false, 0.0, 0.0, 1.0).unwrap();
        stream.update_streaming();
        let mut out = Vec::new();
        stream.consume(3, &mut out);
        assert_eq!(out, vec![20, 21, 22]);
    }
}

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

//! Sample decoders for the two supported containers: Microsoft WAV (8/16-bit
//! integer PCM) and OGG Vorbis. All positions and counts are in interleaved
//! sample units: a stereo frame is two samples.

use crate::SoundError;
use hound::WavReader;
use lewton::inside_ogg::OggStreamReader;
use std::io::Cursor;

/// 8-bit WAV samples are widened with a 6-bit shift rather than a full
/// 8-bit one, keeping their perceived loudness in line with 16-bit sources.
const WIDEN_8BIT_SHIFT: u32 = 6;

pub struct WavDecoder {
    reader: WavReader<Cursor<Vec<u8>>>,
    channels: u16,
    sample_rate: u32,
    total_items: u64,
    position_items: u64,
    eight_bit: bool,
}

impl WavDecoder {
    pub fn new(bytes: Vec<u8>) -> Result<Self, SoundError> {
        let reader = WavReader::new(Cursor::new(bytes))
            .map_err(|e| SoundError::InvalidData(e.to_string()))?;
        let spec = reader.spec();
        if spec.sample_format != hound::SampleFormat::Int
            || (spec.bits_per_sample != 8 && spec.bits_per_sample != 16)
        {
            return Err(SoundError::UnsupportedSampleFormat);
        }
        let total_items = reader.duration() as u64 * spec.channels as u64;
        Ok(Self {
            channels: spec.channels,
            sample_rate: spec.sample_rate,
            total_items,
            position_items: 0,
            eight_bit: spec.bits_per_sample == 8,
            reader,
        })
    }

    fn seek_items(&mut self, items: u64) {
        let frames = (items / self.channels as u64).min(self.total_items / self.channels as u64);
        if self.reader.seek(frames as u32).is_ok() {
            self.position_items = frames * self.channels as u64;
        }
    }

    fn read(&mut self, buf: &mut Vec<i16>, max_items: usize) -> usize {
        let mut written = 0;
        let eight_bit = self.eight_bit;
        for sample in self.reader.samples::<i16>().take(max_items) {
            let Ok(sample) = sample else { break };
            let sample = if eight_bit {
                // Recover the raw unsigned byte, then widen.
                (((sample + 128) as u16) << WIDEN_8BIT_SHIFT) as i16
            } else {
                sample
            };
            buf.push(sample);
            written += 1;
        }
        self.position_items += written as u64;
        written
    }
}

pub struct OggDecoder {
    reader: OggStreamReader<Cursor<Vec<u8>>>,
    channels: u16,
    sample_rate: u32,
    pending: Vec<i16>,
    pending_offset: usize,
    position_items: u64,
}

impl OggDecoder {
    pub fn new(bytes: Vec<u8>) -> Result<Self, SoundError> {
        let reader = OggStreamReader::new(Cursor::new(bytes))
            .map_err(|e| SoundError::InvalidData(format!("{e:?}")))?;
        let channels = reader.ident_hdr.audio_channels as u16;
        let sample_rate = reader.ident_hdr.audio_sample_rate;
        Ok(Self {
            reader,
            channels,
            sample_rate,
            pending: Vec::new(),
            pending_offset: 0,
            position_items: 0,
        })
    }

    fn seek_items(&mut self, items: u64) {
        let frames = items / self.channels as u64;
        // Page-granular seek; close enough for loop points in music tracks.
        if self.reader.seek_absgp_pg(frames).is_ok() {
            self.pending.clear();
            self.pending_offset = 0;
            self.position_items = frames * self.channels as u64;
        }
    }

    fn read(&mut self, buf: &mut Vec<i16>, max_items: usize) -> usize {
        let mut written = 0;
        while written < max_items {
            if self.pending_offset >= self.pending.len() {
                match self.reader.read_dec_packet_itl() {
                    Ok(Some(packet)) if !packet.is_empty() => {
                        self.pending = packet;
                        self.pending_offset = 0;
                    }
                    Ok(Some(_)) => continue,
                    _ => break,
                }
            }
            let available = self.pending.len() - self.pending_offset;
            let take = available.min(max_items - written);
            buf.extend_from_slice(&self.pending[self.pending_offset..self.pending_offset + take]);
            self.pending_offset += take;
            written += take;
        }
        self.position_items += written as u64;
        written
    }
}

/// Unified decoder over the supported containers, chosen by sniffing the
/// leading magic bytes.
pub enum Decoder {
    Wav(WavDecoder),
    Ogg(OggDecoder),
}

impl Decoder {
    pub fn new(bytes: Vec<u8>) -> Result<Self, SoundError> {
        match bytes.get(..4) {
            Some(b"RIFF") => Ok(Self::Wav(WavDecoder::new(bytes)?)),
            Some(b"OggS") => Ok(Self::Ogg(OggDecoder::new(bytes)?)),
            _ => Err(SoundError::UnsupportedFormat),
        }
    }

    #[inline]
    pub fn channel_count(&self) -> u16 {
        match self {
            Self::Wav(d) => d.channels,
            Self::Ogg(d) => d.channels,
        }
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        match self {
            Self::Wav(d) => d.sample_rate,
            Self::Ogg(d) => d.sample_rate,
        }
    }

    /// Total interleaved sample count. Unknown for Vorbis streams until the
    /// stream has been decoded once.
    #[inline]
    pub fn total_items(&self) -> Option<u64> {
        match self {
            Self::Wav(d) => Some(d.total_items),
            Self::Ogg(_) => None,
        }
    }

    #[inline]
    pub fn position_items(&self) -> u64 {
        match self {
            Self::Wav(d) => d.position_items,
            Self::Ogg(d) => d.position_items,
        }
    }

    pub fn seek_items(&mut self, items: u64) {
        match self {
            Self::Wav(d) => d.seek_items(items),
            Self::Ogg(d) => d.seek_items(items),
        }
    }

    /// Appends up to `max_items` decoded samples to `buf`, returns the amount
    /// actually produced. Zero means end of stream.
    pub fn read(&mut self, buf: &mut Vec<i16>, max_items: usize) -> usize {
        match self {
            Self::Wav(d) => d.read(buf, max_items),
            Self::Ogg(d) => d.read(buf, max_items),
        }
    }

    /// Like [`Self::read`] but wraps back to `loop_start_items` when the read
    /// position reaches `loop_end_items` (or the end of the stream when the
    /// loop end is zero). Always produces `max_items` samples unless the
    /// stream is empty.
    pub fn read_looped(
        &mut self,
        buf: &mut Vec<i16>,
        max_items: usize,
        loop_start_items: u64,
        loop_end_items: u64,
    ) -> usize {
        let mut written = 0;
        let mut wraps = 0;
        while written < max_items {
            let budget = if loop_end_items > 0 {
                let pos = self.position_items();
                if pos >= loop_end_items {
                    self.seek_items(loop_start_items);
                    continue;
                }
                ((loop_end_items - pos) as usize).min(max_items - written)
            } else {
                max_items - written
            };

            let got = self.read(buf, budget);
            written += got;

            if got < budget {
                // End of stream inside the loop body: wrap.
                self.seek_items(loop_start_items);
                wraps += 1;
                // A stream shorter than the loop start produces nothing; stop
                // instead of spinning.
                if wraps > 2 && written == 0 {
                    break;
                }
            }
        }
        written
    }

    /// Decodes the remainder of the stream in one go.
    pub fn read_to_end(&mut self) -> Vec<i16> {
        let mut all = Vec::new();
        loop {
            let got = self.read(&mut all, 16384);
            if got == 0 {
                break;
            }
        }
        all
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn make_wav_16(samples: &[i16], channels: u16, rate: u32) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels,
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

    fn make_wav_8(samples: &[u8], rate: u32) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: rate,
            bits_per_sample: 8,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for &s in samples {
                // hound stores 8-bit samples re-centred around zero, the raw
                // unsigned byte in the file is `sample + 128`.
                writer.write_sample(s as i16 - 128).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn sniffs_container() {
        assert!(matches!(
            Decoder::new(vec![1, 2, 3, 4]),
            Err(SoundError::UnsupportedFormat)
        ));
        let wav = make_wav_16(&[0, 1, 2, 3], 1, 44100);
        assert!(matches!(Decoder::new(wav), Ok(Decoder::Wav(_))));
    }

    #[test]
    fn wav_16bit_round_trip() {
        let samples: Vec<i16> = (0..100).map(|i| i * 13 - 600).collect();
        let mut decoder = Decoder::new(make_wav_16(&samples, 1, 22050)).unwrap();
        assert_eq!(decoder.sample_rate(), 22050);
        assert_eq!(decoder.channel_count(), 1);
        assert_eq!(decoder.total_items(), Some(100));
        assert_eq!(decoder.read_to_end(), samples);
    }

    #[test]
    fn wav_seek_and_tell() {
        let samples: Vec<i16> = (0..100).collect();
        let mut decoder = Decoder::new(make_wav_16(&samples, 2, 44100)).unwrap();
        decoder.seek_items(50);
        assert_eq!(decoder.position_items(), 50);
        let mut buf = Vec::new();
        decoder.read(&mut buf, 4);
        assert_eq!(buf, vec![50, 51, 52, 53]);
    }

    #[test]
    fn wav_8bit_is_widened_by_six_bits() {
        let raw: Vec<u8> = vec![0, 1, 128, 255];
        let mut decoder = Decoder::new(make_wav_8(&raw, 8000)).unwrap();
        let decoded = decoder.read_to_end();
        let expected: Vec<i16> = raw.iter().map(|&s| ((s as u16) << 6) as i16).collect();
        assert_eq!(decoded, expected);
    }

    #[test]
    fn read_looped_wraps() {
        let samples: Vec<i16> = (0..10).collect();
        let mut decoder = Decoder::new(make_wav_16(&samples, 1, 8000)).unwrap();
        let mut buf = Vec::new();
        // Loop over items 2..6 -> 2,3,4,5 repeating.
        let got = decoder.read_looped(&mut buf, 10, 2, 6);
        assert_eq!(got, 10);
        assert_eq!(buf, vec![0, 1, 2, 3, 4, 5, 2, 3, 4, 5]);
    }

    #[test]
    fn read_looped_wraps_at_stream_end() {
        let samples: Vec<i16> = (0..4).collect();
        let mut decoder = Decoder::new(make_wav_16(&samples, 1, 8000)).unwrap();
        let mut buf = Vec::new();
        let got = decoder.read_looped(&mut buf, 8, 0, 0);
        assert_eq!(got, 8);
        assert_eq!(buf, vec![0, 1, 2, 3, 0, 1, 2, 3]);
    }
}

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

//! The sound scheduler: a sounds table and a sample pool behind one mutex, a
//! group mixer with mute and process-wide-exclusive solo, linear fade
//! envelopes evaluated once per frame, and a worker thread that keeps
//! streaming buffers ahead of their read cursors.

use crate::{
    buffer::{SoundBuffer, StreamingInstance},
    SoundId,
};
use ember_core::{log::Log, shared::Shared};
use fxhash::FxHashMap;
use parking_lot::Mutex;
use std::{
    sync::Arc,
    thread::{self, JoinHandle},
    time::Duration,
};

/// Length of the streaming read-ahead window.
pub const STREAM_BUFFER_SECONDS: f32 = 0.2;

/// Default group count; matches one group for music plus a few effect buses.
pub const DEFAULT_GROUP_COUNT: usize = 4;

enum SourceKind {
    Pooled {
        buffer: Shared<SoundBuffer>,
        cursor_items: f64,
        looping: bool,
    },
    Streaming(Box<StreamingInstance>),
}

struct Sound {
    kind: SourceKind,
    group: usize,
    base_volume: f32,
    pan: f32,
    pitch: f32,
    paused: bool,
    stopped: bool,
    destroy_on_stop: bool,
    // Removal happens at the start of the next frame, never mid-frame.
    doomed: bool,
}

impl Sound {
    fn is_advancing(&self) -> bool {
        !self.paused && !self.stopped
    }
}

/// Mixer group. The effective volume of a sound multiplies the master volume
/// of the scheduler, both volumes of its group and the sound's own base.
pub struct Group {
    pub name: String,
    master_volume: f32,
    volume: f32,
    muted: bool,
}

impl Default for Group {
    fn default() -> Self {
        Self {
            name: String::new(),
            master_volume: 1.0,
            volume: 1.0,
            muted: false,
        }
    }
}

/// What a fade envelope drives.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FadeTarget {
    Sound(SoundId),
    Group(usize),
}

struct Fade {
    target: FadeTarget,
    volume_start: f32,
    volume_end: f32,
    duration: u32,
    time: u32,
    auto_stop: bool,
    finished: bool,
}

struct State {
    sounds: FxHashMap<SoundId, Sound>,
    pool: FxHashMap<String, Shared<SoundBuffer>>,
    groups: Vec<Group>,
    fades: Vec<Fade>,
    master_volume: f32,
    muted: bool,
    solo_group: Option<usize>,
    next_id: u64,
    quit: bool,
}

impl State {
    fn new(group_count: usize) -> Self {
        Self {
            sounds: Default::default(),
            pool: Default::default(),
            groups: (0..group_count.max(1)).map(|_| Group::default()).collect(),
            fades: Vec::new(),
            master_volume: 1.0,
            muted: false,
            solo_group: None,
            next_id: 1,
            quit: false,
        }
    }

    fn alloc_id(&mut self) -> SoundId {
        let id = SoundId(self.next_id);
        self.next_id += 1;
        id
    }

    fn effective_volume(&self, sound: &Sound) -> f32 {
        if self.muted {
            return 0.0;
        }
        let Some(group) = self.groups.get(sound.group) else {
            return 0.0;
        };
        if group.muted {
            return 0.0;
        }
        if let Some(solo) = self.solo_group {
            if solo != sound.group {
                return 0.0;
            }
        }
        (self.master_volume * group.master_volume * group.volume * sound.base_volume)
            .clamp(0.0, 1.0)
    }

    fn stop_sound(&mut self, id: SoundId) {
        if let Some(sound) = self.sounds.get_mut(&id) {
            sound.stopped = true;
            sound.doomed = true;
        }
    }

    fn begin_fade(&mut self, target: FadeTarget, v0: f32, v1: f32, frames: u32, auto_stop: bool) {
        self.fades.push(Fade {
            target,
            volume_start: v0,
            volume_end: v1,
            duration: frames,
            time: 0,
            auto_stop,
            finished: false,
        });
    }

    fn apply_fade_value(&mut self, target: FadeTarget, value: f32) {
        match target {
            FadeTarget::Sound(id) => {
                if let Some(sound) = self.sounds.get_mut(&id) {
                    sound.base_volume = value;
                }
            }
            FadeTarget::Group(group) => {
                if let Some(group) = self.groups.get_mut(group) {
                    group.volume = value;
                }
            }
        }
    }

    fn sweep_doomed(&mut self) {
        let fades = &self.fades;
        self.sounds.retain(|id, sound| {
            if !sound.doomed {
                return true;
            }
            // A doomed sound stays alive while an unfinished fade still
            // drives it.
            fades
                .iter()
                .any(|f| !f.finished && f.target == FadeTarget::Sound(*id))
        });
    }

    fn evaluate_fades(&mut self) {
        let mut pending = Vec::new();
        for fade in &mut self.fades {
            if fade.finished {
                continue;
            }
            if fade.time < fade.duration {
                let t = fade.time as f32 / fade.duration as f32;
                let v = ember_core::math::lerpf(fade.volume_start, fade.volume_end, t);
                pending.push((fade.target, v, false));
                fade.time += 1;
            } else {
                pending.push((fade.target, fade.volume_end, fade.auto_stop));
                fade.finished = true;
            }
        }
        for (target, value, auto_stop) in pending {
            self.apply_fade_value(target, value);
            if auto_stop {
                if let FadeTarget::Sound(id) = target {
                    self.stop_sound(id);
                }
            }
        }
        self.fades.retain(|f| !f.finished);
    }

    fn advance_playback(&mut self, dt: f32) {
        for sound in self.sounds.values_mut() {
            if !sound.is_advancing() {
                continue;
            }
            match &mut sound.kind {
                SourceKind::Pooled {
                    buffer,
                    cursor_items,
                    looping,
                } => {
                    let (total, rate) = {
                        let buffer = buffer.lock();
                        (
                            buffer.total_items() as f64,
                            buffer.sample_rate() as f64 * buffer.channel_count() as f64,
                        )
                    };
                    *cursor_items += dt as f64 * rate * sound.pitch as f64;
                    if *cursor_items >= total {
                        if *looping && total > 0.0 {
                            *cursor_items %= total;
                        } else {
                            sound.stopped = true;
                            if sound.destroy_on_stop {
                                sound.doomed = true;
                            }
                        }
                    }
                }
                SourceKind::Streaming(instance) => {
                    let rate =
                        instance.sample_rate() as f64 * instance.channel_count() as f64;
                    let items = (dt as f64 * rate * sound.pitch as f64) as usize;
                    // An underrun skips less than requested; the gap is one
                    // frame of silence.
                    instance.skip(items);
                    if instance.is_ended() {
                        sound.stopped = true;
                        if sound.destroy_on_stop {
                            sound.doomed = true;
                        }
                    }
                }
            }
        }
    }
}

/// See module docs.
pub struct SoundScheduler {
    state: Arc<Mutex<State>>,
    worker: Option<JoinHandle<()>>,
}

impl SoundScheduler {
    pub fn new() -> Self {
        Self::with_group_count(DEFAULT_GROUP_COUNT)
    }

    pub fn with_group_count(group_count: usize) -> Self {
        let state = Arc::new(Mutex::new(State::new(group_count)));
        let worker_state = state.clone();
        let interval = Duration::from_secs_f32((STREAM_BUFFER_SECONDS * 0.5).max(0.001));
        let worker = thread::Builder::new()
            .name("ember-sound-worker".into())
            .spawn(move || loop {
                {
                    let mut state = worker_state.lock();
                    if state.quit {
                        break;
                    }
                    for sound in state.sounds.values_mut() {
                        if !sound.is_advancing() {
                            continue;
                        }
                        if let SourceKind::Streaming(instance) = &mut sound.kind {
                            instance.update_streaming();
                        }
                    }
                }
                thread::sleep(interval);
            })
            .ok();
        Self { state, worker }
    }

    /// Registers a pre-decoded pool entry under a logical name. Subsequent
    /// [`Self::play_pooled`] calls share the decoded samples.
    pub fn register_pooled<S: Into<String>>(&self, name: S, bytes: Vec<u8>) -> bool {
        let name = name.into();
        match SoundBuffer::from_bytes(bytes) {
            Ok(buffer) => {
                let label = name.clone();
                self.state
                    .lock()
                    .pool
                    .insert(name, Shared::with_label(buffer, label));
                true
            }
            Err(err) => {
                Log::err(format!("failed to decode pooled sound '{name}': {err}"));
                false
            }
        }
    }

    /// Starts playback of a pool entry. Returns the null id and logs when the
    /// entry does not exist.
    pub fn play_pooled(&self, name: &str, volume: f32) -> SoundId {
        self.play_pooled_in_group(name, volume, 0)
    }

    pub fn play_pooled_in_group(&self, name: &str, volume: f32, group: usize) -> SoundId {
        let mut state = self.state.lock();
        let Some(buffer) = state.pool.get(name).cloned() else {
            Log::err(format!("no pooled sound named '{name}'"));
            return SoundId::NONE;
        };
        let id = state.alloc_id();
        state.sounds.insert(
            id,
            Sound {
                kind: SourceKind::Pooled {
                    buffer,
                    cursor_items: 0.0,
                    looping: false,
                },
                group,
                base_volume: volume.clamp(0.0, 1.0),
                pan: 0.0,
                pitch: 1.0,
                paused: false,
                stopped: false,
                destroy_on_stop: true,
                doomed: false,
            },
        );
        id
    }

    /// Starts streaming playback of a raw byte blob.
    pub fn play_streaming(
        &self,
        bytes: Vec<u8>,
        offset_seconds: f32,
        looping: bool,
        loop_start_seconds: f32,
        loop_end_seconds: f32,
    ) -> SoundId {
        let instance = match StreamingInstance::new(
            bytes,
            offset_seconds,
            looping,
            loop_start_seconds,
            loop_end_seconds,
            STREAM_BUFFER_SECONDS,
        ) {
            Ok(instance) => instance,
            Err(err) => {
                Log::err(format!("failed to open stream: {err}"));
                return SoundId::NONE;
            }
        };
        let mut state = self.state.lock();
        let id = state.alloc_id();
        state.sounds.insert(
            id,
            Sound {
                kind: SourceKind::Streaming(Box::new(instance)),
                group: 0,
                base_volume: 1.0,
                pan: 0.0,
                pitch: 1.0,
                paused: false,
                stopped: false,
                destroy_on_stop: false,
                doomed: false,
            },
        );
        id
    }

    /// Per-frame tick, to be called strictly after the gameplay tick: removes
    /// sounds stopped on a previous frame, advances fade envelopes, then
    /// advances playback cursors.
    pub fn update(&self, dt: f32) {
        let mut state = self.state.lock();
        state.sweep_doomed();
        state.evaluate_fades();
        state.advance_playback(dt);
    }

    pub fn is_valid(&self, id: SoundId) -> bool {
        self.state.lock().sounds.contains_key(&id)
    }

    pub fn is_playing(&self, id: SoundId) -> bool {
        self.state
            .lock()
            .sounds
            .get(&id)
            .is_some_and(|s| s.is_advancing())
    }

    pub fn pause(&self, id: SoundId) {
        if let Some(sound) = self.state.lock().sounds.get_mut(&id) {
            sound.paused = true;
        }
    }

    pub fn resume(&self, id: SoundId) {
        if let Some(sound) = self.state.lock().sounds.get_mut(&id) {
            sound.paused = false;
        }
    }

    /// Deleting an invalid id is a no-op.
    pub fn delete_sound(&self, id: SoundId) {
        let mut state = self.state.lock();
        state.sounds.remove(&id);
        state.fades.retain(|f| f.target != FadeTarget::Sound(id));
    }

    /// Stops the sound, optionally fading it out over `fade_frames` first.
    /// The sound is destroyed once the fade (if any) has finished.
    pub fn stop(&self, id: SoundId, fade_frames: u32) {
        let mut state = self.state.lock();
        if !state.sounds.contains_key(&id) {
            return;
        }
        if fade_frames == 0 {
            state.stop_sound(id);
        } else {
            let v0 = state
                .sounds
                .get(&id)
                .map(|s| s.base_volume)
                .unwrap_or_default();
            state.begin_fade(FadeTarget::Sound(id), v0, 0.0, fade_frames, true);
        }
    }

    pub fn stop_all(&self, fade_frames: u32) {
        let ids: Vec<SoundId> = self.state.lock().sounds.keys().copied().collect();
        for id in ids {
            self.stop(id, fade_frames);
        }
    }

    pub fn stop_by_group(&self, group: usize, fade_frames: u32) {
        let ids: Vec<SoundId> = self
            .state
            .lock()
            .sounds
            .iter()
            .filter(|(_, s)| s.group == group)
            .map(|(id, _)| *id)
            .collect();
        for id in ids {
            self.stop(id, fade_frames);
        }
    }

    /// Cancels fades in flight for the given sound, freezing its volume.
    pub fn stop_fades(&self, id: SoundId) {
        self.state
            .lock()
            .fades
            .retain(|f| f.target != FadeTarget::Sound(id));
    }

    pub fn set_volume(&self, id: SoundId, volume: f32) {
        if let Some(sound) = self.state.lock().sounds.get_mut(&id) {
            sound.base_volume = volume.clamp(0.0, 1.0);
        }
    }

    pub fn volume(&self, id: SoundId) -> f32 {
        self.state
            .lock()
            .sounds
            .get(&id)
            .map(|s| s.base_volume)
            .unwrap_or_default()
    }

    pub fn set_pan(&self, id: SoundId, pan: f32) {
        if let Some(sound) = self.state.lock().sounds.get_mut(&id) {
            sound.pan = pan.clamp(-1.0, 1.0);
        }
    }

    pub fn pan(&self, id: SoundId) -> f32 {
        self.state
            .lock()
            .sounds
            .get(&id)
            .map(|s| s.pan)
            .unwrap_or_default()
    }

    pub fn set_pitch(&self, id: SoundId, pitch: f32) {
        if let Some(sound) = self.state.lock().sounds.get_mut(&id) {
            sound.pitch = pitch.max(0.0);
        }
    }

    pub fn pitch(&self, id: SoundId) -> f32 {
        self.state
            .lock()
            .sounds
            .get(&id)
            .map(|s| s.pitch)
            .unwrap_or(1.0)
    }

    pub fn set_looping(&self, id: SoundId, value: bool) {
        if let Some(sound) = self.state.lock().sounds.get_mut(&id) {
            match &mut sound.kind {
                SourceKind::Pooled { looping, .. } => *looping = value,
                SourceKind::Streaming(instance) => instance.set_looping(value),
            }
        }
    }

    pub fn set_group(&self, id: SoundId, group: usize) {
        if let Some(sound) = self.state.lock().sounds.get_mut(&id) {
            sound.group = group;
        }
    }

    pub fn set_position_seconds(&self, id: SoundId, seconds: f32) {
        if let Some(sound) = self.state.lock().sounds.get_mut(&id) {
            match &mut sound.kind {
                SourceKind::Pooled {
                    buffer,
                    cursor_items,
                    ..
                } => {
                    let buffer = buffer.lock();
                    let rate = buffer.sample_rate() as f64 * buffer.channel_count() as f64;
                    *cursor_items =
                        (seconds.max(0.0) as f64 * rate).min(buffer.total_items() as f64);
                }
                SourceKind::Streaming(instance) => instance.set_position_seconds(seconds),
            }
        }
    }

    pub fn position_seconds(&self, id: SoundId) -> f32 {
        match self.state.lock().sounds.get(&id) {
            Some(sound) => match &sound.kind {
                SourceKind::Pooled {
                    buffer,
                    cursor_items,
                    ..
                } => {
                    let buffer = buffer.lock();
                    let rate = buffer.sample_rate() as f64 * buffer.channel_count() as f64;
                    if rate > 0.0 {
                        (*cursor_items / rate) as f32
                    } else {
                        0.0
                    }
                }
                SourceKind::Streaming(instance) => instance.position_seconds(),
            },
            None => 0.0,
        }
    }

    pub fn length_seconds(&self, id: SoundId) -> f32 {
        match self.state.lock().sounds.get(&id) {
            Some(sound) => match &sound.kind {
                SourceKind::Pooled { buffer, .. } => buffer.lock().duration_seconds(),
                SourceKind::Streaming(instance) => instance.length_seconds(),
            },
            None => 0.0,
        }
    }

    /// Master volume applied above every group.
    pub fn set_master_volume(&self, volume: f32) {
        self.state.lock().master_volume = volume.clamp(0.0, 1.0);
    }

    pub fn master_volume(&self) -> f32 {
        self.state.lock().master_volume
    }

    pub fn set_muted(&self, muted: bool) {
        self.state.lock().muted = muted;
    }

    pub fn is_muted(&self) -> bool {
        self.state.lock().muted
    }

    pub fn group_count(&self) -> usize {
        self.state.lock().groups.len()
    }

    /// Grows or shrinks the group table; new groups get default settings.
    pub fn set_group_count(&self, count: usize) {
        let mut state = self.state.lock();
        let count = count.max(1);
        state.groups.resize_with(count, Group::default);
        if state.solo_group.is_some_and(|solo| solo >= count) {
            state.solo_group = None;
        }
    }

    pub fn set_group_master_volume(&self, group: usize, volume: f32) {
        if let Some(group) = self.state.lock().groups.get_mut(group) {
            group.master_volume = volume.clamp(0.0, 1.0);
        }
    }

    pub fn group_master_volume(&self, group: usize) -> f32 {
        self.state
            .lock()
            .groups
            .get(group)
            .map(|g| g.master_volume)
            .unwrap_or_default()
    }

    /// Sets the user volume of a group, fading over `fade_frames` when it is
    /// non-zero.
    pub fn set_group_volume(&self, group: usize, volume: f32, fade_frames: u32) {
        let mut state = self.state.lock();
        if group >= state.groups.len() {
            Log::err(format!("no sound group {group}"));
            return;
        }
        let volume = volume.clamp(0.0, 1.0);
        if fade_frames == 0 {
            state.groups[group].volume = volume;
        } else {
            let v0 = state.groups[group].volume;
            state.begin_fade(FadeTarget::Group(group), v0, volume, fade_frames, false);
        }
    }

    pub fn group_volume(&self, group: usize) -> f32 {
        self.state
            .lock()
            .groups
            .get(group)
            .map(|g| g.volume)
            .unwrap_or_default()
    }

    pub fn set_group_muted(&self, group: usize, muted: bool) {
        if let Some(group) = self.state.lock().groups.get_mut(group) {
            group.muted = muted;
        }
    }

    pub fn is_group_muted(&self, group: usize) -> bool {
        self.state
            .lock()
            .groups
            .get(group)
            .map(|g| g.muted)
            .unwrap_or_default()
    }

    /// Solo is process-wide exclusive: setting it on one group clears it
    /// everywhere else, clearing it leaves no solo at all.
    pub fn set_group_solo(&self, group: usize, solo: bool) {
        let mut state = self.state.lock();
        if solo {
            if group < state.groups.len() {
                state.solo_group = Some(group);
            }
        } else if state.solo_group == Some(group) {
            state.solo_group = None;
        }
    }

    pub fn solo_group(&self) -> Option<usize> {
        self.state.lock().solo_group
    }

    pub fn set_group_name<S: Into<String>>(&self, group: usize, name: S) {
        if let Some(group) = self.state.lock().groups.get_mut(group) {
            group.name = name.into();
        }
    }

    pub fn group_name(&self, group: usize) -> String {
        self.state
            .lock()
            .groups
            .get(group)
            .map(|g| g.name.clone())
            .unwrap_or_default()
    }

    /// The volume a sound is actually mixed at.
    pub fn effective_volume(&self, id: SoundId) -> f32 {
        let state = self.state.lock();
        state
            .sounds
            .get(&id)
            .map(|s| state.effective_volume(s))
            .unwrap_or_default()
    }

    pub fn playing_count(&self) -> usize {
        self.state
            .lock()
            .sounds
            .values()
            .filter(|s| s.is_advancing())
            .count()
    }

    pub fn playing_count_in_group(&self, group: usize) -> usize {
        self.state
            .lock()
            .sounds
            .values()
            .filter(|s| s.group == group && s.is_advancing())
            .count()
    }

    /// Stops the worker thread and clears all tables. Called automatically on
    /// drop.
    pub fn shutdown(&mut self) {
        self.state.lock().quit = true;
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        let mut state = self.state.lock();
        state.sounds.clear();
        state.pool.clear();
        state.fades.clear();
    }
}

impl Default for SoundScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SoundScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    fn wav_seconds(seconds: f32, rate: u32) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for i in 0..(seconds * rate as f32) as u32 {
                writer.write_sample((i % 128) as i16).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn missing_pool_entry_yields_null_id() {
        let scheduler = SoundScheduler::new();
        let id = scheduler.play_pooled("does-not-exist", 1.0);
        assert!(id.is_none());
        // Operations on the null id are no-ops.
        scheduler.stop(id, 0);
        scheduler.delete_sound(id);
    }

    #[test]
    fn pooled_playbacks_share_buffer_but_not_cursor() {
        let scheduler = SoundScheduler::new();
        assert!(scheduler.register_pooled("beep", wav_seconds(1.0, 1000)));
        let a = scheduler.play_pooled("beep", 1.0);
        let b = scheduler.play_pooled("beep", 0.5);
        assert!(a.is_some() && b.is_some() && a != b);

        scheduler.set_position_seconds(a, 0.5);
        assert!((scheduler.position_seconds(a) - 0.5).abs() < 1e-3);
        assert_eq!(scheduler.position_seconds(b), 0.0);
    }

    #[test]
    fn effective_volume_formula() {
        let scheduler = SoundScheduler::new();
        scheduler.register_pooled("beep", wav_seconds(1.0, 1000));
        let id = scheduler.play_pooled_in_group("beep", 0.8, 1);

        scheduler.set_master_volume(0.5);
        scheduler.set_group_master_volume(1, 0.5);
        scheduler.set_group_volume(1, 0.5, 0);
        assert!((scheduler.effective_volume(id) - 0.5 * 0.5 * 0.5 * 0.8).abs() < 1e-6);

        scheduler.set_group_muted(1, true);
        assert_eq!(scheduler.effective_volume(id), 0.0);
        scheduler.set_group_muted(1, false);

        scheduler.set_muted(true);
        assert_eq!(scheduler.effective_volume(id), 0.0);
        scheduler.set_muted(false);

        // Solo elsewhere silences this group.
        scheduler.set_group_solo(0, true);
        assert_eq!(scheduler.effective_volume(id), 0.0);
        scheduler.set_group_solo(1, true);
        assert!(scheduler.effective_volume(id) > 0.0);
    }

    #[test]
    fn solo_is_exclusive() {
        let scheduler = SoundScheduler::new();
        scheduler.set_group_solo(0, true);
        assert_eq!(scheduler.solo_group(), Some(0));
        scheduler.set_group_solo(2, true);
        assert_eq!(scheduler.solo_group(), Some(2));
        scheduler.set_group_solo(2, false);
        assert_eq!(scheduler.solo_group(), None);
    }

    #[test]
    fn group_fade_reaches_target() {
        let scheduler = SoundScheduler::new();
        scheduler.set_group_volume(0, 0.0, 10);
        for _ in 0..=10 {
            scheduler.update(1.0 / 60.0);
        }
        assert_eq!(scheduler.group_volume(0), 0.0);
    }

    #[test]
    fn stop_with_fade_timeline() {
        let scheduler = SoundScheduler::new();
        let id = scheduler.play_streaming(wav_seconds(10.0, 1000), 0.0, true, 0.0, 0.0);
        assert!(id.is_some());

        // Frame 0: the stop enqueues a 30 frame fade-out.
        scheduler.stop(id, 30);

        let dt = 1.0 / 60.0;
        for frame in 0..=31 {
            scheduler.update(dt);
            let volume = scheduler.volume(id);
            match frame {
                15 => assert!(
                    (0.45..=0.55).contains(&volume),
                    "frame 15 volume {volume}"
                ),
                30 => {
                    assert_eq!(volume, 0.0);
                    assert!(scheduler.is_valid(id), "alive until the sweep");
                }
                31 => assert!(!scheduler.is_valid(id), "deleted one frame later"),
                _ => {}
            }
        }
    }

    #[test]
    fn one_shot_ends_and_is_destroyed() {
        let scheduler = SoundScheduler::new();
        scheduler.register_pooled("beep", wav_seconds(0.05, 1000));
        let id = scheduler.play_pooled("beep", 1.0);
        // 0.05 s of audio at 60 fps is gone after a few frames.
        for _ in 0..10 {
            scheduler.update(1.0 / 60.0);
        }
        assert!(!scheduler.is_valid(id));
    }

    #[test]
    fn pause_freezes_position() {
        let scheduler = SoundScheduler::new();
        scheduler.register_pooled("beep", wav_seconds(1.0, 1000));
        let id = scheduler.play_pooled("beep", 1.0);
        scheduler.pause(id);
        for _ in 0..5 {
            scheduler.update(1.0 / 60.0);
        }
        assert_eq!(scheduler.position_seconds(id), 0.0);
        scheduler.resume(id);
        scheduler.update(1.0 / 60.0);
        assert!(scheduler.position_seconds(id) > 0.0);
    }
}

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

//! The stage stack: named game states with queued transitions and a
//! parameter bag handed to the entered stage.

use crate::{scene::graph::Graph, storage::Storage};
use crate::core::log::Log;
use crate::sound::SoundScheduler;
use fxhash::FxHashMap;

/// Identifier of a registered stage.
pub type StageId = i32;

/// One value of a stage parameter bag.
#[derive(Clone, Debug, PartialEq)]
pub enum ParamValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Blob(Vec<u8>),
}

/// Ordered string-keyed parameter bag. Insertion order is preserved;
/// setting an existing key overwrites in place.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StageParams {
    entries: Vec<(String, ParamValue)>,
}

impl StageParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set<S: Into<String>>(&mut self, key: S, value: ParamValue) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn with<S: Into<String>>(mut self, key: S, value: ParamValue) -> Self {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.get(key) {
            Some(ParamValue::Str(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        match self.get(key) {
            Some(ParamValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_float(&self, key: &str) -> Option<f64> {
        match self.get(key) {
            Some(ParamValue::Float(v)) => Some(*v),
            Some(ParamValue::Int(v)) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get(key) {
            Some(ParamValue::Bool(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_blob(&self, key: &str) -> Option<&[u8]> {
        match self.get(key) {
            Some(ParamValue::Blob(v)) => Some(v.as_slice()),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The engine services a stage hook can reach.
pub struct StageContext<'a> {
    pub graph: &'a mut Graph,
    pub audio: &'a SoundScheduler,
    pub storage: &'a Storage,
    pub params: &'a StageParams,
    /// Frames since the stage was entered.
    pub clock: u64,
}

/// A named game state.
#[allow(unused_variables)]
pub trait Stage: 'static {
    fn on_enter(&mut self, ctx: &mut StageContext) {}

    fn on_exit(&mut self, ctx: &mut StageContext) {}

    /// Polled every frame without a queued transition; answering with an id
    /// schedules it.
    fn query_next_stage(&self) -> Option<StageId> {
        None
    }
}

/// See module docs.
pub struct StageManager {
    stages: FxHashMap<StageId, Box<dyn Stage>>,
    current: Option<StageId>,
    next: Option<(StageId, StageParams)>,
    params: StageParams,
    clock: u64,
    // Fired while a transition is being committed; may rewrite the params
    // the new stage will receive.
    changing_callback: Option<Box<dyn FnMut(StageId, &mut StageParams)>>,
}

impl Default for StageManager {
    fn default() -> Self {
        Self::new()
    }
}

impl StageManager {
    pub fn new() -> Self {
        Self {
            stages: Default::default(),
            current: None,
            next: None,
            params: StageParams::default(),
            clock: 0,
            changing_callback: None,
        }
    }

    /// Registers a stage under an id. Re-registering an id replaces the old
    /// stage.
    pub fn add_stage<S: Stage>(&mut self, id: StageId, stage: S) {
        self.stages.insert(id, Box::new(stage));
    }

    /// Queues a transition; it is committed in the scheduler's pre-frame
    /// phase. An unregistered id is refused with a log entry.
    pub fn set_next_stage(&mut self, id: StageId, params: StageParams) {
        if !self.stages.contains_key(&id) {
            Log::err(format!("no stage registered under id {id}"));
            return;
        }
        self.next = Some((id, params));
    }

    /// Re-enters the current stage with its current parameters.
    pub fn restart(&mut self) {
        if let Some(current) = self.current {
            self.next = Some((current, self.params.clone()));
        }
    }

    #[inline]
    pub fn current_id(&self) -> Option<StageId> {
        self.current
    }

    /// Parameters of the current stage.
    #[inline]
    pub fn params(&self) -> &StageParams {
        &self.params
    }

    /// Frames since the last transition.
    #[inline]
    pub fn clock(&self) -> u64 {
        self.clock
    }

    pub fn set_changing_callback(
        &mut self,
        callback: Option<Box<dyn FnMut(StageId, &mut StageParams)>>,
    ) {
        self.changing_callback = callback;
    }

    /// The pre-frame transition step. `requested` carries a transition
    /// request collected elsewhere (the action poll); it only applies when
    /// no transition is already queued.
    pub fn process(
        &mut self,
        graph: &mut Graph,
        audio: &SoundScheduler,
        storage: &Storage,
        requested: Option<StageId>,
    ) {
        if self.next.is_none() {
            // Ask the current stage, then the outside request.
            let wanted = self
                .current
                .and_then(|id| self.stages.get(&id))
                .and_then(|stage| stage.query_next_stage())
                .or(requested);
            if let Some(id) = wanted {
                if self.stages.contains_key(&id) {
                    self.next = Some((id, StageParams::default()));
                } else {
                    Log::err(format!("stage poll requested unknown id {id}"));
                }
            }
        }

        let Some((next_id, mut next_params)) = self.next.take() else {
            self.clock += 1;
            return;
        };

        if let Some(callback) = self.changing_callback.as_mut() {
            callback(next_id, &mut next_params);
        }

        if let Some(current) = self.current {
            if let Some(mut stage) = self.stages.remove(&current) {
                let mut ctx = StageContext {
                    graph,
                    audio,
                    storage,
                    params: &self.params,
                    clock: self.clock,
                };
                stage.on_exit(&mut ctx);
                self.stages.insert(current, stage);
            }
        }

        self.current = Some(next_id);
        self.clock = 0;
        self.params = next_params;

        if let Some(mut stage) = self.stages.remove(&next_id) {
            let mut ctx = StageContext {
                graph,
                audio,
                storage,
                params: &self.params,
                clock: self.clock,
            };
            stage.on_enter(&mut ctx);
            self.stages.insert(next_id, stage);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Default)]
    struct Probe {
        label: &'static str,
    }

    impl Stage for Probe {
        fn on_enter(&mut self, ctx: &mut StageContext) {
            ctx.graph
                .add_node(crate::scene::node::NodeBuilder::new()
                    .with_name(format!("entered-{}", self.label))
                    .build());
        }
    }

    fn services() -> (Graph, SoundScheduler, Storage) {
        (Graph::new(), SoundScheduler::new(), Storage::new())
    }

    #[test]
    fn transition_resets_clock_and_writes_params() {
        let (mut graph, audio, storage) = services();
        let mut stages = StageManager::new();
        stages.add_stage(0, Probe { label: "zero" });
        stages.add_stage(1, Probe { label: "one" });

        stages.set_next_stage(0, StageParams::default());
        stages.process(&mut graph, &audio, &storage, None);
        assert_eq!(stages.current_id(), Some(0));
        assert_eq!(stages.clock(), 0);

        // Frames without a transition tick the clock.
        stages.process(&mut graph, &audio, &storage, None);
        stages.process(&mut graph, &audio, &storage, None);
        assert_eq!(stages.clock(), 2);

        let params = StageParams::new().with("level", ParamValue::Str("3".into()));
        stages.set_next_stage(1, params);
        stages.process(&mut graph, &audio, &storage, None);
        assert_eq!(stages.current_id(), Some(1));
        assert_eq!(stages.clock(), 0);
        assert_eq!(stages.params().get_str("level"), Some("3"));
    }

    #[test]
    fn unknown_stage_is_refused() {
        let (mut graph, audio, storage) = services();
        let mut stages = StageManager::new();
        stages.set_next_stage(7, StageParams::default());
        stages.process(&mut graph, &audio, &storage, None);
        assert_eq!(stages.current_id(), None);
    }

    #[test]
    fn changing_callback_rewrites_params() {
        let (mut graph, audio, storage) = services();
        let mut stages = StageManager::new();
        stages.add_stage(0, Probe { label: "zero" });
        stages.set_changing_callback(Some(Box::new(|_, params| {
            params.set("injected", ParamValue::Bool(true));
        })));
        stages.set_next_stage(0, StageParams::default());
        stages.process(&mut graph, &audio, &storage, None);
        assert_eq!(stages.params().get_bool("injected"), Some(true));
    }

    #[test]
    fn restart_reenters_with_same_params() {
        let (mut graph, audio, storage) = services();
        let mut stages = StageManager::new();
        stages.add_stage(0, Probe { label: "zero" });
        stages.set_next_stage(
            0,
            StageParams::new().with("keep", ParamValue::Int(9)),
        );
        stages.process(&mut graph, &audio, &storage, None);
        stages.process(&mut graph, &audio, &storage, None);
        assert_eq!(stages.clock(), 1);

        stages.restart();
        stages.process(&mut graph, &audio, &storage, None);
        assert_eq!(stages.clock(), 0);
        assert_eq!(stages.params().get_int("keep"), Some(9));
    }

    #[test]
    fn params_bag_semantics() {
        let mut params = StageParams::new();
        params.set("a", ParamValue::Int(1));
        params.set("b", ParamValue::Str("x".into()));
        params.set("a", ParamValue::Int(2));
        // Overwrite keeps insertion order.
        let keys: Vec<&str> = params.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(params.get_int("a"), Some(2));
        assert_eq!(params.get_float("a"), Some(2.0));
        assert!(params.get("missing").is_none());
    }
}

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

//! The frame scheduler.
//!
//! Every frame runs the same fixed phase sequence: pre-frame callbacks and
//! the stage transition, signal delivery, the system tick, the gameplay tick
//! (two sub-passes), the audio tick, the render build, the render flush,
//! present, and finally deferred node destruction. Debug pause skips the
//! gameplay tick only; system nodes and managers keep running.

pub mod error;

use crate::{
    renderer::{device::GraphicsDevice, Renderer},
    scene::{
        graph::{Graph, TickFlags},
        node::Node,
        signal::Signal,
    },
    stage::StageManager,
    storage::Storage,
};
use crate::core::pool::Handle;
use crate::sound::SoundScheduler;
use std::time::{Duration, Instant};

/// Scheduler phase, as observed by inspector taps.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    PreFrame,
    Signals,
    SystemTick,
    GameplayTick,
    Audio,
    RenderBuild,
    RenderFlush,
    Present,
    Destruction,
}

/// Engine configuration consumed by [`Engine::new`].
#[derive(Clone, Debug)]
pub struct EngineInitParams {
    /// Backbuffer size in pixels.
    pub resolution: (u32, u32),
    /// Fixed tick rate of the main loop.
    pub target_fps: u32,
    /// Amount of audio mixer groups.
    pub audio_group_count: usize,
}

impl Default for EngineInitParams {
    fn default() -> Self {
        Self {
            resolution: (640, 480),
            target_fps: 60,
            audio_group_count: crate::sound::engine::DEFAULT_GROUP_COUNT,
        }
    }
}

/// The services a manager callback can reach.
pub struct ManagerContext<'a> {
    pub graph: &'a mut Graph,
    pub stages: &'a mut StageManager,
    pub audio: &'a SoundScheduler,
    pub storage: &'a mut Storage,
    pub renderer: &'a mut Renderer,
    pub dt: f32,
    pub frame: u64,
}

/// A callback bundle plugged into the scheduler. Managers are invoked in
/// registration order within each phase; every hook is optional.
#[allow(unused_variables)]
pub trait Manager: 'static {
    /// Once, before the first frame of [`Engine::run`].
    fn on_start(&mut self, ctx: &mut ManagerContext) {}

    /// Once, after the loop exits.
    fn on_end(&mut self, ctx: &mut ManagerContext) {}

    /// Pre-frame, skipped while debug pause is on.
    fn on_frame(&mut self, ctx: &mut ManagerContext) {}

    /// Pre-frame, runs even under debug pause.
    fn on_app_frame(&mut self, ctx: &mut ManagerContext) {}

    /// A signal went through [`Engine::broadcast_signal`].
    fn on_signal(&mut self, ctx: &mut ManagerContext, signal: &Signal) {}

    /// Gameplay tick, after the node step sub-pass.
    fn on_step(&mut self, ctx: &mut ManagerContext) {}

    /// Render build, after the node render hooks.
    fn on_render(&mut self, ctx: &mut ManagerContext) {}

    /// The destruction phase collected a batch of removed nodes. The
    /// handles are still resolvable inside this call.
    fn on_nodes_removed(&mut self, graph: &Graph, removed: &[Handle<Node>]) {}
}

struct InspectorTap {
    label: String,
    callback: Box<dyn FnMut(Phase)>,
}

/// See module docs.
pub struct Engine {
    pub graph: Graph,
    pub stages: StageManager,
    pub audio: SoundScheduler,
    pub storage: Storage,
    pub renderer: Renderer,

    managers: Vec<Box<dyn Manager>>,
    inspector_taps: Vec<InspectorTap>,

    debug_pause: bool,
    exit_latch: bool,
    frame: u64,
    time_seconds: f32,
    dt: f32,
    frame_budget: Duration,
}

impl Engine {
    pub fn new(params: EngineInitParams) -> Self {
        let fps = params.target_fps.max(1);
        Self {
            graph: Graph::new(),
            stages: StageManager::new(),
            audio: SoundScheduler::with_group_count(params.audio_group_count),
            storage: Storage::new(),
            renderer: Renderer::new(params.resolution),
            managers: Vec::new(),
            inspector_taps: Vec::new(),
            debug_pause: false,
            exit_latch: false,
            frame: 0,
            time_seconds: 0.0,
            dt: 1.0 / fps as f32,
            frame_budget: Duration::from_secs_f64(1.0 / fps as f64),
        }
    }

    /// Registers a manager; phase hooks fire in registration order.
    pub fn add_manager<M: Manager>(&mut self, manager: M) {
        self.managers.push(Box::new(manager));
    }

    /// Registers a labelled tap that observes every phase boundary of every
    /// frame. The backbone of inspectors and snapshot tools.
    pub fn add_inspector_callback<F>(&mut self, callback: F, label: &str)
    where
        F: FnMut(Phase) + 'static,
    {
        self.inspector_taps.push(InspectorTap {
            label: label.to_owned(),
            callback: Box::new(callback),
        });
    }

    pub fn inspector_labels(&self) -> Vec<&str> {
        self.inspector_taps
            .iter()
            .map(|tap| tap.label.as_str())
            .collect()
    }

    /// Latches the exit request; observed at the top of the next loop
    /// iteration.
    pub fn post_exit(&mut self) {
        self.exit_latch = true;
    }

    #[inline]
    pub fn is_exit_requested(&self) -> bool {
        self.exit_latch
    }

    /// Debug pause freezes the gameplay tick; system nodes, managers and
    /// rendering keep going.
    pub fn set_debug_pause(&mut self, paused: bool) {
        self.debug_pause = paused;
    }

    #[inline]
    pub fn debug_pause(&self) -> bool {
        self.debug_pause
    }

    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    #[inline]
    pub fn time_seconds(&self) -> f32 {
        self.time_seconds
    }

    #[inline]
    pub fn dt(&self) -> f32 {
        self.dt
    }

    fn fire_taps(&mut self, phase: Phase) {
        for tap in &mut self.inspector_taps {
            (tap.callback)(phase);
        }
    }

    // One reborrowed context per manager call; managers and services are
    // separate fields so the split borrow is fine.
    fn each_manager<F>(&mut self, mut f: F)
    where
        F: FnMut(&mut dyn Manager, &mut ManagerContext),
    {
        let Self {
            managers,
            graph,
            stages,
            audio,
            storage,
            renderer,
            dt,
            frame,
            ..
        } = self;
        for manager in managers.iter_mut() {
            let mut ctx = ManagerContext {
                graph: &mut *graph,
                stages: &mut *stages,
                audio: &*audio,
                storage: &mut *storage,
                renderer: &mut *renderer,
                dt: *dt,
                frame: *frame,
            };
            f(manager.as_mut(), &mut ctx);
        }
    }

    /// Delivers the signal to managers first, then to every live node whose
    /// tree-combined tag set contains the signal's tag.
    pub fn broadcast_signal(&mut self, signal: Signal) {
        self.each_manager(|manager, ctx| manager.on_signal(ctx, &signal));
        self.graph.broadcast_signal(signal);
    }

    /// Runs one full frame with default tick flags.
    pub fn run_frame(&mut self, device: &mut dyn GraphicsDevice) {
        self.run_frame_with_flags(device, TickFlags::empty());
    }

    /// Runs one full frame. See module docs for the phase order.
    pub fn run_frame_with_flags(&mut self, device: &mut dyn GraphicsDevice, flags: TickFlags) {
        // 1. Pre-frame: external integrations, then the stage transition.
        self.fire_taps(Phase::PreFrame);
        self.each_manager(|manager, ctx| manager.on_app_frame(ctx));
        if !self.debug_pause {
            self.each_manager(|manager, ctx| manager.on_frame(ctx));
        }
        let requested = self.graph.query_requested_stage();
        self.stages
            .process(&mut self.graph, &self.audio, &self.storage, requested);

        // 2. Signal delivery.
        self.fire_taps(Phase::Signals);
        self.graph.deliver_queued_signals();

        // 3. System tick: runs regardless of debug pause.
        self.fire_taps(Phase::SystemTick);
        self.graph.tick_system(self.dt);

        // 4. Gameplay tick.
        self.fire_taps(Phase::GameplayTick);
        if !self.debug_pause || flags.contains(TickFlags::DONT_CARE_PAUSED) {
            self.graph.tick_gameplay(self.dt, flags);
            self.each_manager(|manager, ctx| manager.on_step(ctx));
        }

        // 5. Audio: fades apply once per frame, strictly after gameplay.
        self.fire_taps(Phase::Audio);
        self.audio.update(self.dt);

        // 6. Render build. State observed here is what this frame shows;
        //    later mutations only affect the next frame.
        self.fire_taps(Phase::RenderBuild);
        self.renderer.build(&mut self.graph, self.time_seconds);
        self.each_manager(|manager, ctx| manager.on_render(ctx));

        // 7. Render flush.
        self.fire_taps(Phase::RenderFlush);
        device.begin_scene();
        self.renderer.flush(device, self.time_seconds);
        device.end_scene();

        // 8. Present.
        self.fire_taps(Phase::Present);
        device.present();

        // 9. Deferred destruction.
        self.fire_taps(Phase::Destruction);
        let managers = &mut self.managers;
        self.graph.sweep_removed(|graph, removed| {
            for manager in managers.iter_mut() {
                manager.on_nodes_removed(graph, removed);
            }
        });

        self.frame += 1;
        self.time_seconds += self.dt;
    }

    /// The main loop: frames at the target rate until [`Self::post_exit`].
    pub fn run(&mut self, device: &mut dyn GraphicsDevice) {
        self.each_manager(|manager, ctx| manager.on_start(ctx));

        while !self.exit_latch {
            let frame_start = Instant::now();
            self.run_frame(device);
            // Frame pacing: sleep away the remainder of the frame budget.
            let elapsed = frame_start.elapsed();
            if elapsed < self.frame_budget {
                std::thread::sleep(self.frame_budget - elapsed);
            }
        }

        self.each_manager(|manager, ctx| manager.on_end(ctx));
    }

    /// Device-lost notification from the backend: resources back themselves
    /// up and release their device objects.
    pub fn on_device_lost(&mut self, device: &mut dyn GraphicsDevice) {
        self.renderer.on_device_lost(device);
    }

    /// Device-reset notification: resources are recreated from backups.
    pub fn on_device_reset(&mut self, device: &mut dyn GraphicsDevice) {
        self.renderer.on_device_reset(device);
    }

    /// Tears the engine down: drains deferred removals, stops the audio
    /// worker and drops all handles.
    pub fn destroy(&mut self) {
        let managers = &mut self.managers;
        self.graph.sweep_removed(|graph, removed| {
            for manager in managers.iter_mut() {
                manager.on_nodes_removed(graph, removed);
            }
        });
        self.audio.shutdown();
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::renderer::device::NullDevice;
    use crate::scene::node::{BehaviorContext, NodeBehavior, NodeBuilder, NodeFlags};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Counter {
        steps: Rc<RefCell<u32>>,
        system_steps: Rc<RefCell<u32>>,
    }

    impl NodeBehavior for Counter {
        fn on_step(&mut self, _ctx: &mut BehaviorContext) {
            *self.steps.borrow_mut() += 1;
        }
        fn on_system_step(&mut self, _ctx: &mut BehaviorContext) {
            *self.system_steps.borrow_mut() += 1;
        }
    }

    #[test]
    fn debug_pause_skips_gameplay_but_not_system() {
        let mut engine = Engine::new(EngineInitParams::default());
        let mut device = NullDevice::new();

        let steps = Rc::new(RefCell::new(0));
        let system_steps = Rc::new(RefCell::new(0));
        NodeBuilder::new()
            .with_flags(NodeFlags::SYSTEM)
            .with_behavior(Counter {
                steps: steps.clone(),
                system_steps: system_steps.clone(),
            })
            .build_in(&mut engine.graph);

        engine.run_frame(&mut device);
        assert_eq!(*steps.borrow(), 1);
        assert_eq!(*system_steps.borrow(), 1);

        engine.set_debug_pause(true);
        engine.run_frame(&mut device);
        assert_eq!(*steps.borrow(), 1, "gameplay tick skipped under pause");
        assert_eq!(*system_steps.borrow(), 2, "system tick still ran");

        // The per-call flag overrides the pause.
        engine.run_frame_with_flags(&mut device, TickFlags::DONT_CARE_PAUSED);
        assert_eq!(*steps.borrow(), 2);
    }

    #[test]
    fn inspector_taps_observe_all_phases() {
        let mut engine = Engine::new(EngineInitParams::default());
        let mut device = NullDevice::new();
        let phases = Rc::new(RefCell::new(Vec::new()));
        let sink = phases.clone();
        engine.add_inspector_callback(move |phase| sink.borrow_mut().push(phase), "probe");
        assert_eq!(engine.inspector_labels(), vec!["probe"]);

        engine.run_frame(&mut device);
        assert_eq!(
            *phases.borrow(),
            vec![
                Phase::PreFrame,
                Phase::Signals,
                Phase::SystemTick,
                Phase::GameplayTick,
                Phase::Audio,
                Phase::RenderBuild,
                Phase::RenderFlush,
                Phase::Present,
                Phase::Destruction,
            ]
        );
    }

    #[test]
    fn present_happens_every_frame() {
        let mut engine = Engine::new(EngineInitParams::default());
        let mut device = NullDevice::new();
        engine.run_frame(&mut device);
        engine.run_frame(&mut device);
        assert_eq!(device.present_count, 2);
        assert_eq!(engine.frame(), 2);
    }

    #[test]
    fn exit_latch_stops_run() {
        struct Quitter {
            frames: u32,
        }
        impl Manager for Quitter {
            fn on_frame(&mut self, ctx: &mut ManagerContext) {
                self.frames += 1;
                let _ = ctx;
            }
        }

        let mut engine = Engine::new(EngineInitParams {
            target_fps: 1000,
            ..Default::default()
        });
        engine.add_manager(Quitter { frames: 0 });
        engine.post_exit();
        let mut device = NullDevice::new();
        engine.run(&mut device);
        // The latch was observed before the first frame.
        assert_eq!(device.present_count, 0);
    }

    #[test]
    fn managers_receive_broadcast_signals() {
        #[derive(Default)]
        struct SignalSink {
            seen: Rc<RefCell<Vec<String>>>,
        }
        impl Manager for SignalSink {
            fn on_signal(&mut self, _ctx: &mut ManagerContext, signal: &Signal) {
                self.seen.borrow_mut().push(signal.tag().to_mutable());
            }
        }

        let mut engine = Engine::new(EngineInitParams::default());
        let seen = Rc::new(RefCell::new(Vec::new()));
        engine.add_manager(SignalSink { seen: seen.clone() });
        engine.broadcast_signal(Signal::new("boom"));
        assert_eq!(*seen.borrow(), vec!["boom".to_owned()]);
    }
}

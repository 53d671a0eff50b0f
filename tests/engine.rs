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

//! End-to-end scenarios driving the whole runtime through real frames.

use ember::prelude::*;
use ember::scene::mesh::shapes;
use std::cell::RefCell;
use std::rc::Rc;

fn engine() -> (Engine, NullDevice) {
    (Engine::new(EngineInitParams::default()), NullDevice::new())
}

#[test]
fn root_plus_child_transform() {
    let (mut engine, mut device) = engine();

    let a = NodeBuilder::new()
        .with_transform(
            TransformBuilder::new()
                .with_position(Vector3::new(100.0, 0.0, 0.0))
                .build(),
        )
        .build_in(&mut engine.graph);
    let b = engine.graph.add_node_to(
        a,
        NodeBuilder::new()
            .with_transform(
                TransformBuilder::new()
                    .with_position(Vector3::new(10.0, 0.0, 0.0))
                    .build(),
            )
            .build(),
    );

    engine.run_frame(&mut device);
    assert_eq!(
        engine.graph.world_position(b),
        Vector3::new(110.0, 0.0, 0.0)
    );
}

#[test]
fn deferred_removal_from_own_step() {
    struct RemoveSelf {
        steps: Rc<RefCell<u32>>,
    }
    impl NodeBehavior for RemoveSelf {
        fn on_step(&mut self, ctx: &mut BehaviorContext) {
            *self.steps.borrow_mut() += 1;
            let handle = ctx.handle;
            ctx.graph.remove_node(handle);
        }
    }

    struct RemovalLog {
        removed: Rc<RefCell<Vec<Handle<Node>>>>,
    }
    impl Manager for RemovalLog {
        fn on_nodes_removed(&mut self, _graph: &Graph, removed: &[Handle<Node>]) {
            self.removed.borrow_mut().extend_from_slice(removed);
        }
    }

    let (mut engine, mut device) = engine();
    let steps = Rc::new(RefCell::new(0));
    let removed = Rc::new(RefCell::new(Vec::new()));
    engine.add_manager(RemovalLog {
        removed: removed.clone(),
    });

    let n = NodeBuilder::new()
        .with_behavior(RemoveSelf {
            steps: steps.clone(),
        })
        .build_in(&mut engine.graph);

    for _ in 0..5 {
        engine.run_frame(&mut device);
    }

    // The step hook ran exactly once and the removing callback saw the node
    // exactly once.
    assert_eq!(*steps.borrow(), 1);
    assert_eq!(*removed.borrow(), vec![n]);
    assert!(!engine.graph.is_valid_handle(n));
}

#[test]
fn delayed_signal_delivery_frame() {
    struct PingSink {
        deliveries: Rc<RefCell<Vec<(u64, i64)>>>,
    }
    impl NodeBehavior for PingSink {
        fn on_signal(&mut self, ctx: &mut BehaviorContext, signal: &Signal) -> bool {
            if signal.is("ping") {
                self.deliveries
                    .borrow_mut()
                    .push((ctx.frame, signal.int_arg("x").unwrap_or(-1)));
            }
            false
        }
    }

    let (mut engine, mut device) = engine();
    let deliveries = Rc::new(RefCell::new(Vec::new()));
    let n = NodeBuilder::new()
        .with_behavior(PingSink {
            deliveries: deliveries.clone(),
        })
        .build_in(&mut engine.graph);

    // Let ten frames pass first.
    for _ in 0..10 {
        engine.run_frame(&mut device);
    }
    assert_eq!(engine.frame(), 10);

    engine
        .graph
        .send_signal_delayed(n, Signal::new("ping").with_arg("x", 7i64), 3);

    for _ in 0..10 {
        engine.run_frame(&mut device);
    }

    let deliveries = deliveries.borrow();
    assert_eq!(deliveries.len(), 1, "delivered exactly once");
    let (at_tick, x) = deliveries[0];
    assert_eq!(x, 7);
    // Sent right after frame 10 completed; the third signal phase after
    // that belongs to frame 13, whose gameplay tick (which advances the
    // counter behaviors observe from 12 to 13) has not run yet.
    assert_eq!(at_tick, 12);
}

#[test]
fn delayed_signal_to_removed_node_is_dropped() {
    struct PingSink {
        count: Rc<RefCell<u32>>,
    }
    impl NodeBehavior for PingSink {
        fn on_signal(&mut self, _ctx: &mut BehaviorContext, _signal: &Signal) -> bool {
            *self.count.borrow_mut() += 1;
            false
        }
    }

    let (mut engine, mut device) = engine();
    let count = Rc::new(RefCell::new(0));
    let n = NodeBuilder::new()
        .with_behavior(PingSink { count: count.clone() })
        .build_in(&mut engine.graph);

    engine
        .graph
        .send_signal_delayed(n, Signal::new("ping"), 5);
    engine.run_frame(&mut device);
    engine.graph.remove_node(n);
    for _ in 0..10 {
        engine.run_frame(&mut device);
    }
    assert_eq!(*count.borrow(), 0, "signal died with its target");
}

#[test]
fn draw_list_fusion_of_hundred_quads() {
    struct QuadWall;
    impl NodeBehavior for QuadWall {
        fn on_render(&mut self, ctx: &mut RenderContext) {
            let mut mesh = Mesh::new();
            for i in 0..100 {
                let x = i as f32 * 2.0;
                shapes::make_quad(
                    &mut mesh,
                    Vector2::new(x, 0.0),
                    Vector2::new(x + 1.0, 1.0),
                    Vector2::new(0.0, 0.0),
                    Vector2::new(1.0, 1.0),
                    Color32::WHITE,
                );
            }
            for i in 0..100 {
                ctx.draw_list.add_mesh(&mesh, i);
            }
        }
    }

    let (mut engine, mut device) = engine();
    NodeBuilder::new()
        .with_behavior(QuadWall)
        .build_in(&mut engine.graph);

    engine.run_frame(&mut device);

    assert_eq!(device.draws.len(), 1, "one fused submission");
    assert_eq!(device.draws[0].index_count, 600);
    assert_eq!(device.draws[0].primitive, Primitive::Triangles);
}

#[test]
fn audio_stop_with_fade_timeline() {
    let (mut engine, mut device) = engine();

    let bytes = {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = std::io::Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for i in 0..8000u32 * 5 {
                writer.write_sample((i % 64) as i16).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    };

    let id = engine.audio.play_streaming(bytes, 0.0, true, 0.0, 0.0);
    assert!(id.is_some());
    assert_eq!(engine.audio.volume(id), 1.0);

    engine.audio.stop(id, 30);

    for frame in 0..=31u32 {
        engine.run_frame(&mut device);
        let volume = engine.audio.volume(id);
        match frame {
            15 => assert!((0.45..=0.55).contains(&volume), "frame 15: {volume}"),
            30 => {
                assert_eq!(volume, 0.0);
                assert!(engine.audio.is_valid(id));
            }
            31 => assert!(!engine.audio.is_valid(id)),
            _ => {}
        }
    }
}

#[test]
fn stage_transition_order_params_and_clock() {
    #[derive(Clone, Default)]
    struct EventLog(Rc<RefCell<Vec<String>>>);

    struct LoggingStage {
        name: &'static str,
        log: EventLog,
    }
    impl LoggingStage {
        fn push(&self, entry: String) {
            self.log.0.borrow_mut().push(entry);
        }
    }
    impl Stage for LoggingStage {
        fn on_enter(&mut self, ctx: &mut StageContext) {
            self.push(format!("enter-{}", self.name));
            if let Some(level) = ctx.params.get_str("level") {
                self.push(format!("level-{level}"));
            }
        }
        fn on_exit(&mut self, _ctx: &mut StageContext) {
            self.push(format!("exit-{}", self.name));
        }
    }

    let (mut engine, mut device) = engine();
    let log = EventLog::default();
    engine.stages.add_stage(0, LoggingStage { name: "zero", log: log.clone() });
    engine.stages.add_stage(1, LoggingStage { name: "one", log: log.clone() });

    engine.stages.set_next_stage(0, StageParams::default());
    engine.run_frame(&mut device);
    assert_eq!(engine.stages.current_id(), Some(0));

    engine.run_frame(&mut device);
    assert!(engine.stages.clock() > 0);

    engine.stages.set_next_stage(
        1,
        StageParams::new().with("level", ParamValue::Str("3".into())),
    );
    engine.run_frame(&mut device);

    assert_eq!(engine.stages.current_id(), Some(1));
    assert_eq!(engine.stages.clock(), 0);
    assert_eq!(engine.stages.params().get_str("level"), Some("3"));
    assert_eq!(
        *log.0.borrow(),
        vec![
            "enter-zero".to_owned(),
            "exit-zero".to_owned(),
            "enter-one".to_owned(),
            "level-3".to_owned(),
        ]
    );
}

#[test]
fn action_promotion_protocol() {
    #[derive(Clone, Default)]
    struct EventLog(Rc<RefCell<Vec<String>>>);

    struct LoggingAction {
        name: &'static str,
        log: EventLog,
    }
    impl Action for LoggingAction {
        fn on_enter(&mut self, _ctx: &mut BehaviorContext) {
            self.log.0.borrow_mut().push(format!("enter-{}", self.name));
        }
        fn on_step(&mut self, _ctx: &mut BehaviorContext) {
            self.log.0.borrow_mut().push(format!("step-{}", self.name));
        }
        fn on_exit(&mut self, _ctx: &mut BehaviorContext) {
            self.log.0.borrow_mut().push(format!("exit-{}", self.name));
        }
    }

    let (mut engine, mut device) = engine();
    let log = EventLog::default();
    let n = NodeBuilder::new().build_in(&mut engine.graph);

    engine.graph[n].set_action(
        Some(Box::new(LoggingAction { name: "a", log: log.clone() })),
        true,
    );
    engine.run_frame(&mut device);
    assert_eq!(*log.0.borrow(), vec!["enter-a", "step-a"]);

    engine.run_frame(&mut device);
    assert_eq!(
        *log.0.borrow(),
        vec!["enter-a", "step-a", "step-a"]
    );

    // Replacing exits the old action before entering the new one.
    engine.graph[n].set_action(
        Some(Box::new(LoggingAction { name: "b", log: log.clone() })),
        true,
    );
    engine.run_frame(&mut device);
    assert_eq!(
        *log.0.borrow(),
        vec!["enter-a", "step-a", "step-a", "exit-a", "enter-b", "step-b"]
    );

    // Removal exits exactly once.
    engine.graph.remove_node(n);
    engine.run_frame(&mut device);
    engine.run_frame(&mut device);
    assert_eq!(
        log.0.borrow().last().map(String::as_str),
        Some("exit-b")
    );
    assert_eq!(
        log.0
            .borrow()
            .iter()
            .filter(|e| e.as_str() == "exit-b")
            .count(),
        1
    );
}

#[test]
fn deferred_action_promotion_waits_one_frame() {
    #[derive(Clone, Default)]
    struct EventLog(Rc<RefCell<Vec<String>>>);

    struct Entering {
        log: EventLog,
    }
    impl Action for Entering {
        fn on_enter(&mut self, _ctx: &mut BehaviorContext) {
            self.log.0.borrow_mut().push("enter".into());
        }
        fn on_step(&mut self, _ctx: &mut BehaviorContext) {
            self.log.0.borrow_mut().push("step".into());
        }
    }

    let (mut engine, mut device) = engine();
    let log = EventLog::default();
    let n = NodeBuilder::new().build_in(&mut engine.graph);

    engine.graph[n].set_action(Some(Box::new(Entering { log: log.clone() })), false);
    engine.run_frame(&mut device);
    assert!(log.0.borrow().is_empty(), "staged action sits out one frame");

    engine.run_frame(&mut device);
    assert_eq!(*log.0.borrow(), vec!["enter".to_owned(), "step".to_owned()]);
}

#[test]
fn action_can_request_stage_transition() {
    struct Requester;
    impl Action for Requester {
        fn query_next_stage(&self) -> Option<StageId> {
            Some(5)
        }
    }

    struct Empty;
    impl Stage for Empty {}

    let (mut engine, mut device) = engine();
    engine.stages.add_stage(5, Empty);
    let n = NodeBuilder::new().build_in(&mut engine.graph);
    engine.graph[n].set_action(Some(Box::new(Requester)), true);

    // Frame 1 promotes the action; frame 2's pre-frame poll sees the
    // request and commits the transition.
    engine.run_frame(&mut device);
    engine.run_frame(&mut device);
    assert_eq!(engine.stages.current_id(), Some(5));
    assert_eq!(engine.stages.clock(), 0);
}

#[test]
fn tag_broadcast_reaches_tagged_tree() {
    struct TagSink {
        hits: Rc<RefCell<u32>>,
    }
    impl NodeBehavior for TagSink {
        fn on_signal(&mut self, _ctx: &mut BehaviorContext, signal: &Signal) -> bool {
            if signal.is("enemies") {
                *self.hits.borrow_mut() += 1;
            }
            false
        }
    }

    let (mut engine, _device) = engine();
    let hits = Rc::new(RefCell::new(0));

    let tagged = NodeBuilder::new()
        .with_tag("enemies")
        .with_inheritable_tags()
        .with_behavior(TagSink { hits: hits.clone() })
        .build_in(&mut engine.graph);
    // The child inherits the tag and also receives the broadcast.
    engine.graph.add_node_to(
        tagged,
        NodeBuilder::new()
            .with_behavior(TagSink { hits: hits.clone() })
            .build(),
    );
    // An untagged bystander does not.
    NodeBuilder::new()
        .with_behavior(TagSink { hits: hits.clone() })
        .build_in(&mut engine.graph);

    engine.broadcast_signal(Signal::new("enemies"));
    assert_eq!(*hits.borrow(), 2);
}

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

//! Ember - the deterministic core runtime of a 2D/2.5D game engine.
//!
//! The pieces that cooperate every frame: a scene graph with lazily
//! inherited state ([`scene`]), a fixed-order frame scheduler ([`engine`]),
//! a per-node cooperative action machine ([`scene::action`]), a draw-list
//! that fuses compatible batches ([`renderer`]), a background-threaded
//! audio scheduler (re-exported as [`sound`]), a stage stack ([`stage`])
//! and a storage façade ([`storage`]).

pub use ember_core as core;
pub use ember_math as math;
pub use ember_sound as sound;

pub mod engine;
pub mod renderer;
pub mod scene;
pub mod stage;
pub mod storage;

/// The types most gameplay code needs.
pub mod prelude {
    pub use crate::core::{
        algebra::{Matrix4, UnitQuaternion, Vector2, Vector3, Vector4},
        color::{Color, Color32},
        log::Log,
        pool::Handle,
        shared::{Shared, WeakShared},
        sstorage::ImmutableString,
    };
    pub use crate::engine::{Engine, EngineInitParams, Manager, ManagerContext, Phase};
    pub use crate::renderer::{
        device::{Blend, Filter, GraphicsDevice, NullDevice, TextureFormat},
        draw_list::DrawList,
        material::Material,
        Renderer,
    };
    pub use crate::scene::{
        action::Action,
        graph::{Graph, TickFlags},
        mesh::{Mesh, Primitive, SubMesh, Vertex},
        node::{
            BehaviorContext, Node, NodeBehavior, NodeBuilder, NodeFlags, NodeId, RenderContext,
        },
        signal::{Signal, SignalValue},
        transform::{Transform, TransformBuilder},
    };
    pub use crate::sound::{SoundId, SoundScheduler};
    pub use crate::stage::{ParamValue, Stage, StageContext, StageId, StageManager, StageParams};
    pub use crate::storage::{DirProvider, MemoryProvider, Storage, StorageProvider};
}

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use strum_macros::Display;

/// Opaque handle to a sprite owned by the rendering collaborator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpriteId(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SpriteKind {
    AnswerObject,
    Ship,
    Laser,
    ProgressIndicator,
    FeedbackPopup,
    SandboxPopup,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SoundId {
    Shoot,
    Explosion,
    Success,
    Failure,
    Pop,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StageArea {
    pub width: f32,
    pub height: f32,
}

/// The rendering/physics service the core talks to. The core issues only
/// declarative requests, owns no rendering resources, and releases every
/// handle it created on round and session teardown. Destroying an unknown
/// or already-destroyed handle must be tolerated silently.
pub trait Stage {
    fn create_sprite(&mut self, kind: SpriteKind, x: f32, y: f32) -> SpriteId;
    fn set_velocity(&mut self, id: SpriteId, vx: f32, vy: f32);
    fn set_scale(&mut self, id: SpriteId, scale: f32);
    /// Dim or undim a sprite; used by the reveal hint on distractors.
    fn set_dimmed(&mut self, id: SpriteId, dimmed: bool);
    fn play_sound(&mut self, sound: SoundId);
    /// Fire-and-forget numeric tween; completion, if the host cares,
    /// arrives back through the command intake.
    fn tween_scale(&mut self, id: SpriteId, target: f32, duration_ms: u32);
    fn destroy(&mut self, id: SpriteId);
    fn area(&self) -> StageArea;
}

/// Everything a `RecordingStage` saw, in call order.
#[derive(Clone, Debug, PartialEq)]
pub enum StageCall {
    Create {
        id: SpriteId,
        kind: SpriteKind,
        x: f32,
        y: f32,
    },
    Velocity {
        id: SpriteId,
        vx: f32,
        vy: f32,
    },
    Scale {
        id: SpriteId,
        scale: f32,
    },
    Dim {
        id: SpriteId,
        dimmed: bool,
    },
    Sound(SoundId),
    Tween {
        id: SpriteId,
        target: f32,
        duration_ms: u32,
    },
    Destroy(SpriteId),
}

/// Headless stage that records every request. Backs the integration tests
/// and the simulator; also a reference for host adapters.
#[derive(Debug)]
pub struct RecordingStage {
    next_id: u64,
    area: StageArea,
    pub calls: Vec<StageCall>,
    live: HashSet<SpriteId>,
}

impl RecordingStage {
    pub fn new() -> Self {
        Self::with_area(StageArea {
            width: 1920.0,
            height: 1080.0,
        })
    }

    pub fn with_area(area: StageArea) -> Self {
        Self {
            next_id: 0,
            area,
            calls: Vec::new(),
            live: HashSet::new(),
        }
    }

    pub fn live_sprites(&self) -> usize {
        self.live.len()
    }

    pub fn is_live(&self, id: SpriteId) -> bool {
        self.live.contains(&id)
    }

    pub fn sounds_played(&self) -> Vec<SoundId> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                StageCall::Sound(s) => Some(*s),
                _ => None,
            })
            .collect()
    }

    pub fn created_of_kind(&self, kind: SpriteKind) -> Vec<SpriteId> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                StageCall::Create { id, kind: k, .. } if *k == kind => Some(*id),
                _ => None,
            })
            .collect()
    }
}

impl Default for RecordingStage {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage for RecordingStage {
    fn create_sprite(&mut self, kind: SpriteKind, x: f32, y: f32) -> SpriteId {
        let id = SpriteId(self.next_id);
        self.next_id += 1;
        self.live.insert(id);
        self.calls.push(StageCall::Create { id, kind, x, y });
        id
    }

    fn set_velocity(&mut self, id: SpriteId, vx: f32, vy: f32) {
        self.calls.push(StageCall::Velocity { id, vx, vy });
    }

    fn set_scale(&mut self, id: SpriteId, scale: f32) {
        self.calls.push(StageCall::Scale { id, scale });
    }

    fn set_dimmed(&mut self, id: SpriteId, dimmed: bool) {
        self.calls.push(StageCall::Dim { id, dimmed });
    }

    fn play_sound(&mut self, sound: SoundId) {
        self.calls.push(StageCall::Sound(sound));
    }

    fn tween_scale(&mut self, id: SpriteId, target: f32, duration_ms: u32) {
        self.calls.push(StageCall::Tween {
            id,
            target,
            duration_ms,
        });
    }

    fn destroy(&mut self, id: SpriteId) {
        // Double-destroy is tolerated at this boundary.
        if self.live.remove(&id) {
            self.calls.push(StageCall::Destroy(id));
        }
    }

    fn area(&self) -> StageArea {
        self.area
    }
}

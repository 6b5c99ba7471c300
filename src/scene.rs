use serde::{Deserialize, Serialize};
use strum_macros::Display;

use crate::config::ControlScheme;

/// Top-level phases. Always starts in `Welcome`; `GameOver` re-enters
/// `Playing` only through an explicit restart command.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ScenePhase {
    Welcome,
    Playing,
    GameOver,
}

/// The one input that leaves the welcome screen, per control scheme.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StartTrigger {
    SpaceKey,
    PointerDown,
}

pub fn start_trigger(controls: ControlScheme) -> StartTrigger {
    match controls {
        ControlScheme::ArrowKeys => StartTrigger::SpaceKey,
        ControlScheme::TapToSelect => StartTrigger::PointerDown,
    }
}

/// Instruction copy for the welcome screen.
pub fn welcome_text(controls: ControlScheme) -> &'static str {
    match controls {
        ControlScheme::ArrowKeys => {
            "Steer with the LEFT and RIGHT arrow keys and shoot the right answer with SPACE.\nPress SPACE to start!"
        }
        ControlScheme::TapToSelect => {
            "Tap the object showing the right answer before it drifts away.\nTap anywhere to start!"
        }
    }
}

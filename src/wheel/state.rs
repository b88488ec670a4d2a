// ==============================================================================
// state.rs - WHEEL LIFECYCLE TAG
// ------------------------------------------------------------------------------
// Five-state lifecycle shared by the controller and every submodule. The tag is
// persisted as an upper-case string ("DEPLOYED", ...). Only the controller
// mutates it; submodules read it from their hook context.
// ==============================================================================

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::WheelError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WheelState {
    Retracted,
    Retracting,
    #[default]
    Deployed,
    Deploying,
    Broken,
}

impl WheelState {
    pub const ALL: [WheelState; 5] = [
        WheelState::Retracted,
        WheelState::Retracting,
        WheelState::Deployed,
        WheelState::Deploying,
        WheelState::Broken,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WheelState::Retracted => "RETRACTED",
            WheelState::Retracting => "RETRACTING",
            WheelState::Deployed => "DEPLOYED",
            WheelState::Deploying => "DEPLOYING",
            WheelState::Broken => "BROKEN",
        }
    }

    /// A state with an animation in flight.
    pub fn is_moving(&self) -> bool {
        matches!(self, WheelState::Retracting | WheelState::Deploying)
    }

    /// Edges the deploy/retract logic and the damage/repair actions produce.
    ///
    /// The controller itself applies any edge; this is only used to flag
    /// transitions nothing in the crate would normally request.
    pub fn is_expected_edge(from: WheelState, to: WheelState) -> bool {
        use WheelState::*;
        match (from, to) {
            (_, Broken) => true,
            (Broken, Deployed) | (Broken, Retracted) => true,
            (Retracted, Deploying) | (Retracting, Deploying) => true,
            (Deployed, Retracting) | (Deploying, Retracting) => true,
            (Deploying, Deployed) | (Retracting, Retracted) => true,
            _ => false,
        }
    }
}

impl fmt::Display for WheelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for WheelState {
    type Err = WheelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim();
        WheelState::ALL
            .into_iter()
            .find(|state| state.as_str().eq_ignore_ascii_case(tag))
            .ok_or_else(|| WheelError::UnknownState(tag.to_string()))
    }
}

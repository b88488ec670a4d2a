// ============================================================================
// lib.rs - AVEN WHEEL
// ----------------------------------------------------------------------------
// Vehicle wheel core: per-part wheel controller, suspension solver, contact
// model, anti-roll coupling, landed-state aggregation and pluggable wheel
// submodules. The rapier host in `physics` drives it inside a real world.
// ============================================================================

pub mod config;
pub mod controller;
pub mod error;
pub mod modules;
pub mod physics;
pub mod resources;
pub mod scene;
pub mod submodule;
pub mod telemetry;
pub mod wheel;

pub use config::{PartConfig, VesselConfig};
pub use controller::{PersistedState, SubmoduleId, TickEnv, TickOutcome, WheelController};
pub use error::{Result, WheelError};
pub use submodule::{FrameContext, HookContext, WheelSubmodule};
pub use wheel::{WheelContactModel, WheelState};

// ==============================================================================
// modules/mod.rs - BUILT-IN SUBMODULES
// ------------------------------------------------------------------------------
// build_submodules() instantiates the blocks present in a PartConfig in a
// fixed order. Order matters within a hook (last writer wins):
//
//   deploy -> repulsor -> steering -> motor -> brakes -> tracks -> damage
//
// tracks runs after motor/brakes so it averages their torque; damage runs
// last so it sees the final outputs of the tick.
// ==============================================================================

pub mod brakes;
pub mod damage;
pub mod deploy;
pub mod motor;
pub mod repulsor;
pub mod steering;
pub mod tracks;

pub use brakes::{BrakesConfig, BrakesModule};
pub use damage::{DamageCause, DamageConfig, DamageModule};
pub use deploy::{toggle_deployment, DeployConfig, DeployModule, DeploymentStateMachine, ToggleOutcome};
pub use motor::{MotorConfig, MotorModule};
pub use repulsor::{RepulsorConfig, RepulsorModule};
pub use steering::{SteeringConfig, SteeringModule};
pub use tracks::{TracksConfig, TracksModule};

use tracing::warn;

use crate::config::PartConfig;
use crate::submodule::WheelSubmodule;

fn wheel_in_range(part: &PartConfig, module: &str, wheel: Option<usize>) -> bool {
    match wheel {
        Some(index) if index >= part.wheels.len() => {
            warn!(
                part = %part.name,
                module,
                index,
                count = part.wheels.len(),
                "submodule targets a missing wheel, skipped"
            );
            false
        }
        _ => true,
    }
}

pub fn build_submodules(part: &PartConfig) -> Vec<Box<dyn WheelSubmodule>> {
    let mut out: Vec<Box<dyn WheelSubmodule>> = Vec::new();

    if let Some(cfg) = &part.deployment {
        out.push(Box::new(DeployModule::new(cfg, part.default_state)));
    }
    if let Some(cfg) = part.repulsor.as_ref().filter(|c| wheel_in_range(part, "repulsor", c.wheel)) {
        out.push(Box::new(RepulsorModule::new(cfg.clone())));
    }
    if let Some(cfg) = part.steering.as_ref().filter(|c| wheel_in_range(part, "steering", c.wheel)) {
        out.push(Box::new(SteeringModule::new(cfg.clone())));
    }
    if let Some(cfg) = part.motor.as_ref().filter(|c| wheel_in_range(part, "motor", c.wheel)) {
        out.push(Box::new(MotorModule::new(cfg.clone())));
    }
    if let Some(cfg) = part.brakes.as_ref().filter(|c| wheel_in_range(part, "brakes", c.wheel)) {
        out.push(Box::new(BrakesModule::new(cfg.clone())));
    }
    if let Some(cfg) = &part.tracks {
        out.push(Box::new(TracksModule::new(cfg.clone())));
    }
    if let Some(cfg) = part.damage.as_ref().filter(|c| wheel_in_range(part, "damage", c.wheel)) {
        out.push(Box::new(DamageModule::new(cfg.clone())));
    }

    out
}

// ==============================================================================
// deploy.rs - DEPLOY / RETRACT STATE MACHINE
// ------------------------------------------------------------------------------
// Toggle intents become WheelState transitions:
//   RETRACTED | RETRACTING -> DEPLOYING
//   DEPLOYED  | DEPLOYING  -> RETRACTING   (in flight: reverses immediately)
//   BROKEN                 -> no-op
//
// Gating: one-shot lock, current state, resource cost drawn all-or-nothing
// (a short draw is refunded and the toggle does nothing).
//
// Animation progress is an explicit [0,1] value advanced from the frame hook.
// The module requests DEPLOYED / RETRACTED when progress reaches an end.
// ==============================================================================

use std::any::Any;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::controller::WheelController;
use crate::resources::ResourcePool;
use crate::submodule::{FrameContext, SetupInfo, WheelSubmodule};
use crate::wheel::WheelState;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    pub animation: String, // cosmetic clip name
    pub duration: f32,     // s at speed 1
    pub speed: f32,
    pub one_shot: bool,
    pub resource: Option<String>,
    pub deploy_cost: f64,
    pub retract_cost: f64,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            animation: "deploy".to_string(),
            duration: 1.5,
            speed: 1.0,
            one_shot: false,
            resource: None,
            deploy_cost: 0.0,
            retract_cost: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ToggleOutcome {
    /// The controller should move to this state.
    Transition(WheelState),
    /// One-shot gear that has already deployed.
    Locked,
    /// Not enough resource; nothing was consumed.
    Insufficient { needed: f64, available: f64 },
    /// Toggle has no meaning in the current state (BROKEN).
    Ignored,
    /// The controller has no deployment module.
    NoDeployModule,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeploymentStateMachine {
    one_shot: bool,
    locked: bool,
    resource: Option<String>,
    deploy_cost: f64,
    retract_cost: f64,
    rate: f32, // progress per second
    progress: f32,
}

impl DeploymentStateMachine {
    pub fn new(config: &DeployConfig, initial: WheelState) -> Self {
        let duration = config.duration.max(1e-3);
        let mut machine = Self {
            one_shot: config.one_shot,
            locked: false,
            resource: config.resource.clone(),
            deploy_cost: config.deploy_cost.max(0.0),
            retract_cost: config.retract_cost.max(0.0),
            rate: config.speed.max(0.0) / duration,
            progress: 0.0,
        };
        machine.sync_to_state(initial);
        machine
    }

    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn toggle(&mut self, state: WheelState, pool: &mut dyn ResourcePool) -> ToggleOutcome {
        let (target, cost) = match state {
            WheelState::Broken => return ToggleOutcome::Ignored,
            WheelState::Retracted | WheelState::Retracting => (WheelState::Deploying, self.deploy_cost),
            WheelState::Deployed | WheelState::Deploying => (WheelState::Retracting, self.retract_cost),
        };

        if self.locked {
            debug!(%state, "one-shot gear locked, toggle ignored");
            return ToggleOutcome::Locked;
        }

        if let Some(resource) = self.resource.as_deref().filter(|_| cost > 0.0) {
            let drawn = pool.request(resource, cost);
            if drawn < cost {
                pool.refund(resource, drawn);
                info!(resource, needed = cost, available = drawn, "not enough resource to toggle gear");
                return ToggleOutcome::Insufficient { needed: cost, available: drawn };
            }
        }

        if self.one_shot && target == WheelState::Deploying {
            self.locked = true;
        }
        ToggleOutcome::Transition(target)
    }

    /// Advance animation progress; returns the state to enter on completion.
    pub fn advance(&mut self, state: WheelState, dt: f32) -> Option<WheelState> {
        let step = self.rate * dt.max(0.0);
        match state {
            WheelState::Deploying => {
                self.progress = (self.progress + step).min(1.0);
                (self.progress >= 1.0).then_some(WheelState::Deployed)
            }
            WheelState::Retracting => {
                self.progress = (self.progress - step).max(0.0);
                (self.progress <= 0.0).then_some(WheelState::Retracted)
            }
            _ => None,
        }
    }

    /// Snap progress to a stable state set from outside (load, repair).
    /// One-shot gear seen deploying or deployed stays locked.
    pub fn sync_to_state(&mut self, state: WheelState) {
        if self.one_shot && matches!(state, WheelState::Deploying | WheelState::Deployed) {
            self.locked = true;
        }
        match state {
            WheelState::Deployed => self.progress = 1.0,
            WheelState::Retracted => self.progress = 0.0,
            _ => {}
        }
    }
}

// ============================================
// ----- submodule ----------------------------
// ============================================

pub struct DeployModule {
    pub animation: String,
    machine: DeploymentStateMachine,
}

impl DeployModule {
    pub fn new(config: &DeployConfig, initial: WheelState) -> Self {
        Self {
            animation: config.animation.clone(),
            machine: DeploymentStateMachine::new(config, initial),
        }
    }

    pub fn machine(&self) -> &DeploymentStateMachine {
        &self.machine
    }

    pub fn machine_mut(&mut self) -> &mut DeploymentStateMachine {
        &mut self.machine
    }
}

impl WheelSubmodule for DeployModule {
    fn name(&self) -> &'static str {
        "deploy"
    }

    fn post_controller_setup(&mut self, setup: &SetupInfo<'_>) {
        self.machine.sync_to_state(setup.state);
    }

    fn pre_wheel_frame_update(&mut self, ctx: &mut FrameContext<'_>) {
        if let Some(done) = self.machine.advance(ctx.state, ctx.dt) {
            ctx.request_state(done);
        }
    }

    fn on_state_changed(&mut self, _old: WheelState, new: WheelState) {
        self.machine.sync_to_state(new);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Toggle the controller's gear through its deployment module.
pub fn toggle_deployment(controller: &mut WheelController, pool: &mut dyn ResourcePool) -> ToggleOutcome {
    let state = controller.state();
    let Some(module) = controller.find_mut::<DeployModule>() else {
        return ToggleOutcome::NoDeployModule;
    };
    let outcome = module.machine.toggle(state, pool);
    if let ToggleOutcome::Transition(next) = outcome {
        controller.transition(next);
    }
    outcome
}

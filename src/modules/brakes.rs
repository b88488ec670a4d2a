// ==============================================================================
// brakes.rs - BRAKES
// ------------------------------------------------------------------------------
// Brake torque with a response ramp and a parking latch.
// ==============================================================================

use std::any::Any;

use serde::{Deserialize, Serialize};

use crate::submodule::{HookContext, WheelSubmodule};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrakesConfig {
    pub wheel: Option<usize>,
    pub max_torque: f32, // N*m
    /// Fraction of full brake per second; 0 applies instantly.
    pub response: f32,
}

impl Default for BrakesConfig {
    fn default() -> Self {
        Self {
            wheel: None,
            max_torque: 1_200.0,
            response: 4.0,
        }
    }
}

pub struct BrakesModule {
    config: BrakesConfig,
    input: f32,
    parking: bool,
    applied: f32,
}

impl BrakesModule {
    pub fn new(config: BrakesConfig) -> Self {
        Self {
            config,
            input: 0.0,
            parking: false,
            applied: 0.0,
        }
    }

    pub fn set_input(&mut self, input: f32) {
        self.input = if input.is_finite() { input.clamp(0.0, 1.0) } else { 0.0 };
    }

    pub fn set_parking(&mut self, on: bool) {
        self.parking = on;
    }

    pub fn parking(&self) -> bool {
        self.parking
    }

    /// Current brake fraction after the response ramp.
    pub fn applied(&self) -> f32 {
        self.applied
    }
}

impl WheelSubmodule for BrakesModule {
    fn name(&self) -> &'static str {
        "brakes"
    }

    fn wheel_index(&self) -> Option<usize> {
        self.config.wheel
    }

    fn pre_wheel_physics_update(&mut self, ctx: &mut HookContext<'_>) {
        let target = if self.parking { 1.0 } else { self.input };
        self.applied = if self.config.response > 0.0 {
            let step = self.config.response * ctx.dt;
            self.applied + (target - self.applied).clamp(-step, step)
        } else {
            target
        };

        let torque = self.applied * self.config.max_torque;
        for model in ctx.targets_mut(self.config.wheel) {
            model.set_brake_torque(torque);
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

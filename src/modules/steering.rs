// ==============================================================================
// steering.rs - STEER ANGLE WITH RESPONSE + SPEED LIMITING
// ------------------------------------------------------------------------------
// angle -> input * max_angle * limit(speed), approached at `response` deg/s.
// limit(speed) is 1 below limit_start_speed and falls linearly to
// limit_min_fraction at limit_end_speed.
// ==============================================================================

use std::any::Any;

use serde::{Deserialize, Serialize};

use crate::submodule::{HookContext, WheelSubmodule};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SteeringConfig {
    pub wheel: Option<usize>,
    pub max_angle: f32,           // deg
    pub response: f32,            // deg/s, 0 = instant
    pub invert: bool,
    pub limit_start_speed: f32,   // m/s
    pub limit_end_speed: f32,     // m/s
    pub limit_min_fraction: f32,
}

impl Default for SteeringConfig {
    fn default() -> Self {
        Self {
            wheel: None,
            max_angle: 30.0,
            response: 120.0,
            invert: false,
            limit_start_speed: 10.0,
            limit_end_speed: 40.0,
            limit_min_fraction: 0.3,
        }
    }
}

impl SteeringConfig {
    pub fn speed_limit(&self, speed: f32) -> f32 {
        let speed = speed.abs();
        let span = self.limit_end_speed - self.limit_start_speed;
        if speed <= self.limit_start_speed || span <= 0.0 {
            return if speed > self.limit_start_speed { self.limit_min_fraction } else { 1.0 };
        }
        let t = ((speed - self.limit_start_speed) / span).min(1.0);
        1.0 + (self.limit_min_fraction - 1.0) * t
    }
}

pub struct SteeringModule {
    config: SteeringConfig,
    input: f32,
    angle: f32,
}

impl SteeringModule {
    pub fn new(config: SteeringConfig) -> Self {
        Self {
            config,
            input: 0.0,
            angle: 0.0,
        }
    }

    pub fn set_input(&mut self, input: f32) {
        self.input = if input.is_finite() { input.clamp(-1.0, 1.0) } else { 0.0 };
    }

    pub fn angle(&self) -> f32 {
        self.angle
    }
}

impl WheelSubmodule for SteeringModule {
    fn name(&self) -> &'static str {
        "steering"
    }

    fn wheel_index(&self) -> Option<usize> {
        self.config.wheel
    }

    fn pre_wheel_physics_update(&mut self, ctx: &mut HookContext<'_>) {
        let dir = if self.config.invert { -1.0 } else { 1.0 };
        let target = self.input * dir * self.config.max_angle * self.config.speed_limit(ctx.vessel_speed);

        self.angle = if self.config.response > 0.0 {
            let step = self.config.response * ctx.dt;
            self.angle + (target - self.angle).clamp(-step, step)
        } else {
            target
        };

        let angle = self.angle;
        for model in ctx.targets_mut(self.config.wheel) {
            model.set_steer_angle(angle);
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

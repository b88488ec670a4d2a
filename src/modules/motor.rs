// ==============================================================================
// motor.rs - DRIVE TORQUE
// ------------------------------------------------------------------------------
// torque = throttle * max_torque * falloff(rpm) * power_fraction
//
// falloff drops linearly to zero at max_rpm, only when the wheel already spins
// in the driven direction (reverse torque on a forward-spinning wheel is not
// limited). power_fraction < 1 when the resource draw comes up short.
// ==============================================================================

use std::any::Any;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::submodule::{HookContext, WheelSubmodule};
use crate::wheel::WheelState;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotorConfig {
    pub wheel: Option<usize>,
    pub max_torque: f32, // N*m per wheel
    pub max_rpm: f32,
    pub invert: bool,
    pub resource: Option<String>,
    pub resource_per_second: f64, // at full throttle, all wheels
}

impl Default for MotorConfig {
    fn default() -> Self {
        Self {
            wheel: None,
            max_torque: 400.0,
            max_rpm: 600.0,
            invert: false,
            resource: None,
            resource_per_second: 0.0,
        }
    }
}

/// Linear torque fall-off toward `max_rpm`.
pub fn torque_falloff(rpm: f32, demand: f32, max_rpm: f32) -> f32 {
    if max_rpm <= 0.0 || rpm * demand <= 0.0 {
        return 1.0;
    }
    (1.0 - rpm.abs() / max_rpm).clamp(0.0, 1.0)
}

pub struct MotorModule {
    config: MotorConfig,
    throttle: f32,
    power_fraction: f32,
    output_torque: f32,
}

impl MotorModule {
    pub fn new(config: MotorConfig) -> Self {
        Self {
            config,
            throttle: 0.0,
            power_fraction: 1.0,
            output_torque: 0.0,
        }
    }

    pub fn set_throttle(&mut self, throttle: f32) {
        self.throttle = if throttle.is_finite() { throttle.clamp(-1.0, 1.0) } else { 0.0 };
    }

    pub fn throttle(&self) -> f32 {
        self.throttle
    }

    /// Sum of torque written last tick.
    pub fn output_torque(&self) -> f32 {
        self.output_torque
    }

    pub fn power_fraction(&self) -> f32 {
        self.power_fraction
    }
}

impl WheelSubmodule for MotorModule {
    fn name(&self) -> &'static str {
        "motor"
    }

    fn wheel_index(&self) -> Option<usize> {
        self.config.wheel
    }

    fn pre_wheel_physics_update(&mut self, ctx: &mut HookContext<'_>) {
        let demand = if self.config.invert { -self.throttle } else { self.throttle };

        self.power_fraction = 1.0;
        if let Some(resource) = self.config.resource.as_deref() {
            let want = self.config.resource_per_second * f64::from(demand.abs()) * f64::from(ctx.dt);
            if want > 0.0 {
                let got = ctx.resources.request(resource, want);
                self.power_fraction = (got / want) as f32;
                if self.power_fraction < 1.0 {
                    trace!(resource, fraction = self.power_fraction, "motor underpowered");
                }
            }
        }

        let max_torque = self.config.max_torque;
        let max_rpm = self.config.max_rpm;
        let fraction = self.power_fraction;
        let mut total = 0.0;
        for model in ctx.targets_mut(self.config.wheel) {
            let torque = demand * max_torque * torque_falloff(model.rpm(), demand, max_rpm) * fraction;
            model.set_motor_torque(torque);
            total += torque;
        }
        self.output_torque = total;
    }

    fn on_state_changed(&mut self, _old: WheelState, new: WheelState) {
        if new != WheelState::Deployed {
            self.output_torque = 0.0;
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ==============================================================================
// damage.rs - OVERLOAD / OVERSPEED FAILURE
// ------------------------------------------------------------------------------
// Structural failure is a state, not an error: once a threshold has been
// exceeded continuously for `tolerance` seconds the module requests BROKEN.
// Thresholds of 0 are disabled. Repair is a controller action.
// ==============================================================================

use std::any::Any;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::submodule::{HookContext, WheelSubmodule};
use crate::wheel::WheelState;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DamageConfig {
    pub wheel: Option<usize>,
    pub max_load: f32,  // N spring force, 0 = off
    pub max_speed: f32, // m/s rim speed, 0 = off
    pub tolerance: f32, // s
}

impl Default for DamageConfig {
    fn default() -> Self {
        Self {
            wheel: None,
            max_load: 0.0,
            max_speed: 0.0,
            tolerance: 0.1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DamageCause {
    Overload,
    Overspeed,
}

pub struct DamageModule {
    config: DamageConfig,
    exceeded_for: f32,
    last_cause: Option<DamageCause>,
}

impl DamageModule {
    pub fn new(config: DamageConfig) -> Self {
        Self {
            config,
            exceeded_for: 0.0,
            last_cause: None,
        }
    }

    /// Cause of the most recent break, cleared on repair.
    pub fn last_cause(&self) -> Option<DamageCause> {
        self.last_cause
    }

    fn check(&self, ctx: &HookContext<'_>) -> Option<DamageCause> {
        let index = self.config.wheel;
        let models = ctx
            .wheels
            .iter()
            .enumerate()
            .filter(|(i, _)| index.is_none_or(|want| want == *i))
            .filter_map(|(_, w)| w.model());

        for model in models {
            if self.config.max_load > 0.0 && model.runtime().spring_force > self.config.max_load {
                return Some(DamageCause::Overload);
            }
            if self.config.max_speed > 0.0 && model.surface_speed().abs() > self.config.max_speed {
                return Some(DamageCause::Overspeed);
            }
        }
        None
    }
}

impl WheelSubmodule for DamageModule {
    fn name(&self) -> &'static str {
        "damage"
    }

    fn wheel_index(&self) -> Option<usize> {
        self.config.wheel
    }

    fn post_wheel_physics_update(&mut self, ctx: &mut HookContext<'_>) {
        match self.check(ctx) {
            Some(cause) => {
                self.exceeded_for += ctx.dt;
                if self.exceeded_for >= self.config.tolerance {
                    warn!(?cause, held = self.exceeded_for, "wheel structural failure");
                    self.last_cause = Some(cause);
                    self.exceeded_for = 0.0;
                    ctx.request_state(WheelState::Broken);
                }
            }
            None => self.exceeded_for = 0.0,
        }
    }

    fn on_state_changed(&mut self, old: WheelState, new: WheelState) {
        self.exceeded_for = 0.0;
        if old == WheelState::Broken && new != WheelState::Broken {
            self.last_cause = None;
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

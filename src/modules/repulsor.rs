// ==============================================================================
// repulsor.rs - HOVER "WHEEL"
// ------------------------------------------------------------------------------
// A repulsor reuses the suspension model: its height becomes the suspension
// length (set in the pre-suspension hook so the solver sees it this tick), it
// probes water, and it barely grips. Upkeep is proportional to the force it
// produced (post-physics). When the draw comes up short it shuts down and the
// wheels get their configured length and friction back.
// ==============================================================================

use std::any::Any;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::scene::NodeHandle;
use crate::submodule::{HookContext, WheelSubmodule};
use crate::wheel::{FrictionMultipliers, WheelContactModel};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepulsorConfig {
    pub wheel: Option<usize>,
    pub height: f32,     // m
    pub max_height: f32, // m
    pub friction: f32,   // forward/sideways multiplier while active
    pub water: bool,
    pub resource: Option<String>,
    pub resource_per_kn: f64, // per kN of force per second
}

impl Default for RepulsorConfig {
    fn default() -> Self {
        Self {
            wheel: None,
            height: 1.0,
            max_height: 2.0,
            friction: 0.1,
            water: true,
            resource: None,
            resource_per_kn: 0.0,
        }
    }
}

pub struct RepulsorModule {
    config: RepulsorConfig,
    height: f32,
    scale: f32,
    enabled: bool,
    applied: bool,
    starved: bool,
    original_friction: HashMap<usize, FrictionMultipliers>,
}

impl RepulsorModule {
    pub fn new(config: RepulsorConfig) -> Self {
        let height = config.height.clamp(0.0, config.max_height.max(0.0));
        Self {
            config,
            height,
            scale: 1.0,
            enabled: true,
            applied: false,
            starved: false,
            original_friction: HashMap::new(),
        }
    }

    pub fn set_height(&mut self, height: f32) {
        self.height = height.clamp(0.0, self.config.max_height.max(0.0));
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if enabled {
            self.starved = false;
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Shut down by a failed resource draw.
    pub fn starved(&self) -> bool {
        self.starved
    }

    fn engage(&self, index: usize, model: &mut WheelContactModel) {
        model.set_length(self.height * self.scale);
        model.set_water_mode(self.config.water);
        let mut friction = self.original_friction.get(&index).copied().unwrap_or(model.friction);
        friction.forward *= self.config.friction;
        friction.sideways *= self.config.friction;
        model.friction = friction;
    }

    fn release(&self, index: usize, config_length: f32, model: &mut WheelContactModel) {
        model.set_length(config_length * self.scale);
        model.set_water_mode(false);
        if let Some(friction) = self.original_friction.get(&index) {
            model.friction = *friction;
        }
    }
}

impl WheelSubmodule for RepulsorModule {
    fn name(&self) -> &'static str {
        "repulsor"
    }

    fn wheel_index(&self) -> Option<usize> {
        self.config.wheel
    }

    fn post_wheel_created(&mut self, index: usize, _node: Option<NodeHandle>, model: &WheelContactModel) {
        self.original_friction.insert(index, model.friction);
    }

    fn pre_wheel_suspension_calc(&mut self, ctx: &mut HookContext<'_>) {
        if !self.enabled && !self.applied {
            return;
        }

        let target = self.config.wheel;
        let mut changed = false;
        for (index, wheel) in ctx.wheels.iter_mut().enumerate() {
            if target.is_some_and(|want| want != index) {
                continue;
            }
            let config_length = wheel.config.length;
            let Some(model) = wheel.model_mut() else { continue };
            let before = model.length();
            if self.enabled {
                self.engage(index, model);
            } else {
                self.release(index, config_length, model);
            }
            changed |= (model.length() - before).abs() > 1e-6;
        }
        self.applied = self.enabled;

        if changed {
            ctx.invalidate_suspension();
        }
    }

    fn post_wheel_physics_update(&mut self, ctx: &mut HookContext<'_>) {
        if !self.enabled {
            return;
        }
        let Some(resource) = self.config.resource.as_deref() else { return };

        let target = self.config.wheel;
        let force: f32 = ctx
            .wheels
            .iter()
            .enumerate()
            .filter(|(i, _)| target.is_none_or(|want| want == *i))
            .filter_map(|(_, w)| w.model())
            .map(|m| m.runtime().spring_force)
            .sum();

        let want = f64::from(force) / 1_000.0 * self.config.resource_per_kn * f64::from(ctx.dt);
        if want <= 0.0 {
            return;
        }
        let got = ctx.resources.request(resource, want);
        if got + 1e-9 < want {
            warn!(resource, wanted = want, got, "repulsor out of resource, shutting down");
            self.enabled = false;
            self.starved = true;
        }
    }

    fn on_scale_updated(&mut self, scale: f32) {
        self.scale = scale;
        info!(scale, "repulsor rescaled");
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

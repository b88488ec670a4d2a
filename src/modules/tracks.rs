// ==============================================================================
// tracks.rs - TRACKED DRIVE (SHARED BELT)
// ------------------------------------------------------------------------------
// All wheels of the part share one belt. Before physics the motor and brake
// torque written by earlier modules is averaged across the wheels, and a
// coupling torque pulls every wheel spin toward the mean so the belt moves as
// one. After physics the module only reads: track speed and the scroll offset
// are outputs for cosmetic consumers.
// ==============================================================================

use std::any::Any;

use serde::{Deserialize, Serialize};

use crate::submodule::{FrameContext, HookContext, WheelSubmodule};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TracksConfig {
    pub equalize_torque: bool,
    /// 0..1 share of the spin gap closed per tick; 1 locks all wheels.
    pub spin_coupling: f32,
    pub track_length: f32, // m, scroll wraps here
}

impl Default for TracksConfig {
    fn default() -> Self {
        Self {
            equalize_torque: true,
            spin_coupling: 1.0,
            track_length: 8.0,
        }
    }
}

pub struct TracksModule {
    config: TracksConfig,
    track_speed: f32,
    scroll: f32,
    written: Vec<(f32, f32)>, // motor, brake torque set last tick
}

impl TracksModule {
    pub fn new(config: TracksConfig) -> Self {
        Self {
            config,
            track_speed: 0.0,
            scroll: 0.0,
            written: Vec::new(),
        }
    }

    /// Belt surface speed, m/s.
    pub fn track_speed(&self) -> f32 {
        self.track_speed
    }

    pub fn scroll(&self) -> f32 {
        self.scroll
    }
}

impl WheelSubmodule for TracksModule {
    fn name(&self) -> &'static str {
        "tracks"
    }

    fn pre_wheel_physics_update(&mut self, ctx: &mut HookContext<'_>) {
        // drive input for this tick; a torque still equal to our last write was not driven
        let inputs: Vec<(f32, f32, f32)> = ctx
            .targets_mut(None)
            .enumerate()
            .map(|(i, model)| {
                let rt = model.runtime();
                let (motor, brake) = match self.written.get(i) {
                    Some(&(m, b)) if m == rt.motor_torque && b == rt.brake_torque => (0.0, 0.0),
                    _ => (rt.motor_torque, rt.brake_torque),
                };
                (motor, brake, rt.angular_velocity)
            })
            .collect();
        if inputs.is_empty() {
            return;
        }
        let count = inputs.len() as f32;
        let motor = inputs.iter().map(|i| i.0).sum::<f32>() / count;
        let brake = inputs.iter().map(|i| i.1).sum::<f32>() / count;
        let mean_spin = inputs.iter().map(|i| i.2).sum::<f32>() / count;

        // closes k of the spin gap within this tick
        let k = self.config.spin_coupling.clamp(0.0, 1.0);
        let dt = ctx.dt;
        let equalize = self.config.equalize_torque;
        self.written.clear();
        for (model, &(own_motor, own_brake, spin)) in ctx.targets_mut(None).zip(&inputs) {
            let coupling = if dt > 0.0 { (mean_spin - spin) * model.inertia() / dt * k } else { 0.0 };
            let drive = if equalize { motor } else { own_motor };
            model.set_motor_torque(drive + coupling);
            model.set_brake_torque(if equalize { brake } else { own_brake });
            let rt = model.runtime();
            self.written.push((rt.motor_torque, rt.brake_torque));
        }
    }

    fn post_wheel_physics_update(&mut self, ctx: &mut HookContext<'_>) {
        let speeds: Vec<f32> = ctx
            .wheels
            .iter()
            .filter_map(|w| w.model())
            .map(|m| m.surface_speed())
            .collect();
        if !speeds.is_empty() {
            self.track_speed = speeds.iter().sum::<f32>() / speeds.len() as f32;
        }
    }

    fn pre_wheel_frame_update(&mut self, ctx: &mut FrameContext<'_>) {
        let length = self.config.track_length.max(1e-3);
        self.scroll = (self.scroll + self.track_speed * ctx.dt).rem_euclid(length);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

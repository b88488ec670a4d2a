// ==============================================================================
// types.rs - SHARED WHEEL TYPES
// ------------------------------------------------------------------------------
// Core shared types for the wheel model: load-time config, per-tick runtime
// and contact surface references.
// ==============================================================================

use serde::{Deserialize, Serialize};

// ============================================
// ----- collider / surface -------------------
// ============================================

/// Geometry used by the ground probe for one wheel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColliderKind {
    #[default]
    Ray,
    Sphere,
    Capsule,
}

/// What a wheel is standing on.
#[derive(Debug, Clone, PartialEq)]
pub enum ContactSurface {
    /// Another moving body; its own landed/splashed state is used.
    Body { id: u64, landed: bool, splashed: bool },
    /// Static terrain (or a water surface when `water` is set).
    Terrain { id: u64, biome: Option<String>, water: bool },
}

impl ContactSurface {
    /// Identity used for change detection; two references to the same
    /// collider compare equal even if the body's landed state moved.
    pub fn key(&self) -> (u8, u64) {
        match self {
            ContactSurface::Body { id, .. } => (0, *id),
            ContactSurface::Terrain { id, .. } => (1, *id),
        }
    }
}

// ============================================
// ----- load-time config ---------------------
// ============================================

/// One WHEEL block. Immutable after load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WheelConfig {
    pub mount: String,          // scene node name
    pub radius: f32,            // m
    pub width: f32,             // m
    pub mass: f32,              // same unit as vessel mass
    pub length: f32,            // m, full suspension travel
    pub load_share: f32,        // fraction of vessel mass carried
    pub offset: [f32; 3],       // mount position in part space
    pub collider: ColliderKind,
    pub symmetry_partner: Option<usize>,
    pub complex_bump_stop: bool,
}

impl Default for WheelConfig {
    fn default() -> Self {
        Self {
            mount: String::new(),
            radius: 0.5,
            width: 0.25,
            mass: 0.04,
            length: 0.25,
            load_share: 1.0,
            offset: [0.0, 0.0, 0.0],
            collider: ColliderKind::Ray,
            symmetry_partner: None,
            complex_bump_stop: false,
        }
    }
}

/// Dimensionless multipliers applied by the contact model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrictionMultipliers {
    pub surface: f32,
    pub forward: f32,
    pub sideways: f32,
    pub rolling: f32,
    pub rotational: f32,
}

impl Default for FrictionMultipliers {
    fn default() -> Self {
        Self {
            surface: 1.0,
            forward: 1.0,
            sideways: 1.0,
            rolling: 1.0,
            rotational: 1.0,
        }
    }
}

// ============================================
// ----- runtime ------------------------------
// ============================================

/// Mutable per-wheel state.
///
/// Inputs (`motor_torque`, `brake_torque`, `steer_angle`) are written by
/// submodules before physics; everything else is written by the contact
/// model only.
#[derive(Debug, Clone, PartialEq)]
pub struct WheelRuntime {
    pub spring: f32,
    pub damper: f32,
    pub compression: f32,
    pub prev_compression: f32,
    pub angular_velocity: f32,  // rad/s
    pub steer_angle: f32,       // degrees
    pub motor_torque: f32,
    pub brake_torque: f32,
    pub spring_force: f32,
    pub longitudinal_force: f32,
    pub lateral_force: f32,
    pub longitudinal_slip: f32,
    pub lateral_slip: f32,
    pub grounded: bool,
    pub surface: Option<ContactSurface>,
    pub water_mode: bool,
    pub time_boost: f32,        // 0..1, persisted
}

impl Default for WheelRuntime {
    fn default() -> Self {
        Self {
            spring: 0.0,
            damper: 0.0,
            compression: 0.0,
            prev_compression: 0.0,
            angular_velocity: 0.0,
            steer_angle: 0.0,
            motor_torque: 0.0,
            brake_torque: 0.0,
            spring_force: 0.0,
            longitudinal_force: 0.0,
            lateral_force: 0.0,
            longitudinal_slip: 0.0,
            lateral_slip: 0.0,
            grounded: false,
            surface: None,
            water_mode: false,
            time_boost: 1.0,
        }
    }
}

impl WheelRuntime {
    pub fn rpm(&self) -> f32 {
        self.angular_velocity * 60.0 / std::f32::consts::TAU
    }

    pub fn set_rpm(&mut self, rpm: f32) {
        self.angular_velocity = rpm * std::f32::consts::TAU / 60.0;
    }
}

// ==============================================================================
// config.rs - DECLARATIVE VESSEL / PART CONFIGURATION
// ------------------------------------------------------------------------------
// JSON documents (serde). Every field defaults, so a part block can be as
// small as one WHEEL. sanitize() clamps out-of-range numbers and drops
// dangling references with a warning; a bad field degrades that feature
// instead of rejecting the whole vessel.
// ==============================================================================

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Result, WheelError};
use crate::modules::{
    BrakesConfig, DamageConfig, DeployConfig, MotorConfig, RepulsorConfig, SteeringConfig, TracksConfig,
};
use crate::wheel::contact::contact_mask;
use crate::wheel::{AntiRollPair, FrictionCurve, FrictionMultipliers, SuspensionParameters, WheelConfig, WheelState};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrictionConfig {
    pub forward: FrictionCurve,
    pub sideways: FrictionCurve,
    pub multipliers: FrictionMultipliers,
}

impl Default for FrictionConfig {
    fn default() -> Self {
        Self {
            forward: FrictionCurve::FORWARD,
            sideways: FrictionCurve::SIDEWAYS,
            multipliers: FrictionMultipliers::default(),
        }
    }
}

/// One part: its wheels, shared suspension tuning and submodule blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartConfig {
    pub name: String,
    pub wheels: Vec<WheelConfig>,
    pub suspension: SuspensionParameters,
    pub friction: FrictionConfig,
    pub mask: u32,
    pub anti_roll: Vec<AntiRollPair>,
    pub default_state: WheelState,

    pub deployment: Option<DeployConfig>,
    pub repulsor: Option<RepulsorConfig>,
    pub steering: Option<SteeringConfig>,
    pub motor: Option<MotorConfig>,
    pub brakes: Option<BrakesConfig>,
    pub tracks: Option<TracksConfig>,
    pub damage: Option<DamageConfig>,
}

impl Default for PartConfig {
    fn default() -> Self {
        Self {
            name: "wheel".to_string(),
            wheels: Vec::new(),
            suspension: SuspensionParameters::default(),
            friction: FrictionConfig::default(),
            mask: contact_mask::DEFAULT,
            anti_roll: Vec::new(),
            default_state: WheelState::Deployed,
            deployment: None,
            repulsor: None,
            steering: None,
            motor: None,
            brakes: None,
            tracks: None,
            damage: None,
        }
    }
}

impl PartConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        let mut part: PartConfig = serde_json::from_str(text)?;
        part.sanitize();
        Ok(part)
    }

    pub fn sanitize(&mut self) {
        let name = self.name.clone();

        for (i, w) in self.wheels.iter_mut().enumerate() {
            if !(w.radius > 0.0) {
                warn!(part = %name, wheel = i, radius = w.radius, "radius must be positive, using 0.5");
                w.radius = 0.5;
            }
            if !(w.length >= 0.0) {
                warn!(part = %name, wheel = i, length = w.length, "negative suspension length, using 0");
                w.length = 0.0;
            }
            if !(w.mass > 0.0) {
                warn!(part = %name, wheel = i, mass = w.mass, "wheel mass must be positive, using 0.04");
                w.mass = 0.04;
            }
            if !(w.load_share >= 0.0) {
                warn!(part = %name, wheel = i, load_share = w.load_share, "negative load share, using 0");
                w.load_share = 0.0;
            }
            if !(w.width > 0.0) {
                w.width = 0.25;
            }
        }

        let share: f32 = self.wheels.iter().map(|w| w.load_share).sum();
        if !self.wheels.is_empty() && (share - 1.0).abs() > 0.05 {
            // allowed; vessels made of several single-wheel parts carry 1 each
            tracing::debug!(part = %name, share, "load shares do not sum to 1");
        }

        let s = &mut self.suspension;
        if s.spring_min > s.spring_max {
            warn!(part = %name, "spring_min > spring_max, swapped");
            std::mem::swap(&mut s.spring_min, &mut s.spring_max);
        }
        if s.damp_min > s.damp_max {
            warn!(part = %name, "damp_min > damp_max, swapped");
            std::mem::swap(&mut s.damp_min, &mut s.damp_max);
        }
        if !(s.scale > 0.0) {
            warn!(part = %name, scale = s.scale, "scale must be positive, using 1");
            s.scale = 1.0;
        }

        let count = self.wheels.len();
        self.anti_roll.retain(|pair| {
            let ok = pair.a < count && pair.b < count && pair.a != pair.b;
            if !ok {
                warn!(part = %name, a = pair.a, b = pair.b, count, "anti-roll pair references a missing wheel, dropped");
            }
            ok
        });
        for pair in &mut self.anti_roll {
            pair.coefficient = pair.coefficient.clamp(0.0, 1.0);
        }

        for (i, w) in self.wheels.iter_mut().enumerate() {
            if w.symmetry_partner.is_some_and(|p| p >= count || p == i) {
                warn!(part = %name, wheel = i, "symmetry partner out of range, cleared");
                w.symmetry_partner = None;
            }
        }
    }
}

// ============================================
// ----- vessel -------------------------------
// ============================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChassisConfig {
    pub mass: f32,               // kg
    pub half_extents: [f32; 3], // m
    pub spawn_height: f32,       // m
}

impl Default for ChassisConfig {
    fn default() -> Self {
        Self {
            mass: 1_000.0,
            half_extents: [1.0, 0.25, 1.5],
            spawn_height: 1.0,
        }
    }
}

/// Anti-roll link between wheels on two symmetric sibling parts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CrossPartLink {
    pub part_a: usize,
    pub wheel_a: usize,
    pub part_b: usize,
    pub wheel_b: usize,
    pub coefficient: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VesselConfig {
    pub name: String,
    pub chassis: ChassisConfig,
    pub resources: HashMap<String, f64>,
    pub parts: Vec<PartConfig>,
    pub links: Vec<CrossPartLink>,
}

impl Default for VesselConfig {
    fn default() -> Self {
        Self {
            name: "vessel".to_string(),
            chassis: ChassisConfig::default(),
            resources: HashMap::new(),
            parts: Vec::new(),
            links: Vec::new(),
        }
    }
}

impl VesselConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        let mut vessel: VesselConfig = serde_json::from_str(text)?;
        vessel.sanitize();
        vessel.validate()?;
        Ok(vessel)
    }

    pub fn sanitize(&mut self) {
        if !(self.chassis.mass > 0.0) {
            warn!(vessel = %self.name, mass = self.chassis.mass, "chassis mass must be positive, using 1000");
            self.chassis.mass = 1_000.0;
        }
        for part in &mut self.parts {
            part.sanitize();
        }

        let parts = &self.parts;
        let wheel_ok = |p: usize, w: usize| parts.get(p).is_some_and(|part| w < part.wheels.len());
        self.links.retain(|l| {
            let ok = wheel_ok(l.part_a, l.wheel_a) && wheel_ok(l.part_b, l.wheel_b);
            if !ok {
                warn!(?l, "cross-part anti-roll link references a missing wheel, dropped");
            }
            ok
        });
        for link in &mut self.links {
            link.coefficient = link.coefficient.clamp(0.0, 1.0);
        }
    }

    /// Hard failures that sanitizing cannot repair.
    pub fn validate(&self) -> Result<()> {
        if self.parts.is_empty() {
            return Err(WheelError::InvalidConfig(format!("vessel `{}` has no parts", self.name)));
        }
        if self.parts.iter().all(|p| p.wheels.is_empty()) {
            return Err(WheelError::InvalidConfig(format!("vessel `{}` has no wheels", self.name)));
        }
        Ok(())
    }
}

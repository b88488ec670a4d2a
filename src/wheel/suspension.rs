// ==============================================================================
// suspension.rs - SPRING / DAMPER DERIVATION FROM VESSEL MASS
// ------------------------------------------------------------------------------
// Spring and damper are not configured directly. They are re-derived from the
// vessel mass and gravity so that a fully compressed spring alone supports the
// wheel's share of the vessel weight (times the spring rating):
//
//   length_corrected_mass = vessel_mass / length * load_share
//   k            = length_corrected_mass * spring_rating * g * repair^2
//   spring_load  = k * length * 0.5 / g          (load at half compression)
//   omega        = sqrt(k / spring_load)
//   c_crit       = 2 * spring_load * omega
//   c            = c_crit * damp_ratio * repair
//
// SuspensionSolver memoizes on (mass, gravity, repair) and is invalidated by
// scale changes, repairs and symmetry/tweak updates.
// ==============================================================================

use serde::{Deserialize, Serialize};

/// Floor the repair timer is reset to; zero would collapse k and c.
pub const REPAIR_TIMER_FLOOR: f32 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SpringDamper {
    pub spring: f32, // force / length
    pub damper: f32, // force / velocity
}

/// Pure derivation, see module header.
pub fn compute_spring_damper(
    vessel_mass: f32,
    gravity: f32,
    load_share: f32,
    spring_rating: f32,
    damp_ratio: f32,
    length: f32,
    repair: f32,
) -> SpringDamper {
    if length <= f32::EPSILON || gravity <= f32::EPSILON || vessel_mass <= 0.0 {
        return SpringDamper::default();
    }

    let repair = repair.clamp(0.0, 1.0);
    let length_corrected_mass = vessel_mass / length * load_share.max(0.0);
    let spring = length_corrected_mass * spring_rating.max(0.0) * gravity * repair * repair;

    let spring_load = spring * length * 0.5 / gravity;
    if spring_load <= f32::EPSILON {
        return SpringDamper { spring, damper: 0.0 };
    }

    let omega = (spring / spring_load).sqrt();
    let critical = 2.0 * spring_load * omega;
    let damper = critical * damp_ratio.max(0.0) * repair;

    SpringDamper { spring, damper }
}

// ============================================
// ----- repair ramp --------------------------
// ============================================

/// [0,1] ramp applied after a repair so the suspension does not snap back to
/// full strength in one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RepairTimer {
    value: f32,
    rate: f32, // per second
}

impl RepairTimer {
    pub fn new(ramp_seconds: f32) -> Self {
        Self {
            value: 1.0,
            rate: 1.0 / ramp_seconds.max(1e-3),
        }
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn is_complete(&self) -> bool {
        self.value >= 1.0
    }

    pub fn reset(&mut self) {
        self.value = REPAIR_TIMER_FLOOR;
    }

    /// Monotonic; saturates at 1.
    pub fn advance(&mut self, dt: f32) {
        if dt > 0.0 {
            self.value = (self.value + dt * self.rate).min(1.0);
        }
    }
}

impl Default for RepairTimer {
    fn default() -> Self {
        Self::new(2.0)
    }
}

// ============================================
// ----- per-part parameters ------------------
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuspensionParameters {
    pub spring_rating: f32, // 0..1
    pub damp_ratio: f32,
    pub spring_min: f32,
    pub spring_max: f32,
    pub damp_min: f32,
    pub damp_max: f32,
    pub scale: f32,
    pub repair_seconds: f32,
    #[serde(skip)]
    pub repair: RepairTimer,
}

impl Default for SuspensionParameters {
    fn default() -> Self {
        Self {
            spring_rating: 0.5,
            damp_ratio: 0.65,
            spring_min: 0.05,
            spring_max: 1.0,
            damp_min: 0.05,
            damp_max: 2.0,
            scale: 1.0,
            repair_seconds: 2.0,
            repair: RepairTimer::new(2.0),
        }
    }
}

impl SuspensionParameters {
    pub fn effective_spring_rating(&self) -> f32 {
        self.spring_rating.clamp(self.spring_min, self.spring_max.max(self.spring_min))
    }

    pub fn effective_damp_ratio(&self) -> f32 {
        self.damp_ratio.clamp(self.damp_min, self.damp_max.max(self.damp_min))
    }
}

// ============================================
// ----- memoizing solver ---------------------
// ============================================

/// The per-wheel quantities the solver needs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SuspensionInput {
    pub load_share: f32,
    pub length: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct SolveKey {
    mass: f32,
    gravity: f32,
    repair: f32,
}

#[derive(Debug, Clone, Default)]
pub struct SuspensionSolver {
    key: Option<SolveKey>,
    results: Vec<SpringDamper>,
    solves: u64,
}

impl SuspensionSolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Force the next `solve` to recompute.
    pub fn invalidate(&mut self) {
        self.key = None;
    }

    /// Number of times the coefficients were actually recomputed.
    pub fn solve_count(&self) -> u64 {
        self.solves
    }

    pub fn results(&self) -> &[SpringDamper] {
        &self.results
    }

    /// Returns true when the coefficients were recomputed.
    pub fn solve(
        &mut self,
        params: &SuspensionParameters,
        wheels: &[SuspensionInput],
        vessel_mass: f32,
        gravity: f32,
    ) -> bool {
        let key = SolveKey {
            mass: vessel_mass,
            gravity,
            repair: params.repair.value(),
        };
        if self.key == Some(key) && self.results.len() == wheels.len() {
            return false;
        }

        let rating = params.effective_spring_rating();
        let damp = params.effective_damp_ratio();
        self.results.clear();
        self.results.extend(wheels.iter().map(|w| {
            compute_spring_damper(vessel_mass, gravity, w.load_share, rating, damp, w.length, key.repair)
        }));
        self.key = Some(key);
        self.solves += 1;
        true
    }
}

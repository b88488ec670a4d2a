// ==============================================================================
// anti_roll.rs - ANTI-ROLL COUPLING BETWEEN PAIRED WHEELS
// ------------------------------------------------------------------------------
// An anti-roll bar does not create net vertical force; it pushes the more
// compressed wheel up and pulls its partner down by the same amount:
//
//   F = (cA - cB) * r * kA
//   +F * nA at contact A, -F * nB at contact B
//
// Only applied when both wheels are grounded. `inverted` swaps which wheel of
// the pair is A (mirror symmetry), it is configured, never inferred.
// ==============================================================================

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

use crate::wheel::contact::WheelContactModel;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AntiRollPair {
    pub a: usize,
    pub b: usize,
    pub coefficient: f32, // 0..1
    #[serde(default)]
    pub inverted: bool,
}

impl AntiRollPair {
    /// (A, B) after applying the inversion flag.
    pub fn oriented(&self) -> (usize, usize) {
        if self.inverted { (self.b, self.a) } else { (self.a, self.b) }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AntiRollForces {
    pub magnitude: f32,
    pub on_a: (Vector3<f32>, Point3<f32>),
    pub on_b: (Vector3<f32>, Point3<f32>),
}

/// Scalar coupling force.
#[inline]
pub fn coupling_force(compression_a: f32, compression_b: f32, coefficient: f32, spring_a: f32) -> f32 {
    (compression_a - compression_b) * coefficient.clamp(0.0, 1.0) * spring_a
}

/// Forces for one pair of contact models, `None` unless both are grounded.
pub fn couple(a: &WheelContactModel, b: &WheelContactModel, coefficient: f32) -> Option<AntiRollForces> {
    if !a.grounded() || !b.grounded() {
        return None;
    }

    let magnitude = coupling_force(a.compression(), b.compression(), coefficient, a.runtime().spring);
    if !magnitude.is_finite() {
        return None;
    }

    Some(AntiRollForces {
        magnitude,
        on_a: (a.contact_normal() * magnitude, a.contact_point()),
        on_b: (-b.contact_normal() * magnitude, b.contact_point()),
    })
}

/// Every pair on one part. Pairs referencing missing wheels are skipped.
#[derive(Debug, Clone, Default)]
pub struct AntiRollCoupler {
    pairs: Vec<AntiRollPair>,
}

impl AntiRollCoupler {
    pub fn new(pairs: Vec<AntiRollPair>) -> Self {
        Self { pairs }
    }

    pub fn pairs(&self) -> &[AntiRollPair] {
        &self.pairs
    }

    pub fn push(&mut self, pair: AntiRollPair) {
        self.pairs.push(pair);
    }

    pub fn clear(&mut self) {
        self.pairs.clear();
    }

    pub fn solve<'a, F>(&self, model: F) -> Vec<AntiRollForces>
    where
        F: Fn(usize) -> Option<&'a WheelContactModel>,
    {
        self.pairs
            .iter()
            .filter_map(|pair| {
                let (ia, ib) = pair.oriented();
                if ia == ib {
                    return None;
                }
                couple(model(ia)?, model(ib)?, pair.coefficient)
            })
            .collect()
    }
}

// ==============================================================================
// friction.rs - SLIP -> FORCE MULTIPLIER CURVE
// ------------------------------------------------------------------------------
// Three segments, evaluated on |slip|:
//   [0, extremum]        concave rise 0 -> extremum_value
//   [extremum, asymptote] linear extremum_value -> asymptote_value
//   (asymptote, inf)     exponential approach asymptote_value -> tail_value
//
// The curve is continuous at both joints and even in slip, so the sign of the
// resulting force is decided by the caller.
// ==============================================================================

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrictionCurve {
    pub extremum_slip: f32,
    pub extremum_value: f32,
    pub asymptote_slip: f32,
    pub asymptote_value: f32,
    pub tail_value: f32,
}

impl FrictionCurve {
    pub const fn new(
        extremum_slip: f32,
        extremum_value: f32,
        asymptote_slip: f32,
        asymptote_value: f32,
        tail_value: f32,
    ) -> Self {
        Self {
            extremum_slip,
            extremum_value,
            asymptote_slip,
            asymptote_value,
            tail_value,
        }
    }

    /// Longitudinal defaults (slip ratio).
    pub const FORWARD: FrictionCurve = FrictionCurve::new(0.10, 1.0, 0.40, 0.80, 0.70);

    /// Lateral defaults (tan of slip angle).
    pub const SIDEWAYS: FrictionCurve = FrictionCurve::new(0.15, 1.0, 0.50, 0.75, 0.60);

    pub fn evaluate(&self, slip: f32) -> f32 {
        let s = slip.abs();
        if !s.is_finite() {
            return self.tail_value;
        }

        let ext = self.extremum_slip.max(0.0);
        if s < ext {
            let t = s / ext;
            return self.extremum_value * t * (2.0 - t);
        }

        let asym = self.asymptote_slip.max(ext);
        if s <= asym {
            let span = asym - ext;
            if span <= f32::EPSILON {
                return self.asymptote_value;
            }
            let t = (s - ext) / span;
            return self.extremum_value + (self.asymptote_value - self.extremum_value) * t;
        }

        let decay = asym.max(1e-3);
        self.tail_value + (self.asymptote_value - self.tail_value) * (-(s - asym) / decay).exp()
    }
}

impl Default for FrictionCurve {
    fn default() -> Self {
        Self::FORWARD
    }
}

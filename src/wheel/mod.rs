// ==============================================================================
// wheel/mod.rs - WHEEL PHYSICS CORE
// ------------------------------------------------------------------------------
// Leaf-first:
//   state      - WheelState lifecycle tag
//   friction   - FrictionCurve slip -> multiplier
//   types      - WheelConfig / WheelRuntime / ContactSurface
//   suspension - spring/damper derivation + memoizing solver + repair ramp
//   body       - ForceBody (external rigid body) + kinematics snapshot
//   contact    - WheelContactModel + GroundProbe
//   anti_roll  - paired-wheel coupling
//   ground     - vehicle landed aggregation
// ==============================================================================

pub mod anti_roll;
pub mod body;
pub mod contact;
pub mod friction;
pub mod ground;
pub mod state;
pub mod suspension;
pub mod types;

pub use anti_roll::{AntiRollCoupler, AntiRollPair};
pub use body::{BodyKinematics, ForceAccumulator, ForceBody};
pub use contact::{ContactForce, FlatGround, GroundHit, GroundProbe, NoGround, ProbeQuery, ProbeShape, WheelContactModel};
pub use friction::FrictionCurve;
pub use ground::{GroundContactAggregator, LandedState};
pub use state::WheelState;
pub use suspension::{SpringDamper, SuspensionParameters, SuspensionSolver};
pub use types::{ColliderKind, ContactSurface, FrictionMultipliers, WheelConfig, WheelRuntime};

use crate::scene::NodeHandle;

/// One configured wheel slot. The contact model exists once the wheel has
/// been physically instantiated (first physics tick).
#[derive(Debug, Clone)]
pub struct Wheel {
    pub config: WheelConfig,
    pub node: Option<NodeHandle>,
    model: Option<WheelContactModel>,
}

impl Wheel {
    pub fn new(config: WheelConfig) -> Self {
        Self {
            config,
            node: None,
            model: None,
        }
    }

    pub fn is_created(&self) -> bool {
        self.model.is_some()
    }

    pub fn model(&self) -> Option<&WheelContactModel> {
        self.model.as_ref()
    }

    pub fn model_mut(&mut self) -> Option<&mut WheelContactModel> {
        self.model.as_mut()
    }

    pub(crate) fn create(&mut self, scale: f32) -> &mut WheelContactModel {
        self.model.insert(WheelContactModel::new(&self.config, scale))
    }

    pub(crate) fn rescale(&mut self, scale: f32) {
        if let Some(model) = self.model.as_mut() {
            model.apply_scale(&self.config, scale);
        }
    }
}

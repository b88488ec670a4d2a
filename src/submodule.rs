// ==============================================================================
// submodule.rs - PLUGGABLE PER-WHEEL BEHAVIOUR CONTRACT
// ------------------------------------------------------------------------------
// Every behaviour (motor, brakes, steering, deployment, ...) implements
// WheelSubmodule and is registered with one WheelController. The controller
// owns its submodules in registration order and calls the hooks in a fixed
// order per physics tick:
//
//   pre_wheel_suspension_calc -> [suspension solve]
//   pre_wheel_physics_update  -> [contact update + anti-roll]
//   post_wheel_physics_update
//
// and pre_wheel_frame_update once per rendered frame. Within a hook the last
// writer (in registration order) wins on torque/angle inputs.
//
// Submodules never own the controller. They ask for state changes through
// the HookContext, which queues commands the controller applies after the
// pass.
// ==============================================================================

use std::any::Any;

use crate::resources::ResourcePool;
use crate::scene::NodeHandle;
use crate::wheel::{Wheel, WheelContactModel, WheelState};

/// Requests a submodule can make of its controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControllerCommand {
    Transition(WheelState),
    InvalidateSuspension,
}

/// Snapshot handed to `post_controller_setup`.
#[derive(Debug, Clone, Copy)]
pub struct SetupInfo<'a> {
    pub state: WheelState,
    pub scale: f32,
    pub wheels: &'a [Wheel],
}

/// Mutable view of the part during one physics hook.
pub struct HookContext<'a> {
    pub dt: f32,
    pub state: WheelState,
    pub vessel_mass: f32,
    pub gravity: f32,
    /// Forward speed of the force body, m/s.
    pub vessel_speed: f32,
    pub wheels: &'a mut [Wheel],
    pub resources: &'a mut dyn ResourcePool,
    pub(crate) commands: &'a mut Vec<ControllerCommand>,
}

impl HookContext<'_> {
    pub fn request_state(&mut self, state: WheelState) {
        self.commands.push(ControllerCommand::Transition(state));
    }

    pub fn invalidate_suspension(&mut self) {
        self.commands.push(ControllerCommand::InvalidateSuspension);
    }

    pub fn model(&self, index: usize) -> Option<&WheelContactModel> {
        self.wheels.get(index).and_then(Wheel::model)
    }

    pub fn model_mut(&mut self, index: usize) -> Option<&mut WheelContactModel> {
        self.wheels.get_mut(index).and_then(Wheel::model_mut)
    }

    /// Models targeted by a submodule: one wheel, or all of them.
    pub fn targets_mut(&mut self, index: Option<usize>) -> impl Iterator<Item = &mut WheelContactModel> {
        self.wheels
            .iter_mut()
            .enumerate()
            .filter(move |(i, _)| index.is_none_or(|want| want == *i))
            .filter_map(|(_, w)| w.model_mut())
    }
}

/// Read-only view during the frame hook.
pub struct FrameContext<'a> {
    pub dt: f32,
    pub state: WheelState,
    pub wheels: &'a [Wheel],
    pub(crate) commands: &'a mut Vec<ControllerCommand>,
}

impl FrameContext<'_> {
    pub fn request_state(&mut self, state: WheelState) {
        self.commands.push(ControllerCommand::Transition(state));
    }

    pub fn model(&self, index: usize) -> Option<&WheelContactModel> {
        self.wheels.get(index).and_then(Wheel::model)
    }
}

pub trait WheelSubmodule: Any + Send {
    /// Stable type name.
    fn name(&self) -> &'static str;

    /// Wheel this module acts on; `None` means every wheel of the part.
    fn wheel_index(&self) -> Option<usize> {
        None
    }

    /// Two registrations with the same identity are duplicates.
    fn identity(&self) -> (&'static str, Option<usize>) {
        (self.name(), self.wheel_index())
    }

    fn post_controller_setup(&mut self, _setup: &SetupInfo<'_>) {}

    fn post_wheel_created(&mut self, _index: usize, _node: Option<NodeHandle>, _model: &WheelContactModel) {}

    fn pre_wheel_suspension_calc(&mut self, _ctx: &mut HookContext<'_>) {}

    fn pre_wheel_physics_update(&mut self, _ctx: &mut HookContext<'_>) {}

    fn post_wheel_physics_update(&mut self, _ctx: &mut HookContext<'_>) {}

    /// Cosmetic only; must not write authoritative torque/force inputs.
    fn pre_wheel_frame_update(&mut self, _ctx: &mut FrameContext<'_>) {}

    fn on_state_changed(&mut self, _old: WheelState, _new: WheelState) {}

    fn on_scale_updated(&mut self, _scale: f32) {}

    fn on_ui_controls_updated(&mut self, _visible: bool) {}

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

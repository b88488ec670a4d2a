// ==============================================================================
// controller.rs - PER-PART WHEEL CONTROLLER (SUBMODULE ORCHESTRATOR)
// ------------------------------------------------------------------------------
// Owns one part's wheels, its WheelState and its submodules.
//
// Physics tick (DEPLOYED only, a force body must be available):
//   0) first tick: instantiate contact models (+ restore persisted spin)
//   1) submodules: pre_wheel_suspension_calc
//   2) SuspensionSolver (memoized on mass / gravity / repair timer)
//   3) submodules: pre_wheel_physics_update   (torque / steer inputs)
//   4) WheelContactModel::update per wheel, then anti-roll pairs
//   5) submodules: post_wheel_physics_update  (read outputs)
//   6) GroundContactAggregator -> landed state
//   7) queued state transitions
//
// Frame update runs pre_wheel_frame_update in every state.
//
// transition() is the only writer of WheelState. It applies any edge and
// broadcasts on_state_changed to every submodule.
// ==============================================================================

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::config::PartConfig;
use crate::error::{Result, WheelError};
use crate::modules::build_submodules;
use crate::resources::ResourcePool;
use crate::scene::NodeResolver;
use crate::submodule::{ControllerCommand, FrameContext, HookContext, SetupInfo, WheelSubmodule};
use crate::wheel::contact::contact_mask;
use crate::wheel::ground::{GroundContactAggregator, LandedState};
use crate::wheel::suspension::{RepairTimer, SuspensionInput, SuspensionParameters, SuspensionSolver};
use crate::wheel::{
    AntiRollCoupler, AntiRollPair, ForceBody, FrictionCurve, FrictionMultipliers, GroundProbe, Wheel,
    WheelConfig, WheelState,
};

/// Index of a submodule slot in its controller.
pub type SubmoduleId = usize;

pub type StateListener = Box<dyn FnMut(WheelState, WheelState) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Ran,
    NotDeployed,
    /// `setup()` has not run yet.
    NotSetup,
    /// No force body this tick; retried next tick.
    NoBody,
}

/// Host collaborators for one tick.
pub struct TickEnv<'a> {
    pub probe: &'a dyn GroundProbe,
    pub body: Option<&'a mut dyn ForceBody>,
    pub resources: &'a mut dyn ResourcePool,
}

/// Save-file representation: state tag + `timeBoost,rpm;...`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    pub state: String,
    pub wheel_data: String,
}

/// Strict parse of the per-wheel persisted string.
pub fn parse_wheel_data(text: &str) -> Result<Vec<(f32, f32)>> {
    text.split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let mut fields = entry.split(',').map(|f| f.trim().parse::<f32>());
            match (fields.next(), fields.next(), fields.next()) {
                (Some(Ok(boost)), Some(Ok(rpm)), None) if boost.is_finite() && rpm.is_finite() => Ok((boost, rpm)),
                _ => Err(WheelError::MalformedPersistence(entry.to_string())),
            }
        })
        .collect()
}

struct SubmoduleSlot {
    module: Box<dyn WheelSubmodule>,
    setup_done: bool,
}

#[derive(Debug, Clone, Copy)]
enum PhysicsHook {
    PreSuspension,
    PrePhysics,
    PostPhysics,
}

#[derive(Debug, Clone, Copy)]
struct TickFrame {
    dt: f32,
    vessel_mass: f32,
    gravity: f32,
    vessel_speed: f32,
}

pub struct WheelController {
    name: String,
    state: WheelState,
    state_before_break: WheelState,

    wheels: Vec<Wheel>,
    wheels_created: bool,
    restore: Vec<(f32, f32)>,

    params: SuspensionParameters,
    solver: SuspensionSolver,
    friction: FrictionMultipliers,
    forward_curve: FrictionCurve,
    side_curve: FrictionCurve,
    mask: u32,

    anti_roll: AntiRollCoupler,
    ground: GroundContactAggregator,

    submodules: Vec<Option<SubmoduleSlot>>,
    listeners: Vec<StateListener>,
    commands: Vec<ControllerCommand>,

    interactive: bool,
    setup_complete: bool,
    ui_visible: bool,
}

impl WheelController {
    pub fn new(name: impl Into<String>, wheels: Vec<WheelConfig>, mut params: SuspensionParameters) -> Self {
        params.repair = RepairTimer::new(params.repair_seconds);
        Self {
            name: name.into(),
            state: WheelState::Deployed,
            state_before_break: WheelState::Deployed,
            wheels: wheels.into_iter().map(Wheel::new).collect(),
            wheels_created: false,
            restore: Vec::new(),
            params,
            solver: SuspensionSolver::new(),
            friction: FrictionMultipliers::default(),
            forward_curve: FrictionCurve::FORWARD,
            side_curve: FrictionCurve::SIDEWAYS,
            mask: contact_mask::DEFAULT,
            anti_roll: AntiRollCoupler::default(),
            ground: GroundContactAggregator::new(),
            submodules: Vec::new(),
            listeners: Vec::new(),
            commands: Vec::new(),
            interactive: false,
            setup_complete: false,
            ui_visible: true,
        }
    }

    /// Controller plus the submodules its config declares.
    pub fn from_part(part: &PartConfig) -> Self {
        let mut controller = Self::new(part.name.clone(), part.wheels.clone(), part.suspension);
        controller.state = part.default_state;
        controller.friction = part.friction.multipliers;
        controller.forward_curve = part.friction.forward;
        controller.side_curve = part.friction.sideways;
        controller.mask = part.mask;
        controller.anti_roll = AntiRollCoupler::new(part.anti_roll.clone());
        for module in build_submodules(part) {
            controller.register(module);
        }
        controller
    }

    // ============================================
    // ----- accessors ----------------------------
    // ============================================

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> WheelState {
        self.state
    }

    pub fn wheels(&self) -> &[Wheel] {
        &self.wheels
    }

    pub fn wheel(&self, index: usize) -> Result<&Wheel> {
        self.wheels.get(index).ok_or(WheelError::WheelIndexOutOfRange {
            index,
            count: self.wheels.len(),
        })
    }

    pub fn params(&self) -> &SuspensionParameters {
        &self.params
    }

    pub fn solver(&self) -> &SuspensionSolver {
        &self.solver
    }

    pub fn landed_state(&self) -> &LandedState {
        self.ground.state()
    }

    pub fn is_setup(&self) -> bool {
        self.setup_complete
    }

    pub fn ui_controls_visible(&self) -> bool {
        self.ui_visible
    }

    pub fn set_interactive(&mut self, interactive: bool) {
        self.interactive = interactive;
    }

    pub fn add_anti_roll(&mut self, pair: AntiRollPair) {
        self.anti_roll.push(pair);
    }

    pub fn add_state_listener(&mut self, listener: StateListener) {
        self.listeners.push(listener);
    }

    // ============================================
    // ----- registration -------------------------
    // ============================================

    /// Duplicates (same identity) are rejected and return `None`.
    pub fn register(&mut self, mut module: Box<dyn WheelSubmodule>) -> Option<SubmoduleId> {
        let identity = module.identity();
        if self.submodules.iter().flatten().any(|s| s.module.identity() == identity) {
            debug!(controller = %self.name, module = identity.0, "duplicate submodule ignored");
            return None;
        }

        let setup_done = self.setup_complete;
        if setup_done {
            module.post_controller_setup(&SetupInfo {
                state: self.state,
                scale: self.params.scale,
                wheels: &self.wheels,
            });
            if self.wheels_created {
                notify_wheels_created(module.as_mut(), &self.wheels);
            }
        }

        let id = self.submodules.len();
        self.submodules.push(Some(SubmoduleSlot { module, setup_done }));
        Some(id)
    }

    /// Idempotent; a second call returns `None`.
    pub fn unregister(&mut self, id: SubmoduleId) -> Option<Box<dyn WheelSubmodule>> {
        self.submodules.get_mut(id)?.take().map(|slot| slot.module)
    }

    pub fn submodule_count(&self) -> usize {
        self.submodules.iter().flatten().count()
    }

    pub fn submodule_names(&self) -> Vec<&'static str> {
        self.submodules.iter().flatten().map(|s| s.module.name()).collect()
    }

    pub fn submodule<T: WheelSubmodule>(&self, id: SubmoduleId) -> Option<&T> {
        self.submodules.get(id)?.as_ref()?.module.as_any().downcast_ref::<T>()
    }

    pub fn submodule_mut<T: WheelSubmodule>(&mut self, id: SubmoduleId) -> Option<&mut T> {
        self.submodules.get_mut(id)?.as_mut()?.module.as_any_mut().downcast_mut::<T>()
    }

    /// First registered submodule of type `T`.
    pub fn find<T: WheelSubmodule>(&self) -> Option<&T> {
        self.submodules
            .iter()
            .flatten()
            .find_map(|s| s.module.as_any().downcast_ref::<T>())
    }

    pub fn find_mut<T: WheelSubmodule>(&mut self) -> Option<&mut T> {
        self.submodules
            .iter_mut()
            .flatten()
            .find_map(|s| s.module.as_any_mut().downcast_mut::<T>())
    }

    /// Every submodule of type `T`.
    pub fn each_mut<T: WheelSubmodule>(&mut self) -> impl Iterator<Item = &mut T> {
        self.submodules
            .iter_mut()
            .flatten()
            .filter_map(|s| s.module.as_any_mut().downcast_mut::<T>())
    }

    // ============================================
    // ----- setup --------------------------------
    // ============================================

    /// Resolve mount nodes and run `post_controller_setup` on submodules that
    /// have not had it yet.
    pub fn setup(&mut self, resolver: &dyn NodeResolver) {
        for (i, wheel) in self.wheels.iter_mut().enumerate() {
            wheel.node = resolver.resolve(&wheel.config.mount);
            if wheel.node.is_none() && !wheel.config.mount.is_empty() {
                warn!(controller = %self.name, wheel = i, mount = %wheel.config.mount, "mount node not found");
            }
        }

        let info = SetupInfo {
            state: self.state,
            scale: self.params.scale,
            wheels: &self.wheels,
        };
        for slot in self.submodules.iter_mut().flatten().filter(|s| !s.setup_done) {
            slot.module.post_controller_setup(&info);
            slot.setup_done = true;
        }
        self.setup_complete = true;
        debug!(controller = %self.name, wheels = self.wheels.len(), "controller setup complete");
    }

    fn create_wheels(&mut self) {
        let scale = self.params.scale;
        for (i, wheel) in self.wheels.iter_mut().enumerate() {
            let model = wheel.create(scale);
            model.friction = self.friction;
            model.forward_curve = self.forward_curve;
            model.side_curve = self.side_curve;
            model.set_mask(self.mask);
            if let Some(&(boost, rpm)) = self.restore.get(i) {
                model.set_time_boost(boost);
                model.set_rpm(rpm);
            }
        }
        self.restore.clear();
        self.wheels_created = true;
        self.solver.invalidate();

        for slot in self.submodules.iter_mut().flatten().filter(|s| s.setup_done) {
            notify_wheels_created(slot.module.as_mut(), &self.wheels);
        }
        debug!(controller = %self.name, "wheels instantiated");
    }

    // ============================================
    // ----- state --------------------------------
    // ============================================

    pub fn transition(&mut self, new: WheelState) {
        let old = self.state;
        if old == new {
            return;
        }
        if !WheelState::is_expected_edge(old, new) {
            warn!(controller = %self.name, %old, %new, "unexpected wheel state edge");
        }
        if new == WheelState::Broken {
            self.state_before_break = old;
        }

        self.state = new;
        info!(controller = %self.name, %old, %new, "wheel state changed");

        for slot in self.submodules.iter_mut().flatten() {
            slot.module.on_state_changed(old, new);
        }

        if matches!(new, WheelState::Broken | WheelState::Retracted) {
            for model in self.wheels.iter_mut().filter_map(Wheel::model_mut) {
                model.clear_grounded_state();
            }
            self.ground.reset();
        }

        if self.interactive {
            for model in self.wheels.iter_mut().filter_map(Wheel::model_mut) {
                model.reset_contact_state();
            }
            for listener in &mut self.listeners {
                listener(old, new);
            }
        }
    }

    /// Leave BROKEN for the stable state the part was in before it broke.
    /// Returns false when not broken.
    pub fn repair(&mut self) -> bool {
        if self.state != WheelState::Broken {
            return false;
        }
        let target = match self.state_before_break {
            WheelState::Retracted | WheelState::Retracting => WheelState::Retracted,
            _ => WheelState::Deployed,
        };
        self.params.repair.reset();
        self.solver.invalidate();
        self.transition(target);
        true
    }

    fn apply_commands(&mut self) {
        for command in std::mem::take(&mut self.commands) {
            match command {
                ControllerCommand::Transition(state) => self.transition(state),
                ControllerCommand::InvalidateSuspension => self.solver.invalidate(),
            }
        }
    }

    /// Apply queued cache invalidations now, keep transitions for later.
    fn apply_invalidations(&mut self) {
        let mut invalidate = false;
        self.commands.retain(|c| {
            let hit = matches!(c, ControllerCommand::InvalidateSuspension);
            invalidate |= hit;
            !hit
        });
        if invalidate {
            self.solver.invalidate();
        }
    }

    // ============================================
    // ----- tick ---------------------------------
    // ============================================

    pub fn tick(&mut self, dt: f32, vessel_mass: f32, gravity: f32, env: TickEnv<'_>) -> TickOutcome {
        if !self.setup_complete {
            return TickOutcome::NotSetup;
        }
        if self.state != WheelState::Deployed {
            return TickOutcome::NotDeployed;
        }
        let TickEnv { probe, body, resources } = env;
        let Some(body) = body else {
            trace!(controller = %self.name, "no force body, tick skipped");
            return TickOutcome::NoBody;
        };

        if !self.wheels_created {
            self.create_wheels();
        }
        self.params.repair.advance(dt);

        let kinematics = body.kinematics();
        let heading = kinematics.pose.rotation * Vector3::z();
        let frame = TickFrame {
            dt,
            vessel_mass,
            gravity,
            vessel_speed: kinematics.linvel.dot(&heading),
        };

        // -------------------------
        // 1-2) SUSPENSION
        // -------------------------
        self.run_physics_hook(PhysicsHook::PreSuspension, &frame, &mut *resources);
        self.apply_invalidations();
        self.solve_suspension(vessel_mass, gravity);

        // -------------------------
        // 3-4) CONTACT + ANTI-ROLL
        // -------------------------
        self.run_physics_hook(PhysicsHook::PrePhysics, &frame, &mut *resources);

        for model in self.wheels.iter_mut().filter_map(Wheel::model_mut) {
            if let Some(contact) = model.update(dt, &kinematics, probe, gravity) {
                body.add_force_at_point(contact.force, contact.point);
            }
        }

        let wheels = &self.wheels;
        for forces in self.anti_roll.solve(|i| wheels.get(i).and_then(Wheel::model)) {
            body.add_force_at_point(forces.on_a.0, forces.on_a.1);
            body.add_force_at_point(forces.on_b.0, forces.on_b.1);
        }

        // -------------------------
        // 5-7) OUTPUTS
        // -------------------------
        self.run_physics_hook(PhysicsHook::PostPhysics, &frame, &mut *resources);

        self.ground.update(
            self.wheels
                .iter()
                .filter_map(Wheel::model)
                .map(|m| (m.grounded(), m.runtime().surface.as_ref())),
        );

        self.apply_commands();
        TickOutcome::Ran
    }

    fn solve_suspension(&mut self, vessel_mass: f32, gravity: f32) {
        let inputs: Vec<SuspensionInput> = self
            .wheels
            .iter()
            .map(|w| SuspensionInput {
                load_share: w.config.load_share,
                length: w.model().map_or(0.0, |m| m.length()),
            })
            .collect();

        if self.solver.solve(&self.params, &inputs, vessel_mass, gravity) {
            trace!(controller = %self.name, vessel_mass, gravity, "suspension re-solved");
        }

        for (wheel, sd) in self.wheels.iter_mut().zip(self.solver.results()) {
            if let Some(model) = wheel.model_mut() {
                model.set_spring_damper(sd.spring, sd.damper);
            }
        }
    }

    fn run_physics_hook(&mut self, hook: PhysicsHook, frame: &TickFrame, resources: &mut dyn ResourcePool) {
        let mut ctx = HookContext {
            dt: frame.dt,
            state: self.state,
            vessel_mass: frame.vessel_mass,
            gravity: frame.gravity,
            vessel_speed: frame.vessel_speed,
            wheels: &mut self.wheels,
            resources,
            commands: &mut self.commands,
        };

        for slot in self.submodules.iter_mut().flatten() {
            if !slot.setup_done {
                continue;
            }
            if let Some(index) = slot.module.wheel_index() {
                if !ctx.wheels.get(index).is_some_and(Wheel::is_created) {
                    trace!(module = slot.module.name(), index, "wheel not ready, hook skipped");
                    continue;
                }
            }
            match hook {
                PhysicsHook::PreSuspension => slot.module.pre_wheel_suspension_calc(&mut ctx),
                PhysicsHook::PrePhysics => slot.module.pre_wheel_physics_update(&mut ctx),
                PhysicsHook::PostPhysics => slot.module.post_wheel_physics_update(&mut ctx),
            }
        }
    }

    /// Once per rendered frame, in any state.
    pub fn frame_update(&mut self, dt: f32) {
        let mut ctx = FrameContext {
            dt,
            state: self.state,
            wheels: &self.wheels,
            commands: &mut self.commands,
        };
        for slot in self.submodules.iter_mut().flatten().filter(|s| s.setup_done) {
            slot.module.pre_wheel_frame_update(&mut ctx);
        }
        self.apply_commands();
    }

    // ============================================
    // ----- tuning -------------------------------
    // ============================================

    pub fn set_scale(&mut self, scale: f32) {
        if !scale.is_finite() || scale <= 0.0 {
            warn!(controller = %self.name, scale, "ignoring non-positive scale");
            return;
        }
        self.params.scale = scale;
        for wheel in &mut self.wheels {
            wheel.rescale(scale);
        }
        self.solver.invalidate();
        for slot in self.submodules.iter_mut().flatten() {
            slot.module.on_scale_updated(scale);
        }
    }

    pub fn set_spring_rating(&mut self, rating: f32) {
        self.params.spring_rating = rating;
        self.params.spring_rating = self.params.effective_spring_rating();
        self.solver.invalidate();
    }

    pub fn set_damp_ratio(&mut self, ratio: f32) {
        self.params.damp_ratio = ratio;
        self.params.damp_ratio = self.params.effective_damp_ratio();
        self.solver.invalidate();
    }

    /// Copy tuning from a symmetric counterpart.
    pub fn apply_symmetry_settings(&mut self, source: &SuspensionParameters) {
        self.params.spring_rating = source.spring_rating;
        self.params.damp_ratio = source.damp_ratio;
        self.solver.invalidate();
    }

    pub fn set_ui_controls_visible(&mut self, visible: bool) {
        self.ui_visible = visible;
        for slot in self.submodules.iter_mut().flatten() {
            slot.module.on_ui_controls_updated(visible);
        }
    }

    // ============================================
    // ----- persistence --------------------------
    // ============================================

    pub fn save(&self) -> PersistedState {
        let wheel_data = if self.wheels_created {
            self.wheels
                .iter()
                .filter_map(Wheel::model)
                .map(|m| format!("{},{}", m.runtime().time_boost, m.rpm()))
                .collect::<Vec<_>>()
                .join(";")
        } else {
            self.restore
                .iter()
                .map(|(boost, rpm)| format!("{boost},{rpm}"))
                .collect::<Vec<_>>()
                .join(";")
        };
        PersistedState {
            state: self.state.as_str().to_string(),
            wheel_data,
        }
    }

    /// Missing or malformed fields fall back to defaults with a warning.
    pub fn load(&mut self, persisted: &PersistedState) {
        if !persisted.state.trim().is_empty() {
            match persisted.state.parse::<WheelState>() {
                Ok(state) if self.setup_complete => self.transition(state),
                Ok(state) => self.state = state,
                Err(err) => warn!(controller = %self.name, %err, "keeping current wheel state"),
            }
        }

        let data = match parse_wheel_data(&persisted.wheel_data) {
            Ok(data) => data,
            Err(err) => {
                warn!(controller = %self.name, %err, "ignoring persisted wheel data");
                Vec::new()
            }
        };

        if self.wheels_created {
            for (model, (boost, rpm)) in self.wheels.iter_mut().filter_map(Wheel::model_mut).zip(data) {
                model.set_time_boost(boost);
                model.set_rpm(rpm);
            }
        } else {
            self.restore = data;
        }
    }
}

fn notify_wheels_created(module: &mut dyn WheelSubmodule, wheels: &[Wheel]) {
    let target = module.wheel_index();
    for (index, wheel) in wheels.iter().enumerate() {
        if target.is_some_and(|want| want != index) {
            continue;
        }
        if let Some(model) = wheel.model() {
            module.post_wheel_created(index, wheel.node, model);
        }
    }
}

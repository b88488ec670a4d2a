use std::any::Any;
use std::sync::{Arc, Mutex};

use approx::assert_relative_eq;
use nalgebra::Isometry3;

use aven_wheel::config::PartConfig;
use aven_wheel::controller::{PersistedState, TickEnv, TickOutcome, WheelController};
use aven_wheel::modules::{DamageCause, DamageConfig, DamageModule};
use aven_wheel::resources::Unlimited;
use aven_wheel::scene::{NamedNodes, NoScene, NodeHandle};
use aven_wheel::submodule::{FrameContext, HookContext, SetupInfo, WheelSubmodule};
use aven_wheel::wheel::{
    BodyKinematics, FlatGround, ForceAccumulator, GroundProbe, NoGround, SuspensionParameters, WheelConfig,
    WheelContactModel, WheelState,
};

type Log = Arc<Mutex<Vec<String>>>;

struct Recorder {
    name: &'static str,
    wheel: Option<usize>,
    log: Log,
}

impl Recorder {
    fn new(name: &'static str, log: &Log) -> Box<Self> {
        Box::new(Self { name, wheel: None, log: log.clone() })
    }

    fn on_wheel(name: &'static str, wheel: usize, log: &Log) -> Box<Self> {
        Box::new(Self { name, wheel: Some(wheel), log: log.clone() })
    }

    fn push(&self, entry: impl Into<String>) {
        self.log.lock().unwrap().push(format!("{}:{}", self.name, entry.into()));
    }
}

impl WheelSubmodule for Recorder {
    fn name(&self) -> &'static str {
        self.name
    }

    fn wheel_index(&self) -> Option<usize> {
        self.wheel
    }

    fn post_controller_setup(&mut self, setup: &SetupInfo<'_>) {
        self.push(format!("setup {}", setup.state));
    }

    fn post_wheel_created(&mut self, index: usize, node: Option<NodeHandle>, _model: &WheelContactModel) {
        self.push(format!("created {index} {}", node.is_some()));
    }

    fn pre_wheel_suspension_calc(&mut self, _ctx: &mut HookContext<'_>) {
        self.push("pre_suspension");
    }

    fn pre_wheel_physics_update(&mut self, ctx: &mut HookContext<'_>) {
        let spring = ctx.model(0).map_or(0.0, |m| m.runtime().spring);
        self.push(format!("pre_physics solved={}", spring > 0.0));
    }

    fn post_wheel_physics_update(&mut self, ctx: &mut HookContext<'_>) {
        let grounded = ctx.model(0).is_some_and(|m| m.grounded());
        self.push(format!("post_physics grounded={grounded}"));
    }

    fn pre_wheel_frame_update(&mut self, _ctx: &mut FrameContext<'_>) {
        self.push("frame");
    }

    fn on_state_changed(&mut self, old: WheelState, new: WheelState) {
        self.push(format!("state {old}->{new}"));
    }

    fn on_scale_updated(&mut self, scale: f32) {
        self.push(format!("scale {scale}"));
    }

    fn on_ui_controls_updated(&mut self, visible: bool) {
        self.push(format!("ui {visible}"));
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn wheel(mount: &str) -> WheelConfig {
    WheelConfig {
        mount: mount.to_string(),
        radius: 0.5,
        length: 0.25,
        mass: 10.0,
        load_share: 1.0,
        ..WheelConfig::default()
    }
}

fn controller(wheels: usize) -> WheelController {
    let configs = (0..wheels).map(|i| wheel(&format!("wheel{i}"))).collect();
    WheelController::new("part", configs, SuspensionParameters::default())
}

// mount at 0.6 m over flat ground: 0.1 m travel before contact
fn body() -> ForceAccumulator {
    ForceAccumulator::new(BodyKinematics::at_rest(Isometry3::translation(0.0, 0.6, 0.0)))
}

fn tick(controller: &mut WheelController, probe: &dyn GroundProbe, body: &mut ForceAccumulator) -> TickOutcome {
    controller.tick(
        0.02,
        1_000.0,
        9.81,
        TickEnv { probe, body: Some(body), resources: &mut Unlimited },
    )
}

fn drain(log: &Log) -> Vec<String> {
    std::mem::take(&mut *log.lock().unwrap())
}

#[test]
fn hooks_run_in_documented_order() {
    let log = Log::default();
    let mut c = controller(1);
    c.register(Recorder::new("a", &log)).unwrap();
    c.register(Recorder::new("b", &log)).unwrap();
    let nodes: NamedNodes = ["wheel0"].into_iter().collect();
    c.setup(&nodes);

    let mut acc = body();
    assert_eq!(tick(&mut c, &FlatGround::terrain(0.0), &mut acc), TickOutcome::Ran);
    c.frame_update(0.016);

    assert_eq!(
        drain(&log),
        vec![
            "a:setup DEPLOYED",
            "b:setup DEPLOYED",
            "a:created 0 true",
            "b:created 0 true",
            "a:pre_suspension",
            "b:pre_suspension",
            "a:pre_physics solved=true",
            "b:pre_physics solved=true",
            "a:post_physics grounded=true",
            "b:post_physics grounded=true",
            "a:frame",
            "b:frame",
        ]
    );
    assert!(acc.total_force().y > 0.0);
    assert!(c.landed_state().landed);
}

#[test]
fn physics_hooks_only_while_deployed() {
    let log = Log::default();
    let mut c = controller(1);
    c.register(Recorder::new("a", &log)).unwrap();
    c.setup(&NoScene);
    c.transition(WheelState::Retracted);
    drain(&log);

    let mut acc = body();
    assert_eq!(tick(&mut c, &FlatGround::terrain(0.0), &mut acc), TickOutcome::NotDeployed);
    c.frame_update(0.016);

    assert_eq!(drain(&log), vec!["a:frame"]);
    assert!(acc.forces().is_empty());
}

#[test]
fn not_ready_ticks_are_skipped() {
    let mut c = controller(1);
    let mut acc = body();
    assert_eq!(tick(&mut c, &NoGround, &mut acc), TickOutcome::NotSetup);

    c.setup(&NoScene);
    let outcome = c.tick(0.02, 1_000.0, 9.81, TickEnv { probe: &NoGround, body: None, resources: &mut Unlimited });
    assert_eq!(outcome, TickOutcome::NoBody);
    assert!(c.wheels().iter().all(|w| !w.is_created()));

    assert_eq!(tick(&mut c, &NoGround, &mut acc), TickOutcome::Ran);
    assert!(c.wheels().iter().all(|w| w.is_created()));
}

#[test]
fn duplicate_registration_and_idempotent_unregister() {
    let log = Log::default();
    let mut c = controller(2);
    let first = c.register(Recorder::new("a", &log)).unwrap();
    assert!(c.register(Recorder::new("a", &log)).is_none());
    let per_wheel = c.register(Recorder::on_wheel("a", 1, &log)).unwrap();
    assert_eq!(c.submodule_count(), 2);

    assert!(c.submodule::<Recorder>(per_wheel).is_some());
    assert!(c.unregister(first).is_some());
    assert!(c.unregister(first).is_none());
    assert_eq!(c.submodule_names(), vec!["a"]);
}

#[test]
fn late_registration_catches_up() {
    let log = Log::default();
    let mut c = controller(1);
    c.setup(&NoScene);
    tick(&mut c, &NoGround, &mut body());

    c.register(Recorder::new("late", &log)).unwrap();
    assert_eq!(drain(&log), vec!["late:setup DEPLOYED", "late:created 0 false"]);
}

#[test]
fn module_on_missing_wheel_is_skipped() {
    let log = Log::default();
    let mut c = controller(1);
    c.register(Recorder::on_wheel("ghost", 3, &log)).unwrap();
    c.setup(&NoScene);
    drain(&log);

    tick(&mut c, &FlatGround::terrain(0.0), &mut body());
    assert!(drain(&log).is_empty());
}

#[test]
fn state_changes_broadcast_to_every_module() {
    let log = Log::default();
    let mut c = controller(1);
    c.register(Recorder::new("a", &log)).unwrap();
    c.register(Recorder::new("b", &log)).unwrap();
    c.setup(&NoScene);
    drain(&log);

    c.transition(WheelState::Broken);
    c.transition(WheelState::Broken);
    c.set_scale(2.0);
    c.set_ui_controls_visible(false);

    assert_eq!(
        drain(&log),
        vec![
            "a:state DEPLOYED->BROKEN",
            "b:state DEPLOYED->BROKEN",
            "a:scale 2",
            "b:scale 2",
            "a:ui false",
            "b:ui false",
        ]
    );
    assert!(!c.ui_controls_visible());
}

#[test]
fn unexpected_edges_are_still_applied() {
    let mut c = controller(1);
    c.transition(WheelState::Retracted);
    c.transition(WheelState::Deployed);
    assert_eq!(c.state(), WheelState::Deployed);
}

#[test]
fn overload_breaks_the_part_and_clears_contact() {
    let part = PartConfig {
        wheels: vec![wheel("wheel0")],
        damage: Some(DamageConfig { max_load: 1.0, tolerance: 0.0, ..DamageConfig::default() }),
        ..PartConfig::default()
    };
    let mut c = WheelController::from_part(&part);
    c.setup(&NoScene);

    tick(&mut c, &FlatGround::terrain(0.0), &mut body());
    assert_eq!(c.state(), WheelState::Broken);
    assert_eq!(c.find::<DamageModule>().and_then(DamageModule::last_cause), Some(DamageCause::Overload));
    assert!(!c.wheel(0).unwrap().model().unwrap().grounded());
    assert!(!c.landed_state().landed);

    assert_eq!(tick(&mut c, &FlatGround::terrain(0.0), &mut body()), TickOutcome::NotDeployed);
    assert!(c.repair());
    assert_eq!(c.find::<DamageModule>().and_then(DamageModule::last_cause), None);
}

#[test]
fn repaired_suspension_ramps_back_in() {
    let mut c = controller(1);
    c.setup(&NoScene);
    let ground = FlatGround::terrain(0.0);
    for _ in 0..5 {
        tick(&mut c, &ground, &mut body());
    }
    let spring = |c: &WheelController| c.wheel(0).unwrap().model().unwrap().runtime().spring;
    let full = spring(&c);
    assert!(full > 0.0);

    c.transition(WheelState::Broken);
    assert!(c.repair());
    assert_eq!(c.state(), WheelState::Deployed);

    tick(&mut c, &ground, &mut body());
    let mut last = spring(&c);
    assert!(last < full * 0.01, "spring {last} of {full}");

    // 2 s ramp at 20 ms per tick
    for _ in 0..110 {
        tick(&mut c, &ground, &mut body());
        let now = spring(&c);
        assert!(now >= last);
        last = now;
    }
    assert_relative_eq!(last, full, max_relative = 1e-5);
}

#[test]
fn solver_reruns_only_on_change() {
    let mut c = controller(1);
    c.setup(&NoScene);
    let ground = FlatGround::terrain(0.0);
    for _ in 0..5 {
        tick(&mut c, &ground, &mut body());
    }
    let after_first = c.solver().solve_count();

    c.set_spring_rating(0.8);
    tick(&mut c, &ground, &mut body());
    assert_eq!(c.solver().solve_count(), after_first + 1);
    assert_relative_eq!(c.params().spring_rating, 0.8);
}

#[test]
fn persisted_state_is_restored_on_creation() {
    let mut c = controller(2);
    c.load(&PersistedState {
        state: "RETRACTED".to_string(),
        wheel_data: "1,120;0.5,60".to_string(),
    });
    assert_eq!(c.state(), WheelState::Retracted);
    assert_eq!(c.save().wheel_data, "1,120;0.5,60");

    c.setup(&NoScene);
    c.transition(WheelState::Deployed);
    tick(&mut c, &NoGround, &mut body());

    let rpm = c.wheel(0).unwrap().model().unwrap().rpm();
    assert_relative_eq!(rpm, 120.0, max_relative = 0.01);
    let boost = c.wheel(1).unwrap().model().unwrap().runtime().time_boost;
    assert!(boost >= 0.5 && boost < 0.6);
}

#[test]
fn missing_or_malformed_persistence_falls_back() {
    let mut c = controller(1);
    c.load(&PersistedState::default());
    assert_eq!(c.state(), WheelState::Deployed);
    assert_eq!(c.save().wheel_data, "");

    c.load(&PersistedState {
        state: "FLYING".to_string(),
        wheel_data: "abc;1,2,3".to_string(),
    });
    assert_eq!(c.state(), WheelState::Deployed);
    assert_eq!(c.save().wheel_data, "");
}

#[test]
fn wheel_index_out_of_range_is_an_error() {
    let c = controller(1);
    assert!(c.wheel(0).is_ok());
    assert!(c.wheel(4).is_err());
}

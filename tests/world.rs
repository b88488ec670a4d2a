use aven_wheel::config::VesselConfig;
use aven_wheel::error::WheelError;
use aven_wheel::modules::{RepulsorConfig, RepulsorModule, ToggleOutcome};
use aven_wheel::physics::{DriveInput, PhysicsWorld};
use aven_wheel::wheel::WheelState;

const ROVER: &str = include_str!("../configs/rover.json");
const DT: f32 = 1.0 / 60.0;

fn world_with_rover() -> PhysicsWorld {
    let rover = VesselConfig::from_json(ROVER).unwrap();
    let mut world = PhysicsWorld::new();
    world.spawn_vessel("rover", &rover, [0.0, 0.0, 0.0]);
    world
}

fn run(world: &mut PhysicsWorld, seconds: f32) {
    let steps = (seconds / DT).round() as usize;
    for _ in 0..steps {
        world.step(DT);
        world.frame_update(DT);
    }
}

#[test]
fn rover_settles_on_its_suspension() {
    let mut world = world_with_rover();
    run(&mut world, 4.0);

    let telemetry = world.telemetry("rover").unwrap();
    assert!(telemetry.landed.landed);
    assert_eq!(telemetry.landed.biome.as_deref(), Some("Flats"));
    assert!(telemetry.position[1] > 0.5 && telemetry.position[1] < 0.9, "y = {}", telemetry.position[1]);
    assert!(telemetry.speed < 0.2);
    assert_eq!(telemetry.controllers.len(), 4);
}

#[test]
fn throttle_moves_the_rover_forward() {
    let mut world = world_with_rover();
    run(&mut world, 2.0);
    let start = world.telemetry("rover").unwrap().position[2];

    let input = DriveInput { throttle: 1.0, ..DriveInput::default() };
    for _ in 0..180 {
        world.apply_drive_input("rover", input).unwrap();
        world.step(DT);
    }
    let end = world.telemetry("rover").unwrap();
    assert!(end.position[2] - start > 0.5, "moved {}", end.position[2] - start);
    assert!(end.resources.iter().any(|(name, amount)| name == "ElectricCharge" && *amount < 500.0));
}

#[test]
fn retracting_gear_drops_the_chassis() {
    let mut world = world_with_rover();
    run(&mut world, 2.0);

    let outcomes = world.toggle_deploy("rover").unwrap();
    assert_eq!(outcomes, vec![ToggleOutcome::Transition(WheelState::Retracting); 4]);

    run(&mut world, 4.0);
    let vessel = world.vessel("rover").unwrap();
    assert!(vessel.controllers.iter().all(|c| c.state() == WheelState::Retracted));
    let y = world.telemetry("rover").unwrap().position[1];
    // resting on the chassis box, half height 0.25
    assert!(y < 0.35, "y = {y}");

    assert_eq!(world.repair("rover").unwrap(), 0);
}

#[test]
fn unknown_targets_are_errors() {
    let mut world = world_with_rover();
    assert!(matches!(world.toggle_deploy("nobody"), Err(WheelError::VesselNotFound(_))));

    let module = Box::new(RepulsorModule::new(RepulsorConfig::default()));
    assert!(matches!(
        world.attach_submodule("rover", 9, module),
        Err(WheelError::ControllerNotFound { controller: 9, .. })
    ));

    let module = Box::new(RepulsorModule::new(RepulsorConfig::default()));
    assert!(world.attach_submodule("rover", 0, module).unwrap().is_some());
}

#[test]
fn despawn_removes_the_body() {
    let mut world = world_with_rover();
    let bodies = world.bodies.len();
    assert!(world.despawn_vessel("rover"));
    assert!(!world.despawn_vessel("rover"));
    assert_eq!(world.bodies.len(), bodies - 1);
    assert!(world.telemetry("rover").is_none());
}

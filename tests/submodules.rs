use approx::assert_relative_eq;
use nalgebra::Isometry3;

use aven_wheel::config::PartConfig;
use aven_wheel::controller::{PersistedState, TickEnv, WheelController};
use aven_wheel::modules::{
    BrakesConfig, BrakesModule, MotorConfig, MotorModule, RepulsorConfig, RepulsorModule, SteeringConfig,
    SteeringModule, TracksConfig, TracksModule,
};
use aven_wheel::resources::{ResourcePool, ResourceTank, Unlimited};
use aven_wheel::scene::NoScene;
use aven_wheel::wheel::{BodyKinematics, FlatGround, ForceAccumulator, NoGround, WheelConfig};

fn wheel(x: f32) -> WheelConfig {
    WheelConfig { radius: 0.5, length: 0.25, mass: 10.0, offset: [x, 0.0, 0.0], ..WheelConfig::default() }
}

fn build(part: PartConfig) -> WheelController {
    let mut c = WheelController::from_part(&part);
    c.setup(&NoScene);
    c
}

fn tick_with(c: &mut WheelController, resources: &mut dyn ResourcePool) {
    let mut body = ForceAccumulator::new(BodyKinematics::at_rest(Isometry3::translation(0.0, 0.6, 0.0)));
    c.tick(0.02, 1_000.0, 9.81, TickEnv { probe: &FlatGround::terrain(0.0), body: Some(&mut body), resources });
}

fn tick(c: &mut WheelController) {
    tick_with(c, &mut Unlimited);
}

#[test]
fn repulsor_overrides_length_and_grip_until_disabled() {
    let mut c = build(PartConfig {
        wheels: vec![wheel(0.0)],
        repulsor: Some(RepulsorConfig { height: 1.0, friction: 0.1, ..RepulsorConfig::default() }),
        ..PartConfig::default()
    });

    tick(&mut c);
    let model = c.wheel(0).unwrap().model().unwrap();
    assert_relative_eq!(model.length(), 1.0);
    assert_relative_eq!(model.friction.forward, 0.1);
    assert!(model.runtime().water_mode);
    assert_eq!(c.solver().solve_count(), 1);

    tick(&mut c);
    assert_eq!(c.solver().solve_count(), 1);

    c.find_mut::<RepulsorModule>().unwrap().set_enabled(false);
    tick(&mut c);
    // travel changed back, so the solver ran again
    assert_eq!(c.solver().solve_count(), 2);
    let model = c.wheel(0).unwrap().model().unwrap();
    assert_relative_eq!(model.length(), 0.25);
    assert_relative_eq!(model.friction.forward, 1.0);
    assert!(!model.runtime().water_mode);
}

#[test]
fn starved_repulsor_shuts_down() {
    let mut c = build(PartConfig {
        wheels: vec![wheel(0.0)],
        repulsor: Some(RepulsorConfig {
            height: 1.0,
            resource: Some("ElectricCharge".to_string()),
            resource_per_kn: 1.0,
            ..RepulsorConfig::default()
        }),
        ..PartConfig::default()
    });
    let mut tank = ResourceTank::new().with("ElectricCharge", 1e-4);

    tick_with(&mut c, &mut tank);
    let repulsor = c.find::<RepulsorModule>().unwrap();
    assert!(repulsor.starved());
    assert!(!repulsor.enabled());

    tick_with(&mut c, &mut tank);
    assert_relative_eq!(c.wheel(0).unwrap().model().unwrap().length(), 0.25);
}

#[test]
fn tracks_share_torque_and_spin() {
    let mut c = build(PartConfig {
        wheels: vec![wheel(-1.0), wheel(1.0)],
        motor: Some(MotorConfig { wheel: Some(0), max_torque: 400.0, ..MotorConfig::default() }),
        tracks: Some(TracksConfig::default()),
        ..PartConfig::default()
    });
    c.find_mut::<MotorModule>().unwrap().set_throttle(1.0);

    tick(&mut c);
    let a = c.wheel(0).unwrap().model().unwrap();
    let b = c.wheel(1).unwrap().model().unwrap();
    assert_relative_eq!(a.runtime().motor_torque, 200.0);
    assert_relative_eq!(b.runtime().motor_torque, 200.0);
    assert_relative_eq!(a.rpm(), b.rpm(), epsilon = 1e-4);

    c.frame_update(0.5);
    let tracks = c.find::<TracksModule>().unwrap();
    assert!(tracks.scroll() >= 0.0 && tracks.scroll() < 8.0);
}

#[test]
fn tracks_pull_spin_together_through_torque() {
    let part = PartConfig {
        wheels: vec![wheel(-1.0), wheel(1.0)],
        tracks: Some(TracksConfig::default()),
        ..PartConfig::default()
    };
    let mut c = WheelController::from_part(&part);
    c.load(&PersistedState { state: String::new(), wheel_data: "1,120;1,0".to_string() });
    c.setup(&NoScene);

    let mut body = ForceAccumulator::new(BodyKinematics::at_rest(Isometry3::translation(0.0, 0.6, 0.0)));
    c.tick(0.02, 1_000.0, 9.81, TickEnv { probe: &NoGround, body: Some(&mut body), resources: &mut Unlimited });

    let a = c.wheel(0).unwrap().model().unwrap();
    let b = c.wheel(1).unwrap().model().unwrap();
    assert!(a.rpm() > 0.0);
    assert_relative_eq!(a.rpm(), b.rpm(), epsilon = 1e-3);
    // equal and opposite corrections, no net drive
    assert_relative_eq!(a.runtime().motor_torque, -b.runtime().motor_torque, max_relative = 1e-4);

    // the correction is not read back as drive on the next tick
    c.tick(0.02, 1_000.0, 9.81, TickEnv { probe: &NoGround, body: Some(&mut body), resources: &mut Unlimited });
    let a = c.wheel(0).unwrap().model().unwrap();
    let b = c.wheel(1).unwrap().model().unwrap();
    assert_relative_eq!(a.runtime().motor_torque, 0.0, epsilon = 1e-3);
    assert_relative_eq!(b.runtime().motor_torque, 0.0, epsilon = 1e-3);
    assert_relative_eq!(a.rpm(), b.rpm(), epsilon = 1e-3);
}

#[test]
fn brakes_ramp_and_parking_latches() {
    let mut c = build(PartConfig {
        wheels: vec![wheel(0.0)],
        brakes: Some(BrakesConfig { max_torque: 1_000.0, response: 5.0, ..BrakesConfig::default() }),
        ..PartConfig::default()
    });
    c.find_mut::<BrakesModule>().unwrap().set_input(1.0);

    tick(&mut c);
    // 5 /s for 20 ms
    assert_relative_eq!(c.find::<BrakesModule>().unwrap().applied(), 0.1, epsilon = 1e-5);
    assert_relative_eq!(c.wheel(0).unwrap().model().unwrap().runtime().brake_torque, 100.0, epsilon = 1e-2);

    let brakes = c.find_mut::<BrakesModule>().unwrap();
    brakes.set_input(0.0);
    brakes.set_parking(true);
    for _ in 0..20 {
        tick(&mut c);
    }
    assert_relative_eq!(c.find::<BrakesModule>().unwrap().applied(), 1.0);
}

#[test]
fn steering_slews_toward_input() {
    let mut c = build(PartConfig {
        wheels: vec![wheel(0.0)],
        steering: Some(SteeringConfig { max_angle: 30.0, response: 100.0, ..SteeringConfig::default() }),
        ..PartConfig::default()
    });
    c.find_mut::<SteeringModule>().unwrap().set_input(-1.0);

    tick(&mut c);
    assert_relative_eq!(c.find::<SteeringModule>().unwrap().angle(), -2.0, epsilon = 1e-4);
    for _ in 0..20 {
        tick(&mut c);
    }
    assert_relative_eq!(c.find::<SteeringModule>().unwrap().angle(), -30.0, epsilon = 1e-4);
    assert_relative_eq!(c.wheel(0).unwrap().model().unwrap().runtime().steer_angle, -30.0, epsilon = 1e-4);
}

#[test]
fn underpowered_motor_scales_torque() {
    let mut c = build(PartConfig {
        wheels: vec![wheel(0.0)],
        motor: Some(MotorConfig {
            max_torque: 400.0,
            resource: Some("ElectricCharge".to_string()),
            resource_per_second: 10.0,
            ..MotorConfig::default()
        }),
        ..PartConfig::default()
    });
    c.find_mut::<MotorModule>().unwrap().set_throttle(1.0);
    // a full tick needs 0.2
    let mut tank = ResourceTank::new().with("ElectricCharge", 0.05);

    tick_with(&mut c, &mut tank);
    let motor = c.find::<MotorModule>().unwrap();
    assert_relative_eq!(motor.power_fraction(), 0.25, epsilon = 1e-5);
    assert_relative_eq!(motor.output_torque(), 100.0, epsilon = 1e-3);
    assert_eq!(tank.available("ElectricCharge"), 0.0);
}

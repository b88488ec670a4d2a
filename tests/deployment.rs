use aven_wheel::config::PartConfig;
use aven_wheel::controller::{PersistedState, WheelController};
use aven_wheel::modules::{toggle_deployment, DeployConfig, DeployModule, DeploymentStateMachine, ToggleOutcome};
use aven_wheel::resources::{ResourcePool, ResourceTank, Unlimited};
use aven_wheel::scene::NoScene;
use aven_wheel::wheel::{WheelConfig, WheelState};

fn gear(config: DeployConfig, initial: WheelState) -> WheelController {
    let part = PartConfig {
        name: "gear".to_string(),
        wheels: vec![WheelConfig::default()],
        default_state: initial,
        deployment: Some(config),
        ..PartConfig::default()
    };
    let mut controller = WheelController::from_part(&part);
    controller.setup(&NoScene);
    controller
}

fn run_frames(controller: &mut WheelController, frames: usize, dt: f32) {
    for _ in 0..frames {
        controller.frame_update(dt);
    }
}

#[test]
fn toggle_table() {
    let mut machine = DeploymentStateMachine::new(&DeployConfig::default(), WheelState::Retracted);
    let mut pool = Unlimited;

    let cases = [
        (WheelState::Retracted, ToggleOutcome::Transition(WheelState::Deploying)),
        (WheelState::Retracting, ToggleOutcome::Transition(WheelState::Deploying)),
        (WheelState::Deployed, ToggleOutcome::Transition(WheelState::Retracting)),
        (WheelState::Deploying, ToggleOutcome::Transition(WheelState::Retracting)),
        (WheelState::Broken, ToggleOutcome::Ignored),
    ];
    for (state, expected) in cases {
        assert_eq!(machine.toggle(state, &mut pool), expected, "toggle from {state}");
    }
}

#[test]
fn deploy_animation_completes() {
    let mut controller = gear(DeployConfig::default(), WheelState::Retracted);
    assert_eq!(
        toggle_deployment(&mut controller, &mut Unlimited),
        ToggleOutcome::Transition(WheelState::Deploying)
    );

    // 1.5 s clip at speed 1
    run_frames(&mut controller, 10, 0.1);
    assert_eq!(controller.state(), WheelState::Deploying);
    let progress = controller.find::<DeployModule>().map(|m| m.machine().progress()).unwrap();
    assert!(progress > 0.6 && progress < 0.7);

    run_frames(&mut controller, 10, 0.1);
    assert_eq!(controller.state(), WheelState::Deployed);
}

#[test]
fn double_toggle_reverses_without_reaching_deployed() {
    let mut controller = gear(DeployConfig::default(), WheelState::Retracted);
    let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
    let log = seen.clone();
    controller.set_interactive(true);
    controller.add_state_listener(Box::new(move |_, new| log.lock().unwrap().push(new)));

    toggle_deployment(&mut controller, &mut Unlimited);
    run_frames(&mut controller, 3, 0.1);
    toggle_deployment(&mut controller, &mut Unlimited);
    assert_eq!(controller.state(), WheelState::Retracting);

    run_frames(&mut controller, 30, 0.1);
    assert_eq!(controller.state(), WheelState::Retracted);
    assert!(!seen.lock().unwrap().contains(&WheelState::Deployed));
    assert_eq!(
        *seen.lock().unwrap(),
        vec![WheelState::Deploying, WheelState::Retracting, WheelState::Retracted]
    );
}

#[test]
fn short_resource_is_refunded_exactly() {
    let config = DeployConfig {
        resource: Some("ElectricCharge".to_string()),
        deploy_cost: 10.0,
        ..DeployConfig::default()
    };
    let mut controller = gear(config, WheelState::Retracted);
    let mut tank = ResourceTank::new().with("ElectricCharge", 4.0);

    let outcome = toggle_deployment(&mut controller, &mut tank);
    assert_eq!(outcome, ToggleOutcome::Insufficient { needed: 10.0, available: 4.0 });
    assert_eq!(tank.available("ElectricCharge"), 4.0);
    assert_eq!(controller.state(), WheelState::Retracted);

    tank.set("ElectricCharge", 12.5);
    assert_eq!(
        toggle_deployment(&mut controller, &mut tank),
        ToggleOutcome::Transition(WheelState::Deploying)
    );
    assert_eq!(tank.available("ElectricCharge"), 2.5);
}

#[test]
fn one_shot_gear_locks_after_deploying() {
    let config = DeployConfig { one_shot: true, ..DeployConfig::default() };
    let mut controller = gear(config, WheelState::Retracted);

    assert_eq!(
        toggle_deployment(&mut controller, &mut Unlimited),
        ToggleOutcome::Transition(WheelState::Deploying)
    );
    assert_eq!(toggle_deployment(&mut controller, &mut Unlimited), ToggleOutcome::Locked);
    assert_eq!(controller.state(), WheelState::Deploying);

    run_frames(&mut controller, 20, 0.1);
    assert_eq!(controller.state(), WheelState::Deployed);
    assert_eq!(toggle_deployment(&mut controller, &mut Unlimited), ToggleOutcome::Locked);
    assert_eq!(controller.state(), WheelState::Deployed);
}

#[test]
fn broken_is_left_only_by_repair() {
    let mut controller = gear(DeployConfig::default(), WheelState::Deployed);
    controller.transition(WheelState::Broken);

    assert_eq!(toggle_deployment(&mut controller, &mut Unlimited), ToggleOutcome::Ignored);
    run_frames(&mut controller, 5, 0.1);
    assert_eq!(controller.state(), WheelState::Broken);

    assert!(controller.repair());
    assert_eq!(controller.state(), WheelState::Deployed);
    assert!(!controller.repair());
}

#[test]
fn repair_returns_retracted_gear_to_retracted() {
    let mut controller = gear(DeployConfig::default(), WheelState::Retracted);
    controller.transition(WheelState::Broken);
    assert!(controller.repair());
    assert_eq!(controller.state(), WheelState::Retracted);
}

#[test]
fn part_without_gear_reports_missing_module() {
    let part = PartConfig {
        wheels: vec![WheelConfig::default()],
        ..PartConfig::default()
    };
    let mut controller = WheelController::from_part(&part);
    assert_eq!(toggle_deployment(&mut controller, &mut Unlimited), ToggleOutcome::NoDeployModule);
}

fn loaded_gear(config: DeployConfig, initial: WheelState, saved: &str) -> WheelController {
    let part = PartConfig {
        name: "gear".to_string(),
        wheels: vec![WheelConfig::default()],
        default_state: initial,
        deployment: Some(config),
        ..PartConfig::default()
    };
    let mut controller = WheelController::from_part(&part);
    controller.load(&PersistedState { state: saved.to_string(), wheel_data: String::new() });
    controller.setup(&NoScene);
    controller
}

#[test]
fn state_loaded_before_setup_drives_the_animation() {
    let mut controller = loaded_gear(DeployConfig::default(), WheelState::Deployed, "RETRACTED");
    assert_eq!(controller.state(), WheelState::Retracted);
    assert_eq!(
        toggle_deployment(&mut controller, &mut Unlimited),
        ToggleOutcome::Transition(WheelState::Deploying)
    );

    controller.frame_update(0.016);
    assert_eq!(controller.state(), WheelState::Deploying);
    let progress = controller.find::<DeployModule>().map(|m| m.machine().progress()).unwrap();
    assert!(progress > 0.0 && progress < 0.05, "progress = {progress}");
}

#[test]
fn one_shot_gear_starting_deployed_is_locked() {
    let config = DeployConfig { one_shot: true, ..DeployConfig::default() };
    let mut machine = DeploymentStateMachine::new(&config, WheelState::Deployed);
    assert!(machine.is_locked());
    assert_eq!(machine.toggle(WheelState::Deployed, &mut Unlimited), ToggleOutcome::Locked);

    let mut machine = DeploymentStateMachine::new(&config, WheelState::Retracted);
    assert!(!machine.is_locked());
    machine.sync_to_state(WheelState::Deploying);
    assert!(machine.is_locked());
}

#[test]
fn one_shot_gear_loaded_deployed_stays_locked() {
    let config = DeployConfig { one_shot: true, ..DeployConfig::default() };
    let mut controller = loaded_gear(config, WheelState::Retracted, "DEPLOYED");
    assert_eq!(controller.state(), WheelState::Deployed);
    assert_eq!(toggle_deployment(&mut controller, &mut Unlimited), ToggleOutcome::Locked);
    assert_eq!(controller.state(), WheelState::Deployed);
}

use approx::assert_relative_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use aven_wheel::wheel::suspension::{
    compute_spring_damper, RepairTimer, SuspensionInput, SuspensionParameters, SuspensionSolver,
};

fn by_formula(mass: f32, g: f32, share: f32, rating: f32, damp: f32, length: f32, repair: f32) -> (f32, f32) {
    let corrected = mass / length * share;
    let k = corrected * rating * g * repair * repair;
    let load = k * length * 0.5 / g;
    let omega = (k / load).sqrt();
    (k, 2.0 * load * omega * damp * repair)
}

#[test]
fn two_tonne_quarter_metre_wheel() {
    let sd = compute_spring_damper(2.0, 9.81, 1.0, 0.5, 0.65, 0.25, 1.0);

    // mass 2 (t) over 0.25 m of travel
    assert_relative_eq!(2.0_f32 / 0.25 * 1.0, 8.0);

    let (k, c) = by_formula(2.0, 9.81, 1.0, 0.5, 0.65, 0.25, 1.0);
    assert_relative_eq!(sd.spring, k, max_relative = 1e-5);
    assert_relative_eq!(sd.damper, c, max_relative = 1e-5);
    assert_relative_eq!(sd.spring, 39.24, max_relative = 1e-5);
}

#[test]
fn spring_linear_in_mass_and_damper_non_negative() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..200 {
        let mass = rng.gen_range(0.1..50_000.0_f32);
        let g = rng.gen_range(0.5..30.0_f32);
        let rating = rng.gen_range(0.0..1.0_f32);
        let damp = rng.gen_range(0.0..2.0_f32);
        let length = rng.gen_range(0.01..2.0_f32);
        let share = rng.gen_range(0.0..1.0_f32);

        let one = compute_spring_damper(mass, g, share, rating, damp, length, 1.0);
        let two = compute_spring_damper(mass * 2.0, g, share, rating, damp, length, 1.0);

        assert!(one.damper >= 0.0);
        assert!(two.damper >= 0.0);
        assert_relative_eq!(two.spring, one.spring * 2.0, max_relative = 1e-4, epsilon = 1e-6);
    }
}

#[test]
fn degenerate_inputs_do_not_divide_by_zero() {
    for sd in [
        compute_spring_damper(1000.0, 9.81, 1.0, 0.5, 0.65, 0.0, 1.0),
        compute_spring_damper(1000.0, 0.0, 1.0, 0.5, 0.65, 0.3, 1.0),
        compute_spring_damper(0.0, 9.81, 1.0, 0.5, 0.65, 0.3, 1.0),
        compute_spring_damper(1000.0, 9.81, 1.0, 0.0, 0.65, 0.3, 1.0),
    ] {
        assert!(sd.spring.is_finite());
        assert!(sd.damper.is_finite());
        assert!(sd.damper >= 0.0);
    }
}

#[test]
fn repair_ramp_is_monotonic_and_output_continuous() {
    let mut timer = RepairTimer::new(2.0);
    assert!(timer.is_complete());
    timer.reset();
    assert!(timer.value() > 0.0 && timer.value() < 1.0);

    let mut last_value = timer.value();
    let mut last_spring = compute_spring_damper(1500.0, 9.81, 0.25, 0.5, 0.65, 0.3, last_value).spring;
    let full_spring = compute_spring_damper(1500.0, 9.81, 0.25, 0.5, 0.65, 0.3, 1.0).spring;

    for _ in 0..400 {
        timer.advance(0.01);
        let value = timer.value();
        assert!(value >= last_value);
        assert!(value <= 1.0);

        let spring = compute_spring_damper(1500.0, 9.81, 0.25, 0.5, 0.65, 0.3, value).spring;
        // 10 ms at 0.5/s moves repair by 0.005, k ~ repair^2
        assert!((spring - last_spring).abs() <= full_spring * 0.011);
        last_value = value;
        last_spring = spring;
    }
    assert!(timer.is_complete());
    assert_relative_eq!(last_spring, full_spring);
}

#[test]
fn solver_memoizes_until_inputs_change() {
    let params = SuspensionParameters::default();
    let wheels = [
        SuspensionInput { load_share: 0.5, length: 0.3 },
        SuspensionInput { load_share: 0.5, length: 0.3 },
    ];
    let mut solver = SuspensionSolver::new();

    assert!(solver.solve(&params, &wheels, 1000.0, 9.81));
    assert!(!solver.solve(&params, &wheels, 1000.0, 9.81));
    assert_eq!(solver.solve_count(), 1);
    assert_eq!(solver.results().len(), 2);

    assert!(solver.solve(&params, &wheels, 1200.0, 9.81));
    assert!(solver.solve(&params, &wheels, 1200.0, 1.62));
    assert_eq!(solver.solve_count(), 3);

    solver.invalidate();
    assert!(solver.solve(&params, &wheels, 1200.0, 1.62));
    assert_eq!(solver.solve_count(), 4);

    let mut repaired = params;
    repaired.repair.reset();
    assert!(solver.solve(&repaired, &wheels, 1200.0, 1.62));
    assert!(solver.results()[0].spring < 1e-3);
}

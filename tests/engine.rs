use std::sync::Arc;

use qlib::{
    Body, Bounds, ConfigError, Particle, SimulationError, SimulationSettings, Vector,
    integrator::Integrator,
    quadtree::QuadTree,
    simulation::Phase,
};
use web_time::{Duration, Instant};

const WAIT: Duration = Duration::from_secs(10);

/// Two bodies at rest either side of the origin.
pub fn two_body_system(d: f64, m: f64) -> Vec<Body<f64>> {
    vec![
        Body::at_rest(m, Vector::new(-d, 0.0)),
        Body::at_rest(m, Vector::new(d, 0.0)),
    ]
}

pub fn test_settings() -> SimulationSettings<f64> {
    SimulationSettings::default()
        .with_bounds(Bounds::square(Vector::zeros(), 1000.0))
        .with_timestep(0.1)
}

// ==================================================================================
// Start-up validation
// ==================================================================================

#[test]
fn start_rejects_bad_configuration() {
    let err = qlib::start(two_body_system(1.0, 1.0), test_settings().with_timestep(0.0))
        .unwrap_err();
    assert!(matches!(
        err,
        SimulationError::Config(ConfigError::NonPositiveTimestep)
    ));

    let err = qlib::start(Vec::new(), test_settings()).unwrap_err();
    assert!(matches!(err, SimulationError::Config(ConfigError::NoBodies)));

    let err = qlib::start(two_body_system(1.0, -1.0), test_settings()).unwrap_err();
    assert!(matches!(
        err,
        SimulationError::Config(ConfigError::NonPositiveMass { index: 0 })
    ));
}

// ==================================================================================
// Handoff
// ==================================================================================

#[test]
fn nothing_published_before_first_step() {
    let handle = qlib::start(two_body_system(1.0, 1.0), test_settings()).unwrap();
    assert!(handle.try_take_latest().unwrap().is_none());
    assert!(handle.latest().unwrap().is_none());
    assert!(!handle.wait_for_step(Duration::from_millis(50)).unwrap());

    let status = handle.status();
    assert_eq!(status.phase, Phase::Idle);
    assert_eq!(status.steps_completed, 0);
    assert!(status.running);
    handle.stop().unwrap();
}

#[test]
fn requested_step_is_published() {
    let initial = two_body_system(1.0, 1.0);
    let handle = qlib::start(initial.clone(), test_settings()).unwrap();

    handle.request_step();
    assert!(handle.wait_for_step(WAIT).unwrap());
    let first = handle.try_take_latest().unwrap().expect("one step published");

    assert_eq!(first.step, 1);
    assert_eq!(&first.previous[..], &initial[..]);
    assert_ne!(&first.current[..], &initial[..]);
    assert!(first.current[0].velocity.x > 0.0);
    assert!(first.current[1].velocity.x < 0.0);
    assert!((first.current[0].velocity.x + first.current[1].velocity.x).abs() < 1e-12);
    assert_eq!(first.current[0].velocity.y, 0.0);

    // taken frames are not handed out twice
    assert!(handle.try_take_latest().unwrap().is_none());

    handle.request_step();
    assert!(handle.wait_for_step(WAIT).unwrap());
    let second = handle.try_take_latest().unwrap().unwrap();
    assert_eq!(second.step, 2);
    assert!(Arc::ptr_eq(&second.previous, &first.current));
    assert!(second.published_at >= first.published_at);

    handle.stop().unwrap();
}

#[test]
fn step_interval_is_measured() {
    let handle = qlib::start(two_body_system(5.0, 1.0), test_settings()).unwrap();

    handle.request_step();
    assert!(handle.wait_for_step(WAIT).unwrap());
    let first = handle.try_take_latest().unwrap().unwrap();

    std::thread::sleep(Duration::from_millis(30));
    handle.request_step();
    assert!(handle.wait_for_step(WAIT).unwrap());
    let second = handle.try_take_latest().unwrap().unwrap();

    assert!(second.interval >= Duration::from_millis(30));
    assert_eq!(second.interval, second.published_at - first.published_at);

    let alpha = second.alpha(second.published_at + second.interval * 2);
    assert_eq!(alpha, 1.0);
    handle.stop().unwrap();
}

// ==================================================================================
// Permission and stop
// ==================================================================================

#[test]
fn paused_loop_holds_at_idle() {
    let handle = qlib::start(two_body_system(1.0, 1.0), test_settings()).unwrap();

    handle.request_step();
    handle.request_step();
    handle.pause();
    std::thread::sleep(Duration::from_millis(100));
    let held = handle.status().steps_completed;
    // grants may have been consumed before the pause landed, but no more than that
    assert!(held <= 2);

    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(handle.status().steps_completed, held);
    assert_eq!(handle.status().phase, Phase::Idle);
    handle.stop().unwrap();
}

#[test]
fn free_running_loop_keeps_stepping() {
    let handle = qlib::start(two_body_system(10.0, 1.0), test_settings()).unwrap();
    handle.resume();

    let deadline = Instant::now() + WAIT;
    while handle.status().steps_completed < 5 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(1));
    }
    assert!(handle.status().steps_completed >= 5);

    handle.pause();
    let frame = handle.latest().unwrap().unwrap();
    assert!(frame.step >= 5);
    handle.stop().unwrap();
}

#[test]
fn stop_while_parked_returns_promptly() {
    let handle = qlib::start(two_body_system(1.0, 1.0), test_settings()).unwrap();
    let begin = Instant::now();
    handle.stop().unwrap();
    assert!(begin.elapsed() < Duration::from_secs(5));
}

#[test]
fn dropping_the_handle_stops_the_loop() {
    let handle = qlib::start(two_body_system(1.0, 1.0), test_settings()).unwrap();
    handle.resume();
    drop(handle);
}

// ==================================================================================
// Faults
// ==================================================================================

struct Exploding;

impl Integrator<f64> for Exploding {
    fn integrate_after_force<P: Particle<f64>>(&self, _particle: &mut P, _dt: f64) {
        panic!("integrator blew up");
    }
}

#[test]
fn step_fault_reaches_the_consumer() {
    let handle =
        qlib::start_with_integrator(two_body_system(1.0, 1.0), test_settings(), Exploding)
            .unwrap();
    handle.request_step();

    let err = handle.wait_for_step(WAIT).unwrap_err();
    assert!(matches!(err, SimulationError::StepFaulted { step: 1, .. }));
    assert!(matches!(
        handle.try_take_latest(),
        Err(SimulationError::StepFaulted { .. })
    ));

    let deadline = Instant::now() + WAIT;
    while handle.status().running && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(1));
    }
    let status = handle.status();
    assert!(!status.running);
    assert_eq!(status.steps_completed, 0);
    assert!(status.fault.unwrap().contains("integrator blew up"));

    handle.stop().unwrap();
}

// ==================================================================================
// Drop policy
// ==================================================================================

#[test]
fn body_outside_bounds_contributes_no_mass() {
    let mut bodies = two_body_system(1.0, 2.0);
    bodies.push(Body::at_rest(100.0, Vector::new(5000.0, 0.0)));
    let settings = test_settings();

    let tree = QuadTree::build(settings.bounds, settings.max_depth, &bodies).aggregate();
    assert_eq!(tree.total_mass(), 4.0);
    assert_eq!(tree.dropped(), 1);

    let handle = qlib::start(bodies, settings).unwrap();
    handle.request_step();
    assert!(handle.wait_for_step(WAIT).unwrap());
    let frame = handle.try_take_latest().unwrap().unwrap();
    // the heavy outsider does not pull the pair sideways
    assert!((frame.current[0].velocity.x + frame.current[1].velocity.x).abs() < 1e-12);
    // but it still falls toward them
    assert!(frame.current[2].velocity.x < 0.0);
    handle.stop().unwrap();
}

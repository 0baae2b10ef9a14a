// Runs a BarnesHutSimulation on its own thread and hands completed steps to a
// consumer through a DoubleBuffer.

use std::{
    panic::{self, AssertUnwindSafe},
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
    thread::{self, JoinHandle},
};

use web_time::{Duration, Instant};

use crate::{
    error::{SimulationError, panic_message},
    handoff::{DoubleBuffer, Frame, Snapshot},
    integrator::{Integrator, SymplecticEuler},
    settings::SimulationSettings,
    shared::{Body, Float},
    simulation::{BarnesHutSimulation, Phase},
};

/// Point-in-time view of the computation thread.
#[derive(Clone, Debug, PartialEq)]
pub struct Status {
    pub phase: Phase,
    pub steps_completed: u64,
    pub running: bool,
    pub fault: Option<String>,
}

#[derive(Debug)]
struct Control {
    /// Steps granted through `request_step` and not yet started.
    granted: u64,
    /// Run without waiting for grants.
    free_running: bool,
    stop: bool,
    phase: Phase,
    running: bool,
}

impl Control {
    fn may_start(&self) -> bool {
        self.free_running || self.granted > 0
    }
}

#[derive(Debug)]
struct Fault {
    step: u64,
    message: String,
}

#[derive(Debug)]
struct Published<F: Float> {
    buffer: DoubleBuffer<F>,
    fault: Option<Fault>,
}

impl<F: Float> Published<F> {
    fn check(&self) -> Result<(), SimulationError> {
        match &self.fault {
            Some(fault) => Err(SimulationError::StepFaulted {
                step: fault.step,
                message: fault.message.clone(),
            }),
            None => Ok(()),
        }
    }
}

#[derive(Debug)]
struct Shared<F: Float> {
    control: Mutex<Control>,
    /// Signalled when permission or the stop flag changes.
    permission: Condvar,
    published: Mutex<Published<F>>,
    /// Signalled after every publish and on a fault.
    step_done: Condvar,
}

// Nothing protected here can be left half-updated by a panic, so a poisoned
// lock is still usable.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owner of the computation thread. Dropping it stops the thread.
#[derive(Debug)]
pub struct SimulationHandle<F: Float> {
    shared: Arc<Shared<F>>,
    thread: Option<JoinHandle<()>>,
}

/// Validates the inputs and starts the computation thread, parked at `Idle`
/// until a step is requested.
pub fn start<F: Float>(
    initial_bodies: Vec<Body<F>>,
    settings: SimulationSettings<F>,
) -> Result<SimulationHandle<F>, SimulationError> {
    start_with_integrator(initial_bodies, settings, SymplecticEuler::new())
}

pub fn start_with_integrator<F, I>(
    initial_bodies: Vec<Body<F>>,
    settings: SimulationSettings<F>,
    integrator: I,
) -> Result<SimulationHandle<F>, SimulationError>
where
    F: Float,
    I: Integrator<F> + Send + Sync + 'static,
{
    settings.validate_bodies(&initial_bodies)?;

    let started_at = Instant::now();
    let initial: Snapshot<F> = initial_bodies.into();
    let shared = Arc::new(Shared {
        control: Mutex::new(Control {
            granted: 0,
            free_running: false,
            stop: false,
            phase: Phase::Idle,
            running: true,
        }),
        permission: Condvar::new(),
        published: Mutex::new(Published {
            buffer: DoubleBuffer::new(initial, started_at),
            fault: None,
        }),
        step_done: Condvar::new(),
    });

    let simulation = BarnesHutSimulation::with_integrator(settings, integrator);
    let worker = Arc::clone(&shared);
    let thread = thread::Builder::new()
        .name("barnes-hut".to_string())
        .spawn(move || run(&worker, &simulation))
        .map_err(SimulationError::Spawn)?;

    log::info!("simulation started");
    Ok(SimulationHandle {
        shared,
        thread: Some(thread),
    })
}

fn set_phase<F: Float>(shared: &Shared<F>, phase: Phase) {
    log::trace!("phase -> {phase:?}");
    lock(&shared.control).phase = phase;
}

/// Waits for permission. Returns `false` when asked to stop instead.
fn wait_for_permission<F: Float>(shared: &Shared<F>) -> bool {
    let mut control = lock(&shared.control);
    loop {
        if control.stop {
            return false;
        }
        if control.may_start() {
            if !control.free_running {
                control.granted -= 1;
            }
            return true;
        }
        control = shared
            .permission
            .wait(control)
            .unwrap_or_else(PoisonError::into_inner);
    }
}

fn run<F, I>(shared: &Shared<F>, simulation: &BarnesHutSimulation<F, I>)
where
    F: Float,
    I: Integrator<F> + Sync,
{
    let mut step = 0u64;

    while wait_for_permission(shared) {
        step += 1;
        let current = lock(&shared.published).buffer.current();
        let mut working = current.to_vec();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            simulation.step_with(&mut working, |phase| set_phase(shared, phase))
        }));

        let report = match outcome {
            Ok(report) => report,
            Err(payload) => {
                let message = panic_message(&*payload);
                log::error!("step {step} faulted: {message}");
                let mut published = lock(&shared.published);
                published.fault = Some(Fault { step, message });
                shared.step_done.notify_all();
                break;
            }
        };

        set_phase(shared, Phase::Publishing);
        let next: Snapshot<F> = working.into();
        {
            let mut published = lock(&shared.published);
            published.buffer.publish(next, Instant::now());
        }
        shared.step_done.notify_all();

        log::debug!(
            "step {step} took {:?} ({} nodes, {} visits, {} dropped)",
            report.elapsed,
            report.nodes,
            report.nodes_visited,
            report.dropped
        );
        set_phase(shared, Phase::Idle);
    }

    let mut control = lock(&shared.control);
    control.phase = Phase::Idle;
    control.running = false;
    drop(control);
    log::info!("simulation thread exiting after {step} steps");
}

impl<F: Float> SimulationHandle<F> {
    /// Allows one more step to run. Grants accumulate.
    pub fn request_step(&self) {
        let mut control = lock(&self.shared.control);
        control.granted += 1;
        self.shared.permission.notify_all();
    }

    /// Lets the loop step continuously until paused.
    pub fn resume(&self) {
        lock(&self.shared.control).free_running = true;
        self.shared.permission.notify_all();
    }

    /// Holds the loop at `Idle` once the step in progress, if any, is published.
    pub fn pause(&self) {
        let mut control = lock(&self.shared.control);
        control.free_running = false;
        control.granted = 0;
    }

    /// Newest frame not yet returned by this method, without blocking.
    pub fn try_take_latest(&self) -> Result<Option<Frame<F>>, SimulationError> {
        let mut published = lock(&self.shared.published);
        published.check()?;
        Ok(published.buffer.take())
    }

    /// Newest frame, whether or not it was taken before.
    pub fn latest(&self) -> Result<Option<Frame<F>>, SimulationError> {
        let published = lock(&self.shared.published);
        published.check()?;
        Ok(published.buffer.frame())
    }

    /// Blocks until an untaken step is available or `timeout` passes. Returns
    /// whether one is available.
    pub fn wait_for_step(&self, timeout: Duration) -> Result<bool, SimulationError> {
        let deadline = Instant::now() + timeout;
        let mut published = lock(&self.shared.published);
        loop {
            published.check()?;
            if published.buffer.has_new() {
                return Ok(true);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            published = self
                .shared
                .step_done
                .wait_timeout(published, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    pub fn status(&self) -> Status {
        let (steps_completed, fault) = {
            let published = lock(&self.shared.published);
            let fault = published.fault.as_ref().map(|f| f.message.clone());
            (published.buffer.step(), fault)
        };
        let control = lock(&self.shared.control);
        Status {
            phase: control.phase,
            steps_completed,
            running: control.running,
            fault,
        }
    }

    /// Asks the loop to exit and waits for the thread. A step in progress is
    /// finished and published first.
    pub fn stop(mut self) -> Result<(), SimulationError> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<(), SimulationError> {
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        lock(&self.shared.control).stop = true;
        self.shared.permission.notify_all();

        thread
            .join()
            .map_err(|payload| SimulationError::WorkerPanicked(panic_message(&*payload)))?;
        log::info!("simulation stopped");
        Ok(())
    }
}

impl<F: Float> Drop for SimulationHandle<F> {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            log::error!("{err}");
        }
    }
}

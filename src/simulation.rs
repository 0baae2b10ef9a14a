use rayon::prelude::*;
use web_time::{Duration, Instant};

use crate::{
    integrator::{Integrator, SymplecticEuler},
    quadtree::{ForceParams, QuadTree},
    settings::SimulationSettings,
    shared::{Body, Float},
};

/// Where the computation thread is within its cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Parked, waiting for permission to start a step.
    Idle,
    Building,
    Aggregating,
    ForceAndIntegrate,
    Publishing,
}

/// What one step did, for logging and diagnostics.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StepReport {
    pub inserted: usize,
    pub dropped: usize,
    pub nodes: usize,
    pub nodes_visited: usize,
    pub elapsed: Duration,
}

/// One Barnes-Hut step over a working copy of the point set: build the tree,
/// aggregate it, then kick and drift every body in parallel.
#[derive(Clone, Debug)]
pub struct BarnesHutSimulation<F: Float, I = SymplecticEuler>
where
    I: Integrator<F>,
{
    settings: SimulationSettings<F>,
    integrator: I,
}

impl<F: Float> BarnesHutSimulation<F> {
    pub fn new(settings: SimulationSettings<F>) -> Self {
        Self::with_integrator(settings, SymplecticEuler::new())
    }
}

impl<F: Float, I: Integrator<F> + Sync> BarnesHutSimulation<F, I> {
    pub fn with_integrator(settings: SimulationSettings<F>, integrator: I) -> Self {
        Self {
            settings,
            integrator,
        }
    }

    fn force_params(&self) -> ForceParams<F> {
        ForceParams {
            theta: self.settings.theta,
            gravity_constant: self.settings.gravity_constant,
            timestep: self.settings.timestep,
            softening: self.settings.softening,
        }
    }

    pub fn step(&self, points: &mut [Body<F>]) -> StepReport {
        self.step_with(points, |_| {})
    }

    /// Advances `points` by one timestep, reporting each phase as it is
    /// entered. The tree never outlives this call.
    pub fn step_with(&self, points: &mut [Body<F>], mut on_phase: impl FnMut(Phase)) -> StepReport {
        let start = Instant::now();
        let dt = self.settings.timestep;

        on_phase(Phase::Building);
        for point in points.iter_mut() {
            self.integrator.integrate_pre_force(point, dt);
        }
        let tree = QuadTree::build(self.settings.bounds, self.settings.max_depth, points.iter());
        let nodes = tree.node_count();

        on_phase(Phase::Aggregating);
        let tree = tree.aggregate();

        on_phase(Phase::ForceAndIntegrate);
        let params = self.force_params();
        let nodes_visited: usize = points
            .par_iter_mut()
            .map(|point| {
                let visited = tree.compute_force(point, &params);
                self.integrator.integrate_after_force(point, dt);
                visited
            })
            .sum();

        StepReport {
            inserted: tree.inserted(),
            dropped: tree.dropped(),
            nodes,
            nodes_visited,
            elapsed: start.elapsed(),
        }
    }
}

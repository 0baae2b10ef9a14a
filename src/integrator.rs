use crate::shared::{Float, Particle};

pub trait Integrator<F: Float> {
    /// Runs before the force pass. Velocity-first schemes have nothing to do here.
    fn integrate_pre_force<P: Particle<F>>(&self, _particle: &mut P, _dt: F) {}

    /// Runs once the particle's force traversal has finished.
    fn integrate_after_force<P: Particle<F>>(&self, particle: &mut P, dt: F);
}

/// Semi-implicit Euler: the velocity kicked during the force pass moves the
/// position within the same step.
#[derive(Clone, Copy, Debug, Default)]
pub struct SymplecticEuler;

impl SymplecticEuler {
    pub fn new() -> Self {
        Self
    }
}

impl<F: Float> Integrator<F> for SymplecticEuler {
    fn integrate_after_force<P: Particle<F>>(&self, particle: &mut P, dt: F) {
        let velocity = *particle.velocity();
        *particle.position_mut() += velocity * dt;
    }
}

use crate::error::ConfigError;
use crate::shared::{Body, Bounds, Float, Vector};

/// Half side length of the default root square.
pub const DEFAULT_HALF_SIZE: f64 = 160_000.0;

/// Deepest level a cell may be split to. Leaves at this depth keep every body
/// that lands in them.
pub const DEFAULT_MAX_DEPTH: usize = 48;

/// Constants fixed for the lifetime of one simulation loop.
#[derive(Clone, Debug, PartialEq)]
pub struct SimulationSettings<F: Float> {
    /// Opening-angle threshold. Zero never approximates.
    pub theta: F,
    pub gravity_constant: F,
    pub timestep: F,
    pub softening: F,
    /// Root cell of every tree. Bodies outside it are dropped from the tree.
    pub bounds: Bounds<F>,
    pub max_depth: usize,
}

impl<F: Float> Default for SimulationSettings<F> {
    fn default() -> Self {
        Self {
            theta: nalgebra::convert::<f64, F>(0.5),
            gravity_constant: F::one(),
            timestep: F::one(),
            softening: F::one(),
            bounds: Bounds::square(Vector::zeros(), nalgebra::convert::<f64, F>(DEFAULT_HALF_SIZE)),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl<F: Float> SimulationSettings<F> {
    pub fn with_theta(mut self, theta: F) -> Self {
        self.theta = theta;
        self
    }

    pub fn with_gravity_constant(mut self, gravity_constant: F) -> Self {
        self.gravity_constant = gravity_constant;
        self
    }

    pub fn with_timestep(mut self, timestep: F) -> Self {
        self.timestep = timestep;
        self
    }

    pub fn with_softening(mut self, softening: F) -> Self {
        self.softening = softening;
        self
    }

    pub fn with_bounds(mut self, bounds: Bounds<F>) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.timestep > F::zero()) || !num_traits::Float::is_finite(self.timestep) {
            return Err(ConfigError::NonPositiveTimestep);
        }
        if !(self.softening > F::zero()) || !num_traits::Float::is_finite(self.softening) {
            return Err(ConfigError::NonPositiveSoftening);
        }
        if !(self.theta >= F::zero()) {
            return Err(ConfigError::NegativeTheta);
        }
        if !(self.gravity_constant >= F::zero())
            || !num_traits::Float::is_finite(self.gravity_constant)
        {
            return Err(ConfigError::InvalidGravityConstant);
        }
        if !self.bounds.is_valid() {
            return Err(ConfigError::InvalidBounds);
        }
        if self.max_depth == 0 {
            return Err(ConfigError::ZeroMaxDepth);
        }
        Ok(())
    }

    /// Validates the settings together with the bodies a loop would start from.
    /// Bodies outside `bounds` are accepted; they are dropped from the tree.
    pub fn validate_bodies(&self, bodies: &[Body<F>]) -> Result<(), ConfigError> {
        self.validate()?;
        if bodies.is_empty() {
            return Err(ConfigError::NoBodies);
        }
        for (index, body) in bodies.iter().enumerate() {
            if !(body.mass > F::zero()) || !num_traits::Float::is_finite(body.mass) {
                return Err(ConfigError::NonPositiveMass { index });
            }
            let finite = body
                .position
                .iter()
                .chain(body.velocity.iter())
                .all(|v| num_traits::Float::is_finite(*v));
            if !finite {
                return Err(ConfigError::NonFinitePosition { index });
            }
        }
        Ok(())
    }
}

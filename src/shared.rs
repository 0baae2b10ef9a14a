// Types shared by the tree, the integrator and the simulation loop.

use nalgebra::{RealField, SVector};

pub type Vector<F> = SVector<F, 2>;

pub trait Float: RealField + num_traits::Float + Copy + Send + Sync + 'static {}

impl<T> Float for T where T: RealField + num_traits::Float + Copy + Send + Sync + 'static {}

pub trait Particle<F: Float> {
    fn position(&self) -> &Vector<F>;
    fn velocity(&self) -> &Vector<F>;
    fn position_mut(&mut self) -> &mut Vector<F>;
    fn velocity_mut(&mut self) -> &mut Vector<F>;
    fn get_mass(&self) -> F;
}

/// A point mass. Bodies have no identity beyond their index in a snapshot.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Body<F: Float> {
    pub mass: F,
    pub position: Vector<F>,
    pub velocity: Vector<F>,
}

impl<F: Float> Body<F> {
    pub fn new(mass: F, position: Vector<F>, velocity: Vector<F>) -> Self {
        Self {
            mass,
            position,
            velocity,
        }
    }

    pub fn at_rest(mass: F, position: Vector<F>) -> Self {
        Self::new(mass, position, Vector::zeros())
    }
}

impl<F: Float> Particle<F> for Body<F> {
    fn position(&self) -> &Vector<F> {
        &self.position
    }

    fn velocity(&self) -> &Vector<F> {
        &self.velocity
    }

    fn position_mut(&mut self) -> &mut Vector<F> {
        &mut self.position
    }

    fn velocity_mut(&mut self) -> &mut Vector<F> {
        &mut self.velocity
    }

    fn get_mass(&self) -> F {
        self.mass
    }
}

/// Axis-aligned rectangle covering `[min, max)` on both axes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds<F: Float> {
    pub min: Vector<F>,
    pub max: Vector<F>,
}

impl<F: Float> Bounds<F> {
    pub fn new(min: Vector<F>, max: Vector<F>) -> Self {
        Self { min, max }
    }

    /// Square of side `2 * half_size` centered on `center`.
    pub fn square(center: Vector<F>, half_size: F) -> Self {
        let half = Vector::repeat(half_size);
        Self::new(center - half, center + half)
    }

    pub fn width(&self) -> F {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> F {
        self.max.y - self.min.y
    }

    pub fn center(&self) -> Vector<F> {
        (self.min + self.max) * nalgebra::convert::<f64, F>(0.5)
    }

    pub fn contains(&self, point: &Vector<F>) -> bool {
        point.x >= self.min.x && point.x < self.max.x && point.y >= self.min.y && point.y < self.max.y
    }

    /// Whether the midpoint lies strictly inside on both axes, i.e. splitting
    /// would produce four non-empty cells.
    pub fn can_split(&self) -> bool {
        let center = self.center();
        center.x > self.min.x
            && center.x < self.max.x
            && center.y > self.min.y
            && center.y < self.max.y
    }

    /// Quadrant `index` in the order top-left, top-right, bottom-left,
    /// bottom-right (with y growing downwards from `min`).
    pub fn create_quadrant(&self, index: usize) -> Self {
        let center = self.center();
        let (min_x, max_x) = if index & 1 == 0 {
            (self.min.x, center.x)
        } else {
            (center.x, self.max.x)
        };
        let (min_y, max_y) = if index & 2 == 0 {
            (self.min.y, center.y)
        } else {
            (center.y, self.max.y)
        };
        Self::new(Vector::new(min_x, min_y), Vector::new(max_x, max_y))
    }

    pub fn is_valid(&self) -> bool {
        let finite = self.min.iter().chain(self.max.iter()).all(|v| num_traits::Float::is_finite(*v));
        finite && self.width() > F::zero() && self.height() > F::zero()
    }
}

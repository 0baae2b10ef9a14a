use rand::Rng;

use crate::shared::{Body, Float, Vector};

/// A disc of equal-mass bodies in circular-ish rotation about its center,
/// moving as a whole with `base_velocity`.
#[derive(Clone, Debug)]
pub struct Galaxy<F: Float> {
    pub count: usize,
    pub radius: F,
    /// Orbital speed at the rim; scales linearly with distance from the center.
    pub speed: F,
    pub center: Vector<F>,
    pub base_velocity: Vector<F>,
    pub mass: F,
}

impl<F: Float> Galaxy<F> {
    pub fn new(count: usize, radius: F, speed: F) -> Self {
        Self {
            count,
            radius,
            speed,
            center: Vector::zeros(),
            base_velocity: Vector::zeros(),
            mass: F::one(),
        }
    }

    pub fn centered_at(mut self, center: Vector<F>) -> Self {
        self.center = center;
        self
    }

    pub fn moving_at(mut self, base_velocity: Vector<F>) -> Self {
        self.base_velocity = base_velocity;
        self
    }

    pub fn with_mass(mut self, mass: F) -> Self {
        self.mass = mass;
        self
    }

    /// Appends `count` bodies to `points`.
    pub fn populate<R: Rng>(&self, rng: &mut R, points: &mut Vec<Body<F>>) {
        let radius_max = to_f64(self.radius);
        let speed = to_f64(self.speed);
        let center = self.center.map(to_f64);
        let base = self.base_velocity.map(to_f64);

        points.reserve(self.count);
        for _ in 0..self.count {
            let angle = f64::from(rng.random_range(0u16..360)).to_radians();
            // sqrt keeps the surface density uniform
            let radius = rng.random::<f64>().sqrt() * radius_max;

            let x = center.x + angle.cos() * radius;
            let y = center.y + angle.sin() * radius;
            let tangent = f64::atan2(center.y - y, center.x - x) - std::f64::consts::FRAC_PI_2;
            let orbital = if radius_max > 0.0 {
                speed * (radius / radius_max)
            } else {
                0.0
            };

            points.push(Body::new(
                self.mass,
                Vector::new(from_f64(x), from_f64(y)),
                Vector::new(
                    from_f64(base.x + tangent.cos() * orbital),
                    from_f64(base.y + tangent.sin() * orbital),
                ),
            ));
        }
    }
}

fn to_f64<F: Float>(value: F) -> f64 {
    num_traits::cast::<F, f64>(value).unwrap_or(0.0)
}

fn from_f64<F: Float>(value: f64) -> F {
    nalgebra::convert::<f64, F>(value)
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    #[test]
    fn same_seed_same_galaxy() {
        let galaxy = Galaxy::new(200, 400.0, 12.0);
        let mut a = Vec::new();
        let mut b = Vec::new();
        galaxy.populate(&mut StdRng::seed_from_u64(9), &mut a);
        galaxy.populate(&mut StdRng::seed_from_u64(9), &mut b);
        assert_eq!(a.len(), 200);
        assert_eq!(a, b);
    }

    #[test]
    fn bodies_stay_within_radius_and_rotate() {
        let center: Vector<f64> = Vector::new(1000.0, -500.0);
        let galaxy = Galaxy::new(500, 400.0, 12.0)
            .centered_at(center)
            .moving_at(Vector::new(3.0, 0.0))
            .with_mass(2.5);
        let mut points = Vec::new();
        galaxy.populate(&mut StdRng::seed_from_u64(1), &mut points);

        for body in &points {
            let offset = body.position - center;
            assert!(offset.norm() <= 400.0 + 1e-9);
            assert_eq!(body.mass, 2.5);

            let relative = body.velocity - Vector::new(3.0, 0.0);
            assert!(relative.norm() <= 12.0 + 1e-9);
            // orbital velocity is perpendicular to the radius
            assert!(offset.dot(&relative).abs() < 1e-6 * (1.0 + offset.norm()));
        }
    }

    #[test]
    fn appends_to_existing_points() {
        let mut points = vec![Body::at_rest(1.0, Vector::new(0.0, 0.0))];
        Galaxy::new(10, 5.0, 1.0).populate(&mut StdRng::seed_from_u64(3), &mut points);
        assert_eq!(points.len(), 11);
    }
}

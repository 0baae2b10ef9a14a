use web_time::Instant;

use crate::{
    handoff::Frame,
    shared::{Float, Vector},
};

impl<F: Float> Frame<F> {
    /// How far `now` is between the publish of `current` and the expected
    /// publish of the next step, clamped to `[0, 1]`.
    pub fn alpha(&self, now: Instant) -> F {
        let interval = self.interval.as_secs_f64();
        if interval <= 0.0 {
            return F::one();
        }
        let elapsed = now.saturating_duration_since(self.published_at).as_secs_f64();
        nalgebra::convert::<f64, F>((elapsed / interval).clamp(0.0, 1.0))
    }

    /// Writes `previous + (current - previous) * alpha` for every body into `out`.
    pub fn interpolate_into(&self, alpha: F, out: &mut Vec<Vector<F>>) {
        out.clear();
        out.extend(
            self.previous
                .iter()
                .zip(self.current.iter())
                .map(|(prev, curr)| prev.position + (curr.position - prev.position) * alpha),
        );
    }

    pub fn interpolate(&self, alpha: F) -> Vec<Vector<F>> {
        let mut out = Vec::with_capacity(self.current.len());
        self.interpolate_into(alpha, &mut out);
        out
    }
}

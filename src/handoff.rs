// The only state shared between the computation thread and its consumer.

use std::sync::Arc;

use web_time::{Duration, Instant};

use crate::shared::{Body, Float};

pub type Snapshot<F> = Arc<[Body<F>]>;

/// The two most recent published states and the timing between them.
#[derive(Clone, Debug)]
pub struct Frame<F: Float> {
    pub previous: Snapshot<F>,
    pub current: Snapshot<F>,
    /// Wall-clock time between the publishes of `previous` and `current`.
    pub interval: Duration,
    pub published_at: Instant,
    /// Number of the step that produced `current`, starting at 1.
    pub step: u64,
}

#[derive(Debug)]
pub struct DoubleBuffer<F: Float> {
    previous: Snapshot<F>,
    current: Snapshot<F>,
    published_at: Instant,
    interval: Duration,
    step: u64,
    taken: u64,
}

impl<F: Float> DoubleBuffer<F> {
    /// Both slots start out as `initial`; `started_at` is the reference for
    /// the first measured interval.
    pub fn new(initial: Snapshot<F>, started_at: Instant) -> Self {
        Self {
            previous: initial.clone(),
            current: initial,
            published_at: started_at,
            interval: Duration::ZERO,
            step: 0,
            taken: 0,
        }
    }

    /// Makes `next` current and demotes the old current to previous.
    pub fn publish(&mut self, next: Snapshot<F>, now: Instant) {
        self.previous = std::mem::replace(&mut self.current, next);
        self.interval = now.saturating_duration_since(self.published_at);
        self.published_at = now;
        self.step += 1;
    }

    /// Snapshot the next step should start from.
    pub fn current(&self) -> Snapshot<F> {
        self.current.clone()
    }

    pub fn step(&self) -> u64 {
        self.step
    }

    /// Whether a step was published since the last [`DoubleBuffer::take`].
    pub fn has_new(&self) -> bool {
        self.step > self.taken
    }

    /// Latest frame, `None` before the first publish.
    pub fn frame(&self) -> Option<Frame<F>> {
        if self.step == 0 {
            return None;
        }
        Some(Frame {
            previous: self.previous.clone(),
            current: self.current.clone(),
            interval: self.interval,
            published_at: self.published_at,
            step: self.step,
        })
    }

    /// Like [`DoubleBuffer::frame`], but only once per published step.
    pub fn take(&mut self) -> Option<Frame<F>> {
        if !self.has_new() {
            return None;
        }
        self.taken = self.step;
        self.frame()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::Vector;

    fn snapshot(x: f64) -> Snapshot<f64> {
        vec![Body::at_rest(1.0, Vector::new(x, 0.0))].into()
    }

    #[test]
    fn nothing_before_first_publish() {
        let mut buffer = DoubleBuffer::new(snapshot(0.0), Instant::now());
        assert!(buffer.frame().is_none());
        assert!(buffer.take().is_none());
        assert_eq!(buffer.current()[0].position.x, 0.0);
    }

    #[test]
    fn publish_rotates_slots() {
        let start = Instant::now();
        let initial = snapshot(0.0);
        let mut buffer = DoubleBuffer::new(initial.clone(), start);

        let first = snapshot(1.0);
        buffer.publish(first.clone(), start + Duration::from_millis(10));
        let frame = buffer.frame().unwrap();
        assert!(Arc::ptr_eq(&frame.previous, &initial));
        assert!(Arc::ptr_eq(&frame.current, &first));
        assert_eq!(frame.interval, Duration::from_millis(10));
        assert_eq!(frame.step, 1);

        let second = snapshot(2.0);
        buffer.publish(second.clone(), start + Duration::from_millis(35));
        let frame = buffer.frame().unwrap();
        assert!(Arc::ptr_eq(&frame.previous, &first));
        assert!(Arc::ptr_eq(&frame.current, &second));
        assert_eq!(frame.interval, Duration::from_millis(25));
        assert_eq!(frame.published_at, start + Duration::from_millis(35));
    }

    #[test]
    fn take_yields_each_step_once() {
        let start = Instant::now();
        let mut buffer = DoubleBuffer::new(snapshot(0.0), start);

        buffer.publish(snapshot(1.0), start);
        assert!(buffer.has_new());
        assert_eq!(buffer.take().map(|f| f.step), Some(1));
        assert!(buffer.take().is_none());
        // peeking is unaffected by take
        assert_eq!(buffer.frame().map(|f| f.step), Some(1));

        buffer.publish(snapshot(2.0), start);
        buffer.publish(snapshot(3.0), start);
        let frame = buffer.take().unwrap();
        assert_eq!(frame.step, 3);
        assert_eq!(frame.previous[0].position.x, 2.0);
    }
}

pub mod engine;
pub mod error;
pub mod galaxy;
pub mod handoff;
pub mod integrator;
pub mod interpolate;
pub mod quadtree;
pub mod settings;
pub mod shared;
pub mod simulation;

pub use engine::{SimulationHandle, Status, start, start_with_integrator};
pub use error::{ConfigError, SimulationError};
pub use handoff::{Frame, Snapshot};
pub use settings::SimulationSettings;
pub use shared::{Body, Bounds, Float, Particle, Vector};

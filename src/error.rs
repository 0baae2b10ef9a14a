use std::fmt;

/// Rejected settings or initial bodies. Reported by `start` before any thread
/// is spawned.
#[derive(Clone, Debug, PartialEq)]
pub enum ConfigError {
    NoBodies,
    NonPositiveMass { index: usize },
    NonFinitePosition { index: usize },
    NonPositiveTimestep,
    NonPositiveSoftening,
    NegativeTheta,
    InvalidGravityConstant,
    InvalidBounds,
    ZeroMaxDepth,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::NoBodies => write!(f, "the initial body set is empty"),
            ConfigError::NonPositiveMass { index } => {
                write!(f, "body {index} has a non-positive or non-finite mass")
            }
            ConfigError::NonFinitePosition { index } => {
                write!(f, "body {index} has a non-finite position or velocity")
            }
            ConfigError::NonPositiveTimestep => write!(f, "timestep must be positive"),
            ConfigError::NonPositiveSoftening => write!(f, "softening must be positive"),
            ConfigError::NegativeTheta => write!(f, "theta must not be negative"),
            ConfigError::InvalidGravityConstant => {
                write!(f, "gravity constant must be finite and not negative")
            }
            ConfigError::InvalidBounds => {
                write!(f, "tree root bounds must be finite with positive extent")
            }
            ConfigError::ZeroMaxDepth => write!(f, "maximum tree depth must be at least 1"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug)]
pub enum SimulationError {
    Config(ConfigError),
    /// The operating system refused to start the computation thread.
    Spawn(std::io::Error),
    /// A step panicked. The loop is gone; the last published frame is intact.
    StepFaulted { step: u64, message: String },
    /// The computation thread died outside of a step.
    WorkerPanicked(String),
}

impl fmt::Display for SimulationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimulationError::Config(err) => write!(f, "invalid configuration: {err}"),
            SimulationError::Spawn(err) => write!(f, "failed to spawn simulation thread: {err}"),
            SimulationError::StepFaulted { step, message } => {
                write!(f, "step {step} faulted: {message}")
            }
            SimulationError::WorkerPanicked(message) => {
                write!(f, "simulation thread panicked: {message}")
            }
        }
    }
}

impl std::error::Error for SimulationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SimulationError::Config(err) => Some(err),
            SimulationError::Spawn(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ConfigError> for SimulationError {
    fn from(err: ConfigError) -> Self {
        SimulationError::Config(err)
    }
}

/// Best-effort text for a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

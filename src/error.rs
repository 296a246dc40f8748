//! Error types for motion-core.
//!
//! Only configuration and set-up can fail with an error. The planning and
//! step-generation paths report backpressure and halts through `bool`/`Option`
//! return values instead.

use core::fmt;

/// Result type alias using the library's Error type.
pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for all motion-core operations.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Configuration parsing or validation error
    Config(ConfigError),
    /// Step ticker set-up error
    Ticker(TickerError),
}

/// Configuration-related errors.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Failed to parse TOML configuration
    ParseError(heapless::String<128>),
    /// Steps per millimeter must be finite and > 0
    InvalidStepsPerMm(f32),
    /// Junction deviation must be finite and >= 0
    InvalidJunctionDeviation(f32),
    /// Minimum planner speed must be finite and >= 0
    InvalidMinimumPlannerSpeed(f32),
    /// Step ticker frequency must be > 0
    InvalidFrequency(u32),
    /// Unstep delay must be shorter than the tick period
    InvalidUnstepTime {
        /// Requested delay in microseconds
        unstep_us: u32,
        /// Tick period in microseconds
        period_us: u32,
    },
    /// No actuators configured
    NoActuators,
    /// More actuators than a block can describe
    TooManyActuators(usize),
    /// Duplicate actuator name in configuration
    DuplicateActuatorName(heapless::String<16>),
    /// File I/O error (std only)
    #[cfg(feature = "std")]
    IoError(heapless::String<128>),
}

/// Step ticker errors.
#[derive(Debug, Clone, PartialEq)]
pub enum TickerError {
    /// Frequency and unstep delay can only change before `start`
    AlreadyStarted,
    /// The hardware timer refused the requested rate
    TimerSetup,
    /// Unstep delay must be shorter than the tick period
    UnstepTooLong {
        /// Requested delay in microseconds
        unstep_us: u32,
        /// Tick period in microseconds
        period_us: u32,
    },
    /// No free actuator slot
    TooManyActuators,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(e) => write!(f, "Configuration error: {}", e),
            Error::Ticker(e) => write!(f, "Step ticker error: {}", e),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            ConfigError::InvalidStepsPerMm(v) => {
                write!(f, "Invalid steps per mm: {}. Must be > 0", v)
            }
            ConfigError::InvalidJunctionDeviation(v) => {
                write!(f, "Invalid junction deviation: {}. Must be >= 0", v)
            }
            ConfigError::InvalidMinimumPlannerSpeed(v) => {
                write!(f, "Invalid minimum planner speed: {}. Must be >= 0", v)
            }
            ConfigError::InvalidFrequency(v) => write!(f, "Invalid step frequency: {}. Must be > 0", v),
            ConfigError::InvalidUnstepTime { unstep_us, period_us } => write!(
                f,
                "Invalid unstep time: {}us must be less than the step period {}us",
                unstep_us, period_us
            ),
            ConfigError::NoActuators => write!(f, "No actuators configured"),
            ConfigError::TooManyActuators(n) => write!(
                f,
                "Too many actuators: {} (max {})",
                n,
                crate::motion::MAX_ACTUATORS
            ),
            ConfigError::DuplicateActuatorName(name) => {
                write!(f, "Duplicate actuator name: '{}'", name)
            }
            #[cfg(feature = "std")]
            ConfigError::IoError(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl fmt::Display for TickerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TickerError::AlreadyStarted => {
                write!(f, "Cannot change step ticker timing after it has been started")
            }
            TickerError::TimerSetup => write!(f, "Step timer setup failed"),
            TickerError::UnstepTooLong { unstep_us, period_us } => write!(
                f,
                "Unstep delay {}us must be less than the step period {}us",
                unstep_us, period_us
            ),
            TickerError::TooManyActuators => write!(
                f,
                "Cannot register more than {} actuators",
                crate::motion::MAX_ACTUATORS
            ),
        }
    }
}

// Conversion impls
impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl From<TickerError> for Error {
    fn from(e: TickerError) -> Self {
        Error::Ticker(e)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

#[cfg(feature = "std")]
impl std::error::Error for ConfigError {}

#[cfg(feature = "std")]
impl std::error::Error for TickerError {}

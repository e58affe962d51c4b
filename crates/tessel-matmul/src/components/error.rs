use std::fmt::{Debug, Display};

use tessel_common::ElemKind;
use tessel_runtime::LaunchError;

use super::LayoutError;

/// Errors that can occur while setting up or launching a matmul.
pub enum MatmulSetupError {
    /// The device can't run the requested matmul at all.
    Unavailable(MatmulAvailabilityError),

    /// The selection doesn't describe a valid pipeline.
    InvalidConfig(InvalidConfigError),

    /// The problem or its arguments are inconsistent.
    InvalidProblem(InvalidConfigError),

    /// The launch itself failed.
    Launch(LaunchError),
}

/// A feature the matmul needs is missing on the device.
pub enum MatmulAvailabilityError {
    /// The element types can't be combined by the matrix unit.
    TypesUnavailable { input: ElemKind, output: ElemKind },

    /// The kernel needs vector sub-blocks but the device has none.
    NoVectorCores,
}

impl MatmulSetupError {
    /// Shortcut for an [invalid problem](MatmulSetupError::InvalidProblem) error.
    pub fn invalid_problem<S: Display + Send + Sync + 'static>(reason: S) -> Self {
        Self::InvalidProblem(Box::new(reason))
    }

    /// Shortcut for an [invalid config](MatmulSetupError::InvalidConfig) error.
    pub fn invalid_config<S: Display + Send + Sync + 'static>(reason: S) -> Self {
        Self::InvalidConfig(Box::new(reason))
    }
}

impl From<MatmulAvailabilityError> for MatmulSetupError {
    fn from(value: MatmulAvailabilityError) -> Self {
        Self::Unavailable(value)
    }
}

impl From<InvalidConfigError> for MatmulSetupError {
    fn from(value: InvalidConfigError) -> Self {
        Self::InvalidConfig(value)
    }
}

impl From<LayoutError> for MatmulSetupError {
    fn from(value: LayoutError) -> Self {
        Self::invalid_problem(value)
    }
}

impl From<LaunchError> for MatmulSetupError {
    fn from(value: LaunchError) -> Self {
        Self::Launch(value)
    }
}

impl Display for MatmulSetupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl Debug for MatmulSetupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatmulSetupError::Unavailable(err) => {
                write!(
                    f,
                    "Unable to launch matmul because a required feature is unavailable: {err:?}"
                )
            }
            MatmulSetupError::InvalidConfig(err) => {
                write!(
                    f,
                    "Unable to launch matmul because the config is invalid: {err}"
                )
            }
            MatmulSetupError::InvalidProblem(err) => {
                write!(
                    f,
                    "Unable to launch matmul because the problem is invalid: {err}"
                )
            }
            MatmulSetupError::Launch(err) => {
                write!(f, "Matmul launch failed: {err}")
            }
        }
    }
}

impl std::error::Error for MatmulSetupError {}

impl Debug for MatmulAvailabilityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatmulAvailabilityError::TypesUnavailable { input, output } => {
                write!(f, "Types input={input} and/or output={output} not supported.")
            }
            MatmulAvailabilityError::NoVectorCores => {
                write!(f, "The device has no vector sub-blocks.")
            }
        }
    }
}

/// Error that arises from invalid configurations
pub type InvalidConfigError = Box<dyn Display + Send + Sync>;

/// Error whose message is only formatted when displayed
pub struct FormattedConfigError {
    func: Box<dyn Fn() -> String + Send + Sync>,
}

impl FormattedConfigError {
    #[allow(clippy::new_ret_no_self)]
    pub fn new<F: Fn() -> String + Send + Sync + 'static>(func: F) -> InvalidConfigError {
        Box::new(Self {
            func: Box::new(func),
        })
    }
}

impl Display for FormattedConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let string = (self.func)();
        write!(f, "{string}")
    }
}

use super::logger::{LogLevel, LoggerConfig};

/// Configuration for kernel launch logging.
#[derive(Default, Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct KernelConfig {
    /// Logger configuration for launch summaries.
    #[serde(default)]
    pub logger: LoggerConfig<KernelLogLevel>,
}

/// Log levels for kernel launches.
#[derive(Default, Clone, Copy, Debug, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub enum KernelLogLevel {
    /// Launch logging is disabled.
    #[default]
    #[serde(rename = "disabled")]
    Disabled,

    /// One line per launch: kernel name, core count and problem summary.
    #[serde(rename = "basic")]
    Basic,

    /// Adds the resolved pipeline configuration of each launch.
    #[serde(rename = "full")]
    Full,
}

impl LogLevel for KernelLogLevel {}

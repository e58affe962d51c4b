use super::logger::{LogLevel, LoggerConfig};

/// Configuration for profiling kernel launches.
#[derive(Default, Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct ProfilingConfig {
    /// Logger configuration for profiling summaries.
    #[serde(default)]
    pub logger: LoggerConfig<ProfilingLogLevel>,
}

/// Log levels for profiling.
#[derive(Default, Clone, Copy, Debug, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub enum ProfilingLogLevel {
    /// Profiling is disabled.
    #[default]
    #[serde(rename = "disabled")]
    Disabled,

    /// Only the aggregated summary is logged.
    #[serde(rename = "basic")]
    Basic,

    /// Every launch duration is logged as well as the summary.
    #[serde(rename = "full")]
    Full,
}

impl LogLevel for ProfilingLogLevel {}

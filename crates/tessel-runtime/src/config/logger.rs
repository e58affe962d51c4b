use super::GlobalConfig;
use crate::config::{kernel::KernelLogLevel, profiling::ProfilingLogLevel};
use core::fmt::Display;
use hashbrown::HashMap;
use std::sync::Arc;

#[cfg(std_io)]
use std::{
    fs::{File, OpenOptions},
    io::{BufWriter, Write},
    path::PathBuf,
};

/// Configuration for logging in Tessel, parameterized by a log level type.
///
/// Note that you can use multiple loggers at the same time.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(bound = "")]
pub struct LoggerConfig<L: LogLevel> {
    /// Path to the log file, if file logging is enabled.
    #[serde(default)]
    #[cfg(std_io)]
    pub file: Option<PathBuf>,

    /// Whether to append to the log file (true) or overwrite it (false). Defaults to true.
    #[serde(default = "append_default")]
    pub append: bool,

    /// Whether to log to standard output.
    #[serde(default)]
    pub stdout: bool,

    /// Whether to log to standard error.
    #[serde(default)]
    pub stderr: bool,

    /// Optional crate-level logging configuration (e.g., info, debug, trace).
    #[serde(default)]
    pub log: Option<LogCrateLevel>,

    /// The log level for this logger, determining verbosity.
    #[serde(default)]
    pub level: L,
}

impl<L: LogLevel> Default for LoggerConfig<L> {
    fn default() -> Self {
        Self {
            #[cfg(std_io)]
            file: None,
            append: true,
            stdout: false,
            stderr: false,
            log: None,
            level: L::default(),
        }
    }
}

/// Log levels using the `log` crate.
#[derive(
    Clone, Copy, Debug, Default, serde::Serialize, serde::Deserialize, Hash, PartialEq, Eq,
)]
pub enum LogCrateLevel {
    /// Logs informational messages.
    #[default]
    #[serde(rename = "info")]
    Info,

    /// Logs debugging messages.
    #[serde(rename = "debug")]
    Debug,

    /// Logs trace-level messages.
    #[serde(rename = "trace")]
    Trace,
}

fn append_default() -> bool {
    true
}

/// Trait for types that can be used as log levels in `LoggerConfig`.
pub trait LogLevel:
    serde::de::DeserializeOwned + serde::Serialize + Clone + Copy + core::fmt::Debug + Default
{
}

/// Routes kernel launch and profiling messages to their configured outputs.
#[derive(Debug)]
pub struct Logger {
    /// Collection of logger instances (file, stdout, stderr, or crate-level).
    loggers: Vec<LoggerKind>,

    /// Indices of loggers used for kernel launch logging.
    kernel_index: Vec<usize>,

    /// Indices of loggers used for profiling logging.
    profiling_index: Vec<usize>,

    /// Configuration the logger was built from.
    pub config: Arc<GlobalConfig>,
}

impl Logger {
    /// Creates a new `Logger` instance from the given configuration.
    ///
    /// Outputs shared by several sections (e.g. the same file) are opened once.
    pub fn new(config: Arc<GlobalConfig>) -> Self {
        let mut outputs = Outputs::default();

        let kernel_index = match config.kernel.logger.level {
            KernelLogLevel::Disabled => Vec::new(),
            _ => outputs.register(&config.kernel.logger),
        };
        let profiling_index = match config.profiling.logger.level {
            ProfilingLogLevel::Disabled => Vec::new(),
            _ => outputs.register(&config.profiling.logger),
        };

        Self {
            loggers: outputs.loggers,
            kernel_index,
            profiling_index,
            config,
        }
    }

    /// Logs a kernel launch message, directing it to all configured kernel loggers.
    pub fn log_kernel<S: Display>(&mut self, msg: &S) {
        let indices = core::mem::take(&mut self.kernel_index);
        self.log_all(msg, &indices);
        self.kernel_index = indices;
    }

    /// Logs a message for profiling, directing it to all configured profiling loggers.
    pub fn log_profiling<S: Display>(&mut self, msg: &S) {
        let indices = core::mem::take(&mut self.profiling_index);
        self.log_all(msg, &indices);
        self.profiling_index = indices;
    }

    /// Returns the current kernel log level.
    pub fn log_level_kernel(&self) -> KernelLogLevel {
        self.config.kernel.logger.level
    }

    /// Returns the current profiling log level.
    pub fn log_level_profiling(&self) -> ProfilingLogLevel {
        self.config.profiling.logger.level
    }

    fn log_all<S: Display>(&mut self, msg: &S, indices: &[usize]) {
        match indices {
            [] => {}
            [index] => self.loggers[*index].log(msg),
            _ => {
                let msg = msg.to_string();
                for index in indices {
                    self.loggers[*index].log(&msg);
                }
            }
        }
    }
}

#[derive(Hash, PartialEq, Eq)]
enum OutputId {
    #[cfg(std_io)]
    File(PathBuf),
    Stdout,
    Stderr,
    LogCrate(LogCrateLevel),
}

/// Outputs opened so far, deduplicated across logger sections.
#[derive(Default)]
struct Outputs {
    loggers: Vec<LoggerKind>,
    ids: HashMap<OutputId, usize>,
}

impl Outputs {
    /// Opens the outputs of `config` that aren't open yet and returns the indices of all of them.
    fn register<L: LogLevel>(&mut self, config: &LoggerConfig<L>) -> Vec<usize> {
        let mut indices = Vec::new();

        #[cfg(std_io)]
        if let Some(file) = &config.file {
            let append = config.append;
            indices.extend(self.open(OutputId::File(file.clone()), || {
                FileLogger::new(file, append).map(LoggerKind::File)
            }));
        }
        if config.stdout {
            indices.extend(self.open(OutputId::Stdout, || Some(LoggerKind::Stdout)));
        }
        if config.stderr {
            indices.extend(self.open(OutputId::Stderr, || Some(LoggerKind::Stderr)));
        }
        if let Some(level) = config.log {
            indices.extend(self.open(OutputId::LogCrate(level), || Some(LoggerKind::Log(level))));
        }

        indices
    }

    fn open(&mut self, id: OutputId, create: impl FnOnce() -> Option<LoggerKind>) -> Option<usize> {
        if let Some(index) = self.ids.get(&id) {
            return Some(*index);
        }

        let index = self.loggers.len();
        self.loggers.push(create()?);
        self.ids.insert(id, index);
        Some(index)
    }
}

/// Represents different types of loggers.
#[derive(Debug)]
enum LoggerKind {
    /// Logs to a file.
    #[cfg(std_io)]
    File(FileLogger),

    /// Logs to standard output.
    Stdout,

    /// Logs to standard error.
    Stderr,

    /// Logs using the `log` crate with a specified level.
    Log(LogCrateLevel),
}

impl LoggerKind {
    fn log<S: Display>(&mut self, msg: &S) {
        match self {
            #[cfg(std_io)]
            LoggerKind::File(file_logger) => file_logger.log(msg),
            LoggerKind::Stdout => println!("{msg}"),
            LoggerKind::Stderr => eprintln!("{msg}"),
            LoggerKind::Log(level) => match level {
                LogCrateLevel::Info => log::info!("{msg}"),
                LogCrateLevel::Debug => log::debug!("{msg}"),
                LogCrateLevel::Trace => log::trace!("{msg}"),
            },
        }
    }
}

/// Logger that writes messages to a file.
#[derive(Debug)]
#[cfg(std_io)]
struct FileLogger {
    writer: BufWriter<File>,
}

#[cfg(std_io)]
impl FileLogger {
    // Opens the log file, or reports through the `log` crate and gives up on this output.
    fn new(path: &PathBuf, append: bool) -> Option<Self> {
        let file = OpenOptions::new()
            .write(true)
            .append(append)
            .truncate(!append)
            .create(true)
            .open(path);

        match file {
            Ok(file) => Some(Self {
                writer: BufWriter::new(file),
            }),
            Err(err) => {
                log::warn!("Can't open log file {path:?}: {err}");
                None
            }
        }
    }

    // Logs a message to the file, flushing the buffer to ensure immediate write.
    fn log<S: Display>(&mut self, msg: &S) {
        let written = writeln!(self.writer, "{msg}").and_then(|_| self.writer.flush());
        if let Err(err) = written {
            log::warn!("Can't write to log file: {err}");
        }
    }
}

#[cfg(all(test, std_io))]
mod tests {
    use super::*;

    #[test_log::test]
    fn shared_file_output_is_opened_once() {
        let path = std::env::temp_dir().join(format!("tessel-logger-{}.log", std::process::id()));
        let mut config = GlobalConfig::default();
        config.kernel.logger.level = KernelLogLevel::Basic;
        config.kernel.logger.file = Some(path.clone());
        config.kernel.logger.append = false;
        config.profiling.logger.level = ProfilingLogLevel::Basic;
        config.profiling.logger.file = Some(path.clone());

        let mut logger = Logger::new(Arc::new(config));
        logger.log_kernel(&"launch");
        logger.log_profiling(&"summary");

        assert_eq!(logger.loggers.len(), 1);
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "launch\nsummary\n");
        std::fs::remove_file(path).ok();
    }

    #[test_log::test]
    fn disabled_sections_register_nothing() {
        let mut config = GlobalConfig::default();
        config.kernel.logger.stdout = true;

        let logger = Logger::new(Arc::new(config));

        assert!(logger.loggers.is_empty());
    }
}

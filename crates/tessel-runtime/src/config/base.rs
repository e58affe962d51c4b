use super::{
    kernel::KernelConfig, memory::MemoryConfig, padding::PaddingConfig, profiling::ProfilingConfig,
};
use std::sync::Arc;

/// Static mutex holding the global configuration, initialized as `None`.
static TESSEL_GLOBAL_CONFIG: spin::Mutex<Option<Arc<GlobalConfig>>> = spin::Mutex::new(None);

/// Represents the global configuration for Tessel, combining logging, padding and memory settings.
#[derive(Default, Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct GlobalConfig {
    /// Configuration for kernel launch logging.
    #[serde(default)]
    pub kernel: KernelConfig,

    /// Configuration for profiling kernel launches.
    #[serde(default)]
    pub profiling: ProfilingConfig,

    /// Policy deciding when operands are repacked before a matmul.
    #[serde(default)]
    pub padding: PaddingConfig,

    /// Configuration of the off-chip memory budget.
    #[serde(default)]
    pub memory: MemoryConfig,
}

impl GlobalConfig {
    /// Retrieves the current global configuration, loading it from the current directory if not set.
    ///
    /// If no configuration is set, it attempts to load one from `tessel.toml` or `Tessel.toml` in
    /// the current directory or its parents. If no file is found, a default configuration is used.
    ///
    /// # Notes
    ///
    /// Calling this function takes a global lock. Compute clients read it once at creation and
    /// keep their own [Arc].
    pub fn get() -> Arc<Self> {
        let mut state = TESSEL_GLOBAL_CONFIG.lock();
        let config = state.get_or_insert_with(|| {
            cfg_if::cfg_if! {
                if #[cfg(std_io)] {
                    let config = Self::from_current_dir();
                    let config = config.override_from_env();
                } else {
                    let config = Self::default();
                }
            }

            Arc::new(config)
        });

        config.clone()
    }

    /// Sets the global configuration to the provided value.
    ///
    /// # Panics
    /// Panics if the configuration has already been set or read, as it cannot be overridden.
    ///
    /// # Warning
    /// This method must be called at the start of the program, before any calls to `get`.
    pub fn set(config: Self) {
        let mut state = TESSEL_GLOBAL_CONFIG.lock();
        if state.is_some() {
            panic!("Cannot set the global configuration multiple times.");
        }
        *state = Some(Arc::new(config));
    }

    #[cfg(std_io)]
    /// Save the current configuration to the provided file path.
    pub fn save_default<P: AsRef<std::path::Path>>(path: P) -> std::io::Result<()> {
        let config = Self::get();
        let content = toml::to_string_pretty(config.as_ref())
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))?;
        std::fs::write(path, content)
    }

    /// Overrides configuration fields based on environment variables.
    ///
    /// `TESSEL_DEBUG_LOG` enables launch and profiling logs and routes them to `stdout`,
    /// `stderr`, a file path, or `/tmp/tessel.log` for `1`/`true`. `TESSEL_DEBUG_OPTION`
    /// selects `debug`, `profile` or `profile-full` verbosity.
    #[cfg(std_io)]
    pub fn override_from_env(mut self) -> Self {
        use super::{kernel::KernelLogLevel, profiling::ProfilingLogLevel};

        if let Ok(val) = std::env::var("TESSEL_DEBUG_LOG") {
            self.kernel.logger.level = KernelLogLevel::Full;
            self.profiling.logger.level = ProfilingLogLevel::Basic;

            match val.as_str() {
                "stdout" => {
                    self.kernel.logger.stdout = true;
                    self.profiling.logger.stdout = true;
                }
                "stderr" => {
                    self.kernel.logger.stderr = true;
                    self.profiling.logger.stderr = true;
                }
                "1" | "true" => {
                    let file_path = "/tmp/tessel.log";
                    self.kernel.logger.file = Some(file_path.into());
                    self.profiling.logger.file = Some(file_path.into());
                }
                "0" | "false" => {
                    self.kernel.logger.level = KernelLogLevel::Disabled;
                    self.profiling.logger.level = ProfilingLogLevel::Disabled;
                }
                file_path => {
                    self.kernel.logger.file = Some(file_path.into());
                    self.profiling.logger.file = Some(file_path.into());
                }
            }
        };

        if let Ok(val) = std::env::var("TESSEL_DEBUG_OPTION") {
            match val.as_str() {
                "debug" => {
                    self.kernel.logger.level = KernelLogLevel::Full;
                    self.profiling.logger.level = ProfilingLogLevel::Basic;
                }
                "profile" => {
                    self.profiling.logger.level = ProfilingLogLevel::Basic;
                }
                "profile-full" => {
                    self.profiling.logger.level = ProfilingLogLevel::Full;
                }
                _ => {}
            }
        };

        self
    }

    // Loads configuration from `tessel.toml` or `Tessel.toml` in the current directory or its parents.
    //
    // Traverses up the directory tree until a valid configuration file is found or the root is reached.
    // Returns a default configuration if no file is found.
    #[cfg(std_io)]
    fn from_current_dir() -> Self {
        let Ok(mut dir) = std::env::current_dir() else {
            return Self::default();
        };

        loop {
            if let Ok(content) = Self::from_file_path(dir.join("tessel.toml")) {
                return content;
            }

            if let Ok(content) = Self::from_file_path(dir.join("Tessel.toml")) {
                return content;
            }

            if !dir.pop() {
                break;
            }
        }

        Self::default()
    }

    // Loads configuration from a specified file path.
    #[cfg(std_io)]
    fn from_file_path<P: AsRef<std::path::Path>>(path: P) -> std::io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = match Self::from_toml(&content) {
            Ok(val) => val,
            Err(err) => panic!("The file provided doesn't have the right format => {err:?}"),
        };

        Ok(config)
    }

    /// Parses a configuration from TOML text.
    #[cfg(std_io)]
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

#[cfg(all(test, std_io))]
mod tests {
    use super::*;
    use crate::config::{kernel::KernelLogLevel, profiling::ProfilingLogLevel};

    #[test_log::test]
    fn parses_partial_toml() {
        let config = GlobalConfig::from_toml(
            r#"
            [padding]
            align = 128

            [profiling.logger]
            level = "full"
            stdout = true
            "#,
        )
        .unwrap();

        assert_eq!(config.padding.align, 128);
        assert_eq!(config.padding.max_stride, 65536);
        assert_eq!(config.profiling.logger.level, ProfilingLogLevel::Full);
        assert!(config.profiling.logger.stdout);
        assert_eq!(config.kernel.logger.level, KernelLogLevel::Disabled);
    }

    #[test_log::test]
    #[serial_test::serial]
    fn debug_log_env_routes_to_stderr() {
        // SAFETY: the test is serialized with every other test touching the environment.
        unsafe { std::env::set_var("TESSEL_DEBUG_LOG", "stderr") };
        let config = GlobalConfig::default().override_from_env();
        unsafe { std::env::remove_var("TESSEL_DEBUG_LOG") };

        assert!(config.kernel.logger.stderr);
        assert_eq!(config.kernel.logger.level, KernelLogLevel::Full);
        assert_eq!(config.profiling.logger.level, ProfilingLogLevel::Basic);
    }
}

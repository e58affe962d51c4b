/// Backtrace captured where an error was created, along with the name of the thread it was
/// created on.
///
/// Kernels run their units on named threads (`<kernel>-core-<n>`, `core-<n>-mte`, ...), so the
/// thread name alone often tells which unit of which core failed.
#[derive(Clone)]
pub struct BackTrace {
    thread: Option<String>,
    frames: String,
}

impl BackTrace {
    /// Captures the backtrace of the current thread.
    ///
    /// Frames are only resolved when `RUST_BACKTRACE` or `RUST_LIB_BACKTRACE` is set.
    pub fn capture() -> Self {
        Self {
            thread: std::thread::current().name().map(str::to_string),
            frames: std::backtrace::Backtrace::capture().to_string(),
        }
    }

    /// Name of the thread the backtrace was captured on.
    pub fn thread(&self) -> Option<&str> {
        self.thread.as_deref()
    }
}

impl core::fmt::Display for BackTrace {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match &self.thread {
            Some(thread) => writeln!(f, "on thread '{thread}'")?,
            None => writeln!(f, "on an unnamed thread")?,
        }
        f.write_str(&self.frames)
    }
}

impl core::fmt::Debug for BackTrace {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn records_the_thread_name() {
        let backtrace = std::thread::Builder::new()
            .name("copy-unit".into())
            .spawn(BackTrace::capture)
            .unwrap()
            .join()
            .unwrap();

        assert_eq!(backtrace.thread(), Some("copy-unit"));
        assert!(backtrace.to_string().starts_with("on thread 'copy-unit'"));
    }
}

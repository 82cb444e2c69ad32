/// Process-level configuration for the Kiln core.
#[derive(Debug, Clone)]
pub struct Config {
    /// `tracing` filter directive handed to [`crate::logging::init_with_filter`].
    pub log_filter: String,
    pub profiling: ProfilingMode,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            log_filter: crate::logging::DEFAULT_FILTER.to_string(),
            profiling: ProfilingMode::Off,
        }
    }
}

impl Config {
    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }

    pub fn with_profiling(mut self, profiling: ProfilingMode) -> Self {
        self.profiling = profiling;
        self
    }

    /// Install logging and, if requested, the profiler.
    pub fn apply(&self) {
        crate::logging::init_with_filter(&self.log_filter);
        if self.profiling == ProfilingMode::WithWebserver {
            crate::profiling::init_profiling(crate::profiling::ProfilingBackend::PuffinHttp);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfilingMode {
    /// Profiling is disabled
    Off,
    /// Profiling is enabled, and can be viewed using external tools such as
    /// 'puffin_viewer' through the embedded HTTP server
    WithWebserver,
}

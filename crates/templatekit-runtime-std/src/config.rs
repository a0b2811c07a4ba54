use std::num::NonZeroUsize;
use std::thread;

/// Environment variable overriding [`RendererConfig::workers`].
pub const RENDER_WORKERS_ENV: &str = "TEMPLATEKIT_RENDER_WORKERS";

const DEFAULT_THREAD_NAME: &str = "templatekit-render";

/// Settings for [`crate::ThreadPoolRenderer`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RendererConfig {
    /// Number of render threads; at least one.
    pub workers: usize,
    /// Prefix of each render thread's name.
    pub thread_name: String,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            workers: thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(2),
            thread_name: DEFAULT_THREAD_NAME.to_string(),
        }
    }
}

impl RendererConfig {
    /// Defaults, with the worker count taken from
    /// `TEMPLATEKIT_RENDER_WORKERS` when it holds a positive integer.
    pub fn from_env() -> Self {
        let config = Self::default();
        match std::env::var(RENDER_WORKERS_ENV) {
            Ok(value) => config.with_workers_setting(&value),
            Err(_) => config,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_thread_name(mut self, thread_name: impl Into<String>) -> Self {
        self.thread_name = thread_name.into();
        self
    }

    fn with_workers_setting(self, value: &str) -> Self {
        match value.trim().parse::<NonZeroUsize>() {
            Ok(workers) => self.with_workers(workers.get()),
            Err(err) => {
                log::warn!("ignoring {RENDER_WORKERS_ENV}={value:?}: {err}");
                self
            }
        }
    }
}

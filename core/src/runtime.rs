use rayon::ThreadPoolBuilder;
use std::env;
use std::sync::OnceLock;

/// Environment variable that sizes the global CPU pool.
pub const CPU_THREADS_ENV: &str = "RUSTCV_CPU_THREADS";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuntimeError {
    #[error("RUSTCV_CPU_THREADS must be a positive integer, got '{0}'")]
    InvalidThreadCount(String),

    #[error("failed to read RUSTCV_CPU_THREADS: {0}")]
    Env(String),

    #[error("thread pool build failed: {0}")]
    ThreadPool(String),
}

/// Process-level runtime settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// `None` keeps Rayon's default sizing.
    pub cpu_threads: Option<usize>,
}

impl RuntimeConfig {
    pub fn from_env() -> Result<Self, RuntimeError> {
        let raw = match env::var(CPU_THREADS_ENV) {
            Ok(v) => v,
            Err(env::VarError::NotPresent) => return Ok(Self::default()),
            Err(e) => return Err(RuntimeError::Env(e.to_string())),
        };
        Ok(Self {
            cpu_threads: Some(parse_thread_count(&raw)?),
        })
    }

    /// Explicit thread counts take priority over the environment.
    pub fn with_threads(mut self, threads: Option<usize>) -> Self {
        if threads.is_some() {
            self.cpu_threads = threads;
        }
        self
    }
}

pub fn parse_thread_count(raw: &str) -> Result<usize, RuntimeError> {
    match raw.trim().parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n),
        _ => Err(RuntimeError::InvalidThreadCount(raw.to_string())),
    }
}

static THREAD_POOL_INIT: OnceLock<Result<(), RuntimeError>> = OnceLock::new();

/// Initialize the global Rayon pool used by candidate scoring and resizing.
///
/// Priority:
/// 1. `num_threads` argument
/// 2. `RUSTCV_CPU_THREADS` environment variable
/// 3. Rayon default
///
/// Only the first valid call has an effect; later calls return its result.
/// `Some(0)` is rejected on every call and never initializes the pool.
pub fn init_global_thread_pool(num_threads: Option<usize>) -> Result<(), RuntimeError> {
    // Checked outside the cell so a bad argument is never cached.
    if num_threads == Some(0) {
        return Err(RuntimeError::InvalidThreadCount("0".to_string()));
    }
    THREAD_POOL_INIT
        .get_or_init(|| {
            let config = RuntimeConfig::from_env()?.with_threads(num_threads);
            let mut builder = ThreadPoolBuilder::new();
            if let Some(n) = config.cpu_threads {
                builder = builder.num_threads(n);
            }
            builder
                .build_global()
                .map_err(|e| RuntimeError::ThreadPool(e.to_string()))
        })
        .clone()
}

pub fn current_cpu_threads() -> usize {
    rayon::current_num_threads()
}

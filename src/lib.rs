pub use cv_core as core;
pub use cv_features as features;
pub use cv_imgproc as imgproc;
pub use cv_videoio as videoio;

pub mod session;

pub use session::*;

/// Initialize a single global Rayon thread pool for all CPU-parallel routines.
///
/// Call this once at application startup before processing frames.
/// Repeated calls are idempotent and return the first initialization result.
///
/// Priority order:
/// 1. explicit `num_threads`
/// 2. `RUSTCV_CPU_THREADS` env var
/// 3. Rayon default
pub fn init_thread_pool(num_threads: Option<usize>) -> Result<(), cv_core::RuntimeError> {
    cv_core::init_global_thread_pool(num_threads)
}

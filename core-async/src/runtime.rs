//! Runtime utilities that abstract over the underlying async executor.
//!
//! Downstream crates never construct Tokio runtimes directly; they go through
//! the helpers below so thread naming and driver configuration stay uniform.

pub use tokio::runtime::{Builder, Handle, Runtime};

/// Runs `future` to completion on a throwaway current-thread runtime.
///
/// Must not be called from inside another runtime.
pub fn block_on<F>(future: F) -> std::io::Result<F::Output>
where
    F: std::future::Future,
{
    let runtime = Builder::new_current_thread().enable_all().build()?;
    Ok(runtime.block_on(future))
}

/// Builds a multi-threaded runtime whose worker threads carry `name`.
pub fn multi_thread(name: &str, worker_threads: usize) -> std::io::Result<Runtime> {
    Builder::new_multi_thread()
        .worker_threads(worker_threads.max(1))
        .thread_name(name)
        .enable_all()
        .build()
}

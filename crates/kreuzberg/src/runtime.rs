//! Process-global Tokio runtime backing the synchronous API surface.

use once_cell::sync::Lazy;

/// Shared runtime for sync wrappers.
///
/// Creating a runtime per call costs orders of magnitude more than reusing
/// one; a single global instance also keeps the cache's single-flight
/// coordination shared between the sync and async surfaces.
///
/// The `expect` is deliberate: runtime construction only fails on resource
/// exhaustion, at which point nothing else would work either.
pub static GLOBAL_RUNTIME: Lazy<tokio::runtime::Runtime> = Lazy::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to create global Tokio runtime")
});

/// Block on a future from synchronous code.
pub fn block_on<F: std::future::Future>(future: F) -> F::Output {
    GLOBAL_RUNTIME.block_on(future)
}

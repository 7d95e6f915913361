use once_cell::sync::Lazy;
use std::future::Future;
use std::panic::resume_unwind;
use std::thread;
use tokio::runtime::{Builder, Handle, Runtime};

static TOKIO_RUNTIME: Lazy<Runtime> = Lazy::new(|| {
    Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("tokio-resource-engine")
        .enable_all()
        .build()
        .expect("cannot build tokio runtime")
});

/// Drives `future` to completion from synchronous code.
/// From within an async context the future is driven on a scoped thread, the calling thread
/// blocks until it is done.
pub fn block_on<F>(future: F) -> F::Output
where
    F: Future + Send,
    F::Output: Send,
{
    if Handle::try_current().is_err() {
        return TOKIO_RUNTIME.block_on(future);
    }

    thread::scope(|scope| match scope.spawn(|| TOKIO_RUNTIME.block_on(future)).join() {
        Ok(output) => output,
        Err(payload) => resume_unwind(payload),
    })
}

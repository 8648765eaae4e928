use crate::app::error::Error;

/// Runs a synchronous store/engine call off the async executor.
pub(crate) async fn spawn_blocking<F, T>(f: F) -> Result<T, Error>
where
    F: FnOnce() -> Result<T, Error> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .expect("Blocking task panicked")
}

use thiserror::Error;

/// Async module errors
#[derive(Error, Debug)]
pub enum AuthznAsyncError {
    /// The blocking task panicked or was cancelled before it produced a value
    #[error("Unable to rejoin blocking task")]
    JoinError,
}

/// Run CPU-bound work without stalling the executor. The returned future is
/// pending until the work completes.
///
/// On native targets the closure runs on tokio's blocking thread pool.
#[cfg(not(target_arch = "wasm32"))]
pub async fn spawn_blocking<F, T>(work: F) -> Result<T, AuthznAsyncError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|_| AuthznAsyncError::JoinError)
}

/// Run CPU-bound work without stalling the executor. The returned future is
/// pending until the work completes.
///
/// There are no threads to offload onto in the browser, so the closure runs
/// inline.
#[cfg(target_arch = "wasm32")]
pub async fn spawn_blocking<F, T>(work: F) -> Result<T, AuthznAsyncError>
where
    F: FnOnce() -> T + 'static,
    T: 'static,
{
    Ok(work())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn it_returns_the_value_computed_off_the_executor() {
        let value = spawn_blocking(|| (1..=10).sum::<u32>()).await.unwrap();
        assert_eq!(value, 55);
    }

    #[tokio::test]
    async fn it_reports_a_panicking_task_as_a_join_error() {
        let result = spawn_blocking(|| -> u32 { panic!("derivation blew up") }).await;
        assert!(matches!(result, Err(AuthznAsyncError::JoinError)));
    }
}

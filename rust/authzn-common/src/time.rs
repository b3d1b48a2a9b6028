//! Cross-platform time utilities.
//!
//! WebAuthn ceremonies wait on a human and receipt polling waits on a chain,
//! so both need a deadline that works on native and WASM targets alike.

use std::future::Future;
use thiserror::Error;

pub use std::time::Duration;
pub use web_time::Instant;

/// Raised by [timeout] when the wrapped future did not resolve in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("deadline of {0:?} exceeded")]
pub struct DeadlineExceeded(pub Duration);

/// Suspend the current task for `duration`.
#[cfg(not(target_arch = "wasm32"))]
pub async fn sleep(duration: Duration) {
    tokio::time::sleep(duration).await
}

/// Suspend the current task for `duration`.
///
/// Backed by the global `setTimeout`. If no timer is available the sleep
/// resolves immediately.
#[cfg(target_arch = "wasm32")]
pub async fn sleep(duration: Duration) {
    use wasm_bindgen::{JsCast, JsValue};

    let millis = duration.as_millis().min(i32::MAX as u128) as i32;
    let promise = js_sys::Promise::new(&mut |resolve, _reject| {
        let global = js_sys::global();
        match js_sys::Reflect::get(&global, &JsValue::from_str("setTimeout")) {
            Ok(set_timeout) if set_timeout.is_function() => {
                let set_timeout: js_sys::Function = set_timeout.unchecked_into();
                let _ = set_timeout.call2(&global, &resolve, &JsValue::from(millis));
            }
            _ => {
                let _ = resolve.call0(&JsValue::UNDEFINED);
            }
        }
    });
    let _ = wasm_bindgen_futures::JsFuture::from(promise).await;
}

/// Drive `future` to completion unless `duration` elapses first. The future
/// is dropped (cancelled) when the deadline wins.
#[cfg(not(target_arch = "wasm32"))]
pub async fn timeout<F>(duration: Duration, future: F) -> Result<F::Output, DeadlineExceeded>
where
    F: Future,
{
    tokio::time::timeout(duration, future)
        .await
        .map_err(|_| DeadlineExceeded(duration))
}

/// Drive `future` to completion unless `duration` elapses first. The future
/// is dropped (cancelled) when the deadline wins.
#[cfg(target_arch = "wasm32")]
pub async fn timeout<F>(duration: Duration, future: F) -> Result<F::Output, DeadlineExceeded>
where
    F: Future,
{
    use futures_util::future::{Either, select};

    let future = std::pin::pin!(future);
    let delay = std::pin::pin!(sleep(duration));
    match select(future, delay).await {
        Either::Left((output, _)) => Ok(output),
        Either::Right(_) => Err(DeadlineExceeded(duration)),
    }
}

use crate::CoreError;
use std::future::Future;
use std::time::Duration;
use tracing::error;

pub mod event;
pub mod locks;
pub mod session;

pub use event::*;
pub use locks::*;
pub use session::*;

/// Awaits a store call, giving up after `limit`.
///
/// Dropping the returned future cancels the store call as well.
pub(crate) async fn bounded<T, F>(
    limit: Option<Duration>,
    what: &'static str,
    fut: F,
) -> Result<T, CoreError>
where
    F: Future<Output = Result<T, CoreError>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| {
            error!(call = what, ?limit, "store call exceeded deadline");
            CoreError::Timeout(what)
        })?,
        None => fut.await,
    }
}

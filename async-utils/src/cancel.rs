use std::fmt;
use std::future::Future;

use tokio_util::sync::CancellationToken;

/// The token fired before the future finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

impl fmt::Display for Cancelled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("cancelled")
    }
}

impl std::error::Error for Cancelled {}

/// Drive `future` until it completes or `token` is cancelled.
///
/// An already-cancelled token wins even against a ready future, so a
/// superseded timer never runs its action.
pub async fn or_cancel<F>(future: F, token: &CancellationToken) -> Result<F::Output, Cancelled>
where
    F: Future,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(Cancelled),
        output = future => Ok(output),
    }
}

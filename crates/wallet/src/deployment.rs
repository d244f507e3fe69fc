//! Process-wide wallet context.
//!
//! The support contracts of a deployment environment sit at deterministic
//! addresses, so the context is resolved once per process and reused.

use quorum_primitives::WalletContext;
use std::future::Future;
use tokio::sync::OnceCell;

static WALLET_CONTEXT: OnceCell<WalletContext> = OnceCell::const_new();

/// Returns the process's wallet context, running `init` if no caller has
/// resolved it yet.
///
/// Concurrent first callers wait on a single `init`; a failed `init` leaves the
/// cell empty for the next caller.
pub async fn wallet_context<F, Fut, E>(init: F) -> Result<WalletContext, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<WalletContext, E>>,
{
    WALLET_CONTEXT.get_or_try_init(init).await.copied()
}

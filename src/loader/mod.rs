//! Loaders. Each loader owns a single 1-slot inbound channel and drives an
//! idempotent UPSERT; child-entity loaders finish by enqueueing the
//! affected block number back onto the Block loader's channel (the reload
//! bus), which is what triggers re-aggregation.
//!
//! UPSERT failures are fatal to the worker process: a persistent
//! schema/constraint violation should not spin silently, and an
//! orchestrator is expected to restart the process.

pub mod block;
pub mod block_count;
pub mod block_websocket_index;
pub mod children;

use tokio::sync::mpsc;

pub use block::BlockLoaderMessage;

/// The reload bus: child-entity loaders send a block number here once their
/// own UPSERT completes, and the blocks transformer sends the identity-only
/// skeleton here directly. The Block loader recomputes a block's aggregates
/// from scratch on every message, using a tagged-variant enum to distinguish
/// an identity update from a reload signal rather than any runtime reflection.
pub type ReloadBus = mpsc::Sender<BlockLoaderMessage>;

/// Terminates the worker process on an UPSERT failure. A named helper keeps
/// the "fatal" decision visible at every call site instead of burying it in
/// a generic retry wrapper.
pub fn fatal(context: &str, err: impl std::fmt::Display) -> ! {
    tracing::error!(%context, error = %err, "fatal loader error, terminating worker");
    panic!("fatal loader error in {context}: {err}");
}

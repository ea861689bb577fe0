use serde::{Deserialize, Serialize};

/// Blocking shutdown contract implemented by every session engine worker.
///
/// `teardown()`/`shutdown()` calls must be idempotent - a worker may be asked to shut down
/// more than once (eg/ once by the Coordinator's end-of-session step, once by the top-level
/// `SystemManager::stop`).
pub trait SyncShutdown {
    type Result;
    fn shutdown(&mut self) -> Self::Result;
}

/// Marker value sent down a worker's mailbox to request it stop its processing loop.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Deserialize, Serialize,
)]
pub struct Shutdown;

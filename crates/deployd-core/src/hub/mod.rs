//! Fan-out hubs that keep every observer consistent with the engine.
//!
//! - [`LogHub`] - per-source log history, replay on join, selective clear
//! - [`StateHub`] - current server/VCS/build state, snapshot on join
//!
//! Both hubs hold a non-owning [`Observer`] per connected client: the hub
//! only has the sending half of the client's queue. A failed send means the
//! client is gone and the observer is dropped from the registry.

mod log_hub;
mod observer;
mod state_hub;

pub use log_hub::LogHub;
pub use observer::{Observer, ObserverId};
pub use state_hub::StateHub;

use std::sync::{Mutex, MutexGuard};

/// Lock a hub mutex, recovering from poisoning.
///
/// Hub state stays valid after a panic elsewhere: every mutation is a single
/// push, retain or swap.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

//! Workspace synchronization core.
//!
//! [`WorkspaceManager`] owns the canonical groups and workspaces, mirrors them to every bound
//! [`ClientConnection`], queues client requests until commit and batches `done` events on the
//! calloop idle queue. It never decides anything: client requests come out as
//! [`WorkspaceEvent`]s and [`GroupEvent`]s, and the compositor answers through the mutators.

mod caps;
mod connection;
mod group;
mod handle;
mod manager;
mod observer;
mod proxy;
mod request;

use std::sync::atomic::{AtomicU64, Ordering};

pub use caps::{GroupCapabilities, WorkspaceCapabilities, WorkspaceState};
pub use connection::{ClientConnection, ConnectionId, Event, Proxy};
pub use group::Group;
pub use handle::Workspace;
pub use manager::{EXT_WORKSPACE_VERSION, ManagerConfig, WorkspaceManager};
pub use observer::{GroupEvent, ListenerAction, ListenerId, ManagerEvent, WorkspaceEvent};

/// Gives the manager's callbacks access to itself from the event loop data.
pub trait WorkspaceHandler: Sized + 'static {
    fn workspace_manager(&mut self) -> &mut WorkspaceManager<Self>;
}

fn next_handle() -> u64 {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    NEXT.fetch_add(1, Ordering::Relaxed)
}

/// Canonical identity of a workspace group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupHandle(u64);

impl GroupHandle {
    pub(crate) fn next() -> Self {
        Self(next_handle())
    }
}

/// Canonical identity of a workspace. Unrelated to the workspace's optional string id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkspaceHandle(u64);

impl WorkspaceHandle {
    pub(crate) fn next() -> Self {
        Self(next_handle())
    }
}

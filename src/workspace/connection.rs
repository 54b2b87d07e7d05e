use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use smithay::output::Output;

use super::{GroupCapabilities, GroupHandle, WorkspaceCapabilities, WorkspaceHandle, WorkspaceState};
use crate::errors::ConnectionError;

/// Identifies one client's session with the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

/// A message from the manager to one client.
///
/// `WorkspaceGroup` and `Workspace` announce a new mirrored object and are the only events
/// that require the transport to allocate something; every other event refers to objects
/// announced earlier on the same connection.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    WorkspaceGroup(GroupHandle),
    Workspace(WorkspaceHandle),
    Done,
    Finished,

    GroupCapabilities(GroupHandle, GroupCapabilities),
    OutputEnter(GroupHandle, Output),
    OutputLeave(GroupHandle, Output),
    WorkspaceEnter(GroupHandle, WorkspaceHandle),
    WorkspaceLeave(GroupHandle, WorkspaceHandle),
    GroupRemoved(GroupHandle),

    Capabilities(WorkspaceHandle, WorkspaceCapabilities),
    Coordinates(WorkspaceHandle, Vec<u8>),
    Name(WorkspaceHandle, String),
    Id(WorkspaceHandle, String),
    State(WorkspaceHandle, WorkspaceState),
    Removed(WorkspaceHandle),
}

/// A per-connection mirror object, as seen by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Proxy {
    Group(GroupHandle),
    Workspace(WorkspaceHandle),
}

/// The transport side of one bound client.
///
/// The manager never frames or encodes anything itself: it hands typed events to the
/// connection and asks it whether the client knows about a given output.
pub trait ClientConnection {
    /// Delivers one event. An error marks the connection defunct; the manager stops
    /// talking to it and posts the error back through [`ClientConnection::post_error`].
    fn send(&mut self, event: Event) -> Result<(), ConnectionError>;

    /// Whether this client has bound `output` itself.
    fn has_output(&self, output: &Output) -> bool;

    /// Tells the client it is being disconnected because of `error`.
    fn post_error(&mut self, error: &ConnectionError);

    /// The client dropped its mirror of `proxy`; no further events will reference it.
    fn release(&mut self, _proxy: Proxy) {}
}

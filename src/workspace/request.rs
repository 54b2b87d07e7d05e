use std::collections::VecDeque;

use super::{GroupHandle, WorkspaceHandle};
use crate::errors::ConnectionError;

/// A client-initiated action waiting for the next commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Request {
    CreateWorkspace { group: GroupHandle, name: String },
    Activate(WorkspaceHandle),
    Deactivate(WorkspaceHandle),
    Assign {
        workspace: WorkspaceHandle,
        group: GroupHandle,
    },
    Remove(WorkspaceHandle),
}

impl Request {
    fn workspace(&self) -> Option<WorkspaceHandle> {
        match self {
            Request::CreateWorkspace { .. } => None,
            Request::Activate(ws) | Request::Deactivate(ws) | Request::Remove(ws) => Some(*ws),
            Request::Assign { workspace, .. } => Some(*workspace),
        }
    }

    fn group(&self) -> Option<GroupHandle> {
        match self {
            Request::CreateWorkspace { group, .. } | Request::Assign { group, .. } => Some(*group),
            _ => None,
        }
    }
}

/// Per-connection FIFO of pending requests.
#[derive(Debug, Default)]
pub(crate) struct RequestQueue {
    pending: VecDeque<Request>,
}

impl RequestQueue {
    pub(crate) fn push(&mut self, request: Request) -> Result<(), ConnectionError> {
        self.pending
            .try_reserve(1)
            .map_err(|_| ConnectionError::NoMemory)?;
        self.pending.push_back(request);
        Ok(())
    }

    /// Empties the queue, handing back its entries head first.
    pub(crate) fn drain(&mut self) -> VecDeque<Request> {
        std::mem::take(&mut self.pending)
    }

    pub(crate) fn prune_workspace(&mut self, workspace: WorkspaceHandle) {
        self.pending.retain(|req| req.workspace() != Some(workspace));
    }

    pub(crate) fn prune_group(&mut self, group: GroupHandle) {
        self.pending.retain(|req| req.group() != Some(group));
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }
}

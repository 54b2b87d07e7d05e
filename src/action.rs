use smithay::output::Output;
use tracing::debug;

use crate::{
    state::Oxws,
    workspace::{
        GroupCapabilities, GroupEvent, GroupHandle, ListenerAction, WorkspaceCapabilities,
        WorkspaceEvent, WorkspaceHandle, WorkspaceManager,
    },
};

/// What the compositor does in answer to a committed client request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Activate(WorkspaceHandle),
    Deactivate(WorkspaceHandle),
    Assign(WorkspaceHandle, GroupHandle),
    Remove(WorkspaceHandle),
    CreateWorkspace(GroupHandle, String),
}

impl Action {
    /// `None` for the terminal destroy event.
    pub fn from_workspace_event(workspace: WorkspaceHandle, event: &WorkspaceEvent) -> Option<Self> {
        match event {
            WorkspaceEvent::Activate => Some(Action::Activate(workspace)),
            WorkspaceEvent::Deactivate => Some(Action::Deactivate(workspace)),
            WorkspaceEvent::Assign(group) => Some(Action::Assign(workspace, *group)),
            WorkspaceEvent::Remove => Some(Action::Remove(workspace)),
            WorkspaceEvent::Destroy => None,
        }
    }

    pub fn from_group_event(group: GroupHandle, event: &GroupEvent) -> Option<Self> {
        match event {
            GroupEvent::CreateWorkspace(name) => Some(Action::CreateWorkspace(group, name.clone())),
            GroupEvent::Destroy => None,
        }
    }

    pub fn execute(self, oxws: &mut Oxws) {
        debug!(action = ?self, "workspace action");
        match self {
            Action::Activate(workspace) => activate(&mut oxws.workspace_manager, workspace),
            Action::Deactivate(workspace) => {
                if allowed(&oxws.workspace_manager, workspace, WorkspaceCapabilities::DEACTIVATE) {
                    oxws.workspace_manager.set_active(workspace, false);
                }
            }
            Action::Assign(workspace, group) => {
                if allowed(&oxws.workspace_manager, workspace, WorkspaceCapabilities::ASSIGN) {
                    oxws.workspace_manager.set_group(workspace, Some(group));
                    place(&mut oxws.workspace_manager, group);
                }
            }
            Action::Remove(workspace) => {
                if allowed(&oxws.workspace_manager, workspace, WorkspaceCapabilities::REMOVE) {
                    let group = oxws
                        .workspace_manager
                        .workspace(workspace)
                        .and_then(|ws| ws.group());
                    WorkspaceManager::destroy_workspace(oxws, workspace);
                    if let Some(group) = group {
                        place(&mut oxws.workspace_manager, group);
                    }
                }
            }
            Action::CreateWorkspace(group, name) => {
                let creatable = oxws
                    .workspace_manager
                    .group(group)
                    .is_some_and(|g| g.capabilities().contains(GroupCapabilities::CREATE_WORKSPACE));
                if creatable {
                    spawn_workspace(oxws, group, &name);
                }
            }
        }
    }
}

/// Creates a workspace in `group` and hooks it up to [`Action`].
pub fn spawn_workspace(oxws: &mut Oxws, group: GroupHandle, name: &str) -> WorkspaceHandle {
    oxws.next_workspace += 1;
    let id = format!("oxws-{}", oxws.next_workspace);

    let manager = &mut oxws.workspace_manager;
    let workspace = manager.create_workspace(Some(id), WorkspaceCapabilities::all());
    manager.set_name(workspace, name);
    manager.set_group(workspace, Some(group));
    place(manager, group);

    manager.add_workspace_listener(workspace, move |oxws: &mut Oxws, event| {
        let Some(action) = Action::from_workspace_event(workspace, event) else {
            return ListenerAction::Remove;
        };
        action.execute(oxws);
        // a granted remove destroys the workspace under this listener
        if oxws.workspace_manager.workspace(workspace).is_some() {
            ListenerAction::Keep
        } else {
            ListenerAction::Remove
        }
    });
    workspace
}

/// Creates the group shown on `output` and hooks it up to [`Action`].
pub fn spawn_group(oxws: &mut Oxws, output: &Output) -> GroupHandle {
    let manager = &mut oxws.workspace_manager;
    let group = manager.create_group(GroupCapabilities::CREATE_WORKSPACE);
    manager.output_enter(group, output);

    manager.add_group_listener(group, move |oxws: &mut Oxws, event| {
        match Action::from_group_event(group, event) {
            Some(action) => {
                action.execute(oxws);
                ListenerAction::Keep
            }
            None => ListenerAction::Remove,
        }
    });
    group
}

fn allowed(
    manager: &WorkspaceManager<Oxws>,
    workspace: WorkspaceHandle,
    capability: WorkspaceCapabilities,
) -> bool {
    let granted = manager
        .workspace(workspace)
        .is_some_and(|ws| ws.capabilities().contains(capability));
    if !granted {
        debug!(?workspace, ?capability, "workspace request refused");
    }
    granted
}

// One active workspace per group.
fn activate(manager: &mut WorkspaceManager<Oxws>, workspace: WorkspaceHandle) {
    if !allowed(manager, workspace, WorkspaceCapabilities::ACTIVATE) {
        return;
    }
    if let Some(group) = manager.workspace(workspace).and_then(|ws| ws.group()) {
        for other in manager.group_workspaces(group) {
            if other != workspace {
                manager.set_active(other, false);
            }
        }
    }
    manager.set_active(workspace, true);
    manager.set_urgent(workspace, false);
}

/// Lays the group's workspaces out on a single row.
fn place(manager: &mut WorkspaceManager<Oxws>, group: GroupHandle) {
    for (column, workspace) in manager.group_workspaces(group).into_iter().enumerate() {
        let column = u32::try_from(column).unwrap_or(u32::MAX);
        manager.set_coordinates(workspace, &column.to_ne_bytes());
    }
}

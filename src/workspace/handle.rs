use tracing::{debug, warn};

use super::observer::Listeners;
use super::{
    ConnectionId, Event, GroupHandle, ListenerAction, ListenerId, WorkspaceCapabilities,
    WorkspaceEvent, WorkspaceHandle, WorkspaceHandler, WorkspaceManager, WorkspaceState,
};

/// Canonical record of a workspace.
#[derive(Debug, Clone, Default)]
pub struct Workspace {
    pub(crate) id: Option<String>,
    pub(crate) name: Option<String>,
    pub(crate) coordinates: Vec<u8>,
    pub(crate) capabilities: WorkspaceCapabilities,
    pub(crate) state: WorkspaceState,
    pub(crate) group: Option<GroupHandle>,
}

impl Workspace {
    /// Stable identifier chosen by the compositor, if any.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Raw coordinate blob. Empty when never set.
    pub fn coordinates(&self) -> &[u8] {
        &self.coordinates
    }

    pub fn capabilities(&self) -> WorkspaceCapabilities {
        self.capabilities
    }

    pub fn state(&self) -> WorkspaceState {
        self.state
    }

    pub fn group(&self) -> Option<GroupHandle> {
        self.group
    }
}

impl<D: WorkspaceHandler> WorkspaceManager<D> {
    /// Creates a workspace outside any group and mirrors it to every bound client.
    pub fn create_workspace(
        &mut self,
        id: Option<String>,
        capabilities: WorkspaceCapabilities,
    ) -> WorkspaceHandle {
        debug_assert!(!self.is_destroyed(), "workspace created on a destroyed manager");

        let workspace = WorkspaceHandle::next();
        debug!(?workspace, ?id, ?capabilities, "workspace created");
        self.workspaces.insert(
            workspace,
            Workspace {
                id,
                capabilities,
                ..Workspace::default()
            },
        );

        let connections: Vec<ConnectionId> = self.clients.keys().copied().collect();
        for connection in connections {
            self.announce_workspace(workspace, connection);
        }

        self.schedule_done();
        workspace
    }

    /// Destroys a workspace.
    ///
    /// Workspace listeners see [`WorkspaceEvent::Destroy`] first and must return
    /// [`ListenerAction::Remove`]. The workspace then leaves its group, every client is told
    /// it was removed and queued requests naming it are dropped.
    pub fn destroy_workspace(data: &mut D, workspace: WorkspaceHandle) {
        let manager = data.workspace_manager();
        if !manager.workspaces.contains_key(&workspace) {
            return;
        }

        let mut listeners = manager
            .workspace_listeners
            .remove(&workspace)
            .unwrap_or_default();
        listeners.dispatch(data, &WorkspaceEvent::Destroy);

        let manager = data.workspace_manager();
        let late = manager.workspace_listeners.remove(&workspace);
        if !manager.workspaces.contains_key(&workspace) {
            return;
        }

        let leftover = listeners.len() + late.map_or(0, |l| l.len());
        debug_assert_eq!(leftover, 0, "workspace listeners kept past destroy");
        if leftover > 0 {
            warn!(?workspace, leftover, "dropping workspace listeners kept past destroy");
        }

        manager.teardown_workspace(workspace);
    }

    fn teardown_workspace(&mut self, workspace: WorkspaceHandle) {
        let Some(group) = self.workspaces.get(&workspace).map(|ws| ws.group) else {
            return;
        };
        if let Some(group) = group {
            self.send_membership(workspace, group, false);
        }

        for connection in self.proxies.workspace_connections(workspace) {
            self.send(connection, Event::Removed(workspace));
            self.proxies.remove_workspace(workspace, connection);
        }

        for client in self.clients.values_mut() {
            client.requests.prune_workspace(workspace);
        }

        self.schedule_done();
        self.workspaces.shift_remove(&workspace);
        debug!(?workspace, "workspace destroyed");
    }

    /// Moves the workspace to `group`, or out of any group with `None`.
    pub fn set_group(&mut self, workspace: WorkspaceHandle, group: Option<GroupHandle>) {
        if group.is_some_and(|g| !self.groups.contains_key(&g)) {
            return;
        }
        let Some(entry) = self.workspaces.get_mut(&workspace) else {
            return;
        };
        let old = entry.group;
        if old == group {
            return;
        }
        entry.group = group;

        if let Some(old) = old {
            self.send_membership(workspace, old, false);
        }
        if let Some(new) = group {
            self.send_membership(workspace, new, true);
        }
    }

    pub fn set_name(&mut self, workspace: WorkspaceHandle, name: &str) {
        let Some(entry) = self.workspaces.get_mut(&workspace) else {
            return;
        };
        if entry.name.as_deref() == Some(name) {
            return;
        }
        entry.name = Some(name.to_owned());
        self.broadcast(workspace, Event::Name(workspace, name.to_owned()));
    }

    /// Replaces the coordinate blob. The bytes are opaque and compared as-is.
    pub fn set_coordinates(&mut self, workspace: WorkspaceHandle, coordinates: &[u8]) {
        let Some(entry) = self.workspaces.get_mut(&workspace) else {
            return;
        };
        if entry.coordinates == coordinates {
            return;
        }
        entry.coordinates = coordinates.to_vec();
        self.broadcast(workspace, Event::Coordinates(workspace, coordinates.to_vec()));
    }

    pub fn set_active(&mut self, workspace: WorkspaceHandle, enabled: bool) {
        self.set_state(workspace, WorkspaceState::ACTIVE, enabled);
    }

    pub fn set_urgent(&mut self, workspace: WorkspaceHandle, enabled: bool) {
        self.set_state(workspace, WorkspaceState::URGENT, enabled);
    }

    pub fn set_hidden(&mut self, workspace: WorkspaceHandle, enabled: bool) {
        self.set_state(workspace, WorkspaceState::HIDDEN, enabled);
    }

    fn set_state(&mut self, workspace: WorkspaceHandle, flag: WorkspaceState, enabled: bool) {
        let Some(entry) = self.workspaces.get_mut(&workspace) else {
            return;
        };
        let state = entry.state.with(flag, enabled);
        if state == entry.state {
            return;
        }
        entry.state = state;
        self.broadcast(workspace, Event::State(workspace, state));
    }

    pub fn workspace(&self, workspace: WorkspaceHandle) -> Option<&Workspace> {
        self.workspaces.get(&workspace)
    }

    pub fn workspaces(&self) -> impl Iterator<Item = WorkspaceHandle> + '_ {
        self.workspaces.keys().copied()
    }

    /// Subscribes to `workspace`'s events. Returns `None` if the workspace does not exist.
    pub fn add_workspace_listener<F>(
        &mut self,
        workspace: WorkspaceHandle,
        callback: F,
    ) -> Option<ListenerId>
    where
        F: FnMut(&mut D, &WorkspaceEvent) -> ListenerAction + 'static,
    {
        if !self.workspaces.contains_key(&workspace) {
            return None;
        }
        Some(
            self.workspace_listeners
                .entry(workspace)
                .or_default()
                .add(callback),
        )
    }

    pub fn remove_workspace_listener(&mut self, workspace: WorkspaceHandle, id: ListenerId) -> bool {
        self.workspace_listeners
            .get_mut(&workspace)
            .is_some_and(|listeners| listeners.remove(id))
    }

    pub fn workspace_listener_count(&self, workspace: WorkspaceHandle) -> usize {
        self.workspace_listeners
            .get(&workspace)
            .map_or(0, Listeners::len)
    }

    /// Creates `connection`'s mirror of `workspace` and replays its state.
    pub(crate) fn announce_workspace(&mut self, workspace: WorkspaceHandle, connection: ConnectionId) {
        if !self.send(connection, Event::Workspace(workspace)) {
            return;
        }
        self.proxies.insert_workspace(workspace, connection);

        let Some(entry) = self.workspaces.get(&workspace).cloned() else {
            return;
        };
        self.send(connection, Event::Capabilities(workspace, entry.capabilities));
        if !entry.coordinates.is_empty() {
            self.send(connection, Event::Coordinates(workspace, entry.coordinates));
        }
        if let Some(name) = entry.name {
            self.send(connection, Event::Name(workspace, name));
        }
        if let Some(id) = entry.id {
            self.send(connection, Event::Id(workspace, id));
        }
        self.send(connection, Event::State(workspace, entry.state));
    }

    /// Tells every client mirroring both objects that `workspace` entered or left `group`.
    pub(crate) fn send_membership(&mut self, workspace: WorkspaceHandle, group: GroupHandle, enter: bool) {
        for connection in self.proxies.workspace_connections(workspace) {
            if !self.proxies.has_group(group, connection) {
                continue;
            }
            let event = if enter {
                Event::WorkspaceEnter(group, workspace)
            } else {
                Event::WorkspaceLeave(group, workspace)
            };
            self.send(connection, event);
        }
        self.schedule_done();
    }

    fn broadcast(&mut self, workspace: WorkspaceHandle, event: Event) {
        for connection in self.proxies.workspace_connections(workspace) {
            self.send(connection, event.clone());
        }
        self.schedule_done();
    }
}

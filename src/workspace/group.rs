use smithay::output::Output;
use tracing::{debug, warn};

use super::observer::Listeners;
use super::{
    ConnectionId, Event, GroupCapabilities, GroupEvent, GroupHandle, ListenerAction, ListenerId,
    WorkspaceHandle, WorkspaceHandler, WorkspaceManager,
};

/// Canonical record of a workspace group.
#[derive(Debug, Clone)]
pub struct Group {
    pub(crate) capabilities: GroupCapabilities,
    pub(crate) outputs: Vec<Output>,
}

impl Group {
    pub fn capabilities(&self) -> GroupCapabilities {
        self.capabilities
    }

    /// Outputs this group is shown on, in the order they entered.
    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }
}

impl<D: WorkspaceHandler> WorkspaceManager<D> {
    /// Creates a group and mirrors it to every bound client.
    pub fn create_group(&mut self, capabilities: GroupCapabilities) -> GroupHandle {
        debug_assert!(!self.is_destroyed(), "group created on a destroyed manager");

        let group = GroupHandle::next();
        self.groups.insert(
            group,
            Group {
                capabilities,
                outputs: Vec::new(),
            },
        );

        let connections: Vec<ConnectionId> = self.clients.keys().copied().collect();
        for connection in connections {
            self.announce_group(group, connection);
        }

        self.schedule_done();
        debug!(?group, ?capabilities, "workspace group created");
        group
    }

    /// Destroys a group.
    ///
    /// Group listeners see [`GroupEvent::Destroy`] first and must return
    /// [`ListenerAction::Remove`]. Member workspaces are then detached, queued requests naming
    /// the group are dropped, outputs leave and every client is told the group was removed.
    pub fn destroy_group(data: &mut D, group: GroupHandle) {
        let manager = data.workspace_manager();
        if !manager.groups.contains_key(&group) {
            return;
        }

        let mut listeners = manager.group_listeners.remove(&group).unwrap_or_default();
        listeners.dispatch(data, &GroupEvent::Destroy);

        let manager = data.workspace_manager();
        let late = manager.group_listeners.remove(&group);
        if !manager.groups.contains_key(&group) {
            return;
        }

        let leftover = listeners.len() + late.map_or(0, |l| l.len());
        debug_assert_eq!(leftover, 0, "group listeners kept past destroy");
        if leftover > 0 {
            warn!(?group, leftover, "dropping group listeners kept past destroy");
        }

        manager.teardown_group(group);
    }

    fn teardown_group(&mut self, group: GroupHandle) {
        let members: Vec<WorkspaceHandle> = self
            .workspaces
            .iter()
            .filter(|(_, ws)| ws.group == Some(group))
            .map(|(handle, _)| *handle)
            .collect();
        for workspace in members {
            self.send_membership(workspace, group, false);
            if let Some(ws) = self.workspaces.get_mut(&workspace) {
                ws.group = None;
            }
        }

        for client in self.clients.values_mut() {
            client.requests.prune_group(group);
        }

        let outputs = self
            .groups
            .get_mut(&group)
            .map(|g| std::mem::take(&mut g.outputs))
            .unwrap_or_default();
        for output in &outputs {
            self.send_output(group, output, false);
        }

        for connection in self.proxies.group_connections(group) {
            self.send(connection, Event::GroupRemoved(group));
            self.proxies.remove_group(group, connection);
        }

        self.schedule_done();
        self.groups.shift_remove(&group);
        debug!(?group, "workspace group destroyed");
    }

    /// Shows the group on `output`. Entering an output twice is a no-op.
    pub fn output_enter(&mut self, group: GroupHandle, output: &Output) {
        let Some(entry) = self.groups.get_mut(&group) else {
            return;
        };
        if entry.outputs.contains(output) {
            return;
        }
        entry.outputs.push(output.clone());
        self.send_output(group, output, true);
    }

    /// Removes the group from `output`. Leaving an output the group is not on is a no-op.
    pub fn output_leave(&mut self, group: GroupHandle, output: &Output) {
        let Some(entry) = self.groups.get_mut(&group) else {
            return;
        };
        let Some(index) = entry.outputs.iter().position(|o| o == output) else {
            return;
        };
        entry.outputs.remove(index);
        self.send_output(group, output, false);
    }

    /// Drops `output` from every group it belongs to.
    pub fn output_destroyed(&mut self, output: &Output) {
        let groups: Vec<GroupHandle> = self
            .groups
            .iter()
            .filter(|(_, g)| g.outputs.contains(output))
            .map(|(handle, _)| *handle)
            .collect();
        for group in groups {
            self.output_leave(group, output);
        }
    }

    pub fn group(&self, group: GroupHandle) -> Option<&Group> {
        self.groups.get(&group)
    }

    pub fn groups(&self) -> impl Iterator<Item = GroupHandle> + '_ {
        self.groups.keys().copied()
    }

    /// Workspaces currently assigned to `group`, in creation order.
    pub fn group_workspaces(&self, group: GroupHandle) -> Vec<WorkspaceHandle> {
        self.workspaces
            .iter()
            .filter(|(_, ws)| ws.group == Some(group))
            .map(|(handle, _)| *handle)
            .collect()
    }

    /// Subscribes to `group`'s events. Returns `None` if the group does not exist.
    pub fn add_group_listener<F>(&mut self, group: GroupHandle, callback: F) -> Option<ListenerId>
    where
        F: FnMut(&mut D, &GroupEvent) -> ListenerAction + 'static,
    {
        if !self.groups.contains_key(&group) {
            return None;
        }
        Some(self.group_listeners.entry(group).or_default().add(callback))
    }

    pub fn remove_group_listener(&mut self, group: GroupHandle, id: ListenerId) -> bool {
        self.group_listeners
            .get_mut(&group)
            .is_some_and(|listeners| listeners.remove(id))
    }

    pub fn group_listener_count(&self, group: GroupHandle) -> usize {
        self.group_listeners.get(&group).map_or(0, Listeners::len)
    }

    /// Creates `connection`'s mirror of `group` and replays its state.
    pub(crate) fn announce_group(&mut self, group: GroupHandle, connection: ConnectionId) {
        if !self.send(connection, Event::WorkspaceGroup(group)) {
            return;
        }
        self.proxies.insert_group(group, connection);

        let Some(entry) = self.groups.get(&group) else {
            return;
        };
        let capabilities = entry.capabilities;
        let outputs = entry.outputs.clone();

        self.send(connection, Event::GroupCapabilities(group, capabilities));
        for output in outputs {
            if self.client_has_output(connection, &output) {
                self.send(connection, Event::OutputEnter(group, output));
            }
        }
    }

    fn send_output(&mut self, group: GroupHandle, output: &Output, enter: bool) {
        for connection in self.proxies.group_connections(group) {
            if !self.client_has_output(connection, output) {
                continue;
            }
            let event = if enter {
                Event::OutputEnter(group, output.clone())
            } else {
                Event::OutputLeave(group, output.clone())
            };
            self.send(connection, event);
        }
        self.schedule_done();
    }
}

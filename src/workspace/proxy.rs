use std::hash::Hash;

use indexmap::{IndexMap, IndexSet};

use super::{ConnectionId, GroupHandle, WorkspaceHandle};

/// One side of the join table, indexed from both ends.
#[derive(Debug)]
struct Join<K> {
    by_entity: IndexMap<K, IndexSet<ConnectionId>>,
    by_connection: IndexMap<ConnectionId, IndexSet<K>>,
}

impl<K> Default for Join<K> {
    fn default() -> Self {
        Self {
            by_entity: IndexMap::new(),
            by_connection: IndexMap::new(),
        }
    }
}

impl<K: Copy + Eq + Hash> Join<K> {
    fn insert(&mut self, key: K, connection: ConnectionId) {
        self.by_entity.entry(key).or_default().insert(connection);
        self.by_connection.entry(connection).or_default().insert(key);
    }

    fn contains(&self, key: K, connection: ConnectionId) -> bool {
        self.by_entity
            .get(&key)
            .is_some_and(|connections| connections.contains(&connection))
    }

    fn connections(&self, key: K) -> Vec<ConnectionId> {
        self.by_entity
            .get(&key)
            .map(|connections| connections.iter().copied().collect())
            .unwrap_or_default()
    }

    fn entities(&self, connection: ConnectionId) -> Vec<K> {
        self.by_connection
            .get(&connection)
            .map(|keys| keys.iter().copied().collect())
            .unwrap_or_default()
    }

    fn remove(&mut self, key: K, connection: ConnectionId) -> bool {
        let removed = self
            .by_entity
            .get_mut(&key)
            .is_some_and(|connections| connections.shift_remove(&connection));
        if !removed {
            return false;
        }
        if self.by_entity.get(&key).is_some_and(IndexSet::is_empty) {
            self.by_entity.shift_remove(&key);
        }
        if let Some(keys) = self.by_connection.get_mut(&connection) {
            keys.shift_remove(&key);
            if keys.is_empty() {
                self.by_connection.shift_remove(&connection);
            }
        }
        true
    }

    fn drop_connection(&mut self, connection: ConnectionId) {
        let Some(keys) = self.by_connection.shift_remove(&connection) else {
            return;
        };
        for key in keys {
            if let Some(connections) = self.by_entity.get_mut(&key) {
                connections.shift_remove(&connection);
                if connections.is_empty() {
                    self.by_entity.shift_remove(&key);
                }
            }
        }
    }

    fn connection_len(&self, connection: ConnectionId) -> usize {
        self.by_connection.get(&connection).map_or(0, IndexSet::len)
    }

    fn clear(&mut self) {
        self.by_entity.clear();
        self.by_connection.clear();
    }
}

/// Join table of per-connection mirrors.
///
/// An entry exists exactly while both the entity and the connection are alive and the
/// client has not dropped its mirror. Either side's teardown removes its entries.
#[derive(Debug, Default)]
pub(crate) struct ProxyTable {
    groups: Join<GroupHandle>,
    workspaces: Join<WorkspaceHandle>,
}

impl ProxyTable {
    pub(crate) fn insert_group(&mut self, group: GroupHandle, connection: ConnectionId) {
        self.groups.insert(group, connection);
    }

    pub(crate) fn insert_workspace(&mut self, workspace: WorkspaceHandle, connection: ConnectionId) {
        self.workspaces.insert(workspace, connection);
    }

    pub(crate) fn has_group(&self, group: GroupHandle, connection: ConnectionId) -> bool {
        self.groups.contains(group, connection)
    }

    pub(crate) fn has_workspace(&self, workspace: WorkspaceHandle, connection: ConnectionId) -> bool {
        self.workspaces.contains(workspace, connection)
    }

    /// Connections mirroring `group`, in proxy creation order.
    pub(crate) fn group_connections(&self, group: GroupHandle) -> Vec<ConnectionId> {
        self.groups.connections(group)
    }

    pub(crate) fn workspace_connections(&self, workspace: WorkspaceHandle) -> Vec<ConnectionId> {
        self.workspaces.connections(workspace)
    }

    /// Groups mirrored on `connection`, in proxy creation order.
    pub(crate) fn connection_groups(&self, connection: ConnectionId) -> Vec<GroupHandle> {
        self.groups.entities(connection)
    }

    pub(crate) fn remove_group(&mut self, group: GroupHandle, connection: ConnectionId) -> bool {
        self.groups.remove(group, connection)
    }

    pub(crate) fn remove_workspace(&mut self, workspace: WorkspaceHandle, connection: ConnectionId) -> bool {
        self.workspaces.remove(workspace, connection)
    }

    pub(crate) fn drop_connection(&mut self, connection: ConnectionId) {
        self.groups.drop_connection(connection);
        self.workspaces.drop_connection(connection);
    }

    pub(crate) fn clear(&mut self) {
        self.groups.clear();
        self.workspaces.clear();
    }

    /// Number of mirrors `connection` currently holds.
    pub(crate) fn connection_len(&self, connection: ConnectionId) -> usize {
        self.groups.connection_len(connection) + self.workspaces.connection_len(connection)
    }
}

use std::collections::HashMap;

use indexmap::IndexMap;
use smithay::output::Output;
use smithay::reexports::calloop::{Idle, LoopHandle};
use tracing::{debug, trace, warn};

use super::observer::Listeners;
use super::proxy::ProxyTable;
use super::request::{Request, RequestQueue};
use super::{
    ClientConnection, ConnectionId, Event, Group, GroupEvent, GroupHandle, ListenerAction,
    ListenerId, ManagerEvent, Proxy, Workspace, WorkspaceEvent, WorkspaceHandle,
    WorkspaceHandler,
};
use crate::errors::{ConnectionError, WorkspaceError};

/// Highest protocol version this manager speaks.
pub const EXT_WORKSPACE_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Version advertised by the global.
    pub version: u32,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            version: EXT_WORKSPACE_VERSION,
        }
    }
}

impl ManagerConfig {
    pub fn validate(&self) -> Result<(), WorkspaceError> {
        if self.version == 0 || self.version > EXT_WORKSPACE_VERSION {
            return Err(WorkspaceError::UnsupportedVersion(self.version));
        }
        Ok(())
    }
}

pub(crate) struct Client {
    pub(crate) transport: Box<dyn ClientConnection>,
    pub(crate) requests: RequestQueue,
    /// Set once the client has been told to disconnect; nothing is sent to it afterwards.
    pub(crate) defunct: bool,
}

/// Canonical workspace state plus every connection's mirror of it.
pub struct WorkspaceManager<D: 'static> {
    config: ManagerConfig,
    pub(crate) groups: IndexMap<GroupHandle, Group>,
    pub(crate) workspaces: IndexMap<WorkspaceHandle, Workspace>,
    pub(crate) clients: IndexMap<ConnectionId, Client>,
    pub(crate) proxies: ProxyTable,

    listeners: Listeners<D, ManagerEvent>,
    pub(crate) group_listeners: HashMap<GroupHandle, Listeners<D, GroupEvent>>,
    pub(crate) workspace_listeners: HashMap<WorkspaceHandle, Listeners<D, WorkspaceEvent>>,

    loop_handle: LoopHandle<'static, D>,
    idle: Option<Idle<'static>>,
    destroyed: bool,
}

impl<D: WorkspaceHandler> WorkspaceManager<D> {
    pub fn new(config: ManagerConfig, loop_handle: LoopHandle<'static, D>) -> Result<Self, WorkspaceError> {
        config.validate()?;

        Ok(Self {
            config,
            groups: IndexMap::new(),
            workspaces: IndexMap::new(),
            clients: IndexMap::new(),
            proxies: ProxyTable::default(),
            listeners: Listeners::default(),
            group_listeners: HashMap::new(),
            workspace_listeners: HashMap::new(),
            loop_handle,
            idle: None,
            destroyed: false,
        })
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Registers a new client and replays the full current state to it.
    pub fn bind(
        &mut self,
        connection: ConnectionId,
        transport: Box<dyn ClientConnection>,
    ) -> Result<(), WorkspaceError> {
        let mut transport = transport;
        if self.destroyed {
            transport.post_error(&ConnectionError::Closed);
            return Err(ConnectionError::Closed.into());
        }
        if self.clients.contains_key(&connection) {
            return Err(WorkspaceError::AlreadyBound(connection));
        }
        if self.clients.try_reserve(1).is_err() {
            transport.post_error(&ConnectionError::NoMemory);
            return Err(ConnectionError::NoMemory.into());
        }

        self.clients.insert(
            connection,
            Client {
                transport,
                requests: RequestQueue::default(),
                defunct: false,
            },
        );
        debug!(
            %connection,
            groups = self.groups.len(),
            workspaces = self.workspaces.len(),
            "workspace client bound"
        );

        let groups: Vec<GroupHandle> = self.groups.keys().copied().collect();
        for group in groups {
            self.announce_group(group, connection);
        }

        let workspaces: Vec<WorkspaceHandle> = self.workspaces.keys().copied().collect();
        for workspace in workspaces {
            self.announce_workspace(workspace, connection);

            let Some(group) = self.workspaces.get(&workspace).and_then(|ws| ws.group) else {
                continue;
            };
            if self.proxies.has_group(group, connection)
                && self.proxies.has_workspace(workspace, connection)
            {
                self.send(connection, Event::WorkspaceEnter(group, workspace));
            }
        }

        self.schedule_done();
        Ok(())
    }

    /// Forgets a client whose transport went away. Its queued requests are discarded.
    pub fn unbind(&mut self, connection: ConnectionId) {
        if self.clients.shift_remove(&connection).is_some() {
            self.proxies.drop_connection(connection);
            debug!(%connection, "workspace client unbound");
        }
    }

    /// Handles a client's `stop`: acknowledges with `finished` and tears its view down.
    pub fn stop(&mut self, connection: ConnectionId) {
        self.send(connection, Event::Finished);
        self.unbind(connection);
    }

    pub fn connections(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.clients.keys().copied()
    }

    /// Number of groups and workspaces mirrored on `connection`.
    pub fn proxy_count(&self, connection: ConnectionId) -> usize {
        self.proxies.connection_len(connection)
    }

    pub fn pending_requests(&self, connection: ConnectionId) -> usize {
        self.clients
            .get(&connection)
            .map_or(0, |client| client.requests.len())
    }

    pub fn request_activate(
        &mut self,
        connection: ConnectionId,
        workspace: WorkspaceHandle,
    ) -> Result<(), WorkspaceError> {
        if !self.check_workspace(connection, workspace)? {
            return Ok(());
        }
        self.enqueue(connection, Request::Activate(workspace))
    }

    pub fn request_deactivate(
        &mut self,
        connection: ConnectionId,
        workspace: WorkspaceHandle,
    ) -> Result<(), WorkspaceError> {
        if !self.check_workspace(connection, workspace)? {
            return Ok(());
        }
        self.enqueue(connection, Request::Deactivate(workspace))
    }

    pub fn request_remove(
        &mut self,
        connection: ConnectionId,
        workspace: WorkspaceHandle,
    ) -> Result<(), WorkspaceError> {
        if !self.check_workspace(connection, workspace)? {
            return Ok(());
        }
        self.enqueue(connection, Request::Remove(workspace))
    }

    pub fn request_assign(
        &mut self,
        connection: ConnectionId,
        workspace: WorkspaceHandle,
        group: GroupHandle,
    ) -> Result<(), WorkspaceError> {
        if !self.check_workspace(connection, workspace)? || !self.check_group(connection, group)? {
            return Ok(());
        }
        self.enqueue(connection, Request::Assign { workspace, group })
    }

    pub fn request_create_workspace(
        &mut self,
        connection: ConnectionId,
        group: GroupHandle,
        name: String,
    ) -> Result<(), WorkspaceError> {
        if !self.check_group(connection, group)? {
            return Ok(());
        }
        self.enqueue(connection, Request::CreateWorkspace { group, name })
    }

    /// Flushes `connection`'s queued requests, oldest first, into application events.
    pub fn commit(data: &mut D, connection: ConnectionId) {
        let manager = data.workspace_manager();
        let Some(client) = manager.clients.get_mut(&connection) else {
            return;
        };
        if client.defunct {
            return;
        }

        let requests = client.requests.drain();
        debug!(%connection, count = requests.len(), "committing workspace requests");

        for request in requests {
            match request {
                Request::CreateWorkspace { group, name } => {
                    Self::emit_group(data, group, GroupEvent::CreateWorkspace(name));
                }
                Request::Activate(workspace) => {
                    Self::emit_workspace(data, workspace, WorkspaceEvent::Activate);
                }
                Request::Deactivate(workspace) => {
                    Self::emit_workspace(data, workspace, WorkspaceEvent::Deactivate);
                }
                Request::Assign { workspace, group } => {
                    if data.workspace_manager().groups.contains_key(&group) {
                        Self::emit_workspace(data, workspace, WorkspaceEvent::Assign(group));
                    }
                }
                Request::Remove(workspace) => {
                    Self::emit_workspace(data, workspace, WorkspaceEvent::Remove);
                }
            }
        }
    }

    /// The client dropped its mirror of `group`.
    pub fn destroy_group_proxy(&mut self, connection: ConnectionId, group: GroupHandle) {
        if self.proxies.remove_group(group, connection) {
            if let Some(client) = self.clients.get_mut(&connection) {
                client.transport.release(Proxy::Group(group));
            }
        }
    }

    /// The client dropped its mirror of `workspace`.
    pub fn destroy_workspace_proxy(&mut self, connection: ConnectionId, workspace: WorkspaceHandle) {
        if self.proxies.remove_workspace(workspace, connection) {
            if let Some(client) = self.clients.get_mut(&connection) {
                client.transport.release(Proxy::Workspace(workspace));
            }
        }
    }

    /// A client bound `output` after groups containing it were announced to it.
    pub fn output_bound(&mut self, connection: ConnectionId, output: &Output) {
        let mut sent = false;
        for group in self.proxies.connection_groups(connection) {
            let contains = self
                .groups
                .get(&group)
                .is_some_and(|g| g.outputs.contains(output));
            if contains {
                sent |= self.send(connection, Event::OutputEnter(group, output.clone()));
            }
        }
        if sent {
            self.schedule_done();
        }
    }

    pub fn add_listener<F>(&mut self, callback: F) -> ListenerId
    where
        F: FnMut(&mut D, &ManagerEvent) -> ListenerAction + 'static,
    {
        self.listeners.add(callback)
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    /// Whether a `done` batch is armed for the current loop turn.
    pub fn is_done_pending(&self) -> bool {
        self.idle.is_some()
    }

    /// Tears the manager down: terminal event, then every group, workspace and client.
    ///
    /// Manager listeners must return [`ListenerAction::Remove`] for [`ManagerEvent::Destroy`].
    pub fn destroy(data: &mut D) {
        let manager = data.workspace_manager();
        debug_assert!(!manager.destroyed, "workspace manager destroyed twice");
        if manager.destroyed {
            return;
        }

        let mut listeners = manager.listeners.take();
        listeners.dispatch(data, &ManagerEvent::Destroy);

        let manager = data.workspace_manager();
        let leftover = listeners.len() + manager.listeners.len();
        debug_assert_eq!(leftover, 0, "manager listeners kept past destroy");
        if leftover > 0 {
            warn!(leftover, "dropping manager listeners kept past destroy");
            manager.listeners = Listeners::default();
        }

        let groups: Vec<GroupHandle> = manager.groups.keys().copied().collect();
        for group in groups {
            Self::destroy_group(data, group);
        }
        let workspaces: Vec<WorkspaceHandle> =
            data.workspace_manager().workspaces.keys().copied().collect();
        for workspace in workspaces {
            Self::destroy_workspace(data, workspace);
        }

        let manager = data.workspace_manager();
        manager.clients.clear();
        manager.proxies.clear();
        manager.group_listeners.clear();
        manager.workspace_listeners.clear();
        if let Some(idle) = manager.idle.take() {
            idle.cancel();
        }
        manager.destroyed = true;
        debug!("workspace manager destroyed");
    }

    pub(crate) fn emit_group(data: &mut D, group: GroupHandle, event: GroupEvent) {
        Self::emit(
            data,
            group,
            &event,
            &GroupEvent::Destroy,
            Self::group_listener_slot,
            Self::group_exists,
        );
    }

    pub(crate) fn emit_workspace(data: &mut D, workspace: WorkspaceHandle, event: WorkspaceEvent) {
        Self::emit(
            data,
            workspace,
            &event,
            &WorkspaceEvent::Destroy,
            Self::workspace_listener_slot,
            Self::workspace_exists,
        );
    }

    fn group_listener_slot(&mut self) -> &mut HashMap<GroupHandle, Listeners<D, GroupEvent>> {
        &mut self.group_listeners
    }

    fn workspace_listener_slot(
        &mut self,
    ) -> &mut HashMap<WorkspaceHandle, Listeners<D, WorkspaceEvent>> {
        &mut self.workspace_listeners
    }

    fn group_exists(&self, group: GroupHandle) -> bool {
        self.groups.contains_key(&group)
    }

    fn workspace_exists(&self, workspace: WorkspaceHandle) -> bool {
        self.workspaces.contains_key(&workspace)
    }

    /// Delivers `event` to `key`'s listeners in order, one detached at a time.
    ///
    /// A listener that destroys the entity has the others reached by the destroy path while it
    /// runs, and gets `terminal` itself once it returns.
    fn emit<K, E>(
        data: &mut D,
        key: K,
        event: &E,
        terminal: &E,
        slot: fn(&mut Self) -> &mut HashMap<K, Listeners<D, E>>,
        alive: fn(&Self, K) -> bool,
    ) where
        K: Copy + Eq + std::hash::Hash + std::fmt::Debug,
    {
        let ids = match slot(data.workspace_manager()).get(&key) {
            Some(listeners) => listeners.ids(),
            None => return,
        };

        for id in ids {
            let manager = data.workspace_manager();
            if !alive(manager, key) {
                break;
            }
            let Some((index, mut listener)) = slot(manager)
                .get_mut(&key)
                .and_then(|listeners| listeners.detach(id))
            else {
                continue;
            };

            let action = listener.call(data, event);
            let manager = data.workspace_manager();
            if alive(manager, key) {
                if action == ListenerAction::Keep {
                    slot(manager).entry(key).or_default().attach(index, listener);
                }
                continue;
            }

            // destroyed from inside this listener
            if action == ListenerAction::Keep {
                let action = listener.call(data, terminal);
                debug_assert_eq!(action, ListenerAction::Remove, "listener kept past destroy");
                if action == ListenerAction::Keep {
                    warn!(?key, "dropping listener kept past destroy");
                }
            }
        }
    }

    /// Sends one event to one client. Returns whether it was delivered.
    pub(crate) fn send(&mut self, connection: ConnectionId, event: Event) -> bool {
        let Some(client) = self.clients.get_mut(&connection) else {
            return false;
        };
        if client.defunct {
            return false;
        }

        trace!(%connection, ?event, "workspace event");
        match client.transport.send(event) {
            Ok(()) => true,
            Err(err) => {
                self.disconnect(connection, err);
                false
            }
        }
    }

    /// Marks a client defunct and tells it why. Other clients are unaffected.
    pub fn disconnect(&mut self, connection: ConnectionId, error: ConnectionError) {
        let Some(client) = self.clients.get_mut(&connection) else {
            return;
        };
        if client.defunct {
            return;
        }
        warn!(%connection, %error, "disconnecting workspace client");
        client.defunct = true;
        client.transport.post_error(&error);
    }

    pub(crate) fn client_has_output(&self, connection: ConnectionId, output: &Output) -> bool {
        self.clients
            .get(&connection)
            .is_some_and(|client| !client.defunct && client.transport.has_output(output))
    }

    /// Arms the `done` batch unless one is already pending.
    pub(crate) fn schedule_done(&mut self) {
        if self.idle.is_some() || self.destroyed {
            return;
        }
        let idle = self
            .loop_handle
            .insert_idle(|data: &mut D| data.workspace_manager().flush_done());
        self.idle = Some(idle);
    }

    fn flush_done(&mut self) {
        self.idle = None;
        let connections: Vec<ConnectionId> = self.clients.keys().copied().collect();
        for connection in connections {
            self.send(connection, Event::Done);
        }
    }

    /// Resolves a workspace named by a client request.
    ///
    /// `Ok(false)` means the workspace no longer exists and the request is dropped silently.
    fn check_workspace(
        &mut self,
        connection: ConnectionId,
        workspace: WorkspaceHandle,
    ) -> Result<bool, WorkspaceError> {
        if !self.check_client(connection)? || !self.workspaces.contains_key(&workspace) {
            return Ok(false);
        }
        if !self.proxies.has_workspace(workspace, connection) {
            let error = ConnectionError::InvalidObject(format!("{workspace:?}"));
            self.disconnect(connection, error.clone());
            return Err(error.into());
        }
        Ok(true)
    }

    fn check_group(&mut self, connection: ConnectionId, group: GroupHandle) -> Result<bool, WorkspaceError> {
        if !self.check_client(connection)? || !self.groups.contains_key(&group) {
            return Ok(false);
        }
        if !self.proxies.has_group(group, connection) {
            let error = ConnectionError::InvalidObject(format!("{group:?}"));
            self.disconnect(connection, error.clone());
            return Err(error.into());
        }
        Ok(true)
    }

    fn check_client(&self, connection: ConnectionId) -> Result<bool, WorkspaceError> {
        match self.clients.get(&connection) {
            Some(client) => Ok(!client.defunct),
            None => Err(WorkspaceError::UnknownConnection(connection)),
        }
    }

    fn enqueue(&mut self, connection: ConnectionId, request: Request) -> Result<(), WorkspaceError> {
        let Some(client) = self.clients.get_mut(&connection) else {
            return Err(WorkspaceError::UnknownConnection(connection));
        };
        trace!(%connection, ?request, "queued workspace request");
        if let Err(err) = client.requests.push(request) {
            self.disconnect(connection, err.clone());
            return Err(err.into());
        }
        Ok(())
    }
}

use std::collections::HashMap;
use std::marker::PhantomData;

use smithay::output::Output;
use smithay::reexports::wayland_protocols::ext::workspace::v1::server::{
    ext_workspace_group_handle_v1::{self, ExtWorkspaceGroupHandleV1},
    ext_workspace_handle_v1::{self, ExtWorkspaceHandleV1},
    ext_workspace_manager_v1::{self, ExtWorkspaceManagerV1},
};
use smithay::reexports::wayland_server::backend::protocol::ProtocolError;
use smithay::reexports::wayland_server::backend::{ClientId, GlobalId};
use smithay::reexports::wayland_server::protocol::wl_output::WlOutput;
use smithay::reexports::wayland_server::{
    Client, DataInit, Dispatch, DisplayHandle, GlobalDispatch, New, Resource,
};

use crate::errors::ConnectionError;
use crate::workspace::{
    ClientConnection, ConnectionId, Event, GroupHandle, ManagerConfig, Proxy, WorkspaceHandle,
    WorkspaceHandler, WorkspaceManager,
};

// wl_display error codes
const DISPLAY_INVALID_OBJECT: u32 = 0;
const DISPLAY_NO_MEMORY: u32 = 2;

/// State of the `ext_workspace_manager_v1` global.
pub struct ExtWorkspaceState {
    global: GlobalId,
    // owning wayland client of every bound manager object
    bound: HashMap<ConnectionId, ClientId>,
}

pub struct WorkspaceGlobalData {
    filter: Box<dyn for<'c> Fn(&'c Client) -> bool + Send + Sync>,
}

pub struct ManagerData {
    connection: ConnectionId,
}

pub struct GroupData {
    connection: ConnectionId,
    group: GroupHandle,
}

pub struct HandleData {
    connection: ConnectionId,
    workspace: WorkspaceHandle,
}

impl ExtWorkspaceState {
    pub fn new<D, F>(display: &DisplayHandle, config: &ManagerConfig, filter: F) -> Self
    where
        D: GlobalDispatch<ExtWorkspaceManagerV1, WorkspaceGlobalData>,
        D: Dispatch<ExtWorkspaceManagerV1, ManagerData>,
        D: Dispatch<ExtWorkspaceGroupHandleV1, GroupData>,
        D: Dispatch<ExtWorkspaceHandleV1, HandleData>,
        D: ExtWorkspaceHandler,
        F: for<'c> Fn(&'c Client) -> bool + Send + Sync + 'static,
    {
        let global_data = WorkspaceGlobalData {
            filter: Box::new(filter),
        };
        let global = display.create_global::<D, ExtWorkspaceManagerV1, _>(config.version, global_data);

        Self {
            global,
            bound: HashMap::new(),
        }
    }

    pub fn global(&self) -> GlobalId {
        self.global.clone()
    }

    /// Withdraws the global. Already bound clients keep their (now inert) objects.
    pub fn remove_global<D>(&self, display: &DisplayHandle)
    where
        D: GlobalDispatch<ExtWorkspaceManagerV1, WorkspaceGlobalData> + 'static,
    {
        display.remove_global::<D>(self.global.clone());
    }

    fn connections_of(&self, client: &ClientId) -> Vec<ConnectionId> {
        self.bound
            .iter()
            .filter(|(_, owner)| *owner == client)
            .map(|(connection, _)| *connection)
            .collect()
    }
}

pub trait ExtWorkspaceHandler: WorkspaceHandler {
    fn ext_workspace_state(&mut self) -> &mut ExtWorkspaceState;
}

/// Forwards a late `wl_output` bind to every workspace manager object of the same client.
pub fn output_bound<D: ExtWorkspaceHandler>(state: &mut D, output: &Output, wl_output: &WlOutput) {
    let Some(client) = wl_output.client() else {
        return;
    };
    let connections = state.ext_workspace_state().connections_of(&client.id());
    for connection in connections {
        state.workspace_manager().output_bound(connection, output);
    }
}

/// [`ClientConnection`] over one bound `ext_workspace_manager_v1`.
pub struct WaylandConnection<D> {
    display: DisplayHandle,
    client: Client,
    connection: ConnectionId,
    manager: ExtWorkspaceManagerV1,
    groups: HashMap<GroupHandle, ExtWorkspaceGroupHandleV1>,
    workspaces: HashMap<WorkspaceHandle, ExtWorkspaceHandleV1>,
    // wl_output resources each group has already sent output_enter for
    entered: HashMap<GroupHandle, Vec<WlOutput>>,
    _state: PhantomData<fn(&mut D)>,
}

impl<D> WaylandConnection<D>
where
    D: Dispatch<ExtWorkspaceGroupHandleV1, GroupData>,
    D: Dispatch<ExtWorkspaceHandleV1, HandleData>,
    D: 'static,
{
    fn new(
        display: DisplayHandle,
        client: Client,
        connection: ConnectionId,
        manager: ExtWorkspaceManagerV1,
    ) -> Self {
        Self {
            display,
            client,
            connection,
            manager,
            groups: HashMap::new(),
            workspaces: HashMap::new(),
            entered: HashMap::new(),
            _state: PhantomData,
        }
    }

    fn group(&self, group: GroupHandle) -> Result<&ExtWorkspaceGroupHandleV1, ConnectionError> {
        self.groups
            .get(&group)
            .ok_or_else(|| ConnectionError::InvalidObject(format!("{group:?}")))
    }

    fn workspace(&self, workspace: WorkspaceHandle) -> Result<&ExtWorkspaceHandleV1, ConnectionError> {
        self.workspaces
            .get(&workspace)
            .ok_or_else(|| ConnectionError::InvalidObject(format!("{workspace:?}")))
    }
}

impl<D> ClientConnection for WaylandConnection<D>
where
    D: Dispatch<ExtWorkspaceGroupHandleV1, GroupData>,
    D: Dispatch<ExtWorkspaceHandleV1, HandleData>,
    D: 'static,
{
    fn send(&mut self, event: Event) -> Result<(), ConnectionError> {
        if !self.manager.is_alive() {
            return Err(ConnectionError::Closed);
        }

        match event {
            Event::WorkspaceGroup(group) => {
                let data = GroupData {
                    connection: self.connection,
                    group,
                };
                let resource = self
                    .client
                    .create_resource::<ExtWorkspaceGroupHandleV1, _, D>(
                        &self.display,
                        self.manager.version(),
                        data,
                    )
                    .map_err(|_| ConnectionError::NoMemory)?;
                self.manager.workspace_group(&resource);
                self.groups.insert(group, resource);
            }
            Event::Workspace(workspace) => {
                let data = HandleData {
                    connection: self.connection,
                    workspace,
                };
                let resource = self
                    .client
                    .create_resource::<ExtWorkspaceHandleV1, _, D>(
                        &self.display,
                        self.manager.version(),
                        data,
                    )
                    .map_err(|_| ConnectionError::NoMemory)?;
                self.manager.workspace(&resource);
                self.workspaces.insert(workspace, resource);
            }
            Event::Done => self.manager.done(),
            Event::Finished => self.manager.finished(),

            Event::GroupCapabilities(group, caps) => {
                let caps = ext_workspace_group_handle_v1::GroupCapabilities::from_bits_truncate(
                    caps.bits(),
                );
                self.group(group)?.capabilities(caps);
            }
            Event::OutputEnter(group, output) => {
                let resource = self.group(group)?.clone();
                let entered = self.entered.entry(group).or_default();
                entered.retain(|wl_output| wl_output.is_alive());
                // a late bind only announces the new resource
                for wl_output in output.client_outputs(&self.client) {
                    if !entered.contains(&wl_output) {
                        resource.output_enter(&wl_output);
                        entered.push(wl_output);
                    }
                }
            }
            Event::OutputLeave(group, output) => {
                let resource = self.group(group)?.clone();
                let entered = self.entered.entry(group).or_default();
                for wl_output in output.client_outputs(&self.client) {
                    if let Some(index) = entered.iter().position(|o| *o == wl_output) {
                        resource.output_leave(&wl_output);
                        entered.remove(index);
                    }
                }
            }
            Event::WorkspaceEnter(group, workspace) => {
                self.group(group)?.workspace_enter(self.workspace(workspace)?);
            }
            Event::WorkspaceLeave(group, workspace) => {
                self.group(group)?.workspace_leave(self.workspace(workspace)?);
            }
            Event::GroupRemoved(group) => {
                self.entered.remove(&group);
                if let Some(resource) = self.groups.remove(&group) {
                    resource.removed();
                }
            }

            Event::Capabilities(workspace, caps) => {
                let caps = ext_workspace_handle_v1::WorkspaceCapabilities::from_bits_truncate(
                    caps.bits(),
                );
                self.workspace(workspace)?.capabilities(caps);
            }
            Event::Coordinates(workspace, coordinates) => {
                self.workspace(workspace)?.coordinates(coordinates);
            }
            Event::Name(workspace, name) => self.workspace(workspace)?.name(name),
            Event::Id(workspace, id) => self.workspace(workspace)?.id(id),
            Event::State(workspace, state) => {
                let state = ext_workspace_handle_v1::State::from_bits_truncate(state.bits());
                self.workspace(workspace)?.state(state);
            }
            Event::Removed(workspace) => {
                if let Some(resource) = self.workspaces.remove(&workspace) {
                    resource.removed();
                }
            }
        }

        Ok(())
    }

    fn has_output(&self, output: &Output) -> bool {
        output.client_outputs(&self.client).into_iter().next().is_some()
    }

    fn post_error(&mut self, error: &ConnectionError) {
        let code = match error {
            ConnectionError::NoMemory => DISPLAY_NO_MEMORY,
            ConnectionError::InvalidObject(_) => DISPLAY_INVALID_OBJECT,
            ConnectionError::Closed => return,
        };
        self.client.kill(
            &self.display,
            ProtocolError {
                code,
                object_id: 1,
                object_interface: "wl_display".into(),
                message: error.to_string(),
            },
        );
    }

    fn release(&mut self, proxy: Proxy) {
        match proxy {
            Proxy::Group(group) => {
                self.groups.remove(&group);
                self.entered.remove(&group);
            }
            Proxy::Workspace(workspace) => {
                self.workspaces.remove(&workspace);
            }
        }
    }
}

impl<D> GlobalDispatch<ExtWorkspaceManagerV1, WorkspaceGlobalData, D> for ExtWorkspaceState
where
    D: GlobalDispatch<ExtWorkspaceManagerV1, WorkspaceGlobalData>,
    D: Dispatch<ExtWorkspaceManagerV1, ManagerData>,
    D: Dispatch<ExtWorkspaceGroupHandleV1, GroupData>,
    D: Dispatch<ExtWorkspaceHandleV1, HandleData>,
    D: ExtWorkspaceHandler,
{
    fn bind(
        state: &mut D,
        display: &DisplayHandle,
        client: &Client,
        manager: New<ExtWorkspaceManagerV1>,
        _global_data: &WorkspaceGlobalData,
        data_init: &mut DataInit<'_, D>,
    ) {
        let connection = ConnectionId::next();
        let manager = data_init.init(manager, ManagerData { connection });

        let transport = WaylandConnection::<D>::new(display.clone(), client.clone(), connection, manager);
        match state.workspace_manager().bind(connection, Box::new(transport)) {
            Ok(()) => {
                state.ext_workspace_state().bound.insert(connection, client.id());
            }
            Err(err) => tracing::warn!(%connection, %err, "ext-workspace bind failed"),
        }
    }

    fn can_view(client: Client, global_data: &WorkspaceGlobalData) -> bool {
        (global_data.filter)(&client)
    }
}

impl<D> Dispatch<ExtWorkspaceManagerV1, ManagerData, D> for ExtWorkspaceState
where
    D: Dispatch<ExtWorkspaceManagerV1, ManagerData>,
    D: ExtWorkspaceHandler,
{
    fn request(
        state: &mut D,
        _client: &Client,
        _manager: &ExtWorkspaceManagerV1,
        request: ext_workspace_manager_v1::Request,
        data: &ManagerData,
        _display: &DisplayHandle,
        _data_init: &mut DataInit<'_, D>,
    ) {
        match request {
            ext_workspace_manager_v1::Request::Commit => {
                WorkspaceManager::commit(state, data.connection);
            }
            ext_workspace_manager_v1::Request::Stop => {
                state.workspace_manager().stop(data.connection);
                state.ext_workspace_state().bound.remove(&data.connection);
            }
            _ => unreachable!(),
        }
    }

    fn destroyed(state: &mut D, _client: ClientId, _manager: &ExtWorkspaceManagerV1, data: &ManagerData) {
        state.workspace_manager().unbind(data.connection);
        state.ext_workspace_state().bound.remove(&data.connection);
    }
}

impl<D> Dispatch<ExtWorkspaceGroupHandleV1, GroupData, D> for ExtWorkspaceState
where
    D: Dispatch<ExtWorkspaceGroupHandleV1, GroupData>,
    D: ExtWorkspaceHandler,
{
    fn request(
        state: &mut D,
        _client: &Client,
        _group: &ExtWorkspaceGroupHandleV1,
        request: ext_workspace_group_handle_v1::Request,
        data: &GroupData,
        _display: &DisplayHandle,
        _data_init: &mut DataInit<'_, D>,
    ) {
        let manager = state.workspace_manager();
        let result = match request {
            ext_workspace_group_handle_v1::Request::CreateWorkspace { workspace } => {
                manager.request_create_workspace(data.connection, data.group, workspace)
            }
            ext_workspace_group_handle_v1::Request::Destroy => {
                manager.destroy_group_proxy(data.connection, data.group);
                Ok(())
            }
            _ => unreachable!(),
        };
        if let Err(err) = result {
            tracing::debug!(connection = %data.connection, %err, "rejected workspace group request");
        }
    }
}

impl<D> Dispatch<ExtWorkspaceHandleV1, HandleData, D> for ExtWorkspaceState
where
    D: Dispatch<ExtWorkspaceHandleV1, HandleData>,
    D: ExtWorkspaceHandler,
{
    fn request(
        state: &mut D,
        _client: &Client,
        _workspace: &ExtWorkspaceHandleV1,
        request: ext_workspace_handle_v1::Request,
        data: &HandleData,
        _display: &DisplayHandle,
        _data_init: &mut DataInit<'_, D>,
    ) {
        let manager = state.workspace_manager();
        let (connection, workspace) = (data.connection, data.workspace);
        let result = match request {
            ext_workspace_handle_v1::Request::Activate => {
                manager.request_activate(connection, workspace)
            }
            ext_workspace_handle_v1::Request::Deactivate => {
                manager.request_deactivate(connection, workspace)
            }
            ext_workspace_handle_v1::Request::Remove => manager.request_remove(connection, workspace),
            ext_workspace_handle_v1::Request::Assign { workspace_group } => {
                // A group from another manager object is never valid here.
                let group = workspace_group
                    .data::<GroupData>()
                    .filter(|group| group.connection == connection)
                    .map(|group| group.group);
                match group {
                    Some(group) => manager.request_assign(connection, workspace, group),
                    None => {
                        let error = ConnectionError::InvalidObject("workspace group".into());
                        manager.disconnect(connection, error.clone());
                        Err(error.into())
                    }
                }
            }
            ext_workspace_handle_v1::Request::Destroy => {
                manager.destroy_workspace_proxy(connection, workspace);
                Ok(())
            }
            _ => unreachable!(),
        };
        if let Err(err) = result {
            tracing::debug!(%connection, %err, "rejected workspace request");
        }
    }
}

#[macro_export]
macro_rules! delegate_ext_workspace {
    ($(@<$( $lt:tt $( : $clt:tt $(+ $dlt:tt )* )? ),+>)? $ty: ty) => {
        smithay::reexports::wayland_server::delegate_global_dispatch!($(@< $( $lt $( : $clt $(+ $dlt )* )? ),+ >)? $ty: [
            smithay::reexports::wayland_protocols::ext::workspace::v1::server::ext_workspace_manager_v1::ExtWorkspaceManagerV1: $crate::protocols::ext_workspace::WorkspaceGlobalData
        ] => $crate::protocols::ext_workspace::ExtWorkspaceState);

        smithay::reexports::wayland_server::delegate_dispatch!($(@< $( $lt $( : $clt $(+ $dlt )* )? ),+ >)? $ty: [
            smithay::reexports::wayland_protocols::ext::workspace::v1::server::ext_workspace_manager_v1::ExtWorkspaceManagerV1: $crate::protocols::ext_workspace::ManagerData
        ] => $crate::protocols::ext_workspace::ExtWorkspaceState);

        smithay::reexports::wayland_server::delegate_dispatch!($(@< $( $lt $( : $clt $(+ $dlt )* )? ),+ >)? $ty: [
            smithay::reexports::wayland_protocols::ext::workspace::v1::server::ext_workspace_group_handle_v1::ExtWorkspaceGroupHandleV1: $crate::protocols::ext_workspace::GroupData
        ] => $crate::protocols::ext_workspace::ExtWorkspaceState);

        smithay::reexports::wayland_server::delegate_dispatch!($(@< $( $lt $( : $clt $(+ $dlt )* )? ),+ >)? $ty: [
            smithay::reexports::wayland_protocols::ext::workspace::v1::server::ext_workspace_handle_v1::ExtWorkspaceHandleV1: $crate::protocols::ext_workspace::HandleData
        ] => $crate::protocols::ext_workspace::ExtWorkspaceState);
    };
}

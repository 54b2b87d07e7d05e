use smithay::{
    reexports::{
        calloop::LoopHandle,
        wayland_server::{
            Display, DisplayHandle,
            backend::{ClientData, ClientId, DisconnectReason},
        },
    },
    wayland::{
        compositor::{CompositorClientState, CompositorState},
        output::OutputManagerState,
        shm::ShmState,
        socket::ListeningSocketSource,
    },
};
use std::{ffi::OsString, sync::Arc};
use tracing::{debug, info, warn};

use crate::{
    CompositorError, Result,
    output::HeadlessOutput,
    protocols::ext_workspace::ExtWorkspaceState,
    workspace::{ListenerAction, ManagerConfig, WorkspaceManager},
};

pub struct Oxws {
    pub display_handle: DisplayHandle,
    pub loop_handle: LoopHandle<'static, Oxws>,
    pub running: bool,

    pub compositor_state: CompositorState,
    pub shm_state: ShmState,
    pub output_manager_state: OutputManagerState,
    pub workspace_manager: WorkspaceManager<Oxws>,
    pub ext_workspace_state: ExtWorkspaceState,

    pub outputs: Vec<HeadlessOutput>,
    pub(crate) next_workspace: u64,
}

impl Oxws {
    pub fn new(
        display: Display<Self>,
        loop_handle: LoopHandle<'static, Oxws>,
    ) -> Result<(Self, Display<Self>)> {
        let display_handle = display.handle();

        let compositor_state = CompositorState::new::<Self>(&display_handle);
        let shm_state = ShmState::new::<Self>(&display_handle, vec![]);
        let output_manager_state = OutputManagerState::new_with_xdg_output::<Self>(&display_handle);
        let config = ManagerConfig::default();
        let mut workspace_manager = WorkspaceManager::new(config, loop_handle.clone())?;
        let ext_workspace_state = ExtWorkspaceState::new::<Self, _>(&display_handle, &config, |_| true);

        workspace_manager.add_listener(|_, event| {
            debug!(?event, "workspace manager going away");
            ListenerAction::Remove
        });

        Ok((
            Self {
                display_handle,
                loop_handle,
                running: true,

                compositor_state,
                shm_state,
                output_manager_state,
                workspace_manager,
                ext_workspace_state,

                outputs: Vec::new(),
                next_workspace: 0,
            },
            display,
        ))
    }

    /// Withdraws the workspace global and tears every group and workspace down.
    pub fn shutdown(&mut self) {
        if self.workspace_manager.is_destroyed() {
            return;
        }
        self.ext_workspace_state
            .remove_global::<Self>(&self.display_handle);

        let outputs: Vec<_> = self.outputs.iter().map(|o| o.output.clone()).collect();
        for output in &outputs {
            self.remove_output(output);
        }
        WorkspaceManager::destroy(self);
        self.running = false;
        info!("workspace manager shut down");
    }
}

pub fn init_wayland_listener(loop_handle: &LoopHandle<'static, Oxws>) -> Result<OsString> {
    let listening_socket =
        ListeningSocketSource::new_auto().map_err(|e| CompositorError::Backend(e.to_string()))?;
    let socket_name = listening_socket.socket_name().to_os_string();

    loop_handle
        .insert_source(listening_socket, move |client_stream, _, state| {
            if let Err(err) = state
                .display_handle
                .insert_client(client_stream, Arc::new(ClientState::default()))
            {
                warn!(%err, "failed to insert client");
            }
        })
        .map_err(|e| CompositorError::EventLoop(e.error.to_string()))?;

    Ok(socket_name)
}

#[derive(Default)]
pub struct ClientState {
    pub compositor_state: CompositorClientState,
}

impl ClientData for ClientState {
    fn initialized(&self, client_id: ClientId) {
        debug!(?client_id, "client connected");
    }

    fn disconnected(&self, client_id: ClientId, reason: DisconnectReason) {
        debug!(?client_id, ?reason, "client disconnected");
    }
}

mod compositor;

use smithay::{
    delegate_output, output::Output,
    reexports::wayland_server::protocol::wl_output::WlOutput, wayland::output::OutputHandler,
};

use crate::{
    protocols::ext_workspace::{self, ExtWorkspaceHandler, ExtWorkspaceState},
    state::Oxws,
    workspace::{WorkspaceHandler, WorkspaceManager},
};

impl OutputHandler for Oxws {
    fn output_bound(&mut self, output: Output, wl_output: WlOutput) {
        ext_workspace::output_bound(self, &output, &wl_output);
    }
}

delegate_output!(Oxws);

impl WorkspaceHandler for Oxws {
    fn workspace_manager(&mut self) -> &mut WorkspaceManager<Self> {
        &mut self.workspace_manager
    }
}

impl ExtWorkspaceHandler for Oxws {
    fn ext_workspace_state(&mut self) -> &mut ExtWorkspaceState {
        &mut self.ext_workspace_state
    }
}

crate::delegate_ext_workspace!(Oxws);

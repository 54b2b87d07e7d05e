use bitflags::bitflags;

bitflags! {
    /// Requests a client may issue against a workspace group.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct GroupCapabilities: u32 {
        const CREATE_WORKSPACE = 1 << 0;
    }
}

bitflags! {
    /// Requests a client may issue against a single workspace.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct WorkspaceCapabilities: u32 {
        const ACTIVATE = 1 << 0;
        const DEACTIVATE = 1 << 1;
        const REMOVE = 1 << 2;
        const ASSIGN = 1 << 3;
    }
}

bitflags! {
    /// Independent attributes currently true of a workspace.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct WorkspaceState: u32 {
        const ACTIVE = 1 << 0;
        const URGENT = 1 << 1;
        const HIDDEN = 1 << 2;
    }
}

impl WorkspaceState {
    /// Returns the state with `flag` set or cleared.
    pub fn with(self, flag: WorkspaceState, enabled: bool) -> Self {
        let mut state = self;
        state.set(flag, enabled);
        state
    }
}

use crate::{
    action::{Action, spawn_group, spawn_workspace},
    state::Oxws,
    workspace::{GroupHandle, WorkspaceManager},
};
use smithay::{
    output::{Mode, Output, PhysicalProperties, Subpixel},
    reexports::wayland_server::backend::GlobalId,
    utils::Transform,
};
use tracing::info;

/// A headless output and the workspace group shown on it.
#[derive(Debug, Clone)]
pub struct HeadlessOutput {
    pub output: Output,
    pub global: GlobalId,
    pub group: GroupHandle,
}

impl Oxws {
    pub fn add_output(&mut self, name: String, width: i32, height: i32, workspaces: usize) -> Output {
        let physical_properties = PhysicalProperties {
            size: (0, 0).into(),
            subpixel: Subpixel::Unknown,
            make: "oxws".to_string(),
            model: name.clone(),
        };

        let output = Output::new(name.clone(), physical_properties);
        let mode = Mode {
            size: (width, height).into(),
            refresh: 60_000,
        };

        output.change_current_state(Some(mode), Some(Transform::Normal), None, None);
        output.set_preferred(mode);
        let global = output.create_global::<Oxws>(&self.display_handle);

        let group = spawn_group(self, &output);
        let spawned: Vec<_> = (1..=workspaces)
            .map(|index| spawn_workspace(self, group, &index.to_string()))
            .collect();
        if let Some(&first) = spawned.first() {
            Action::Activate(first).execute(self);
        }

        info!(%name, workspaces, "output added");
        self.outputs.push(HeadlessOutput {
            output: output.clone(),
            global,
            group,
        });

        output
    }

    /// Tears down the output's group. Its workspaces go with it.
    pub fn remove_output(&mut self, output: &Output) {
        let Some(index) = self.outputs.iter().position(|o| &o.output == output) else {
            return;
        };
        let removed = self.outputs.remove(index);

        let members = self.workspace_manager.group_workspaces(removed.group);
        WorkspaceManager::destroy_group(self, removed.group);
        for workspace in members {
            WorkspaceManager::destroy_workspace(self, workspace);
        }
        self.workspace_manager.output_destroyed(output);
        self.display_handle.remove_global::<Oxws>(removed.global);
        info!(name = %output.name(), "output removed");
    }
}

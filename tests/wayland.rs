use std::collections::HashMap;
use std::os::unix::net::UnixStream;
use std::sync::Arc;
use std::time::Duration;

use oxws::state::{ClientState, Oxws};
use oxws::workspace::{WorkspaceHandle, WorkspaceState};
use pretty_assertions::assert_eq;
use smithay::reexports::{calloop::EventLoop, wayland_server::Display};
use wayland_client::{
    Connection, Dispatch, EventQueue, Proxy, QueueHandle,
    backend::ObjectId,
    event_created_child,
    protocol::{
        wl_output::{self, WlOutput},
        wl_registry::{self, WlRegistry},
    },
};
use wayland_protocols::ext::workspace::v1::client::{
    ext_workspace_group_handle_v1::{self, ExtWorkspaceGroupHandleV1},
    ext_workspace_handle_v1::{self, ExtWorkspaceHandleV1},
    ext_workspace_manager_v1::{self, ExtWorkspaceManagerV1},
};

/// Everything the in-process client has been told.
#[derive(Default)]
struct Seen {
    globals: Vec<(u32, String, u32)>,
    removed_globals: Vec<u32>,
    groups: Vec<ExtWorkspaceGroupHandleV1>,
    workspaces: Vec<ExtWorkspaceHandleV1>,
    ids: HashMap<ObjectId, String>,
    names: HashMap<ObjectId, String>,
    active: HashMap<ObjectId, bool>,
    group_capabilities: Vec<u32>,
    output_enters: Vec<(ObjectId, WlOutput)>,
    workspace_enters: usize,
    workspace_leaves: usize,
    groups_removed: usize,
    workspaces_removed: usize,
    dones: usize,
    finished: bool,
}

impl Dispatch<WlRegistry, ()> for Seen {
    fn event(
        seen: &mut Self,
        _: &WlRegistry,
        event: wl_registry::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        match event {
            wl_registry::Event::Global {
                name,
                interface,
                version,
            } => seen.globals.push((name, interface, version)),
            wl_registry::Event::GlobalRemove { name } => seen.removed_globals.push(name),
            _ => {}
        }
    }
}

impl Dispatch<WlOutput, ()> for Seen {
    fn event(
        _: &mut Self,
        _: &WlOutput,
        _: wl_output::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
    }
}

impl Dispatch<ExtWorkspaceManagerV1, ()> for Seen {
    fn event(
        seen: &mut Self,
        _: &ExtWorkspaceManagerV1,
        event: ext_workspace_manager_v1::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        match event {
            ext_workspace_manager_v1::Event::WorkspaceGroup { workspace_group } => {
                seen.groups.push(workspace_group)
            }
            ext_workspace_manager_v1::Event::Workspace { workspace } => {
                seen.workspaces.push(workspace)
            }
            ext_workspace_manager_v1::Event::Done => seen.dones += 1,
            ext_workspace_manager_v1::Event::Finished => seen.finished = true,
            _ => {}
        }
    }

    event_created_child!(Seen, ExtWorkspaceManagerV1, [
        ext_workspace_manager_v1::EVT_WORKSPACE_GROUP_OPCODE => (ExtWorkspaceGroupHandleV1, ()),
        ext_workspace_manager_v1::EVT_WORKSPACE_OPCODE => (ExtWorkspaceHandleV1, ()),
    ]);
}

impl Dispatch<ExtWorkspaceGroupHandleV1, ()> for Seen {
    fn event(
        seen: &mut Self,
        group: &ExtWorkspaceGroupHandleV1,
        event: ext_workspace_group_handle_v1::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        match event {
            ext_workspace_group_handle_v1::Event::Capabilities { capabilities } => seen
                .group_capabilities
                .push(capabilities.into_result().map_or(0, |caps| caps.bits())),
            ext_workspace_group_handle_v1::Event::OutputEnter { output } => {
                seen.output_enters.push((group.id(), output))
            }
            ext_workspace_group_handle_v1::Event::WorkspaceEnter { .. } => {
                seen.workspace_enters += 1
            }
            ext_workspace_group_handle_v1::Event::WorkspaceLeave { .. } => {
                seen.workspace_leaves += 1
            }
            ext_workspace_group_handle_v1::Event::Removed => seen.groups_removed += 1,
            _ => {}
        }
    }
}

impl Dispatch<ExtWorkspaceHandleV1, ()> for Seen {
    fn event(
        seen: &mut Self,
        workspace: &ExtWorkspaceHandleV1,
        event: ext_workspace_handle_v1::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        match event {
            ext_workspace_handle_v1::Event::Id { id } => {
                seen.ids.insert(workspace.id(), id);
            }
            ext_workspace_handle_v1::Event::Name { name } => {
                seen.names.insert(workspace.id(), name);
            }
            ext_workspace_handle_v1::Event::State { state } => {
                let active = state
                    .into_result()
                    .is_ok_and(|state| state.contains(ext_workspace_handle_v1::State::Active));
                seen.active.insert(workspace.id(), active);
            }
            ext_workspace_handle_v1::Event::Removed => seen.workspaces_removed += 1,
            _ => {}
        }
    }
}

fn serve(
    event_loop: &mut EventLoop<'static, Oxws>,
    display: &mut Display<Oxws>,
    server: &mut Oxws,
) {
    let _ = display.dispatch_clients(server);
    event_loop.dispatch(Some(Duration::ZERO), server).unwrap();
    let _ = display.flush_clients();
}

/// A demo compositor and one client talking over a socket pair on the same thread.
struct Session {
    event_loop: EventLoop<'static, Oxws>,
    display: Display<Oxws>,
    server: Oxws,
    connection: Connection,
    queue: EventQueue<Seen>,
    registry: WlRegistry,
    seen: Seen,
}

impl Session {
    fn new(outputs: &[&str], workspaces: usize) -> Self {
        let event_loop: EventLoop<'static, Oxws> = EventLoop::try_new().unwrap();
        let display: Display<Oxws> = Display::new().unwrap();
        let (mut server, mut display) = Oxws::new(display, event_loop.handle()).unwrap();
        for name in outputs {
            server.add_output(name.to_string(), 1920, 1080, workspaces);
        }

        let (server_end, client_end) = UnixStream::pair().unwrap();
        client_end.set_nonblocking(true).unwrap();
        display
            .handle()
            .insert_client(server_end, Arc::new(ClientState::default()))
            .unwrap();
        let connection = Connection::from_socket(client_end).unwrap();
        let queue = connection.new_event_queue();
        let registry = connection.display().get_registry(&queue.handle(), ());

        let mut session = Self {
            event_loop,
            display,
            server,
            connection,
            queue,
            registry,
            seen: Seen::default(),
        };
        session.pump();
        session
    }

    /// Runs both ends until the traffic settles.
    fn pump(&mut self) {
        for _ in 0..4 {
            let _ = self.connection.flush();
            serve(&mut self.event_loop, &mut self.display, &mut self.server);
            if let Some(guard) = self.queue.prepare_read() {
                let _ = guard.read();
            }
            let _ = self.queue.dispatch_pending(&mut self.seen);
        }
    }

    fn global(&self, interface: &str) -> (u32, u32) {
        self.seen
            .globals
            .iter()
            .find(|(_, name, _)| name == interface)
            .map(|(global, _, version)| (*global, *version))
            .unwrap()
    }

    fn bind_manager(&mut self) -> ExtWorkspaceManagerV1 {
        let (global, _) = self.global(ExtWorkspaceManagerV1::interface().name);
        let manager: ExtWorkspaceManagerV1 =
            self.registry.bind(global, 1, &self.queue.handle(), ());
        self.pump();
        manager
    }

    fn bind_output(&mut self) -> WlOutput {
        let (global, version) = self.global(WlOutput::interface().name);
        let output: WlOutput = self
            .registry
            .bind(global, version.min(4), &self.queue.handle(), ());
        self.pump();
        output
    }

    fn client_workspace(&self, id: &str) -> ExtWorkspaceHandleV1 {
        self.seen
            .workspaces
            .iter()
            .find(|ws| self.seen.ids.get(&ws.id()).map(String::as_str) == Some(id))
            .cloned()
            .unwrap()
    }

    fn server_workspace(&self, id: &str) -> WorkspaceHandle {
        let manager = &self.server.workspace_manager;
        manager
            .workspaces()
            .find(|ws| manager.workspace(*ws).and_then(|w| w.id()) == Some(id))
            .unwrap()
    }
}

#[test]
fn binding_replays_the_workspace_state() {
    let mut session = Session::new(&["headless-1"], 3);
    session.bind_manager();
    let seen = &session.seen;

    assert_eq!(seen.groups.len(), 1);
    assert_eq!(seen.group_capabilities, vec![1]);
    assert_eq!(seen.workspaces.len(), 3);
    assert_eq!(seen.workspace_enters, 3);
    assert_eq!(seen.dones, 1);
    assert!(seen.output_enters.is_empty());

    let mut names: Vec<_> = seen.names.values().cloned().collect();
    names.sort();
    assert_eq!(names, vec!["1", "2", "3"]);

    let first = session.client_workspace("oxws-1");
    let active: Vec<_> = seen
        .active
        .iter()
        .filter(|(_, on)| **on)
        .map(|(id, _)| id.clone())
        .collect();
    assert_eq!(active, vec![first.id()]);
}

#[test]
fn late_output_binds_announce_only_the_new_resource() {
    let mut session = Session::new(&["headless-1"], 2);
    session.bind_manager();
    let group = session.seen.groups[0].id();
    assert!(session.seen.output_enters.is_empty());

    let first = session.bind_output();
    assert_eq!(session.seen.output_enters, vec![(group.clone(), first.clone())]);

    let second = session.bind_output();
    assert_eq!(
        session.seen.output_enters,
        vec![(group.clone(), first), (group, second)]
    );
    assert_eq!(session.seen.dones, 3);
}

#[test]
fn commit_applies_activation_and_assignment() {
    let mut session = Session::new(&["left", "right"], 2);
    let manager = session.bind_manager();
    assert_eq!(session.seen.workspace_enters, 4);

    let first = session.client_workspace("oxws-1");
    let second = session.client_workspace("oxws-2");
    let right = session.seen.groups[1].clone();

    second.activate();
    first.assign(&right);
    assert_eq!(session.seen.dones, 1);
    session.pump();
    // nothing happens before commit
    assert_eq!(session.seen.dones, 1);

    manager.commit();
    session.pump();

    let server_first = session.server_workspace("oxws-1");
    let server_second = session.server_workspace("oxws-2");
    let workspaces = &session.server.workspace_manager;
    assert!(
        workspaces
            .workspace(server_second)
            .unwrap()
            .state()
            .contains(WorkspaceState::ACTIVE)
    );
    assert_eq!(
        workspaces.workspace(server_first).unwrap().group(),
        Some(session.server.outputs[1].group)
    );

    assert_eq!(session.seen.active.get(&second.id()), Some(&true));
    assert_eq!(session.seen.active.get(&first.id()), Some(&false));
    assert_eq!(session.seen.workspace_leaves, 1);
    assert_eq!(session.seen.workspace_enters, 5);
    assert_eq!(session.seen.dones, 2);
}

#[test]
fn assigning_another_managers_group_is_a_protocol_error() {
    let mut session = Session::new(&["headless-1"], 1);
    let first_manager = session.bind_manager();
    session.bind_manager();
    assert_eq!(session.seen.groups.len(), 2);

    let workspace = session.seen.workspaces[0].clone();
    let foreign = session.seen.groups[1].clone();
    workspace.assign(&foreign);
    first_manager.commit();
    session.pump();

    let error = session.connection.protocol_error().unwrap();
    assert_eq!(error.code, 0);
    assert_eq!(error.object_interface, "wl_display");

    let server_workspace = session.server_workspace("oxws-1");
    assert_eq!(
        session
            .server
            .workspace_manager
            .workspace(server_workspace)
            .unwrap()
            .group(),
        Some(session.server.outputs[0].group)
    );
}

#[test]
fn stop_is_answered_with_finished() {
    let mut session = Session::new(&["headless-1"], 1);
    let manager = session.bind_manager();
    assert_eq!(session.server.workspace_manager.connections().count(), 1);

    manager.stop();
    session.pump();

    assert!(session.seen.finished);
    assert_eq!(session.server.workspace_manager.connections().count(), 0);
}

#[test]
fn client_disconnect_unbinds_its_managers() {
    let mut session = Session::new(&["headless-1"], 1);
    session.bind_manager();
    session.bind_manager();
    assert_eq!(session.server.workspace_manager.connections().count(), 2);

    let Session {
        mut event_loop,
        mut display,
        mut server,
        connection,
        queue,
        ..
    } = session;
    drop(queue);
    drop(connection);
    for _ in 0..4 {
        serve(&mut event_loop, &mut display, &mut server);
    }

    assert_eq!(server.workspace_manager.connections().count(), 0);
}

#[test]
fn removing_an_output_withdraws_its_global_and_group() {
    let mut session = Session::new(&["left", "right"], 1);
    session.bind_manager();
    let (global, _) = session.global(WlOutput::interface().name);

    let output = session.server.outputs[0].output.clone();
    session.server.remove_output(&output);
    session.pump();

    assert_eq!(session.seen.removed_globals, vec![global]);
    assert_eq!(session.seen.groups_removed, 1);
    assert_eq!(session.seen.workspaces_removed, 1);
    assert_eq!(session.server.outputs.len(), 1);
}

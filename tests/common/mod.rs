#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use oxws::errors::ConnectionError;
use oxws::workspace::{
    ClientConnection, ConnectionId, Event, GroupEvent, GroupHandle, ListenerAction, ManagerConfig,
    Proxy, WorkspaceEvent, WorkspaceHandle, WorkspaceHandler, WorkspaceManager,
};
use smithay::output::{Output, PhysicalProperties, Subpixel};
use smithay::reexports::calloop::EventLoop;

#[derive(Default)]
struct Recording {
    events: Vec<Event>,
    errors: Vec<ConnectionError>,
    released: Vec<Proxy>,
    outputs: Vec<Output>,
    fail_allocations: bool,
}

/// Client side of a [`RecordingConnection`]; clones share the same log.
#[derive(Clone, Default)]
pub struct Recorder(Rc<RefCell<Recording>>);

impl Recorder {
    pub fn connection(&self) -> Box<dyn ClientConnection> {
        Box::new(RecordingConnection(self.clone()))
    }

    /// Drains everything received so far.
    pub fn take(&self) -> Vec<Event> {
        std::mem::take(&mut self.0.borrow_mut().events)
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.borrow().events.clone()
    }

    pub fn count(&self, matches: impl Fn(&Event) -> bool) -> usize {
        self.0.borrow().events.iter().filter(|e| matches(e)).count()
    }

    pub fn dones(&self) -> usize {
        self.count(|e| *e == Event::Done)
    }

    pub fn errors(&self) -> Vec<ConnectionError> {
        self.0.borrow().errors.clone()
    }

    pub fn released(&self) -> Vec<Proxy> {
        self.0.borrow().released.clone()
    }

    pub fn bind_output(&self, output: &Output) {
        self.0.borrow_mut().outputs.push(output.clone());
    }

    /// Makes every later proxy creation fail with out-of-memory.
    pub fn fail_allocations(&self) {
        self.0.borrow_mut().fail_allocations = true;
    }
}

pub struct RecordingConnection(Recorder);

impl ClientConnection for RecordingConnection {
    fn send(&mut self, event: Event) -> Result<(), ConnectionError> {
        let mut recording = (self.0).0.borrow_mut();
        let creates = matches!(event, Event::WorkspaceGroup(_) | Event::Workspace(_));
        if creates && recording.fail_allocations {
            return Err(ConnectionError::NoMemory);
        }
        recording.events.push(event);
        Ok(())
    }

    fn has_output(&self, output: &Output) -> bool {
        (self.0).0.borrow().outputs.contains(output)
    }

    fn post_error(&mut self, error: &ConnectionError) {
        (self.0).0.borrow_mut().errors.push(error.clone());
    }

    fn release(&mut self, proxy: Proxy) {
        (self.0).0.borrow_mut().released.push(proxy);
    }
}

pub struct TestState {
    pub manager: WorkspaceManager<TestState>,
    pub workspace_events: Vec<(WorkspaceHandle, WorkspaceEvent)>,
    pub group_events: Vec<(GroupHandle, GroupEvent)>,
    /// Free-form trail for tests that tell several listeners apart.
    pub notes: Vec<String>,
}

impl WorkspaceHandler for TestState {
    fn workspace_manager(&mut self) -> &mut WorkspaceManager<Self> {
        &mut self.manager
    }
}

pub struct Harness {
    pub event_loop: EventLoop<'static, TestState>,
    pub state: TestState,
}

impl Harness {
    pub fn new() -> Self {
        let event_loop: EventLoop<'static, TestState> = EventLoop::try_new().unwrap();
        let manager = WorkspaceManager::new(ManagerConfig::default(), event_loop.handle()).unwrap();
        Self {
            event_loop,
            state: TestState {
                manager,
                workspace_events: Vec::new(),
                group_events: Vec::new(),
                notes: Vec::new(),
            },
        }
    }

    pub fn manager(&mut self) -> &mut WorkspaceManager<TestState> {
        &mut self.state.manager
    }

    pub fn connect(&mut self) -> (ConnectionId, Recorder) {
        let recorder = Recorder::default();
        let connection = ConnectionId::next();
        self.state.manager.bind(connection, recorder.connection()).unwrap();
        (connection, recorder)
    }

    /// Ends the current loop turn, running the pending `done` batch.
    pub fn flush(&mut self) {
        self.event_loop
            .dispatch(Some(Duration::ZERO), &mut self.state)
            .unwrap();
    }

    /// Records every event of `workspace` until its destroy event.
    pub fn watch_workspace(&mut self, workspace: WorkspaceHandle) {
        self.state
            .manager
            .add_workspace_listener(workspace, move |state: &mut TestState, event| {
                state.workspace_events.push((workspace, event.clone()));
                match event {
                    WorkspaceEvent::Destroy => ListenerAction::Remove,
                    _ => ListenerAction::Keep,
                }
            })
            .unwrap();
    }

    pub fn watch_group(&mut self, group: GroupHandle) {
        self.state
            .manager
            .add_group_listener(group, move |state: &mut TestState, event| {
                state.group_events.push((group, event.clone()));
                match event {
                    GroupEvent::Destroy => ListenerAction::Remove,
                    _ => ListenerAction::Keep,
                }
            })
            .unwrap();
    }
}

pub fn output(name: &str) -> Output {
    Output::new(
        name.to_string(),
        PhysicalProperties {
            size: (0, 0).into(),
            subpixel: Subpixel::Unknown,
            make: "test".to_string(),
            model: name.to_string(),
        },
    )
}

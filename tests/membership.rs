mod common;

use std::collections::HashMap;

use common::Harness;
use oxws::workspace::{
    Event, GroupCapabilities, GroupHandle, WorkspaceCapabilities, WorkspaceHandle,
    WorkspaceManager,
};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    CreateGroup,
    CreateWorkspace,
    Assign(usize, Option<usize>),
    DestroyGroup(usize),
    DestroyWorkspace(usize),
    Flush,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        1 => Just(Op::CreateGroup),
        2 => Just(Op::CreateWorkspace),
        3 => (any::<usize>(), proptest::option::of(any::<usize>()))
            .prop_map(|(ws, group)| Op::Assign(ws, group)),
        1 => any::<usize>().prop_map(Op::DestroyGroup),
        1 => any::<usize>().prop_map(Op::DestroyWorkspace),
        1 => Just(Op::Flush),
    ]
}

/// Membership as one client sees it.
#[derive(Default)]
struct Mirror {
    groups: Vec<GroupHandle>,
    workspaces: HashMap<WorkspaceHandle, Option<GroupHandle>>,
}

impl Mirror {
    fn apply(&mut self, event: &Event) {
        match event {
            Event::WorkspaceGroup(group) => self.groups.push(*group),
            Event::Workspace(ws) => {
                self.workspaces.insert(*ws, None);
            }
            Event::WorkspaceEnter(group, ws) => {
                assert!(self.groups.contains(group), "enter into unknown group");
                let slot = self.workspaces.get_mut(ws).expect("enter of unknown workspace");
                assert_eq!(*slot, None, "workspace entered a second group");
                *slot = Some(*group);
            }
            Event::WorkspaceLeave(group, ws) => {
                let slot = self.workspaces.get_mut(ws).expect("leave of unknown workspace");
                assert_eq!(*slot, Some(*group), "workspace left a group it was not in");
                *slot = None;
            }
            Event::Removed(ws) => {
                self.workspaces.remove(ws);
            }
            Event::GroupRemoved(group) => {
                assert!(
                    self.workspaces.values().all(|g| *g != Some(*group)),
                    "group removed with members"
                );
                self.groups.retain(|g| g != group);
            }
            _ => {}
        }
    }

    fn assert_matches(&self, manager: &WorkspaceManager<common::TestState>) {
        let groups: Vec<_> = manager.groups().collect();
        assert_eq!(self.groups, groups);
        assert_eq!(self.workspaces.len(), manager.workspaces().count());
        for ws in manager.workspaces() {
            let owner = manager.workspace(ws).unwrap().group();
            assert_eq!(self.workspaces.get(&ws), Some(&owner));
            if let Some(group) = owner {
                assert!(manager.group_workspaces(group).contains(&ws));
            }
        }
        for group in manager.groups() {
            for ws in manager.group_workspaces(group) {
                assert_eq!(manager.workspace(ws).unwrap().group(), Some(group));
            }
        }
    }
}

fn pick<T: Copy>(items: &[T], index: usize) -> Option<T> {
    (!items.is_empty()).then(|| items[index % items.len()])
}

proptest! {
    #[test]
    fn mirrored_membership_matches_canonical(ops in proptest::collection::vec(op(), 1..48)) {
        let mut h = Harness::new();
        let (_, early) = h.connect();
        let mut mirror = Mirror::default();

        for op in ops {
            let groups: Vec<_> = h.manager().groups().collect();
            let workspaces: Vec<_> = h.manager().workspaces().collect();
            match op {
                Op::CreateGroup => {
                    h.manager().create_group(GroupCapabilities::CREATE_WORKSPACE);
                }
                Op::CreateWorkspace => {
                    h.manager().create_workspace(None, WorkspaceCapabilities::all());
                }
                Op::Assign(ws, group) => {
                    if let Some(ws) = pick(&workspaces, ws) {
                        let group = group.and_then(|g| pick(&groups, g));
                        h.manager().set_group(ws, group);
                    }
                }
                Op::DestroyGroup(group) => {
                    if let Some(group) = pick(&groups, group) {
                        WorkspaceManager::destroy_group(&mut h.state, group);
                    }
                }
                Op::DestroyWorkspace(ws) => {
                    if let Some(ws) = pick(&workspaces, ws) {
                        WorkspaceManager::destroy_workspace(&mut h.state, ws);
                    }
                }
                Op::Flush => h.flush(),
            }

            for event in early.take() {
                mirror.apply(&event);
            }
            mirror.assert_matches(h.manager());
        }

        // a client binding now must see the same picture
        let (_, late) = h.connect();
        let mut replayed = Mirror::default();
        for event in late.take() {
            replayed.apply(&event);
        }
        replayed.assert_matches(h.manager());
        prop_assert_eq!(replayed.workspaces, mirror.workspaces);
    }
}

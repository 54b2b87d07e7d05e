use std::sync::atomic::{AtomicU64, Ordering};

use super::GroupHandle;

/// Application-visible events on a workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkspaceEvent {
    /// A client asked for the workspace to be activated.
    Activate,
    /// A client asked for the workspace to be deactivated.
    Deactivate,
    /// A client asked for the workspace to move to the given group.
    Assign(GroupHandle),
    /// A client asked for the workspace to be removed.
    Remove,
    /// The workspace is being destroyed. Every listener must return
    /// [`ListenerAction::Remove`].
    Destroy,
}

/// Application-visible events on a workspace group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupEvent {
    /// A client asked for a new workspace with the given name in this group.
    CreateWorkspace(String),
    /// The group is being destroyed. Every listener must return [`ListenerAction::Remove`].
    Destroy,
}

/// Application-visible events on the manager itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagerEvent {
    /// The manager is being destroyed. Every listener must return [`ListenerAction::Remove`].
    Destroy,
}

/// What a listener wants after handling an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerAction {
    Keep,
    Remove,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

type Callback<D, E> = Box<dyn FnMut(&mut D, &E) -> ListenerAction>;

/// One registered callback.
pub(crate) struct Listener<D, E> {
    id: ListenerId,
    callback: Callback<D, E>,
}

impl<D, E> Listener<D, E> {
    pub(crate) fn call(&mut self, data: &mut D, event: &E) -> ListenerAction {
        (self.callback)(data, event)
    }
}

/// Ordered subscriber list for one entity.
///
/// Emission detaches one listener at a time so its callback can receive `&mut D` and call
/// back into the manager while every other listener stays reachable.
pub(crate) struct Listeners<D, E> {
    entries: Vec<Listener<D, E>>,
}

impl<D, E> Default for Listeners<D, E> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<D, E> Listeners<D, E> {
    pub(crate) fn add<F>(&mut self, callback: F) -> ListenerId
    where
        F: FnMut(&mut D, &E) -> ListenerAction + 'static,
    {
        let id = ListenerId::next();
        self.entries.push(Listener {
            id,
            callback: Box::new(callback),
        });
        id
    }

    pub(crate) fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.id != id);
        before != self.entries.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn take(&mut self) -> Self {
        std::mem::take(self)
    }

    pub(crate) fn ids(&self) -> Vec<ListenerId> {
        self.entries.iter().map(|entry| entry.id).collect()
    }

    /// Takes one listener out, returning it with the position it held.
    pub(crate) fn detach(&mut self, id: ListenerId) -> Option<(usize, Listener<D, E>)> {
        let index = self.entries.iter().position(|entry| entry.id == id)?;
        Some((index, self.entries.remove(index)))
    }

    /// Puts a detached listener back where it was, or last if the list shrank meanwhile.
    pub(crate) fn attach(&mut self, index: usize, listener: Listener<D, E>) {
        let index = index.min(self.entries.len());
        self.entries.insert(index, listener);
    }

    /// Runs every callback in registration order, dropping those that ask to be removed.
    pub(crate) fn dispatch(&mut self, data: &mut D, event: &E) {
        self.entries
            .retain_mut(|entry| entry.call(data, event) == ListenerAction::Keep);
    }
}

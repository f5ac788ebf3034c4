//! Thread groups
//!
//! Every thread belongs to exactly one group at a time. Membership lives in a
//! [`GroupIndex`] owned by the [`Host`]; [`ThreadGroup`] handles are views onto
//! it. New threads join the default group, and threads removed from any other
//! group fall back to it. The default group itself refuses removals.

use serde_json::Value;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use uuid::Uuid;

use crate::host::Host;
use crate::thread::{Lifecycle, Status, Thread, ThreadError, ThreadId, ThreadResult};

const DEFAULT_GROUP_ID: &str = "group#default";

/// Group id, `group#<uuid>` or `group#default`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupId(String);

impl GroupId {
    fn new() -> Self {
        Self(format!("group#{}", Uuid::new_v4().simple()))
    }

    pub fn default_group() -> Self {
        Self(DEFAULT_GROUP_ID.to_string())
    }

    pub fn is_default(&self) -> bool {
        self.0 == DEFAULT_GROUP_ID
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Thread to group assignment, in registration order
#[derive(Default)]
pub struct GroupIndex {
    entries: Vec<(Thread, GroupId)>,
}

impl GroupIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put `thread` into `group`, registering it if it is not known yet
    pub fn assign(&mut self, thread: &Thread, group: &GroupId) {
        match self.entries.iter_mut().find(|(t, _)| t == thread) {
            Some((_, current)) => *current = group.clone(),
            None => self.entries.push((thread.clone(), group.clone())),
        }
    }

    pub fn group_of(&self, thread: &ThreadId) -> Option<&GroupId> {
        self.entries
            .iter()
            .find(|(t, _)| t.id() == thread)
            .map(|(_, group)| group)
    }

    pub fn members(&self, group: &GroupId) -> Vec<Thread> {
        self.entries
            .iter()
            .filter(|(_, g)| g == group)
            .map(|(t, _)| t.clone())
            .collect()
    }

    pub fn count(&self, group: &GroupId) -> usize {
        self.entries.iter().filter(|(_, g)| g == group).count()
    }

    /// Every registered thread
    pub fn threads(&self) -> Vec<Thread> {
        self.entries.iter().map(|(t, _)| t.clone()).collect()
    }

    /// Forget terminated and errored threads, returning them
    pub fn remove_terminated(&mut self) -> Vec<Thread> {
        let (dead, live): (Vec<_>, Vec<_>) = self
            .entries
            .drain(..)
            .partition(|(t, _)| t.is_terminated());
        self.entries = live;
        dead.into_iter().map(|(t, _)| t).collect()
    }

    /// Forget every thread, returning them
    pub fn clear(&mut self) -> Vec<Thread> {
        self.entries.drain(..).map(|(t, _)| t).collect()
    }
}

/// A named set of threads
#[derive(Clone)]
pub struct ThreadGroup {
    id: GroupId,
    index: Rc<RefCell<GroupIndex>>,
}

impl ThreadGroup {
    /// Create an empty group on `host`
    pub fn new(host: &Host) -> Self {
        Self::with_id(host, GroupId::new())
    }

    pub(crate) fn with_id(host: &Host, id: GroupId) -> Self {
        Self {
            id,
            index: Rc::clone(host.index()),
        }
    }

    pub fn id(&self) -> &GroupId {
        &self.id
    }

    pub fn is_default(&self) -> bool {
        self.id.is_default()
    }

    /// Move `thread` into this group
    pub fn add(&self, thread: &Thread) {
        self.index.borrow_mut().assign(thread, &self.id);
    }

    pub fn add_all<'a>(&self, threads: impl IntoIterator<Item = &'a Thread>) {
        let mut index = self.index.borrow_mut();
        for thread in threads {
            index.assign(thread, &self.id);
        }
    }

    /// Move `thread` back to the default group. Threads of other groups are
    /// left where they are.
    pub fn remove(&self, thread: &Thread) -> ThreadResult<()> {
        self.remove_all([thread])
    }

    pub fn remove_all<'a>(&self, threads: impl IntoIterator<Item = &'a Thread>) -> ThreadResult<()> {
        if self.is_default() {
            return Err(ThreadError::DefaultGroupRemoval);
        }

        let default = GroupId::default_group();
        let mut index = self.index.borrow_mut();
        for thread in threads {
            if index.group_of(thread.id()) == Some(&self.id) {
                index.assign(thread, &default);
            }
        }
        Ok(())
    }

    pub fn has(&self, thread: &Thread) -> bool {
        self.index.borrow().group_of(thread.id()) == Some(&self.id)
    }

    /// `true` when every thread is a member; vacuously true for none
    pub fn has_all<'a>(&self, threads: impl IntoIterator<Item = &'a Thread>) -> bool {
        let index = self.index.borrow();
        threads
            .into_iter()
            .all(|thread| index.group_of(thread.id()) == Some(&self.id))
    }

    /// Visit every member. Membership is snapshotted first, so the visitor
    /// may change groups freely.
    pub fn each<F>(&self, mut visitor: F)
    where
        F: FnMut(&ThreadId, &Thread),
    {
        for thread in self.threads() {
            visitor(thread.id(), &thread);
        }
    }

    /// Keep members matching `predicate`; move the others to the default
    /// group and return them.
    pub fn filter<F>(&self, mut predicate: F) -> Vec<Thread>
    where
        F: FnMut(&Thread) -> bool,
    {
        let rejected: Vec<Thread> = self
            .threads()
            .into_iter()
            .filter(|thread| !predicate(thread))
            .collect();

        let default = GroupId::default_group();
        let mut index = self.index.borrow_mut();
        for thread in &rejected {
            index.assign(thread, &default);
        }
        rejected
    }

    /// Drop terminated members, see [`filter`](Self::filter)
    pub fn retain_live(&self) -> Vec<Thread> {
        self.filter(|thread| matches!(thread.status(), Status::Running | Status::Idle))
    }

    /// Send `payload` to every member. Returns how many accepted it.
    pub fn send<F>(&self, payload: impl Into<Value>, callback: F) -> usize
    where
        F: FnMut(Value, Status) + Clone + 'static,
    {
        let payload = payload.into();
        self.threads()
            .iter()
            .filter(|thread| thread.send(payload.clone(), callback.clone()))
            .count()
    }

    /// Send `payload` to every member without listening for results
    pub fn post(&self, payload: impl Into<Value>) -> usize {
        let payload = payload.into();
        self.threads()
            .iter()
            .filter(|thread| thread.post(payload.clone()))
            .count()
    }

    pub fn len(&self) -> usize {
        self.index.borrow().count(&self.id)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current members, in registration order
    pub fn threads(&self) -> Vec<Thread> {
        self.index.borrow().members(&self.id)
    }
}

impl Lifecycle for ThreadGroup {
    /// Kill every member
    fn kill(&self) -> Option<bool> {
        self.each(|_, thread| {
            thread.kill();
        });
        Some(true)
    }

    /// Stop every running member
    fn stop(&self) -> Option<bool> {
        self.each(|_, thread| {
            thread.stop();
        });
        Some(true)
    }
}

impl fmt::Debug for ThreadGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadGroup")
            .field("id", &self.id)
            .field("len", &self.len())
            .finish()
    }
}

impl fmt::Display for ThreadGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[object ThreadGroup {}]", self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::ScriptFunction;
    use std::time::Duration;

    fn spawn(host: &Host) -> Thread {
        host.spawn(ScriptFunction::parse("x => x * 10").unwrap())
            .unwrap()
    }

    #[test]
    fn test_add_then_remove_returns_to_default() {
        let host = Host::new();
        let thread = spawn(&host);
        let group = host.group();

        group.add(&thread);
        assert!(group.has(&thread));
        assert!(!host.default_group().has(&thread));
        assert_eq!(thread.group_id(), Some(group.id().clone()));

        group.remove(&thread).unwrap();
        assert!(!group.has(&thread));
        assert!(host.default_group().has(&thread));
    }

    #[test]
    fn test_default_group_rejects_removal() {
        let host = Host::new();
        let thread = spawn(&host);
        let default = host.default_group();
        assert!(matches!(
            default.remove(&thread),
            Err(ThreadError::DefaultGroupRemoval)
        ));
        assert!(matches!(
            default.remove_all(Vec::<&Thread>::new()),
            Err(ThreadError::DefaultGroupRemoval)
        ));
        assert!(default.has(&thread));
    }

    #[test]
    fn test_membership_is_exclusive() {
        let host = Host::new();
        let thread = spawn(&host);
        let a = host.group();
        let b = host.group();

        a.add(&thread);
        b.add(&thread);
        assert!(!a.has(&thread));
        assert!(b.has(&thread));

        // Removing from a group it is not in changes nothing.
        a.remove(&thread).unwrap();
        assert!(b.has(&thread));
    }

    #[test]
    fn test_has_all() {
        let host = Host::new();
        let (t1, t2, t3) = (spawn(&host), spawn(&host), spawn(&host));
        let group = host.group();
        group.add_all([&t1, &t2]);

        assert!(group.has_all([&t1, &t2]));
        assert!(!group.has_all([&t1, &t3]));
        assert!(group.has_all(Vec::<&Thread>::new()));
        assert_eq!(group.len(), 2);
        assert_eq!(group.threads(), vec![t1.clone(), t2.clone()]);

        group.remove_all([&t1, &t2]).unwrap();
        assert!(group.is_empty());
        assert_eq!(host.default_group().len(), 3);
    }

    #[test]
    fn test_each_visits_members() {
        let host = Host::new();
        let (t1, t2) = (spawn(&host), spawn(&host));
        let group = host.group();
        group.add_all([&t1, &t2]);

        let mut ids = Vec::new();
        group.each(|id, thread| {
            assert_eq!(id, thread.id());
            ids.push(id.clone());
        });
        assert_eq!(ids, vec![t1.id().clone(), t2.id().clone()]);
    }

    #[test]
    fn test_filter_moves_rejected_to_default() {
        let host = Host::new();
        let (t1, t2) = (spawn(&host), spawn(&host));
        let group = host.group();
        group.add_all([&t1, &t2]);

        let keep = t1.clone();
        let rejected = group.filter(|thread| *thread == keep);
        assert_eq!(rejected, vec![t2.clone()]);
        assert!(group.has(&t1));
        assert!(host.default_group().has(&t2));
    }

    #[test]
    fn test_retain_live() {
        let host = Host::new();
        let (t1, t2) = (spawn(&host), spawn(&host));
        let group = host.group();
        group.add_all([&t1, &t2]);

        t2.kill();
        assert_eq!(group.retain_live(), vec![t2.clone()]);
        assert_eq!(group.threads(), vec![t1.clone()]);
    }

    #[test]
    fn test_broadcast_send_and_kill() {
        let host = Host::new();
        let (t1, t2) = (spawn(&host), spawn(&host));
        let group = host.group();
        group.add_all([&t1, &t2]);

        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let accepted = group.send(4, move |payload: Value, _| sink.borrow_mut().push(payload));
        assert_eq!(accepted, 2);

        host.run_until_idle(Duration::from_secs(10)).unwrap();
        assert_eq!(*seen.borrow(), vec![Value::from(40), Value::from(40)]);

        assert_eq!(group.kill(), Some(true));
        assert!(t1.is_terminated() && t2.is_terminated());
        assert_eq!(group.post(1), 0);
    }

    #[test]
    fn test_broadcast_stop() {
        let host = Host::new();
        let thread = spawn(&host);
        let group = host.group();
        group.add(&thread);

        thread.post(1);
        assert_eq!(group.stop(), Some(true));
        assert!(thread.is_waiting());
    }

    #[test]
    fn test_display() {
        let host = Host::new();
        let group = host.group();
        assert!(group.id().as_str().starts_with("group#"));
        assert_eq!(group.to_string(), format!("[object ThreadGroup {}]", group.id()));
        assert_eq!(
            host.default_group().to_string(),
            "[object ThreadGroup group#default]"
        );
    }
}

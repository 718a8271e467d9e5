//! Listener bookkeeping shared by the single-threaded and thread-safe emitters.
//!
//! The registry is plain data. The emitters wrap it in a `RefCell` or a `Mutex` and never hold
//! the borrow or lock while a listener runs, which is what allows listeners to call back into
//! the emitter (including nested emissions) without deadlocking or double-borrowing.
//!
//! Dispatch is split into two steps:
//!
//! 1. [`Registry::snapshot()`] captures the registration IDs present when the emission starts.
//! 2. [`Registry::claim()`] is called once per captured ID, just before the listener runs. It
//!    returns the listener only if the registration is still present, and removes one-shot
//!    registrations (settling the whole group for race members) before handing it out.
//!
//! This guarantees that every registration present at the start of an emission runs at most
//! once for it, and that nothing runs after being removed, no matter how listeners mutate the
//! registry while the emission is in progress.

use foldhash::{HashMap, HashMapExt, HashSet, HashSetExt};
use tracing::{trace, warn};

/// Comparison of listeners by the identity of the shared callback they wrap.
pub(crate) trait ListenerIdentity: Clone {
    fn same_listener(&self, other: &Self) -> bool;
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub(crate) struct RegistrationId(u64);

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub(crate) struct GroupId(u64);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Mode {
    Persistent,
    Once,
    Race(GroupId),
}

#[derive(Debug)]
struct Entry<L> {
    id: RegistrationId,
    listener: L,
    mode: Mode,
}

/// What an unlisten handle removes when invoked.
#[derive(Debug)]
pub(crate) enum Target<L> {
    /// The persistent registration of a specific listener under a specific event name.
    ///
    /// Bound by listener identity, so it also removes a registration that was re-added after
    /// the handle was created.
    Persistent { name: String, listener: L },

    /// A single one-shot registration.
    Registration { name: String, id: RegistrationId },

    /// Every member of a race group that has not yet been removed.
    Group(GroupId),

    /// Nothing at all (e.g. a race over an empty set of events).
    Nothing,
}

#[derive(Debug)]
pub(crate) struct Registry<L> {
    /// Registrations per event name, in registration order. Names without registrations are
    /// removed from the map rather than kept with an empty list.
    events: HashMap<String, Vec<Entry<L>>>,

    /// Members of race groups that have not settled yet.
    groups: HashMap<GroupId, Vec<(String, RegistrationId)>>,

    next_id: u64,

    /// Listener count per event name above which we log a leak warning. Zero disables it.
    max_listeners: usize,

    /// Event names we have already logged a leak warning for.
    warned: HashSet<String>,
}

impl<L> Registry<L>
where
    L: ListenerIdentity,
{
    pub(crate) fn new(max_listeners: usize) -> Self {
        Self {
            events: HashMap::new(),
            groups: HashMap::new(),
            next_id: 0,
            max_listeners,
            warned: HashSet::new(),
        }
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;

        self.next_id = self
            .next_id
            .checked_add(1)
            .expect("registration identifier space exhausted - this is not realistically possible");

        id
    }

    fn push(&mut self, name: &str, listener: L, mode: Mode) -> RegistrationId {
        let id = RegistrationId(self.allocate_id());

        let entries = self.events.entry(name.to_owned()).or_default();
        entries.push(Entry { id, listener, mode });
        let count = entries.len();

        trace!(event = name, count, ?mode, "listener registered");

        if self.max_listeners != 0
            && count > self.max_listeners
            && self.warned.insert(name.to_owned())
        {
            warn!(
                event = name,
                count,
                max_listeners = self.max_listeners,
                "possible listener leak: more listeners registered for one event than the configured maximum"
            );
        }

        id
    }

    /// Registers a persistent listener unless the same listener is already persistently
    /// registered for this event name.
    pub(crate) fn add_persistent(&mut self, name: &str, listener: &L) -> Target<L> {
        let already_present = self.events.get(name).is_some_and(|entries| {
            entries
                .iter()
                .any(|e| e.mode == Mode::Persistent && e.listener.same_listener(listener))
        });

        if already_present {
            trace!(event = name, "listener already registered, not adding it again");
        } else {
            self.push(name, listener.clone(), Mode::Persistent);
        }

        Target::Persistent {
            name: name.to_owned(),
            listener: listener.clone(),
        }
    }

    pub(crate) fn add_once(&mut self, name: &str, listener: &L) -> Target<L> {
        let id = self.push(name, listener.clone(), Mode::Once);

        Target::Registration {
            name: name.to_owned(),
            id,
        }
    }

    /// Registers every pair as a member of one new race group.
    pub(crate) fn add_race<'a>(
        &mut self,
        pairs: impl IntoIterator<Item = (&'a str, &'a L)>,
    ) -> Target<L>
    where
        L: 'a,
    {
        let group = GroupId(self.allocate_id());

        let members = pairs
            .into_iter()
            .map(|(name, listener)| {
                let id = self.push(name, listener.clone(), Mode::Race(group));
                (name.to_owned(), id)
            })
            .collect::<Vec<_>>();

        if members.is_empty() {
            return Target::Nothing;
        }

        trace!(group = group.0, members = members.len(), "race group registered");

        self.groups.insert(group, members);
        Target::Group(group)
    }

    /// Removes every registration of `listener` under `name`, whatever its mode.
    pub(crate) fn remove_listener(&mut self, name: &str, listener: &L) -> usize {
        self.remove_where(name, |e| e.listener.same_listener(listener))
    }

    pub(crate) fn remove_all(&mut self, name: &str) -> usize {
        self.remove_where(name, |_| true)
    }

    pub(crate) fn clear(&mut self) {
        trace!(events = self.events.len(), "removing all listeners");

        self.events.clear();
        self.groups.clear();
    }

    pub(crate) fn release(&mut self, target: &Target<L>) -> usize {
        match target {
            Target::Persistent { name, listener } => self.remove_where(name, |e| {
                e.mode == Mode::Persistent && e.listener.same_listener(listener)
            }),
            Target::Registration { name, id } => self.remove_where(name, |e| e.id == *id),
            Target::Group(group) => self.settle(*group),
            Target::Nothing => 0,
        }
    }

    fn remove_where(&mut self, name: &str, mut predicate: impl FnMut(&Entry<L>) -> bool) -> usize {
        let Some(entries) = self.events.get_mut(name) else {
            return 0;
        };

        let mut removed = Vec::new();

        entries.retain(|e| {
            if predicate(e) {
                removed.push((e.id, e.mode));
                false
            } else {
                true
            }
        });

        if entries.is_empty() {
            self.events.remove(name);
        }

        for (id, mode) in &removed {
            if let Mode::Race(group) = mode {
                self.detach(*group, *id);
            }
        }

        if !removed.is_empty() {
            trace!(event = name, removed = removed.len(), "listeners removed");
        }

        removed.len()
    }

    /// Forgets a race member that was removed by some means other than its group settling.
    fn detach(&mut self, group: GroupId, id: RegistrationId) {
        if let Some(members) = self.groups.get_mut(&group) {
            members.retain(|(_, member)| *member != id);

            if members.is_empty() {
                self.groups.remove(&group);
            }
        }
    }

    /// Removes every remaining member of a race group. Idempotent.
    fn settle(&mut self, group: GroupId) -> usize {
        let Some(members) = self.groups.remove(&group) else {
            return 0;
        };

        let removed = members
            .iter()
            .map(|(name, id)| self.remove_where(name, |e| e.id == *id))
            .sum::<usize>();

        trace!(group = group.0, removed, "race group settled");

        removed
    }

    /// The registrations an emission of `name` starting now has to consider, in order.
    pub(crate) fn snapshot(&self, name: &str) -> Vec<RegistrationId> {
        self.events
            .get(name)
            .map(|entries| entries.iter().map(|e| e.id).collect())
            .unwrap_or_default()
    }

    /// Hands out the listener of a registration that is about to be invoked,
    /// or `None` if the registration has been removed since the snapshot was taken.
    ///
    /// One-shot registrations are removed before returning; for race members that means
    /// the entire group.
    pub(crate) fn claim(&mut self, name: &str, id: RegistrationId) -> Option<L> {
        let entry = self.events.get(name)?.iter().find(|e| e.id == id)?;

        let listener = entry.listener.clone();
        let mode = entry.mode;

        match mode {
            Mode::Persistent => {}
            Mode::Once => {
                self.remove_where(name, |e| e.id == id);
            }
            Mode::Race(group) => {
                self.settle(group);
            }
        }

        Some(listener)
    }

    pub(crate) fn listeners(&self, name: &str) -> Vec<L> {
        self.events
            .get(name)
            .map(|entries| entries.iter().map(|e| e.listener.clone()).collect())
            .unwrap_or_default()
    }

    pub(crate) fn listener_count(&self, name: &str) -> usize {
        self.events.get(name).map_or(0, Vec::len)
    }

    /// Names of all events with at least one registration, sorted.
    pub(crate) fn event_names(&self) -> Vec<String> {
        let mut names = self.events.keys().cloned().collect::<Vec<_>>();
        names.sort_unstable();
        names
    }

    #[cfg(test)]
    fn group_count(&self) -> usize {
        self.groups.len()
    }
}

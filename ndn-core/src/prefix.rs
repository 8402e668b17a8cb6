//! Registered prefix table: local Interest handlers and their registration state.

use std::collections::BTreeMap;
use std::fmt;

use crate::name::Name;
use crate::protocol::Interest;

/// Handle returned by `register_prefix` / `set_interest_filter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegisteredPrefixId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationStatus {
    /// Registration command sent, no reply yet. Not delivered to.
    PendingRegistration,
    Active,
    /// Unregistration requested. Not delivered to.
    PendingRemoval,
}

pub type OnInterest<C> = Box<dyn FnMut(&mut C, &Name, &Interest)>;
pub type OnRegisterFailed<C> = Box<dyn FnOnce(&mut C, &Name, &str)>;

struct Entry<C> {
    prefix: Name,
    on_interest: Option<OnInterest<C>>,
    on_failure: Option<OnRegisterFailed<C>>,
    status: RegistrationStatus,
    forwarder_registered: bool,
}

/// What the caller must do to finish an unregistration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Removal {
    /// Local-only entry; already purged.
    Done,
    /// Forwarder registration; send the unregister command for this prefix,
    /// then [`RegisteredPrefixTable::purge`].
    Unregister(Name),
}

pub struct RegisteredPrefixTable<C> {
    entries: BTreeMap<RegisteredPrefixId, Entry<C>>,
    next_id: u64,
}

impl<C> RegisteredPrefixTable<C> {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            next_id: 0,
        }
    }

    /// Add an entry. Forwarder-registered entries start in
    /// [`RegistrationStatus::PendingRegistration`]; local-only ones are active at once.
    pub fn insert(
        &mut self,
        prefix: Name,
        on_interest: OnInterest<C>,
        on_failure: Option<OnRegisterFailed<C>>,
        forwarder_registered: bool,
    ) -> RegisteredPrefixId {
        let id = RegisteredPrefixId(self.next_id);
        self.next_id += 1;
        let status = if forwarder_registered {
            RegistrationStatus::PendingRegistration
        } else {
            RegistrationStatus::Active
        };
        self.entries.insert(
            id,
            Entry {
                prefix,
                on_interest: Some(on_interest),
                on_failure,
                status,
                forwarder_registered,
            },
        );
        id
    }

    /// Registration succeeded. Returns false if the entry was removed or is
    /// no longer awaiting registration.
    pub fn activate(&mut self, id: RegisteredPrefixId) -> bool {
        match self.entries.get_mut(&id) {
            Some(entry) if entry.status == RegistrationStatus::PendingRegistration => {
                entry.status = RegistrationStatus::Active;
                entry.on_failure = None;
                true
            }
            _ => false,
        }
    }

    /// Registration failed. Removes the entry if it was still awaiting
    /// registration and hands back its prefix and failure callback.
    pub fn fail(&mut self, id: RegisteredPrefixId) -> Option<(Name, Option<OnRegisterFailed<C>>)> {
        if self.status(id) != Some(RegistrationStatus::PendingRegistration) {
            return None;
        }
        self.entries
            .remove(&id)
            .map(|entry| (entry.prefix, entry.on_failure))
    }

    /// Stop delivering to `id`. `None` if unknown or already being removed.
    pub fn begin_removal(&mut self, id: RegisteredPrefixId) -> Option<Removal> {
        let entry = self.entries.get_mut(&id)?;
        if entry.status == RegistrationStatus::PendingRemoval {
            return None;
        }
        if !entry.forwarder_registered {
            self.entries.remove(&id);
            return Some(Removal::Done);
        }
        entry.status = RegistrationStatus::PendingRemoval;
        entry.on_failure = None;
        Some(Removal::Unregister(entry.prefix.clone()))
    }

    pub fn purge(&mut self, id: RegisteredPrefixId) -> bool {
        self.entries.remove(&id).is_some()
    }

    pub fn status(&self, id: RegisteredPrefixId) -> Option<RegistrationStatus> {
        self.entries.get(&id).map(|entry| entry.status)
    }

    pub fn prefix(&self, id: RegisteredPrefixId) -> Option<&Name> {
        self.entries.get(&id).map(|entry| &entry.prefix)
    }

    /// Active entries whose prefix equals or is an ancestor of `name`, in
    /// registration order.
    pub fn matching(&self, name: &Name) -> Vec<RegisteredPrefixId> {
        self.entries
            .iter()
            .filter(|(_, entry)| {
                entry.status == RegistrationStatus::Active && entry.prefix.is_prefix_of(name)
            })
            .map(|(id, _)| *id)
            .collect()
    }

    /// Borrow the handler out for a call; give it back with
    /// [`restore_handler`](Self::restore_handler).
    pub fn take_handler(&mut self, id: RegisteredPrefixId) -> Option<(Name, OnInterest<C>)> {
        let entry = self.entries.get_mut(&id)?;
        let handler = entry.on_interest.take()?;
        Some((entry.prefix.clone(), handler))
    }

    /// Put a handler back. Dropped if the entry went away during the call.
    pub fn restore_handler(&mut self, id: RegisteredPrefixId, handler: OnInterest<C>) {
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.on_interest.get_or_insert(handler);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<C> Default for RegisteredPrefixTable<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> fmt::Debug for RegisteredPrefixTable<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(
                self.entries
                    .iter()
                    .map(|(id, entry)| (id, (&entry.prefix, entry.status))),
            )
            .finish()
    }
}

//! Pending Interest table: outstanding Interests awaiting Data, Nack or timeout.

use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};

use crate::protocol::{Data, Interest, Nack};
use crate::scheduler::EventId;

/// Handle returned by `express_interest`. Never reused within one face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PendingInterestId(u64);

/// Outcome callbacks for one expressed Interest. Exactly one of them is
/// called at most once; the handler is consumed by the call.
pub trait InterestHandler<C> {
    fn on_data(self: Box<Self>, ctx: &mut C, interest: &Interest, data: &Data);

    fn on_nack(self: Box<Self>, _ctx: &mut C, interest: &Interest, nack: &Nack) {
        tracing::debug!(name = %interest.name, reason = %nack.reason, "nack dropped, no handler");
    }

    fn on_timeout(self: Box<Self>, _ctx: &mut C, _interest: &Interest) {}
}

type DataFn<C> = Box<dyn FnOnce(&mut C, &Interest, &Data)>;
type NackFn<C> = Box<dyn FnOnce(&mut C, &Interest, &Nack)>;
type TimeoutFn<C> = Box<dyn FnOnce(&mut C, &Interest)>;

/// Closure-based [`InterestHandler`].
pub struct Callbacks<C> {
    on_data: DataFn<C>,
    on_nack: Option<NackFn<C>>,
    on_timeout: Option<TimeoutFn<C>>,
}

impl<C> Callbacks<C> {
    pub fn new(on_data: impl FnOnce(&mut C, &Interest, &Data) + 'static) -> Self {
        Self {
            on_data: Box::new(on_data),
            on_nack: None,
            on_timeout: None,
        }
    }

    pub fn on_nack(mut self, f: impl FnOnce(&mut C, &Interest, &Nack) + 'static) -> Self {
        self.on_nack = Some(Box::new(f));
        self
    }

    pub fn on_timeout(mut self, f: impl FnOnce(&mut C, &Interest) + 'static) -> Self {
        self.on_timeout = Some(Box::new(f));
        self
    }
}

impl<C> InterestHandler<C> for Callbacks<C> {
    fn on_data(self: Box<Self>, ctx: &mut C, interest: &Interest, data: &Data) {
        (self.on_data)(ctx, interest, data);
    }

    fn on_nack(self: Box<Self>, ctx: &mut C, interest: &Interest, nack: &Nack) {
        match self.on_nack {
            Some(f) => f(ctx, interest, nack),
            None => {
                tracing::debug!(name = %interest.name, reason = %nack.reason, "nack dropped, no handler")
            }
        }
    }

    fn on_timeout(self: Box<Self>, ctx: &mut C, interest: &Interest) {
        if let Some(f) = self.on_timeout {
            f(ctx, interest);
        }
    }
}

/// Decides whether a Data packet satisfies a pending Interest.
pub trait InterestMatcher {
    fn matches(&self, interest: &Interest, data: &Data) -> bool;
}

impl<F> InterestMatcher for F
where
    F: Fn(&Interest, &Data) -> bool,
{
    fn matches(&self, interest: &Interest, data: &Data) -> bool {
        self(interest, data)
    }
}

/// Interest name is a prefix of the Data name, and the suffix length
/// (counting the implicit digest component) is within the Interest's
/// min/max suffix components.
#[derive(Debug, Default, Clone, Copy)]
pub struct PrefixMatcher;

impl InterestMatcher for PrefixMatcher {
    fn matches(&self, interest: &Interest, data: &Data) -> bool {
        if !interest.name.is_prefix_of(&data.name) {
            return false;
        }
        let suffix = (data.name.len() + 1 - interest.name.len()) as u64;
        let selectors = &interest.selectors;
        selectors.min_suffix_components.map_or(true, |min| suffix >= min)
            && selectors.max_suffix_components.map_or(true, |max| suffix <= max)
    }
}

/// One outstanding Interest.
pub struct PendingInterest<C> {
    interest: Interest,
    handler: Box<dyn InterestHandler<C>>,
    deadline: Instant,
    timeout_event: Option<EventId>,
}

impl<C> PendingInterest<C> {
    pub fn interest(&self) -> &Interest {
        &self.interest
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn timeout_event(&self) -> Option<EventId> {
        self.timeout_event
    }

    pub fn into_parts(self) -> (Interest, Box<dyn InterestHandler<C>>) {
        (self.interest, self.handler)
    }
}

impl<C> fmt::Debug for PendingInterest<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingInterest")
            .field("name", &self.interest.name)
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}

/// Entries are kept in submission order; lookups scan in that order.
pub struct PendingInterestTable<C> {
    entries: BTreeMap<PendingInterestId, PendingInterest<C>>,
    next_id: u64,
    default_lifetime: Duration,
}

impl<C> PendingInterestTable<C> {
    pub fn new(default_lifetime: Duration) -> Self {
        Self {
            entries: BTreeMap::new(),
            next_id: 0,
            default_lifetime,
        }
    }

    /// Lifetime the Interest will be held for.
    pub fn lifetime_of(&self, interest: &Interest) -> Duration {
        interest.lifetime.unwrap_or(self.default_lifetime)
    }

    /// Store a new entry. Returns its handle and its lifetime; the caller arms
    /// the timeout and records it with [`set_timeout_event`](Self::set_timeout_event).
    pub fn insert(
        &mut self,
        interest: Interest,
        handler: Box<dyn InterestHandler<C>>,
        now: Instant,
    ) -> (PendingInterestId, Duration) {
        let lifetime = self.lifetime_of(&interest);
        let id = PendingInterestId(self.next_id);
        self.next_id += 1;
        self.entries.insert(
            id,
            PendingInterest {
                interest,
                handler,
                deadline: now + lifetime,
                timeout_event: None,
            },
        );
        (id, lifetime)
    }

    pub fn set_timeout_event(&mut self, id: PendingInterestId, event: EventId) {
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.timeout_event = Some(event);
        }
    }

    /// Remove an entry. `None` if it was already resolved or never existed.
    pub fn remove(&mut self, id: PendingInterestId) -> Option<PendingInterest<C>> {
        self.entries.remove(&id)
    }

    /// Remove and return the earliest-submitted entry satisfied by `data`.
    /// At most one entry is taken per Data packet.
    pub fn take_satisfied(
        &mut self,
        data: &Data,
        matcher: &dyn InterestMatcher,
    ) -> Option<(PendingInterestId, PendingInterest<C>)> {
        let id = self
            .entries
            .iter()
            .find(|(_, entry)| matcher.matches(&entry.interest, data))
            .map(|(id, _)| *id)?;
        self.entries.remove(&id).map(|entry| (id, entry))
    }

    /// Remove and return the earliest-submitted entry whose Interest has the
    /// nacked Interest's name and nonce.
    pub fn take_nacked(&mut self, nack: &Nack) -> Option<(PendingInterestId, PendingInterest<C>)> {
        let id = self
            .entries
            .iter()
            .find(|(_, entry)| {
                entry.interest.nonce == nack.interest.nonce
                    && entry.interest.name == nack.interest.name
            })
            .map(|(id, _)| *id)?;
        self.entries.remove(&id).map(|entry| (id, entry))
    }

    pub fn contains(&self, id: PendingInterestId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn get(&self, id: PendingInterestId) -> Option<&PendingInterest<C>> {
        self.entries.get(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<C> fmt::Debug for PendingInterestTable<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.values()).finish()
    }
}

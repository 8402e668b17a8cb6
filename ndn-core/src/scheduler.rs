//! Timer-ordered queue of one-shot and periodic callbacks.
//!
//! Events are ordered by (deadline, insertion sequence). Callbacks receive the
//! context that owns the scheduler, so they can schedule and cancel through it.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::clock::Clock;

/// Periodic events never repeat faster than this.
pub const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Handle to a scheduled event. Never reused within one scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId(u64);

enum Callback<C> {
    Once(Box<dyn FnOnce(&mut C)>),
    Periodic(Duration, Box<dyn FnMut(&mut C)>),
}

type Key = (Instant, u64);

struct Executing {
    id: EventId,
    cancelled: bool,
}

pub struct Scheduler<C> {
    clock: Rc<dyn Clock>,
    queue: BTreeMap<Key, (EventId, Callback<C>)>,
    index: HashMap<EventId, Key>,
    next_id: u64,
    next_seq: u64,
    executing: Option<Executing>,
}

impl<C> Scheduler<C> {
    pub fn new(clock: Rc<dyn Clock>) -> Self {
        Self {
            clock,
            queue: BTreeMap::new(),
            index: HashMap::new(),
            next_id: 0,
            next_seq: 0,
            executing: None,
        }
    }

    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    /// Run `callback` once, `delay` from now.
    pub fn schedule_once<F>(&mut self, delay: Duration, callback: F) -> EventId
    where
        F: FnOnce(&mut C) + 'static,
    {
        let id = self.allocate_id();
        let deadline = self.now() + delay;
        self.insert(id, deadline, Callback::Once(Box::new(callback)));
        id
    }

    /// Run `callback` after `delay`, then every `period` measured from the
    /// previous deadline. Periods below [`MIN_PERIOD`] are raised to it.
    pub fn schedule_periodic<F>(&mut self, delay: Duration, period: Duration, callback: F) -> EventId
    where
        F: FnMut(&mut C) + 'static,
    {
        let id = self.allocate_id();
        let deadline = self.now() + delay;
        let period = period.max(MIN_PERIOD);
        self.insert(id, deadline, Callback::Periodic(period, Box::new(callback)));
        id
    }

    /// Cancel an event. Returns whether a pending event was removed.
    ///
    /// Unknown, fired and already-cancelled handles are ignored. Cancelling
    /// the event whose callback is running stops it from being rescheduled.
    pub fn cancel(&mut self, id: EventId) -> bool {
        if let Some(key) = self.index.remove(&id) {
            self.queue.remove(&key);
            return true;
        }
        if let Some(executing) = self.executing.as_mut().filter(|e| e.id == id) {
            executing.cancelled = true;
        }
        false
    }

    pub fn is_pending(&self, id: EventId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.queue.keys().next().map(|(deadline, _)| *deadline)
    }

    /// Time until the next deadline; zero if it has passed.
    pub fn time_until_next(&self) -> Option<Duration> {
        self.next_deadline()
            .map(|deadline| deadline.saturating_duration_since(self.now()))
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    fn allocate_id(&mut self) -> EventId {
        let id = EventId(self.next_id);
        self.next_id += 1;
        id
    }

    fn insert(&mut self, id: EventId, deadline: Instant, callback: Callback<C>) {
        let key = (deadline, self.next_seq);
        self.next_seq += 1;
        self.queue.insert(key, (id, callback));
        self.index.insert(id, key);
    }

    fn pop_expired(&mut self, now: Instant) -> Option<(Instant, EventId, Callback<C>)> {
        let entry = self.queue.first_entry()?;
        if entry.key().0 > now {
            return None;
        }
        let ((deadline, _), (id, callback)) = entry.remove_entry();
        self.index.remove(&id);
        Some((deadline, id, callback))
    }
}

impl<C: AsMut<Scheduler<C>>> Scheduler<C> {
    /// Run every event due at the time of the call, in deadline order.
    /// Events scheduled by callbacks with a deadline not after that time run
    /// in the same pass. Returns the number of callbacks run.
    pub fn fire_expired(ctx: &mut C) -> usize {
        let now = ctx.as_mut().now();
        let mut fired = 0;
        while let Some((deadline, id, callback)) = ctx.as_mut().pop_expired(now) {
            ctx.as_mut().executing = Some(Executing {
                id,
                cancelled: false,
            });
            match callback {
                Callback::Once(f) => {
                    f(&mut *ctx);
                    ctx.as_mut().executing = None;
                }
                Callback::Periodic(period, mut f) => {
                    f(&mut *ctx);
                    let scheduler = ctx.as_mut();
                    let cancelled = scheduler.executing.take().is_some_and(|e| e.cancelled);
                    if !cancelled {
                        scheduler.insert(id, deadline + period, Callback::Periodic(period, f));
                    }
                }
            }
            fired += 1;
        }
        fired
    }
}

impl<C> fmt::Debug for Scheduler<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("pending", &self.queue.len())
            .field("next_deadline", &self.next_deadline())
            .finish()
    }
}

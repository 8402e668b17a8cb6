//! The face: one connection to a forwarder and the single-threaded loop that
//! drives it.
//!
//! Everything happens on the thread that calls [`Face::process_events`]:
//! scheduled events fire, inbound elements are decoded, Data and Nacks
//! resolve pending Interests, Interests reach registered prefixes. Callbacks
//! receive `&mut Face` and may express, register, cancel or shut down.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::clock::{Clock, SystemClock};
use crate::config::FaceConfig;
use crate::mgmt::{ArgumentError, CommandOptions, ControlParameters, StandardCommand};
use crate::name::Name;
use crate::pit::{
    InterestHandler, InterestMatcher, PendingInterestId, PendingInterestTable, PrefixMatcher,
};
use crate::prefix::{RegisteredPrefixId, RegisteredPrefixTable, RegistrationStatus, Removal};
use crate::protocol::{Data, Interest, Nack, Packet};
use crate::scheduler::{EventId, Scheduler};
use crate::signer::{DigestSigner, Signer, SignerError, SigningInfo};
use crate::tlv::{self, Element, EncodingError};
use crate::transport::{Transport, TransportError};

#[derive(Debug, thiserror::Error)]
pub enum FaceError {
    #[error("face is already processing events")]
    AlreadyRunning,
    #[error("face has been shut down")]
    Stopped,
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("malformed element: {0}")]
    Encoding(#[from] EncodingError),
    #[error(transparent)]
    Signer(#[from] SignerError),
    #[error("invalid command parameters: {0}")]
    InvalidCommand(#[from] ArgumentError),
    #[error("{callback} callback panicked: {message}")]
    CallbackPanicked {
        callback: &'static str,
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceState {
    Idle,
    Running,
    ShuttingDown,
    /// Terminal.
    Stopped,
}

/// How long [`Face::process_events`] runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Until [`Face::shutdown`] is called or the transport fails.
    UntilShutdown,
    /// At most this long, then back to [`FaceState::Idle`].
    For(Duration),
    /// Handle what is already available, then return.
    Poll,
}

type ErrorHandler = Box<dyn FnMut(&FaceError)>;

pub struct Face {
    transport: Box<dyn Transport>,
    clock: Rc<dyn Clock>,
    scheduler: Scheduler<Face>,
    pit: PendingInterestTable<Face>,
    prefixes: RegisteredPrefixTable<Face>,
    matcher: Box<dyn InterestMatcher>,
    signer: Box<dyn Signer>,
    config: FaceConfig,
    state: FaceState,
    shutdown_requested: bool,
    error_handler: ErrorHandler,
}

pub struct FaceBuilder {
    transport: Box<dyn Transport>,
    clock: Option<Rc<dyn Clock>>,
    signer: Option<Box<dyn Signer>>,
    matcher: Option<Box<dyn InterestMatcher>>,
    config: FaceConfig,
}

impl FaceBuilder {
    pub fn clock(mut self, clock: Rc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn signer(mut self, signer: impl Signer + 'static) -> Self {
        self.signer = Some(Box::new(signer));
        self
    }

    /// Replace the default [`PrefixMatcher`].
    pub fn matcher(mut self, matcher: impl InterestMatcher + 'static) -> Self {
        self.matcher = Some(Box::new(matcher));
        self
    }

    pub fn config(mut self, config: FaceConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Face {
        let clock = self.clock.unwrap_or_else(|| Rc::new(SystemClock));
        Face {
            transport: self.transport,
            scheduler: Scheduler::new(Rc::clone(&clock)),
            clock,
            pit: PendingInterestTable::new(self.config.default_interest_lifetime()),
            prefixes: RegisteredPrefixTable::new(),
            matcher: self.matcher.unwrap_or_else(|| Box::new(PrefixMatcher)),
            signer: self.signer.unwrap_or_else(|| Box::new(DigestSigner::new())),
            config: self.config,
            state: FaceState::Idle,
            shutdown_requested: false,
            error_handler: Box::new(|error: &FaceError| tracing::warn!(%error, "face error")),
        }
    }
}

impl AsMut<Scheduler<Face>> for Face {
    fn as_mut(&mut self) -> &mut Scheduler<Face> {
        &mut self.scheduler
    }
}

impl Face {
    /// Face with the system clock, digest signing and default config.
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self::builder(transport).build()
    }

    pub fn builder(transport: impl Transport + 'static) -> FaceBuilder {
        FaceBuilder {
            transport: Box::new(transport),
            clock: None,
            signer: None,
            matcher: None,
            config: FaceConfig::default(),
        }
    }

    pub fn state(&self) -> FaceState {
        self.state
    }

    pub fn config(&self) -> &FaceConfig {
        &self.config
    }

    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    /// Command options from this face's config.
    pub fn command_options(&self) -> CommandOptions {
        CommandOptions::from_config(&self.config)
    }

    /// Side channel for non-fatal errors: dropped malformed elements and
    /// panicking callbacks. Defaults to a `tracing` warning.
    pub fn set_error_handler(&mut self, handler: impl FnMut(&FaceError) + 'static) {
        self.error_handler = Box::new(handler);
    }

    // Consumer side.

    /// Send an Interest and track it until Data, Nack or timeout.
    pub fn express_interest(
        &mut self,
        interest: Interest,
        handler: impl InterestHandler<Face> + 'static,
    ) -> Result<PendingInterestId, FaceError> {
        if self.state == FaceState::Stopped {
            return Err(FaceError::Stopped);
        }
        self.transport.send(&interest.encode())?;
        let now = self.clock.now();
        let (id, lifetime) = self.pit.insert(interest, Box::new(handler), now);
        let event = self
            .scheduler
            .schedule_once(lifetime, move |face: &mut Face| face.expire_interest(id));
        self.pit.set_timeout_event(id, event);
        Ok(id)
    }

    /// Forget a pending Interest. None of its callbacks will run. Returns
    /// false if it was already resolved.
    pub fn remove_pending_interest(&mut self, id: PendingInterestId) -> bool {
        let Some(entry) = self.pit.remove(id) else {
            return false;
        };
        if let Some(event) = entry.timeout_event() {
            self.scheduler.cancel(event);
        }
        true
    }

    pub fn is_pending(&self, id: PendingInterestId) -> bool {
        self.pit.contains(id)
    }

    pub fn pending_interest_count(&self) -> usize {
        self.pit.len()
    }

    fn expire_interest(&mut self, id: PendingInterestId) {
        let Some(entry) = self.pit.remove(id) else {
            return;
        };
        let (interest, handler) = entry.into_parts();
        self.guarded("timeout", |face| handler.on_timeout(face, &interest));
    }

    /// Resolve the earliest pending Interest `data` satisfies. Returns
    /// whether one was found.
    fn satisfy_pending(&mut self, data: &Data) -> bool {
        let Some((_, entry)) = self.pit.take_satisfied(data, self.matcher.as_ref()) else {
            tracing::trace!(name = %data.name, "unsolicited data");
            return false;
        };
        if let Some(event) = entry.timeout_event() {
            self.scheduler.cancel(event);
        }
        let (interest, handler) = entry.into_parts();
        self.guarded("data", |face| handler.on_data(face, &interest, data));
        true
    }

    fn nack_pending(&mut self, nack: &Nack) -> bool {
        let Some((_, entry)) = self.pit.take_nacked(nack) else {
            tracing::trace!(name = %nack.interest.name, "unsolicited nack");
            return false;
        };
        if let Some(event) = entry.timeout_event() {
            self.scheduler.cancel(event);
        }
        let (interest, handler) = entry.into_parts();
        self.guarded("nack", |face| handler.on_nack(face, &interest, nack));
        true
    }

    // Producer side.

    /// Deliver Interests under `prefix` without telling the forwarder.
    /// Active immediately.
    pub fn set_interest_filter(
        &mut self,
        prefix: Name,
        on_interest: impl FnMut(&mut Face, &Name, &Interest) + 'static,
    ) -> RegisteredPrefixId {
        self.prefixes
            .insert(prefix, Box::new(on_interest), None, false)
    }

    /// Register `prefix` with the forwarder (`rib/register`) and deliver
    /// matching Interests once it succeeds. On failure the entry is removed
    /// and `on_failure` gets the prefix and a reason.
    pub fn register_prefix(
        &mut self,
        prefix: Name,
        on_interest: impl FnMut(&mut Face, &Name, &Interest) + 'static,
        on_failure: impl FnOnce(&mut Face, &Name, &str) + 'static,
    ) -> Result<RegisteredPrefixId, FaceError> {
        let id = self.prefixes.insert(
            prefix.clone(),
            Box::new(on_interest),
            Some(Box::new(on_failure)),
            true,
        );
        let options = self.command_options();
        let started = self.start_command(
            StandardCommand::RibRegister,
            ControlParameters::new().with_name(prefix),
            move |face: &mut Face, _| {
                if face.prefixes.activate(id) {
                    if let Some(prefix) = face.prefixes.prefix(id) {
                        tracing::debug!(%prefix, "prefix registered");
                    }
                }
            },
            move |face: &mut Face, error| {
                if let Some((prefix, Some(on_failure))) = face.prefixes.fail(id) {
                    on_failure(face, &prefix, &error.to_string());
                }
            },
            &options,
        );
        if let Err(e) = started {
            self.prefixes.purge(id);
            return Err(e);
        }
        Ok(id)
    }

    /// Stop delivering to `id` now. Forwarder registrations are withdrawn
    /// with `rib/unregister`; the entry is purged when that completes,
    /// whatever the outcome. Unknown ids are ignored.
    pub fn unregister_prefix(&mut self, id: RegisteredPrefixId) -> Result<(), FaceError> {
        let prefix = match self.prefixes.begin_removal(id) {
            None | Some(Removal::Done) => return Ok(()),
            Some(Removal::Unregister(prefix)) => prefix,
        };
        let options = self.command_options();
        let started = self.start_command(
            StandardCommand::RibUnregister,
            ControlParameters::new().with_name(prefix),
            move |face: &mut Face, _| {
                face.prefixes.purge(id);
            },
            move |face: &mut Face, error| {
                tracing::debug!(%error, "unregister failed, dropping entry anyway");
                face.prefixes.purge(id);
            },
            &options,
        );
        if started.is_err() {
            self.prefixes.purge(id);
        }
        started.map(|_| ())
    }

    pub fn prefix_status(&self, id: RegisteredPrefixId) -> Option<RegistrationStatus> {
        self.prefixes.status(id)
    }

    pub fn registered_prefix_count(&self) -> usize {
        self.prefixes.len()
    }

    /// Deliver an Interest to every active entry whose prefix covers its
    /// name. Returns how many handlers ran.
    pub fn dispatch_interest(&mut self, interest: &Interest) -> usize {
        let mut delivered = 0;
        for id in self.prefixes.matching(&interest.name) {
            // An earlier handler may have unregistered this one.
            if self.prefixes.status(id) != Some(RegistrationStatus::Active) {
                continue;
            }
            let Some((prefix, mut handler)) = self.prefixes.take_handler(id) else {
                continue;
            };
            self.guarded("interest", |face| handler(face, &prefix, interest));
            self.prefixes.restore_handler(id, handler);
            delivered += 1;
        }
        if delivered == 0 {
            tracing::trace!(name = %interest.name, "no handler for interest");
        }
        delivered
    }

    /// Send Data. Unsigned Data is digest-signed first.
    pub fn put(&mut self, mut data: Data) -> Result<(), FaceError> {
        if self.state == FaceState::Stopped {
            return Err(FaceError::Stopped);
        }
        if data.signature.is_none() {
            self.signer.sign_data(&mut data, &SigningInfo::Digest)?;
        }
        self.transport.send(&data.encode())?;
        Ok(())
    }

    pub fn put_nack(&mut self, nack: &Nack) -> Result<(), FaceError> {
        if self.state == FaceState::Stopped {
            return Err(FaceError::Stopped);
        }
        self.transport.send(&nack.encode())?;
        Ok(())
    }

    pub(crate) fn sign_command(&mut self, name: Name, info: &SigningInfo) -> Result<Name, FaceError> {
        Ok(self.signer.sign_command(name, info)?)
    }

    // Timers.

    pub fn schedule_event(
        &mut self,
        delay: Duration,
        callback: impl FnOnce(&mut Face) + 'static,
    ) -> EventId {
        self.scheduler
            .schedule_once(delay, move |face: &mut Face| face.guarded("event", callback))
    }

    pub fn schedule_periodic_event(
        &mut self,
        delay: Duration,
        period: Duration,
        mut callback: impl FnMut(&mut Face) + 'static,
    ) -> EventId {
        self.scheduler.schedule_periodic(delay, period, move |face: &mut Face| {
            face.guarded("periodic event", &mut callback)
        })
    }

    /// Cancel a scheduled event. Idempotent.
    pub fn cancel_event(&mut self, id: EventId) -> bool {
        self.scheduler.cancel(id)
    }

    // Event loop.

    /// Run the loop. Returns when `mode` says so, after [`shutdown`](Self::shutdown),
    /// or on transport failure (which also stops the face).
    pub fn process_events(&mut self, mode: RunMode) -> Result<(), FaceError> {
        match self.state {
            FaceState::Running | FaceState::ShuttingDown => return Err(FaceError::AlreadyRunning),
            FaceState::Stopped => return Err(FaceError::Stopped),
            FaceState::Idle => {}
        }
        self.state = FaceState::Running;
        let run_timer = match mode {
            RunMode::For(limit) => Some(
                self.scheduler
                    .schedule_once(limit, |face: &mut Face| face.end_run()),
            ),
            RunMode::UntilShutdown | RunMode::Poll => None,
        };

        let result = self.run(mode);

        if let Some(timer) = run_timer {
            self.scheduler.cancel(timer);
        }
        if self.shutdown_requested {
            self.transport.close();
            self.state = FaceState::Stopped;
        } else {
            self.state = FaceState::Idle;
        }
        result
    }

    fn run(&mut self, mode: RunMode) -> Result<(), FaceError> {
        loop {
            Scheduler::fire_expired(self);
            if self.state != FaceState::Running {
                return Ok(());
            }
            let wait = match mode {
                RunMode::Poll => Some(Duration::ZERO),
                RunMode::UntilShutdown | RunMode::For(_) => self.scheduler.time_until_next(),
            };
            match self.transport.recv_timeout(wait) {
                Ok(Some(element)) => self.receive_element(&element),
                Ok(None) if mode == RunMode::Poll => {
                    Scheduler::fire_expired(self);
                    return Ok(());
                }
                Ok(None) => {}
                Err(e) => {
                    self.shutdown_requested = true;
                    return Err(e.into());
                }
            }
            if self.state != FaceState::Running {
                return Ok(());
            }
        }
    }

    fn end_run(&mut self) {
        if self.state == FaceState::Running {
            self.state = FaceState::ShuttingDown;
        }
    }

    /// Stop the face. From a callback, the current run unwinds after that
    /// callback returns; outside a run the face stops at once. Pending
    /// Interests and events stay in place and can still be cancelled.
    pub fn shutdown(&mut self) {
        self.shutdown_requested = true;
        match self.state {
            FaceState::Running => self.state = FaceState::ShuttingDown,
            FaceState::Idle => {
                self.transport.close();
                self.state = FaceState::Stopped;
            }
            FaceState::ShuttingDown | FaceState::Stopped => {}
        }
    }

    /// Handle one inbound top-level element. Malformed elements are reported
    /// through the error handler and dropped; unknown types are ignored.
    pub fn receive_element(&mut self, wire: &[u8]) {
        let packet = Element::parse(wire).and_then(|element| {
            let packet = Packet::from_element(&element)?;
            if packet.is_none() {
                tracing::trace!(
                    tlv_type = element.tlv_type(),
                    type_name = tlv::type_name(element.tlv_type()),
                    "ignoring element"
                );
            }
            Ok(packet)
        });
        match packet {
            Ok(Some(Packet::Interest(interest))) => {
                self.dispatch_interest(&interest);
            }
            Ok(Some(Packet::Data(data))) => {
                self.satisfy_pending(&data);
            }
            Ok(Some(Packet::Nack(nack))) => {
                self.nack_pending(&nack);
            }
            Ok(None) => {}
            Err(e) => self.report(FaceError::Encoding(e)),
        }
    }

    fn report(&mut self, error: FaceError) {
        (self.error_handler)(&error);
    }

    /// Run a user callback; a panic is reported instead of unwinding
    /// through the loop.
    fn guarded(&mut self, callback: &'static str, f: impl FnOnce(&mut Face)) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| f(&mut *self)));
        if let Err(payload) = outcome {
            self.report(FaceError::CallbackPanicked {
                callback,
                message: panic_message(payload.as_ref()),
            });
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

impl Drop for Face {
    fn drop(&mut self) {
        self.transport.close();
    }
}

impl fmt::Debug for Face {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Face")
            .field("state", &self.state)
            .field("pending_interests", &self.pit.len())
            .field("registered_prefixes", &self.prefixes.len())
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::mgmt::ControlResponse;
    use crate::pit::Callbacks;
    use crate::protocol::NackReason;
    use crate::transport::ChannelTransport;
    use std::cell::RefCell;

    type Log = Rc<RefCell<Vec<String>>>;

    struct Harness {
        face: Face,
        forwarder: ChannelTransport,
        clock: Rc<ManualClock>,
        log: Log,
    }

    fn harness() -> Harness {
        let (local, forwarder) = ChannelTransport::pair();
        let clock = Rc::new(ManualClock::new());
        let face = Face::builder(local).clock(clock.clone()).build();
        Harness {
            face,
            forwarder,
            clock,
            log: Rc::default(),
        }
    }

    fn name(uri: &str) -> Name {
        uri.parse().unwrap()
    }

    fn recorder(log: &Log, tag: &'static str) -> Callbacks<Face> {
        let (d, n, t) = (log.clone(), log.clone(), log.clone());
        Callbacks::new(move |_: &mut Face, _: &Interest, data: &Data| {
            d.borrow_mut().push(format!("{tag} data {}", data.name))
        })
        .on_nack(move |_: &mut Face, _: &Interest, nack: &Nack| {
            n.borrow_mut().push(format!("{tag} nack {}", nack.reason))
        })
        .on_timeout(move |_: &mut Face, _: &Interest| t.borrow_mut().push(format!("{tag} timeout")))
    }

    impl Harness {
        fn inject(&mut self, wire: Vec<u8>) {
            self.forwarder.send(&wire).unwrap();
        }

        fn sent(&mut self) -> Vec<Vec<u8>> {
            let mut out = Vec::new();
            while let Some(wire) = self.forwarder.recv_timeout(Some(Duration::ZERO)).unwrap() {
                out.push(wire);
            }
            out
        }

        fn poll(&mut self) {
            self.face.process_events(RunMode::Poll).unwrap();
        }

        fn entries(&self) -> Vec<String> {
            self.log.borrow().clone()
        }
    }

    #[test]
    fn data_resolves_interest_once() {
        let mut h = harness();
        let interest = Interest::new(name("/x")).with_lifetime(Duration::from_millis(100));
        h.face.express_interest(interest, recorder(&h.log, "x")).unwrap();
        assert_eq!(h.sent().len(), 1);

        h.inject(Data::new(name("/x/1")).encode());
        h.poll();
        h.clock.advance(Duration::from_millis(200));
        h.poll();
        assert_eq!(h.entries(), vec!["x data /x/1"]);
        assert_eq!(h.face.pending_interest_count(), 0);
    }

    #[test]
    fn timeout_fires_once_after_lifetime() {
        let mut h = harness();
        let interest = Interest::new(name("/slow")).with_lifetime(Duration::from_millis(100));
        h.face.express_interest(interest, recorder(&h.log, "slow")).unwrap();
        h.clock.advance(Duration::from_millis(99));
        h.poll();
        assert!(h.entries().is_empty());
        h.clock.advance(Duration::from_millis(1));
        h.poll();
        h.clock.advance(Duration::from_secs(10));
        h.poll();
        assert_eq!(h.entries(), vec!["slow timeout"]);
    }

    #[test]
    fn default_lifetime_used_when_unset() {
        let mut h = harness();
        h.face
            .express_interest(Interest::new(name("/d")), recorder(&h.log, "d"))
            .unwrap();
        h.clock.advance(Duration::from_millis(3999));
        h.poll();
        assert!(h.entries().is_empty());
        h.clock.advance(Duration::from_millis(1));
        h.poll();
        assert_eq!(h.entries(), vec!["d timeout"]);
    }

    #[test]
    fn data_beats_due_timeout() {
        let mut h = harness();
        let interest = Interest::new(name("/race")).with_lifetime(Duration::from_millis(10));
        h.face.express_interest(interest, recorder(&h.log, "r")).unwrap();
        h.clock.advance(Duration::from_millis(10));
        // The timeout is due, but the Data gets there first.
        h.face.receive_element(&Data::new(name("/race")).encode());
        h.poll();
        assert_eq!(h.entries(), vec!["r data /race"]);
    }

    #[test]
    fn removed_interest_never_calls_back() {
        let mut h = harness();
        let id = h
            .face
            .express_interest(
                Interest::new(name("/gone")).with_lifetime(Duration::from_millis(5)),
                recorder(&h.log, "gone"),
            )
            .unwrap();
        assert!(h.face.remove_pending_interest(id));
        assert!(!h.face.remove_pending_interest(id));
        h.inject(Data::new(name("/gone")).encode());
        h.clock.advance(Duration::from_millis(50));
        h.poll();
        assert!(h.entries().is_empty());
    }

    #[test]
    fn one_data_satisfies_first_of_two() {
        let mut h = harness();
        let first = h
            .face
            .express_interest(Interest::new(name("/x")), recorder(&h.log, "h1"))
            .unwrap();
        let second = h
            .face
            .express_interest(Interest::new(name("/x")), recorder(&h.log, "h2"))
            .unwrap();
        h.inject(Data::new(name("/x")).encode());
        h.poll();
        assert_eq!(h.entries(), vec!["h1 data /x"]);
        assert!(!h.face.is_pending(first));
        assert!(h.face.is_pending(second));
    }

    #[test]
    fn nack_resolves_matching_nonce() {
        let mut h = harness();
        let interest = Interest::new(name("/n")).with_nonce(77);
        h.face
            .express_interest(interest.clone(), recorder(&h.log, "n"))
            .unwrap();
        h.inject(Nack::new(interest, NackReason::NoRoute).encode());
        h.poll();
        assert_eq!(h.entries(), vec!["n nack NoRoute"]);
    }

    #[test]
    fn interest_filter_delivers_to_ancestors() {
        let mut h = harness();
        let log = h.log.clone();
        h.face.set_interest_filter(name("/a/b"), move |_, prefix, interest| {
            log.borrow_mut().push(format!("{prefix} got {}", interest.name))
        });
        h.inject(Interest::new(name("/a/b/c")).encode());
        h.inject(Interest::new(name("/a")).encode());
        h.poll();
        assert_eq!(h.entries(), vec!["/a/b got /a/b/c"]);
    }

    #[test]
    fn producer_answers_from_handler() {
        let mut h = harness();
        h.face.set_interest_filter(name("/p"), |face, _, interest| {
            let data = Data::new(interest.name.clone()).with_content(b"hi".to_vec());
            face.put(data).unwrap();
        });
        h.inject(Interest::new(name("/p/q")).encode());
        h.poll();
        let sent = h.sent();
        assert_eq!(sent.len(), 1);
        let data = Data::decode(&sent[0]).unwrap();
        assert_eq!(data.name, name("/p/q"));
        assert!(crate::signer::DigestSigner::verify_data(&data));
    }

    #[test]
    fn malformed_and_unknown_elements_do_not_stop_the_loop() {
        let mut h = harness();
        let errors = Rc::new(RefCell::new(0));
        let counter = errors.clone();
        h.face.set_error_handler(move |e| {
            assert!(matches!(e, FaceError::Encoding(_)));
            *counter.borrow_mut() += 1;
        });
        h.face
            .express_interest(Interest::new(name("/ok")), recorder(&h.log, "ok"))
            .unwrap();
        h.inject(vec![0x06, 0x05, 0x07]);
        h.inject(Element::new(200, vec![1, 2]).encode());
        h.inject(Data::new(name("/ok")).encode());
        h.poll();
        assert_eq!(*errors.borrow(), 1);
        assert_eq!(h.entries(), vec!["ok data /ok"]);
    }

    #[test]
    fn panicking_callback_is_reported() {
        let mut h = harness();
        let reported = Rc::new(RefCell::new(Vec::new()));
        let sink = reported.clone();
        h.face.set_error_handler(move |e| sink.borrow_mut().push(e.to_string()));
        h.face
            .express_interest(
                Interest::new(name("/boom")),
                Callbacks::new(|_: &mut Face, _: &Interest, _: &Data| panic!("kaboom")),
            )
            .unwrap();
        h.face
            .express_interest(Interest::new(name("/fine")), recorder(&h.log, "fine"))
            .unwrap();
        h.inject(Data::new(name("/boom")).encode());
        h.inject(Data::new(name("/fine")).encode());
        h.poll();
        assert_eq!(*reported.borrow(), vec!["data callback panicked: kaboom"]);
        assert_eq!(h.entries(), vec!["fine data /fine"]);
        assert_eq!(h.face.pending_interest_count(), 0);
    }

    #[test]
    fn reentrant_run_is_rejected() {
        let mut h = harness();
        let seen = Rc::new(RefCell::new(None));
        let slot = seen.clone();
        h.face.schedule_event(Duration::ZERO, move |face| {
            *slot.borrow_mut() = Some(matches!(
                face.process_events(RunMode::Poll),
                Err(FaceError::AlreadyRunning)
            ));
        });
        h.poll();
        assert_eq!(*seen.borrow(), Some(true));
    }

    #[test]
    fn timed_run_returns_to_idle() {
        let (local, _forwarder) = ChannelTransport::pair();
        let mut face = Face::new(local);
        face.process_events(RunMode::For(Duration::from_millis(20)))
            .unwrap();
        assert_eq!(face.state(), FaceState::Idle);
        face.process_events(RunMode::Poll).unwrap();
    }

    #[test]
    fn shutdown_from_callback_stops_for_good() {
        let mut h = harness();
        let log = h.log.clone();
        h.face.schedule_event(Duration::ZERO, move |face| {
            log.borrow_mut().push("stopping".into());
            face.shutdown();
        });
        let pending = h
            .face
            .express_interest(Interest::new(name("/later")), recorder(&h.log, "later"))
            .unwrap();
        h.face.process_events(RunMode::UntilShutdown).unwrap();
        assert_eq!(h.face.state(), FaceState::Stopped);
        assert!(matches!(
            h.face.process_events(RunMode::Poll),
            Err(FaceError::Stopped)
        ));
        assert!(h.face.remove_pending_interest(pending));
        assert!(matches!(
            h.face.express_interest(Interest::new(name("/no")), recorder(&h.log, "no")),
            Err(FaceError::Stopped)
        ));
        assert_eq!(h.entries(), vec!["stopping"]);
    }

    #[test]
    fn periodic_event_until_cancelled() {
        let mut h = harness();
        let ticks = Rc::new(RefCell::new(0u32));
        let counter = ticks.clone();
        let id = h.face.schedule_periodic_event(
            Duration::from_millis(10),
            Duration::from_millis(10),
            move |_| *counter.borrow_mut() += 1,
        );
        for _ in 0..5 {
            h.clock.advance(Duration::from_millis(10));
            h.poll();
        }
        assert!(h.face.cancel_event(id));
        assert!(!h.face.cancel_event(id));
        h.clock.advance(Duration::from_millis(100));
        h.poll();
        assert_eq!(*ticks.borrow(), 5);
    }

    fn register_reply(request: &Interest, face_id: u64) -> Vec<u8> {
        let body = ControlParameters::new()
            .with_name(name("/app"))
            .with_face_id(face_id)
            .with_origin(0)
            .with_cost(0)
            .with_flags(1);
        let response = ControlResponse::new(200, "OK").with_body(body.to_element());
        Data::new(request.name.clone())
            .with_content(response.encode())
            .encode()
    }

    #[test]
    fn register_prefix_activates_on_success() {
        let mut h = harness();
        let log = h.log.clone();
        let id = h
            .face
            .register_prefix(
                name("/app"),
                move |_, _, interest| log.borrow_mut().push(format!("got {}", interest.name)),
                |_, _, _| panic!("registration should succeed"),
            )
            .unwrap();
        assert_eq!(h.face.prefix_status(id), Some(RegistrationStatus::PendingRegistration));

        h.inject(Interest::new(name("/app/early")).encode());
        h.poll();
        assert!(h.entries().is_empty());

        let sent = h.sent();
        let command = Interest::decode(sent.last().unwrap()).unwrap();
        assert!(name("/localhost/nfd/rib/register").is_prefix_of(&command.name));
        h.inject(register_reply(&command, 260));
        h.inject(Interest::new(name("/app/x")).encode());
        h.poll();
        assert_eq!(h.face.prefix_status(id), Some(RegistrationStatus::Active));
        assert_eq!(h.entries(), vec!["got /app/x"]);
    }

    #[test]
    fn register_prefix_failure_removes_entry() {
        let mut h = harness();
        let log = h.log.clone();
        let id = h
            .face
            .register_prefix(
                name("/app"),
                |_, _, _| {},
                move |_, prefix, reason| log.borrow_mut().push(format!("{prefix}: {reason}")),
            )
            .unwrap();
        let command = Interest::decode(&h.sent()[0]).unwrap();
        let response = ControlResponse::new(403, "unauthorized");
        h.inject(
            Data::new(command.name)
                .with_content(response.encode())
                .encode(),
        );
        h.poll();
        assert_eq!(h.entries(), vec!["/app: 403 unauthorized"]);
        assert_eq!(h.face.prefix_status(id), None);
    }

    #[test]
    fn register_prefix_nacked_removes_entry() {
        let mut h = harness();
        let log = h.log.clone();
        let id = h
            .face
            .register_prefix(
                name("/app"),
                |_, _, _| {},
                move |_, prefix, reason| log.borrow_mut().push(format!("{prefix}: {reason}")),
            )
            .unwrap();
        let command = Interest::decode(&h.sent()[0]).unwrap();
        h.inject(Nack::new(command, NackReason::NoRoute).encode());
        h.poll();
        assert_eq!(h.entries(), vec!["/app: network Nack received (NoRoute)"]);
        assert_eq!(h.face.prefix_status(id), None);
        assert_eq!(h.face.pending_interest_count(), 0);
    }

    #[test]
    fn unregister_stops_delivery_before_confirmation() {
        let mut h = harness();
        let log = h.log.clone();
        let id = h
            .face
            .register_prefix(
                name("/app"),
                move |_, _, interest| log.borrow_mut().push(format!("got {}", interest.name)),
                |_, _, _| {},
            )
            .unwrap();
        let register = Interest::decode(&h.sent()[0]).unwrap();
        h.inject(register_reply(&register, 260));
        h.poll();

        h.face.unregister_prefix(id).unwrap();
        assert_eq!(h.face.prefix_status(id), Some(RegistrationStatus::PendingRemoval));
        h.inject(Interest::new(name("/app/late")).encode());
        h.poll();
        assert!(h.entries().is_empty());

        let unregister = Interest::decode(&h.sent()[0]).unwrap();
        assert!(name("/localhost/nfd/rib/unregister").is_prefix_of(&unregister.name));
        // Timeout still purges.
        h.clock.advance(Duration::from_secs(10));
        h.poll();
        assert_eq!(h.face.prefix_status(id), None);
        assert_eq!(h.face.registered_prefix_count(), 0);
    }

    #[test]
    fn local_filter_unregisters_without_command() {
        let mut h = harness();
        let id = h.face.set_interest_filter(name("/local"), |_, _, _| {});
        h.face.unregister_prefix(id).unwrap();
        assert_eq!(h.face.prefix_status(id), None);
        assert!(h.sent().is_empty());
    }

    #[test]
    fn transport_failure_stops_face() {
        let (local, forwarder) = ChannelTransport::pair();
        let mut face = Face::new(local);
        drop(forwarder);
        assert!(matches!(
            face.process_events(RunMode::UntilShutdown),
            Err(FaceError::Transport(TransportError::Closed))
        ));
        assert_eq!(face.state(), FaceState::Stopped);
    }
}

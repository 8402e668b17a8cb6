//! Named-data networking client engine.
//! Host-driven: the host supplies a transport and calls [`Face::process_events`];
//! no threads or sockets of its own.

pub mod clock;
pub mod config;
pub mod face;
pub mod mgmt;
pub mod name;
pub mod pit;
pub mod prefix;
pub mod protocol;
pub mod scheduler;
pub mod signer;
pub mod tlv;
pub mod transport;
pub mod wire;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::FaceConfig;
pub use face::{Face, FaceBuilder, FaceError, FaceState, RunMode};
pub use name::{Component, Name, NameError};
pub use pit::{Callbacks, InterestHandler, InterestMatcher, PendingInterestId, PrefixMatcher};
pub use prefix::{RegisteredPrefixId, RegistrationStatus};
pub use protocol::{Data, Interest, MetaInfo, Nack, NackReason, Packet, Selectors, Signature};
pub use scheduler::{EventId, Scheduler};
pub use signer::{DigestSigner, Signer, SignerError, SigningInfo};
pub use tlv::{Element, EncodingError};
pub use transport::{ChannelTransport, Transport, TransportError};
pub use wire::{ElementBuffer, FrameDecodeError};

//! MChat: a peer-to-peer LAN chat engine over IPv4 UDP multicast.
//!
//! Nodes join named channels (a multicast group + port pair), announce
//! presence on a well-known common channel, exchange short text messages on
//! whichever channel they're currently connected to, and discover other
//! channels through periodic description beacons. See [`engine::MchatEngine`]
//! for the entry point.

pub mod channel;
pub mod config;
pub mod engine;
pub mod error;
pub mod message;
pub mod peer;
pub mod proto;
pub mod socket;
pub mod time;
pub mod worker;

pub use channel::{Channel, ChannelInfo, ChannelRegistry};
pub use config::MchatConfig;
pub use engine::MchatEngine;
pub use error::MchatError;
pub use message::Message;
pub use peer::{Peer, PeerInfo, PeerTable};
pub use proto::{HeaderKind, MessageKind, ParsedRecord};

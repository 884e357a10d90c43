//! `MchatError`: the single error type every public async method returns.
//!
//! Grounded on `src/crypto.rs`'s `CryptoError` — a flat `thiserror` enum with
//! `#[from]` conversions for the one or two external error types it actually
//! crosses (here, `std::io::Error` from socket setup).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MchatError {
    #[error("not connected to a channel")]
    NotConnected,

    #[error("text-send worker is not running")]
    WorkerNotRunning,

    #[error("message too large: {len} bytes (max 32768)")]
    MessageTooLarge { len: usize },

    #[error("message body is empty")]
    EmptyMessage,

    #[error("channel not found: {0}")]
    ChannelNotFound(String),

    #[error("the default #mchat channel cannot be removed")]
    ChannelIsDefault,

    #[error("cannot remove the channel currently connected to")]
    ChannelInUse,

    #[error("socket error: {0}")]
    Socket(#[from] std::io::Error),

    #[error("configuration file loading is not yet supported")]
    ConfigUnsupported,

    #[error("nickname too long: requested {requested}, buffer holds {actual}")]
    NicknameTooLong { requested: usize, actual: usize },
}

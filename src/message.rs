//! Owned message representation, per SPEC_FULL §3.1.
//!
//! The parser's [`crate::proto::ParsedRecord`] borrows from the caller's
//! receive buffer, which doesn't outlive one iteration of a worker's receive
//! loop. `Message` is the copied-out shape that crosses the single-slot
//! rendezvous into `recv_message` — nickname/body as owned buffers, metadata
//! as plain fields, the same split the original source draws between
//! `mchat_parser` (borrowed, internal) and `mchat_message_t` (owned, public).

use std::net::Ipv4Addr;

use crate::proto::{HeaderKind, ParsedRecord};
use crate::time::now_micros;

#[derive(Debug, Clone)]
pub struct Message {
    pub nickname: String,
    pub body: Vec<u8>,
    pub timestamp: u64,
    pub source_address: Ipv4Addr,
}

impl Message {
    /// Copy a validated TEXT record out into an owned `Message`, stamping
    /// arrival time and source address (the parser doesn't know either).
    pub fn from_record(record: &ParsedRecord<'_>, source_address: Ipv4Addr) -> Self {
        Self {
            nickname: record.headers.get_str(HeaderKind::Nickname).unwrap_or("").to_string(),
            body: record.body.to_vec(),
            timestamp: now_micros(),
            source_address,
        }
    }
}

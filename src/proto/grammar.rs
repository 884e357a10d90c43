//! Wire grammar tables — message kinds, header kinds, and the required-header
//! closure that the validator (`super::parser`) enforces.
//!
//! The original C source generated these tables at compile time via an
//! X-macro header (`mchatv1_proto.h`). Here they're just a closed enum plus a
//! couple of `match`-driven lookups — tagged-variant dispatch over a
//! function-pointer table.

use std::fmt;

/// Protocol version advertised on the wire by this implementation.
pub const PROTOCOL_VERSION: (u16, u16) = (1, 0);

/// Closed set of message kinds. `None` is the sentinel used when the wire
/// token doesn't match any known kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    None,
    Text,
    File,
    Ping,
    Cdsc,
}

impl MessageKind {
    /// Match a 4-character ASCII wire token case-sensitively (the wire token
    /// is always emitted uppercase; the parser only ever sees what it wrote).
    pub fn from_wire(token: &[u8]) -> MessageKind {
        match token {
            b"TEXT" => MessageKind::Text,
            b"FILE" => MessageKind::File,
            b"PING" => MessageKind::Ping,
            b"CDSC" => MessageKind::Cdsc,
            _ => MessageKind::None,
        }
    }

    pub fn wire_token(self) -> &'static str {
        match self {
            MessageKind::None => "NONE",
            MessageKind::Text => "TEXT",
            MessageKind::File => "FILE",
            MessageKind::Ping => "PING",
            MessageKind::Cdsc => "CDSC",
        }
    }

    /// Headers this kind must carry for a record to validate.
    pub fn required_headers(self) -> &'static [HeaderKind] {
        use HeaderKind::*;
        match self {
            MessageKind::None => &[],
            MessageKind::Text => &[Nickname, Length, Channel],
            MessageKind::Ping => &[Nickname, Channel],
            MessageKind::Cdsc => &[Channel, Address, Port],
            MessageKind::File => &[
                Nickname, Length, Filename, Filesum, Chunk, Chunkcount, Chunksum,
            ],
        }
    }

    /// A kind "has a body" iff `Length` is among its required headers.
    pub fn has_body(self) -> bool {
        self.required_headers().contains(&HeaderKind::Length)
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_token())
    }
}

/// Closed set of header kinds, each with a canonical mixed-case wire name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeaderKind {
    Nickname,
    Length,
    Filename,
    Filesum,
    Chunk,
    Chunkcount,
    Chunksum,
    Channel,
    Presence,
    Address,
    Port,
}

/// All header kinds in their canonical declaration order — the order the
/// serializer emits required headers in, for a given message kind.
pub const ALL_HEADERS: &[HeaderKind] = &[
    HeaderKind::Nickname,
    HeaderKind::Length,
    HeaderKind::Filename,
    HeaderKind::Filesum,
    HeaderKind::Chunk,
    HeaderKind::Chunkcount,
    HeaderKind::Chunksum,
    HeaderKind::Channel,
    HeaderKind::Presence,
    HeaderKind::Address,
    HeaderKind::Port,
];

impl HeaderKind {
    pub fn wire_name(self) -> &'static str {
        match self {
            HeaderKind::Nickname => "Nickname",
            HeaderKind::Length => "Length",
            HeaderKind::Filename => "Filename",
            HeaderKind::Filesum => "Filesum",
            HeaderKind::Chunk => "Chunk",
            HeaderKind::Chunkcount => "Chunkcount",
            HeaderKind::Chunksum => "Chunksum",
            HeaderKind::Channel => "Channel",
            HeaderKind::Presence => "Presence",
            HeaderKind::Address => "Address",
            HeaderKind::Port => "Port",
        }
    }

    /// Case-insensitive match against a wire-parsed header name.
    pub fn from_wire_name(name: &[u8]) -> Option<HeaderKind> {
        ALL_HEADERS
            .iter()
            .copied()
            .find(|h| h.wire_name().eq_ignore_ascii_case(&String::from_utf8_lossy(name)))
    }

    /// Maximum accepted value length for this header's validator, if any.
    /// `Length`'s decimal digits aren't length-capped the same way (its value
    /// is parsed as an integer), so it returns `None` here.
    pub fn max_value_len(self) -> Option<usize> {
        match self {
            HeaderKind::Nickname => Some(64),
            HeaderKind::Channel => Some(64),
            HeaderKind::Address => Some(39),
            HeaderKind::Port => Some(5),
            _ => None,
        }
    }
}

impl fmt::Display for HeaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

pub const NOT_CONNECTED_CHANNEL: &str = "<Not Connected>";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_wire_token() {
        for k in [MessageKind::Text, MessageKind::Ping, MessageKind::Cdsc, MessageKind::File] {
            assert_eq!(MessageKind::from_wire(k.wire_token().as_bytes()), k);
        }
    }

    #[test]
    fn unknown_kind_is_none() {
        assert_eq!(MessageKind::from_wire(b"XYZZ"), MessageKind::None);
    }

    #[test]
    fn has_body_matches_length_requirement() {
        assert!(MessageKind::Text.has_body());
        assert!(MessageKind::File.has_body());
        assert!(!MessageKind::Ping.has_body());
        assert!(!MessageKind::Cdsc.has_body());
    }

    #[test]
    fn header_name_lookup_is_case_insensitive() {
        assert_eq!(HeaderKind::from_wire_name(b"nickname"), Some(HeaderKind::Nickname));
        assert_eq!(HeaderKind::from_wire_name(b"NICKNAME"), Some(HeaderKind::Nickname));
        assert_eq!(HeaderKind::from_wire_name(b"bogus"), None);
    }
}

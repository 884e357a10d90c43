//! Wire serializer: engine state + target kind → bytes.
//!
//! Grounded on the original source's `mchatv1_formatter.c`: emission order is
//! the protocol line, then each header required by `kind` in canonical
//! declaration order, then the blank-line terminator, then the body if the
//! kind has one and it's armed. `Address`/`Port` formatters emit nothing when
//! disconnected even though `CDSC` requires them — callers only serialize
//! `CDSC` while connected to a non-default channel.

use std::net::Ipv4Addr;

use super::grammar::{HeaderKind, MessageKind, NOT_CONNECTED_CHANNEL, PROTOCOL_VERSION};

/// Everything a formatter might need to pull a header value from. Built
/// fresh per call from the engine's current (locked) state — no formatter
/// holds a reference back into the engine itself.
pub struct SerializeContext<'a> {
    pub nickname: &'a str,
    pub channel: Option<ConnectedChannel<'a>>,
    pub body: Option<&'a [u8]>,
}

pub struct ConnectedChannel<'a> {
    pub name: &'a str,
    pub address: Ipv4Addr,
    pub port: u16,
}

/// Serialize `kind` using `ctx`. Always succeeds — it's the caller's job to
/// only request kinds that make sense for the current connection state
/// (e.g. don't ask for `CDSC` while disconnected).
pub fn serialize(kind: MessageKind, ctx: &SerializeContext<'_>) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(
        format!("{} MCHAT/{}.{}\r\n", kind.wire_token(), PROTOCOL_VERSION.0, PROTOCOL_VERSION.1)
            .as_bytes(),
    );

    for &header in kind.required_headers() {
        if let Some(line) = format_header(header, ctx) {
            out.extend_from_slice(line.as_bytes());
            out.extend_from_slice(b"\r\n");
        }
    }
    out.extend_from_slice(b"\r\n");

    if kind.has_body() {
        if let Some(body) = ctx.body {
            out.extend_from_slice(body);
        }
    }
    out
}

fn format_header(header: HeaderKind, ctx: &SerializeContext<'_>) -> Option<String> {
    match header {
        HeaderKind::Nickname => Some(format!("Nickname: {}", ctx.nickname)),
        HeaderKind::Length => ctx.body.map(|b| format!("Length: {}", b.len())),
        HeaderKind::Channel => Some(format!(
            "Channel: {}",
            ctx.channel.as_ref().map(|c| c.name).unwrap_or(NOT_CONNECTED_CHANNEL)
        )),
        HeaderKind::Address => ctx.channel.as_ref().map(|c| format!("Address: {}", c.address)),
        HeaderKind::Port => ctx.channel.as_ref().map(|c| format!("Port: {}", c.port)),
        // Reserved for the file-transfer sub-protocol (non-goal): never
        // actually transmitted, so there's nothing to pull a value from.
        HeaderKind::Filename
        | HeaderKind::Filesum
        | HeaderKind::Chunk
        | HeaderKind::Chunkcount
        | HeaderKind::Chunksum
        | HeaderKind::Presence => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::parser::parse;

    #[test]
    fn serializes_text_per_scenario_s1() {
        let ctx = SerializeContext {
            nickname: "sean",
            channel: Some(ConnectedChannel {
                name: "#mchat",
                address: Ipv4Addr::new(230, 0, 0, 1),
                port: 9009,
            }),
            body: Some(b"Hello"),
        };
        let bytes = serialize(MessageKind::Text, &ctx);
        assert_eq!(
            bytes,
            b"TEXT MCHAT/1.0\r\nNickname: sean\r\nLength: 5\r\nChannel: #mchat\r\n\r\nHello"
        );
    }

    #[test]
    fn round_trips_through_the_parser() {
        let ctx = SerializeContext {
            nickname: "sean",
            channel: Some(ConnectedChannel {
                name: "#mchat",
                address: Ipv4Addr::new(230, 0, 0, 1),
                port: 9009,
            }),
            body: Some(b"Hello"),
        };
        let bytes = serialize(MessageKind::Text, &ctx);
        let rec = parse(&bytes);
        assert!(rec.is_valid());
        assert!(rec.parser_errors.is_clean());
        assert_eq!(rec.kind, MessageKind::Text);
        assert_eq!(rec.body, b"Hello");
    }

    #[test]
    fn ping_while_disconnected_reports_not_connected_channel() {
        let ctx = SerializeContext { nickname: "sean", channel: None, body: None };
        let bytes = serialize(MessageKind::Ping, &ctx);
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("Channel: <Not Connected>"));
    }

    #[test]
    fn cdsc_includes_address_and_port_when_connected() {
        let ctx = SerializeContext {
            nickname: "sean",
            channel: Some(ConnectedChannel {
                name: "#dev",
                address: Ipv4Addr::new(230, 0, 0, 2),
                port: 9010,
            }),
            body: None,
        };
        let bytes = serialize(MessageKind::Cdsc, &ctx);
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("Address: 230.0.0.2"));
        assert!(text.contains("Port: 9010"));
    }
}

//! Wire parser: byte slice → [`ParsedRecord`].
//!
//! State machine per the original source (`mchatv1_parser.c`): `init` →
//! `protocol` → `continue`/`headername`/`headervalue` (looping over header
//! lines) → `body` → `end`. Only a protocol-literal mismatch (`INVALID_PROTOCOL`)
//! aborts the scan; every other parser error is recorded in the bitmask and
//! the record is still returned, to be dropped later by the validator if it's
//! unusable.
//!
//! The record borrows from the input buffer (it stores slices, not copies) —
//! its lifetime is tied to the buffer's, exactly as the spec's data model
//! requires. Callers that need the record to outlive the buffer copy it into
//! an owned [`crate::Message`] (see `engine.rs`/the recv workers).

use super::error::{ParserErrorBits, ValidationErrorBits};
use super::grammar::{HeaderKind, MessageKind, ALL_HEADERS};

const CRLF: &[u8] = b"\r\n";

/// One header slot per entry in [`ALL_HEADERS`], in the same order.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderSlots<'a>([Option<&'a [u8]>; ALL_HEADERS.len()]);

impl<'a> HeaderSlots<'a> {
    fn index_of(kind: HeaderKind) -> usize {
        ALL_HEADERS.iter().position(|&h| h == kind).expect("exhaustive header table")
    }

    pub fn get(&self, kind: HeaderKind) -> Option<&'a [u8]> {
        self.0[Self::index_of(kind)]
    }

    fn set(&mut self, kind: HeaderKind, value: &'a [u8]) {
        self.0[Self::index_of(kind)] = Some(value);
    }

    pub fn get_str(&self, kind: HeaderKind) -> Option<&'a str> {
        self.get(kind).and_then(|v| std::str::from_utf8(v).ok())
    }
}

#[derive(Debug, Clone)]
pub struct ParsedRecord<'a> {
    pub version: (u16, u16),
    pub kind: MessageKind,
    pub headers: HeaderSlots<'a>,
    pub body: &'a [u8],
    pub total_size: usize,
    pub parser_errors: ParserErrorBits,
    pub validation_errors: ValidationErrorBits,
}

impl<'a> ParsedRecord<'a> {
    /// A missing or empty body when `kind` expects no body is not an error;
    /// `body` is simply empty in that case.
    pub fn is_valid(&self) -> bool {
        self.validation_errors.is_valid() && self.kind != MessageKind::None
    }
}

/// Split `input` on the first CRLF (or bare LF, tolerated), returning
/// `(line, rest)`. `rest` excludes the terminator.
fn split_line(input: &[u8]) -> (&[u8], &[u8]) {
    if let Some(pos) = find(input, CRLF) {
        (&input[..pos], &input[pos + CRLF.len()..])
    } else if let Some(pos) = input.iter().position(|&b| b == b'\n') {
        let end = if pos > 0 && input[pos - 1] == b'\r' { pos - 1 } else { pos };
        (&input[..end], &input[pos + 1..])
    } else {
        (input, &input[input.len()..])
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn parse_single_digit(b: u8) -> Option<u16> {
    if b.is_ascii_digit() {
        Some((b - b'0') as u16)
    } else {
        None
    }
}

/// Parse the `<KIND> MCHAT/<M>.<m>` protocol line.
fn parse_protocol_line(line: &[u8], errors: &mut ParserErrorBits) -> (MessageKind, (u16, u16)) {
    let mut parts = line.splitn(2, |&b| b == b' ');
    let kind_token = parts.next().unwrap_or(&[]);
    let rest = parts.next().unwrap_or(&[]);

    let kind = MessageKind::from_wire(kind_token);
    if kind == MessageKind::None {
        errors.set(ParserErrorBits::INVALID_TYPE);
    }

    const PREFIX: &[u8] = b"MCHAT/";
    if !rest.starts_with(PREFIX) {
        errors.set(ParserErrorBits::INVALID_PROTOCOL);
        return (MessageKind::None, (0, 0));
    }
    let version_bytes = &rest[PREFIX.len()..];
    let version = match version_bytes {
        [major, b'.', minor] => match (parse_single_digit(*major), parse_single_digit(*minor)) {
            (Some(m), Some(n)) => (m, n),
            _ => {
                errors.set(ParserErrorBits::INVALID_VERSION);
                (0, 0)
            }
        },
        _ => {
            errors.set(ParserErrorBits::INVALID_VERSION);
            (0, 0)
        }
    };

    (kind, version)
}

/// Parse one `Name: value` header line. Returns `None` if the line isn't a
/// header at all (shouldn't happen once the caller has excluded the blank
/// terminator line).
fn parse_header_line<'a>(
    line: &'a [u8],
    slots: &mut HeaderSlots<'a>,
    errors: &mut ParserErrorBits,
) {
    let colon = match line.iter().position(|&b| b == b':') {
        Some(pos) => pos,
        None => {
            errors.set(ParserErrorBits::UNKNOWN_HEADER);
            return;
        }
    };
    let name = &line[..colon];
    let mut value = &line[colon + 1..];
    while value.first() == Some(&b' ') {
        value = &value[1..];
    }

    let header = match HeaderKind::from_wire_name(name) {
        Some(h) => h,
        None => {
            errors.set(ParserErrorBits::UNKNOWN_HEADER);
            return;
        }
    };

    if let Some(max_len) = header.max_value_len() {
        if value.len() > max_len {
            errors.set(ParserErrorBits::INCORRECT_HEADER_VALUE);
        }
    }
    if header == HeaderKind::Length && std::str::from_utf8(value).ok().and_then(|s| s.parse::<usize>().ok()).is_none() {
        errors.set(ParserErrorBits::INCORRECT_HEADER_VALUE);
    }

    slots.set(header, value);
}

/// Run the parser over `input`. Always returns a record; check
/// `parser_errors.is_fatal()` before trusting `kind`/`headers`.
pub fn parse(input: &[u8]) -> ParsedRecord<'_> {
    let mut errors = ParserErrorBits::default();
    let (protocol_line, mut rest) = split_line(input);
    let (kind, version) = parse_protocol_line(protocol_line, &mut errors);

    let mut slots = HeaderSlots::default();

    if !errors.is_fatal() {
        loop {
            let (line, next) = split_line(rest);
            if line.is_empty() {
                rest = next;
                break;
            }
            parse_header_line(line, &mut slots, &mut errors);
            rest = next;
        }
    }

    let body: &[u8] = if errors.is_fatal() {
        &[]
    } else if let Some(declared_len) = slots
        .get(HeaderKind::Length)
        .and_then(|v| std::str::from_utf8(v).ok())
        .and_then(|s| s.parse::<usize>().ok())
    {
        if declared_len > rest.len() {
            errors.set(ParserErrorBits::INVALID_BODY_SIZE);
            rest
        } else {
            &rest[..declared_len]
        }
    } else {
        rest
    };

    ParsedRecord {
        version,
        kind: if errors.is_fatal() { MessageKind::None } else { kind },
        headers: slots,
        body,
        total_size: input.len(),
        parser_errors: errors,
        validation_errors: validate(if errors.is_fatal() { MessageKind::None } else { kind }, &slots),
    }
}

/// Required-headers closure check (§4.3). A header "has a value" iff its
/// slot is present and non-empty.
fn validate(kind: MessageKind, slots: &HeaderSlots<'_>) -> ValidationErrorBits {
    let mut errors = ValidationErrorBits::default();
    if kind == MessageKind::None {
        errors.set(ValidationErrorBits::BAD_MESSAGE_TYPE);
        return errors;
    }
    for &required in kind.required_headers() {
        match slots.get(required) {
            Some(value) if !value.is_empty() => {}
            _ => errors.set(ValidationErrorBits::REQUIRED_HEADER_MISSING),
        }
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::grammar::HeaderKind;

    const S1: &[u8] = b"TEXT MCHAT/1.0\r\nNickname: sean\r\nLength: 5\r\nChannel: #mchat\r\n\r\nHello";

    #[test]
    fn parses_text_message_cleanly() {
        let rec = parse(S1);
        assert!(rec.parser_errors.is_clean());
        assert!(rec.is_valid());
        assert_eq!(rec.kind, MessageKind::Text);
        assert_eq!(rec.version, (1, 0));
        assert_eq!(rec.headers.get_str(HeaderKind::Nickname), Some("sean"));
        assert_eq!(rec.headers.get_str(HeaderKind::Channel), Some("#mchat"));
        assert_eq!(rec.body, b"Hello");
    }

    #[test]
    fn unknown_header_sets_bit_but_still_validates() {
        let input = b"TEXT MCHAT/1.0\r\nNickname: sean\r\nLength: 5\r\nChannel: #mchat\r\nFoo: bar\r\n\r\nHello";
        let rec = parse(input);
        assert!(rec.parser_errors.has(ParserErrorBits::UNKNOWN_HEADER));
        assert!(rec.is_valid());
        assert_eq!(rec.body, b"Hello");
    }

    #[test]
    fn missing_required_header_fails_validation() {
        let input = b"PING MCHAT/1.0\r\nNickname: x\r\n\r\n";
        let rec = parse(input);
        assert!(rec.parser_errors.is_clean());
        assert!(!rec.is_valid());
        assert!(rec.validation_errors.has(ValidationErrorBits::REQUIRED_HEADER_MISSING));
    }

    #[test]
    fn bad_protocol_literal_is_fatal() {
        let input = b"TEXT HTTP/1.1\r\n\r\n";
        let rec = parse(input);
        assert!(rec.parser_errors.is_fatal());
        assert_eq!(rec.kind, MessageKind::None);
    }

    #[test]
    fn header_name_matching_is_case_insensitive() {
        let input = b"PING MCHAT/1.0\r\nNICKNAME: x\r\nchannel: #mchat\r\n\r\n";
        let rec = parse(input);
        assert!(rec.is_valid());
        assert_eq!(rec.headers.get_str(HeaderKind::Nickname), Some("x"));
    }

    #[test]
    fn cdsc_fields_parse() {
        let input = b"CDSC MCHAT/1.0\r\nChannel: #dev\r\nAddress: 230.0.0.2\r\nPort: 9010\r\n\r\n";
        let rec = parse(input);
        assert!(rec.is_valid());
        assert_eq!(rec.headers.get_str(HeaderKind::Address), Some("230.0.0.2"));
        assert_eq!(rec.headers.get_str(HeaderKind::Port), Some("9010"));
    }

    #[test]
    fn oversized_body_is_clamped_and_flagged() {
        let input = b"TEXT MCHAT/1.0\r\nNickname: x\r\nLength: 999\r\nChannel: #mchat\r\n\r\nHi";
        let rec = parse(input);
        assert!(rec.parser_errors.has(ParserErrorBits::INVALID_BODY_SIZE));
        assert_eq!(rec.body, b"Hi");
    }
}

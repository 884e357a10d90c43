//! The MChat wire protocol: grammar tables, parser, and serializer.

pub mod error;
pub mod grammar;
pub mod parser;
pub mod serializer;

pub use error::{ParserErrorBits, ThreadError, ValidationErrorBits};
pub use grammar::{HeaderKind, MessageKind, ALL_HEADERS, NOT_CONNECTED_CHANNEL, PROTOCOL_VERSION};
pub use parser::{parse, HeaderSlots, ParsedRecord};
pub use serializer::{serialize, ConnectedChannel, SerializeContext};

//! Conversation shaping on the way in, structured validation on the way out.

pub mod conversation;
pub mod output_parser;
pub mod shape;

pub use conversation::{FOLLOW_UP_SEPARATOR, normalize, with_input};
pub use output_parser::{MalformedResponse, validate};
pub use shape::{ExpectedShape, FieldKind, FieldSpec};

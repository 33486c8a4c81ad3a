//! Type descriptors: the wire shape of RPC arguments and results.
//!
//! A [`TypeDescriptor`] is an immutable value describing one wire type. The
//! same descriptor both encodes a native [`Value`] into a [`WireValue`] and
//! decodes it back, so the two directions cannot drift apart. Records
//! ([`RecordType`], [`record!`]) present positional wire tuples as named
//! fields.
//!
//! Descriptors carry no schema on the wire; client and server agree on them
//! out of band and every mismatch is caught client-side.

pub mod descriptor;
pub mod error;
mod macros;
pub mod parse;
pub mod record;
pub mod typed;
pub mod value;

pub use descriptor::{IntWidth, Primitive, TypeDescriptor};
pub use error::{DecodeError, EncodeError, ParseError, PathSegment};
pub use mpcall_wire::WireValue;
pub use parse::{parse_descriptor, TypeRegistry};
pub use record::{Record, RecordType};
pub use typed::Typed;
pub use value::Value;

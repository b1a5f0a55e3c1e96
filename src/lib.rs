//! # ddlcraft
//!
//! A codec engine for C-style binary record layouts described by declarative
//! DDL schemas.
//!
//! A schema declares primitive types, structs, enums, units and streams; from
//! it and a chosen root struct the library plans, for every addressable
//! scalar, its bit position in two representations: the *serialized* wire
//! form (bit-packed, explicit byte order) and the *deserialized* in-memory
//! form (byte-aligned, host byte order, platform padding). Decoders and
//! codecs then read and write elements by index or dotted path, and the
//! transformer converts whole buffers between the two forms. Arrays whose
//! length lives in a sibling element are resolved against the buffer when a
//! decoder is created.
//!
//! ## Example
//!
//! ```
//! use ddlcraft::codec::CodecFactory;
//! use ddlcraft::layout::DataRepresentation;
//!
//! let description = r#"<structs>
//!     <struct alignment="1" name="frame" version="1">
//!         <element name="id" type="tUInt16" bytepos="0" byteorder="BE"/>
//!         <element name="flags" type="tUInt8" bytepos="2"/>
//!     </struct>
//! </structs>"#;
//!
//! let factory = CodecFactory::new("frame", description).unwrap();
//! let data = [0x01u8, 0x02, 0x80];
//! let decoder = factory
//!     .make_static_decoder(&data, DataRepresentation::Serialized)
//!     .unwrap();
//! assert_eq!(decoder.value_by_path("id").unwrap().as_u64(), 0x0102);
//! assert_eq!(decoder.value_by_path("flags").unwrap().as_u64(), 0x80);
//! ```

pub mod access;
pub mod bits;
pub mod codec;
pub mod compare;
pub mod errors;
pub mod layout;
pub mod schema;
pub mod transform;
pub mod value;

mod path;
mod validate;
mod xml;

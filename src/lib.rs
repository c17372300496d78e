//! # nucleus-codec
//!
//! A compact, bit-packed binary writer/reader pair for persisting structured,
//! nested, null-bearing data to byte streams.
//!
//! - Big-endian fixed-width integers, length-prefixed byte arrays and strings
//! - Consecutive booleans packed seven to a byte, never sharing a byte with other data
//! - A single null-safety convention: every optional composite value is preceded by one packed boolean
//! - Self-serializing values ([`BinarySerializable`]) nest recursively through the same stream
//! - A registry-driven generic fallback ([`CodecRegistry`]) for types with no structured encoding
//! - Custom derive macros for ergonomic usage
//!
//! The format carries no type tags except enum constant names and fallback type names, so
//! a [`Decoder`] must be driven with exactly the call sequence the [`Encoder`] saw.
//!
//! ## Attribute Macros
//!
//! `#[derive(BinarySerializable)]` writes fields in declaration order through [`WireValue`].
//! Field attributes select another encoding:
//!
//! - `#[nucleus(small)]` - `String`/`Option<String>` written with the one-byte-prefixed small form.
//! - `#[nucleus(nested)]` - `Option<T>` or `Vec<Option<T>>` of self-serializing values.
//! - `#[nucleus(fallback)]` - `Option<T>` written through the generic fallback registry.
//! - `#[nucleus(skip)]` - not written; left at its current value on read.
//!
//! `#[derive(EnumConstant)]` on a fieldless enum writes its constants by name.
//!
//! ## Feature Flags
//!
//! - `serde_json` - Enables [`JsonCodec`], a fallback codec for any serde type.
//! - `rust_decimal` - Registers `rust_decimal::Decimal` in [`CodecRegistry::with_defaults`].
//! - `bigdecimal` - Registers `bigdecimal::BigDecimal` in [`CodecRegistry::with_defaults`].
//! - `ulid` - Encodes `ulid::Ulid` with the UUID layout.
//! - `smol_str` - Lets `smol_str::SmolStr` use the small-string form.
//!
//! ## Threading
//!
//! An encoder or decoder owns unsynchronized state (the pending boolean byte). Every
//! operation takes `&mut self`, so one instance is driven by one caller at a time.

// Lets the derive macros' `::nucleus_codec` paths resolve inside this crate's own tests.
extern crate self as nucleus_codec;

pub mod core;
pub mod decoder;
pub mod encoder;
mod features;
pub mod registry;

pub use crate::core::{CodecConfig, TextForm};
pub use crate::decoder::Decoder;
pub use crate::encoder::Encoder;
#[cfg(feature = "serde_json")]
pub use crate::features::JsonCodec;
pub use crate::registry::{CodecContext, CodecRegistry, FnCodec, ObjectCodec, SerializableCodec};
pub use nucleus_codec_derive::{BinarySerializable, EnumConstant};

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io::{Read, Write};

/// Errors that can occur during encoding or decoding operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The underlying sink or source failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The stream ended before a fixed-width or length-prefixed value was complete.
    #[error("Insufficient data in stream")]
    InsufficientData,
    /// An encoded length does not fit the size prefix of its form.
    #[error("Encoded length {len} exceeds the {limit} byte limit of the {form:?} form")]
    SizeViolation {
        form: TextForm,
        len: usize,
        limit: usize,
    },
    /// An enum decode found no constant with the stored name.
    #[error("'{name}' is not a valid constant name for enum type {enum_name}")]
    InvalidConstantName {
        name: String,
        enum_name: &'static str,
    },
    /// A fallback decode produced a value of a different type than requested.
    #[error("The object returned by the stream ({actual}) is not of the requested type {expected}")]
    TypeMismatch {
        expected: &'static str,
        actual: String,
    },
    /// No fallback codec is registered for the type being written.
    #[error("No object codec registered for type {0}")]
    UnregisteredType(&'static str),
    /// No fallback codec is registered under the type name found in the stream.
    #[error("Unknown object type name in stream: {0}")]
    UnknownObjectType(String),
    /// A fallback codec name or type was registered twice.
    #[error("Object codec already registered: {0}")]
    DuplicateRegistration(String),
    /// Nested self-serializing values exceeded the configured depth.
    #[error("Nesting depth exceeds the limit of {0}")]
    RecursionLimit(usize),
    /// The value could not be encoded.
    #[error("Encode error: {0}")]
    Encode(String),
    /// The bytes could not be decoded into the requested value.
    #[error("Decode error: {0}")]
    Decode(String),
    /// The encoder or decoder was already closed.
    #[error("Stream is closed")]
    Closed,
}

/// The result type used throughout this crate for encode/decode operations.
pub type Result<T> = std::result::Result<T, CodecError>;

/// A type that writes its own fields through an [`Encoder`] and reads them back
/// through a [`Decoder`].
///
/// Implementors become usable with [`Encoder::write_nullable`] and
/// [`Decoder::read_nullable`], which is how nested, composite and recursive
/// structures are layered on the primitive format. Most users should use
/// `#[derive(BinarySerializable)]` instead of a manual implementation.
///
/// `deserialize` must issue the same operations, in the same order, as `serialize`.
pub trait BinarySerializable {
    /// Write this value's fields.
    fn serialize<W: Write>(&self, encoder: &mut Encoder<W>) -> Result<()>;

    /// Populate this value's fields from the stream.
    fn deserialize<R: Read>(&mut self, decoder: &mut Decoder<R>) -> Result<()>;
}

impl<T: BinarySerializable> BinarySerializable for Box<T> {
    fn serialize<W: Write>(&self, encoder: &mut Encoder<W>) -> Result<()> {
        (**self).serialize(encoder)
    }

    fn deserialize<R: Read>(&mut self, decoder: &mut Decoder<R>) -> Result<()> {
        (**self).deserialize(decoder)
    }
}

/// A value with one fixed encoding, usable as a plain field of a derived
/// [`BinarySerializable`] type.
///
/// Implemented for the primitive encodings: `bool`, `u8`, `i8`, `i16`, `i32`,
/// `i64`, `f32`, `f64`, `String` and `Option<String>` (wide form), `Vec<u8>`
/// (byte array) and `Uuid`, plus every `#[derive(EnumConstant)]` enum.
pub trait WireValue: Sized {
    fn write_value<W: Write>(&self, encoder: &mut Encoder<W>) -> Result<()>;

    fn read_value<R: Read>(decoder: &mut Decoder<R>) -> Result<Self>;
}

/// Text written with the one-byte-prefixed small form (`#[nucleus(small)]`).
pub trait SmallText: Sized {
    fn write_small<W: Write>(&self, encoder: &mut Encoder<W>) -> Result<()>;

    fn read_small<R: Read>(decoder: &mut Decoder<R>) -> Result<Self>;
}

/// Fields holding self-serializing values (`#[nucleus(nested)]`).
pub trait NestedField: Sized {
    fn write_nested<W: Write>(&self, encoder: &mut Encoder<W>) -> Result<()>;

    fn read_nested<R: Read>(decoder: &mut Decoder<R>) -> Result<Self>;
}

/// A fieldless enum whose constants are written by name.
///
/// Decoding scans [`EnumConstant::CONSTANTS`] for an exact name match, so two
/// enum types sharing a constant name decode each other's bytes without error.
pub trait EnumConstant: Sized + Clone + 'static {
    /// Type name used in error messages.
    const TYPE_NAME: &'static str;

    /// Every constant, in declaration order.
    const CONSTANTS: &'static [Self];

    /// The constant's name as written to the stream.
    fn name(&self) -> &'static str;
}

/// Runs `f` against an encoder over an in-memory buffer and returns the bytes written.
///
/// # Example
/// ```rust
/// let bytes = nucleus_codec::to_bytes(|encoder| {
///     encoder.write_bool(true)?;
///     encoder.write_int(300)
/// })
/// .unwrap();
/// assert_eq!(&bytes[..], &[0x01, 0x00, 0x00, 0x01, 0x2C]);
/// ```
pub fn to_bytes<F>(f: F) -> Result<Bytes>
where
    F: FnOnce(&mut Encoder<bytes::buf::Writer<BytesMut>>) -> Result<()>,
{
    let mut encoder = Encoder::new(BytesMut::new().writer());
    f(&mut encoder)?;
    Ok(encoder.into_inner()?.into_inner().freeze())
}

/// Creates a decoder reading from an in-memory buffer.
///
/// Passing `&mut Bytes` advances the caller's buffer as values are read.
pub fn from_bytes<B: Buf>(buf: B) -> Decoder<bytes::buf::Reader<B>> {
    Decoder::new(buf.reader())
}

/// Convenience function to encode a self-serializing value to bytes.
///
/// The value's fields are written directly, without a nullable-value flag.
///
/// # Example
/// ```rust
/// use nucleus_codec::{decode, encode, BinarySerializable};
///
/// #[derive(BinarySerializable, Default, PartialEq, Debug)]
/// struct Warp {
///     #[nucleus(small)]
///     name: String,
///     uses: i32,
/// }
///
/// let value = Warp { name: "spawn".to_string(), uses: 3 };
/// let mut buf = encode(&value).unwrap();
/// let decoded: Warp = decode(&mut buf).unwrap();
/// assert_eq!(value, decoded);
/// ```
pub fn encode<T: BinarySerializable>(value: &T) -> Result<Bytes> {
    to_bytes(|encoder| value.serialize(encoder))
}

/// Convenience function to decode a self-serializing value written by [`encode`].
pub fn decode<T: BinarySerializable + Default>(reader: &mut Bytes) -> Result<T> {
    let mut decoder = from_bytes(reader);
    let mut value = T::default();
    value.deserialize(&mut decoder)?;
    Ok(value)
}

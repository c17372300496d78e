use crate::*;
use uuid::Uuid;

/// Wire constants shared by [`Encoder`] and [`Decoder`].
///
/// These values are part of the wire format and must never change.

///< Bit flag for each packed boolean position; bit 7 is never used
pub const BOOLEAN_FLAGS: [u8; 7] = [1, 2, 4, 8, 16, 32, 64];
///< Booleans packed into one byte before it is flushed
pub const BOOLEANS_PER_BYTE: usize = BOOLEAN_FLAGS.len();
///< Length prefix of a null string (short form) or null small string (0xFF)
pub const NULL_LENGTH: i16 = -1;
pub const NULL_SMALL_LENGTH: u8 = 0xFF;
///< Largest payload of a short-prefixed string
pub const MAX_WIDE_LENGTH: usize = i16::MAX as usize;
///< Largest payload of a small string; 0xFF is the null sentinel
pub const MAX_SMALL_LENGTH: usize = 254;

/// The width policy of an encoded string: its length prefix and character set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextForm {
    /// `short` length prefix, UTF-16 big-endian characters (2 bytes per BMP char).
    Utf16,
    /// `short` length prefix, UTF-8 characters.
    Utf8,
    /// Single `byte` length prefix, UTF-8 characters. Used for identifiers,
    /// enum constant names, type tags and floating-point text.
    Small,
}

impl TextForm {
    /// The largest payload, in bytes, the form's length prefix can describe.
    pub fn limit(self) -> usize {
        match self {
            TextForm::Utf16 | TextForm::Utf8 => MAX_WIDE_LENGTH,
            TextForm::Small => MAX_SMALL_LENGTH,
        }
    }
}

/// Runtime limits for an [`Encoder`] or [`Decoder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecConfig {
    /// Deepest permitted nesting of self-serializing values.
    pub max_depth: usize,
    /// Payloads up to this many bytes are read through a reused scratch buffer.
    pub scratch_size: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_depth: 128,
            scratch_size: 1024,
        }
    }
}

impl CodecConfig {
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_scratch_size(mut self, scratch_size: usize) -> Self {
        self.scratch_size = scratch_size;
        self
    }
}

/// Encodes `text` in the character set of `form`, checking it fits the form's prefix.
pub(crate) fn encode_text(text: &str, form: TextForm) -> Result<Vec<u8>> {
    let bytes = match form {
        TextForm::Utf16 => {
            let mut bytes = Vec::with_capacity(text.len() * 2);
            for unit in text.encode_utf16() {
                bytes.extend_from_slice(&unit.to_be_bytes());
            }
            bytes
        }
        TextForm::Utf8 | TextForm::Small => text.as_bytes().to_vec(),
    };
    if bytes.len() > form.limit() {
        return Err(CodecError::SizeViolation {
            form,
            len: bytes.len(),
            limit: form.limit(),
        });
    }
    Ok(bytes)
}

/// Decodes a borrowed payload written by [`encode_text`].
pub(crate) fn decode_text(bytes: &[u8], form: TextForm) -> Result<String> {
    match form {
        TextForm::Utf16 => decode_utf16(bytes),
        TextForm::Utf8 | TextForm::Small => std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|e| CodecError::Decode(e.to_string())),
    }
}

/// Decodes an owned payload, reusing its allocation for UTF-8 forms.
pub(crate) fn decode_text_owned(bytes: Vec<u8>, form: TextForm) -> Result<String> {
    match form {
        TextForm::Utf16 => decode_utf16(&bytes),
        TextForm::Utf8 | TextForm::Small => {
            String::from_utf8(bytes).map_err(|e| CodecError::Decode(e.to_string()))
        }
    }
}

fn decode_utf16(bytes: &[u8]) -> Result<String> {
    if bytes.len() % 2 != 0 {
        return Err(CodecError::Decode(format!(
            "UTF-16 payload has odd length {}",
            bytes.len()
        )));
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16(&units).map_err(|e| CodecError::Decode(e.to_string()))
}

// --- bool ---
impl WireValue for bool {
    fn write_value<W: Write>(&self, encoder: &mut Encoder<W>) -> Result<()> {
        encoder.write_bool(*self)
    }

    fn read_value<R: Read>(decoder: &mut Decoder<R>) -> Result<Self> {
        decoder.read_bool()
    }
}

// --- byte ---
impl WireValue for u8 {
    fn write_value<W: Write>(&self, encoder: &mut Encoder<W>) -> Result<()> {
        encoder.write_byte(*self)
    }

    fn read_value<R: Read>(decoder: &mut Decoder<R>) -> Result<Self> {
        decoder.read_byte()
    }
}
impl WireValue for i8 {
    fn write_value<W: Write>(&self, encoder: &mut Encoder<W>) -> Result<()> {
        encoder.write_byte(*self as u8)
    }

    fn read_value<R: Read>(decoder: &mut Decoder<R>) -> Result<Self> {
        Ok(decoder.read_byte()? as i8)
    }
}

// --- fixed-width integers ---
impl WireValue for i16 {
    fn write_value<W: Write>(&self, encoder: &mut Encoder<W>) -> Result<()> {
        encoder.write_short(*self)
    }

    fn read_value<R: Read>(decoder: &mut Decoder<R>) -> Result<Self> {
        decoder.read_short()
    }
}
impl WireValue for i32 {
    fn write_value<W: Write>(&self, encoder: &mut Encoder<W>) -> Result<()> {
        encoder.write_int(*self)
    }

    fn read_value<R: Read>(decoder: &mut Decoder<R>) -> Result<Self> {
        decoder.read_int()
    }
}
impl WireValue for i64 {
    fn write_value<W: Write>(&self, encoder: &mut Encoder<W>) -> Result<()> {
        encoder.write_long(*self)
    }

    fn read_value<R: Read>(decoder: &mut Decoder<R>) -> Result<Self> {
        decoder.read_long()
    }
}

// --- f32/f64 (decimal text) ---
impl WireValue for f32 {
    fn write_value<W: Write>(&self, encoder: &mut Encoder<W>) -> Result<()> {
        encoder.write_float(*self)
    }

    fn read_value<R: Read>(decoder: &mut Decoder<R>) -> Result<Self> {
        decoder.read_float()
    }
}
impl WireValue for f64 {
    fn write_value<W: Write>(&self, encoder: &mut Encoder<W>) -> Result<()> {
        encoder.write_double(*self)
    }

    fn read_value<R: Read>(decoder: &mut Decoder<R>) -> Result<Self> {
        decoder.read_double()
    }
}

// --- String (wide form) ---
/// A `String` field is never null; reading a null string is a decode error.
impl WireValue for String {
    fn write_value<W: Write>(&self, encoder: &mut Encoder<W>) -> Result<()> {
        encoder.write_string(Some(self))
    }

    fn read_value<R: Read>(decoder: &mut Decoder<R>) -> Result<Self> {
        decoder
            .read_string()?
            .ok_or_else(|| CodecError::Decode("Unexpected null string".to_string()))
    }
}
impl WireValue for Option<String> {
    fn write_value<W: Write>(&self, encoder: &mut Encoder<W>) -> Result<()> {
        encoder.write_string(self.as_deref())
    }

    fn read_value<R: Read>(decoder: &mut Decoder<R>) -> Result<Self> {
        decoder.read_string()
    }
}

// --- Vec<u8> (byte array) ---
impl WireValue for Vec<u8> {
    fn write_value<W: Write>(&self, encoder: &mut Encoder<W>) -> Result<()> {
        encoder.write_byte_array(Some(self))
    }

    fn read_value<R: Read>(decoder: &mut Decoder<R>) -> Result<Self> {
        decoder.read_byte_array()
    }
}

// --- Uuid ---
impl WireValue for Uuid {
    fn write_value<W: Write>(&self, encoder: &mut Encoder<W>) -> Result<()> {
        encoder.write_uuid(self)
    }

    fn read_value<R: Read>(decoder: &mut Decoder<R>) -> Result<Self> {
        decoder.read_uuid()
    }
}

// --- small text ---
impl SmallText for String {
    fn write_small<W: Write>(&self, encoder: &mut Encoder<W>) -> Result<()> {
        encoder.write_small_string(Some(self))
    }

    fn read_small<R: Read>(decoder: &mut Decoder<R>) -> Result<Self> {
        decoder
            .read_small_string()?
            .ok_or_else(|| CodecError::Decode("Unexpected null small string".to_string()))
    }
}
impl SmallText for Option<String> {
    fn write_small<W: Write>(&self, encoder: &mut Encoder<W>) -> Result<()> {
        encoder.write_small_string(self.as_deref())
    }

    fn read_small<R: Read>(decoder: &mut Decoder<R>) -> Result<Self> {
        decoder.read_small_string()
    }
}

// --- nested self-serializing values ---
impl<T: BinarySerializable + Default> NestedField for Option<T> {
    fn write_nested<W: Write>(&self, encoder: &mut Encoder<W>) -> Result<()> {
        encoder.write_nullable(self.as_ref())
    }

    fn read_nested<R: Read>(decoder: &mut Decoder<R>) -> Result<Self> {
        decoder.read_nullable()
    }
}
impl<T: BinarySerializable + Default> NestedField for Vec<Option<T>> {
    fn write_nested<W: Write>(&self, encoder: &mut Encoder<W>) -> Result<()> {
        encoder.write_nullable_list(self.as_slice())
    }

    fn read_nested<R: Read>(decoder: &mut Decoder<R>) -> Result<Self> {
        decoder.read_nullable_list()
    }
}

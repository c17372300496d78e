use crate::core::*;
use crate::*;
use std::any::{type_name, Any};
use std::io::ErrorKind;
use std::sync::Arc;
use tracing::{debug, trace};
use uuid::Uuid;

/// Largest chunk allocated up front for a payload read outside the scratch buffer.
const MAX_PREALLOCATION: usize = 64 * 1024;

/// Reads typed values from a byte source written by an [`Encoder`].
///
/// Operations must be called in the order, and with the types, used when
/// encoding. The format has no tags to detect a mismatched sequence; it shows
/// up as garbage values, [`CodecError::InsufficientData`], or an explicit
/// decode error for enum and fallback reads.
pub struct Decoder<R: Read> {
    source: Option<R>,
    registry: Arc<CodecRegistry>,
    config: CodecConfig,
    bytes_read: u64,
    boolean_read_count: usize,
    boolean_buffer: u8,
    scratch: Vec<u8>,
    depth: usize,
}

impl<R: Read> Decoder<R> {
    /// Creates a decoder with an empty fallback registry.
    pub fn new(source: R) -> Self {
        Self::with_options(source, Arc::new(CodecRegistry::new()), CodecConfig::default())
    }

    pub fn with_registry(source: R, registry: Arc<CodecRegistry>) -> Self {
        Self::with_options(source, registry, CodecConfig::default())
    }

    pub fn with_options(source: R, registry: Arc<CodecRegistry>, config: CodecConfig) -> Self {
        Self {
            source: Some(source),
            registry,
            config,
            bytes_read: 0,
            // an exhausted window forces a fresh byte on the first boolean read
            boolean_read_count: BOOLEANS_PER_BYTE,
            boolean_buffer: 0,
            scratch: Vec::new(),
            depth: 0,
        }
    }

    pub(crate) fn at_depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    /// Number of bytes consumed from the source, including boolean bytes.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    pub fn registry(&self) -> &Arc<CodecRegistry> {
        &self.registry
    }

    /// Read the next packed boolean, consuming a fresh byte when the current
    /// one's seven bits are used up.
    pub fn read_bool(&mut self) -> Result<bool> {
        if self.boolean_read_count == BOOLEANS_PER_BYTE {
            let mut byte = [0u8; 1];
            self.fill(&mut byte)?;
            self.boolean_buffer = byte[0];
            self.boolean_read_count = 0;
        }

        let flag = BOOLEAN_FLAGS[self.boolean_read_count];
        self.boolean_read_count += 1;
        Ok(self.boolean_buffer & flag == flag)
    }

    /// Read a single raw byte.
    pub fn read_byte(&mut self) -> Result<u8> {
        let [byte] = self.read_array::<1>()?;
        Ok(byte)
    }

    /// Read a 16-bit number (2 bytes, big-endian).
    pub fn read_short(&mut self) -> Result<i16> {
        Ok(i16::from_be_bytes(self.read_array()?))
    }

    /// Read a 32-bit number (4 bytes, big-endian).
    pub fn read_int(&mut self) -> Result<i32> {
        Ok(i32::from_be_bytes(self.read_array()?))
    }

    /// Read a 64-bit number (8 bytes, big-endian).
    pub fn read_long(&mut self) -> Result<i64> {
        Ok(i64::from_be_bytes(self.read_array()?))
    }

    /// Read a byte array. A null array and an empty array are both returned empty.
    pub fn read_byte_array(&mut self) -> Result<Vec<u8>> {
        let len = self.read_int()?;
        let len = usize::try_from(len)
            .map_err(|_| CodecError::Decode(format!("Negative byte array length {}", len)))?;
        if len == 0 {
            return Ok(Vec::new());
        }

        if len <= self.config.scratch_size {
            let mut scratch = std::mem::take(&mut self.scratch);
            scratch.resize(len, 0);
            let result = self.fill(&mut scratch).map(|_| scratch.to_vec());
            self.scratch = scratch;
            result
        } else {
            self.read_vec(len)
        }
    }

    /// Read a byte array written by [`Encoder::write_optional_byte_array`].
    pub fn read_optional_byte_array(&mut self) -> Result<Option<Vec<u8>>> {
        if !self.read_bool()? {
            return Ok(None);
        }
        self.read_byte_array().map(Some)
    }

    /// Read text written in the wide form. `None` means a null string was written.
    pub fn read_string(&mut self) -> Result<Option<String>> {
        self.read_text(TextForm::Utf16)
    }

    /// Read text written in the small form. `None` means a null string was written.
    pub fn read_small_string(&mut self) -> Result<Option<String>> {
        self.read_text(TextForm::Small)
    }

    /// Read text written with the given width policy.
    pub fn read_text(&mut self, form: TextForm) -> Result<Option<String>> {
        let len = match form {
            TextForm::Small => match self.read_byte()? {
                NULL_SMALL_LENGTH => return Ok(None),
                len => len as usize,
            },
            TextForm::Utf16 | TextForm::Utf8 => match self.read_short()? {
                NULL_LENGTH => return Ok(None),
                len if len < 0 => {
                    return Err(CodecError::Decode(format!("Negative string length {}", len)))
                }
                len => len as usize,
            },
        };

        if len == 0 {
            return Ok(Some(String::new()));
        }

        if len <= self.config.scratch_size {
            let mut scratch = std::mem::take(&mut self.scratch);
            scratch.resize(len, 0);
            let result = self
                .fill(&mut scratch)
                .and_then(|_| decode_text(&scratch, form));
            self.scratch = scratch;
            result.map(Some)
        } else {
            let bytes = self.read_vec(len)?;
            decode_text_owned(bytes, form).map(Some)
        }
    }

    /// Read a float written as decimal text.
    pub fn read_float(&mut self) -> Result<f32> {
        let text = self.read_number_text()?;
        text.parse()
            .map_err(|_| CodecError::Decode(format!("Invalid float text '{}'", text)))
    }

    /// Read a double written as decimal text.
    pub fn read_double(&mut self) -> Result<f64> {
        let text = self.read_number_text()?;
        text.parse()
            .map_err(|_| CodecError::Decode(format!("Invalid double text '{}'", text)))
    }

    /// Read an enum constant by scanning `E`'s constants for the stored name.
    pub fn read_enum<E: EnumConstant>(&mut self) -> Result<E> {
        let name = self.read_small_string()?.ok_or_else(|| {
            CodecError::Decode(format!("Null constant name for enum type {}", E::TYPE_NAME))
        })?;

        E::CONSTANTS
            .iter()
            .find(|constant| constant.name() == name)
            .cloned()
            .ok_or(CodecError::InvalidConstantName {
                name,
                enum_name: E::TYPE_NAME,
            })
    }

    /// Read a UUID written as two 64-bit halves, most significant first.
    pub fn read_uuid(&mut self) -> Result<Uuid> {
        let most = self.read_long()? as u64;
        let least = self.read_long()? as u64;
        Ok(Uuid::from_u64_pair(most, least))
    }

    /// Read a self-serializing value, constructing it with `Default`.
    pub fn read_nullable<T: BinarySerializable + Default>(&mut self) -> Result<Option<T>> {
        self.read_nullable_with(T::default)
    }

    /// Read a self-serializing value, constructing the instance to populate with `factory`.
    ///
    /// `factory` is only called when the stream holds a present value.
    pub fn read_nullable_with<T, F>(&mut self, factory: F) -> Result<Option<T>>
    where
        T: BinarySerializable,
        F: FnOnce() -> T,
    {
        if !self.read_bool()? {
            return Ok(None);
        }

        if self.depth >= self.config.max_depth {
            return Err(CodecError::RecursionLimit(self.config.max_depth));
        }
        self.depth += 1;
        let mut value = factory();
        let result = value.deserialize(self);
        self.depth -= 1;
        result.map(|_| Some(value))
    }

    /// Read an `int32` count followed by that many present values.
    ///
    /// A null element is a decode error.
    pub fn read_list<T: BinarySerializable + Default>(&mut self) -> Result<Vec<T>> {
        let count = self.read_count()?;
        let mut values = Vec::with_capacity(count.min(MAX_PREALLOCATION));
        for index in 0..count {
            let value = self
                .read_nullable()?
                .ok_or_else(|| CodecError::Decode(format!("Null element at index {}", index)))?;
            values.push(value);
        }
        Ok(values)
    }

    /// Read an `int32` count followed by that many nullable values.
    pub fn read_nullable_list<T: BinarySerializable + Default>(&mut self) -> Result<Vec<Option<T>>> {
        let count = self.read_count()?;
        let mut values = Vec::with_capacity(count.min(MAX_PREALLOCATION));
        for _ in 0..count {
            values.push(self.read_nullable()?);
        }
        Ok(values)
    }

    /// Read a value written through the generic fallback registry.
    ///
    /// Fails with [`CodecError::UnknownObjectType`] when the stored type name is
    /// not registered, and [`CodecError::TypeMismatch`] when the registered codec
    /// produces something other than `T`.
    pub fn read_object<T: Any>(&mut self) -> Result<Option<T>> {
        if !self.read_bool()? {
            return Ok(None);
        }

        let name = self
            .read_small_string()?
            .ok_or_else(|| CodecError::Decode("Null object type name".to_string()))?;
        let payload = self.read_byte_array()?;
        trace!(type_name = %name, len = payload.len(), "reading fallback object");

        let registry = Arc::clone(&self.registry);
        let codec = registry
            .by_name(&name)
            .ok_or_else(|| CodecError::UnknownObjectType(name.clone()))?;
        let cx = CodecContext::new(&registry, self.config, self.depth);
        let object = codec.decode_object(&payload, &cx)?;

        object
            .downcast::<T>()
            .map(|object| Some(*object))
            .map_err(|_| CodecError::TypeMismatch {
                expected: type_name::<T>(),
                actual: name,
            })
    }

    /// Discard `count` bytes without returning them.
    pub fn skip(&mut self, count: u64) -> Result<u64> {
        self.reset_booleans();
        let source = self.source.as_mut().ok_or(CodecError::Closed)?;
        let skipped = std::io::copy(&mut source.take(count), &mut std::io::sink())?;
        self.bytes_read += skipped;
        if skipped < count {
            return Err(CodecError::InsufficientData);
        }
        Ok(skipped)
    }

    /// Release the source. Further operations fail with [`CodecError::Closed`].
    ///
    /// Closing an already closed decoder does nothing.
    pub fn close(&mut self) {
        if self.source.take().is_some() {
            debug!(bytes_read = self.bytes_read, "decoder closed");
        }
    }

    /// Return the source, discarding any partially read boolean byte.
    pub fn into_inner(mut self) -> Result<R> {
        self.source.take().ok_or(CodecError::Closed)
    }

    fn read_number_text(&mut self) -> Result<String> {
        self.read_small_string()?
            .ok_or_else(|| CodecError::Decode("Null floating-point text".to_string()))
    }

    fn read_count(&mut self) -> Result<usize> {
        let count = self.read_int()?;
        usize::try_from(count)
            .map_err(|_| CodecError::Decode(format!("Negative element count {}", count)))
    }

    /// Discards the boolean window, then reads a fixed-width value.
    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        self.reset_booleans();
        let mut bytes = [0u8; N];
        self.fill(&mut bytes)?;
        Ok(bytes)
    }

    /// Reads a payload into a fresh buffer grown as bytes arrive, so a
    /// corrupt length cannot force a large allocation up front.
    fn read_vec(&mut self, len: usize) -> Result<Vec<u8>> {
        let source = self.source.as_mut().ok_or(CodecError::Closed)?;
        let mut bytes = Vec::with_capacity(len.min(MAX_PREALLOCATION));
        source.take(len as u64).read_to_end(&mut bytes)?;
        self.bytes_read += bytes.len() as u64;
        if bytes.len() < len {
            return Err(CodecError::InsufficientData);
        }
        Ok(bytes)
    }

    /// Fills `buf` from the source, counting the bytes consumed.
    fn fill(&mut self, buf: &mut [u8]) -> Result<()> {
        let source = self.source.as_mut().ok_or(CodecError::Closed)?;
        source.read_exact(buf).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => CodecError::InsufficientData,
            _ => CodecError::Io(e),
        })?;
        self.bytes_read += buf.len() as u64;
        Ok(())
    }

    fn reset_booleans(&mut self) {
        self.boolean_read_count = BOOLEANS_PER_BYTE;
        self.boolean_buffer = 0;
    }
}

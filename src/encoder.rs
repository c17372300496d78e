use crate::core::*;
use crate::*;
use std::any::{type_name, Any, TypeId};
use std::sync::Arc;
use tracing::{debug, trace, warn};
use uuid::Uuid;

/// Writes typed values to a byte sink. Read them back with a [`Decoder`]
/// driven with the same call sequence.
///
/// Booleans written consecutively are packed as bits into one pending byte.
/// The pending byte is flushed when it holds seven booleans, before any
/// non-boolean value, and on [`flush`](Encoder::flush) or
/// [`close`](Encoder::close), so bytes holding booleans never hold other data.
pub struct Encoder<W: Write> {
    sink: Option<W>,
    registry: Arc<CodecRegistry>,
    config: CodecConfig,
    bytes_written: u64,
    boolean_count: usize,
    boolean_buffer: u8,
    depth: usize,
}

impl<W: Write> Encoder<W> {
    /// Creates an encoder with an empty fallback registry.
    pub fn new(sink: W) -> Self {
        Self::with_options(sink, Arc::new(CodecRegistry::new()), CodecConfig::default())
    }

    pub fn with_registry(sink: W, registry: Arc<CodecRegistry>) -> Self {
        Self::with_options(sink, registry, CodecConfig::default())
    }

    pub fn with_options(sink: W, registry: Arc<CodecRegistry>, config: CodecConfig) -> Self {
        Self {
            sink: Some(sink),
            registry,
            config,
            bytes_written: 0,
            boolean_count: 0,
            boolean_buffer: 0,
            depth: 0,
        }
    }

    pub(crate) fn at_depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    /// Number of bytes handed to the sink, including flushed boolean bytes.
    ///
    /// Booleans still pending in the unflushed byte are not counted.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn registry(&self) -> &Arc<CodecRegistry> {
        &self.registry
    }

    /// Write a boolean value as one bit of the pending boolean byte.
    pub fn write_bool(&mut self, value: bool) -> Result<()> {
        if self.sink.is_none() {
            return Err(CodecError::Closed);
        }

        if self.boolean_count == BOOLEANS_PER_BYTE {
            self.write_booleans()?;
        }

        if value {
            self.boolean_buffer |= BOOLEAN_FLAGS[self.boolean_count];
        }
        self.boolean_count += 1;
        Ok(())
    }

    /// Write a single raw byte.
    pub fn write_byte(&mut self, value: u8) -> Result<()> {
        self.write_raw(&[value])
    }

    /// Write a 16-bit number (2 bytes, big-endian).
    pub fn write_short(&mut self, value: i16) -> Result<()> {
        self.write_raw(&value.to_be_bytes())
    }

    /// Write a 32-bit number (4 bytes, big-endian).
    pub fn write_int(&mut self, value: i32) -> Result<()> {
        self.write_raw(&value.to_be_bytes())
    }

    /// Write a 64-bit number (8 bytes, big-endian).
    pub fn write_long(&mut self, value: i64) -> Result<()> {
        self.write_raw(&value.to_be_bytes())
    }

    /// Write a byte array: an `int32` length followed by the bytes.
    ///
    /// `None` and an empty array both write length 0 and are indistinguishable
    /// when read back. Use [`write_optional_byte_array`](Encoder::write_optional_byte_array)
    /// when the difference matters.
    pub fn write_byte_array(&mut self, bytes: Option<&[u8]>) -> Result<()> {
        let bytes = bytes.unwrap_or_default();
        let len = i32::try_from(bytes.len()).map_err(|_| {
            CodecError::Encode(format!(
                "Byte array of {} bytes exceeds the int32 length prefix",
                bytes.len()
            ))
        })?;

        self.write_int(len)?;
        if len > 0 {
            self.write_raw(bytes)?;
        }
        Ok(())
    }

    /// Write a byte array preceded by a nullable-value flag, keeping `None`
    /// distinct from an empty array.
    pub fn write_optional_byte_array(&mut self, bytes: Option<&[u8]>) -> Result<()> {
        self.write_bool(bytes.is_some())?;
        match bytes {
            Some(bytes) => self.write_byte_array(Some(bytes)),
            None => Ok(()),
        }
    }

    /// Write text in the wide form: a `short` byte length (-1 for null,
    /// 0 for empty) followed by UTF-16BE characters.
    pub fn write_string(&mut self, text: Option<&str>) -> Result<()> {
        self.write_text(text, TextForm::Utf16)
    }

    /// Write text expected to be no more than 254 bytes: a single length byte
    /// (0xFF for null, 0 for empty) followed by UTF-8 characters.
    pub fn write_small_string(&mut self, text: Option<&str>) -> Result<()> {
        self.write_text(text, TextForm::Small)
    }

    /// Write text with the given width policy.
    ///
    /// A payload too long for the form's prefix fails with
    /// [`CodecError::SizeViolation`] before anything is written.
    pub fn write_text(&mut self, text: Option<&str>, form: TextForm) -> Result<()> {
        let Some(text) = text else {
            return self.write_length(NULL_LENGTH, form);
        };

        // handle empty text
        if text.is_empty() {
            return self.write_length(0, form);
        }

        let bytes = encode_text(text, form)?;
        // encode_text enforces the form's limit, which fits an i16
        self.write_length(bytes.len() as i16, form)?;
        self.write_raw(&bytes)
    }

    /// Write a float as its shortest round-trip decimal text in the small form.
    pub fn write_float(&mut self, value: f32) -> Result<()> {
        self.write_small_string(Some(&format!("{:?}", value)))
    }

    /// Write a double as its shortest round-trip decimal text in the small form.
    pub fn write_double(&mut self, value: f64) -> Result<()> {
        self.write_small_string(Some(&format!("{:?}", value)))
    }

    /// Write an enum constant by name in the small form.
    ///
    /// The constant is written unconditionally; a nullable enum needs an
    /// explicit [`write_bool`](Encoder::write_bool) flag from the caller.
    pub fn write_enum<E: EnumConstant>(&mut self, constant: &E) -> Result<()> {
        self.write_small_string(Some(constant.name()))
    }

    /// Write a UUID as the most significant 64 bits followed by the least significant 64 bits.
    pub fn write_uuid(&mut self, uuid: &Uuid) -> Result<()> {
        let (most, least) = uuid.as_u64_pair();
        self.write_long(most as i64)?;
        self.write_long(least as i64)
    }

    /// Write a self-serializing value.
    ///
    /// A boolean is written to indicate if the value is present and, if so,
    /// the value serializes itself into this encoder. A value nested deeper
    /// than [`CodecConfig::max_depth`] fails before its flag is written.
    pub fn write_nullable<T: BinarySerializable>(&mut self, value: Option<&T>) -> Result<()> {
        let Some(value) = value else {
            return self.write_bool(false);
        };

        if self.depth >= self.config.max_depth {
            return Err(CodecError::RecursionLimit(self.config.max_depth));
        }
        self.write_bool(true)?;
        self.depth += 1;
        let result = value.serialize(self);
        self.depth -= 1;
        result
    }

    /// Write an `int32` count followed by each value as a present nullable value.
    pub fn write_list<T: BinarySerializable>(&mut self, values: &[T]) -> Result<()> {
        self.write_count(values.len())?;
        for value in values {
            self.write_nullable(Some(value))?;
        }
        Ok(())
    }

    /// Write an `int32` count followed by each element as a nullable value.
    pub fn write_nullable_list<T: BinarySerializable>(&mut self, values: &[Option<T>]) -> Result<()> {
        self.write_count(values.len())?;
        for value in values {
            self.write_nullable(value.as_ref())?;
        }
        Ok(())
    }

    /// Write a value through the generic fallback registry.
    ///
    /// A boolean is written to indicate if the value is present and, if so,
    /// the registered type name and the codec's payload as a byte array.
    /// An unregistered type fails before anything is written.
    pub fn write_object<T: Any>(&mut self, value: Option<&T>) -> Result<()> {
        let Some(value) = value else {
            return self.write_bool(false);
        };

        let registry = Arc::clone(&self.registry);
        let (name, codec) = registry
            .by_type(TypeId::of::<T>())
            .ok_or(CodecError::UnregisteredType(type_name::<T>()))?;
        let cx = CodecContext::new(&registry, self.config, self.depth);
        let payload = codec.encode_object(value, &cx)?;
        trace!(type_name = name, len = payload.len(), "writing fallback object");

        self.write_bool(true)?;
        self.write_small_string(Some(name))?;
        self.write_byte_array(Some(&payload))
    }

    /// Flush the pending boolean byte, then the sink.
    pub fn flush(&mut self) -> Result<()> {
        self.write_booleans()?;
        self.sink_mut()?.flush()?;
        Ok(())
    }

    /// Flush and release the sink. Further operations fail with [`CodecError::Closed`].
    ///
    /// Closing an already closed encoder does nothing.
    pub fn close(&mut self) -> Result<()> {
        if self.sink.is_none() {
            return Ok(());
        }

        let flushed = self.flush();
        // the sink is released even when the final flush fails
        self.sink = None;
        debug!(bytes_written = self.bytes_written, "encoder closed");
        flushed
    }

    /// Flush and return the sink.
    pub fn into_inner(mut self) -> Result<W> {
        self.flush()?;
        self.sink.take().ok_or(CodecError::Closed)
    }

    fn write_count(&mut self, len: usize) -> Result<()> {
        let count = i32::try_from(len)
            .map_err(|_| CodecError::Encode(format!("List of {} elements is too long", len)))?;
        self.write_int(count)
    }

    fn write_length(&mut self, len: i16, form: TextForm) -> Result<()> {
        match form {
            TextForm::Small if len == NULL_LENGTH => self.write_byte(NULL_SMALL_LENGTH),
            TextForm::Small => self.write_byte(len as u8),
            TextForm::Utf16 | TextForm::Utf8 => self.write_short(len),
        }
    }

    /// Flushes pending booleans, then writes `bytes` to the sink.
    fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.write_booleans()?;
        self.sink_mut()?.write_all(bytes)?;
        self.bytes_written += bytes.len() as u64;
        Ok(())
    }

    fn write_booleans(&mut self) -> Result<()> {
        if self.boolean_count == 0 {
            return Ok(());
        }

        let byte = self.boolean_buffer;
        self.sink_mut()?.write_all(&[byte])?;
        trace!(byte, count = self.boolean_count, "flushed boolean byte");
        self.boolean_buffer = 0;
        self.boolean_count = 0;
        self.bytes_written += 1;
        Ok(())
    }

    fn sink_mut(&mut self) -> Result<&mut W> {
        self.sink.as_mut().ok_or(CodecError::Closed)
    }
}

impl<W: Write> Drop for Encoder<W> {
    fn drop(&mut self) {
        if self.sink.is_some() && self.boolean_count > 0 {
            if let Err(e) = self.write_booleans() {
                warn!(error = %e, "failed to flush pending booleans on drop");
            }
        }
    }
}

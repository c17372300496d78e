//! The generic fallback: codecs for types with no structured encoding, keyed by
//! type identity when writing and by registered name when reading.
//!
//! A registry is populated at startup and handed to each [`Encoder`] and
//! [`Decoder`] that needs it; there is no global instance.

use crate::core::MAX_SMALL_LENGTH;
use crate::*;
use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

/// Converts values of one registered type to and from an opaque payload.
///
/// The payload is written as a byte array after the type's registered name;
/// its contents are not interpreted by the codec.
pub trait ObjectCodec: Send + Sync {
    /// Encode `value`, which is always of the type this codec was registered for.
    fn encode_object(&self, value: &dyn Any, cx: &CodecContext<'_>) -> Result<Vec<u8>>;

    /// Decode a payload produced by [`encode_object`](ObjectCodec::encode_object).
    fn decode_object(&self, payload: &[u8], cx: &CodecContext<'_>) -> Result<Box<dyn Any>>;
}

/// The encoder or decoder on whose behalf an [`ObjectCodec`] runs.
///
/// Codecs that nest the codec's own format in their payload build their inner
/// encoder or decoder from here, so fallback fields and the depth limit keep
/// working inside the payload.
pub struct CodecContext<'a> {
    registry: &'a Arc<CodecRegistry>,
    config: CodecConfig,
    depth: usize,
}

impl<'a> CodecContext<'a> {
    pub(crate) fn new(registry: &'a Arc<CodecRegistry>, config: CodecConfig, depth: usize) -> Self {
        Self {
            registry,
            config,
            depth,
        }
    }

    pub fn registry(&self) -> &Arc<CodecRegistry> {
        self.registry
    }

    pub fn config(&self) -> CodecConfig {
        self.config
    }

    /// Nesting depth of the value being dispatched.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Creates an encoder one nesting level below the caller.
    pub fn encoder<W: Write>(&self, sink: W) -> Result<Encoder<W>> {
        let depth = self.nested_depth()?;
        Ok(Encoder::with_options(sink, Arc::clone(self.registry), self.config).at_depth(depth))
    }

    /// Creates a decoder one nesting level below the caller.
    pub fn decoder<R: Read>(&self, source: R) -> Result<Decoder<R>> {
        let depth = self.nested_depth()?;
        Ok(Decoder::with_options(source, Arc::clone(self.registry), self.config).at_depth(depth))
    }

    fn nested_depth(&self) -> Result<usize> {
        if self.depth >= self.config.max_depth {
            return Err(CodecError::RecursionLimit(self.config.max_depth));
        }
        Ok(self.depth + 1)
    }
}

struct Registration {
    name: String,
    codec: Arc<dyn ObjectCodec>,
}

/// Fallback codecs keyed by type identity and by name.
#[derive(Default)]
pub struct CodecRegistry {
    by_type: HashMap<TypeId, Registration>,
    by_name: HashMap<String, Arc<dyn ObjectCodec>>,
}

impl CodecRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the codecs of every enabled optional feature.
    pub fn with_defaults() -> Result<Self> {
        let mut registry = Self::new();
        crate::features::register_defaults(&mut registry)?;
        Ok(registry)
    }

    /// Register `codec` as the fallback encoding of `T` under `name`.
    ///
    /// `name` is written to the stream with the small-string form, so it must be
    /// at most 254 bytes. Each type and each name may be registered once.
    pub fn register<T: Any>(
        &mut self,
        name: impl Into<String>,
        codec: impl ObjectCodec + 'static,
    ) -> Result<&mut Self> {
        let name = name.into();
        if name.len() > MAX_SMALL_LENGTH {
            return Err(CodecError::SizeViolation {
                form: TextForm::Small,
                len: name.len(),
                limit: MAX_SMALL_LENGTH,
            });
        }
        if self.by_type.contains_key(&TypeId::of::<T>()) {
            return Err(CodecError::DuplicateRegistration(type_name::<T>().to_string()));
        }
        if self.by_name.contains_key(&name) {
            return Err(CodecError::DuplicateRegistration(name));
        }

        debug!(name = %name, rust_type = type_name::<T>(), "registered object codec");
        let codec: Arc<dyn ObjectCodec> = Arc::new(codec);
        self.by_name.insert(name.clone(), Arc::clone(&codec));
        self.by_type
            .insert(TypeId::of::<T>(), Registration { name, codec });
        Ok(self)
    }

    /// Register plain functions as the fallback encoding of `T`.
    pub fn register_fn<T: Any>(
        &mut self,
        name: impl Into<String>,
        encode: fn(&T) -> Result<Vec<u8>>,
        decode: fn(&[u8]) -> Result<T>,
    ) -> Result<&mut Self> {
        self.register::<T>(name, FnCodec::new(encode, decode))
    }

    /// Whether `T` has a registered codec.
    pub fn contains<T: Any>(&self) -> bool {
        self.by_type.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.by_type.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }

    pub(crate) fn by_type(&self, id: TypeId) -> Option<(&str, &dyn ObjectCodec)> {
        self.by_type
            .get(&id)
            .map(|registration| (registration.name.as_str(), registration.codec.as_ref()))
    }

    pub(crate) fn by_name(&self, name: &str) -> Option<&dyn ObjectCodec> {
        self.by_name.get(name).map(|codec| codec.as_ref())
    }
}

impl fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.by_name.keys().collect();
        names.sort();
        f.debug_struct("CodecRegistry").field("names", &names).finish()
    }
}

/// Downcasts a value handed to an [`ObjectCodec`] to the type it was registered for.
pub(crate) fn expect_type<T: Any>(value: &dyn Any) -> Result<&T> {
    value.downcast_ref::<T>().ok_or_else(|| CodecError::TypeMismatch {
        expected: type_name::<T>(),
        actual: "unregistered value".to_string(),
    })
}

/// An [`ObjectCodec`] built from a pair of functions.
pub struct FnCodec<T> {
    encode: fn(&T) -> Result<Vec<u8>>,
    decode: fn(&[u8]) -> Result<T>,
}

impl<T> FnCodec<T> {
    pub fn new(encode: fn(&T) -> Result<Vec<u8>>, decode: fn(&[u8]) -> Result<T>) -> Self {
        Self { encode, decode }
    }
}

impl<T: Any> ObjectCodec for FnCodec<T> {
    fn encode_object(&self, value: &dyn Any, _cx: &CodecContext<'_>) -> Result<Vec<u8>> {
        (self.encode)(expect_type::<T>(value)?)
    }

    fn decode_object(&self, payload: &[u8], _cx: &CodecContext<'_>) -> Result<Box<dyn Any>> {
        Ok(Box::new((self.decode)(payload)?))
    }
}

/// An [`ObjectCodec`] that writes a [`BinarySerializable`] value with a nested
/// encoder, making its own format the opaque payload.
///
/// The nested encoder shares the caller's registry and config, and counts as
/// one level of nesting.
pub struct SerializableCodec<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> SerializableCodec<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for SerializableCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: BinarySerializable + Default + Any> ObjectCodec for SerializableCodec<T> {
    fn encode_object(&self, value: &dyn Any, cx: &CodecContext<'_>) -> Result<Vec<u8>> {
        let value = expect_type::<T>(value)?;
        let mut encoder = cx.encoder(Vec::new())?;
        value.serialize(&mut encoder)?;
        encoder.into_inner()
    }

    fn decode_object(&self, payload: &[u8], cx: &CodecContext<'_>) -> Result<Box<dyn Any>> {
        let mut decoder = cx.decoder(payload)?;
        let mut value = T::default();
        value.deserialize(&mut decoder)?;
        Ok(Box::new(value))
    }
}

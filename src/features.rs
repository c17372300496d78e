#[cfg(feature = "bigdecimal")]
use bigdecimal::BigDecimal;
#[cfg(feature = "rust_decimal")]
use rust_decimal::Decimal;
#[cfg(feature = "smol_str")]
use smol_str::SmolStr;
#[cfg(any(feature = "rust_decimal", feature = "bigdecimal"))]
use std::str::FromStr;
#[cfg(feature = "ulid")]
use ulid::Ulid;

#[allow(unused_imports)]
use crate::registry::expect_type;
#[allow(unused_imports)]
use crate::*;

/// Registers the fallback codecs of every enabled feature.
#[cfg_attr(not(any(feature = "rust_decimal", feature = "bigdecimal")), allow(unused_variables))]
pub(crate) fn register_defaults(registry: &mut CodecRegistry) -> Result<()> {
    #[cfg(feature = "rust_decimal")]
    registry.register_fn::<Decimal>("decimal", encode_decimal_text, decode_decimal_text)?;
    #[cfg(feature = "bigdecimal")]
    registry.register_fn::<BigDecimal>("bigdecimal", encode_decimal_text, decode_decimal_text)?;
    Ok(())
}

/// Writes a number as its canonical decimal text.
#[cfg(any(feature = "rust_decimal", feature = "bigdecimal"))]
fn encode_decimal_text<T: ToString>(value: &T) -> Result<Vec<u8>> {
    Ok(value.to_string().into_bytes())
}

#[cfg(any(feature = "rust_decimal", feature = "bigdecimal"))]
fn decode_decimal_text<T: FromStr>(payload: &[u8]) -> Result<T> {
    let text = std::str::from_utf8(payload).map_err(|e| CodecError::Decode(e.to_string()))?;
    T::from_str(text).map_err(|_| CodecError::Decode(format!("Invalid decimal text '{}'", text)))
}

// --- JsonCodec ---
/// An [`ObjectCodec`] carrying any serde type as a JSON payload.
///
/// ```rust
/// use nucleus_codec::{CodecRegistry, Decoder, Encoder, JsonCodec};
/// use std::collections::BTreeMap;
/// use std::sync::Arc;
///
/// let mut registry = CodecRegistry::new();
/// registry
///     .register::<BTreeMap<String, i32>>("scores", JsonCodec::<BTreeMap<String, i32>>::new())
///     .unwrap();
/// let registry = Arc::new(registry);
///
/// let scores = BTreeMap::from([("alice".to_string(), 3)]);
/// let mut encoder = Encoder::with_registry(Vec::new(), Arc::clone(&registry));
/// encoder.write_object(Some(&scores)).unwrap();
/// let bytes = encoder.into_inner().unwrap();
///
/// let mut decoder = Decoder::with_registry(&bytes[..], registry);
/// let decoded: Option<BTreeMap<String, i32>> = decoder.read_object().unwrap();
/// assert_eq!(decoded, Some(scores));
/// ```
#[cfg(feature = "serde_json")]
pub struct JsonCodec<T> {
    _marker: std::marker::PhantomData<fn() -> T>,
}

#[cfg(feature = "serde_json")]
impl<T> JsonCodec<T> {
    pub fn new() -> Self {
        Self {
            _marker: std::marker::PhantomData,
        }
    }
}

#[cfg(feature = "serde_json")]
impl<T> Default for JsonCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "serde_json")]
impl<T> ObjectCodec for JsonCodec<T>
where
    T: serde::Serialize + serde::de::DeserializeOwned + std::any::Any,
{
    fn encode_object(&self, value: &dyn std::any::Any, _cx: &CodecContext<'_>) -> Result<Vec<u8>> {
        serde_json::to_vec(expect_type::<T>(value)?).map_err(|e| CodecError::Encode(e.to_string()))
    }

    fn decode_object(&self, payload: &[u8], _cx: &CodecContext<'_>) -> Result<Box<dyn std::any::Any>> {
        let value: T =
            serde_json::from_slice(payload).map_err(|e| CodecError::Decode(e.to_string()))?;
        Ok(Box::new(value))
    }
}

// --- Ulid ---
/// Encodes a `ulid::Ulid` like a UUID: the high 64 bits, then the low 64 bits.
#[cfg(feature = "ulid")]
impl WireValue for Ulid {
    fn write_value<W: Write>(&self, encoder: &mut Encoder<W>) -> Result<()> {
        let bits = self.0;
        encoder.write_long((bits >> 64) as u64 as i64)?;
        encoder.write_long(bits as u64 as i64)
    }

    fn read_value<R: Read>(decoder: &mut Decoder<R>) -> Result<Self> {
        let high = decoder.read_long()? as u64 as u128;
        let low = decoder.read_long()? as u64 as u128;
        Ok(Ulid((high << 64) | low))
    }
}

// --- SmolStr ---
#[cfg(feature = "smol_str")]
impl SmallText for SmolStr {
    fn write_small<W: Write>(&self, encoder: &mut Encoder<W>) -> Result<()> {
        encoder.write_small_string(Some(self.as_str()))
    }

    fn read_small<R: Read>(decoder: &mut Decoder<R>) -> Result<Self> {
        decoder
            .read_small_string()?
            .map(SmolStr::from)
            .ok_or_else(|| CodecError::Decode("Unexpected null small string".to_string()))
    }
}
#[cfg(feature = "smol_str")]
impl SmallText for Option<SmolStr> {
    fn write_small<W: Write>(&self, encoder: &mut Encoder<W>) -> Result<()> {
        encoder.write_small_string(self.as_deref())
    }

    fn read_small<R: Read>(decoder: &mut Decoder<R>) -> Result<Self> {
        Ok(decoder.read_small_string()?.map(SmolStr::from))
    }
}

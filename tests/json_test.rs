#![cfg(feature = "serde_json")]

use nucleus_codec::{BinarySerializable, CodecError, CodecRegistry, Decoder, Encoder, JsonCodec};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
struct Settings {
    volume: u8,
    tags: Vec<String>,
    limits: BTreeMap<String, i64>,
}

#[derive(BinarySerializable, Default, Debug, PartialEq)]
struct Profile {
    #[nucleus(small)]
    name: String,
    #[nucleus(fallback)]
    settings: Option<Settings>,
}

fn registry() -> Arc<CodecRegistry> {
    let mut registry = CodecRegistry::new();
    registry
        .register::<Settings>("settings", JsonCodec::<Settings>::new())
        .unwrap();
    Arc::new(registry)
}

fn settings() -> Settings {
    Settings {
        volume: 80,
        tags: vec!["pvp".to_string(), "hardcore".to_string()],
        limits: BTreeMap::from([("homes".to_string(), 3), ("warps".to_string(), -1)]),
    }
}

#[test]
fn test_json_payload() {
    let value = settings();
    let mut encoder = Encoder::with_registry(Vec::new(), registry());
    encoder.write_object(Some(&value)).unwrap();
    let bytes = encoder.into_inner().unwrap();

    let json = serde_json::to_vec(&value).unwrap();
    // flag, name length, name, payload length
    let header = 1 + 1 + "settings".len() + 4;
    assert_eq!(bytes.len(), header + json.len());
    assert_eq!(&bytes[header..], &json[..]);

    let mut decoder = Decoder::with_registry(&bytes[..], registry());
    assert_eq!(decoder.read_object::<Settings>().unwrap(), Some(value));
}

#[test]
fn test_json_fallback_field() {
    let profile = Profile {
        name: "steve".to_string(),
        settings: Some(settings()),
    };

    let mut encoder = Encoder::with_registry(Vec::new(), registry());
    encoder.write_nullable(Some(&profile)).unwrap();
    let bytes = encoder.into_inner().unwrap();

    let mut decoder = Decoder::with_registry(&bytes[..], registry());
    assert_eq!(decoder.read_nullable::<Profile>().unwrap(), Some(profile));
}

#[test]
fn test_malformed_json_payload() {
    let mut encoder = Encoder::new(Vec::new());
    encoder.write_bool(true).unwrap();
    encoder.write_small_string(Some("settings")).unwrap();
    encoder.write_byte_array(Some(b"{\"volume\":")).unwrap();
    let bytes = encoder.into_inner().unwrap();

    let mut decoder = Decoder::with_registry(&bytes[..], registry());
    assert!(matches!(
        decoder.read_object::<Settings>(),
        Err(CodecError::Decode(_))
    ));
}

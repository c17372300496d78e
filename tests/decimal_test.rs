#![cfg(feature = "rust_decimal")]

use nucleus_codec::{CodecError, CodecRegistry, Decoder, Encoder};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;

fn round_trip(value: &Decimal) -> Decimal {
    let registry = Arc::new(CodecRegistry::with_defaults().unwrap());
    let mut encoder = Encoder::with_registry(Vec::new(), Arc::clone(&registry));
    encoder.write_object(Some(value)).unwrap();
    let bytes = encoder.into_inner().unwrap();

    let mut decoder = Decoder::with_registry(&bytes[..], registry);
    decoder.read_object::<Decimal>().unwrap().unwrap()
}

#[test]
fn test_decimal_round_trip() {
    for text in ["0", "123.456", "-987.654321", "0.0000000000000000000000000001", "79228162514264337593543950335"] {
        let value = Decimal::from_str(text).unwrap();
        let decoded = round_trip(&value);
        assert_eq!(decoded, value);
        // scale survives as well as the numeric value
        assert_eq!(decoded.to_string(), value.to_string());
    }
}

#[test]
fn test_decimal_payload_is_decimal_text() {
    let registry = Arc::new(CodecRegistry::with_defaults().unwrap());
    let mut encoder = Encoder::with_registry(Vec::new(), registry);
    encoder
        .write_object(Some(&Decimal::from_str("-1.50").unwrap()))
        .unwrap();
    let bytes = encoder.into_inner().unwrap();

    let mut expected = vec![0x01, 0x07];
    expected.extend_from_slice(b"decimal");
    expected.extend_from_slice(&[0x00, 0x00, 0x00, 0x05]);
    expected.extend_from_slice(b"-1.50");
    assert_eq!(bytes, expected);
}

#[test]
fn test_invalid_decimal_text() {
    let mut encoder = Encoder::new(Vec::new());
    encoder.write_bool(true).unwrap();
    encoder.write_small_string(Some("decimal")).unwrap();
    encoder.write_byte_array(Some(b"12.x")).unwrap();
    let bytes = encoder.into_inner().unwrap();

    let mut decoder = Decoder::with_registry(&bytes[..], Arc::new(CodecRegistry::with_defaults().unwrap()));
    assert!(matches!(
        decoder.read_object::<Decimal>(),
        Err(CodecError::Decode(_))
    ));
}

#[test]
fn test_decimal_requires_registration() {
    let mut encoder = Encoder::new(Vec::new());
    assert!(matches!(
        encoder.write_object(Some(&Decimal::ONE)),
        Err(CodecError::UnregisteredType(_))
    ));
}

#[test]
fn test_defaults_register_decimal() {
    let mut registry = CodecRegistry::with_defaults().unwrap();
    assert!(registry.contains::<Decimal>());
    assert!(format!("{:?}", registry).contains("\"decimal\""));

    // the default name is taken, so a second codec for it is refused
    assert!(matches!(
        registry.register_fn::<String>("decimal", |_| Ok(Vec::new()), |_| Ok(String::new())),
        Err(CodecError::DuplicateRegistration(name)) if name == "decimal"
    ));
}

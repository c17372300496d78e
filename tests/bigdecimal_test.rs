#![cfg(feature = "bigdecimal")]

use bigdecimal::BigDecimal;
use nucleus_codec::{BinarySerializable, CodecRegistry, Decoder, Encoder};
use std::str::FromStr;
use std::sync::Arc;

#[derive(BinarySerializable, Default, Debug, PartialEq)]
struct Account {
    #[nucleus(small)]
    holder: String,
    #[nucleus(fallback)]
    balance: Option<BigDecimal>,
}

#[test]
fn test_bigdecimal_round_trip() {
    let registry = Arc::new(CodecRegistry::with_defaults().unwrap());
    let values = [
        "0",
        "123.456",
        "-987.654321",
        "123456789012345678901234567890.123456789012345678901234567890",
    ];

    let mut encoder = Encoder::with_registry(Vec::new(), Arc::clone(&registry));
    for text in values {
        encoder
            .write_object(Some(&BigDecimal::from_str(text).unwrap()))
            .unwrap();
    }
    let bytes = encoder.into_inner().unwrap();

    let mut decoder = Decoder::with_registry(&bytes[..], registry);
    for text in values {
        let decoded = decoder.read_object::<BigDecimal>().unwrap().unwrap();
        assert_eq!(decoded, BigDecimal::from_str(text).unwrap());
    }
}

#[test]
fn test_bigdecimal_struct_field() {
    let registry = Arc::new(CodecRegistry::with_defaults().unwrap());
    let accounts = [
        Account {
            holder: "alice".to_string(),
            balance: Some(BigDecimal::from_str("1024.75").unwrap()),
        },
        Account {
            holder: "bob".to_string(),
            balance: None,
        },
    ];

    let mut encoder = Encoder::with_registry(Vec::new(), Arc::clone(&registry));
    encoder.write_list(&accounts).unwrap();
    let bytes = encoder.into_inner().unwrap();

    let mut decoder = Decoder::with_registry(&bytes[..], registry);
    let decoded: Vec<Account> = decoder.read_list().unwrap();
    assert_eq!(decoded, accounts);
}

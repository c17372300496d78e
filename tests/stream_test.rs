use nucleus_codec::{from_bytes, to_bytes, CodecError, Decoder, Encoder};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use uuid::Uuid;

struct FailingSink;

impl Write for FailingSink {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::Other, "disk full"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("arena.dat");
    let owner = Uuid::new_v4();

    let mut encoder = Encoder::new(BufWriter::new(File::create(&path).unwrap()));
    encoder.write_small_string(Some("arena-1")).unwrap();
    encoder.write_uuid(&owner).unwrap();
    encoder.write_bool(true).unwrap();
    encoder.write_bool(false).unwrap();
    encoder.write_double(12.75).unwrap();
    encoder.write_byte_array(Some(&[0xCA; 3000])).unwrap();
    encoder.write_string(Some("done")).unwrap();
    encoder.write_bool(true).unwrap();
    let written = encoder.bytes_written();
    encoder.close().unwrap();

    // the trailing boolean byte is only counted once it is flushed
    assert_eq!(std::fs::metadata(&path).unwrap().len(), written + 1);

    let mut decoder = Decoder::new(BufReader::new(File::open(&path).unwrap()));
    assert_eq!(decoder.read_small_string().unwrap().as_deref(), Some("arena-1"));
    assert_eq!(decoder.read_uuid().unwrap(), owner);
    assert!(decoder.read_bool().unwrap());
    assert!(!decoder.read_bool().unwrap());
    assert_eq!(decoder.read_double().unwrap(), 12.75);
    assert_eq!(decoder.read_byte_array().unwrap(), vec![0xCA; 3000]);
    assert_eq!(decoder.read_string().unwrap().as_deref(), Some("done"));
    assert!(decoder.read_bool().unwrap());
    assert_eq!(decoder.bytes_read(), written + 1);
    assert!(matches!(
        decoder.read_byte(),
        Err(CodecError::InsufficientData)
    ));
}

#[test]
fn test_close_is_idempotent() {
    let mut out = Vec::new();
    {
        let mut encoder = Encoder::new(&mut out);
        encoder.write_bool(true).unwrap();
        encoder.close().unwrap();
        encoder.close().unwrap();
    }
    assert_eq!(out, vec![0x01]);
}

#[test]
fn test_operations_after_close() {
    let mut encoder = Encoder::new(Vec::new());
    encoder.close().unwrap();
    assert!(matches!(encoder.write_bool(true), Err(CodecError::Closed)));
    assert!(matches!(encoder.write_int(1), Err(CodecError::Closed)));
    assert!(matches!(
        encoder.write_string(Some("late")),
        Err(CodecError::Closed)
    ));
    assert!(matches!(encoder.flush(), Err(CodecError::Closed)));
    assert!(matches!(encoder.into_inner(), Err(CodecError::Closed)));

    let mut decoder = from_bytes(&[1u8, 2, 3, 4][..]);
    decoder.close();
    decoder.close();
    assert!(matches!(decoder.read_int(), Err(CodecError::Closed)));
    assert!(matches!(decoder.read_bool(), Err(CodecError::Closed)));
    assert!(matches!(decoder.skip(1), Err(CodecError::Closed)));
}

#[test]
fn test_io_errors_propagate() {
    let mut encoder = Encoder::new(FailingSink);
    // booleans stay pending until a byte is due
    encoder.write_bool(true).unwrap();

    match encoder.write_int(1) {
        Err(CodecError::Io(e)) => assert_eq!(e.to_string(), "disk full"),
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(encoder.bytes_written(), 0);
}

#[test]
fn test_drop_with_failing_sink_does_not_panic() {
    let mut encoder = Encoder::new(FailingSink);
    encoder.write_bool(true).unwrap();
    drop(encoder);
}

#[test]
fn test_into_inner_flushes() {
    let mut encoder = Encoder::new(Vec::new());
    encoder.write_short(258).unwrap();
    encoder.write_bool(true).unwrap();
    assert_eq!(encoder.into_inner().unwrap(), vec![0x01, 0x02, 0x01]);
}

#[test]
fn test_truncated_fixed_width_values() {
    let mut decoder = from_bytes(&[0x00u8, 0x01][..]);
    assert!(matches!(
        decoder.read_int(),
        Err(CodecError::InsufficientData)
    ));

    let mut decoder = from_bytes(&[0x00u8; 7][..]);
    assert!(matches!(
        decoder.read_long(),
        Err(CodecError::InsufficientData)
    ));

    let mut decoder = from_bytes(&[0x00u8; 15][..]);
    assert!(matches!(
        decoder.read_uuid(),
        Err(CodecError::InsufficientData)
    ));
}

#[test]
fn test_truncated_byte_arrays() {
    // small payloads go through the scratch buffer
    let mut decoder = from_bytes(&[0x00u8, 0x00, 0x00, 0x0A, 1, 2, 3][..]);
    assert!(matches!(
        decoder.read_byte_array(),
        Err(CodecError::InsufficientData)
    ));

    // a corrupt length far beyond the data is not allocated up front
    let mut decoder = from_bytes(&[0x7Fu8, 0xFF, 0xFF, 0xFF, 1, 2, 3][..]);
    assert!(matches!(
        decoder.read_byte_array(),
        Err(CodecError::InsufficientData)
    ));
    assert_eq!(decoder.bytes_read(), 7);
}

#[test]
fn test_negative_byte_array_length() {
    let mut decoder = from_bytes(&[0xFFu8, 0xFF, 0xFF, 0xFE][..]);
    assert!(matches!(
        decoder.read_byte_array(),
        Err(CodecError::Decode(_))
    ));
}

#[test]
fn test_large_byte_array_round_trip() {
    let payload: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
    let bytes = to_bytes(|encoder| {
        encoder.write_byte_array(Some(&payload))?;
        encoder.write_byte_array(Some(&payload[..16]))
    })
    .unwrap();
    assert_eq!(bytes.len(), 4 + payload.len() + 4 + 16);

    let mut decoder = from_bytes(bytes);
    assert_eq!(decoder.read_byte_array().unwrap(), payload);
    assert_eq!(decoder.read_byte_array().unwrap(), &payload[..16]);
}

#[test]
fn test_skip() {
    let bytes = to_bytes(|encoder| {
        encoder.write_bool(true)?;
        encoder.write_int(1)?;
        encoder.write_int(2)?;
        encoder.write_bool(true)
    })
    .unwrap();

    let mut decoder = from_bytes(bytes);
    assert!(decoder.read_bool().unwrap());
    assert_eq!(decoder.skip(4).unwrap(), 4);
    assert_eq!(decoder.read_int().unwrap(), 2);
    assert!(decoder.read_bool().unwrap());
    assert_eq!(decoder.bytes_read(), 10);

    assert!(matches!(decoder.skip(1), Err(CodecError::InsufficientData)));
}

#[test]
fn test_skip_zero() {
    let mut decoder = from_bytes(&[0x2Au8][..]);
    assert_eq!(decoder.skip(0).unwrap(), 0);
    assert_eq!(decoder.read_byte().unwrap(), 0x2A);
}

#[test]
fn test_decoder_advances_shared_buffer() {
    let mut bytes = to_bytes(|encoder| {
        encoder.write_int(1)?;
        encoder.write_int(2)
    })
    .unwrap();

    {
        let mut decoder = from_bytes(&mut bytes);
        assert_eq!(decoder.read_int().unwrap(), 1);
    }
    assert_eq!(&bytes[..], &[0, 0, 0, 2]);
}

#[test]
fn test_decoder_into_inner_returns_remaining_source() {
    let data = [0x00u8, 0x00, 0x00, 0x07, 0xAA, 0xBB];
    let mut decoder = Decoder::new(&data[..]);
    assert_eq!(decoder.read_int().unwrap(), 7);
    let rest = decoder.into_inner().unwrap();
    assert_eq!(rest, &[0xAAu8, 0xBB][..]);
}

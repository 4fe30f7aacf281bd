use canela::frame::{Error, Frame};

use bytes::Bytes;
use std::io::Cursor;

fn parse_bytes(input: &[u8]) -> Result<Frame, Error> {
    let mut cursor = Cursor::new(input);
    Frame::check(&mut cursor)?;
    let consumed = cursor.position() as usize;
    assert_eq!(consumed, input.len(), "frame did not consume all input");
    cursor.set_position(0);
    Frame::parse(&mut cursor)
}

#[test]
fn decode_encode_round_trip() {
    // encode(decode(bytes)) reproduces the bytes for well-formed frames.
    let wire: &[&[u8]] = &[
        b"+OK\r\n",
        b"-ERR syntax error\r\n",
        b":1000\r\n",
        b":-2\r\n",
        b"$5\r\nhello\r\n",
        b"$0\r\n\r\n",
        b"$-1\r\n",
        b"*-1\r\n",
        b"*0\r\n",
        b"*3\r\n$1\r\n1\r\n$-1\r\n$1\r\n3\r\n",
        b"*2\r\n*1\r\n:1\r\n$1\r\nx\r\n",
    ];
    for bytes in wire {
        let frame = parse_bytes(bytes).unwrap();
        assert_eq!(&frame.encode()[..], *bytes, "frame {:?}", frame);
    }
}

#[test]
fn encode_decode_round_trip() {
    // decode(encode(value)) reproduces the value for every reply variant.
    let frames = vec![
        Frame::Simple("OK".into()),
        Frame::Error("ERR unknown command 'nope'".into()),
        Frame::Integer(-1),
        Frame::Integer(i64::MAX),
        Frame::Bulk(Bytes::from_static(b"abc")),
        Frame::Bulk(Bytes::new()),
        Frame::Null,
        Frame::NullArray,
        Frame::Array(vec![
            Frame::Bulk(Bytes::from_static(b"a")),
            Frame::Null,
            Frame::Integer(7),
            Frame::Array(vec![Frame::Simple("nested".into())]),
        ]),
    ];
    for frame in frames {
        let encoded = frame.encode();
        assert_eq!(parse_bytes(&encoded).unwrap(), frame);
    }
}

#[test]
fn binary_bulk_round_trips() {
    let all_bytes: Vec<u8> = (0u8..=255).collect();
    let frame = Frame::Bulk(Bytes::from(all_bytes));
    let encoded = frame.encode();
    assert_eq!(parse_bytes(&encoded).unwrap(), frame);
}

#[test]
fn short_reads_are_incomplete() {
    let partial: &[&[u8]] = &[
        b"",
        b"+OK",
        b":12",
        b"$5\r\nhel",
        b"$5\r\nhello",
        b"*2\r\n$3\r\nGET\r\n",
        b"*2\r\n",
        b"no newline yet",
    ];
    for bytes in partial {
        let mut cursor = Cursor::new(*bytes);
        assert!(
            matches!(Frame::check(&mut cursor), Err(Error::Incomplete)),
            "expected Incomplete for {:?}",
            bytes
        );
    }
}

#[test]
fn bad_terminators_are_rejected() {
    // Bulk data must be followed by exactly CRLF.
    let mut cursor = Cursor::new(&b"$3\r\nfooXX"[..]);
    assert!(matches!(Frame::check(&mut cursor), Err(Error::Other(_))));

    let mut cursor = Cursor::new(&b"$3\r\nfoo\n\r"[..]);
    assert!(matches!(Frame::check(&mut cursor), Err(Error::Other(_))));
}

#[test]
fn junk_integers_are_rejected() {
    for bytes in [&b":12x\r\n"[..], &b":\r\n"[..], &b"$3x\r\nfoo\r\n"[..]] {
        let mut cursor = Cursor::new(bytes);
        assert!(
            matches!(Frame::check(&mut cursor), Err(Error::Other(_))),
            "expected rejection for {:?}",
            bytes
        );
    }
}

#[test]
fn oversized_frames_are_rejected() {
    // Bulk length and array count are capped.
    let mut cursor = Cursor::new(&b"$999999999999\r\n"[..]);
    assert!(matches!(Frame::check(&mut cursor), Err(Error::Other(_))));

    let mut cursor = Cursor::new(&b"*999999999\r\n"[..]);
    assert!(matches!(Frame::check(&mut cursor), Err(Error::Other(_))));

    let mut cursor = Cursor::new(&b"$-7\r\n"[..]);
    assert!(matches!(Frame::check(&mut cursor), Err(Error::Other(_))));
}

#[test]
fn unknown_tag_inside_array_is_rejected() {
    let mut cursor = Cursor::new(&b"*1\r\nXYZ\r\n"[..]);
    assert!(matches!(Frame::check(&mut cursor), Err(Error::Other(_))));
}

#[test]
fn inline_lines_become_bulk_arrays() {
    let frame = parse_bytes(b"SET greeting hey\r\n").unwrap();
    assert_eq!(
        frame,
        Frame::Array(vec![
            Frame::Bulk(Bytes::from_static(b"SET")),
            Frame::Bulk(Bytes::from_static(b"greeting")),
            Frame::Bulk(Bytes::from_static(b"hey")),
        ])
    );

    // Runs of whitespace separate, never produce empty tokens.
    let frame = parse_bytes(b"  PING   \r\n").unwrap();
    assert_eq!(frame, Frame::Array(vec![Frame::Bulk(Bytes::from_static(b"PING"))]));

    // A blank line is an empty request.
    let frame = parse_bytes(b"\r\n").unwrap();
    assert_eq!(frame, Frame::Array(vec![]));
}

#[test]
fn resumable_decode_consumes_exactly_one_frame() {
    let input = b"+OK\r\n:5\r\n";
    let mut cursor = Cursor::new(&input[..]);
    Frame::check(&mut cursor).unwrap();
    assert_eq!(cursor.position(), 5);

    cursor.set_position(0);
    assert_eq!(Frame::parse(&mut cursor).unwrap(), Frame::Simple("OK".into()));
    assert_eq!(Frame::parse(&mut cursor).unwrap(), Frame::Integer(5));
}

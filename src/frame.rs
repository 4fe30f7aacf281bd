//! Provides a type representing a frame in the wire protocol as well as
//! utilities for parsing frames from a byte array and encoding frames back
//! into their canonical byte form.

use std::io::Cursor;

use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Upper bound on the element count accepted for an array frame.
const MAX_ARRAY_LEN: i64 = 1024 * 1024;

/// Upper bound on the byte length accepted for a bulk string frame.
const MAX_BULK_LEN: i64 = 512 * 1024 * 1024;

/// Upper bound on frame nesting.
const MAX_DEPTH: usize = 32;

/// Upper bound on an inline request line, terminator excluded.
const MAX_INLINE_LEN: usize = 64 * 1024;

/// A frame in the wire protocol.
#[derive(Clone, Debug, PartialEq)]
pub enum Frame {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(Bytes),
    Null,
    NullArray,
    Array(Vec<Frame>),
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Not enough data is available to parse a message.
    #[error("stream ended early")]
    Incomplete,

    /// Invalid message encoding.
    #[error("protocol error; {0}")]
    Other(String),
}

impl Frame {
    /// Returns an empty array.
    pub fn array() -> Frame {
        Frame::Array(vec![])
    }

    /// Push a "bulk" frame into the array. `self` must be an Array frame.
    ///
    /// # Panics
    ///
    /// panics if `self` is not an array.
    pub fn push_bulk(&mut self, bytes: Bytes) {
        match self {
            Frame::Array(vec) => {
                vec.push(Frame::Bulk(bytes));
            }
            _ => panic!("not an array frame"),
        }
    }

    /// Push an "integer" frame into the array. `self` must be an Array frame.
    ///
    /// # Panics
    ///
    /// panics if `self` is not an array.
    pub fn push_int(&mut self, value: i64) {
        match self {
            Frame::Array(vec) => {
                vec.push(Frame::Integer(value));
            }
            _ => panic!("not an array frame"),
        }
    }

    /// Checks if an entire message can be decoded from `src`.
    ///
    /// The cursor is left positioned one past the end of the frame on
    /// success. On `Error::Incomplete` the caller is expected to retry once
    /// more bytes have been buffered; the cursor position is meaningless in
    /// that case.
    pub fn check(src: &mut Cursor<&[u8]>) -> Result<(), Error> {
        check_at(src, 0)
    }

    /// The message has already been validated with `check`.
    pub fn parse(src: &mut Cursor<&[u8]>) -> Result<Frame, Error> {
        parse_at(src, 0)
    }

    /// Encode the frame into its canonical wire form.
    ///
    /// Encoding is total: every frame variant has exactly one byte form, and
    /// a conforming decoder reproduces the frame from it.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(16);
        self.write_to(&mut buf);
        buf.freeze()
    }

    fn write_to(&self, buf: &mut BytesMut) {
        match self {
            Frame::Simple(val) => {
                buf.put_u8(b'+');
                buf.put_slice(val.as_bytes());
                buf.put_slice(b"\r\n");
            }
            Frame::Error(val) => {
                buf.put_u8(b'-');
                buf.put_slice(val.as_bytes());
                buf.put_slice(b"\r\n");
            }
            Frame::Integer(val) => {
                buf.put_u8(b':');
                buf.put_slice(val.to_string().as_bytes());
                buf.put_slice(b"\r\n");
            }
            Frame::Bulk(val) => {
                buf.put_u8(b'$');
                buf.put_slice(val.len().to_string().as_bytes());
                buf.put_slice(b"\r\n");
                buf.put_slice(val);
                buf.put_slice(b"\r\n");
            }
            Frame::Null => {
                buf.put_slice(b"$-1\r\n");
            }
            Frame::NullArray => {
                buf.put_slice(b"*-1\r\n");
            }
            Frame::Array(items) => {
                buf.put_u8(b'*');
                buf.put_slice(items.len().to_string().as_bytes());
                buf.put_slice(b"\r\n");
                for item in items {
                    item.write_to(buf);
                }
            }
        }
    }
}

fn check_at(src: &mut Cursor<&[u8]>, depth: usize) -> Result<(), Error> {
    if depth > MAX_DEPTH {
        return Err("frame nesting too deep".into());
    }
    match peek_u8(src)? {
        b'+' | b'-' => {
            skip(src, 1)?;
            get_line(src)?;
            Ok(())
        }
        b':' => {
            skip(src, 1)?;
            get_int(src)?;
            Ok(())
        }
        b'$' => {
            skip(src, 1)?;
            let len = get_int(src)?;
            if len == -1 {
                // Nil bulk string
                return Ok(());
            }
            if !(0..=MAX_BULK_LEN).contains(&len) {
                return Err("invalid bulk length".into());
            }
            skip_data(src, len as usize)
        }
        b'*' => {
            skip(src, 1)?;
            let count = get_int(src)?;
            if count == -1 {
                // Nil array
                return Ok(());
            }
            if !(0..=MAX_ARRAY_LEN).contains(&count) {
                return Err("invalid multibulk length".into());
            }
            for _ in 0..count {
                check_at(src, depth + 1)?;
            }
            Ok(())
        }
        actual => {
            // Anything that does not start with a known tag is treated as an
            // inline request: a single whitespace-separated line of text.
            // Inline form is only valid at the top level.
            if depth > 0 {
                return Err(format!("invalid frame type byte `{}`", actual).into());
            }
            check_inline(src)
        }
    }
}

fn parse_at(src: &mut Cursor<&[u8]>, depth: usize) -> Result<Frame, Error> {
    if depth > MAX_DEPTH {
        return Err("frame nesting too deep".into());
    }
    match peek_u8(src)? {
        b'+' => {
            skip(src, 1)?;
            let line = get_line(src)?.to_vec();
            let string = String::from_utf8(line).map_err(|_| "invalid simple string")?;
            Ok(Frame::Simple(string))
        }
        b'-' => {
            skip(src, 1)?;
            let line = get_line(src)?.to_vec();
            let string = String::from_utf8(line).map_err(|_| "invalid error string")?;
            Ok(Frame::Error(string))
        }
        b':' => {
            skip(src, 1)?;
            let value = get_int(src)?;
            Ok(Frame::Integer(value))
        }
        b'$' => {
            skip(src, 1)?;
            let len = get_int(src)?;
            if len == -1 {
                return Ok(Frame::Null);
            }
            if !(0..=MAX_BULK_LEN).contains(&len) {
                return Err("invalid bulk length".into());
            }
            let len = len as usize;
            if src.remaining() < len + 2 {
                return Err(Error::Incomplete);
            }
            let data = Bytes::copy_from_slice(&src.chunk()[..len]);
            if &src.chunk()[len..len + 2] != b"\r\n" {
                return Err("expected CRLF after bulk data".into());
            }
            src.advance(len + 2);
            Ok(Frame::Bulk(data))
        }
        b'*' => {
            skip(src, 1)?;
            let count = get_int(src)?;
            if count == -1 {
                return Ok(Frame::NullArray);
            }
            if !(0..=MAX_ARRAY_LEN).contains(&count) {
                return Err("invalid multibulk length".into());
            }
            let mut out = Vec::with_capacity(count.min(1024) as usize);
            for _ in 0..count {
                out.push(parse_at(src, depth + 1)?);
            }
            Ok(Frame::Array(out))
        }
        actual => {
            if depth > 0 {
                return Err(format!("invalid frame type byte `{}`", actual).into());
            }
            parse_inline(src)
        }
    }
}

/// An inline request must fit in a single CRLF-terminated line.
fn check_inline(src: &mut Cursor<&[u8]>) -> Result<(), Error> {
    match get_line(src) {
        Ok(_) => Ok(()),
        Err(Error::Incomplete) if src.remaining() > MAX_INLINE_LEN => {
            Err("too big inline request".into())
        }
        Err(err) => Err(err),
    }
}

/// Split an inline line on ASCII whitespace, yielding a bulk-string array.
///
/// A blank line yields an empty array, which the server ignores.
fn parse_inline(src: &mut Cursor<&[u8]>) -> Result<Frame, Error> {
    let line = get_line(src)?;
    let mut request = Frame::array();
    for token in line
        .split(|byte| byte.is_ascii_whitespace())
        .filter(|token| !token.is_empty())
    {
        request.push_bulk(Bytes::copy_from_slice(token));
    }
    Ok(request)
}

fn peek_u8(src: &mut Cursor<&[u8]>) -> Result<u8, Error> {
    if !src.has_remaining() {
        return Err(Error::Incomplete);
    }
    Ok(src.chunk()[0])
}

fn skip(src: &mut Cursor<&[u8]>, n: usize) -> Result<(), Error> {
    if src.remaining() < n {
        return Err(Error::Incomplete);
    }
    src.advance(n);
    Ok(())
}

/// Skip the body of a bulk string, insisting on the CRLF terminator.
fn skip_data(src: &mut Cursor<&[u8]>, len: usize) -> Result<(), Error> {
    if src.remaining() < len + 2 {
        return Err(Error::Incomplete);
    }
    if &src.chunk()[len..len + 2] != b"\r\n" {
        return Err("expected CRLF after bulk data".into());
    }
    src.advance(len + 2);
    Ok(())
}

/// Read a signed ASCII decimal line.
///
/// The whole line must be a valid integer; trailing garbage is a protocol
/// error, not ignored.
fn get_int(src: &mut Cursor<&[u8]>) -> Result<i64, Error> {
    let line = get_line(src)?;
    atoi::atoi::<i64>(line).ok_or_else(|| "invalid frame format".into())
}

/// Find a line terminated by CRLF.
fn get_line<'a>(src: &mut Cursor<&'a [u8]>) -> Result<&'a [u8], Error> {
    let start = src.position() as usize;
    let end = src.get_ref().len().saturating_sub(1);

    for i in start..end {
        if src.get_ref()[i] == b'\r' && src.get_ref()[i + 1] == b'\n' {
            src.set_position((i + 2) as u64);
            return Ok(&src.get_ref()[start..i]);
        }
    }

    Err(Error::Incomplete)
}

impl From<String> for Error {
    fn from(src: String) -> Error {
        Error::Other(src)
    }
}

impl From<&str> for Error {
    fn from(src: &str) -> Error {
        src.to_string().into()
    }
}

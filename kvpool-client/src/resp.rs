//! # RESP2 Encoding and Parsing
//!
//! Purpose: Frame commands and parse replies for `TcpConnection`.
//!
//! ## Design Principles
//! 1. **Buffer Reuse**: Callers own the write and line buffers; nothing here
//!    allocates per call except reply payloads.
//! 2. **Binary-Safe**: Bulk strings are raw bytes end to end.
//! 3. **Fail Fast**: Any framing violation is `ClientError::Protocol`; a peer
//!    that hangs up mid-reply is an `UnexpectedEof` IO error.

use std::fmt::Write as _;
use std::io::{self, BufRead};

use bytes::{BufMut, BytesMut};

use crate::error::{ClientError, ClientResult};

/// Deepest array nesting accepted from the server.
const MAX_DEPTH: usize = 32;
/// Largest bulk string accepted from the server (Redis' own limit).
const MAX_BULK_LEN: usize = 512 * 1024 * 1024;

/// One server reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// `+OK`, `+PONG`.
    Status(Vec<u8>),
    /// `-ERR ...`.
    Error(Vec<u8>),
    /// `:123`.
    Integer(i64),
    /// `$n`, `None` for `$-1`.
    Bulk(Option<Vec<u8>>),
    /// `*n`, `None` for `*-1`.
    Array(Option<Vec<Reply>>),
}

/// Appends `args` to `out` as a RESP2 array of bulk strings.
pub fn encode_command(args: &[&[u8]], out: &mut BytesMut) {
    let payload: usize = args.iter().map(|arg| arg.len() + 16).sum();
    out.reserve(payload + 16);

    // fmt::Write on BytesMut never fails.
    let _ = write!(out, "*{}\r\n", args.len());
    for arg in args {
        let _ = write!(out, "${}\r\n", arg.len());
        out.put_slice(arg);
        out.put_slice(b"\r\n");
    }
}

/// Reads exactly one reply from `reader`.
pub fn read_reply<R: BufRead>(reader: &mut R, line_buf: &mut Vec<u8>) -> ClientResult<Reply> {
    read_nested(reader, line_buf, 0)
}

fn read_nested<R: BufRead>(reader: &mut R, line_buf: &mut Vec<u8>, depth: usize) -> ClientResult<Reply> {
    if depth > MAX_DEPTH {
        return Err(ClientError::Protocol);
    }

    read_line(reader, line_buf)?;
    let (&marker, rest) = line_buf.split_first().ok_or(ClientError::Protocol)?;
    match marker {
        b'+' => Ok(Reply::Status(rest.to_vec())),
        b'-' => Ok(Reply::Error(rest.to_vec())),
        b':' => Ok(Reply::Integer(parse_i64(rest)?)),
        b'$' => {
            let len = parse_i64(rest)?;
            read_bulk(reader, len)
        }
        b'*' => {
            let len = parse_i64(rest)?;
            if len < 0 {
                return Ok(Reply::Array(None));
            }
            let mut items = Vec::with_capacity(len.min(1024) as usize);
            for _ in 0..len {
                items.push(read_nested(reader, line_buf, depth + 1)?);
            }
            Ok(Reply::Array(Some(items)))
        }
        _ => Err(ClientError::Protocol),
    }
}

fn read_bulk<R: BufRead>(reader: &mut R, len: i64) -> ClientResult<Reply> {
    if len < 0 {
        return Ok(Reply::Bulk(None));
    }
    let len = usize::try_from(len).map_err(|_| ClientError::Protocol)?;
    if len > MAX_BULK_LEN {
        return Err(ClientError::Protocol);
    }
    let mut data = vec![0u8; len + 2];
    reader.read_exact(&mut data)?;
    if !data.ends_with(b"\r\n") {
        return Err(ClientError::Protocol);
    }
    data.truncate(len);
    Ok(Reply::Bulk(Some(data)))
}

fn read_line<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>) -> ClientResult<()> {
    buf.clear();
    if reader.read_until(b'\n', buf)? == 0 {
        return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
    }
    if !buf.ends_with(b"\r\n") {
        return Err(ClientError::Protocol);
    }
    buf.truncate(buf.len() - 2);
    Ok(())
}

fn parse_i64(data: &[u8]) -> ClientResult<i64> {
    std::str::from_utf8(data)
        .ok()
        .and_then(|text| text.parse().ok())
        .ok_or(ClientError::Protocol)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse(input: &[u8]) -> ClientResult<Reply> {
        let mut reader = Cursor::new(input.to_vec());
        let mut line = Vec::new();
        read_reply(&mut reader, &mut line)
    }

    #[test]
    fn encodes_command() {
        let mut buf = BytesMut::new();
        encode_command(&[b"GET", b"key"], &mut buf);
        assert_eq!(&buf[..], b"*2\r\n$3\r\nGET\r\n$3\r\nkey\r\n");
    }

    #[test]
    fn encodes_empty_argument() {
        let mut buf = BytesMut::new();
        encode_command(&[b"SET", b"k", b""], &mut buf);
        assert_eq!(&buf[..], b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$0\r\n\r\n");
    }

    #[test]
    fn parses_scalar_replies() {
        assert_eq!(parse(b"+OK\r\n").unwrap(), Reply::Status(b"OK".to_vec()));
        assert_eq!(parse(b"-ERR bad\r\n").unwrap(), Reply::Error(b"ERR bad".to_vec()));
        assert_eq!(parse(b":-2\r\n").unwrap(), Reply::Integer(-2));
    }

    #[test]
    fn parses_bulk_strings() {
        assert_eq!(parse(b"$5\r\nhello\r\n").unwrap(), Reply::Bulk(Some(b"hello".to_vec())));
        assert_eq!(parse(b"$2\r\n\r\n\r\n").unwrap(), Reply::Bulk(Some(b"\r\n".to_vec())));
        assert_eq!(parse(b"$-1\r\n").unwrap(), Reply::Bulk(None));
    }

    #[test]
    fn parses_nested_arrays() {
        let reply = parse(b"*2\r\n:1\r\n*1\r\n$1\r\na\r\n").unwrap();
        assert_eq!(
            reply,
            Reply::Array(Some(vec![
                Reply::Integer(1),
                Reply::Array(Some(vec![Reply::Bulk(Some(b"a".to_vec()))])),
            ]))
        );
        assert_eq!(parse(b"*-1\r\n").unwrap(), Reply::Array(None));
    }

    #[test]
    fn rejects_bad_framing() {
        assert!(matches!(parse(b"?what\r\n"), Err(ClientError::Protocol)));
        assert!(matches!(parse(b":12x\r\n"), Err(ClientError::Protocol)));
        assert!(matches!(parse(b"+OK\n"), Err(ClientError::Protocol)));
        assert!(matches!(parse(b"$3\r\nabcd\r\n"), Err(ClientError::Protocol)));
    }

    #[test]
    fn rejects_oversized_bulk_length() {
        assert!(matches!(
            parse(b"$9223372036854775800\r\nab\r\n"),
            Err(ClientError::Protocol)
        ));
        let just_over = format!("${}\r\n", MAX_BULK_LEN + 1);
        assert!(matches!(parse(just_over.as_bytes()), Err(ClientError::Protocol)));
    }

    #[test]
    fn eof_is_an_io_error() {
        match parse(b"") {
            Err(ClientError::Io(err)) => assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof),
            other => panic!("expected EOF, got {:?}", other),
        }
        assert!(matches!(parse(b"$5\r\nhel"), Err(ClientError::Io(_))));
    }
}

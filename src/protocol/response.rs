//! Container-to-server packet payloads.
//!
//! Each function returns the payload only; the framer adds `"AB"` and the
//! length header.

use std::io;

use bytes::{BufMut, Bytes, BytesMut};
use http::{HeaderMap, StatusCode};

use crate::protocol::codes::{self, prefix, MAX_READ_BODY_CHUNK, MAX_SEND_BODY_CHUNK, NULL_STRING_LEN};

fn put_string(buf: &mut BytesMut, value: &[u8]) -> io::Result<()> {
    let len = u16::try_from(value.len())
        .ok()
        .filter(|len| *len != NULL_STRING_LEN)
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("string of {} bytes does not fit an AJP13 packet", value.len()),
            )
        })?;
    buf.put_u16(len);
    buf.put_slice(value);
    buf.put_u8(0);
    Ok(())
}

/// SEND_HEADERS: status, reason phrase, then the header list.
pub fn send_headers(status: StatusCode, headers: &HeaderMap) -> io::Result<Bytes> {
    let mut buf = BytesMut::with_capacity(128);
    buf.put_u8(prefix::SEND_HEADERS);
    buf.put_u16(status.as_u16());
    put_string(&mut buf, status.canonical_reason().unwrap_or("").as_bytes())?;

    let count = u16::try_from(headers.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "too many response headers"))?;
    buf.put_u16(count);
    for (name, value) in headers {
        match codes::response_header_code(name) {
            Some(code) => buf.put_u16(code),
            None => put_string(&mut buf, name.as_str().as_bytes())?,
        }
        put_string(&mut buf, value.as_bytes())?;
    }
    Ok(buf.freeze())
}

/// SEND_BODY_CHUNK carrying at most [`MAX_SEND_BODY_CHUNK`] bytes.
pub fn send_body_chunk(data: &[u8]) -> io::Result<Bytes> {
    if data.len() > MAX_SEND_BODY_CHUNK {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "body chunk of {} bytes exceeds limit of {MAX_SEND_BODY_CHUNK}",
                data.len()
            ),
        ));
    }
    let mut buf = BytesMut::with_capacity(data.len() + 4);
    buf.put_u8(prefix::SEND_BODY_CHUNK);
    put_string(&mut buf, data)?;
    Ok(buf.freeze())
}

/// END_RESPONSE; `reuse` tells the web server whether to keep the connection.
pub fn end_response(reuse: bool) -> Bytes {
    Bytes::copy_from_slice(&[prefix::END_RESPONSE, u8::from(reuse)])
}

/// GET_BODY_CHUNK asking for up to `requested` bytes (capped at [`MAX_READ_BODY_CHUNK`]).
pub fn get_body_chunk(requested: usize) -> Bytes {
    let requested = requested.min(MAX_READ_BODY_CHUNK) as u16;
    let mut buf = BytesMut::with_capacity(3);
    buf.put_u8(prefix::GET_BODY_CHUNK);
    buf.put_u16(requested);
    buf.freeze()
}
